//! Ingestion pipeline
//!
//! Two-phase orchestration of the `cache` surface:
//!
//! ```text
//! ┌─────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │1. FETCH │──▶│2. GROUP  │──▶│3. PERSIST│──▶│4. ENRICH │──▶│5. PERSIST│
//! │ history │   │ by dt    │   │ messages │   │ tickets  │   │ tickets  │
//! │ threads │   │ (message │   │ + users  │   │ (opt-in) │   │          │
//! │ users   │   │  date)   │   │          │   │          │   │          │
//! └─────────┘   └──────────┘   └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! Messages are persisted before enrichment begins; a failed or disabled
//! enrichment phase leaves the message partitions fully usable. Per-channel
//! fetch errors are isolated unless every channel fails.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use super::enrich::EnrichmentCoordinator;
use super::fetcher::MessageFetcher;
use super::users::UserCache;
use crate::data::error::DataError;
use crate::data::jira::IssueApi;
use crate::data::parquet::DatasetWriter;
use crate::data::slack::ChatApi;
use crate::data::types::{ChannelRef, ChatMessage};
use crate::domain::window::TimeWindow;

/// Per-phase counts reported at the end of a run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub channels_ok: usize,
    pub channels_failed: usize,
    pub messages_written: usize,
    pub partitions_written: usize,
    pub users_written: usize,
    pub user_failures: usize,
    pub thread_failures: usize,
    pub tickets_written: usize,
    pub ticket_failures: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "channels {}/{} ok, {} messages in {} partitions, {} users \
             ({} user lookups failed, {} threads failed), {} tickets ({} failed)",
            self.channels_ok,
            self.channels_ok + self.channels_failed,
            self.messages_written,
            self.partitions_written,
            self.users_written,
            self.user_failures,
            self.thread_failures,
            self.tickets_written,
            self.ticket_failures,
        )
    }
}

/// Fetch → write → enrich orchestrator
pub struct IngestPipeline<C: ChatApi, I: IssueApi> {
    fetcher: MessageFetcher<C>,
    writer: DatasetWriter,
    users: Arc<UserCache>,
    enricher: Option<EnrichmentCoordinator<I>>,
}

impl<C: ChatApi, I: IssueApi> IngestPipeline<C, I> {
    pub fn new(
        fetcher: MessageFetcher<C>,
        writer: DatasetWriter,
        users: Arc<UserCache>,
        enricher: Option<EnrichmentCoordinator<I>>,
    ) -> Self {
        Self {
            fetcher,
            writer,
            users,
            enricher,
        }
    }

    /// Run the full pipeline over `channels` for `window`
    pub async fn run(
        &self,
        channels: &[ChannelRef],
        window: &TimeWindow,
    ) -> Result<RunSummary, DataError> {
        let mut summary = RunSummary::default();
        let mut all_messages: Vec<ChatMessage> = vec![];
        let mut first_error: Option<DataError> = None;

        // Phase 1: fetch channel by channel; a failed channel is isolated
        // unless every channel fails.
        for channel in channels {
            match self.fetcher.get_messages(channel, window).await {
                Ok(report) => {
                    summary.channels_ok += 1;
                    summary.user_failures += report.user_failures;
                    summary.thread_failures += report.thread_failures;

                    // Phases 2 + 3: group by the message's own date, one
                    // overwrite per (dt, channel) partition.
                    let groups = group_by_date(&report.messages);
                    for (dt, messages) in groups {
                        let written =
                            self.writer
                                .save_messages(channel, dt, &messages)?
                                .is_some();
                        if written {
                            summary.partitions_written += 1;
                            summary.messages_written += messages.len();
                        }
                    }
                    all_messages.extend(report.messages);
                }
                Err(e) => {
                    tracing::warn!(channel = %channel.alias(), error = %e, "Channel fetch failed");
                    summary.channels_failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        if summary.channels_ok == 0
            && let Some(e) = first_error
        {
            return Err(e);
        }

        // Flush the user cache once per run
        let users = self.users.snapshot().await;
        if self.writer.save_users(&users)?.is_some() {
            summary.users_written = users.len();
        }

        // Phases 4 + 5: optional, purely additive
        if let Some(enricher) = &self.enricher {
            let report = enricher.enrich(&all_messages).await;
            summary.ticket_failures = report.failures;
            if self
                .writer
                .save_issue_tickets(Utc::now().date_naive(), &report.tickets)?
                .is_some()
            {
                summary.tickets_written = report.tickets.len();
            }
        }

        tracing::info!(summary = %summary, "Ingestion run complete");
        Ok(summary)
    }
}

/// Group messages by their own UTC calendar date, preserving fetch order
/// inside each group.
fn group_by_date(messages: &[ChatMessage]) -> BTreeMap<NaiveDate, Vec<ChatMessage>> {
    let mut groups: BTreeMap<NaiveDate, Vec<ChatMessage>> = BTreeMap::new();
    for message in messages {
        groups.entry(message.dt()).or_default().push(message.clone());
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::{BTreeMap as StdBTreeMap, HashMap};

    use crate::data::parquet::{DatasetLayout, DatasetReader};
    use crate::data::slack::HistoryPage;
    use crate::data::slack::types::RawMessage;
    use crate::data::types::{IssueTicket, UserRecord};
    use crate::utils::time::{datetime_to_message_ts, parse_rfc3339};

    struct FakeChat {
        by_channel: HashMap<String, Vec<RawMessage>>,
    }

    #[async_trait]
    impl ChatApi for FakeChat {
        async fn history(
            &self,
            channel_id: &str,
            _oldest: DateTime<Utc>,
            _latest: DateTime<Utc>,
            _cursor: Option<&str>,
        ) -> Result<HistoryPage, DataError> {
            match self.by_channel.get(channel_id) {
                Some(messages) => Ok(HistoryPage {
                    messages: messages.clone(),
                    next_cursor: None,
                }),
                None => Err(DataError::not_found(format!("channel={channel_id}"))),
            }
        }

        async fn replies(
            &self,
            _channel_id: &str,
            _thread_ts: &str,
            _cursor: Option<&str>,
        ) -> Result<HistoryPage, DataError> {
            Ok(HistoryPage {
                messages: vec![],
                next_cursor: None,
            })
        }

        async fn user(&self, user_id: &str) -> Result<UserRecord, DataError> {
            Ok(UserRecord {
                user_id: user_id.to_string(),
                name: Some("alice".to_string()),
                real_name: None,
                display_name: None,
                email: None,
                is_bot: false,
            })
        }
    }

    struct FakeIssues;

    #[async_trait]
    impl IssueApi for FakeIssues {
        async fn ticket(&self, key: &str) -> Result<IssueTicket, DataError> {
            Ok(IssueTicket {
                ticket_id: key.to_string(),
                summary: String::new(),
                status: "Open".to_string(),
                priority: String::new(),
                issue_type: String::new(),
                assignee: String::new(),
                created: Utc::now(),
                updated: Utc::now(),
                due_date: None,
                story_points: None,
                blocks: vec![],
                blocked_by: vec![],
                depends_on: vec![],
                related: vec![],
                components: vec![],
                labels: vec![],
                fix_versions: vec![],
                project: None,
                team: None,
                epic_link: None,
                resolution: None,
                comments: StdBTreeMap::new(),
                total_comments: 0,
                sprints: vec![],
            })
        }
    }

    fn raw_at(rfc3339: &str, text: &str) -> RawMessage {
        RawMessage {
            ts: datetime_to_message_ts(parse_rfc3339(rfc3339)),
            user: Some("U1".to_string()),
            text: Some(text.to_string()),
            thread_ts: None,
            reply_count: None,
            reactions: vec![],
            files: vec![],
        }
    }

    fn pipeline(
        chat: FakeChat,
        layout: DatasetLayout,
        enrich: bool,
    ) -> IngestPipeline<FakeChat, FakeIssues> {
        let users = Arc::new(UserCache::new());
        IngestPipeline::new(
            MessageFetcher::new(Arc::new(chat), Arc::clone(&users)),
            DatasetWriter::new(layout),
            users,
            enrich.then(|| EnrichmentCoordinator::new(Arc::new(FakeIssues))),
        )
    }

    fn window() -> TimeWindow {
        TimeWindow::for_range(
            parse_rfc3339("2025-10-14T00:00:00Z").date_naive(),
            parse_rfc3339("2025-10-15T00:00:00Z").date_naive(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_run_writes_per_day_partitions_and_users() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(tmp.path());
        let chat = FakeChat {
            by_channel: HashMap::from([(
                "C1".to_string(),
                vec![
                    raw_at("2025-10-14T10:00:00Z", "day one"),
                    raw_at("2025-10-15T10:00:00Z", "day two"),
                ],
            )]),
        };
        let channels = vec![ChannelRef::new("C1", Some("eng".to_string()))];

        let summary = pipeline(chat, layout.clone(), false)
            .run(&channels, &window())
            .await
            .unwrap();

        assert_eq!(summary.channels_ok, 1);
        assert_eq!(summary.partitions_written, 2);
        assert_eq!(summary.messages_written, 2);
        assert_eq!(summary.users_written, 1);
        assert_eq!(summary.tickets_written, 0);

        let reader = DatasetReader::new(layout.clone());
        let day1 = parse_rfc3339("2025-10-14T00:00:00Z").date_naive();
        assert_eq!(reader.read_channel("eng", day1).unwrap().len(), 1);
        assert!(layout.users_path().is_file());
    }

    #[tokio::test]
    async fn test_enrichment_writes_ticket_partition() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(tmp.path());
        let chat = FakeChat {
            by_channel: HashMap::from([(
                "C1".to_string(),
                vec![raw_at("2025-10-14T10:00:00Z", "see PRD-1 and FOO-2")],
            )]),
        };
        let channels = vec![ChannelRef::new("C1", None)];

        let summary = pipeline(chat, layout.clone(), true)
            .run(&channels, &window())
            .await
            .unwrap();

        assert_eq!(summary.tickets_written, 2);
        assert_eq!(summary.ticket_failures, 0);
        let tickets = layout.tickets_partition(Utc::now().date_naive());
        assert!(tickets.is_file());
    }

    #[tokio::test]
    async fn test_failed_channel_is_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(tmp.path());
        let chat = FakeChat {
            by_channel: HashMap::from([(
                "C1".to_string(),
                vec![raw_at("2025-10-14T10:00:00Z", "hello")],
            )]),
        };
        let channels = vec![
            ChannelRef::new("C1", Some("eng".to_string())),
            ChannelRef::new("C404", None),
        ];

        let summary = pipeline(chat, layout, false)
            .run(&channels, &window())
            .await
            .unwrap();
        assert_eq!(summary.channels_ok, 1);
        assert_eq!(summary.channels_failed, 1);
    }

    #[tokio::test]
    async fn test_all_channels_failing_surfaces_error() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(tmp.path());
        let chat = FakeChat {
            by_channel: HashMap::new(),
        };
        let channels = vec![ChannelRef::new("C404", None)];

        let err = pipeline(chat, layout, false)
            .run(&channels, &window())
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::NotFound { .. }));
    }
}
