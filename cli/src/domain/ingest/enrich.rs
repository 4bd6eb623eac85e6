//! Issue-ticket enrichment (second phase)
//!
//! Gathers the union of issue keys across all fetched messages and
//! batch-fetches ticket metadata through a bounded fan-out. Purely
//! additive: failures here never roll back message persistence. Each
//! ticket's failure is isolated to a warning naming the key.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::core::constants::ENRICH_MAX_IN_FLIGHT;
use crate::data::jira::IssueApi;
use crate::data::types::{ChatMessage, IssueTicket};

/// Tickets plus the failure count for the run summary
#[derive(Debug)]
pub struct EnrichReport {
    pub tickets: Vec<IssueTicket>,
    pub failures: usize,
}

/// Coordinates the ticket-fetch fan-out
pub struct EnrichmentCoordinator<I: IssueApi> {
    client: Arc<I>,
    gate: Arc<Semaphore>,
}

impl<I: IssueApi> EnrichmentCoordinator<I> {
    pub fn new(client: Arc<I>) -> Self {
        Self {
            client,
            gate: Arc::new(Semaphore::new(ENRICH_MAX_IN_FLIGHT)),
        }
    }

    /// Fetch metadata for every distinct issue key mentioned in `messages`.
    /// Returns the successfully fetched tickets; failed keys are logged and
    /// dropped.
    pub async fn enrich(&self, messages: &[ChatMessage]) -> EnrichReport {
        let mut seen = HashSet::new();
        let keys: Vec<&str> = messages
            .iter()
            .flat_map(|m| m.issue_keys.iter())
            .map(String::as_str)
            .filter(|k| seen.insert(*k))
            .collect();

        if keys.is_empty() {
            return EnrichReport {
                tickets: vec![],
                failures: 0,
            };
        }
        tracing::debug!(keys = keys.len(), "Fetching issue tickets");

        let results = join_all(keys.iter().map(|key| {
            let gate = Arc::clone(&self.gate);
            async move {
                let _permit = gate.acquire().await.expect("semaphore never closed");
                (*key, self.client.ticket(key).await)
            }
        }))
        .await;

        let mut tickets = vec![];
        let mut failures = 0;
        for (key, result) in results {
            match result {
                Ok(ticket) => tickets.push(ticket),
                Err(e) => {
                    tracing::warn!(ticket = %key, error = %e, "Ticket fetch failed, dropped");
                    failures += 1;
                }
            }
        }

        EnrichReport { tickets, failures }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::data::error::DataError;

    fn message_with_keys(keys: &[&str]) -> ChatMessage {
        ChatMessage {
            message_id: "100.000000".to_string(),
            user_id: None,
            text: String::new(),
            timestamp: Utc::now(),
            thread_ts: None,
            reply_count: 0,
            reactions: vec![],
            files: vec![],
            issue_keys: keys.iter().map(|k| k.to_string()).collect(),
            user_name: None,
            user_real_name: None,
            user_email: None,
            user_is_bot: None,
        }
    }

    struct FakeIssueApi {
        calls: AtomicUsize,
        failing: HashSet<String>,
    }

    impl FakeIssueApi {
        fn new(failing: &[&str]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failing: failing.iter().map(|k| k.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl IssueApi for FakeIssueApi {
        async fn ticket(&self, key: &str) -> Result<IssueTicket, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(key) {
                return Err(DataError::not_found(format!("ticket={key}")));
            }
            Ok(IssueTicket {
                ticket_id: key.to_string(),
                summary: format!("summary of {key}"),
                status: "Open".to_string(),
                priority: "Medium".to_string(),
                issue_type: "Task".to_string(),
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
                comments: BTreeMap::new(),
                total_comments: 0,
                sprints: vec![],
            })
        }
    }

    #[tokio::test]
    async fn test_union_of_keys_fetched_once() {
        let api = Arc::new(FakeIssueApi::new(&[]));
        let coordinator = EnrichmentCoordinator::new(Arc::clone(&api));
        let messages = vec![
            message_with_keys(&["PRD-1", "FOO-2"]),
            message_with_keys(&["PRD-1", "BAR-3"]),
        ];

        let report = coordinator.enrich(&messages).await;
        assert_eq!(report.tickets.len(), 3);
        assert_eq!(report.failures, 0);
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failures_isolated() {
        let api = Arc::new(FakeIssueApi::new(&["FOO-2"]));
        let coordinator = EnrichmentCoordinator::new(api);
        let messages = vec![message_with_keys(&["PRD-1", "FOO-2", "BAR-3"])];

        let report = coordinator.enrich(&messages).await;
        let mut ids: Vec<&str> = report.tickets.iter().map(|t| t.ticket_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["BAR-3", "PRD-1"]);
        assert_eq!(report.failures, 1);
    }

    #[tokio::test]
    async fn test_no_keys_no_calls() {
        let api = Arc::new(FakeIssueApi::new(&[]));
        let coordinator = EnrichmentCoordinator::new(Arc::clone(&api));
        let report = coordinator.enrich(&[message_with_keys(&[])]).await;
        assert!(report.tickets.is_empty());
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }
}
