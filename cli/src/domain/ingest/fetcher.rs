//! Message fetcher
//!
//! Pulls one channel's messages for a time window: paginate history,
//! hydrate author records through the user cache, fan out over thread
//! parents for replies, convert wire rows into `ChatMessage` values.
//!
//! Failure isolation: history page errors are fatal to the call; a failed
//! thread fetch drops that thread's replies but keeps the parent; a failed
//! user fetch keeps the message with its bare `user_id`. Thread replies
//! outside the window are kept deliberately.
//!
//! Output is unsorted; ordering is established by the partition reader.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;

use super::users::UserCache;
use crate::data::error::DataError;
use crate::data::slack::ChatApi;
use crate::data::slack::types::RawMessage;
use crate::data::types::{ChannelRef, ChatMessage, FileAttachment, Reaction};
use crate::domain::mentions::extract_issue_keys;
use crate::domain::window::TimeWindow;
use crate::utils::string::{LOG_PREVIEW_MAX_LENGTH, truncate_preview};
use crate::utils::time::message_ts_to_datetime;

/// Messages plus per-item failure counts for the run summary
#[derive(Debug)]
pub struct FetchReport {
    pub messages: Vec<ChatMessage>,
    pub user_failures: usize,
    pub thread_failures: usize,
}

/// Fetches and converts one channel at a time
pub struct MessageFetcher<C: ChatApi> {
    client: Arc<C>,
    users: Arc<UserCache>,
}

impl<C: ChatApi> MessageFetcher<C> {
    pub fn new(client: Arc<C>, users: Arc<UserCache>) -> Self {
        Self { client, users }
    }

    /// Fetch a channel's timeline and thread replies for the window
    pub async fn get_messages(
        &self,
        channel: &ChannelRef,
        window: &TimeWindow,
    ) -> Result<FetchReport, DataError> {
        // 1. Paginate history until the cursor is exhausted
        let timeline = self.fetch_history(channel, window).await?;
        tracing::debug!(
            channel = %channel.alias(),
            rows = timeline.len(),
            "History pagination complete"
        );

        // 2. Hydrate authors seen on the timeline
        let mut user_failures = self.hydrate_users(&timeline).await;

        // 3 + 4. Fan out over thread parents for replies
        let parents: Vec<String> = timeline
            .iter()
            .filter(|m| is_raw_parent(m))
            .map(|m| m.ts.clone())
            .collect();
        let mut thread_failures = 0_usize;
        let mut replies: Vec<RawMessage> = vec![];
        let results = join_all(parents.iter().map(|ts| {
            let channel_id = channel.id.clone();
            async move { (ts.as_str(), self.fetch_thread(&channel_id, ts).await) }
        }))
        .await;
        for (thread_ts, result) in results {
            match result {
                Ok(rows) => replies.extend(rows),
                Err(e) => {
                    tracing::warn!(thread = %thread_ts, error = %e, "Thread fetch failed, replies omitted");
                    thread_failures += 1;
                }
            }
        }

        // Reply authors the timeline never mentioned
        user_failures += self.hydrate_users(&replies).await;

        // 5. Convert; first insert wins, timeline before replies, so a
        // duplicate id across pages resolves to the timeline row.
        let mut seen: HashSet<String> = HashSet::new();
        let mut messages = vec![];
        for raw in timeline.iter().chain(replies.iter()) {
            let Some(message) = self.convert(raw).await else {
                continue;
            };
            if seen.insert(message.message_id.clone()) {
                messages.push(message);
            }
        }

        Ok(FetchReport {
            messages,
            user_failures,
            thread_failures,
        })
    }

    async fn fetch_history(
        &self,
        channel: &ChannelRef,
        window: &TimeWindow,
    ) -> Result<Vec<RawMessage>, DataError> {
        let mut rows = vec![];
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .client
                .history(&channel.id, window.start, window.end, cursor.as_deref())
                .await?;
            rows.extend(page.messages);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Fetch every page of one thread. The first row of the first page
    /// duplicates the parent and is dropped.
    async fn fetch_thread(
        &self,
        channel_id: &str,
        thread_ts: &str,
    ) -> Result<Vec<RawMessage>, DataError> {
        let mut rows: Vec<RawMessage> = vec![];
        let mut cursor: Option<String> = None;
        let mut first_page = true;
        loop {
            let page = self
                .client
                .replies(channel_id, thread_ts, cursor.as_deref())
                .await?;
            let mut messages = page.messages;
            if first_page && messages.first().is_some_and(|m| m.ts == thread_ts) {
                messages.remove(0);
            }
            first_page = false;
            rows.extend(messages);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Fetch every distinct uncached author in `rows` through the
    /// single-flight cache. Failures are warnings; returns the count.
    async fn hydrate_users(&self, rows: &[RawMessage]) -> usize {
        let mut ids: Vec<&str> = vec![];
        let mut seen = HashSet::new();
        for row in rows {
            if let Some(user) = row.user.as_deref() {
                if seen.insert(user) && !self.users.contains(user) {
                    ids.push(user);
                }
            }
        }
        if ids.is_empty() {
            return 0;
        }

        let results = join_all(ids.iter().map(|id| async move {
            (*id, self.users.get_or_fetch(self.client.as_ref(), id).await)
        }))
        .await;

        let mut failures = 0;
        for (id, result) in results {
            if let Err(e) = result {
                tracing::warn!(user = %id, error = %e, "User lookup failed, keeping bare id");
                failures += 1;
            }
        }
        failures
    }

    /// Convert one wire row. Rows with unparsable ids are dropped with a
    /// warning; everything else converts.
    async fn convert(&self, raw: &RawMessage) -> Option<ChatMessage> {
        let Some(timestamp) = message_ts_to_datetime(&raw.ts) else {
            tracing::warn!(ts = %raw.ts, "Message id is not a timestamp, dropping row");
            return None;
        };

        let text = raw.text.clone().unwrap_or_default();
        let user = match raw.user.as_deref() {
            Some(id) => self.users.get(id).await,
            None => None,
        };
        tracing::trace!(
            id = %raw.ts,
            text = %truncate_preview(&text, LOG_PREVIEW_MAX_LENGTH),
            "Converting message"
        );

        Some(ChatMessage {
            message_id: raw.ts.clone(),
            user_id: raw.user.clone(),
            issue_keys: extract_issue_keys(&text),
            timestamp,
            thread_ts: raw.thread_ts.clone(),
            reply_count: raw.reply_count.unwrap_or(0),
            reactions: raw
                .reactions
                .iter()
                .map(|r| Reaction {
                    emoji: r.name.clone(),
                    count: r.count,
                    users: r.users.clone(),
                })
                .collect(),
            files: raw
                .files
                .iter()
                .map(|f| FileAttachment {
                    id: f.id.clone(),
                    name: f.name.clone(),
                    mimetype: f.mimetype.clone(),
                    url: f.url_private.clone(),
                    size: f.size,
                })
                .collect(),
            user_name: user.as_ref().and_then(|u| u.name.clone()),
            user_real_name: user.as_ref().and_then(|u| u.real_name.clone()),
            user_email: user.as_ref().and_then(|u| u.email.clone()),
            user_is_bot: user.as_ref().map(|u| u.is_bot),
            text,
        })
    }
}

fn is_raw_parent(raw: &RawMessage) -> bool {
    raw.thread_ts.as_deref() == Some(raw.ts.as_str()) && raw.reply_count.unwrap_or(0) > 0
}
