//! Chat message types
//!
//! `ChatMessage` is the ingest-side value produced by the fetcher; its
//! derived flags are computed from the base fields. `MessageRow` is the
//! storage-side row with the flags materialized exactly as written, so the
//! read path never re-derives them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An emoji reaction attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub count: i64,
    pub users: Vec<String>,
}

/// A file attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub id: String,
    pub name: String,
    pub mimetype: String,
    pub url: String,
    pub size: i64,
}

/// A chat message after conversion from the wire format.
///
/// `message_id` is the platform's native timestamp string
/// (`<seconds>.<microseconds>`), unique within a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    /// Absent for some system messages
    pub user_id: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// When present: the id of the thread's parent message
    pub thread_ts: Option<String>,
    /// 0 unless this message is a thread parent
    pub reply_count: i64,
    pub reactions: Vec<Reaction>,
    pub files: Vec<FileAttachment>,
    /// Issue keys extracted from `text`, deduped, first-occurrence order
    pub issue_keys: Vec<String>,
    // Author identity joined from the user cache; absent when the lookup
    // failed or the message has no author.
    pub user_name: Option<String>,
    pub user_real_name: Option<String>,
    pub user_email: Option<String>,
    pub user_is_bot: Option<bool>,
}

impl ChatMessage {
    /// A parent is a message whose `thread_ts` equals its own id and which
    /// has at least one reply.
    pub fn is_thread_parent(&self) -> bool {
        self.thread_ts.as_deref() == Some(self.message_id.as_str()) && self.reply_count > 0
    }

    /// A reply points at some other message's id
    pub fn is_thread_reply(&self) -> bool {
        match self.thread_ts.as_deref() {
            Some(parent) => parent != self.message_id,
            None => false,
        }
    }

    pub fn has_reactions(&self) -> bool {
        !self.reactions.is_empty()
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// UTC calendar date of the message itself; this is the partition date
    pub fn dt(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// A flat row read back from a message partition.
///
/// Carries the materialized flags as stored. `has_thread` is a reserved
/// column, always false in current writers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageRow {
    pub message_id: String,
    pub user_id: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub thread_ts: Option<String>,
    pub is_thread_parent: bool,
    pub is_thread_reply: bool,
    pub reply_count: i64,
    pub user_name: Option<String>,
    pub user_real_name: Option<String>,
    pub user_email: Option<String>,
    pub user_is_bot: Option<bool>,
    pub issue_keys: Vec<String>,
    pub has_reactions: bool,
    pub has_files: bool,
    pub has_thread: bool,
    pub reactions: Vec<Reaction>,
    pub files: Vec<FileAttachment>,
}

impl MessageRow {
    /// Author display name: `real_name`, else `name`, else the raw id
    pub fn display_name(&self) -> &str {
        self.user_real_name
            .as_deref()
            .or(self.user_name.as_deref())
            .or(self.user_id.as_deref())
            .unwrap_or("unknown")
    }
}
