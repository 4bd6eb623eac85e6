//! Partition writer
//!
//! One Snappy-compressed Parquet file per call, at the partition path the
//! layout dictates. Writes go to a temp file in the same directory and are
//! renamed into place, so a crash never leaves a truncated partition.
//! Re-invoking with the same `(entity, dt, channel)` replaces the file.
//!
//! Rows are sorted before encoding (messages by `(timestamp, message_id)`,
//! users by id, tickets by key) so writing the same batch twice produces a
//! byte-identical file.

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Int64Array, ListArray, MapArray, StringArray, StructArray,
};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{FieldRef, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use super::layout::DatasetLayout;
use super::schema;
use crate::data::error::DataError;
use crate::data::types::{ChannelRef, ChatMessage, IssueTicket, UserRecord};
use crate::utils::time::{dt_segment, format_rfc3339};

/// Writes entity batches into the partitioned dataset
pub struct DatasetWriter {
    layout: DatasetLayout,
}

impl DatasetWriter {
    pub fn new(layout: DatasetLayout) -> Self {
        Self { layout }
    }

    /// Write one `(dt, channel)` message partition. Empty input writes
    /// nothing and returns `Ok(None)`.
    pub fn save_messages(
        &self,
        channel: &ChannelRef,
        dt: NaiveDate,
        messages: &[ChatMessage],
    ) -> Result<Option<PathBuf>, DataError> {
        if messages.is_empty() {
            return Ok(None);
        }

        let mut seen = HashSet::with_capacity(messages.len());
        for m in messages {
            if !seen.insert(m.message_id.as_str()) {
                return Err(DataError::Schema(format!(
                    "duplicate message_id {} in partition dt={} channel={}",
                    m.message_id,
                    dt_segment(dt),
                    channel.alias()
                )));
            }
            if m.dt() != dt {
                return Err(DataError::Schema(format!(
                    "message {} dated {} routed to partition dt={}",
                    m.message_id,
                    dt_segment(m.dt()),
                    dt_segment(dt)
                )));
            }
        }

        let mut sorted: Vec<&ChatMessage> = messages.iter().collect();
        sorted.sort_by(|a, b| {
            (a.timestamp, a.message_id.as_str()).cmp(&(b.timestamp, b.message_id.as_str()))
        });

        let batch = messages_batch(&sorted)?;
        let path = self.layout.messages_partition(dt, &channel.alias());
        write_partition(&path, batch)?;
        tracing::debug!(
            dt = %dt_segment(dt),
            channel = %channel.alias(),
            rows = sorted.len(),
            "Wrote message partition"
        );
        Ok(Some(path))
    }

    /// Write the unpartitioned users table; `cached_at` is the current UTC
    /// instant, uniform within the batch.
    pub fn save_users(&self, users: &[UserRecord]) -> Result<Option<PathBuf>, DataError> {
        self.save_users_at(users, Utc::now())
    }

    /// Deterministic variant with an explicit batch timestamp
    pub fn save_users_at(
        &self,
        users: &[UserRecord],
        cached_at: DateTime<Utc>,
    ) -> Result<Option<PathBuf>, DataError> {
        if users.is_empty() {
            return Ok(None);
        }

        let mut sorted: Vec<&UserRecord> = users.iter().collect();
        sorted.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        let batch = users_batch(&sorted, cached_at)?;
        let path = self.layout.users_path();
        write_partition(&path, batch)?;
        tracing::debug!(rows = sorted.len(), "Wrote users table");
        Ok(Some(path))
    }

    /// Write one issue-ticket partition; `cached_at` is writer-assigned,
    /// uniform within the batch.
    pub fn save_issue_tickets(
        &self,
        dt: NaiveDate,
        tickets: &[IssueTicket],
    ) -> Result<Option<PathBuf>, DataError> {
        self.save_issue_tickets_at(dt, tickets, Utc::now())
    }

    /// Deterministic variant with an explicit batch timestamp
    pub fn save_issue_tickets_at(
        &self,
        dt: NaiveDate,
        tickets: &[IssueTicket],
        cached_at: DateTime<Utc>,
    ) -> Result<Option<PathBuf>, DataError> {
        if tickets.is_empty() {
            return Ok(None);
        }

        let mut sorted: Vec<&IssueTicket> = tickets.iter().collect();
        sorted.sort_by(|a, b| a.ticket_id.cmp(&b.ticket_id));

        let batch = tickets_batch(&sorted, cached_at)?;
        let path = self.layout.tickets_partition(dt);
        write_partition(&path, batch)?;
        tracing::debug!(dt = %dt_segment(dt), rows = sorted.len(), "Wrote issue ticket partition");
        Ok(Some(path))
    }
}

// ============================================================================
// BATCH CONSTRUCTION
// ============================================================================

fn messages_batch(messages: &[&ChatMessage]) -> Result<RecordBatch, DataError> {
    let schema = schema::messages_schema();

    let message_id = StringArray::from_iter_values(messages.iter().map(|m| &m.message_id));
    let user_id: StringArray = messages.iter().map(|m| m.user_id.as_deref()).collect();
    let text = StringArray::from_iter_values(messages.iter().map(|m| &m.text));
    let timestamp =
        StringArray::from_iter_values(messages.iter().map(|m| format_rfc3339(m.timestamp)));
    let thread_ts: StringArray = messages.iter().map(|m| m.thread_ts.as_deref()).collect();
    let is_parent = BooleanArray::from(
        messages
            .iter()
            .map(|m| m.is_thread_parent())
            .collect::<Vec<_>>(),
    );
    let is_reply = BooleanArray::from(
        messages
            .iter()
            .map(|m| m.is_thread_reply())
            .collect::<Vec<_>>(),
    );
    let reply_count = Int64Array::from(messages.iter().map(|m| m.reply_count).collect::<Vec<_>>());
    let user_name: StringArray = messages.iter().map(|m| m.user_name.as_deref()).collect();
    let user_real_name: StringArray = messages
        .iter()
        .map(|m| m.user_real_name.as_deref())
        .collect();
    let user_email: StringArray = messages.iter().map(|m| m.user_email.as_deref()).collect();
    let user_is_bot =
        BooleanArray::from(messages.iter().map(|m| m.user_is_bot).collect::<Vec<_>>());
    let issue_keys = string_list_array(
        schema::string_list_item(),
        messages.iter().map(|m| m.issue_keys.as_slice()),
    )?;
    let has_reactions = BooleanArray::from(
        messages
            .iter()
            .map(|m| m.has_reactions())
            .collect::<Vec<_>>(),
    );
    let has_files =
        BooleanArray::from(messages.iter().map(|m| m.has_files()).collect::<Vec<_>>());
    // Reserved column, always false in current writers
    let has_thread = BooleanArray::from(vec![false; messages.len()]);
    let reactions = reactions_array(messages)?;
    let files = files_array(messages)?;

    let columns: Vec<ArrayRef> = vec![
        Arc::new(message_id),
        Arc::new(user_id),
        Arc::new(text),
        Arc::new(timestamp),
        Arc::new(thread_ts),
        Arc::new(is_parent),
        Arc::new(is_reply),
        Arc::new(reply_count),
        Arc::new(user_name),
        Arc::new(user_real_name),
        Arc::new(user_email),
        Arc::new(user_is_bot),
        Arc::new(issue_keys),
        Arc::new(has_reactions),
        Arc::new(has_files),
        Arc::new(has_thread),
        Arc::new(reactions),
        Arc::new(files),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

fn users_batch(users: &[&UserRecord], cached_at: DateTime<Utc>) -> Result<RecordBatch, DataError> {
    let schema = schema::users_schema();
    let cached = format_rfc3339(cached_at);

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            users.iter().map(|u| &u.user_id),
        )),
        Arc::new(users.iter().map(|u| u.name.as_deref()).collect::<StringArray>()),
        Arc::new(
            users
                .iter()
                .map(|u| u.real_name.as_deref())
                .collect::<StringArray>(),
        ),
        Arc::new(
            users
                .iter()
                .map(|u| u.email.as_deref())
                .collect::<StringArray>(),
        ),
        Arc::new(BooleanArray::from(
            users.iter().map(|u| u.is_bot).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from_iter_values(
            users.iter().map(|_| cached.as_str()),
        )),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

fn tickets_batch(
    tickets: &[&IssueTicket],
    cached_at: DateTime<Utc>,
) -> Result<RecordBatch, DataError> {
    let schema = schema::tickets_schema();
    let cached = format_rfc3339(cached_at);

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            tickets.iter().map(|t| &t.ticket_id),
        )),
        Arc::new(StringArray::from_iter_values(
            tickets.iter().map(|t| &t.summary),
        )),
        Arc::new(StringArray::from_iter_values(
            tickets.iter().map(|t| &t.status),
        )),
        Arc::new(StringArray::from_iter_values(
            tickets.iter().map(|t| &t.priority),
        )),
        Arc::new(StringArray::from_iter_values(
            tickets.iter().map(|t| &t.issue_type),
        )),
        Arc::new(StringArray::from_iter_values(
            tickets.iter().map(|t| &t.assignee),
        )),
        Arc::new(StringArray::from_iter_values(
            tickets.iter().map(|t| format_rfc3339(t.created)),
        )),
        Arc::new(StringArray::from_iter_values(
            tickets.iter().map(|t| format_rfc3339(t.updated)),
        )),
        Arc::new(
            tickets
                .iter()
                .map(|t| t.due_date.map(|d| d.to_string()))
                .collect::<StringArray>(),
        ),
        Arc::new(Int64Array::from(
            tickets.iter().map(|t| t.story_points).collect::<Vec<_>>(),
        )),
        Arc::new(string_list_array(
            schema::string_list_item(),
            tickets.iter().map(|t| t.blocks.as_slice()),
        )?),
        Arc::new(string_list_array(
            schema::string_list_item(),
            tickets.iter().map(|t| t.blocked_by.as_slice()),
        )?),
        Arc::new(string_list_array(
            schema::string_list_item(),
            tickets.iter().map(|t| t.depends_on.as_slice()),
        )?),
        Arc::new(string_list_array(
            schema::string_list_item(),
            tickets.iter().map(|t| t.related.as_slice()),
        )?),
        Arc::new(string_list_array(
            schema::string_list_item(),
            tickets.iter().map(|t| t.components.as_slice()),
        )?),
        Arc::new(string_list_array(
            schema::string_list_item(),
            tickets.iter().map(|t| t.labels.as_slice()),
        )?),
        Arc::new(string_list_array(
            schema::string_list_item(),
            tickets.iter().map(|t| t.fix_versions.as_slice()),
        )?),
        Arc::new(
            tickets
                .iter()
                .map(|t| t.project.as_deref())
                .collect::<StringArray>(),
        ),
        Arc::new(
            tickets
                .iter()
                .map(|t| t.team.as_deref())
                .collect::<StringArray>(),
        ),
        Arc::new(
            tickets
                .iter()
                .map(|t| t.epic_link.as_deref())
                .collect::<StringArray>(),
        ),
        Arc::new(
            tickets
                .iter()
                .map(|t| t.resolution.as_deref())
                .collect::<StringArray>(),
        ),
        Arc::new(comments_array(tickets)?),
        Arc::new(Int64Array::from(
            tickets.iter().map(|t| t.total_comments).collect::<Vec<_>>(),
        )),
        Arc::new(sprints_array(tickets)?),
        Arc::new(StringArray::from_iter_values(
            tickets.iter().map(|_| cached.as_str()),
        )),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

// ============================================================================
// NESTED COLUMN ASSEMBLY
// ============================================================================

/// Build a `list<string>` column from per-row slices.
///
/// Assembled by hand (offsets + flattened values) against the shared item
/// field so the resulting DataType matches the schema exactly.
fn string_list_array<'a>(
    item: FieldRef,
    lists: impl Iterator<Item = &'a [String]> + Clone,
) -> Result<ListArray, DataError> {
    let lengths = lists.clone().map(<[String]>::len);
    let values = StringArray::from_iter_values(lists.flat_map(|l| l.iter()));
    Ok(ListArray::try_new(
        item,
        OffsetBuffer::from_lengths(lengths),
        Arc::new(values),
        None,
    )?)
}

fn reactions_array(messages: &[&ChatMessage]) -> Result<ListArray, DataError> {
    let lengths: Vec<usize> = messages.iter().map(|m| m.reactions.len()).collect();
    let all: Vec<_> = messages.iter().flat_map(|m| m.reactions.iter()).collect();

    let emoji = StringArray::from_iter_values(all.iter().map(|r| &r.emoji));
    let count = Int64Array::from(all.iter().map(|r| r.count).collect::<Vec<_>>());
    let users = string_list_array(
        schema::string_list_item(),
        all.iter().map(|r| r.users.as_slice()),
    )?;

    let items = StructArray::try_new(
        schema::reaction_fields(),
        vec![Arc::new(emoji), Arc::new(count), Arc::new(users)],
        None,
    )?;
    Ok(ListArray::try_new(
        schema::reactions_item(),
        OffsetBuffer::from_lengths(lengths),
        Arc::new(items),
        None,
    )?)
}

fn files_array(messages: &[&ChatMessage]) -> Result<ListArray, DataError> {
    let lengths: Vec<usize> = messages.iter().map(|m| m.files.len()).collect();
    let all: Vec<_> = messages.iter().flat_map(|m| m.files.iter()).collect();

    let items = StructArray::try_new(
        schema::file_fields(),
        vec![
            Arc::new(StringArray::from_iter_values(all.iter().map(|f| &f.id))),
            Arc::new(StringArray::from_iter_values(all.iter().map(|f| &f.name))),
            Arc::new(StringArray::from_iter_values(
                all.iter().map(|f| &f.mimetype),
            )),
            Arc::new(StringArray::from_iter_values(all.iter().map(|f| &f.url))),
            Arc::new(Int64Array::from(
                all.iter().map(|f| f.size).collect::<Vec<_>>(),
            )),
        ],
        None,
    )?;
    Ok(ListArray::try_new(
        schema::files_item(),
        OffsetBuffer::from_lengths(lengths),
        Arc::new(items),
        None,
    )?)
}

/// Build the `comments` map column (`author -> count`).
///
/// BTreeMap iteration yields entries in key order, so repeated writes of
/// the same batch stay byte-identical.
fn comments_array(tickets: &[&IssueTicket]) -> Result<MapArray, DataError> {
    let lengths: Vec<usize> = tickets.iter().map(|t| t.comments.len()).collect();
    let keys = StringArray::from_iter_values(tickets.iter().flat_map(|t| t.comments.keys()));
    let counts = Int64Array::from(
        tickets
            .iter()
            .flat_map(|t| t.comments.values().copied())
            .collect::<Vec<_>>(),
    );

    let entries = StructArray::try_new(
        schema::comments_entry_fields(),
        vec![Arc::new(keys), Arc::new(counts)],
        None,
    )?;
    Ok(MapArray::try_new(
        schema::comments_entries(),
        OffsetBuffer::from_lengths(lengths),
        entries,
        None,
        false,
    )?)
}

fn sprints_array(tickets: &[&IssueTicket]) -> Result<ListArray, DataError> {
    let lengths: Vec<usize> = tickets.iter().map(|t| t.sprints.len()).collect();
    let all: Vec<_> = tickets.iter().flat_map(|t| t.sprints.iter()).collect();

    let items = StructArray::try_new(
        schema::sprint_fields(),
        vec![
            Arc::new(StringArray::from_iter_values(all.iter().map(|s| &s.name))),
            Arc::new(StringArray::from_iter_values(all.iter().map(|s| &s.state))),
        ],
        None,
    )?;
    Ok(ListArray::try_new(
        schema::sprints_item(),
        OffsetBuffer::from_lengths(lengths),
        Arc::new(items),
        None,
    )?)
}

// ============================================================================
// FILE OUTPUT
// ============================================================================

/// Encode one batch to `<path>.tmp` with Snappy compression, then rename
/// into place.
fn write_partition(path: &Path, batch: RecordBatch) -> Result<(), DataError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("parquet.tmp");

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let file = File::create(&tmp)?;
    let schema: SchemaRef = batch.schema();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    fs::rename(&tmp, path)?;
    Ok(())
}
