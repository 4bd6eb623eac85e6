//! Partition reader
//!
//! Reads one or many `dt=…/channel=…` partitions back into flat rows.
//! Channel aliases fall back from the literal name to `channel_<name>`
//! (two attempts only); missing partitions yield empty results, never
//! errors. Output is always sorted by `(timestamp, message_id)`; this is
//! the only place in the system where order is established.

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, BooleanArray, Int64Array, ListArray, StringArray, StructArray};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::reader::FileReader;
use parquet::file::serialized_reader::SerializedFileReader;

use super::layout::{DatasetLayout, PartitionEntry};
use crate::data::error::DataError;
use crate::data::types::{FileAttachment, MessageRow, Reaction};
use crate::utils::time::parse_rfc3339;

/// One partition leaf with its row count
#[derive(Debug, Clone)]
pub struct PartitionStat {
    pub entry: PartitionEntry,
    pub rows: i64,
}

/// Dataset-wide summary for the `stats` surface
#[derive(Debug, Clone)]
pub struct PartitionInfo {
    pub partitions: Vec<PartitionStat>,
    pub total_rows: i64,
    pub total_bytes: u64,
}

/// Reads message partitions from the dataset
pub struct DatasetReader {
    layout: DatasetLayout,
}

impl DatasetReader {
    pub fn new(layout: DatasetLayout) -> Self {
        Self { layout }
    }

    /// Read one `(channel, dt)` partition. A missing partition is an empty
    /// result.
    pub fn read_channel(&self, channel: &str, dt: NaiveDate) -> Result<Vec<MessageRow>, DataError> {
        self.read_channel_columns(channel, dt, None)
    }

    /// `read_channel` with an optional root-column projection
    pub fn read_channel_columns(
        &self,
        channel: &str,
        dt: NaiveDate,
        columns: Option<&[&str]>,
    ) -> Result<Vec<MessageRow>, DataError> {
        let mut rows = match self.layout.resolve_channel_partition(dt, channel) {
            Some(path) => read_partition(&path, columns)?,
            None => vec![],
        };
        sort_rows(&mut rows);
        Ok(rows)
    }

    /// Read every day in `[start, end]` inclusive, silently skipping days
    /// without a partition.
    pub fn read_channel_range(
        &self,
        channel: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MessageRow>, DataError> {
        self.read_channel_range_columns(channel, start, end, None)
    }

    /// `read_channel_range` with an optional root-column projection, for
    /// cheap scans such as building a user map over a wide window.
    pub fn read_channel_range_columns(
        &self,
        channel: &str,
        start: NaiveDate,
        end: NaiveDate,
        columns: Option<&[&str]>,
    ) -> Result<Vec<MessageRow>, DataError> {
        let mut rows = vec![];
        for dt in DatasetLayout::days_in_range(start, end) {
            if let Some(path) = self.layout.resolve_channel_partition(dt, channel) {
                rows.extend(read_partition(&path, columns)?);
            }
        }
        sort_rows(&mut rows);
        Ok(rows)
    }

    /// Read every channel partition present for one day
    pub fn read_all_channels(&self, dt: NaiveDate) -> Result<Vec<MessageRow>, DataError> {
        let mut rows = vec![];
        for (_alias, path) in self.layout.channel_partitions_for_day(dt) {
            rows.extend(read_partition(&path, None)?);
        }
        sort_rows(&mut rows);
        Ok(rows)
    }

    /// Enumerate partitions with row counts (from file footers, no scan)
    pub fn partition_info(&self) -> Result<PartitionInfo, DataError> {
        let mut partitions = vec![];
        let mut total_rows = 0_i64;
        let mut total_bytes = 0_u64;

        for entry in self.layout.enumerate_partitions()? {
            let rows = count_rows(&entry.path)?;
            total_rows += rows;
            total_bytes += entry.bytes;
            partitions.push(PartitionStat { entry, rows });
        }

        Ok(PartitionInfo {
            partitions,
            total_rows,
            total_bytes,
        })
    }
}

fn sort_rows(rows: &mut [MessageRow]) {
    rows.sort_by(|a, b| {
        (a.timestamp, a.message_id.as_str()).cmp(&(b.timestamp, b.message_id.as_str()))
    });
}

fn count_rows(path: &Path) -> Result<i64, DataError> {
    let reader = SerializedFileReader::new(File::open(path)?)?;
    Ok(reader.metadata().file_metadata().num_rows())
}

// ============================================================================
// ROW DECODING
// ============================================================================

fn read_partition(path: &Path, columns: Option<&[&str]>) -> Result<Vec<MessageRow>, DataError> {
    let file = File::open(path)?;
    let mut builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    if let Some(names) = columns {
        let arrow_schema = builder.schema().clone();
        let indices: Vec<usize> = names
            .iter()
            .filter_map(|name| arrow_schema.index_of(name).ok())
            .collect();
        let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
        builder = builder.with_projection(mask);
    }

    let reader = builder.build()?;
    let mut rows = vec![];
    for batch in reader {
        rows_from_batch(&batch?, &mut rows)?;
    }
    Ok(rows)
}

fn rows_from_batch(batch: &RecordBatch, out: &mut Vec<MessageRow>) -> Result<(), DataError> {
    let strings = |name: &str| -> Option<&StringArray> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
    };
    let bools = |name: &str| -> Option<&BooleanArray> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<BooleanArray>())
    };
    let lists = |name: &str| -> Option<&ListArray> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<ListArray>())
    };

    let message_id = strings("message_id");
    let user_id = strings("user_id");
    let text = strings("text");
    let timestamp = strings("timestamp");
    let thread_ts = strings("thread_ts");
    let is_thread_parent = bools("is_thread_parent");
    let is_thread_reply = bools("is_thread_reply");
    let reply_count = batch
        .column_by_name("reply_count")
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>());
    let user_name = strings("user_name");
    let user_real_name = strings("user_real_name");
    let user_email = strings("user_email");
    let user_is_bot = bools("user_is_bot");
    let issue_keys = lists("issue_keys");
    let has_reactions = bools("has_reactions");
    let has_files = bools("has_files");
    let has_thread = bools("has_thread");
    let reactions = lists("reactions");
    let files = lists("files");

    let required = |name: &'static str| DataError::Schema(format!("column {name} has wrong type"));
    if batch.column_by_name("message_id").is_some() && message_id.is_none() {
        return Err(required("message_id"));
    }

    for i in 0..batch.num_rows() {
        out.push(MessageRow {
            message_id: req_string(message_id, i),
            user_id: opt_string(user_id, i),
            text: req_string(text, i),
            timestamp: timestamp
                .map(|a| parse_rfc3339(a.value(i)))
                .unwrap_or_default(),
            thread_ts: opt_string(thread_ts, i),
            is_thread_parent: req_bool(is_thread_parent, i),
            is_thread_reply: req_bool(is_thread_reply, i),
            reply_count: reply_count.map(|a| a.value(i)).unwrap_or_default(),
            user_name: opt_string(user_name, i),
            user_real_name: opt_string(user_real_name, i),
            user_email: opt_string(user_email, i),
            user_is_bot: user_is_bot.and_then(|a| a.is_valid(i).then(|| a.value(i))),
            issue_keys: issue_keys.map(|a| string_list_at(a, i)).unwrap_or_default(),
            has_reactions: req_bool(has_reactions, i),
            has_files: req_bool(has_files, i),
            has_thread: req_bool(has_thread, i),
            reactions: reactions
                .map(|a| reactions_at(a, i))
                .transpose()?
                .unwrap_or_default(),
            files: files.map(|a| files_at(a, i)).transpose()?.unwrap_or_default(),
        });
    }
    Ok(())
}

fn req_string(col: Option<&StringArray>, i: usize) -> String {
    col.map(|a| a.value(i).to_string()).unwrap_or_default()
}

fn opt_string(col: Option<&StringArray>, i: usize) -> Option<String> {
    col.and_then(|a| a.is_valid(i).then(|| a.value(i).to_string()))
}

fn req_bool(col: Option<&BooleanArray>, i: usize) -> bool {
    col.map(|a| a.value(i)).unwrap_or_default()
}

fn string_list_at(list: &ListArray, i: usize) -> Vec<String> {
    let values = list.value(i);
    let Some(strings) = values.as_any().downcast_ref::<StringArray>() else {
        return vec![];
    };
    strings.iter().flatten().map(String::from).collect()
}

fn reactions_at(list: &ListArray, i: usize) -> Result<Vec<Reaction>, DataError> {
    let values = list.value(i);
    let items = values
        .as_any()
        .downcast_ref::<StructArray>()
        .ok_or_else(|| DataError::Schema("reactions column is not list<struct>".to_string()))?;
    let emoji = struct_strings(items, "emoji")?;
    let count = struct_ints(items, "count")?;
    let users = items
        .column_by_name("users")
        .and_then(|c| c.as_any().downcast_ref::<ListArray>())
        .ok_or_else(|| DataError::Schema("reactions.users is not list<string>".to_string()))?;

    Ok((0..items.len())
        .map(|j| Reaction {
            emoji: emoji.value(j).to_string(),
            count: count.value(j),
            users: string_list_at(users, j),
        })
        .collect())
}

fn files_at(list: &ListArray, i: usize) -> Result<Vec<FileAttachment>, DataError> {
    let values = list.value(i);
    let items = values
        .as_any()
        .downcast_ref::<StructArray>()
        .ok_or_else(|| DataError::Schema("files column is not list<struct>".to_string()))?;
    let id = struct_strings(items, "id")?;
    let name = struct_strings(items, "name")?;
    let mimetype = struct_strings(items, "mimetype")?;
    let url = struct_strings(items, "url")?;
    let size = struct_ints(items, "size")?;

    Ok((0..items.len())
        .map(|j| FileAttachment {
            id: id.value(j).to_string(),
            name: name.value(j).to_string(),
            mimetype: mimetype.value(j).to_string(),
            url: url.value(j).to_string(),
            size: size.value(j),
        })
        .collect())
}

fn struct_strings<'a>(items: &'a StructArray, name: &str) -> Result<&'a StringArray, DataError> {
    items
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| DataError::Schema(format!("struct field {name} is not string")))
}

fn struct_ints<'a>(items: &'a StructArray, name: &str) -> Result<&'a Int64Array, DataError> {
    items
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| DataError::Schema(format!("struct field {name} is not int64")))
}
