//! On-disk dataset layout
//!
//! ```text
//! <root>/
//!   messages/dt=YYYY-MM-DD/channel=<alias>/data.parquet
//!   users.parquet
//!   issue_tickets/dt=YYYY-MM-DD/data.parquet
//! ```
//!
//! A partition is a single file. `<alias>` is the configured channel name,
//! or `channel_<id>` when only an id was supplied.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::core::constants::{ENTITY_ISSUE_TICKETS, ENTITY_MESSAGES, PARTITION_FILE_NAME, USERS_FILE_NAME};
use crate::data::error::DataError;
use crate::utils::time::{dt_segment, parse_dt_segment};

/// Resolves every partition and file path under one dataset root
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
}

/// One discovered partition leaf
#[derive(Debug, Clone)]
pub struct PartitionEntry {
    /// `messages` or `issue_tickets`; the users table reports as `users`
    pub entity: String,
    pub dt: Option<NaiveDate>,
    pub channel: Option<String>,
    pub path: PathBuf,
    pub bytes: u64,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/messages/dt=…/channel=<alias>/data.parquet`
    pub fn messages_partition(&self, dt: NaiveDate, alias: &str) -> PathBuf {
        self.messages_day_dir(dt)
            .join(format!("channel={alias}"))
            .join(PARTITION_FILE_NAME)
    }

    /// `<root>/messages/dt=…/`
    pub fn messages_day_dir(&self, dt: NaiveDate) -> PathBuf {
        self.root
            .join(ENTITY_MESSAGES)
            .join(format!("dt={}", dt_segment(dt)))
    }

    /// `<root>/users.parquet`
    pub fn users_path(&self) -> PathBuf {
        self.root.join(USERS_FILE_NAME)
    }

    /// `<root>/issue_tickets/dt=…/data.parquet`
    pub fn tickets_partition(&self, dt: NaiveDate) -> PathBuf {
        self.root
            .join(ENTITY_ISSUE_TICKETS)
            .join(format!("dt={}", dt_segment(dt)))
            .join(PARTITION_FILE_NAME)
    }

    /// Resolve a requested channel against a day directory: try the literal
    /// alias, then `channel_<requested>`. Only these two attempts are made.
    pub fn resolve_channel_partition(&self, dt: NaiveDate, requested: &str) -> Option<PathBuf> {
        let literal = self.messages_partition(dt, requested);
        if literal.is_file() {
            return Some(literal);
        }
        let prefixed = self.messages_partition(dt, &format!("channel_{requested}"));
        prefixed.is_file().then_some(prefixed)
    }

    /// All channel partitions present for one day, with their aliases
    pub fn channel_partitions_for_day(&self, dt: NaiveDate) -> Vec<(String, PathBuf)> {
        let mut found = vec![];
        let Ok(entries) = fs::read_dir(self.messages_day_dir(dt)) else {
            return found;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(alias) = name.strip_prefix("channel=") {
                let file = entry.path().join(PARTITION_FILE_NAME);
                if file.is_file() {
                    found.push((alias.to_string(), file));
                }
            }
        }
        found.sort();
        found
    }

    /// Every calendar day in `[start, end]`, inclusive
    pub fn days_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start.iter_days().take_while(|d| *d <= end).collect()
    }

    /// Enumerate every partition leaf plus the users table
    pub fn enumerate_partitions(&self) -> Result<Vec<PartitionEntry>, DataError> {
        let mut entries = vec![];

        let users = self.users_path();
        if users.is_file() {
            entries.push(PartitionEntry {
                entity: "users".to_string(),
                dt: None,
                channel: None,
                bytes: fs::metadata(&users)?.len(),
                path: users,
            });
        }

        for dt_dir in read_subdirs(&self.root.join(ENTITY_MESSAGES)) {
            let Some(dt) = dt_of_dir(&dt_dir) else {
                continue;
            };
            for channel_dir in read_subdirs(&dt_dir) {
                let Some(alias) = segment_value(&channel_dir, "channel=") else {
                    continue;
                };
                let file = channel_dir.join(PARTITION_FILE_NAME);
                if file.is_file() {
                    entries.push(PartitionEntry {
                        entity: ENTITY_MESSAGES.to_string(),
                        dt: Some(dt),
                        channel: Some(alias),
                        bytes: fs::metadata(&file)?.len(),
                        path: file,
                    });
                }
            }
        }

        for dt_dir in read_subdirs(&self.root.join(ENTITY_ISSUE_TICKETS)) {
            let Some(dt) = dt_of_dir(&dt_dir) else {
                continue;
            };
            let file = dt_dir.join(PARTITION_FILE_NAME);
            if file.is_file() {
                entries.push(PartitionEntry {
                    entity: ENTITY_ISSUE_TICKETS.to_string(),
                    dt: Some(dt),
                    channel: None,
                    bytes: fs::metadata(&file)?.len(),
                    path: file,
                });
            }
        }

        entries.sort_by(|a, b| (&a.entity, a.dt, &a.channel).cmp(&(&b.entity, b.dt, &b.channel)));
        Ok(entries)
    }
}

fn read_subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return vec![];
    };
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn segment_value(dir: &Path, prefix: &str) -> Option<String> {
    dir.file_name()?
        .to_string_lossy()
        .strip_prefix(prefix)
        .map(String::from)
}

fn dt_of_dir(dir: &Path) -> Option<NaiveDate> {
    parse_dt_segment(&segment_value(dir, "dt=")?)
}
