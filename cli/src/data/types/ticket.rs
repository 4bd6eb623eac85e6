//! Issue-tracker ticket types

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A sprint the ticket belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprint {
    pub name: String,
    pub state: String,
}

/// Issue-tracker ticket metadata fetched during enrichment.
///
/// Dependency lists (`blocks`, `blocked_by`, ...) hold raw ticket ids; the
/// graph may contain cycles and is never resolved transitively at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueTicket {
    /// e.g. `ABC-123`
    pub ticket_id: String,
    pub summary: String,
    pub status: String,
    pub priority: String,
    pub issue_type: String,
    pub assignee: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub story_points: Option<i64>,
    pub blocks: Vec<String>,
    pub blocked_by: Vec<String>,
    pub depends_on: Vec<String>,
    pub related: Vec<String>,
    pub components: Vec<String>,
    pub labels: Vec<String>,
    pub fix_versions: Vec<String>,
    pub project: Option<String>,
    pub team: Option<String>,
    pub epic_link: Option<String>,
    pub resolution: Option<String>,
    /// Comment count per author
    pub comments: BTreeMap<String, i64>,
    pub total_comments: i64,
    pub sprints: Vec<Sprint>,
}
