//! Issue-tracker REST client
//!
//! Fetches single-ticket metadata over the JIRA-shaped REST API with basic
//! auth. Link fields come from `issuelinks`: outward "Blocks" edges populate
//! `blocks`, inward ones `blocked_by`; "Depends" links land in `depends_on`
//! and every other link type in `related`. The dependency graph may contain
//! cycles; ids are stored verbatim and never resolved transitively.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::core::constants::{
    ENV_ISSUE_SERVER, ENV_ISSUE_TOKEN, ENV_ISSUE_USER, HTTP_TIMEOUT_SECS,
};
use crate::data::error::DataError;
use crate::data::types::{IssueTicket, Sprint};
use crate::utils::time::parse_rfc3339;

/// Common custom-field ids on cloud instances; parsing tolerates absence
const FIELD_SPRINTS: &str = "customfield_10020";
const FIELD_EPIC_LINK: &str = "customfield_10014";
const FIELD_STORY_POINTS: &str = "customfield_10016";
const FIELD_TEAM: &str = "customfield_10001";

/// Narrow capability set of the issue tracker
#[async_trait]
pub trait IssueApi: Send + Sync {
    /// Fetch one ticket by key (e.g. `ABC-123`)
    async fn ticket(&self, key: &str) -> Result<IssueTicket, DataError>;
}

/// Issue tracker client over HTTPS with basic auth
pub struct JiraHttpClient {
    http: reqwest::Client,
    server: String,
    user: String,
    token: String,
}

impl JiraHttpClient {
    /// Construct from environment (`ISSUE_USER`, `ISSUE_TOKEN`) and the
    /// resolved server URL (config file overrides `ISSUE_SERVER`).
    pub fn from_env(server_override: Option<&str>) -> Result<Self, DataError> {
        let server = match server_override {
            Some(s) => s.to_string(),
            None => std::env::var(ENV_ISSUE_SERVER).map_err(|_| {
                DataError::Config(format!(
                    "Issue tracker server not configured; set {ENV_ISSUE_SERVER} or jira.server"
                ))
            })?,
        };
        let user = std::env::var(ENV_ISSUE_USER)
            .map_err(|_| DataError::Config(format!("{ENV_ISSUE_USER} is not set")))?;
        let token = std::env::var(ENV_ISSUE_TOKEN)
            .map_err(|_| DataError::Config(format!("{ENV_ISSUE_TOKEN} is not set")))?;
        Self::new(server, user, token)
    }

    pub fn new(server: String, user: String, token: String) -> Result<Self, DataError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            server: server.trim_end_matches('/').to_string(),
            user,
            token,
        })
    }
}

#[async_trait]
impl IssueApi for JiraHttpClient {
    async fn ticket(&self, key: &str) -> Result<IssueTicket, DataError> {
        let url = format!("{}/rest/api/2/issue/{}", self.server, key);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.user, Some(&self.token))
            .send()
            .await?;

        let status = response.status();
        match status {
            s if s.is_success() => {}
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(DataError::Retryable {
                    status: status.as_u16(),
                    retry_after: None,
                });
            }
            s if s.is_server_error() => {
                return Err(DataError::Retryable {
                    status: status.as_u16(),
                    retry_after: None,
                });
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(DataError::Auth {
                    status: status.as_u16(),
                    detail: format!("issue tracker rejected credentials for {key}"),
                });
            }
            StatusCode::NOT_FOUND => return Err(DataError::not_found(format!("ticket={key}"))),
            _ => {
                return Err(DataError::Fatal(format!(
                    "ticket {key} returned unexpected status {status}"
                )));
            }
        }

        let body: Value = response.json().await?;
        Ok(parse_ticket(key, &body))
    }
}

/// Map the raw issue payload onto `IssueTicket`. Absent fields become
/// empty/None; parsing never fails on a malformed optional.
fn parse_ticket(key: &str, body: &Value) -> IssueTicket {
    let fields = body.get("fields").cloned().unwrap_or(Value::Null);

    let (blocks, blocked_by, depends_on, related) = parse_links(&fields);
    let (comments, total_comments) = parse_comments(&fields);

    IssueTicket {
        ticket_id: body
            .get("key")
            .and_then(Value::as_str)
            .unwrap_or(key)
            .to_string(),
        summary: str_field(&fields, &["summary"]).unwrap_or_default(),
        status: str_field(&fields, &["status", "name"]).unwrap_or_default(),
        priority: str_field(&fields, &["priority", "name"]).unwrap_or_default(),
        issue_type: str_field(&fields, &["issuetype", "name"]).unwrap_or_default(),
        assignee: str_field(&fields, &["assignee", "displayName"]).unwrap_or_default(),
        created: str_field(&fields, &["created"])
            .map(|s| parse_issue_timestamp(&s))
            .unwrap_or(chrono::DateTime::UNIX_EPOCH),
        updated: str_field(&fields, &["updated"])
            .map(|s| parse_issue_timestamp(&s))
            .unwrap_or(chrono::DateTime::UNIX_EPOCH),
        due_date: str_field(&fields, &["duedate"])
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        story_points: fields
            .get(FIELD_STORY_POINTS)
            .and_then(Value::as_f64)
            .map(|p| p.round() as i64),
        blocks,
        blocked_by,
        depends_on,
        related,
        components: name_list(&fields, "components"),
        labels: fields
            .get("labels")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        fix_versions: name_list(&fields, "fixVersions"),
        project: str_field(&fields, &["project", "key"]),
        team: fields
            .get(FIELD_TEAM)
            .and_then(|t| t.get("name"))
            .and_then(Value::as_str)
            .map(String::from),
        epic_link: fields
            .get(FIELD_EPIC_LINK)
            .and_then(Value::as_str)
            .map(String::from),
        resolution: str_field(&fields, &["resolution", "name"]),
        comments,
        total_comments,
        sprints: parse_sprints(&fields),
    }
}

/// The tracker emits `2025-10-01T08:00:00.000+0000`, which is not valid
/// RFC 3339 (no colon in the offset); try that shape first.
fn parse_issue_timestamp(s: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.3f%z")
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| parse_rfc3339(s))
}

fn str_field(fields: &Value, path: &[&str]) -> Option<String> {
    let mut current = fields;
    for segment in path {
        current = current.get(segment)?;
    }
    current.as_str().filter(|s| !s.is_empty()).map(String::from)
}

fn name_list(fields: &Value, key: &str) -> Vec<String> {
    fields
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.get("name").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_links(fields: &Value) -> (Vec<String>, Vec<String>, Vec<String>, Vec<String>) {
    let mut blocks = vec![];
    let mut blocked_by = vec![];
    let mut depends_on = vec![];
    let mut related = vec![];

    let Some(links) = fields.get("issuelinks").and_then(Value::as_array) else {
        return (blocks, blocked_by, depends_on, related);
    };

    for link in links {
        let link_type = link
            .get("type")
            .and_then(|t| t.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let outward = link
            .get("outwardIssue")
            .and_then(|i| i.get("key"))
            .and_then(Value::as_str);
        let inward = link
            .get("inwardIssue")
            .and_then(|i| i.get("key"))
            .and_then(Value::as_str);

        match link_type {
            "Blocks" => {
                if let Some(key) = outward {
                    blocks.push(key.to_string());
                }
                if let Some(key) = inward {
                    blocked_by.push(key.to_string());
                }
            }
            t if t.starts_with("Depend") => {
                if let Some(key) = outward.or(inward) {
                    depends_on.push(key.to_string());
                }
            }
            _ => {
                if let Some(key) = outward.or(inward) {
                    related.push(key.to_string());
                }
            }
        }
    }

    (blocks, blocked_by, depends_on, related)
}

fn parse_comments(fields: &Value) -> (BTreeMap<String, i64>, i64) {
    let mut by_author = BTreeMap::new();
    let Some(comment) = fields.get("comment") else {
        return (by_author, 0);
    };
    let total = comment.get("total").and_then(Value::as_i64).unwrap_or(0);
    if let Some(entries) = comment.get("comments").and_then(Value::as_array) {
        for entry in entries {
            let author = entry
                .get("author")
                .and_then(|a| a.get("displayName"))
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            *by_author.entry(author.to_string()).or_insert(0) += 1;
        }
    }
    (by_author, total)
}

fn parse_sprints(fields: &Value) -> Vec<Sprint> {
    fields
        .get(FIELD_SPRINTS)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| {
                    let name = v.get("name").and_then(Value::as_str)?;
                    let state = v.get("state").and_then(Value::as_str).unwrap_or("unknown");
                    Some(Sprint {
                        name: name.to_string(),
                        state: state.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
