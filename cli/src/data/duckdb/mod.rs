//! Embedded analytical engine over the Parquet dataset
//!
//! The `query` surface delegates SQL to DuckDB: an in-memory connection
//! with one view per entity, each backed by `read_parquet` over the
//! dataset glob with hive partitioning, so `dt` and `channel` are exposed
//! as queryable columns. Views are only registered for entities that have
//! at least one file on disk.

use std::fmt;

use duckdb::Connection;
use duckdb::types::Value;
use serde_json::{Map, json};

use crate::core::constants::{ENTITY_ISSUE_TICKETS, ENTITY_MESSAGES, PARTITION_FILE_NAME};
use crate::data::error::DataError;
use crate::data::parquet::DatasetLayout;
use crate::utils::string::csv_escape;

/// Output rendering for query results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Columns and JSON-typed cells of one query execution
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// SQL engine bound to one dataset root
pub struct QueryEngine {
    conn: Connection,
    views: Vec<&'static str>,
}

impl QueryEngine {
    /// Open an in-memory engine and register entity views for whatever
    /// exists under the dataset root.
    pub fn open(layout: &DatasetLayout) -> Result<Self, DataError> {
        let conn = Connection::open_in_memory()?;
        let mut views = vec![];
        let root = layout.root().display().to_string().replace('\'', "''");

        let partitions = layout.enumerate_partitions()?;
        let has_messages = partitions.iter().any(|p| p.entity == ENTITY_MESSAGES);
        if has_messages {
            conn.execute_batch(&format!(
                "CREATE VIEW messages AS \
                 SELECT * FROM read_parquet('{root}/{ENTITY_MESSAGES}/*/*/{PARTITION_FILE_NAME}', hive_partitioning=true)"
            ))?;
            views.push("messages");
        }

        if layout.users_path().is_file() {
            conn.execute_batch(&format!(
                "CREATE VIEW users AS SELECT * FROM read_parquet('{root}/users.parquet')"
            ))?;
            views.push("users");
        }

        let has_tickets = partitions.iter().any(|p| p.entity == ENTITY_ISSUE_TICKETS);
        if has_tickets {
            conn.execute_batch(&format!(
                "CREATE VIEW issue_tickets AS \
                 SELECT * FROM read_parquet('{root}/{ENTITY_ISSUE_TICKETS}/*/{PARTITION_FILE_NAME}', hive_partitioning=true)"
            ))?;
            views.push("issue_tickets");
        }

        tracing::debug!(views = ?views, "Query engine ready");
        Ok(Self { conn, views })
    }

    /// Entity views registered at open time
    pub fn views(&self) -> &[&'static str] {
        &self.views
    }

    /// Execute one statement and collect the full result set
    pub fn run(&self, sql: &str) -> Result<QueryResult, DataError> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut raw: Vec<Vec<Value>> = vec![];
        {
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let stmt_ref: &duckdb::Statement<'_> = row.as_ref();
                let mut record = Vec::with_capacity(stmt_ref.column_count());
                for i in 0..stmt_ref.column_count() {
                    record.push(row.get::<_, Value>(i)?);
                }
                raw.push(record);
            }
        }
        // The result schema is available once the statement has executed
        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|c| c.to_string())
            .collect();
        let rows = raw
            .into_iter()
            .map(|record| record.into_iter().map(value_to_json).collect())
            .collect();
        Ok(QueryResult { columns, rows })
    }
}

// ============================================================================
// RENDERING
// ============================================================================

/// Render a result set in the requested format
pub fn render(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => render_table(result),
        OutputFormat::Json => render_json(result),
        OutputFormat::Csv => render_csv(result),
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_table(result: &QueryResult) -> String {
    if result.columns.is_empty() {
        return "(no result)\n".to_string();
    }
    let rendered: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(String::len).collect();
    for row in &rendered {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let rule: String = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let format_row = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!(" {c:<w$} "))
            .collect::<Vec<_>>()
            .join("|")
    };

    let mut out = String::new();
    out.push_str(&format_row(&result.columns));
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    for row in &rendered {
        out.push_str(&format_row(row));
        out.push('\n');
    }
    out.push_str(&format!(
        "({} row{})\n",
        result.rows.len(),
        if result.rows.len() == 1 { "" } else { "s" }
    ));
    out
}

fn render_json(result: &QueryResult) -> String {
    let objects: Vec<serde_json::Value> = result
        .rows
        .iter()
        .map(|row| {
            let mut obj = Map::new();
            for (name, value) in result.columns.iter().zip(row) {
                obj.insert(name.clone(), value.clone());
            }
            serde_json::Value::Object(obj)
        })
        .collect();
    serde_json::to_string_pretty(&objects).unwrap_or_else(|_| "[]".to_string())
}

fn render_csv(result: &QueryResult) -> String {
    let mut out = String::new();
    out.push_str(
        &result
            .columns
            .iter()
            .map(|c| csv_escape(c))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');
    for row in &result.rows {
        out.push_str(
            &row.iter()
                .map(|v| csv_escape(&cell_text(v)))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');
    }
    out
}

// ============================================================================
// VALUE CONVERSION
// ============================================================================

fn value_to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => json!(b),
        Value::TinyInt(v) => json!(v),
        Value::SmallInt(v) => json!(v),
        Value::Int(v) => json!(v),
        Value::BigInt(v) => json!(v),
        Value::HugeInt(v) => json!(v.to_string()),
        Value::UTinyInt(v) => json!(v),
        Value::USmallInt(v) => json!(v),
        Value::UInt(v) => json!(v),
        Value::UBigInt(v) => json!(v),
        Value::Float(v) => json!(v),
        Value::Double(v) => json!(v),
        Value::Text(s) => json!(s),
        Value::Enum(s) => json!(s),
        Value::List(values) => {
            serde_json::Value::Array(values.into_iter().map(value_to_json).collect())
        }
        other => json!(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QueryResult {
        QueryResult {
            columns: vec!["channel".to_string(), "n".to_string()],
            rows: vec![
                vec![json!("eng"), json!(42)],
                vec![json!("ops, misc"), json!(7)],
            ],
        }
    }

    #[test]
    fn test_render_table() {
        let out = render(&sample(), OutputFormat::Table);
        assert!(out.contains("channel"));
        assert!(out.contains("eng"));
        assert!(out.ends_with("(2 rows)\n"));
    }

    #[test]
    fn test_render_json() {
        let out = render(&sample(), OutputFormat::Json);
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["channel"], "eng");
        assert_eq!(parsed[0]["n"], 42);
    }

    #[test]
    fn test_render_csv_escapes_commas() {
        let out = render(&sample(), OutputFormat::Csv);
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("channel,n"));
        assert_eq!(lines.next(), Some("eng,42"));
        assert_eq!(lines.next(), Some("\"ops, misc\",7"));
    }

    #[test]
    fn test_engine_without_dataset_has_no_views() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = QueryEngine::open(&DatasetLayout::new(tmp.path())).unwrap();
        assert!(engine.views().is_empty());
        // Plain SQL still works without any registered view
        let result = engine.run("SELECT 1 + 1 AS two").unwrap();
        assert_eq!(result.columns, vec!["two"]);
        assert_eq!(result.rows[0][0], json!(2));
    }
}
