//! Command-line interface

use clap::{Parser, Subcommand};

use chrono::NaiveDate;
use std::path::PathBuf;

use super::constants::{ENV_CACHE_PATH, ENV_CONFIG};
use crate::data::duckdb::OutputFormat;

#[derive(Parser)]
#[command(name = "threadvault")]
#[command(version, about = "Chat workspace archive and analytics", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Dataset root directory
    #[arg(long, global = true, env = ENV_CACHE_PATH)]
    pub cache_path: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Fetch messages and write partitions
    Cache {
        /// Channel id to ingest (repeatable; default: config file channels)
        #[arg(long = "channel")]
        channels: Vec<String>,

        /// Lookback window in days
        #[arg(long, default_value_t = 0)]
        days: i64,

        /// Additional lookback hours
        #[arg(long, default_value_t = 0)]
        hours: i64,

        /// Ingest one UTC calendar day instead of a lookback window
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        /// Fetch issue-tracker metadata for mentioned keys
        #[arg(long)]
        enrich_tickets: bool,
    },

    /// Reconstruct threads for a channel and print a readable view
    View {
        /// Channel name or id
        #[arg(long)]
        channel: String,

        /// Single UTC calendar day
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        /// First day of an inclusive range
        #[arg(long, value_parser = parse_date)]
        start_date: Option<NaiveDate>,

        /// Last day of an inclusive range
        #[arg(long, value_parser = parse_date)]
        end_date: Option<NaiveDate>,

        /// Write the view to a file instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Enumerate partitions and summarize the dataset
    Stats,

    /// Run SQL over the dataset via the embedded analytical engine
    Query {
        /// SQL statement to execute
        #[arg(short = 'q', long = "query")]
        sql: Option<String>,

        /// Read statements from stdin until EOF or `exit`
        #[arg(long)]
        interactive: bool,

        /// Output format (table, json, csv)
        #[arg(long, default_value = "table", value_parser = parse_output_format)]
        format: OutputFormat,
    },
}

/// Parse a `YYYY-MM-DD` date from CLI/env string
fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{s}'. Expected YYYY-MM-DD"))
}

/// Parse an output format from CLI/env string
fn parse_output_format(s: &str) -> Result<OutputFormat, String> {
    match s.to_lowercase().as_str() {
        "table" => Ok(OutputFormat::Table),
        "json" => Ok(OutputFormat::Json),
        "csv" => Ok(OutputFormat::Csv),
        _ => Err(format!(
            "Invalid output format '{s}'. Valid options: table, json, csv"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cache_command() {
        let cli = Cli::try_parse_from([
            "threadvault",
            "cache",
            "--channel",
            "C1",
            "--channel",
            "C2",
            "--days",
            "3",
            "--enrich-tickets",
        ])
        .unwrap();
        match cli.command {
            Commands::Cache {
                channels,
                days,
                hours,
                enrich_tickets,
                date,
            } => {
                assert_eq!(channels, vec!["C1", "C2"]);
                assert_eq!(days, 3);
                assert_eq!(hours, 0);
                assert!(enrich_tickets);
                assert!(date.is_none());
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_parse_view_with_range() {
        let cli = Cli::try_parse_from([
            "threadvault",
            "view",
            "--channel",
            "eng",
            "--start-date",
            "2025-10-14",
            "--end-date",
            "2025-10-15",
        ])
        .unwrap();
        match cli.command {
            Commands::View {
                channel,
                start_date,
                end_date,
                date,
                ..
            } => {
                assert_eq!(channel, "eng");
                assert!(date.is_none());
                assert_eq!(start_date.unwrap().to_string(), "2025-10-14");
                assert_eq!(end_date.unwrap().to_string(), "2025-10-15");
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_invalid_date_rejected() {
        let result = Cli::try_parse_from(["threadvault", "view", "--channel", "eng", "--date", "15/10/2025"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_query_format_parsing() {
        let cli =
            Cli::try_parse_from(["threadvault", "query", "-q", "SELECT 1", "--format", "json"])
                .unwrap();
        match cli.command {
            Commands::Query { sql, format, .. } => {
                assert_eq!(sql.as_deref(), Some("SELECT 1"));
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("wrong command"),
        }
    }
}
