//! Core application
//!
//! Parses the CLI, resolves configuration, and dispatches to the four
//! surfaces: `cache` (ingest), `view` (read + reconstruct + format),
//! `stats` (partition summary), `query` (embedded SQL engine).

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use crate::core::cli::{Cli, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{
    ENV_LOG, MAX_IN_FLIGHT, RATE_LIMIT_BURST, RATE_LIMIT_PER_SEC,
};
use crate::data::duckdb::{OutputFormat, QueryEngine, render};
use crate::data::error::DataError;
use crate::data::jira::JiraHttpClient;
use crate::data::parquet::{DatasetLayout, DatasetReader, DatasetWriter, PartitionInfo};
use crate::data::slack::{RateLimitedClient, SlackHttpClient};
use crate::data::types::ChannelRef;
use crate::domain::ingest::{EnrichmentCoordinator, IngestPipeline, MessageFetcher, UserCache};
use crate::domain::view::{ViewContext, format_view, reconstruct};
use crate::domain::window::TimeWindow;

pub struct CoreApp;

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        let cli = Cli::parse();
        let config = AppConfig::load(cli.config.as_deref(), cli.cache_path.as_deref())?;
        let layout = DatasetLayout::new(&config.cache_root);
        tracing::debug!(root = %layout.root().display(), "Configuration resolved");

        match cli.command {
            Commands::Cache {
                channels,
                days,
                hours,
                date,
                enrich_tickets,
            } => Self::cmd_cache(&config, layout, &channels, days, hours, date, enrich_tickets).await,
            Commands::View {
                channel,
                date,
                start_date,
                end_date,
                output,
            } => Self::cmd_view(&config, layout, &channel, date, start_date, end_date, output),
            Commands::Stats => Self::cmd_stats(layout),
            Commands::Query {
                sql,
                interactive,
                format,
            } => Self::cmd_query(layout, sql, interactive, format),
        }
    }

    fn init_logging() {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    // ========================================================================
    // CACHE
    // ========================================================================

    async fn cmd_cache(
        config: &AppConfig,
        layout: DatasetLayout,
        channel_args: &[String],
        days: i64,
        hours: i64,
        date: Option<NaiveDate>,
        enrich_tickets: bool,
    ) -> Result<()> {
        let channels: Vec<ChannelRef> = if channel_args.is_empty() {
            config.channels.clone()
        } else {
            channel_args
                .iter()
                .map(|arg| ChannelRef::resolve(arg, &config.channels))
                .collect()
        };
        if channels.is_empty() {
            return Err(DataError::Config(
                "No channels given; pass --channel or configure `channels`".to_string(),
            )
            .into());
        }

        let window = match date {
            Some(date) => TimeWindow::for_date(date),
            None => TimeWindow::from_lookback(days, hours, None),
        };

        let slack = SlackHttpClient::from_env()?;
        tracing::info!(
            token_kind = %slack.token_kind(),
            window = %window,
            channels = channels.len(),
            "Starting ingestion"
        );

        // Ctrl-C propagates through every bucket wait, permit acquire, and
        // in-flight request.
        let cancel = CancellationToken::new();
        let signal_token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling in-flight work");
                signal_token.cancel();
            }
        });

        let client = Arc::new(RateLimitedClient::new(
            slack,
            RATE_LIMIT_PER_SEC,
            RATE_LIMIT_BURST,
            MAX_IN_FLIGHT,
            cancel,
        ));
        let users = Arc::new(UserCache::new());
        let fetcher = MessageFetcher::new(client, Arc::clone(&users));

        let enricher = if enrich_tickets {
            let jira = JiraHttpClient::from_env(config.jira_server.as_deref())?;
            Some(EnrichmentCoordinator::new(Arc::new(jira)))
        } else {
            None
        };

        let pipeline = IngestPipeline::new(fetcher, DatasetWriter::new(layout), users, enricher);
        let summary = pipeline.run(&channels, &window).await?;
        println!("{summary}");
        Ok(())
    }

    // ========================================================================
    // VIEW
    // ========================================================================

    fn cmd_view(
        config: &AppConfig,
        layout: DatasetLayout,
        channel_arg: &str,
        date: Option<NaiveDate>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        output: Option<PathBuf>,
    ) -> Result<()> {
        let (start, end) = match (date, start_date, end_date) {
            (Some(d), None, None) => (d, d),
            (None, Some(s), Some(e)) => (s, e),
            _ => {
                return Err(DataError::Config(
                    "Provide either --date or both --start-date and --end-date".to_string(),
                )
                .into());
            }
        };
        let window = TimeWindow::for_range(start, end)?;

        // A configured channel resolves to its alias; an unknown argument is
        // passed through so the reader's channel_<id> fallback applies.
        let resolved = ChannelRef::resolve(channel_arg, &config.channels);
        let lookup = match &resolved.name {
            Some(name) => name.clone(),
            None => channel_arg.to_string(),
        };

        let reader = DatasetReader::new(layout);
        let rows = reader.read_channel_range(&lookup, start, end)?;
        if rows.is_empty() {
            println!(
                "No cached messages for #{lookup} in {window}. \
                 Run `threadvault cache --channel {channel_arg}` first."
            );
            return Ok(());
        }

        let nodes = reconstruct(rows);
        let text = format_view(
            &nodes,
            &ViewContext {
                channel: lookup,
                window_label: window.to_string(),
            },
        );

        match output {
            Some(path) => {
                std::fs::write(&path, &text)
                    .with_context(|| format!("writing view to {}", path.display()))?;
                println!("Wrote view to {}", path.display());
            }
            None => print!("{text}"),
        }
        Ok(())
    }

    // ========================================================================
    // STATS
    // ========================================================================

    fn cmd_stats(layout: DatasetLayout) -> Result<()> {
        let reader = DatasetReader::new(layout.clone());
        let info = reader.partition_info()?;
        if info.partitions.is_empty() {
            println!("No partitions under {}.", layout.root().display());
            return Ok(());
        }
        print!("{}", render_stats(&info));
        Ok(())
    }

    // ========================================================================
    // QUERY
    // ========================================================================

    fn cmd_query(
        layout: DatasetLayout,
        sql: Option<String>,
        interactive: bool,
        format: OutputFormat,
    ) -> Result<()> {
        if sql.is_none() && !interactive {
            return Err(
                DataError::Config("Provide -q <sql> or --interactive".to_string()).into(),
            );
        }

        let engine = QueryEngine::open(&layout)?;
        if engine.views().is_empty() {
            println!(
                "No dataset under {}; queries run without entity views.",
                layout.root().display()
            );
        }

        if let Some(sql) = sql {
            let result = engine.run(&sql)?;
            print!("{}", render(&result, format));
        }

        if interactive {
            let stdin = std::io::stdin();
            loop {
                eprint!("sql> ");
                std::io::stderr().flush().ok();
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let statement = line.trim();
                if statement.is_empty() {
                    continue;
                }
                if statement.eq_ignore_ascii_case("exit") || statement.eq_ignore_ascii_case("quit")
                {
                    break;
                }
                match engine.run(statement) {
                    Ok(result) => print!("{}", render(&result, format)),
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
        }
        Ok(())
    }
}

/// Render the `stats` table: per-partition rows plus totals
fn render_stats(info: &PartitionInfo) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<14} {:<12} {:<24} {:>10} {:>12}\n",
        "entity", "dt", "channel", "rows", "bytes"
    ));
    for stat in &info.partitions {
        out.push_str(&format!(
            "{:<14} {:<12} {:<24} {:>10} {:>12}\n",
            stat.entry.entity,
            stat.entry
                .dt
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            stat.entry.channel.as_deref().unwrap_or("-"),
            stat.rows,
            stat.entry.bytes,
        ));
    }
    out.push_str(&format!(
        "\n{} partitions, {} rows, {} bytes total\n",
        info.partitions.len(),
        info.total_rows,
        info.total_bytes
    ));
    out
}
