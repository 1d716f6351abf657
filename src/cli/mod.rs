//! Read-only inspection CLI.
//!
//! Two commands, both exiting 0:
//!
//! - `stats`: entry/knowledge/subscriber counts with per-agent and per-type breakdown.
//! - `query`: entries matching a tag list, highest confidence first.
//!
//! Rendering returns `String`s so the binary stays a thin wrapper.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::blackboard::{Blackboard, BlackboardStats, Entry, Query, DEFAULT_MAX_RESULTS};
use crate::config::BlackboardConfig;

/// Blackboard inspection tool
#[derive(Debug, Parser)]
#[command(name = "blackboard")]
#[command(about = "Inspect a shared agent blackboard snapshot", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Snapshot file (overrides $BLACKBOARD_PATH and the default location)
    #[arg(long, global = true)]
    pub path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show aggregate counts
    Stats {
        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// List entries matching tags
    Query {
        /// Comma-separated tags; each must match some entry tag (case-insensitive substring)
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Maximum number of entries to print
        #[arg(long, visible_alias = "max", alias = "limit", default_value_t = DEFAULT_MAX_RESULTS)]
        max_results: usize,

        /// Only entries of this type
        #[arg(long = "type")]
        entry_type: Option<String>,

        /// Minimum confidence (inclusive)
        #[arg(long, default_value_t = 0.0)]
        min_confidence: f64,

        /// Only entries strictly newer than this RFC 3339 timestamp
        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,

        /// Identity recorded as the requesting agent
        #[arg(long, default_value = "cli")]
        agent: String,

        /// Output JSON only
        #[arg(long)]
        json: bool,
    },
}

fn parse_since(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
}

impl Cli {
    /// Configuration for the inspected blackboard. Never writes back.
    pub fn config(&self) -> BlackboardConfig {
        let config = BlackboardConfig::from_env().with_save_on_drop(false);
        match &self.path {
            Some(path) => config.with_storage_path(path),
            None => config,
        }
    }
}

/// Run a parsed command against its blackboard and return the output text.
pub fn run(cli: &Cli) -> String {
    let board = Blackboard::open(cli.config());
    execute(&cli.command, &board)
}

/// Run `command` against an already-open blackboard.
pub fn execute(command: &Command, board: &Blackboard) -> String {
    match command {
        Command::Stats { json } => render_stats(&board.get_stats(), *json),
        Command::Query {
            tags,
            max_results,
            entry_type,
            min_confidence,
            since,
            agent,
            json,
        } => {
            let mut query = Query::tags(tags.iter().cloned())
                .max_results(*max_results)
                .min_confidence(*min_confidence);
            if let Some(entry_type) = entry_type {
                query = query.entry_type(entry_type.clone());
            }
            if let Some(since) = since {
                query = query.since(*since);
            }
            render_entries(&board.query(agent, &query), *json)
        }
    }
}

pub fn render_stats(stats: &BlackboardStats, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(stats).unwrap_or_default();
    }
    stats.to_string()
}

pub fn render_entries(entries: &[Entry], json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(entries).unwrap_or_default();
    }
    if entries.is_empty() {
        return "No matching entries.\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!(
            "{} {} [{}] {} conf={:.2} tags=[{}]\n    {}\n",
            entry.timestamp().format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.id(),
            entry.entry_type(),
            entry.agent(),
            entry.confidence(),
            entry.tags().join(", "),
            entry.content()
        ));
    }
    out.push_str(&format!("{} entr{}\n", entries.len(), if entries.len() == 1 { "y" } else { "ies" }));
    out
}
