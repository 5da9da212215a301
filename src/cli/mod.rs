pub mod init;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use timelog::tracker::SortOrder;

#[derive(Debug, Parser)]
#[command(name = "Timelog", about = "Personal time tracking with tags, streaks and goals")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactive first-time setup
    Init,
    /// Start the timer
    Start {
        #[arg(long, short)]
        description: Option<String>,
        /// Tag name, created when missing (repeatable)
        #[arg(long = "tag", short)]
        tags: Vec<String>,
    },
    /// Stop the running timer and log it
    Stop,
    /// Discard the running timer
    Cancel,
    Status,
    History {
        #[arg(long)]
        search: Option<String>,
        /// Only activities started on this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        #[arg(long, value_enum, default_value_t = SortOrder::Desc)]
        sort: SortOrder,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    Recent,
    Edit {
        id: i64,
        #[arg(long, short)]
        description: Option<String>,
        /// "YYYY-MM-DD HH:MM" local time or RFC 3339
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        finish: Option<String>,
        #[arg(long = "tag", short)]
        tags: Vec<String>,
        #[arg(long, default_value_t = false)]
        clear_tags: bool,
    },
    Delete {
        id: i64,
        #[arg(long, short, default_value_t = false)]
        yes: bool,
    },
    Analytics {
        #[arg(long)]
        days: Option<u32>,
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Write Markdown and JSON files into the report directory
        #[arg(long, default_value_t = false)]
        export: bool,
    },
    /// Minutes logged on a day against the daily goal
    Today {
        #[arg(long)]
        date: Option<String>,
    },
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Run the HTTP API
    Serve,
}

#[derive(Debug, Subcommand)]
pub enum GoalCommands {
    Get,
    Set { minutes: i64 },
}

#[derive(Debug, Subcommand)]
pub enum TagCommands {
    List,
    Add {
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    Rename {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    Rm {
        id: i64,
        #[arg(long, short, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format: {input}. Example: 2026-02-18"))
}

pub fn parse_optional_date(input: Option<&str>) -> Result<NaiveDate> {
    input
        .map(parse_date)
        .transpose()
        .map(|date| date.unwrap_or_else(|| Local::now().date_naive()))
}

/// Accepts RFC 3339 or a local "YYYY-MM-DD HH:MM".
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(input) {
        return Ok(datetime.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(input.trim(), "%Y-%m-%d %H:%M").with_context(
        || format!("Invalid time: {input}. Example: 2026-02-18 09:30 or 2026-02-18T09:30:00Z"),
    )?;

    naive
        .and_local_timezone(Local)
        .earliest()
        .map(|datetime| datetime.with_timezone(&Utc))
        .with_context(|| format!("Time does not exist in the local time zone: {input}"))
}
