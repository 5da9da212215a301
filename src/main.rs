mod api;
mod cli;

use crate::cli::init::run_init;
use crate::cli::{Cli, Commands, ConfigCommands, GoalCommands, TagCommands};
use anyhow::{Context, Result, bail};
use chrono::{Local, Utc};
use clap::Parser;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use std::sync::Arc;
use timelog::analyzer::{self, report};
use timelog::config::Config;
use timelog::db::Database;
use timelog::error::require_user;
use timelog::tracker::guard::{self, ActivityPatch, StartRequest};
use timelog::tracker::text::{DEFAULT_DOMAIN_LENGTH, extract_urls, short_domain};
use timelog::tracker::time::{
    elapsed_millis, format_duration, format_elapsed, format_relative_time,
};
use timelog::tracker::{ActivityFilter, ActivityWithTags, Pagination, SortOrder, tags};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let _ = run_init()?;
            Ok(())
        }
        Commands::Start { description, tags } => handle_start(description, tags),
        Commands::Stop => handle_stop(),
        Commands::Cancel => handle_cancel(),
        Commands::Status => handle_status(),
        Commands::History {
            search,
            date,
            sort,
            page,
            limit,
            json,
        } => handle_history(search, date, sort, page, limit, json),
        Commands::Recent => handle_recent(),
        Commands::Edit {
            id,
            description,
            start,
            finish,
            tags,
            clear_tags,
        } => handle_edit(id, description, start, finish, tags, clear_tags),
        Commands::Delete { id, yes } => handle_delete(id, yes),
        Commands::Analytics { days, json, export } => handle_analytics(days, json, export),
        Commands::Today { date } => handle_today(date),
        Commands::Goal { command } => handle_goal_command(command),
        Commands::Tag { command } => handle_tag_command(command),
        Commands::Config { command } => handle_config_command(command),
        Commands::Serve => {
            let config = load_or_default_config()?;
            run_service(config).await
        }
    }
}

fn handle_start(description: Option<String>, tag_names: Vec<String>) -> Result<()> {
    let (config, database) = open_store()?;

    let record = guard::try_start(
        &database,
        &config.user_id,
        StartRequest {
            description,
            tag_ids: Vec::new(),
            tag_names,
        },
        Utc::now(),
    )?;

    println!(
        "Started activity #{} at {}",
        record.id,
        record.started_at.with_timezone(&Local).format("%H:%M")
    );
    Ok(())
}

fn handle_stop() -> Result<()> {
    let (config, database) = open_store()?;
    let record = guard::try_finish(&database, &config.user_id, Utc::now())?;

    println!(
        "Stopped activity #{} after {}",
        record.id,
        format_duration(record.duration_minutes.unwrap_or_default())
    );
    Ok(())
}

fn handle_cancel() -> Result<()> {
    let (config, database) = open_store()?;
    let record = guard::cancel(&database, &config.user_id)?;

    println!("Discarded running activity #{}", record.id);
    Ok(())
}

fn handle_status() -> Result<()> {
    let (config, database) = open_store()?;
    let now = Utc::now();

    println!("Timelog status");
    println!("- user: {}", config.user_id);
    match guard::running(&database, &config.user_id)? {
        Some(running) => println!(
            "- running: #{} {} ({})",
            running.activity.id,
            describe(&running),
            format_elapsed(elapsed_millis(running.activity.started_at, now))
        ),
        None => println!("- running: none"),
    }

    let today = analyzer::daily_total(&database, &config.user_id, Local::now().date_naive())?;
    println!(
        "- today: {} in {} activities ({}% of {} goal)",
        format_duration(today.total_minutes),
        today.activity_count,
        today.progress_percent,
        format_duration(today.goal_minutes)
    );

    Ok(())
}

fn handle_history(
    search: Option<String>,
    date: Option<String>,
    sort: SortOrder,
    page: u32,
    limit: Option<u32>,
    json: bool,
) -> Result<()> {
    let (config, database) = open_store()?;

    let filter = match date.as_deref().map(cli::parse_date).transpose()? {
        Some(day) => guard::day_filter(day, search, sort),
        None => ActivityFilter {
            search,
            sort,
            ..ActivityFilter::default()
        },
    };
    let pagination = Pagination::new(page, limit.unwrap_or(config.page_size));
    let result = guard::history(&database, &config.user_id, &filter, pagination)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize history")?
        );
        return Ok(());
    }

    if result.records.is_empty() {
        println!("No activities found");
        return Ok(());
    }

    let now = Utc::now();
    result
        .records
        .iter()
        .for_each(|record| println!("{}", history_line(record, now)));
    println!(
        "page {}/{} ({} total)",
        result.page,
        result.total_pages.max(1),
        result.total
    );

    Ok(())
}

fn handle_recent() -> Result<()> {
    let (config, database) = open_store()?;
    let now = Utc::now();
    let records = guard::recent(
        &database,
        &config.user_id,
        config.recent_days,
        config.recent_limit,
        now,
    )?;

    if records.is_empty() {
        println!("No activities in the last {} days", config.recent_days);
    }
    records
        .iter()
        .for_each(|record| println!("{}", history_line(record, now)));

    Ok(())
}

fn handle_edit(
    id: i64,
    description: Option<String>,
    start: Option<String>,
    finish: Option<String>,
    tag_names: Vec<String>,
    clear_tags: bool,
) -> Result<()> {
    let (config, database) = open_store()?;

    let tag_names = if clear_tags {
        Some(Vec::new())
    } else {
        Some(tag_names).filter(|names| !names.is_empty())
    };

    let patch = ActivityPatch {
        description,
        started_at: start.as_deref().map(cli::parse_timestamp).transpose()?,
        finished_at: finish.as_deref().map(cli::parse_timestamp).transpose()?,
        tag_ids: None,
        tag_names,
    };
    let record = guard::edit(&database, &config.user_id, id, patch)?;

    println!(
        "Updated activity #{} ({})",
        record.id,
        record
            .duration_minutes
            .map(format_duration)
            .unwrap_or_else(|| "running".to_string())
    );
    Ok(())
}

fn handle_delete(id: i64, yes: bool) -> Result<()> {
    let (config, database) = open_store()?;

    if !yes && !confirm(&format!("Delete activity #{id}?"))? {
        println!("Aborted");
        return Ok(());
    }

    guard::delete(&database, &config.user_id, id)?;
    println!("Deleted activity #{id}");
    Ok(())
}

fn handle_analytics(days: Option<u32>, json: bool, export: bool) -> Result<()> {
    let (config, database) = open_store()?;
    let days = days.unwrap_or(config.analytics_days).max(1);
    let result = analyzer::get_analytics(&database, &config.user_id, days, Utc::now())?;
    let today = Local::now().date_naive();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize analytics")?
        );
    } else {
        print!("{}", report::render_markdown(&result, today));
    }

    if export {
        let saved = report::save_report_files(&result, today, &config.report_dir)?;
        println!("Report exported");
        println!("- Markdown: {}", saved.markdown_path.display());
        println!("- JSON: {}", saved.json_path.display());
    }

    Ok(())
}

fn handle_today(date: Option<String>) -> Result<()> {
    let (config, database) = open_store()?;
    let date = cli::parse_optional_date(date.as_deref())?;
    let total = analyzer::daily_total(&database, &config.user_id, date)?;

    println!(
        "{}: {} in {} activities ({}% of {} goal)",
        total.date.format("%Y-%m-%d"),
        format_duration(total.total_minutes),
        total.activity_count,
        total.progress_percent,
        format_duration(total.goal_minutes)
    );
    Ok(())
}

fn handle_goal_command(command: GoalCommands) -> Result<()> {
    let (config, database) = open_store()?;

    match command {
        GoalCommands::Get => {
            let minutes = analyzer::daily_goal(&database, &config.user_id)?;
            println!("{minutes} minutes ({})", format_duration(minutes));
        }
        GoalCommands::Set { minutes } => {
            analyzer::set_daily_goal(&database, &config.user_id, minutes)?;
            println!("Daily goal saved: {minutes} minutes");
        }
    }

    Ok(())
}

fn handle_tag_command(command: TagCommands) -> Result<()> {
    let (config, database) = open_store()?;

    match command {
        TagCommands::List => {
            let all = tags::list_tags(&database, &config.user_id)?;
            if all.is_empty() {
                println!("No tags yet");
            }
            all.iter()
                .for_each(|tag| println!("#{} {} {}", tag.id, tag.name, tag.color));
        }
        TagCommands::Add { name, color } => {
            let tag = tags::create_tag(&database, &config.user_id, &name, color.as_deref())?;
            println!("Created tag #{} {} {}", tag.id, tag.name, tag.color);
        }
        TagCommands::Rename { id, name, color } => {
            if name.is_none() && color.is_none() {
                bail!("Nothing to change. Pass --name and/or --color");
            }
            let tag = tags::update_tag(
                &database,
                &config.user_id,
                id,
                name.as_deref(),
                color.as_deref(),
            )?;
            println!("Updated tag #{} {} {}", tag.id, tag.name, tag.color);
        }
        TagCommands::Rm { id, yes } => {
            if !yes && !confirm(&format!("Delete tag #{id} and remove it from all activities?"))? {
                println!("Aborted");
                return Ok(());
            }
            tags::delete_tag(&database, &config.user_id, id)?;
            println!("Deleted tag #{id}");
        }
    }

    Ok(())
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_or_default_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let _ = Database::open(&config.db_path)?;

    let api_config = Arc::new(config);

    info!("Timelog service started");

    tokio::select! {
        api_result = api::run_server(api_config) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn open_store() -> Result<(Config, Database)> {
    let config = load_or_default_config()?;
    require_user(&config.user_id)?;
    let database = Database::open(&config.db_path)?;

    Ok((config, database))
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn confirm(prompt: &str) -> Result<bool> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation input")
}

fn describe(record: &ActivityWithTags) -> String {
    let description = record
        .activity
        .description
        .as_deref()
        .map(|text| {
            extract_urls(text).into_iter().fold(text.to_string(), |acc, url| {
                acc.replacen(url, &short_domain(url, DEFAULT_DOMAIN_LENGTH), 1)
            })
        })
        .unwrap_or_else(|| "(no description)".to_string());

    if record.tags.is_empty() {
        description
    } else {
        let names = record
            .tags
            .iter()
            .map(|tag| tag.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{description} [{names}]")
    }
}

fn history_line(record: &ActivityWithTags, now: chrono::DateTime<Utc>) -> String {
    format!(
        "#{:<5} {} {:>7}  {}  ({})",
        record.activity.id,
        record
            .activity
            .started_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M"),
        format_duration(record.activity.duration_minutes.unwrap_or_default()),
        describe(record),
        format_relative_time(record.activity.started_at, now)
    )
}
