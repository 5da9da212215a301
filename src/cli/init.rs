use anyhow::{Context, Result};
use dialoguer::{Input, theme::ColorfulTheme};
use timelog::analyzer::{DEFAULT_DAILY_GOAL_MINUTES, MAX_DAILY_GOAL_MINUTES, set_daily_goal};
use timelog::config::{Config, default_report_dir, expand_home};
use timelog::db::Database;

pub fn run_init() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to Timelog.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let defaults = Config::load().unwrap_or_default();

    println!("\n[1/3] Who is tracking?");
    let user_id: String = Input::with_theme(&theme)
        .with_prompt("  User name")
        .default(defaults.user_id.clone())
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            if input.trim().is_empty() {
                Err("User name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .context("Failed to read user name")?;

    println!("\n[2/3] Daily goal");
    let goal: i64 = Input::with_theme(&theme)
        .with_prompt("  Minutes per day")
        .default(DEFAULT_DAILY_GOAL_MINUTES)
        .validate_with(|input: &i64| -> std::result::Result<(), String> {
            if (0..=MAX_DAILY_GOAL_MINUTES).contains(input) {
                Ok(())
            } else {
                Err(format!("Use a value between 0 and {MAX_DAILY_GOAL_MINUTES}"))
            }
        })
        .interact_text()
        .context("Failed to read daily goal")?;

    println!("\n[3/3] Report output directory");
    let report_dir_input: String = Input::with_theme(&theme)
        .with_prompt("  Folder where analytics exports are saved")
        .default(default_report_dir().display().to_string())
        .interact_text()
        .context("Failed to read report directory")?;

    let config = Config {
        user_id: user_id.trim().to_string(),
        report_dir: expand_home(&report_dir_input),
        ..defaults
    };

    config.ensure_bootstrap_files()?;
    config.save()?;

    let database = Database::open(&config.db_path)?;
    set_daily_goal(&database, &config.user_id, goal)?;

    println!("\n──────────────────────────────────────────");
    println!("  Setup complete!");
    println!("  Run `Timelog start` to begin tracking.");
    println!("──────────────────────────────────────────");

    Ok(config)
}
