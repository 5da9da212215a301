use crate::analyzer::DEFAULT_WINDOW_DAYS;
use crate::tracker::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".Timelog";
const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_USER_ID: &str = "local";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub user_id: String,
    pub db_path: PathBuf,
    pub report_dir: PathBuf,
    pub api_port: u16,
    pub analytics_days: u32,
    pub recent_days: u32,
    pub recent_limit: u32,
    pub page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            user_id: DEFAULT_USER_ID.to_string(),
            db_path: root.join("db").join("timelog.db"),
            report_dir: default_report_dir(),
            api_port: 7890,
            analytics_days: DEFAULT_WINDOW_DAYS,
            recent_days: 7,
            recent_limit: 20,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.page_size = config.page_size.clamp(1, MAX_PAGE_SIZE);

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        Ok(())
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "user_id" => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    bail!("user_id cannot be empty");
                }
                self.user_id = trimmed.to_string();
            }
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "report_dir" => {
                self.report_dir = expand_home(value);
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "analytics_days" => {
                let days = value
                    .parse::<u32>()
                    .map_err(|_| anyhow!("analytics_days must be a number"))?;
                if days == 0 {
                    bail!("analytics_days must be at least 1");
                }
                self.analytics_days = days;
            }
            "recent_days" => {
                self.recent_days = value
                    .parse::<u32>()
                    .map_err(|_| anyhow!("recent_days must be a number"))?;
            }
            "recent_limit" => {
                self.recent_limit = value
                    .parse::<u32>()
                    .map_err(|_| anyhow!("recent_limit must be a number"))?
                    .clamp(1, MAX_PAGE_SIZE);
            }
            "page_size" => {
                self.page_size = value
                    .parse::<u32>()
                    .map_err(|_| anyhow!("page_size must be a number"))?
                    .clamp(1, MAX_PAGE_SIZE);
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: user_id|user.id, db_path|db.path, report_dir|report.dir, api_port|api.port, analytics_days|analytics.days, recent_days|recent.days, recent_limit|recent.limit, page_size|history.page_size"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "user_id" => Some(self.user_id.clone()),
            "db_path" => Some(self.db_path.display().to_string()),
            "report_dir" => Some(self.report_dir.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "analytics_days" => Some(self.analytics_days.to_string()),
            "recent_days" => Some(self.recent_days.to_string()),
            "recent_limit" => Some(self.recent_limit.to_string()),
            "page_size" => Some(self.page_size.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "user_id" | "user.id" => "user_id",
        "db_path" | "db.path" => "db_path",
        "report_dir" | "report.dir" => "report_dir",
        "api_port" | "api.port" => "api_port",
        "analytics_days" | "analytics.days" => "analytics_days",
        "recent_days" | "recent.days" => "recent_days",
        "recent_limit" | "recent.limit" => "recent_limit",
        "page_size" | "history.page_size" => "page_size",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

pub fn default_report_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("Timelog")
        .join("reports")
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_value_accepts_aliases_and_validates() {
        let mut config = Config::default();

        config.set_value("analytics.days", "14").expect("set days");
        config.set_value("history.page_size", "500").expect("set page size");
        config.set_value("user.id", "  alice ").expect("set user");

        assert_eq!(config.get_value("analytics_days").as_deref(), Some("14"));
        assert_eq!(config.page_size, MAX_PAGE_SIZE);
        assert_eq!(config.user_id, "alice");

        assert!(config.set_value("api_port", "not-a-port").is_err());
        assert!(config.set_value("analytics_days", "0").is_err());
        assert!(config.set_value("user_id", "   ").is_err());
        assert!(config.set_value("unknown", "1").is_err());
        assert_eq!(config.get_value("unknown"), None);
    }

    #[test]
    fn save_and_load_round_trip_with_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");

        fs::write(&path, r#"{ "user_id": "bob", "api_port": 9000 }"#).expect("write");
        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.user_id, "bob");
        assert_eq!(loaded.api_port, 9000);
        assert_eq!(loaded.analytics_days, DEFAULT_WINDOW_DAYS);

        let mut changed = loaded.clone();
        changed.recent_days = 3;
        changed.save_to(&path).expect("save");
        assert_eq!(Config::load_from(&path).expect("reload").recent_days, 3);
    }
}
