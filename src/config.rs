//! Configuration loader and validator for the search watch worker.
use crate::model::WorkUnit;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub search: Search,
    pub telegram: Telegram,
    #[serde(default)]
    pub work_units: Vec<WorkUnit>,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Delay between scheduled runs in the long-running binary.
    pub poll_interval_ms: u64,
    /// Upper bound on how long one batch may take to settle. Unset means no bound.
    #[serde(default)]
    pub batch_timeout_secs: Option<u64>,
}

/// Remote search API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Search {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Telegram {
    pub bot_token: String,
    /// Chat receiving match notifications and webhook alerts.
    pub chat_id: i64,
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// `DATABASE_URL` if set, else a SQLite file inside `app.data_dir`.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "sqlite://{}/watchbot.db",
                self.app.data_dir.trim_end_matches('/')
            )
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.app.poll_interval_ms)
    }

    pub fn batch_timeout(&self) -> Option<Duration> {
        self.app.batch_timeout_secs.map(Duration::from_secs)
    }

    pub fn work_unit(&self, name: &str) -> Option<&WorkUnit> {
        self.work_units.iter().find(|u| u.name == name)
    }
}

impl Search {
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        Url::parse(self.base_url.trim())
            .map_err(|_| ConfigError::Invalid("search.base_url must be a valid URL"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid("app.poll_interval_ms must be > 0"));
    }
    if cfg.app.batch_timeout_secs == Some(0) {
        return Err(ConfigError::Invalid("app.batch_timeout_secs must be > 0 when set"));
    }

    cfg.search.endpoint()?;
    if cfg.search.user_agent.trim().is_empty() {
        return Err(ConfigError::Invalid("search.user_agent must be non-empty"));
    }
    if cfg.search.timeout_secs == 0 {
        return Err(ConfigError::Invalid("search.timeout_secs must be > 0"));
    }

    if cfg.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("telegram.bot_token must be non-empty"));
    }
    if cfg.telegram.chat_id == 0 {
        return Err(ConfigError::Invalid("telegram.chat_id must be set"));
    }

    let mut names = HashSet::new();
    for unit in &cfg.work_units {
        if unit.name.trim().is_empty() {
            return Err(ConfigError::Invalid("work_units[].name must be non-empty"));
        }
        if !names.insert(unit.name.as_str()) {
            return Err(ConfigError::Invalid("work_units[].name must be unique"));
        }
        if unit.limit == Some(0) {
            return Err(ConfigError::Invalid("work_units[].limit must be > 0 when set"));
        }
    }

    Ok(())
}

/// Returns the example YAML configuration.
pub fn example() -> &'static str {
    r##"app:
  data_dir: "./data"
  poll_interval_ms: 60000
  batch_timeout_secs: 120

search:
  base_url: "https://search.twitter.com/search.json"
  user_agent: "search-watchbot/0.1"
  timeout_secs: 20

telegram:
  bot_token: "YOUR_TELEGRAM_BOT_TOKEN"
  chat_id: 123456789
  allowed_users:
    - 123456789

work_units:
  - name: "Cats"
    search: "cats"
    limit: 5
  - name: "Rust"
    search: "#rustlang"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn example_cfg() -> Config {
        serde_yaml::from_str(example()).unwrap()
    }

    #[test]
    fn parse_example_ok() {
        let cfg = example_cfg();
        validate(&cfg).unwrap();
        assert_eq!(cfg.work_units.len(), 2);
        assert_eq!(cfg.work_units[0].limit, Some(5));
        assert_eq!(cfg.work_units[1].limit, None);
        assert_eq!(cfg.batch_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn invalid_bot_token() {
        let mut cfg = example_cfg();
        cfg.telegram.bot_token = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("telegram.bot_token")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_search_settings() {
        let mut cfg = example_cfg();
        cfg.search.base_url = "not a url".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("search.base_url")),
            _ => panic!("wrong error"),
        }

        let mut cfg = example_cfg();
        cfg.search.timeout_secs = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = example_cfg();
        cfg.search.user_agent = " ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_work_units() {
        let mut cfg = example_cfg();
        cfg.work_units[1].name = "Cats".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("unique")),
            _ => panic!("wrong error"),
        }

        let mut cfg = example_cfg();
        cfg.work_units[0].limit = Some(0);
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = example_cfg();
        cfg.work_units[0].name = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn work_unit_without_search_is_valid() {
        let mut cfg = example_cfg();
        cfg.work_units[0].search = None;
        validate(&cfg).unwrap();
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg = example_cfg();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.telegram.allowed_users, vec![123456789]);
        assert_eq!(cfg.work_unit("Rust").and_then(|u| u.search_term()), Some("#rustlang"));
    }
}
