use crate::error::{Result, ScoutError};
use jobscout_scanner::domain::{DEFAULT_MAX_CANDIDATES, DEFAULT_TLDS};
use jobscout_scanner::locator::{DEFAULT_CAREER_INDICATORS, DEFAULT_CAREER_PATHS};
use jobscout_scanner::matcher::DEFAULT_JOB_KEYWORDS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/jobscout/";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const LEDGER_FILE_NAME: &str = "ledger.db";

pub const ENV_ROSTER: &str = "JOBSCOUT_ROSTER";
pub const ENV_MAX_COMPANIES: &str = "JOBSCOUT_MAX_COMPANIES";
pub const ENV_LEDGER: &str = "JOBSCOUT_LEDGER";
pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    Telegram,
    Stdout,
}

impl NotifierKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "telegram" => Some(NotifierKind::Telegram),
            "stdout" | "console" => Some(NotifierKind::Stdout),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub max_companies_per_run: usize,
    pub job_keywords: Vec<String>,
    pub career_indicators: Vec<String>,
    pub career_paths: Vec<String>,
    pub tlds: Vec<String>,
    pub max_candidates: usize,
    pub request_timeout_secs: f64,
    pub inter_company_delay_secs: f64,
    pub roster: Option<PathBuf>,
    pub roster_has_header: bool,
    pub ledger: PathBuf,
    pub notifier: NotifierKind,
    pub recycle_when_exhausted: bool,
    pub telegram: TelegramConfig,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            max_companies_per_run: 10,
            job_keywords: to_strings(DEFAULT_JOB_KEYWORDS),
            career_indicators: to_strings(DEFAULT_CAREER_INDICATORS),
            career_paths: to_strings(DEFAULT_CAREER_PATHS),
            tlds: to_strings(DEFAULT_TLDS),
            max_candidates: DEFAULT_MAX_CANDIDATES,
            request_timeout_secs: 10.0,
            inter_company_delay_secs: 3.0,
            roster: None,
            roster_has_header: true,
            ledger: default_config_dir().join(LEDGER_FILE_NAME),
            notifier: NotifierKind::Telegram,
            recycle_when_exhausted: false,
            telegram: TelegramConfig::default(),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Tilde-expanded path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

pub fn default_config_dir() -> PathBuf {
    expand_path(DEFAULT_CONFIG_DIR)
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join(CONFIG_FILE_NAME)
}

impl ScoutConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: ScoutConfig = toml::from_str(content)?;
        config.expand_paths();
        Ok(config)
    }

    /// Loads `path`, or the default config file when `path` is `None`.
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ScoutError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            ScoutError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ScoutError::Config(format!("Failed to serialize config: {}", e)))
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay values from an environment lookup. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(roster) = get(ENV_ROSTER) {
            self.roster = Some(expand_path(roster.trim()));
        }
        if let Some(ledger) = get(ENV_LEDGER) {
            self.ledger = expand_path(ledger.trim());
        }
        if let Some(max) = get(ENV_MAX_COMPANIES) {
            self.max_companies_per_run = max.trim().parse().map_err(|_| {
                ScoutError::Config(format!("{} must be a whole number, got '{}'", ENV_MAX_COMPANIES, max))
            })?;
        }
        if let Some(token) = get(ENV_TELEGRAM_TOKEN) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = get(ENV_TELEGRAM_CHAT_ID) {
            self.telegram.chat_id = Some(chat_id);
        }
        Ok(())
    }

    /// Checks everything a run needs before any company is touched.
    pub fn validate(&self) -> Result<()> {
        if self.max_companies_per_run == 0 {
            return Err(ScoutError::Config(
                "max_companies_per_run must be at least 1".to_string(),
            ));
        }
        if self.job_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ScoutError::Config("job_keywords must not be empty".to_string()));
        }
        if self.career_indicators.iter().all(|k| k.trim().is_empty()) {
            return Err(ScoutError::Config(
                "career_indicators must not be empty".to_string(),
            ));
        }
        if self.tlds.iter().all(|t| t.trim().is_empty()) || self.max_candidates == 0 {
            return Err(ScoutError::Config(
                "at least one TLD and one candidate domain are required".to_string(),
            ));
        }
        if !(self.request_timeout_secs.is_finite() && self.request_timeout_secs > 0.0) {
            return Err(ScoutError::Config(format!(
                "request_timeout_secs must be positive, got {}",
                self.request_timeout_secs
            )));
        }
        if !(self.inter_company_delay_secs.is_finite() && self.inter_company_delay_secs >= 0.0) {
            return Err(ScoutError::Config(format!(
                "inter_company_delay_secs must not be negative, got {}",
                self.inter_company_delay_secs
            )));
        }
        if self.notifier == NotifierKind::Telegram {
            let missing = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
            if missing(&self.telegram.bot_token) {
                return Err(ScoutError::Config(format!(
                    "Telegram notifier selected but {} is not set",
                    ENV_TELEGRAM_TOKEN
                )));
            }
            if missing(&self.telegram.chat_id) {
                return Err(ScoutError::Config(format!(
                    "Telegram notifier selected but {} is not set",
                    ENV_TELEGRAM_CHAT_ID
                )));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.request_timeout_secs).unwrap_or(Duration::from_secs(10))
    }

    pub fn inter_company_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.inter_company_delay_secs).unwrap_or_default()
    }

    fn expand_paths(&mut self) {
        if let Some(roster) = &self.roster {
            self.roster = Some(expand_path(&roster.to_string_lossy()));
        }
        self.ledger = expand_path(&self.ledger.to_string_lossy());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn stdout_config() -> ScoutConfig {
        ScoutConfig {
            notifier: NotifierKind::Stdout,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = ScoutConfig::default();
        assert_eq!(config.max_companies_per_run, 10);
        assert!(config.job_keywords.contains(&"cloud engineer".to_string()));
        assert!(config.career_indicators.contains(&"careers".to_string()));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(config.roster_has_header);
        assert_eq!(config.notifier, NotifierKind::Telegram);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ScoutConfig::from_toml_str(
            r#"
            max_companies_per_run = 25
            job_keywords = ["site reliability engineer"]
            notifier = "stdout"
            inter_company_delay_secs = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.max_companies_per_run, 25);
        assert_eq!(config.job_keywords, vec!["site reliability engineer"]);
        assert_eq!(config.notifier, NotifierKind::Stdout);
        assert_eq!(config.inter_company_delay(), Duration::from_millis(500));
        assert_eq!(config.career_paths, ScoutConfig::default().career_paths);
    }

    #[test]
    fn test_toml_telegram_table() {
        let config = ScoutConfig::from_toml_str(
            r#"
            [telegram]
            bot_token = "123:abc"
            chat_id = "-100200"
            "#,
        )
        .unwrap();
        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let err = ScoutConfig::from_toml_str("max_companies_per_run = \"ten\"").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_MAX_COMPANIES, "3"),
            (ENV_TELEGRAM_TOKEN, "tok"),
            (ENV_TELEGRAM_CHAT_ID, "42"),
            (ENV_ROSTER, "/data/companies.csv"),
            (ENV_LEDGER, "   "),
        ]);
        let mut config = ScoutConfig::default();
        let ledger_before = config.ledger.clone();
        config
            .apply_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.max_companies_per_run, 3);
        assert_eq!(config.telegram.chat_id.as_deref(), Some("42"));
        assert_eq!(config.roster, Some(PathBuf::from("/data/companies.csv")));
        assert_eq!(config.ledger, ledger_before);
    }

    #[test]
    fn test_env_bad_number() {
        let mut config = ScoutConfig::default();
        let err = config
            .apply_env_from(|k| (k == ENV_MAX_COMPANIES).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_validate_requires_telegram_credentials() {
        let config = ScoutConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(ENV_TELEGRAM_TOKEN));

        let config = ScoutConfig {
            telegram: TelegramConfig {
                bot_token: Some("tok".into()),
                chat_id: None,
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(ENV_TELEGRAM_CHAT_ID));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = stdout_config();
        assert!(config.validate().is_ok());

        config.max_companies_per_run = 0;
        assert!(config.validate().is_err());

        let mut config = stdout_config();
        config.job_keywords = vec!["  ".into()];
        assert!(config.validate().is_err());

        let mut config = stdout_config();
        config.request_timeout_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = stdout_config();
        config.inter_company_delay_secs = -1.0;
        assert!(config.validate().is_err());

        let mut config = stdout_config();
        config.request_timeout_secs = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = stdout_config();
        let text = config.to_toml_string().unwrap();
        assert_eq!(ScoutConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let err = ScoutConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.is_config());
    }
}
