use jobscout_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoutError {
    /// Fatal to the whole run; raised before any company is processed.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Roster error: {0}")]
    Roster(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ScoutError {
    pub fn is_config(&self) -> bool {
        matches!(self, ScoutError::Config(_) | ScoutError::Toml(_) | ScoutError::Roster(_))
    }
}

pub type Result<T> = std::result::Result<T, ScoutError>;
