use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unexpected status {status} from {url}")]
    BadStatus { url: String, status: u16 },

    #[error("Empty response body from {0}")]
    EmptyBody(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    /// Network failures are expected while guessing domains and probing paths.
    /// Anything else points at a bug or a bad configuration.
    pub fn is_network(&self) -> bool {
        match self {
            ScanError::HttpError(e) => !e.is_builder(),
            ScanError::BadStatus { .. } | ScanError::EmptyBody(_) => true,
            ScanError::InvalidUrl(_) | ScanError::ParseError(_) | ScanError::Other(_) => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ScanError::HttpError(e) if e.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
