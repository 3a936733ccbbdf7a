use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// A page that answered a probe successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    pub requested_url: String,
    /// Final URL after redirects.
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub response_time: Duration,
    pub body: String,
}

impl FetchedPage {
    pub fn new(requested_url: String, url: String, body: String) -> Self {
        Self {
            requested_url,
            url,
            status_code: 200,
            content_type: Some("text/html".to_string()),
            response_time: Duration::from_secs(0),
            body,
        }
    }

    pub fn is_html(&self) -> bool {
        match self.content_type.as_ref() {
            Some(ct) => ct.contains("html"),
            None => self.body.trim_start().starts_with('<'),
        }
    }
}

/// Terminal classification of one company in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrawlOutcome {
    MatchFound {
        titles: BTreeSet<String>,
        page_url: String,
    },
    NoCareerPage,
    NoMatch {
        page_url: String,
    },
    Unreachable,
    Error {
        reason: String,
    },
}

impl CrawlOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            CrawlOutcome::MatchFound { .. } => OutcomeKind::MatchFound,
            CrawlOutcome::NoCareerPage => OutcomeKind::NoCareerPage,
            CrawlOutcome::NoMatch { .. } => OutcomeKind::NoMatch,
            CrawlOutcome::Unreachable => OutcomeKind::Unreachable,
            CrawlOutcome::Error { .. } => OutcomeKind::Error,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, CrawlOutcome::MatchFound { .. })
    }

    pub fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }

    pub fn page_url(&self) -> Option<&str> {
        match self {
            CrawlOutcome::MatchFound { page_url, .. } | CrawlOutcome::NoMatch { page_url } => {
                Some(page_url)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    MatchFound,
    NoCareerPage,
    NoMatch,
    Unreachable,
    Error,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::MatchFound => "match_found",
            OutcomeKind::NoCareerPage => "no_career_page",
            OutcomeKind::NoMatch => "no_match",
            OutcomeKind::Unreachable => "unreachable",
            OutcomeKind::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "match_found" => Some(OutcomeKind::MatchFound),
            "no_career_page" => Some(OutcomeKind::NoCareerPage),
            "no_match" => Some(OutcomeKind::NoMatch),
            "unreachable" => Some(OutcomeKind::Unreachable),
            "error" => Some(OutcomeKind::Error),
            _ => None,
        }
    }

    /// Only transient errors are picked up again by a later run.
    pub fn is_retriable(&self) -> bool {
        matches!(self, OutcomeKind::Error)
    }
}
