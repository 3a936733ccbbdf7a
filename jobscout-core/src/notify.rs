// Notification sinks for match alerts and run summaries

use crate::error::{Result, ScoutError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchAlert {
    pub company: String,
    pub matched_titles: Vec<String>,
    pub page_url: String,
    pub website: Option<String>,
    pub found_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub processed_count: usize,
    pub match_count: usize,
    pub error_count: usize,
    pub skipped_count: usize,
    pub companies_with_matches: Vec<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_match(&self, alert: &MatchAlert) -> Result<()>;

    async fn notify_summary(&self, summary: &RunSummary) -> Result<()>;

    async fn notify_failure(&self, message: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Markup {
    Html,
    Plain,
}

fn escape(text: &str, markup: Markup) -> String {
    match markup {
        Markup::Plain => text.to_string(),
        Markup::Html => text
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    }
}

fn bold(text: &str, markup: Markup) -> String {
    match markup {
        Markup::Plain => text.to_string(),
        Markup::Html => format!("<b>{}</b>", text),
    }
}

/// "senior devops engineer" -> "Senior Devops Engineer"
pub fn title_case(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_match(alert: &MatchAlert, markup: Markup) -> String {
    let mut message = String::new();
    message.push_str(&format!("🎉 {}\n\n", bold("Job Alert!", markup)));
    message.push_str(&format!(
        "{} {}\n",
        bold("Company:", markup),
        escape(&alert.company, markup)
    ));
    if let Some(website) = &alert.website {
        message.push_str(&format!(
            "{} {}\n",
            bold("Website:", markup),
            escape(website, markup)
        ));
    }
    message.push_str(&format!("{}\n", bold("Found Positions:", markup)));
    for title in &alert.matched_titles {
        message.push_str(&format!("• {}\n", escape(&title_case(title), markup)));
    }
    message.push_str(&format!(
        "\n{} {}\n",
        bold("Career Page:", markup),
        escape(&alert.page_url, markup)
    ));
    message.push_str(&format!(
        "\n{} {}",
        bold("Time:", markup),
        alert.found_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    message
}

pub fn format_summary(summary: &RunSummary, markup: Markup) -> String {
    let mut message = String::new();
    message.push_str(&format!("📊 {}\n\n", bold("Crawling Summary", markup)));
    message.push_str(&format!(
        "{} {}\n",
        bold("Companies Processed:", markup),
        summary.processed_count
    ));
    message.push_str(&format!(
        "{} {}\n",
        bold("Jobs Found:", markup),
        summary.match_count
    ));
    message.push_str(&format!(
        "{} {}\n",
        bold("Errors:", markup),
        summary.error_count
    ));
    if summary.skipped_count > 0 {
        message.push_str(&format!(
            "{} {}\n",
            bold("Skipped (already processed):", markup),
            summary.skipped_count
        ));
    }
    if !summary.companies_with_matches.is_empty() {
        message.push_str(&format!("\n{}\n", bold("Companies with Openings:", markup)));
        for company in &summary.companies_with_matches {
            message.push_str(&format!("• {}\n", escape(company, markup)));
        }
    }
    message.trim_end().to_string()
}

pub fn format_failure(message: &str, markup: Markup) -> String {
    format!("❌ Job crawler encountered an error: {}", escape(message, markup))
}

// ============================================================================
// Telegram
// ============================================================================

pub struct TelegramNotifier {
    client: Client,
    bot_token: String,
    chat_id: String,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            api_base: TELEGRAM_API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    async fn send(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);

        let mut form_body: HashMap<&str, &str> = HashMap::new();
        form_body.insert("chat_id", &self.chat_id);
        form_body.insert("text", text);
        form_body.insert("parse_mode", "HTML");
        form_body.insert("disable_web_page_preview", "true");

        let response = self.client.post(url).form(&form_body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ScoutError::Notify(format!(
                "Telegram returned {}: {}",
                status, error_body
            )));
        }

        info!("Telegram notification sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify_match(&self, alert: &MatchAlert) -> Result<()> {
        self.send(&format_match(alert, Markup::Html)).await
    }

    async fn notify_summary(&self, summary: &RunSummary) -> Result<()> {
        self.send(&format_summary(summary, Markup::Html)).await
    }

    async fn notify_failure(&self, message: &str) -> Result<()> {
        self.send(&format_failure(message, Markup::Html)).await
    }
}

// ============================================================================
// Stdout
// ============================================================================

/// Prints messages instead of sending them. Used for local and dry runs.
#[derive(Debug, Default)]
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn notify_match(&self, alert: &MatchAlert) -> Result<()> {
        debug!("Printing match alert for {}", alert.company);
        println!("\n{}\n", format_match(alert, Markup::Plain));
        Ok(())
    }

    async fn notify_summary(&self, summary: &RunSummary) -> Result<()> {
        println!("\n{}\n", format_summary(summary, Markup::Plain));
        Ok(())
    }

    async fn notify_failure(&self, message: &str) -> Result<()> {
        eprintln!("{}", format_failure(message, Markup::Plain));
        Ok(())
    }
}
