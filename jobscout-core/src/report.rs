// Run report generation

use crate::notify::{RunSummary, title_case};
use crate::pipeline::CompanyResult;
use chrono::{DateTime, Utc};
use jobscout_scanner::{CrawlOutcome, OutcomeKind};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const HEAVY_RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const LIGHT_RULE: &str =
    "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Everything one invocation of the pipeline did, in roster order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub results: Vec<CompanyResult>,
    /// Roster companies the ledger already settled.
    pub skipped: usize,
    /// Eligible companies left for a later run by the cap.
    pub deferred: usize,
    /// Repeated or blank roster names.
    pub duplicates: usize,
    /// The ledger was cleared because the whole roster had been processed.
    pub recycled: bool,
}

impl RunReport {
    pub fn new(run_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.to_string(),
            started_at,
            finished_at: None,
            results: Vec::new(),
            skipped: 0,
            deferred: 0,
            duplicates: 0,
            recycled: false,
        }
    }

    pub fn processed_count(&self) -> usize {
        self.results.len()
    }

    pub fn match_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_match()).count()
    }

    pub fn error_count(&self) -> usize {
        self.count(OutcomeKind::Error)
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.kind() == kind)
            .count()
    }

    pub fn companies_with_matches(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.outcome.is_match())
            .map(|r| r.company.clone())
            .collect()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            processed_count: self.processed_count(),
            match_count: self.match_count(),
            error_count: self.error_count(),
            skipped_count: self.skipped,
            companies_with_matches: self.companies_with_matches(),
        }
    }

    fn duration_secs(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_seconds())
    }
}

pub fn generate_report(report: &RunReport, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(report)),
        ReportFormat::Json => generate_json_report(report),
    }
}

pub fn generate_text_report(report: &RunReport) -> String {
    let mut out = String::new();

    out.push_str(HEAVY_RULE);
    out.push_str("                            JOBSCOUT RUN REPORT\n");
    out.push_str(HEAVY_RULE);
    out.push('\n');

    out.push_str(&format!("Run ID:       {}\n", report.run_id));
    out.push_str(&format!(
        "Started:      {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(secs) = report.duration_secs() {
        out.push_str(&format!("Duration:     {} seconds\n", secs));
    }
    if report.recycled {
        out.push_str("Roster:       exhausted, ledger cleared and restarted\n");
    }
    out.push('\n');

    out.push_str(HEAVY_RULE);
    out.push_str("SUMMARY\n");
    out.push_str(HEAVY_RULE);
    out.push('\n');

    out.push_str(&format!("Processed:        {}\n", report.processed_count()));
    out.push_str(&format!("Matches:          {}\n", report.match_count()));
    out.push_str(&format!("No match:         {}\n", report.count(OutcomeKind::NoMatch)));
    out.push_str(&format!(
        "No career page:   {}\n",
        report.count(OutcomeKind::NoCareerPage)
    ));
    out.push_str(&format!(
        "Unreachable:      {}\n",
        report.count(OutcomeKind::Unreachable)
    ));
    out.push_str(&format!("Errors:           {}\n", report.error_count()));
    out.push_str(&format!("Already done:     {}\n", report.skipped));
    if report.deferred > 0 {
        out.push_str(&format!("Left for later:   {}\n", report.deferred));
    }
    out.push('\n');

    if !report.results.is_empty() {
        out.push_str(HEAVY_RULE);
        out.push_str("COMPANIES\n");
        out.push_str(HEAVY_RULE);
        out.push('\n');

        for (idx, result) in report.results.iter().enumerate() {
            out.push_str(&format!("[{}] {}\n", idx + 1, result.company));
            out.push_str(&format!(
                "Outcome:      {}\n",
                result.outcome.kind().as_str().to_uppercase()
            ));
            if let Some(website) = &result.website {
                out.push_str(&format!("Website:      {}\n", website));
            }
            match &result.outcome {
                CrawlOutcome::MatchFound { titles, page_url } => {
                    out.push_str(&format!("Career page:  {}\n", page_url));
                    out.push_str("Positions:\n");
                    for title in titles {
                        out.push_str(&format!("  • {}\n", title_case(title)));
                    }
                }
                CrawlOutcome::NoMatch { page_url } => {
                    out.push_str(&format!("Career page:  {}\n", page_url));
                }
                CrawlOutcome::Error { reason } => {
                    out.push_str(&format!("Reason:       {}\n", reason));
                }
                CrawlOutcome::NoCareerPage | CrawlOutcome::Unreachable => {}
            }
            out.push_str(&format!("Time:         {}ms\n", result.elapsed_ms));
            out.push('\n');
            out.push_str(LIGHT_RULE);
            out.push('\n');
        }
    }

    out.push_str(HEAVY_RULE);
    out.push_str("                               End of Report\n");
    out.push_str(HEAVY_RULE);

    out
}

pub fn generate_json_report(report: &RunReport) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "jobscout",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": Utc::now().to_rfc3339(),
            },
            "run": {
                "id": report.run_id,
                "started_at": report.started_at.to_rfc3339(),
                "finished_at": report.finished_at.map(|t| t.to_rfc3339()),
                "duration_seconds": report.duration_secs(),
                "recycled": report.recycled,
            },
            "summary": {
                "processed": report.processed_count(),
                "matches": report.match_count(),
                "no_match": report.count(OutcomeKind::NoMatch),
                "no_career_page": report.count(OutcomeKind::NoCareerPage),
                "unreachable": report.count(OutcomeKind::Unreachable),
                "errors": report.error_count(),
                "skipped": report.skipped,
                "deferred": report.deferred,
            },
            "companies": report.results,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
