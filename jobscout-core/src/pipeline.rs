use crate::config::ScoutConfig;
use crate::error::{Result, ScoutError};
use crate::ledger::{Ledger, LedgerEntry, RunRecord, RunStatus, company_key};
use crate::notify::{MatchAlert, Notifier};
use crate::report::RunReport;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use jobscout_scanner::{
    CareerLocator, CrawlOutcome, DomainGuesser, Fetch, JobMatcher, ScanError, first_reachable,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where a company got to before its outcome was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    DomainResolving,
    ProbingCandidates,
    LocatingCareerPage,
    Matching,
    Recorded,
}

/// One company's pass through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyResult {
    pub company: String,
    pub key: String,
    /// Final URL of the homepage that answered, if any.
    pub website: Option<String>,
    /// Last stage reached before the outcome was decided.
    pub stage: Stage,
    pub outcome: CrawlOutcome,
    pub elapsed_ms: u64,
}

pub struct Pipeline<F: Fetch> {
    fetcher: F,
    guesser: DomainGuesser,
    locator: CareerLocator,
    matcher: JobMatcher,
    max_companies: usize,
    delay: Duration,
    recycle: bool,
    show_progress: bool,
}

impl<F: Fetch> Pipeline<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            guesser: DomainGuesser::new(),
            locator: CareerLocator::new(),
            matcher: JobMatcher::default(),
            max_companies: 10,
            delay: Duration::from_secs(3),
            recycle: false,
            show_progress: false,
        }
    }

    pub fn from_config(config: &ScoutConfig, fetcher: F) -> Self {
        Self {
            fetcher,
            guesser: DomainGuesser::new()
                .with_tlds(config.tlds.clone())
                .with_max_candidates(config.max_candidates),
            locator: CareerLocator::new()
                .with_indicators(config.career_indicators.clone())
                .with_fallback_paths(config.career_paths.clone()),
            matcher: JobMatcher::new(&config.job_keywords),
            max_companies: config.max_companies_per_run,
            delay: config.inter_company_delay(),
            recycle: config.recycle_when_exhausted,
            show_progress: false,
        }
    }

    pub fn with_matcher(mut self, matcher: JobMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_max_companies(mut self, max_companies: usize) -> Self {
        self.max_companies = max_companies;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_recycle(mut self, recycle: bool) -> Self {
        self.recycle = recycle;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Runs one company through guess, probe, locate and match. Never
    /// touches the ledger or a notifier, and never fails: every error is
    /// folded into the outcome.
    pub async fn scan_company(&self, company: &str) -> CompanyResult {
        let start = Instant::now();
        let mut result = CompanyResult {
            company: company.trim().to_string(),
            key: company_key(company),
            website: None,
            stage: Stage::Pending,
            outcome: CrawlOutcome::Unreachable,
            elapsed_ms: 0,
        };

        let outcome = self.classify(company, &mut result).await;
        result.outcome = outcome;
        result.elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            "{}: {} ({}ms)",
            result.company,
            result.outcome.kind().as_str(),
            result.elapsed_ms
        );
        result
    }

    async fn classify(&self, company: &str, result: &mut CompanyResult) -> CrawlOutcome {
        result.stage = Stage::DomainResolving;
        let candidates = self.guesser.guess(company);
        if candidates.is_empty() {
            debug!("No usable name tokens in '{}'", company);
            return CrawlOutcome::Unreachable;
        }
        debug!("Candidates for {}: {:?}", company, candidates);

        result.stage = Stage::ProbingCandidates;
        let homepage = match first_reachable(&self.fetcher, &candidates).await {
            Ok(Some(page)) => page,
            Ok(None) => return CrawlOutcome::Unreachable,
            Err(e) => return scan_failure(company, e),
        };
        result.website = Some(homepage.url.clone());

        result.stage = Stage::LocatingCareerPage;
        let career = match self.locator.locate(&self.fetcher, &homepage).await {
            Ok(Some(career)) => career,
            Ok(None) => return CrawlOutcome::NoCareerPage,
            Err(ScanError::ParseError(e)) => {
                debug!("Unparseable page for {}: {}", company, e);
                return CrawlOutcome::NoCareerPage;
            }
            Err(e) => return scan_failure(company, e),
        };

        result.stage = Stage::Matching;
        let titles = self.matcher.match_page(&career.page);
        let page_url = career.url().to_string();
        if titles.is_empty() {
            CrawlOutcome::NoMatch { page_url }
        } else {
            CrawlOutcome::MatchFound { titles, page_url }
        }
    }

    /// Processes up to the per-run cap of companies from `roster`, in order,
    /// skipping anything the ledger already settled. The ledger is persisted
    /// after every company. Only a ledger write failure aborts the run.
    pub async fn run(
        &self,
        roster: &[String],
        ledger: &mut Ledger,
        notifier: &dyn Notifier,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let mut report = RunReport::new(&run_id, Utc::now());
        ledger.record_run(&run_record(&report, RunStatus::Running))?;

        if self.recycle
            && !roster.is_empty()
            && roster.iter().all(|c| ledger.should_skip(&company_key(c)))
        {
            info!(
                "All {} roster companies already processed, starting over",
                roster.len()
            );
            ledger.clear();
            ledger.persist()?;
            report.recycled = true;
        }

        let selected = self.select(roster, ledger, &mut report);
        info!(
            "Run {}: {} to process, {} already processed, {} deferred",
            run_id,
            selected.len(),
            report.skipped,
            report.deferred
        );

        let progress = self.progress_bar();
        for (i, company) in selected.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                progress.set_message(format!("Waiting {:.1}s...", self.delay.as_secs_f64()));
                tokio::time::sleep(self.delay).await;
            }
            progress.set_message(format!("[{}/{}] {}", i + 1, selected.len(), company));

            let mut result = self.scan_company(company).await;

            let entry = LedgerEntry::new(company, result.outcome.clone(), Utc::now())
                .with_run_id(&run_id);
            ledger.record(entry);
            if let Err(e) = ledger.persist() {
                progress.finish_and_clear();
                return Err(self.fail_run(&mut report, ledger, notifier, e).await);
            }
            result.stage = Stage::Recorded;

            match &result.outcome {
                CrawlOutcome::MatchFound { titles, page_url } => {
                    let alert = MatchAlert {
                        company: result.company.clone(),
                        matched_titles: titles.iter().cloned().collect(),
                        page_url: page_url.clone(),
                        website: result.website.clone(),
                        found_at: Utc::now(),
                    };
                    if let Err(e) = notifier.notify_match(&alert).await {
                        warn!("Match alert for {} not delivered: {}", result.company, e);
                    }
                }
                CrawlOutcome::Error { reason } => {
                    warn!("{} failed: {}", result.company, reason);
                }
                _ => {}
            }

            report.results.push(result);
            progress.tick();
        }
        progress.finish_and_clear();

        report.finished_at = Some(Utc::now());
        if report.processed_count() == 0 {
            info!("Nothing to process this run");
        }
        if let Err(e) = notifier.notify_summary(&report.summary()).await {
            warn!("Run summary not delivered: {}", e);
        }

        if let Err(e) = ledger.record_run(&run_record(&report, RunStatus::Completed)) {
            warn!("Could not record run {}: {}", run_id, e);
        }

        Ok(report)
    }

    fn select(&self, roster: &[String], ledger: &Ledger, report: &mut RunReport) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut selected = Vec::new();

        for company in roster {
            let key = company_key(company);
            if key.is_empty() || !seen.insert(key.clone()) {
                report.duplicates += 1;
                continue;
            }
            if ledger.should_skip(&key) {
                debug!("Skipping {}: already processed", company);
                report.skipped += 1;
                continue;
            }
            if selected.len() >= self.max_companies {
                report.deferred += 1;
                continue;
            }
            selected.push(company.trim().to_string());
        }

        selected
    }

    async fn fail_run(
        &self,
        report: &mut RunReport,
        ledger: &mut Ledger,
        notifier: &dyn Notifier,
        error: ScoutError,
    ) -> ScoutError {
        report.finished_at = Some(Utc::now());
        if let Err(e) = ledger.record_run(&run_record(report, RunStatus::Failed)) {
            warn!("Could not record failed run {}: {}", report.run_id, e);
        }
        if let Err(e) = notifier.notify_failure(&error.to_string()).await {
            warn!("Failure notification not delivered: {}", e);
        }
        error
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message("Starting run...");
        pb
    }
}

fn scan_failure(company: &str, error: ScanError) -> CrawlOutcome {
    warn!("Unexpected failure scanning {}: {}", company, error);
    CrawlOutcome::Error {
        reason: error.to_string(),
    }
}

fn run_record(report: &RunReport, status: RunStatus) -> RunRecord {
    RunRecord {
        id: report.run_id.clone(),
        started_at: report.started_at,
        finished_at: report.finished_at,
        status,
        processed: report.processed_count(),
        matches: report.match_count(),
        errors: report.error_count(),
        skipped: report.skipped,
    }
}
