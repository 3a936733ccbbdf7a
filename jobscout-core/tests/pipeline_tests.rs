// End-to-end pipeline tests against an in-process fake web

use async_trait::async_trait;
use jobscout_core::ledger::{
    Ledger, LedgerEntry, LedgerStore, RunRecord, RunStatus, company_key,
};
use jobscout_core::notify::{MatchAlert, Notifier, RunSummary};
use jobscout_core::{Pipeline, ScoutError};
use jobscout_scanner::error::Result as ScanResult;
use jobscout_scanner::{CrawlOutcome, Fetch, FetchedPage, ScanError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct FakeWeb {
    pages: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl FakeWeb {
    fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn calls_for(&self, host: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.contains(host))
            .count()
    }
}

#[async_trait]
impl Fetch for FakeWeb {
    async fn fetch(&self, url: &str) -> ScanResult<FetchedPage> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(body) => Ok(FetchedPage::new(
                url.to_string(),
                url.to_string(),
                body.clone(),
            )),
            None => Err(ScanError::BadStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    matches: Mutex<Vec<MatchAlert>>,
    summaries: Mutex<Vec<RunSummary>>,
    failures: Mutex<Vec<String>>,
    fail_sends: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_match(&self, alert: &MatchAlert) -> jobscout_core::Result<()> {
        self.matches.lock().unwrap().push(alert.clone());
        if self.fail_sends {
            return Err(ScoutError::Notify("chat not found".into()));
        }
        Ok(())
    }

    async fn notify_summary(&self, summary: &RunSummary) -> jobscout_core::Result<()> {
        self.summaries.lock().unwrap().push(summary.clone());
        if self.fail_sends {
            return Err(ScoutError::Notify("chat not found".into()));
        }
        Ok(())
    }

    async fn notify_failure(&self, message: &str) -> jobscout_core::Result<()> {
        self.failures.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

fn roster(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn pipeline(web: FakeWeb) -> Pipeline<FakeWeb> {
    Pipeline::new(web).with_delay(Duration::ZERO)
}

// ============================================================================
// Outcome classification
// ============================================================================

#[tokio::test]
async fn test_all_candidates_unreachable() {
    let p = pipeline(FakeWeb::default());
    let mut ledger = Ledger::in_memory();
    let notifier = RecordingNotifier::default();

    let report = p
        .run(&roster(&["Acme Corp"]), &mut ledger, &notifier)
        .await
        .unwrap();

    assert_eq!(report.results[0].outcome, CrawlOutcome::Unreachable);
    assert!(notifier.matches.lock().unwrap().is_empty());
    assert_eq!(ledger.len(), 1);

    let summaries = notifier.summaries.lock().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].processed_count, 1);
    assert_eq!(summaries[0].match_count, 0);
}

#[tokio::test]
async fn test_homepage_without_career_page() {
    let web = FakeWeb::default().page(
        "https://techsolutions.co.uk",
        "<html><body><a href='/about'>About</a><p>We make widgets</p></body></html>",
    );
    let p = pipeline(web);
    let mut ledger = Ledger::in_memory();
    let notifier = RecordingNotifier::default();

    let report = p
        .run(&roster(&["Tech Solutions Ltd"]), &mut ledger, &notifier)
        .await
        .unwrap();

    assert_eq!(report.results[0].outcome, CrawlOutcome::NoCareerPage);
    assert_eq!(
        report.results[0].website.as_deref(),
        Some("https://techsolutions.co.uk")
    );
    assert_eq!(
        ledger.get("tech solutions ltd").unwrap().outcome,
        CrawlOutcome::NoCareerPage
    );
}

#[tokio::test]
async fn test_fallback_path_match_sends_one_alert() {
    let web = FakeWeb::default()
        .page("https://acme.co.uk", "<html><body>Welcome</body></html>")
        .page(
            "https://acme.co.uk/jobs",
            "<html><body><ul><li>Cloud Engineer</li><li>Office Manager</li></ul></body></html>",
        );
    let p = pipeline(web);
    let mut ledger = Ledger::in_memory();
    let notifier = RecordingNotifier::default();

    let report = p
        .run(&roster(&["Acme"]), &mut ledger, &notifier)
        .await
        .unwrap();

    let expected = CrawlOutcome::MatchFound {
        titles: ["cloud engineer".to_string()].into(),
        page_url: "https://acme.co.uk/jobs".into(),
    };
    assert_eq!(report.results[0].outcome, expected);
    assert_eq!(ledger.get("acme").unwrap().outcome, expected);

    let matches = notifier.matches.lock().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].company, "Acme");
    assert_eq!(matches[0].matched_titles, vec!["cloud engineer"]);
    assert_eq!(matches[0].website.as_deref(), Some("https://acme.co.uk"));
    assert_eq!(notifier.summaries.lock().unwrap()[0].companies_with_matches, vec!["Acme"]);
}

#[tokio::test]
async fn test_senior_title_matches_both_targets() {
    let web = FakeWeb::default()
        .page(
            "https://initech.co.uk",
            r#"<a href="https://initech.co.uk/careers">Careers</a>"#,
        )
        .page(
            "https://initech.co.uk/careers",
            "<html><body><h3>Senior DevOps Engineer</h3></body></html>",
        );
    let p = pipeline(web);
    let mut ledger = Ledger::in_memory();
    let notifier = RecordingNotifier::default();

    let report = p
        .run(&roster(&["Initech"]), &mut ledger, &notifier)
        .await
        .unwrap();

    match &report.results[0].outcome {
        CrawlOutcome::MatchFound { titles, .. } => {
            assert!(titles.contains("devops engineer"));
            assert!(titles.contains("senior devops engineer"));
        }
        other => panic!("expected a match, got {:?}", other),
    }
}

#[tokio::test]
async fn test_career_page_without_targets_is_no_match() {
    let web = FakeWeb::default()
        .page("https://globex.co.uk", r#"<a href="/careers">Join</a>"#)
        .page(
            "https://globex.co.uk/careers",
            "<html><body>Receptionist</body></html>",
        );
    let p = pipeline(web);
    let mut ledger = Ledger::in_memory();
    let notifier = RecordingNotifier::default();

    let report = p
        .run(&roster(&["Globex"]), &mut ledger, &notifier)
        .await
        .unwrap();

    assert_eq!(
        report.results[0].outcome,
        CrawlOutcome::NoMatch {
            page_url: "https://globex.co.uk/careers".into()
        }
    );
    assert!(notifier.matches.lock().unwrap().is_empty());
}

// ============================================================================
// Ledger interaction
// ============================================================================

#[tokio::test]
async fn test_ledgered_companies_make_no_network_calls() {
    let p = pipeline(FakeWeb::default());
    let mut ledger = Ledger::in_memory();
    let notifier = RecordingNotifier::default();
    let names = roster(&["Acme Corp", "Initech"]);

    p.run(&names, &mut ledger, &notifier).await.unwrap();
    let calls_after_first = p.fetcher().call_count();
    assert!(calls_after_first > 0);

    let report = p.run(&names, &mut ledger, &notifier).await.unwrap();
    assert_eq!(p.fetcher().call_count(), calls_after_first);
    assert_eq!(report.processed_count(), 0);
    assert_eq!(report.skipped, 2);

    // A run with nothing left to do still reports
    let summaries = notifier.summaries.lock().unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[1].processed_count, 0);
    assert_eq!(summaries[1].skipped_count, 2);
}

#[tokio::test]
async fn test_error_outcomes_are_retried() {
    let p = pipeline(FakeWeb::default());
    let mut ledger = Ledger::in_memory();
    ledger.record(LedgerEntry::new(
        "Acme",
        CrawlOutcome::Error {
            reason: "previous run crashed".into(),
        },
        chrono::Utc::now(),
    ));
    let notifier = RecordingNotifier::default();

    let report = p
        .run(&roster(&["Acme"]), &mut ledger, &notifier)
        .await
        .unwrap();

    assert_eq!(report.processed_count(), 1);
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.get("acme").unwrap().outcome, CrawlOutcome::Unreachable);
}

#[tokio::test]
async fn test_cap_processes_first_unledgered_companies_in_order() {
    let names: Vec<String> = (1..=20).map(|i| format!("Company {}", i)).collect();
    let p = pipeline(FakeWeb::default()).with_max_companies(10);
    let mut ledger = Ledger::in_memory();
    for done in ["Company 2", "Company 5"] {
        ledger.record(LedgerEntry::new(
            done,
            CrawlOutcome::NoCareerPage,
            chrono::Utc::now(),
        ));
    }
    let notifier = RecordingNotifier::default();

    let report = p.run(&names, &mut ledger, &notifier).await.unwrap();

    let processed: Vec<&str> = report.results.iter().map(|r| r.company.as_str()).collect();
    let expected: Vec<String> = [1, 3, 4, 6, 7, 8, 9, 10, 11, 12]
        .iter()
        .map(|i| format!("Company {}", i))
        .collect();
    assert_eq!(processed, expected);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.deferred, 8);
    assert_eq!(ledger.len(), 12);
    for i in 13..=20 {
        assert!(!ledger.has(&company_key(&format!("Company {}", i))));
        assert_eq!(p.fetcher().calls_for(&format!("company{}.", i)), 0);
    }
}

#[tokio::test]
async fn test_duplicate_names_processed_once() {
    let p = pipeline(FakeWeb::default());
    let mut ledger = Ledger::in_memory();
    let notifier = RecordingNotifier::default();

    let report = p
        .run(&roster(&["Acme Corp", "ACME  corp", "Acme Corp"]), &mut ledger, &notifier)
        .await
        .unwrap();

    assert_eq!(report.processed_count(), 1);
    assert_eq!(report.duplicates, 2);
    assert_eq!(ledger.len(), 1);
}

#[tokio::test]
async fn test_run_persists_to_disk_after_each_company() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("ledger.db");
    let p = pipeline(FakeWeb::default());
    let notifier = RecordingNotifier::default();

    {
        let mut ledger = Ledger::open(&db_path).unwrap();
        p.run(&roster(&["Acme", "Initech"]), &mut ledger, &notifier)
            .await
            .unwrap();
    }

    let reopened = Ledger::open(&db_path).unwrap();
    assert_eq!(reopened.len(), 2);
    assert!(reopened.should_skip("acme"));
    assert_eq!(reopened.runs().unwrap().len(), 1);
}

// ============================================================================
// Notification failures
// ============================================================================

#[tokio::test]
async fn test_notifier_failure_does_not_abort_or_roll_back() {
    let web = FakeWeb::default()
        .page("https://acme.co.uk", r#"<a href="/careers">Careers</a>"#)
        .page("https://acme.co.uk/careers", "Cloud Engineer wanted");
    let p = pipeline(web);
    let mut ledger = Ledger::in_memory();
    let notifier = RecordingNotifier::failing();

    let report = p
        .run(&roster(&["Acme", "Initech"]), &mut ledger, &notifier)
        .await
        .unwrap();

    assert_eq!(report.processed_count(), 2);
    assert_eq!(report.match_count(), 1);
    assert!(ledger.get("acme").unwrap().outcome.is_match());
    assert_eq!(notifier.summaries.lock().unwrap().len(), 1);
    assert!(notifier.failures.lock().unwrap().is_empty());
}

// ============================================================================
// Ledger write failures
// ============================================================================

/// Store that accepts run records but refuses every ledger write.
struct ReadOnlyStore {
    runs: Arc<Mutex<Vec<RunRecord>>>,
}

impl LedgerStore for ReadOnlyStore {
    fn load_all(&mut self) -> jobscout_core::Result<Vec<LedgerEntry>> {
        Ok(Vec::new())
    }

    fn persist_all(&mut self, _entries: &[LedgerEntry]) -> jobscout_core::Result<()> {
        Err(ScoutError::Ledger("disk full".into()))
    }

    fn record_run(&mut self, run: &RunRecord) -> jobscout_core::Result<()> {
        let mut runs = self.runs.lock().unwrap();
        match runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => *existing = run.clone(),
            None => runs.push(run.clone()),
        }
        Ok(())
    }

    fn runs(&self) -> jobscout_core::Result<Vec<RunRecord>> {
        Ok(self.runs.lock().unwrap().clone())
    }

    fn describe(&self) -> String {
        "read-only".to_string()
    }
}

#[tokio::test]
async fn test_ledger_write_failure_aborts_run() {
    let runs = Arc::new(Mutex::new(Vec::new()));
    let store = ReadOnlyStore { runs: runs.clone() };
    let mut ledger = Ledger::load(Box::new(store)).unwrap();
    let web = FakeWeb::default()
        .page("https://acme.co.uk", r#"<a href="/careers">Careers</a>"#)
        .page("https://acme.co.uk/careers", "Cloud Engineer wanted");
    let p = pipeline(web);
    let notifier = RecordingNotifier::default();

    let result = p
        .run(&roster(&["Acme", "Initech"]), &mut ledger, &notifier)
        .await;

    assert!(matches!(result, Err(ScoutError::Ledger(_))));

    let runs = runs.lock().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert!(runs[0].finished_at.is_some());

    let failures = notifier.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("disk full"));
    assert!(notifier.summaries.lock().unwrap().is_empty());
    // The aborted company never reaches the alert stage
    assert!(notifier.matches.lock().unwrap().is_empty());
    // Nothing after the failed write is scanned
    assert_eq!(p.fetcher().calls_for("initech"), 0);
}
