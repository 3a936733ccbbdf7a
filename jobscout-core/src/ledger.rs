// Progress ledger: which companies have been processed and with what outcome

use crate::error::{Result, ScoutError};
use chrono::{DateTime, Utc};
use jobscout_scanner::{CrawlOutcome, OutcomeKind};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Ledger key for a company: lowercased, whitespace collapsed.
pub fn company_key(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub company_key: String,
    pub company: String,
    pub processed_at: DateTime<Utc>,
    pub outcome: CrawlOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl LedgerEntry {
    pub fn new(company: &str, outcome: CrawlOutcome, processed_at: DateTime<Utc>) -> Self {
        Self {
            company_key: company_key(company),
            company: company.trim().to_string(),
            processed_at,
            outcome,
            run_id: None,
        }
    }

    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Running,
        }
    }
}

/// One invocation of the pipeline, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub processed: usize,
    pub matches: usize,
    pub errors: usize,
    pub skipped: usize,
}

/// Durable backing for a [`Ledger`]. Only load-all / persist-all.
pub trait LedgerStore: Send {
    fn load_all(&mut self) -> Result<Vec<LedgerEntry>>;

    /// Replace the stored ledger with `entries`. Must be atomic: a crash
    /// leaves either the previous or the new contents.
    fn persist_all(&mut self, entries: &[LedgerEntry]) -> Result<()>;

    fn record_run(&mut self, _run: &RunRecord) -> Result<()> {
        Ok(())
    }

    fn runs(&self) -> Result<Vec<RunRecord>> {
        Ok(Vec::new())
    }

    fn describe(&self) -> String;
}

/// Mapping from company key to the outcome of its last processing.
/// Insertion order is kept for audit output.
pub struct Ledger {
    store: Box<dyn LedgerStore>,
    entries: Vec<LedgerEntry>,
    index: HashMap<String, usize>,
}

impl Ledger {
    /// Opens the ledger at `path`, choosing the store from the extension:
    /// `.json` is a JSON document, anything else is SQLite.
    pub fn open(path: &Path) -> Result<Self> {
        let store: Box<dyn LedgerStore> = if is_json_path(path) {
            Box::new(JsonLedgerStore::new(path))
        } else {
            Box::new(SqliteLedgerStore::open(path)?)
        };
        Self::load(store)
    }

    pub fn load(mut store: Box<dyn LedgerStore>) -> Result<Self> {
        let loaded = store.load_all()?;
        let mut ledger = Ledger {
            store,
            entries: Vec::with_capacity(loaded.len()),
            index: HashMap::new(),
        };
        for entry in loaded {
            ledger.record(entry);
        }
        Ok(ledger)
    }

    pub fn in_memory() -> Self {
        Ledger {
            store: Box::new(MemoryLedgerStore::default()),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&LedgerEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    /// True when the company is recorded with an outcome that a new run
    /// must not revisit.
    pub fn should_skip(&self, key: &str) -> bool {
        self.get(key).is_some_and(|entry| !entry.outcome.is_retriable())
    }

    /// Insert or overwrite the entry for its key. Never duplicates.
    pub fn record(&mut self, entry: LedgerEntry) {
        match self.index.get(&entry.company_key) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(entry.company_key.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<LedgerEntry> {
        let i = self.index.remove(key)?;
        let removed = self.entries.remove(i);
        self.reindex();
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Drop every retriable entry, returning how many went.
    pub fn forget_retriable(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !e.outcome.is_retriable());
        self.reindex();
        before - self.entries.len()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn persist(&mut self) -> Result<()> {
        self.store.persist_all(&self.entries)
    }

    pub fn record_run(&mut self, run: &RunRecord) -> Result<()> {
        self.store.record_run(run)
    }

    pub fn runs(&self) -> Result<Vec<RunRecord>> {
        self.store.runs()
    }

    pub fn location(&self) -> String {
        self.store.describe()
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.company_key.clone(), i))
            .collect();
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

// ============================================================================
// SQLite store
// ============================================================================

pub struct SqliteLedgerStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteLedgerStore {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn drop(path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let store = SqliteLedgerStore {
            conn,
            path: path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed')),
    processed INTEGER NOT NULL DEFAULT 0,
    matches INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS ledger (
    company_key TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    company TEXT NOT NULL,
    processed_at TEXT NOT NULL,
    outcome TEXT NOT NULL CHECK(outcome IN (
        'match_found',
        'no_career_page',
        'no_match',
        'unreachable',
        'error'
    )),
    page_url TEXT,
    matched_titles TEXT,      -- JSON array
    reason TEXT,
    run_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_ledger_position ON ledger(position);
CREATE INDEX IF NOT EXISTS idx_ledger_outcome ON ledger(outcome);
",
        )?;
        Ok(())
    }
}

fn outcome_from_columns(
    kind: &str,
    page_url: Option<String>,
    titles: Option<String>,
    reason: Option<String>,
) -> Result<CrawlOutcome> {
    let kind = OutcomeKind::parse(kind)
        .ok_or_else(|| ScoutError::Ledger(format!("Unknown outcome '{}'", kind)))?;
    let require_page_url = || {
        page_url
            .clone()
            .ok_or_else(|| ScoutError::Ledger(format!("{} entry without page_url", kind.as_str())))
    };

    Ok(match kind {
        OutcomeKind::MatchFound => {
            let titles: BTreeSet<String> = match titles {
                Some(json) => serde_json::from_str(&json)?,
                None => BTreeSet::new(),
            };
            CrawlOutcome::MatchFound {
                titles,
                page_url: require_page_url()?,
            }
        }
        OutcomeKind::NoMatch => CrawlOutcome::NoMatch {
            page_url: require_page_url()?,
        },
        OutcomeKind::NoCareerPage => CrawlOutcome::NoCareerPage,
        OutcomeKind::Unreachable => CrawlOutcome::Unreachable,
        OutcomeKind::Error => CrawlOutcome::Error {
            reason: reason.unwrap_or_default(),
        },
    })
}

impl LedgerStore for SqliteLedgerStore {
    fn load_all(&mut self) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT company_key, company, processed_at, outcome, page_url, matched_titles, reason, run_id
             FROM ledger ORDER BY position",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, DateTime<Utc>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(
                |(company_key, company, processed_at, kind, page_url, titles, reason, run_id)| {
                    Ok(LedgerEntry {
                        company_key,
                        company,
                        processed_at,
                        outcome: outcome_from_columns(&kind, page_url, titles, reason)?,
                        run_id,
                    })
                },
            )
            .collect()
    }

    fn persist_all(&mut self, entries: &[LedgerEntry]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM ledger", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO ledger (
                    company_key, position, company, processed_at, outcome,
                    page_url, matched_titles, reason, run_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;

            for (position, entry) in entries.iter().enumerate() {
                let titles = match &entry.outcome {
                    CrawlOutcome::MatchFound { titles, .. } => Some(serde_json::to_string(titles)?),
                    _ => None,
                };
                let reason = match &entry.outcome {
                    CrawlOutcome::Error { reason } => Some(reason.as_str()),
                    _ => None,
                };

                stmt.execute(params![
                    &entry.company_key,
                    position as i64,
                    &entry.company,
                    entry.processed_at,
                    entry.outcome.kind().as_str(),
                    entry.outcome.page_url(),
                    titles,
                    reason,
                    &entry.run_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn record_run(&mut self, run: &RunRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO runs (id, started_at, finished_at, status, processed, matches, errors, skipped)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                finished_at = excluded.finished_at,
                status = excluded.status,
                processed = excluded.processed,
                matches = excluded.matches,
                errors = excluded.errors,
                skipped = excluded.skipped",
            params![
                &run.id,
                run.started_at,
                run.finished_at,
                run.status.as_str(),
                run.processed as i64,
                run.matches as i64,
                run.errors as i64,
                run.skipped as i64,
            ],
        )?;
        Ok(())
    }

    fn runs(&self) -> Result<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, status, processed, matches, errors, skipped
             FROM runs ORDER BY started_at",
        )?;

        let runs = stmt
            .query_map([], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    status: RunStatus::parse(&row.get::<_, String>(3)?),
                    processed: row.get::<_, i64>(4)? as usize,
                    matches: row.get::<_, i64>(5)? as usize,
                    errors: row.get::<_, i64>(6)? as usize,
                    skipped: row.get::<_, i64>(7)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(runs)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

impl SqliteLedgerStore {
    /// Outcome of a single company straight from the database.
    pub fn lookup(&self, key: &str) -> Result<Option<OutcomeKind>> {
        let kind: Option<String> = self
            .conn
            .query_row(
                "SELECT outcome FROM ledger WHERE company_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(kind.as_deref().and_then(OutcomeKind::parse))
    }
}

// ============================================================================
// JSON store
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct JsonLedgerDocument {
    version: u32,
    entries: Vec<LedgerEntry>,
    #[serde(default)]
    runs: Vec<RunRecord>,
}

const JSON_LEDGER_VERSION: u32 = 1;

/// A single JSON document, replaced atomically through a sibling temp file.
pub struct JsonLedgerStore {
    path: PathBuf,
    runs: Vec<RunRecord>,
}

impl JsonLedgerStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            runs: Vec::new(),
        }
    }

    fn write(&self, entries: &[LedgerEntry]) -> Result<()> {
        let document = JsonLedgerDocument {
            version: JSON_LEDGER_VERSION,
            entries: entries.to_vec(),
            runs: self.runs.clone(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn read(&self) -> Result<JsonLedgerDocument> {
        if !self.path.exists() {
            return Ok(JsonLedgerDocument {
                version: JSON_LEDGER_VERSION,
                ..Default::default()
            });
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(JsonLedgerDocument::default());
        }
        let document: JsonLedgerDocument = serde_json::from_str(&content)?;
        if document.version > JSON_LEDGER_VERSION {
            return Err(ScoutError::Ledger(format!(
                "{} was written by a newer jobscout (version {})",
                self.path.display(),
                document.version
            )));
        }
        Ok(document)
    }
}

impl LedgerStore for JsonLedgerStore {
    fn load_all(&mut self) -> Result<Vec<LedgerEntry>> {
        let document = self.read()?;
        self.runs = document.runs;
        Ok(document.entries)
    }

    fn persist_all(&mut self, entries: &[LedgerEntry]) -> Result<()> {
        self.write(entries)
    }

    fn record_run(&mut self, run: &RunRecord) -> Result<()> {
        match self.runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => *existing = run.clone(),
            None => self.runs.push(run.clone()),
        }
        let entries = self.read()?.entries;
        self.write(&entries)
    }

    fn runs(&self) -> Result<Vec<RunRecord>> {
        Ok(self.runs.clone())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
pub struct MemoryLedgerStore {
    entries: Vec<LedgerEntry>,
    runs: Vec<RunRecord>,
}

impl LedgerStore for MemoryLedgerStore {
    fn load_all(&mut self) -> Result<Vec<LedgerEntry>> {
        Ok(self.entries.clone())
    }

    fn persist_all(&mut self, entries: &[LedgerEntry]) -> Result<()> {
        self.entries = entries.to_vec();
        Ok(())
    }

    fn record_run(&mut self, run: &RunRecord) -> Result<()> {
        match self.runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => *existing = run.clone(),
            None => self.runs.push(run.clone()),
        }
        Ok(())
    }

    fn runs(&self) -> Result<Vec<RunRecord>> {
        Ok(self.runs.clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, outcome: CrawlOutcome) -> LedgerEntry {
        LedgerEntry::new(name, outcome, Utc::now())
    }

    #[test]
    fn test_company_key_normalizes_case_and_whitespace() {
        assert_eq!(company_key("  Acme   Corp "), "acme corp");
        assert_eq!(company_key("ACME\tCorp"), "acme corp");
    }

    #[test]
    fn test_record_twice_keeps_one_entry() {
        let mut ledger = Ledger::in_memory();
        ledger.record(entry("Acme Corp", CrawlOutcome::Unreachable));
        ledger.record(entry("acme  corp", CrawlOutcome::Unreachable));

        assert_eq!(ledger.len(), 1);
        assert!(ledger.has("acme corp"));
    }

    #[test]
    fn test_record_overwrites_in_place() {
        let mut ledger = Ledger::in_memory();
        ledger.record(entry("First", CrawlOutcome::NoCareerPage));
        ledger.record(entry(
            "Second",
            CrawlOutcome::Error {
                reason: "boom".into(),
            },
        ));
        ledger.record(entry("Second", CrawlOutcome::Unreachable));

        let names: Vec<_> = ledger.entries().iter().map(|e| e.company.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert_eq!(
            ledger.get("second").unwrap().outcome,
            CrawlOutcome::Unreachable
        );
    }

    #[test]
    fn test_should_skip_only_non_retriable() {
        let mut ledger = Ledger::in_memory();
        ledger.record(entry("Gone", CrawlOutcome::Unreachable));
        ledger.record(entry(
            "Flaky",
            CrawlOutcome::Error {
                reason: "timeout".into(),
            },
        ));

        assert!(ledger.should_skip("gone"));
        assert!(!ledger.should_skip("flaky"));
        assert!(!ledger.should_skip("unknown"));
    }

    #[test]
    fn test_remove_reindexes() {
        let mut ledger = Ledger::in_memory();
        ledger.record(entry("A", CrawlOutcome::Unreachable));
        ledger.record(entry("B", CrawlOutcome::Unreachable));
        ledger.record(entry("C", CrawlOutcome::Unreachable));

        assert!(ledger.remove("a").is_some());
        assert!(ledger.remove("a").is_none());
        assert_eq!(ledger.get("c").unwrap().company, "C");
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_forget_retriable() {
        let mut ledger = Ledger::in_memory();
        ledger.record(entry("A", CrawlOutcome::Unreachable));
        ledger.record(entry("B", CrawlOutcome::Error { reason: "x".into() }));

        assert_eq!(ledger.forget_retriable(), 1);
        assert!(ledger.has("a"));
        assert!(!ledger.has("b"));
    }

    #[test]
    fn test_json_path_detection() {
        assert!(is_json_path(Path::new("ledger.json")));
        assert!(is_json_path(Path::new("/tmp/LEDGER.JSON")));
        assert!(!is_json_path(Path::new("ledger.db")));
        assert!(!is_json_path(Path::new("ledger")));
    }
}
