use anyhow::{Context, Result, anyhow, bail};
use clap::ArgMatches;
use colored::{ColoredString, Colorize};
use jobscout_core::config::{
    CONFIG_FILE_NAME, LEDGER_FILE_NAME, NotifierKind, ScoutConfig, expand_path,
};
use jobscout_core::ledger::{Ledger, SqliteLedgerStore, company_key};
use jobscout_core::notify::{Notifier, StdoutNotifier, TelegramNotifier};
use jobscout_core::pipeline::{CompanyResult, Pipeline};
use jobscout_core::report::{ReportFormat, generate_report, save_report};
use jobscout_core::roster::load_roster;
use jobscout_scanner::{CrawlOutcome, DomainGuesser, OutcomeKind, Prober};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "jobscout=info,jobscout_core=info,jobscout_scanner=info";
const VERBOSE_LOG_FILTER: &str = "jobscout=debug,jobscout_core=debug,jobscout_scanner=debug";

/// Logs go to stderr so reports on stdout stay machine readable.
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

pub fn print_banner() {
    println!(
        "{} {}",
        "jobscout".bright_cyan().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
    println!("{}", "careers page scout and job title alerts".bright_black());
    println!();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn confirmed(response: &str) -> bool {
    response == "y" || response == "yes"
}

// Arguments shared between subcommands are looked up leniently: an id a
// subcommand does not define reads as absent.
fn opt<'a, T: Clone + Send + Sync + 'static>(args: &'a ArgMatches, id: &str) -> Option<&'a T> {
    args.try_get_one::<T>(id).ok().flatten()
}

fn flag(args: &ArgMatches, id: &str) -> bool {
    opt::<bool>(args, id).copied().unwrap_or(false)
}

// ============================================================================
// Configuration
// ============================================================================

/// Defaults, then the config file, then the environment (including `.env`).
pub fn resolve_config(args: &ArgMatches) -> Result<ScoutConfig> {
    let path = opt::<String>(args, "config").map(|p| expand_path(p));
    let mut config = ScoutConfig::load(path.as_deref())?;
    config.apply_env()?;
    Ok(config)
}

/// Command-line flags win over every other layer.
pub fn apply_run_overrides(config: &mut ScoutConfig, args: &ArgMatches) -> Result<()> {
    if let Some(roster) = opt::<String>(args, "roster") {
        config.roster = Some(expand_path(roster));
    }
    if let Some(ledger) = opt::<String>(args, "ledger") {
        config.ledger = expand_path(ledger);
    }
    if let Some(max) = opt::<usize>(args, "max-companies") {
        config.max_companies_per_run = *max;
    }
    if let Some(delay) = opt::<f64>(args, "delay") {
        config.inter_company_delay_secs = *delay;
    }
    if let Some(timeout) = opt::<f64>(args, "timeout") {
        config.request_timeout_secs = *timeout;
    }
    if let Some(kind) = opt::<String>(args, "notifier") {
        config.notifier = NotifierKind::from_str(kind)
            .ok_or_else(|| anyhow!("Unknown notifier '{}'", kind))?;
    }
    if flag(args, "no-header") {
        config.roster_has_header = false;
    }
    if flag(args, "recycle") {
        config.recycle_when_exhausted = true;
    }
    Ok(())
}

pub fn build_notifier(config: &ScoutConfig) -> Result<Box<dyn Notifier>> {
    match config.notifier {
        NotifierKind::Stdout => Ok(Box::new(StdoutNotifier)),
        NotifierKind::Telegram => {
            let token = config.telegram.bot_token.as_deref().unwrap_or_default();
            let chat_id = config.telegram.chat_id.as_deref().unwrap_or_default();
            if token.is_empty() || chat_id.is_empty() {
                bail!("Telegram notifier selected but credentials are missing");
            }
            Ok(Box::new(TelegramNotifier::new(token, chat_id)?))
        }
    }
}

fn report_format(args: &ArgMatches) -> ReportFormat {
    opt::<String>(args, "format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

// ============================================================================
// init
// ============================================================================

/// Writes a default `config.toml` into `config_dir` whose ledger lives next
/// to it. Returns the config path.
pub fn write_default_config(config_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let config = ScoutConfig {
        ledger: config_dir.join(LEDGER_FILE_NAME),
        ..Default::default()
    };
    let config_path = config_dir.join(CONFIG_FILE_NAME);
    fs::write(&config_path, config.to_toml_string()?)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    Ok(config_path)
}

/// Creates an empty SQLite ledger, replacing an existing one when `replace`.
pub fn initialize_ledger(ledger_path: &Path, replace: bool) -> Result<()> {
    if replace && SqliteLedgerStore::exists(ledger_path) {
        SqliteLedgerStore::drop(ledger_path)?;
    }
    Ledger::open(ledger_path)
        .with_context(|| format!("Failed to create ledger at {}", ledger_path.display()))?;
    Ok(())
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  JOBSCOUT INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let dir = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or("~/.config/jobscout/");
    let force = args.get_flag("force");
    let config_dir = expand_path(dir);
    let config_path = config_dir.join(CONFIG_FILE_NAME);
    let ledger_path = config_dir.join(LEDGER_FILE_NAME);

    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    let mut write_config = true;
    if config_path.exists() && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("A config file already exists:");
        println!(
            "  {} {}",
            "•".yellow(),
            config_path.display().to_string().bright_white()
        );
        println!();

        let response = print_prompt("Overwrite it with the defaults? [y/N]:")?;
        println!();
        write_config = confirmed(&response);
        if !write_config {
            println!("{} Keeping existing config", "→".blue());
        }
    }

    if write_config {
        let written = write_default_config(&config_dir)?;
        println!(
            "{} Config written: {}",
            "✓".green().bold(),
            written.display().to_string().bright_white()
        );
    }

    let mut replace_ledger = force;
    if SqliteLedgerStore::exists(&ledger_path) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("A ledger already exists. Replacing it means every company is scanned again.");
        let response = print_prompt("Replace the ledger? [y/N]:")?;
        println!();
        replace_ledger = confirmed(&response);
    }
    initialize_ledger(&ledger_path, replace_ledger)?;
    println!(
        "{} Ledger ready: {}",
        "✓".green().bold(),
        ledger_path.display().to_string().bright_white()
    );

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Set {} and {} (or use --notifier stdout), then point {} at your roster.",
        "ℹ".blue(),
        "TELEGRAM_BOT_TOKEN".cyan(),
        "TELEGRAM_CHAT_ID".cyan(),
        "JOBSCOUT_ROSTER".cyan()
    );
    println!();
    Ok(())
}

// ============================================================================
// run
// ============================================================================

pub async fn handle_run(args: &ArgMatches) -> Result<()> {
    let quiet = flag(args, "quiet");
    let mut config = resolve_config(args)?;
    apply_run_overrides(&mut config, args)?;
    config.validate()?;

    let notifier = build_notifier(&config)?;

    let prepared = prepare_run(&config);
    let (roster, mut ledger) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            if let Err(notify_err) = notifier.notify_failure(&format!("{:#}", e)).await {
                warn!("Failure notification not delivered: {}", notify_err);
            }
            return Err(e);
        }
    };

    if !quiet {
        println!(
            "{} {} companies in roster, up to {} this run",
            "🔎".bright_cyan(),
            roster.len().to_string().cyan(),
            config.max_companies_per_run.to_string().cyan()
        );
        println!(
            "{} Ledger: {} ({} entries)",
            "→".blue(),
            ledger.location().bright_white(),
            ledger.len()
        );
        println!();
    }

    let prober = Prober::with_timeout(config.request_timeout())?;
    let pipeline = Pipeline::from_config(&config, prober).with_progress(!quiet);
    let report = pipeline
        .run(&roster, &mut ledger, notifier.as_ref())
        .await
        .context("Run aborted")?;

    info!(
        "Run {} finished: {} processed, {} matches, {} errors",
        report.run_id,
        report.processed_count(),
        report.match_count(),
        report.error_count()
    );

    let format = report_format(args);
    let rendered = generate_report(&report, format)?;
    match opt::<PathBuf>(args, "output") {
        Some(path) => {
            save_report(&rendered, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet {
                println!(
                    "{} Report saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }
        None if format == ReportFormat::Json || !quiet => println!("{}", rendered),
        None => {}
    }

    Ok(())
}

fn prepare_run(config: &ScoutConfig) -> Result<(Vec<String>, Ledger)> {
    let roster_path = config
        .roster
        .as_ref()
        .ok_or_else(|| anyhow!("No roster configured: pass --roster or set JOBSCOUT_ROSTER"))?;
    let roster = load_roster(roster_path, config.roster_has_header)?;
    let ledger = Ledger::open(&config.ledger)
        .with_context(|| format!("Failed to open ledger {}", config.ledger.display()))?;
    Ok((roster, ledger))
}

// ============================================================================
// probe / guess
// ============================================================================

pub async fn handle_probe(args: &ArgMatches) -> Result<()> {
    let company = args
        .get_one::<String>("COMPANY")
        .ok_or_else(|| anyhow!("A company name is required"))?;

    let mut config = resolve_config(args)?;
    apply_run_overrides(&mut config, args)?;
    config.notifier = NotifierKind::Stdout;
    config.validate()?;

    let prober = Prober::with_timeout(config.request_timeout())?;
    let pipeline = Pipeline::from_config(&config, prober);
    let result = pipeline.scan_company(company).await;

    match report_format(args) {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        ReportFormat::Text => print_company_result(&result),
    }
    Ok(())
}

pub fn outcome_label(kind: OutcomeKind) -> ColoredString {
    let label = kind.as_str().to_uppercase();
    match kind {
        OutcomeKind::MatchFound => label.green().bold(),
        OutcomeKind::NoMatch => label.normal(),
        OutcomeKind::NoCareerPage => label.yellow(),
        OutcomeKind::Unreachable => label.bright_black(),
        OutcomeKind::Error => label.red().bold(),
    }
}

fn print_company_result(result: &CompanyResult) {
    println!("{}", result.company.bright_white().bold());
    println!("  {} {}", "Outcome:".blue(), outcome_label(result.outcome.kind()));
    println!("  {} {:?}", "Stage:".blue(), result.stage);
    if let Some(website) = &result.website {
        println!("  {} {}", "Website:".blue(), website);
    }
    match &result.outcome {
        CrawlOutcome::MatchFound { titles, page_url } => {
            println!("  {} {}", "Career page:".blue(), page_url);
            for title in titles {
                println!("    {} {}", "•".green(), title);
            }
        }
        CrawlOutcome::NoMatch { page_url } => {
            println!("  {} {}", "Career page:".blue(), page_url);
        }
        CrawlOutcome::Error { reason } => {
            println!("  {} {}", "Reason:".blue(), reason.red());
        }
        CrawlOutcome::NoCareerPage | CrawlOutcome::Unreachable => {}
    }
    println!("  {} {}ms", "Time:".blue(), result.elapsed_ms);
}

pub fn handle_guess(args: &ArgMatches) -> Result<()> {
    let company = args
        .get_one::<String>("COMPANY")
        .ok_or_else(|| anyhow!("A company name is required"))?;
    let config = resolve_config(args)?;

    let guesser = DomainGuesser::new()
        .with_tlds(config.tlds.clone())
        .with_max_candidates(config.max_candidates);
    let candidates = guesser.guess(company);

    if candidates.is_empty() {
        println!(
            "{} No usable name tokens in '{}'",
            "✗".red().bold(),
            company
        );
        return Ok(());
    }

    for (i, candidate) in candidates.iter().enumerate() {
        println!("{:>2}. {}", i + 1, candidate);
    }
    Ok(())
}

// ============================================================================
// ledger
// ============================================================================

fn open_ledger(args: &ArgMatches) -> Result<Ledger> {
    let mut config = resolve_config(args)?;
    apply_run_overrides(&mut config, args)?;
    Ledger::open(&config.ledger)
        .with_context(|| format!("Failed to open ledger {}", config.ledger.display()))
}

pub fn handle_ledger_list(args: &ArgMatches) -> Result<()> {
    let ledger = open_ledger(args)?;

    if report_format(args) == ReportFormat::Json {
        println!("{}", serde_json::to_string_pretty(ledger.entries())?);
        return Ok(());
    }

    if ledger.is_empty() {
        println!("{} Ledger is empty ({})", "ℹ".blue(), ledger.location());
        return Ok(());
    }

    for entry in ledger.entries() {
        let detail = match &entry.outcome {
            CrawlOutcome::MatchFound { titles, page_url } => format!(
                "{} [{}]",
                page_url,
                titles.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
            CrawlOutcome::NoMatch { page_url } => page_url.clone(),
            CrawlOutcome::Error { reason } => reason.clone(),
            CrawlOutcome::NoCareerPage | CrawlOutcome::Unreachable => String::new(),
        };
        println!(
            "{}  {:<16}  {}  {}",
            entry.processed_at.format("%Y-%m-%d %H:%M").to_string().bright_black(),
            outcome_label(entry.outcome.kind()),
            entry.company.bright_white(),
            detail.bright_black()
        );
    }
    println!();
    println!("{} entries in {}", ledger.len(), ledger.location());
    Ok(())
}

pub fn handle_ledger_forget(args: &ArgMatches) -> Result<()> {
    let company = args
        .get_one::<String>("COMPANY")
        .ok_or_else(|| anyhow!("A company name is required"))?;
    let mut ledger = open_ledger(args)?;

    if ledger.remove(&company_key(company)).is_none() {
        bail!("'{}' is not in the ledger", company);
    }
    ledger.persist()?;
    println!(
        "{} {} will be scanned again on the next run",
        "✓".green().bold(),
        company.bright_white()
    );
    Ok(())
}

pub fn handle_ledger_clear(args: &ArgMatches) -> Result<()> {
    let mut ledger = open_ledger(args)?;
    if ledger.is_empty() {
        println!("{} Ledger is already empty", "ℹ".blue());
        return Ok(());
    }

    if !flag(args, "force") {
        println!(
            "{} This removes {} entries; every company will be scanned again.",
            "⚠".yellow().bold(),
            ledger.len()
        );
        let response = print_prompt("Continue? [y/N]:")?;
        if !confirmed(&response) {
            println!("{} Cancelled.", "✗".red().bold());
            return Ok(());
        }
    }

    let removed = ledger.len();
    ledger.clear();
    ledger.persist()?;
    println!("{} Removed {} entries", "✓".green().bold(), removed);
    Ok(())
}

pub fn handle_ledger_retry_errors(args: &ArgMatches) -> Result<()> {
    let mut ledger = open_ledger(args)?;
    let removed = ledger.forget_retriable();
    ledger.persist()?;
    println!(
        "{} {} errored companies queued for retry",
        "✓".green().bold(),
        removed
    );
    Ok(())
}

pub fn handle_ledger_runs(args: &ArgMatches) -> Result<()> {
    let ledger = open_ledger(args)?;
    let runs = ledger.runs()?;
    if runs.is_empty() {
        println!("{} No runs recorded ({})", "ℹ".blue(), ledger.location());
        return Ok(());
    }

    for run in runs {
        println!(
            "{}  {:<9}  processed {:>3}  matches {:>3}  errors {:>3}  skipped {:>4}  {}",
            run.started_at.format("%Y-%m-%d %H:%M").to_string().bright_black(),
            run.status.as_str(),
            run.processed,
            run.matches,
            run.errors,
            run.skipped,
            run.id.bright_black()
        );
    }
    Ok(())
}
