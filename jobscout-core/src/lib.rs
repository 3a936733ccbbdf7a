pub mod config;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod roster;

pub use config::ScoutConfig;
pub use error::{Result, ScoutError};
pub use ledger::{Ledger, LedgerEntry, LedgerStore};
pub use notify::{Notifier, StdoutNotifier, TelegramNotifier};
pub use pipeline::{CompanyResult, Pipeline, Stage};
pub use report::{ReportFormat, RunReport};
