pub mod domain;
pub mod error;
pub mod locator;
pub mod matcher;
pub mod prober;
pub mod result;

pub use domain::DomainGuesser;
pub use error::ScanError;
pub use locator::{CareerLink, CareerLocator, CareerPage, CareerSource};
pub use matcher::JobMatcher;
pub use prober::{Fetch, Prober, first_reachable};
pub use result::{CrawlOutcome, FetchedPage, OutcomeKind};
