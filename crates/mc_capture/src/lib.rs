pub mod cleaner;
pub mod cli;
pub mod dates;
pub mod dedup;
pub mod extract;
pub mod fetch;
pub mod forward;
pub mod logging;
pub mod manager;
pub mod repair;
pub mod scrapers;

#[cfg(test)]
mod testing;

pub use cleaner::ContentCleaner;
pub use cli::{handle_command, CaptureCommands};
pub use dates::{ClockLayout, DateNormalizer, RawDate};
pub use dedup::Deduplicator;
pub use extract::{FallbackChain, Field, Strategy};
pub use fetch::{FetchedPage, Fetcher, HttpFetcher};
pub use forward::{ForwardReport, Forwarder, HttpIngestClient};
pub use logging::{init_logging, RunLogger, RunStats};
pub use manager::{Outcome, RunReport, ScraperManager, Stage};
pub use repair::{DateRepair, RepairReport};
pub use scrapers::{ExtractedFields, SourceAdapter, SourceRegistry};

pub mod prelude {
    pub use super::scrapers::SourceAdapter;
    pub use super::{RunLogger, ScraperManager};
    pub use mc_core::{Article, ArticleStatus, Error, Result};
}
