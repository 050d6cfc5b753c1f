use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install the global tracing subscriber once. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_logging() {
    if !tracing::dispatcher::has_been_set() {
        INIT.call_once(|| {
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
            let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    FieldParse,
    DateFormat,
    Downstream,
    Other,
}

#[derive(Debug, Default)]
struct Counters {
    network: AtomicUsize,
    field_parse: AtomicUsize,
    date_format: AtomicUsize,
    downstream: AtomicUsize,
    other: AtomicUsize,
}

impl Counters {
    fn slot(&self, kind: ErrorKind) -> &AtomicUsize {
        match kind {
            ErrorKind::Network => &self.network,
            ErrorKind::FieldParse => &self.field_parse,
            ErrorKind::DateFormat => &self.date_format,
            ErrorKind::Downstream => &self.downstream,
            ErrorKind::Other => &self.other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub network_errors: usize,
    pub field_parse_errors: usize,
    pub date_format_errors: usize,
    pub downstream_errors: usize,
    pub other_errors: usize,
}

impl RunStats {
    pub fn total(&self) -> usize {
        self.network_errors
            + self.field_parse_errors
            + self.date_format_errors
            + self.downstream_errors
            + self.other_errors
    }
}

/// Logger for a single run. Clones share the failure counters, so every
/// component of the run reports into the same summary.
#[derive(Debug, Clone, Default)]
pub struct RunLogger {
    prefixes: VecDeque<String>,
    counters: Arc<Counters>,
}

impl RunLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_new_prefixes(mut self, prefix: String) -> Self {
        self.prefixes.clear();
        self.prefixes.push_back(prefix);
        self
    }

    pub fn with_prefix(mut self, prefix: String) -> Self {
        self.prefixes.push_back(prefix);
        self
    }

    fn prefix(&self) -> String {
        self.prefixes.iter().map(|p| format!("[{}] ", p)).collect()
    }

    pub fn info(&self, message: &str) {
        tracing::info!("{}{}", self.prefix(), message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!("{}{}", self.prefix(), message);
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!("{}{}", self.prefix(), message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!("{}{}", self.prefix(), message);
    }

    /// Log a failure and count it against the run. `subject` is whatever
    /// identifies the failing input: a URL, or the raw date string.
    pub fn failure(&self, kind: ErrorKind, subject: &str, message: &str) {
        self.counters.slot(kind).fetch_add(1, Ordering::Relaxed);
        match kind {
            ErrorKind::Network | ErrorKind::Other => {
                tracing::error!(subject, kind = ?kind, "{}{}", self.prefix(), message)
            }
            _ => tracing::warn!(subject, kind = ?kind, "{}{}", self.prefix(), message),
        }
    }

    pub fn stats(&self) -> RunStats {
        let get = |kind| self.counters.slot(kind).load(Ordering::Relaxed);
        RunStats {
            network_errors: get(ErrorKind::Network),
            field_parse_errors: get(ErrorKind::FieldParse),
            date_format_errors: get(ErrorKind::DateFormat),
            downstream_errors: get(ErrorKind::Downstream),
            other_errors: get(ErrorKind::Other),
        }
    }

    /// End of run: write the failure summary and hand back the counts.
    pub fn finish(self) -> RunStats {
        let stats = self.stats();
        tracing::info!(
            network = stats.network_errors,
            field_parse = stats.field_parse_errors,
            date_format = stats.date_format_errors,
            downstream = stats.downstream_errors,
            other = stats.other_errors,
            "{}run finished",
            self.prefix()
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let logger = RunLogger::new().with_new_prefixes("estadao".to_string());
        let worker = logger.clone().with_prefix("worker-1".to_string());

        worker.failure(ErrorKind::Network, "http://a", "timed out");
        logger.failure(ErrorKind::DateFormat, "http://b", "bad month");
        logger.failure(ErrorKind::FieldParse, "http://b", "no title");

        let stats = logger.finish();
        assert_eq!(stats.network_errors, 1);
        assert_eq!(stats.date_format_errors, 1);
        assert_eq!(stats.field_parse_errors, 1);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_prefixes() {
        let logger = RunLogger::new()
            .with_prefix("valor".to_string())
            .with_prefix("politica".to_string());
        assert_eq!(logger.prefix(), "[valor] [politica] ");
        let logger = logger.with_new_prefixes("estadao".to_string());
        assert_eq!(logger.prefix(), "[estadao] ");
    }
}
