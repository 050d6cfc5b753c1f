use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use mc_core::{ArticleStore, Result};

use crate::dates::DateNormalizer;
use crate::logging::RunLogger;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub examined: usize,
    pub repaired: usize,
    pub unparseable: usize,
    /// Parsed, but the store refused the update
    pub failed: usize,
}

/// Re-runs date normalization over stored articles that kept a raw date
/// string but no timestamp, e.g. after a new date shape was taught to the
/// normalizer.
pub struct DateRepair {
    store: Arc<dyn ArticleStore>,
    local_offset: FixedOffset,
    batch_size: usize,
}

impl DateRepair {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self {
            store,
            local_offset: Utc.fix(),
            batch_size: 1000,
        }
    }

    pub fn with_local_offset(mut self, offset: FixedOffset) -> Self {
        self.local_offset = offset;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// A single pass over the current candidates. Strings that still do not
    /// parse are logged and left as they are.
    pub async fn run(&self, logger: &RunLogger) -> Result<RepairReport> {
        let logger = logger.clone().with_prefix("repair-dates".to_string());
        let normalizer = DateNormalizer::new(logger.clone()).with_local_offset(self.local_offset);
        let candidates = self.store.find_unparsed_dates(usize::MAX).await?;

        let mut report = RepairReport::default();
        for chunk in candidates.chunks(self.batch_size) {
            for article in chunk {
                let Some(raw) = article.published_raw.as_deref() else {
                    continue;
                };
                report.examined += 1;
                match normalizer.normalize(raw) {
                    Some(ts) => match self.store.set_published_time(&article.link, ts).await {
                        Ok(()) => report.repaired += 1,
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            logger.warn(&format!("Could not store date for {}: {}", article.link, e));
                            report.failed += 1;
                        }
                    },
                    None => report.unparseable += 1,
                }
            }
            logger.debug(&format!("{}/{} dates examined", report.examined, candidates.len()));
        }

        logger.info(&format!(
            "Repaired {} of {} stored dates",
            report.repaired, report.examined
        ));
        Ok(report)
    }
}
