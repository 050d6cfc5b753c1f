use std::path::Path;
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PAGE_SIZE: usize = 10_000;
pub const DEFAULT_CORPUS: &str = "MC_articles";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// Articles processed concurrently within one run
    pub workers: usize,
    /// Articles selected per forwarding round
    pub page_size: usize,
    pub corpus: String,
    pub ingest_url: Option<String>,
    /// Offset east of UTC assumed for dates printed without one
    pub utc_offset_minutes: i32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            user_agent: concat!("mc-capture/", env!("CARGO_PKG_VERSION")).to_string(),
            workers: 4,
            page_size: DEFAULT_PAGE_SIZE,
            corpus: DEFAULT_CORPUS.to_string(),
            ingest_url: None,
            utc_offset_minutes: 0,
        }
    }
}

impl CaptureConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            Error::Configuration(format!("Invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Configuration("workers must be at least 1".to_string()));
        }
        if self.page_size == 0 {
            return Err(Error::Configuration("page_size must be at least 1".to_string()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(Error::Configuration("fetch_timeout_secs must be at least 1".to_string()));
        }
        self.local_offset()?;
        Ok(())
    }

    pub fn local_offset(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                Error::Configuration(format!("utc_offset_minutes out of range: {}", self.utc_offset_minutes))
            })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
