use std::fmt;
use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use futures::future::join_all;
use mc_core::{
    Article, ArticleStatus, ArticleStore, CaptureConfig, ContentCodec, Error, LanguageDetector,
    MarkupLanguageDetector, Result, ZlibCodec,
};
use scraper::Html;
use tokio::sync::Semaphore;

use crate::dates::DateNormalizer;
use crate::dedup::Deduplicator;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::logging::{ErrorKind, RunLogger};
use crate::scrapers::{utils, ExtractedFields, SourceAdapter, SourceRegistry};

/// Where a URL is in its pipeline. A failure at any stage ends in
/// [`Outcome::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Discovered,
    Deduped,
    Fetched,
    Cleaned,
    Extracted,
    Normalized,
    Persisted,
}

impl Stage {
    /// The work that moves a URL into this stage.
    pub fn step(&self) -> &'static str {
        match self {
            Stage::Discovered => "discover",
            Stage::Deduped => "dedup",
            Stage::Fetched => "fetch",
            Stage::Cleaned => "clean",
            Stage::Extracted => "extract",
            Stage::Normalized => "normalize",
            Stage::Persisted => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Discovered => "discovered",
            Stage::Deduped => "deduped",
            Stage::Fetched => "fetched",
            Stage::Cleaned => "cleaned",
            Stage::Extracted => "extracted",
            Stage::Normalized => "normalized",
            Stage::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Persisted { link: String, status: ArticleStatus },
    /// Already stored, either before the run or by a concurrent writer
    Skipped,
    /// `stage` is the stage the URL could not reach.
    Failed { stage: Stage, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub discovered: usize,
    pub persisted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunReport {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Persisted { .. } => self.persisted += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }

    fn merge(&mut self, other: RunReport) {
        self.discovered += other.discovered;
        self.persisted += other.persisted;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Runs discovered URLs through dedup, fetch, clean, extract, normalize and
/// persist. Every URL is isolated: anything short of losing the store is
/// logged against the URL and the batch moves on.
pub struct ScraperManager {
    store: Arc<dyn ArticleStore>,
    fetcher: Arc<dyn Fetcher>,
    registry: SourceRegistry,
    dedup: Deduplicator,
    codec: Arc<dyn ContentCodec>,
    language: Arc<dyn LanguageDetector>,
    local_offset: FixedOffset,
    semaphore: Arc<Semaphore>,
}

impl ScraperManager {
    pub const DEFAULT_WORKERS: usize = 4;

    pub fn new(store: Arc<dyn ArticleStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            dedup: Deduplicator::new(store.clone()),
            store,
            fetcher,
            registry: SourceRegistry::with_defaults(),
            codec: Arc::new(ZlibCodec::new()),
            language: Arc::new(MarkupLanguageDetector::new()),
            local_offset: Utc.fix(),
            semaphore: Arc::new(Semaphore::new(Self::DEFAULT_WORKERS)),
        }
    }

    /// Manager with an HTTP fetcher and worker pool sized from `config`.
    pub fn from_config(store: Arc<dyn ArticleStore>, config: &CaptureConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = Arc::new(HttpFetcher::from_config(config)?);
        Ok(Self::new(store, fetcher)
            .with_workers(config.workers)
            .with_local_offset(config.local_offset()?))
    }

    /// Offset used for dates printed without one.
    pub fn with_local_offset(mut self, offset: FixedOffset) -> Self {
        self.local_offset = offset;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(workers.max(1)));
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Abandon `url` short of `stage`. Only a fatal error escapes the URL.
    fn fail(&self, stage: Stage, url: &str, error: Error, logger: &RunLogger) -> Result<Outcome> {
        if error.is_fatal() {
            logger.error(&format!("Store failure during {} of {}: {}", stage.step(), url, error));
            return Err(error);
        }
        let kind = match error {
            Error::Network { .. } | Error::Http(_) => ErrorKind::Network,
            _ => ErrorKind::Other,
        };
        let reason = error.to_string();
        logger.failure(kind, url, &format!("{} failed: {}", stage.step(), reason));
        Ok(Outcome::Failed { stage, reason })
    }

    fn advance(stage: Stage, url: &str, logger: &RunLogger) {
        logger.debug(&format!("{} {}", stage, url));
    }

    /// Clean, then extract. Kept synchronous: the parsed tree never lives
    /// across an await.
    fn extract_page(adapter: &dyn SourceAdapter, body: &str, url: &str, logger: &RunLogger) -> ExtractedFields {
        let mut document = Html::parse_document(body);
        let removed = adapter.cleaner().clean_document(&mut document);
        logger.debug(&format!("Removed {} noise nodes from {}", removed, url));
        Self::advance(Stage::Cleaned, url, logger);

        let fields = adapter.extract_fields(&document, url, logger);
        Self::advance(Stage::Extracted, url, logger);
        fields
    }

    pub async fn process_url(&self, adapter: &dyn SourceAdapter, url: &str, logger: &RunLogger) -> Result<Outcome> {
        Self::advance(Stage::Discovered, url, logger);
        match self.dedup.should_fetch(url).await {
            Ok(true) => Self::advance(Stage::Deduped, url, logger),
            Ok(false) => {
                logger.debug(&format!("Already stored: {}", url));
                return Ok(Outcome::Skipped);
            }
            Err(e) => return self.fail(Stage::Deduped, url, e, logger),
        }

        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => return self.fail(Stage::Fetched, url, e, logger),
        };
        let raw_content = match self.codec.encode(&page.body) {
            Ok(blob) => blob,
            Err(e) => return self.fail(Stage::Fetched, url, e, logger),
        };
        Self::advance(Stage::Fetched, url, logger);

        let fields = Self::extract_page(adapter, &page.body, url, logger);

        let normalizer = DateNormalizer::new(logger.clone()).with_local_offset(self.local_offset);
        let published_time = fields.published.as_ref().and_then(|raw| normalizer.normalize_raw(raw));

        let mut article = Article::fetched(url, adapter.source_metadata().id, raw_content);
        article.title = fields.title;
        article.body_content = fields.body_content;
        article.published_raw = fields.published.map(|raw| raw.text);
        article.published_time = published_time;
        article.language = self.language.detect(&page.body);
        if article.has_extracted_text() {
            article.status = ArticleStatus::Extracted;
        }
        Self::advance(Stage::Normalized, url, logger);

        match self.store.insert_article(&article).await {
            Ok(()) => {
                logger.info(&format!("Stored {} ({})", url, article.status));
                Ok(Outcome::Persisted {
                    link: article.link,
                    status: article.status,
                })
            }
            Err(Error::Duplicate(_)) => {
                logger.debug(&format!("Stored concurrently by another run: {}", url));
                Ok(Outcome::Skipped)
            }
            Err(e) => self.fail(Stage::Persisted, url, e, logger),
        }
    }

    /// Process `urls` with at most `workers` in flight. Every URL is
    /// attempted even when a fatal error occurs; the first such error is
    /// returned afterwards.
    pub async fn run_urls(&self, adapter: Arc<dyn SourceAdapter>, urls: Vec<String>, logger: &RunLogger) -> Result<RunReport> {
        let logger = logger.clone().with_prefix(adapter.source_metadata().id.to_string());
        let futures: Vec<_> = urls
            .iter()
            .map(|url| {
                let semaphore = self.semaphore.clone();
                let adapter = adapter.clone();
                let logger = logger.clone();
                async move {
                    let _permit = semaphore.acquire().await.map_err(|e| Error::External(e.into()))?;
                    self.process_url(adapter.as_ref(), url, &logger).await
                }
            })
            .collect();

        let mut report = RunReport {
            discovered: urls.len(),
            ..RunReport::default()
        };
        let mut fatal = None;
        for result in join_all(futures).await {
            match result {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    report.failed += 1;
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Process a single URL with whichever adapter claims it.
    pub async fn scrape_url(&self, url: &str, logger: &RunLogger) -> Result<Outcome> {
        let adapter = self
            .registry
            .for_url(url)
            .ok_or_else(|| Error::Configuration(format!("No source adapter for URL: {}", url)))?;
        let logger = logger.clone().with_prefix(adapter.source_metadata().id.to_string());
        self.process_url(adapter.as_ref(), url, &logger).await
    }

    /// Discover and process `pages` index pages of `source` (every source
    /// when `None`). The category is validated against every selected
    /// source before anything is fetched.
    pub async fn run_source(
        &self,
        source: Option<&str>,
        category: Option<&str>,
        pages: u32,
        logger: &RunLogger,
    ) -> Result<RunReport> {
        let adapters: Vec<Arc<dyn SourceAdapter>> = match source {
            Some(id) => vec![self.registry.get(id)?],
            None => self.registry.adapters().cloned().collect(),
        };
        for adapter in &adapters {
            adapter.index_urls(category, 1)?;
        }

        let mut report = RunReport::default();
        for adapter in adapters {
            let source_logger = logger.clone().with_prefix(adapter.source_metadata().id.to_string());
            let mut urls = Vec::new();
            for page in 1..=pages.max(1) {
                urls.extend(
                    adapter
                        .discover_urls(self.fetcher.as_ref(), category, page, &source_logger)
                        .await?,
                );
            }
            let urls = utils::dedup_preserving_order(urls);
            source_logger.info(&format!("Discovered {} article URLs", urls.len()));
            report.merge(self.run_urls(adapter, urls, logger).await?);
        }

        logger.info(&format!(
            "Capture finished: {} discovered, {} stored, {} skipped, {} failed",
            report.discovered, report.persisted, report.skipped, report.failed
        ));
        Ok(report)
    }
}
