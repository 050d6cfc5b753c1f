use std::sync::Arc;

use async_trait::async_trait;
use mc_core::{Error, Result};
use scraper::Html;

use crate::cleaner::ContentCleaner;
use crate::dates::RawDate;
use crate::fetch::Fetcher;
use crate::logging::{ErrorKind, RunLogger};

pub mod brazil;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMetadata {
    /// Stable identifier stored in `Article::source`
    pub id: &'static str,
    pub name: &'static str,
    pub region: Region,
}

/// Whatever a source adapter could pull out of one cleaned page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub title: Option<String>,
    pub body_content: Option<String>,
    pub published: Option<RawDate>,
}

/// Per-site knowledge: where article links live on the index pages, which
/// nodes are noise, and the fallback chains for each field.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_metadata(&self) -> SourceMetadata;

    /// Returns true if this adapter can handle the given URL
    fn can_handle(&self, url: &str) -> bool;

    /// Returns a list of CLI shorthand names for this adapter
    fn cli_names(&self) -> Vec<&str> {
        vec![self.source_metadata().id]
    }

    /// Categories accepted by `discover_urls`.
    fn categories(&self) -> &'static [&'static str];

    /// Index pages listing the latest articles of `category` (all categories
    /// when `None`). An unknown category is an `Error::Configuration`.
    fn index_urls(&self, category: Option<&str>, page: u32) -> Result<Vec<String>>;

    /// Article links on one parsed index page.
    fn parse_index(&self, document: &Html) -> Vec<String>;

    fn cleaner(&self) -> &ContentCleaner;

    /// Run each field's fallback chain over the cleaned page. Fields fail
    /// independently; a missing title never prevents body extraction.
    fn extract_fields(&self, cleaned: &Html, url: &str, logger: &RunLogger) -> ExtractedFields;

    fn links_from_markup(&self, markup: &str) -> Vec<String> {
        let document = Html::parse_document(markup);
        self.parse_index(&document)
    }

    /// Fetch the index pages and collect article URLs, de-duplicated in
    /// discovery order. The category is validated before any request is made;
    /// index pages that fail to load are logged and skipped.
    async fn discover_urls(
        &self,
        fetcher: &dyn Fetcher,
        category: Option<&str>,
        page: u32,
        logger: &RunLogger,
    ) -> Result<Vec<String>> {
        let index_urls = self.index_urls(category, page)?;
        let mut urls = Vec::new();

        for index_url in index_urls {
            match fetcher.fetch(&index_url).await {
                Ok(index) => {
                    let found = self.links_from_markup(&index.body);
                    logger.debug(&format!("{} links on {}", found.len(), index_url));
                    urls.extend(found);
                }
                Err(e) => logger.failure(ErrorKind::Network, &index_url, &e.to_string()),
            }
        }

        Ok(utils::dedup_preserving_order(urls))
    }
}

/// Adapters keyed by source id.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every adapter shipped with the crate
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for adapter in brazil::get_adapters() {
            registry.register(adapter);
        }
        registry
    }

    /// Registering an id twice replaces the earlier adapter.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        let id = adapter.source_metadata().id;
        self.adapters.retain(|a| a.source_metadata().id != id);
        self.adapters.push(adapter);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn SourceAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.source_metadata().id == id || a.cli_names().contains(&id))
            .cloned()
            .ok_or_else(|| {
                Error::Configuration(format!("Unknown source: {} (known: {})", id, self.ids().join(", ")))
            })
    }

    pub fn for_url(&self, url: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.iter().find(|a| a.can_handle(url)).cloned()
    }

    pub fn adapters(&self) -> impl Iterator<Item = &Arc<dyn SourceAdapter>> {
        self.adapters.iter()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.source_metadata().id).collect()
    }
}

/// Common utilities for adapters
pub(crate) mod utils {
    use url::Url;

    /// Absolute form of `href` relative to `base`; `None` for hrefs that do
    /// not resolve to http(s).
    pub fn resolve_link(base: &str, href: &str) -> Option<String> {
        let base = Url::parse(base).ok()?;
        let resolved = base.join(href.trim()).ok()?;
        matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
    }

    pub fn host_matches(url: &str, domain: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h == domain || h.ends_with(&format!(".{}", domain))))
            .unwrap_or(false)
    }

    pub fn path_contains(url: &str, segment: &str) -> bool {
        Url::parse(url)
            .map(|u| u.path().contains(segment))
            .unwrap_or(false)
    }

    pub fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
    }
}
