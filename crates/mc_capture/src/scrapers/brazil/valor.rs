use async_trait::async_trait;
use mc_core::{Error, Result};
use scraper::{Html, Selector};

use super::REGION;
use crate::cleaner::ContentCleaner;
use crate::dates::RawDate;
use crate::extract::{FallbackChain, Field, Strategy};
use crate::logging::RunLogger;
use crate::scrapers::{utils, ExtractedFields, SourceAdapter, SourceMetadata};

pub const CATEGORIES: &[&str] = &[
    "brasil",
    "politica",
    "financas",
    "empresas",
    "agro",
    "internacional",
    "opiniao",
    "legislacao",
    "carreira",
    "cultura",
];

#[derive(Debug, Clone)]
pub struct ValorAdapter {
    cleaner: ContentCleaner,
    title: FallbackChain,
    body: FallbackChain,
    published: FallbackChain,
}

impl ValorAdapter {
    const BASE_URL: &'static str = "http://www.valor.com.br";
    const DOMAIN: &'static str = "valor.com.br";

    pub fn new() -> Self {
        Self {
            cleaner: ContentCleaner::with_rules(&["div.tags", "div.share-bar"]),
            title: FallbackChain::new(Field::Title)
                .then(Strategy::Text("#content-area h1"))
                .then(Strategy::Attr("meta[property='og:title']", "content"))
                .then(Strategy::Text("title")),
            body: FallbackChain::new(Field::Body)
                .then(Strategy::Children("#content-area div.node-body"))
                .then(Strategy::Children("#content-area article"))
                .then(Strategy::Children("article")),
            published: FallbackChain::new(Field::PublishedTime)
                .then(Strategy::Text("#content-area span.date.submitted"))
                .then(Strategy::Attr("meta[property='article:published_time']", "content")),
        }
    }

    fn index_url(category: &str) -> String {
        format!("{}/ultimas-noticias/{}", Self::BASE_URL, category)
    }
}

impl Default for ValorAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for ValorAdapter {
    fn source_metadata(&self) -> SourceMetadata {
        SourceMetadata {
            id: "valor",
            name: "Valor Econômico",
            region: REGION,
        }
    }

    fn can_handle(&self, url: &str) -> bool {
        utils::host_matches(url, Self::DOMAIN)
    }

    fn categories(&self) -> &'static [&'static str] {
        CATEGORIES
    }

    /// Valor's "últimas notícias" pages are not paginated: only page 1 has
    /// index URLs.
    fn index_urls(&self, category: Option<&str>, page: u32) -> Result<Vec<String>> {
        let categories: Vec<&str> = match category {
            None => CATEGORIES.to_vec(),
            Some(c) if CATEGORIES.contains(&c) => vec![c],
            Some(c) => {
                return Err(Error::Configuration(format!(
                    "Unknown valor category: {} (expected one of {})",
                    c,
                    CATEGORIES.join(", ")
                )))
            }
        };
        if page > 1 {
            return Ok(Vec::new());
        }
        Ok(categories.into_iter().map(Self::index_url).collect())
    }

    fn parse_index(&self, document: &Html) -> Vec<String> {
        let Ok(selector) = Selector::parse("#block-valor_capa_automatica-central_automatico h2 a[href]") else {
            return Vec::new();
        };
        document
            .select(&selector)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| utils::resolve_link(Self::BASE_URL, href))
            .collect()
    }

    fn cleaner(&self) -> &ContentCleaner {
        &self.cleaner
    }

    fn extract_fields(&self, cleaned: &Html, url: &str, logger: &RunLogger) -> ExtractedFields {
        ExtractedFields {
            title: self.title.extract(cleaned, url, logger),
            body_content: self.body.extract(cleaned, url, logger),
            published: self.published.extract(cleaned, url, logger).map(RawDate::new),
        }
    }
}
