use async_trait::async_trait;
use mc_core::{Error, Result};
use scraper::{Html, Selector};

use super::REGION;
use crate::cleaner::{ContentCleaner, STANDARD_NOISE};
use crate::dates::{ClockLayout, RawDate};
use crate::extract::{FallbackChain, Field, Strategy};
use crate::logging::RunLogger;
use crate::scrapers::{utils, ExtractedFields, SourceAdapter, SourceMetadata};

pub const CATEGORIES: &[&str] = &[
    "politica",
    "economia",
    "internacional",
    "esportes",
    "sao-paulo",
    "cultura",
    "opiniao",
    "alias",
    "brasil",
    "ciencia",
    "educacao",
    "saude",
    "sustentabilidade",
    "viagem",
];

const NOISE: &[&str] = &["div.wp-caption", "div.tags", "div.relacionadastexto"];

/// Estadão serves news and blog posts with different markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageKind {
    News,
    Blog,
}

impl PageKind {
    fn of(url: &str) -> Self {
        if utils::path_contains(url, "/blogs/") {
            PageKind::Blog
        } else {
            PageKind::News
        }
    }

    fn clock_layout(self) -> ClockLayout {
        match self {
            PageKind::News => ClockLayout::Split,
            PageKind::Blog => ClockLayout::Joined,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EstadaoAdapter {
    cleaner: ContentCleaner,
    title: FallbackChain,
    news_body: FallbackChain,
    blog_body: FallbackChain,
    published: FallbackChain,
}

impl EstadaoAdapter {
    const BASE_URL: &'static str = "http://www.estadao.com.br";
    const DOMAIN: &'static str = "estadao.com.br";

    pub fn new() -> Self {
        let rules: Vec<&str> = STANDARD_NOISE.iter().chain(NOISE).copied().collect();
        Self {
            cleaner: ContentCleaner::new(&rules),
            title: FallbackChain::new(Field::Title)
                .then(Strategy::Text("h1.titulo"))
                .then(Strategy::Text("h2.subtitulo")),
            news_body: FallbackChain::new(Field::Body)
                .then(Strategy::Children("div[itemprop='articleBody']"))
                .then(Strategy::Children("article")),
            blog_body: FallbackChain::new(Field::Body).then(Strategy::Children("article")),
            published: FallbackChain::new(Field::PublishedTime)
                .then(Strategy::Text("p.data"))
                .then(Strategy::Text("span.data")),
        }
    }

    fn index_url(category: &str, page: u32) -> String {
        format!("http://{}.estadao.com.br/ultimas/{}", category, page)
    }
}

impl Default for EstadaoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for EstadaoAdapter {
    fn source_metadata(&self) -> SourceMetadata {
        SourceMetadata {
            id: "estadao",
            name: "Estadão",
            region: REGION,
        }
    }

    fn can_handle(&self, url: &str) -> bool {
        utils::host_matches(url, Self::DOMAIN)
    }

    fn categories(&self) -> &'static [&'static str] {
        CATEGORIES
    }

    fn index_urls(&self, category: Option<&str>, page: u32) -> Result<Vec<String>> {
        match category {
            None => Ok(CATEGORIES.iter().map(|c| Self::index_url(c, page)).collect()),
            Some(c) if CATEGORIES.contains(&c) => Ok(vec![Self::index_url(c, page)]),
            Some(c) => Err(Error::Configuration(format!(
                "Unknown estadao category: {} (expected one of {})",
                c,
                CATEGORIES.join(", ")
            ))),
        }
    }

    fn parse_index(&self, document: &Html) -> Vec<String> {
        let Ok(selector) = Selector::parse("div.listadesc a[href]") else {
            return Vec::new();
        };
        document
            .select(&selector)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| utils::resolve_link(Self::BASE_URL, href))
            .filter(|link| self.can_handle(link))
            .collect()
    }

    fn cleaner(&self) -> &ContentCleaner {
        &self.cleaner
    }

    fn extract_fields(&self, cleaned: &Html, url: &str, logger: &RunLogger) -> ExtractedFields {
        let kind = PageKind::of(url);
        let body = match kind {
            PageKind::News => &self.news_body,
            PageKind::Blog => &self.blog_body,
        };

        ExtractedFields {
            title: self.title.extract(cleaned, url, logger),
            body_content: body.extract(cleaned, url, logger),
            published: self
                .published
                .extract(cleaned, url, logger)
                .map(|text| RawDate::with_layout(text, kind.clock_layout())),
        }
    }
}
