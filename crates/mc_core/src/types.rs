use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Lifecycle of a stored article. Variants are declared in pipeline order so
/// the derived ordering doubles as the "has advanced past" relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    New,
    Fetched,
    Extracted,
    SentDownstream,
    Failed,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::New => "new",
            ArticleStatus::Fetched => "fetched",
            ArticleStatus::Extracted => "extracted",
            ArticleStatus::SentDownstream => "sent_downstream",
            ArticleStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ArticleStatus::SentDownstream | ArticleStatus::Failed)
    }

    /// `Failed` is reachable from any non-terminal state; every other move
    /// must go strictly forward.
    pub fn can_advance_to(&self, next: ArticleStatus) -> bool {
        !self.is_terminal() && next > *self
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ArticleStatus::New),
            "fetched" => Ok(ArticleStatus::Fetched),
            "extracted" => Ok(ArticleStatus::Extracted),
            "sent_downstream" => Ok(ArticleStatus::SentDownstream),
            "failed" => Ok(ArticleStatus::Failed),
            other => Err(Error::InvalidRecord(format!("Unknown article status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub link: String,
    pub source: String,
    /// Page body as produced by the configured `ContentCodec`.
    pub raw_content: Vec<u8>,
    pub title: Option<String>,
    pub body_content: Option<String>,
    pub published_time: Option<DateTime<Utc>>,
    /// Date text as found on the page, kept so it can be re-normalized later.
    pub published_raw: Option<String>,
    pub language: Option<Language>,
    pub status: ArticleStatus,
    pub fetched_at: DateTime<Utc>,
}

impl Article {
    /// A freshly fetched article with nothing extracted yet.
    pub fn fetched(link: &str, source: &str, raw_content: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            link: link.to_string(),
            source: source.to_string(),
            raw_content,
            title: None,
            body_content: None,
            published_time: None,
            published_raw: None,
            language: None,
            status: ArticleStatus::Fetched,
            fetched_at: Utc::now(),
        }
    }

    pub fn has_extracted_text(&self) -> bool {
        self.title.is_some() || self.body_content.is_some()
    }
}

/// Mapping written once an article has been accepted downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRecord {
    pub handle: String,
    pub article_id: Uuid,
}
