use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Article, ArticleStatus, ForwardRecord};
use crate::Result;

/// Article collection keyed uniquely by `link`.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Whether a record with this link has already been stored
    async fn exists(&self, link: &str) -> Result<bool>;

    async fn find_by_link(&self, link: &str) -> Result<Option<Article>>;

    /// Insert a new article. A second insert for the same link fails with
    /// `Error::Duplicate` and leaves the stored record untouched.
    async fn insert_article(&self, article: &Article) -> Result<()>;

    /// Get all articles from a specific source
    async fn get_by_source(&self, source: &str) -> Result<Vec<Article>>;

    /// Articles in `status`, newest first.
    async fn find_by_status(&self, status: ArticleStatus, limit: usize, skip: usize) -> Result<Vec<Article>>;

    async fn count_by_status(&self, status: ArticleStatus) -> Result<usize>;

    /// Advance the status of an article. Moving backwards fails with
    /// `Error::StatusRegression`.
    async fn update_status(&self, link: &str, status: ArticleStatus) -> Result<()>;

    /// Articles with a raw date string but no normalized `published_time`.
    async fn find_unparsed_dates(&self, limit: usize) -> Result<Vec<Article>>;

    async fn set_published_time(&self, link: &str, published: DateTime<Utc>) -> Result<()>;

    /// Record the downstream handle for a forwarded article
    async fn record_forward(&self, record: &ForwardRecord) -> Result<()>;

    async fn forward_records(&self) -> Result<Vec<ForwardRecord>>;
}
