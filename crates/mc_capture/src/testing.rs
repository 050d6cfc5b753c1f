//! Store doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mc_core::{Article, ArticleStatus, ArticleStore, Error, ForwardRecord, Result};
use mc_storage::backends::MemoryStorage;

/// In-memory store whose first few writes of one kind fail with a
/// non-fatal error. Everything else goes straight to `inner`.
pub(crate) struct FaultyStore {
    pub inner: Arc<MemoryStorage>,
    record_forward_failures: AtomicUsize,
    set_published_time_failures: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStorage>) -> Self {
        Self {
            inner,
            record_forward_failures: AtomicUsize::new(0),
            set_published_time_failures: AtomicUsize::new(0),
        }
    }

    pub fn failing_record_forward(self, times: usize) -> Self {
        self.record_forward_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn failing_set_published_time(self, times: usize) -> Self {
        self.set_published_time_failures.store(times, Ordering::SeqCst);
        self
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ArticleStore for FaultyStore {
    async fn exists(&self, link: &str) -> Result<bool> {
        self.inner.exists(link).await
    }
    async fn find_by_link(&self, link: &str) -> Result<Option<Article>> {
        self.inner.find_by_link(link).await
    }
    async fn insert_article(&self, article: &Article) -> Result<()> {
        self.inner.insert_article(article).await
    }
    async fn get_by_source(&self, source: &str) -> Result<Vec<Article>> {
        self.inner.get_by_source(source).await
    }
    async fn find_by_status(&self, status: ArticleStatus, limit: usize, skip: usize) -> Result<Vec<Article>> {
        self.inner.find_by_status(status, limit, skip).await
    }
    async fn count_by_status(&self, status: ArticleStatus) -> Result<usize> {
        self.inner.count_by_status(status).await
    }
    async fn update_status(&self, link: &str, status: ArticleStatus) -> Result<()> {
        self.inner.update_status(link, status).await
    }
    async fn find_unparsed_dates(&self, limit: usize) -> Result<Vec<Article>> {
        self.inner.find_unparsed_dates(limit).await
    }
    async fn set_published_time(&self, link: &str, published: DateTime<Utc>) -> Result<()> {
        if Self::take(&self.set_published_time_failures) {
            return Err(Error::NotFound(link.to_string()));
        }
        self.inner.set_published_time(link, published).await
    }
    async fn record_forward(&self, record: &ForwardRecord) -> Result<()> {
        if Self::take(&self.record_forward_failures) {
            return Err(Error::Duplicate(record.handle.clone()));
        }
        self.inner.record_forward(record).await
    }
    async fn forward_records(&self) -> Result<Vec<ForwardRecord>> {
        self.inner.forward_records().await
    }
}
