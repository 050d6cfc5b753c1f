use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mc_core::{Article, ArticleStatus, ArticleStore, Error, ForwardRecord, Result};
use tokio::sync::RwLock;

use crate::StorageBackend;

#[derive(Default)]
pub struct MemoryStore {
    articles: HashMap<String, Article>,
    forwards: Vec<ForwardRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_article(&mut self, article: &Article) -> Result<()> {
        if self.articles.contains_key(&article.link) {
            return Err(Error::Duplicate(article.link.clone()));
        }
        self.articles.insert(article.link.clone(), article.clone());
        Ok(())
    }

    fn get_mut(&mut self, link: &str) -> Result<&mut Article> {
        self.articles
            .get_mut(link)
            .ok_or_else(|| Error::NotFound(link.to_string()))
    }

    fn update_status(&mut self, link: &str, status: ArticleStatus) -> Result<()> {
        let article = self.get_mut(link)?;
        if !article.status.can_advance_to(status) {
            return Err(Error::StatusRegression {
                link: link.to_string(),
                from: article.status,
                to: status,
            });
        }
        article.status = status;
        Ok(())
    }

    fn sorted<'a>(&self, articles: impl Iterator<Item = &'a Article>) -> Vec<Article> {
        let mut articles: Vec<Article> = articles.cloned().collect();
        articles.sort_by(|a, b| {
            b.fetched_at
                .cmp(&a.fetched_at)
                .then_with(|| a.link.cmp(&b.link))
        });
        articles
    }
}

pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::new())),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn new() -> Result<Self> {
        Ok(MemoryStorage::new())
    }
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    async fn exists(&self, link: &str) -> Result<bool> {
        Ok(self.store.read().await.articles.contains_key(link))
    }

    async fn find_by_link(&self, link: &str) -> Result<Option<Article>> {
        Ok(self.store.read().await.articles.get(link).cloned())
    }

    async fn insert_article(&self, article: &Article) -> Result<()> {
        self.store.write().await.insert_article(article)
    }

    async fn get_by_source(&self, source: &str) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        Ok(store.sorted(store.articles.values().filter(|a| a.source == source)))
    }

    async fn find_by_status(&self, status: ArticleStatus, limit: usize, skip: usize) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        Ok(store
            .sorted(store.articles.values().filter(|a| a.status == status))
            .into_iter()
            .skip(skip)
            .take(limit)
            .collect())
    }

    async fn count_by_status(&self, status: ArticleStatus) -> Result<usize> {
        let store = self.store.read().await;
        Ok(store.articles.values().filter(|a| a.status == status).count())
    }

    async fn update_status(&self, link: &str, status: ArticleStatus) -> Result<()> {
        self.store.write().await.update_status(link, status)
    }

    async fn find_unparsed_dates(&self, limit: usize) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        Ok(store
            .sorted(
                store
                    .articles
                    .values()
                    .filter(|a| a.published_time.is_none() && a.published_raw.is_some()),
            )
            .into_iter()
            .take(limit)
            .collect())
    }

    async fn set_published_time(&self, link: &str, published: DateTime<Utc>) -> Result<()> {
        let mut store = self.store.write().await;
        store.get_mut(link)?.published_time = Some(published);
        Ok(())
    }

    async fn record_forward(&self, record: &ForwardRecord) -> Result<()> {
        self.store.write().await.forwards.push(record.clone());
        Ok(())
    }

    async fn forward_records(&self) -> Result<Vec<ForwardRecord>> {
        Ok(self.store.read().await.forwards.clone())
    }
}
