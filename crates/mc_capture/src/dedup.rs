use std::sync::Arc;

use mc_core::{ArticleStore, Result};

/// Decides whether a URL still needs fetching. Only a cheap existence check:
/// the store's unique key on `link` is what actually keeps two concurrent
/// runs from writing the same article twice.
#[derive(Clone)]
pub struct Deduplicator {
    store: Arc<dyn ArticleStore>,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    /// `Ok(true)` when no record exists for `link`.
    pub async fn should_fetch(&self, link: &str) -> Result<bool> {
        Ok(!self.store.exists(link).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_core::Article;
    use mc_storage::backends::MemoryStorage;

    #[tokio::test]
    async fn test_existing_link_is_skipped() {
        let store = Arc::new(MemoryStorage::new());
        store
            .insert_article(&Article::fetched("http://a/1", "estadao", vec![1]))
            .await
            .unwrap();
        let dedup = Deduplicator::new(store);

        assert!(!dedup.should_fetch("http://a/1").await.unwrap());
        assert!(dedup.should_fetch("http://a/2").await.unwrap());
    }
}
