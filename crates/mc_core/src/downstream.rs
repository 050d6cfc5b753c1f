use async_trait::async_trait;

use crate::Result;

/// Ingestion service that accepts forwarded articles.
#[async_trait]
pub trait DownstreamSink: Send + Sync {
    /// Push a compressed page into `corpus`, returning the service's
    /// reference handle for the new document.
    async fn push(&self, payload: &[u8], corpus: &str) -> Result<String>;
}
