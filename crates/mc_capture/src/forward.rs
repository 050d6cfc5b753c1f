use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use mc_core::{
    Article, ArticleStatus, ArticleStore, CaptureConfig, DownstreamSink, Error, ForwardRecord, Result,
};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::logging::{ErrorKind, RunLogger};

#[derive(Debug, Deserialize)]
struct IngestResponse {
    handle: String,
}

/// Sink that POSTs the compressed page to an ingestion endpoint and reads
/// the reference handle back from the JSON reply.
pub struct HttpIngestClient {
    client: Client,
    endpoint: String,
}

impl HttpIngestClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn from_config(config: &CaptureConfig) -> Result<Self> {
        let endpoint = config
            .ingest_url
            .as_deref()
            .ok_or_else(|| Error::Configuration("ingest_url is not set".to_string()))?;
        Self::new(endpoint, config.fetch_timeout())
    }
}

#[async_trait]
impl DownstreamSink for HttpIngestClient {
    async fn push(&self, payload: &[u8], corpus: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("corpus", corpus)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(payload.to_vec())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Downstream(format!("{}: {}", self.endpoint, e)))?;

        let reply: IngestResponse = response
            .json()
            .await
            .map_err(|e| Error::Downstream(format!("Malformed reply from {}: {}", self.endpoint, e)))?;
        Ok(reply.handle)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardReport {
    pub sent: usize,
    pub failed: usize,
}

/// Pushes `extracted` articles downstream in rounds of `page_size`.
pub struct Forwarder {
    store: Arc<dyn ArticleStore>,
    sink: Arc<dyn DownstreamSink>,
    corpus: String,
    page_size: usize,
    semaphore: Arc<Semaphore>,
}

impl Forwarder {
    pub fn new(store: Arc<dyn ArticleStore>, sink: Arc<dyn DownstreamSink>, config: &CaptureConfig) -> Self {
        Self {
            store,
            sink,
            corpus: config.corpus.clone(),
            page_size: config.page_size.max(1),
            semaphore: Arc::new(Semaphore::new(config.workers.max(1))),
        }
    }

    /// Forward one article. The mapping is written before the status moves,
    /// so a crash in between leaves the article eligible rather than lost.
    /// `Ok(false)` means the push was rejected and the article is untouched.
    async fn forward_one(&self, article: &Article, logger: &RunLogger) -> Result<bool> {
        let handle = match self.sink.push(&article.raw_content, &self.corpus).await {
            Ok(handle) => handle,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                logger.failure(ErrorKind::Downstream, &article.link, &e.to_string());
                return Ok(false);
            }
        };

        let record = ForwardRecord {
            handle: handle.clone(),
            article_id: article.id,
        };
        match self.store.record_forward(&record).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                logger.failure(
                    ErrorKind::Downstream,
                    &article.link,
                    &format!("Pushed as {} but could not record it: {}", handle, e),
                );
                return Ok(false);
            }
        }

        match self.store.update_status(&article.link, ArticleStatus::SentDownstream).await {
            Ok(()) => {
                logger.debug(&format!("Forwarded {} as {}", article.link, handle));
                Ok(true)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                logger.failure(ErrorKind::Other, &article.link, &e.to_string());
                Ok(false)
            }
        }
    }

    /// Forward up to `limit` articles (all eligible ones when `None`),
    /// skipping the first `skip`. Rejected articles stay `extracted` and are
    /// stepped over in later rounds.
    pub async fn forward(&self, limit: Option<usize>, skip: usize, logger: &RunLogger) -> Result<ForwardReport> {
        let logger = logger.clone().with_prefix("forward".to_string());
        let eligible = self.store.count_by_status(ArticleStatus::Extracted).await?;
        let target = limit.unwrap_or(eligible).min(eligible.saturating_sub(skip));
        logger.info(&format!("{} articles to be sent to {}", target, self.corpus));

        let mut report = ForwardReport::default();
        while report.sent + report.failed < target {
            let remaining = target - report.sent - report.failed;
            let batch = self
                .store
                .find_by_status(ArticleStatus::Extracted, self.page_size.min(remaining), skip + report.failed)
                .await?;
            if batch.is_empty() {
                break;
            }

            let futures: Vec<_> = batch
                .iter()
                .map(|article| {
                    let semaphore = self.semaphore.clone();
                    let logger = logger.clone();
                    async move {
                        let _permit = semaphore.acquire().await.map_err(|e| Error::External(e.into()))?;
                        self.forward_one(article, &logger).await
                    }
                })
                .collect();

            for result in join_all(futures).await {
                match result? {
                    true => report.sent += 1,
                    false => report.failed += 1,
                }
            }
            logger.info(&format!("{}/{} documents sent", report.sent, target));
        }

        Ok(report)
    }
}
