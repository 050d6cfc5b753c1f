use std::time::Duration;

use async_trait::async_trait;
use mc_core::{CaptureConfig, Error, Result};
use reqwest::Client;

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub body: String,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url`. Timeouts and connection failures come back as
    /// `Error::Network`; nothing is retried.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &CaptureConfig) -> Result<Self> {
        Self::new(config.fetch_timeout(), &config.user_agent)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::network(url, e))?;

        // Decodes with the charset from Content-Type, UTF-8 when absent.
        let body = response.text().await.map_err(|e| Error::network(url, e))?;

        Ok(FetchedPage {
            url: url.to_string(),
            body,
        })
    }
}
