//! Network access for the cache worker.
//!
//! The worker never talks to reqwest directly; it goes through [`Fetcher`],
//! so the install and fetch paths can run against an in-memory origin.

use async_trait::async_trait;

use crate::models::StoredResponse;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request never produced a response.
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },
    /// A response arrived but its status is not 2xx.
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// Fetches one URL path from the network.
///
/// Implementations return any response the server produced, including error
/// statuses; only transport failures are `Err`. Callers that need a 2xx
/// (bulk add) check [`StoredResponse::is_ok`] themselves.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<StoredResponse, FetchError>;
}

/// [`Fetcher`] backed by reqwest, resolving paths against an origin.
pub struct HttpFetcher {
    client: reqwest::Client,
    origin: String,
}

impl HttpFetcher {
    pub fn new(origin: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
        })
    }

    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.origin, url)
        } else {
            format!("{}/{}", self.origin, url)
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<StoredResponse, FetchError> {
        let full = self.resolve(url);
        let network = |e: reqwest::Error| FetchError::Network {
            url: full.clone(),
            message: e.to_string(),
        };

        let resp = self.client.get(&full).send().await.map_err(network)?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = resp.bytes().await.map_err(network)?.to_vec();

        tracing::debug!(url = %full, status, bytes = body.len(), "network fetch");

        Ok(StoredResponse {
            url: url.to_string(),
            status,
            content_type,
            body,
        })
    }
}
