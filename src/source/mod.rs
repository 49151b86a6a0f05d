//! Remote data sources: the client CSV export and the boundary overlay.

pub mod boundary;
pub mod clients;

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub use boundary::{fetch_boundaries, BoundaryOverlay};
pub use clients::{departments, parse_clients, ClientLoader};

const USER_AGENT: &str = "clientmap/0.1 (client dashboard)";

/// Failure to obtain or decode a remote payload
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: StatusCode },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("malformed GeoJSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
}

/// Something that yields a text payload, typically a fixed URL.
pub trait TextSource {
    /// Fetch the whole payload
    fn fetch_text(&self) -> impl Future<Output = Result<String, SourceError>> + Send;
}

/// Build the shared HTTP client
pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// A fixed HTTP(S) URL
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    url: Url,
}

impl HttpSource {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl TextSource for HttpSource {
    async fn fetch_text(&self) -> Result<String, SourceError> {
        debug!("GET {}", self.url);

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|source| SourceError::Request {
                url: self.url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                url: self.url.to_string(),
                status: response.status(),
            });
        }

        response.text().await.map_err(|source| SourceError::Request {
            url: self.url.to_string(),
            source,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{SourceError, TextSource};

    /// In-memory source counting how often it was fetched
    pub struct StaticSource {
        body: Option<String>,
        calls: AtomicUsize,
    }

    impl StaticSource {
        pub fn new(body: &str) -> Self {
            Self {
                body: Some(body.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        /// A source whose every fetch fails
        pub fn unreachable() -> Self {
            Self {
                body: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TextSource for StaticSource {
        async fn fetch_text(&self) -> Result<String, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.body
                .clone()
                .ok_or_else(|| SourceError::Invalid("source unreachable".to_string()))
        }
    }
}
