//! Policy source fetch.

use reqwest::header::{CACHE_CONTROL, PRAGMA};

use crate::error::SourceError;

#[async_trait::async_trait]
pub trait PolicySource: Send + Sync {
    /// Fetch the policy document text. A 2xx with an empty body is `Ok("")`.
    async fn fetch_text(&self, url: &str) -> Result<String, SourceError>;
}

/// Fetches policies over HTTP, bypassing caches.
#[derive(Debug, Clone)]
pub struct HttpPolicySource {
    client: reqwest::Client,
}

impl HttpPolicySource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl PolicySource for HttpPolicySource {
    async fn fetch_text(&self, url: &str) -> Result<String, SourceError> {
        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}
