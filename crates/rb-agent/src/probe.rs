//! Liveness probes for remote redirect targets.

use reqwest::header::{CACHE_CONTROL, PRAGMA};

use crate::error::ProbeError;

#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// `Ok` when `url` answered a header-only request with a success status.
    async fn head_check(&self, url: &str) -> Result<(), ProbeError>;
}

/// HEAD request with caching disabled.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn head_check(&self, url: &str) -> Result<(), ProbeError> {
        let response = self
            .client
            .head(url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }
}
