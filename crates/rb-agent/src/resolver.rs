//! Redirect target resolution.
//!
//! Runs the fallback chain from `rb_core::resolver`, probing remote targets.
//! Nothing is cached: remote liveness can change between navigations.

use std::sync::Arc;
use std::time::Duration;

use rb_core::resolver::{fallback_chain, Candidate};
use rb_core::types::RedirectSpec;

use crate::error::ProbeError;
use crate::probe::Probe;

#[derive(Clone)]
pub struct TargetResolver {
    probe: Arc<dyn Probe>,
    timeout: Duration,
}

impl std::fmt::Debug for TargetResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetResolver")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TargetResolver {
    pub fn new(probe: Arc<dyn Probe>, timeout: Duration) -> Self {
        Self { probe, timeout }
    }

    /// First usable target of the chain, or `None` to leave navigation alone.
    pub async fn resolve(&self, own: &RedirectSpec, fallback: &RedirectSpec) -> Option<String> {
        for candidate in fallback_chain(own, fallback) {
            match candidate {
                Candidate::Inline(url) => return Some(url),
                Candidate::Remote(url) => match self.check(&url).await {
                    Ok(()) => return Some(url),
                    Err(e) => log::warn!("Remote target {url} unavailable ({e}), falling back"),
                },
            }
        }
        None
    }

    async fn check(&self, url: &str) -> Result<(), ProbeError> {
        match tokio::time::timeout(self.timeout, self.probe.head_check(url)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }
}
