//! Redirect target planning
//!
//! A redirect rule carries its own target and the policy-wide default. The
//! order in which those are tried is fixed:
//!
//! 1. own remote page (if it answers a liveness probe)
//! 2. own inline HTML
//! 3. default remote page (if it answers a liveness probe)
//! 4. default inline HTML
//!
//! This module only plans the chain. Running the probes is I/O and belongs to
//! the agent.

use crate::types::RedirectSpec;
use crate::url::inline_document_url;

/// One step of the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Remote page; usable only after a successful liveness probe
    Remote(String),
    /// Inline document, already encoded as a `data:` URL; always usable
    Inline(String),
}

impl Candidate {
    pub fn url(&self) -> &str {
        match self {
            Self::Remote(url) | Self::Inline(url) => url,
        }
    }

    #[inline]
    pub fn needs_probe(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Build the ordered fallback chain for a rule. Empty fields are skipped.
pub fn fallback_chain(own: &RedirectSpec, fallback: &RedirectSpec) -> Vec<Candidate> {
    let mut chain = Vec::with_capacity(4);
    for spec in [own, fallback] {
        if let Some(remote) = spec.remote() {
            chain.push(Candidate::Remote(remote.to_string()));
        }
        if let Some(html) = spec.inline() {
            chain.push(Candidate::Inline(inline_document_url(html)));
        }
    }
    chain
}

/// Walk a chain with a synchronous liveness check and return the first usable
/// target.
pub fn resolve_with<F>(chain: &[Candidate], mut is_live: F) -> Option<&str>
where
    F: FnMut(&str) -> bool,
{
    chain.iter().find_map(|candidate| match candidate {
        Candidate::Remote(url) if is_live(url) => Some(url.as_str()),
        Candidate::Remote(url) => {
            log::warn!("Remote target {url} failed liveness check, falling back");
            None
        }
        Candidate::Inline(url) => Some(url.as_str()),
    })
}
