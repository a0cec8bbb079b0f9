//! Core type definitions for Roadblock
//!
//! These types are what a compiled policy persists between refreshes. They
//! serialize to JSON with the same field names the browser-side store uses.

use serde::{Deserialize, Serialize};

// =============================================================================
// Redirect Specs
// =============================================================================

/// Where a redirect should send the browser.
///
/// Either field may be set; resolution order between them is fixed by
/// [`crate::resolver::fallback_chain`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectSpec {
    /// Inline HTML served as a `data:` document (`html` in the policy)
    #[serde(rename = "html", default, skip_serializing_if = "Option::is_none")]
    pub inline_html: Option<String>,
    /// Remote page to redirect to once it answers a liveness probe (`htmlsrc`)
    #[serde(rename = "htmlsrc", default, skip_serializing_if = "Option::is_none")]
    pub remote_html_url: Option<String>,
}

impl RedirectSpec {
    /// Remote target, ignoring empty strings.
    pub fn remote(&self) -> Option<&str> {
        self.remote_html_url.as_deref().filter(|s| !s.is_empty())
    }

    /// Inline HTML, ignoring empty strings.
    pub fn inline(&self) -> Option<&str> {
        self.inline_html.as_deref().filter(|s| !s.is_empty())
    }
}

// =============================================================================
// Rules
// =============================================================================

/// A pattern the filtering engine must block outright.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRule {
    /// Sequence number within one compiled generation, starting at 1
    pub id: u32,
    /// Wildcard pattern, passed to the engine verbatim
    pub pattern: String,
}

impl BlockRule {
    pub fn new(id: u32, pattern: impl Into<String>) -> Self {
        Self {
            id,
            pattern: pattern.into(),
        }
    }
}

/// A pattern whose navigations are replaced by a resolved destination.
///
/// Stored unresolved: the destination depends on a liveness probe that has to
/// run on every matching navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRule {
    pub pattern: String,
    /// The entry's own target
    #[serde(rename = "ruleConfig")]
    pub own: RedirectSpec,
    /// The document-wide default target
    #[serde(rename = "globalConfig")]
    pub fallback: RedirectSpec,
}

// =============================================================================
// Lock
// =============================================================================

/// Whether policy mutation currently requires a password.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    Locked,
    #[default]
    Unlocked,
}

impl LockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        }
    }
}

/// Lock state derived from the last compiled policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLock {
    pub status: LockStatus,
    /// Lowercase or mixed-case SHA-256 hex digest; `None` when unlocked
    #[serde(default)]
    pub digest_hex: Option<String>,
}

impl AccessLock {
    pub fn locked(digest_hex: impl Into<String>) -> Self {
        Self {
            status: LockStatus::Locked,
            digest_hex: Some(digest_hex.into()),
        }
    }

    pub fn unlocked() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.status == LockStatus::Locked
    }
}
