//! Roadblock Core Library
//!
//! This crate provides the policy-independent engine for the Roadblock URL
//! interceptor. It is synchronous and does no I/O: everything that talks to the
//! network, the disk or the browser lives in `rb-agent`.
//!
//! # Architecture
//!
//! A policy document is compiled (by `rb-compiler`) into two collections:
//! block rules, handed to the browser's filtering engine, and redirect rules,
//! kept in document order and matched lazily against navigations. A matched
//! redirect rule is turned into an ordered fallback chain of candidate targets
//! which the agent walks, probing remote candidates for liveness.
//!
//! # Modules
//!
//! - `types`: Shared data model (rules, redirect specs, lock state)
//! - `matcher`: Wildcard pattern compilation and ordered redirect matching
//! - `resolver`: Fallback chain planning for redirect targets
//! - `reconcile`: Minimal diff between installed and compiled block rules
//! - `gate`: Password gate protecting policy mutation
//! - `hash`: SHA-256 digest helpers
//! - `url`: Inline document (data URL) encoding

pub mod gate;
pub mod hash;
pub mod matcher;
pub mod reconcile;
pub mod resolver;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use gate::{verify, UnlockSession};
pub use hash::{is_valid_digest, sha256_hex};
pub use matcher::{PatternError, RedirectMatcher, WildcardPattern};
pub use reconcile::{reconcile, RuleDiff};
pub use resolver::{fallback_chain, Candidate};
pub use types::{AccessLock, BlockRule, LockStatus, RedirectRule, RedirectSpec};
pub use url::inline_document_url;
