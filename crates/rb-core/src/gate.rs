//! Password gate
//!
//! A locked policy carries the SHA-256 digest of a secret. Presenting the
//! secret unlocks policy mutation for one session of the calling surface; the
//! stored lock itself never changes here.

use crate::hash::sha256_hex;
use crate::types::AccessLock;

/// Check `candidate` against a stored hex digest.
///
/// Returns false when the candidate is empty or no digest is stored. The
/// comparison is on the lowercase hex rendering, so the stored digest must be
/// lowercase to ever match.
pub fn verify(candidate: &str, stored_digest_hex: Option<&str>) -> bool {
    let stored = match stored_digest_hex {
        Some(stored) if !candidate.is_empty() => stored,
        _ => return false,
    };
    sha256_hex(candidate.as_bytes()) == stored
}

/// Session-scoped unlock state held by a caller (an options page, a CLI run).
#[derive(Debug, Clone, Default)]
pub struct UnlockSession {
    unlocked: bool,
}

impl UnlockSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to unlock the session. Failure leaves the session as it was.
    pub fn unlock(&mut self, candidate: &str, lock: &AccessLock) -> bool {
        let ok = verify(candidate, lock.digest_hex.as_deref());
        if ok {
            self.unlocked = true;
        } else {
            log::warn!("Password verification failed");
        }
        ok
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// May this session mutate the policy source under `lock`?
    pub fn may_edit(&self, lock: &AccessLock) -> bool {
        !lock.is_locked() || self.unlocked
    }
}
