//! Hash functions for Roadblock
//!
//! The only digest in play is SHA-256, used for the lock secret. Digests are
//! exchanged as 64-character hex strings.

use sha2::{Digest, Sha256};

/// Length of a SHA-256 digest rendered as hex.
pub const DIGEST_HEX_LEN: usize = 64;

/// SHA-256 of `data` as lowercase hex.
#[inline]
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("{digest:x}")
}

/// Check that `s` looks like a SHA-256 hex digest (either case).
#[inline]
pub fn is_valid_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_empty() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_is_lowercase() {
        let h = sha256_hex(b"secret");
        assert_eq!(h.len(), DIGEST_HEX_LEN);
        assert_eq!(h, h.to_ascii_lowercase());
    }

    #[test]
    fn test_is_valid_digest() {
        assert!(is_valid_digest(&"a".repeat(64)));
        assert!(is_valid_digest(&"AbCdEf0123456789".repeat(4)));
        assert!(!is_valid_digest(&"a".repeat(63)));
        assert!(!is_valid_digest(&"a".repeat(65)));
        assert!(!is_valid_digest(&"g".repeat(64)));
        assert!(!is_valid_digest(""));
    }
}
