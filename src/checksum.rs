//! Content checksums for config element values.
//!
//! Write-only values can never be read back from the platform, so drift is
//! detected by comparing SHA-256 digests instead of plaintext. The same gate
//! drives diff suppression during planning: a planned change to a gated
//! attribute is dropped when the new value hashes to the stored checksum.
//!
//! # Example
//!
//! ```
//! use spacelift_provider::checksum::{checksum_hex, matches};
//!
//! let stored = checksum_hex("is tasty");
//! assert_eq!(stored.len(), 64);
//! assert!(matches("is tasty", &stored));
//! assert!(!matches("is bland", &stored));
//! ```

use sha2::{Digest, Sha256};

/// Length in bytes of a SHA-256 digest.
pub const DIGEST_LEN: usize = 32;

/// Compute the SHA-256 digest of `content`.
pub fn checksum(content: impl AsRef<[u8]>) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(content.as_ref());
    hasher.finalize().into()
}

/// Compute the lower-case hex encoded SHA-256 digest of `content`.
///
/// This is the form persisted in the `checksum` attribute.
pub fn checksum_hex(content: impl AsRef<[u8]>) -> String {
    hex::encode(checksum(content))
}

/// Check whether `candidate` hashes to `known_checksum_hex`.
///
/// Returns `false` when the known checksum is not valid hex or is not a
/// 32-byte digest, so an unreadable stored checksum always reads as changed.
pub fn matches(candidate: impl AsRef<[u8]>, known_checksum_hex: &str) -> bool {
    let known = match hex::decode(known_checksum_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    if known.len() != DIGEST_LEN {
        return false;
    }

    constant_time_eq(&checksum(candidate), &known)
}

// Runs over every byte regardless of where the first mismatch sits.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const IS_TASTY: &str = "4d5d01ea427b10dd483e8fce5b5149fb5a9814e9ee614176b756ca4a65c8f154";

    #[test]
    fn test_checksum_known_value() {
        assert_eq!(checksum_hex("is tasty"), IS_TASTY);
        assert_eq!(
            checksum_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_checksum_is_deterministic() {
        assert_eq!(checksum("bacon"), checksum("bacon"));
        assert_ne!(checksum("bacon"), checksum("Bacon"));
        assert_ne!(checksum("bacon"), checksum("bacon "));
    }

    #[test]
    fn test_checksum_hex_shape() {
        let hex = checksum_hex("any value at all");
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_matches_same_value() {
        for value in ["", "is tasty", "multi\nline\nvalue", "ünïcødé"] {
            assert!(matches(value, &checksum_hex(value)), "value {:?}", value);
        }
    }

    #[test]
    fn test_matches_different_value() {
        assert!(!matches("is tasty", &checksum_hex("is not tasty")));
        assert!(!matches("", &checksum_hex(" ")));
    }

    #[test]
    fn test_matches_accepts_upper_case_hex() {
        assert!(matches("is tasty", &IS_TASTY.to_uppercase()));
    }

    #[test]
    fn test_matches_rejects_bad_checksum() {
        assert!(!matches("is tasty", "not hex at all"));
        assert!(!matches("is tasty", ""));
        // 65 characters: odd length never decodes
        assert!(!matches("is tasty", &format!("{}4", IS_TASTY)));
        // valid hex, wrong digest length
        assert!(!matches("is tasty", &IS_TASTY[..62]));
    }

    #[test]
    fn test_matches_binary_content() {
        let bytes = [0u8, 159, 146, 150];
        assert!(matches(bytes, &checksum_hex(bytes)));
    }

    proptest! {
        #[test]
        fn prop_checksum_is_deterministic(content in ".*") {
            prop_assert_eq!(checksum(&content), checksum(&content));
            prop_assert_eq!(checksum_hex(&content).len(), DIGEST_LEN * 2);
        }

        #[test]
        fn prop_matches_only_own_checksum(a in ".*", b in ".*") {
            prop_assert!(matches(&a, &checksum_hex(&a)));
            prop_assert_eq!(matches(&a, &checksum_hex(&b)), a == b);
        }
    }
}
