//! Identity fingerprinting.
//!
//! Derives a stable, non-reversible fingerprint from a raw network address.
//! Fingerprints are compared for equality to detect alt accounts; the raw
//! address is never stored.

use sha2::{Digest, Sha256};

/// Fingerprint recorded when no address was available on the request.
pub const UNKNOWN_FINGERPRINT: &str = "unknown";

/// Leading characters of the address discarded before hashing.
const ADDRESS_PREFIX_LEN: usize = 2;

/// Stored fingerprint length in hex characters.
const FINGERPRINT_LEN: usize = 10;

/// Hash a raw network address into a fixed-width fingerprint.
///
/// Identical addresses always produce identical fingerprints. A missing or
/// empty address maps to [`UNKNOWN_FINGERPRINT`].
pub fn hash_address(raw_address: Option<&str>) -> String {
    let addr = match raw_address {
        Some(a) if !a.is_empty() => a,
        _ => return UNKNOWN_FINGERPRINT.to_string(),
    };

    // Prefix is dropped in characters, not bytes; forwarded-for headers are
    // not guaranteed to be ASCII.
    let cut = match addr.char_indices().nth(ADDRESS_PREFIX_LEN) {
        Some((byte_idx, _)) => &addr[byte_idx..],
        None => addr,
    };

    let digest = Sha256::digest(cut.as_bytes());
    let mut fingerprint = hex::encode(digest);
    fingerprint.truncate(FINGERPRINT_LEN);
    fingerprint
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_address_maps_to_sentinel() {
        assert_eq!(hash_address(None), UNKNOWN_FINGERPRINT);
        assert_eq!(hash_address(Some("")), UNKNOWN_FINGERPRINT);
    }

    #[test]
    fn test_deterministic() {
        let a = hash_address(Some("203.0.113.7"));
        let b = hash_address(Some("203.0.113.7"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fixed_width() {
        assert_eq!(hash_address(Some("203.0.113.7")).len(), FINGERPRINT_LEN);
        assert_eq!(hash_address(Some("::1")).len(), FINGERPRINT_LEN);
    }

    #[test]
    fn test_distinct_addresses_distinct_fingerprints() {
        assert_ne!(
            hash_address(Some("203.0.113.7")),
            hash_address(Some("203.0.113.8"))
        );
    }

    #[test]
    fn test_short_address_hashed_whole() {
        // Addresses at or below the prefix length are hashed as-is.
        let digest = Sha256::digest("ab".as_bytes());
        let mut expected = hex::encode(digest);
        expected.truncate(FINGERPRINT_LEN);
        assert_eq!(hash_address(Some("ab")), expected);
    }

    #[test]
    fn test_fingerprint_is_lowercase_hex() {
        let fp = hash_address(Some("203.0.113.7"));
        assert_ne!(fp, "203.0.113.7");
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
