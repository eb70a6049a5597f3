//! ENS naming helpers: label hashing, namehash and subdomain label normalization.

use alloy_primitives::{B256, keccak256};

/// keccak256 of a single label
#[must_use]
pub fn labelhash(label: &str) -> B256 {
    keccak256(label.as_bytes())
}

/// Recursive ENS namehash of a dotted name. The empty name hashes to zero.
#[must_use]
pub fn namehash(name: &str) -> B256 {
    if name.is_empty() {
        return B256::ZERO;
    }
    name.rsplit('.').fold(B256::ZERO, |node, label| {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(node.as_slice());
        buf[32..].copy_from_slice(labelhash(label).as_slice());
        keccak256(buf)
    })
}

/// Trim and lowercase a user-entered subdomain label.
///
/// Returns `None` if the result is not a valid single DNS-style label.
#[must_use]
pub fn normalize_label(input: &str) -> Option<String> {
    let label = input.trim().to_lowercase();
    let valid_chars = label
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if label.is_empty() || !valid_chars || label.starts_with('-') || label.ends_with('-') {
        return None;
    }
    Some(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn test_namehash_known_vectors() {
        assert_eq!(namehash(""), B256::ZERO);
        assert_eq!(
            namehash("eth"),
            b256!("93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae")
        );
        assert_eq!(
            namehash("foo.eth"),
            b256!("de9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f")
        );
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Alice "), Some("alice".to_string()));
        assert_eq!(normalize_label("my-name42"), Some("my-name42".to_string()));
        assert_eq!(normalize_label(""), None);
        assert_eq!(normalize_label("-bad"), None);
        assert_eq!(normalize_label("two.labels"), None);
        assert_eq!(normalize_label("spa ce"), None);
    }
}
