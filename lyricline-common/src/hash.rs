//! Content hashing for the artifact store and cache key derivation.

use sha2::{Digest, Sha256};

/// SHA-256 of `bytes`, hex-encoded. Used for `ArtifactEntry.content_hash`
/// and as the filename-safe on-disk key for downloaded artifacts.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex_encode(&digest)
}

/// Filename-safe hash of an arbitrary cache key string.
pub fn key_hash(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_hash_is_deterministic() {
        assert_eq!(key_hash("svc:abc123"), key_hash("svc:abc123"));
        assert_ne!(key_hash("svc:abc123"), key_hash("svc:abc124"));
    }

    #[test]
    fn content_hash_is_filename_safe() {
        let h = content_hash(b"hello world");
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h.len(), 64);
    }
}
