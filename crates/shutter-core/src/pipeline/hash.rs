//! BLAKE3 hashing for stored artifacts and upload keys.

use blake3::Hasher as Blake3Hasher;
use chrono::{DateTime, Utc};

/// Provides content hashing and upload key derivation.
pub struct Hasher;

impl Hasher {
    /// Generate a BLAKE3 hash from an in-memory byte buffer.
    ///
    /// Stored artifacts are hashed from the bytes read back from storage, so
    /// the hash can serve as a cache key or ETag.
    pub fn content_hash_from_bytes(data: &[u8]) -> String {
        let mut hasher = Blake3Hasher::new();
        hasher.update(data);
        hasher.finalize().to_hex().to_string()
    }

    /// First 16 hex chars of BLAKE3(owner id, timestamp in nanoseconds).
    ///
    /// The raw owner id is hashed, so owners whose ids sanitize to the same
    /// directory name still get distinct keys.
    pub fn upload_digest(owner_id: &str, timestamp: DateTime<Utc>) -> String {
        let nanos = timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX);
        let mut hasher = Blake3Hasher::new();
        hasher.update(&(owner_id.len() as u64).to_le_bytes());
        hasher.update(owner_id.as_bytes());
        hasher.update(&nanos.to_le_bytes());
        let hex = hasher.finalize().to_hex();
        hex[..16].to_string()
    }

    /// Upload key `{millis}-{digest}` shared by every artifact of one run.
    pub fn upload_key(owner_id: &str, timestamp: DateTime<Utc>) -> String {
        format!(
            "{}-{}",
            timestamp.timestamp_millis(),
            Self::upload_digest(owner_id, timestamp)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_content_hash_consistency() {
        let a = Hasher::content_hash_from_bytes(b"hello");
        let b = Hasher::content_hash_from_bytes(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, Hasher::content_hash_from_bytes(b"hello!"));
    }

    #[test]
    fn test_upload_key_format() {
        let ts = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let key = Hasher::upload_key("42", ts);
        let (millis, digest) = key.split_once('-').unwrap();
        assert_eq!(millis, "1700000000123");
        assert_eq!(digest.len(), 16);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_upload_digest_distinguishes_inputs() {
        let ts = Utc.timestamp_nanos(1_700_000_000_000_000_001);
        let later = Utc.timestamp_nanos(1_700_000_000_000_000_002);
        // Same sanitized directory, different raw ids
        assert_ne!(Hasher::upload_digest("a/b", ts), Hasher::upload_digest("a_b", ts));
        assert_ne!(Hasher::upload_digest("7", ts), Hasher::upload_digest("7", later));
        assert_eq!(Hasher::upload_digest("7", ts), Hasher::upload_digest("7", ts));
    }
}
