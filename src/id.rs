//! UID and timestamp generation for callers that do not supply their own.

use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a unique item UID from the current time + entropy.
/// Format: "nq-" + 10 hex chars of SHA256(timestamp + random)
pub fn generate_uid(now: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(now.timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    hasher.update(rand::rng().random::<[u8; 8]>());
    let hash = hasher.finalize();
    format!(
        "nq-{:010x}",
        u64::from_be_bytes([hash[0], hash[1], hash[2], hash[3], hash[4], 0, 0, 0]) >> 24
    )
}

/// Timestamp in the form the queue stores: second precision, no zone suffix.
pub fn timestamp_now(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S").to_string()
}
