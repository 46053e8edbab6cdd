//! Product fingerprints: SHA-256 hex digests bound to one physical unit.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Length of a hex-encoded SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 64;

/// True when `candidate` is exactly 64 lowercase hex characters.
pub fn is_well_formed(candidate: &str) -> bool {
    candidate.len() == FINGERPRINT_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Derive a fresh fingerprint for a product unit.
///
/// The nonce makes two units of the same batch distinguishable; callers
/// persist the result, it is never recomputed for comparison.
pub fn derive(
    product_name: &str,
    batch_number: &str,
    manufacturing_date: Option<DateTime<Utc>>,
    nonce: Uuid,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(product_name.as_bytes());
    hasher.update(batch_number.as_bytes());
    if let Some(date) = manufacturing_date {
        hasher.update(date.to_rfc3339().as_bytes());
    }
    hasher.update(nonce.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
