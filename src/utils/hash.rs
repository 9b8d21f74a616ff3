//! Hashing helpers built on `blake3`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Six hex characters of the content hash, used by `$hash` in download names.
#[inline]
pub fn short_hash<T: AsRef<[u8]> + ?Sized>(data: &T) -> String {
    let digest = blake3::hash(data.as_ref());
    hex::encode(&digest.as_bytes()[..3])
}

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A process-unique token formatted like a UUID (`8-4-4-4-12`).
///
/// Backs the `$uuid` name variable. The seed keeps tokens stable in debug
/// output for the same source, the counter and clock keep them unique.
pub fn unique_token(seed: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let count = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut hasher = blake3::Hasher::new();
    hasher.update(seed.as_bytes());
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&count.to_le_bytes());
    let h = hex::encode(&hasher.finalize().as_bytes()[..16]);

    format!("{}-{}-{}-{}-{}", &h[..8], &h[8..12], &h[12..16], &h[16..20], &h[20..32])
}
