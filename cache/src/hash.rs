//! Shard routing hash.

const OFFSET_BASIS: u32 = 2166136261;
const PRIME: u32 = 16777619;

/// 32-bit FNV-style hash of a metric name.
///
/// Multiplies before xoring each byte. External tooling that inspects shard
/// placement relies on this exact order, so it must not be swapped for
/// FNV-1a.
#[inline]
pub fn fnv32(key: &[u8]) -> u32 {
    let mut hash = OFFSET_BASIS;
    for &byte in key {
        hash = hash.wrapping_mul(PRIME);
        hash ^= u32::from(byte);
    }
    hash
}
