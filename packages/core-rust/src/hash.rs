//! FNV-1a hash utilities for MerkleTree bucket routing.
//!
//! Provides a 32-bit FNV-1a hash that iterates over UTF-16 code units to match
//! the TypeScript `String.charCodeAt()` behavior, ensuring identical hashes
//! across Rust and TypeScript for cross-language MerkleTree synchronization.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a hash of a string, iterating over UTF-16 code units.
///
/// Matches the TypeScript reference implementation, which hashes
/// `String.charCodeAt(i)` for each character rather than UTF-8 bytes. This
/// keeps partition routing and `MerkleTree` bucket placement identical
/// across the Rust and TypeScript halves of the system.
///
/// # Examples
///
/// ```
/// use latticedb_core::hash::fnv1a_hash;
///
/// let h1 = fnv1a_hash("hello");
/// let h2 = fnv1a_hash("hello");
/// assert_eq!(h1, h2);
/// assert_ne!(h1, fnv1a_hash("world"));
/// ```
#[must_use]
pub fn fnv1a_hash(s: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for unit in s.encode_utf16() {
        hash ^= u32::from(unit);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Combines a list of hashes into a single order-independent hash via XOR fold.
///
/// Order independence is required because `MerkleTree` bucket hashes are
/// recomputed incrementally as entries are added/removed in arbitrary order;
/// the combined hash must not depend on insertion order.
///
/// # Examples
///
/// ```
/// use latticedb_core::hash::combine_hashes;
///
/// assert_eq!(combine_hashes(&[1, 2, 3]), 1 ^ 2 ^ 3);
/// assert_eq!(combine_hashes(&[1, 2, 3]), combine_hashes(&[3, 1, 2]));
/// ```
#[must_use]
pub fn combine_hashes(hashes: &[u32]) -> u32 {
    hashes.iter().fold(0u32, |acc, h| acc ^ h)
}
