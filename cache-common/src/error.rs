//! # Error Types
//!
//! The public cache contract (`Get`/`Put`/`PutEx`/`Del`/`TTL`/`Expire`) never
//! returns one of these: a missing key is `None`, not an error, and the
//! contract never surfaces transient failures since there is no I/O at the
//! core. `CacheError` exists for the internal consistency self-check that
//! tests and operators can run against a live cache.

use thiserror::Error;

/// Internal invariant violations detected by `ShardedCache::check_invariants`.
///
/// A violation here means a programmer error in the shard/index bookkeeping,
/// not a caller mistake.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// An entry was reachable from a shard other than the one its key hashes to.
    #[error("entry for key {key:?} lives in shard {actual}, expected shard {expected}")]
    ShardMismatch {
        key: Vec<u8>,
        expected: u8,
        actual: u8,
    },

    /// An entry's stored fingerprint disagreed with the one derived from its key.
    #[error(
        "entry fingerprint {actual:#06x} for key {key:?} does not match derived fingerprint {expected:#06x}"
    )]
    FingerprintMismatch {
        key: Vec<u8>,
        expected: u16,
        actual: u16,
    },
}

/// Result alias for fallible diagnostics in this workspace.
pub type CacheResult<T> = Result<T, CacheError>;
