//! # Shard Bucket
//!
//! One of 256 independent shards. Each bucket owns its own lock around an
//! `OrderedIndex`, so operations against keys that hash to different shards
//! never contend. Padded to a cache line so adjacent buckets in the shard
//! vector don't false-share on the lock word.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::entry::{now_ms, Entry, TtlMillis, TTL_EXPIRED};
use crate::index::OrderedIndex;

/// A single cache shard. `#[repr(align(64))]` plus the trailing padding
/// keeps each bucket on its own cache line in the `Vec<Bucket>` shard array.
#[repr(align(64))]
pub struct Bucket {
    index: RwLock<OrderedIndex>,
    _pad: [u64; 7],
}

impl Default for Bucket {
    fn default() -> Self {
        Bucket {
            index: RwLock::new(OrderedIndex::new()),
            _pad: [0; 7],
        }
    }
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a live value by key, returning `None` for both "absent" and
    /// "present but past its TTL" (lazy expiration on read).
    pub fn get_value(&self, key: &[u8], fingerprint: u16) -> Option<Arc<[u8]>> {
        let index = self.index.read();
        let entry = index.get(key, fingerprint)?;
        if entry.is_expired(now_ms()) {
            return None;
        }
        Some(Arc::clone(&entry.value))
    }

    /// Inserts or overwrites an entry, returning the scheduler handle of
    /// whatever it replaced so the caller can cancel the stale wheel entry.
    pub fn put(&self, key: Arc<[u8]>, fingerprint: u16, entry: Entry) -> Option<Entry> {
        self.index.write().set(key, fingerprint, entry)
    }

    /// Attaches a just-created wheel handle to the entry at `(key,
    /// fingerprint)`, if it's still the entry the caller scheduled for
    /// (guards against a concurrent overwrite landing between `put` and
    /// `attach_handle`).
    pub fn attach_handle(
        &self,
        key: &[u8],
        fingerprint: u16,
        created_ms: i64,
        handle: crate::wheel::WheelHandle,
    ) {
        let mut index = self.index.write();
        if let Some(entry) = index.get_mut(key, fingerprint) {
            if entry.created_ms == created_ms {
                entry.scheduler_handle = Some(handle);
            }
        }
    }

    pub fn del(&self, key: &[u8], fingerprint: u16) -> Option<Entry> {
        self.index.write().del(key, fingerprint)
    }

    /// Returns the entry's remaining TTL in the public `-1`/`0`/`>0` shape,
    /// or `None` if the key is absent or already expired.
    pub fn ttl(&self, key: &[u8], fingerprint: u16) -> Option<TtlMillis> {
        let index = self.index.read();
        let entry = index.get(key, fingerprint)?;
        let now = now_ms();
        if entry.is_expired(now) {
            return None;
        }
        Some(entry.ttl_remaining_ms(now))
    }

    /// Overwrites TTL on an existing entry without touching its value.
    /// Returns the previous scheduler handle (to cancel) and the entry's
    /// `created_ms` (to stamp the new wheel post), or `None` if absent or
    /// already expired.
    pub fn set_ttl(
        &self,
        key: &[u8],
        fingerprint: u16,
        new_ttl_ms: TtlMillis,
    ) -> Option<(Option<crate::wheel::WheelHandle>, i64)> {
        let mut index = self.index.write();
        let entry = index.get_mut(key, fingerprint)?;
        if entry.is_expired(now_ms()) {
            return None;
        }
        let old_handle = entry.scheduler_handle.take();
        entry.ttl_ms = new_ttl_ms;
        Some((old_handle, entry.created_ms))
    }

    /// Deletes the entry at `(key, fingerprint)` only if it is still the
    /// same entry that was scheduled (`created_ms` matches) and it is
    /// currently past its deadline. Called from the wheel's fire callback;
    /// a mismatch means the entry was overwritten or its TTL was pushed out
    /// since scheduling, so the callback becomes a no-op.
    pub fn conditional_expire_delete(&self, key: &[u8], fingerprint: u16, scheduled_created_ms: i64) {
        let mut index = self.index.write();
        let still_due = index
            .get(key, fingerprint)
            .map(|e| e.created_ms == scheduled_created_ms && e.is_expired(now_ms()))
            .unwrap_or(false);
        if still_due {
            index.del(key, fingerprint);
        }
    }

    /// Sweeps every expired entry out of this shard, returning how many
    /// were removed. Used by the background sweeper as a backstop for
    /// timeouts whose wheel callback never ran.
    pub fn purge_expired(&self) -> usize {
        let now = now_ms();
        let expired_keys: Vec<(Arc<[u8]>, u16)> = {
            let index = self.index.read();
            let mut keys = Vec::new();
            index.iterate(|entry| {
                if entry.ttl_ms != TTL_EXPIRED && entry.is_expired(now) {
                    keys.push((Arc::clone(&entry.key), entry.fingerprint));
                }
                true
            });
            keys
        };

        if expired_keys.is_empty() {
            return 0;
        }

        let mut index = self.index.write();
        let mut removed = 0;
        for (key, fingerprint) in expired_keys {
            if index.del(&key, fingerprint).is_some() {
                removed += 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Diagnostic check that every entry is reachable under the fingerprint
    /// and shard it was inserted with. Not part of the public contract;
    /// exercised by integration tests as a sanity backstop.
    pub fn check_invariants(&self, expected_shard_id: u8) -> cache_common::CacheResult<()> {
        let index = self.index.read();
        let mut result = Ok(());
        index.iterate(|entry| {
            if entry.shard_id != expected_shard_id {
                result = Err(cache_common::CacheError::ShardMismatch {
                    key: entry.key.to_vec(),
                    expected: expected_shard_id,
                    actual: entry.shard_id,
                });
                return false;
            }
            if crate::hash::route(&entry.key).fingerprint != entry.fingerprint {
                result = Err(cache_common::CacheError::FingerprintMismatch {
                    key: entry.key.to_vec(),
                    expected: crate::hash::route(&entry.key).fingerprint,
                    actual: entry.fingerprint,
                });
                return false;
            }
            true
        });
        result
    }
}
