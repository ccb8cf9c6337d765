//! # Cache Facade
//!
//! `ShardedCache` ties the hash router, shard array, and timing wheel
//! together behind the `Cache` trait: `Get`, `Put`, `PutEx`, `Del`, `TTL`,
//! `Expire`. The public contract never surfaces an error — a miss, a stale
//! key, or an already-expired entry are all just `None`/`false`; only the
//! internal `check_invariants` diagnostic returns `CacheResult`.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, trace};

use crate::bucket::Bucket;
use crate::config::CacheConfig;
use crate::entry::{Entry, TtlMillis, TTL_EXPIRED, TTL_NEVER};
use crate::hash::{route, SHARD_COUNT};
use crate::wheel::TimingWheel;

/// The public contract every backend behind the facade implements.
pub trait Cache {
    /// Returns the live value for `key`, or `None` if absent or expired.
    fn get(&self, key: &[u8]) -> Option<Arc<[u8]>>;

    /// Inserts `key` -> `value`. If `key` already exists, its current TTL is
    /// inherited; a brand new key never-expires.
    fn put(&self, key: &[u8], value: &[u8]);

    /// Inserts `key` -> `value` with an explicit TTL in milliseconds (`-1`
    /// never-expires, `0` is immediately expired, `>0` is a lifetime).
    fn put_ex(&self, key: &[u8], value: &[u8], ttl_ms: TtlMillis);

    /// Removes `key`. Idempotent: removing an absent key is a no-op.
    fn del(&self, key: &[u8]);

    /// Returns the key's remaining TTL (`-1`/`0`/`>0`), or `None` if absent
    /// or already expired.
    fn ttl(&self, key: &[u8]) -> Option<TtlMillis>;

    /// Overwrites an existing key's TTL without touching its value. Returns
    /// `false` if the key is absent or already expired.
    fn expire(&self, key: &[u8], ttl_ms: TtlMillis) -> bool;
}

/// Background sweeper handle; dropping it does not stop the sweep thread,
/// only `ShardedCache::drop` does, so the cache itself owns the lifetime.
struct Sweeper {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// A 256-shard in-process cache with wheel-driven expiration.
pub struct ShardedCache {
    shards: Arc<Vec<Bucket>>,
    wheel: Arc<TimingWheel>,
    sweeper: Option<Sweeper>,
}

impl ShardedCache {
    pub fn new(config: CacheConfig) -> Arc<Self> {
        let mut shards = Vec::with_capacity(SHARD_COUNT);
        shards.resize_with(SHARD_COUNT, Bucket::new);
        let shards = Arc::new(shards);
        let wheel = TimingWheel::start(config.wheel_size, config.tick_duration);

        debug!(shard_count = SHARD_COUNT, wheel_size = config.wheel_size, "cache initialized");

        let mut cache = ShardedCache {
            shards,
            wheel,
            sweeper: None,
        };

        if let Some(interval) = config.sweep_interval {
            cache.sweeper = Some(cache.start_sweeper(interval));
        }

        Arc::new(cache)
    }

    fn start_sweeper(&self, interval: Duration) -> Sweeper {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let shards = Arc::clone(&self.shards);

        let thread = std::thread::Builder::new()
            .name("cache-sweeper".to_string())
            .spawn(move || {
                while thread_running.load(AtomicOrdering::Acquire) {
                    std::thread::sleep(interval.min(Duration::from_millis(200)));
                    if !thread_running.load(AtomicOrdering::Acquire) {
                        break;
                    }
                    // Only actually sweep once `interval` has elapsed; the
                    // shorter sleep above keeps shutdown latency bounded.
                    let elapsed_intervals = interval.as_millis().max(1);
                    if elapsed_intervals > 200 {
                        std::thread::sleep(interval - Duration::from_millis(200));
                    }
                    if !thread_running.load(AtomicOrdering::Acquire) {
                        break;
                    }
                    let total: usize = shards.iter().map(|b| b.purge_expired()).sum();
                    if total > 0 {
                        trace!(total, "sweeper purged expired entries");
                    }
                }
            })
            .expect("failed to spawn cache sweeper thread");

        Sweeper {
            running,
            thread: Some(thread),
        }
    }

    fn shard_for(&self, key: &[u8]) -> (&Bucket, u8, u16) {
        let routed = route(key);
        (&self.shards[routed.shard_id as usize], routed.shard_id, routed.fingerprint)
    }

    /// Schedules the wheel callback for a freshly-inserted entry with a
    /// positive TTL, then attaches the resulting handle back onto the
    /// entry so a later `Del`/`Expire` can cancel it.
    fn schedule_expiry(&self, key: Arc<[u8]>, shard_id: u8, fingerprint: u16, created_ms: i64, ttl_ms: TtlMillis) {
        if ttl_ms <= 0 {
            return;
        }
        let shards = Arc::clone(&self.shards);
        let key_for_cb = Arc::clone(&key);
        let handle = self.wheel.post_delayed(Duration::from_millis(ttl_ms as u64), move || {
            shards[shard_id as usize].conditional_expire_delete(&key_for_cb, fingerprint, created_ms);
        });
        if let Some(handle) = handle {
            self.shards[shard_id as usize].attach_handle(&key, fingerprint, created_ms, handle);
        }
    }

    /// Diagnostic self-check: every entry reachable under the shard and
    /// fingerprint its key actually hashes to. Not part of the public
    /// contract.
    pub fn check_invariants(&self) -> cache_common::CacheResult<()> {
        for (shard_id, bucket) in self.shards.iter().enumerate() {
            bucket.check_invariants(shard_id as u8)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for ShardedCache {
    fn get(&self, key: &[u8]) -> Option<Arc<[u8]>> {
        let (bucket, _, fingerprint) = self.shard_for(key);
        bucket.get_value(key, fingerprint)
    }

    fn put(&self, key: &[u8], value: &[u8]) {
        let (bucket, shard_id, fingerprint) = self.shard_for(key);
        let inherited_ttl = bucket
            .get_value(key, fingerprint)
            .and(bucket.ttl(key, fingerprint))
            .unwrap_or(TTL_NEVER);
        self.put_inner(key, value, shard_id, fingerprint, inherited_ttl);
    }

    fn put_ex(&self, key: &[u8], value: &[u8], ttl_ms: TtlMillis) {
        let (_, shard_id, fingerprint) = self.shard_for(key);
        self.put_inner(key, value, shard_id, fingerprint, ttl_ms);
    }

    fn del(&self, key: &[u8]) {
        let (bucket, _, fingerprint) = self.shard_for(key);
        if let Some(old) = bucket.del(key, fingerprint) {
            if let Some(handle) = old.scheduler_handle {
                handle.cancel();
            }
        }
    }

    fn ttl(&self, key: &[u8]) -> Option<TtlMillis> {
        let (bucket, _, fingerprint) = self.shard_for(key);
        bucket.ttl(key, fingerprint)
    }

    fn expire(&self, key: &[u8], ttl_ms: TtlMillis) -> bool {
        let (bucket, shard_id, fingerprint) = self.shard_for(key);
        match bucket.set_ttl(key, fingerprint, ttl_ms) {
            None => false,
            Some((old_handle, created_ms)) => {
                if let Some(handle) = old_handle {
                    handle.cancel();
                }
                self.schedule_expiry(Arc::from(key), shard_id, fingerprint, created_ms, ttl_ms);
                true
            }
        }
    }
}

impl ShardedCache {
    fn put_inner(&self, key: &[u8], value: &[u8], shard_id: u8, fingerprint: u16, ttl_ms: TtlMillis) {
        let key_arc: Arc<[u8]> = Arc::from(key);
        let entry = Entry::new(Arc::clone(&key_arc), fingerprint, shard_id, Arc::from(value), ttl_ms);
        let created_ms = entry.created_ms;

        let old = self.shards[shard_id as usize].put(Arc::clone(&key_arc), fingerprint, entry);
        if let Some(old_entry) = old {
            if let Some(handle) = old_entry.scheduler_handle {
                handle.cancel();
            }
        }

        if ttl_ms > 0 {
            self.schedule_expiry(key_arc, shard_id, fingerprint, created_ms, ttl_ms);
        } else if ttl_ms == TTL_EXPIRED {
            // Expired-on-arrival: leave it for the next read/sweep to reap
            // rather than deleting synchronously under the write lock we
            // already released.
            trace!("put with zero TTL is expired on arrival");
        }
    }
}

impl Drop for ShardedCache {
    fn drop(&mut self) {
        if let Some(mut sweeper) = self.sweeper.take() {
            sweeper.running.store(false, AtomicOrdering::Release);
            if let Some(thread) = sweeper.thread.take() {
                let _ = thread.join();
            }
        }
        self.wheel.stop();
    }
}
