//! # Sharded TTL Cache Engine
//!
//! An in-process key/value cache: a fixed array of independently locked
//! shards, each owning a height-balanced ordered index, with expiration
//! driven by a hashed timing wheel that fires deletion callbacks in
//! amortized constant time.
//!
//! ## Structure Overview
//!
//! ```text
//! ShardedCache
//!   ├── shards: Arc<Vec<Bucket>>       (256 shards, one lock each)
//!   │     └── Bucket
//!   │           └── index: RwLock<OrderedIndex>
//!   │                 └── OrderedIndex (AVL tree keyed by (fingerprint, key))
//!   └── wheel: Arc<TimingWheel>         (ring of tick buckets + tick thread)
//! ```
//!
//! ## Design Principles
//!
//! 1. **Sharded Locks**: per-shard `RwLock` keeps contention local.
//! 2. **Ordered, Balanced Index**: fingerprint-first ordering with AVL
//!    rotations keeps point lookups at O(log n) even under hash collisions.
//! 3. **Hashed Timing Wheel**: O(1) scheduling, O(n/W) amortized firing,
//!    independent of how far in the future a TTL lands.
//! 3. **Arc-backed Values**: values are `Arc<[u8]>`; replacement publishes a
//!    new pointer so readers see either the old or new value, never a tear.
//! 4. **Strategy Pattern**: the public contract is a trait (`Cache`) so an
//!    alternative backend could sit behind the same API.

pub mod bucket;
pub mod cache;
pub mod config;
pub mod entry;
pub mod hash;
pub mod index;
pub mod wheel;

pub use cache::{Cache, ShardedCache};
pub use config::CacheConfig;
pub use entry::{TtlMillis, TTL_EXPIRED, TTL_NEVER};
