//! # Cache Entry
//!
//! A record holding a key, its owning shard/fingerprint, creation time, TTL,
//! value, and a handle to its pending expiration callback. Values live
//! behind an `Arc` so a write publishes a single pointer: concurrent readers
//! observe either the whole old value or the whole new one, never a partial
//! write.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::wheel::WheelHandle;

/// Signed TTL in milliseconds. Negative means never-expire, zero means
/// expired-at-creation (or absent), positive is a lifetime in milliseconds.
pub type TtlMillis = i64;

/// Sentinel meaning "never expires".
pub const TTL_NEVER: TtlMillis = -1;

/// Sentinel meaning "expired" or "absent", depending on context.
pub const TTL_EXPIRED: TtlMillis = 0;

/// One live (or recently-live) cache record.
#[derive(Debug, Clone)]
pub struct Entry {
    pub key: Arc<[u8]>,
    pub fingerprint: u16,
    pub shard_id: u8,
    pub created_ms: i64,
    pub ttl_ms: TtlMillis,
    pub value: Arc<[u8]>,
    pub scheduler_handle: Option<WheelHandle>,
}

impl Entry {
    /// Builds a fresh entry stamped with the current time. The caller is
    /// responsible for TTL inheritance decisions before calling this.
    pub fn new(key: Arc<[u8]>, fingerprint: u16, shard_id: u8, value: Arc<[u8]>, ttl_ms: TtlMillis) -> Self {
        Entry {
            key,
            fingerprint,
            shard_id,
            created_ms: now_ms(),
            ttl_ms,
            value,
            scheduler_handle: None,
        }
    }

    /// Returns `true` if a positive TTL has elapsed as of `now_ms`. Never
    /// true for TTL `<= 0` (never-expire or already-expired-at-creation is
    /// handled by the caller via `ttl_remaining_ms`, not here).
    pub fn is_expired(&self, now_ms: i64) -> bool {
        if self.ttl_ms == TTL_EXPIRED {
            return true;
        }
        self.ttl_ms > 0 && self.created_ms + self.ttl_ms < now_ms
    }

    /// Remaining TTL per the public contract's `-1`/`0`/`>0` shape.
    pub fn ttl_remaining_ms(&self, now_ms: i64) -> TtlMillis {
        if self.ttl_ms == TTL_NEVER {
            return TTL_NEVER;
        }
        if self.ttl_ms == TTL_EXPIRED {
            return TTL_EXPIRED;
        }
        let remaining = self.created_ms + self.ttl_ms - now_ms;
        if remaining <= 0 {
            TTL_EXPIRED
        } else {
            remaining
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_ttl(ttl_ms: TtlMillis) -> Entry {
        Entry::new(Arc::from(b"k".as_slice()), 0, 0, Arc::from(b"v".as_slice()), ttl_ms)
    }

    #[test]
    fn never_expiring_entry_reports_ttl_never() {
        let e = entry_with_ttl(TTL_NEVER);
        assert_eq!(e.ttl_remaining_ms(e.created_ms + 10_000), TTL_NEVER);
        assert!(!e.is_expired(e.created_ms + 10_000));
    }

    #[test]
    fn zero_ttl_is_expired_immediately() {
        let e = entry_with_ttl(TTL_EXPIRED);
        assert!(e.is_expired(e.created_ms));
        assert_eq!(e.ttl_remaining_ms(e.created_ms), TTL_EXPIRED);
    }

    #[test]
    fn positive_ttl_expires_after_deadline() {
        let e = entry_with_ttl(100);
        assert!(!e.is_expired(e.created_ms + 50));
        assert!(e.is_expired(e.created_ms + 101));
        assert_eq!(e.ttl_remaining_ms(e.created_ms + 50), 50);
    }
}
