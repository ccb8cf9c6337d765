use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cache_core::cache::Cache;
use cache_core::config::CacheConfig;
use cache_core::hash::{fnv1_32, route};
use cache_core::{ShardedCache, TTL_NEVER};

fn fast_cache() -> Arc<ShardedCache> {
    ShardedCache::new(
        CacheConfig::new()
            .with_wheel_size(256)
            .with_tick_duration(Duration::from_millis(5))
            .with_sweep_interval(None),
    )
}

#[test]
fn s1_overwrite_replaces_value() {
    let cache = fast_cache();
    cache.put(b"user", b"admin");
    assert_eq!(&*cache.get(b"user").unwrap(), b"admin");
    cache.put(b"user", b"guest");
    assert_eq!(&*cache.get(b"user").unwrap(), b"guest");
}

#[test]
fn s2_put_ex_expires_and_reports_ttl_window() {
    let cache = fast_cache();
    cache.put_ex(b"k", b"1", 150);
    thread::sleep(Duration::from_millis(10));
    let remaining = cache.ttl(b"k").expect("should still be live");
    assert!(remaining > 0 && remaining <= 150);

    thread::sleep(Duration::from_millis(400));
    assert!(cache.get(b"k").is_none());
    assert!(cache.ttl(b"k").is_none());
}

#[test]
fn s3_put_after_put_ex_inherits_ttl_and_keeps_new_value() {
    let cache = fast_cache();
    cache.put_ex(b"k", b"v", 100);
    cache.put(b"k", b"w");
    assert_eq!(&*cache.get(b"k").unwrap(), b"w");
    thread::sleep(Duration::from_millis(400));
    assert!(cache.get(b"k").is_none());
}

#[test]
fn s4_expire_overrides_inherited_ttl() {
    let cache = fast_cache();
    cache.put_ex(b"k", b"v", 100);
    cache.put(b"k", b"w");
    assert!(cache.expire(b"k", TTL_NEVER));
    thread::sleep(Duration::from_millis(400));
    assert_eq!(&*cache.get(b"k").unwrap(), b"w");
}

#[test]
fn s5_concurrent_writers_on_disjoint_keys_lose_nothing() {
    let cache = fast_cache();
    let workers = 200;
    thread::scope(|scope| {
        for i in 0..workers {
            let cache = Arc::clone(&cache);
            scope.spawn(move || {
                let key = format!("k-{i}");
                let value = format!("v-{i}");
                cache.put(key.as_bytes(), value.as_bytes());
                assert_eq!(cache.get(key.as_bytes()).unwrap().as_ref(), value.as_bytes());
            });
        }
    });
    assert_eq!(cache.len(), workers);
    assert!(cache.check_invariants().is_ok());
}

#[test]
fn s6_fnv1_reference_vector_and_routing() {
    assert_eq!(fnv1_32(b"foobar"), 0x31F0_B262);
    let routed = route(b"foobar");
    assert_eq!(routed.shard_id, 0x31);
    assert_eq!(routed.fingerprint, 0xB262);
}

#[test]
fn del_is_idempotent_and_ttl_reports_missing_after() {
    let cache = fast_cache();
    cache.put(b"k", b"v");
    cache.del(b"k");
    cache.del(b"k");
    assert!(cache.get(b"k").is_none());
    assert!(cache.ttl(b"k").is_none());
}
