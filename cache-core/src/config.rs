//! # Cache Configuration
//!
//! Tunables for shard/wheel sizing and background sweeping, with a
//! `Default` chosen to behave reasonably without any tuning.

use std::time::Duration;

use crate::wheel::{DEFAULT_WHEEL_SIZE, MAX_WHEEL_SIZE, MIN_WHEEL_SIZE};

/// Construction parameters for a `ShardedCache`.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Number of buckets in the expiration wheel's ring. Clamped to
    /// `[MIN_WHEEL_SIZE, MAX_WHEEL_SIZE]` and rounded to a power of two.
    pub wheel_size: usize,
    /// How often the wheel advances by one tick.
    pub tick_duration: Duration,
    /// Interval for the background sweep that catches entries whose
    /// scheduled callback never ran (e.g. the wheel was stopped and
    /// restarted). `None` disables the sweeper; expiration still happens
    /// lazily on read via `Entry::is_expired`.
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            wheel_size: DEFAULT_WHEEL_SIZE,
            tick_duration: Duration::from_millis(100),
            sweep_interval: Some(Duration::from_secs(30)),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the wheel's ring size; out-of-range values are clamped when the
    /// wheel starts, not here.
    pub fn with_wheel_size(mut self, wheel_size: usize) -> Self {
        self.wheel_size = wheel_size.clamp(MIN_WHEEL_SIZE, MAX_WHEEL_SIZE);
        self
    }

    pub fn with_tick_duration(mut self, tick_duration: Duration) -> Self {
        self.tick_duration = tick_duration;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Option<Duration>) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_wheel_size_is_already_in_range() {
        let cfg = CacheConfig::default();
        assert!(cfg.wheel_size >= MIN_WHEEL_SIZE && cfg.wheel_size <= MAX_WHEEL_SIZE);
    }

    #[test]
    fn with_wheel_size_clamps_out_of_range_values() {
        let cfg = CacheConfig::new().with_wheel_size(1);
        assert_eq!(cfg.wheel_size, MIN_WHEEL_SIZE);
        let cfg = CacheConfig::new().with_wheel_size(usize::MAX);
        assert_eq!(cfg.wheel_size, MAX_WHEEL_SIZE);
    }
}
