//! # Hashed Timing Wheel
//!
//! A fixed-size ring of tick buckets that schedules expiration callbacks
//! without per-entry timers. `post_delayed` hashes a deadline into one
//! bucket in O(1); a single background thread advances the ring one tick at
//! a time, draining and firing whatever lands in the bucket it just entered.
//! Cost to fire n expirations spread over the ring is amortized O(n / W)
//! per tick rather than O(log n) per timer.
//!
//! Cancellation is best-effort: a `WheelHandle` flips an atomic flag that the
//! firing loop checks before invoking the callback, so a cancel racing a
//! fire either wins outright or becomes a harmless no-op dispatch.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rand::RngCore;
use tracing::{debug, trace, warn};

/// Default ring size. A power of two so bucket selection is a mask.
pub const DEFAULT_WHEEL_SIZE: usize = 1024;
pub const MIN_WHEEL_SIZE: usize = 256;
pub const MAX_WHEEL_SIZE: usize = 65_535;

/// A 16-byte cancellation token: bytes 0-1 are the big-endian tick-bucket
/// index the timeout lives in (so `remove` can jump straight to its
/// bucket), bytes 2-15 are random, making tokens unguessable and collision-
/// free in practice without needing a global counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token([u8; 16]);

impl Token {
    fn new(bucket_index: u16, rng: &mut impl RngCore) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..2].copy_from_slice(&bucket_index.to_be_bytes());
        rng.fill_bytes(&mut bytes[2..]);
        Token(bytes)
    }

    fn bucket_index(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

type Callback = Box<dyn FnOnce() + Send + 'static>;

struct TimeoutNode {
    token: Token,
    cancelled: Arc<AtomicBool>,
    callback: Callback,
}

#[derive(Default)]
struct TickBucket {
    nodes: Vec<TimeoutNode>,
}

/// A handle returned by `post_delayed`/`post_at`; drop it or call `cancel`
/// to suppress the scheduled callback on a best-effort basis.
#[derive(Debug, Clone)]
pub struct WheelHandle {
    token: Token,
    cancelled: Arc<AtomicBool>,
}

impl WheelHandle {
    /// Requests cancellation. Returns `true` if the callback had not yet
    /// fired at the moment the flag was set; a concurrent fire may still be
    /// in flight past the check, so this is advisory, not a guarantee.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, AtomicOrdering::SeqCst)
    }

    pub fn token(&self) -> Token {
        self.token
    }
}

struct Inner {
    buckets: Vec<Mutex<TickBucket>>,
    wheel_size: usize,
    tick_duration: Duration,
    start: Instant,
    current_tick: AtomicUsize,
    running: AtomicBool,
}

/// The hashed timing wheel itself. Cheaply cloneable via `Arc` so callbacks
/// scheduled from within the cache can reach back into sibling shards.
pub struct TimingWheel {
    inner: Arc<Inner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TimingWheel {
    /// Builds and starts a wheel with `wheel_size` buckets advancing every
    /// `tick_duration`. `wheel_size` is clamped to `[MIN_WHEEL_SIZE,
    /// MAX_WHEEL_SIZE]` and rounded up to the next power of two.
    pub fn start(wheel_size: usize, tick_duration: Duration) -> Arc<Self> {
        let wheel_size = normalize_wheel_size(wheel_size);
        let mut buckets = Vec::with_capacity(wheel_size);
        buckets.resize_with(wheel_size, || Mutex::new(TickBucket::default()));

        let inner = Arc::new(Inner {
            buckets,
            wheel_size,
            tick_duration,
            start: Instant::now(),
            current_tick: AtomicUsize::new(0),
            running: AtomicBool::new(true),
        });

        let run_inner = Arc::clone(&inner);
        let thread = std::thread::Builder::new()
            .name("timing-wheel-tick".to_string())
            .spawn(move || run(run_inner))
            .expect("failed to spawn timing wheel tick thread");

        debug!(wheel_size, ?tick_duration, "timing wheel started");

        Arc::new(TimingWheel {
            inner,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Schedules `callback` to fire after `delay` from now. Returns `None`
    /// (a no-op schedule) if `delay` is negative or the wheel has stopped.
    pub fn post_delayed<F>(&self, delay: Duration, callback: F) -> Option<WheelHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_at(Instant::now() + delay, callback)
    }

    /// Schedules `callback` to fire at absolute `deadline`. A `deadline`
    /// already behind the wheel's start returns `None`: the literal
    /// contract for a timeout that is already due before the wheel began
    /// tracking time is a no-op handle, not an immediate fire, since the
    /// caller's own expiry check on read will already catch it.
    pub fn post_at<F>(&self, deadline: Instant, callback: F) -> Option<WheelHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.inner.running.load(AtomicOrdering::Acquire) {
            return None;
        }

        let elapsed = deadline.checked_duration_since(self.inner.start)?;
        let ticks_from_start = (elapsed.as_nanos() / self.inner.tick_duration.as_nanos().max(1)) as usize;
        let current = self.inner.current_tick.load(AtomicOrdering::Acquire);
        let ticks_ahead = ticks_from_start.saturating_sub(current).max(1);
        let bucket_index = (current + ticks_ahead) % self.inner.wheel_size;

        let cancelled = Arc::new(AtomicBool::new(false));
        let mut rng = rand::thread_rng();
        let token = Token::new(bucket_index as u16, &mut rng);

        let node = TimeoutNode {
            token,
            cancelled: Arc::clone(&cancelled),
            callback: Box::new(callback),
        };

        self.inner.buckets[bucket_index].lock().unwrap().nodes.push(node);
        trace!(bucket_index, ticks_ahead, "scheduled timeout");

        Some(WheelHandle { token, cancelled })
    }

    /// Removes a still-pending timeout by token, if it hasn't fired yet.
    /// Equivalent to `handle.cancel()` but also drops the node from its
    /// bucket immediately rather than leaving it to be skipped at fire time.
    pub fn remove(&self, token: Token) -> bool {
        let bucket_index = token.bucket_index() as usize % self.inner.wheel_size;
        let mut bucket = self.inner.buckets[bucket_index].lock().unwrap();
        if let Some(pos) = bucket.nodes.iter().position(|n| n.token == token) {
            let node = bucket.nodes.swap_remove(pos);
            node.cancelled.store(true, AtomicOrdering::SeqCst);
            true
        } else {
            false
        }
    }

    /// Stops the tick thread. Pending callbacks are dropped without firing.
    pub fn stop(&self) {
        self.inner.running.store(false, AtomicOrdering::Release);
        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    #[cfg(test)]
    fn wheel_size(&self) -> usize {
        self.inner.wheel_size
    }
}

impl Drop for TimingWheel {
    fn drop(&mut self) {
        self.inner.running.store(false, AtomicOrdering::Release);
    }
}

fn normalize_wheel_size(requested: usize) -> usize {
    let clamped = requested.clamp(MIN_WHEEL_SIZE, MAX_WHEEL_SIZE);
    clamped.next_power_of_two().min(MAX_WHEEL_SIZE.next_power_of_two())
}

/// Tick loop: sleep until the next tick boundary, drain the bucket the wheel
/// just entered, dispatch every non-cancelled node's callback, advance `k`.
fn run(inner: Arc<Inner>) {
    let mut next_tick_at = inner.start + inner.tick_duration;
    while inner.running.load(AtomicOrdering::Acquire) {
        let now = Instant::now();
        if let Some(remaining) = next_tick_at.checked_duration_since(now) {
            std::thread::sleep(remaining.min(Duration::from_millis(50)));
            if Instant::now() < next_tick_at {
                continue;
            }
        }

        let tick = inner.current_tick.fetch_add(1, AtomicOrdering::AcqRel) + 1;
        next_tick_at += inner.tick_duration;
        let bucket_index = tick % inner.wheel_size;

        let nodes = {
            let mut bucket = inner.buckets[bucket_index].lock().unwrap();
            std::mem::take(&mut bucket.nodes)
        };

        if nodes.is_empty() {
            continue;
        }

        trace!(bucket_index, count = nodes.len(), "firing tick bucket");
        for node in nodes {
            if node.cancelled.load(AtomicOrdering::SeqCst) {
                continue;
            }
            let callback = node.callback;
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(callback)) {
                warn!(?panic, "timing wheel callback panicked; dispatch continues");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn normalizes_wheel_size_to_power_of_two_within_bounds() {
        assert_eq!(normalize_wheel_size(1), MIN_WHEEL_SIZE);
        assert_eq!(normalize_wheel_size(1_000), 1024);
        assert_eq!(normalize_wheel_size(usize::MAX), MAX_WHEEL_SIZE.next_power_of_two());
    }

    #[test]
    fn post_delayed_fires_callback() {
        let wheel = TimingWheel::start(DEFAULT_WHEEL_SIZE, Duration::from_millis(5));
        let (tx, rx) = mpsc::channel();
        wheel.post_delayed(Duration::from_millis(20), move || {
            tx.send(()).unwrap();
        });
        rx.recv_timeout(Duration::from_secs(2)).expect("callback should have fired");
        wheel.stop();
    }

    #[test]
    fn cancelled_handle_suppresses_callback() {
        let wheel = TimingWheel::start(DEFAULT_WHEEL_SIZE, Duration::from_millis(5));
        let (tx, rx) = mpsc::channel::<()>();
        let handle = wheel
            .post_delayed(Duration::from_millis(50), move || {
                tx.send(()).unwrap();
            })
            .unwrap();
        assert!(handle.cancel());
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        wheel.stop();
    }

    #[test]
    fn remove_drops_pending_node_before_it_fires() {
        let wheel = TimingWheel::start(DEFAULT_WHEEL_SIZE, Duration::from_millis(5));
        let (tx, rx) = mpsc::channel::<()>();
        let handle = wheel
            .post_delayed(Duration::from_millis(50), move || {
                tx.send(()).unwrap();
            })
            .unwrap();
        assert!(wheel.remove(handle.token()));
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        wheel.stop();
    }

    #[test]
    fn deadline_before_wheel_start_is_a_noop() {
        let wheel = TimingWheel::start(DEFAULT_WHEEL_SIZE, Duration::from_millis(5));
        let before_start = wheel.inner.start - Duration::from_secs(1);
        assert!(wheel.post_at(before_start, || {}).is_none());
        wheel.stop();
    }

    #[test]
    fn panicking_callback_does_not_stop_the_tick_loop() {
        let wheel = TimingWheel::start(DEFAULT_WHEEL_SIZE, Duration::from_millis(5));
        wheel.post_delayed(Duration::from_millis(10), || panic!("boom"));
        let (tx, rx) = mpsc::channel();
        wheel.post_delayed(Duration::from_millis(30), move || tx.send(()).unwrap());
        rx.recv_timeout(Duration::from_secs(2)).expect("later callback should still fire");
        wheel.stop();
    }
}
