//! Clocks that deferred releases wait on

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;

/// Time source for the deferred release scheduler.
///
/// Times are offsets from the clock's own origin. Deadlines are computed
/// when a release is scheduled, so a late-starting task still fires on
/// time.
#[async_trait]
pub trait DeferClock: Send + Sync + 'static {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// Resolve once `now() >= deadline`
    async fn sleep_until(&self, deadline: Duration);
}

/// Clock backed by the tokio timer.
pub struct RuntimeClock {
    origin: tokio::time::Instant,
}

impl RuntimeClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeferClock for RuntimeClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep_until(&self, deadline: Duration) {
        tokio::time::sleep_until(self.origin + deadline).await;
    }
}

/// Clock advanced explicitly by the host's update loop.
///
/// Game time only moves when [`FrameClock::advance`] is called, so deferred
/// releases follow paused or slowed-down simulation time.
///
/// # Examples
///
/// ```
/// use archetype_pool::{DeferClock, FrameClock};
/// use std::time::Duration;
///
/// let clock = FrameClock::new();
/// clock.advance(Duration::from_millis(16));
/// clock.advance(Duration::from_millis(16));
/// assert_eq!(clock.now(), Duration::from_millis(32));
/// ```
pub struct FrameClock {
    elapsed: watch::Sender<Duration>,
}

impl FrameClock {
    pub fn new() -> Self {
        let (elapsed, _) = watch::channel(Duration::ZERO);
        Self { elapsed }
    }

    /// Move time forward by one frame's delta
    pub fn advance(&self, delta: Duration) {
        self.elapsed.send_modify(|elapsed| *elapsed += delta);
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeferClock for FrameClock {
    fn now(&self) -> Duration {
        *self.elapsed.borrow()
    }

    async fn sleep_until(&self, deadline: Duration) {
        let mut elapsed = self.elapsed.subscribe();
        loop {
            if *elapsed.borrow_and_update() >= deadline {
                return;
            }
            if elapsed.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Convert host seconds into a whole-millisecond delay.
///
/// Negative and NaN inputs become zero; the sub-millisecond remainder is
/// truncated.
///
/// # Examples
///
/// ```
/// use archetype_pool::delay_from_secs;
/// use std::time::Duration;
///
/// assert_eq!(delay_from_secs(2.0), Duration::from_millis(2000));
/// assert_eq!(delay_from_secs(0.0125), Duration::from_millis(12));
/// assert_eq!(delay_from_secs(-1.0), Duration::ZERO);
/// ```
pub fn delay_from_secs(secs: f32) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_millis((secs as f64 * 1000.0) as u64)
}

/// Truncate a delay to whole milliseconds.
pub(crate) fn clamp_to_millis(delay: Duration) -> Duration {
    Duration::from_millis(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_clock_wakes_on_advance() {
        let clock = std::sync::Arc::new(FrameClock::new());
        let waiter = {
            let clock = std::sync::Arc::clone(&clock);
            tokio::spawn(async move { clock.sleep_until(Duration::from_millis(100)).await })
        };

        clock.advance(Duration::from_millis(60));
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        clock.advance(Duration::from_millis(40));
        waiter.await.unwrap();
        assert_eq!(clock.now(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_frame_clock_past_deadline_returns_immediately() {
        let clock = FrameClock::new();
        clock.advance(Duration::from_secs(1));
        clock.sleep_until(Duration::from_millis(500)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_clock_follows_tokio_time() {
        let clock = RuntimeClock::new();
        clock.sleep_until(Duration::from_secs(3)).await;
        assert!(clock.now() >= Duration::from_secs(3));
    }

    #[test]
    fn test_clamp_truncates_micros() {
        assert_eq!(clamp_to_millis(Duration::from_micros(2_999)), Duration::from_millis(2));
        assert_eq!(delay_from_secs(f32::NAN), Duration::ZERO);
    }
}
