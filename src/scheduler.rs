//! Deferred, cancellable releases

use crate::clock::{clamp_to_millis, DeferClock};
use crate::handle::Handle;
use crate::instance::PoolInstance;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How a deferred release ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredOutcome {
    /// The delay elapsed and the handle was released
    Released,

    /// The delay elapsed but the handle had already been released,
    /// recycled or disabled
    Skipped,

    /// The instance was destroyed while waiting
    Cancelled,
}

/// A pending deferred release
///
/// Dropping this does not cancel the release; it keeps running in the
/// background.
#[derive(Debug)]
pub struct DeferredRelease {
    task: JoinHandle<DeferredOutcome>,
}

impl DeferredRelease {
    /// Wait for the release to settle
    ///
    /// An aborted task reports [`DeferredOutcome::Cancelled`]. A panic inside
    /// the release (typically a lifecycle hook) is logged and resumed here.
    pub async fn outcome(self) -> DeferredOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => {
                tracing::error!("deferred release panicked");
                std::panic::resume_unwind(e.into_panic())
            }
            Err(_) => DeferredOutcome::Cancelled,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop waiting without releasing anything
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Counters for the deferred release path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeferredMetrics {
    pub scheduled: usize,
    pub released: usize,
    pub skipped: usize,
    pub cancelled: usize,
}

#[derive(Default)]
struct SchedulerTracker {
    scheduled: AtomicUsize,
    released: AtomicUsize,
    skipped: AtomicUsize,
    cancelled: AtomicUsize,
}

impl SchedulerTracker {
    fn record(&self, outcome: DeferredOutcome) {
        let counter = match outcome {
            DeferredOutcome::Released => &self.released,
            DeferredOutcome::Skipped => &self.skipped,
            DeferredOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Spawns delayed releases onto a tokio runtime, timed by a [`DeferClock`]
pub(crate) struct DeferredReleaseScheduler {
    runtime: runtime::Handle,
    clock: Arc<dyn DeferClock>,
    tracker: Arc<SchedulerTracker>,
}

impl DeferredReleaseScheduler {
    pub fn new(runtime: runtime::Handle, clock: Arc<dyn DeferClock>) -> Self {
        Self {
            runtime,
            clock,
            tracker: Arc::new(SchedulerTracker::default()),
        }
    }

    /// Release `handle` once `delay` (truncated to whole milliseconds) has
    /// passed on the clock.
    pub fn schedule<T: PoolInstance>(&self, handle: &Handle<T>, delay: Duration) -> DeferredRelease {
        let delay = clamp_to_millis(delay);
        let deadline = self.clock.now() + delay;
        let generation = handle.generation();
        let lifetime = handle.lifetime().clone();
        let handle = handle.clone();
        let clock = Arc::clone(&self.clock);
        let tracker = Arc::clone(&self.tracker);

        self.tracker.scheduled.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            archetype = handle.archetype().name(),
            handle = handle.id(),
            delay = ?delay,
            "scheduled deferred release"
        );

        let task = self.runtime.spawn(async move {
            let outcome = release_when_due(&handle, generation, &lifetime, clock.as_ref(), deadline).await;
            tracker.record(outcome);
            outcome
        });

        DeferredRelease { task }
    }

    pub fn metrics(&self) -> DeferredMetrics {
        DeferredMetrics {
            scheduled: self.tracker.scheduled.load(Ordering::Relaxed),
            released: self.tracker.released.load(Ordering::Relaxed),
            skipped: self.tracker.skipped.load(Ordering::Relaxed),
            cancelled: self.tracker.cancelled.load(Ordering::Relaxed),
        }
    }
}

async fn release_when_due<T: PoolInstance>(
    handle: &Handle<T>,
    generation: u64,
    lifetime: &CancellationToken,
    clock: &dyn DeferClock,
    deadline: Duration,
) -> DeferredOutcome {
    if lifetime.is_cancelled() {
        return DeferredOutcome::Cancelled;
    }

    tokio::select! {
        biased;
        _ = lifetime.cancelled() => return DeferredOutcome::Cancelled,
        _ = clock.sleep_until(deadline) => {}
    }

    // Re-check: the instance may have been destroyed, released, recycled
    // for another spawn, or disabled while we waited.
    let enabled = handle.with_instance(|instance| instance.is_enabled());
    match enabled {
        None => DeferredOutcome::Cancelled,
        Some(false) => DeferredOutcome::Skipped,
        Some(true) if !handle.is_active() || handle.generation() != generation => DeferredOutcome::Skipped,
        Some(true) => {
            if handle.release() {
                DeferredOutcome::Released
            } else {
                DeferredOutcome::Skipped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archetype::Archetype;
    use crate::clock::FrameClock;
    use crate::config::PoolConfiguration;
    use crate::instance::Placement;
    use crate::pool::ArchetypePool;
    use crate::testing::Dummy;

    struct Fixture {
        clock: Arc<FrameClock>,
        scheduler: DeferredReleaseScheduler,
        pool: Arc<ArchetypePool<Dummy>>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(FrameClock::new());
        let scheduler = DeferredReleaseScheduler::new(runtime::Handle::current(), clock.clone());
        let archetype = Archetype::from_fn("dummy", Dummy::default);
        let pool = ArchetypePool::create(archetype, PoolConfiguration::new().with_prewarm(1)).unwrap();
        Fixture { clock, scheduler, pool }
    }

    fn secs(s: f32) -> Duration {
        Duration::from_secs_f32(s)
    }

    #[tokio::test]
    async fn test_release_after_delay() {
        let f = fixture();
        let handle = f.pool.acquire(&Placement::default()).unwrap();

        let pending = f.scheduler.schedule(&handle, secs(1.0));
        f.clock.advance(secs(0.5));
        tokio::task::yield_now().await;
        assert!(handle.is_active());

        f.clock.advance(secs(0.5));
        assert_eq!(pending.outcome().await, DeferredOutcome::Released);
        assert!(!handle.is_active());
        assert_eq!(f.pool.free_count(), 1);
    }

    #[tokio::test]
    async fn test_manual_release_supersedes_deferred() {
        let f = fixture();
        let handle = f.pool.acquire(&Placement::default()).unwrap();
        let releases_before = handle.with_instance(|d| d.releases).unwrap();

        let pending = f.scheduler.schedule(&handle, secs(2.0));
        f.clock.advance(secs(0.5));
        assert!(f.pool.release(&handle));

        f.clock.advance(secs(1.5));
        assert_eq!(pending.outcome().await, DeferredOutcome::Skipped);

        // onRelease ran once more and nothing was double-counted
        assert_eq!(handle.with_instance(|d| d.releases).unwrap(), releases_before + 1);
        assert_eq!(f.pool.live_count(), 1);
        assert_eq!(f.pool.free_count(), 1);
    }

    #[tokio::test]
    async fn test_destroy_before_delay_cancels() {
        let f = fixture();
        let handle = f.pool.acquire(&Placement::default()).unwrap();

        let pending = f.scheduler.schedule(&handle, secs(2.0));
        tokio::task::yield_now().await;
        handle.destroy();
        f.clock.advance(secs(5.0));

        assert_eq!(pending.outcome().await, DeferredOutcome::Cancelled);
        assert_eq!(f.pool.metrics().total_released, 1);
        assert_eq!(f.scheduler.metrics().cancelled, 1);
    }

    #[tokio::test]
    async fn test_already_destroyed_never_waits() {
        let f = fixture();
        let handle = f.pool.acquire(&Placement::default()).unwrap();
        handle.destroy();

        let pending = f.scheduler.schedule(&handle, secs(60.0));
        assert_eq!(pending.outcome().await, DeferredOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_multiple_deferred_releases_fire_once() {
        let f = fixture();
        let handle = f.pool.acquire(&Placement::default()).unwrap();
        let releases_before = handle.with_instance(|d| d.releases).unwrap();

        let early = f.scheduler.schedule(&handle, secs(1.0));
        let late = f.scheduler.schedule(&handle, secs(3.0));

        f.clock.advance(secs(1.0));
        assert_eq!(early.outcome().await, DeferredOutcome::Released);

        f.clock.advance(secs(2.0));
        assert_eq!(late.outcome().await, DeferredOutcome::Skipped);
        assert_eq!(handle.with_instance(|d| d.releases).unwrap(), releases_before + 1);
        assert_eq!(
            f.scheduler.metrics(),
            DeferredMetrics {
                scheduled: 2,
                released: 1,
                skipped: 1,
                cancelled: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_recycled_handle_is_not_released() {
        let f = fixture();
        let handle = f.pool.acquire(&Placement::default()).unwrap();

        let pending = f.scheduler.schedule(&handle, secs(1.0));
        f.pool.release(&handle);
        let respawned = f.pool.acquire(&Placement::default()).unwrap();
        assert_eq!(respawned, handle);

        f.clock.advance(secs(1.0));
        assert_eq!(pending.outcome().await, DeferredOutcome::Skipped);
        assert!(respawned.is_active());
    }

    #[tokio::test]
    async fn test_disabled_instance_is_skipped() {
        let f = fixture();
        let handle = f.pool.acquire(&Placement::default()).unwrap();

        let pending = f.scheduler.schedule(&handle, secs(1.0));
        handle.with_instance(|d| d.enabled = false);
        f.clock.advance(secs(1.0));

        assert_eq!(pending.outcome().await, DeferredOutcome::Skipped);
        assert!(handle.is_active());
    }

    #[tokio::test]
    #[should_panic(expected = "release hook exploded")]
    async fn test_panicking_hook_resurfaces_in_outcome() {
        let f = fixture();
        let handle = f.pool.acquire(&Placement::default()).unwrap();
        handle.with_instance(|d| d.panic_on_release = true);

        let pending = f.scheduler.schedule(&handle, secs(1.0));
        f.clock.advance(secs(1.0));
        pending.outcome().await;
    }

    #[tokio::test]
    async fn test_abort_leaves_handle_checked_out() {
        let f = fixture();
        let handle = f.pool.acquire(&Placement::default()).unwrap();

        let pending = f.scheduler.schedule(&handle, secs(1.0));
        pending.abort();
        f.clock.advance(secs(2.0));

        assert_eq!(pending.outcome().await, DeferredOutcome::Cancelled);
        assert!(handle.is_active());
    }
}
