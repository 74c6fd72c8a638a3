//! Bounded reuse for a single archetype

use crate::archetype::Archetype;
use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::handle::Handle;
use crate::instance::{fire_acquire, fire_release, Placement, PoolInstance};
use crate::metrics::{MetricsTracker, PoolMetrics};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

struct PoolState<T: PoolInstance> {
    /// Idle handles, most recently released last
    free: Vec<Handle<T>>,
    /// Every live handle, checked out or free
    live: HashMap<u64, Handle<T>>,
    destroyed: bool,
}

/// Pool of recyclable instances for one archetype.
///
/// Capacity is only enforced when an instance comes back: `acquire` always
/// succeeds (short of a factory failure), so bursts may briefly exceed the
/// capacity. A released instance is requeued while fewer than `capacity`
/// instances sit idle and destroyed once the free list is full.
pub(crate) struct ArchetypePool<T: PoolInstance> {
    archetype: Archetype<T>,
    config: PoolConfiguration,
    state: Mutex<PoolState<T>>,
    metrics: MetricsTracker,
    self_ref: Weak<ArchetypePool<T>>,
}

impl<T: PoolInstance> ArchetypePool<T> {
    /// Create an empty pool without prewarming it.
    pub fn new(archetype: Archetype<T>, config: PoolConfiguration) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            archetype,
            config,
            state: Mutex::new(PoolState {
                free: Vec::with_capacity(config.prewarm_count.min(config.capacity)),
                live: HashMap::new(),
                destroyed: false,
            }),
            metrics: MetricsTracker::new(),
            self_ref: self_ref.clone(),
        })
    }

    /// Create a pool and prewarm it with `config.prewarm_count` instances.
    ///
    /// If the factory fails during prewarm the half-built pool is destroyed
    /// and the error returned.
    pub fn create(archetype: Archetype<T>, config: PoolConfiguration) -> PoolResult<Arc<Self>> {
        let pool = Self::new(archetype, config);
        if let Err(e) = pool.prewarm(config.prewarm_count) {
            pool.destroy();
            return Err(e);
        }

        tracing::debug!(
            archetype = pool.archetype.name(),
            prewarm = config.prewarm_count,
            capacity = config.capacity,
            "created archetype pool"
        );
        Ok(pool)
    }

    /// Check out an instance, recycling a free one when possible.
    pub fn acquire(&self, placement: &Placement) -> PoolResult<Handle<T>> {
        let recycled = {
            let mut state = self.state.lock();
            if state.destroyed {
                return Err(PoolError::PoolDestroyed(self.archetype.name().to_string()));
            }

            loop {
                match state.free.pop() {
                    // Destroyed behind our back; forget it and keep looking
                    Some(handle) if handle.is_destroyed() => {
                        state.live.remove(&handle.id());
                    }
                    other => break other,
                }
            }
        };

        let handle = match recycled {
            Some(handle) => {
                self.metrics.total_recycled.fetch_add(1, Ordering::Relaxed);
                handle
            }
            None => self.create_handle()?,
        };

        handle.with_instance(|instance| {
            instance.apply_placement(placement);
            if let Some(parent) = placement.parent {
                instance.attach(parent);
            }
            instance.set_enabled(true);
            fire_acquire(instance);
        });
        handle.activate();
        self.metrics.total_acquired.fetch_add(1, Ordering::Relaxed);

        Ok(handle)
    }

    /// Take an instance back.
    ///
    /// Releasing an inactive handle does nothing and returns `false`.
    pub fn release(&self, handle: &Handle<T>) -> bool {
        if !handle.try_deactivate() {
            tracing::trace!(
                archetype = self.archetype.name(),
                handle = handle.id(),
                "ignoring release of inactive handle"
            );
            self.metrics.ignored_releases.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        handle.with_instance(|instance| {
            fire_release(instance);
            instance.detach();
            instance.set_enabled(false);
        });

        let surplus = {
            let mut state = self.state.lock();
            if state.destroyed || !state.live.contains_key(&handle.id()) {
                true
            } else if state.free.len() >= self.config.capacity {
                state.live.remove(&handle.id());
                true
            } else {
                state.free.push(handle.clone());
                false
            }
        };

        if surplus && handle.destroy_instance().is_some() {
            self.metrics.total_destroyed.fetch_add(1, Ordering::Relaxed);
        }
        self.metrics.total_released.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Pay construction cost upfront: acquire `count` instances, then
    /// release them all.
    pub fn prewarm(&self, count: usize) -> PoolResult<()> {
        let mut warmed = Vec::with_capacity(count);
        let mut failure = None;

        for _ in 0..count {
            match self.acquire(&Placement::default()) {
                Ok(handle) => warmed.push(handle),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        for handle in &warmed {
            self.release(handle);
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Destroy every instance, checked out or free. The pool cannot be used
    /// afterwards.
    pub fn destroy(&self) {
        let handles: Vec<Handle<T>> = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.free.clear();
            state.live.drain().map(|(_, handle)| handle).collect()
        };

        let mut destroyed = 0;
        for handle in handles {
            if handle.destroy_instance().is_some() {
                destroyed += 1;
            }
        }
        self.metrics.total_destroyed.fetch_add(destroyed, Ordering::Relaxed);

        tracing::debug!(
            archetype = self.archetype.name(),
            destroyed,
            "destroyed archetype pool"
        );
    }

    /// Drop bookkeeping for a handle destroyed outside the pool.
    pub fn forget(&self, id: u64) {
        let mut state = self.state.lock();
        if state.live.remove(&id).is_some() {
            state.free.retain(|handle| handle.id() != id);
            self.metrics.total_destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn archetype(&self) -> &Archetype<T> {
        &self.archetype
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    pub fn metrics(&self) -> PoolMetrics {
        let (live, free) = {
            let state = self.state.lock();
            (state.live.len(), state.free.len())
        };
        self.metrics.get_metrics(live, free, self.config.capacity)
    }

    fn create_handle(&self) -> PoolResult<Handle<T>> {
        // Factory runs without the state lock held
        let instance = self.archetype.create()?;
        let handle = Handle::pooled(self.archetype.clone(), instance, self.self_ref.clone());

        {
            let mut state = self.state.lock();
            if !state.destroyed {
                state.live.insert(handle.id(), handle.clone());
                self.metrics.total_created.fetch_add(1, Ordering::Relaxed);
                return Ok(handle);
            }
        }

        drop(handle.destroy_instance());
        Err(PoolError::PoolDestroyed(self.archetype.name().to_string()))
    }
}
