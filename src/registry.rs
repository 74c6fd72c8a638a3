//! The public entry point: archetype -> pool table

use crate::archetype::{Archetype, ArchetypeId};
use crate::clock::{DeferClock, RuntimeClock};
use crate::config::{PoolConfiguration, RegistryConfiguration};
use crate::errors::PoolResult;
use crate::handle::Handle;
use crate::instance::{Placement, PoolInstance};
use crate::metrics::{MetricsExporter, PoolMetrics};
use crate::pool::ArchetypePool;
use crate::scheduler::{DeferredMetrics, DeferredRelease, DeferredReleaseScheduler};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Maps archetypes to their pools and hides the pools from callers.
///
/// The registry is an ordinary value: create it, [`initialize`] it during
/// startup, pass it by reference to whatever spawns things, and
/// [`shutdown`] it (or drop it) on teardown. Until it is initialized,
/// `spawn` still works but hands out unpooled instances.
///
/// [`initialize`]: PoolRegistry::initialize
/// [`shutdown`]: PoolRegistry::shutdown
///
/// # Examples
///
/// ```
/// use archetype_pool::{Archetype, Placement, PoolInstance, PoolRegistry, RegistryConfiguration};
///
/// #[derive(Default)]
/// struct Bullet {
///     position: [f32; 3],
///     enabled: bool,
/// }
///
/// impl PoolInstance for Bullet {
///     fn apply_placement(&mut self, placement: &Placement) {
///         self.position = placement.position;
///     }
///     fn set_enabled(&mut self, enabled: bool) {
///         self.enabled = enabled;
///     }
///     fn is_enabled(&self) -> bool {
///         self.enabled
///     }
/// }
///
/// let bullet = Archetype::from_fn("bullet", Bullet::default);
/// let registry = PoolRegistry::new(RegistryConfiguration::new());
/// registry.initialize().unwrap();
///
/// let shot = registry.spawn(&bullet, &Placement::at([0.0, 1.0, 0.0])).unwrap();
/// assert_eq!(shot.instance().unwrap().position, [0.0, 1.0, 0.0]);
///
/// registry.release(&shot);
/// assert!(!shot.is_active());
///
/// registry.shutdown();
/// assert!(shot.is_destroyed());
/// ```
pub struct PoolRegistry<T: PoolInstance> {
    config: RegistryConfiguration<T>,
    pools: DashMap<ArchetypeId, Arc<ArchetypePool<T>>>,
    scheduler: RwLock<Option<DeferredReleaseScheduler>>,
    initialized: AtomicBool,
}

impl<T: PoolInstance> PoolRegistry<T> {
    /// Create an uninitialized registry
    pub fn new(config: RegistryConfiguration<T>) -> Self {
        Self {
            config,
            pools: DashMap::new(),
            scheduler: RwLock::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    /// Start the registry and create the configured initial pools.
    ///
    /// Deferred releases run on the tokio runtime current at this call; with
    /// no runtime they are disabled. Calling this on a running registry does
    /// nothing. If an initial pool fails to prewarm, the registry is shut
    /// down again and the error returned.
    pub fn initialize(&self) -> PoolResult<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let scheduler = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let clock: Arc<dyn DeferClock> = match &self.config.clock {
                    Some(clock) => Arc::clone(clock),
                    None => Arc::new(RuntimeClock::new()),
                };
                Some(DeferredReleaseScheduler::new(runtime, clock))
            }
            Err(_) => {
                tracing::warn!("no tokio runtime available, deferred releases are disabled");
                None
            }
        };
        *self.scheduler.write() = scheduler;

        for (archetype, config) in &self.config.initial_pools {
            if let Err(e) = self.register(archetype, *config) {
                tracing::warn!(archetype = archetype.name(), error = %e, "failed to create initial pool");
                self.shutdown();
                return Err(e);
            }
        }

        tracing::debug!(pools = self.pools.len(), "pool registry initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Check out an instance of `archetype` placed at `placement`.
    ///
    /// Creates the archetype's pool with the default sizing on first use.
    /// On an uninitialized registry the instance is built directly and is
    /// not tracked by any pool. Only a failing factory makes this fail.
    pub fn spawn(&self, archetype: &Archetype<T>, placement: &Placement) -> PoolResult<Handle<T>> {
        if !self.is_initialized() {
            tracing::warn!(
                archetype = archetype.name(),
                "pool registry not initialized, spawning unpooled instance"
            );
            return Self::spawn_unpooled(archetype, placement);
        }

        let pool = self.register(archetype, self.config.default_pool)?;
        pool.acquire(placement)
    }

    /// Hand an instance back to its pool.
    ///
    /// Handles without a live pool are destroyed on the spot; releasing an
    /// inactive handle is a no-op.
    pub fn release(&self, handle: &Handle<T>) {
        handle.release();
    }

    /// Release `handle` after `delay`, unless it is destroyed, released or
    /// disabled first.
    ///
    /// Returns `None` (and schedules nothing) when the registry is not
    /// initialized or has no runtime to run deferred work on.
    pub fn release_after(&self, handle: &Handle<T>, delay: Duration) -> Option<DeferredRelease> {
        if !self.is_initialized() {
            tracing::debug!(handle = handle.id(), "registry not initialized, ignoring deferred release");
            return None;
        }

        match self.scheduler.read().as_ref() {
            Some(scheduler) => Some(scheduler.schedule(handle, delay)),
            None => {
                tracing::warn!(handle = handle.id(), "no scheduler available, ignoring deferred release");
                None
            }
        }
    }

    /// Create and prewarm a pool for `archetype`.
    ///
    /// Returns `Ok(false)` if a pool already exists or the registry is not
    /// initialized.
    pub fn create_pool(&self, archetype: &Archetype<T>, prewarm_count: usize, capacity: usize) -> PoolResult<bool> {
        if !self.is_initialized() {
            tracing::warn!(archetype = archetype.name(), "pool registry not initialized, pool not created");
            return Ok(false);
        }
        if self.pools.contains_key(&archetype.id()) {
            return Ok(false);
        }

        let config = PoolConfiguration::new()
            .with_prewarm(prewarm_count)
            .with_capacity(capacity);
        let before = self.pools.len();
        self.register(archetype, config)?;
        Ok(self.pools.len() > before)
    }

    /// Destroy every pool and every instance they own.
    ///
    /// Outstanding handles become destroyed and their pending deferred
    /// releases are cancelled. The registry is uninitialized afterwards.
    pub fn shutdown(&self) {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return;
        }
        *self.scheduler.write() = None;

        let pools: Vec<Arc<ArchetypePool<T>>> = self.pools.iter().map(|entry| Arc::clone(entry.value())).collect();
        self.pools.clear();

        for pool in &pools {
            pool.destroy();
        }

        tracing::debug!(pools = pools.len(), "pool registry shut down");
    }

    pub fn contains(&self, archetype: &Archetype<T>) -> bool {
        self.pools.contains_key(&archetype.id())
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Metrics for the pool of `archetype`, if it has one
    pub fn metrics(&self, archetype: &Archetype<T>) -> Option<PoolMetrics> {
        self.pools.get(&archetype.id()).map(|pool| pool.metrics())
    }

    /// Counters for the deferred release path
    pub fn deferred_metrics(&self) -> DeferredMetrics {
        self.scheduler
            .read()
            .as_ref()
            .map(DeferredReleaseScheduler::metrics)
            .unwrap_or_default()
    }

    /// Export every pool in Prometheus exposition format
    pub fn export_metrics_prometheus(&self, tags: Option<&HashMap<String, String>>) -> String {
        let mut pools: Vec<(String, PoolMetrics)> = self
            .pools
            .iter()
            .map(|entry| (entry.archetype().name().to_string(), entry.metrics()))
            .collect();
        pools.sort_by(|a, b| a.0.cmp(&b.0));
        MetricsExporter::export_prometheus_many(&pools, tags)
    }

    /// Find the pool for `archetype`, creating it with `config` if missing.
    fn register(&self, archetype: &Archetype<T>, config: PoolConfiguration) -> PoolResult<Arc<ArchetypePool<T>>> {
        if let Some(pool) = self.pools.get(&archetype.id()) {
            return Ok(Arc::clone(pool.value()));
        }

        // Prewarm runs user factories, so it happens outside the map's locks
        let created = ArchetypePool::create(archetype.clone(), config)?;

        let (pool, redundant) = match self.pools.entry(archetype.id()) {
            Entry::Occupied(existing) => (Arc::clone(existing.get()), Some(created)),
            Entry::Vacant(slot) => (Arc::clone(slot.insert(created).value()), None),
        };

        if let Some(redundant) = redundant {
            redundant.destroy();
        }
        Ok(pool)
    }

    fn spawn_unpooled(archetype: &Archetype<T>, placement: &Placement) -> PoolResult<Handle<T>> {
        let mut instance = archetype.create()?;
        instance.apply_placement(placement);
        if let Some(parent) = placement.parent {
            instance.attach(parent);
        }
        instance.set_enabled(true);
        Ok(Handle::unpooled(archetype.clone(), instance))
    }
}

impl<T: PoolInstance> Drop for PoolRegistry<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
