//! Pool and registry configuration options

use crate::archetype::Archetype;
use crate::clock::DeferClock;

use std::fmt;
use std::sync::Arc;

/// Sizing for one archetype pool
///
/// # Examples
///
/// ```
/// use archetype_pool::PoolConfiguration;
///
/// let config = PoolConfiguration::new()
///     .with_prewarm(10)
///     .with_capacity(40);
///
/// assert_eq!(config.prewarm_count, 10);
/// assert_eq!(config.capacity, 40);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfiguration {
    /// Instances created eagerly when the pool is created
    pub prewarm_count: usize,

    /// Maximum instances retained; surplus is destroyed on release
    pub capacity: usize,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            prewarm_count: 5,
            capacity: 100,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prewarm(mut self, count: usize) -> Self {
        self.prewarm_count = count;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Configuration for a [`PoolRegistry`](crate::PoolRegistry)
///
/// # Examples
///
/// ```
/// use archetype_pool::{Archetype, FrameClock, PoolConfiguration, RegistryConfiguration};
/// use std::sync::Arc;
///
/// let spark = Archetype::from_fn("spark", || 0u8);
/// let config = RegistryConfiguration::new()
///     .with_default_pool(PoolConfiguration::new().with_prewarm(2))
///     .with_initial_pool(spark, PoolConfiguration::new().with_capacity(16))
///     .with_clock(Arc::new(FrameClock::new()));
///
/// assert_eq!(config.default_pool.prewarm_count, 2);
/// assert_eq!(config.initial_pools.len(), 1);
/// ```
pub struct RegistryConfiguration<T> {
    /// Sizing used when `spawn` meets an archetype with no pool yet
    pub default_pool: PoolConfiguration,

    /// Pools created when the registry is initialized
    pub initial_pools: Vec<(Archetype<T>, PoolConfiguration)>,

    /// Clock for deferred releases; the tokio timer when unset
    pub clock: Option<Arc<dyn DeferClock>>,
}

impl<T> Default for RegistryConfiguration<T> {
    fn default() -> Self {
        Self {
            default_pool: PoolConfiguration::default(),
            initial_pools: Vec::new(),
            clock: None,
        }
    }
}

impl<T> RegistryConfiguration<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_pool(mut self, config: PoolConfiguration) -> Self {
        self.default_pool = config;
        self
    }

    /// Register a pool to be created (and prewarmed) on initialization
    pub fn with_initial_pool(mut self, archetype: Archetype<T>, config: PoolConfiguration) -> Self {
        self.initial_pools.push((archetype, config));
        self
    }

    /// Drive deferred releases from a custom clock, e.g. a [`FrameClock`](crate::FrameClock)
    pub fn with_clock(mut self, clock: Arc<dyn DeferClock>) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl<T> Clone for RegistryConfiguration<T> {
    fn clone(&self) -> Self {
        Self {
            default_pool: self.default_pool,
            initial_pools: self.initial_pools.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<T> fmt::Debug for RegistryConfiguration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryConfiguration")
            .field("default_pool", &self.default_pool)
            .field("initial_pools", &self.initial_pools)
            .field("custom_clock", &self.clock.is_some())
            .finish()
    }
}
