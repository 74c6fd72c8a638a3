//! # archetype_pool
//!
//! Archetype-keyed object pooling for game-style workloads: actors, effects
//! and projectiles are recycled instead of rebuilt.
//!
//! ## Features
//!
//! - One bounded pool per archetype, found or created on first spawn
//! - Prewarming so construction cost is paid at startup
//! - Burst tolerance: capacity is enforced on release, not on acquire
//! - Optional `on_acquire` / `on_release` lifecycle hooks
//! - Optional parent attachment, undone before an instance goes back idle
//! - Deferred releases on a frame or tokio clock, cancelled when the
//!   instance is destroyed and skipped when it was already released
//! - Degraded mode: spawning before initialization hands out unpooled
//!   instances instead of failing
//! - Per-pool metrics with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use archetype_pool::{Archetype, Placement, PoolInstance, PoolRegistry, RegistryConfiguration};
//!
//! #[derive(Default)]
//! struct Flare {
//!     enabled: bool,
//! }
//!
//! impl PoolInstance for Flare {
//!     fn apply_placement(&mut self, _placement: &Placement) {}
//!     fn set_enabled(&mut self, enabled: bool) {
//!         self.enabled = enabled;
//!     }
//!     fn is_enabled(&self) -> bool {
//!         self.enabled
//!     }
//! }
//!
//! let flare = Archetype::from_fn("flare", Flare::default);
//! let registry = PoolRegistry::new(RegistryConfiguration::new());
//! registry.initialize().unwrap();
//!
//! let handle = registry.spawn(&flare, &Placement::default()).unwrap();
//! registry.release(&handle);
//! assert_eq!(registry.metrics(&flare).unwrap().free_objects, 5);
//! ```

mod archetype;
mod clock;
mod config;
mod errors;
mod handle;
mod instance;
mod metrics;
mod pool;
mod registry;
mod scheduler;

#[cfg(test)]
mod testing;

pub use archetype::{Archetype, ArchetypeId};
pub use clock::{delay_from_secs, DeferClock, FrameClock, RuntimeClock};
pub use config::{PoolConfiguration, RegistryConfiguration};
pub use errors::{FactoryError, PoolError, PoolResult};
pub use handle::Handle;
pub use instance::{LifecycleHooks, ParentId, Placement, PoolInstance};
pub use metrics::{MetricsExporter, PoolMetrics};
pub use registry::PoolRegistry;
pub use scheduler::{DeferredMetrics, DeferredOutcome, DeferredRelease};
