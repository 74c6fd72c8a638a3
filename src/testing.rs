//! Instances shared by the unit tests

use crate::instance::{LifecycleHooks, ParentId, Placement, PoolInstance};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Records everything the pool does to it.
#[derive(Default)]
pub(crate) struct Dummy {
    pub position: [f32; 3],
    pub enabled: bool,
    pub placements: u32,
    pub acquires: u32,
    pub releases: u32,
    pub enabled_at_acquire: Option<bool>,
    pub position_at_acquire: Option<[f32; 3]>,
    pub enabled_at_release: Option<bool>,
    pub parent: Option<ParentId>,
    pub enabled_at_attach: Option<bool>,
    pub position_at_attach: Option<[f32; 3]>,
    pub enabled_at_detach: Option<bool>,
    pub releases_at_detach: Option<u32>,
    pub panic_on_release: bool,
    drops: Option<Arc<AtomicUsize>>,
}

impl Dummy {
    /// A dummy that bumps `drops` when it is dropped
    pub fn tracked(drops: &Arc<AtomicUsize>) -> Self {
        let mut dummy = Self::default();
        dummy.drops = Some(Arc::clone(drops));
        dummy
    }
}

impl Drop for Dummy {
    fn drop(&mut self) {
        if let Some(drops) = &self.drops {
            drops.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl LifecycleHooks for Dummy {
    fn on_acquire(&mut self) {
        self.acquires += 1;
        self.enabled_at_acquire = Some(self.enabled);
        self.position_at_acquire = Some(self.position);
    }

    fn on_release(&mut self) {
        if self.panic_on_release {
            panic!("release hook exploded");
        }
        self.releases += 1;
        self.enabled_at_release = Some(self.enabled);
    }
}

impl PoolInstance for Dummy {
    fn apply_placement(&mut self, placement: &Placement) {
        self.position = placement.position;
        self.placements += 1;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn attach(&mut self, parent: ParentId) {
        self.parent = Some(parent);
        self.enabled_at_attach = Some(self.enabled);
        self.position_at_attach = Some(self.position);
    }

    fn detach(&mut self) {
        self.parent = None;
        self.enabled_at_detach = Some(self.enabled);
        self.releases_at_detach = Some(self.releases);
    }

    fn lifecycle_hooks(&mut self) -> Option<&mut dyn LifecycleHooks> {
        Some(self)
    }
}

/// Opts out of lifecycle hooks.
#[derive(Default)]
pub(crate) struct Plain {
    pub position: [f32; 3],
    pub enabled: bool,
}

impl PoolInstance for Plain {
    fn apply_placement(&mut self, placement: &Placement) {
        self.position = placement.position;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
