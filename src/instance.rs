//! The contract between pooled instances and the pool manager

/// Where a spawned instance should appear.
///
/// The pool hands this to [`PoolInstance::apply_placement`] untouched; it
/// never validates it.
///
/// # Examples
///
/// ```
/// use archetype_pool::Placement;
///
/// let placement = Placement::at([1.0, 2.0, 3.0]);
/// assert_eq!(placement.position, [1.0, 2.0, 3.0]);
/// assert_eq!(placement.rotation, Placement::IDENTITY_ROTATION);
/// assert_eq!(placement.parent, None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
    /// World position
    pub position: [f32; 3],

    /// Orientation as a quaternion `[x, y, z, w]`
    pub rotation: [f32; 4],

    /// Scene node to attach the instance under, if any
    pub parent: Option<ParentId>,
}

/// Host-defined identifier of a scene node that instances can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParentId(pub u64);

impl Placement {
    pub const IDENTITY_ROTATION: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

    /// Placement at `position` with identity rotation
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            rotation: Self::IDENTITY_ROTATION,
            parent: None,
        }
    }

    pub fn with_rotation(mut self, rotation: [f32; 4]) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_parent(mut self, parent: ParentId) -> Self {
        self.parent = Some(parent);
        self
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::at([0.0; 3])
    }
}

/// Optional per-instance callbacks fired by the owning pool.
///
/// Both default to doing nothing, so implementors override only what they
/// need.
pub trait LifecycleHooks {
    /// Called after placement is applied and the instance is enabled.
    fn on_acquire(&mut self) {}

    /// Called before the instance is disabled on its way back to the pool.
    fn on_release(&mut self) {}
}

/// An object that can live inside an archetype pool.
///
/// # Examples
///
/// ```
/// use archetype_pool::{LifecycleHooks, Placement, PoolInstance};
///
/// struct Spark {
///     position: [f32; 3],
///     visible: bool,
///     bursts: u32,
/// }
///
/// impl LifecycleHooks for Spark {
///     fn on_acquire(&mut self) {
///         self.bursts += 1;
///     }
/// }
///
/// impl PoolInstance for Spark {
///     fn apply_placement(&mut self, placement: &Placement) {
///         self.position = placement.position;
///     }
///
///     fn set_enabled(&mut self, enabled: bool) {
///         self.visible = enabled;
///     }
///
///     fn is_enabled(&self) -> bool {
///         self.visible
///     }
///
///     fn lifecycle_hooks(&mut self) -> Option<&mut dyn LifecycleHooks> {
///         Some(self)
///     }
/// }
/// ```
pub trait PoolInstance: Send + 'static {
    fn apply_placement(&mut self, placement: &Placement);

    /// Show or hide the instance to the rest of the world.
    fn set_enabled(&mut self, enabled: bool);

    fn is_enabled(&self) -> bool;

    /// Attach under `parent`. Called on acquire, after placement and before
    /// the instance is enabled, when the placement names a parent.
    fn attach(&mut self, _parent: ParentId) {}

    /// Undo any attachment. Called on release, before the instance is
    /// disabled.
    fn detach(&mut self) {}

    /// Hook capability. Instances that return `None` are recycled without
    /// any callbacks.
    fn lifecycle_hooks(&mut self) -> Option<&mut dyn LifecycleHooks> {
        None
    }
}

pub(crate) fn fire_acquire<T: PoolInstance>(instance: &mut T) {
    if let Some(hooks) = instance.lifecycle_hooks() {
        hooks.on_acquire();
    }
}

pub(crate) fn fire_release<T: PoolInstance>(instance: &mut T) {
    if let Some(hooks) = instance.lifecycle_hooks() {
        hooks.on_release();
    }
}
