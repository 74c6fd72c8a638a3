//! Handles to pooled instances

use crate::archetype::Archetype;
use crate::instance::PoolInstance;
use crate::pool::ArchetypePool;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

struct HandleInner<T: PoolInstance> {
    id: u64,
    archetype: Archetype<T>,
    instance: Mutex<Option<T>>,
    active: AtomicBool,
    generation: AtomicU64,
    lifetime: CancellationToken,
    pool: Weak<ArchetypePool<T>>,
}

/// A tracked wrapper around one pooled (or degraded, unpooled) instance.
///
/// Handles are cheap to clone; every clone refers to the same instance. The
/// link back to the owning pool is weak, so a handle never keeps a pool
/// alive and a handle whose pool is gone is simply destroyed on release.
pub struct Handle<T: PoolInstance> {
    inner: Arc<HandleInner<T>>,
}

impl<T: PoolInstance> Handle<T> {
    fn build(archetype: Archetype<T>, instance: T, pool: Weak<ArchetypePool<T>>, active: bool) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
                archetype,
                instance: Mutex::new(Some(instance)),
                active: AtomicBool::new(active),
                generation: AtomicU64::new(0),
                lifetime: CancellationToken::new(),
                pool,
            }),
        }
    }

    /// A freshly created, not yet acquired handle owned by `pool`.
    pub(crate) fn pooled(archetype: Archetype<T>, instance: T, pool: Weak<ArchetypePool<T>>) -> Self {
        Self::build(archetype, instance, pool, false)
    }

    /// A handle no pool tracks. Releasing it destroys the instance.
    pub(crate) fn unpooled(archetype: Archetype<T>, instance: T) -> Self {
        Self::build(archetype, instance, Weak::new(), true)
    }

    /// Process-unique identifier of this handle.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn archetype(&self) -> &Archetype<T> {
        &self.inner.archetype
    }

    /// Whether the handle is currently checked out.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lifetime.is_cancelled()
    }

    /// Whether a live pool still owns this handle.
    pub fn is_pooled(&self) -> bool {
        self.owner().is_some_and(|pool| !pool.is_destroyed())
    }

    /// Number of times the handle has been acquired from its pool.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Lock the instance for access. Returns `None` once it is destroyed.
    pub fn instance(&self) -> Option<MappedMutexGuard<'_, T>> {
        MutexGuard::try_map(self.inner.instance.lock(), Option::as_mut).ok()
    }

    /// Run `f` against the instance if it is still alive.
    pub fn with_instance<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.inner.instance.lock().as_mut().map(f)
    }

    /// Token cancelled when the instance is destroyed by any path.
    ///
    /// This is a child token, so cancelling it does not destroy anything.
    pub fn lifetime_token(&self) -> CancellationToken {
        self.inner.lifetime.child_token()
    }

    /// Destroy the instance outside the normal release path.
    ///
    /// The owning pool forgets the handle and pending deferred releases are
    /// cancelled. Destroying twice is a no-op.
    pub fn destroy(&self) {
        if let Some(instance) = self.destroy_instance() {
            if let Some(pool) = self.owner() {
                pool.forget(self.id());
            }
            drop(instance);
        }
    }

    /// Route a release to the owning pool, or destroy when there is none.
    ///
    /// Returns whether this call performed the release.
    pub(crate) fn release(&self) -> bool {
        match self.owner() {
            Some(pool) => pool.release(self),
            None => {
                if self.is_destroyed() {
                    return false;
                }
                tracing::warn!(
                    archetype = self.archetype().name(),
                    handle = self.id(),
                    "handle has no owning pool, destroying instance"
                );
                self.destroy();
                true
            }
        }
    }

    pub(crate) fn owner(&self) -> Option<Arc<ArchetypePool<T>>> {
        self.inner.pool.upgrade()
    }

    pub(crate) fn lifetime(&self) -> &CancellationToken {
        &self.inner.lifetime
    }

    pub(crate) fn activate(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.active.store(true, Ordering::Release);
    }

    /// Atomically claim the active -> inactive transition.
    pub(crate) fn try_deactivate(&self) -> bool {
        self.inner
            .active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Take the instance out and cancel the lifetime token. The caller drops
    /// the returned instance once no locks are held.
    pub(crate) fn destroy_instance(&self) -> Option<T> {
        let instance = self.inner.instance.lock().take();
        if instance.is_some() {
            self.inner.active.store(false, Ordering::Release);
            self.inner.lifetime.cancel();
        }
        instance
    }
}

impl<T: PoolInstance> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: PoolInstance> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: PoolInstance> Eq for Handle<T> {}

impl<T: PoolInstance> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id())
            .field("archetype", &self.archetype().name())
            .field("active", &self.is_active())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
