//! Archetype identity and instance factories

use crate::errors::{FactoryError, PoolError, PoolResult};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

type FactoryFn<T> = dyn Fn() -> Result<T, FactoryError> + Send + Sync;

struct ArchetypeInner<T> {
    name: String,
    factory: Box<FactoryFn<T>>,
}

/// The kind of thing a pool recycles, e.g. "bullet" or "explosion".
///
/// Identity is by reference: clones of one `Archetype` are equal, while two
/// archetypes built separately never are, even with the same name.
///
/// # Examples
///
/// ```
/// use archetype_pool::Archetype;
///
/// let bullet = Archetype::from_fn("bullet", || 0u32);
/// let same = bullet.clone();
/// let other = Archetype::from_fn("bullet", || 0u32);
///
/// assert_eq!(bullet, same);
/// assert_ne!(bullet, other);
/// assert_eq!(bullet.name(), "bullet");
/// ```
pub struct Archetype<T> {
    inner: Arc<ArchetypeInner<T>>,
}

/// Lightweight key derived from an [`Archetype`]'s identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchetypeId(usize);

impl<T: 'static> Archetype<T> {
    /// Create an archetype from a fallible factory.
    pub fn new<F, E>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<FactoryError> + 'static,
    {
        Self {
            inner: Arc::new(ArchetypeInner {
                name: name.into(),
                factory: Box::new(move || factory().map_err(Into::into)),
            }),
        }
    }

    /// Create an archetype from a factory that cannot fail.
    pub fn from_fn<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ArchetypeInner {
                name: name.into(),
                factory: Box::new(move || Ok(factory())),
            }),
        }
    }
}

impl<T> Archetype<T> {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn id(&self) -> ArchetypeId {
        ArchetypeId(Arc::as_ptr(&self.inner) as *const () as usize)
    }

    /// Build a fresh instance. Failures are surfaced once and never retried.
    pub(crate) fn create(&self) -> PoolResult<T> {
        (self.inner.factory)().map_err(|e| PoolError::factory(&self.inner.name, e))
    }
}

impl<T> Clone for Archetype<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Archetype<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for Archetype<T> {}

impl<T> Hash for Archetype<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl<T> fmt::Debug for Archetype<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("name", &self.inner.name)
            .field("id", &self.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_identity_not_structural() {
        let a = Archetype::from_fn("orb", || 1);
        let b = Archetype::from_fn("orb", || 1);

        assert_eq!(a.id(), a.clone().id());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_factory_builds_fresh_instances() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let archetype = Archetype::from_fn("orb", move || seen.fetch_add(1, Ordering::Relaxed));

        assert_eq!(archetype.create().unwrap(), 0);
        assert_eq!(archetype.create().unwrap(), 1);
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_factory_failure_names_archetype() {
        let archetype: Archetype<u8> = Archetype::new("broken", || Err("no assets loaded"));

        match archetype.create() {
            Err(PoolError::Factory { archetype, source }) => {
                assert_eq!(archetype, "broken");
                assert_eq!(source.to_string(), "no assets loaded");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
