//! Error types for the pool manager

use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by archetype factories.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Factory for archetype '{archetype}' failed to create an instance")]
    Factory {
        archetype: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    #[error("Pool for archetype '{0}' has been destroyed")]
    PoolDestroyed(String),
}

impl PoolError {
    pub(crate) fn factory(archetype: &str, source: FactoryError) -> Self {
        PoolError::Factory {
            archetype: archetype.to_string(),
            source: Arc::from(source),
        }
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
