//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by loaders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// == Cache Error Enum ==
/// Failure delivered to stream subscribers.
///
/// Cloneable so a single loader failure can be fanned out to every subscriber
/// waiting on the same key.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The `if_absent` loader returned an error
    #[error("Loader failed: {0}")]
    LoadFailed(Arc<dyn std::error::Error + Send + Sync>),

    /// The `if_absent` loader panicked before producing a value
    #[error("Loader panicked")]
    LoaderPanicked,
}

impl CacheError {
    /// Wraps a loader error.
    pub fn load_failed(err: BoxError) -> Self {
        CacheError::LoadFailed(Arc::from(err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
