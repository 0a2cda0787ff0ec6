//! Stream Options Module
//!
//! Per-call arguments of `stream`: the lazy loader and its TTL override.

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::BoxError;

/// Type-erased `if_absent` loader.
pub type Loader<V> = Box<dyn FnOnce() -> BoxFuture<'static, Result<V, BoxError>> + Send>;

/// Options for [`KeyedCache::stream`](crate::cache::KeyedCache::stream).
pub struct StreamOptions<V> {
    pub(crate) if_absent: Option<Loader<V>>,
    pub(crate) max_age: Option<Duration>,
}

impl<V> Default for StreamOptions<V> {
    fn default() -> Self {
        Self {
            if_absent: None,
            max_age: None,
        }
    }
}

impl<V: Send + 'static> StreamOptions<V> {
    /// No loader, cache default TTL.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader invoked when the entry holds no fresh value and no load is in flight.
    pub fn if_absent<F, Fut, Er>(mut self, loader: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, Er>> + Send + 'static,
        Er: Into<BoxError>,
    {
        self.if_absent = Some(Box::new(move || {
            async move {
                let result: Result<V, BoxError> = loader().await.map_err(Into::into);
                result
            }
            .boxed()
        }));
        self
    }

    /// TTL applied to the entry when the loader's value is stored.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

impl<V> std::fmt::Debug for StreamOptions<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions")
            .field("if_absent", &self.if_absent.is_some())
            .field("max_age", &self.max_age)
            .finish()
    }
}
