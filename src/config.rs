//! Configuration Module
//!
//! Cache bounds plus loading of the demo driver's settings from environment variables.

use std::env;
use std::time::Duration;

/// Default number of items assumed per page when sizing the shared item cache.
pub const DEFAULT_PAGE_SIZE: usize = 20;

// == Cache Config ==
/// Bounds for a single keyed cache.
///
/// `size` limits the number of entries without listeners; `None` means unbounded.
/// `max_age` is the default time-to-live; `None` means entries never expire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheConfig {
    pub size: Option<usize>,
    pub max_age: Option<Duration>,
}

impl CacheConfig {
    /// Unbounded, non-expiring configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

// == Paged Config ==
/// Bounds for a paged cache.
///
/// The shared item cache is scaled from the page bound so it can hold every item
/// of every retained page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagedConfig {
    /// Bounds applied to the page-level cache
    pub pages: CacheConfig,
    /// Estimated number of items per page
    pub page_size: Option<usize>,
}

impl PagedConfig {
    pub fn new(pages: CacheConfig) -> Self {
        Self {
            pages,
            page_size: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Derives the configuration of the shared item cache.
    pub fn item_config(&self) -> CacheConfig {
        let per_page = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        CacheConfig {
            size: self.pages.size.map(|size| size.saturating_mul(per_page)),
            max_age: self.pages.max_age,
        }
    }
}

// == Application Config ==
/// Settings for the demo driver.
#[derive(Debug, Clone)]
pub struct Config {
    /// Page cache bounds
    pub cache: CacheConfig,
    /// Items per page estimate
    pub page_size: usize,
    /// Background trim interval in seconds
    pub trim_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_SIZE` - Orphaned entries retained, or `none` (default: 100)
    /// - `CACHE_MAX_AGE` - TTL in seconds, or `none` (default: 300)
    /// - `PAGE_SIZE` - Items per page estimate (default: 20)
    /// - `TRIM_INTERVAL` - Background trim frequency in seconds (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache: CacheConfig {
                size: optional_var("CACHE_SIZE", defaults.cache.size),
                max_age: optional_var("CACHE_MAX_AGE", defaults.cache.max_age.map(|d| d.as_secs()))
                    .map(Duration::from_secs),
            },
            page_size: env::var("PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.page_size),
            trim_interval: env::var("TRIM_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.trim_interval),
        }
    }

    pub fn paged(&self) -> PagedConfig {
        PagedConfig::new(self.cache).with_page_size(self.page_size)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::new()
                .with_size(100)
                .with_max_age(Duration::from_secs(300)),
            page_size: DEFAULT_PAGE_SIZE,
            trim_interval: 30,
        }
    }
}

/// Reads a bound that may be disabled with the literal `none`.
fn optional_var<T: std::str::FromStr>(name: &str, default: Option<T>) -> Option<T> {
    match env::var(name) {
        Ok(v) if v.eq_ignore_ascii_case("none") => None,
        Ok(v) => v.parse().ok().or(default),
        Err(_) => default,
    }
}
