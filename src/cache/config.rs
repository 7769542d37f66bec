//! Classification cache configuration.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_CONTENT_CACHE_LIMIT: usize = 1024;

/// Bounds for the classification caches.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum content-hash → decision entries kept before LRU eviction.
    pub content_cache_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            content_cache_limit: DEFAULT_CONTENT_CACHE_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            content_cache_limit: settings.content_cache_limit.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the content cache limit as NonZeroUsize, clamping to 1 if zero.
    pub fn content_cache_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.content_cache_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
