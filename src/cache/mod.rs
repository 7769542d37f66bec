//! Classification caches.
//!
//! - **Field types**: field name → declared content type, populated from the
//!   upstream render metadata of the current solution.
//! - **Content analysis**: content hash → heuristic decision, LRU-bounded.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! content_cache_limit = 1024
//! ```

mod config;
mod keys;
pub(crate) mod lock;
mod store;

pub use config::CacheConfig;
pub use keys::ContentKey;
pub use store::ClassificationStore;
