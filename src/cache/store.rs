//! Classification cache storage.
//!
//! Field types: replaced wholesale per solution, read-only in between.
//! Content decisions: content hash → decision, LRU-bounded, survives across
//! solutions until an explicit clear.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use lru::LruCache;
use metrics::counter;

use crate::domain::{metadata::FieldTypeEntry, types::RenderDecision};

use super::config::CacheConfig;
use super::keys::ContentKey;
use super::lock::{mutex_lock, rw_read, rw_write};

const SOURCE: &str = "cache::store";
const METRIC_CONTENT_CACHE_EVICT: &str = "tutor_render_content_cache_evict_total";

type FieldTable = HashMap<String, FieldTypeEntry>;

pub struct ClassificationStore {
    field_types: RwLock<Arc<FieldTable>>,
    content: Mutex<LruCache<ContentKey, RenderDecision>>,
}

impl ClassificationStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            field_types: RwLock::new(Arc::new(HashMap::new())),
            content: Mutex::new(LruCache::new(config.content_cache_limit_non_zero())),
        }
    }

    // ========================================================================
    // Field-type table
    // ========================================================================

    /// Swap in a complete table. Readers see either the old or the new table,
    /// never a mix.
    pub fn replace_field_types(&self, table: FieldTable) {
        *rw_write(&self.field_types, SOURCE, "replace_field_types") = Arc::new(table);
    }

    pub fn clear_field_types(&self) {
        self.replace_field_types(HashMap::new());
    }

    pub fn field_type(&self, field_name: &str) -> Option<FieldTypeEntry> {
        rw_read(&self.field_types, SOURCE, "field_type")
            .get(field_name)
            .cloned()
    }

    pub fn field_type_count(&self) -> usize {
        rw_read(&self.field_types, SOURCE, "field_type_count").len()
    }

    // ========================================================================
    // Content-analysis cache
    // ========================================================================

    pub fn cached_decision(&self, key: ContentKey) -> Option<RenderDecision> {
        mutex_lock(&self.content, SOURCE, "cached_decision")
            .get(&key)
            .cloned()
    }

    pub fn cache_decision(&self, key: ContentKey, decision: RenderDecision) {
        let evicted = mutex_lock(&self.content, SOURCE, "cache_decision").push(key, decision);
        if matches!(evicted, Some((evicted_key, _)) if evicted_key != key) {
            counter!(METRIC_CONTENT_CACHE_EVICT).increment(1);
        }
    }

    pub fn clear_content(&self) {
        mutex_lock(&self.content, SOURCE, "clear_content").clear();
    }

    pub fn content_len(&self) -> usize {
        mutex_lock(&self.content, SOURCE, "content_len").len()
    }
}

impl Default for ClassificationStore {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
