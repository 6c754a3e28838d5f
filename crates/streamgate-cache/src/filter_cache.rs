use std::sync::Arc;

use streamgate_common::slug::SlugParts;
use streamgate_common::types::{CachedFilter, FilterSnapshot};

use crate::kv::KeyValueStore;

const FILTER_PREFIX: &str = "filter";
const CURRENT_STATE_PREFIX: &str = "current-state";

/// Persistent-store fallback used by [`FilterCache::resolve`] on a cache
/// miss. Implementors look a filter up by its exact slug and serialize it;
/// lookup failures are logged by the implementor and surfaced as `None`.
pub trait SnapshotSource {
    fn filter_by_slug(&self, filter_slug: &str) -> Option<FilterSnapshot>;
}

/// The filter-snapshot cache plus the per-stream current-state store.
///
/// Resolution priority: a stream-specific filter always wins over a
/// project-wide one for the same project and variable. A stream with no
/// filter at all gets the `{"empty": true}` sentinel cached under its
/// stream-specific key so repeated lookups stay out of the database.
#[derive(Clone)]
pub struct FilterCache {
    store: Arc<dyn KeyValueStore>,
}

impl FilterCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn filter_key(slug: &str) -> String {
        format!("{FILTER_PREFIX}:{slug}")
    }

    fn current_state_key(slug: &str) -> String {
        format!("{CURRENT_STATE_PREFIX}:{slug}")
    }

    fn get_cached(&self, filter_slug: &str) -> Option<CachedFilter> {
        let key = Self::filter_key(filter_slug);
        let raw = match self.store.get(&key) {
            Ok(v) => v?,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Filter cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(cached) => {
                tracing::debug!(key = %key, "filter cache(HIT)");
                Some(cached)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Corrupt filter cache entry, treating as miss");
                None
            }
        }
    }

    fn put_cached(&self, filter_slug: &str, cached: &CachedFilter) {
        let key = Self::filter_key(filter_slug);
        match serde_json::to_string(cached) {
            Ok(raw) => {
                if let Err(e) = self.store.set(&key, &raw) {
                    tracing::warn!(key = %key, error = %e, "Filter cache write failed");
                } else {
                    tracing::debug!(key = %key, empty = cached.is_empty(), "filter cache(SET)");
                }
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to serialize filter snapshot")
            }
        }
    }

    /// Resolves the filter applicable to `stream_slug`.
    ///
    /// Checks the cache for the stream-specific key, then the project-wide
    /// key; on a double miss queries `source` in the same order, caching
    /// whichever answer it finds. A stream with no filter caches the empty
    /// sentinel under the stream-specific key only.
    pub fn resolve(&self, stream_slug: &str, source: &dyn SnapshotSource) -> CachedFilter {
        let Some(parts) = SlugParts::parse(stream_slug) else {
            tracing::warn!(slug = %stream_slug, "Malformed stream slug, no filter applies");
            return CachedFilter::empty();
        };

        let stream_key = parts.stream_filter_slug();
        if let Some(cached) = self.get_cached(&stream_key) {
            return cached;
        }

        let project_key = parts.project_filter_slug();
        if let Some(cached) = self.get_cached(&project_key) {
            return cached;
        }

        if let Some(snapshot) = source.filter_by_slug(&stream_key) {
            let cached = CachedFilter::Snapshot(snapshot);
            self.put_cached(&stream_key, &cached);
            return cached;
        }
        tracing::debug!(slug = %stream_key, "No stream-specific filter");

        if let Some(snapshot) = source.filter_by_slug(&project_key) {
            let cached = CachedFilter::Snapshot(snapshot);
            self.put_cached(&project_key, &cached);
            return cached;
        }
        tracing::debug!(slug = %project_key, "No project-wide filter");

        let empty = CachedFilter::empty();
        self.put_cached(&stream_key, &empty);
        empty
    }

    /// Drops the cached snapshot for one filter slug. Called by the model
    /// write path on every create/update/delete touching the filter.
    pub fn invalidate(&self, filter_slug: &str) {
        let key = Self::filter_key(filter_slug);
        tracing::debug!(key = %key, "filter cache(DELETE)");
        if let Err(e) = self.store.delete(&key) {
            tracing::warn!(key = %key, error = %e, "Filter cache delete failed");
        }
    }

    /// Drops the cached snapshot *and* every current-state entry the
    /// filter could govern. Used when an operator explicitly resets a
    /// filter. For a project-wide filter the device segment is
    /// wildcarded; a stream-specific filter matches exactly one stream.
    pub fn clear_filter_state(&self, filter_slug: &str) {
        self.invalidate(filter_slug);
        let Some(parts) = SlugParts::parse(filter_slug) else {
            tracing::warn!(slug = %filter_slug, "Malformed filter slug, skipping state clear");
            return;
        };
        let pattern = Self::current_state_key(&parts.current_state_pattern());
        match self.store.delete_pattern(&pattern) {
            Ok(n) => tracing::info!(pattern = %pattern, removed = n, "Cleared current-state entries"),
            Err(e) => tracing::warn!(pattern = %pattern, error = %e, "Current-state clear failed"),
        }
    }

    /// Last-recorded state slug for one stream, or `None` if the stream
    /// has no recorded state (or the cache is unavailable).
    pub fn get_current_state(&self, stream_slug: &str) -> Option<String> {
        let key = Self::current_state_key(stream_slug);
        match self.store.get(&key) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Current-state read failed, treating as unset");
                None
            }
        }
    }

    /// Records the stream's new current state. Never expires.
    pub fn set_current_state(&self, stream_slug: &str, state_slug: &str) {
        let key = Self::current_state_key(stream_slug);
        if let Err(e) = self.store.set(&key, state_slug) {
            tracing::warn!(key = %key, error = %e, "Current-state write failed");
        }
    }
}
