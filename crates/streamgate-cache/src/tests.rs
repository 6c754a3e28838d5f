use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use streamgate_common::types::{CachedFilter, FilterSnapshot};

use crate::{FilterCache, KeyValueStore, MemoryKvStore, SnapshotSource};

const STREAM: &str = "s--0000-0001--0000-0000-0000-00ab--5001";
const STREAM_KEY: &str = "f--0000-0001--0000-0000-0000-00ab--5001";
const PROJECT_KEY: &str = "f--0000-0001----5001";

fn snapshot(slug: &str, name: &str) -> FilterSnapshot {
    FilterSnapshot {
        id: 1,
        slug: slug.to_string(),
        name: name.to_string(),
        input_stream: Some(STREAM.to_string()),
        project: "0000-0001".to_string(),
        variable: "5001".to_string(),
        device: None,
        active: true,
        states: vec![],
        transitions: vec![],
    }
}

/// Source over a fixed set of snapshots that counts how often it is hit.
struct FixedSource {
    snapshots: Vec<FilterSnapshot>,
    lookups: AtomicUsize,
}

impl FixedSource {
    fn new(snapshots: Vec<FilterSnapshot>) -> Self {
        Self {
            snapshots,
            lookups: AtomicUsize::new(0),
        }
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for FixedSource {
    fn filter_by_slug(&self, filter_slug: &str) -> Option<FilterSnapshot> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.snapshots.iter().find(|s| s.slug == filter_slug).cloned()
    }
}

#[test]
fn resolve_prefers_stream_specific_over_project_wide() {
    let cache = FilterCache::new(Arc::new(MemoryKvStore::new()));
    let source = FixedSource::new(vec![
        snapshot(STREAM_KEY, "stream filter"),
        snapshot(PROJECT_KEY, "project filter"),
    ]);

    let resolved = cache.resolve(STREAM, &source);
    assert_eq!(resolved.snapshot().unwrap().name, "stream filter");
}

#[test]
fn resolve_falls_back_to_project_wide_filter() {
    let cache = FilterCache::new(Arc::new(MemoryKvStore::new()));
    let source = FixedSource::new(vec![snapshot(PROJECT_KEY, "project filter")]);

    let resolved = cache.resolve(STREAM, &source);
    assert_eq!(resolved.snapshot().unwrap().name, "project filter");

    // The project-wide snapshot is now cached, so a second stream in the
    // same project resolves without touching the source again.
    let lookups_after_first = source.lookups();
    let other = "s--0000-0001--0000-0000-0000-00cd--5001";
    let resolved = cache.resolve(other, &source);
    assert_eq!(resolved.snapshot().unwrap().name, "project filter");
    assert_eq!(source.lookups(), lookups_after_first);
}

#[test]
fn resolve_caches_empty_sentinel_under_stream_key() {
    let store = Arc::new(MemoryKvStore::new());
    let cache = FilterCache::new(store.clone());
    let source = FixedSource::new(vec![]);

    // Cold: both keys missed, both source lookups happen.
    assert!(cache.resolve(STREAM, &source).is_empty());
    assert_eq!(source.lookups(), 2);

    // Warm: the sentinel answers from the stream key alone.
    assert!(cache.resolve(STREAM, &source).is_empty());
    assert_eq!(source.lookups(), 2);

    let raw = store
        .get(&format!("filter:{STREAM_KEY}"))
        .unwrap()
        .expect("sentinel cached");
    assert_eq!(raw, r#"{"empty":true}"#);
}

#[test]
fn resolve_warm_hit_skips_the_source() {
    let cache = FilterCache::new(Arc::new(MemoryKvStore::new()));
    let source = FixedSource::new(vec![snapshot(STREAM_KEY, "stream filter")]);

    cache.resolve(STREAM, &source);
    assert_eq!(source.lookups(), 1);
    cache.resolve(STREAM, &source);
    assert_eq!(source.lookups(), 1);
}

#[test]
fn resolve_malformed_slug_is_empty_and_never_cached() {
    let store = Arc::new(MemoryKvStore::new());
    let cache = FilterCache::new(store.clone());
    let source = FixedSource::new(vec![]);

    assert!(cache.resolve("not-a-slug", &source).is_empty());
    assert_eq!(source.lookups(), 0);
    assert!(store.is_empty());
}

#[test]
fn invalidate_forces_a_fresh_source_lookup() {
    let cache = FilterCache::new(Arc::new(MemoryKvStore::new()));
    let source = FixedSource::new(vec![snapshot(STREAM_KEY, "v1")]);

    cache.resolve(STREAM, &source);
    cache.invalidate(STREAM_KEY);
    cache.resolve(STREAM, &source);
    assert_eq!(source.lookups(), 2);
}

#[test]
fn corrupt_cache_entry_degrades_to_a_miss() {
    let store = Arc::new(MemoryKvStore::new());
    store
        .set(&format!("filter:{STREAM_KEY}"), "{not json")
        .unwrap();
    let cache = FilterCache::new(store);
    let source = FixedSource::new(vec![snapshot(STREAM_KEY, "stream filter")]);

    let resolved = cache.resolve(STREAM, &source);
    assert_eq!(resolved.snapshot().unwrap().name, "stream filter");
    assert_eq!(source.lookups(), 1);
}

#[test]
fn current_state_roundtrip() {
    let cache = FilterCache::new(Arc::new(MemoryKvStore::new()));

    assert_eq!(cache.get_current_state(STREAM), None);
    cache.set_current_state(STREAM, "too-hot");
    assert_eq!(cache.get_current_state(STREAM), Some("too-hot".to_string()));
}

#[test]
fn clear_project_wide_filter_clears_all_device_states() {
    let cache = FilterCache::new(Arc::new(MemoryKvStore::new()));
    let dev_a = "s--0000-0001--0000-0000-0000-00ab--5001";
    let dev_b = "s--0000-0001--0000-0000-0000-00cd--5001";
    let other_var = "s--0000-0001--0000-0000-0000-00ab--5002";
    cache.set_current_state(dev_a, "hot");
    cache.set_current_state(dev_b, "cold");
    cache.set_current_state(other_var, "ok");

    cache.clear_filter_state(PROJECT_KEY);

    assert_eq!(cache.get_current_state(dev_a), None);
    assert_eq!(cache.get_current_state(dev_b), None);
    // A different variable in the same project is untouched.
    assert_eq!(cache.get_current_state(other_var), Some("ok".to_string()));
}

#[test]
fn clear_stream_filter_only_clears_that_stream() {
    let cache = FilterCache::new(Arc::new(MemoryKvStore::new()));
    let other = "s--0000-0001--0000-0000-0000-00cd--5001";
    cache.set_current_state(STREAM, "hot");
    cache.set_current_state(other, "cold");

    cache.clear_filter_state(STREAM_KEY);

    assert_eq!(cache.get_current_state(STREAM), None);
    assert_eq!(cache.get_current_state(other), Some("cold".to_string()));
}

#[test]
fn cached_filter_serialization_matches_the_wire_shape() {
    let cached = CachedFilter::Snapshot(snapshot(STREAM_KEY, "stream filter"));
    let raw = serde_json::to_string(&cached).unwrap();
    let back: CachedFilter = serde_json::from_str(&raw).unwrap();
    assert_eq!(back, cached);
    assert!(!back.is_empty());
}
