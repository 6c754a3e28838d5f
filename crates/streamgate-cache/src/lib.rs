//! Caching layer for the filter engine.
//!
//! Two kinds of entries live in the same key-value store:
//!
//! - `filter:<filter-slug>` — the serialized [`CachedFilter`] snapshot for
//!   one filter, or the `{"empty": true}` sentinel recording that no
//!   filter applies to a stream.
//! - `current-state:<stream-slug>` — the slug of the state the stream is
//!   currently in. Never expires; updated on every realized transition.
//!
//! The store handle is injected so tests run against [`kv::MemoryKvStore`]
//! while production can back it with any shared cache.

pub mod filter_cache;
pub mod kv;

#[cfg(test)]
mod tests;

pub use filter_cache::{FilterCache, SnapshotSource};
pub use kv::{KeyValueStore, KvError, MemoryKvStore};
