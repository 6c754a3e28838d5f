//! Filter definitions: the SQLite tables behind every filter, the write
//! API that keeps the cache coherent, and the snapshot builder that
//! serializes a filter into its cached read-model.

pub mod error;
pub mod records;
pub mod snapshot;
pub mod store;


pub use error::StoreError;
pub use records::{ActionRow, FilterRow, NewFilter, NewTrigger, StateRow, TransitionRow, TriggerRow};
pub use store::FilterStore;
