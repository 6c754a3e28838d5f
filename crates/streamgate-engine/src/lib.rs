//! The stream filter processing engine.
//!
//! Ingestion hands batches of parsed data points to
//! [`processor::FilterProcessor`], which resolves each stream's filter
//! snapshot through the cache, evaluates trigger guards, realizes
//! transitions, dispatches entry/exit actions, and maintains the
//! per-stream current state.

pub mod log;
pub mod processor;
pub mod trigger;


pub use log::{MemoryTransitionLog, TransitionLog, TransitionLogEntry};
pub use processor::{DerivedDataSink, FilterProcessor, MemoryDataSink};
