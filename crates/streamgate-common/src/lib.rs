//! Shared types for the streamgate filter engine: telemetry data points,
//! cached filter snapshots, slug handling, and unit conversion.

pub mod id;
pub mod mdo;
pub mod slug;
pub mod types;
