//! Row types for the filter definition tables, plus the request structs
//! the store accepts for creation. Row ids are SQLite rowids and double
//! as the ids serialized into snapshots.

use chrono::{DateTime, Utc};
use streamgate_common::types::{ActionOn, ActionType, TriggerOp};

#[derive(Debug, Clone, PartialEq)]
pub struct FilterRow {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub input_stream: Option<String>,
    pub project: String,
    pub variable: String,
    /// `None` for project-wide filters.
    pub device: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateRow {
    pub id: i64,
    pub filter_id: i64,
    pub label: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRow {
    pub id: i64,
    pub filter_id: i64,
    pub src_state_id: Option<i64>,
    pub dst_state_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRow {
    pub id: i64,
    pub transition_id: i64,
    pub operator: TriggerOp,
    pub threshold: Option<f64>,
    pub user_threshold: Option<f64>,
    pub user_output_unit: Option<String>,
    pub user_unit_full: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionRow {
    pub id: i64,
    pub state_id: i64,
    pub action_type: ActionType,
    pub on: ActionOn,
    pub extra_payload: Option<serde_json::Value>,
}

/// Request to create a filter. The slug is derived from the scope: a
/// device makes the filter stream-specific, no device makes it
/// project-wide.
#[derive(Debug, Clone)]
pub struct NewFilter {
    pub name: String,
    pub project: String,
    pub variable: String,
    pub device: Option<String>,
    pub input_stream: Option<String>,
}

/// Request to create a trigger on a transition. `user_threshold` is in
/// the user's display unit; the store converts it to the stream's raw
/// unit once, at creation time.
#[derive(Debug, Clone)]
pub struct NewTrigger {
    pub operator: TriggerOp,
    pub user_threshold: Option<f64>,
}
