//! Transition audit log port.
//!
//! Every realized transition is recorded for later inspection. The
//! storage technology behind the port is deployment-specific; the
//! in-memory implementation covers tests and single-process runs.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use streamgate_common::types::TriggerSnapshot;

/// The wildcard recorded when a transition had no bound source state
/// and the stream had no current state yet.
pub const WILDCARD_SRC: &str = "*";

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionLogEntry {
    /// Snowflake id.
    pub id: String,
    /// Stream slug the transition happened on.
    pub target_slug: String,
    /// Timestamp of the data point that fired the transition.
    pub timestamp: DateTime<Utc>,
    /// Label of the state left, or [`WILDCARD_SRC`].
    pub src: String,
    /// Label of the state entered.
    pub dst: String,
    /// The guards that passed.
    pub triggers: Vec<TriggerSnapshot>,
}

pub trait TransitionLog: Send + Sync {
    /// Records one transition and returns the log id.
    fn append(&self, entry: TransitionLogEntry) -> anyhow::Result<String>;

    /// Entries for one stream, oldest first. A half-open `[start, end)`
    /// range restricts by point timestamp when given.
    fn query_by_target(
        &self,
        target_slug: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> anyhow::Result<Vec<TransitionLogEntry>>;

    fn delete(&self, id: &str) -> anyhow::Result<()>;

    fn count(&self) -> anyhow::Result<usize>;
}

/// In-memory [`TransitionLog`].
#[derive(Default)]
pub struct MemoryTransitionLog {
    entries: Mutex<Vec<TransitionLogEntry>>,
}

impl MemoryTransitionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransitionLog for MemoryTransitionLog {
    fn append(&self, entry: TransitionLogEntry) -> anyhow::Result<String> {
        let id = entry.id.clone();
        self.entries.lock().unwrap().push(entry);
        Ok(id)
    }

    fn query_by_target(
        &self,
        target_slug: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> anyhow::Result<Vec<TransitionLogEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|e| e.target_slug == target_slug)
            .filter(|e| match range {
                Some((start, end)) => e.timestamp >= start && e.timestamp < end,
                None => true,
            })
            .cloned()
            .collect())
    }

    fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.entries.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }

    fn count(&self) -> anyhow::Result<usize> {
        Ok(self.entries.lock().unwrap().len())
    }
}
