//! Snapshot building: serializes one stored filter into the read-model
//! the cache holds and the engine evaluates. Everything is emitted in
//! creation order (rowid order), which is what makes first-match-wins
//! evaluation deterministic.

use rusqlite::Connection;
use streamgate_cache::SnapshotSource;
use streamgate_common::types::{
    ActionSnapshot, FilterSnapshot, StateSnapshot, TransitionSnapshot, TriggerSnapshot, TriggerOp,
};

use crate::error::Result;
use crate::store::FilterStore;

impl FilterStore {
    /// Builds the full snapshot for one filter slug.
    pub fn snapshot(&self, filter_slug: &str) -> Result<FilterSnapshot> {
        let filter = self.get_filter_by_slug(filter_slug)?;
        self.with_conn(|conn| {
            Ok(FilterSnapshot {
                id: filter.id,
                slug: filter.slug.clone(),
                name: filter.name.clone(),
                input_stream: filter.input_stream.clone(),
                project: filter.project.clone(),
                variable: filter.variable.clone(),
                device: filter.device.clone(),
                active: filter.active,
                states: load_states(conn, filter.id)?,
                transitions: load_transitions(conn, filter.id)?,
            })
        })
    }
}

impl SnapshotSource for FilterStore {
    fn filter_by_slug(&self, filter_slug: &str) -> Option<FilterSnapshot> {
        match self.snapshot(filter_slug) {
            Ok(snapshot) => Some(snapshot),
            Err(crate::error::StoreError::NotFound { .. }) => None,
            Err(e) => {
                tracing::error!(filter = %filter_slug, error = %e, "Snapshot build failed");
                None
            }
        }
    }
}

fn load_states(conn: &Connection, filter_id: i64) -> Result<Vec<StateSnapshot>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, label, slug FROM filter_states WHERE filter_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(rusqlite::params![filter_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut states = Vec::new();
    for row in rows {
        let (id, label, slug) = row?;
        states.push(StateSnapshot {
            id,
            label,
            slug,
            actions: load_actions(conn, id)?,
        });
    }
    Ok(states)
}

fn load_actions(conn: &Connection, state_id: i64) -> Result<Vec<ActionSnapshot>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, action_type, action_on, extra_payload
         FROM filter_actions WHERE state_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(rusqlite::params![state_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;

    let mut actions = Vec::new();
    for row in rows {
        let (id, type_code, on_code, payload_json) = row?;
        let Ok(action_type) = type_code.parse() else {
            tracing::warn!(id, code = %type_code, "Skipping action with unknown type");
            continue;
        };
        let on = match on_code.as_str() {
            "exit" => streamgate_common::types::ActionOn::Exit,
            _ => streamgate_common::types::ActionOn::Entry,
        };
        let extra_payload = match payload_json {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        actions.push(ActionSnapshot {
            id,
            action_type,
            on,
            extra_payload,
            state: state_id,
        });
    }
    Ok(actions)
}

fn load_transitions(conn: &Connection, filter_id: i64) -> Result<Vec<TransitionSnapshot>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, src_state_id, dst_state_id
         FROM state_transitions WHERE filter_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(rusqlite::params![filter_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, Option<i64>>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;

    let mut transitions = Vec::new();
    for row in rows {
        let (id, src, dst) = row?;
        transitions.push(TransitionSnapshot {
            id,
            src,
            dst,
            triggers: load_triggers(conn, id)?,
        });
    }
    Ok(transitions)
}

fn load_triggers(conn: &Connection, transition_id: i64) -> Result<Vec<TriggerSnapshot>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, operator, threshold, user_threshold, user_output_unit, user_unit_full
         FROM filter_triggers WHERE transition_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(rusqlite::params![transition_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<f64>>(2)?,
            row.get::<_, Option<f64>>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;

    let mut triggers = Vec::new();
    for row in rows {
        let (id, op_code, threshold, user_threshold, user_output_unit, user_unit_full) = row?;
        // An operator code this build does not know still evaluates
        // (to false) instead of breaking the whole snapshot.
        let operator: TriggerOp = op_code.parse().unwrap_or(TriggerOp::Unknown);
        triggers.push(TriggerSnapshot {
            id,
            operator,
            operator_display: operator.display().to_string(),
            threshold,
            user_threshold,
            user_output_unit,
            user_unit_full,
            transition: transition_id,
        });
    }
    Ok(triggers)
}
