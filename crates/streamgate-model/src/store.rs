use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use streamgate_cache::FilterCache;
use streamgate_common::mdo::StreamUnits;
use streamgate_common::slug::slugify;
use streamgate_common::types::{ActionOn, ActionType, TriggerOp};

use crate::error::{Result, StoreError};
use crate::records::{ActionRow, FilterRow, NewFilter, NewTrigger, StateRow, TransitionRow, TriggerRow};

/// SQLite-backed store of filter definitions.
///
/// Every write that changes what a snapshot would contain drops the
/// filter's cache entry before returning, so the next resolve rebuilds
/// from the rows written here. Reads never touch the cache.
pub struct FilterStore {
    conn: Mutex<Connection>,
    cache: FilterCache,
}

impl FilterStore {
    pub fn open(path: &Path, cache: FilterCache) -> Result<Self> {
        Self::from_connection(Connection::open(path)?, cache)
    }

    pub fn open_in_memory(cache: FilterCache) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, cache)
    }

    fn from_connection(conn: Connection, cache: FilterCache) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

             CREATE TABLE IF NOT EXISTS stream_filters (
                 id            INTEGER PRIMARY KEY AUTOINCREMENT,
                 slug          TEXT NOT NULL UNIQUE,
                 name          TEXT NOT NULL,
                 input_stream  TEXT,
                 project       TEXT NOT NULL,
                 variable      TEXT NOT NULL,
                 device        TEXT,
                 active        INTEGER NOT NULL DEFAULT 1,
                 created_at    TEXT NOT NULL
             );

             CREATE TABLE IF NOT EXISTS filter_states (
                 id         INTEGER PRIMARY KEY AUTOINCREMENT,
                 filter_id  INTEGER NOT NULL REFERENCES stream_filters(id) ON DELETE CASCADE,
                 label      TEXT NOT NULL,
                 slug       TEXT NOT NULL,
                 UNIQUE (filter_id, slug)
             );

             CREATE TABLE IF NOT EXISTS state_transitions (
                 id            INTEGER PRIMARY KEY AUTOINCREMENT,
                 filter_id     INTEGER NOT NULL REFERENCES stream_filters(id) ON DELETE CASCADE,
                 src_state_id  INTEGER REFERENCES filter_states(id) ON DELETE CASCADE,
                 dst_state_id  INTEGER NOT NULL REFERENCES filter_states(id) ON DELETE CASCADE
             );

             CREATE TABLE IF NOT EXISTS filter_triggers (
                 id                INTEGER PRIMARY KEY AUTOINCREMENT,
                 transition_id     INTEGER NOT NULL REFERENCES state_transitions(id) ON DELETE CASCADE,
                 operator          TEXT NOT NULL,
                 threshold         REAL,
                 user_threshold    REAL,
                 user_output_unit  TEXT,
                 user_unit_full    TEXT
             );

             CREATE TABLE IF NOT EXISTS filter_actions (
                 id             INTEGER PRIMARY KEY AUTOINCREMENT,
                 state_id       INTEGER NOT NULL REFERENCES filter_states(id) ON DELETE CASCADE,
                 action_type    TEXT NOT NULL,
                 action_on      TEXT NOT NULL,
                 extra_payload  TEXT
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            cache,
        })
    }

    pub fn cache(&self) -> &FilterCache {
        &self.cache
    }

    // ---- filters ----

    pub fn create_filter(&self, req: &NewFilter) -> Result<FilterRow> {
        let slug = match &req.device {
            Some(device) => format!("f--{}--{}--{}", req.project, device, req.variable),
            None => format!("f--{}----{}", req.project, req.variable),
        };
        let conn = self.conn.lock().unwrap();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM stream_filters WHERE slug = ?1",
                rusqlite::params![&slug],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::Validation(format!(
                "a filter already exists for {slug}"
            )));
        }
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO stream_filters (slug, name, input_stream, project, variable, device, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            rusqlite::params![
                &slug,
                &req.name,
                &req.input_stream,
                &req.project,
                &req.variable,
                &req.device,
                created_at.to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        tracing::info!(filter = %slug, id, "Created stream filter");
        self.cache.invalidate(&slug);
        Ok(FilterRow {
            id,
            slug,
            name: req.name.clone(),
            input_stream: req.input_stream.clone(),
            project: req.project.clone(),
            variable: req.variable.clone(),
            device: req.device.clone(),
            active: true,
            created_at,
        })
    }

    pub fn get_filter(&self, filter_id: i64) -> Result<FilterRow> {
        let conn = self.conn.lock().unwrap();
        Self::filter_by_id(&conn, filter_id)
    }

    pub fn get_filter_by_slug(&self, slug: &str) -> Result<FilterRow> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, slug, name, input_stream, project, variable, device, active, created_at
                 FROM stream_filters WHERE slug = ?1",
                rusqlite::params![slug],
                Self::map_filter_row,
            )
            .optional()?;
        row.ok_or_else(|| StoreError::NotFound {
            entity: "filter",
            id: slug.to_string(),
        })
    }

    pub fn list_filters(&self) -> Result<Vec<FilterRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT id, slug, name, input_stream, project, variable, device, active, created_at
             FROM stream_filters ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], Self::map_filter_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn set_filter_active(&self, filter_id: i64, active: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let filter = Self::filter_by_id(&conn, filter_id)?;
        conn.execute(
            "UPDATE stream_filters SET active = ?1 WHERE id = ?2",
            rusqlite::params![active, filter_id],
        )?;
        drop(conn);
        tracing::info!(filter = %filter.slug, active, "Toggled stream filter");
        self.cache.invalidate(&filter.slug);
        Ok(())
    }

    /// Deletes a filter and, via cascade, its states, transitions,
    /// triggers and actions. Also clears every current-state entry the
    /// filter governed.
    pub fn delete_filter(&self, filter_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let filter = Self::filter_by_id(&conn, filter_id)?;
        conn.execute(
            "DELETE FROM stream_filters WHERE id = ?1",
            rusqlite::params![filter_id],
        )?;
        drop(conn);
        tracing::info!(filter = %filter.slug, "Deleted stream filter");
        self.cache.clear_filter_state(&filter.slug);
        Ok(())
    }

    // ---- states ----

    pub fn create_state(&self, filter_id: i64, label: &str) -> Result<StateRow> {
        let slug = slugify(label);
        if slug.is_empty() {
            return Err(StoreError::Validation(format!(
                "state label {label:?} slugifies to nothing"
            )));
        }
        let conn = self.conn.lock().unwrap();
        let filter = Self::filter_by_id(&conn, filter_id)?;
        let duplicate: Option<i64> = conn
            .query_row(
                "SELECT id FROM filter_states WHERE filter_id = ?1 AND slug = ?2",
                rusqlite::params![filter_id, &slug],
                |row| row.get(0),
            )
            .optional()?;
        if duplicate.is_some() {
            return Err(StoreError::Validation(format!(
                "filter {} already has a state {slug:?}",
                filter.slug
            )));
        }
        conn.execute(
            "INSERT INTO filter_states (filter_id, label, slug) VALUES (?1, ?2, ?3)",
            rusqlite::params![filter_id, label, &slug],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.cache.invalidate(&filter.slug);
        Ok(StateRow {
            id,
            filter_id,
            label: label.to_string(),
            slug,
        })
    }

    /// Deletes a state and, via cascade, the transitions and actions
    /// attached to it.
    pub fn delete_state(&self, state_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let filter_id: Option<i64> = conn
            .query_row(
                "SELECT filter_id FROM filter_states WHERE id = ?1",
                rusqlite::params![state_id],
                |row| row.get(0),
            )
            .optional()?;
        let filter_id = filter_id.ok_or_else(|| StoreError::NotFound {
            entity: "state",
            id: state_id.to_string(),
        })?;
        let filter = Self::filter_by_id(&conn, filter_id)?;
        conn.execute(
            "DELETE FROM filter_states WHERE id = ?1",
            rusqlite::params![state_id],
        )?;
        drop(conn);
        self.cache.invalidate(&filter.slug);
        Ok(())
    }

    // ---- transitions ----

    /// Creates a transition. `src_state_id = None` is the wildcard
    /// source, matching any current state (or none). Both endpoints must
    /// belong to `filter_id`.
    pub fn create_transition(
        &self,
        filter_id: i64,
        src_state_id: Option<i64>,
        dst_state_id: i64,
    ) -> Result<TransitionRow> {
        let conn = self.conn.lock().unwrap();
        let filter = Self::filter_by_id(&conn, filter_id)?;
        if let Some(src) = src_state_id {
            Self::check_state_owned(&conn, filter_id, src)?;
        }
        Self::check_state_owned(&conn, filter_id, dst_state_id)?;

        let duplicate: i64 = conn.query_row(
            "SELECT COUNT(*) FROM state_transitions
             WHERE filter_id = ?1 AND src_state_id IS ?2 AND dst_state_id = ?3",
            rusqlite::params![filter_id, src_state_id, dst_state_id],
            |row| row.get(0),
        )?;
        if duplicate > 0 {
            return Err(StoreError::Validation(format!(
                "filter {} already has a transition {:?} -> {}",
                filter.slug, src_state_id, dst_state_id
            )));
        }

        let siblings: i64 = conn.query_row(
            "SELECT COUNT(*) FROM state_transitions
             WHERE filter_id = ?1 AND src_state_id IS ?2",
            rusqlite::params![filter_id, src_state_id],
            |row| row.get(0),
        )?;
        if siblings > 0 {
            tracing::warn!(
                filter = %filter.slug,
                src = ?src_state_id,
                "Multiple transitions share a source state; the earliest-created match wins"
            );
        }

        conn.execute(
            "INSERT INTO state_transitions (filter_id, src_state_id, dst_state_id) VALUES (?1, ?2, ?3)",
            rusqlite::params![filter_id, src_state_id, dst_state_id],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.cache.invalidate(&filter.slug);
        Ok(TransitionRow {
            id,
            filter_id,
            src_state_id,
            dst_state_id,
        })
    }

    pub fn delete_transition(&self, transition_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let filter_id: Option<i64> = conn
            .query_row(
                "SELECT filter_id FROM state_transitions WHERE id = ?1",
                rusqlite::params![transition_id],
                |row| row.get(0),
            )
            .optional()?;
        let filter_id = filter_id.ok_or_else(|| StoreError::NotFound {
            entity: "transition",
            id: transition_id.to_string(),
        })?;
        let filter = Self::filter_by_id(&conn, filter_id)?;
        conn.execute(
            "DELETE FROM state_transitions WHERE id = ?1",
            rusqlite::params![transition_id],
        )?;
        drop(conn);
        self.cache.invalidate(&filter.slug);
        Ok(())
    }

    // ---- triggers ----

    /// Creates a trigger on a transition. A non-buffer trigger requires a
    /// threshold, which is converted from the user's display unit to the
    /// stream's raw unit here, once. Buffer triggers carry no threshold.
    pub fn create_trigger(
        &self,
        transition_id: i64,
        req: &NewTrigger,
        units: Option<&StreamUnits>,
    ) -> Result<TriggerRow> {
        if req.operator == TriggerOp::Unknown {
            return Err(StoreError::Validation(
                "cannot create a trigger with an unknown operator".to_string(),
            ));
        }
        let threshold = match (req.operator, req.user_threshold) {
            (TriggerOp::Buffer, _) => None,
            (_, None) => {
                return Err(StoreError::Validation(format!(
                    "operator {} requires a threshold",
                    req.operator
                )))
            }
            (_, Some(user)) => Some(match units {
                Some(u) => u.mdo.compute_reverse(user),
                None => user,
            }),
        };
        let user_threshold = if req.operator == TriggerOp::Buffer {
            None
        } else {
            req.user_threshold
        };

        let conn = self.conn.lock().unwrap();
        let filter_id: Option<i64> = conn
            .query_row(
                "SELECT filter_id FROM state_transitions WHERE id = ?1",
                rusqlite::params![transition_id],
                |row| row.get(0),
            )
            .optional()?;
        let filter_id = filter_id.ok_or_else(|| StoreError::NotFound {
            entity: "transition",
            id: transition_id.to_string(),
        })?;
        let filter = Self::filter_by_id(&conn, filter_id)?;

        let unit = units.map(|u| &u.unit);
        conn.execute(
            "INSERT INTO filter_triggers (transition_id, operator, threshold, user_threshold, user_output_unit, user_unit_full)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                transition_id,
                req.operator.to_string(),
                threshold,
                user_threshold,
                unit.map(|u| u.unit_short.as_str()),
                unit.map(|u| u.unit_full.as_str()),
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.cache.invalidate(&filter.slug);
        Ok(TriggerRow {
            id,
            transition_id,
            operator: req.operator,
            threshold,
            user_threshold,
            user_output_unit: unit.map(|u| u.unit_short.clone()),
            user_unit_full: unit.map(|u| u.unit_full.clone()),
        })
    }

    pub fn delete_trigger(&self, trigger_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let filter_id: Option<i64> = conn
            .query_row(
                "SELECT t.filter_id FROM filter_triggers g
                 JOIN state_transitions t ON t.id = g.transition_id
                 WHERE g.id = ?1",
                rusqlite::params![trigger_id],
                |row| row.get(0),
            )
            .optional()?;
        let filter_id = filter_id.ok_or_else(|| StoreError::NotFound {
            entity: "trigger",
            id: trigger_id.to_string(),
        })?;
        let filter = Self::filter_by_id(&conn, filter_id)?;
        conn.execute(
            "DELETE FROM filter_triggers WHERE id = ?1",
            rusqlite::params![trigger_id],
        )?;
        drop(conn);
        self.cache.invalidate(&filter.slug);
        Ok(())
    }

    // ---- actions ----

    pub fn create_action(
        &self,
        state_id: i64,
        action_type: ActionType,
        on: ActionOn,
        extra_payload: Option<serde_json::Value>,
    ) -> Result<ActionRow> {
        let conn = self.conn.lock().unwrap();
        let filter_id: Option<i64> = conn
            .query_row(
                "SELECT filter_id FROM filter_states WHERE id = ?1",
                rusqlite::params![state_id],
                |row| row.get(0),
            )
            .optional()?;
        let filter_id = filter_id.ok_or_else(|| StoreError::NotFound {
            entity: "state",
            id: state_id.to_string(),
        })?;
        let filter = Self::filter_by_id(&conn, filter_id)?;

        let payload_json = match &extra_payload {
            Some(v) => Some(serde_json::to_string(v)?),
            None => None,
        };
        conn.execute(
            "INSERT INTO filter_actions (state_id, action_type, action_on, extra_payload)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![state_id, action_type.to_string(), on.to_string(), payload_json],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.cache.invalidate(&filter.slug);
        Ok(ActionRow {
            id,
            state_id,
            action_type,
            on,
            extra_payload,
        })
    }

    pub fn delete_action(&self, action_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let filter_id: Option<i64> = conn
            .query_row(
                "SELECT s.filter_id FROM filter_actions a
                 JOIN filter_states s ON s.id = a.state_id
                 WHERE a.id = ?1",
                rusqlite::params![action_id],
                |row| row.get(0),
            )
            .optional()?;
        let filter_id = filter_id.ok_or_else(|| StoreError::NotFound {
            entity: "action",
            id: action_id.to_string(),
        })?;
        let filter = Self::filter_by_id(&conn, filter_id)?;
        conn.execute(
            "DELETE FROM filter_actions WHERE id = ?1",
            rusqlite::params![action_id],
        )?;
        drop(conn);
        self.cache.invalidate(&filter.slug);
        Ok(())
    }

    // ---- row mapping ----

    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }

    fn filter_by_id(conn: &Connection, filter_id: i64) -> Result<FilterRow> {
        let row = conn
            .query_row(
                "SELECT id, slug, name, input_stream, project, variable, device, active, created_at
                 FROM stream_filters WHERE id = ?1",
                rusqlite::params![filter_id],
                Self::map_filter_row,
            )
            .optional()?;
        row.ok_or_else(|| StoreError::NotFound {
            entity: "filter",
            id: filter_id.to_string(),
        })
    }

    fn map_filter_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FilterRow> {
        let created_raw: String = row.get(8)?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_raw)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default();
        Ok(FilterRow {
            id: row.get(0)?,
            slug: row.get(1)?,
            name: row.get(2)?,
            input_stream: row.get(3)?,
            project: row.get(4)?,
            variable: row.get(5)?,
            device: row.get(6)?,
            active: row.get(7)?,
            created_at,
        })
    }

    fn check_state_owned(conn: &Connection, filter_id: i64, state_id: i64) -> Result<()> {
        let owner: Option<i64> = conn
            .query_row(
                "SELECT filter_id FROM filter_states WHERE id = ?1",
                rusqlite::params![state_id],
                |row| row.get(0),
            )
            .optional()?;
        match owner {
            Some(owner) if owner == filter_id => Ok(()),
            Some(_) => Err(StoreError::Validation(format!(
                "state {state_id} belongs to a different filter"
            ))),
            None => Err(StoreError::NotFound {
                entity: "state",
                id: state_id.to_string(),
            }),
        }
    }
}
