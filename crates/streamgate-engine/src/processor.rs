use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use streamgate_actions::registry::ActionRegistry;
use streamgate_actions::ActionContext;
use streamgate_cache::{FilterCache, SnapshotSource};
use streamgate_common::id;
use streamgate_common::mdo::StreamUnits;
use streamgate_common::types::{
    ActionOn, CachedFilter, DataPoint, FilterSnapshot, StateSnapshot, TransitionSnapshot,
};

use crate::log::{TransitionLog, TransitionLogEntry, WILDCARD_SRC};
use crate::trigger::transition_guard;

/// Receives the derived data points buffered during a batch. Points are
/// handed over in one bulk write at the end of the batch, never
/// mid-loop.
pub trait DerivedDataSink: Send + Sync {
    fn bulk_create(&self, points: &[DataPoint]) -> anyhow::Result<()>;
}

/// In-memory [`DerivedDataSink`].
#[derive(Default)]
pub struct MemoryDataSink {
    points: Mutex<Vec<DataPoint>>,
}

impl MemoryDataSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> Vec<DataPoint> {
        self.points.lock().unwrap().clone()
    }
}

impl DerivedDataSink for MemoryDataSink {
    fn bulk_create(&self, points: &[DataPoint]) -> anyhow::Result<()> {
        self.points.lock().unwrap().extend_from_slice(points);
        Ok(())
    }
}

/// The per-stream state machine.
///
/// Evaluates each data point against the stream's cached filter
/// snapshot: walks the transitions in creation order, realizes the
/// first one whose source matches the current state and whose guard
/// passes, fires exit then entry actions, records the transition, and
/// advances the current state. At most one transition per point.
pub struct FilterProcessor {
    cache: FilterCache,
    registry: ActionRegistry,
    log: Arc<dyn TransitionLog>,
    sink: Arc<dyn DerivedDataSink>,
    skip_logs: bool,
    acting_user: Option<String>,
    derived: Vec<DataPoint>,
}

impl FilterProcessor {
    pub fn new(
        cache: FilterCache,
        registry: ActionRegistry,
        log: Arc<dyn TransitionLog>,
        sink: Arc<dyn DerivedDataSink>,
    ) -> Self {
        Self {
            cache,
            registry,
            log,
            sink,
            skip_logs: false,
            acting_user: None,
            derived: Vec::new(),
        }
    }

    /// Suppresses audit-log writes, for replays of already-logged data.
    pub fn skip_logs(mut self, skip: bool) -> Self {
        self.skip_logs = skip;
        self
    }

    /// Attributes dispatched actions to a user, for interactive
    /// single-point evaluation.
    pub fn acting_user(mut self, user: impl Into<String>) -> Self {
        self.acting_user = Some(user.into());
        self
    }

    /// Derived points buffered so far, waiting for [`Self::flush_derived`].
    pub fn pending_derived(&self) -> &[DataPoint] {
        &self.derived
    }

    /// Whether `transition` applies given the stream's current state.
    ///
    /// A bound source requires the current state to match it. A wildcard
    /// source matches anything except the destination itself, which
    /// keeps an unchanged stream from re-firing its entry actions on
    /// every point.
    fn transition_should_execute(
        src: Option<&StateSnapshot>,
        dst: &StateSnapshot,
        current: Option<&str>,
        transition: &TransitionSnapshot,
        point: &DataPoint,
    ) -> bool {
        match (src, current) {
            (Some(src), Some(current)) if src.slug != current => return false,
            (None, Some(current)) if current == dst.slug => return false,
            _ => {}
        }
        transition_guard(transition, point)
    }

    /// Runs one data point through its filter. Returns `true` when a
    /// transition was realized.
    pub fn process_point(
        &mut self,
        point: &DataPoint,
        cached: &CachedFilter,
        units: Option<&StreamUnits>,
    ) -> bool {
        let Some(filter) = cached.snapshot() else {
            return false;
        };
        if !filter.active {
            tracing::debug!(filter = %filter.slug, "Filter is inactive, skipping");
            return false;
        }

        for transition in &filter.transitions {
            let Some(dst) = filter.state_by_id(transition.dst) else {
                tracing::warn!(
                    filter = %filter.slug,
                    transition = transition.id,
                    "Transition destination missing from snapshot"
                );
                continue;
            };
            let src = transition.src.and_then(|id| filter.state_by_id(id));
            let current = self.cache.get_current_state(&point.stream_slug);

            if !Self::transition_should_execute(src, dst, current.as_deref(), transition, point) {
                continue;
            }

            let src_label = src
                .map(|s| s.label.clone())
                .or(current)
                .unwrap_or_else(|| WILDCARD_SRC.to_string());
            tracing::info!(
                stream = %point.stream_slug,
                src = %src_label,
                dst = %dst.slug,
                "Transition"
            );

            if !self.skip_logs {
                let entry = TransitionLogEntry {
                    id: id::next_id(),
                    target_slug: point.stream_slug.clone(),
                    timestamp: point.timestamp,
                    src: src_label,
                    dst: dst.label.clone(),
                    triggers: transition.triggers.clone(),
                };
                if let Err(e) = self.log.append(entry) {
                    tracing::error!(error = %e, "Error creating filter log");
                }
            }

            if let Some(src) = src {
                self.run_actions(filter, transition, src, point, ActionOn::Exit, units);
            }
            self.run_actions(filter, transition, dst, point, ActionOn::Entry, units);

            self.cache.set_current_state(&point.stream_slug, &dst.slug);
            // At most one transition per point.
            return true;
        }
        false
    }

    fn run_actions(
        &mut self,
        filter: &FilterSnapshot,
        transition: &TransitionSnapshot,
        state: &StateSnapshot,
        point: &DataPoint,
        on: ActionOn,
        units: Option<&StreamUnits>,
    ) {
        for action in state.actions_on(on) {
            tracing::info!(on = %on, action = action.id, "Processing filter action");
            let ctx = ActionContext {
                filter,
                state,
                transition,
                action,
                on,
                point,
                units,
                user: self.acting_user.as_deref(),
            };
            let result = self.registry.dispatch(&ctx);
            if result.handled {
                tracing::info!(on = %on, action = action.id, "Filter action executed");
            }
            if let Some(derived) = result.derived {
                self.derived.push(derived);
            }
        }
    }

    /// Bulk-writes the buffered derived points and clears the buffer.
    /// Failures are logged; the buffer is dropped either way so a bad
    /// sink cannot grow it without bound.
    pub fn flush_derived(&mut self) {
        if self.derived.is_empty() {
            return;
        }
        tracing::info!(count = self.derived.len(), "Creating derived data");
        if let Err(e) = self.sink.bulk_create(&self.derived) {
            tracing::error!(error = %e, "Derived data bulk-create failed");
        }
        self.derived.clear();
    }

    /// Processes a whole report batch.
    ///
    /// Resolves each distinct stream's filter once up front, drops
    /// streams whose resolution is the empty sentinel, then runs every
    /// point in order and flushes the derived data once at the end.
    /// `units` maps stream slugs to their display-unit configuration.
    pub fn process_batch(
        &mut self,
        points: &[DataPoint],
        source: &dyn SnapshotSource,
        units: &HashMap<String, StreamUnits>,
    ) {
        let mut filters: HashMap<String, CachedFilter> = HashMap::new();
        for point in points {
            if filters.contains_key(&point.stream_slug) {
                continue;
            }
            let resolved = self.cache.resolve(&point.stream_slug, source);
            if resolved.is_empty() {
                continue;
            }
            let initial = self.cache.get_current_state(&point.stream_slug);
            tracing::debug!(stream = %point.stream_slug, state = ?initial, "Initial filter state");
            filters.insert(point.stream_slug.clone(), resolved);
        }
        if filters.is_empty() {
            return;
        }
        tracing::info!(count = filters.len(), "Filters found, starting filter process");

        for point in points {
            if let Some(cached) = filters.get(&point.stream_slug) {
                self.process_point(point, cached, units.get(&point.stream_slug));
            }
        }

        self.flush_derived();
    }
}
