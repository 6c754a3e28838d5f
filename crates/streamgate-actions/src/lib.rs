//! Action dispatch for filter state transitions.
//!
//! When a transition is realized the engine fires the exit actions of
//! the source state and the entry actions of the destination state. Each
//! action type maps to one [`ActionHandler`] registered in the
//! [`registry::ActionRegistry`]; handlers validate their `extra_payload`
//! into a typed config, build the notification or derived point, and
//! hand network sends to the async delivery workers via the outbox.

pub mod delivery;
pub mod error;
pub mod handlers;
pub mod outbox;
pub mod recipients;
pub mod registry;
pub mod template;

#[cfg(test)]
mod tests;

use serde::de::DeserializeOwned;
use streamgate_common::mdo::StreamUnits;
use streamgate_common::types::{
    ActionOn, ActionSnapshot, DataPoint, FilterSnapshot, StateSnapshot, TransitionSnapshot,
};

pub use error::{ActionError, Result};
pub use outbox::{Outbox, OutboundMessage};
pub use registry::ActionRegistry;

/// Everything a handler may need about the transition being realized.
pub struct ActionContext<'a> {
    pub filter: &'a FilterSnapshot,
    /// The state this action belongs to: the source state for exit
    /// actions, the destination for entry actions.
    pub state: &'a StateSnapshot,
    pub transition: &'a TransitionSnapshot,
    pub action: &'a ActionSnapshot,
    pub on: ActionOn,
    /// The data point that fired the transition.
    pub point: &'a DataPoint,
    /// Display-unit configuration of the input stream, when known.
    pub units: Option<&'a StreamUnits>,
    /// The user the processing runs on behalf of, when one is known
    /// (interactive single-point evaluation rather than report ingestion).
    pub user: Option<&'a str>,
}

impl ActionContext<'_> {
    /// Deserializes the action's `extra_payload` into the handler's
    /// config struct.
    pub fn config<T: DeserializeOwned>(&self) -> Result<T> {
        let payload = self
            .action
            .extra_payload
            .clone()
            .ok_or(ActionError::MissingExtraPayload)?;
        Ok(serde_json::from_value(payload)?)
    }
}

/// Outcome of one action dispatch.
#[derive(Debug, Clone, Default)]
pub struct ActionResult {
    /// Whether the handler did its work. Failures are logged, never
    /// propagated into the processing loop.
    pub handled: bool,
    /// A derived data point for the engine to buffer, if the action
    /// produces one.
    pub derived: Option<DataPoint>,
}

impl ActionResult {
    pub fn handled() -> Self {
        Self {
            handled: true,
            derived: None,
        }
    }

    pub fn unhandled() -> Self {
        Self::default()
    }

    pub fn with_derived(point: DataPoint) -> Self {
        Self {
            handled: true,
            derived: Some(point),
        }
    }
}

/// One action type's implementation.
pub trait ActionHandler: Send + Sync {
    /// Handler name for logs (e.g. `"email"`, `"derive"`).
    fn name(&self) -> &'static str;

    /// Executes the action.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed configuration or a rejected
    /// enqueue; the registry converts either into an unhandled result.
    fn process(&self, ctx: &ActionContext<'_>) -> Result<ActionResult>;
}

/// Deployment environment, gating side effects that must not fire from
/// development setups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Staging,
    Development,
}

impl Environment {
    /// True when outbound Slack posts (and similar externally visible
    /// side effects) should really happen.
    pub fn is_live(&self) -> bool {
        matches!(self, Environment::Production | Environment::Staging)
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "prod" | "production" => Ok(Environment::Production),
            "stage" | "staging" => Ok(Environment::Staging),
            "dev" | "development" => Ok(Environment::Development),
            _ => Err(format!("unknown environment: {s}")),
        }
    }
}
