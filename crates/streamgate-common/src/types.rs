use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminates numeric telemetry points from event points, which carry
/// no threshold-comparable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    Numeric,
    Event,
}

/// One already-parsed telemetry point as handed to the processing engine
/// by report ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPoint {
    pub stream_slug: String,
    pub device_slug: String,
    pub project_slug: String,
    pub timestamp: DateTime<Utc>,
    /// Sequence id assigned by the device-side streamer.
    pub streamer_local_id: Option<u64>,
    /// Device-clock timestamp (seconds since device boot).
    pub device_timestamp: Option<i64>,
    pub value: Option<f64>,
    pub int_value: Option<i64>,
    pub kind: PointKind,
}

impl DataPoint {
    pub fn is_numeric(&self) -> bool {
        self.kind == PointKind::Numeric
    }
}

/// Comparison operator of a single trigger.
///
/// Unrecognized operator codes deserialize to [`TriggerOp::Unknown`], which
/// always evaluates false — a malformed cached snapshot must never panic
/// the ingestion path.
///
/// # Examples
///
/// ```
/// use streamgate_common::types::TriggerOp;
///
/// let op: TriggerOp = "ge".parse().unwrap();
/// assert_eq!(op, TriggerOp::Ge);
/// assert_eq!(op.to_string(), "ge");
/// assert_eq!(op.display(), "Greater or equal than (>=)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerOp {
    #[serde(rename = "bu")]
    Buffer,
    #[serde(rename = "eq")]
    Eq,
    #[serde(rename = "ne")]
    Ne,
    #[serde(rename = "le")]
    Le,
    #[serde(rename = "ge")]
    Ge,
    #[serde(rename = "lt")]
    Lt,
    #[serde(rename = "gt")]
    Gt,
    #[serde(other)]
    Unknown,
}

impl TriggerOp {
    /// Human-readable operator label, serialized into snapshots as
    /// `operator_display` for message templating.
    pub fn display(&self) -> &'static str {
        match self {
            TriggerOp::Buffer => "Buffer (no-op)",
            TriggerOp::Eq => "Equal (==)",
            TriggerOp::Ne => "Not Equal (!=)",
            TriggerOp::Le => "Less or equal than (<=)",
            TriggerOp::Ge => "Greater or equal than (>=)",
            TriggerOp::Lt => "Less than (<)",
            TriggerOp::Gt => "Greater than (>)",
            TriggerOp::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for TriggerOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            TriggerOp::Buffer => "bu",
            TriggerOp::Eq => "eq",
            TriggerOp::Ne => "ne",
            TriggerOp::Le => "le",
            TriggerOp::Ge => "ge",
            TriggerOp::Lt => "lt",
            TriggerOp::Gt => "gt",
            TriggerOp::Unknown => "??",
        };
        write!(f, "{code}")
    }
}

impl std::str::FromStr for TriggerOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bu" => Ok(TriggerOp::Buffer),
            "eq" => Ok(TriggerOp::Eq),
            "ne" => Ok(TriggerOp::Ne),
            "le" => Ok(TriggerOp::Le),
            "ge" => Ok(TriggerOp::Ge),
            "lt" => Ok(TriggerOp::Lt),
            "gt" => Ok(TriggerOp::Gt),
            _ => Err(format!("unknown trigger operator: {s}")),
        }
    }
}

/// Closed set of action types. Adding a handler means adding a variant
/// here and registering it in the action registry at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    #[serde(rename = "eml")]
    Email,
    #[serde(rename = "sms")]
    Sms,
    #[serde(rename = "slk")]
    Slack,
    #[serde(rename = "cus")]
    Custom,
    #[serde(rename = "drv")]
    Derive,
    #[serde(rename = "rpt")]
    Report,
    #[serde(rename = "smry")]
    Summary,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            ActionType::Email => "eml",
            ActionType::Sms => "sms",
            ActionType::Slack => "slk",
            ActionType::Custom => "cus",
            ActionType::Derive => "drv",
            ActionType::Report => "rpt",
            ActionType::Summary => "smry",
        };
        write!(f, "{code}")
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eml" => Ok(ActionType::Email),
            "sms" => Ok(ActionType::Sms),
            "slk" => Ok(ActionType::Slack),
            "cus" => Ok(ActionType::Custom),
            "drv" => Ok(ActionType::Derive),
            "rpt" => Ok(ActionType::Report),
            "smry" => Ok(ActionType::Summary),
            _ => Err(format!("unknown action type: {s}")),
        }
    }
}

/// Whether an action fires when its state is entered or exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOn {
    Entry,
    Exit,
}

impl std::fmt::Display for ActionOn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionOn::Entry => write!(f, "entry"),
            ActionOn::Exit => write!(f, "exit"),
        }
    }
}

// ---- Cached snapshot read-model ----
//
// The JSON shape of these structs is a contract: it is what gets cached
// and what action handlers receive, so renaming a field is a breaking
// change for any snapshot already sitting in the cache.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSnapshot {
    pub id: i64,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub on: ActionOn,
    pub extra_payload: Option<serde_json::Value>,
    /// Owning state id.
    pub state: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub id: i64,
    pub label: String,
    pub slug: String,
    pub actions: Vec<ActionSnapshot>,
}

impl StateSnapshot {
    pub fn actions_on(&self, on: ActionOn) -> impl Iterator<Item = &ActionSnapshot> {
        self.actions.iter().filter(move |a| a.on == on)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSnapshot {
    pub id: i64,
    pub operator: TriggerOp,
    pub operator_display: String,
    /// Threshold in the stream's raw internal unit. Absent for buffer
    /// triggers.
    pub threshold: Option<f64>,
    /// Threshold as entered by the user, in their chosen output unit.
    pub user_threshold: Option<f64>,
    pub user_output_unit: Option<String>,
    pub user_unit_full: Option<String>,
    /// Owning transition id.
    pub transition: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSnapshot {
    pub id: i64,
    /// Source state id; `None` is the wildcard source.
    pub src: Option<i64>,
    pub dst: i64,
    pub triggers: Vec<TriggerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSnapshot {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub input_stream: Option<String>,
    pub project: String,
    pub variable: String,
    pub device: Option<String>,
    pub active: bool,
    pub states: Vec<StateSnapshot>,
    pub transitions: Vec<TransitionSnapshot>,
}

impl FilterSnapshot {
    pub fn state_by_id(&self, id: i64) -> Option<&StateSnapshot> {
        self.states.iter().find(|s| s.id == id)
    }
}

/// A cache entry for one stream: either a resolved filter snapshot or the
/// `{"empty": true}` sentinel recording that no filter applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CachedFilter {
    Snapshot(FilterSnapshot),
    Empty { empty: bool },
}

impl CachedFilter {
    pub fn empty() -> Self {
        CachedFilter::Empty { empty: true }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CachedFilter::Empty { .. })
    }

    pub fn snapshot(&self) -> Option<&FilterSnapshot> {
        match self {
            CachedFilter::Snapshot(s) => Some(s),
            CachedFilter::Empty { .. } => None,
        }
    }
}
