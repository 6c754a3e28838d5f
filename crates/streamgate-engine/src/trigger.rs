//! Trigger and guard evaluation.

use streamgate_common::types::{DataPoint, TriggerOp, TransitionSnapshot};

/// Evaluates one trigger against a numeric value.
///
/// Buffer triggers always pass; unknown operators and missing
/// thresholds always fail.
///
/// # Examples
///
/// ```
/// use streamgate_engine::trigger::evaluate;
/// use streamgate_common::types::TriggerOp;
///
/// assert!(evaluate(TriggerOp::Ge, Some(10.0), 10.0));
/// assert!(!evaluate(TriggerOp::Gt, Some(10.0), 10.0));
/// assert!(evaluate(TriggerOp::Buffer, None, 10.0));
/// ```
pub fn evaluate(op: TriggerOp, threshold: Option<f64>, value: f64) -> bool {
    if op == TriggerOp::Buffer {
        return true;
    }
    let Some(threshold) = threshold else {
        return false;
    };
    match op {
        TriggerOp::Eq => value == threshold,
        TriggerOp::Ne => value != threshold,
        TriggerOp::Le => value <= threshold,
        TriggerOp::Ge => value >= threshold,
        TriggerOp::Lt => value < threshold,
        TriggerOp::Gt => value > threshold,
        TriggerOp::Buffer | TriggerOp::Unknown => false,
    }
}

/// Whether a transition's guard passes for a data point.
///
/// All triggers must pass (a transition with no triggers passes
/// trivially). Event points carry nothing to compare, so the guard
/// passes for them; a numeric point without a value fails.
pub fn transition_guard(transition: &TransitionSnapshot, point: &DataPoint) -> bool {
    if !point.is_numeric() {
        return true;
    }
    let Some(value) = point.value else {
        return false;
    };
    transition
        .triggers
        .iter()
        .all(|t| evaluate(t.operator, t.threshold, value))
}
