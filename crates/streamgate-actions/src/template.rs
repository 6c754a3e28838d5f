//! Message templating with a fixed substitution vocabulary.
//!
//! Operators write bodies like `"{label} has transitioned {on} {state}.
//! New value is {value} @ {ts}"`. Only the placeholders the dispatcher
//! provides are legal; anything else renders the standard error message
//! instead of a broken notification.

use chrono::{DateTime, Utc};
use streamgate_common::mdo::StreamUnits;

/// Placeholder values for one render. Keys are the fixed vocabulary
/// (`label`, `state`, `on`, `stream`, `device`, `project`, `ts`,
/// `value`, plus the Slack extras).
#[derive(Debug, Default, Clone)]
pub struct TemplateVars {
    vars: Vec<(&'static str, String)>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.vars.push((key, value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Substitutes `{key}` placeholders. Fails with the offending key when
/// the template references one the vocabulary does not provide.
///
/// # Examples
///
/// ```
/// use streamgate_actions::template::{render, TemplateVars};
///
/// let vars = TemplateVars::new().set("state", "too-hot").set("value", "71.00 C");
/// assert_eq!(
///     render("now {state} at {value}", &vars).unwrap(),
///     "now too-hot at 71.00 C"
/// );
/// assert_eq!(render("{nope}", &vars).unwrap_err(), "nope");
/// ```
pub fn render(template: &str, vars: &TemplateVars) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }
        let mut key = String::new();
        let mut closed = false;
        for k in chars.by_ref() {
            if k == '}' {
                closed = true;
                break;
            }
            key.push(k);
        }
        if !closed {
            return Err(key);
        }
        match vars.get(&key) {
            Some(value) => out.push_str(value),
            None => return Err(key),
        }
    }
    Ok(out)
}

/// Renders a custom body, substituting the standard error message when
/// the template is malformed. The error message itself only needs `ts`
/// and `label`, which every dispatch context carries.
pub fn render_or_error(template: &str, vars: &TemplateVars) -> String {
    match render(template, vars) {
        Ok(text) => text,
        Err(key) => {
            tracing::warn!(placeholder = %key, "Unknown placeholder in action body");
            format!(
                "{}: Stream Filter \"{}\" Error: unknown placeholder '{{{}}}'",
                vars.get("ts").unwrap_or(""),
                vars.get("label").unwrap_or(""),
                key
            )
        }
    }
}

/// Formats a data value for humans: converted through the stream's MDO
/// and tagged with the short unit name when units are configured, the
/// raw value to two decimals otherwise. Event points render empty.
pub fn format_value(value: Option<f64>, units: Option<&StreamUnits>) -> String {
    match (value, units) {
        (Some(v), Some(u)) => format!("{:.2} {}", u.mdo.compute(v), u.unit.unit_short),
        (Some(v), None) => format!("{v:.2}"),
        (None, _) => String::new(),
    }
}

/// Timestamp format used in every notification body.
pub fn formatted_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamgate_common::mdo::{Mdo, OutputUnit};

    fn vars() -> TemplateVars {
        TemplateVars::new()
            .set("label", "Water watch")
            .set("state", "Too Hot")
            .set("ts", "2026-08-01 10:00:00 UTC")
    }

    #[test]
    fn render_substitutes_all_placeholders() {
        let text = render("{label} is {state}", &vars()).unwrap();
        assert_eq!(text, "Water watch is Too Hot");
    }

    #[test]
    fn unknown_placeholder_falls_back_to_error_body() {
        let text = render_or_error("{label} {bogus}", &vars());
        assert_eq!(
            text,
            "2026-08-01 10:00:00 UTC: Stream Filter \"Water watch\" Error: unknown placeholder '{bogus}'"
        );
    }

    #[test]
    fn unterminated_placeholder_also_falls_back() {
        let text = render_or_error("{label", &vars());
        assert!(text.contains("Error"));
    }

    #[test]
    fn format_value_applies_units() {
        let units = StreamUnits {
            mdo: Mdo::new(1.0, 2.0, 0.0),
            unit: OutputUnit {
                unit_short: "C".to_string(),
                unit_full: "Celsius".to_string(),
            },
        };
        assert_eq!(format_value(Some(142.0), Some(&units)), "71.00 C");
        assert_eq!(format_value(Some(71.0), None), "71.00");
        assert_eq!(format_value(None, Some(&units)), "");
    }
}
