use serde::Deserialize;
use streamgate_common::id;

use crate::handlers::base_vars;
use crate::outbox::{Outbox, OutboundMessage};
use crate::template::render_or_error;
use crate::{ActionContext, ActionHandler, ActionResult, Environment, Result};

const DEFAULT_BODY: &str = "Stream Filter Notification:\n\
    \n\
    *Stream Filter {label} has transitioned {on} state {state}*:\n\
    \n\
    - Device: {device}\n\
    - Stream: {stream}\n\
    - Project: {project}\n\
    \n\
    Event triggered at {ts} because a data point of value {value} is {trigger}";

#[derive(Debug, Deserialize)]
pub struct SlackConfig {
    /// Incoming-webhook URL of the target channel.
    pub slack_webhook: String,
    /// Custom body template; an empty note selects the default body.
    pub custom_note: String,
}

pub struct SlackHandler {
    outbox: Outbox,
    environment: Environment,
}

impl SlackHandler {
    pub fn new(outbox: Outbox, environment: Environment) -> Self {
        Self {
            outbox,
            environment,
        }
    }

    /// Human description of the guards that fired, e.g.
    /// `"Greater or equal than (>=) 70 Fahrenheit"`.
    fn trigger_text(ctx: &ActionContext<'_>) -> String {
        let parts: Vec<String> = ctx
            .transition
            .triggers
            .iter()
            .map(|t| {
                let threshold = t
                    .user_threshold
                    .or(t.threshold)
                    .map(|v| format!("{v}"))
                    .unwrap_or_default();
                let unit = t.user_unit_full.as_deref().unwrap_or("");
                format!("{} {} {}", t.operator_display, threshold, unit)
                    .trim_end()
                    .to_string()
            })
            .collect();
        parts.join(", ")
    }
}

impl ActionHandler for SlackHandler {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn process(&self, ctx: &ActionContext<'_>) -> Result<ActionResult> {
        let config: SlackConfig = ctx.config()?;
        let vars = base_vars(ctx, "into", "out of").set("trigger", Self::trigger_text(ctx));
        let template = if config.custom_note.is_empty() {
            DEFAULT_BODY
        } else {
            config.custom_note.as_str()
        };
        let text = render_or_error(template, &vars);

        // Development setups must never post into real channels.
        if !self.environment.is_live() {
            tracing::info!(filter = %ctx.filter.slug, text = %text, "Slack notification (not sent)");
            return Ok(ActionResult::handled());
        }

        self.outbox.enqueue(OutboundMessage::Slack {
            id: id::next_id(),
            webhook_url: config.slack_webhook,
            text,
        })?;
        Ok(ActionResult::handled())
    }
}
