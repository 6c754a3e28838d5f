use std::sync::Arc;

use serde::Deserialize;
use streamgate_common::id;

use crate::handlers::base_vars;
use crate::outbox::{Outbox, OutboundMessage};
use crate::recipients::{normalize, MemberDirectory};
use crate::template::render_or_error;
use crate::{ActionContext, ActionHandler, ActionResult, Result};

const SUBJECT: &str = "Stream Filter Notification";

#[derive(Debug, Deserialize)]
pub struct EmailConfig {
    /// Token list, or the legacy dict shape (possibly as a JSON string).
    pub notification_recipient: serde_json::Value,
    /// Custom body template; the default notification is used when
    /// absent.
    #[serde(default)]
    pub body: Option<String>,
    /// Extra text appended to the default notification.
    #[serde(default)]
    pub custom_note: Option<String>,
}

pub struct EmailHandler {
    outbox: Outbox,
    directory: Arc<dyn MemberDirectory>,
}

impl EmailHandler {
    pub fn new(outbox: Outbox, directory: Arc<dyn MemberDirectory>) -> Self {
        Self { outbox, directory }
    }
}

impl ActionHandler for EmailHandler {
    fn name(&self) -> &'static str {
        "email"
    }

    fn process(&self, ctx: &ActionContext<'_>) -> Result<ActionResult> {
        let config: EmailConfig = ctx.config()?;
        let tokens = normalize(&config.notification_recipient);
        let recipients = self.directory.emails_for(&tokens, &ctx.filter.project);
        if recipients.is_empty() {
            tracing::warn!(
                filter = %ctx.filter.slug,
                action = ctx.action.id,
                "Email action resolved no recipients"
            );
            return Ok(ActionResult::unhandled());
        }

        let vars = base_vars(ctx, "into", "from");
        let body = match &config.body {
            Some(template) => render_or_error(template, &vars),
            None => {
                let note = match &config.custom_note {
                    Some(note) if !note.is_empty() => format!("\n{note}\n"),
                    _ => String::new(),
                };
                render_or_error(
                    "Stream Filter \"{label}\" has transitioned {on} state \"{state}\".\n\
                     \n\
                     - Stream: {stream}\n\
                     - Device: {device}\n\
                     - Project: {project}\n\
                     \n\
                     Value {value} @ {ts}\n",
                    &vars,
                ) + &note
            }
        };

        self.outbox.enqueue(OutboundMessage::Email {
            id: id::next_id(),
            recipients,
            subject: SUBJECT.to_string(),
            body,
        })?;
        Ok(ActionResult::handled())
    }
}
