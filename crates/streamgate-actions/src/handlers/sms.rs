use serde::Deserialize;
use streamgate_common::id;

use crate::handlers::base_vars;
use crate::outbox::{Outbox, OutboundMessage};
use crate::template::render_or_error;
use crate::{ActionContext, ActionHandler, ActionResult, Result};

#[derive(Debug, Deserialize)]
pub struct SmsConfig {
    /// Destination number, E.164.
    pub number: String,
    /// Body template; SMS has no default body.
    pub body: String,
}

pub struct SmsHandler {
    outbox: Outbox,
}

impl SmsHandler {
    pub fn new(outbox: Outbox) -> Self {
        Self { outbox }
    }
}

impl ActionHandler for SmsHandler {
    fn name(&self) -> &'static str {
        "sms"
    }

    fn process(&self, ctx: &ActionContext<'_>) -> Result<ActionResult> {
        let config: SmsConfig = ctx.config()?;
        let vars = base_vars(ctx, "into", "out of");
        let body = render_or_error(&config.body, &vars);

        self.outbox.enqueue(OutboundMessage::Sms {
            id: id::next_id(),
            number: config.number,
            body,
        })?;
        Ok(ActionResult::handled())
    }
}
