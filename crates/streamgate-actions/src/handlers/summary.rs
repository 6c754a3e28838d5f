use std::sync::Arc;

use serde::Deserialize;

use crate::handlers::report::{JobScheduler, ScheduledJob};
use crate::recipients::normalize;
use crate::{ActionContext, ActionHandler, ActionResult, Result};

#[derive(Debug, Deserialize)]
pub struct SummaryConfig {
    /// Token list, same shapes as the email action accepts.
    pub notification_recipients: serde_json::Value,
    /// Name of the summary generator to run.
    pub generator: String,
}

pub struct SummaryHandler {
    scheduler: Arc<dyn JobScheduler>,
}

impl SummaryHandler {
    pub fn new(scheduler: Arc<dyn JobScheduler>) -> Self {
        Self { scheduler }
    }
}

impl ActionHandler for SummaryHandler {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn process(&self, ctx: &ActionContext<'_>) -> Result<ActionResult> {
        let config: SummaryConfig = ctx.config()?;
        let recipients = normalize(&config.notification_recipients);
        if recipients.is_empty() {
            tracing::warn!(
                filter = %ctx.filter.slug,
                action = ctx.action.id,
                "Summary action resolved no recipients"
            );
            return Ok(ActionResult::unhandled());
        }
        self.scheduler.schedule(ScheduledJob::Summary {
            generator: config.generator.clone(),
            recipients,
        })?;
        tracing::info!(generator = %config.generator, "Scheduled summary generation");
        Ok(ActionResult::handled())
    }
}
