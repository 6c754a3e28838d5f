use std::sync::{Arc, Mutex};

use crate::recipients::RecipientToken;
use crate::{ActionContext, ActionHandler, ActionResult, Result};

/// Background work requested by an action. Generation itself runs in a
/// worker outside the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledJob {
    /// Full analytics report for one device.
    DeviceReport { device_slug: String },
    /// Summary generated by a named generator and mailed out.
    Summary {
        generator: String,
        recipients: Vec<RecipientToken>,
    },
}

pub trait JobScheduler: Send + Sync {
    fn schedule(&self, job: ScheduledJob) -> anyhow::Result<()>;
}

/// Recording [`JobScheduler`] for tests.
#[derive(Default)]
pub struct MemoryJobScheduler {
    jobs: Mutex<Vec<ScheduledJob>>,
}

impl MemoryJobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl JobScheduler for MemoryJobScheduler {
    fn schedule(&self, job: ScheduledJob) -> anyhow::Result<()> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

/// Schedules a device report for the device that fired the transition.
/// Takes no extra configuration.
pub struct ReportHandler {
    scheduler: Arc<dyn JobScheduler>,
}

impl ReportHandler {
    pub fn new(scheduler: Arc<dyn JobScheduler>) -> Self {
        Self { scheduler }
    }
}

impl ActionHandler for ReportHandler {
    fn name(&self) -> &'static str {
        "report"
    }

    fn process(&self, ctx: &ActionContext<'_>) -> Result<ActionResult> {
        let job = ScheduledJob::DeviceReport {
            device_slug: ctx.point.device_slug.clone(),
        };
        self.scheduler.schedule(job)?;
        tracing::info!(device = %ctx.point.device_slug, "Scheduled device report");
        Ok(ActionResult::handled())
    }
}
