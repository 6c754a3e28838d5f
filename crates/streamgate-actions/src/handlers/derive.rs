use serde::Deserialize;
use streamgate_common::slug::SlugParts;
use streamgate_common::types::DataPoint;

use crate::{ActionContext, ActionHandler, ActionResult, Result};

#[derive(Debug, Deserialize)]
pub struct DeriveConfig {
    /// Stream slug the derived point is written to.
    pub output_stream: String,
    /// Overrides the carried-forward streamer id when set.
    #[serde(default)]
    pub local_id: Option<u64>,
}

/// Copies the triggering point onto a derived stream. The engine
/// buffers the returned points and bulk-writes them once per batch.
pub struct DeriveHandler;

impl DeriveHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DeriveHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionHandler for DeriveHandler {
    fn name(&self) -> &'static str {
        "derive"
    }

    fn process(&self, ctx: &ActionContext<'_>) -> Result<ActionResult> {
        let config: DeriveConfig = ctx.config()?;

        // Device and project follow the output slug when it parses;
        // otherwise the derived point inherits them from the input.
        let (device_slug, project_slug) = match SlugParts::parse(&config.output_stream) {
            Some(parts) => (
                format!("d--{}", parts.device),
                format!("p--{}", parts.project),
            ),
            None => (
                ctx.point.device_slug.clone(),
                ctx.point.project_slug.clone(),
            ),
        };

        let derived = DataPoint {
            stream_slug: config.output_stream,
            device_slug,
            project_slug,
            timestamp: ctx.point.timestamp,
            streamer_local_id: config.local_id.or(ctx.point.streamer_local_id),
            device_timestamp: ctx.point.device_timestamp,
            value: ctx.point.value,
            int_value: ctx.point.int_value,
            kind: ctx.point.kind,
        };
        Ok(ActionResult::with_derived(derived))
    }
}
