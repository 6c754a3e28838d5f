use std::sync::{Arc, Mutex};

use serde::Deserialize;

use crate::template::formatted_ts;
use crate::{ActionContext, ActionHandler, ActionResult, Result};

/// Publishes transition events to a message topic for external
/// consumers. The broker itself lives outside the engine.
pub trait TopicPublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &serde_json::Value) -> anyhow::Result<()>;
}

/// Recording [`TopicPublisher`] for tests.
#[derive(Default)]
pub struct MemoryTopicPublisher {
    published: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MemoryTopicPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published.lock().unwrap().clone()
    }
}

impl TopicPublisher for MemoryTopicPublisher {
    fn publish(&self, topic: &str, payload: &serde_json::Value) -> anyhow::Result<()> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.clone()));
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CustomConfig {
    /// Topic the transition event is published on.
    pub topic: String,
}

pub struct CustomHandler {
    publisher: Arc<dyn TopicPublisher>,
}

impl CustomHandler {
    pub fn new(publisher: Arc<dyn TopicPublisher>) -> Self {
        Self { publisher }
    }
}

impl ActionHandler for CustomHandler {
    fn name(&self) -> &'static str {
        "custom"
    }

    fn process(&self, ctx: &ActionContext<'_>) -> Result<ActionResult> {
        let config: CustomConfig = ctx.config()?;
        let payload = serde_json::json!({
            "filter": ctx.filter.slug,
            "state": ctx.state.slug,
            "on": ctx.on.to_string(),
            "stream": ctx.point.stream_slug,
            "device": ctx.point.device_slug,
            "project": ctx.point.project_slug,
            "timestamp": formatted_ts(ctx.point.timestamp),
            "value": ctx.point.value,
        });
        self.publisher.publish(&config.topic, &payload)?;
        tracing::info!(topic = %config.topic, filter = %ctx.filter.slug, "Published transition event");
        Ok(ActionResult::handled())
    }
}
