use std::collections::HashMap;
use std::sync::Arc;

use streamgate_common::types::ActionType;
use tokio::sync::mpsc;

use crate::handlers::custom::{MemoryTopicPublisher, TopicPublisher};
use crate::handlers::report::{JobScheduler, MemoryJobScheduler};
use crate::handlers::{
    custom::CustomHandler, derive::DeriveHandler, email::EmailHandler, report::ReportHandler,
    slack::SlackHandler, sms::SmsHandler, summary::SummaryHandler,
};
use crate::outbox::{Outbox, OutboundMessage};
use crate::recipients::{MemberDirectory, MemoryDirectory};
use crate::{ActionContext, ActionHandler, ActionResult, Environment};

/// The ports and shared handles the built-in handlers need.
pub struct HandlerDeps {
    pub outbox: Outbox,
    pub directory: Arc<dyn MemberDirectory>,
    pub publisher: Arc<dyn TopicPublisher>,
    pub scheduler: Arc<dyn JobScheduler>,
    pub environment: Environment,
}

impl HandlerDeps {
    /// All-in-memory dependencies for tests and local runs. Returns the
    /// outbox receiver so the caller can inspect queued messages.
    pub fn in_memory() -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (outbox, rx) = Outbox::channel(64);
        (
            Self {
                outbox,
                directory: Arc::new(MemoryDirectory::new()),
                publisher: Arc::new(MemoryTopicPublisher::new()),
                scheduler: Arc::new(MemoryJobScheduler::new()),
                environment: Environment::Development,
            },
            rx,
        )
    }
}

/// Maps each [`ActionType`] to its handler. The mapping is fixed at
/// construction; adding an action type means adding a variant and a
/// handler, not a runtime lookup.
///
/// # Examples
///
/// ```
/// use streamgate_actions::registry::{ActionRegistry, HandlerDeps};
/// use streamgate_common::types::ActionType;
///
/// let (deps, _rx) = HandlerDeps::in_memory();
/// let registry = ActionRegistry::with_defaults(deps);
/// assert!(registry.has_handler(ActionType::Email));
/// assert!(registry.has_handler(ActionType::Derive));
/// ```
pub struct ActionRegistry {
    handlers: HashMap<ActionType, Box<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with every built-in handler wired to `deps`.
    pub fn with_defaults(deps: HandlerDeps) -> Self {
        let mut registry = Self::new();
        registry.register(
            ActionType::Email,
            Box::new(EmailHandler::new(deps.outbox.clone(), deps.directory.clone())),
        );
        registry.register(ActionType::Sms, Box::new(SmsHandler::new(deps.outbox.clone())));
        registry.register(
            ActionType::Slack,
            Box::new(SlackHandler::new(deps.outbox.clone(), deps.environment)),
        );
        registry.register(
            ActionType::Custom,
            Box::new(CustomHandler::new(deps.publisher.clone())),
        );
        registry.register(ActionType::Derive, Box::new(DeriveHandler::new()));
        registry.register(
            ActionType::Report,
            Box::new(ReportHandler::new(deps.scheduler.clone())),
        );
        registry.register(
            ActionType::Summary,
            Box::new(SummaryHandler::new(deps.scheduler.clone())),
        );
        registry
    }

    pub fn register(&mut self, action_type: ActionType, handler: Box<dyn ActionHandler>) {
        self.handlers.insert(action_type, handler);
    }

    pub fn has_handler(&self, action_type: ActionType) -> bool {
        self.handlers.contains_key(&action_type)
    }

    /// Runs the handler for the context's action type. Handler errors
    /// and unknown types are logged and reported as unhandled; one bad
    /// action never stops the processing loop.
    pub fn dispatch(&self, ctx: &ActionContext<'_>) -> ActionResult {
        let Some(handler) = self.handlers.get(&ctx.action.action_type) else {
            tracing::error!(
                action_type = %ctx.action.action_type,
                filter = %ctx.filter.slug,
                "No handler registered for action type"
            );
            return ActionResult::unhandled();
        };
        match handler.process(ctx) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    handler = handler.name(),
                    filter = %ctx.filter.slug,
                    action = ctx.action.id,
                    error = %e,
                    "Error occurs when executing action"
                );
                ActionResult::unhandled()
            }
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
