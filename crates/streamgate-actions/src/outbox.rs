//! Outbound message queue.
//!
//! Action handlers run inside the synchronous per-point loop and must
//! never block on transport I/O. They enqueue an [`OutboundMessage`]
//! here; the async delivery workers drain the channel.

use tokio::sync::mpsc;

use crate::error::{ActionError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Email {
        id: String,
        recipients: Vec<String>,
        subject: String,
        body: String,
    },
    Sms {
        id: String,
        number: String,
        body: String,
    },
    Slack {
        id: String,
        webhook_url: String,
        text: String,
    },
}

impl OutboundMessage {
    pub fn id(&self) -> &str {
        match self {
            OutboundMessage::Email { id, .. } => id,
            OutboundMessage::Sms { id, .. } => id,
            OutboundMessage::Slack { id, .. } => id,
        }
    }
}

/// Cloneable sending half handed to the action handlers.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::Sender<OutboundMessage>,
}

impl Outbox {
    /// Creates the queue. The receiver goes to a delivery worker.
    pub fn channel(capacity: usize) -> (Outbox, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Outbox { tx }, rx)
    }

    /// Non-blocking enqueue. A full queue is an error the dispatcher
    /// logs; it must not stall point processing.
    pub fn enqueue(&self, message: OutboundMessage) -> Result<()> {
        let id = message.id().to_string();
        self.tx.try_send(message).map_err(|e| {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "full",
                mpsc::error::TrySendError::Closed(_) => "closed",
            };
            ActionError::Outbox(format!("{reason} (message {id})"))
        })?;
        tracing::debug!(message = %id, "Queued outbound message");
        Ok(())
    }
}
