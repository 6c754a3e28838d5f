/// Errors from action dispatch.
///
/// Dispatch never lets one of these escape the processing loop: the
/// registry catches them, logs, and reports the action as unhandled.
///
/// # Examples
///
/// ```rust
/// use streamgate_actions::error::ActionError;
///
/// let err = ActionError::MissingExtraPayload;
/// assert!(err.to_string().contains("extra_payload"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The action type requires configuration but the action row carries
    /// no extra_payload.
    #[error("Action: extra_payload required but absent")]
    MissingExtraPayload,

    /// The extra_payload did not deserialize into the action's config
    /// struct.
    #[error("Action: invalid extra_payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// The outbound message queue is full or its delivery worker is gone.
    #[error("Action: outbound queue rejected the message: {0}")]
    Outbox(String),

    /// Failure in a side-effect port (topic publish, job scheduling).
    #[error("Action: {0}")]
    Port(#[from] anyhow::Error),
}

/// Convenience `Result` alias for action dispatch.
pub type Result<T> = std::result::Result<T, ActionError>;
