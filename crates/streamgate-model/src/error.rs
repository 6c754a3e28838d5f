/// Errors from the filter definition store.
///
/// # Examples
///
/// ```rust
/// use streamgate_model::error::StoreError;
///
/// let err = StoreError::NotFound {
///     entity: "filter",
///     id: "f--0000-0001----5001".to_string(),
/// };
/// assert!(err.to_string().contains("filter"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A required record was not found in the database.
    #[error("Store: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// A write was rejected because it would violate a model invariant
    /// (duplicate slug, cross-filter reference, missing threshold, ...).
    #[error("Store: {0}")]
    Validation(String),

    /// An underlying SQLite error.
    #[error("Store: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON failure on an extra_payload column.
    #[error("Store: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience `Result` alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
