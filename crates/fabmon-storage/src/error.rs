/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use fabmon_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "alarm_config",
///     id: "cfg-99".to_string(),
/// };
/// assert!(err.to_string().contains("alarm_config"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// The operation conflicts with existing state, e.g. deleting an alarm
    /// type that configurations still reference.
    #[error("Storage: conflict: {0}")]
    Conflict(String),

    /// The sequential occurrence id space is exhausted.
    #[error("Storage: {0}")]
    IdExhausted(#[from] fabmon_common::ident::IdError),

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem error while preparing the data directory.
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failure (rules and
    /// acknowledgment-action columns).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
