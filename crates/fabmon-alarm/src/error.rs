use crate::snapshot::SnapshotError;
use fabmon_storage::error::StorageError;

/// Errors surfaced by the alarm engine's caller-facing operations.
#[derive(Debug, thiserror::Error)]
pub enum AlarmError {
    /// The request is malformed (empty id list, blank actor, ...). Rejected
    /// before any write.
    #[error("Alarm: invalid request: {0}")]
    Validation(String),

    /// A referenced config or occurrence does not exist.
    #[error("Alarm: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// The sequential id space is exhausted; no new occurrence can be
    /// opened for this configuration. The poll sweep continues for others.
    #[error("Alarm: occurrence id space exhausted while opening for config {config_id}")]
    IdExhausted { config_id: String },

    /// Double-acknowledge; surfaced directly to the caller, no retry.
    #[error("Alarm: occurrence {0} is already acknowledged")]
    AlreadyAcknowledged(String),

    /// A bulk update matched zero occurrences.
    #[error("Alarm: no occurrences matched the request")]
    NothingUpdated,

    /// The telemetry source is unreachable or returned a malformed payload.
    /// Aborts the whole poll cycle; retryable.
    #[error("Alarm: telemetry snapshot unavailable: {0}")]
    SnapshotUnavailable(#[from] SnapshotError),

    #[error("Alarm: {0}")]
    Storage(#[from] StorageError),
}

/// Convenience `Result` alias for engine operations.
pub type Result<T> = std::result::Result<T, AlarmError>;
