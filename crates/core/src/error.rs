//! Error types for purchaser link synchronization.

use thiserror::Error;

/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while synchronizing a payment record with its
/// purchaser record.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A create/update against the remote record store failed.
    #[error("remote write failed: {message}")]
    RemoteWrite { status: Option<u16>, message: String },

    /// A fetch/query against the remote record store failed.
    #[error("remote read failed: {message}")]
    RemoteRead { status: Option<u16>, message: String },

    /// The newly created purchaser record never became visible within the
    /// retry budget.
    #[error("purchaser record not visible after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    /// No purchaser record matches the given purchaser ID.
    #[error("no purchaser record matches id {purchaser_id}")]
    LinkageNotFound { purchaser_id: String },

    /// No history row carries the given back-reference.
    #[error("no history row matches back-reference {back_reference}")]
    RowNotFound { back_reference: i64 },
}

impl SyncError {
    /// Create a remote write error without an HTTP status.
    pub fn remote_write(message: impl Into<String>) -> Self {
        Self::RemoteWrite {
            status: None,
            message: message.into(),
        }
    }

    /// Create a remote write error carrying the HTTP status.
    pub fn remote_write_status(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteWrite {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a remote read error without an HTTP status.
    pub fn remote_read(message: impl Into<String>) -> Self {
        Self::RemoteRead {
            status: None,
            message: message.into(),
        }
    }

    /// Create a remote read error carrying the HTTP status.
    pub fn remote_read_status(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteRead {
            status: Some(status),
            message: message.into(),
        }
    }

    /// HTTP status if the remote store reported one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RemoteWrite { status, .. } | Self::RemoteRead { status, .. } => *status,
            _ => None,
        }
    }

    /// True when a read failed because the record does not (yet) exist.
    /// Used by the visibility poll to distinguish read-lag from real failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RemoteRead { status: Some(404), .. })
    }

    /// Soft conditions: legitimate operational gaps (deleted purchaser,
    /// history pre-dating linkage) that are logged and skipped, never
    /// surfaced as save failures.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::LinkageNotFound { .. } | Self::RowNotFound { .. })
    }
}
