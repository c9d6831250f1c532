//! Replication error types

use thiserror::Error;

/// Replication-specific errors
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// Peer request failed (transport, timeout, non-2xx, bad payload).
    /// Treated as transient by the poll schedule.
    #[error("peer request failed: {message}")]
    Request { message: String },

    /// Mirror worker already stopped or command channel closed
    #[error("mirror for session '{session_id}' is stopped")]
    MirrorStopped { session_id: String },

    /// Store-level error from the shared combine path
    #[error(transparent)]
    Store(#[from] session_store::StoreError),

    /// Contract-level error
    #[error(transparent)]
    Core(#[from] contracts::CoreError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReplicationError {
    /// Create a peer request error
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Create a mirror-stopped error
    pub fn mirror_stopped(session_id: impl Into<String>) -> Self {
        Self::MirrorStopped {
            session_id: session_id.into(),
        }
    }
}
