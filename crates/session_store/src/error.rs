//! Session store error types

use thiserror::Error;

/// Store-specific errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Session worker already stopped or command channel closed
    #[error("session '{session_id}' is closed")]
    SessionClosed { session_id: String },

    /// Chunk finalization error
    #[error("failed to finalize chunk {index}: {message}")]
    ChunkFinalize { index: u64, message: String },

    /// Contract-level error
    #[error(transparent)]
    Core(#[from] contracts::CoreError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create a session-closed error
    pub fn session_closed(session_id: impl Into<String>) -> Self {
        Self::SessionClosed {
            session_id: session_id.into(),
        }
    }

    /// Create a chunk finalization error
    pub fn chunk_finalize(index: u64, message: impl Into<String>) -> Self {
        Self::ChunkFinalize {
            index,
            message: message.into(),
        }
    }
}
