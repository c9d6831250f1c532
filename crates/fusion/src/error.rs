//! Fusion error types

use thiserror::Error;

/// Fusion-specific errors
#[derive(Debug, Error)]
pub enum FusionError {
    /// Preconditions not met (session pair incomplete or inconsistent)
    #[error("fusion precondition failed: {message}")]
    Precondition { message: String },

    /// Store-level error while reading inputs or writing status
    #[error(transparent)]
    Store(#[from] session_store::StoreError),

    /// Contract-level error
    #[error(transparent)]
    Core(#[from] contracts::CoreError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FusionError {
    /// Create a precondition error
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }
}
