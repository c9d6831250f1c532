//! Layered error definitions
//!
//! Categorized by source: config / storage / integrity / replication / fusion

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum CoreError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Storage Errors =====
    /// Session store error
    #[error("storage error for session '{session_id}': {message}")]
    Storage { session_id: String, message: String },

    /// Session directory or manifest not found
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// CSV row parse error
    #[error("row parse error at line {line}: {message}")]
    RowParse { line: usize, message: String },

    /// Combined session file disagrees with the manifest running total
    #[error(
        "row count mismatch for session '{session_id}': manifest={manifest_rows}, file={file_rows}"
    )]
    RowCountMismatch {
        session_id: String,
        manifest_rows: u64,
        file_rows: u64,
    },

    // ===== Integrity Errors =====
    /// Content hash disagrees with the advertised digest
    #[error("hash mismatch for '{name}': expected {expected}, got {actual}")]
    HashMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    // ===== Replication Errors =====
    /// Peer request failed (timeout, connection, non-2xx)
    #[error("peer request failed: {message}")]
    PeerRequest { message: String },

    // ===== Fusion Errors =====
    /// Fusion input missing or unreadable
    #[error("missing fusion input: {path}")]
    MissingInput { path: String },

    /// Fusion failure
    #[error("fusion error: {message}")]
    Fusion { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create session storage error
    pub fn storage(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            session_id: session_id.into(),
            message: message.into(),
        }
    }

    /// Create peer request error
    pub fn peer_request(message: impl Into<String>) -> Self {
        Self::PeerRequest {
            message: message.into(),
        }
    }

    /// Create fusion error
    pub fn fusion(message: impl Into<String>) -> Self {
        Self::Fusion {
            message: message.into(),
        }
    }
}
