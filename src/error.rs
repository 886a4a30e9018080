//! Error types for Tagsmith
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::registry::ResourceKind;

/// Result type alias using TagError
pub type Result<T> = std::result::Result<T, TagError>;

/// Unified error type for Tagsmith operations
#[derive(Debug, Error)]
pub enum TagError {
    // -------------------------------------------------------------------------
    // Resource Resolution Errors
    // -------------------------------------------------------------------------
    #[error("Invalid resource kind: {0}")]
    InvalidResourceKind(String),

    #[error("Invalid response kind: '{0}', expected one of user, item, tag")]
    InvalidResponseKind(String),

    #[error("Invalid via kind: {0}")]
    InvalidViaKind(String),

    #[error("Resource kind '{0}' was never registered")]
    UnregisteredKind(ResourceKind),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WRONGTYPE operation against key '{key}' holding the wrong kind of value")]
    WrongType { key: String },

    #[error("Store error: {0}")]
    Store(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Snapshot corruption detected: {0}")]
    SnapshotCorruption(String),

    #[error("Malformed tag cache entry: {0}")]
    Json(#[from] serde_json::Error),
}
