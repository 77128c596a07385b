//! Health store error types

use thiserror::Error;

/// Errors that can occur inside a health store backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// Access to the type was denied
    #[error("Authorization denied for {0}")]
    AuthorizationDenied(String),

    /// The backend has no notion of this sample type
    #[error("Unsupported sample type: {0}")]
    TypeUnsupported(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Journal entry failed its checksum or framing check
    #[error("Corrupt data: {0}")]
    Corruption(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Anything else the backend reports
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
