//! Request-level error taxonomy
//!
//! Every failure that reaches a front end is a [`HealthError`]. Lower layers
//! (date parsing, units, the store) have their own error enums which are
//! folded into this one at the dispatch boundary.

use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced to the CLI and to protocol tool calls
#[derive(Error, Debug)]
pub enum HealthError {
    /// The health store cannot be used on this platform
    #[error("Health data is not available on this device")]
    NotAvailable,

    /// A known-looking data type the store or operation cannot serve
    #[error("Data type not available: {0}")]
    TypeNotAvailable(String),

    /// The user denied access to the requested data
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Missing or malformed argument
    #[error("Invalid parameter '{field}': {message}")]
    InvalidParams { field: String, message: String },

    /// Unknown command or tool name
    #[error("Unknown operation: {0}")]
    NotFound(String),

    /// Any other store error, carried verbatim
    #[error("Store error: {0}")]
    StoreFailure(StoreError),
}

impl HealthError {
    /// Build an `InvalidParams` error for a named argument
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        HealthError::InvalidParams {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            HealthError::NotAvailable => "NOT_AVAILABLE",
            HealthError::TypeNotAvailable(_) => "TYPE_NOT_AVAILABLE",
            HealthError::Unauthorized(_) => "UNAUTHORIZED",
            HealthError::InvalidParams { .. } => "INVALID_PARAMS",
            HealthError::NotFound(_) => "NOT_FOUND",
            HealthError::StoreFailure(_) => "STORE_FAILURE",
        }
    }

    /// JSON-RPC error code used by the tool server
    pub fn rpc_code(&self) -> i32 {
        match self {
            HealthError::InvalidParams { .. } => -32602,
            HealthError::NotFound(_) => -32601,
            _ => -32603,
        }
    }

    /// The offending argument, if the error is about one
    pub fn field(&self) -> Option<&str> {
        match self {
            HealthError::InvalidParams { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<StoreError> for HealthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AuthorizationDenied(what) => HealthError::Unauthorized(what),
            StoreError::TypeUnsupported(what) => HealthError::TypeNotAvailable(what),
            other => HealthError::StoreFailure(other),
        }
    }
}

/// Result type alias for request handling
pub type HealthResult<T> = Result<T, HealthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HealthError::invalid("from", "unparseable date expression 'soon'");
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'from': unparseable date expression 'soon'"
        );
        assert_eq!(err.field(), Some("from"));

        let err = HealthError::NotFound("health_read_everything".to_string());
        assert_eq!(err.to_string(), "Unknown operation: health_read_everything");
    }

    #[test]
    fn test_store_error_conversion() {
        let err: HealthError = StoreError::AuthorizationDenied("heart_rate".into()).into();
        assert!(matches!(err, HealthError::Unauthorized(_)));

        let err: HealthError = StoreError::TypeUnsupported("sleep".into()).into();
        assert!(matches!(err, HealthError::TypeNotAvailable(_)));

        let err: HealthError = StoreError::Backend("disk on fire".into()).into();
        assert_eq!(err.code(), "STORE_FAILURE");
        assert_eq!(err.to_string(), "Store error: Store backend error: disk on fire");
    }

    #[test]
    fn test_rpc_codes() {
        assert_eq!(HealthError::invalid("type", "missing").rpc_code(), -32602);
        assert_eq!(HealthError::NotFound("x".into()).rpc_code(), -32601);
        assert_eq!(HealthError::NotAvailable.rpc_code(), -32603);
    }
}
