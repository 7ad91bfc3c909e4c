//! Toolkit error types.

use crate::types::JsonRpcError;
use sdfgd_core::ErrorDetails;
use thiserror::Error;

/// Errors talking to, or raised by, the toolkit worker.
#[derive(Debug, Error)]
pub enum ToolkitError {
    /// Transport error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The worker answered with an error. Toolkit exceptions carry the
    /// remote exception type in `data.type`.
    #[error("Protocol error {code}: {message}")]
    Protocol {
        /// Error code.
        code: i32,
        /// Error message.
        message: String,
        /// Additional data.
        data: Option<serde_json::Value>,
    },

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker went away.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No result in response.
    #[error("No result in response")]
    NoResult,

    /// The worker did not answer in time.
    #[error("Timeout")]
    Timeout,

    /// The worker lacks an optional feature.
    #[error("Toolkit does not support {0}")]
    Unsupported(String),
}

impl From<JsonRpcError> for ToolkitError {
    fn from(err: JsonRpcError) -> Self {
        Self::Protocol {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

impl ToolkitError {
    /// Check if this error is recoverable by restarting the worker.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Transport(_) | Self::ConnectionClosed
        )
    }

    /// Remote exception type name, if this is a toolkit exception.
    pub fn remote_type(&self) -> Option<&str> {
        match self {
            Self::Protocol {
                data: Some(data), ..
            } => data.get("type")?.as_str(),
            _ => None,
        }
    }
}

impl ErrorDetails for ToolkitError {
    fn error_type(&self) -> String {
        if let Some(remote) = self.remote_type() {
            return remote.to_string();
        }
        match self {
            Self::Transport(_) => "TransportError",
            Self::Protocol { .. } => "ProtocolError",
            Self::Json(_) => "JSONDecodeError",
            Self::Io(_) => "IOError",
            Self::ConnectionClosed => "ConnectionClosed",
            Self::NoResult => "NoResult",
            Self::Timeout => "TimeoutError",
            Self::Unsupported(_) => "NotImplementedError",
        }
        .to_string()
    }

    fn details(&self) -> String {
        match self {
            // Remote exceptions read as they were raised.
            Self::Protocol { message, .. } if self.remote_type().is_some() => {
                format!("{}: {}", self.error_type(), message)
            }
            _ => format!("{}: {}", self.error_type(), self),
        }
    }
}

/// Result type for toolkit operations.
pub type ToolkitResult<T> = Result<T, ToolkitError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_display() {
        let err = ToolkitError::Transport("worker exited".to_string());
        assert!(err.to_string().contains("worker exited"));
        assert_eq!(err.details(), "TransportError: Transport error: worker exited");
    }

    #[test]
    fn test_remote_exception_details() {
        let err: ToolkitError = JsonRpcError::exception("KeyError", "'sdfg_id'").into();
        assert_eq!(err.remote_type(), Some("KeyError"));
        assert_eq!(err.details(), "KeyError: 'sdfg_id'");
    }

    #[test]
    fn test_protocol_without_type() {
        let err: ToolkitError = JsonRpcError {
            code: JsonRpcError::METHOD_NOT_FOUND,
            message: "no such method".into(),
            data: None,
        }
        .into();
        assert!(matches!(err, ToolkitError::Protocol { code: -32601, .. }));
        assert_eq!(
            err.details(),
            "ProtocolError: Protocol error -32601: no such method"
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(ToolkitError::Timeout.is_recoverable());
        assert!(ToolkitError::ConnectionClosed.is_recoverable());
        assert!(!ToolkitError::NoResult.is_recoverable());
    }
}
