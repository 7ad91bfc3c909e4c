//! The result-or-error envelope every operation answers with.
//!
//! Operations never fail past their own boundary. A success is an object of
//! operation-specific keys; a failure is `{"error": {"message", "details"}}`
//! where `message` is a fixed human-readable summary and `details` carries
//! the underlying error as `"Type: message"`.

use crate::error::ErrorDetails;
use crate::graph::Sdfg;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Message used when the payload itself is an error envelope.
pub const INVALID_SDFG: &str = "Invalid SDFG provided";
/// Message used when the payload cannot be decoded.
pub const PARSE_FAILED: &str = "Failed to parse the provided SDFG";

/// A failed operation, ready to be shipped to the editor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({details})")]
pub struct OperationError {
    /// Fixed summary for the operation that failed.
    pub message: String,
    /// Underlying cause.
    pub details: String,
}

#[derive(Serialize, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    details: String,
}

impl OperationError {
    /// Create an error with a literal details string.
    pub fn new(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: details.into(),
        }
    }

    /// Wrap an underlying error, logging it with its full chain.
    pub fn from_error<E>(message: impl Into<String>, err: &E) -> Self
    where
        E: ErrorDetails + std::error::Error,
    {
        let message = message.into();
        let mut chain = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push_str(": ");
            chain.push_str(&cause.to_string());
            source = cause.source();
        }
        tracing::error!(error = %chain, "{message}");
        Self {
            message,
            details: err.details(),
        }
    }

    /// The envelope as a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "error": {
                "message": self.message,
                "details": self.details,
            }
        })
    }
}

impl Serialize for OperationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(
            "error",
            &ErrorBody {
                message: self.message.clone(),
                details: self.details.clone(),
            },
        )?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for OperationError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Envelope {
            error: ErrorBody,
        }
        let envelope = Envelope::deserialize(deserializer).map_err(de::Error::custom)?;
        Ok(Self {
            message: envelope.error.message,
            details: envelope.error.details,
        })
    }
}

/// Result of an operation.
pub type Outcome<T> = Result<T, OperationError>;

/// Flatten an outcome into the response object.
///
/// Success payloads that serialize to something other than an object are
/// wrapped under `"result"`.
pub fn into_envelope<T: Serialize>(outcome: Outcome<T>) -> Value {
    match outcome {
        Ok(payload) => match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => Value::Object(map),
            Ok(other) => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                Value::Object(map)
            }
            Err(e) => {
                OperationError::new("Failed to serialize the response", format!("TypeError: {e}"))
                    .to_value()
            }
        },
        Err(err) => err.to_value(),
    }
}

/// Decode an incoming graph payload.
///
/// A payload that is itself an error envelope (the editor forwarding a failed
/// response) is rejected with [`INVALID_SDFG`] and the forwarded message as
/// details. Anything that does not decode is rejected with [`PARSE_FAILED`].
pub fn load_sdfg(payload: Value) -> Outcome<Sdfg> {
    if let Some(error) = payload.get("error") {
        let forwarded = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(OperationError::new(INVALID_SDFG, forwarded));
    }
    Sdfg::from_value(payload).map_err(|e| OperationError::from_error(PARSE_FAILED, &e))
}

/// Decode a graph that may arrive either as an object or as a JSON string.
pub fn load_sdfg_lenient(payload: Value) -> Outcome<Sdfg> {
    match payload {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(value) => load_sdfg(value),
            Err(e) => Err(OperationError::from_error(
                PARSE_FAILED,
                &crate::error::CoreError::from(e),
            )),
        },
        other => load_sdfg(other),
    }
}
