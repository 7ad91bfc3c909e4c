//! Core error types.

use thiserror::Error;

/// Errors raised while decoding graphs or addressing their elements.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Address string is not four `/`-separated integers, or violates the
    /// discriminant rules.
    #[error("Malformed address '{input}': {reason}")]
    MalformedAddress {
        /// The offending input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No nested subgraph with this flattened index exists.
    #[error("Graph {0} does not exist")]
    GraphNotFound(i64),

    /// State index out of range.
    #[error("State {state} does not exist in graph {graph}")]
    StateOutOfRange {
        /// Graph that was searched.
        graph: usize,
        /// Requested state index.
        state: i64,
    },

    /// Node index out of range.
    #[error("Node {node} does not exist in state {state} of graph {graph}")]
    NodeOutOfRange {
        /// Graph that was searched.
        graph: usize,
        /// State that was searched.
        state: usize,
        /// Requested node index.
        node: i64,
    },

    /// Edge index out of range.
    #[error("Edge {edge} does not exist in {container}")]
    EdgeOutOfRange {
        /// Human readable container description.
        container: String,
        /// Requested edge index.
        edge: i64,
    },

    /// The graph payload does not have the expected structure.
    #[error("Invalid SDFG: {0}")]
    InvalidGraph(String),

    /// The requested element is of the wrong kind for the operation.
    #[error("Unsupported element: {0}")]
    UnsupportedElement(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Create a malformed address error.
    pub fn malformed(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedAddress {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid graph error.
    pub fn invalid_graph(msg: impl Into<String>) -> Self {
        Self::InvalidGraph(msg.into())
    }

    /// Input validation failure (caller sent something unusable).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::MalformedAddress { .. } | Self::UnsupportedElement(_))
    }

    /// The address was well formed but names nothing in this graph.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::GraphNotFound(_)
                | Self::StateOutOfRange { .. }
                | Self::NodeOutOfRange { .. }
                | Self::EdgeOutOfRange { .. }
        )
    }
}

/// Errors that can describe themselves in the `"Type: message"` shape the
/// editor shows as failure details.
pub trait ErrorDetails: std::fmt::Display {
    /// Short type name of the error.
    fn error_type(&self) -> String;

    /// Type name and message, e.g. `"GraphNotFound: Graph 3 does not exist"`.
    fn details(&self) -> String {
        format!("{}: {}", self.error_type(), self)
    }
}

impl ErrorDetails for CoreError {
    fn error_type(&self) -> String {
        match self {
            Self::MalformedAddress { .. } => "MalformedAddress",
            Self::GraphNotFound(_) => "GraphNotFound",
            Self::StateOutOfRange { .. } => "StateOutOfRange",
            Self::NodeOutOfRange { .. } => "NodeOutOfRange",
            Self::EdgeOutOfRange { .. } => "EdgeOutOfRange",
            Self::InvalidGraph(_) => "InvalidGraph",
            Self::UnsupportedElement(_) => "UnsupportedElement",
            Self::Json(_) => "JSONDecodeError",
            Self::Io(_) => "IOError",
        }
        .to_string()
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
