//! Wire types for the toolkit worker protocol.
//!
//! The worker speaks line-delimited JSON-RPC 2.0. Graphs travel in their
//! editor JSON form; every graph-producing call carries [`SerializeOptions`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ============================================================================
// JSON-RPC Types
// ============================================================================

/// JSON-RPC request ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric ID.
    Number(i64),
    /// String ID.
    String(String),
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: RequestId,
    /// Method name.
    pub method: String,
    /// Parameters (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<JsonValue>,
}

impl JsonRpcRequest {
    /// Create a new request.
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }

    /// Set parameters.
    pub fn with_params<T: Serialize>(mut self, params: T) -> Result<Self, serde_json::Error> {
        self.params = Some(serde_json::to_value(params)?);
        Ok(self)
    }
}

/// JSON-RPC notification (no ID).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Parameters (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<JsonValue>,
}

impl JsonRpcNotification {
    /// Create a new notification.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params: None,
        }
    }
}

/// JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: RequestId,
    /// Result (on success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    /// Error (on failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: impl Into<RequestId>, result: impl Serialize) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            result: Some(serde_json::to_value(result).unwrap_or(JsonValue::Null)),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: impl Into<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// JSON-RPC error.
///
/// Errors raised inside the toolkit arrive with
/// [`JsonRpcError::TOOLKIT_EXCEPTION`] and a `data` object whose `type` is the
/// remote exception's type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Error message.
    pub message: String,
    /// Additional data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

impl JsonRpcError {
    /// Parse error (-32700).
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid request (-32600).
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found (-32601).
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params (-32602).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error (-32603).
    pub const INTERNAL_ERROR: i32 = -32603;
    /// An exception raised by the toolkit while serving the call.
    pub const TOOLKIT_EXCEPTION: i32 = -32000;

    /// Build a toolkit exception error.
    pub fn exception(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Self::TOOLKIT_EXCEPTION,
            message: message.into(),
            data: Some(serde_json::json!({ "type": kind.into() })),
        }
    }

    /// Remote exception type name, if the worker supplied one.
    pub fn exception_type(&self) -> Option<&str> {
        self.data.as_ref()?.get("type")?.as_str()
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

// ============================================================================
// Methods
// ============================================================================

/// Method names understood by the worker.
pub mod methods {
    /// Handshake.
    pub const INITIALIZE: &str = "initialize";
    /// List applicable pattern transformations.
    pub const PATTERN_MATCHES: &str = "pattern_matches";
    /// List subgraph transformations applicable to a selection.
    pub const SUBGRAPH_TRANSFORMATIONS: &str = "subgraph_transformations";
    /// Apply one serialized transformation.
    pub const APPLY_TRANSFORMATION: &str = "apply_transformation";
    /// Expand one or all library nodes.
    pub const EXPAND_LIBRARY_NODES: &str = "expand_library_nodes";
    /// Specialize symbols to constants.
    pub const SPECIALIZE: &str = "specialize";
    /// Run a static analysis.
    pub const ANALYZE: &str = "analyze";
    /// Describe every serializable property.
    pub const PROPERTY_METADATA: &str = "property_metadata";
    /// Compile a graph to a shared library.
    pub const COMPILE: &str = "compile";
    /// Import user transformation modules.
    pub const LOAD_CUSTOM_TRANSFORMATIONS: &str = "load_custom_transformations";
    /// Ask the worker to exit.
    pub const SHUTDOWN: &str = "shutdown";
}

// ============================================================================
// Toolkit Types
// ============================================================================

/// Per-call serialization settings.
///
/// Graphs returned by the toolkit are serialized with these settings.
/// Metadata is off by default; the editor does not need it and it inflates
/// payloads considerably.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializeOptions {
    /// Embed property metadata in serialized graphs.
    #[serde(default)]
    pub store_metadata: bool,
}

impl SerializeOptions {
    /// Options with metadata embedding enabled.
    pub fn with_metadata() -> Self {
        Self {
            store_metadata: true,
        }
    }
}

/// Identification returned by the worker handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolkitInfo {
    /// Toolkit name.
    pub name: String,
    /// Toolkit version.
    pub version: String,
    /// Optional features the worker supports (e.g. `"work_depth"`).
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl ToolkitInfo {
    /// Whether the worker advertised a capability.
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// Handshake parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    /// Client name.
    pub client: String,
    /// Client version.
    pub version: String,
}

/// Transformations found for a graph or a selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternMatches {
    /// Serialized transformation instances.
    #[serde(default)]
    pub transformations: Vec<JsonValue>,
    /// Documentation per transformation class name.
    #[serde(default)]
    pub docstrings: Map<String, JsonValue>,
}

impl PatternMatches {
    /// Append another set of matches.
    pub fn extend(&mut self, other: PatternMatches) {
        self.transformations.extend(other.transformations);
        self.docstrings.extend(other.docstrings);
    }
}

/// A selection forming a subgraph for subgraph transformations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubgraphSelection {
    /// Several states of one graph.
    States {
        /// Flattened graph index.
        graph: usize,
        /// Selected state indices.
        states: Vec<usize>,
    },
    /// Several nodes of one state.
    Nodes {
        /// Flattened graph index.
        graph: usize,
        /// State index.
        state: usize,
        /// Selected node indices.
        nodes: Vec<usize>,
    },
}

impl SubgraphSelection {
    /// Whether the selection spans states rather than nodes.
    pub fn is_multi_state(&self) -> bool {
        matches!(self, Self::States { .. })
    }

    /// Graph the selection lives in.
    pub fn graph(&self) -> usize {
        match self {
            Self::States { graph, .. } | Self::Nodes { graph, .. } => *graph,
        }
    }
}

/// A node named by flattened graph, state and node index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[usize; 3]", into = "[usize; 3]")]
pub struct NodeLocator {
    /// Flattened graph index.
    pub graph: usize,
    /// State index.
    pub state: usize,
    /// Node index.
    pub node: usize,
}

impl From<[usize; 3]> for NodeLocator {
    fn from([graph, state, node]: [usize; 3]) -> Self {
        Self { graph, state, node }
    }
}

impl From<NodeLocator> for [usize; 3] {
    fn from(n: NodeLocator) -> Self {
        [n.graph, n.state, n.node]
    }
}

/// Static analyses the toolkit can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Arithmetic operation counts, after memlet propagation.
    ArithmeticOps,
    /// Total work.
    Work,
    /// Critical path depth.
    Depth,
    /// Work over depth.
    AverageParallelism,
    /// Operations per byte moved, under a cache model.
    OperationalIntensity,
}

impl AnalysisKind {
    /// Capability a worker must advertise to run this analysis.
    pub fn capability(&self) -> Option<&'static str> {
        match self {
            Self::ArithmeticOps => None,
            Self::Work | Self::Depth | Self::AverageParallelism => Some("work_depth"),
            Self::OperationalIntensity => Some("operational_intensity"),
        }
    }

    /// Human readable name.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ArithmeticOps => "arithmetic operations",
            Self::Work => "work",
            Self::Depth => "depth",
            Self::AverageParallelism => "average parallelism",
            Self::OperationalIntensity => "operational intensity",
        }
    }
}

/// Cache model for operational intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheParams {
    /// Cache size in bytes.
    pub size: u64,
    /// Cache line size in bytes.
    pub line_size: u64,
}

/// Parameters of an analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Which analysis to run.
    pub kind: AnalysisKind,
    /// Graph to analyze.
    pub sdfg: JsonValue,
    /// Symbolic assumptions such as `N>0` or `M==4`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assumptions: Vec<String>,
    /// Concrete symbol values, for analyses that need numbers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub symbol_values: BTreeMap<String, i64>,
    /// Cache model, for operational intensity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheParams>,
}

impl AnalysisRequest {
    /// Create a request without assumptions.
    pub fn new(kind: AnalysisKind, sdfg: JsonValue) -> Self {
        Self {
            kind,
            sdfg,
            assumptions: Vec::new(),
            symbol_values: BTreeMap::new(),
            cache: None,
        }
    }

    /// Set symbolic assumptions.
    pub fn with_assumptions(mut self, assumptions: Vec<String>) -> Self {
        self.assumptions = assumptions;
        self
    }

    /// Set concrete symbol values.
    pub fn with_symbol_values(mut self, values: BTreeMap<String, i64>) -> Self {
        self.symbol_values = values;
        self
    }

    /// Set the cache model.
    pub fn with_cache(mut self, cache: CacheParams) -> Self {
        self.cache = Some(cache);
        self
    }
}

/// Analysis results keyed by element address.
pub type AnalysisMap = BTreeMap<String, String>;

/// Result of a compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResult {
    /// Path of the produced shared library.
    pub filename: String,
}

/// Graph-producing call parameters.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct GraphParams<'a, T: Serialize> {
    pub sdfg: &'a JsonValue,
    pub options: SerializeOptions,
    #[serde(flatten)]
    pub extra: T,
}

/// Graph-producing call result.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GraphResult {
    pub sdfg: JsonValue,
}

/// Paths of user transformation modules.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct LoadParams<'a> {
    pub paths: &'a [PathBuf],
}
