//! # sdfgd-ops
//!
//! The operations the editor can request.
//!
//! Every operation takes a serialized graph plus operation-specific
//! parameters and answers with an [`Outcome`]: a success payload, or an
//! [`OperationError`] carrying a fixed message and the underlying cause.
//! Nothing fails past that boundary.
//!
//! Structural editing happens natively on the [`Sdfg`](sdfgd_core::Sdfg)
//! arena. Everything that needs the compiler's own semantics (pattern
//! matching, symbolic analysis, library expansion, code generation) is
//! delegated to a [`Toolkit`].
//!
//! ## Example
//!
//! ```ignore
//! use sdfgd_ops::{Operations, TransformationsRequest};
//!
//! let ops = Operations::new(Arc::new(client));
//! let listing = ops.transformations(request).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod compile;
pub mod editing;
pub mod history;
pub mod metadata;
pub mod selection;
pub mod transformations;

pub use analysis::{AnalysisResponse, AnalyzeRequest, OperationalIntensityRequest};
pub use compile::{decode_graph_file, strip_instrumentation, CompileRequest, CompileResponse};
pub use editing::{insert_element, remove_elements, InsertRequest, InsertResponse, RemoveRequest};
pub use history::{ordinal, ReapplyHistoryRequest};
pub use metadata::MetadataResponse;
pub use selection::SelectionPlan;
pub use transformations::{
    AddTransformationsRequest, ApplyTransformationRequest, ApplyTransformationsRequest,
    DoneResponse, ExpandLibraryNodeRequest, SpecializeRequest, TransformationsRequest,
    TransformationsResponse,
};

use sdfgd_core::{OperationError, Outcome};
use sdfgd_toolkit::{SerializeOptions, Toolkit};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Success payload carrying a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdfgResponse {
    /// The serialized graph.
    pub sdfg: Value,
}

/// Entry point for every editor operation.
///
/// Holds no per-request state: each call decodes its own graph. The only
/// cached value is the property metadata, which cannot change while the
/// toolkit worker runs.
pub struct Operations {
    toolkit: Arc<dyn Toolkit>,
    options: SerializeOptions,
    metadata: OnceCell<Value>,
}

impl Operations {
    /// Create operations backed by a toolkit.
    pub fn new(toolkit: Arc<dyn Toolkit>) -> Self {
        Self {
            toolkit,
            options: SerializeOptions::default(),
            metadata: OnceCell::new(),
        }
    }

    /// Serialization settings passed to every graph-producing toolkit call.
    pub fn with_options(mut self, options: SerializeOptions) -> Self {
        self.options = options;
        self
    }

    /// Current serialization settings.
    pub fn options(&self) -> SerializeOptions {
        self.options
    }

    /// The underlying toolkit.
    pub fn toolkit(&self) -> &Arc<dyn Toolkit> {
        &self.toolkit
    }
}

/// Log and wrap a failure under a fixed message.
pub(crate) fn fail<E>(message: impl Into<String>) -> impl FnOnce(E) -> OperationError
where
    E: sdfgd_core::ErrorDetails + std::error::Error,
{
    let message = message.into();
    move |err| OperationError::from_error(message, &err)
}

/// Reject with a literal details string, logging it.
pub(crate) fn reject<T>(message: &str, details: impl Into<String>) -> Outcome<T> {
    let err = OperationError::new(message, details);
    tracing::error!(details = %err.details, "{}", err.message);
    Err(err)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use sdfgd_toolkit::MockToolkit;
    use serde_json::json;

    /// Wrap a configured mock.
    pub fn ops(mock: MockToolkit) -> Operations {
        Operations::new(Arc::new(mock))
    }

    /// A mock that expects no calls at all.
    pub fn idle() -> Operations {
        ops(MockToolkit::new())
    }

    /// Root with two states; state 1 holds a map scope, a tasklet, a library
    /// node and a nested graph (graph 1) with one state. Interstate edge
    /// 0 -> 1.
    pub fn sample() -> Value {
        json!({
            "type": "SDFG",
            "attributes": {
                "name": "program",
                "_arrays": {"A": {"type": "Array", "attributes": {"dtype": "float64", "shape": ["N"]}}}
            },
            "sdfg_list_id": 0,
            "start_state": 0,
            "nodes": [
                {
                    "type": "SDFGState",
                    "label": "init",
                    "id": 0,
                    "attributes": {},
                    "nodes": [
                        {"type": "AccessNode", "label": "A", "id": 0, "scope_entry": null, "scope_exit": null, "attributes": {"data": "A"}}
                    ],
                    "edges": []
                },
                {
                    "type": "SDFGState",
                    "label": "compute",
                    "id": 1,
                    "attributes": {},
                    "nodes": [
                        {"type": "MapEntry", "label": "map", "id": 0, "scope_entry": null, "scope_exit": "2", "attributes": {}},
                        {"type": "Tasklet", "label": "t", "id": 1, "scope_entry": "0", "scope_exit": "2", "attributes": {}},
                        {"type": "MapExit", "label": "map", "id": 2, "scope_entry": "0", "scope_exit": "2", "attributes": {}},
                        {
                            "type": "MatMul",
                            "label": "gemm",
                            "id": 3,
                            "classpath": "dace.libraries.blas.nodes.matmul.MatMul",
                            "scope_entry": null,
                            "scope_exit": null,
                            "attributes": {"name": "gemm"}
                        },
                        {
                            "type": "NestedSDFG",
                            "label": "inner",
                            "id": 4,
                            "scope_entry": null,
                            "scope_exit": null,
                            "attributes": {
                                "sdfg": {
                                    "type": "SDFG",
                                    "attributes": {"name": "inner"},
                                    "sdfg_list_id": 1,
                                    "nodes": [
                                        {"type": "SDFGState", "label": "body", "id": 0, "attributes": {}, "nodes": [], "edges": []}
                                    ],
                                    "edges": []
                                }
                            }
                        }
                    ],
                    "edges": [
                        {"type": "MultiConnectorEdge", "src": "0", "dst": "1", "attributes": {"data": {"type": "Memlet"}}},
                        {"type": "MultiConnectorEdge", "src": "1", "dst": "2", "attributes": {"data": {"type": "Memlet"}}}
                    ]
                }
            ],
            "edges": [
                {"type": "Edge", "src": "0", "dst": "1", "attributes": {"data": {"type": "InterstateEdge"}}}
            ]
        })
    }
}
