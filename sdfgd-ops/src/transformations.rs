//! Listing, applying and loading transformations.

use crate::history::ordinal;
use crate::selection::{SelectionPlan, MULTIPLE_GRAPHS_WARNING};
use crate::{fail, reject, Operations, SdfgResponse};
use sdfgd_core::{
    load_sdfg_lenient, CoreError, ElementRef, GraphId, Node, NodeLocation, OperationError,
    Outcome, Sdfg,
};
use sdfgd_toolkit::NodeLocator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

const LIST_FAILED: &str = "Failed to load transformations";
const APPLY_FAILED: &str = "Failed to apply the transformation to the SDFG";
const PARSE_XFORM_FAILED: &str = "Failed to parse the applied transformation";
const EXPAND_FAILED: &str = "Failed to expand library node";
const SPECIALIZE_FAILED: &str = "Failed to specialize the SDFG";
const LOAD_XFORMS_FAILED: &str = "Failed to load custom transformation(s)";

/// Request for the transformations applicable to a graph.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformationsRequest {
    /// The graph.
    pub sdfg: Value,
    /// Selection descriptors from the editor.
    #[serde(default)]
    pub selected_elements: Vec<Value>,
    /// Allow matches that are only valid under relaxed checks.
    #[serde(default)]
    pub permissive: bool,
}

/// Transformations applicable to a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationsResponse {
    /// Serialized transformation instances.
    pub transformations: Vec<Value>,
    /// Documentation per transformation class.
    pub docstrings: Map<String, Value>,
    /// Set when the selection was ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<String>,
}

/// Request to apply one transformation.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplyTransformationRequest {
    /// The graph.
    pub sdfg: Value,
    /// A serialized transformation instance, as listed.
    pub transformation: Value,
}

/// Request to apply several transformations in order.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplyTransformationsRequest {
    /// The graph.
    pub sdfg: Value,
    /// Serialized transformation instances.
    pub transformations: Vec<Value>,
    /// Accepted for compatibility; application does not re-match.
    #[serde(default)]
    pub permissive: bool,
}

/// Request to expand library nodes.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpandLibraryNodeRequest {
    /// The graph.
    #[serde(default)]
    pub sdfg: Option<Value>,
    /// `[graph, state, node]` of the node to expand; all when absent.
    #[serde(default)]
    pub nodeid: Option<NodeLocator>,
}

/// Request to specialize symbols.
#[derive(Debug, Clone, Deserialize)]
pub struct SpecializeRequest {
    /// The graph.
    pub sdfg: Value,
    /// Symbol name to value. Symbols mapped to null are left alone.
    #[serde(default)]
    pub symbol_map: Option<Map<String, Value>>,
}

/// Request to load user transformation modules.
#[derive(Debug, Clone, Deserialize)]
pub struct AddTransformationsRequest {
    /// Module paths.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

/// Acknowledgement payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneResponse {
    /// Always true.
    pub done: bool,
}

impl Operations {
    /// List every applicable transformation, plus subgraph transformations
    /// for the current selection.
    pub async fn transformations(
        &self,
        request: TransformationsRequest,
    ) -> Outcome<TransformationsResponse> {
        let sdfg = load_sdfg_lenient(request.sdfg)?;
        let plan =
            SelectionPlan::build(&sdfg, &request.selected_elements).map_err(fail(LIST_FAILED))?;
        let payload = sdfg.to_value();

        let mut matches = self
            .toolkit
            .pattern_matches(&payload, request.permissive, self.options)
            .await
            .map_err(fail(LIST_FAILED))?;

        if plan.spans_multiple_graphs() {
            return Ok(TransformationsResponse {
                transformations: matches.transformations,
                docstrings: matches.docstrings,
                warnings: Some(MULTIPLE_GRAPHS_WARNING.to_string()),
            });
        }

        if let Some(selection) = plan.queryable_subgraph() {
            let subgraph = self
                .toolkit
                .subgraph_transformations(&payload, selection, self.options)
                .await
                .map_err(fail(LIST_FAILED))?;
            matches.extend(subgraph);
        }

        tracing::debug!(
            count = matches.transformations.len(),
            "Listed transformations"
        );
        Ok(TransformationsResponse {
            transformations: matches.transformations,
            docstrings: matches.docstrings,
            warnings: None,
        })
    }

    /// Apply one transformation.
    pub async fn apply_transformation(
        &self,
        request: ApplyTransformationRequest,
    ) -> Outcome<SdfgResponse> {
        let sdfg = load_sdfg_lenient(request.sdfg)?;
        let sdfg = self
            .apply_one(sdfg.to_value(), &sdfg, &request.transformation, APPLY_FAILED)
            .await?;
        Ok(SdfgResponse { sdfg })
    }

    /// Apply several transformations in order. The first failure aborts the
    /// batch and names the failing entry.
    pub async fn apply_transformations(
        &self,
        request: ApplyTransformationsRequest,
    ) -> Outcome<SdfgResponse> {
        let mut sdfg = load_sdfg_lenient(request.sdfg)?;
        let mut current = sdfg.to_value();
        let count = request.transformations.len();

        for (i, transformation) in request.transformations.iter().enumerate() {
            let message = format!("{APPLY_FAILED}, failed at {} transformation", ordinal(i + 1));
            current = self.apply_one(current, &sdfg, transformation, &message).await?;
            if i + 1 < count {
                sdfg = Sdfg::from_value(current.clone()).map_err(fail(message))?;
            }
        }

        Ok(SdfgResponse { sdfg: current })
    }

    /// Validate a transformation against the decoded graph, then have the
    /// toolkit apply it to `payload`.
    pub(crate) async fn apply_one(
        &self,
        payload: Value,
        sdfg: &Sdfg,
        transformation: &Value,
        message: &str,
    ) -> Outcome<Value> {
        let target = transformation_target(transformation).map_err(fail(PARSE_XFORM_FAILED))?;
        sdfg.graph(target).map_err(|_| {
            OperationError::from_error(message, &CoreError::GraphNotFound(target.index() as i64))
        })?;

        self.toolkit
            .apply_transformation(&payload, transformation, self.options)
            .await
            .map_err(fail(message))
    }

    /// Expand one library node, or every library node when none is given.
    pub async fn expand_library_node(
        &self,
        request: ExpandLibraryNodeRequest,
    ) -> Outcome<SdfgResponse> {
        let Some(payload) = request.sdfg else {
            return reject(EXPAND_FAILED, "No SDFG provided");
        };
        let sdfg = load_sdfg_lenient(payload)?;

        if let Some(locator) = request.nodeid {
            let element = ElementRef::Node {
                graph: GraphId(locator.graph),
                state: locator.state,
                node: locator.node,
            };
            let resolved = sdfg
                .resolve(&element.address())
                .map_err(fail(EXPAND_FAILED))?;
            let ElementRef::Node { graph, state, node } = resolved.element else {
                return reject(EXPAND_FAILED, "The provided node is not a valid library node");
            };
            let node = sdfg
                .node(NodeLocation { graph, state, node })
                .map_err(fail(EXPAND_FAILED))?;
            if !is_library_node(node) {
                return reject(EXPAND_FAILED, "The provided node is not a valid library node");
            }
        }

        let sdfg = self
            .toolkit
            .expand_library_nodes(&sdfg.to_value(), request.nodeid, self.options)
            .await
            .map_err(fail(EXPAND_FAILED))?;
        Ok(SdfgResponse { sdfg })
    }

    /// Replace symbols with constants.
    pub async fn specialize(&self, request: SpecializeRequest) -> Outcome<SdfgResponse> {
        let sdfg = load_sdfg_lenient(request.sdfg)?;
        let symbols: Map<String, Value> = request
            .symbol_map
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect();

        let sdfg = self
            .toolkit
            .specialize(&sdfg.to_value(), &symbols, self.options)
            .await
            .map_err(fail(SPECIALIZE_FAILED))?;
        Ok(SdfgResponse { sdfg })
    }

    /// Load user transformation modules into the toolkit.
    pub async fn add_transformations(
        &self,
        request: AddTransformationsRequest,
    ) -> Outcome<DoneResponse> {
        if !request.paths.is_empty() {
            self.toolkit
                .load_custom_transformations(&request.paths)
                .await
                .map_err(fail(LOAD_XFORMS_FAILED))?;
            tracing::info!(count = request.paths.len(), "Loaded custom transformations");
        }
        Ok(DoneResponse { done: true })
    }
}

/// The graph a serialized transformation applies to.
fn transformation_target(transformation: &Value) -> Result<GraphId, CoreError> {
    let obj = transformation
        .as_object()
        .ok_or_else(|| CoreError::invalid_graph("transformation is not an object"))?;
    if !obj.get("transformation").is_some_and(Value::is_string) {
        return Err(CoreError::invalid_graph(
            "transformation has no 'transformation' class name",
        ));
    }
    let id = obj
        .get("sdfg_id")
        .or_else(|| obj.get("cfg_id"))
        .map_or(Some(0), Value::as_i64)
        .ok_or_else(|| CoreError::invalid_graph("transformation graph id is not an integer"))?;
    usize::try_from(id)
        .map(GraphId)
        .map_err(|_| CoreError::GraphNotFound(id))
}

/// Approximate check from the serialized form: a `classpath` member or the
/// generic `LibraryNode` type. The toolkit makes the final decision when it
/// expands the node.
fn is_library_node(node: &Node) -> bool {
    node.kind() == "LibraryNode" || node.fields.contains_key("classpath")
}
