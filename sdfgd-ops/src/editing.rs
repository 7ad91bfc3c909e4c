//! Native structural editing: inserting and removing graph elements.
//!
//! Both operations work directly on the decoded arena and never reach the
//! toolkit. Inserted elements are returned as freshly encoded addresses so the
//! editor can select them without another round trip.

use crate::{fail, reject, SdfgResponse};
use sdfgd_core::{
    load_sdfg_lenient, Address, CoreError, CoreResult, ElementRef, Fields, GraphId, Node,
    NodeLocation, OperationError, Outcome, Sdfg,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const INSERT_FAILED: &str = "Failed to add element";
const DELETE_FAILED: &str = "Failed to delete element";
const NO_ADDRESS: &str = "NONE";

/// Request to insert an element.
#[derive(Debug, Clone, Deserialize)]
pub struct InsertRequest {
    /// The graph.
    pub sdfg: Value,
    /// Element type, e.g. `"Tasklet"` or `"LibraryNode|<class path>"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Address of the container, or of the edge end for `Edge`. Absent means
    /// the root graph.
    #[serde(default)]
    pub parent: Option<String>,
    /// Address of the edge start for `Edge`.
    #[serde(default)]
    pub edge_a: Option<String>,
}

/// The edited graph plus the addresses of what was inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertResponse {
    /// The graph.
    pub sdfg: Value,
    /// Addresses of the inserted elements; `["NONE"]` for edges.
    pub uuid: Vec<String>,
}

/// Request to remove elements.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoveRequest {
    /// The graph.
    pub sdfg: Value,
    /// Addresses of the elements to remove.
    #[serde(default)]
    pub uuids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ElementKind {
    State,
    AccessNode,
    Map,
    Consume,
    Tasklet,
    NestedSdfg,
    LibraryNode(Option<String>),
    Edge,
}

impl ElementKind {
    fn parse(kind: &str) -> Option<Self> {
        let (kind, libname) = match kind.split_once('|') {
            Some((kind, libname)) => (kind, Some(libname.trim())),
            None => (kind, None),
        };
        Some(match kind {
            "SDFGState" => Self::State,
            "AccessNode" => Self::AccessNode,
            "Map" => Self::Map,
            "Consume" => Self::Consume,
            "Tasklet" => Self::Tasklet,
            "NestedSDFG" => Self::NestedSdfg,
            "LibraryNode" => Self::LibraryNode(
                libname.filter(|name| !name.is_empty()).map(str::to_string),
            ),
            "Edge" => Self::Edge,
            _ => return None,
        })
    }

    fn failure_message(&self) -> &'static str {
        match self {
            Self::State => "Failed to add state",
            Self::AccessNode => "Failed to add access node",
            Self::Map => "Failed to add map",
            Self::Consume => "Failed to add consume scope",
            Self::Tasklet => "Failed to add tasklet",
            Self::NestedSdfg => "Failed to add nested SDFG",
            Self::LibraryNode(_) => "Failed to add library node",
            Self::Edge => "Failed to add edge",
        }
    }
}

/// Insert an element and return the graph with the new element addresses.
pub fn insert_element(request: InsertRequest) -> Outcome<InsertResponse> {
    let mut sdfg = load_sdfg_lenient(request.sdfg)?;

    let Some(kind) = ElementKind::parse(&request.kind) else {
        return reject(
            INSERT_FAILED,
            format!("UnsupportedElement: Unknown element type '{}'", request.kind),
        );
    };
    let message = kind.failure_message();

    let inserted = match &kind {
        ElementKind::LibraryNode(None) => {
            return reject(message, "Must provide a valid library node type");
        }
        ElementKind::Edge => {
            let Some(start) = request.edge_a.as_deref() else {
                return reject(message, "No edge starting point provided");
            };
            let start = sdfg.resolve_str(start).map_err(fail(message))?.element;
            let end = resolve_parent(&sdfg, request.parent.as_deref()).map_err(fail(message))?;
            if !connect(&mut sdfg, start, end).map_err(fail(message))? {
                return reject(message, "Must connect two nodes or two states");
            }
            Vec::new()
        }
        kind => {
            let parent =
                resolve_parent(&sdfg, request.parent.as_deref()).map_err(fail(message))?;
            insert_into(&mut sdfg, kind, parent).map_err(fail(message))?
        }
    };

    let uuid = if inserted.is_empty() {
        vec![NO_ADDRESS.to_string()]
    } else {
        inserted
            .iter()
            .map(|element| sdfg.address_of(element).to_string())
            .collect()
    };
    tracing::debug!(kind = %request.kind, ?uuid, "Inserted element");

    Ok(InsertResponse {
        sdfg: sdfg.to_value(),
        uuid,
    })
}

/// Remove every addressed element, or nothing if any address does not
/// resolve.
pub fn remove_elements(request: RemoveRequest) -> Outcome<SdfgResponse> {
    let mut sdfg = load_sdfg_lenient(request.sdfg)?;

    let mut targets = Vec::with_capacity(request.uuids.len());
    for uuid in &request.uuids {
        let element = sdfg.resolve_str(uuid).map_err(fail(DELETE_FAILED))?.element;
        let element = match element {
            ElementRef::Graph(id) => match sdfg.nested_owner(id) {
                Some(owner) => ElementRef::from(owner),
                None => {
                    let err = CoreError::UnsupportedElement(
                        "the root graph cannot be removed".to_string(),
                    );
                    return Err(OperationError::from_error(DELETE_FAILED, &err));
                }
            },
            other => other,
        };
        if !targets.contains(&element) {
            targets.push(element);
        }
    }

    targets.sort_by_key(|element| std::cmp::Reverse(removal_key(element)));
    for element in &targets {
        sdfg.remove(element).map_err(fail(DELETE_FAILED))?;
    }
    tracing::debug!(count = targets.len(), "Removed elements");

    Ok(SdfgResponse {
        sdfg: sdfg.to_value(),
    })
}

/// Sort key under which removing in descending order never shifts a target
/// that is still pending: deeper graphs first, then within a graph dataflow
/// edges, nodes, interstate edges and states, each by descending position.
fn removal_key(element: &ElementRef) -> (usize, std::cmp::Reverse<u8>, usize, usize) {
    let (tier, outer, inner) = match *element {
        ElementRef::Edge {
            state: Some(state),
            edge,
            ..
        } => (0, state, edge),
        ElementRef::Node { state, node, .. } => (1, state, node),
        ElementRef::Edge {
            state: None, edge, ..
        } => (2, 0, edge),
        ElementRef::State { state, .. } => (3, state, 0),
        ElementRef::Graph(_) => (4, 0, 0),
    };
    (
        element.graph_id().index(),
        std::cmp::Reverse(tier),
        outer,
        inner,
    )
}

fn resolve_parent(sdfg: &Sdfg, parent: Option<&str>) -> CoreResult<ElementRef> {
    match parent.map(str::trim) {
        None | Some("") | Some(NO_ADDRESS) => Ok(ElementRef::Graph(GraphId::ROOT)),
        Some(text) => {
            let address: Address = text.parse()?;
            if address.is_none() {
                return Ok(ElementRef::Graph(GraphId::ROOT));
            }
            Ok(sdfg.resolve(&address)?.element)
        }
    }
}

fn insert_into(
    sdfg: &mut Sdfg,
    kind: &ElementKind,
    parent: ElementRef,
) -> CoreResult<Vec<ElementRef>> {
    if *kind == ElementKind::State {
        let graph = match parent {
            ElementRef::Graph(graph) => graph,
            ElementRef::Node { graph, state, node } => sdfg
                .node(NodeLocation { graph, state, node })?
                .nested
                .ok_or_else(|| {
                    CoreError::UnsupportedElement(format!(
                        "states can only be added to a graph or a nested SDFG, not node {parent}"
                    ))
                })?,
            other => {
                return Err(CoreError::UnsupportedElement(format!(
                    "states can only be added to a graph or a nested SDFG, not {other}"
                )))
            }
        };
        let label = format!("state_{}", sdfg.graph(graph)?.states.len());
        let state = sdfg.add_state(
            graph,
            fields(json!({"type": "SDFGState", "label": label, "attributes": {}})),
        )?;
        return Ok(vec![ElementRef::State { graph, state }]);
    }

    let ElementRef::State { graph, state } = parent else {
        return Err(CoreError::UnsupportedElement(format!(
            "nodes can only be added to a state, not {parent}"
        )));
    };
    let at = |node| ElementRef::Node { graph, state, node };
    let next = sdfg.state(graph, state)?.nodes.len();

    let added = match kind {
        ElementKind::AccessNode => {
            let data = first_array(sdfg, graph)?;
            let node = sdfg.add_node(
                graph,
                state,
                Node::new(fields(json!({
                    "type": "AccessNode",
                    "label": data,
                    "attributes": {"data": data},
                    "scope_entry": null,
                    "scope_exit": null
                }))),
            )?;
            vec![at(node)]
        }
        ElementKind::Map => {
            let entry = scope_node("MapEntry", "map", next, json!({
                "label": "map",
                "params": ["i"],
                "range": {
                    "type": "Range",
                    "ranges": [{"start": "0", "end": "0", "step": "1", "tile": "1"}]
                }
            }));
            let exit = scope_node("MapExit", "map", next, json!({}));
            vec![
                at(sdfg.add_node(graph, state, entry)?),
                at(sdfg.add_node(graph, state, exit)?),
            ]
        }
        ElementKind::Consume => {
            let entry = scope_node("ConsumeEntry", "consume", next, json!({
                "label": "consume",
                "pe_index": "i",
                "num_pes": "1"
            }));
            let exit = scope_node("ConsumeExit", "consume", next, json!({}));
            vec![
                at(sdfg.add_node(graph, state, entry)?),
                at(sdfg.add_node(graph, state, exit)?),
            ]
        }
        ElementKind::Tasklet => {
            let node = sdfg.add_node(
                graph,
                state,
                Node::new(fields(json!({
                    "type": "Tasklet",
                    "label": "placeholder",
                    "attributes": {
                        "label": "placeholder",
                        "code": {"string_data": "", "language": "Python"},
                        "in_connectors": {"in": null},
                        "out_connectors": {"out": null}
                    },
                    "scope_entry": null,
                    "scope_exit": null
                }))),
            )?;
            vec![at(node)]
        }
        ElementKind::NestedSdfg => {
            let nested = json!({
                "type": "SDFG",
                "attributes": {
                    "name": "nested_sdfg",
                    "_arrays": {"in": array("float32"), "out": array("float32")}
                },
                "nodes": [],
                "edges": []
            });
            let node = sdfg.add_nested_node(
                graph,
                state,
                fields(json!({
                    "type": "NestedSDFG",
                    "label": "nested_sdfg",
                    "attributes": {
                        "label": "nested_sdfg",
                        "in_connectors": {"in": null},
                        "out_connectors": {"out": null}
                    },
                    "scope_entry": null,
                    "scope_exit": null
                })),
                nested,
            )?;
            vec![at(node)]
        }
        ElementKind::LibraryNode(Some(classpath)) => {
            let name = classpath.rsplit('.').next().unwrap_or(classpath);
            let node = sdfg.add_node(
                graph,
                state,
                Node::new(fields(json!({
                    "type": name,
                    "label": name,
                    "classpath": classpath,
                    "attributes": {"name": name, "label": name},
                    "scope_entry": null,
                    "scope_exit": null
                }))),
            )?;
            vec![at(node)]
        }
        ElementKind::State | ElementKind::LibraryNode(None) | ElementKind::Edge => {
            return Err(CoreError::UnsupportedElement(format!(
                "cannot insert {kind:?} into a state"
            )))
        }
    };
    Ok(added)
}

/// Connect two nodes of one state or two states of one graph. Returns false
/// when the endpoints do not form such a pair.
fn connect(sdfg: &mut Sdfg, start: ElementRef, end: ElementRef) -> CoreResult<bool> {
    match (start, end) {
        (
            ElementRef::Node {
                graph,
                state,
                node: src,
            },
            ElementRef::Node {
                graph: end_graph,
                state: end_state,
                node: dst,
            },
        ) if graph == end_graph && state == end_state => {
            sdfg.add_state_edge(
                graph,
                state,
                src,
                dst,
                fields(json!({
                    "type": "MultiConnectorEdge",
                    "src_connector": null,
                    "dst_connector": null,
                    "attributes": {"data": {"type": "Memlet", "attributes": {}}}
                })),
            )?;
            Ok(true)
        }
        (
            ElementRef::State { graph, state: src },
            ElementRef::State {
                graph: end_graph,
                state: dst,
            },
        ) if graph == end_graph => {
            sdfg.add_interstate_edge(
                graph,
                src,
                dst,
                fields(json!({
                    "type": "Edge",
                    "attributes": {"data": {"type": "InterstateEdge", "attributes": {}}}
                })),
            )?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Name of the first data container of a graph, creating `tmp` when there is
/// none.
fn first_array(sdfg: &mut Sdfg, graph: GraphId) -> CoreResult<String> {
    let attributes = sdfg.graph_mut(graph)?.attributes_mut();
    let arrays = attributes
        .entry("_arrays")
        .or_insert_with(|| Value::Object(Fields::new()));
    if !arrays.is_object() {
        *arrays = Value::Object(Fields::new());
    }
    let Some(arrays) = arrays.as_object_mut() else {
        return Err(CoreError::invalid_graph("'_arrays' is not an object"));
    };
    if let Some(name) = arrays.keys().next() {
        return Ok(name.clone());
    }
    arrays.insert("tmp".to_string(), array("float64"));
    Ok("tmp".to_string())
}

/// An entry or exit node of a scope whose entry sits at `entry`.
fn scope_node(kind: &str, label: &str, entry: usize, attributes: Value) -> Node {
    let scope_entry = if kind.ends_with("Entry") {
        Value::Null
    } else {
        Value::String(entry.to_string())
    };
    Node::new(fields(json!({
        "type": kind,
        "label": label,
        "attributes": attributes,
        "scope_entry": scope_entry,
        "scope_exit": (entry + 1).to_string()
    })))
}

fn array(dtype: &str) -> Value {
    json!({
        "type": "Array",
        "attributes": {"dtype": dtype, "shape": ["1"], "transient": false}
    })
}

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn insert(kind: &str, parent: Option<&str>, edge_a: Option<&str>) -> Outcome<InsertResponse> {
        insert_element(InsertRequest {
            sdfg: sample(),
            kind: kind.to_string(),
            parent: parent.map(str::to_string),
            edge_a: edge_a.map(str::to_string),
        })
    }

    fn remove(uuids: &[&str]) -> Outcome<SdfgResponse> {
        remove_elements(RemoveRequest {
            sdfg: sample(),
            uuids: uuids.iter().map(|u| u.to_string()).collect(),
        })
    }

    fn reload(value: &Value) -> Sdfg {
        Sdfg::from_value(value.clone()).unwrap()
    }

    #[rstest]
    #[case(None)]
    #[case(Some("-1/-1/-1/-1"))]
    #[case(Some("0/-1/-1/-1"))]
    fn test_insert_state_into_root(#[case] parent: Option<&str>) {
        let response = insert("SDFGState", parent, None).unwrap();
        assert_eq!(response.uuid, vec!["0/2/-1/-1"]);
        let sdfg = reload(&response.sdfg);
        assert_eq!(sdfg.root().states[2].label(), "state_2");
    }

    #[test]
    fn test_insert_state_into_nested_graph() {
        let response = insert("SDFGState", Some("0/1/4/-1"), None).unwrap();
        assert_eq!(response.uuid, vec!["1/1/-1/-1"]);
        assert_eq!(reload(&response.sdfg).graph(GraphId(1)).unwrap().states.len(), 2);
    }

    #[test]
    fn test_insert_state_into_plain_node_fails() {
        let err = insert("SDFGState", Some("0/1/1/-1"), None).unwrap_err();
        assert_eq!(err.message, "Failed to add state");
        assert!(err.details.starts_with("UnsupportedElement: "));
    }

    #[test]
    fn test_insert_access_node_uses_existing_array() {
        let response = insert("AccessNode", Some("0/0/-1/-1"), None).unwrap();
        assert_eq!(response.uuid, vec!["0/0/1/-1"]);
        let node = &response.sdfg["nodes"][0]["nodes"][1];
        assert_eq!(node["attributes"]["data"], json!("A"));
    }

    #[test]
    fn test_insert_access_node_creates_array() {
        let response = insert("AccessNode", Some("1/0/-1/-1"), None).unwrap();
        let nested = &response.sdfg["nodes"][1]["nodes"][4]["attributes"]["sdfg"];
        assert_eq!(nested["attributes"]["_arrays"]["tmp"]["attributes"]["dtype"], json!("float64"));
        assert_eq!(nested["nodes"][0]["nodes"][0]["label"], json!("tmp"));
    }

    #[test]
    fn test_insert_map_scope() {
        let response = insert("Map", Some("0/0/-1/-1"), None).unwrap();
        assert_eq!(response.uuid, vec!["0/0/1/-1", "0/0/2/-1"]);
        let nodes = &response.sdfg["nodes"][0]["nodes"];
        assert_eq!(nodes[1]["type"], json!("MapEntry"));
        assert_eq!(nodes[1]["scope_exit"], json!("2"));
        assert_eq!(nodes[2]["type"], json!("MapExit"));
        assert_eq!(nodes[2]["scope_entry"], json!("1"));
    }

    #[test]
    fn test_insert_consume_scope() {
        let response = insert("Consume", Some("0/0/-1/-1"), None).unwrap();
        let nodes = &response.sdfg["nodes"][0]["nodes"];
        assert_eq!(nodes[1]["type"], json!("ConsumeEntry"));
        assert_eq!(nodes[2]["type"], json!("ConsumeExit"));
    }

    #[test]
    fn test_insert_tasklet() {
        let response = insert("Tasklet", Some("0/1/-1/-1"), None).unwrap();
        assert_eq!(response.uuid, vec!["0/1/5/-1"]);
        assert_eq!(response.sdfg["nodes"][1]["nodes"][5]["label"], json!("placeholder"));
    }

    #[test]
    fn test_insert_nested_sdfg_renumbers_arena() {
        let response = insert("NestedSDFG", Some("0/0/-1/-1"), None).unwrap();
        assert_eq!(response.uuid, vec!["0/0/1/-1"]);
        let sdfg = reload(&response.sdfg);
        assert_eq!(sdfg.graph_count(), 3);
        // The new graph precedes the one owned by state 1 in pre-order.
        assert_eq!(sdfg.graph(GraphId(1)).unwrap().name(), "nested_sdfg");
        assert_eq!(sdfg.graph(GraphId(2)).unwrap().name(), "inner");
    }

    #[test]
    fn test_insert_library_node() {
        let response =
            insert("LibraryNode|dace.libraries.standard.nodes.Reduce", Some("0/0/-1/-1"), None)
                .unwrap();
        let node = &response.sdfg["nodes"][0]["nodes"][1];
        assert_eq!(node["type"], json!("Reduce"));
        assert_eq!(node["classpath"], json!("dace.libraries.standard.nodes.Reduce"));
    }

    #[rstest]
    #[case("LibraryNode")]
    #[case("LibraryNode|")]
    fn test_insert_library_node_requires_type(#[case] kind: &str) {
        let err = insert(kind, Some("0/0/-1/-1"), None).unwrap_err();
        assert_eq!(
            err,
            OperationError::new(
                "Failed to add library node",
                "Must provide a valid library node type"
            )
        );
    }

    #[test]
    fn test_insert_node_outside_state_fails() {
        let err = insert("Tasklet", None, None).unwrap_err();
        assert_eq!(err.message, "Failed to add tasklet");
    }

    #[test]
    fn test_insert_unknown_kind() {
        let err = insert("Teapot", Some("0/0/-1/-1"), None).unwrap_err();
        assert_eq!(err.message, INSERT_FAILED);
    }

    #[test]
    fn test_insert_dataflow_edge() {
        let response = insert("Edge", Some("0/1/3/-1"), Some("0/1/2/-1")).unwrap();
        assert_eq!(response.uuid, vec![NO_ADDRESS]);
        let edges = &response.sdfg["nodes"][1]["edges"];
        assert_eq!(edges[2]["src"], json!("2"));
        assert_eq!(edges[2]["dst"], json!("3"));
        assert_eq!(edges[2]["attributes"]["data"]["type"], json!("Memlet"));
    }

    #[test]
    fn test_insert_interstate_edge() {
        let response = insert("Edge", Some("0/0/-1/-1"), Some("0/1/-1/-1")).unwrap();
        let edges = &response.sdfg["edges"];
        assert_eq!(edges[1]["src"], json!("1"));
        assert_eq!(edges[1]["dst"], json!("0"));
        assert_eq!(edges[1]["attributes"]["data"]["type"], json!("InterstateEdge"));
    }

    #[rstest]
    #[case(Some("0/0/0/-1"), Some("0/1/0/-1"))]
    #[case(Some("0/0/-1/-1"), Some("0/1/0/-1"))]
    #[case(None, Some("0/1/0/-1"))]
    fn test_insert_edge_between_mismatched_elements(
        #[case] parent: Option<&str>,
        #[case] edge_a: Option<&str>,
    ) {
        let err = insert("Edge", parent, edge_a).unwrap_err();
        assert_eq!(
            err,
            OperationError::new("Failed to add edge", "Must connect two nodes or two states")
        );
    }

    #[test]
    fn test_insert_edge_requires_start() {
        let err = insert("Edge", Some("0/1/0/-1"), None).unwrap_err();
        assert_eq!(
            err,
            OperationError::new("Failed to add edge", "No edge starting point provided")
        );
    }

    #[test]
    fn test_remove_node_drops_incident_edges() {
        let response = remove(&["0/1/1/-1"]).unwrap();
        let state = &response.sdfg["nodes"][1];
        assert_eq!(state["nodes"].as_array().unwrap().len(), 4);
        assert!(state["edges"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_remove_several_in_one_state() {
        // Removing node 0 first would shift node 3 onto node 2.
        let response = remove(&["0/1/0/-1", "0/1/3/-1"]).unwrap();
        let labels: Vec<&str> = response.sdfg["nodes"][1]["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["label"].as_str().unwrap())
            .collect();
        assert_eq!(labels, vec!["t", "map", "inner"]);
    }

    #[test]
    fn test_remove_edge_and_its_endpoint() {
        let response = remove(&["0/1/0/-1", "0/1/-1/1"]).unwrap();
        assert!(response.sdfg["nodes"][1]["edges"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_remove_state_and_interstate_edge() {
        let response = remove(&["0/0/-1/-1", "0/-1/-1/0"]).unwrap();
        let sdfg = reload(&response.sdfg);
        assert_eq!(sdfg.root().states.len(), 1);
        assert!(sdfg.root().edges.is_empty());
    }

    #[test]
    fn test_remove_nested_graph_removes_owner() {
        let response = remove(&["1/-1/-1/-1", "1/0/-1/-1"]).unwrap();
        let sdfg = reload(&response.sdfg);
        assert_eq!(sdfg.graph_count(), 1);
        assert_eq!(sdfg.root().states[1].nodes.len(), 4);
    }

    #[test]
    fn test_remove_is_all_or_nothing() {
        let err = remove(&["0/1/0/-1", "0/1/40/-1"]).unwrap_err();
        assert_eq!(err.message, DELETE_FAILED);
        assert!(err.details.starts_with("NodeOutOfRange: "));
    }

    #[rstest]
    #[case("0/-1/-1/-1", "UnsupportedElement: ")]
    #[case("a/b/c", "MalformedAddress: ")]
    fn test_remove_rejects(#[case] uuid: &str, #[case] details: &str) {
        let err = remove(&[uuid]).unwrap_err();
        assert_eq!(err.message, DELETE_FAILED);
        assert!(err.details.starts_with(details), "{}", err.details);
    }
}
