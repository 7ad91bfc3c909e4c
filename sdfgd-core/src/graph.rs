//! Arena representation of a nested SDFG.
//!
//! The editor ships graphs as nested JSON documents: a root graph holds states,
//! states hold nodes, and a `NestedSDFG` node embeds a complete graph under
//! `attributes.sdfg`. [`Sdfg`] flattens that tree into an arena of
//! [`Subgraph`]s indexed by [`GraphId`]. Nodes refer to the graph they own by
//! id instead of holding it, so there is no ownership cycle and every nested
//! graph has exactly one owner.
//!
//! Arena order is pre-order depth first (root, then nested graphs in state
//! order and node order, recursively). That order is the flattened index the
//! addressing scheme uses, and [`Sdfg::to_value`] writes it back into each
//! graph's list id so the editor sees the same numbering.
//!
//! Everything this crate does not interpret (attributes, connectors, memlet
//! payloads, ...) is preserved verbatim in the `fields` map of each element.

use crate::address::ElementRef;
use crate::error::{CoreError, CoreResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Uninterpreted JSON members of a graph element.
pub type Fields = Map<String, Value>;

const NODES: &str = "nodes";
const EDGES: &str = "edges";
const ATTRIBUTES: &str = "attributes";
const NESTED_KIND: &str = "NestedSDFG";
const NESTED_KEY: &str = "sdfg";
const LIST_ID_KEYS: [&str; 2] = ["sdfg_list_id", "cfg_list_id"];
const SCOPE_ENTRY: &str = "scope_entry";
const SCOPE_EXIT: &str = "scope_exit";
const SCOPE_DICT: &str = "scope_dict";
const START_STATE: &str = "start_state";

/// Index of a subgraph in the flattened arena. The root is `GraphId(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(pub usize);

impl GraphId {
    /// The root graph.
    pub const ROOT: GraphId = GraphId(0);

    /// Arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a node inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeLocation {
    /// Graph holding the state.
    pub graph: GraphId,
    /// State index within the graph.
    pub state: usize,
    /// Node index within the state.
    pub node: usize,
}

/// An edge between two elements of the same container.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Source element index.
    pub src: usize,
    /// Destination element index.
    pub dst: usize,
    /// Remaining JSON members (payload, connectors).
    pub fields: Fields,
}

impl Edge {
    /// Create a new edge.
    pub fn new(src: usize, dst: usize, fields: Fields) -> Self {
        Self { src, dst, fields }
    }
}

/// A dataflow node inside a state.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Subgraph owned by this node, if it is a nested SDFG.
    pub nested: Option<GraphId>,
    /// Remaining JSON members.
    pub fields: Fields,
}

impl Node {
    /// Create a node without a nested graph.
    pub fn new(fields: Fields) -> Self {
        Self {
            nested: None,
            fields,
        }
    }

    /// The serialized type name, e.g. `"AccessNode"`.
    pub fn kind(&self) -> &str {
        str_field(&self.fields, "type")
    }

    /// Node label.
    pub fn label(&self) -> &str {
        str_field(&self.fields, "label")
    }

    /// Mutable attribute map, created when missing.
    pub fn attributes_mut(&mut self) -> &mut Fields {
        attributes_mut(&mut self.fields)
    }
}

/// A state: a container of nodes and dataflow edges.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct State {
    /// Nodes in stored order.
    pub nodes: Vec<Node>,
    /// Dataflow edges; endpoints index `nodes`.
    pub edges: Vec<Edge>,
    /// Remaining JSON members.
    pub fields: Fields,
}

impl State {
    /// Create an empty state.
    pub fn new(fields: Fields) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            fields,
        }
    }

    /// State label.
    pub fn label(&self) -> &str {
        str_field(&self.fields, "label")
    }

    /// Mutable attribute map, created when missing.
    pub fn attributes_mut(&mut self) -> &mut Fields {
        attributes_mut(&mut self.fields)
    }
}

/// One graph of the arena: states plus interstate edges.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Subgraph {
    /// States in stored order.
    pub states: Vec<State>,
    /// Interstate edges; endpoints index `states`.
    pub edges: Vec<Edge>,
    /// Node owning this graph, `None` for the root.
    pub owner: Option<NodeLocation>,
    /// Remaining JSON members.
    pub fields: Fields,
}

impl Subgraph {
    /// The graph name from its attributes.
    pub fn name(&self) -> &str {
        self.fields
            .get(ATTRIBUTES)
            .and_then(|a| a.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Attribute map, if present.
    pub fn attributes(&self) -> Option<&Fields> {
        self.fields.get(ATTRIBUTES).and_then(Value::as_object)
    }

    /// Mutable attribute map, created when missing.
    pub fn attributes_mut(&mut self) -> &mut Fields {
        attributes_mut(&mut self.fields)
    }
}

/// A complete graph-of-graphs, flattened into an arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Sdfg {
    graphs: Vec<Subgraph>,
}

impl Sdfg {
    /// Decode a graph from its JSON form.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        let obj = into_object(value, "SDFG")?;
        let mut sdfg = Self { graphs: Vec::new() };
        sdfg.parse_graph(obj, None)?;
        Ok(sdfg)
    }

    /// Decode a graph from a JSON string.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Encode the arena back into nested JSON, with list ids, state ids, node
    /// ids and edge endpoints rewritten to current positions.
    pub fn to_value(&self) -> Value {
        self.emit_graph(GraphId::ROOT)
    }

    /// Number of graphs in the arena.
    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    /// The root graph.
    pub fn root(&self) -> &Subgraph {
        &self.graphs[0]
    }

    /// All graphs in flattened order.
    pub fn graphs(&self) -> impl Iterator<Item = (GraphId, &Subgraph)> {
        self.graphs.iter().enumerate().map(|(i, g)| (GraphId(i), g))
    }

    /// All graphs in flattened order, mutably.
    pub fn graphs_mut(&mut self) -> impl Iterator<Item = &mut Subgraph> {
        self.graphs.iter_mut()
    }

    /// Look up a graph.
    pub fn graph(&self, id: GraphId) -> CoreResult<&Subgraph> {
        self.graphs
            .get(id.0)
            .ok_or(CoreError::GraphNotFound(id.0 as i64))
    }

    /// Look up a graph mutably.
    pub fn graph_mut(&mut self, id: GraphId) -> CoreResult<&mut Subgraph> {
        self.graphs
            .get_mut(id.0)
            .ok_or(CoreError::GraphNotFound(id.0 as i64))
    }

    /// Look up a state.
    pub fn state(&self, graph: GraphId, state: usize) -> CoreResult<&State> {
        self.graph(graph)?
            .states
            .get(state)
            .ok_or(CoreError::StateOutOfRange {
                graph: graph.0,
                state: state as i64,
            })
    }

    /// Look up a state mutably.
    pub fn state_mut(&mut self, graph: GraphId, state: usize) -> CoreResult<&mut State> {
        self.graph_mut(graph)?
            .states
            .get_mut(state)
            .ok_or(CoreError::StateOutOfRange {
                graph: graph.0,
                state: state as i64,
            })
    }

    /// Look up a node.
    pub fn node(&self, location: NodeLocation) -> CoreResult<&Node> {
        self.state(location.graph, location.state)?
            .nodes
            .get(location.node)
            .ok_or(CoreError::NodeOutOfRange {
                graph: location.graph.0,
                state: location.state,
                node: location.node as i64,
            })
    }

    /// Look up a node mutably.
    pub fn node_mut(&mut self, location: NodeLocation) -> CoreResult<&mut Node> {
        self.state_mut(location.graph, location.state)?
            .nodes
            .get_mut(location.node)
            .ok_or(CoreError::NodeOutOfRange {
                graph: location.graph.0,
                state: location.state,
                node: location.node as i64,
            })
    }

    /// The node owning a nested graph, `None` for the root.
    pub fn nested_owner(&self, id: GraphId) -> Option<NodeLocation> {
        self.graphs.get(id.0).and_then(|g| g.owner)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Append a state to a graph, returning its index.
    pub fn add_state(&mut self, graph: GraphId, fields: Fields) -> CoreResult<usize> {
        let graph = self.graph_mut(graph)?;
        graph.states.push(State::new(fields));
        Ok(graph.states.len() - 1)
    }

    /// Append a node to a state, returning its index.
    pub fn add_node(&mut self, graph: GraphId, state: usize, node: Node) -> CoreResult<usize> {
        if node.nested.is_some() {
            return Err(CoreError::UnsupportedElement(
                "nested graphs must be added with add_nested_node".to_string(),
            ));
        }
        let state = self.state_mut(graph, state)?;
        state.nodes.push(node);
        Ok(state.nodes.len() - 1)
    }

    /// Append a `NestedSDFG` node owning the given graph JSON, returning its
    /// index. The arena is renumbered so pre-order stays dense.
    pub fn add_nested_node(
        &mut self,
        graph: GraphId,
        state: usize,
        fields: Fields,
        nested: Value,
    ) -> CoreResult<usize> {
        let node = self.state(graph, state)?.nodes.len();
        let nested_obj = into_object(nested, "nested SDFG")?;
        let owner = NodeLocation { graph, state, node };
        let arena_len = self.graphs.len();
        let nested_id = match self.parse_graph(nested_obj, Some(owner)) {
            Ok(id) => id,
            Err(e) => {
                self.graphs.truncate(arena_len);
                return Err(e);
            }
        };
        self.state_mut(graph, state)?.nodes.push(Node {
            nested: Some(nested_id),
            fields,
        });
        self.normalize();
        Ok(node)
    }

    /// Append a dataflow edge to a state, returning its index.
    pub fn add_state_edge(
        &mut self,
        graph: GraphId,
        state: usize,
        src: usize,
        dst: usize,
        fields: Fields,
    ) -> CoreResult<usize> {
        let st = self.state_mut(graph, state)?;
        let bound = st.nodes.len();
        if src >= bound || dst >= bound {
            return Err(CoreError::invalid_graph(format!(
                "edge endpoints {src} -> {dst} outside state with {bound} nodes"
            )));
        }
        st.edges.push(Edge::new(src, dst, fields));
        Ok(st.edges.len() - 1)
    }

    /// Append an interstate edge to a graph, returning its index.
    pub fn add_interstate_edge(
        &mut self,
        graph: GraphId,
        src: usize,
        dst: usize,
        fields: Fields,
    ) -> CoreResult<usize> {
        let g = self.graph_mut(graph)?;
        let bound = g.states.len();
        if src >= bound || dst >= bound {
            return Err(CoreError::invalid_graph(format!(
                "edge endpoints {src} -> {dst} outside graph with {bound} states"
            )));
        }
        g.edges.push(Edge::new(src, dst, fields));
        Ok(g.edges.len() - 1)
    }

    /// Remove an element. Incident edges go with nodes and states, and nested
    /// graphs go with the node owning them. Removing a graph removes its
    /// owning node; the root cannot be removed.
    pub fn remove(&mut self, element: &ElementRef) -> CoreResult<()> {
        match *element {
            ElementRef::Graph(id) => {
                self.graph(id)?;
                match self.nested_owner(id) {
                    Some(owner) => self.remove_node(owner),
                    None => Err(CoreError::UnsupportedElement(
                        "the root graph cannot be removed".to_string(),
                    )),
                }
            }
            ElementRef::State { graph, state } => self.remove_state(graph, state),
            ElementRef::Node { graph, state, node } => {
                self.remove_node(NodeLocation { graph, state, node })
            }
            ElementRef::Edge {
                graph,
                state: Some(state),
                edge,
            } => {
                let st = self.state_mut(graph, state)?;
                if edge >= st.edges.len() {
                    return Err(CoreError::EdgeOutOfRange {
                        container: format!("state {state} of graph {graph}"),
                        edge: edge as i64,
                    });
                }
                st.edges.remove(edge);
                Ok(())
            }
            ElementRef::Edge {
                graph,
                state: None,
                edge,
            } => {
                let g = self.graph_mut(graph)?;
                if edge >= g.edges.len() {
                    return Err(CoreError::EdgeOutOfRange {
                        container: format!("graph {graph}"),
                        edge: edge as i64,
                    });
                }
                g.edges.remove(edge);
                Ok(())
            }
        }
    }

    fn remove_state(&mut self, graph: GraphId, state: usize) -> CoreResult<()> {
        self.state(graph, state)?;
        let g = self.graph_mut(graph)?;
        g.states.remove(state);
        retain_shifted(&mut g.edges, state);
        shift_index_field(&mut g.fields, START_STATE, state, true);
        self.normalize();
        Ok(())
    }

    fn remove_node(&mut self, location: NodeLocation) -> CoreResult<()> {
        self.node(location)?;
        let st = self.state_mut(location.graph, location.state)?;
        st.nodes.remove(location.node);
        retain_shifted(&mut st.edges, location.node);
        for node in &mut st.nodes {
            shift_index_field(&mut node.fields, SCOPE_ENTRY, location.node, false);
            shift_index_field(&mut node.fields, SCOPE_EXIT, location.node, false);
        }
        self.normalize();
        Ok(())
    }

    /// Re-establish pre-order numbering and drop graphs no longer reachable
    /// from the root.
    fn normalize(&mut self) {
        let mut order = Vec::with_capacity(self.graphs.len());
        let mut stack = vec![GraphId::ROOT];
        while let Some(id) = stack.pop() {
            order.push(id);
            let children: Vec<GraphId> = self.graphs[id.0]
                .states
                .iter()
                .flat_map(|s| s.nodes.iter().filter_map(|n| n.nested))
                .collect();
            stack.extend(children.into_iter().rev());
        }

        let mut remap = vec![None; self.graphs.len()];
        for (new, old) in order.iter().enumerate() {
            remap[old.0] = Some(GraphId(new));
        }

        let mut old: Vec<Option<Subgraph>> =
            std::mem::take(&mut self.graphs).into_iter().map(Some).collect();
        for id in &order {
            if let Some(mut graph) = old[id.0].take() {
                for node in graph.states.iter_mut().flat_map(|s| s.nodes.iter_mut()) {
                    node.nested = node.nested.and_then(|n| remap[n.0]);
                }
                self.graphs.push(graph);
            }
        }
        self.refresh_owners();
    }

    fn refresh_owners(&mut self) {
        let mut owners = Vec::new();
        for (gi, graph) in self.graphs.iter().enumerate() {
            for (si, state) in graph.states.iter().enumerate() {
                for (ni, node) in state.nodes.iter().enumerate() {
                    if let Some(nested) = node.nested {
                        owners.push((
                            nested,
                            NodeLocation {
                                graph: GraphId(gi),
                                state: si,
                                node: ni,
                            },
                        ));
                    }
                }
            }
        }
        if let Some(root) = self.graphs.first_mut() {
            root.owner = None;
        }
        for (nested, owner) in owners {
            self.graphs[nested.0].owner = Some(owner);
        }
    }

    // ------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------

    fn parse_graph(&mut self, mut obj: Fields, owner: Option<NodeLocation>) -> CoreResult<GraphId> {
        if let Some(kind) = obj.get("type").and_then(Value::as_str) {
            if kind != "SDFG" {
                return Err(CoreError::invalid_graph(format!(
                    "expected a graph of type 'SDFG', found '{kind}'"
                )));
            }
        }

        let id = GraphId(self.graphs.len());
        self.graphs.push(Subgraph {
            owner,
            ..Subgraph::default()
        });

        let raw_states = take_array(&mut obj, NODES, "graph")?;
        let raw_edges = take_array(&mut obj, EDGES, "graph")?;

        let mut states = Vec::with_capacity(raw_states.len());
        for (si, raw_state) in raw_states.into_iter().enumerate() {
            let mut state_obj = into_object(raw_state, "state")?;
            let raw_nodes = take_array(&mut state_obj, NODES, "state")?;
            let raw_state_edges = take_array(&mut state_obj, EDGES, "state")?;

            let mut nodes = Vec::with_capacity(raw_nodes.len());
            for (ni, raw_node) in raw_nodes.into_iter().enumerate() {
                let mut node_obj = into_object(raw_node, "node")?;
                let nested = match take_nested(&mut node_obj)? {
                    Some(nested_obj) => {
                        let location = NodeLocation {
                            graph: id,
                            state: si,
                            node: ni,
                        };
                        Some(self.parse_graph(nested_obj, Some(location))?)
                    }
                    None => None,
                };
                nodes.push(Node {
                    nested,
                    fields: node_obj,
                });
            }

            let container = format!("state {si} of graph {id}");
            let edges = parse_edges(raw_state_edges, nodes.len(), &container)?;
            states.push(State {
                nodes,
                edges,
                fields: state_obj,
            });
        }

        let edges = parse_edges(raw_edges, states.len(), &format!("graph {id}"))?;
        let graph = &mut self.graphs[id.0];
        graph.states = states;
        graph.edges = edges;
        graph.fields = obj;
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Encoding
    // ------------------------------------------------------------------

    fn emit_graph(&self, id: GraphId) -> Value {
        let graph = &self.graphs[id.0];
        let mut obj = graph.fields.clone();

        let mut has_list_id = false;
        for key in LIST_ID_KEYS {
            if let Some(slot) = obj.get_mut(key) {
                *slot = Value::from(id.0);
                has_list_id = true;
            }
        }
        if !has_list_id {
            obj.insert(LIST_ID_KEYS[0].to_string(), Value::from(id.0));
        }

        let states = graph
            .states
            .iter()
            .enumerate()
            .map(|(si, state)| self.emit_state(si, state))
            .collect();
        obj.insert(NODES.to_string(), Value::Array(states));
        obj.insert(EDGES.to_string(), emit_edges(&graph.edges));
        Value::Object(obj)
    }

    fn emit_state(&self, index: usize, state: &State) -> Value {
        let mut obj = state.fields.clone();
        obj.insert("id".to_string(), Value::from(index));
        if obj.contains_key(SCOPE_DICT) {
            obj.insert(SCOPE_DICT.to_string(), scope_dict(state));
        }

        let nodes = state
            .nodes
            .iter()
            .enumerate()
            .map(|(ni, node)| {
                let mut node_obj = node.fields.clone();
                node_obj.insert("id".to_string(), Value::from(ni));
                if let Some(nested) = node.nested {
                    attributes_mut(&mut node_obj)
                        .insert(NESTED_KEY.to_string(), self.emit_graph(nested));
                }
                Value::Object(node_obj)
            })
            .collect();
        obj.insert(NODES.to_string(), Value::Array(nodes));
        obj.insert(EDGES.to_string(), emit_edges(&state.edges));
        Value::Object(obj)
    }
}

impl TryFrom<Value> for Sdfg {
    type Error = CoreError;

    fn try_from(value: Value) -> CoreResult<Self> {
        Self::from_value(value)
    }
}

fn str_field<'a>(fields: &'a Fields, key: &str) -> &'a str {
    fields.get(key).and_then(Value::as_str).unwrap_or("")
}

fn attributes_mut(fields: &mut Fields) -> &mut Fields {
    let slot = fields
        .entry(ATTRIBUTES.to_string())
        .or_insert_with(|| Value::Object(Fields::new()));
    if !slot.is_object() {
        *slot = Value::Object(Fields::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("attributes slot was just made an object"),
    }
}

fn into_object(value: Value, what: &str) -> CoreResult<Fields> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::invalid_graph(format!(
            "expected {what} to be an object, found {}",
            json_kind(&other)
        ))),
    }
}

fn take_array(obj: &mut Fields, key: &str, what: &str) -> CoreResult<Vec<Value>> {
    match obj.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(CoreError::invalid_graph(format!(
            "expected '{key}' of {what} to be an array, found {}",
            json_kind(&other)
        ))),
    }
}

fn take_nested(node: &mut Fields) -> CoreResult<Option<Fields>> {
    if node.get("type").and_then(Value::as_str) != Some(NESTED_KIND) {
        return Ok(None);
    }
    let nested = node
        .get_mut(ATTRIBUTES)
        .and_then(Value::as_object_mut)
        .and_then(|attrs| attrs.remove(NESTED_KEY));
    match nested {
        Some(value) => into_object(value, "nested SDFG").map(Some),
        None => Err(CoreError::invalid_graph(
            "nested SDFG node without an embedded graph",
        )),
    }
}

fn parse_index(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        _ => None,
    }
}

fn parse_edges(raw: Vec<Value>, bound: usize, container: &str) -> CoreResult<Vec<Edge>> {
    raw.into_iter()
        .enumerate()
        .map(|(i, raw_edge)| {
            let mut obj = into_object(raw_edge, "edge")?;
            let mut endpoint = |key: &str| -> CoreResult<usize> {
                let idx = obj.remove(key).as_ref().and_then(parse_index).ok_or_else(|| {
                    CoreError::invalid_graph(format!(
                        "edge {i} in {container} has no valid '{key}' endpoint"
                    ))
                })?;
                if idx >= bound {
                    return Err(CoreError::invalid_graph(format!(
                        "edge {i} in {container} references element {idx}, only {bound} exist"
                    )));
                }
                Ok(idx)
            };
            let src = endpoint("src")?;
            let dst = endpoint("dst")?;
            Ok(Edge::new(src, dst, obj))
        })
        .collect()
}

fn emit_edges(edges: &[Edge]) -> Value {
    Value::Array(
        edges
            .iter()
            .map(|edge| {
                let mut obj = edge.fields.clone();
                obj.insert("src".to_string(), Value::String(edge.src.to_string()));
                obj.insert("dst".to_string(), Value::String(edge.dst.to_string()));
                Value::Object(obj)
            })
            .collect(),
    )
}

/// Drop edges touching `removed` and shift the endpoints above it down.
fn retain_shifted(edges: &mut Vec<Edge>, removed: usize) {
    edges.retain(|e| e.src != removed && e.dst != removed);
    for edge in edges.iter_mut() {
        if edge.src > removed {
            edge.src -= 1;
        }
        if edge.dst > removed {
            edge.dst -= 1;
        }
    }
}

/// Keep a positional reference field consistent after an element was
/// removed. A reference to the removed element is nulled, or dropped when
/// `drop_dangling` is set.
fn shift_index_field(fields: &mut Fields, key: &str, removed: usize, drop_dangling: bool) {
    let Some(current) = fields.get(key).and_then(parse_index) else {
        return;
    };
    if current == removed {
        if drop_dangling {
            fields.remove(key);
        } else {
            fields.insert(key.to_string(), Value::Null);
        }
    } else if current > removed {
        let shifted = match fields.get(key) {
            Some(Value::String(_)) => Value::String((current - 1).to_string()),
            _ => Value::from(current - 1),
        };
        fields.insert(key.to_string(), shifted);
    }
}

/// Scope membership as the editor expects it: scope entry node id (or -1 for
/// the top level) to the ids of the nodes directly inside that scope.
fn scope_dict(state: &State) -> Value {
    let mut scopes: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (ni, node) in state.nodes.iter().enumerate() {
        let entry = node
            .fields
            .get(SCOPE_ENTRY)
            .and_then(parse_index)
            .map_or(-1, |e| e as i64);
        scopes.entry(entry).or_default().push(ni);
    }
    Value::Object(
        scopes
            .into_iter()
            .map(|(entry, members)| (entry.to_string(), Value::from(members)))
            .collect(),
    )
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
