//! Turning an editor selection into a subgraph query.

use sdfgd_core::{CoreResult, ElementRef, Sdfg};
use sdfgd_toolkit::SubgraphSelection;
use serde_json::Value;
use std::collections::BTreeSet;

/// Warning attached to a listing when the selection spans several graphs.
pub const MULTIPLE_GRAPHS_WARNING: &str = "More than one SDFG selected, ignoring subgraph";

/// What a selection means for subgraph transformations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionPlan {
    /// Flattened ids of every graph touched by the selection.
    pub graphs: BTreeSet<usize>,
    /// The subgraph formed by the selection, if any.
    pub subgraph: Option<SubgraphSelection>,
}

impl SelectionPlan {
    /// Build the plan for a list of selection descriptors.
    ///
    /// State and node descriptors are resolved against `sdfg`; any that do
    /// not resolve fail the whole plan. Other descriptor kinds (edges, for
    /// instance) only count towards the set of touched graphs.
    ///
    /// Selected states form a multi-state subgraph. Otherwise selected nodes
    /// form a subgraph only when they all sit in one state.
    pub fn build(sdfg: &Sdfg, selected: &[Value]) -> CoreResult<Self> {
        let mut plan = Self::default();
        let mut states: Vec<(usize, usize)> = Vec::new();
        let mut nodes: Vec<(usize, usize, usize)> = Vec::new();

        for descriptor in selected {
            let kind = descriptor.get("type").and_then(Value::as_str);
            if !matches!(kind, Some("state") | Some("node")) {
                if let Some(graph) = graph_id(descriptor) {
                    plan.graphs.insert(graph);
                }
                continue;
            }

            let element = ElementRef::from_selection(descriptor)?;
            sdfg.resolve(&element.address())?;
            plan.graphs.insert(element.graph_id().index());
            match element {
                ElementRef::State { graph, state } => states.push((graph.index(), state)),
                ElementRef::Node { graph, state, node } => {
                    nodes.push((graph.index(), state, node))
                }
                _ => {}
            }
        }

        if plan.graphs.len() > 1 {
            return Ok(plan);
        }

        if let Some(&(graph, _)) = states.first() {
            let mut picked = Vec::new();
            for (_, state) in states {
                if !picked.contains(&state) {
                    picked.push(state);
                }
            }
            plan.subgraph = Some(SubgraphSelection::States {
                graph,
                states: picked,
            });
        } else if let Some(&(graph, state, _)) = nodes.first() {
            if nodes.iter().all(|&(g, s, _)| g == graph && s == state) {
                let mut picked = Vec::new();
                for (_, _, node) in nodes {
                    if !picked.contains(&node) {
                        picked.push(node);
                    }
                }
                plan.subgraph = Some(SubgraphSelection::Nodes {
                    graph,
                    state,
                    nodes: picked,
                });
            }
        }

        Ok(plan)
    }

    /// The selection touches more than one graph.
    pub fn spans_multiple_graphs(&self) -> bool {
        self.graphs.len() > 1
    }

    /// The subgraph to ask the toolkit about. Subgraph transformations are
    /// single-state, so multi-state selections are never queried.
    pub fn queryable_subgraph(&self) -> Option<&SubgraphSelection> {
        self.subgraph.as_ref().filter(|s| !s.is_multi_state())
    }
}

fn graph_id(descriptor: &Value) -> Option<usize> {
    descriptor
        .get("sdfg_id")
        .or_else(|| descriptor.get("sdfgId"))
        .and_then(Value::as_u64)
        .map(|id| id as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn plan(selected: Value) -> CoreResult<SelectionPlan> {
        let sdfg = Sdfg::from_value(sample()).unwrap();
        let selected = selected.as_array().cloned().unwrap_or_default();
        SelectionPlan::build(&sdfg, &selected)
    }

    #[test]
    fn test_empty_selection() {
        let plan = plan(json!([])).unwrap();
        assert!(plan.graphs.is_empty());
        assert_eq!(plan.subgraph, None);
    }

    #[test]
    fn test_nodes_in_one_state() {
        let plan = plan(json!([
            {"type": "node", "sdfg_id": 0, "sdfgId": 0, "state_id": 1, "id": 0},
            {"type": "node", "sdfg_id": 0, "sdfgId": 0, "state_id": 1, "id": 2},
            {"type": "node", "sdfg_id": 0, "sdfgId": 0, "state_id": 1, "id": 0}
        ]))
        .unwrap();
        assert_eq!(
            plan.queryable_subgraph(),
            Some(&SubgraphSelection::Nodes {
                graph: 0,
                state: 1,
                nodes: vec![0, 2]
            })
        );
    }

    #[test]
    fn test_nodes_across_states_form_no_subgraph() {
        let plan = plan(json!([
            {"type": "node", "sdfg_id": 0, "state_id": 0, "id": 0},
            {"type": "node", "sdfg_id": 0, "state_id": 1, "id": 1}
        ]))
        .unwrap();
        assert_eq!(plan.subgraph, None);
        assert!(!plan.spans_multiple_graphs());
    }

    #[test]
    fn test_states_are_not_queried() {
        let plan = plan(json!([
            {"type": "state", "sdfg_id": 0, "id": 1},
            {"type": "node", "sdfg_id": 0, "state_id": 1, "id": 1}
        ]))
        .unwrap();
        assert_eq!(
            plan.subgraph,
            Some(SubgraphSelection::States {
                graph: 0,
                states: vec![1]
            })
        );
        assert_eq!(plan.queryable_subgraph(), None);
    }

    #[test]
    fn test_multiple_graphs() {
        let plan = plan(json!([
            {"type": "state", "sdfg_id": 0, "id": 0},
            {"type": "state", "sdfg_id": 1, "id": 0}
        ]))
        .unwrap();
        assert!(plan.spans_multiple_graphs());
        assert_eq!(plan.subgraph, None);
    }

    #[test]
    fn test_other_kinds_count_graphs() {
        let plan = plan(json!([
            {"type": "node", "sdfg_id": 0, "state_id": 1, "id": 1},
            {"type": "edge", "sdfgId": 1, "state_id": 0, "id": 0}
        ]))
        .unwrap();
        assert!(plan.spans_multiple_graphs());
    }

    #[test]
    fn test_unresolvable_selection_fails() {
        let err = plan(json!([{"type": "node", "sdfg_id": 0, "state_id": 1, "id": 40}])).unwrap_err();
        assert!(err.is_resolution());

        let err = plan(json!([{"type": "state", "sdfg_id": 7, "id": 0}])).unwrap_err();
        assert!(err.is_resolution());
    }
}
