//! Reference Graph Analysis
//!
//! Builds the message reference graph and finds cycles with strongly connected
//! components. A cycle made only of singular message fields describes a value
//! that can never be finite and is rejected; a cycle that passes through at
//! least one repeated field is an ordinary recursive type.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::message::{FieldType, MessageId, MessageType};

/// How one message refers to another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Non-repeated message field
    Singular,
    /// Repeated message field
    Repeated,
}

/// Reference graph over the message arena. Node `i` is `MessageId(i)`.
pub type ReferenceGraph = DiGraph<MessageId, EdgeKind>;

/// Build the reference graph for an arena of messages
pub fn build_reference_graph(messages: &[MessageType]) -> ReferenceGraph {
    let mut graph = DiGraph::with_capacity(messages.len(), messages.len() * 2);
    for i in 0..messages.len() {
        graph.add_node(MessageId(i));
    }
    for (i, message) in messages.iter().enumerate() {
        for field in &message.fields {
            if let FieldType::Message(target) = field.ty {
                let kind = if field.repeated {
                    EdgeKind::Repeated
                } else {
                    EdgeKind::Singular
                };
                graph.add_edge(NodeIndex::new(i), NodeIndex::new(target.0), kind);
            }
        }
    }
    graph
}

/// Find the first cycle made only of singular fields.
///
/// Returns the chain of full names, starting and ending at the same type. The
/// choice is deterministic: the offending component with the lexicographically
/// smallest member wins and the walk follows neighbours in name order.
pub fn find_illegal_cycle(graph: &ReferenceGraph, messages: &[MessageType]) -> Option<Vec<String>> {
    let singular = graph.filter_map(
        |_, id| Some(*id),
        |_, kind| (*kind == EdgeKind::Singular).then_some(()),
    );

    let start = kosaraju_scc(&singular)
        .into_iter()
        .filter(|scc| {
            scc.len() > 1 || singular.find_edge(scc[0], scc[0]).is_some()
        })
        .filter_map(|scc| {
            let members: HashSet<NodeIndex> = scc.iter().copied().collect();
            let start = scc
                .into_iter()
                .min_by(|a, b| messages[a.index()].full_name.cmp(&messages[b.index()].full_name))?;
            Some((start, members))
        })
        .min_by(|(a, _), (b, _)| messages[a.index()].full_name.cmp(&messages[b.index()].full_name));

    let (start, members) = start?;

    let mut stack = vec![start];
    let mut visited = HashSet::from([start]);
    walk_back_to(&singular, messages, start, start, &members, &mut stack, &mut visited);

    Some(
        stack
            .into_iter()
            .map(|idx| messages[idx.index()].full_name.clone())
            .collect(),
    )
}

fn walk_back_to(
    graph: &DiGraph<MessageId, ()>,
    messages: &[MessageType],
    node: NodeIndex,
    start: NodeIndex,
    members: &HashSet<NodeIndex>,
    stack: &mut Vec<NodeIndex>,
    visited: &mut HashSet<NodeIndex>,
) -> bool {
    let mut next: Vec<NodeIndex> = graph
        .edges_directed(node, Direction::Outgoing)
        .map(|e| e.target())
        .filter(|t| members.contains(t))
        .collect();
    next.sort_by(|a, b| messages[a.index()].full_name.cmp(&messages[b.index()].full_name));
    next.dedup();

    for target in next {
        if target == start {
            stack.push(start);
            return true;
        }
        if visited.insert(target) {
            stack.push(target);
            if walk_back_to(graph, messages, target, start, members, stack, visited) {
                return true;
            }
            stack.pop();
        }
    }
    false
}

/// Messages that take part in any reference cycle (legal recursive types)
pub fn recursive_messages(graph: &ReferenceGraph) -> HashSet<MessageId> {
    kosaraju_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.find_edge(scc[0], scc[0]).is_some())
        .flatten()
        .filter_map(|idx| graph.node_weight(idx).copied())
        .collect()
}
