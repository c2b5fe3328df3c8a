//! Undirected route-graph helpers.

use crate::model::{NodeId, RouteNode};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Order-independent key of an undirected edge.
///
/// `EdgeKey::new(3, 7) == EdgeKey::new(7, 3)`, so an edge listed on both of
/// its endpoints maps to a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    low: NodeId,
    high: NodeId,
}

impl EdgeKey {
    /// Key for the edge between `a` and `b`. Self-loops have no key.
    pub fn new(a: NodeId, b: NodeId) -> Option<Self> {
        if a == b {
            return None;
        }
        Some(Self {
            low: a.min(b),
            high: a.max(b),
        })
    }

    pub fn endpoints(self) -> (NodeId, NodeId) {
        (self.low, self.high)
    }

    pub fn contains(self, id: NodeId) -> bool {
        self.low == id || self.high == id
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge-{}-{}", self.low, self.high)
    }
}

/// All undirected edges listed by `nodes`, each once.
pub fn edges<'a>(nodes: impl IntoIterator<Item = &'a RouteNode>) -> BTreeSet<EdgeKey> {
    let mut out = BTreeSet::new();
    for node in nodes {
        let Some(id) = node.id() else { continue };
        for &other in node.connections() {
            if let Some(key) = EdgeKey::new(id, other) {
                out.insert(key);
            }
        }
    }
    out
}

/// Pairs `(a, b)` where `a` lists `b` but `b` (present in `nodes`) does not list `a`.
///
/// Targets missing from `nodes` are not reported; they may live on another floor.
pub fn asymmetric_pairs(nodes: &[RouteNode]) -> Vec<(NodeId, NodeId)> {
    let by_id: HashMap<NodeId, &RouteNode> = nodes
        .iter()
        .filter_map(|n| n.id().map(|id| (id, n)))
        .collect();
    let mut out = Vec::new();
    for node in nodes {
        let Some(id) = node.id() else { continue };
        for &other in node.connections() {
            if let Some(target) = by_id.get(&other) {
                if !target.is_connected_to(id) {
                    out.push((id, other));
                }
            }
        }
    }
    out
}

/// Every unordered pair of `ids`, in input order: the edges of a complete graph.
pub fn complete_graph_pairs(ids: &[NodeId]) -> Vec<(NodeId, NodeId)> {
    let mut pairs = Vec::with_capacity(ids.len() * ids.len().saturating_sub(1) / 2);
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            if a != b {
                pairs.push((a, b));
            }
        }
    }
    pairs
}
