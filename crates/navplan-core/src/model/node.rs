//! Route nodes: the vertices of the pedestrian navigation graph.

use super::{FloorId, NodeId};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What a route node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    #[default]
    Waypoint,
    Elevator,
    Stairs,
}

impl NodeType {
    /// Parse a node type, ignoring case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "waypoint" => Some(NodeType::Waypoint),
            "elevator" => Some(NodeType::Elevator),
            "stairs" => Some(NodeType::Stairs),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Waypoint => "waypoint",
            NodeType::Elevator => "elevator",
            NodeType::Stairs => "stairs",
        }
    }

    /// Whether nodes of this type link floors together.
    pub fn is_connector(self) -> bool {
        matches!(self, NodeType::Elevator | NodeType::Stairs)
    }

    /// Marker glyph for connector nodes.
    pub fn glyph(self) -> Option<&'static str> {
        match self {
            NodeType::Waypoint => None,
            NodeType::Elevator => Some("E"),
            NodeType::Stairs => Some("S"),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A routable graph vertex on one floor.
///
/// The connection set never contains the node's own id. Symmetry across
/// nodes is maintained by the store's `add_connection`, which is the only
/// path that links two persisted nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteNode {
    pub(crate) id: Option<NodeId>,
    pub floor_id: FloorId,
    /// Projected location; `None` until the node is placed.
    pub location: Option<Point>,
    pub visible: bool,
    pub node_type: NodeType,
    #[serde(default)]
    pub(crate) connections: BTreeSet<NodeId>,
    #[serde(default)]
    pub(crate) created_at: Option<i64>,
    #[serde(default)]
    pub(crate) updated_at: Option<i64>,
}

impl RouteNode {
    pub fn id(&self) -> Option<NodeId> {
        self.id
    }

    pub fn connections(&self) -> &BTreeSet<NodeId> {
        &self.connections
    }

    pub fn is_connected_to(&self, other: NodeId) -> bool {
        self.connections.contains(&other)
    }

    pub fn created_at(&self) -> Option<i64> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    /// Whether the node can be drawn: visible and placed.
    pub fn is_drawable(&self) -> bool {
        self.visible && self.location.is_some()
    }

    /// Record one side of an edge. Returns false for self-references and duplicates.
    pub(crate) fn link(&mut self, other: NodeId) -> bool {
        if self.id == Some(other) {
            return false;
        }
        self.connections.insert(other)
    }

    pub(crate) fn unlink(&mut self, other: NodeId) -> bool {
        self.connections.remove(&other)
    }
}
