//! Floors, buildings and the per-floor working set.

use super::{Beacon, BuildingId, EntityKind, FloorId, NodeId, Polygon, RouteNode};
use serde::{Deserialize, Serialize};

/// A building containing floors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub(crate) id: Option<BuildingId>,
    pub name: String,
    pub description: String,
}

impl Building {
    pub fn id(&self) -> Option<BuildingId> {
        self.id
    }
}

/// One level of a building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floor {
    pub(crate) id: Option<FloorId>,
    pub name: String,
    pub number: i32,
    pub building_id: BuildingId,
    /// Cached route nodes, when the floor was loaded with its contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<RouteNode>>,
    /// Cached polygons, when the floor was loaded with its contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygons: Option<Vec<Polygon>>,
}

impl Floor {
    pub fn id(&self) -> Option<FloorId> {
        self.id
    }
}

/// In-memory collections of one floor, owned by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FloorState {
    pub floor_id: FloorId,
    pub nodes: Vec<RouteNode>,
    pub polygons: Vec<Polygon>,
    pub beacons: Vec<Beacon>,
}

impl FloorState {
    pub fn new(floor_id: FloorId) -> Self {
        Self {
            floor_id,
            ..Default::default()
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&RouteNode> {
        self.nodes.iter().find(|n| n.id == Some(id))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.polygons.is_empty() && self.beacons.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.polygons.len() + self.beacons.len()
    }

    /// Insert or replace a node by id.
    pub fn upsert_node(&mut self, node: RouteNode) {
        match self.nodes.iter_mut().find(|n| n.id.is_some() && n.id == node.id) {
            Some(existing) => *existing = node,
            None => self.nodes.push(node),
        }
    }

    pub fn upsert_polygon(&mut self, polygon: Polygon) {
        match self.polygons.iter_mut().find(|p| p.id.is_some() && p.id == polygon.id) {
            Some(existing) => *existing = polygon,
            None => self.polygons.push(polygon),
        }
    }

    pub fn upsert_beacon(&mut self, beacon: Beacon) {
        match self.beacons.iter_mut().find(|b| b.id.is_some() && b.id == beacon.id) {
            Some(existing) => *existing = beacon,
            None => self.beacons.push(beacon),
        }
    }

    /// Mirror an edge that the store has already established.
    pub(crate) fn mirror_connection(&mut self, a: NodeId, b: NodeId) {
        for node in &mut self.nodes {
            match node.id {
                Some(id) if id == a => {
                    node.link(b);
                }
                Some(id) if id == b => {
                    node.link(a);
                }
                _ => {}
            }
        }
    }

    /// Every entity on the floor as `(kind, id)` pairs.
    pub fn items(&self) -> Vec<(EntityKind, u64)> {
        let polygons = self.polygons.iter().filter_map(|p| p.id).map(|id| (EntityKind::Polygon, id));
        let beacons = self.beacons.iter().filter_map(|b| b.id).map(|id| (EntityKind::Beacon, id));
        let nodes = self.nodes.iter().filter_map(|n| n.id).map(|id| (EntityKind::Node, id));
        polygons.chain(beacons).chain(nodes).collect()
    }

    /// Whether an entity of `kind` with `id` is on this floor.
    pub fn contains(&self, kind: EntityKind, id: u64) -> bool {
        match kind {
            EntityKind::Polygon => self.polygons.iter().any(|p| p.id == Some(id)),
            EntityKind::Beacon => self.beacons.iter().any(|b| b.id == Some(id)),
            EntityKind::Node => self.nodes.iter().any(|n| n.id == Some(id)),
        }
    }

    /// Drop an entity. A removed node is also unlinked from its neighbours.
    pub fn remove(&mut self, kind: EntityKind, id: u64) -> bool {
        let before = self.len();
        match kind {
            EntityKind::Polygon => self.polygons.retain(|p| p.id != Some(id)),
            EntityKind::Beacon => self.beacons.retain(|b| b.id != Some(id)),
            EntityKind::Node => {
                self.nodes.retain(|n| n.id != Some(id));
                for node in &mut self.nodes {
                    node.unlink(id);
                }
            }
        }
        self.len() != before
    }
}
