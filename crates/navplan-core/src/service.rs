//! Connectivity service: the single writer of persisted floor-plan state.
//!
//! Multi-step operations here are best-effort, not transactional. When
//! [`create_multi_floor_nodes`](ConnectivityService::create_multi_floor_nodes)
//! or [`bulk_delete`](ConnectivityService::bulk_delete) fail, earlier steps may
//! already be persisted; callers reload the floor to reconcile.

use crate::draft::{
    BeaconDraft, BeaconPatch, NodeDraft, NodePatch, PolygonDraft, PolygonPatch,
};
use crate::error::{EditorError, EditorResult};
use crate::graph;
use crate::model::{
    Beacon, BeaconId, EntityId, EntityKind, FloorId, FloorState, NodeId, NodeType, Polygon,
    PolygonId, RouteNode,
};
use crate::storage::{BoxFuture, FloorPlanStore, RecalculationSummary, StorageResult};
use futures_util::future::try_join_all;
use kurbo::Point;
use std::collections::HashSet;
use std::sync::Arc;

/// One entity to delete in a [`bulk_delete`](ConnectivityService::bulk_delete).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeleteItem {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl DeleteItem {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }
}

type DeleteFn<S> = for<'a> fn(&'a S, EntityId) -> BoxFuture<'a, StorageResult<()>>;

/// Deletion entry point for each entity kind.
fn deleter<S: FloorPlanStore>(kind: EntityKind) -> DeleteFn<S> {
    match kind {
        EntityKind::Polygon => S::delete_polygon,
        EntityKind::Beacon => S::delete_beacon,
        EntityKind::Node => S::delete_node,
    }
}

/// Orchestrates creation, connection, update and deletion against a store.
pub struct ConnectivityService<S: FloorPlanStore> {
    store: Arc<S>,
}

impl<S: FloorPlanStore> Clone for ConnectivityService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: FloorPlanStore> ConnectivityService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Get a reference to the storage backend.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Establish an undirected edge between two persisted nodes.
    pub async fn connect_nodes(&self, a: NodeId, b: NodeId) -> EditorResult<()> {
        if a == b {
            return Err(EditorError::invalid_state(format!(
                "node {a} cannot be connected to itself"
            )));
        }
        log::debug!("connecting nodes {a} <-> {b}");
        self.store.add_connection(a, b).await.map_err(|e| {
            log::error!("failed to connect {a} and {b}: {e}");
            EditorError::from(e)
        })
    }

    /// Persist a node and, when `connect_to` is given, link it to that node.
    ///
    /// If the node is created but the edge fails, the error is
    /// [`EditorError::Unlinked`] and carries the persisted node.
    pub async fn create_route_node(
        &self,
        floor: FloorId,
        location: Point,
        node_type: NodeType,
        connect_to: Option<NodeId>,
    ) -> EditorResult<RouteNode> {
        let draft = NodeDraft::new()
            .with_floor(floor)
            .at(location)
            .with_node_type(node_type);
        self.create_node_from(draft, connect_to).await
    }

    /// Like [`create_route_node`](Self::create_route_node) for a caller-prepared draft.
    pub async fn create_node_from(
        &self,
        draft: NodeDraft,
        connect_to: Option<NodeId>,
    ) -> EditorResult<RouteNode> {
        let node = draft.build()?;
        let (floor, node_type) = (node.floor_id, node.node_type);
        let mut node = self.store.create_node(node).await.map_err(|e| {
            log::error!("failed to create {node_type} node on floor {floor}: {e}");
            EditorError::from(e)
        })?;
        let id = node
            .id()
            .ok_or_else(|| EditorError::invalid_state("store returned a node without an id"))?;

        if let Some(target) = connect_to {
            if let Err(e) = self.connect_nodes(id, target).await {
                let source = match e {
                    EditorError::Store(source) => source,
                    other => return Err(other),
                };
                return Err(EditorError::Unlinked {
                    node: Box::new(node),
                    target,
                    source,
                });
            }
            node.link(target);
        }
        Ok(node)
    }

    /// Create one node per floor at the same location and interconnect them.
    ///
    /// Nodes are created sequentially in `floors` order; only the node on
    /// `current_floor` is linked to `connect_to`. Afterwards every pair of new
    /// nodes is connected. Returns the new nodes in `floors` order.
    pub async fn create_multi_floor_nodes(
        &self,
        floors: &[FloorId],
        location: Point,
        node_type: NodeType,
        current_floor: FloorId,
        connect_to: Option<NodeId>,
    ) -> EditorResult<Vec<RouteNode>> {
        let mut seen = HashSet::new();
        if let Some(dup) = floors.iter().find(|f| !seen.insert(**f)) {
            return Err(EditorError::invalid_state(format!("floor {dup} listed twice")));
        }
        if !floors.contains(&current_floor) {
            return Err(EditorError::invalid_state(format!(
                "current floor {current_floor} is not among the connector floors"
            )));
        }

        let mut created = Vec::with_capacity(floors.len());
        for &floor in floors {
            let target = if floor == current_floor { connect_to } else { None };
            let node = self
                .create_route_node(floor, location, node_type, target)
                .await?;
            created.push(node);
        }

        let ids: Vec<NodeId> = created.iter().filter_map(RouteNode::id).collect();
        for (a, b) in graph::complete_graph_pairs(&ids) {
            self.connect_nodes(a, b).await?;
        }
        for node in &mut created {
            for &other in &ids {
                node.link(other);
            }
        }

        log::info!(
            "created {} {node_type} connector nodes across floors {:?}",
            created.len(),
            floors
        );
        Ok(created)
    }

    /// Validate and persist a new polygon.
    pub async fn create_polygon(&self, draft: PolygonDraft) -> EditorResult<Polygon> {
        let polygon = draft.without_identity().build()?;
        Ok(self.store.create_polygon(polygon).await?)
    }

    /// Validate and persist a new beacon.
    pub async fn create_beacon(&self, draft: BeaconDraft) -> EditorResult<Beacon> {
        let beacon = draft.without_identity().build()?;
        Ok(self.store.create_beacon(beacon).await?)
    }

    /// Merge `patch` into `current` and persist the result.
    pub async fn update_polygon(
        &self,
        current: &Polygon,
        patch: PolygonPatch,
    ) -> EditorResult<Polygon> {
        let merged = PolygonDraft::for_update(current).apply(patch).build()?;
        Ok(self.store.update_polygon(merged).await?)
    }

    /// Merge `patch` into `current` and persist the result.
    pub async fn update_beacon(&self, current: &Beacon, patch: BeaconPatch) -> EditorResult<Beacon> {
        let merged = BeaconDraft::for_update(current).apply(patch).build()?;
        Ok(self.store.update_beacon(merged).await?)
    }

    /// Merge `patch` into `current` and persist the result. Connections are untouched.
    pub async fn update_route_node(
        &self,
        current: &RouteNode,
        patch: NodePatch,
    ) -> EditorResult<RouteNode> {
        let merged = NodeDraft::for_update(current).apply(patch).build()?;
        Ok(self.store.update_node(merged).await?)
    }

    pub async fn delete_polygon(&self, id: PolygonId) -> EditorResult<()> {
        Ok(self.store.delete_polygon(id).await?)
    }

    pub async fn delete_beacon(&self, id: BeaconId) -> EditorResult<()> {
        Ok(self.store.delete_beacon(id).await?)
    }

    pub async fn delete_route_node(&self, id: NodeId) -> EditorResult<()> {
        Ok(self.store.delete_node(id).await?)
    }

    /// Delete every item concurrently. Any failure fails the whole call;
    /// deletions that already happened are not restored.
    pub async fn bulk_delete(&self, items: &[DeleteItem]) -> EditorResult<usize> {
        let store = &*self.store;
        let pending = items
            .iter()
            .map(|item| deleter::<S>(item.kind)(store, item.id));
        try_join_all(pending).await.map_err(|e| {
            log::error!("bulk delete of {} items failed: {e}", items.len());
            EditorError::from(e)
        })?;
        log::info!("deleted {} items", items.len());
        Ok(items.len())
    }

    /// Ask the external service to reassign points of interest to their closest node.
    pub async fn recalculate_poi_nodes(&self, floor: FloorId) -> EditorResult<RecalculationSummary> {
        Ok(self.store.recalculate_closest_nodes(floor).await?)
    }

    /// Load everything on a floor. Asymmetric connections are logged.
    pub async fn load_floor(&self, floor: FloorId) -> EditorResult<FloorState> {
        let nodes = self.store.list_nodes(floor).await?;
        let polygons = self.store.list_polygons(floor).await?;
        let beacons = self.store.list_beacons(floor).await?;
        Self::check_symmetry(&nodes);
        Ok(FloorState {
            floor_id: floor,
            nodes,
            polygons,
            beacons,
        })
    }

    /// Report connections that are listed by only one endpoint.
    pub fn check_symmetry(nodes: &[RouteNode]) -> Vec<(NodeId, NodeId)> {
        let pairs = graph::asymmetric_pairs(nodes);
        for (a, b) in &pairs {
            log::warn!("node {a} lists {b} but {b} does not list {a}");
        }
        pairs
    }

    /// Remove every entity on a floor. Returns the number removed.
    pub async fn clear_floor(&self, floor: FloorId) -> EditorResult<usize> {
        let state = self.load_floor(floor).await?;
        let items: Vec<DeleteItem> = state
            .items()
            .into_iter()
            .map(|(kind, id)| DeleteItem::new(kind, id))
            .collect();
        let removed = self.bulk_delete(&items).await?;
        log::info!("cleared floor {floor}: {removed} entities removed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PolygonKind;
    use crate::storage::{MemoryStore, StoreOp};
    use pollster::block_on;

    fn service() -> ConnectivityService<MemoryStore> {
        ConnectivityService::new(Arc::new(MemoryStore::new()))
    }

    fn here() -> Point {
        Point::new(13.4, 52.5)
    }

    #[test]
    fn test_create_route_node_with_edge() {
        let svc = service();
        let a = block_on(svc.create_route_node(1, here(), NodeType::Waypoint, None)).unwrap();
        let b = block_on(svc.create_route_node(1, here(), NodeType::Waypoint, a.id())).unwrap();
        assert!(b.is_connected_to(a.id().unwrap()));

        let state = block_on(svc.load_floor(1)).unwrap();
        let stored_a = state.node(a.id().unwrap()).unwrap();
        assert!(stored_a.is_connected_to(b.id().unwrap()));
    }

    #[test]
    fn test_edge_failure_leaves_node_persisted() {
        let svc = service();
        let err = block_on(svc.create_route_node(1, here(), NodeType::Waypoint, Some(404))).unwrap_err();
        match err {
            EditorError::Unlinked { node, target, .. } => {
                assert_eq!(target, 404);
                assert!(node.id().is_some());
            }
            other => panic!("expected Unlinked, got {other:?}"),
        }
        assert_eq!(block_on(svc.load_floor(1)).unwrap().nodes.len(), 1);
    }

    #[test]
    fn test_multi_floor_nodes_form_complete_graph() {
        let svc = service();
        let x = block_on(svc.create_route_node(10, here(), NodeType::Waypoint, None)).unwrap();
        let x_id = x.id().unwrap();

        let nodes = block_on(svc.create_multi_floor_nodes(
            &[10, 20, 30],
            here(),
            NodeType::Elevator,
            10,
            Some(x_id),
        ))
        .unwrap();
        assert_eq!(nodes.len(), 3);

        let ids: Vec<NodeId> = nodes.iter().map(|n| n.id().unwrap()).collect();
        assert!(nodes[0].is_connected_to(x_id));
        assert!(!nodes[1].is_connected_to(x_id));

        let mut all = Vec::new();
        for floor in [10, 20, 30] {
            all.extend(block_on(svc.load_floor(floor)).unwrap().nodes);
        }
        let edges = graph::edges(&all);
        let among_new = edges
            .iter()
            .filter(|e| {
                let (a, b) = e.endpoints();
                ids.contains(&a) && ids.contains(&b)
            })
            .count();
        assert_eq!(among_new, 3);
        assert_eq!(edges.len(), 4);
        assert!(graph::asymmetric_pairs(&all).is_empty());
    }

    #[test]
    fn test_multi_floor_partial_failure_is_not_rolled_back() {
        let svc = service();
        svc.store().fail_on_nth(StoreOp::CreateNode, 2);
        let result = block_on(svc.create_multi_floor_nodes(
            &[1, 2, 3],
            here(),
            NodeType::Stairs,
            1,
            None,
        ));
        assert!(result.is_err());
        assert_eq!(block_on(svc.load_floor(1)).unwrap().nodes.len(), 1);
        assert!(block_on(svc.load_floor(2)).unwrap().nodes.is_empty());
        assert!(block_on(svc.load_floor(3)).unwrap().nodes.is_empty());
    }

    #[test]
    fn test_multi_floor_requires_current_floor() {
        let svc = service();
        let err = block_on(svc.create_multi_floor_nodes(&[2, 3], here(), NodeType::Stairs, 1, None))
            .unwrap_err();
        assert!(matches!(err, EditorError::InvalidState(_)));
        let err = block_on(svc.create_multi_floor_nodes(&[1, 1], here(), NodeType::Stairs, 1, None))
            .unwrap_err();
        assert!(matches!(err, EditorError::InvalidState(_)));
    }

    #[test]
    fn test_connect_rejects_self_loop() {
        let svc = service();
        assert!(matches!(
            block_on(svc.connect_nodes(5, 5)),
            Err(EditorError::InvalidState(_))
        ));
    }

    #[test]
    fn test_update_polygon_merges_patch() {
        let svc = service();
        let draft = PolygonDraft::new()
            .with_floor(1)
            .with_name("Room 1")
            .with_description("north wing")
            .with_ring(vec![here(), Point::new(13.41, 52.5), Point::new(13.41, 52.51)]);
        let created = block_on(svc.create_polygon(draft)).unwrap();

        let updated = block_on(svc.update_polygon(
            &created,
            PolygonPatch {
                kind: Some(PolygonKind::Wall),
                ..Default::default()
            },
        ))
        .unwrap();
        assert_eq!(updated.kind, PolygonKind::Wall);
        assert_eq!(updated.name, "Room 1");
        assert_eq!(updated.description, "north wing");
        assert_eq!(updated.id(), created.id());
    }

    #[test]
    fn test_update_beacon_validates_patch() {
        let svc = service();
        let created = block_on(svc.create_beacon(
            BeaconDraft::new().with_floor(1).with_name("Door").at(here()),
        ))
        .unwrap();
        let err = block_on(svc.update_beacon(
            &created,
            BeaconPatch {
                battery_level: Some(150),
                ..Default::default()
            },
        ))
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn test_bulk_delete_mixed_kinds() {
        let svc = service();
        let node = block_on(svc.create_route_node(1, here(), NodeType::Waypoint, None)).unwrap();
        let beacon = block_on(svc.create_beacon(BeaconDraft::new().with_floor(1).with_name("B"))).unwrap();
        let items = [
            DeleteItem::new(EntityKind::Node, node.id().unwrap()),
            DeleteItem::new(EntityKind::Beacon, beacon.id().unwrap()),
        ];
        assert_eq!(block_on(svc.bulk_delete(&items)).unwrap(), 2);
        assert!(block_on(svc.load_floor(1)).unwrap().is_empty());
    }

    #[test]
    fn test_bulk_delete_failure_keeps_earlier_deletions() {
        let svc = service();
        let a = block_on(svc.create_route_node(1, here(), NodeType::Waypoint, None)).unwrap();
        let items = [
            DeleteItem::new(EntityKind::Node, a.id().unwrap()),
            DeleteItem::new(EntityKind::Polygon, 999),
        ];
        assert!(block_on(svc.bulk_delete(&items)).is_err());
        assert!(block_on(svc.load_floor(1)).unwrap().nodes.is_empty());
    }
}
