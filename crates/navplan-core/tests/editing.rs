//! End-to-end editing scenarios against the in-memory store.

use kurbo::Point;
use navplan_core::draft::PolygonDraft;
use navplan_core::graph;
use navplan_core::storage::FloorPlanStore;
use navplan_core::{
    ConnectivityService, DeleteItem, EditorConfig, EditorError, EditorEvent, EditorSession,
    EntityKind, FloorId, MemoryStore, NodeId, NodeType, PolygonDetails, RouteNode, StoreOp,
    ToolKind,
};
use pollster::block_on;
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn p(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn nodes_on(store: &MemoryStore, floors: &[FloorId]) -> Vec<RouteNode> {
    floors
        .iter()
        .flat_map(|f| block_on(store.list_nodes(*f)).unwrap())
        .collect()
}

fn place(session: &mut EditorSession<MemoryStore>, at: Point) -> (NodeId, Option<NodeId>) {
    match block_on(session.click(at)).unwrap() {
        EditorEvent::NodeCreated { id, connected_to } => (id, connected_to),
        other => panic!("expected a node, got {other:?}"),
    }
}

#[test]
fn test_connector_across_three_floors() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let mut session = EditorSession::new(store.clone(), EditorConfig::default(), 1);

    session.select_tool(ToolKind::PlaceRouteNode);
    let (x, _) = place(&mut session, p(8.0, 47.0));

    session.select_tool(ToolKind::PlaceConnector);
    assert_eq!(
        block_on(session.click(p(8.001, 47.0))).unwrap(),
        EditorEvent::ConnectorDialogOpened
    );
    let dialog = session.connector_dialog_mut().unwrap();
    dialog.select_floor(2);
    dialog.select_floor(3);
    assert!(!dialog.deselect_floor(1));
    dialog.set_node_type(NodeType::Elevator).unwrap();

    let EditorEvent::ConnectorCreated { nodes } = block_on(session.confirm_connector()).unwrap()
    else {
        panic!("expected connector");
    };
    assert_eq!(nodes.len(), 3);

    let all = nodes_on(&store, &[1, 2, 3]);
    let f1 = all
        .iter()
        .find(|n| n.floor_id == 1 && n.id() != Some(x))
        .unwrap();
    assert!(f1.is_connected_to(x));
    assert_eq!(f1.node_type, NodeType::Elevator);

    let edges = graph::edges(&all);
    let among_new = edges
        .iter()
        .filter(|e| {
            let (a, b) = e.endpoints();
            nodes.contains(&a) && nodes.contains(&b)
        })
        .count();
    assert_eq!(among_new, 3);
    assert!(graph::asymmetric_pairs(&all).is_empty());

    // The connector on the current floor continues the chain.
    session.select_tool(ToolKind::PlaceRouteNode);
    let (_, connected_to) = place(&mut session, p(8.002, 47.0));
    assert_eq!(connected_to, Some(f1.id().unwrap()));
}

#[test]
fn test_edges_stay_symmetric_through_edits() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let mut session = EditorSession::new(store.clone(), EditorConfig::default(), 4);
    session.select_tool(ToolKind::PlaceRouteNode);

    let (a, _) = place(&mut session, p(0.0, 0.0));
    let (b, _) = place(&mut session, p(0.0, 0.001));
    let (_c, _) = place(&mut session, p(0.0, 0.002));
    session.click_node(a).unwrap();
    let (d, _) = place(&mut session, p(0.001, 0.0));

    let service = ConnectivityService::new(store.clone());
    block_on(service.connect_nodes(b, d)).unwrap();
    block_on(service.connect_nodes(d, b)).unwrap();
    block_on(service.delete_route_node(b)).unwrap();

    let nodes = nodes_on(&store, &[4]);
    assert!(graph::asymmetric_pairs(&nodes).is_empty());
    assert!(nodes.iter().all(|n| !n.is_connected_to(b)));

    block_on(session.reload()).unwrap();
    assert_eq!(session.floor().nodes.len(), 3);
    assert!(session.floor().node(a).unwrap().is_connected_to(d));
}

#[test]
fn test_cancel_polygon_with_five_points() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let mut session = EditorSession::new(store.clone(), EditorConfig::default(), 1);
    session.select_tool(ToolKind::PlacePolygon);

    for i in 0..5 {
        let event = block_on(session.click(p(i as f64 * 0.001, (i % 2) as f64 * 0.001))).unwrap();
        assert_eq!(event, EditorEvent::PointAdded { count: i + 1 });
    }
    assert_eq!(session.cancel(), EditorEvent::Cancelled);

    assert!(session.tools().pending_points().is_empty());
    assert!(block_on(store.list_polygons(1)).unwrap().is_empty());
    assert_eq!(store.calls(StoreOp::CreatePolygon), 0);
    assert!(session.tools().awaiting().is_none());
}

#[test]
fn test_persisted_polygons_have_three_points() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let service = ConnectivityService::new(store.clone());

    let short = PolygonDraft::new()
        .with_floor(1)
        .with_name("Closet")
        .with_ring(vec![p(0.0, 0.0), p(0.0, 0.001), p(0.0, 0.0)]);
    let err = block_on(service.create_polygon(short)).unwrap_err();
    assert!(matches!(err, EditorError::Validation(ref v) if v.field == "ring"));

    let mut session = EditorSession::new(store.clone(), EditorConfig::default(), 1);
    session.select_tool(ToolKind::PlacePolygon);
    for at in [p(0.0, 0.0), p(0.001, 0.0), p(0.001, 0.001), p(0.00001, 0.0)] {
        block_on(session.click(at)).unwrap();
    }
    block_on(session.confirm_polygon(PolygonDetails {
        name: "Lobby".into(),
        ..Default::default()
    }))
    .unwrap();

    let stored = block_on(store.list_polygons(1)).unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored.iter().all(|poly| poly.ring().len() >= 3));
}

#[test]
fn test_unlinked_node_still_advances_chain() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let mut session = EditorSession::new(store.clone(), EditorConfig::default(), 1);
    session.select_tool(ToolKind::PlaceRouteNode);
    let (a, _) = place(&mut session, p(0.0, 0.0));

    store.fail_on_nth(StoreOp::AddConnection, 1);
    let err = block_on(session.click(p(0.0, 0.001))).unwrap_err();
    let EditorError::Unlinked { node, target, .. } = err else {
        panic!("expected Unlinked");
    };
    assert_eq!(target, a);
    assert!(node.connections().is_empty());
    let b = node.id().unwrap();
    assert_eq!(session.tools().last_confirmed(), Some(b));

    let (_, connected_to) = place(&mut session, p(0.0, 0.002));
    assert_eq!(connected_to, Some(b));
}

#[test]
fn test_multi_floor_failure_reloads_floor() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let mut session = EditorSession::new(store.clone(), EditorConfig::default(), 1);
    session.select_tool(ToolKind::PlaceConnector);
    block_on(session.click(p(1.0, 1.0))).unwrap();
    session.connector_dialog_mut().unwrap().select_floor(2);

    // Both nodes persist; the edge between them fails.
    store.fail_on_nth(StoreOp::AddConnection, 1);
    let err = block_on(session.confirm_connector()).unwrap_err();
    assert!(err.may_be_partial());

    assert_eq!(session.floor().nodes.len(), 1);
    assert_eq!(nodes_on(&store, &[1, 2]).len(), 2);
    assert_eq!(session.tools().last_placed(), None);
}

#[test]
fn test_bulk_delete_partial_failure() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let service = ConnectivityService::new(store.clone());
    let a = block_on(service.create_route_node(1, p(0.0, 0.0), NodeType::Waypoint, None)).unwrap();
    let b = block_on(service.create_route_node(1, p(0.0, 0.001), NodeType::Waypoint, a.id()))
        .unwrap();

    store.fail_on_nth(StoreOp::DeleteNode, 2);
    let items = [
        DeleteItem::new(EntityKind::Node, a.id().unwrap()),
        DeleteItem::new(EntityKind::Node, b.id().unwrap()),
    ];
    let err = block_on(service.bulk_delete(&items)).unwrap_err();
    assert!(err.may_be_partial());

    let left = block_on(service.load_floor(1)).unwrap();
    assert_eq!(left.nodes.len(), 1);
    assert!(left.nodes[0].connections().is_empty());
}

#[test]
fn test_clear_all_empties_floor_only() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let service = ConnectivityService::new(store.clone());
    block_on(service.create_route_node(1, p(0.0, 0.0), NodeType::Waypoint, None)).unwrap();
    block_on(service.create_route_node(2, p(0.0, 0.0), NodeType::Waypoint, None)).unwrap();

    let mut session = block_on(EditorSession::open(store.clone(), EditorConfig::default(), 1)).unwrap();
    assert_eq!(session.floor().len(), 1);
    assert_eq!(
        block_on(session.clear_all()).unwrap(),
        EditorEvent::FloorCleared { removed: 1 }
    );
    assert!(session.floor().is_empty());
    assert_eq!(nodes_on(&store, &[2]).len(), 1);

    block_on(session.switch_floor(2)).unwrap();
    assert_eq!(session.floor().nodes.len(), 1);
}
