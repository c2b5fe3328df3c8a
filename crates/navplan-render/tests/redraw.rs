//! Redraw cycles driven by an editor session.

use kurbo::Point;
use navplan_core::{
    BeaconDetails, EditorConfig, EditorEvent, EditorSession, MemoryStore, PolygonDetails,
    Selection, ToolKind,
};
use navplan_render::{
    MapCanvas, RenderSelection, RenderSynchronizer, ResourceKind, SceneCanvas, node_marker_id,
};
use pollster::block_on;
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn p(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

fn assert_registry_matches_canvas(sync: &RenderSynchronizer, canvas: &SceneCanvas) {
    let snapshot = sync.snapshot();
    assert_eq!(sorted(snapshot.sources), sorted(canvas.source_ids()));
    assert_eq!(snapshot.layers, canvas.layer_ids());
    assert_eq!(sorted(snapshot.markers), sorted(canvas.marker_ids()));
}

fn furnished_session() -> EditorSession<MemoryStore> {
    let mut session =
        EditorSession::new(Arc::new(MemoryStore::new()), EditorConfig::default(), 1);

    session.select_tool(ToolKind::PlacePolygon);
    for at in [p(0.0, 0.0), p(0.001, 0.0), p(0.001, 0.001), p(0.0, 0.0)] {
        block_on(session.click(at)).unwrap();
    }
    block_on(session.confirm_polygon(PolygonDetails {
        name: "Cafeteria".into(),
        ..Default::default()
    }))
    .unwrap();

    session.select_tool(ToolKind::PlaceRouteNode);
    for at in [p(0.0002, 0.0002), p(0.0004, 0.0002), p(0.0006, 0.0002)] {
        block_on(session.click(at)).unwrap();
    }

    session.select_tool(ToolKind::PlaceBeacon);
    block_on(session.click(p(0.0005, 0.0005))).unwrap();
    block_on(session.confirm_beacon(BeaconDetails {
        name: "Till".into(),
        ..Default::default()
    }))
    .unwrap();
    session
}

#[test]
fn test_redraw_cycles_leave_no_stale_resources() {
    init_logging();
    let mut session = furnished_session();
    let mut canvas = SceneCanvas::new();
    let mut sync = RenderSynchronizer::new(session.config().render.clone());

    let selection = RenderSelection::default();
    sync.redraw_floor(&mut canvas, session.floor(), &selection).unwrap();
    let first = sync.snapshot();
    // 1 polygon source + 2 chain edges; 2 polygon layers + 2 edge layers; 3 nodes + 1 beacon.
    assert_eq!(first.sources.len(), 3);
    assert_eq!(first.layers.len(), 4);
    assert_eq!(first.markers.len(), 4);
    assert_registry_matches_canvas(&sync, &canvas);

    for _ in 0..3 {
        let report = sync.redraw_floor(&mut canvas, session.floor(), &selection).unwrap();
        assert_eq!(report.removed, first.len());
        assert_eq!(sync.snapshot(), first);
        assert_registry_matches_canvas(&sync, &canvas);
    }

    // Clearing the floor and redrawing leaves nothing behind.
    block_on(session.clear_all()).unwrap();
    sync.redraw_floor(&mut canvas, session.floor(), &selection).unwrap();
    assert!(canvas.is_empty());
    assert!(sync.registry().is_empty());
}

#[test]
fn test_selection_change_swaps_label_marker() {
    init_logging();
    let mut session = furnished_session();
    let polygon = session.floor().polygons[0].id().unwrap();
    let mut canvas = SceneCanvas::new();
    let mut sync = RenderSynchronizer::default();

    let EditorEvent::SelectionChanged(selected) =
        session.select(Some(Selection::Polygon(polygon))).unwrap()
    else {
        panic!("expected selection change");
    };
    sync.redraw_floor(&mut canvas, session.floor(), &RenderSelection::new(selected, None))
        .unwrap();
    let label = format!("polygon-{polygon}-label");
    assert!(canvas.contains(ResourceKind::Marker, &label));

    session.select(None).unwrap();
    sync.redraw_floor(&mut canvas, session.floor(), &RenderSelection::default())
        .unwrap();
    assert!(!canvas.contains(ResourceKind::Marker, &label));
    assert_registry_matches_canvas(&sync, &canvas);
}

#[test]
fn test_teardown_after_external_marker_removal() {
    init_logging();
    let session = furnished_session();
    let mut canvas = SceneCanvas::new();
    let mut sync = RenderSynchronizer::default();
    sync.redraw_floor(&mut canvas, session.floor(), &RenderSelection::default())
        .unwrap();

    let node = session.floor().nodes[0].id().unwrap();
    assert!(canvas.forget_marker(&node_marker_id(node)));

    let report = sync.redraw_floor(&mut canvas, session.floor(), &RenderSelection::default())
        .unwrap();
    assert_eq!(report.missing, 1);
    assert_eq!(report.failed, 0);
    assert!(canvas.contains(ResourceKind::Marker, &node_marker_id(node)));
    assert_registry_matches_canvas(&sync, &canvas);
}
