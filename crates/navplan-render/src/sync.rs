//! Keeps a map canvas consistent with a floor.
//!
//! Every resource the synchronizer creates is recorded in its registry, and
//! only recorded resources are ever removed. After [`teardown`] followed by
//! any sequence of render calls, the registry holds exactly what is drawn.
//!
//! [`teardown`]: RenderSynchronizer::teardown

use crate::canvas::{
    CanvasError, LayerStyle, MapCanvas, MarkerStyle, ResourceKind, SourceGeometry,
};
use crate::registry::{RegistrySnapshot, ResourceRegistry};
use crate::style::{beacon_color, marker_scale, node_color, to_color};
use navplan_core::draft::MIN_RING_POINTS;
use navplan_core::graph::{self, EdgeKey};
use navplan_core::model::{Beacon, FloorState, NodeId, Polygon, RouteNode, Selection};
use navplan_core::RenderStyle;
use std::collections::HashMap;
use thiserror::Error;

/// Render errors.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Canvas(#[from] CanvasError),
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// What the editor has selected, for highlighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSelection {
    pub selected: Option<Selection>,
    /// Node picked as the next connection target.
    pub picked_node: Option<NodeId>,
}

impl RenderSelection {
    pub fn new(selected: Option<Selection>, picked_node: Option<NodeId>) -> Self {
        Self {
            selected,
            picked_node,
        }
    }

    fn is_polygon(&self, id: u64) -> bool {
        self.selected == Some(Selection::Polygon(id))
    }

    fn is_node(&self, id: u64) -> bool {
        self.selected == Some(Selection::Node(id)) || self.picked_node == Some(id)
    }

    fn is_beacon(&self, id: u64) -> bool {
        self.selected == Some(Selection::Beacon(id))
    }
}

/// Outcome of a teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub removed: usize,
    /// Recorded resources the canvas no longer had.
    pub missing: usize,
    /// Resources the canvas refused to remove.
    pub failed: usize,
}

pub fn polygon_source_id(id: u64) -> String {
    format!("polygon-{id}")
}

pub fn node_marker_id(id: u64) -> String {
    format!("node-{id}")
}

pub fn beacon_marker_id(id: u64) -> String {
    format!("beacon-{id}")
}

/// Mirrors floor entities onto a [`MapCanvas`].
#[derive(Debug, Clone, Default)]
pub struct RenderSynchronizer {
    style: RenderStyle,
    registry: ResourceRegistry,
}

impl RenderSynchronizer {
    pub fn new(style: RenderStyle) -> Self {
        Self {
            style,
            registry: ResourceRegistry::new(),
        }
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    fn add_source(
        &mut self,
        canvas: &mut dyn MapCanvas,
        id: &str,
        geometry: SourceGeometry,
    ) -> RenderResult<()> {
        canvas.add_source(id, geometry)?;
        self.registry.record(ResourceKind::Source, id);
        Ok(())
    }

    fn add_layer(
        &mut self,
        canvas: &mut dyn MapCanvas,
        id: &str,
        source: &str,
        style: LayerStyle,
    ) -> RenderResult<()> {
        canvas.add_layer(id, source, style)?;
        self.registry.record(ResourceKind::Layer, id);
        Ok(())
    }

    fn add_marker(
        &mut self,
        canvas: &mut dyn MapCanvas,
        id: &str,
        location: kurbo::Point,
        style: MarkerStyle,
    ) -> RenderResult<()> {
        canvas.add_marker(id, location, style)?;
        self.registry.record(ResourceKind::Marker, id);
        Ok(())
    }

    /// Draw visible polygons: a fill and an outline layer each, plus a name
    /// label on the selected one. Rings too short to close are skipped.
    pub fn render_polygons(
        &mut self,
        canvas: &mut dyn MapCanvas,
        polygons: &[Polygon],
        selection: &RenderSelection,
    ) -> RenderResult<()> {
        let drawable = |p: &&Polygon| p.visible && p.ring().len() >= MIN_RING_POINTS;
        for polygon in polygons.iter().filter(drawable) {
            let Some(id) = polygon.id() else { continue };
            let selected = selection.is_polygon(id);
            let source = polygon_source_id(id);
            self.add_source(canvas, &source, SourceGeometry::Polygon(polygon.closed_ring()))?;

            let color = to_color(polygon.color);
            let opacity = if selected {
                self.style.selected_fill_opacity
            } else {
                self.style.fill_opacity
            };
            self.add_layer(
                canvas,
                &format!("{source}-fill"),
                &source,
                LayerStyle::Fill { color, opacity },
            )?;

            let outline = if selected {
                LayerStyle::Line {
                    color: to_color(self.style.selected_outline_color),
                    width: self.style.selected_outline_width,
                }
            } else {
                LayerStyle::Line {
                    color,
                    width: self.style.outline_width,
                }
            };
            self.add_layer(canvas, &format!("{source}-outline"), &source, outline)?;

            if selected {
                let label = MarkerStyle {
                    color: to_color(self.style.selected_color),
                    scale: self.style.marker_scale,
                    label: Some(polygon.name.clone()),
                };
                self.add_marker(canvas, &format!("{source}-label"), polygon.centroid(), label)?;
            }
        }
        Ok(())
    }

    /// Draw visible, placed route nodes. Connectors carry their glyph.
    pub fn render_nodes(
        &mut self,
        canvas: &mut dyn MapCanvas,
        nodes: &[RouteNode],
        selection: &RenderSelection,
    ) -> RenderResult<()> {
        for node in nodes.iter().filter(|n| n.is_drawable()) {
            let (Some(id), Some(location)) = (node.id(), node.location) else {
                continue;
            };
            let selected = selection.is_node(id);
            let color = if selected {
                to_color(self.style.selected_color)
            } else {
                node_color(&self.style, node.node_type)
            };
            let style = MarkerStyle {
                color,
                scale: marker_scale(&self.style, selected),
                label: node.node_type.glyph().map(str::to_string),
            };
            self.add_marker(canvas, &node_marker_id(id), location, style)?;
        }
        Ok(())
    }

    /// Draw visible, placed beacons.
    pub fn render_beacons(
        &mut self,
        canvas: &mut dyn MapCanvas,
        beacons: &[Beacon],
        selection: &RenderSelection,
    ) -> RenderResult<()> {
        for beacon in beacons.iter().filter(|b| b.is_drawable()) {
            let (Some(id), Some(location)) = (beacon.id(), beacon.location) else {
                continue;
            };
            let selected = selection.is_beacon(id);
            let color = if selected {
                to_color(self.style.selected_color)
            } else {
                beacon_color(&self.style, beacon.active)
            };
            let style = MarkerStyle {
                color,
                scale: marker_scale(&self.style, selected),
                label: Some(beacon.name.clone()),
            };
            self.add_marker(canvas, &beacon_marker_id(id), location, style)?;
        }
        Ok(())
    }

    /// Draw each undirected edge once. Edges to nodes that are not in
    /// `nodes`, hidden or unplaced are skipped.
    pub fn render_connections(
        &mut self,
        canvas: &mut dyn MapCanvas,
        nodes: &[RouteNode],
    ) -> RenderResult<usize> {
        let by_id: HashMap<NodeId, &RouteNode> = nodes
            .iter()
            .filter_map(|n| n.id().map(|id| (id, n)))
            .collect();
        let endpoint = |id: NodeId| {
            by_id
                .get(&id)
                .filter(|n| n.visible)
                .and_then(|n| n.location)
        };

        let mut drawn = 0;
        for key in graph::edges(nodes) {
            let (a, b) = key.endpoints();
            let (Some(from), Some(to)) = (endpoint(a), endpoint(b)) else {
                log::debug!("skipping {key}: endpoint hidden or not on this floor");
                continue;
            };
            self.draw_edge(canvas, key, from, to)?;
            drawn += 1;
        }
        Ok(drawn)
    }

    fn draw_edge(
        &mut self,
        canvas: &mut dyn MapCanvas,
        key: EdgeKey,
        from: kurbo::Point,
        to: kurbo::Point,
    ) -> RenderResult<()> {
        let source = key.to_string();
        self.add_source(canvas, &source, SourceGeometry::Line(from, to))?;
        let style = LayerStyle::Line {
            color: to_color(self.style.edge_color),
            width: self.style.edge_width,
        };
        self.add_layer(canvas, &format!("{source}-line"), &source, style)
    }

    /// Remove everything this synchronizer drew: markers, then layers from the
    /// top down, then sources. Resources that vanished from the canvas are
    /// tolerated. The registry is empty afterwards.
    pub fn teardown(&mut self, canvas: &mut dyn MapCanvas) -> TeardownReport {
        let drawn = self.registry.drain();
        let mut report = TeardownReport::default();

        let mut tally = |kind: ResourceKind, id: &str, result: Result<(), CanvasError>| {
            match result {
                Ok(()) => report.removed += 1,
                Err(CanvasError::ResourceMissing { .. }) => {
                    log::debug!("{kind} '{id}' already gone");
                    report.missing += 1;
                }
                Err(e) => {
                    log::warn!("failed to remove {kind} '{id}': {e}");
                    report.failed += 1;
                }
            }
        };

        for id in &drawn.markers {
            tally(ResourceKind::Marker, id, canvas.remove_marker(id));
        }
        for id in drawn.layers.iter().rev() {
            tally(ResourceKind::Layer, id, canvas.remove_layer(id));
        }
        for id in &drawn.sources {
            tally(ResourceKind::Source, id, canvas.remove_source(id));
        }
        report
    }

    /// Tear down and draw `floor` from scratch, bottom to top: polygons,
    /// connections, nodes, beacons.
    pub fn redraw_floor(
        &mut self,
        canvas: &mut dyn MapCanvas,
        floor: &FloorState,
        selection: &RenderSelection,
    ) -> RenderResult<TeardownReport> {
        let report = self.teardown(canvas);
        self.render_polygons(canvas, &floor.polygons, selection)?;
        self.render_connections(canvas, &floor.nodes)?;
        self.render_nodes(canvas, &floor.nodes, selection)?;
        self.render_beacons(canvas, &floor.beacons, selection)?;
        Ok(report)
    }
}
