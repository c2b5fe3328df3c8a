//! Drawing-mode state machine.
//!
//! [`ToolManager`] interprets tool selection and pointer clicks. It never
//! persists anything itself: completed interactions come back as
//! [`ToolAction`]s for the editor session to hand to the connectivity service.

mod connector;

pub use connector::{ConnectorChoice, ConnectorDialog};

use crate::error::{EditorError, EditorResult};
use crate::model::{FloorId, NodeId};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    #[default]
    Select,
    Pan,
    PlacePolygon,
    PlaceBeacon,
    PlaceRouteNode,
    PlaceConnector,
}

impl ToolKind {
    /// Whether the tool creates entities on click.
    pub fn is_placement(self) -> bool {
        !matches!(self, ToolKind::Select | ToolKind::Pan)
    }
}

/// Polygon drawing sub-state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ToolState {
    #[default]
    NotDrawing,
    /// Points clicked so far, never empty.
    Drawing(Vec<Point>),
}

/// An interaction that is complete on the canvas but waits for the host's
/// confirmation dialog.
#[derive(Debug, Clone, PartialEq)]
pub enum Awaiting {
    /// Closed ring awaiting name and wall flag.
    Polygon(Vec<Point>),
    /// Beacon location awaiting a name.
    Beacon(Point),
    /// Connector awaiting type and floor set.
    Connector(ConnectorDialog),
}

/// Result of feeding a click to the tool manager.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolAction {
    /// Nothing to do for this tool or state.
    Ignored,
    /// A point was added to the polygon being drawn.
    PointAdded { count: usize },
    /// The ring closed; details are now awaited.
    PolygonClosed { ring: Vec<Point> },
    /// A beacon location was picked; details are now awaited.
    BeaconPlaced { location: Point },
    /// The connector dialog opened.
    ConnectorOpened,
    /// A route node should be persisted and linked to `connect_to`.
    PlaceNode(Placement),
}

/// Identifies one optimistic node placement until it resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// A chain endpoint: either a persisted node or a placement still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Persisted(NodeId),
    Pending(Ticket),
}

/// A node placement handed out by [`ToolManager::place_node`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub ticket: Ticket,
    pub location: Point,
    pub connect_to: Option<NodeRef>,
}

#[derive(Debug, Clone, Copy)]
struct Undo {
    selected: Option<NodeId>,
    last: Option<NodeRef>,
    target: Option<NodeRef>,
}

/// Route-node chaining sub-state.
///
/// `last` advances as soon as a placement is handed out and is promoted or
/// rolled back when the placement resolves. `resolved` only holds tickets
/// that a pending placement still refers to.
#[derive(Debug, Clone, Default)]
struct ChainState {
    selected: Option<NodeId>,
    last: Option<NodeRef>,
    pending: HashMap<Ticket, Undo>,
    resolved: HashMap<Ticket, NodeId>,
    next_ticket: u64,
}

impl ChainState {
    fn clear(&mut self) {
        self.selected = None;
        self.last = None;
        self.prune();
    }

    fn persisted(&self, node: Option<NodeRef>) -> Option<NodeRef> {
        match node {
            Some(NodeRef::Pending(ticket)) => match self.resolved.get(&ticket) {
                Some(&id) => Some(NodeRef::Persisted(id)),
                None => node,
            },
            other => other,
        }
    }

    /// Drop resolved tickets no pending placement refers to.
    fn prune(&mut self) {
        let pending = &self.pending;
        self.resolved.retain(|ticket, _| {
            let r = Some(NodeRef::Pending(*ticket));
            pending.values().any(|u| u.last == r || u.target == r)
        });
    }
}

/// How a placement ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Persisted and linked as requested.
    Created(NodeId),
    /// Persisted, but the edge to its target failed. The chain continues
    /// from the node and a consumed pick is restored.
    Unlinked(NodeId),
    /// Nothing was persisted.
    Failed,
}

/// Manages the current tool and its state.
#[derive(Debug, Clone)]
pub struct ToolManager {
    /// Currently selected tool.
    pub current_tool: ToolKind,
    /// Polygon drawing state.
    pub state: ToolState,
    awaiting: Option<Awaiting>,
    chain: ChainState,
    close_threshold: f64,
    min_connector_floors: usize,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new(1e-4, 2)
    }
}

impl ToolManager {
    /// Create a new tool manager.
    ///
    /// Connectors always span at least two floors, whatever `min_connector_floors` says.
    pub fn new(close_threshold: f64, min_connector_floors: usize) -> Self {
        Self {
            current_tool: ToolKind::default(),
            state: ToolState::default(),
            awaiting: None,
            chain: ChainState::default(),
            close_threshold,
            min_connector_floors: min_connector_floors.max(2),
        }
    }

    /// Set the current tool. Drawing and dialogs are discarded; the node chain is kept.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if tool != self.current_tool {
            log::debug!("tool {:?} -> {:?}", self.current_tool, tool);
        }
        self.current_tool = tool;
        self.state = ToolState::NotDrawing;
        self.awaiting = None;
    }

    /// Interpret a click at `point` on `floor`.
    pub fn click(&mut self, point: Point, floor: FloorId) -> ToolAction {
        if self.awaiting.is_some() {
            log::debug!("click ignored while awaiting confirmation");
            return ToolAction::Ignored;
        }
        match self.current_tool {
            ToolKind::Select | ToolKind::Pan => ToolAction::Ignored,
            ToolKind::PlacePolygon => self.add_polygon_point(point),
            ToolKind::PlaceBeacon => {
                self.awaiting = Some(Awaiting::Beacon(point));
                ToolAction::BeaconPlaced { location: point }
            }
            ToolKind::PlaceRouteNode => ToolAction::PlaceNode(self.place_node(point)),
            ToolKind::PlaceConnector => {
                self.awaiting = Some(Awaiting::Connector(ConnectorDialog::new(
                    point,
                    floor,
                    self.min_connector_floors,
                )));
                ToolAction::ConnectorOpened
            }
        }
    }

    fn add_polygon_point(&mut self, point: Point) -> ToolAction {
        match &mut self.state {
            ToolState::NotDrawing => {
                self.state = ToolState::Drawing(vec![point]);
                ToolAction::PointAdded { count: 1 }
            }
            ToolState::Drawing(points) => {
                let closes = points.len() >= crate::draft::MIN_RING_POINTS
                    && points[0].distance(point) <= self.close_threshold;
                if closes {
                    let ring = std::mem::take(points);
                    self.state = ToolState::NotDrawing;
                    self.awaiting = Some(Awaiting::Polygon(ring.clone()));
                    ToolAction::PolygonClosed { ring }
                } else {
                    points.push(point);
                    ToolAction::PointAdded {
                        count: points.len(),
                    }
                }
            }
        }
    }

    /// Points of the polygon being drawn.
    pub fn pending_points(&self) -> &[Point] {
        match &self.state {
            ToolState::Drawing(points) => points,
            ToolState::NotDrawing => &[],
        }
    }

    /// Check if a polygon is being drawn.
    pub fn is_active(&self) -> bool {
        matches!(self.state, ToolState::Drawing(_))
    }

    pub fn awaiting(&self) -> Option<&Awaiting> {
        self.awaiting.as_ref()
    }

    /// The open connector dialog, for the host to edit.
    pub fn connector_dialog_mut(&mut self) -> Option<&mut ConnectorDialog> {
        match &mut self.awaiting {
            Some(Awaiting::Connector(dialog)) => Some(dialog),
            _ => None,
        }
    }

    /// Take the closed ring awaiting details.
    pub fn take_polygon(&mut self) -> EditorResult<Vec<Point>> {
        match self.awaiting.take() {
            Some(Awaiting::Polygon(ring)) => Ok(ring),
            other => {
                self.awaiting = other;
                Err(EditorError::invalid_state("no closed polygon awaiting details"))
            }
        }
    }

    /// Take the beacon location awaiting details.
    pub fn take_beacon(&mut self) -> EditorResult<Point> {
        match self.awaiting.take() {
            Some(Awaiting::Beacon(location)) => Ok(location),
            other => {
                self.awaiting = other;
                Err(EditorError::invalid_state("no beacon awaiting details"))
            }
        }
    }

    /// Confirm the connector dialog. The dialog stays open if it is incomplete.
    pub fn take_connector(&mut self) -> EditorResult<ConnectorChoice> {
        match self.awaiting.take() {
            Some(Awaiting::Connector(dialog)) => match dialog.confirm() {
                Ok(choice) => Ok(choice),
                Err(e) => {
                    self.awaiting = Some(Awaiting::Connector(dialog));
                    Err(e)
                }
            },
            other => {
                self.awaiting = other;
                Err(EditorError::invalid_state("no connector dialog open"))
            }
        }
    }

    // --- Route-node chaining ---

    /// Explicitly pick a persisted node as the next placement's connection target.
    pub fn pick_node(&mut self, id: NodeId) {
        log::debug!("node {id} picked for connection");
        self.chain.selected = Some(id);
    }

    /// Hand out a placement. The picked node wins over the chain; either way
    /// the new placement becomes the chain's last node immediately.
    pub fn place_node(&mut self, location: Point) -> Placement {
        let ticket = Ticket(self.chain.next_ticket);
        self.chain.next_ticket += 1;
        let selected = self.chain.selected;
        let connect_to = match self.chain.selected.take() {
            Some(id) => Some(NodeRef::Persisted(id)),
            None => self.chain.last,
        };
        let undo = Undo {
            selected,
            last: self.chain.last,
            target: connect_to,
        };
        self.chain.pending.insert(ticket, undo);
        self.chain.last = Some(NodeRef::Pending(ticket));
        Placement {
            ticket,
            location,
            connect_to,
        }
    }

    /// Resolve a placement: `Some(id)` promotes it to a persisted node,
    /// `None` rolls the chain back to its state before the placement.
    pub fn resolve_placement(&mut self, ticket: Ticket, outcome: Option<NodeId>) {
        let outcome = match outcome {
            Some(id) => Outcome::Created(id),
            None => Outcome::Failed,
        };
        self.finish_placement(ticket, outcome);
    }

    /// Resolve a placement with its full outcome.
    pub fn finish_placement(&mut self, ticket: Ticket, outcome: Outcome) {
        let Some(undo) = self.chain.pending.remove(&ticket) else {
            return;
        };
        let is_last = self.chain.last == Some(NodeRef::Pending(ticket));
        match outcome {
            Outcome::Created(id) | Outcome::Unlinked(id) => {
                self.chain.resolved.insert(ticket, id);
                if is_last {
                    self.chain.last = Some(NodeRef::Persisted(id));
                }
                if matches!(outcome, Outcome::Unlinked(_)) && self.chain.selected.is_none() {
                    self.chain.selected = undo.selected;
                }
            }
            Outcome::Failed => {
                if is_last {
                    self.chain.last = self.chain.persisted(undo.last);
                    if self.chain.selected.is_none() {
                        self.chain.selected = undo.selected;
                    }
                }
                log::debug!("placement {:?} rolled back", ticket);
            }
        }
        self.chain.prune();
    }

    /// The persisted node a chain endpoint refers to, if known.
    pub fn resolve_ref(&self, node: NodeRef) -> Option<NodeId> {
        match node {
            NodeRef::Persisted(id) => Some(id),
            NodeRef::Pending(ticket) => self.chain.resolved.get(&ticket).copied(),
        }
    }

    /// Node picked for the next placement, if any.
    pub fn selected_for_connection(&self) -> Option<NodeId> {
        self.chain.selected
    }

    /// Last placed node, confirmed or pending.
    pub fn last_placed(&self) -> Option<NodeRef> {
        self.chain.last
    }

    /// Last placed node once confirmed.
    pub fn last_confirmed(&self) -> Option<NodeId> {
        match self.chain.last {
            Some(NodeRef::Persisted(id)) => Some(id),
            _ => None,
        }
    }

    /// Forget `id` wherever the chain refers to it, e.g. after deletion.
    pub fn forget_node(&mut self, id: NodeId) {
        if self.chain.selected == Some(id) {
            self.chain.selected = None;
        }
        if self.last_confirmed() == Some(id) {
            self.chain.last = None;
        }
    }

    /// Cancel the current interaction: pending points, open dialogs and
    /// chaining state are discarded.
    pub fn cancel(&mut self) {
        self.state = ToolState::NotDrawing;
        self.awaiting = None;
        self.chain.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn tm(tool: ToolKind) -> ToolManager {
        let mut tm = ToolManager::new(1e-4, 2);
        tm.set_tool(tool);
        tm
    }

    #[test]
    fn test_tool_selection() {
        let mut tm = ToolManager::default();
        assert_eq!(tm.current_tool, ToolKind::Select);
        assert_eq!(tm.click(p(0.0, 0.0), 1), ToolAction::Ignored);

        tm.set_tool(ToolKind::PlacePolygon);
        assert_eq!(tm.current_tool, ToolKind::PlacePolygon);
        assert!(tm.current_tool.is_placement());
        assert!(!ToolKind::Pan.is_placement());
    }

    #[test]
    fn test_polygon_closes_near_first_point() {
        let mut tm = tm(ToolKind::PlacePolygon);
        tm.click(p(0.0, 0.0), 1);
        tm.click(p(1.0, 0.0), 1);
        assert_eq!(tm.click(p(1.0, 1.0), 1), ToolAction::PointAdded { count: 3 });
        assert!(tm.is_active());

        let action = tm.click(p(0.00001, 0.0), 1);
        assert_eq!(
            action,
            ToolAction::PolygonClosed {
                ring: vec![p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0)]
            }
        );
        assert!(!tm.is_active());
        assert_eq!(tm.take_polygon().unwrap().len(), 3);
        assert!(tm.awaiting().is_none());
    }

    #[test]
    fn test_polygon_needs_three_points_to_close() {
        let mut tm = tm(ToolKind::PlacePolygon);
        tm.click(p(0.0, 0.0), 1);
        tm.click(p(1.0, 0.0), 1);
        // Near the first point but only two points so far: appended.
        assert_eq!(tm.click(p(0.0, 0.0), 1), ToolAction::PointAdded { count: 3 });
    }

    #[test]
    fn test_cancel_discards_points() {
        let mut tm = tm(ToolKind::PlacePolygon);
        for i in 0..5 {
            tm.click(p(i as f64, (i * i) as f64), 1);
        }
        assert_eq!(tm.pending_points().len(), 5);
        tm.cancel();
        assert!(tm.pending_points().is_empty());
        assert_eq!(tm.state, ToolState::NotDrawing);
    }

    #[test]
    fn test_clicks_ignored_while_awaiting() {
        let mut tm = tm(ToolKind::PlaceBeacon);
        assert_eq!(
            tm.click(p(2.0, 3.0), 1),
            ToolAction::BeaconPlaced { location: p(2.0, 3.0) }
        );
        assert_eq!(tm.click(p(4.0, 4.0), 1), ToolAction::Ignored);
        assert!(tm.take_polygon().is_err());
        assert_eq!(tm.take_beacon().unwrap(), p(2.0, 3.0));
    }

    #[test]
    fn test_implicit_chaining() {
        let mut tm = tm(ToolKind::PlaceRouteNode);
        let first = tm.place_node(p(0.0, 0.0));
        assert_eq!(first.connect_to, None);
        tm.resolve_placement(first.ticket, Some(10));
        assert_eq!(tm.last_confirmed(), Some(10));

        let second = tm.place_node(p(1.0, 0.0));
        assert_eq!(second.connect_to, Some(NodeRef::Persisted(10)));
        assert_eq!(tm.last_placed(), Some(NodeRef::Pending(second.ticket)));
        tm.resolve_placement(second.ticket, Some(11));
        assert_eq!(tm.last_confirmed(), Some(11));
    }

    #[test]
    fn test_picked_node_overrides_chain_once() {
        let mut tm = tm(ToolKind::PlaceRouteNode);
        let first = tm.place_node(p(0.0, 0.0));
        tm.resolve_placement(first.ticket, Some(1));
        tm.pick_node(7);

        let second = tm.place_node(p(1.0, 0.0));
        assert_eq!(second.connect_to, Some(NodeRef::Persisted(7)));
        assert_eq!(tm.selected_for_connection(), None);
        tm.resolve_placement(second.ticket, Some(2));

        let third = tm.place_node(p(2.0, 0.0));
        assert_eq!(third.connect_to, Some(NodeRef::Persisted(2)));
    }

    #[test]
    fn test_failed_placement_rolls_back() {
        let mut tm = tm(ToolKind::PlaceRouteNode);
        let first = tm.place_node(p(0.0, 0.0));
        tm.resolve_placement(first.ticket, Some(1));
        tm.pick_node(5);

        let failed = tm.place_node(p(1.0, 0.0));
        assert_eq!(tm.selected_for_connection(), None);
        tm.resolve_placement(failed.ticket, None);

        assert_eq!(tm.last_confirmed(), Some(1));
        assert_eq!(tm.selected_for_connection(), Some(5));
    }

    #[test]
    fn test_pending_chain_resolves_through_ticket() {
        let mut tm = tm(ToolKind::PlaceRouteNode);
        let first = tm.place_node(p(0.0, 0.0));
        let second = tm.place_node(p(1.0, 0.0));
        assert_eq!(second.connect_to, Some(NodeRef::Pending(first.ticket)));

        tm.resolve_placement(first.ticket, Some(3));
        // The later placement is still the chain's last node.
        assert_eq!(tm.last_placed(), Some(NodeRef::Pending(second.ticket)));
        assert_eq!(tm.resolve_ref(NodeRef::Pending(first.ticket)), Some(3));
    }

    #[test]
    fn test_stale_rollback_keeps_newer_chain() {
        let mut tm = tm(ToolKind::PlaceRouteNode);
        let first = tm.place_node(p(0.0, 0.0));
        let second = tm.place_node(p(1.0, 0.0));
        tm.resolve_placement(second.ticket, Some(9));
        tm.resolve_placement(first.ticket, None);
        assert_eq!(tm.last_confirmed(), Some(9));
    }

    #[test]
    fn test_chain_survives_tool_switch_but_not_cancel() {
        let mut tm = tm(ToolKind::PlaceRouteNode);
        let first = tm.place_node(p(0.0, 0.0));
        tm.resolve_placement(first.ticket, Some(4));

        tm.set_tool(ToolKind::Select);
        tm.set_tool(ToolKind::PlaceRouteNode);
        assert_eq!(tm.last_confirmed(), Some(4));

        tm.pick_node(6);
        tm.cancel();
        assert_eq!(tm.last_placed(), None);
        assert_eq!(tm.selected_for_connection(), None);
    }

    #[test]
    fn test_resolved_tickets_released() {
        let mut tm = tm(ToolKind::PlaceRouteNode);
        for i in 0..1000 {
            let placement = tm.place_node(p(i as f64, 0.0));
            tm.resolve_placement(placement.ticket, Some(i));
        }
        assert!(tm.chain.resolved.is_empty());
        tm.cancel();
        assert!(tm.chain.pending.is_empty());
        assert!(tm.chain.resolved.is_empty());
    }

    #[test]
    fn test_resolved_ticket_kept_while_referenced() {
        let mut tm = tm(ToolKind::PlaceRouteNode);
        let first = tm.place_node(p(0.0, 0.0));
        let second = tm.place_node(p(1.0, 0.0));
        tm.resolve_placement(first.ticket, Some(3));
        assert_eq!(tm.resolve_ref(second.connect_to.unwrap()), Some(3));

        tm.resolve_placement(second.ticket, None);
        assert_eq!(tm.last_placed(), Some(NodeRef::Persisted(3)));
        assert!(tm.chain.resolved.is_empty());
    }

    #[test]
    fn test_unlinked_placement_restores_pick() {
        let mut tm = tm(ToolKind::PlaceRouteNode);
        tm.pick_node(5);
        let placement = tm.place_node(p(0.0, 0.0));
        assert_eq!(placement.connect_to, Some(NodeRef::Persisted(5)));

        tm.finish_placement(placement.ticket, Outcome::Unlinked(8));
        assert_eq!(tm.last_confirmed(), Some(8));
        assert_eq!(tm.selected_for_connection(), Some(5));
    }

    #[test]
    fn test_connector_floor_minimum_clamped() {
        let mut tm = ToolManager::new(1e-4, 0);
        tm.set_tool(ToolKind::PlaceConnector);
        tm.click(p(5.0, 5.0), 1);
        assert!(tm.take_connector().is_err());
    }

    #[test]
    fn test_connector_dialog_flow() {
        let mut tm = tm(ToolKind::PlaceConnector);
        assert_eq!(tm.click(p(5.0, 5.0), 1), ToolAction::ConnectorOpened);
        assert!(tm.take_connector().is_err());
        assert!(tm.connector_dialog_mut().is_some());

        tm.connector_dialog_mut().unwrap().select_floor(2);
        let choice = tm.take_connector().unwrap();
        assert_eq!(choice.floors, vec![1, 2]);
        assert!(tm.connector_dialog_mut().is_none());
    }
}
