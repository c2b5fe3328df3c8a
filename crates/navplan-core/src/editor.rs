//! Editor session: the drawing state machine bound to persistence.
//!
//! The session owns the active floor's working set. Every persisted change is
//! mirrored into it, so the host can redraw from [`EditorSession::floor`]
//! after each [`EditorEvent`].

use crate::config::EditorConfig;
use crate::draft::{BeaconDraft, BeaconPatch, NodeDraft, NodePatch, PolygonDraft, PolygonPatch};
use crate::error::{EditorError, EditorResult};
use crate::model::{
    BeaconId, BeaconTypeId, CategoryId, EntityKind, FloorId, FloorState, NodeId, PolygonId,
    PolygonKind, RouteNode, Selection, SerializableColor,
};
use crate::service::{ConnectivityService, DeleteItem};
use crate::storage::{FloorPlanStore, RecalculationSummary, StorageError};
use crate::tools::{
    Awaiting, ConnectorDialog, Outcome, Placement, ToolAction, ToolKind, ToolManager,
};
use kurbo::Point;
use std::sync::Arc;
use uuid::Uuid;

/// Host-confirmed details of a closed polygon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonDetails {
    pub name: String,
    pub description: String,
    /// Walls ignore `kind` and `color`.
    pub is_wall: bool,
    pub kind: Option<PolygonKind>,
    pub color: Option<SerializableColor>,
    pub category_id: Option<CategoryId>,
}

/// Host-confirmed details of a placed beacon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeaconDetails {
    pub name: String,
    pub beacon_type_id: Option<BeaconTypeId>,
    pub uuid: Option<String>,
    pub major_id: Option<i64>,
    pub minor_id: Option<i64>,
}

/// What changed as the result of a session call.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    Ignored,
    ToolChanged(ToolKind),
    PointAdded { count: usize },
    /// A ring closed; confirm it with [`EditorSession::confirm_polygon`].
    AwaitingPolygonDetails { points: usize },
    /// Confirm with [`EditorSession::confirm_beacon`].
    AwaitingBeaconDetails { location: Point },
    /// Edit via [`EditorSession::connector_dialog_mut`], then confirm.
    ConnectorDialogOpened,
    NodeCreated { id: NodeId, connected_to: Option<NodeId> },
    NodePicked(NodeId),
    PolygonCreated(PolygonId),
    BeaconCreated(BeaconId),
    /// Connector nodes in floor order.
    ConnectorCreated { nodes: Vec<NodeId> },
    SelectionChanged(Option<Selection>),
    Updated(Selection),
    Deleted(Selection),
    Cancelled,
    FloorCleared { removed: usize },
    FloorLoaded(FloorId),
}

/// An editing session on one floor.
pub struct EditorSession<S: FloorPlanStore> {
    id: Uuid,
    config: EditorConfig,
    tools: ToolManager,
    service: ConnectivityService<S>,
    floor: FloorState,
    selection: Option<Selection>,
}

impl<S: FloorPlanStore> EditorSession<S> {
    /// Create a session on `floor` with an empty working set. Call
    /// [`reload`](Self::reload) to fetch the floor's contents.
    pub fn new(store: Arc<S>, config: EditorConfig, floor: FloorId) -> Self {
        let id = Uuid::new_v4();
        log::info!("editor session {id} on floor {floor}");
        Self {
            id,
            tools: ToolManager::new(config.close_threshold, config.min_connector_floors),
            config,
            service: ConnectivityService::new(store),
            floor: FloorState::new(floor),
            selection: None,
        }
    }

    /// Create a session and load the floor.
    pub async fn open(store: Arc<S>, config: EditorConfig, floor: FloorId) -> EditorResult<Self> {
        let mut session = Self::new(store, config, floor);
        session.reload().await?;
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn floor(&self) -> &FloorState {
        &self.floor
    }

    pub fn floor_id(&self) -> FloorId {
        self.floor.floor_id
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn service(&self) -> &ConnectivityService<S> {
        &self.service
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn select_tool(&mut self, tool: ToolKind) -> EditorEvent {
        self.tools.set_tool(tool);
        EditorEvent::ToolChanged(tool)
    }

    /// Feed a canvas click at `point`.
    pub async fn click(&mut self, point: Point) -> EditorResult<EditorEvent> {
        let floor = self.floor_id();
        Ok(match self.tools.click(point, floor) {
            ToolAction::Ignored => EditorEvent::Ignored,
            ToolAction::PointAdded { count } => EditorEvent::PointAdded { count },
            ToolAction::PolygonClosed { ring } => {
                EditorEvent::AwaitingPolygonDetails { points: ring.len() }
            }
            ToolAction::BeaconPlaced { location } => EditorEvent::AwaitingBeaconDetails { location },
            ToolAction::ConnectorOpened => EditorEvent::ConnectorDialogOpened,
            ToolAction::PlaceNode(placement) => return self.persist_placement(placement).await,
        })
    }

    async fn persist_placement(&mut self, placement: Placement) -> EditorResult<EditorEvent> {
        let target = placement.connect_to.and_then(|r| {
            let resolved = self.tools.resolve_ref(r);
            if resolved.is_none() {
                log::warn!("chain target {r:?} unresolved, placing without connection");
            }
            resolved
        });
        let draft = NodeDraft::new()
            .with_floor(self.floor_id())
            .at(placement.location)
            .with_visible(self.config.nodes_visible);

        match self.service.create_node_from(draft, target).await {
            Ok(node) => {
                let id = self.adopt_node(placement, node, true)?;
                if let Some(target) = target {
                    self.floor.mirror_connection(id, target);
                }
                Ok(EditorEvent::NodeCreated {
                    id,
                    connected_to: target,
                })
            }
            Err(EditorError::Unlinked {
                node,
                target,
                source,
            }) => {
                // The node exists; the chain continues from it.
                self.adopt_node(placement, (*node).clone(), false)?;
                Err(EditorError::Unlinked {
                    node,
                    target,
                    source,
                })
            }
            Err(e) => {
                self.tools.resolve_placement(placement.ticket, None);
                Err(e)
            }
        }
    }

    fn adopt_node(
        &mut self,
        placement: Placement,
        node: RouteNode,
        linked: bool,
    ) -> EditorResult<NodeId> {
        let Some(id) = node.id() else {
            self.tools.finish_placement(placement.ticket, Outcome::Failed);
            return Err(EditorError::invalid_state("store returned a node without an id"));
        };
        let outcome = if linked {
            Outcome::Created(id)
        } else {
            Outcome::Unlinked(id)
        };
        self.tools.finish_placement(placement.ticket, outcome);
        self.floor.upsert_node(node);
        Ok(id)
    }

    /// Feed a click on an existing node.
    ///
    /// With the route-node tool the node becomes the next placement's
    /// connection target; otherwise it is selected.
    pub fn click_node(&mut self, id: NodeId) -> EditorResult<EditorEvent> {
        if !self.floor.contains(EntityKind::Node, id) {
            return Err(StorageError::not_found(EntityKind::Node, id).into());
        }
        self.selection = Some(Selection::Node(id));
        if self.tools.current_tool == ToolKind::PlaceRouteNode {
            self.tools.pick_node(id);
            return Ok(EditorEvent::NodePicked(id));
        }
        Ok(EditorEvent::SelectionChanged(self.selection))
    }

    /// Select any entity on the floor, or clear the selection.
    pub fn select(&mut self, selection: Option<Selection>) -> EditorResult<EditorEvent> {
        if let Some(sel) = selection {
            if !self.floor.contains(sel.kind(), sel.id()) {
                return Err(StorageError::not_found(sel.kind(), sel.id()).into());
            }
        }
        self.selection = selection;
        Ok(EditorEvent::SelectionChanged(selection))
    }

    /// Discard pending points, dialogs and chaining state.
    ///
    /// Persistence calls already dispatched are not affected.
    pub fn cancel(&mut self) -> EditorEvent {
        self.tools.cancel();
        EditorEvent::Cancelled
    }

    /// Persist the closed ring with the host's details.
    ///
    /// The ring stays pending if validation or persistence fails, so the host
    /// can retry or cancel.
    pub async fn confirm_polygon(&mut self, details: PolygonDetails) -> EditorResult<EditorEvent> {
        let ring = match self.tools.awaiting() {
            Some(Awaiting::Polygon(ring)) => ring.clone(),
            _ => return Err(EditorError::invalid_state("no closed polygon awaiting details")),
        };
        let (kind, color) = if details.is_wall {
            (PolygonKind::Wall, self.config.wall_color)
        } else {
            (
                details.kind.unwrap_or_default(),
                details.color.unwrap_or(self.config.polygon_color),
            )
        };
        let draft = PolygonDraft::new()
            .with_floor(self.floor_id())
            .with_name(details.name)
            .with_description(details.description)
            .with_kind(kind)
            .with_color(color)
            .with_category(details.category_id)
            .with_ring(ring);
        let polygon = self.service.create_polygon(draft).await?;
        self.tools.take_polygon()?;
        let id = polygon
            .id()
            .ok_or_else(|| EditorError::invalid_state("store returned a polygon without an id"))?;
        self.floor.upsert_polygon(polygon);
        Ok(EditorEvent::PolygonCreated(id))
    }

    /// Persist the placed beacon with the host's details. Like polygons, the
    /// location stays pending on failure.
    pub async fn confirm_beacon(&mut self, details: BeaconDetails) -> EditorResult<EditorEvent> {
        let location = match self.tools.awaiting() {
            Some(Awaiting::Beacon(location)) => *location,
            _ => return Err(EditorError::invalid_state("no beacon awaiting details")),
        };
        let mut draft = BeaconDraft::new()
            .with_floor(self.floor_id())
            .with_name(details.name)
            .with_beacon_type(details.beacon_type_id)
            .at(location);
        if let Some(uuid) = details.uuid {
            draft = draft.with_uuid(uuid);
        }
        if let Some(major) = details.major_id {
            draft = draft.with_major(major);
        }
        if let Some(minor) = details.minor_id {
            draft = draft.with_minor(minor);
        }
        let beacon = self.service.create_beacon(draft).await?;
        self.tools.take_beacon()?;
        let id = beacon
            .id()
            .ok_or_else(|| EditorError::invalid_state("store returned a beacon without an id"))?;
        self.floor.upsert_beacon(beacon);
        Ok(EditorEvent::BeaconCreated(id))
    }

    /// The open connector dialog, for the host to edit.
    pub fn connector_dialog_mut(&mut self) -> Option<&mut ConnectorDialog> {
        self.tools.connector_dialog_mut()
    }

    /// Confirm the connector dialog and run the multi-floor protocol.
    ///
    /// The node on the current floor joins the route-node chain. On failure
    /// the floor is reloaded, since earlier steps may have persisted.
    pub async fn confirm_connector(&mut self) -> EditorResult<EditorEvent> {
        let choice = self.tools.take_connector()?;
        let placement = self.tools.place_node(choice.location);
        let target = placement.connect_to.and_then(|r| self.tools.resolve_ref(r));

        let result = self
            .service
            .create_multi_floor_nodes(
                &choice.floors,
                choice.location,
                choice.node_type,
                choice.current_floor,
                target,
            )
            .await;

        let nodes = match result {
            Ok(nodes) => nodes,
            Err(e) => {
                self.tools.resolve_placement(placement.ticket, None);
                self.reload_after_failure().await;
                return Err(e);
            }
        };

        let ids: Vec<NodeId> = nodes.iter().filter_map(RouteNode::id).collect();
        let current = nodes
            .into_iter()
            .find(|n| n.floor_id == choice.current_floor);
        match current.as_ref().and_then(RouteNode::id) {
            Some(id) => self.tools.resolve_placement(placement.ticket, Some(id)),
            None => self.tools.resolve_placement(placement.ticket, None),
        }
        if let Some(node) = current {
            let id = node.id();
            self.floor.upsert_node(node);
            if let (Some(id), Some(target)) = (id, target) {
                self.floor.mirror_connection(id, target);
            }
        }
        Ok(EditorEvent::ConnectorCreated { nodes: ids })
    }

    /// Apply a patch to the selected polygon.
    pub async fn update_polygon(&mut self, id: PolygonId, patch: PolygonPatch) -> EditorResult<EditorEvent> {
        let current = self
            .floor
            .polygons
            .iter()
            .find(|p| p.id() == Some(id))
            .ok_or_else(|| StorageError::not_found(EntityKind::Polygon, id))?
            .clone();
        let updated = self.service.update_polygon(&current, patch).await?;
        self.floor.upsert_polygon(updated);
        Ok(EditorEvent::Updated(Selection::Polygon(id)))
    }

    pub async fn update_beacon(&mut self, id: BeaconId, patch: BeaconPatch) -> EditorResult<EditorEvent> {
        let current = self
            .floor
            .beacons
            .iter()
            .find(|b| b.id() == Some(id))
            .ok_or_else(|| StorageError::not_found(EntityKind::Beacon, id))?
            .clone();
        let updated = self.service.update_beacon(&current, patch).await?;
        self.floor.upsert_beacon(updated);
        Ok(EditorEvent::Updated(Selection::Beacon(id)))
    }

    pub async fn update_route_node(&mut self, id: NodeId, patch: NodePatch) -> EditorResult<EditorEvent> {
        let current = self
            .floor
            .node(id)
            .ok_or_else(|| StorageError::not_found(EntityKind::Node, id))?
            .clone();
        let updated = self.service.update_route_node(&current, patch).await?;
        self.floor.upsert_node(updated);
        Ok(EditorEvent::Updated(Selection::Node(id)))
    }

    /// Delete the selected entity.
    pub async fn delete_selected(&mut self) -> EditorResult<EditorEvent> {
        let selection = self
            .selection
            .ok_or_else(|| EditorError::invalid_state("nothing selected"))?;
        let item = DeleteItem::new(selection.kind(), selection.id());
        self.service.bulk_delete(&[item]).await?;
        self.floor.remove(selection.kind(), selection.id());
        if selection.kind() == EntityKind::Node {
            self.tools.forget_node(selection.id());
        }
        self.selection = None;
        Ok(EditorEvent::Deleted(selection))
    }

    /// Remove everything on the active floor. Pending sub-state is discarded first.
    pub async fn clear_all(&mut self) -> EditorResult<EditorEvent> {
        self.tools.cancel();
        self.selection = None;
        let floor = self.floor_id();
        match self.service.clear_floor(floor).await {
            Ok(removed) => {
                self.floor = FloorState::new(floor);
                Ok(EditorEvent::FloorCleared { removed })
            }
            Err(e) => {
                self.reload_after_failure().await;
                Err(e)
            }
        }
    }

    /// Reassign points of interest on the active floor to their closest node.
    pub async fn recalculate_poi_nodes(&self) -> EditorResult<RecalculationSummary> {
        self.service.recalculate_poi_nodes(self.floor_id()).await
    }

    /// Replace the working set with the store's view of the active floor.
    pub async fn reload(&mut self) -> EditorResult<EditorEvent> {
        let floor = self.floor_id();
        self.floor = self.service.load_floor(floor).await?;
        if let Some(sel) = self.selection {
            if !self.floor.contains(sel.kind(), sel.id()) {
                self.selection = None;
            }
        }
        if let Some(picked) = self.tools.selected_for_connection() {
            if !self.floor.contains(EntityKind::Node, picked) {
                self.tools.forget_node(picked);
            }
        }
        if let Some(last) = self.tools.last_confirmed() {
            if !self.floor.contains(EntityKind::Node, last) {
                self.tools.forget_node(last);
            }
        }
        log::debug!("floor {floor} loaded: {} entities", self.floor.len());
        Ok(EditorEvent::FloorLoaded(floor))
    }

    /// Move the session to another floor. Pending sub-state is discarded.
    pub async fn switch_floor(&mut self, floor: FloorId) -> EditorResult<EditorEvent> {
        self.tools.cancel();
        self.selection = None;
        self.floor = FloorState::new(floor);
        self.reload().await
    }

    async fn reload_after_failure(&mut self) {
        if let Err(e) = self.reload().await {
            log::error!("reload after failed operation also failed: {e}");
        }
    }
}
