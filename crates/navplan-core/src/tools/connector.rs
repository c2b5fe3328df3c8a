//! Connector placement dialog state.

use crate::error::{EditorError, EditorResult};
use crate::model::{FloorId, NodeType};
use kurbo::Point;
use std::collections::BTreeSet;

/// Selections collected while placing an elevator or stairs connector.
///
/// The floor the click happened on is always selected and cannot be removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorDialog {
    location: Point,
    current_floor: FloorId,
    floors: BTreeSet<FloorId>,
    node_type: NodeType,
    min_floors: usize,
}

/// Confirmed connector placement, ready for the multi-floor protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorChoice {
    pub location: Point,
    pub node_type: NodeType,
    /// Ascending, includes `current_floor`.
    pub floors: Vec<FloorId>,
    pub current_floor: FloorId,
}

impl ConnectorDialog {
    pub fn new(location: Point, current_floor: FloorId, min_floors: usize) -> Self {
        Self {
            location,
            current_floor,
            floors: BTreeSet::from([current_floor]),
            node_type: NodeType::Elevator,
            min_floors: min_floors.max(2),
        }
    }

    pub fn location(&self) -> Point {
        self.location
    }

    pub fn current_floor(&self) -> FloorId {
        self.current_floor
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn floors(&self) -> impl Iterator<Item = FloorId> + '_ {
        self.floors.iter().copied()
    }

    pub fn is_selected(&self, floor: FloorId) -> bool {
        self.floors.contains(&floor)
    }

    /// Only elevator and stairs are connectors.
    pub fn set_node_type(&mut self, node_type: NodeType) -> EditorResult<()> {
        if !node_type.is_connector() {
            return Err(EditorError::invalid_state(format!(
                "{node_type} is not a connector type"
            )));
        }
        self.node_type = node_type;
        Ok(())
    }

    pub fn select_floor(&mut self, floor: FloorId) {
        self.floors.insert(floor);
    }

    /// Returns false for the current floor, which stays selected.
    pub fn deselect_floor(&mut self, floor: FloorId) -> bool {
        if floor == self.current_floor {
            return false;
        }
        self.floors.remove(&floor)
    }

    /// Flip a floor's selection. Returns whether it is selected afterwards.
    pub fn toggle_floor(&mut self, floor: FloorId) -> bool {
        if self.is_selected(floor) {
            !self.deselect_floor(floor)
        } else {
            self.select_floor(floor);
            true
        }
    }

    pub fn can_confirm(&self) -> bool {
        self.floors.len() >= self.min_floors
    }

    pub fn confirm(&self) -> EditorResult<ConnectorChoice> {
        if !self.can_confirm() {
            return Err(EditorError::invalid_state(format!(
                "a connector needs at least {} floors, {} selected",
                self.min_floors,
                self.floors.len()
            )));
        }
        Ok(ConnectorChoice {
            location: self.location,
            node_type: self.node_type,
            floors: self.floors.iter().copied().collect(),
            current_floor: self.current_floor,
        })
    }
}
