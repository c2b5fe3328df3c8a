//! Persistence collaborator for floor-plan entities.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::{MemoryStore, StoreOp};

use crate::model::{
    Beacon, BeaconId, Building, BuildingId, CatalogEntry, EntityKind, Floor, FloorId, NodeId,
    Polygon, PolygonId, RouteNode,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: u64 },
    #[error("Request rejected: {0}")]
    Rejected(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

impl StorageError {
    pub fn not_found(kind: EntityKind, id: u64) -> Self {
        StorageError::NotFound { kind, id }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Outcome of the external nearest-node reassignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalculationSummary {
    pub floor_id: FloorId,
    /// Number of points of interest whose closest node changed.
    pub updated: usize,
    /// Number of route nodes considered.
    pub nodes_considered: usize,
}

/// Trait for floor-plan persistence backends.
///
/// Creation takes an unidentified entity and resolves to the stored entity
/// carrying its server-assigned identifier and timestamps. Updates take the
/// fully merged entity. `add_connection` establishes an undirected edge: after
/// it resolves, each endpoint lists the other.
pub trait FloorPlanStore: Send + Sync {
    // Route nodes
    fn list_nodes(&self, floor: FloorId) -> BoxFuture<'_, StorageResult<Vec<RouteNode>>>;
    fn create_node(&self, node: RouteNode) -> BoxFuture<'_, StorageResult<RouteNode>>;
    fn update_node(&self, node: RouteNode) -> BoxFuture<'_, StorageResult<RouteNode>>;
    /// Delete a node and remove it from the connection set of every other node.
    fn delete_node(&self, id: NodeId) -> BoxFuture<'_, StorageResult<()>>;
    fn add_connection(&self, a: NodeId, b: NodeId) -> BoxFuture<'_, StorageResult<()>>;
    /// Invoke the external nearest-node reassignment for points of interest on `floor`.
    fn recalculate_closest_nodes(
        &self,
        floor: FloorId,
    ) -> BoxFuture<'_, StorageResult<RecalculationSummary>>;

    // Polygons
    fn list_polygons(&self, floor: FloorId) -> BoxFuture<'_, StorageResult<Vec<Polygon>>>;
    fn create_polygon(&self, polygon: Polygon) -> BoxFuture<'_, StorageResult<Polygon>>;
    fn update_polygon(&self, polygon: Polygon) -> BoxFuture<'_, StorageResult<Polygon>>;
    fn delete_polygon(&self, id: PolygonId) -> BoxFuture<'_, StorageResult<()>>;

    // Beacons
    fn list_beacons(&self, floor: FloorId) -> BoxFuture<'_, StorageResult<Vec<Beacon>>>;
    fn create_beacon(&self, beacon: Beacon) -> BoxFuture<'_, StorageResult<Beacon>>;
    fn update_beacon(&self, beacon: Beacon) -> BoxFuture<'_, StorageResult<Beacon>>;
    fn delete_beacon(&self, id: BeaconId) -> BoxFuture<'_, StorageResult<()>>;

    // Buildings and floors
    fn list_buildings(&self) -> BoxFuture<'_, StorageResult<Vec<Building>>>;
    fn create_building(&self, building: Building) -> BoxFuture<'_, StorageResult<Building>>;
    fn list_floors(&self, building: BuildingId) -> BoxFuture<'_, StorageResult<Vec<Floor>>>;
    fn create_floor(&self, floor: Floor) -> BoxFuture<'_, StorageResult<Floor>>;

    // Catalog kinds
    fn list_beacon_types(&self) -> BoxFuture<'_, StorageResult<Vec<CatalogEntry>>>;
    fn list_categories(&self) -> BoxFuture<'_, StorageResult<Vec<CatalogEntry>>>;
}
