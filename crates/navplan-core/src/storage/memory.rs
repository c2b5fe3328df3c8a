//! In-memory storage implementation.

use super::{BoxFuture, FloorPlanStore, RecalculationSummary, StorageError, StorageResult};
use crate::model::{
    Beacon, BeaconId, Building, BuildingId, CatalogEntry, EntityId, EntityKind, Floor, FloorId,
    NodeId, Polygon, PolygonId, RouteNode, now_millis,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};

/// Store operations that can be made to fail, for exercising partial failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    CreateNode,
    UpdateNode,
    DeleteNode,
    AddConnection,
    CreatePolygon,
    UpdatePolygon,
    DeletePolygon,
    CreateBeacon,
    UpdateBeacon,
    DeleteBeacon,
    ListFloorContents,
}

#[derive(Debug, Clone, Copy)]
struct FaultRule {
    op: StoreOp,
    /// Calls to let through before failing.
    skip: usize,
    /// Fail only once, then retire.
    once: bool,
    spent: bool,
}

#[derive(Debug, Default)]
struct FaultPlan {
    rules: Vec<FaultRule>,
    calls: HashMap<StoreOp, usize>,
}

impl FaultPlan {
    fn check(&mut self, op: StoreOp) -> StorageResult<()> {
        *self.calls.entry(op).or_default() += 1;
        let Some(rule) = self.rules.iter_mut().find(|r| r.op == op && !r.spent) else {
            return Ok(());
        };
        if rule.skip > 0 {
            rule.skip -= 1;
            return Ok(());
        }
        if rule.once {
            rule.spent = true;
        }
        Err(StorageError::Rejected(format!("injected failure on {op:?}")))
    }
}

/// All tables of a plan. Serialized as a whole by the file store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct PlanTables {
    next_id: EntityId,
    buildings: BTreeMap<BuildingId, Building>,
    floors: BTreeMap<FloorId, Floor>,
    nodes: BTreeMap<NodeId, RouteNode>,
    polygons: BTreeMap<PolygonId, Polygon>,
    beacons: BTreeMap<BeaconId, Beacon>,
    beacon_types: Vec<CatalogEntry>,
    categories: Vec<CatalogEntry>,
}

impl PlanTables {
    fn allocate(&mut self) -> EntityId {
        self.next_id += 1;
        self.next_id
    }

    /// First polygon whose ring is too short to close.
    pub(crate) fn short_ring(&self) -> Option<&Polygon> {
        self.polygons
            .values()
            .find(|p| p.ring.len() < crate::draft::MIN_RING_POINTS)
    }
}

fn reject_identified(kind: EntityKind, id: Option<EntityId>) -> StorageResult<()> {
    match id {
        Some(id) => Err(StorageError::Rejected(format!(
            "{kind} already has identifier {id}"
        ))),
        None => Ok(()),
    }
}

fn require_identified(kind: EntityKind, id: Option<EntityId>) -> StorageResult<EntityId> {
    id.ok_or_else(|| StorageError::Rejected(format!("{kind} update without identifier")))
}

/// In-memory store for tests, demos and as the working set of [`FileStore`](super::FileStore).
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<PlanTables>,
    faults: Mutex<FaultPlan>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_tables(tables: PlanTables) -> Self {
        Self {
            tables: RwLock::new(tables),
            faults: Mutex::new(FaultPlan::default()),
        }
    }

    pub(crate) fn tables(&self) -> StorageResult<PlanTables> {
        Ok(self.read()?.clone())
    }

    /// Make every call of `op` fail.
    pub fn fail_on(&self, op: StoreOp) {
        self.add_rule(FaultRule {
            op,
            skip: 0,
            once: false,
            spent: false,
        });
    }

    /// Make the `nth` (1-based) call of `op` from now on fail, once.
    pub fn fail_on_nth(&self, op: StoreOp, nth: usize) {
        self.add_rule(FaultRule {
            op,
            skip: nth.saturating_sub(1),
            once: true,
            spent: false,
        });
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.rules.clear();
        }
    }

    /// Number of times `op` has been attempted.
    pub fn calls(&self, op: StoreOp) -> usize {
        self.faults
            .lock()
            .map(|f| f.calls.get(&op).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Register a beacon type in the catalog.
    pub fn insert_beacon_type(&self, name: &str) -> StorageResult<EntityId> {
        let mut tables = self.write()?;
        let id = tables.allocate();
        tables.beacon_types.push(CatalogEntry {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    /// Register a POI category in the catalog.
    pub fn insert_category(&self, name: &str) -> StorageResult<EntityId> {
        let mut tables = self.write()?;
        let id = tables.allocate();
        tables.categories.push(CatalogEntry {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    fn add_rule(&self, rule: FaultRule) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.rules.push(rule);
        }
    }

    fn check(&self, op: StoreOp) -> StorageResult<()> {
        self.faults
            .lock()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?
            .check(op)
    }

    fn read(&self) -> StorageResult<std::sync::RwLockReadGuard<'_, PlanTables>> {
        self.tables
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))
    }

    fn write(&self) -> StorageResult<std::sync::RwLockWriteGuard<'_, PlanTables>> {
        self.tables
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))
    }
}

impl FloorPlanStore for MemoryStore {
    fn list_nodes(&self, floor: FloorId) -> BoxFuture<'_, StorageResult<Vec<RouteNode>>> {
        Box::pin(async move {
            self.check(StoreOp::ListFloorContents)?;
            let tables = self.read()?;
            Ok(tables
                .nodes
                .values()
                .filter(|n| n.floor_id == floor)
                .cloned()
                .collect())
        })
    }

    fn create_node(&self, node: RouteNode) -> BoxFuture<'_, StorageResult<RouteNode>> {
        Box::pin(async move {
            reject_identified(EntityKind::Node, node.id)?;
            self.check(StoreOp::CreateNode)?;
            let mut tables = self.write()?;
            let id = tables.allocate();
            let now = now_millis();
            let mut node = node;
            node.id = Some(id);
            node.connections.clear();
            node.created_at = Some(now);
            node.updated_at = Some(now);
            tables.nodes.insert(id, node.clone());
            log::debug!("created node {} on floor {}", id, node.floor_id);
            Ok(node)
        })
    }

    fn update_node(&self, node: RouteNode) -> BoxFuture<'_, StorageResult<RouteNode>> {
        Box::pin(async move {
            let id = require_identified(EntityKind::Node, node.id)?;
            self.check(StoreOp::UpdateNode)?;
            let mut tables = self.write()?;
            let stored = tables
                .nodes
                .get_mut(&id)
                .ok_or_else(|| StorageError::not_found(EntityKind::Node, id))?;
            let mut node = node;
            // Connections change only through add_connection.
            node.connections = stored.connections.clone();
            node.created_at = stored.created_at;
            node.updated_at = Some(now_millis());
            *stored = node.clone();
            Ok(node)
        })
    }

    fn delete_node(&self, id: NodeId) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            self.check(StoreOp::DeleteNode)?;
            let mut tables = self.write()?;
            let removed = tables
                .nodes
                .remove(&id)
                .ok_or_else(|| StorageError::not_found(EntityKind::Node, id))?;
            for other in removed.connections.iter() {
                if let Some(node) = tables.nodes.get_mut(other) {
                    node.unlink(id);
                }
            }
            Ok(())
        })
    }

    fn add_connection(&self, a: NodeId, b: NodeId) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            if a == b {
                return Err(StorageError::Rejected(format!(
                    "node {a} cannot be connected to itself"
                )));
            }
            self.check(StoreOp::AddConnection)?;
            let mut tables = self.write()?;
            for id in [a, b] {
                if !tables.nodes.contains_key(&id) {
                    return Err(StorageError::not_found(EntityKind::Node, id));
                }
            }
            let now = now_millis();
            for (from, to) in [(a, b), (b, a)] {
                if let Some(node) = tables.nodes.get_mut(&from) {
                    if node.link(to) {
                        node.updated_at = Some(now);
                    }
                }
            }
            Ok(())
        })
    }

    fn recalculate_closest_nodes(
        &self,
        floor: FloorId,
    ) -> BoxFuture<'_, StorageResult<RecalculationSummary>> {
        Box::pin(async move {
            let tables = self.read()?;
            let nodes_considered = tables.nodes.values().filter(|n| n.floor_id == floor).count();
            Ok(RecalculationSummary {
                floor_id: floor,
                updated: 0,
                nodes_considered,
            })
        })
    }

    fn list_polygons(&self, floor: FloorId) -> BoxFuture<'_, StorageResult<Vec<Polygon>>> {
        Box::pin(async move {
            self.check(StoreOp::ListFloorContents)?;
            let tables = self.read()?;
            Ok(tables
                .polygons
                .values()
                .filter(|p| p.floor_id == floor)
                .cloned()
                .collect())
        })
    }

    fn create_polygon(&self, polygon: Polygon) -> BoxFuture<'_, StorageResult<Polygon>> {
        Box::pin(async move {
            reject_identified(EntityKind::Polygon, polygon.id)?;
            self.check(StoreOp::CreatePolygon)?;
            let mut tables = self.write()?;
            let id = tables.allocate();
            let now = now_millis();
            let mut polygon = polygon;
            polygon.id = Some(id);
            polygon.created_at = Some(now);
            polygon.updated_at = Some(now);
            tables.polygons.insert(id, polygon.clone());
            Ok(polygon)
        })
    }

    fn update_polygon(&self, polygon: Polygon) -> BoxFuture<'_, StorageResult<Polygon>> {
        Box::pin(async move {
            let id = require_identified(EntityKind::Polygon, polygon.id)?;
            self.check(StoreOp::UpdatePolygon)?;
            let mut tables = self.write()?;
            let stored = tables
                .polygons
                .get_mut(&id)
                .ok_or_else(|| StorageError::not_found(EntityKind::Polygon, id))?;
            let mut polygon = polygon;
            polygon.created_at = stored.created_at;
            polygon.updated_at = Some(now_millis());
            *stored = polygon.clone();
            Ok(polygon)
        })
    }

    fn delete_polygon(&self, id: PolygonId) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            self.check(StoreOp::DeletePolygon)?;
            let mut tables = self.write()?;
            tables
                .polygons
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| StorageError::not_found(EntityKind::Polygon, id))
        })
    }

    fn list_beacons(&self, floor: FloorId) -> BoxFuture<'_, StorageResult<Vec<Beacon>>> {
        Box::pin(async move {
            self.check(StoreOp::ListFloorContents)?;
            let tables = self.read()?;
            Ok(tables
                .beacons
                .values()
                .filter(|b| b.floor_id == floor)
                .cloned()
                .collect())
        })
    }

    fn create_beacon(&self, beacon: Beacon) -> BoxFuture<'_, StorageResult<Beacon>> {
        Box::pin(async move {
            reject_identified(EntityKind::Beacon, beacon.id)?;
            self.check(StoreOp::CreateBeacon)?;
            let mut tables = self.write()?;
            let id = tables.allocate();
            let now = now_millis();
            let mut beacon = beacon;
            beacon.id = Some(id);
            beacon.created_at = Some(now);
            beacon.updated_at = Some(now);
            tables.beacons.insert(id, beacon.clone());
            Ok(beacon)
        })
    }

    fn update_beacon(&self, beacon: Beacon) -> BoxFuture<'_, StorageResult<Beacon>> {
        Box::pin(async move {
            let id = require_identified(EntityKind::Beacon, beacon.id)?;
            self.check(StoreOp::UpdateBeacon)?;
            let mut tables = self.write()?;
            let stored = tables
                .beacons
                .get_mut(&id)
                .ok_or_else(|| StorageError::not_found(EntityKind::Beacon, id))?;
            let mut beacon = beacon;
            beacon.created_at = stored.created_at;
            beacon.updated_at = Some(now_millis());
            *stored = beacon.clone();
            Ok(beacon)
        })
    }

    fn delete_beacon(&self, id: BeaconId) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            self.check(StoreOp::DeleteBeacon)?;
            let mut tables = self.write()?;
            tables
                .beacons
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| StorageError::not_found(EntityKind::Beacon, id))
        })
    }

    fn list_buildings(&self) -> BoxFuture<'_, StorageResult<Vec<Building>>> {
        Box::pin(async move { Ok(self.read()?.buildings.values().cloned().collect()) })
    }

    fn create_building(&self, building: Building) -> BoxFuture<'_, StorageResult<Building>> {
        Box::pin(async move {
            let mut tables = self.write()?;
            let id = tables.allocate();
            let mut building = building;
            building.id = Some(id);
            tables.buildings.insert(id, building.clone());
            Ok(building)
        })
    }

    fn list_floors(&self, building: BuildingId) -> BoxFuture<'_, StorageResult<Vec<Floor>>> {
        Box::pin(async move {
            let tables = self.read()?;
            let mut floors: Vec<Floor> = tables
                .floors
                .values()
                .filter(|f| f.building_id == building)
                .cloned()
                .collect();
            floors.sort_by_key(|f| f.number);
            Ok(floors)
        })
    }

    fn create_floor(&self, floor: Floor) -> BoxFuture<'_, StorageResult<Floor>> {
        Box::pin(async move {
            let mut tables = self.write()?;
            if !tables.buildings.contains_key(&floor.building_id) {
                return Err(StorageError::Rejected(format!(
                    "building {} does not exist",
                    floor.building_id
                )));
            }
            let id = tables.allocate();
            let mut floor = floor;
            floor.id = Some(id);
            floor.nodes = None;
            floor.polygons = None;
            tables.floors.insert(id, floor.clone());
            Ok(floor)
        })
    }

    fn list_beacon_types(&self) -> BoxFuture<'_, StorageResult<Vec<CatalogEntry>>> {
        Box::pin(async move { Ok(self.read()?.beacon_types.clone()) })
    }

    fn list_categories(&self) -> BoxFuture<'_, StorageResult<Vec<CatalogEntry>>> {
        Box::pin(async move { Ok(self.read()?.categories.clone()) })
    }
}
