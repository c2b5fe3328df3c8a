//! File-backed storage for native platforms.

use super::memory::PlanTables;
use super::{BoxFuture, FloorPlanStore, MemoryStore, RecalculationSummary, StorageError, StorageResult};
use crate::draft::MIN_RING_POINTS;
use crate::model::{
    Beacon, BeaconId, Building, BuildingId, CatalogEntry, Floor, FloorId, NodeId, Polygon,
    PolygonId, RouteNode,
};
use std::fs;
use std::path::{Path, PathBuf};

/// File-based store.
///
/// Keeps the whole plan as one JSON document. Reads are served from memory;
/// every successful mutation rewrites the document.
pub struct FileStore {
    /// Path of the plan document.
    path: PathBuf,
    working: MemoryStore,
}

impl FileStore {
    /// Open the plan at `path`, starting empty if the file does not exist.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Io(format!("Failed to create storage directory: {}", e))
                })?;
            }
        }

        let tables = if path.exists() {
            let json = fs::read_to_string(&path).map_err(|e| {
                StorageError::Io(format!("Failed to read {}: {}", path.display(), e))
            })?;
            serde_json::from_str::<PlanTables>(&json).map_err(|e| {
                StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
            })?
        } else {
            PlanTables::default()
        };
        if let Some(polygon) = tables.short_ring() {
            return Err(StorageError::Serialization(format!(
                "Polygon {} in {} has {} ring points, at least {} required",
                polygon.id().unwrap_or_default(),
                path.display(),
                polygon.ring().len(),
                MIN_RING_POINTS
            )));
        }
        log::info!("opened plan store at {}", path.display());

        Ok(Self {
            path,
            working: MemoryStore::from_tables(tables),
        })
    }

    /// Open the plan named `name` in the default location.
    ///
    /// On Unix: `~/.local/share/navplan/plans/<name>.json`
    /// On Windows: `%LOCALAPPDATA%\navplan\plans\<name>.json`
    pub fn default_location(name: &str) -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;

        // Sanitize the name to be safe for filenames
        let safe_name: String = name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        Self::open(base.join("navplan").join("plans").join(format!("{}.json", safe_name)))
    }

    /// Get the document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> StorageResult<()> {
        let tables = self.working.tables()?;
        let json = serde_json::to_string_pretty(&tables)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| {
            StorageError::Io(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

impl FloorPlanStore for FileStore {
    fn list_nodes(&self, floor: FloorId) -> BoxFuture<'_, StorageResult<Vec<RouteNode>>> {
        self.working.list_nodes(floor)
    }

    fn create_node(&self, node: RouteNode) -> BoxFuture<'_, StorageResult<RouteNode>> {
        Box::pin(async move {
            let created = self.working.create_node(node).await?;
            self.persist()?;
            Ok(created)
        })
    }

    fn update_node(&self, node: RouteNode) -> BoxFuture<'_, StorageResult<RouteNode>> {
        Box::pin(async move {
            let updated = self.working.update_node(node).await?;
            self.persist()?;
            Ok(updated)
        })
    }

    fn delete_node(&self, id: NodeId) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            self.working.delete_node(id).await?;
            self.persist()
        })
    }

    fn add_connection(&self, a: NodeId, b: NodeId) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            self.working.add_connection(a, b).await?;
            self.persist()
        })
    }

    fn recalculate_closest_nodes(
        &self,
        floor: FloorId,
    ) -> BoxFuture<'_, StorageResult<RecalculationSummary>> {
        self.working.recalculate_closest_nodes(floor)
    }

    fn list_polygons(&self, floor: FloorId) -> BoxFuture<'_, StorageResult<Vec<Polygon>>> {
        self.working.list_polygons(floor)
    }

    fn create_polygon(&self, polygon: Polygon) -> BoxFuture<'_, StorageResult<Polygon>> {
        Box::pin(async move {
            let created = self.working.create_polygon(polygon).await?;
            self.persist()?;
            Ok(created)
        })
    }

    fn update_polygon(&self, polygon: Polygon) -> BoxFuture<'_, StorageResult<Polygon>> {
        Box::pin(async move {
            let updated = self.working.update_polygon(polygon).await?;
            self.persist()?;
            Ok(updated)
        })
    }

    fn delete_polygon(&self, id: PolygonId) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            self.working.delete_polygon(id).await?;
            self.persist()
        })
    }

    fn list_beacons(&self, floor: FloorId) -> BoxFuture<'_, StorageResult<Vec<Beacon>>> {
        self.working.list_beacons(floor)
    }

    fn create_beacon(&self, beacon: Beacon) -> BoxFuture<'_, StorageResult<Beacon>> {
        Box::pin(async move {
            let created = self.working.create_beacon(beacon).await?;
            self.persist()?;
            Ok(created)
        })
    }

    fn update_beacon(&self, beacon: Beacon) -> BoxFuture<'_, StorageResult<Beacon>> {
        Box::pin(async move {
            let updated = self.working.update_beacon(beacon).await?;
            self.persist()?;
            Ok(updated)
        })
    }

    fn delete_beacon(&self, id: BeaconId) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            self.working.delete_beacon(id).await?;
            self.persist()
        })
    }

    fn list_buildings(&self) -> BoxFuture<'_, StorageResult<Vec<Building>>> {
        self.working.list_buildings()
    }

    fn create_building(&self, building: Building) -> BoxFuture<'_, StorageResult<Building>> {
        Box::pin(async move {
            let created = self.working.create_building(building).await?;
            self.persist()?;
            Ok(created)
        })
    }

    fn list_floors(&self, building: BuildingId) -> BoxFuture<'_, StorageResult<Vec<Floor>>> {
        self.working.list_floors(building)
    }

    fn create_floor(&self, floor: Floor) -> BoxFuture<'_, StorageResult<Floor>> {
        Box::pin(async move {
            let created = self.working.create_floor(floor).await?;
            self.persist()?;
            Ok(created)
        })
    }

    fn list_beacon_types(&self) -> BoxFuture<'_, StorageResult<Vec<CatalogEntry>>> {
        self.working.list_beacon_types()
    }

    fn list_categories(&self) -> BoxFuture<'_, StorageResult<Vec<CatalogEntry>>> {
        self.working.list_categories()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{NodeDraft, PolygonDraft};
    use kurbo::Point;
    use pollster::block_on;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plan.json");

        let (a, b) = {
            let store = FileStore::open(&path).unwrap();
            let node = NodeDraft::new().with_floor(1).at(Point::new(1.0, 2.0)).build().unwrap();
            let a = block_on(store.create_node(node.clone())).unwrap().id().unwrap();
            let b = block_on(store.create_node(node)).unwrap().id().unwrap();
            block_on(store.add_connection(a, b)).unwrap();
            (a, b)
        };

        let reopened = FileStore::open(&path).unwrap();
        let nodes = block_on(reopened.list_nodes(1)).unwrap();
        assert_eq!(nodes.len(), 2);
        let first = nodes.iter().find(|n| n.id() == Some(a)).unwrap();
        assert!(first.is_connected_to(b));

        // Identifiers keep increasing after reopening.
        let polygon = PolygonDraft::new()
            .with_floor(1)
            .with_name("Hall")
            .with_ring(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)])
            .build()
            .unwrap();
        let created = block_on(reopened.create_polygon(polygon)).unwrap();
        assert!(created.id().unwrap() > b);
    }

    #[test]
    fn test_file_store_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("plans").join("hq.json");
        let store = FileStore::open(&path).unwrap();
        let node = NodeDraft::new().with_floor(3).build().unwrap();
        block_on(store.create_node(node)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_file_store_rejects_corrupt_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            FileStore::open(&path),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn test_file_store_rejects_short_ring() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plan.json");
        {
            let store = FileStore::open(&path).unwrap();
            let polygon = PolygonDraft::new()
                .with_floor(1)
                .with_name("Hall")
                .with_ring(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)])
                .build()
                .unwrap();
            block_on(store.create_polygon(polygon)).unwrap();
        }

        let mut doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        for polygon in doc["polygons"].as_object_mut().unwrap().values_mut() {
            polygon["ring"].as_array_mut().unwrap().truncate(2);
        }
        fs::write(&path, doc.to_string()).unwrap();

        assert!(matches!(
            FileStore::open(&path),
            Err(StorageError::Serialization(_))
        ));
    }
}
