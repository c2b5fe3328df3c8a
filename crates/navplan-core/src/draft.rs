//! Validated construction of floor-plan entities.
//!
//! Every entity is produced by a draft: an immutable record refined through
//! `with_*` steps and finished by [`build`](PolygonDraft::build), which either
//! returns a fully valid value or a [`ValidationError`] naming the first
//! invalid field. Drafts created from an existing entity (`for_update`) are in
//! update mode and additionally require the identifier and timestamp the
//! store assigned; drafts for creation never carry server-only fields.

use crate::error::ValidationError;
use crate::model::{
    Beacon, BeaconTypeId, Building, BuildingId, CategoryId, EntityId, Floor, FloorId, IBeacon,
    NodeId, NodeType, Polygon, PolygonKind, RouteNode, SerializableColor,
};
use kurbo::Point;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Minimum number of points in a polygon ring.
pub const MIN_RING_POINTS: usize = 3;

/// Largest iBeacon major/minor value.
pub const IBEACON_ID_MAX: i64 = u16::MAX as i64;

type DraftResult<T> = Result<T, ValidationError>;

/// Whether a draft creates a new entity or rewrites a persisted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DraftMode {
    #[default]
    Create,
    Update,
}

/// Identity carried by update drafts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Identity {
    id: Option<EntityId>,
    created_at: Option<i64>,
    updated_at: Option<i64>,
}

impl Identity {
    fn check(&self, mode: DraftMode) -> DraftResult<()> {
        if mode == DraftMode::Create {
            return Ok(());
        }
        if self.id.is_none() {
            return Err(ValidationError::new("id", "required when updating"));
        }
        if self.updated_at.is_none() {
            return Err(ValidationError::new("updated_at", "required when updating"));
        }
        Ok(())
    }

    fn for_mode(self, mode: DraftMode) -> Self {
        match mode {
            DraftMode::Create => Self::default(),
            DraftMode::Update => self,
        }
    }
}

fn check_location(field: &'static str, p: Point) -> DraftResult<()> {
    if !p.x.is_finite() || !(-180.0..=180.0).contains(&p.x) {
        return Err(ValidationError::new(
            field,
            format!("longitude {} outside [-180, 180]", p.x),
        ));
    }
    if !p.y.is_finite() || !(-90.0..=90.0).contains(&p.y) {
        return Err(ValidationError::new(
            field,
            format!("latitude {} outside [-90, 90]", p.y),
        ));
    }
    Ok(())
}

fn check_required_text(field: &'static str, value: &str) -> DraftResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

fn require<T: Copy>(field: &'static str, value: Option<T>) -> DraftResult<T> {
    value.ok_or_else(|| ValidationError::new(field, "required"))
}

// ---------------------------------------------------------------------------
// Route nodes
// ---------------------------------------------------------------------------

/// Partial update of a route node. Connections are never patched; they change
/// only through the store's connect operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub location: Option<Point>,
    pub visible: Option<bool>,
    pub node_type: Option<NodeType>,
}

/// Draft of a [`RouteNode`].
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDraft {
    mode: DraftMode,
    identity: Identity,
    floor_id: Option<FloorId>,
    location: Option<Point>,
    visible: bool,
    node_type: NodeType,
    connections: BTreeSet<NodeId>,
}

impl Default for NodeDraft {
    fn default() -> Self {
        Self {
            mode: DraftMode::Create,
            identity: Identity::default(),
            floor_id: None,
            location: None,
            visible: true,
            node_type: NodeType::Waypoint,
            connections: BTreeSet::new(),
        }
    }
}

impl NodeDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an update draft from a persisted node.
    pub fn for_update(node: &RouteNode) -> Self {
        Self {
            mode: DraftMode::Update,
            identity: Identity {
                id: node.id,
                created_at: node.created_at,
                updated_at: node.updated_at,
            },
            floor_id: Some(node.floor_id),
            location: node.location,
            visible: node.visible,
            node_type: node.node_type,
            connections: node.connections.clone(),
        }
    }

    pub fn mode(&self) -> DraftMode {
        self.mode
    }

    pub fn with_floor(mut self, floor_id: FloorId) -> Self {
        self.floor_id = Some(floor_id);
        self
    }

    pub fn at(mut self, location: Point) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_node_type(mut self, node_type: NodeType) -> Self {
        self.node_type = node_type;
        self
    }

    pub fn apply(self, patch: NodePatch) -> Self {
        let Self {
            mode,
            identity,
            floor_id,
            location,
            visible,
            node_type,
            connections,
        } = self;
        Self {
            mode,
            identity,
            floor_id,
            location: patch.location.or(location),
            visible: patch.visible.unwrap_or(visible),
            node_type: patch.node_type.unwrap_or(node_type),
            connections,
        }
    }

    pub fn validate(&self) -> DraftResult<()> {
        self.identity.check(self.mode)?;
        require("floor_id", self.floor_id)?;
        if let Some(location) = self.location {
            check_location("location", location)?;
        }
        Ok(())
    }

    pub fn build(self) -> DraftResult<RouteNode> {
        self.validate()?;
        let identity = self.identity.for_mode(self.mode);
        let mut connections = match self.mode {
            DraftMode::Create => BTreeSet::new(),
            DraftMode::Update => self.connections,
        };
        if let Some(id) = identity.id {
            connections.remove(&id);
        }
        Ok(RouteNode {
            id: identity.id,
            floor_id: require("floor_id", self.floor_id)?,
            location: self.location,
            visible: self.visible,
            node_type: self.node_type,
            connections,
            created_at: identity.created_at,
            updated_at: identity.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Polygons
// ---------------------------------------------------------------------------

/// Partial update of a polygon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<PolygonKind>,
    pub visible: Option<bool>,
    pub color: Option<SerializableColor>,
    /// `Some(None)` clears the category.
    pub category_id: Option<Option<CategoryId>>,
    pub ring: Option<Vec<Point>>,
}

/// Draft of a [`Polygon`].
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonDraft {
    mode: DraftMode,
    identity: Identity,
    floor_id: Option<FloorId>,
    name: String,
    description: String,
    kind: PolygonKind,
    visible: bool,
    color: SerializableColor,
    category_id: Option<CategoryId>,
    ring: Vec<Point>,
}

impl Default for PolygonDraft {
    fn default() -> Self {
        Self {
            mode: DraftMode::Create,
            identity: Identity::default(),
            floor_id: None,
            name: String::new(),
            description: String::new(),
            kind: PolygonKind::Room,
            visible: true,
            color: SerializableColor::default(),
            category_id: None,
            ring: Vec::new(),
        }
    }
}

impl PolygonDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_update(polygon: &Polygon) -> Self {
        Self {
            mode: DraftMode::Update,
            identity: Identity {
                id: polygon.id,
                created_at: polygon.created_at,
                updated_at: polygon.updated_at,
            },
            floor_id: Some(polygon.floor_id),
            name: polygon.name.clone(),
            description: polygon.description.clone(),
            kind: polygon.kind,
            visible: polygon.visible,
            color: polygon.color,
            category_id: polygon.category_id,
            ring: polygon.ring.clone(),
        }
    }

    pub fn mode(&self) -> DraftMode {
        self.mode
    }

    /// Turn the draft into a creation draft, dropping any identity it carried.
    pub fn without_identity(mut self) -> Self {
        self.mode = DraftMode::Create;
        self.identity = Identity::default();
        self
    }

    pub fn with_floor(mut self, floor_id: FloorId) -> Self {
        self.floor_id = Some(floor_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_kind(mut self, kind: PolygonKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_color(mut self, color: SerializableColor) -> Self {
        self.color = color;
        self
    }

    pub fn with_category(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Set the ring. A trailing point equal to the first is treated as the
    /// closing point and dropped.
    pub fn with_ring(mut self, mut ring: Vec<Point>) -> Self {
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        self.ring = ring;
        self
    }

    pub fn apply(self, patch: PolygonPatch) -> Self {
        let mut draft = self;
        if let Some(name) = patch.name {
            draft = draft.with_name(name);
        }
        if let Some(description) = patch.description {
            draft = draft.with_description(description);
        }
        if let Some(kind) = patch.kind {
            draft = draft.with_kind(kind);
        }
        if let Some(visible) = patch.visible {
            draft = draft.with_visible(visible);
        }
        if let Some(color) = patch.color {
            draft = draft.with_color(color);
        }
        if let Some(category_id) = patch.category_id {
            draft = draft.with_category(category_id);
        }
        if let Some(ring) = patch.ring {
            draft = draft.with_ring(ring);
        }
        draft
    }

    pub fn validate(&self) -> DraftResult<()> {
        self.identity.check(self.mode)?;
        require("floor_id", self.floor_id)?;
        check_required_text("name", &self.name)?;
        if self.ring.len() < MIN_RING_POINTS {
            return Err(ValidationError::new(
                "ring",
                format!(
                    "needs at least {MIN_RING_POINTS} points, got {}",
                    self.ring.len()
                ),
            ));
        }
        for p in &self.ring {
            check_location("ring", *p)?;
        }
        Ok(())
    }

    pub fn build(self) -> DraftResult<Polygon> {
        self.validate()?;
        let identity = self.identity.for_mode(self.mode);
        Ok(Polygon {
            id: identity.id,
            floor_id: require("floor_id", self.floor_id)?,
            name: self.name.trim().to_string(),
            description: self.description,
            kind: self.kind,
            visible: self.visible,
            color: self.color,
            category_id: self.category_id,
            ring: self.ring,
            created_at: identity.created_at,
            updated_at: identity.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Beacons
// ---------------------------------------------------------------------------

/// Partial update of a beacon. Numeric fields are unchecked input and are
/// range-validated by the draft.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeaconPatch {
    pub name: Option<String>,
    pub beacon_type_id: Option<Option<BeaconTypeId>>,
    pub uuid: Option<String>,
    pub major_id: Option<i64>,
    pub minor_id: Option<i64>,
    pub location: Option<Point>,
    pub active: Option<bool>,
    pub visible: Option<bool>,
    pub battery_level: Option<i64>,
}

/// Draft of a [`Beacon`].
#[derive(Debug, Clone, PartialEq)]
pub struct BeaconDraft {
    mode: DraftMode,
    identity: Identity,
    floor_id: Option<FloorId>,
    beacon_type_id: Option<BeaconTypeId>,
    name: String,
    uuid: Option<String>,
    major_id: Option<i64>,
    minor_id: Option<i64>,
    location: Option<Point>,
    active: bool,
    visible: bool,
    battery_level: i64,
}

impl Default for BeaconDraft {
    fn default() -> Self {
        Self {
            mode: DraftMode::Create,
            identity: Identity::default(),
            floor_id: None,
            beacon_type_id: None,
            name: String::new(),
            uuid: None,
            major_id: None,
            minor_id: None,
            location: None,
            active: true,
            visible: true,
            battery_level: 100,
        }
    }
}

impl BeaconDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_update(beacon: &Beacon) -> Self {
        Self {
            mode: DraftMode::Update,
            identity: Identity {
                id: beacon.id,
                created_at: beacon.created_at,
                updated_at: beacon.updated_at,
            },
            floor_id: Some(beacon.floor_id),
            beacon_type_id: beacon.beacon_type_id,
            name: beacon.name.clone(),
            uuid: beacon.ibeacon.map(|b| b.uuid.to_string()),
            major_id: beacon.ibeacon.map(|b| i64::from(b.major)),
            minor_id: beacon.ibeacon.map(|b| i64::from(b.minor)),
            location: beacon.location,
            active: beacon.active,
            visible: beacon.visible,
            battery_level: i64::from(beacon.battery_level),
        }
    }

    pub fn mode(&self) -> DraftMode {
        self.mode
    }

    pub fn without_identity(mut self) -> Self {
        self.mode = DraftMode::Create;
        self.identity = Identity::default();
        self
    }

    pub fn with_floor(mut self, floor_id: FloorId) -> Self {
        self.floor_id = Some(floor_id);
        self
    }

    pub fn with_beacon_type(mut self, beacon_type_id: Option<BeaconTypeId>) -> Self {
        self.beacon_type_id = beacon_type_id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_major(mut self, major_id: i64) -> Self {
        self.major_id = Some(major_id);
        self
    }

    pub fn with_minor(mut self, minor_id: i64) -> Self {
        self.minor_id = Some(minor_id);
        self
    }

    pub fn at(mut self, location: Point) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_battery(mut self, battery_level: i64) -> Self {
        self.battery_level = battery_level;
        self
    }

    pub fn apply(self, patch: BeaconPatch) -> Self {
        let mut draft = self;
        if let Some(name) = patch.name {
            draft = draft.with_name(name);
        }
        if let Some(beacon_type_id) = patch.beacon_type_id {
            draft = draft.with_beacon_type(beacon_type_id);
        }
        if let Some(uuid) = patch.uuid {
            draft = draft.with_uuid(uuid);
        }
        if let Some(major) = patch.major_id {
            draft = draft.with_major(major);
        }
        if let Some(minor) = patch.minor_id {
            draft = draft.with_minor(minor);
        }
        if let Some(location) = patch.location {
            draft = draft.at(location);
        }
        if let Some(active) = patch.active {
            draft = draft.with_active(active);
        }
        if let Some(visible) = patch.visible {
            draft = draft.with_visible(visible);
        }
        if let Some(battery) = patch.battery_level {
            draft = draft.with_battery(battery);
        }
        draft
    }

    fn ibeacon(&self) -> DraftResult<Option<IBeacon>> {
        if self.uuid.is_none() && self.major_id.is_none() && self.minor_id.is_none() {
            return Ok(None);
        }
        let raw = self
            .uuid
            .as_deref()
            .ok_or_else(|| ValidationError::new("uuid", "required with major/minor ids"))?;
        let uuid = Uuid::parse_str(raw.trim())
            .map_err(|e| ValidationError::new("uuid", format!("'{raw}' is not a UUID: {e}")))?;
        let major = ibeacon_id("major_id", self.major_id)?;
        let minor = ibeacon_id("minor_id", self.minor_id)?;
        Ok(Some(IBeacon { uuid, major, minor }))
    }

    pub fn validate(&self) -> DraftResult<()> {
        self.identity.check(self.mode)?;
        require("floor_id", self.floor_id)?;
        check_required_text("name", &self.name)?;
        self.ibeacon()?;
        if let Some(location) = self.location {
            check_location("location", location)?;
        }
        if !(0..=100).contains(&self.battery_level) {
            return Err(ValidationError::new(
                "battery_level",
                format!("{} outside [0, 100]", self.battery_level),
            ));
        }
        Ok(())
    }

    pub fn build(self) -> DraftResult<Beacon> {
        self.validate()?;
        let ibeacon = self.ibeacon()?;
        let identity = self.identity.for_mode(self.mode);
        Ok(Beacon {
            id: identity.id,
            floor_id: require("floor_id", self.floor_id)?,
            beacon_type_id: self.beacon_type_id,
            name: self.name.trim().to_string(),
            ibeacon,
            location: self.location,
            active: self.active,
            visible: self.visible,
            battery_level: self.battery_level as u8,
            created_at: identity.created_at,
            updated_at: identity.updated_at,
        })
    }
}

fn ibeacon_id(field: &'static str, value: Option<i64>) -> DraftResult<u16> {
    let value = require(field, value)?;
    if !(0..=IBEACON_ID_MAX).contains(&value) {
        return Err(ValidationError::new(
            field,
            format!("{value} outside [0, {IBEACON_ID_MAX}]"),
        ));
    }
    Ok(value as u16)
}

// ---------------------------------------------------------------------------
// Floors and buildings
// ---------------------------------------------------------------------------

/// Draft of a [`Floor`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FloorDraft {
    mode: DraftMode,
    id: Option<FloorId>,
    name: String,
    number: i32,
    building_id: Option<BuildingId>,
}

impl FloorDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_update(floor: &Floor) -> Self {
        Self {
            mode: DraftMode::Update,
            id: floor.id,
            name: floor.name.clone(),
            number: floor.number,
            building_id: Some(floor.building_id),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_number(mut self, number: i32) -> Self {
        self.number = number;
        self
    }

    pub fn in_building(mut self, building_id: BuildingId) -> Self {
        self.building_id = Some(building_id);
        self
    }

    pub fn validate(&self) -> DraftResult<()> {
        if self.mode == DraftMode::Update {
            require("id", self.id)?;
        }
        check_required_text("name", &self.name)?;
        require("building_id", self.building_id)?;
        Ok(())
    }

    pub fn build(self) -> DraftResult<Floor> {
        self.validate()?;
        Ok(Floor {
            id: match self.mode {
                DraftMode::Create => None,
                DraftMode::Update => self.id,
            },
            name: self.name.trim().to_string(),
            number: self.number,
            building_id: require("building_id", self.building_id)?,
            nodes: None,
            polygons: None,
        })
    }
}

/// Draft of a [`Building`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildingDraft {
    name: String,
    description: String,
}

impl BuildingDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn validate(&self) -> DraftResult<()> {
        check_required_text("name", &self.name)
    }

    pub fn build(self) -> DraftResult<Building> {
        self.validate()?;
        Ok(Building {
            id: None,
            name: self.name.trim().to_string(),
            description: self.description,
        })
    }
}
