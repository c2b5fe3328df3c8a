//! GeoJSON-style transport shape for spatial entities.
//!
//! Each entity travels as a [`Feature`]: a point or polygon geometry plus a
//! properties object. The server and older clients do not agree on every
//! property name, so readers accept the alternate spellings listed next to
//! each key; writers always emit the primary spelling.

use crate::draft::{BeaconDraft, NodeDraft, PolygonDraft};
use crate::error::ValidationError;
use crate::model::{
    Beacon, EntityId, FloorId, NodeType, Polygon, PolygonKind, RouteNode, SerializableColor,
};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

// Common keys
const KEY_ID: &[&str] = &["id"];
const KEY_FLOOR: &[&str] = &["floor_id", "floor"];
const KEY_VISIBLE: &[&str] = &["visible", "is_visible"];
const KEY_CREATED_AT: &[&str] = &["created_at"];
const KEY_UPDATED_AT: &[&str] = &["updated_at"];

// Route node keys
const KEY_NODE_TYPE: &[&str] = &["node_type", "type"];
const KEY_CONNECTIONS: &[&str] = &["connections", "connected_node_ids"];

// Polygon keys
const KEY_NAME: &[&str] = &["name"];
const KEY_DESCRIPTION: &[&str] = &["description"];
const KEY_POLYGON_TYPE: &[&str] = &["type", "polygon_type"];
const KEY_COLOR: &[&str] = &["color"];
const KEY_CATEGORY: &[&str] = &["category_id", "category"];

// Beacon keys
const KEY_BEACON_TYPE: &[&str] = &["beacon_type_id", "beacon_type"];
const KEY_UUID: &[&str] = &["uuid"];
const KEY_MAJOR: &[&str] = &["major_id", "major"];
const KEY_MINOR: &[&str] = &["minor_id", "minor"];
const KEY_ACTIVE: &[&str] = &["active", "is_active"];
const KEY_BATTERY: &[&str] = &["battery_level", "battery"];

/// Errors reading an entity from its transport shape.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("missing property '{0}'")]
    MissingProperty(&'static str),
    #[error("property '{key}' has an unexpected value: {value}")]
    BadProperty { key: &'static str, value: Value },
    #[error("expected {expected} geometry")]
    WrongGeometry { expected: &'static str },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Point or polygon geometry, `[longitude, latitude]` positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

impl Geometry {
    pub fn point(p: Point) -> Self {
        Geometry::Point {
            coordinates: [p.x, p.y],
        }
    }

    /// Polygon geometry from an open ring; the ring is closed on output.
    pub fn polygon(ring: &[Point]) -> Self {
        let mut outer: Vec<[f64; 2]> = ring.iter().map(|p| [p.x, p.y]).collect();
        if let Some(first) = outer.first().copied() {
            outer.push(first);
        }
        Geometry::Polygon {
            coordinates: vec![outer],
        }
    }

    fn as_point(&self) -> Option<Point> {
        match self {
            Geometry::Point { coordinates: [x, y] } => Some(Point::new(*x, *y)),
            Geometry::Polygon { .. } => None,
        }
    }

    fn outer_ring(&self) -> Option<Vec<Point>> {
        match self {
            Geometry::Polygon { coordinates } => coordinates
                .first()
                .map(|ring| ring.iter().map(|[x, y]| Point::new(*x, *y)).collect()),
            Geometry::Point { .. } => None,
        }
    }
}

/// A geometry/properties pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// A set of features, typically all entities of one kind on one floor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn from_json(json: &str) -> TransportResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> TransportResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn nodes(&self) -> TransportResult<Vec<RouteNode>> {
        self.features.iter().map(RouteNode::try_from).collect()
    }

    pub fn polygons(&self) -> TransportResult<Vec<Polygon>> {
        self.features.iter().map(Polygon::try_from).collect()
    }

    pub fn beacons(&self) -> TransportResult<Vec<Beacon>> {
        self.features.iter().map(Beacon::try_from).collect()
    }
}

impl<'a, T> FromIterator<&'a T> for FeatureCollection
where
    Feature: From<&'a T>,
    T: 'a,
{
    fn from_iter<I: IntoIterator<Item = &'a T>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().map(Feature::from).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Property accessors
// ---------------------------------------------------------------------------

fn lookup<'a>(props: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| props.get(*k))
        .find(|v| !v.is_null())
}

fn get_id(props: &Map<String, Value>, keys: &'static [&'static str]) -> TransportResult<Option<EntityId>> {
    match lookup(props, keys) {
        None => Ok(None),
        Some(v) => as_id(v)
            .map(Some)
            .ok_or_else(|| TransportError::BadProperty {
                key: keys[0],
                value: v.clone(),
            }),
    }
}

fn as_id(value: &Value) -> Option<EntityId> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn get_floor(props: &Map<String, Value>) -> TransportResult<FloorId> {
    get_id(props, KEY_FLOOR)?.ok_or(TransportError::MissingProperty(KEY_FLOOR[0]))
}

fn get_bool(props: &Map<String, Value>, keys: &[&str], default: bool) -> bool {
    lookup(props, keys).and_then(Value::as_bool).unwrap_or(default)
}

fn get_string(props: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    lookup(props, keys).and_then(Value::as_str).map(str::to_string)
}

fn get_i64(props: &Map<String, Value>, keys: &'static [&'static str]) -> TransportResult<Option<i64>> {
    match lookup(props, keys) {
        None => Ok(None),
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .map(Some)
            .ok_or_else(|| TransportError::BadProperty {
                key: keys[0],
                value: v.clone(),
            }),
    }
}

fn get_connections(props: &Map<String, Value>) -> TransportResult<Vec<EntityId>> {
    let Some(value) = lookup(props, KEY_CONNECTIONS) else {
        return Ok(Vec::new());
    };
    let bad = || TransportError::BadProperty {
        key: KEY_CONNECTIONS[0],
        value: value.clone(),
    };
    value
        .as_array()
        .ok_or_else(bad)?
        .iter()
        .map(|v| as_id(v).ok_or_else(bad))
        .collect()
}

fn timestamps(props: &Map<String, Value>) -> TransportResult<(Option<i64>, Option<i64>)> {
    Ok((get_i64(props, KEY_CREATED_AT)?, get_i64(props, KEY_UPDATED_AT)?))
}

fn put_identity(props: &mut Map<String, Value>, id: Option<EntityId>, created: Option<i64>, updated: Option<i64>) {
    if let Some(id) = id {
        props.insert(KEY_ID[0].into(), json!(id));
    }
    if let Some(created) = created {
        props.insert(KEY_CREATED_AT[0].into(), json!(created));
    }
    if let Some(updated) = updated {
        props.insert(KEY_UPDATED_AT[0].into(), json!(updated));
    }
}

// ---------------------------------------------------------------------------
// Route nodes
// ---------------------------------------------------------------------------

impl TryFrom<&Feature> for RouteNode {
    type Error = TransportError;

    fn try_from(feature: &Feature) -> TransportResult<Self> {
        let props = &feature.properties;
        let location = match &feature.geometry {
            None => None,
            Some(g) => Some(g.as_point().ok_or(TransportError::WrongGeometry { expected: "point" })?),
        };
        let node_type = match get_string(props, KEY_NODE_TYPE) {
            None => NodeType::default(),
            Some(raw) => NodeType::parse(&raw).ok_or_else(|| TransportError::BadProperty {
                key: KEY_NODE_TYPE[0],
                value: Value::String(raw),
            })?,
        };

        let mut draft = NodeDraft::new()
            .with_floor(get_floor(props)?)
            .with_visible(get_bool(props, KEY_VISIBLE, true))
            .with_node_type(node_type);
        if let Some(location) = location {
            draft = draft.at(location);
        }
        let mut node = draft.build()?;

        let (created_at, updated_at) = timestamps(props)?;
        node.id = get_id(props, KEY_ID)?;
        node.created_at = created_at;
        node.updated_at = updated_at;
        for other in get_connections(props)? {
            node.link(other);
        }
        Ok(node)
    }
}

impl From<&RouteNode> for Feature {
    fn from(node: &RouteNode) -> Self {
        let mut properties = Map::new();
        put_identity(&mut properties, node.id, node.created_at, node.updated_at);
        properties.insert(KEY_FLOOR[0].into(), json!(node.floor_id));
        properties.insert(KEY_VISIBLE[0].into(), json!(node.visible));
        properties.insert(KEY_NODE_TYPE[0].into(), json!(node.node_type.as_str()));
        properties.insert(
            KEY_CONNECTIONS[0].into(),
            json!(node.connections.iter().collect::<Vec<_>>()),
        );
        Feature {
            geometry: node.location.map(Geometry::point),
            properties,
        }
    }
}

// ---------------------------------------------------------------------------
// Polygons
// ---------------------------------------------------------------------------

impl TryFrom<&Feature> for Polygon {
    type Error = TransportError;

    fn try_from(feature: &Feature) -> TransportResult<Self> {
        let props = &feature.properties;
        let ring = feature
            .geometry
            .as_ref()
            .and_then(Geometry::outer_ring)
            .ok_or(TransportError::WrongGeometry { expected: "polygon" })?;
        let kind = match get_string(props, KEY_POLYGON_TYPE) {
            None => PolygonKind::default(),
            Some(raw) => PolygonKind::parse(&raw).ok_or_else(|| TransportError::BadProperty {
                key: KEY_POLYGON_TYPE[0],
                value: Value::String(raw),
            })?,
        };
        let color = match get_string(props, KEY_COLOR) {
            None => SerializableColor::default(),
            Some(raw) => SerializableColor::from_hex(&raw).ok_or_else(|| TransportError::BadProperty {
                key: KEY_COLOR[0],
                value: Value::String(raw),
            })?,
        };

        let mut polygon = PolygonDraft::new()
            .with_floor(get_floor(props)?)
            .with_name(get_string(props, KEY_NAME).ok_or(TransportError::MissingProperty(KEY_NAME[0]))?)
            .with_description(get_string(props, KEY_DESCRIPTION).unwrap_or_default())
            .with_kind(kind)
            .with_visible(get_bool(props, KEY_VISIBLE, true))
            .with_color(color)
            .with_category(get_id(props, KEY_CATEGORY)?)
            .with_ring(ring)
            .build()?;

        let (created_at, updated_at) = timestamps(props)?;
        polygon.id = get_id(props, KEY_ID)?;
        polygon.created_at = created_at;
        polygon.updated_at = updated_at;
        Ok(polygon)
    }
}

impl From<&Polygon> for Feature {
    fn from(polygon: &Polygon) -> Self {
        let mut properties = Map::new();
        put_identity(&mut properties, polygon.id, polygon.created_at, polygon.updated_at);
        properties.insert(KEY_FLOOR[0].into(), json!(polygon.floor_id));
        properties.insert(KEY_NAME[0].into(), json!(polygon.name));
        properties.insert(KEY_DESCRIPTION[0].into(), json!(polygon.description));
        properties.insert(KEY_POLYGON_TYPE[0].into(), json!(polygon.kind.as_str()));
        properties.insert(KEY_VISIBLE[0].into(), json!(polygon.visible));
        properties.insert(KEY_COLOR[0].into(), json!(polygon.color.to_hex()));
        if let Some(category) = polygon.category_id {
            properties.insert(KEY_CATEGORY[0].into(), json!(category));
        }
        Feature {
            geometry: Some(Geometry::polygon(&polygon.ring)),
            properties,
        }
    }
}

// ---------------------------------------------------------------------------
// Beacons
// ---------------------------------------------------------------------------

impl TryFrom<&Feature> for Beacon {
    type Error = TransportError;

    fn try_from(feature: &Feature) -> TransportResult<Self> {
        let props = &feature.properties;
        let mut draft = BeaconDraft::new()
            .with_floor(get_floor(props)?)
            .with_beacon_type(get_id(props, KEY_BEACON_TYPE)?)
            .with_name(get_string(props, KEY_NAME).ok_or(TransportError::MissingProperty(KEY_NAME[0]))?)
            .with_active(get_bool(props, KEY_ACTIVE, true))
            .with_visible(get_bool(props, KEY_VISIBLE, true));
        if let Some(uuid) = get_string(props, KEY_UUID) {
            draft = draft.with_uuid(uuid);
        }
        if let Some(major) = get_i64(props, KEY_MAJOR)? {
            draft = draft.with_major(major);
        }
        if let Some(minor) = get_i64(props, KEY_MINOR)? {
            draft = draft.with_minor(minor);
        }
        if let Some(battery) = get_i64(props, KEY_BATTERY)? {
            draft = draft.with_battery(battery);
        }
        match &feature.geometry {
            None => {}
            Some(g) => {
                draft = draft.at(g.as_point().ok_or(TransportError::WrongGeometry { expected: "point" })?);
            }
        }
        let mut beacon = draft.build()?;

        let (created_at, updated_at) = timestamps(props)?;
        beacon.id = get_id(props, KEY_ID)?;
        beacon.created_at = created_at;
        beacon.updated_at = updated_at;
        Ok(beacon)
    }
}

impl From<&Beacon> for Feature {
    fn from(beacon: &Beacon) -> Self {
        let mut properties = Map::new();
        put_identity(&mut properties, beacon.id, beacon.created_at, beacon.updated_at);
        properties.insert(KEY_FLOOR[0].into(), json!(beacon.floor_id));
        properties.insert(KEY_NAME[0].into(), json!(beacon.name));
        if let Some(beacon_type) = beacon.beacon_type_id {
            properties.insert(KEY_BEACON_TYPE[0].into(), json!(beacon_type));
        }
        if let Some(ib) = beacon.ibeacon {
            properties.insert(KEY_UUID[0].into(), json!(ib.uuid.to_string()));
            properties.insert(KEY_MAJOR[0].into(), json!(ib.major));
            properties.insert(KEY_MINOR[0].into(), json!(ib.minor));
        }
        properties.insert(KEY_ACTIVE[0].into(), json!(beacon.active));
        properties.insert(KEY_VISIBLE[0].into(), json!(beacon.visible));
        properties.insert(KEY_BATTERY[0].into(), json!(beacon.battery_level));
        Feature {
            geometry: beacon.location.map(Geometry::point),
            properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(json: &str) -> Feature {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_node_reads_either_connection_spelling() {
        let primary = feature(
            r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[13.4,52.5]},
                "properties":{"id":3,"floor_id":1,"node_type":"elevator","connections":[7,9]}}"#,
        );
        let alternate = feature(
            r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[13.4,52.5]},
                "properties":{"id":"3","floor":"1","type":"Elevator","connected_node_ids":["7",9]}}"#,
        );
        let a = RouteNode::try_from(&primary).unwrap();
        let b = RouteNode::try_from(&alternate).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.node_type, NodeType::Elevator);
        assert_eq!(a.connections().iter().copied().collect::<Vec<_>>(), vec![7, 9]);
    }

    #[test]
    fn test_node_connections_drop_self_and_duplicates() {
        let f = feature(
            r#"{"type":"Feature","geometry":null,
                "properties":{"id":3,"floor_id":1,"connections":[3,4,4]}}"#,
        );
        let node = RouteNode::try_from(&f).unwrap();
        assert_eq!(node.location, None);
        assert_eq!(node.connections().len(), 1);
        assert!(node.is_connected_to(4));
    }

    #[test]
    fn test_node_written_with_primary_spelling() {
        let f = feature(
            r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[1.0,2.0]},
                "properties":{"id":5,"floor_id":2,"connected_node_ids":[6]}}"#,
        );
        let node = RouteNode::try_from(&f).unwrap();
        let out = Feature::from(&node);
        assert_eq!(out.properties["connections"], json!([6]));
        assert!(!out.properties.contains_key("connected_node_ids"));
        assert_eq!(out.properties["node_type"], json!("waypoint"));
    }

    #[test]
    fn test_polygon_ring_closing_point_dropped() {
        let f = feature(
            r##"{"type":"Feature","geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]},
                "properties":{"id":1,"floor_id":1,"name":"Hall","type":"Room","color":"#ff0000"}}"##,
        );
        let polygon = Polygon::try_from(&f).unwrap();
        assert_eq!(polygon.ring().len(), 3);
        assert_eq!(polygon.color, SerializableColor::rgb(255, 0, 0));

        let out = Feature::from(&polygon);
        match out.geometry {
            Some(Geometry::Polygon { coordinates }) => assert_eq!(coordinates[0].len(), 4),
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn test_polygon_with_two_points_rejected() {
        let f = feature(
            r#"{"type":"Feature","geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[0,0]]]},
                "properties":{"floor_id":1,"name":"Sliver"}}"#,
        );
        match Polygon::try_from(&f) {
            Err(TransportError::Invalid(e)) => assert_eq!(e.field, "ring"),
            other => panic!("expected ring validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_beacon_out_of_range_major_rejected() {
        let f = feature(
            r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},
                "properties":{"floor_id":1,"name":"B1","uuid":"f7826da6-4fa2-4e98-8024-bc5b71e0893e",
                              "major":70000,"minor":1}}"#,
        );
        match Beacon::try_from(&f) {
            Err(TransportError::Invalid(e)) => assert_eq!(e.field, "major_id"),
            other => panic!("expected major_id error, got {other:?}"),
        }
    }

    #[test]
    fn test_feature_collection_json() {
        let json = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":{"id":1,"floor_id":1,"connections":[2]}},
            {"type":"Feature","geometry":{"type":"Point","coordinates":[1,3]},"properties":{"id":2,"floor_id":1,"connections":[1]}}
        ]}"#;
        let collection = FeatureCollection::from_json(json).unwrap();
        let nodes = collection.nodes().unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(crate::graph::asymmetric_pairs(&nodes).is_empty());

        let back: FeatureCollection = nodes.iter().collect();
        assert_eq!(back.features.len(), 2);
    }
}
