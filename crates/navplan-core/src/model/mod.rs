//! Floor-plan entities: route nodes, polygons, beacons, floors and buildings.

mod beacon;
mod floor;
mod node;
mod polygon;

pub use beacon::{Beacon, IBeacon};
pub use floor::{Building, Floor, FloorState};
pub use node::{NodeType, RouteNode};
pub use polygon::{Polygon, PolygonKind};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned entity identifier.
pub type EntityId = u64;
pub type NodeId = EntityId;
pub type PolygonId = EntityId;
pub type BeaconId = EntityId;
pub type FloorId = EntityId;
pub type BuildingId = EntityId;
pub type CategoryId = EntityId;
pub type BeaconTypeId = EntityId;

/// The kinds of entity that live on a floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Polygon,
    Beacon,
    Node,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Polygon => "polygon",
            EntityKind::Beacon => "beacon",
            EntityKind::Node => "node",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity currently selected in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selection {
    Polygon(PolygonId),
    Node(NodeId),
    Beacon(BeaconId),
}

impl Selection {
    pub fn kind(self) -> EntityKind {
        match self {
            Selection::Polygon(_) => EntityKind::Polygon,
            Selection::Node(_) => EntityKind::Node,
            Selection::Beacon(_) => EntityKind::Beacon,
        }
    }

    pub fn id(self) -> EntityId {
        match self {
            Selection::Polygon(id) | Selection::Node(id) | Selection::Beacon(id) => id,
        }
    }
}

/// An entry of a catalog kind (beacon types, POI categories).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: EntityId,
    pub name: String,
}

/// Serializable color representation (RGBA8), stored as a `#rrggbb[aa]` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.is_ascii() {
            return None;
        }
        let byte = |s: &str| u8::from_str_radix(s, 16).ok();
        match digits.len() {
            3 => {
                let mut it = digits.chars().map(|c| c.to_digit(16).map(|v| (v * 17) as u8));
                Some(Self::rgb(it.next()??, it.next()??, it.next()??))
            }
            6 => Some(Self::rgb(
                byte(&digits[0..2])?,
                byte(&digits[2..4])?,
                byte(&digits[4..6])?,
            )),
            8 => Some(Self::new(
                byte(&digits[0..2])?,
                byte(&digits[2..4])?,
                byte(&digits[4..6])?,
                byte(&digits[6..8])?,
            )),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Default for SerializableColor {
    fn default() -> Self {
        Self::rgb(0x33, 0x88, 0xff)
    }
}

impl TryFrom<String> for SerializableColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value).ok_or_else(|| format!("invalid color: {value}"))
    }
}

impl From<SerializableColor> for String {
    fn from(color: SerializableColor) -> Self {
        color.to_hex()
    }
}

impl fmt::Display for SerializableColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Current time as unix milliseconds, used for server-side timestamps.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex_roundtrip() {
        let c = SerializableColor::from_hex("#ff8800").unwrap();
        assert_eq!(c, SerializableColor::rgb(255, 136, 0));
        assert_eq!(c.to_hex(), "#ff8800");

        let translucent = SerializableColor::from_hex("00ff0080").unwrap();
        assert_eq!(translucent.a, 0x80);
        assert_eq!(translucent.to_hex(), "#00ff0080");
    }

    #[test]
    fn test_color_short_form() {
        assert_eq!(SerializableColor::from_hex("#fff"), Some(SerializableColor::white()));
        assert_eq!(SerializableColor::from_hex("#12"), None);
        assert_eq!(SerializableColor::from_hex("#gggggg"), None);
    }

    #[test]
    fn test_selection_kind() {
        assert_eq!(Selection::Node(4).kind(), EntityKind::Node);
        assert_eq!(Selection::Beacon(9).id(), 9);
    }
}
