//! Area features: rooms, walls and vertical-transit footprints.

use super::{CategoryId, FloorId, PolygonId, SerializableColor};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Polygon classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PolygonKind {
    #[default]
    Room,
    Stairs,
    Elevator,
    Wall,
}

impl PolygonKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "room" => Some(PolygonKind::Room),
            "stairs" => Some(PolygonKind::Stairs),
            "elevator" => Some(PolygonKind::Elevator),
            "wall" => Some(PolygonKind::Wall),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PolygonKind::Room => "Room",
            PolygonKind::Stairs => "Stairs",
            PolygonKind::Elevator => "Elevator",
            PolygonKind::Wall => "Wall",
        }
    }
}

impl fmt::Display for PolygonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closed-ring area feature. The ring is stored open (the closing
/// point is implied) and always holds at least three points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub(crate) id: Option<PolygonId>,
    pub floor_id: FloorId,
    pub name: String,
    pub description: String,
    pub kind: PolygonKind,
    pub visible: bool,
    pub color: SerializableColor,
    pub category_id: Option<CategoryId>,
    pub(crate) ring: Vec<Point>,
    #[serde(default)]
    pub(crate) created_at: Option<i64>,
    #[serde(default)]
    pub(crate) updated_at: Option<i64>,
}

impl Polygon {
    pub fn id(&self) -> Option<PolygonId> {
        self.id
    }

    pub fn ring(&self) -> &[Point] {
        &self.ring
    }

    pub fn created_at(&self) -> Option<i64> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    /// Ring with the first point repeated at the end.
    pub fn closed_ring(&self) -> Vec<Point> {
        let mut ring = self.ring.clone();
        if let Some(first) = self.ring.first() {
            ring.push(*first);
        }
        ring
    }

    /// Area-weighted centroid, falling back to the vertex mean for degenerate rings.
    pub fn centroid(&self) -> Point {
        ring_centroid(&self.ring)
    }
}

/// Centroid of an open ring via the shoelace formula.
pub(crate) fn ring_centroid(ring: &[Point]) -> Point {
    if ring.is_empty() {
        return Point::ZERO;
    }
    let mut area2 = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (i, a) in ring.iter().enumerate() {
        let b = ring[(i + 1) % ring.len()];
        let cross = a.x * b.y - b.x * a.y;
        area2 += cross;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    if area2.abs() < f64::EPSILON {
        let n = ring.len() as f64;
        let (sx, sy) = ring.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        return Point::new(sx / n, sy / n);
    }
    Point::new(cx / (3.0 * area2), cy / (3.0 * area2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_centroid() {
        let ring = vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ];
        let c = ring_centroid(&ring);
        assert!((c.x - 1.0).abs() < 1e-9);
        assert!((c.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_centroid_uses_mean() {
        let ring = vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0), Point::new(2.0, 2.0)];
        let c = ring_centroid(&ring);
        assert!((c.x - 1.0).abs() < 1e-9);
        assert!((c.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(PolygonKind::parse("wall"), Some(PolygonKind::Wall));
        assert_eq!(PolygonKind::Elevator.to_string(), "Elevator");
    }
}
