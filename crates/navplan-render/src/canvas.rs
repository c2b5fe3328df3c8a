//! Map canvas abstraction.

use kurbo::Point;
use peniko::Color;
use std::fmt;
use thiserror::Error;

/// The three kinds of visual resource a map canvas holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Source,
    Layer,
    Marker,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Source => "source",
            ResourceKind::Layer => "layer",
            ResourceKind::Marker => "marker",
        })
    }
}

/// Canvas errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanvasError {
    #[error("{kind} '{id}' already exists")]
    ResourceExists { kind: ResourceKind, id: String },
    #[error("{kind} '{id}' does not exist")]
    ResourceMissing { kind: ResourceKind, id: String },
    #[error("Canvas backend error: {0}")]
    Backend(String),
}

impl CanvasError {
    pub fn exists(kind: ResourceKind, id: &str) -> Self {
        CanvasError::ResourceExists {
            kind,
            id: id.to_string(),
        }
    }

    pub fn missing(kind: ResourceKind, id: &str) -> Self {
        CanvasError::ResourceMissing {
            kind,
            id: id.to_string(),
        }
    }
}

/// Result type for canvas operations.
pub type CanvasResult<T> = Result<T, CanvasError>;

/// Geometry held by a source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceGeometry {
    /// Closed ring: first and last points are equal.
    Polygon(Vec<Point>),
    Line(Point, Point),
}

/// How a layer paints its source.
#[derive(Debug, Clone, Copy)]
pub enum LayerStyle {
    Fill { color: Color, opacity: f32 },
    Line { color: Color, width: f64 },
}

/// Appearance of a point marker.
#[derive(Debug, Clone)]
pub struct MarkerStyle {
    pub color: Color,
    pub scale: f64,
    /// Text drawn on or next to the marker.
    pub label: Option<String>,
}

/// Trait for map canvas backends.
///
/// Resources are keyed by string identifiers that are unique per kind.
/// Adding an existing identifier and removing an unknown one are errors.
pub trait MapCanvas {
    fn add_source(&mut self, id: &str, geometry: SourceGeometry) -> CanvasResult<()>;
    /// Fails while a layer still paints the source.
    fn remove_source(&mut self, id: &str) -> CanvasResult<()>;

    /// Add a layer painting `source`, on top of existing layers.
    fn add_layer(&mut self, id: &str, source: &str, style: LayerStyle) -> CanvasResult<()>;
    fn remove_layer(&mut self, id: &str) -> CanvasResult<()>;

    fn add_marker(&mut self, id: &str, location: Point, style: MarkerStyle) -> CanvasResult<()>;
    fn remove_marker(&mut self, id: &str) -> CanvasResult<()>;

    fn contains(&self, kind: ResourceKind, id: &str) -> bool;
}
