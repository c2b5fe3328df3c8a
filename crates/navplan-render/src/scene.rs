//! In-memory canvas.

use crate::canvas::{
    CanvasError, CanvasResult, LayerStyle, MapCanvas, MarkerStyle, ResourceKind, SourceGeometry,
};
use kurbo::Point;
use std::collections::BTreeMap;

/// A layer as held by [`SceneCanvas`].
#[derive(Debug, Clone)]
pub struct SceneLayer {
    pub id: String,
    pub source: String,
    pub style: LayerStyle,
}

/// A marker as held by [`SceneCanvas`].
#[derive(Debug, Clone)]
pub struct SceneMarker {
    pub location: Point,
    pub style: MarkerStyle,
}

/// Canvas that records resources in memory.
///
/// Used headless and in tests. Layers keep their z-order.
#[derive(Debug, Default)]
pub struct SceneCanvas {
    sources: BTreeMap<String, SourceGeometry>,
    layers: Vec<SceneLayer>,
    markers: BTreeMap<String, SceneMarker>,
}

impl SceneCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self, id: &str) -> Option<&SourceGeometry> {
        self.sources.get(id)
    }

    pub fn layer(&self, id: &str) -> Option<&SceneLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn marker(&self, id: &str) -> Option<&SceneMarker> {
        self.markers.get(id)
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    /// Layer identifiers, bottom to top.
    pub fn layer_ids(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.id.clone()).collect()
    }

    pub fn marker_ids(&self) -> Vec<String> {
        self.markers.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.layers.is_empty() && self.markers.is_empty()
    }

    /// Drop a marker behind the synchronizer's back, as a map widget does
    /// when the user closes a popup marker.
    pub fn forget_marker(&mut self, id: &str) -> bool {
        self.markers.remove(id).is_some()
    }
}

impl MapCanvas for SceneCanvas {
    fn add_source(&mut self, id: &str, geometry: SourceGeometry) -> CanvasResult<()> {
        if self.sources.contains_key(id) {
            return Err(CanvasError::exists(ResourceKind::Source, id));
        }
        self.sources.insert(id.to_string(), geometry);
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> CanvasResult<()> {
        if !self.sources.contains_key(id) {
            return Err(CanvasError::missing(ResourceKind::Source, id));
        }
        if let Some(layer) = self.layers.iter().find(|l| l.source == id) {
            return Err(CanvasError::Backend(format!(
                "source '{}' is still used by layer '{}'",
                id, layer.id
            )));
        }
        self.sources.remove(id);
        Ok(())
    }

    fn add_layer(&mut self, id: &str, source: &str, style: LayerStyle) -> CanvasResult<()> {
        if self.layer(id).is_some() {
            return Err(CanvasError::exists(ResourceKind::Layer, id));
        }
        if !self.sources.contains_key(source) {
            return Err(CanvasError::missing(ResourceKind::Source, source));
        }
        self.layers.push(SceneLayer {
            id: id.to_string(),
            source: source.to_string(),
            style,
        });
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> CanvasResult<()> {
        let index = self
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| CanvasError::missing(ResourceKind::Layer, id))?;
        self.layers.remove(index);
        Ok(())
    }

    fn add_marker(&mut self, id: &str, location: Point, style: MarkerStyle) -> CanvasResult<()> {
        if self.markers.contains_key(id) {
            return Err(CanvasError::exists(ResourceKind::Marker, id));
        }
        self.markers
            .insert(id.to_string(), SceneMarker { location, style });
        Ok(())
    }

    fn remove_marker(&mut self, id: &str) -> CanvasResult<()> {
        self.markers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CanvasError::missing(ResourceKind::Marker, id))
    }

    fn contains(&self, kind: ResourceKind, id: &str) -> bool {
        match kind {
            ResourceKind::Source => self.sources.contains_key(id),
            ResourceKind::Layer => self.layer(id).is_some(),
            ResourceKind::Marker => self.markers.contains_key(id),
        }
    }
}
