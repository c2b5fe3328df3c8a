//! navplan Render Library
//!
//! Map canvas abstraction and the synchronizer that mirrors a floor onto it.
//! [`SceneCanvas`] is the in-memory implementation.

mod canvas;
mod registry;
mod scene;
pub mod style;
mod sync;

pub use canvas::{
    CanvasError, CanvasResult, LayerStyle, MapCanvas, MarkerStyle, ResourceKind, SourceGeometry,
};
pub use registry::{RegistrySnapshot, ResourceRegistry};
pub use scene::{SceneCanvas, SceneLayer, SceneMarker};
pub use sync::{
    RenderError, RenderResult, RenderSelection, RenderSynchronizer, TeardownReport,
    beacon_marker_id, node_marker_id, polygon_source_id,
};
