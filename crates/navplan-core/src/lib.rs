//! navplan core library
//!
//! Platform-agnostic editing engine for indoor-navigation floor plans: entity
//! model, validated drafts, the route graph, persistence, the drawing state
//! machine and the editor session tying them together.

pub mod config;
pub mod draft;
pub mod editor;
pub mod error;
pub mod graph;
pub mod model;
pub mod service;
pub mod storage;
pub mod tools;
pub mod transport;

pub use config::{ConfigError, EditorConfig, RenderStyle};
pub use draft::{
    BeaconDraft, BeaconPatch, BuildingDraft, DraftMode, FloorDraft, NodeDraft, NodePatch,
    PolygonDraft, PolygonPatch,
};
pub use editor::{BeaconDetails, EditorEvent, EditorSession, PolygonDetails};
pub use error::{EditorError, EditorResult, ErrorKind, ValidationError};
pub use graph::EdgeKey;
pub use model::{
    Beacon, Building, EntityId, EntityKind, Floor, FloorId, FloorState, NodeId, NodeType,
    Polygon, PolygonKind, RouteNode, Selection, SerializableColor,
};
pub use service::{ConnectivityService, DeleteItem};
pub use storage::{FileStore, FloorPlanStore, MemoryStore, StorageError, StoreOp};
pub use tools::{
    ConnectorChoice, ConnectorDialog, NodeRef, Outcome, ToolAction, ToolKind, ToolManager,
};
pub use transport::{Feature, FeatureCollection, Geometry, TransportError};
