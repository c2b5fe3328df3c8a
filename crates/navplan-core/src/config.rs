//! Editor configuration.
//!
//! Loaded from `<config dir>/navplan/config.json` when present. Every field
//! has a default, so partial files are fine.

use crate::model::SerializableColor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Behaviour of the editing engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// A polygon click within this distance of the first point closes the ring
    /// (projected units).
    pub close_threshold: f64,
    /// Floors a connector must span, including the current one.
    pub min_connector_floors: usize,
    /// Color of newly drawn polygons.
    pub polygon_color: SerializableColor,
    /// Color of newly drawn walls.
    pub wall_color: SerializableColor,
    /// Visibility of newly placed route nodes.
    pub nodes_visible: bool,
    pub render: RenderStyle,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            close_threshold: 1e-4,
            min_connector_floors: 2,
            polygon_color: SerializableColor::rgb(0x33, 0x88, 0xff),
            wall_color: SerializableColor::rgb(0x44, 0x44, 0x44),
            nodes_visible: true,
            render: RenderStyle::default(),
        }
    }
}

/// Styling used when mirroring a floor onto the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    pub fill_opacity: f32,
    pub selected_fill_opacity: f32,
    pub outline_width: f64,
    pub selected_outline_width: f64,
    pub selected_outline_color: SerializableColor,
    pub edge_color: SerializableColor,
    pub edge_width: f64,
    pub waypoint_color: SerializableColor,
    pub elevator_color: SerializableColor,
    pub stairs_color: SerializableColor,
    pub beacon_color: SerializableColor,
    pub inactive_beacon_color: SerializableColor,
    pub selected_color: SerializableColor,
    pub marker_scale: f64,
    pub selected_marker_scale: f64,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            fill_opacity: 0.3,
            selected_fill_opacity: 0.6,
            outline_width: 1.0,
            selected_outline_width: 3.0,
            selected_outline_color: SerializableColor::rgb(0xff, 0xa5, 0x00),
            edge_color: SerializableColor::rgb(0x1e, 0x90, 0xff),
            edge_width: 2.0,
            waypoint_color: SerializableColor::rgb(0x1e, 0x90, 0xff),
            elevator_color: SerializableColor::rgb(0x8e, 0x44, 0xad),
            stairs_color: SerializableColor::rgb(0x27, 0xae, 0x60),
            beacon_color: SerializableColor::rgb(0xe7, 0x4c, 0x3c),
            inactive_beacon_color: SerializableColor::rgb(0x95, 0xa5, 0xa6),
            selected_color: SerializableColor::rgb(0xff, 0xa5, 0x00),
            marker_scale: 1.0,
            selected_marker_scale: 1.4,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    /// Load from the default location.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// `<config dir>/navplan/config.json`, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("navplan").join("config.json"))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.close_threshold.is_finite() || self.close_threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "close_threshold must be positive, got {}",
                self.close_threshold
            )));
        }
        if self.min_connector_floors < 2 {
            return Err(ConfigError::Invalid(
                "min_connector_floors must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}
