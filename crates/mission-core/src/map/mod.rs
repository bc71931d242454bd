//! Map rendering: the surface abstraction, layer synchronization and the
//! map lifecycle.
//!
//! `MapSurface` mirrors the handful of calls the dashboard makes on a live
//! web map (sources, layers, layer-scoped handlers, camera, cursor, popups).
//! `MapView` owns one surface for the lifetime of a mount and keeps the
//! mission layer state nested inside it.

pub mod layers;
pub mod lifecycle;
pub mod memory;

use geojson::GeoJson;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Bounds, LngLat};

pub use layers::LayerSynchronizer;
pub use lifecycle::{MapFailure, MapFactory, MapSettings, MapState, MapView};
pub use memory::{InMemoryMap, InMemoryMapFactory, LayerState};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    #[error("source '{0}' already exists")]
    DuplicateSource(String),

    #[error("layer '{0}' already exists")]
    DuplicateLayer(String),

    #[error("source '{0}' does not exist")]
    UnknownSource(String),

    #[error("layer '{0}' does not exist")]
    UnknownLayer(String),

    #[error("source '{source_id}' is still used by layer '{layer_id}'")]
    SourceInUse { source_id: String, layer_id: String },

    #[error("map surface construction failed: {0}")]
    Construction(String),

    #[error("map surface has been disposed")]
    Disposed,
}

/// Pointer interactions the dashboard subscribes to on a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Click,
    MouseEnter,
    MouseLeave,
}

/// A pointer interaction delivered by the surface for a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub layer_id: String,
    /// Cursor position on the map.
    pub lng_lat: LngLat,
    /// Properties of the top-most feature under the cursor, if any.
    pub properties: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
}

/// Info window anchored at a map position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Popup {
    pub lng_lat: LngLat,
    pub html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitBoundsOptions {
    /// Pixels kept free on every side.
    pub padding: f64,
    pub max_zoom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapControl {
    Navigation,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Construction parameters for a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapOptions {
    pub access_token: String,
    pub style: String,
    pub center: LngLat,
    pub zoom: f64,
    pub attribution: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub style: LayerStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerStyle {
    Line(LineStyle),
    Circle(CircleStyle),
    Symbol(SymbolStyle),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub color: String,
    pub width: f64,
    pub opacity: f64,
    /// Round joins and caps.
    pub rounded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleStyle {
    pub radius: f64,
    pub color: String,
    pub stroke_color: String,
    pub stroke_width: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolStyle {
    /// Feature property rendered as the label text.
    pub text_property: String,
    pub fonts: Vec<String>,
    pub size: f64,
    pub offset: [f64; 2],
    pub anchor: String,
    pub color: String,
    pub halo_color: String,
    pub halo_width: f64,
}

/// Rendering operations on a live map handle.
pub trait MapSurface {
    fn add_source(&mut self, id: &str, data: GeoJson) -> Result<(), MapError>;
    fn has_source(&self, id: &str) -> bool;
    fn remove_source(&mut self, id: &str) -> Result<(), MapError>;

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), MapError>;
    fn has_layer(&self, id: &str) -> bool;
    fn remove_layer(&mut self, id: &str) -> Result<(), MapError>;

    /// Subscribe to a pointer interaction on a layer.
    fn on(&mut self, kind: PointerKind, layer_id: &str);
    /// Drop a subscription made with [`MapSurface::on`].
    fn off(&mut self, kind: PointerKind, layer_id: &str);

    fn fit_bounds(&mut self, bounds: Bounds, options: FitBoundsOptions);
    fn set_cursor(&mut self, cursor: Cursor);
    fn open_popup(&mut self, popup: Popup);
    fn add_control(&mut self, control: MapControl, position: ControlPosition);

    /// Re-measure the container after a window resize.
    fn resize(&mut self);
    /// Dispose the handle and everything attached to it.
    fn remove(&mut self);
}
