//! In-memory map surface.
//!
//! Keeps sources, layers and subscriptions the way a web map would, enforces
//! the same id rules, and computes the camera a `fit_bounds` call produces
//! in Web Mercator. Used for headless rendering and in tests.

use std::collections::BTreeSet;
use std::f64::consts::PI;

use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde::Serialize;
use serde_json::json;

use super::lifecycle::MapFactory;
use super::{
    ControlPosition, Cursor, FitBoundsOptions, LayerSpec, MapControl, MapError, MapOptions,
    MapSurface, PointerKind, Popup,
};
use crate::geometry::{Bounds, LngLat};

/// Mapbox GL renders 512px tiles.
pub const TILE_SIZE: f64 = 512.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

pub const DEFAULT_VIEWPORT: Viewport = Viewport {
    width: 1024.0,
    height: 768.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Camera {
    pub center: LngLat,
    pub zoom: f64,
}

/// Ids of everything a layer sync can touch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayerState {
    pub sources: Vec<String>,
    pub layers: Vec<String>,
    pub handlers: Vec<(PointerKind, String)>,
}

#[derive(Debug)]
pub struct InMemoryMap {
    options: MapOptions,
    viewport: Viewport,
    camera: Camera,
    sources: Vec<(String, GeoJson)>,
    layers: Vec<LayerSpec>,
    handlers: BTreeSet<(PointerKind, String)>,
    controls: Vec<(MapControl, ControlPosition)>,
    cursor: Cursor,
    popup: Option<Popup>,
    fit_count: usize,
    resize_count: usize,
    removed: bool,
}

impl InMemoryMap {
    pub fn new(options: MapOptions) -> Self {
        Self::with_viewport(options, DEFAULT_VIEWPORT)
    }

    pub fn with_viewport(options: MapOptions, viewport: Viewport) -> Self {
        let camera = Camera {
            center: options.center,
            zoom: options.zoom,
        };
        Self {
            options,
            viewport,
            camera,
            sources: Vec::new(),
            layers: Vec::new(),
            handlers: BTreeSet::new(),
            controls: Vec::new(),
            cursor: Cursor::Default,
            popup: None,
            fit_count: 0,
            resize_count: 0,
            removed: false,
        }
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// The open popup. Opening another one replaces it.
    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub fn controls(&self) -> &[(MapControl, ControlPosition)] {
        &self.controls
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn source(&self, id: &str) -> Option<&GeoJson> {
        self.sources
            .iter()
            .find(|(source_id, _)| source_id == id)
            .map(|(_, data)| data)
    }

    pub fn fit_count(&self) -> usize {
        self.fit_count
    }

    pub fn resize_count(&self) -> usize {
        self.resize_count
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn layer_state(&self) -> LayerState {
        LayerState {
            sources: self.sources.iter().map(|(id, _)| id.clone()).collect(),
            layers: self.layers.iter().map(|layer| layer.id.clone()).collect(),
            handlers: self.handlers.iter().cloned().collect(),
        }
    }

    /// Rendered scene as a GeoJSON `FeatureCollection`.
    ///
    /// Each feature is tagged with the source it came from; the camera and the
    /// layer stack ride along as foreign members.
    pub fn to_geojson(&self) -> FeatureCollection {
        let mut features = Vec::new();
        for (source_id, data) in &self.sources {
            for feature in source_features(data) {
                let mut feature = feature.clone();
                feature
                    .properties
                    .get_or_insert_with(JsonObject::new)
                    .insert("source".to_string(), json!(source_id));
                features.push(feature);
            }
        }

        let mut scene = JsonObject::new();
        scene.insert("camera".to_string(), json!(self.camera));
        scene.insert("style".to_string(), json!(self.options.style));
        scene.insert("layers".to_string(), json!(self.layers));

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(scene),
        }
    }

    fn ensure_live(&self) -> Result<(), MapError> {
        if self.removed {
            return Err(MapError::Disposed);
        }
        Ok(())
    }
}

fn source_features(data: &GeoJson) -> Vec<&Feature> {
    match data {
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::FeatureCollection(collection) => collection.features.iter().collect(),
        GeoJson::Geometry(_) => Vec::new(),
    }
}

impl MapSurface for InMemoryMap {
    fn add_source(&mut self, id: &str, data: GeoJson) -> Result<(), MapError> {
        self.ensure_live()?;
        if self.has_source(id) {
            return Err(MapError::DuplicateSource(id.to_string()));
        }
        self.sources.push((id.to_string(), data));
        Ok(())
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.iter().any(|(source_id, _)| source_id == id)
    }

    fn remove_source(&mut self, id: &str) -> Result<(), MapError> {
        self.ensure_live()?;
        if let Some(layer) = self.layers.iter().find(|layer| layer.source == id) {
            return Err(MapError::SourceInUse {
                source_id: id.to_string(),
                layer_id: layer.id.clone(),
            });
        }
        let before = self.sources.len();
        self.sources.retain(|(source_id, _)| source_id != id);
        if self.sources.len() == before {
            return Err(MapError::UnknownSource(id.to_string()));
        }
        Ok(())
    }

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), MapError> {
        self.ensure_live()?;
        if self.has_layer(&layer.id) {
            return Err(MapError::DuplicateLayer(layer.id));
        }
        if !self.has_source(&layer.source) {
            return Err(MapError::UnknownSource(layer.source));
        }
        self.layers.push(layer);
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|layer| layer.id == id)
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), MapError> {
        self.ensure_live()?;
        let before = self.layers.len();
        self.layers.retain(|layer| layer.id != id);
        if self.layers.len() == before {
            return Err(MapError::UnknownLayer(id.to_string()));
        }
        Ok(())
    }

    fn on(&mut self, kind: PointerKind, layer_id: &str) {
        self.handlers.insert((kind, layer_id.to_string()));
    }

    fn off(&mut self, kind: PointerKind, layer_id: &str) {
        self.handlers.remove(&(kind, layer_id.to_string()));
    }

    fn fit_bounds(&mut self, bounds: Bounds, options: FitBoundsOptions) {
        self.camera = fit_camera(bounds, self.viewport, options);
        self.fit_count += 1;
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    fn open_popup(&mut self, popup: Popup) {
        self.popup = Some(popup);
    }

    fn add_control(&mut self, control: MapControl, position: ControlPosition) {
        self.controls.push((control, position));
    }

    fn resize(&mut self) {
        self.resize_count += 1;
    }

    fn remove(&mut self) {
        self.sources.clear();
        self.layers.clear();
        self.handlers.clear();
        self.popup = None;
        self.removed = true;
    }
}

/// Builds [`InMemoryMap`]s; can be told to fail construction.
#[derive(Debug)]
pub struct InMemoryMapFactory {
    viewport: Viewport,
    failure: Option<String>,
    created: usize,
}

impl Default for InMemoryMapFactory {
    fn default() -> Self {
        Self::new(DEFAULT_VIEWPORT)
    }
}

impl InMemoryMapFactory {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            failure: None,
            created: 0,
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Number of surfaces constructed so far.
    pub fn created(&self) -> usize {
        self.created
    }
}

impl MapFactory for InMemoryMapFactory {
    type Surface = InMemoryMap;

    fn create(&mut self, options: &MapOptions) -> Result<InMemoryMap, MapError> {
        if let Some(reason) = &self.failure {
            return Err(MapError::Construction(reason.clone()));
        }
        self.created += 1;
        Ok(InMemoryMap::with_viewport(options.clone(), self.viewport))
    }
}

// === Web Mercator ===

fn mercator_x(lng: f64) -> f64 {
    (lng + 180.0) / 360.0
}

fn mercator_y(lat: f64) -> f64 {
    let sin = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians().sin();
    0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * PI)
}

fn lng_from_mercator_x(x: f64) -> f64 {
    x * 360.0 - 180.0
}

fn lat_from_mercator_y(y: f64) -> f64 {
    (2.0 * (PI * (1.0 - 2.0 * y)).exp().atan() - PI / 2.0).to_degrees()
}

/// Camera that shows `bounds` inside the padded viewport, capped at `max_zoom`.
pub fn fit_camera(bounds: Bounds, viewport: Viewport, options: FitBoundsOptions) -> Camera {
    let x0 = mercator_x(bounds.south_west.lng);
    let x1 = mercator_x(bounds.north_east.lng);
    let y0 = mercator_y(bounds.north_east.lat);
    let y1 = mercator_y(bounds.south_west.lat);

    let available_width = (viewport.width - 2.0 * options.padding).max(1.0);
    let available_height = (viewport.height - 2.0 * options.padding).max(1.0);

    let zoom_for = |available: f64, span: f64| {
        if span > 0.0 {
            (available / (TILE_SIZE * span)).log2()
        } else {
            f64::INFINITY
        }
    };
    let zoom = zoom_for(available_width, (x1 - x0).abs())
        .min(zoom_for(available_height, (y1 - y0).abs()))
        .min(options.max_zoom);

    Camera {
        center: LngLat::new(
            lng_from_mercator_x((x0 + x1) / 2.0),
            lat_from_mercator_y((y0 + y1) / 2.0),
        ),
        zoom,
    }
}
