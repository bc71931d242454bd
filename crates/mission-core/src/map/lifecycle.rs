//! Map lifecycle: one surface per mount, with load and error tracking.

use tracing::{debug, error, info, warn};

use super::layers::LayerSynchronizer;
use super::{ControlPosition, MapControl, MapError, MapOptions, MapSurface, PointerEvent};
use crate::geometry::{derive_geometry, FlightGeometry, LngLat};
use crate::models::Waypoint;

/// Environment variable the map access token is read from.
pub const ACCESS_TOKEN_ENV: &str = "MAPBOX_TOKEN";

pub const DEFAULT_STYLE: &str = "mapbox://styles/mapbox/satellite-streets-v12";
/// Auckland.
pub const DEFAULT_CENTER: LngLat = LngLat {
    lng: 174.7633,
    lat: -36.8485,
};
pub const DEFAULT_ZOOM: f64 = 10.0;

pub const REMEDIATION: &str = "To use the map: 1) Sign up at mapbox.com, 2) Get your access token, \
3) Set MAPBOX_TOKEN environment variable, 4) Restart the application.";

/// Builds surfaces for a map container.
pub trait MapFactory {
    type Surface: MapSurface;

    fn create(&mut self, options: &MapOptions) -> Result<Self::Surface, MapError>;
}

/// Everything about the map except the credential.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSettings {
    pub style: String,
    pub center: LngLat,
    pub zoom: f64,
    pub attribution: bool,
    pub controls: Vec<(MapControl, ControlPosition)>,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            style: DEFAULT_STYLE.to_string(),
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            attribution: true,
            controls: vec![
                (MapControl::Navigation, ControlPosition::TopRight),
                (MapControl::Scale, ControlPosition::BottomLeft),
            ],
        }
    }
}

/// Why a mount ended in [`MapState::Failed`].
#[derive(Debug, Clone, PartialEq)]
pub enum MapFailure {
    MissingCredential,
    Construction(String),
    Runtime(String),
}

impl MapFailure {
    pub fn message(&self) -> &'static str {
        match self {
            MapFailure::MissingCredential => {
                "Mapbox access token is required. Please set MAPBOX_TOKEN environment variable."
            }
            MapFailure::Construction(_) => {
                "Failed to initialize map. Please check your Mapbox configuration."
            }
            MapFailure::Runtime(_) => {
                "Failed to load map. Please check your internet connection and Mapbox token."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapState {
    Uninitialized,
    Initializing,
    Ready,
    Failed(MapFailure),
}

/// Owns the live map handle and the mission layers drawn on it.
pub struct MapView<F: MapFactory> {
    factory: F,
    settings: MapSettings,
    state: MapState,
    surface: Option<F::Surface>,
    layers: LayerSynchronizer,
    resize_listener: bool,
}

impl<F: MapFactory> MapView<F> {
    pub fn new(factory: F, settings: MapSettings) -> Self {
        Self {
            factory,
            settings,
            state: MapState::Uninitialized,
            surface: None,
            layers: LayerSynchronizer::new(),
            resize_listener: false,
        }
    }

    pub fn state(&self) -> &MapState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == MapState::Ready
    }

    pub fn surface(&self) -> Option<&F::Surface> {
        self.surface.as_ref()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn layers(&self) -> &LayerSynchronizer {
        &self.layers
    }

    pub fn is_listening_for_resize(&self) -> bool {
        self.resize_listener
    }

    /// Message shown in place of the map, if the mount failed.
    pub fn error_message(&self) -> Option<String> {
        match &self.state {
            MapState::Failed(failure) => Some(format!("{} {}", failure.message(), REMEDIATION)),
            _ => None,
        }
    }

    /// Start initializing the map for a freshly mounted container.
    ///
    /// Only the first call per mount does anything.
    pub fn mount(&mut self, access_token: Option<&str>) {
        if self.state != MapState::Uninitialized {
            debug!("Map already initialized; ignoring mount");
            return;
        }
        self.resize_listener = true;
        self.state = MapState::Initializing;

        let Some(token) = access_token.map(str::trim).filter(|t| !t.is_empty()) else {
            warn!("Map access token missing; map will not be created");
            self.state = MapState::Failed(MapFailure::MissingCredential);
            return;
        };

        let options = MapOptions {
            access_token: token.to_string(),
            style: self.settings.style.clone(),
            center: self.settings.center,
            zoom: self.settings.zoom,
            attribution: self.settings.attribution,
        };

        match self.factory.create(&options) {
            Ok(mut surface) => {
                for (control, position) in &self.settings.controls {
                    surface.add_control(*control, *position);
                }
                self.surface = Some(surface);
                info!("Map surface created with style {}", options.style);
            }
            Err(err) => {
                error!("Error initializing map: {}", err);
                self.state = MapState::Failed(MapFailure::Construction(err.to_string()));
            }
        }
    }

    /// The surface finished loading its style.
    pub fn handle_load(&mut self) {
        if self.state == MapState::Initializing && self.surface.is_some() {
            info!("Map loaded");
            self.state = MapState::Ready;
        }
    }

    /// The surface reported a runtime error.
    pub fn handle_error(&mut self, message: &str) {
        if self.surface.is_none() {
            return;
        }
        error!("Map error: {}", message);
        self.state = MapState::Failed(MapFailure::Runtime(message.to_string()));
    }

    pub fn handle_window_resize(&mut self) {
        if !self.resize_listener {
            return;
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.resize();
        }
    }

    /// Draw a mission's waypoints, replacing whatever was drawn before.
    ///
    /// Dropped without queueing unless the map is ready.
    pub fn show_waypoints(&mut self, waypoints: &[Waypoint]) {
        if !self.is_ready() {
            debug!(
                "Map not ready; dropping update of {} waypoints",
                waypoints.len()
            );
            return;
        }
        let geometry = derive_geometry(waypoints);
        self.show_geometry(&geometry);
    }

    pub fn show_geometry(&mut self, geometry: &FlightGeometry) {
        if !self.is_ready() {
            return;
        }
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        if let Err(err) = self.layers.sync_layers(surface, geometry) {
            error!("Failed to display waypoints: {}", err);
            self.layers.clear_layers(surface);
        }
    }

    /// Remove the mission layers, leaving the map itself in place.
    pub fn clear_waypoints(&mut self) {
        if let Some(surface) = self.surface.as_mut() {
            self.layers.clear_layers(surface);
        }
    }

    /// Route a pointer event from the surface to the mission layers.
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> bool {
        match self.surface.as_mut() {
            Some(surface) if self.state == MapState::Ready => {
                self.layers.handle_pointer(surface, event)
            }
            _ => false,
        }
    }

    /// Tear down the mount: layers, handle and listeners.
    pub fn unmount(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            self.layers.clear_layers(&mut surface);
            surface.remove();
            info!("Map surface disposed");
        }
        self.resize_listener = false;
        self.state = MapState::Uninitialized;
    }
}

impl<F: MapFactory> Drop for MapView<F> {
    fn drop(&mut self) {
        self.unmount();
    }
}
