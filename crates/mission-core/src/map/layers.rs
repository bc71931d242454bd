//! Mission layer set: flight path line, waypoint markers and index labels.

use tracing::{debug, error};

use super::{
    CircleStyle, Cursor, FitBoundsOptions, LayerSpec, LayerStyle, LineStyle, MapError,
    MapSurface, PointerEvent, PointerKind, Popup, SymbolStyle,
};
use crate::geometry::{FlightGeometry, LngLat};

pub const FLIGHT_PATH_SOURCE: &str = "flight-path";
pub const WAYPOINT_SOURCE: &str = "waypoints";
pub const FLIGHT_PATH_LAYER: &str = "flight-path-layer";
pub const WAYPOINT_LAYER: &str = "waypoints-layer";
pub const WAYPOINT_LABEL_LAYER: &str = "waypoint-labels";

pub const MISSION_COLOR: &str = "#ff6b35";
pub const FIT_PADDING_PX: f64 = 50.0;
/// Keeps single-point and tightly clustered missions from zooming in too far.
pub const FIT_MAX_ZOOM: f64 = 16.0;

const WAYPOINT_HANDLERS: [PointerKind; 3] = [
    PointerKind::Click,
    PointerKind::MouseEnter,
    PointerKind::MouseLeave,
];

/// Owns the mission layer state of one map.
///
/// At most one mission's layers exist at a time: every sync clears the
/// previous set before adding anything.
#[derive(Debug, Default)]
pub struct LayerSynchronizer {
    attached: Vec<PointerKind>,
    displayed_points: usize,
}

impl LayerSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of waypoints currently drawn.
    pub fn displayed_points(&self) -> usize {
        self.displayed_points
    }

    pub fn attached_handlers(&self) -> &[PointerKind] {
        &self.attached
    }

    /// Remove the mission layers, their sources and the marker handlers.
    ///
    /// Safe to call when nothing is displayed.
    pub fn clear_layers<S: MapSurface + ?Sized>(&mut self, map: &mut S) {
        for layer in [WAYPOINT_LAYER, WAYPOINT_LABEL_LAYER, FLIGHT_PATH_LAYER] {
            if map.has_layer(layer) {
                if let Err(err) = map.remove_layer(layer) {
                    error!("Failed to remove layer {}: {}", layer, err);
                }
            }
        }
        for source in [WAYPOINT_SOURCE, FLIGHT_PATH_SOURCE] {
            if map.has_source(source) {
                if let Err(err) = map.remove_source(source) {
                    error!("Failed to remove source {}: {}", source, err);
                }
            }
        }
        for kind in self.attached.drain(..) {
            map.off(kind, WAYPOINT_LAYER);
        }
        self.displayed_points = 0;
    }

    /// Replace whatever is drawn with `geometry`.
    pub fn sync_layers<S: MapSurface + ?Sized>(
        &mut self,
        map: &mut S,
        geometry: &FlightGeometry,
    ) -> Result<(), MapError> {
        self.clear_layers(map);
        if geometry.is_empty() {
            debug!("No waypoints to display");
            return Ok(());
        }

        map.add_source(FLIGHT_PATH_SOURCE, geometry.path_geojson())?;
        map.add_layer(flight_path_layer())?;

        map.add_source(WAYPOINT_SOURCE, geometry.points_geojson())?;
        map.add_layer(waypoint_layer())?;
        map.add_layer(waypoint_label_layer())?;

        if let Some(bounds) = geometry.bounds {
            map.fit_bounds(
                bounds,
                FitBoundsOptions {
                    padding: FIT_PADDING_PX,
                    max_zoom: FIT_MAX_ZOOM,
                },
            );
        }

        for kind in WAYPOINT_HANDLERS {
            map.on(kind, WAYPOINT_LAYER);
            self.attached.push(kind);
        }
        self.displayed_points = geometry.ordered_points.len();
        Ok(())
    }

    /// React to a pointer event if a handler for it is attached.
    ///
    /// Returns whether the event was handled.
    pub fn handle_pointer<S: MapSurface + ?Sized>(&self, map: &mut S, event: &PointerEvent) -> bool {
        if event.layer_id != WAYPOINT_LAYER || !self.attached.contains(&event.kind) {
            return false;
        }
        match event.kind {
            PointerKind::Click => {
                let Some(properties) = event.properties.as_ref() else {
                    return false;
                };
                map.open_popup(waypoint_popup(properties, event.lng_lat));
            }
            PointerKind::MouseEnter => map.set_cursor(Cursor::Pointer),
            PointerKind::MouseLeave => map.set_cursor(Cursor::Default),
        }
        true
    }
}

/// Info popup for a clicked waypoint marker.
pub fn waypoint_popup(properties: &serde_json::Value, lng_lat: LngLat) -> Popup {
    let index = properties
        .get("index")
        .map(|value| value.to_string())
        .unwrap_or_default();
    let altitude = properties
        .get("altitude")
        .and_then(serde_json::Value::as_f64)
        .map(|altitude| format!("Altitude: {}m<br/>", altitude))
        .unwrap_or_default();

    Popup {
        lng_lat,
        html: format!(
            "<div style=\"font-family: Arial, sans-serif;\"><strong>Waypoint {}</strong><br/>{}Lat: {:.6}<br/>Lng: {:.6}</div>",
            index, altitude, lng_lat.lat, lng_lat.lng
        ),
    }
}

fn flight_path_layer() -> LayerSpec {
    LayerSpec {
        id: FLIGHT_PATH_LAYER.to_string(),
        source: FLIGHT_PATH_SOURCE.to_string(),
        style: LayerStyle::Line(LineStyle {
            color: MISSION_COLOR.to_string(),
            width: 3.0,
            opacity: 0.8,
            rounded: true,
        }),
    }
}

fn waypoint_layer() -> LayerSpec {
    LayerSpec {
        id: WAYPOINT_LAYER.to_string(),
        source: WAYPOINT_SOURCE.to_string(),
        style: LayerStyle::Circle(CircleStyle {
            radius: 8.0,
            color: MISSION_COLOR.to_string(),
            stroke_color: "#ffffff".to_string(),
            stroke_width: 2.0,
            opacity: 0.9,
        }),
    }
}

fn waypoint_label_layer() -> LayerSpec {
    LayerSpec {
        id: WAYPOINT_LABEL_LAYER.to_string(),
        source: WAYPOINT_SOURCE.to_string(),
        style: LayerStyle::Symbol(SymbolStyle {
            text_property: "index".to_string(),
            fonts: vec!["Open Sans Bold".to_string(), "Arial Unicode MS Bold".to_string()],
            size: 12.0,
            offset: [0.0, -2.0],
            anchor: "bottom".to_string(),
            color: "#ffffff".to_string(),
            halo_color: "#000000".to_string(),
            halo_width: 1.0,
        }),
    }
}
