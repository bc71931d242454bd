//! Core logic for drone mission visualization.
//!
//! Mission and waypoint records, KML mission parsing, flight geometry
//! derivation and the map layer lifecycle shared by the server, the SDK and
//! the dashboard.

pub mod geometry;
pub mod kml;
pub mod map;
pub mod models;

pub use geometry::{derive_geometry, Bounds, FlightGeometry, LngLat, PointFeature};
pub use kml::{parse_kml, KmlError};
pub use map::{MapState, MapSurface, MapView};
pub use models::{
    Annotation, AnnotationRequest, ApiResponse, Mission, MissionId, MissionUpload, NoFlyZone,
    NoFlyZoneRequest, ParsedWaypoint, UpdateMissionRequest, Waypoint,
};
