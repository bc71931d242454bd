//! Core data models shared by the server, the client and the dashboard.

use serde::{Deserialize, Serialize};

pub type MissionId = i64;
pub type WaypointId = i64;

/// A single georeferenced point of a mission.
///
/// `index` is the intended position in the flight sequence. Storage order
/// is not guaranteed to follow it, so consumers sort before drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: WaypointId,
    pub mission_id: MissionId,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub index: i64,
}

/// Waypoint extracted from a KML file, before the server assigns ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedWaypoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub index: i64,
}

impl ParsedWaypoint {
    pub fn into_waypoint(self, id: WaypointId, mission_id: MissionId) -> Waypoint {
        Waypoint {
            id,
            mission_id,
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            index: self.index,
        }
    }
}

/// A named collection of waypoints representing a planned drone flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub name: String,
    /// Raw KML as uploaded. Only returned when a single mission is requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kml_data: Option<String>,
    #[serde(default)]
    pub waypoints: Option<Vec<Waypoint>>,
    #[serde(default)]
    pub waypoint_count: Option<usize>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub no_fly_zones: Vec<NoFlyZone>,
}

impl Mission {
    /// Waypoints in storage order, empty when the mission carries none.
    pub fn waypoints(&self) -> &[Waypoint] {
        self.waypoints.as_deref().unwrap_or(&[])
    }

    /// Copy without the raw KML payload, as listed by `GET /missions`.
    pub fn without_kml(&self) -> Self {
        Self {
            kml_data: None,
            ..self.clone()
        }
    }
}

/// Point note attached to a mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: i64,
    pub mission_id: MissionId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Restricted area attached to a mission.
///
/// `coordinates` is kept as the client supplied it; nothing interprets it yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoFlyZone {
    pub id: i64,
    pub mission_id: MissionId,
    pub coordinates: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoFlyZoneRequest {
    pub coordinates: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Partial update of a mission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMissionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kml_data: Option<String>,
}

/// Payload returned after a successful KML upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionUpload {
    pub mission: Mission,
    pub waypoints: Vec<Waypoint>,
    pub waypoint_count: usize,
}

impl MissionUpload {
    /// Mission record as the dashboard keeps it after an upload.
    pub fn into_mission(self) -> Mission {
        let count = self.waypoints.len();
        Mission {
            waypoints: Some(self.waypoints),
            waypoint_count: Some(count),
            ..self.mission
        }
    }
}

/// Standard response envelope used by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}
