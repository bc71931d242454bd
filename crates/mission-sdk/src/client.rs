//! HTTP client for the mission REST backend.

use mission_core::models::{
    Annotation, AnnotationRequest, ApiResponse, Mission, MissionId, MissionUpload, NoFlyZone,
    NoFlyZoneRequest, UpdateMissionRequest,
};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

const KML_MIME: &str = "application/vnd.google-earth.kml+xml";

#[derive(Debug, Error)]
pub enum ClientError {
    /// Non-2xx response. `message` is what a user should see.
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// 2xx response whose envelope reports failure or carries no data.
    #[error("{0}")]
    Rejected(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            ClientError::Transport(err) => err.status(),
            _ => None,
        }
    }
}

/// Which message a failed request surfaces.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ErrorDetail {
    /// Always `HTTP error! status: <code>`.
    StatusOnly,
    /// The server's `message` field when present.
    ServerMessage,
}

/// Client for the mission REST backend.
#[derive(Debug, Clone)]
pub struct MissionClient {
    base_url: String,
    client: reqwest::Client,
}

impl MissionClient {
    /// Create a client for an API base URL such as `http://localhost:5000/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch every mission with its waypoints.
    pub async fn list_missions(&self) -> Result<Vec<Mission>, ClientError> {
        let url = format!("{}/missions", self.base_url);
        let response = self.client.get(&url).send().await?;
        let missions: Vec<Mission> = Self::decode(response, ErrorDetail::StatusOnly).await?;
        debug!("Fetched {} missions", missions.len());
        Ok(missions)
    }

    /// Fetch one mission, including its raw KML.
    pub async fn get_mission(&self, id: MissionId) -> Result<Mission, ClientError> {
        let url = format!("{}/missions/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;
        Self::decode(response, ErrorDetail::ServerMessage).await
    }

    /// Upload KML content as a new mission.
    pub async fn upload_kml(
        &self,
        file_name: &str,
        content: Vec<u8>,
        mission_name: &str,
    ) -> Result<MissionUpload, ClientError> {
        let url = format!("{}/missions", self.base_url);
        let part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str(KML_MIME)?;
        let form = Form::new()
            .part("file", part)
            .text("name", mission_name.to_string());

        let response = self.client.post(&url).multipart(form).send().await?;
        Self::decode(response, ErrorDetail::ServerMessage).await
    }

    /// Read a KML file from disk and upload it.
    pub async fn upload_kml_file(
        &self,
        path: impl AsRef<Path>,
        mission_name: &str,
    ) -> Result<MissionUpload, ClientError> {
        let path = path.as_ref();
        let content = tokio::fs::read(path).await.map_err(|source| ClientError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        self.upload_kml(&file_name, content, mission_name).await
    }

    pub async fn update_mission(
        &self,
        id: MissionId,
        request: &UpdateMissionRequest,
    ) -> Result<Mission, ClientError> {
        let url = format!("{}/missions/{}", self.base_url, id);
        let response = self.client.put(&url).json(request).send().await?;
        Self::decode(response, ErrorDetail::ServerMessage).await
    }

    /// Delete a mission. Returns the server's confirmation message.
    pub async fn delete_mission(&self, id: MissionId) -> Result<String, ClientError> {
        let url = format!("{}/missions/{}", self.base_url, id);
        let response = self.client.delete(&url).send().await?;
        let envelope: ApiResponse<serde_json::Value> =
            Self::envelope(response, ErrorDetail::ServerMessage).await?;
        Ok(envelope.message.unwrap_or_default())
    }

    pub async fn create_annotation(
        &self,
        mission_id: MissionId,
        request: &AnnotationRequest,
    ) -> Result<Annotation, ClientError> {
        let url = format!("{}/missions/{}/annotations", self.base_url, mission_id);
        let response = self.client.post(&url).json(request).send().await?;
        Self::decode(response, ErrorDetail::ServerMessage).await
    }

    pub async fn create_no_fly_zone(
        &self,
        mission_id: MissionId,
        request: &NoFlyZoneRequest,
    ) -> Result<NoFlyZone, ClientError> {
        let url = format!("{}/missions/{}/no_fly_zones", self.base_url, mission_id);
        let response = self.client.post(&url).json(request).send().await?;
        Self::decode(response, ErrorDetail::ServerMessage).await
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        detail: ErrorDetail,
    ) -> Result<T, ClientError> {
        let envelope: ApiResponse<T> = Self::envelope(response, detail).await?;
        envelope.data.ok_or_else(|| {
            ClientError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "Response carried no data".to_string()),
            )
        })
    }

    async fn envelope<T: DeserializeOwned>(
        response: reqwest::Response,
        detail: ErrorDetail,
    ) -> Result<ApiResponse<T>, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let server_message = match detail {
                ErrorDetail::StatusOnly => None,
                ErrorDetail::ServerMessage => response
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|body| body.get("message")?.as_str().map(str::to_string))
                    .filter(|message| !message.is_empty()),
            };
            let message = server_message
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            error!("Mission API request failed ({}): {}", status, message);
            return Err(ClientError::Http { status, message });
        }

        let envelope: ApiResponse<T> = response.json().await?;
        if !envelope.success {
            let message = envelope
                .message
                .unwrap_or_else(|| "Request was not successful".to_string());
            return Err(ClientError::Rejected(message));
        }
        Ok(envelope)
    }
}

impl Default for MissionClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Multipart,
        http::StatusCode as AxumStatus,
        routing::{delete, get, post},
        Json, Router,
    };
    use serde_json::json;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api", addr)
    }

    fn waypoint(id: i64, index: i64) -> serde_json::Value {
        json!({
            "id": id,
            "mission_id": 1,
            "latitude": -36.85,
            "longitude": 174.76,
            "altitude": null,
            "index": index
        })
    }

    #[tokio::test]
    async fn list_missions_returns_data() {
        let router = Router::new().route(
            "/api/missions",
            get(|| async {
                Json(json!({
                    "success": true,
                    "data": [
                        {"id": 1, "name": "Mission 1", "waypoints": [], "waypoint_count": 0},
                        {"id": 2, "name": "Mission 2", "waypoints": [waypoint(7, 0)], "waypoint_count": 1}
                    ]
                }))
            }),
        );
        let client = MissionClient::new(serve(router).await);

        let missions = client.list_missions().await.unwrap();
        assert_eq!(missions.len(), 2);
        assert_eq!(missions[1].waypoints()[0].id, 7);
    }

    #[tokio::test]
    async fn list_failure_uses_status_message() {
        let router = Router::new().route(
            "/api/missions",
            get(|| async {
                (
                    AxumStatus::INTERNAL_SERVER_ERROR,
                    Json(json!({"success": false, "message": "database locked"})),
                )
            }),
        );
        let client = MissionClient::new(serve(router).await);

        let err = client.list_missions().await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP error! status: 500");
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn upload_sends_file_and_name() {
        let router = Router::new().route(
            "/api/missions",
            post(|mut multipart: Multipart| async move {
                let mut file_name = String::new();
                let mut name = String::new();
                while let Some(field) = multipart.next_field().await.unwrap() {
                    match field.name().map(str::to_string).as_deref() {
                        Some("file") => {
                            file_name = field.file_name().unwrap_or_default().to_string();
                        }
                        Some("name") => name = field.text().await.unwrap(),
                        _ => {}
                    }
                }
                (
                    AxumStatus::CREATED,
                    Json(json!({
                        "success": true,
                        "data": {
                            "mission": {"id": 3, "name": format!("{}|{}", name, file_name)},
                            "waypoints": [waypoint(1, 0)],
                            "waypoint_count": 1
                        }
                    })),
                )
            }),
        );
        let client = MissionClient::new(serve(router).await);

        let upload = client
            .upload_kml("survey.kml", b"<kml/>".to_vec(), "Test Mission")
            .await
            .unwrap();
        assert_eq!(upload.mission.name, "Test Mission|survey.kml");
        assert_eq!(upload.waypoint_count, 1);
    }

    #[tokio::test]
    async fn upload_failure_prefers_server_message() {
        let router = Router::new().route(
            "/api/missions",
            post(|| async {
                (
                    AxumStatus::BAD_REQUEST,
                    Json(json!({"success": false, "message": "File must be a KML file"})),
                )
            }),
        );
        let client = MissionClient::new(serve(router).await);

        let err = client
            .upload_kml("notes.txt", b"hello".to_vec(), "Test Mission")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "File must be a KML file");
    }

    #[tokio::test]
    async fn upload_failure_without_body_falls_back_to_status() {
        let router = Router::new().route(
            "/api/missions",
            post(|| async { AxumStatus::BAD_GATEWAY }),
        );
        let client = MissionClient::new(serve(router).await);

        let err = client
            .upload_kml("survey.kml", b"<kml/>".to_vec(), "Test Mission")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP error! status: 502");
    }

    #[tokio::test]
    async fn delete_returns_confirmation() {
        let router = Router::new().route(
            "/api/missions/:id",
            delete(|| async {
                Json(json!({"success": true, "message": "Mission deleted successfully"}))
            }),
        );
        let client = MissionClient::new(serve(router).await);

        let message = client.delete_mission(4).await.unwrap();
        assert_eq!(message, "Mission deleted successfully");
    }

    #[tokio::test]
    async fn annotation_round_trip() {
        let router = Router::new().route(
            "/api/missions/:id/annotations",
            post(|Json(body): Json<serde_json::Value>| async move {
                (
                    AxumStatus::CREATED,
                    Json(json!({
                        "success": true,
                        "data": {
                            "id": 10,
                            "mission_id": 2,
                            "latitude": body["latitude"],
                            "longitude": body["longitude"],
                            "note": body["note"]
                        }
                    })),
                )
            }),
        );
        let client = MissionClient::new(serve(router).await);

        let annotation = client
            .create_annotation(
                2,
                &AnnotationRequest {
                    latitude: -36.8,
                    longitude: 174.7,
                    note: Some("launch".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(annotation.id, 10);
        assert_eq!(annotation.note.as_deref(), Some("launch"));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let client = MissionClient::new("http://127.0.0.1:9/api");
        let err = client
            .upload_kml_file("/nonexistent/mission.kml", "Ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Io { .. }));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = MissionClient::new("http://localhost:5000/api/");
        assert_eq!(client.base_url(), "http://localhost:5000/api");
    }
}
