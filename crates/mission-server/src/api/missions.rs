//! Mission endpoints: listing, KML upload, updates, annotations, no-fly zones.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection},
        Multipart, Path, State,
    },
    http::StatusCode,
    response::Response,
    Json,
};
use mission_core::kml::parse_kml;
use mission_core::models::{
    Annotation, AnnotationRequest, Mission, MissionId, MissionUpload, NoFlyZone,
    NoFlyZoneRequest, ParsedWaypoint, UpdateMissionRequest,
};
use std::sync::Arc;
use tracing::{error, info};

use super::error::ApiError;
use super::request_id::RequestId;
use super::response::{respond, Reply};
use crate::state::AppState;

/// Form field carrying the KML file.
pub const FILE_FIELD: &str = "file";
/// Form field carrying the mission name.
pub const NAME_FIELD: &str = "name";

pub async fn list_missions(State(state): State<Arc<AppState>>, request_id: RequestId) -> Response {
    respond(&request_id, Ok(Reply::ok(state.list_missions())))
}

pub async fn get_mission(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    id: Result<Path<MissionId>, PathRejection>,
) -> Response {
    let result = mission_id(id).and_then(|id| {
        state
            .get_mission(id)
            .map(Reply::ok)
            .ok_or_else(|| ApiError::mission_not_found(id))
    });
    respond(&request_id, result)
}

pub async fn create_mission(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let result: Result<Reply<MissionUpload>, ApiError> = async {
        let upload = read_upload(multipart, state.config().max_upload_bytes).await?;
        let name = upload.name.trim();
        if name.is_empty() {
            return Err(ApiError::validation("Mission name is required"));
        }
        let waypoints = parse_upload(name, &upload.kml)?;

        info!("Creating mission {} from {}", name, upload.file_name);
        let created = state.create_mission(name, &upload.kml, &waypoints).await?;
        Ok(Reply::created(created))
    }
    .await;
    respond(&request_id, result)
}

pub async fn update_mission(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    id: Result<Path<MissionId>, PathRejection>,
    body: Result<Json<UpdateMissionRequest>, JsonRejection>,
) -> Response {
    let result: Result<Reply<Mission>, ApiError> = async {
        let id = mission_id(id)?;
        let Json(request) = body.map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        if !state.contains(id) {
            return Err(ApiError::mission_not_found(id));
        }

        let name = match request.name.as_deref().map(str::trim) {
            Some("") => return Err(ApiError::validation("Mission name is required")),
            other => other,
        };
        let parsed = match request.kml_data.as_deref() {
            Some(kml) => Some((kml, parse_upload(name.unwrap_or("existing mission"), kml)?)),
            None => None,
        };
        let kml = parsed
            .as_ref()
            .map(|(kml, waypoints)| (*kml, waypoints.as_slice()));

        state
            .update_mission(id, name, kml)
            .await?
            .map(Reply::ok)
            .ok_or_else(|| ApiError::mission_not_found(id))
    }
    .await;
    respond(&request_id, result)
}

pub async fn delete_mission(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    id: Result<Path<MissionId>, PathRejection>,
) -> Response {
    let result: Result<Reply<()>, ApiError> = async {
        let id = mission_id(id)?;
        if !state.delete_mission(id).await? {
            return Err(ApiError::mission_not_found(id));
        }
        Ok(Reply::message("Mission deleted successfully"))
    }
    .await;
    respond(&request_id, result)
}

pub async fn create_annotation(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    id: Result<Path<MissionId>, PathRejection>,
    body: Result<Json<AnnotationRequest>, JsonRejection>,
) -> Response {
    let result: Result<Reply<Annotation>, ApiError> = async {
        let id = mission_id(id)?;
        let Json(request) = body.map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        if !state.contains(id) {
            return Err(ApiError::mission_not_found(id));
        }
        let annotation = state.add_annotation(id, &request).await?;
        Ok(Reply::created(annotation))
    }
    .await;
    respond(&request_id, result)
}

pub async fn create_no_fly_zone(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    id: Result<Path<MissionId>, PathRejection>,
    body: Result<Json<NoFlyZoneRequest>, JsonRejection>,
) -> Response {
    let result: Result<Reply<NoFlyZone>, ApiError> = async {
        let id = mission_id(id)?;
        let Json(request) = body.map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        if !state.contains(id) {
            return Err(ApiError::mission_not_found(id));
        }
        let zone = state.add_no_fly_zone(id, &request).await?;
        Ok(Reply::created(zone))
    }
    .await;
    respond(&request_id, result)
}

/// Non-numeric ids are treated as unknown routes.
fn mission_id(id: Result<Path<MissionId>, PathRejection>) -> Result<MissionId, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|_| ApiError::NotFound("Resource not found".to_string()))
}

struct Upload {
    file_name: String,
    name: String,
    kml: String,
}

async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
    limit: usize,
) -> Result<Upload, ApiError> {
    let mut multipart =
        multipart.map_err(|_| ApiError::validation("No KML file provided"))?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut name = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(err, limit))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some(FILE_FIELD) => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|err| multipart_error(err, limit))?;
                file = Some((file_name, bytes.to_vec()));
            }
            Some(NAME_FIELD) => {
                name = Some(field.text().await.map_err(|err| multipart_error(err, limit))?);
            }
            _ => {}
        }
    }

    let Some((file_name, bytes)) = file else {
        return Err(ApiError::validation("No KML file provided"));
    };
    if file_name.is_empty() {
        return Err(ApiError::validation("No file selected"));
    }
    if !file_name.to_lowercase().ends_with(".kml") {
        return Err(ApiError::validation("File must be a KML file"));
    }
    let Some(name) = name.filter(|name| !name.is_empty()) else {
        return Err(ApiError::validation("Mission name is required"));
    };
    let kml = String::from_utf8(bytes)
        .map_err(|err| ApiError::validation(format!("Failed to process request: {}", err)))?;

    Ok(Upload {
        file_name,
        name,
        kml,
    })
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(limit)
    } else {
        ApiError::validation(format!("Failed to process request: {}", err.body_text()))
    }
}

fn parse_upload(mission_name: &str, kml: &str) -> Result<Vec<ParsedWaypoint>, ApiError> {
    if kml.trim().is_empty() {
        return Err(ApiError::validation("KML content is required"));
    }
    parse_kml(kml).map_err(|err| {
        error!("KML parsing failed for mission {}: {}", mission_name, err);
        ApiError::validation(format!("KML parsing failed: {}", err))
    })
}
