use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::{api, config::Config, persistence, state::AppState};

const BOUNDARY: &str = "mission-test-boundary";

const MISSION_KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2" xmlns:wpml="http://www.dji.com/wpmz/1.0.6">
  <Document>
    <Placemark>
      <Point><coordinates>11,51</coordinates></Point>
      <wpml:index>0</wpml:index>
      <wpml:executeHeight>40</wpml:executeHeight>
    </Placemark>
    <Placemark>
      <Point><coordinates>12,52</coordinates></Point>
      <wpml:index>1</wpml:index>
    </Placemark>
    <Placemark>
      <Point><coordinates>10,50</coordinates></Point>
      <wpml:index>2</wpml:index>
      <wpml:executeHeight>60</wpml:executeHeight>
    </Placemark>
  </Document>
</kml>"#;

fn test_config() -> Config {
    let mut config = Config::from_env();
    config.database_path = std::env::temp_dir()
        .join(format!("mission-test-{}.db", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .to_string();
    config.database_max_connections = 1;
    config.max_upload_bytes = 64 * 1024;
    config
}

async fn setup_app() -> (axum::Router, Arc<AppState>) {
    let config = test_config();
    let db = persistence::init_database(&config.database_path, config.database_max_connections)
        .await
        .expect("init db");
    let state = Arc::new(AppState::with_database(db, config.clone()));
    state.load_from_database().await.expect("load db");

    let app = api::routes(&config).with_state(state.clone());
    (app, state)
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

/// Build a multipart body. `file` is `(filename, content)`.
fn multipart_body(file: Option<(&str, &str)>, name: Option<&str>) -> String {
    let mut body = String::new();
    if let Some((filename, content)) = file {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/vnd.google-earth.kml+xml\r\n\r\n{content}\r\n"
        ));
    }
    if let Some(name) = name {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

fn upload_request(file: Option<(&str, &str)>, name: Option<&str>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/missions")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(file, name)))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn upload_mission(app: &axum::Router, name: &str) -> Value {
    let res = app
        .clone()
        .oneshot(upload_request(Some(("survey.kml", MISSION_KML)), Some(name)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    read_json(res).await
}

#[tokio::test]
async fn upload_persists_waypoints_with_ids() {
    let (app, _state) = setup_app().await;

    let body = upload_mission(&app, "  Harbour survey  ").await;
    assert_eq!(body["success"], Value::Bool(true));
    assert!(body["request_id"].is_string());
    assert!(body["timestamp"].is_string());

    let data = &body["data"];
    assert_eq!(data["mission"]["name"], "Harbour survey");
    assert_eq!(data["waypoint_count"], 3);
    let waypoints = data["waypoints"].as_array().unwrap();
    assert_eq!(waypoints.len(), 3);
    let mission_id = data["mission"]["id"].as_i64().unwrap();
    for waypoint in waypoints {
        assert!(waypoint["id"].as_i64().is_some());
        assert_eq!(waypoint["mission_id"].as_i64(), Some(mission_id));
    }
    assert_eq!(waypoints[0]["altitude"], 40.0);
    assert_eq!(waypoints[1]["altitude"], Value::Null);

    let list = read_json(app.clone().oneshot(get("/api/missions")).await.unwrap()).await;
    let missions = list["data"].as_array().unwrap();
    assert_eq!(missions.len(), 1);
    assert_eq!(missions[0]["waypoint_count"], 3);
    assert!(missions[0].get("kml_data").is_none());

    let one = read_json(
        app.clone()
            .oneshot(get(&format!("/api/missions/{}", mission_id)))
            .await
            .unwrap(),
    )
    .await;
    assert!(one["data"]["kml_data"].as_str().unwrap().contains("<Placemark>"));
}

#[tokio::test]
async fn upload_validation_messages() {
    let (app, _state) = setup_app().await;

    let cases = [
        (upload_request(None, Some("Survey")), "No KML file provided"),
        (
            upload_request(Some(("", MISSION_KML)), Some("Survey")),
            "No file selected",
        ),
        (
            upload_request(Some(("survey.txt", MISSION_KML)), Some("Survey")),
            "File must be a KML file",
        ),
        (
            upload_request(Some(("survey.kml", MISSION_KML)), None),
            "Mission name is required",
        ),
        (
            upload_request(Some(("survey.KML", MISSION_KML)), Some("   ")),
            "Mission name is required",
        ),
        (
            upload_request(Some(("survey.kml", "   ")), Some("Survey")),
            "KML content is required",
        ),
    ];

    for (request, expected) in cases {
        let res = app.clone().oneshot(request).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{}", expected);
        let body = read_json(res).await;
        assert_eq!(body["success"], Value::Bool(false));
        assert_eq!(body["message"], expected);
        assert_eq!(body["error"]["message"], expected);
        assert_eq!(body["error"]["code"], 400);
    }
}

#[tokio::test]
async fn malformed_kml_is_rejected() {
    let (app, state) = setup_app().await;

    let res = app
        .clone()
        .oneshot(upload_request(
            Some(("broken.kml", "<kml><Document></Placemark></kml>")),
            Some("Broken"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = read_json(res).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("KML parsing failed:"));
    assert!(state.list_missions().is_empty());
}

#[tokio::test]
async fn non_finite_placemarks_are_not_stored() {
    let (app, state) = setup_app().await;
    let kml = r#"<kml xmlns="http://www.opengis.net/kml/2.2" xmlns:wpml="http://www.dji.com/wpmz/1.0.6">
      <Document>
        <Placemark><Point><coordinates>NaN,NaN</coordinates></Point></Placemark>
        <Placemark>
          <Point><coordinates>174.7633,-36.8485</coordinates></Point>
          <wpml:executeHeight>inf</wpml:executeHeight>
        </Placemark>
        <Placemark>
          <Point><coordinates>174.7600,-36.8500</coordinates></Point>
          <wpml:index>1</wpml:index>
        </Placemark>
      </Document>
    </kml>"#;

    let res = app
        .clone()
        .oneshot(upload_request(Some(("nan.kml", kml)), Some("Partial")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = read_json(res).await;
    assert_eq!(body["data"]["waypoint_count"], 1);
    let waypoints = body["data"]["waypoints"].as_array().unwrap();
    assert_eq!(waypoints[0]["longitude"], 174.76);
    assert_eq!(waypoints[0]["latitude"], -36.85);

    let mission_id = body["data"]["mission"]["id"].as_i64().unwrap();
    let stored = state.get_mission(mission_id).unwrap();
    assert!(stored
        .waypoints()
        .iter()
        .all(|w| w.latitude.is_finite() && w.longitude.is_finite()));
}

#[tokio::test]
async fn upload_without_multipart_body_is_rejected() {
    let (app, _state) = setup_app().await;

    let res = app
        .clone()
        .oneshot(json_request("POST", "/api/missions", json!({"name": "x"})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(res).await["message"], "No KML file provided");
}

#[tokio::test]
async fn unknown_mission_is_not_found() {
    let (app, _state) = setup_app().await;

    for request in [
        get("/api/missions/999"),
        json_request("PUT", "/api/missions/999", json!({"name": "x"})),
        Request::builder()
            .method("DELETE")
            .uri("/api/missions/999")
            .body(Body::empty())
            .unwrap(),
        json_request(
            "POST",
            "/api/missions/999/annotations",
            json!({"latitude": 1.0, "longitude": 2.0}),
        ),
    ] {
        let res = app.clone().oneshot(request).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body = read_json(res).await;
        assert_eq!(body["message"], "Mission with ID 999 not found");
        assert_eq!(body["error"]["code"], 404);
    }

    let res = app.clone().oneshot(get("/api/nowhere")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = app.clone().oneshot(get("/api/missions/abc")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_cascades_and_reports() {
    let (app, state) = setup_app().await;
    let body = upload_mission(&app, "Doomed").await;
    let id = body["data"]["mission"]["id"].as_i64().unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/missions/{}/no_fly_zones", id),
            json!({"coordinates": "[[10,50],[11,50],[11,51]]", "note": "stadium"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/missions/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body["message"], "Mission deleted successfully");
    assert!(body.get("data").is_none());
    assert!(state.list_missions().is_empty());

    let res = app
        .clone()
        .oneshot(get(&format!("/api/missions/{}", id)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn annotations_and_zones_are_attached() {
    let (app, _state) = setup_app().await;
    let body = upload_mission(&app, "Annotated").await;
    let id = body["data"]["mission"]["id"].as_i64().unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/missions/{}/annotations", id),
            json!({"latitude": 51.0, "longitude": 11.0, "note": "launch site"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let annotation = read_json(res).await;
    assert_eq!(annotation["data"]["note"], "launch site");
    assert_eq!(annotation["data"]["mission_id"].as_i64(), Some(id));

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/missions/{}/annotations", id),
            json!({"note": "no position"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let list = read_json(app.clone().oneshot(get("/api/missions")).await.unwrap()).await;
    assert_eq!(list["data"][0]["annotations"].as_array().unwrap().len(), 1);
    assert!(list["data"][0]["no_fly_zones"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn update_renames_and_reparses() {
    let (app, _state) = setup_app().await;
    let body = upload_mission(&app, "Draft").await;
    let id = body["data"]["mission"]["id"].as_i64().unwrap();

    let single = r#"<kml xmlns="http://www.opengis.net/kml/2.2"><Placemark><Point><coordinates>1,2,30</coordinates></Point></Placemark></kml>"#;
    let res = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/missions/{}", id),
            json!({"name": "Final", "kml_data": single}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body["data"]["name"], "Final");
    assert_eq!(body["data"]["waypoint_count"], 1);
    assert_eq!(body["data"]["waypoints"][0]["altitude"], 30.0);

    let res = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/missions/{}", id),
            json!({"kml_data": "<kml>"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missions_survive_reload() {
    let config = test_config();
    let db = persistence::init_database(&config.database_path, 1)
        .await
        .unwrap();
    let state = Arc::new(AppState::with_database(db.clone(), config.clone()));
    let app = api::routes(&config).with_state(state);
    upload_mission(&app, "Persistent").await;

    let reloaded = AppState::with_database(db, config);
    reloaded.load_from_database().await.unwrap();
    let missions = reloaded.list_missions();
    assert_eq!(missions.len(), 1);
    assert_eq!(missions[0].name, "Persistent");
    assert_eq!(missions[0].waypoint_count, Some(3));
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let (app, _state) = setup_app().await;

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/missions")
                .header("x-request-id", "trace-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-123");
    assert!(res.headers()["x-processing-time"]
        .to_str()
        .unwrap()
        .ends_with('s'));
    assert_eq!(read_json(res).await["request_id"], "trace-123");

    let res = app.clone().oneshot(get("/api/missions/77")).await.unwrap();
    let header = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(!header.is_empty());
    assert_eq!(read_json(res).await["request_id"], header);
}

#[tokio::test]
async fn health_check() {
    let (app, _state) = setup_app().await;
    let res = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
