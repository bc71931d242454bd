//! Mission persistence operations.

use anyhow::Result;
use mission_core::models::{
    Annotation, AnnotationRequest, Mission, MissionId, NoFlyZone, NoFlyZoneRequest,
    ParsedWaypoint, Waypoint,
};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;

/// Insert a mission and its parsed waypoints. Returns the stored records.
pub async fn insert_mission(
    pool: &SqlitePool,
    name: &str,
    kml_data: &str,
    waypoints: &[ParsedWaypoint],
) -> Result<(Mission, Vec<Waypoint>)> {
    let mut tx = pool.begin().await?;

    let mission_id = sqlx::query("INSERT INTO missions (name, kml_data) VALUES (?1, ?2)")
        .bind(name)
        .bind(kml_data)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    let stored = insert_waypoints(&mut tx, mission_id, waypoints).await?;
    tx.commit().await?;

    let mission = Mission {
        id: mission_id,
        name: name.to_string(),
        kml_data: None,
        waypoints: None,
        waypoint_count: None,
        annotations: Vec::new(),
        no_fly_zones: Vec::new(),
    };
    Ok((mission, stored))
}

async fn insert_waypoints(
    tx: &mut Transaction<'_, Sqlite>,
    mission_id: MissionId,
    waypoints: &[ParsedWaypoint],
) -> Result<Vec<Waypoint>> {
    let mut stored = Vec::with_capacity(waypoints.len());
    for waypoint in waypoints {
        let id = sqlx::query(
            r#"
            INSERT INTO waypoints (mission_id, latitude, longitude, altitude, waypoint_index)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(mission_id)
        .bind(waypoint.latitude)
        .bind(waypoint.longitude)
        .bind(waypoint.altitude)
        .bind(waypoint.index)
        .execute(&mut **tx)
        .await?
        .last_insert_rowid();

        stored.push(waypoint.clone().into_waypoint(id, mission_id));
    }
    Ok(stored)
}

/// Load all missions with their waypoints, annotations and no-fly zones.
pub async fn load_all_missions(pool: &SqlitePool) -> Result<Vec<Mission>> {
    let rows = sqlx::query_as::<_, MissionRow>("SELECT id, name, kml_data FROM missions ORDER BY id")
        .fetch_all(pool)
        .await?;

    let mut waypoints = group_by_mission(
        sqlx::query_as::<_, WaypointRow>(
            "SELECT id, mission_id, latitude, longitude, altitude, waypoint_index FROM waypoints ORDER BY id",
        )
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Waypoint::from),
        |w| w.mission_id,
    );
    let mut annotations = group_by_mission(
        sqlx::query_as::<_, AnnotationRow>(
            "SELECT id, mission_id, latitude, longitude, note FROM annotations ORDER BY id",
        )
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Annotation::from),
        |a| a.mission_id,
    );
    let mut zones = group_by_mission(
        sqlx::query_as::<_, NoFlyZoneRow>(
            "SELECT id, mission_id, coordinates, note FROM no_fly_zones ORDER BY id",
        )
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(NoFlyZone::from),
        |z| z.mission_id,
    );

    Ok(rows
        .into_iter()
        .map(|row| {
            let id = row.id;
            row.into_mission(
                waypoints.remove(&id).unwrap_or_default(),
                annotations.remove(&id).unwrap_or_default(),
                zones.remove(&id).unwrap_or_default(),
            )
        })
        .collect())
}

/// Load one mission by ID.
pub async fn load_mission(pool: &SqlitePool, id: MissionId) -> Result<Option<Mission>> {
    let Some(row) =
        sqlx::query_as::<_, MissionRow>("SELECT id, name, kml_data FROM missions WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await?
    else {
        return Ok(None);
    };

    let waypoints = sqlx::query_as::<_, WaypointRow>(
        "SELECT id, mission_id, latitude, longitude, altitude, waypoint_index FROM waypoints WHERE mission_id = ?1 ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(Waypoint::from)
    .collect();

    let annotations = sqlx::query_as::<_, AnnotationRow>(
        "SELECT id, mission_id, latitude, longitude, note FROM annotations WHERE mission_id = ?1 ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(Annotation::from)
    .collect();

    let zones = sqlx::query_as::<_, NoFlyZoneRow>(
        "SELECT id, mission_id, coordinates, note FROM no_fly_zones WHERE mission_id = ?1 ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(NoFlyZone::from)
    .collect();

    Ok(Some(row.into_mission(waypoints, annotations, zones)))
}

/// Update a mission's name and/or KML. New KML replaces the stored waypoints.
///
/// Returns `false` if the mission does not exist.
pub async fn update_mission(
    pool: &SqlitePool,
    id: MissionId,
    name: Option<&str>,
    kml: Option<(&str, &[ParsedWaypoint])>,
) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM missions WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Ok(false);
    }

    if let Some(name) = name {
        sqlx::query("UPDATE missions SET name = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1")
            .bind(id)
            .bind(name)
            .execute(&mut *tx)
            .await?;
    }

    if let Some((kml_data, waypoints)) = kml {
        sqlx::query(
            "UPDATE missions SET kml_data = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
        )
        .bind(id)
        .bind(kml_data)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM waypoints WHERE mission_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_waypoints(&mut tx, id, waypoints).await?;
    }

    tx.commit().await?;
    Ok(true)
}

/// Delete a mission and everything attached to it.
pub async fn delete_mission(pool: &SqlitePool, id: MissionId) -> Result<bool> {
    let mut tx = pool.begin().await?;
    for table in ["waypoints", "annotations", "no_fly_zones"] {
        sqlx::query(&format!("DELETE FROM {} WHERE mission_id = ?1", table))
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    let result = sqlx::query("DELETE FROM missions WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(result.rows_affected() > 0)
}

pub async fn insert_annotation(
    pool: &SqlitePool,
    mission_id: MissionId,
    request: &AnnotationRequest,
) -> Result<Annotation> {
    let id = sqlx::query(
        "INSERT INTO annotations (mission_id, latitude, longitude, note) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(mission_id)
    .bind(request.latitude)
    .bind(request.longitude)
    .bind(&request.note)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Annotation {
        id,
        mission_id,
        latitude: request.latitude,
        longitude: request.longitude,
        note: request.note.clone(),
    })
}

pub async fn insert_no_fly_zone(
    pool: &SqlitePool,
    mission_id: MissionId,
    request: &NoFlyZoneRequest,
) -> Result<NoFlyZone> {
    let id = sqlx::query(
        "INSERT INTO no_fly_zones (mission_id, coordinates, note) VALUES (?1, ?2, ?3)",
    )
    .bind(mission_id)
    .bind(&request.coordinates)
    .bind(&request.note)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(NoFlyZone {
        id,
        mission_id,
        coordinates: request.coordinates.clone(),
        note: request.note.clone(),
    })
}

fn group_by_mission<T>(
    items: impl Iterator<Item = T>,
    key: impl Fn(&T) -> MissionId,
) -> HashMap<MissionId, Vec<T>> {
    let mut grouped: HashMap<MissionId, Vec<T>> = HashMap::new();
    for item in items {
        grouped.entry(key(&item)).or_default().push(item);
    }
    grouped
}

// Internal row types for SQLx
#[derive(sqlx::FromRow)]
struct MissionRow {
    id: i64,
    name: String,
    kml_data: String,
}

impl MissionRow {
    fn into_mission(
        self,
        waypoints: Vec<Waypoint>,
        annotations: Vec<Annotation>,
        no_fly_zones: Vec<NoFlyZone>,
    ) -> Mission {
        Mission {
            id: self.id,
            name: self.name,
            kml_data: Some(self.kml_data),
            waypoint_count: Some(waypoints.len()),
            waypoints: Some(waypoints),
            annotations,
            no_fly_zones,
        }
    }
}

#[derive(sqlx::FromRow)]
struct WaypointRow {
    id: i64,
    mission_id: i64,
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    waypoint_index: i64,
}

impl From<WaypointRow> for Waypoint {
    fn from(row: WaypointRow) -> Self {
        Waypoint {
            id: row.id,
            mission_id: row.mission_id,
            latitude: row.latitude,
            longitude: row.longitude,
            altitude: row.altitude,
            index: row.waypoint_index,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AnnotationRow {
    id: i64,
    mission_id: i64,
    latitude: f64,
    longitude: f64,
    note: Option<String>,
}

impl From<AnnotationRow> for Annotation {
    fn from(row: AnnotationRow) -> Self {
        Annotation {
            id: row.id,
            mission_id: row.mission_id,
            latitude: row.latitude,
            longitude: row.longitude,
            note: row.note,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NoFlyZoneRow {
    id: i64,
    mission_id: i64,
    coordinates: String,
    note: Option<String>,
}

impl From<NoFlyZoneRow> for NoFlyZone {
    fn from(row: NoFlyZoneRow) -> Self {
        NoFlyZone {
            id: row.id,
            mission_id: row.mission_id,
            coordinates: row.coordinates,
            note: row.note,
        }
    }
}
