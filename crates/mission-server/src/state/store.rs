//! In-memory state store using DashMap, written through to SQLite.

use anyhow::Result;
use dashmap::DashMap;
use mission_core::models::{
    Annotation, AnnotationRequest, Mission, MissionId, MissionUpload, NoFlyZone,
    NoFlyZoneRequest, ParsedWaypoint,
};
use tracing::info;

use crate::config::Config;
use crate::persistence::{missions, Database};

/// Application state - mission cache backed by the database.
pub struct AppState {
    db: Database,
    config: Config,
    missions: DashMap<MissionId, Mission>,
}

impl AppState {
    pub fn with_database(db: Database, config: Config) -> Self {
        Self {
            db,
            config,
            missions: DashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Warm the cache from persisted missions.
    pub async fn load_from_database(&self) -> Result<()> {
        let loaded = missions::load_all_missions(self.db.pool()).await?;
        info!("Loaded {} missions from database", loaded.len());
        self.missions.clear();
        for mission in loaded {
            self.missions.insert(mission.id, mission);
        }
        Ok(())
    }

    /// All missions ordered by id, without their raw KML.
    pub fn list_missions(&self) -> Vec<Mission> {
        let mut list: Vec<Mission> = self
            .missions
            .iter()
            .map(|entry| entry.value().without_kml())
            .collect();
        list.sort_by_key(|mission| mission.id);
        list
    }

    pub fn get_mission(&self, id: MissionId) -> Option<Mission> {
        self.missions.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: MissionId) -> bool {
        self.missions.contains_key(&id)
    }

    pub async fn create_mission(
        &self,
        name: &str,
        kml_data: &str,
        waypoints: &[ParsedWaypoint],
    ) -> Result<MissionUpload> {
        let (mission, stored) =
            missions::insert_mission(self.db.pool(), name, kml_data, waypoints).await?;

        let cached = Mission {
            kml_data: Some(kml_data.to_string()),
            waypoints: Some(stored.clone()),
            waypoint_count: Some(stored.len()),
            ..mission.clone()
        };
        self.missions.insert(mission.id, cached);
        info!(
            "Created mission {} ({}) with {} waypoints",
            mission.id,
            name,
            stored.len()
        );

        Ok(MissionUpload {
            waypoint_count: stored.len(),
            mission,
            waypoints: stored,
        })
    }

    /// Returns `None` if the mission does not exist.
    pub async fn update_mission(
        &self,
        id: MissionId,
        name: Option<&str>,
        kml: Option<(&str, &[ParsedWaypoint])>,
    ) -> Result<Option<Mission>> {
        if !missions::update_mission(self.db.pool(), id, name, kml).await? {
            return Ok(None);
        }
        let Some(updated) = missions::load_mission(self.db.pool(), id).await? else {
            self.missions.remove(&id);
            return Ok(None);
        };
        self.missions.insert(id, updated.clone());
        Ok(Some(updated))
    }

    pub async fn delete_mission(&self, id: MissionId) -> Result<bool> {
        let deleted = missions::delete_mission(self.db.pool(), id).await?;
        self.missions.remove(&id);
        if deleted {
            info!("Deleted mission {}", id);
        }
        Ok(deleted)
    }

    pub async fn add_annotation(
        &self,
        mission_id: MissionId,
        request: &AnnotationRequest,
    ) -> Result<Annotation> {
        let annotation = missions::insert_annotation(self.db.pool(), mission_id, request).await?;
        if let Some(mut mission) = self.missions.get_mut(&mission_id) {
            mission.annotations.push(annotation.clone());
        }
        Ok(annotation)
    }

    pub async fn add_no_fly_zone(
        &self,
        mission_id: MissionId,
        request: &NoFlyZoneRequest,
    ) -> Result<NoFlyZone> {
        let zone = missions::insert_no_fly_zone(self.db.pool(), mission_id, request).await?;
        if let Some(mut mission) = self.missions.get_mut(&mission_id) {
            mission.no_fly_zones.push(zone.clone());
        }
        Ok(zone)
    }
}
