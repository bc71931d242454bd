//! Headless dashboard: mission list, active mission, upload form and map.
//!
//! Every request is issued with a [`Ticket`]. A result is applied only if
//! its ticket is still the newest of its kind and the dashboard has not been
//! torn down; anything else is dropped.

use mission_core::map::{MapFactory, MapView};
use mission_core::models::{Mission, MissionId, MissionUpload, Waypoint};
use mission_sdk::ClientError;
use tracing::{debug, error, info};

use crate::source::MissionSource;

pub const LOAD_FAILED: &str = "Failed to load missions";

/// Generation number of an outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// State of the KML upload form.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    file: Option<SelectedFile>,
    mission_name: String,
    loading: bool,
    error: Option<String>,
    created: Option<Mission>,
    waypoints: Vec<Waypoint>,
}

impl UploadForm {
    pub fn select_file(&mut self, file: Option<SelectedFile>) {
        self.file = file;
        self.error = None;
        self.created = None;
        self.waypoints.clear();
    }

    pub fn set_mission_name(&mut self, name: impl Into<String>) {
        self.mission_name = name.into();
        self.error = None;
    }

    pub fn can_submit(&self) -> bool {
        !self.loading && self.file.is_some() && !self.mission_name.trim().is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The mission created by the last successful submit.
    pub fn created(&self) -> Option<&Mission> {
        self.created.as_ref()
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Everything the mission dashboard shows, minus the pixels.
pub struct Dashboard<F: MapFactory> {
    missions: Vec<Mission>,
    active_mission_id: Option<MissionId>,
    loading: bool,
    error: Option<String>,
    upload_open: bool,
    upload: UploadForm,
    map: MapView<F>,
    load_generation: u64,
    upload_generation: u64,
    torn_down: bool,
}

impl<F: MapFactory> Dashboard<F> {
    pub fn new(map: MapView<F>) -> Self {
        Self {
            missions: Vec::new(),
            active_mission_id: None,
            loading: true,
            error: None,
            upload_open: false,
            upload: UploadForm::default(),
            map,
            load_generation: 0,
            upload_generation: 0,
            torn_down: false,
        }
    }

    pub fn missions(&self) -> &[Mission] {
        &self.missions
    }

    pub fn active_mission_id(&self) -> Option<MissionId> {
        self.active_mission_id
    }

    pub fn active_mission(&self) -> Option<&Mission> {
        let id = self.active_mission_id?;
        self.missions.iter().find(|mission| mission.id == id)
    }

    /// Waypoints of the active mission, in storage order.
    pub fn active_waypoints(&self) -> &[Waypoint] {
        self.active_mission().map(Mission::waypoints).unwrap_or(&[])
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn map(&self) -> &MapView<F> {
        &self.map
    }

    pub fn upload_form(&self) -> &UploadForm {
        &self.upload
    }

    pub fn upload_form_mut(&mut self) -> &mut UploadForm {
        &mut self.upload
    }

    pub fn is_upload_open(&self) -> bool {
        self.upload_open
    }

    pub fn open_upload(&mut self) {
        self.upload_open = true;
    }

    pub fn close_upload(&mut self) {
        self.upload_open = false;
    }

    /// Mount the map container.
    pub fn mount_map(&mut self, access_token: Option<&str>) {
        self.map.mount(access_token);
    }

    /// The map finished loading; draw whatever mission is active.
    pub fn handle_map_load(&mut self) {
        self.map.handle_load();
        self.render_active();
    }

    pub fn handle_map_error(&mut self, message: &str) {
        self.map.handle_error(message);
    }

    pub fn handle_window_resize(&mut self) {
        self.map.handle_window_resize();
    }

    pub fn select_mission(&mut self, id: MissionId) {
        debug!("Selected mission {}", id);
        self.active_mission_id = Some(id);
        self.render_active();
    }

    /// Start a mission list request.
    pub fn start_load(&mut self) -> Ticket {
        self.load_generation += 1;
        self.loading = true;
        self.error = None;
        Ticket(self.load_generation)
    }

    /// Apply a mission list result. Returns `false` if it was stale.
    pub fn finish_load(&mut self, ticket: Ticket, result: Result<Vec<Mission>, ClientError>) -> bool {
        if self.torn_down || ticket.0 != self.load_generation {
            debug!("Ignoring stale mission list (ticket {})", ticket.0);
            return false;
        }

        match result {
            Ok(missions) => {
                info!("Loaded {} missions", missions.len());
                if self.active_mission_id.is_none() {
                    self.active_mission_id = missions.first().map(|mission| mission.id);
                }
                self.missions = missions;
                self.render_active();
            }
            Err(err) => {
                error!("Failed to load missions: {}", err);
                self.error = Some(LOAD_FAILED.to_string());
            }
        }
        self.loading = false;
        true
    }

    pub async fn load_missions<S: MissionSource>(&mut self, source: &S) {
        let ticket = self.start_load();
        let result = source.list_missions().await;
        self.finish_load(ticket, result);
    }

    /// Validate the upload form and start an upload request.
    ///
    /// Returns `None` and sets the form error if the form is incomplete.
    pub fn start_upload(&mut self) -> Option<(Ticket, SelectedFile, String)> {
        let Some(file) = self.upload.file.clone() else {
            self.upload.error = Some("Please select a KML file".to_string());
            return None;
        };
        let name = self.upload.mission_name.trim().to_string();
        if name.is_empty() {
            self.upload.error = Some("Please enter a mission name".to_string());
            return None;
        }

        self.upload_generation += 1;
        self.upload.loading = true;
        self.upload.error = None;
        Some((Ticket(self.upload_generation), file, name))
    }

    /// Apply an upload result. Returns `false` if it was stale.
    pub fn finish_upload(
        &mut self,
        ticket: Ticket,
        result: Result<MissionUpload, ClientError>,
    ) -> bool {
        if self.torn_down || ticket.0 != self.upload_generation {
            debug!("Ignoring stale upload result (ticket {})", ticket.0);
            return false;
        }
        self.upload.loading = false;

        match result {
            Ok(upload) => {
                info!(
                    "Mission {} ({}) created with {} waypoints",
                    upload.mission.id, upload.mission.name, upload.waypoint_count
                );
                self.upload.created = Some(upload.mission.clone());
                self.upload.waypoints = upload.waypoints.clone();

                let mission = upload.into_mission();
                self.active_mission_id = Some(mission.id);
                self.missions.push(mission);
                self.upload_open = false;
                self.render_active();
            }
            Err(err) => {
                error!("Upload failed: {}", err);
                self.upload.error = Some(err.to_string());
            }
        }
        true
    }

    pub async fn upload<S: MissionSource>(&mut self, source: &S) {
        let Some((ticket, file, name)) = self.start_upload() else {
            return;
        };
        let result = source.upload_kml(&file.file_name, file.content, &name).await;
        self.finish_upload(ticket, result);
    }

    /// Leave the page: late results are dropped and the map is disposed.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.map.unmount();
    }

    fn render_active(&mut self) {
        let id = self.active_mission_id;
        let waypoints = id
            .and_then(|id| self.missions.iter().find(|mission| mission.id == id))
            .map(Mission::waypoints)
            .unwrap_or(&[]);
        self.map.show_waypoints(waypoints);
    }
}
