//! Server configuration from environment.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_path: String,
    pub database_max_connections: u32,
    /// Largest accepted request body, KML uploads included.
    pub max_upload_bytes: usize,
    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: env::var("MISSION_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5000),
            database_path: env::var("MISSION_DATABASE_PATH")
                .unwrap_or_else(|_| "data/missions.db".to_string()),
            database_max_connections: env::var("MISSION_DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            max_upload_bytes: env::var("MISSION_MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16 * 1024 * 1024),
            log_json: env::var("MISSION_LOG_JSON")
                .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}
