//! Client-side configuration from environment.

use mission_core::map::lifecycle::ACCESS_TOKEN_ENV;
use mission_sdk::DEFAULT_API_BASE_URL;
use std::env;

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub api_base_url: String,
    /// Map access token. Absence is reported by the map, not here.
    pub access_token: Option<String>,
}

impl CliConfig {
    pub fn from_env() -> Self {
        Self {
            api_base_url: env::var("MISSION_API_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            access_token: env::var(ACCESS_TOKEN_ENV).ok(),
        }
    }
}
