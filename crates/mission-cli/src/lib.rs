//! Mission CLI - headless dashboard for drone missions.
//!
//! - `dashboard`: mission list, active mission, upload form and the map view
//! - `source`: where the dashboard gets its missions from
//! - `mission` binary: list, upload, show and parse commands

pub mod config;
pub mod dashboard;
pub mod source;

pub use config::CliConfig;
pub use dashboard::{Dashboard, SelectedFile, Ticket, UploadForm};
pub use source::MissionSource;
