//! Persistence layer for the mission server.
//!
//! SQLite-backed storage for missions, their waypoints, annotations and
//! no-fly zones.

pub mod db;
pub mod missions;

pub use db::{init_database, Database};
