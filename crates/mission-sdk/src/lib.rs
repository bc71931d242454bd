//! Mission SDK - client for the mission REST backend.
//!
//! Wraps the `/api/missions` endpoints: listing, KML upload, updates,
//! annotations and no-fly zones.

pub mod client;

pub use client::{ClientError, MissionClient, DEFAULT_API_BASE_URL};
