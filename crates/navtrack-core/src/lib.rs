//! # navtrack-core
//!
//! Core position data model for the navtrack GPS tracking system.
//!
//! This crate provides:
//! - Coordinate types and degree/minute conversions (NMEA wire format)
//! - Great-circle distance math
//! - The `GpsFix` record type and `Track` analysis container
//! - A bounded, thread-safe fix history with derived motion statistics
//!   and observer fan-out
//! - Configuration types loaded once at startup
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! so it can be used from both the tokio networking layer and plain
//! synchronous tools.

pub mod config;
pub mod coords;
pub mod fix;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use coords::{Coordinate, CoordinateError, Hemisphere, Position};
pub use fix::{GpsFix, Track};
pub use store::{FixSink, FixStore, SinkError, Statistics};
