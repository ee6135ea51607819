//! GPS fix records and track analysis.
//!
//! A [`GpsFix`] is the unit stored in history: signed decimal latitude and
//! longitude (no hemisphere wrapping), plus whatever optional data the
//! receiver reported alongside. A [`Track`] is an unbounded, independently
//! owned sequence of fixes used for after-the-fact analysis of a recording.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coords::haversine;

/// Mean Earth radius in metres, used for fix-to-fix distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A single decoded GPS position reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    /// Latitude in signed decimal degrees.
    pub latitude: f64,
    /// Longitude in signed decimal degrees.
    pub longitude: f64,
    /// Altitude in metres above sea level.
    pub altitude: f64,
    /// Time the reading was taken.
    pub timestamp: DateTime<Utc>,
    /// Speed in m/s, when reported or derived.
    pub speed: Option<f64>,
    /// Course over ground in degrees, when reported.
    pub course: Option<f64>,
    /// Number of satellites used in the fix, when reported.
    pub satellites: Option<u32>,
    /// GPS fix quality indicator, when reported.
    pub quality: Option<u32>,
}

impl GpsFix {
    /// Create a fix with the given coordinates, timestamped now.
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self::at(latitude, longitude, altitude, Utc::now())
    }

    /// Create a fix with an explicit timestamp.
    pub fn at(latitude: f64, longitude: f64, altitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            timestamp,
            speed: None,
            course: None,
            satellites: None,
            quality: None,
        }
    }

    /// Great-circle distance to another fix in metres.
    ///
    /// Uses the Haversine formula with a mean Earth radius of 6 371 000 m.
    /// Position-to-position distances use the kilometre-based variant in
    /// [`crate::coords`]; the two scales are deliberately separate.
    pub fn distance_to(&self, other: &GpsFix) -> f64 {
        haversine(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
            EARTH_RADIUS_M,
        )
    }
}

/// Bounding box of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// An unbounded sequence of fixes with analysis helpers.
///
/// Unlike the live store, a track has no capacity bound and no observers;
/// it is a snapshot object for computing statistics over a recording.
#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub fixes: Vec<GpsFix>,
    pub created_at: DateTime<Utc>,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Build a track directly from recorded fixes.
    pub fn from_fixes(name: impl Into<String>, fixes: Vec<GpsFix>) -> Self {
        Self {
            name: name.into(),
            fixes,
            created_at: Utc::now(),
        }
    }

    pub fn add_fix(&mut self, fix: GpsFix) {
        self.fixes.push(fix);
    }

    /// Sum of leg distances in metres.
    pub fn total_distance(&self) -> f64 {
        self.fixes
            .windows(2)
            .map(|pair| pair[0].distance_to(&pair[1]))
            .sum()
    }

    /// Wall-clock span between the first and last fix, in seconds.
    pub fn duration_seconds(&self) -> f64 {
        match (self.fixes.first(), self.fixes.last()) {
            (Some(first), Some(last)) if self.fixes.len() >= 2 => {
                (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0
            }
            _ => 0.0,
        }
    }

    /// Average speed over the whole track in m/s, 0 for degenerate tracks.
    pub fn average_speed(&self) -> f64 {
        let duration = self.duration_seconds();
        if duration == 0.0 {
            return 0.0;
        }
        self.total_distance() / duration
    }

    /// Bounding box of the track; all zeros when the track is empty.
    pub fn bounds(&self) -> TrackBounds {
        if self.fixes.is_empty() {
            return TrackBounds {
                min_lat: 0.0,
                max_lat: 0.0,
                min_lon: 0.0,
                max_lon: 0.0,
            };
        }

        let mut bounds = TrackBounds {
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
            min_lon: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
        };
        for fix in &self.fixes {
            bounds.min_lat = bounds.min_lat.min(fix.latitude);
            bounds.max_lat = bounds.max_lat.max(fix.latitude);
            bounds.min_lon = bounds.min_lon.min(fix.longitude);
            bounds.max_lon = bounds.max_lon.max(fix.longitude);
        }
        bounds
    }
}
