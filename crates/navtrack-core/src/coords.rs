//! Coordinate types and conversions.
//!
//! NMEA-0183 transmits coordinates in a packed degree/minute format
//! (`DDMM.MMMM` for latitude, `DDDMM.MMMM` for longitude) together with a
//! hemisphere letter. This module provides the value types that move between
//! that wire format and signed decimal degrees, plus great-circle distance
//! math between positions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius in kilometres, used for position-to-position distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Errors raised when constructing or converting coordinates.
#[derive(Debug, Error)]
pub enum CoordinateError {
    /// The value exceeds the legal range for its axis.
    #[error("{axis} {value} exceeds valid range [-{limit}, {limit}]")]
    OutOfRange {
        axis: &'static str,
        value: f64,
        limit: f64,
    },

    /// The hemisphere letter is not one of N, S, E, W.
    #[error("invalid hemisphere '{0}', must be N, S, E or W")]
    InvalidHemisphere(char),

    /// The NMEA degree/minute string could not be parsed as a number.
    #[error("invalid NMEA coordinate value '{0}'")]
    InvalidNmea(String),
}

/// Hemisphere indicator establishing the sign of a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    /// Parse a single NMEA direction letter.
    pub fn from_char(c: char) -> Result<Self, CoordinateError> {
        match c.to_ascii_uppercase() {
            'N' => Ok(Hemisphere::North),
            'S' => Ok(Hemisphere::South),
            'E' => Ok(Hemisphere::East),
            'W' => Ok(Hemisphere::West),
            other => Err(CoordinateError::InvalidHemisphere(other)),
        }
    }

    /// The NMEA direction letter.
    pub fn as_char(&self) -> char {
        match self {
            Hemisphere::North => 'N',
            Hemisphere::South => 'S',
            Hemisphere::East => 'E',
            Hemisphere::West => 'W',
        }
    }

    /// True for N/S (latitude axis), false for E/W (longitude axis).
    pub fn is_latitudinal(&self) -> bool {
        matches!(self, Hemisphere::North | Hemisphere::South)
    }

    /// Sign applied to the decimal value: -1.0 for S/W, +1.0 for N/E.
    pub fn sign(&self) -> f64 {
        match self {
            Hemisphere::South | Hemisphere::West => -1.0,
            _ => 1.0,
        }
    }

    fn limit(&self) -> f64 {
        if self.is_latitudinal() {
            90.0
        } else {
            180.0
        }
    }

    fn axis(&self) -> &'static str {
        if self.is_latitudinal() {
            "latitude"
        } else {
            "longitude"
        }
    }
}

impl std::fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A single validated coordinate (latitude or longitude).
///
/// Immutable once constructed; the magnitude is guaranteed to be within the
/// legal range for its hemisphere's axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    decimal_degrees: f64,
    hemisphere: Hemisphere,
}

impl Coordinate {
    /// Create a coordinate from an unsigned decimal-degree magnitude.
    ///
    /// Fails when |degrees| exceeds 90 for N/S or 180 for E/W.
    pub fn new(decimal_degrees: f64, hemisphere: Hemisphere) -> Result<Self, CoordinateError> {
        let limit = hemisphere.limit();
        if decimal_degrees.abs() > limit || !decimal_degrees.is_finite() {
            return Err(CoordinateError::OutOfRange {
                axis: hemisphere.axis(),
                value: decimal_degrees,
                limit,
            });
        }
        Ok(Self {
            decimal_degrees: decimal_degrees.abs(),
            hemisphere,
        })
    }

    /// Create a coordinate from the NMEA degree/minute format.
    ///
    /// The packed value is `DDMM.MMMM` (or `DDDMM.MMMM` for longitudes):
    /// everything above the hundreds place is whole degrees, the remainder
    /// is decimal minutes.
    pub fn from_nmea(nmea_value: &str, hemisphere: Hemisphere) -> Result<Self, CoordinateError> {
        let value: f64 = nmea_value
            .trim()
            .parse()
            .map_err(|_| CoordinateError::InvalidNmea(nmea_value.to_string()))?;

        let degrees = (value / 100.0).trunc();
        let minutes = value - degrees * 100.0;
        let decimal = degrees + minutes / 60.0;

        Self::new(decimal, hemisphere)
    }

    /// The unsigned decimal-degree magnitude.
    pub fn decimal_degrees(&self) -> f64 {
        self.decimal_degrees
    }

    /// The hemisphere indicator.
    pub fn hemisphere(&self) -> Hemisphere {
        self.hemisphere
    }

    /// The packed degree/minute value (`DDDMM.MMMM` as a float).
    pub fn degrees_minutes(&self) -> f64 {
        let degrees = self.decimal_degrees.trunc();
        let minutes = (self.decimal_degrees - degrees) * 60.0;
        degrees * 100.0 + minutes
    }

    /// Degrees, minutes and seconds components.
    pub fn degrees_minutes_seconds(&self) -> (u32, u32, f64) {
        let (degrees, minutes, seconds) = decimal_to_dms(self.decimal_degrees);
        (degrees, minutes, seconds)
    }

    /// Signed decimal degrees: negative for the S/W hemispheres.
    pub fn signed_decimal(&self) -> f64 {
        self.hemisphere.sign() * self.decimal_degrees
    }

    /// Format as a zero-padded NMEA coordinate string.
    ///
    /// Latitudes render as `DDMM.MMMM`, longitudes as `DDDMM.MMMM`, both
    /// with four decimal places of minutes.
    pub fn to_nmea_string(&self) -> String {
        let degrees = self.decimal_degrees.trunc() as u32;
        let minutes = (self.decimal_degrees - self.decimal_degrees.trunc()) * 60.0;
        if self.hemisphere.is_latitudinal() {
            format!("{:02}{:07.4}", degrees, minutes)
        } else {
            format!("{:03}{:07.4}", degrees, minutes)
        }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (d, m, s) = self.degrees_minutes_seconds();
        write!(f, "{}° {}' {:.3}\" {}", d, m, s, self.hemisphere)
    }
}

/// A geographic position: validated latitude/longitude plus altitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: Coordinate,
    pub longitude: Coordinate,
    pub altitude: f64,
}

impl Position {
    /// Build a position from signed decimal degrees.
    pub fn from_decimal(lat: f64, lon: f64, altitude: f64) -> Result<Self, CoordinateError> {
        let lat_hem = if lat >= 0.0 {
            Hemisphere::North
        } else {
            Hemisphere::South
        };
        let lon_hem = if lon >= 0.0 {
            Hemisphere::East
        } else {
            Hemisphere::West
        };

        Ok(Self {
            latitude: Coordinate::new(lat.abs(), lat_hem)?,
            longitude: Coordinate::new(lon.abs(), lon_hem)?,
            altitude,
        })
    }

    /// Build a position from NMEA-formatted coordinate strings.
    pub fn from_nmea(
        lat_str: &str,
        lat_dir: Hemisphere,
        lon_str: &str,
        lon_dir: Hemisphere,
        altitude: f64,
    ) -> Result<Self, CoordinateError> {
        Ok(Self {
            latitude: Coordinate::from_nmea(lat_str, lat_dir)?,
            longitude: Coordinate::from_nmea(lon_str, lon_dir)?,
            altitude,
        })
    }

    /// The position as (signed latitude, signed longitude, altitude).
    pub fn to_decimal_tuple(&self) -> (f64, f64, f64) {
        (
            self.latitude.signed_decimal(),
            self.longitude.signed_decimal(),
            self.altitude,
        )
    }

    /// Great-circle distance to another position in kilometres.
    ///
    /// Uses the Haversine formula with a mean Earth radius of 6371 km.
    /// Fix-to-fix distances use the metre-based variant in [`crate::fix`];
    /// the two scales are deliberately separate.
    pub fn distance_to(&self, other: &Position) -> f64 {
        haversine(
            self.latitude.signed_decimal(),
            self.longitude.signed_decimal(),
            other.latitude.signed_decimal(),
            other.longitude.signed_decimal(),
            EARTH_RADIUS_KM,
        )
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Position({}, {}, {}m)",
            self.latitude, self.longitude, self.altitude
        )
    }
}

/// Haversine great-circle distance between two signed lat/lon pairs,
/// in the same unit as the supplied radius.
pub(crate) fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64, radius: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    radius * c
}

/// Convert decimal degrees to (degrees, minutes, seconds).
pub fn decimal_to_dms(decimal: f64) -> (u32, u32, f64) {
    let abs = decimal.abs();
    let degrees = abs.trunc();
    let remaining = (abs - degrees) * 60.0;
    let minutes = remaining.trunc();
    let seconds = (remaining - minutes) * 60.0;
    (degrees as u32, minutes as u32, seconds)
}

/// Convert (degrees, minutes, seconds) to decimal degrees.
pub fn dms_to_decimal(degrees: u32, minutes: u32, seconds: f64) -> f64 {
    degrees as f64 + minutes as f64 / 60.0 + seconds / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_coordinate_creation() {
        let lat = Coordinate::new(48.1234, Hemisphere::North).unwrap();
        assert_eq!(lat.decimal_degrees(), 48.1234);
        assert_eq!(lat.hemisphere(), Hemisphere::North);
    }

    #[test]
    fn test_latitude_range_validation() {
        assert!(Coordinate::new(90.0, Hemisphere::North).is_ok());
        assert!(Coordinate::new(0.0, Hemisphere::North).is_ok());
        assert!(Coordinate::new(45.0, Hemisphere::South).is_ok());

        assert!(Coordinate::new(91.0, Hemisphere::North).is_err());
        assert!(Coordinate::new(90.0001, Hemisphere::South).is_err());
    }

    #[test]
    fn test_longitude_range_validation() {
        assert!(Coordinate::new(180.0, Hemisphere::East).is_ok());
        assert!(Coordinate::new(90.0, Hemisphere::West).is_ok());

        assert!(Coordinate::new(181.0, Hemisphere::East).is_err());
    }

    #[test]
    fn test_hemisphere_letters() {
        assert_eq!(Hemisphere::from_char('n').unwrap(), Hemisphere::North);
        assert_eq!(Hemisphere::from_char('W').unwrap(), Hemisphere::West);
        assert!(Hemisphere::from_char('X').is_err());
    }

    #[test]
    fn test_from_nmea() {
        // 48°07.404' = 48.1234°
        let lat = Coordinate::from_nmea("4807.404", Hemisphere::North).unwrap();
        assert!((lat.decimal_degrees() - 48.1234).abs() < 1e-4);

        // 11°31.324' = 11.5221°
        let lon = Coordinate::from_nmea("01131.324", Hemisphere::East).unwrap();
        assert!((lon.decimal_degrees() - 11.5221).abs() < 1e-4);
    }

    #[test]
    fn test_from_nmea_rejects_garbage() {
        assert!(Coordinate::from_nmea("48o7.404", Hemisphere::North).is_err());
        assert!(Coordinate::from_nmea("", Hemisphere::North).is_err());
    }

    #[test]
    fn test_degrees_minutes() {
        let lat = Coordinate::new(48.1234, Hemisphere::North).unwrap();
        let expected = 48.0 * 100.0 + 0.1234 * 60.0;
        assert!((lat.degrees_minutes() - expected).abs() < 0.01);
    }

    #[test]
    fn test_signed_decimal() {
        assert_eq!(
            Coordinate::new(48.0, Hemisphere::North).unwrap().signed_decimal(),
            48.0
        );
        assert_eq!(
            Coordinate::new(48.0, Hemisphere::South).unwrap().signed_decimal(),
            -48.0
        );
        assert_eq!(
            Coordinate::new(11.0, Hemisphere::East).unwrap().signed_decimal(),
            11.0
        );
        assert_eq!(
            Coordinate::new(11.0, Hemisphere::West).unwrap().signed_decimal(),
            -11.0
        );
    }

    #[test]
    fn test_nmea_round_trip() {
        for (value, hemisphere) in [
            ("4807.4040", Hemisphere::North),
            ("0047.1234", Hemisphere::South),
            ("01131.3240", Hemisphere::East),
            ("17959.9999", Hemisphere::West),
        ] {
            let coord = Coordinate::from_nmea(value, hemisphere).unwrap();
            let rendered = coord.to_nmea_string();
            let back = Coordinate::from_nmea(&rendered, hemisphere).unwrap();
            assert!(
                (coord.decimal_degrees() - back.decimal_degrees()).abs() < 1e-4,
                "{value} -> {rendered} drifted"
            );
        }
    }

    #[test]
    fn test_nmea_string_padding() {
        let lat = Coordinate::new(8.1234, Hemisphere::North).unwrap();
        let rendered = lat.to_nmea_string();
        assert_eq!(rendered.len(), 9, "lat format is DDMM.MMMM: {rendered}");

        let lon = Coordinate::new(8.1234, Hemisphere::East).unwrap();
        let rendered = lon.to_nmea_string();
        assert_eq!(rendered.len(), 10, "lon format is DDDMM.MMMM: {rendered}");
        assert!(rendered.starts_with("008"));
    }

    #[test]
    fn test_position_from_decimal() {
        let pos = Position::from_decimal(48.1234, -11.5678, 100.0).unwrap();
        assert_eq!(pos.latitude.hemisphere(), Hemisphere::North);
        assert_eq!(pos.longitude.hemisphere(), Hemisphere::West);
        assert_eq!(pos.to_decimal_tuple(), (48.1234, -11.5678, 100.0));
    }

    #[test]
    fn test_position_distance_km() {
        let a = Position::from_decimal(48.0, 11.0, 0.0).unwrap();
        let b = Position::from_decimal(48.1, 11.0, 0.0).unwrap();

        // 0.1° of latitude is roughly 11.1 km
        let distance = a.distance_to(&b);
        assert!((10.0..12.0).contains(&distance), "got {distance} km");
    }

    #[test]
    fn test_distance_symmetry_and_identity() {
        let a = Position::from_decimal(48.0, 11.0, 0.0).unwrap();
        let b = Position::from_decimal(52.5, 13.4, 0.0).unwrap();

        assert_eq!(a.distance_to(&b), b.distance_to(&a));
        assert_eq!(a.distance_to(&a), 0.0);
    }

    #[test]
    fn test_dms_conversions() {
        let (d, m, s) = decimal_to_dms(48.1234);
        assert_eq!(d, 48);
        assert_eq!(m, 7);
        assert!((s - 24.24).abs() < 1.0);

        let decimal = dms_to_decimal(48, 7, 24.24);
        assert!((decimal - 48.1234).abs() < 1e-4);
    }
}
