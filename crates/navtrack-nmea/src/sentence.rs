//! Typed data for the supported NMEA sentence family.

use chrono::{NaiveDate, NaiveTime};
use navtrack_core::coords::{Coordinate, Hemisphere};

/// RMC - Recommended Minimum Specific GPS/Transit Data.
#[derive(Debug, Clone, PartialEq)]
pub struct RmcData {
    pub time: Option<NaiveTime>,
    /// 'A' = active, 'V' = void.
    pub status: Option<char>,
    pub latitude: Option<Coordinate>,
    pub longitude: Option<Coordinate>,
    pub speed_knots: Option<f64>,
    pub course: Option<f64>,
    pub date: Option<NaiveDate>,
}

/// GGA - Global Positioning System Fix Data.
#[derive(Debug, Clone, PartialEq)]
pub struct GgaData {
    pub time: Option<NaiveTime>,
    pub latitude: Option<Coordinate>,
    pub longitude: Option<Coordinate>,
    /// Fix quality indicator (0 = invalid, 1 = GPS, 2 = DGPS, ...).
    pub quality: Option<u32>,
    pub num_satellites: Option<u32>,
    pub hdop: Option<f64>,
    /// Antenna altitude above mean sea level, metres.
    pub altitude: Option<f64>,
}

/// GLL - Geographic Position, Latitude/Longitude.
#[derive(Debug, Clone, PartialEq)]
pub struct GllData {
    pub latitude: Option<Coordinate>,
    pub longitude: Option<Coordinate>,
    pub time: Option<NaiveTime>,
    pub status: Option<char>,
}

/// GSA - GPS DOP and Active Satellites.
#[derive(Debug, Clone, PartialEq)]
pub struct GsaData {
    /// 'M' = manual, 'A' = automatic 2D/3D selection.
    pub mode: Option<char>,
    /// 1 = no fix, 2 = 2D, 3 = 3D.
    pub fix_type: Option<u32>,
    pub satellite_ids: Vec<u32>,
    pub pdop: Option<f64>,
    pub hdop: Option<f64>,
    pub vdop: Option<f64>,
}

/// One satellite block within a GSV sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct GsvSatellite {
    pub prn: Option<u32>,
    pub elevation: Option<u32>,
    pub azimuth: Option<u32>,
    pub snr: Option<u32>,
}

/// GSV - GPS Satellites in View.
#[derive(Debug, Clone, PartialEq)]
pub struct GsvData {
    pub total_messages: Option<u32>,
    pub message_number: Option<u32>,
    pub satellites_in_view: Option<u32>,
    pub satellites: Vec<GsvSatellite>,
}

/// VTG - Track Made Good and Ground Speed.
#[derive(Debug, Clone, PartialEq)]
pub struct VtgData {
    pub course_true: Option<f64>,
    pub course_magnetic: Option<f64>,
    pub speed_knots: Option<f64>,
    pub speed_kmh: Option<f64>,
}

/// A parsed NMEA sentence.
#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    Rmc(RmcData),
    Gga(GgaData),
    Gll(GllData),
    Gsa(GsaData),
    Gsv(GsvData),
    Vtg(VtgData),
}

/// Position data extracted from a sentence that carries one.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionInfo {
    /// Signed decimal latitude.
    pub latitude: f64,
    /// Signed decimal longitude.
    pub longitude: f64,
    pub lat_dir: Hemisphere,
    pub lon_dir: Hemisphere,
    pub timestamp: Option<NaiveTime>,
    pub altitude: Option<f64>,
    pub num_satellites: Option<u32>,
    pub gps_quality: Option<u32>,
}

impl Sentence {
    /// The five-letter sentence tag (e.g. `GPRMC`).
    pub fn tag(&self) -> &'static str {
        match self {
            Sentence::Rmc(_) => "GPRMC",
            Sentence::Gga(_) => "GPGGA",
            Sentence::Gll(_) => "GPGLL",
            Sentence::Gsa(_) => "GPGSA",
            Sentence::Gsv(_) => "GPGSV",
            Sentence::Vtg(_) => "GPVTG",
        }
    }

    /// Whether this sentence type carries latitude/longitude fields.
    pub fn exposes_position(&self) -> bool {
        matches!(self, Sentence::Rmc(_) | Sentence::Gga(_) | Sentence::Gll(_))
    }

    /// Extract the position carried by this sentence.
    ///
    /// Returns `None` for sentence types without position fields, and for
    /// position sentences whose latitude or longitude field was empty.
    pub fn position_info(&self) -> Option<PositionInfo> {
        let (latitude, longitude, timestamp, altitude, num_satellites, gps_quality) = match self {
            Sentence::Rmc(rmc) => (rmc.latitude?, rmc.longitude?, rmc.time, None, None, None),
            Sentence::Gga(gga) => (
                gga.latitude?,
                gga.longitude?,
                gga.time,
                gga.altitude,
                gga.num_satellites,
                gga.quality,
            ),
            Sentence::Gll(gll) => (gll.latitude?, gll.longitude?, gll.time, None, None, None),
            _ => return None,
        };

        Some(PositionInfo {
            latitude: latitude.signed_decimal(),
            longitude: longitude.signed_decimal(),
            lat_dir: latitude.hemisphere(),
            lon_dir: longitude.hemisphere(),
            timestamp,
            altitude,
            num_satellites,
            gps_quality,
        })
    }
}
