//! Sentence validation and field parsing.
//!
//! Parsing is split in two layers. [`parse`] is the strict path: structural
//! format check, checksum verification, field decoding and position range
//! validation, each failure reported as a distinct [`NmeaError`] variant.
//! [`safe_parse`] is the recovery boundary used on live network input: any
//! failure is logged and turned into `None`, never a panic or an error that
//! escapes to the receive loop.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use thiserror::Error;
use tracing::warn;

use navtrack_core::coords::{Coordinate, CoordinateError, Hemisphere};

use crate::sentence::{
    GgaData, GllData, GsaData, GsvData, GsvSatellite, RmcData, Sentence, VtgData,
};

/// Sentence types understood by this codec.
pub const SUPPORTED_SENTENCES: [&str; 6] =
    ["GPRMC", "GPGGA", "GPGLL", "GPGSA", "GPGSV", "GPVTG"];

/// Errors raised while validating or decoding a sentence.
#[derive(Debug, Error)]
pub enum NmeaError {
    /// The sentence does not match the `$IDSSS,...*HH` structure.
    #[error("sentence does not match the NMEA format")]
    Format,

    /// The transmitted checksum does not match the computed one.
    #[error("checksum mismatch: expected {expected}, found {found}")]
    Checksum { expected: String, found: String },

    /// The sentence type is not in the supported set.
    #[error("unsupported sentence type '{0}'")]
    Unsupported(String),

    /// A field failed to decode.
    #[error("invalid value '{value}' for field {field}")]
    Field {
        field: &'static str,
        value: String,
    },

    /// A position sentence with missing latitude/longitude fields.
    #[error("latitude/longitude missing from position sentence")]
    MissingPosition,

    /// Coordinate conversion or range failure.
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
}

fn format_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\$[A-Za-z]{2}[A-Za-z]{3},[^*]*\*[0-9A-Fa-f]{2}$")
            .expect("format pattern is valid")
    })
}

/// XOR checksum of a sentence body (the text between `$` and `*`),
/// rendered as two uppercase hex digits.
pub fn checksum(body: &str) -> String {
    let value = body.bytes().fold(0u8, |acc, byte| acc ^ byte);
    format!("{value:02X}")
}

/// Split a sentence into body and transmitted checksum.
///
/// Requires a leading `$` and exactly one `*`.
fn split_checksum(sentence: &str) -> Option<(&str, &str)> {
    let rest = sentence.trim().strip_prefix('$')?;
    let (body, provided) = rest.split_once('*')?;
    if provided.contains('*') {
        return None;
    }
    Some((body, provided))
}

/// Verify the transmitted checksum. Case-insensitive.
pub fn validate_checksum(sentence: &str) -> bool {
    match split_checksum(sentence) {
        Some((body, provided)) => checksum(body).eq_ignore_ascii_case(provided),
        None => {
            warn!(sentence, "sentence missing checksum");
            false
        }
    }
}

/// Structural format check: `$` + 2 letters + 3 letters + `,` + payload
/// without `*` + `*` + 2 hex digits.
pub fn validate_format(sentence: &str) -> bool {
    format_pattern().is_match(sentence.trim())
}

/// The five-character sentence tag after `$`, uppercased.
pub fn sentence_type(sentence: &str) -> Option<String> {
    let rest = sentence.trim().strip_prefix('$')?;
    if rest.len() < 5 || !rest.is_char_boundary(5) {
        return None;
    }
    Some(rest[..5].to_ascii_uppercase())
}

/// Whether the sentence type belongs to the supported GPS family.
pub fn is_supported(sentence: &str) -> bool {
    match sentence_type(sentence) {
        Some(tag) => SUPPORTED_SENTENCES.contains(&tag.as_str()),
        None => false,
    }
}

/// Combined format plus (optional) checksum validation.
pub fn is_valid(sentence: &str, check_checksum: bool) -> bool {
    if !validate_format(sentence) {
        return false;
    }
    !check_checksum || validate_checksum(sentence)
}

/// Strict parse: format, checksum, fields, and position range.
pub fn parse(sentence: &str) -> Result<Sentence, NmeaError> {
    if !validate_format(sentence) {
        return Err(NmeaError::Format);
    }
    let (body, provided) = split_checksum(sentence).ok_or(NmeaError::Format)?;
    let expected = checksum(body);
    if !expected.eq_ignore_ascii_case(provided) {
        return Err(NmeaError::Checksum {
            expected,
            found: provided.to_string(),
        });
    }
    ensure_position_present(decode_body(body)?)
}

/// Field decoding without format/checksum verification.
///
/// Still rejects unsupported sentence types and undecodable field values.
pub fn parse_unchecked(sentence: &str) -> Result<Sentence, NmeaError> {
    let rest = sentence.trim().strip_prefix('$').ok_or(NmeaError::Format)?;
    let body = rest.split('*').next().unwrap_or(rest);
    decode_body(body)
}

/// Recovery boundary for live input.
///
/// With `validate` set, the sentence must pass format and checksum checks.
/// Sentences whose type carries a position must have both coordinates
/// present and in legal range (the range itself is enforced at coordinate
/// construction). Every failure is logged and mapped to `None`.
pub fn safe_parse(sentence: &str, validate: bool) -> Option<Sentence> {
    let result = if validate {
        parse(sentence)
    } else {
        parse_unchecked(sentence).and_then(ensure_position_present)
    };

    match result {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!(%error, sentence, "dropping NMEA sentence");
            None
        }
    }
}

/// Position sentences must actually carry a position.
fn ensure_position_present(parsed: Sentence) -> Result<Sentence, NmeaError> {
    if parsed.exposes_position() && parsed.position_info().is_none() {
        return Err(NmeaError::MissingPosition);
    }
    Ok(parsed)
}

fn decode_body(body: &str) -> Result<Sentence, NmeaError> {
    let fields: Vec<&str> = body.split(',').collect();
    let tag = fields
        .first()
        .copied()
        .unwrap_or_default()
        .to_ascii_uppercase();

    match tag.as_str() {
        "GPRMC" => decode_rmc(&fields),
        "GPGGA" => decode_gga(&fields),
        "GPGLL" => decode_gll(&fields),
        "GPGSA" => decode_gsa(&fields),
        "GPGSV" => decode_gsv(&fields),
        "GPVTG" => decode_vtg(&fields),
        other => Err(NmeaError::Unsupported(other.to_string())),
    }
}

/// A field by index; empty fields read as absent.
fn field<'a>(fields: &[&'a str], index: usize) -> Option<&'a str> {
    fields.get(index).copied().filter(|raw| !raw.is_empty())
}

fn num_field<T: FromStr>(
    fields: &[&str],
    index: usize,
    name: &'static str,
) -> Result<Option<T>, NmeaError> {
    match field(fields, index) {
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| NmeaError::Field {
            field: name,
            value: raw.to_string(),
        }),
        None => Ok(None),
    }
}

fn char_field(fields: &[&str], index: usize) -> Option<char> {
    field(fields, index).and_then(|raw| raw.chars().next())
}

/// Paired value/direction coordinate fields; both must be present.
fn coordinate_field(
    fields: &[&str],
    value_index: usize,
    dir_index: usize,
) -> Result<Option<Coordinate>, NmeaError> {
    match (field(fields, value_index), char_field(fields, dir_index)) {
        (Some(value), Some(dir)) => {
            let hemisphere = Hemisphere::from_char(dir)?;
            Ok(Some(Coordinate::from_nmea(value, hemisphere)?))
        }
        _ => Ok(None),
    }
}

/// `hhmmss` or `hhmmss.sss` UTC time-of-day field.
fn time_field(
    fields: &[&str],
    index: usize,
    name: &'static str,
) -> Result<Option<NaiveTime>, NmeaError> {
    match field(fields, index) {
        Some(raw) => NaiveTime::parse_from_str(raw, "%H%M%S%.f")
            .map(Some)
            .map_err(|_| NmeaError::Field {
                field: name,
                value: raw.to_string(),
            }),
        None => Ok(None),
    }
}

/// `ddmmyy` date field.
fn date_field(
    fields: &[&str],
    index: usize,
    name: &'static str,
) -> Result<Option<NaiveDate>, NmeaError> {
    match field(fields, index) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%d%m%y")
            .map(Some)
            .map_err(|_| NmeaError::Field {
                field: name,
                value: raw.to_string(),
            }),
        None => Ok(None),
    }
}

fn decode_rmc(fields: &[&str]) -> Result<Sentence, NmeaError> {
    Ok(Sentence::Rmc(RmcData {
        time: time_field(fields, 1, "time")?,
        status: char_field(fields, 2),
        latitude: coordinate_field(fields, 3, 4)?,
        longitude: coordinate_field(fields, 5, 6)?,
        speed_knots: num_field(fields, 7, "speed")?,
        course: num_field(fields, 8, "course")?,
        date: date_field(fields, 9, "date")?,
    }))
}

fn decode_gga(fields: &[&str]) -> Result<Sentence, NmeaError> {
    Ok(Sentence::Gga(GgaData {
        time: time_field(fields, 1, "time")?,
        latitude: coordinate_field(fields, 2, 3)?,
        longitude: coordinate_field(fields, 4, 5)?,
        quality: num_field(fields, 6, "quality")?,
        num_satellites: num_field(fields, 7, "num_satellites")?,
        hdop: num_field(fields, 8, "hdop")?,
        altitude: num_field(fields, 9, "altitude")?,
    }))
}

fn decode_gll(fields: &[&str]) -> Result<Sentence, NmeaError> {
    Ok(Sentence::Gll(GllData {
        latitude: coordinate_field(fields, 1, 2)?,
        longitude: coordinate_field(fields, 3, 4)?,
        time: time_field(fields, 5, "time")?,
        status: char_field(fields, 6),
    }))
}

fn decode_gsa(fields: &[&str]) -> Result<Sentence, NmeaError> {
    let mut satellite_ids = Vec::new();
    for index in 3..=14 {
        if let Some(id) = num_field(fields, index, "satellite_id")? {
            satellite_ids.push(id);
        }
    }

    Ok(Sentence::Gsa(GsaData {
        mode: char_field(fields, 1),
        fix_type: num_field(fields, 2, "fix_type")?,
        satellite_ids,
        pdop: num_field(fields, 15, "pdop")?,
        hdop: num_field(fields, 16, "hdop")?,
        vdop: num_field(fields, 17, "vdop")?,
    }))
}

fn decode_gsv(fields: &[&str]) -> Result<Sentence, NmeaError> {
    let mut satellites = Vec::new();
    let mut index = 4;
    while index + 3 < fields.len() {
        satellites.push(GsvSatellite {
            prn: num_field(fields, index, "prn")?,
            elevation: num_field(fields, index + 1, "elevation")?,
            azimuth: num_field(fields, index + 2, "azimuth")?,
            snr: num_field(fields, index + 3, "snr")?,
        });
        index += 4;
    }

    Ok(Sentence::Gsv(GsvData {
        total_messages: num_field(fields, 1, "total_messages")?,
        message_number: num_field(fields, 2, "message_number")?,
        satellites_in_view: num_field(fields, 3, "satellites_in_view")?,
        satellites,
    }))
}

fn decode_vtg(fields: &[&str]) -> Result<Sentence, NmeaError> {
    Ok(Sentence::Vtg(VtgData {
        course_true: num_field(fields, 1, "course_true")?,
        course_magnetic: num_field(fields, 3, "course_magnetic")?,
        speed_knots: num_field(fields, 5, "speed_knots")?,
        speed_kmh: num_field(fields, 7, "speed_kmh")?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VALID_RMC: &str = "$GPRMC,123456.00,A,4807.404,N,01131.324,E,0.0,0.0,191124,,,A*5B";
    const VALID_GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";

    /// Attach a freshly computed checksum to a body.
    fn with_checksum(body: &str) -> String {
        format!("${}*{}", body, checksum(body))
    }

    #[test]
    fn test_checksum_known_value() {
        assert_eq!(checksum("GPRMC,123456.00,A,4807.404,N"), "78");
    }

    #[test]
    fn test_validate_checksum() {
        assert!(validate_checksum(VALID_RMC));
        // Hex digits compare case-insensitively
        assert!(validate_checksum(&VALID_RMC.replace("*5B", "*5b")));
        assert!(!validate_checksum(
            "$GPRMC,123456.00,A,4807.404,N,01131.324,E,0.0,0.0,191124,,,A*FF"
        ));
        assert!(!validate_checksum("$GPRMC,no,checksum,here"));
    }

    #[test]
    fn test_validate_format() {
        assert!(validate_format(VALID_RMC));
        assert!(validate_format(VALID_GGA));
        assert!(validate_format("  $GPGLL,,,,,*7C \n"));

        assert!(!validate_format("GPRMC,123456.00,A*5B"));
        assert!(!validate_format("$GP1MC,123456.00,A*5B"));
        assert!(!validate_format("$GPRMC,12*34*56"));
        assert!(!validate_format("$GPRMC,123456.00,A*5"));
        assert!(!validate_format("$GPRMC,123456.00,A*GG"));
    }

    #[test]
    fn test_sentence_type() {
        assert_eq!(sentence_type(VALID_RMC).as_deref(), Some("GPRMC"));
        assert_eq!(sentence_type("$gpgga,123"), Some("GPGGA".to_string()));
        assert_eq!(sentence_type("no dollar"), None);
        assert_eq!(sentence_type("$GP"), None);
    }

    #[test]
    fn test_is_supported() {
        assert!(is_supported(VALID_RMC));
        assert!(is_supported("$GPVTG,,,,,,,,,N*30"));
        assert!(!is_supported("$GPZDA,160012.71,11,03,2004,-1,00*7D"));
    }

    #[test]
    fn test_parse_rmc() {
        let parsed = parse(VALID_RMC).unwrap();
        let info = parsed.position_info().expect("RMC carries a position");

        assert!((info.latitude - 48.1234).abs() < 1e-4);
        assert!((info.longitude - 11.5221).abs() < 1e-4);
        assert_eq!(info.lat_dir, Hemisphere::North);
        assert_eq!(info.lon_dir, Hemisphere::East);

        match parsed {
            Sentence::Rmc(rmc) => {
                assert_eq!(rmc.status, Some('A'));
                assert_eq!(rmc.speed_knots, Some(0.0));
                assert_eq!(
                    rmc.date,
                    Some(NaiveDate::from_ymd_opt(2024, 11, 19).unwrap())
                );
                assert_eq!(
                    rmc.time,
                    Some(NaiveTime::from_hms_opt(12, 34, 56).unwrap())
                );
            }
            other => panic!("expected RMC, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_gga() {
        let parsed = parse(VALID_GGA).unwrap();
        let info = parsed.position_info().expect("GGA carries a position");

        assert!((info.latitude - 48.1173).abs() < 1e-3);
        assert!((info.longitude - 11.5167).abs() < 1e-3);
        assert_eq!(info.num_satellites, Some(8));
        assert_eq!(info.gps_quality, Some(1));
        assert_eq!(info.altitude, Some(545.4));
    }

    #[test]
    fn test_parse_gll() {
        let sentence = with_checksum("GPGLL,4807.038,N,01131.000,E,123519,A");
        let parsed = parse(&sentence).unwrap();
        let info = parsed.position_info().unwrap();
        assert!((info.latitude - 48.1173).abs() < 1e-3);
        assert_eq!(info.altitude, None);
    }

    #[test]
    fn test_parse_gsa_and_gsv_carry_no_position() {
        let gsa = with_checksum("GPGSA,A,3,04,05,,09,12,,,24,,,,,2.5,1.3,2.1");
        let parsed = parse(&gsa).unwrap();
        assert!(parsed.position_info().is_none());
        match parsed {
            Sentence::Gsa(data) => {
                assert_eq!(data.mode, Some('A'));
                assert_eq!(data.fix_type, Some(3));
                assert_eq!(data.satellite_ids, vec![4, 5, 9, 12, 24]);
                assert_eq!(data.hdop, Some(1.3));
            }
            other => panic!("expected GSA, got {other:?}"),
        }

        let gsv = with_checksum("GPGSV,2,1,08,01,40,083,46,02,17,308,41,12,07,344,39,14,22,228,45");
        let parsed = parse(&gsv).unwrap();
        assert!(parsed.position_info().is_none());
        match parsed {
            Sentence::Gsv(data) => {
                assert_eq!(data.satellites_in_view, Some(8));
                assert_eq!(data.satellites.len(), 4);
                assert_eq!(data.satellites[0].prn, Some(1));
                assert_eq!(data.satellites[3].snr, Some(45));
            }
            other => panic!("expected GSV, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_vtg() {
        let sentence = with_checksum("GPVTG,089.0,T,,,15.2,N,,,A");
        match parse(&sentence).unwrap() {
            Sentence::Vtg(data) => {
                assert_eq!(data.course_true, Some(89.0));
                assert_eq!(data.speed_knots, Some(15.2));
                assert_eq!(data.speed_kmh, None);
            }
            other => panic!("expected VTG, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        let err = parse("$GPRMC,123456.00,A,4807.404,N,01131.324,E,0.0,0.0,191124,,,A*FF")
            .unwrap_err();
        assert!(matches!(err, NmeaError::Checksum { .. }));
    }

    #[test]
    fn test_parse_rejects_unsupported_type() {
        let sentence = with_checksum("GPZDA,160012.71,11,03,2004,-1,00");
        assert!(matches!(
            parse(&sentence).unwrap_err(),
            NmeaError::Unsupported(_)
        ));
    }

    #[test]
    fn test_parse_rejects_bad_field() {
        let sentence = with_checksum("GPRMC,123456.00,A,4807.404,N,01131.324,E,fast,0.0,191124,,,A");
        assert!(matches!(
            parse(&sentence).unwrap_err(),
            NmeaError::Field { field: "speed", .. }
        ));
    }

    #[test]
    fn test_safe_parse_valid() {
        assert!(safe_parse(VALID_RMC, true).is_some());
    }

    #[test]
    fn test_safe_parse_drops_bad_checksum() {
        let sentence = "$GPRMC,123456.00,A,4807.404,N,01131.324,E,0.0,0.0,191124,,,A*FF";
        assert!(safe_parse(sentence, true).is_none());
        // Without validation the fields still decode
        assert!(safe_parse(sentence, false).is_some());
    }

    #[test]
    fn test_safe_parse_drops_out_of_range_latitude() {
        // 91°07.404' exceeds the legal latitude range
        let sentence =
            with_checksum("GPRMC,123456.00,A,9107.404,N,01131.324,E,0.0,0.0,191124,,,A");
        assert!(safe_parse(&sentence, true).is_none());
        assert!(safe_parse(&sentence, false).is_none());
    }

    #[test]
    fn test_safe_parse_drops_position_sentence_without_position() {
        let sentence = with_checksum("GPGLL,,,,,123519,V");
        assert!(safe_parse(&sentence, true).is_none());
    }

    #[test]
    fn test_safe_parse_never_panics_on_garbage() {
        for garbage in ["", "$", "$*", "hello world", "$GPRMC", "$GPRMC,*zz", "\u{fffd}"] {
            assert!(safe_parse(garbage, true).is_none());
        }
    }
}
