//! NMEA sentence generation.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use navtrack_core::coords::Position;

use crate::codec::{checksum, NmeaError};

/// Optional inputs for RMC generation.
///
/// Time and date default to the current UTC instant, speed and course to 0.
#[derive(Debug, Clone, Default)]
pub struct RmcTemplate {
    pub timestamp: Option<DateTime<Utc>>,
    pub date: Option<NaiveDate>,
    /// Speed over ground in knots.
    pub speed_knots: f64,
    /// Course over ground in degrees.
    pub course: f64,
}

/// Generate a complete GPRMC sentence with checksum.
///
/// Layout:
/// `$GPRMC,hhmmss.ss,A,ddmm.mmmm,N|S,dddmm.mmmm,E|W,speed,course,ddmmyy,,,A*CS`
///
/// Coordinates are signed decimal degrees; out-of-range values are
/// rejected before anything is formatted.
pub fn generate_rmc(
    latitude: f64,
    longitude: f64,
    template: &RmcTemplate,
) -> Result<String, NmeaError> {
    let position = Position::from_decimal(latitude, longitude, 0.0)?;

    let now = Utc::now();
    let timestamp = template.timestamp.unwrap_or(now);
    let date = template.date.unwrap_or_else(|| now.date_naive());

    let time_str = format!(
        "{:02}{:02}{:02}.{:02}",
        timestamp.hour(),
        timestamp.minute(),
        timestamp.second(),
        timestamp.timestamp_subsec_micros() / 10_000
    );

    let body = format!(
        "GPRMC,{time},A,{lat},{lat_dir},{lon},{lon_dir},{speed:.1},{course:.1},{date},,,A",
        time = time_str,
        lat = position.latitude.to_nmea_string(),
        lat_dir = position.latitude.hemisphere().as_char(),
        lon = position.longitude.to_nmea_string(),
        lon_dir = position.longitude.hemisphere().as_char(),
        speed = template.speed_knots,
        course = template.course,
        date = date.format("%d%m%y"),
    );

    let cs = checksum(&body);
    Ok(format!("${body}*{cs}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{parse, validate_checksum, validate_format};
    use crate::sentence::Sentence;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generated_sentence_is_valid() {
        let sentence = generate_rmc(48.1234, 11.5678, &RmcTemplate::default()).unwrap();

        assert!(sentence.starts_with("$GPRMC"));
        assert!(validate_format(&sentence));
        assert!(validate_checksum(&sentence));
    }

    #[test]
    fn test_generated_sentence_round_trips() {
        for (lat, lon) in [
            (48.1234, 11.5678),
            (-33.8688, 151.2093),
            (51.4778, -0.0015),
            (0.0, 0.0),
            (89.9999, 179.9999),
        ] {
            let sentence = generate_rmc(lat, lon, &RmcTemplate::default()).unwrap();
            assert!(validate_checksum(&sentence), "{sentence}");

            let info = parse(&sentence)
                .unwrap_or_else(|e| panic!("{sentence}: {e}"))
                .position_info()
                .unwrap();
            assert!((info.latitude - lat).abs() < 1e-4, "{sentence}");
            assert!((info.longitude - lon).abs() < 1e-4, "{sentence}");
        }
    }

    #[test]
    fn test_explicit_time_and_date() {
        let template = RmcTemplate {
            timestamp: Some(Utc.with_ymd_and_hms(2024, 11, 19, 12, 34, 56).unwrap()),
            date: Some(NaiveDate::from_ymd_opt(2024, 11, 19).unwrap()),
            speed_knots: 5.5,
            course: 123.4,
        };
        let sentence = generate_rmc(48.1234, 11.5678, &template).unwrap();

        assert!(sentence.contains("123456.00"));
        assert!(sentence.contains(",191124,"));
        assert!(sentence.contains(",5.5,123.4,"));

        match parse(&sentence).unwrap() {
            Sentence::Rmc(rmc) => {
                assert_eq!(rmc.speed_knots, Some(5.5));
                assert_eq!(rmc.course, Some(123.4));
                assert_eq!(rmc.date, template.date);
            }
            other => panic!("expected RMC, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(generate_rmc(91.0, 11.0, &RmcTemplate::default()).is_err());
        assert!(generate_rmc(48.0, 181.0, &RmcTemplate::default()).is_err());
    }

    #[test]
    fn test_southern_western_hemispheres() {
        let sentence = generate_rmc(-33.8688, -70.6693, &RmcTemplate::default()).unwrap();
        assert!(sentence.contains(",S,"));
        assert!(sentence.contains(",W,"));
    }
}
