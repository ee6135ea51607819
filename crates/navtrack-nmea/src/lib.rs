//! # navtrack-nmea
//!
//! NMEA-0183 sentence codec.
//!
//! NMEA sentences are short comma-delimited ASCII records framed as
//! `$IDSSS,field1,...,fieldN*HH`, where `ID` is a two-letter talker id,
//! `SSS` a three-letter sentence type and `HH` the XOR checksum of every
//! byte between `$` and `*`. This crate provides:
//! - Checksum calculation and verification
//! - Structural format validation
//! - Typed field parsing for the GPS sentence family (RMC, GGA, GLL,
//!   GSA, GSV, VTG)
//! - Position extraction from parsed sentences
//! - RMC sentence generation
//!
//! All functions are stateless. Malformed input never panics or escapes
//! [`codec::safe_parse`]; it yields `None` plus a logged diagnostic.

pub mod codec;
pub mod generate;
pub mod sentence;

pub use codec::{
    checksum, is_supported, is_valid, parse, parse_unchecked, safe_parse, sentence_type,
    validate_checksum, validate_format, NmeaError,
};
pub use generate::{generate_rmc, RmcTemplate};
pub use sentence::{
    GgaData, GllData, GsaData, GsvData, GsvSatellite, PositionInfo, RmcData, Sentence, VtgData,
};
