// Data structures for the compact GNSS format

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::constants::*;

/// One decoded GNSS fix.
///
/// Units follow the on-disk layout: hdop x 100, unix seconds (UTC), mm/s,
/// degrees x 10^7 for positions and degrees x 10^5 for course over ground.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub flags: u8,
    pub hdop: u16,
    pub timestamp: i64,
    pub speed: u32,
    pub speed_error: u32,
    pub latitude: i32,
    pub longitude: i32,
    pub course: u32,
    pub satellites: u8,
    pub fix: u8,
}

impl Sample {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    pub fn fix_quality(&self) -> FixQuality {
        FixQuality::from_u8(self.fix)
    }

    pub fn latitude_degrees(&self) -> f64 {
        self.latitude as f64 / 1e7
    }

    pub fn longitude_degrees(&self) -> f64 {
        self.longitude as f64 / 1e7
    }

    /// Course with the precision a compressed record can carry.
    pub fn course_truncated(&self) -> u32 {
        self.course / COURSE_COMPRESSION_DIVISOR * COURSE_COMPRESSION_DIVISOR
    }
}

// u-blox fix type convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixQuality {
    NoFix,
    Fix2D,
    Fix3D,
    Other(u8),
}

impl FixQuality {
    pub fn from_u8(val: u8) -> Self {
        match val {
            0 => FixQuality::NoFix,
            2 => FixQuality::Fix2D,
            3 => FixQuality::Fix3D,
            other => FixQuality::Other(other),
        }
    }
}

impl std::fmt::Display for FixQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixQuality::NoFix => write!(f, "no fix"),
            FixQuality::Fix2D => write!(f, "2D"),
            FixQuality::Fix3D => write!(f, "3D"),
            FixQuality::Other(val) => write!(f, "type {}", val),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub flags: u8,
    pub device_type: DeviceType,
    /// e.g. "Locosys GT-31"
    pub device_description: String,
    /// Nickname, settable by the user
    pub device_name: String,
    /// MAC address for ESP loggers
    pub serial_number: String,
    pub firmware_version: String,
}

impl FileHeader {
    pub fn new(
        device_type: DeviceType,
        device_description: impl Into<String>,
        device_name: impl Into<String>,
        serial_number: impl Into<String>,
        firmware_version: impl Into<String>,
    ) -> Self {
        Self {
            flags: 0,
            device_type,
            device_description: device_description.into(),
            device_name: device_name.into(),
            serial_number: serial_number.into(),
            firmware_version: firmware_version.into(),
        }
    }
}

/// Delta record: absolute hdop/sats/fix plus signed differences to the
/// active reference. Course is stored as a delta of `course / 1000`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressedRecord {
    pub flags: u8,
    pub hdop: u16,
    pub time_delta: i16,
    pub speed_delta: i16,
    pub speed_error_delta: i16,
    pub latitude_delta: i16,
    pub longitude_delta: i16,
    pub course_delta: i16,
    pub satellites: u8,
    pub fix: u8,
}

/// A record of a type this crate does not interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRecord {
    pub record_type: u8,
    pub flags: u8,
    /// Bytes between the length field and the checksum.
    pub payload: Vec<u8>,
}

impl UnknownRecord {
    pub fn encoded_len(&self) -> usize {
        VARIABLE_HEADER_SIZE + self.payload.len() + CHECKSUM_SIZE
    }
}

/// Every record kind that can appear in a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    FileHeader(FileHeader),
    Minimal(Sample),
    Compressed(CompressedRecord),
    Unknown(UnknownRecord),
}

/// Counters collected while reading one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStats {
    /// Records after the file header, including the ones that were not used
    pub total_records: usize,
    pub samples: usize,
    pub checksum_errors: usize,
    /// Compressed records dropped because no valid reference preceded them
    pub orphaned_compressed: usize,
    pub unknown_records: usize,
    /// Problems counted but not kept in the problem list
    pub problems_omitted: usize,
}

impl ReadStats {
    pub fn problem_count(&self) -> usize {
        self.checksum_errors + self.orphaned_compressed
    }
}

impl std::fmt::Display for ReadStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Records:             {}", self.total_records)?;
        writeln!(f, "Samples:             {}", self.samples)?;
        writeln!(f, "Checksum errors:     {}", self.checksum_errors)?;
        writeln!(f, "Without reference:   {}", self.orphaned_compressed)?;
        write!(f, "Unknown records:     {}", self.unknown_records)
    }
}

/// Everything recovered from one file.
#[derive(Debug, Clone, Serialize)]
pub struct TrackLog {
    pub header: FileHeader,
    pub stats: ReadStats,
    pub problems: Vec<String>,
    pub samples: Vec<Sample>,
}

impl TrackLog {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn time_range(&self) -> Option<(i64, i64)> {
        let first = self.samples.first()?;
        let last = self.samples.last()?;
        Some((first.timestamp, last.timestamp))
    }
}
