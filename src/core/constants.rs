// Format constants for compact GNSS (.gpy) files

// Record type tags
pub const FILE_HEADER: u8 = 0xF0;
pub const MINIMAL_DATA: u8 = 0xE0;
pub const COMPRESSED_MINIMAL: u8 = 0xD0;

// Every record ends with the two checksum bytes (a, b)
pub const CHECKSUM_SIZE: usize = 2;

// type(1) + flags(1) + length(u16)
pub const VARIABLE_HEADER_SIZE: usize = 4;

// type, flags, length, >= 2 bytes payload, checksum
pub const MINIMUM_RECORD_LENGTH: usize = 8;

// Fixed header string slots are NUL padded / truncated to this many bytes
pub const STRING_IO_LENGTH: usize = 16;

// type flags length(u16) device(u16) 4 x string(16) checksum(2)
pub const FILE_HEADER_SIZE: usize = VARIABLE_HEADER_SIZE + 2 + 4 * STRING_IO_LENGTH + CHECKSUM_SIZE; // 72 bytes

// type flags hdop(u16) time(i64) speed(u32) speed_err(u32) lat(i32) lon(i32) course(u32) sats(u8) fix(u8) checksum(2)
pub const MINIMAL_RECORD_SIZE: usize = 2 + 2 + 8 + 4 + 4 + 4 + 4 + 4 + 1 + 1 + CHECKSUM_SIZE; // 36 bytes

// type flags hdop(u16) 6 x delta(i16) sats(u8) fix(u8) checksum(2)
pub const COMPRESSED_RECORD_SIZE: usize = 2 + 2 + 6 * 2 + 1 + 1 + CHECKSUM_SIZE; // 20 bytes

// Largest total length an unknown record can declare in its u16 length field
pub const MAXIMUM_RECORD_LENGTH: usize = u16::MAX as usize;

// Course travels through compressed records as degrees x 10^3 instead of x 10^5
pub const COURSE_COMPRESSION_DIVISOR: u32 = 1000;

// Reader diagnostics kept in memory; later problems are only counted
pub const MAX_PROBLEMS_LISTED: usize = 50;

// gzip member magic, used to detect .gpy.gz input
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

// Device type codes stored in the file header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    #[default]
    Unknown,
    Locosys,
    Ublox,
    Garmin,
    Suunto,
    Coros,
    Other,
    Unrecognized(u16),
}

impl DeviceType {
    pub fn from_u16(val: u16) -> Self {
        match val {
            0 => DeviceType::Unknown,
            1 => DeviceType::Locosys,
            2 => DeviceType::Ublox,
            3 => DeviceType::Garmin,
            4 => DeviceType::Suunto,
            5 => DeviceType::Coros,
            255 => DeviceType::Other,
            other => DeviceType::Unrecognized(other),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            DeviceType::Unknown => 0,
            DeviceType::Locosys => 1,
            DeviceType::Ublox => 2,
            DeviceType::Garmin => 3,
            DeviceType::Suunto => 4,
            DeviceType::Coros => 5,
            DeviceType::Other => 255,
            DeviceType::Unrecognized(val) => val,
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Unknown => write!(f, "unknown"),
            DeviceType::Locosys => write!(f, "locosys"),
            DeviceType::Ublox => write!(f, "u-blox"),
            DeviceType::Garmin => write!(f, "garmin"),
            DeviceType::Suunto => write!(f, "suunto"),
            DeviceType::Coros => write!(f, "coros"),
            DeviceType::Other => write!(f, "other"),
            DeviceType::Unrecognized(val) => write!(f, "unrecognized ({})", val),
        }
    }
}
