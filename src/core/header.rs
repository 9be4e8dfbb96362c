// Common record prefix and dispatch by type tag

use crate::core::constants::*;
use crate::core::error::{GpyError, Result};

/// Record classes, decided by the first byte of a record alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    FileHeader,
    Minimal,
    Compressed,
    Unknown(u8),
}

impl RecordKind {
    pub fn classify(type_tag: u8) -> Self {
        match type_tag {
            FILE_HEADER => RecordKind::FileHeader,
            MINIMAL_DATA => RecordKind::Minimal,
            COMPRESSED_MINIMAL => RecordKind::Compressed,
            other => RecordKind::Unknown(other),
        }
    }

    pub fn type_tag(self) -> u8 {
        match self {
            RecordKind::FileHeader => FILE_HEADER,
            RecordKind::Minimal => MINIMAL_DATA,
            RecordKind::Compressed => COMPRESSED_MINIMAL,
            RecordKind::Unknown(tag) => tag,
        }
    }

    /// Total on-wire size for kinds without a length field.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            RecordKind::Minimal => Some(MINIMAL_RECORD_SIZE),
            RecordKind::Compressed => Some(COMPRESSED_RECORD_SIZE),
            RecordKind::FileHeader | RecordKind::Unknown(_) => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RecordKind::FileHeader => "file header",
            RecordKind::Minimal => "uncompressed",
            RecordKind::Compressed => "compressed",
            RecordKind::Unknown(_) => "unknown",
        }
    }
}

/// The leading type/flags/length bytes of a variable length record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub record_type: u8,
    pub flags: u8,
    /// Total record length, type byte through checksum inclusive.
    pub length: u16,
}

impl RecordHeader {
    pub fn parse(prefix: &[u8]) -> Result<Self> {
        if prefix.len() < VARIABLE_HEADER_SIZE {
            return Err(GpyError::MalformedRecord(format!(
                "record header needs {} bytes, got {}",
                VARIABLE_HEADER_SIZE,
                prefix.len()
            )));
        }
        Ok(Self {
            record_type: prefix[0],
            flags: prefix[1],
            length: u16::from_le_bytes([prefix[2], prefix[3]]),
        })
    }

    pub fn kind(&self) -> RecordKind {
        RecordKind::classify(self.record_type)
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.push(self.record_type);
        buf.push(self.flags);
        buf.extend_from_slice(&self.length.to_le_bytes());
    }
}
