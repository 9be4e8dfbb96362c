// Error handling for the .gpy reader and writer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GpyError>;

#[derive(Error, Debug)]
pub enum GpyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error(
        "Invalid checksum - expected {},{} but was {},{}",
        expected.0, expected.1, actual.0, actual.1
    )]
    ChecksumMismatch { expected: (u8, u8), actual: (u8, u8) },

    #[error("Unexpected end of stream: record needs {needed} bytes, {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("Cannot encode record: {0}")]
    InvalidRecord(String),
}

impl GpyError {
    /// Checksum failures are the only errors a reader may skip past.
    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self, GpyError::ChecksumMismatch { .. })
    }
}

/// A delta that does not fit the i16 slot of a compressed record.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Delta overflow in {field}: {delta} does not fit in 16 bits")]
pub struct DeltaOverflow {
    pub field: &'static str,
    pub delta: i64,
}
