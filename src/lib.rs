// Compact GNSS (.gpy) track log format
// Main library entry point

pub mod core;

// Re-export main types
pub use crate::core::constants::DeviceType;
pub use crate::core::delta::{compress, decompress};
pub use crate::core::error::{DeltaOverflow, GpyError, Result};
pub use crate::core::format::{
    CompressedRecord, FileHeader, FixQuality, ReadStats, Record, Sample, TrackLog, UnknownRecord,
};
pub use crate::core::header::RecordKind;
pub use crate::core::reader::{read_bytes, read_file, GpyReader, ReaderState};
pub use crate::core::writer::{write_file, write_track, GpyWriter, WriteStats, WriterConfig};
