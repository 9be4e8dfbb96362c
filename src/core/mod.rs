pub mod checksum;
pub mod codec;
pub mod compression;
pub mod constants;
pub mod delta;
pub mod error;
pub mod format;
pub mod header;
pub mod reader;
pub mod writer;
