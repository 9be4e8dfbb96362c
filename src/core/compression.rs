// gzip envelope around whole .gpy streams (.gpy.gz)

use crate::core::constants::GZIP_MAGIC;
use crate::core::error::{GpyError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

pub fn is_gzipped(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Unwrap gzip input; anything else is returned unchanged.
pub fn decompress(data: Vec<u8>) -> Result<Vec<u8>> {
    if !is_gzipped(&data) {
        return Ok(data);
    }

    let mut decoder = GzDecoder::new(data.as_slice());
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| GpyError::DecompressionFailed(format!("gzip: {}", e)))?;
    Ok(decompressed)
}

pub fn gzip_writer<W: Write>(inner: W) -> GzEncoder<W> {
    GzEncoder::new(inner, Compression::best())
}
