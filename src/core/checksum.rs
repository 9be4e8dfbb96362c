// Two byte Fletcher-style checksum shared by all record types

use crate::core::constants::CHECKSUM_SIZE;
use crate::core::error::{GpyError, Result};

/// Running sums (a, b), both modulo 256.
pub fn checksum(bytes: &[u8]) -> (u8, u8) {
    let mut a: u8 = 0;
    let mut b: u8 = 0;
    for &byte in bytes {
        a = a.wrapping_add(byte);
        b = b.wrapping_add(a);
    }
    (a, b)
}

/// Verify a complete record whose last two bytes are the stored checksum.
pub fn verify(record: &[u8]) -> Result<()> {
    if record.len() < CHECKSUM_SIZE {
        return Err(GpyError::MalformedRecord(format!(
            "{} bytes is too short to carry a checksum",
            record.len()
        )));
    }

    let body_len = record.len() - CHECKSUM_SIZE;
    let expected = (record[body_len], record[body_len + 1]);
    let actual = checksum(&record[..body_len]);

    if expected != actual {
        return Err(GpyError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

/// Append the checksum of everything already in `buf`.
pub fn append_checksum(buf: &mut Vec<u8>) {
    let (a, b) = checksum(buf);
    buf.push(a);
    buf.push(b);
}
