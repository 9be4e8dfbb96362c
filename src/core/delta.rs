// Delta compression of samples against a reference record

use crate::core::constants::COURSE_COMPRESSION_DIVISOR;
use crate::core::error::DeltaOverflow;
use crate::core::format::{CompressedRecord, Sample};

fn delta(field: &'static str, current: i64, reference: i64) -> Result<i16, DeltaOverflow> {
    // saturated differences are still far outside the i16 range
    let delta = current.saturating_sub(reference);
    i16::try_from(delta).map_err(|_| DeltaOverflow { field, delta })
}

/// Express `current` as 16 bit differences to `reference`.
///
/// Course is compared at degrees x 10^3, so up to 999 units of the full
/// x 10^5 value are lost. hdop, satellites, fix and flags are stored as-is.
pub fn compress(current: &Sample, reference: &Sample) -> Result<CompressedRecord, DeltaOverflow> {
    Ok(CompressedRecord {
        flags: current.flags,
        hdop: current.hdop,
        time_delta: delta("timestamp", current.timestamp, reference.timestamp)?,
        speed_delta: delta("speed", current.speed.into(), reference.speed.into())?,
        speed_error_delta: delta(
            "speed_error",
            current.speed_error.into(),
            reference.speed_error.into(),
        )?,
        latitude_delta: delta("latitude", current.latitude.into(), reference.latitude.into())?,
        longitude_delta: delta("longitude", current.longitude.into(), reference.longitude.into())?,
        course_delta: delta(
            "course",
            (current.course / COURSE_COMPRESSION_DIVISOR).into(),
            (reference.course / COURSE_COMPRESSION_DIVISOR).into(),
        )?,
        satellites: current.satellites,
        fix: current.fix,
    })
}

/// Rebuild a sample from a delta record and the reference it was made against.
///
/// The returned course only carries degrees x 10^3 precision, whatever the
/// precision of the reference.
pub fn decompress(record: &CompressedRecord, reference: &Sample) -> Sample {
    let course_base = reference.course / COURSE_COMPRESSION_DIVISOR;
    let course = course_base
        .wrapping_add_signed(record.course_delta.into())
        .wrapping_mul(COURSE_COMPRESSION_DIVISOR);

    Sample {
        flags: record.flags,
        hdop: record.hdop,
        timestamp: reference.timestamp.wrapping_add(record.time_delta.into()),
        speed: reference.speed.wrapping_add_signed(record.speed_delta.into()),
        speed_error: reference
            .speed_error
            .wrapping_add_signed(record.speed_error_delta.into()),
        latitude: reference.latitude.wrapping_add(record.latitude_delta.into()),
        longitude: reference.longitude.wrapping_add(record.longitude_delta.into()),
        course,
        satellites: record.satellites,
        fix: record.fix,
    }
}
