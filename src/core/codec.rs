// Byte layouts of the individual record types
//
// All fields are little endian and written at explicit offsets; nothing here
// depends on host struct layout.

use crate::core::checksum::{append_checksum, checksum, verify};
use crate::core::constants::*;
use crate::core::error::{GpyError, Result};
use crate::core::format::*;
use crate::core::header::{RecordHeader, RecordKind};

/// Sequential little endian field reader over an already length-checked slice.
struct FieldReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut raw = [0u8; N];
        raw.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        raw
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn i16(&mut self) -> i16 {
        i16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    fn i64(&mut self) -> i64 {
        i64::from_le_bytes(self.take())
    }

    fn slice(&mut self, len: usize) -> &'a [u8] {
        let out = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        out
    }
}

fn expect_layout(bytes: &[u8], kind: RecordKind, size: usize) -> Result<()> {
    if bytes.len() != size {
        return Err(GpyError::MalformedRecord(format!(
            "{} record must be {} bytes, got {}",
            kind.name(),
            size,
            bytes.len()
        )));
    }
    expect_type(bytes[0], kind)
}

fn expect_type(found: u8, kind: RecordKind) -> Result<()> {
    if found != kind.type_tag() {
        return Err(GpyError::MalformedRecord(format!(
            "wrong first byte - expected {:#04x} but was {:#04x}",
            kind.type_tag(),
            found
        )));
    }
    Ok(())
}

fn seal<const N: usize>(mut buf: [u8; N]) -> [u8; N] {
    let (a, b) = checksum(&buf[..N - CHECKSUM_SIZE]);
    buf[N - 2] = a;
    buf[N - 1] = b;
    buf
}

// ---------------------------------------------------------------------------
// Minimal (uncompressed reference) record
// ---------------------------------------------------------------------------

pub fn encode_minimal(sample: &Sample) -> [u8; MINIMAL_RECORD_SIZE] {
    let mut buf = [0u8; MINIMAL_RECORD_SIZE];
    buf[0] = MINIMAL_DATA;
    buf[1] = sample.flags;
    buf[2..4].copy_from_slice(&sample.hdop.to_le_bytes());
    buf[4..12].copy_from_slice(&sample.timestamp.to_le_bytes());
    buf[12..16].copy_from_slice(&sample.speed.to_le_bytes());
    buf[16..20].copy_from_slice(&sample.speed_error.to_le_bytes());
    buf[20..24].copy_from_slice(&sample.latitude.to_le_bytes());
    buf[24..28].copy_from_slice(&sample.longitude.to_le_bytes());
    buf[28..32].copy_from_slice(&sample.course.to_le_bytes());
    buf[32] = sample.satellites;
    buf[33] = sample.fix;
    seal(buf)
}

pub fn decode_minimal(bytes: &[u8]) -> Result<Sample> {
    expect_layout(bytes, RecordKind::Minimal, MINIMAL_RECORD_SIZE)?;

    let mut fields = FieldReader::new(bytes, 1);
    let sample = Sample {
        flags: fields.u8(),
        hdop: fields.u16(),
        timestamp: fields.i64(),
        speed: fields.u32(),
        speed_error: fields.u32(),
        latitude: fields.i32(),
        longitude: fields.i32(),
        course: fields.u32(),
        satellites: fields.u8(),
        fix: fields.u8(),
    };

    verify(bytes)?;
    Ok(sample)
}

// ---------------------------------------------------------------------------
// Compressed (delta) record
// ---------------------------------------------------------------------------

pub fn encode_compressed(record: &CompressedRecord) -> [u8; COMPRESSED_RECORD_SIZE] {
    let mut buf = [0u8; COMPRESSED_RECORD_SIZE];
    buf[0] = COMPRESSED_MINIMAL;
    buf[1] = record.flags;
    buf[2..4].copy_from_slice(&record.hdop.to_le_bytes());
    buf[4..6].copy_from_slice(&record.time_delta.to_le_bytes());
    buf[6..8].copy_from_slice(&record.speed_delta.to_le_bytes());
    buf[8..10].copy_from_slice(&record.speed_error_delta.to_le_bytes());
    buf[10..12].copy_from_slice(&record.latitude_delta.to_le_bytes());
    buf[12..14].copy_from_slice(&record.longitude_delta.to_le_bytes());
    buf[14..16].copy_from_slice(&record.course_delta.to_le_bytes());
    buf[16] = record.satellites;
    buf[17] = record.fix;
    seal(buf)
}

pub fn decode_compressed(bytes: &[u8]) -> Result<CompressedRecord> {
    expect_layout(bytes, RecordKind::Compressed, COMPRESSED_RECORD_SIZE)?;

    let mut fields = FieldReader::new(bytes, 1);
    let record = CompressedRecord {
        flags: fields.u8(),
        hdop: fields.u16(),
        time_delta: fields.i16(),
        speed_delta: fields.i16(),
        speed_error_delta: fields.i16(),
        latitude_delta: fields.i16(),
        longitude_delta: fields.i16(),
        course_delta: fields.i16(),
        satellites: fields.u8(),
        fix: fields.u8(),
    };

    verify(bytes)?;
    Ok(record)
}

// ---------------------------------------------------------------------------
// File header
// ---------------------------------------------------------------------------

/// Copy up to 16 UTF-8 bytes into a NUL padded slot; longer strings are cut.
fn write_string_slot(slot: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(STRING_IO_LENGTH);
    slot[..len].copy_from_slice(&bytes[..len]);
}

/// Read a slot like a C string; all 16 bytes are used when no NUL is present.
fn read_string_slot(slot: &[u8]) -> String {
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    String::from_utf8_lossy(&slot[..end]).into_owned()
}

pub fn encode_file_header(header: &FileHeader) -> [u8; FILE_HEADER_SIZE] {
    let mut buf = [0u8; FILE_HEADER_SIZE];
    buf[0] = FILE_HEADER;
    buf[1] = header.flags;
    buf[2..4].copy_from_slice(&(FILE_HEADER_SIZE as u16).to_le_bytes());
    buf[4..6].copy_from_slice(&header.device_type.as_u16().to_le_bytes());

    let strings = [
        &header.device_description,
        &header.device_name,
        &header.serial_number,
        &header.firmware_version,
    ];
    for (i, value) in strings.iter().enumerate() {
        let start = 6 + i * STRING_IO_LENGTH;
        write_string_slot(&mut buf[start..start + STRING_IO_LENGTH], value);
    }
    seal(buf)
}

/// Declared total length of a file header, validated against what the
/// stream can still deliver.
pub fn file_header_length(prefix: &RecordHeader, available: usize) -> Result<usize> {
    expect_type(prefix.record_type, RecordKind::FileHeader)?;

    let length = prefix.length as usize;
    if length < FILE_HEADER_SIZE || length > available {
        return Err(GpyError::MalformedRecord(format!(
            "invalid file header length {} ({} bytes available)",
            length, available
        )));
    }
    Ok(length)
}

pub fn decode_file_header(bytes: &[u8]) -> Result<FileHeader> {
    let prefix = RecordHeader::parse(bytes)?;
    let length = file_header_length(&prefix, bytes.len())?;
    if length != bytes.len() {
        return Err(GpyError::MalformedRecord(format!(
            "file header declares {} bytes, got {}",
            length,
            bytes.len()
        )));
    }

    let mut fields = FieldReader::new(bytes, VARIABLE_HEADER_SIZE);
    let device_type = DeviceType::from_u16(fields.u16());
    let device_description = read_string_slot(fields.slice(STRING_IO_LENGTH));
    let device_name = read_string_slot(fields.slice(STRING_IO_LENGTH));
    let serial_number = read_string_slot(fields.slice(STRING_IO_LENGTH));
    let firmware_version = read_string_slot(fields.slice(STRING_IO_LENGTH));

    verify(bytes)?;

    Ok(FileHeader {
        flags: prefix.flags,
        device_type,
        device_description,
        device_name,
        serial_number,
        firmware_version,
    })
}

// ---------------------------------------------------------------------------
// Unknown (variable length) records
// ---------------------------------------------------------------------------

/// Validate the length an unknown record declares. A record whose length
/// cannot be trusted makes the rest of the stream unframeable.
pub fn unknown_record_length(prefix: &RecordHeader, available: usize) -> Result<usize> {
    let length = prefix.length as usize;
    if length < MINIMUM_RECORD_LENGTH || length > available {
        return Err(GpyError::MalformedRecord(format!(
            "invalid length {} for unknown record of type {:#04x} ({} bytes available)",
            length, prefix.record_type, available
        )));
    }
    Ok(length)
}

pub fn decode_unknown(bytes: &[u8]) -> Result<UnknownRecord> {
    let prefix = RecordHeader::parse(bytes)?;
    let length = unknown_record_length(&prefix, bytes.len())?;
    if length != bytes.len() {
        return Err(GpyError::MalformedRecord(format!(
            "unknown record declares {} bytes, got {}",
            length,
            bytes.len()
        )));
    }

    verify(bytes)?;

    Ok(UnknownRecord {
        record_type: prefix.record_type,
        flags: prefix.flags,
        payload: bytes[VARIABLE_HEADER_SIZE..length - CHECKSUM_SIZE].to_vec(),
    })
}

pub fn encode_unknown(record: &UnknownRecord) -> Result<Vec<u8>> {
    if !matches!(RecordKind::classify(record.record_type), RecordKind::Unknown(_)) {
        return Err(GpyError::InvalidRecord(format!(
            "type {:#04x} is reserved for a built-in record",
            record.record_type
        )));
    }

    let length = record.encoded_len();
    if length < MINIMUM_RECORD_LENGTH || length > MAXIMUM_RECORD_LENGTH {
        return Err(GpyError::InvalidRecord(format!(
            "record length {} outside {}..={}",
            length, MINIMUM_RECORD_LENGTH, MAXIMUM_RECORD_LENGTH
        )));
    }

    let mut buf = Vec::with_capacity(length);
    RecordHeader {
        record_type: record.record_type,
        flags: record.flags,
        length: length as u16,
    }
    .write_to(&mut buf);
    buf.extend_from_slice(&record.payload);
    append_checksum(&mut buf);
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Tagged union dispatch
// ---------------------------------------------------------------------------

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::FileHeader(_) => RecordKind::FileHeader,
            Record::Minimal(_) => RecordKind::Minimal,
            Record::Compressed(_) => RecordKind::Compressed,
            Record::Unknown(record) => RecordKind::Unknown(record.record_type),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Record::FileHeader(header) => Ok(encode_file_header(header).to_vec()),
            Record::Minimal(sample) => Ok(encode_minimal(sample).to_vec()),
            Record::Compressed(record) => Ok(encode_compressed(record).to_vec()),
            Record::Unknown(record) => encode_unknown(record),
        }
    }

    /// Decode one complete record, dispatching on its first byte.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let first = *bytes
            .first()
            .ok_or_else(|| GpyError::MalformedRecord("empty record".to_string()))?;

        match RecordKind::classify(first) {
            RecordKind::FileHeader => decode_file_header(bytes).map(Record::FileHeader),
            RecordKind::Minimal => decode_minimal(bytes).map(Record::Minimal),
            RecordKind::Compressed => decode_compressed(bytes).map(Record::Compressed),
            RecordKind::Unknown(_) => decode_unknown(bytes).map(Record::Unknown),
        }
    }
}
