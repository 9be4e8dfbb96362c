// Stream reader for compact GNSS (.gpy) files

use crate::core::codec::*;
use crate::core::compression;
use crate::core::constants::*;
use crate::core::delta::decompress;
use crate::core::error::{GpyError, Result};
use crate::core::format::*;
use crate::core::header::{RecordHeader, RecordKind};
use std::fs;
use std::io::{BufRead, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    ExpectHeader,
    Streaming,
    Done,
    Failed,
}

/// Sequential reader over one .gpy stream.
///
/// Records with bad checksums are skipped and counted. If the skipped record
/// was an uncompressed reference, the compressed records that follow it are
/// dropped too until the next intact reference. A damaged file header, a bad
/// unknown record or a truncated record ends the read with an error.
pub struct GpyReader<R> {
    input: R,
    length: u64,
    position: u64,
    state: ReaderState,
    header: Option<FileHeader>,
    reference: Option<Sample>,
    stats: ReadStats,
    problems: Vec<String>,
}

impl<R: BufRead + Seek> GpyReader<R> {
    pub fn new(mut input: R) -> Result<Self> {
        let position = input.stream_position()?;
        let length = input.seek(SeekFrom::End(0))?;
        input.seek(SeekFrom::Start(position))?;

        Ok(Self {
            input,
            length,
            position,
            state: ReaderState::ExpectHeader,
            header: None,
            reference: None,
            stats: ReadStats::default(),
            problems: Vec::new(),
        })
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn header(&self) -> Option<&FileHeader> {
        self.header.as_ref()
    }

    /// The last intact uncompressed record, if any.
    pub fn reference(&self) -> Option<&Sample> {
        self.reference.as_ref()
    }

    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    pub fn problems(&self) -> &[String] {
        &self.problems
    }

    /// Byte offset of the next unread record.
    pub fn position(&self) -> u64 {
        self.position
    }

    fn remaining(&self) -> usize {
        usize::try_from(self.length.saturating_sub(self.position)).unwrap_or(usize::MAX)
    }

    /// Read the file header, which must be the first record of a stream.
    pub fn read_header(&mut self) -> Result<&FileHeader> {
        if self.state == ReaderState::ExpectHeader {
            match self.parse_header() {
                Ok(header) => {
                    debug!(
                        "gpy header: device={} description='{}' name='{}' serial='{}' firmware='{}'",
                        header.device_type,
                        header.device_description,
                        header.device_name,
                        header.serial_number,
                        header.firmware_version
                    );
                    self.header = Some(header);
                    self.state = ReaderState::Streaming;
                }
                Err(e) => return Err(self.fail(e)),
            }
        }

        self.header.as_ref().ok_or_else(|| {
            GpyError::MalformedRecord("stream failed before a file header was read".to_string())
        })
    }

    /// Next decoded sample, or `None` once the stream is exhausted.
    pub fn next_sample(&mut self) -> Result<Option<Sample>> {
        if self.state == ReaderState::ExpectHeader {
            self.read_header()?;
        }

        loop {
            match self.state {
                ReaderState::Done => return Ok(None),
                ReaderState::Failed => {
                    return Err(GpyError::MalformedRecord(
                        "stream already failed".to_string(),
                    ))
                }
                _ => {}
            }

            match self.read_record() {
                Ok(Some(sample)) => return Ok(Some(sample)),
                Ok(None) => continue,
                Err(e) => return Err(self.fail(e)),
            }
        }
    }

    /// Read the remaining stream into a [`TrackLog`].
    pub fn read_to_end(mut self) -> Result<TrackLog> {
        let header = self.read_header()?.clone();

        let mut samples = Vec::with_capacity(self.remaining() / COMPRESSED_RECORD_SIZE);
        while let Some(sample) = self.next_sample()? {
            samples.push(sample);
        }

        Ok(TrackLog {
            header,
            stats: self.stats,
            problems: self.problems,
            samples,
        })
    }

    fn fail(&mut self, err: GpyError) -> GpyError {
        self.state = ReaderState::Failed;
        warn!("gpy read aborted at byte {}: {}", self.position, err);
        err
    }

    fn finish(&mut self) {
        self.state = ReaderState::Done;
        if self.stats.problem_count() > 0 {
            info!(
                "gpy read finished with problems: {} samples, {} checksum errors, {} without reference",
                self.stats.samples, self.stats.checksum_errors, self.stats.orphaned_compressed
            );
        } else {
            debug!(
                "gpy read finished: {} samples from {} records ({} unknown)",
                self.stats.samples, self.stats.total_records, self.stats.unknown_records
            );
        }
    }

    fn note_problem(&mut self, kind: RecordKind, detail: impl std::fmt::Display) {
        let message = format!("Record {} ({}): {}", self.stats.total_records, kind.name(), detail);
        warn!("{}", message);
        if self.problems.len() < MAX_PROBLEMS_LISTED {
            self.problems.push(message);
        } else {
            self.stats.problems_omitted += 1;
        }
    }

    /// Peek the type byte of the next record without consuming it.
    fn peek_type(&mut self) -> Result<Option<u8>> {
        if self.remaining() == 0 {
            return Ok(None);
        }
        let available = self.remaining();
        let buf = self.input.fill_buf()?;
        match buf.first() {
            Some(&tag) => Ok(Some(tag)),
            None => Err(GpyError::UnexpectedEof {
                needed: 1,
                available,
            }),
        }
    }

    /// Consume exactly `len` bytes, failing when the stream is shorter.
    fn read_block(&mut self, len: usize) -> Result<Vec<u8>> {
        let available = self.remaining();
        if len > available {
            return Err(GpyError::UnexpectedEof {
                needed: len,
                available,
            });
        }

        let mut block = vec![0u8; len];
        self.input.read_exact(&mut block).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => GpyError::UnexpectedEof {
                needed: len,
                available,
            },
            _ => GpyError::Io(e),
        })?;
        self.position += len as u64;
        Ok(block)
    }

    /// Read a variable length record: the prefix first, then the rest of the
    /// declared length once it has been validated.
    fn read_variable<F>(&mut self, validate: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&RecordHeader, usize) -> Result<usize>,
    {
        let available = self.remaining();
        let mut record = self.read_block(VARIABLE_HEADER_SIZE)?;
        let prefix = RecordHeader::parse(&record)?;
        let length = validate(&prefix, available)?;

        let rest = self.read_block(length - VARIABLE_HEADER_SIZE)?;
        record.extend_from_slice(&rest);
        Ok(record)
    }

    fn parse_header(&mut self) -> Result<FileHeader> {
        if self.remaining() < VARIABLE_HEADER_SIZE {
            return Err(GpyError::MalformedRecord(format!(
                "stream of {} bytes has no file header",
                self.remaining()
            )));
        }
        let bytes = self.read_variable(file_header_length)?;
        decode_file_header(&bytes)
    }

    fn read_record(&mut self) -> Result<Option<Sample>> {
        let Some(tag) = self.peek_type()? else {
            self.finish();
            return Ok(None);
        };

        self.stats.total_records += 1;
        let kind = RecordKind::classify(tag);
        let Some(size) = kind.fixed_size() else {
            // a file header after the first record is framed like any other
            // variable length record
            self.skip_unknown(kind)?;
            return Ok(None);
        };

        // the whole record is consumed whatever its checksum says
        let bytes = self.read_block(size)?;
        match kind {
            RecordKind::Minimal => self.read_minimal(&bytes),
            _ => self.read_compressed(&bytes),
        }
    }

    fn read_minimal(&mut self, bytes: &[u8]) -> Result<Option<Sample>> {
        match decode_minimal(bytes) {
            Ok(sample) => {
                self.reference = Some(sample);
                self.stats.samples += 1;
                Ok(Some(sample))
            }
            Err(e) if e.is_checksum_mismatch() => {
                // following compressed records are dropped until the next reference
                self.reference = None;
                self.stats.checksum_errors += 1;
                self.note_problem(RecordKind::Minimal, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn read_compressed(&mut self, bytes: &[u8]) -> Result<Option<Sample>> {
        let Some(reference) = self.reference else {
            self.stats.orphaned_compressed += 1;
            self.note_problem(RecordKind::Compressed, "No uncompressed reference");
            return Ok(None);
        };

        match decode_compressed(bytes) {
            Ok(record) => {
                self.stats.samples += 1;
                Ok(Some(decompress(&record, &reference)))
            }
            Err(e) if e.is_checksum_mismatch() => {
                self.stats.checksum_errors += 1;
                self.note_problem(RecordKind::Compressed, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn skip_unknown(&mut self, kind: RecordKind) -> Result<()> {
        let bytes = self.read_variable(unknown_record_length)?;
        let record = decode_unknown(&bytes)?;
        self.stats.unknown_records += 1;
        debug!(
            "skipped {} record of type {:#04x}, {} bytes",
            kind.name(),
            record.record_type,
            bytes.len()
        );
        Ok(())
    }
}

impl<R: BufRead + Seek> Iterator for GpyReader<R> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ReaderState::Failed {
            return None;
        }
        self.next_sample().transpose()
    }
}

/// Decode an in-memory .gpy stream.
pub fn read_bytes(data: &[u8]) -> Result<TrackLog> {
    GpyReader::new(Cursor::new(data))?.read_to_end()
}

/// Decode a .gpy file; gzip wrapped files are unpacked first.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<TrackLog> {
    let path = path.as_ref();
    let raw = fs::read(path)?;
    let data = compression::decompress(raw)?;

    let track = read_bytes(&data)?;
    info!(
        "read {}: {} samples, {} problems",
        path.display(),
        track.samples.len(),
        track.stats.problem_count()
    );
    Ok(track)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::delta::compress;

    fn header() -> FileHeader {
        FileHeader::new(DeviceType::Ublox, "Beitian BN-880", "bob", "24:6f:28:aa", "5.72")
    }

    fn sample(second: i64) -> Sample {
        Sample {
            flags: 0,
            hdop: 80,
            timestamp: 1_670_716_800 + second,
            speed: 5_000 + second as u32 * 10,
            speed_error: 250,
            latitude: 377_749_000 + second as i32 * 40,
            longitude: -1_224_194_000 - second as i32 * 25,
            course: 9_000_000 + second as u32 * 1_000,
            satellites: 12,
            fix: 3,
        }
    }

    fn compressed(current: i64, reference: i64) -> [u8; COMPRESSED_RECORD_SIZE] {
        encode_compressed(&compress(&sample(current), &sample(reference)).unwrap())
    }

    fn stream(records: &[&[u8]]) -> Vec<u8> {
        let mut data = encode_file_header(&header()).to_vec();
        for record in records {
            data.extend_from_slice(record);
        }
        data
    }

    fn corrupt<const N: usize>(mut record: [u8; N]) -> [u8; N] {
        record[6] ^= 0x01;
        record
    }

    #[test]
    fn test_header_only() {
        let track = read_bytes(&stream(&[])).unwrap();
        assert_eq!(track.header, header());
        assert!(track.is_empty());
        assert_eq!(track.stats, ReadStats::default());
    }

    #[test]
    fn test_reference_and_compressed() {
        let data = stream(&[
            &encode_minimal(&sample(0)),
            &compressed(1, 0),
            &compressed(2, 0),
        ]);
        let track = read_bytes(&data).unwrap();

        assert_eq!(track.samples, vec![sample(0), sample(1), sample(2)]);
        assert_eq!(track.stats.total_records, 3);
        assert_eq!(track.stats.samples, 3);
        assert_eq!(track.stats.problem_count(), 0);
        assert_eq!(track.time_range(), Some((1_670_716_800, 1_670_716_802)));
    }

    #[test]
    fn test_corrupted_reference_poisons_compressed_records() {
        let data = stream(&[
            &encode_minimal(&sample(0)),
            &corrupt(encode_minimal(&sample(1))),
            &compressed(2, 1),
            &encode_minimal(&sample(3)),
            &compressed(4, 3),
        ]);
        let track = read_bytes(&data).unwrap();

        assert_eq!(track.samples, vec![sample(0), sample(3), sample(4)]);
        assert_eq!(track.stats.total_records, 5);
        assert_eq!(track.stats.checksum_errors, 1);
        assert_eq!(track.stats.orphaned_compressed, 1);
        assert_eq!(track.problems.len(), 2);
        assert!(track.problems[0].starts_with("Record 2 (uncompressed): Invalid checksum"));
        assert_eq!(track.problems[1], "Record 3 (compressed): No uncompressed reference");
    }

    #[test]
    fn test_corrupted_compressed_keeps_reference() {
        let data = stream(&[
            &encode_minimal(&sample(0)),
            &corrupt(compressed(1, 0)),
            &compressed(2, 0),
        ]);
        let track = read_bytes(&data).unwrap();

        assert_eq!(track.samples, vec![sample(0), sample(2)]);
        assert_eq!(track.stats.checksum_errors, 1);
        assert_eq!(track.stats.orphaned_compressed, 0);
    }

    #[test]
    fn test_compressed_before_any_reference_is_orphaned() {
        let data = stream(&[&compressed(1, 0), &encode_minimal(&sample(5))]);
        let track = read_bytes(&data).unwrap();

        assert_eq!(track.samples, vec![sample(5)]);
        assert_eq!(track.stats.orphaned_compressed, 1);
        assert_eq!(track.stats.checksum_errors, 0);
    }

    #[test]
    fn test_unknown_record_is_skipped() {
        let unknown = encode_unknown(&UnknownRecord {
            record_type: 0x42,
            flags: 0,
            payload: vec![9; 13],
        })
        .unwrap();
        let data = stream(&[&encode_minimal(&sample(0)), &unknown, &compressed(1, 0)]);

        let mut reader = GpyReader::new(Cursor::new(data.as_slice())).unwrap();
        assert_eq!(reader.next_sample().unwrap(), Some(sample(0)));
        let after_minimal = reader.position();
        assert_eq!(reader.next_sample().unwrap(), Some(sample(1)));
        assert_eq!(
            reader.position(),
            after_minimal + unknown.len() as u64 + COMPRESSED_RECORD_SIZE as u64
        );
        assert_eq!(reader.next_sample().unwrap(), None);
        assert_eq!(reader.state(), ReaderState::Done);
        assert_eq!(reader.stats().unknown_records, 1);
        assert_eq!(reader.stats().problem_count(), 0);
        assert_eq!(reader.position(), data.len() as u64);
    }

    #[test]
    fn test_unknown_record_at_end() {
        let unknown = encode_unknown(&UnknownRecord {
            record_type: 0x01,
            flags: 3,
            payload: vec![1, 2],
        })
        .unwrap();
        assert_eq!(unknown.len(), MINIMUM_RECORD_LENGTH);

        let data = stream(&[&encode_minimal(&sample(0)), &unknown]);
        let track = read_bytes(&data).unwrap();
        assert_eq!(track.samples, vec![sample(0)]);
        assert_eq!(track.stats.unknown_records, 1);
        assert_eq!(track.stats.problem_count(), 0);
    }

    #[test]
    fn test_unknown_length_beyond_stream_is_fatal() {
        let mut unknown = encode_unknown(&UnknownRecord {
            record_type: 0x42,
            flags: 0,
            payload: vec![0; 6],
        })
        .unwrap();
        unknown[2] = 200;
        let data = stream(&[&encode_minimal(&sample(0)), &unknown]);

        assert!(matches!(read_bytes(&data), Err(GpyError::MalformedRecord(_))));

        let mut reader = GpyReader::new(Cursor::new(data.as_slice())).unwrap();
        assert!(reader.next_sample().unwrap().is_some());
        assert!(reader.next_sample().is_err());
        assert_eq!(reader.state(), ReaderState::Failed);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_unknown_length_too_small_is_fatal() {
        let data = stream(&[&[0x42, 0x00, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00]]);
        assert!(matches!(read_bytes(&data), Err(GpyError::MalformedRecord(_))));
    }

    #[test]
    fn test_unknown_checksum_is_fatal() {
        let mut unknown = encode_unknown(&UnknownRecord {
            record_type: 0x42,
            flags: 0,
            payload: vec![5; 4],
        })
        .unwrap();
        unknown[5] = 6;
        let data = stream(&[&unknown, &encode_minimal(&sample(0))]);

        assert!(read_bytes(&data).unwrap_err().is_checksum_mismatch());
    }

    #[test]
    fn test_second_file_header_is_skipped() {
        let data = stream(&[
            &encode_minimal(&sample(0)),
            &encode_file_header(&header()),
            &compressed(1, 0),
        ]);
        let track = read_bytes(&data).unwrap();
        assert_eq!(track.samples, vec![sample(0), sample(1)]);
        assert_eq!(track.stats.unknown_records, 1);
    }

    #[test]
    fn test_longer_file_header_stays_framed() {
        let mut data = encode_file_header(&header())[..FILE_HEADER_SIZE - CHECKSUM_SIZE].to_vec();
        data[2..4].copy_from_slice(&80u16.to_le_bytes());
        data.extend_from_slice(&[0xAB; 8]);
        crate::core::checksum::append_checksum(&mut data);
        assert_eq!(data.len(), 80);
        data.extend_from_slice(&encode_minimal(&sample(0)));

        let track = read_bytes(&data).unwrap();
        assert_eq!(track.header, header());
        assert_eq!(track.samples, vec![sample(0)]);
        assert_eq!(track.stats.problem_count(), 0);

        // the extra bytes are covered by the checksum
        data[75] ^= 0x01;
        assert!(read_bytes(&data).unwrap_err().is_checksum_mismatch());
    }

    #[test]
    fn test_truncated_record_is_fatal() {
        let data = stream(&[&encode_minimal(&sample(0))]);
        let truncated = &data[..data.len() - 5];

        match read_bytes(truncated) {
            Err(GpyError::UnexpectedEof { needed, available }) => {
                assert_eq!(needed, MINIMAL_RECORD_SIZE);
                assert_eq!(available, MINIMAL_RECORD_SIZE - 5);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_bad_header_is_fatal() {
        let mut data = stream(&[&encode_minimal(&sample(0))]);
        data[10] ^= 0xFF;
        assert!(read_bytes(&data).unwrap_err().is_checksum_mismatch());

        let data = encode_minimal(&sample(0));
        assert!(matches!(read_bytes(&data), Err(GpyError::MalformedRecord(_))));

        assert!(matches!(read_bytes(&[]), Err(GpyError::MalformedRecord(_))));
    }

    #[test]
    fn test_problem_list_is_capped() {
        let orphan = compressed(1, 0);
        let records: Vec<&[u8]> = (0..MAX_PROBLEMS_LISTED + 7).map(|_| &orphan[..]).collect();
        let track = read_bytes(&stream(&records)).unwrap();

        assert_eq!(track.stats.orphaned_compressed, MAX_PROBLEMS_LISTED + 7);
        assert_eq!(track.problems.len(), MAX_PROBLEMS_LISTED);
        assert_eq!(track.stats.problems_omitted, 7);
    }

    #[test]
    fn test_iterator() {
        let data = stream(&[&encode_minimal(&sample(0)), &compressed(3, 0)]);
        let reader = GpyReader::new(Cursor::new(data.as_slice())).unwrap();
        let samples: Result<Vec<Sample>> = reader.collect();
        assert_eq!(samples.unwrap(), vec![sample(0), sample(3)]);
    }

    #[test]
    fn test_read_gzipped_file() {
        use std::io::Write;

        let data = stream(&[&encode_minimal(&sample(0)), &compressed(1, 0)]);
        let path = std::env::temp_dir().join(format!("gpy-reader-{}.gpy.gz", std::process::id()));
        let mut encoder = compression::gzip_writer(fs::File::create(&path).unwrap());
        encoder.write_all(&data).unwrap();
        encoder.finish().unwrap();

        let track = read_file(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(track.samples, vec![sample(0), sample(1)]);
    }
}
