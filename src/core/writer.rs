// Stream writer for compact GNSS (.gpy) files

use crate::core::codec::*;
use crate::core::compression::gzip_writer;
use crate::core::delta::compress;
use crate::core::error::Result;
use crate::core::format::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Force a new uncompressed reference once a sample is this many seconds
    /// after the current one. `None` only switches on delta overflow.
    pub reference_interval_secs: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    pub minimal_records: usize,
    pub compressed_records: usize,
    pub unknown_records: usize,
    pub bytes_written: u64,
}

/// Writes a file header followed by samples, using compressed records
/// whenever the sample can be expressed against the last reference.
pub struct GpyWriter<W: Write> {
    output: W,
    config: WriterConfig,
    reference: Option<Sample>,
    stats: WriteStats,
}

impl<W: Write> GpyWriter<W> {
    pub fn create(output: W, header: &FileHeader) -> Result<Self> {
        Self::with_config(output, header, WriterConfig::default())
    }

    pub fn with_config(output: W, header: &FileHeader, config: WriterConfig) -> Result<Self> {
        let mut writer = Self {
            output,
            config,
            reference: None,
            stats: WriteStats::default(),
        };
        writer.emit(&encode_file_header(header))?;
        Ok(writer)
    }

    pub fn reference(&self) -> Option<&Sample> {
        self.reference.as_ref()
    }

    pub fn stats(&self) -> &WriteStats {
        &self.stats
    }

    /// Write one sample and return the number of bytes written.
    pub fn write_sample(&mut self, sample: &Sample) -> Result<usize> {
        let Some(reference) = self.reference else {
            return self.write_reference(sample);
        };

        if self.reference_due(sample, &reference) {
            debug!("refreshing reference at t={}", sample.timestamp);
            return self.write_reference(sample);
        }

        match compress(sample, &reference) {
            Ok(record) => {
                let written = self.emit(&encode_compressed(&record))?;
                self.stats.compressed_records += 1;
                Ok(written)
            }
            Err(overflow) => {
                debug!("{} at t={}, writing reference", overflow, sample.timestamp);
                self.write_reference(sample)
            }
        }
    }

    /// Write `sample` uncompressed and make it the new reference.
    pub fn write_reference(&mut self, sample: &Sample) -> Result<usize> {
        let written = self.emit(&encode_minimal(sample))?;
        self.reference = Some(*sample);
        self.stats.minimal_records += 1;
        Ok(written)
    }

    /// Write a custom record; readers that do not know its type skip it.
    pub fn write_unknown(&mut self, record: &UnknownRecord) -> Result<usize> {
        let bytes = encode_unknown(record)?;
        let written = self.emit(&bytes)?;
        self.stats.unknown_records += 1;
        Ok(written)
    }

    pub fn finish(mut self) -> Result<(W, WriteStats)> {
        self.output.flush()?;
        debug!(
            "gpy write finished: {} uncompressed, {} compressed, {} bytes",
            self.stats.minimal_records, self.stats.compressed_records, self.stats.bytes_written
        );
        Ok((self.output, self.stats))
    }

    fn reference_due(&self, sample: &Sample, reference: &Sample) -> bool {
        self.config
            .reference_interval_secs
            .is_some_and(|interval| sample.timestamp.saturating_sub(reference.timestamp) >= interval)
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<usize> {
        self.output.write_all(bytes)?;
        self.stats.bytes_written += bytes.len() as u64;
        Ok(bytes.len())
    }
}

/// Encode a whole track into `output`.
pub fn write_track<W: Write>(
    output: W,
    header: &FileHeader,
    samples: &[Sample],
    config: WriterConfig,
) -> Result<(W, WriteStats)> {
    let mut writer = GpyWriter::with_config(output, header, config)?;
    for sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finish()
}

/// Write a track to `path`; a `.gz` extension gzips the stream.
pub fn write_file<P: AsRef<Path>>(
    path: P,
    header: &FileHeader,
    samples: &[Sample],
    config: WriterConfig,
) -> Result<WriteStats> {
    let path = path.as_ref();
    let file = BufWriter::new(File::create(path)?);

    let stats = if path.extension().is_some_and(|ext| ext == "gz") {
        let (encoder, stats) = write_track(gzip_writer(file), header, samples, config)?;
        encoder.finish()?.flush()?;
        stats
    } else {
        let (mut file, stats) = write_track(file, header, samples, config)?;
        file.flush()?;
        stats
    };

    info!(
        "wrote {}: {} uncompressed and {} compressed records, {} bytes",
        path.display(),
        stats.minimal_records,
        stats.compressed_records,
        stats.bytes_written
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::*;
    use crate::core::reader::{read_bytes, read_file};

    fn header() -> FileHeader {
        FileHeader::new(DeviceType::Locosys, "Locosys GW-60", "", "", "1.0")
    }

    fn sample(second: i64) -> Sample {
        Sample {
            flags: 0,
            hdop: 95,
            timestamp: 1_670_716_800 + second,
            speed: 7_300,
            speed_error: 180,
            latitude: 524_000_000 + second as i32 * 35,
            longitude: 133_000_000 + second as i32 * 60,
            course: 4_512_345,
            satellites: 10,
            fix: 3,
        }
    }

    fn write(samples: &[Sample], config: WriterConfig) -> (Vec<u8>, WriteStats) {
        write_track(Vec::new(), &header(), samples, config).unwrap()
    }

    #[test]
    fn test_first_sample_is_reference() {
        let (data, stats) = write(&[sample(0)], WriterConfig::default());
        assert_eq!(data.len(), FILE_HEADER_SIZE + MINIMAL_RECORD_SIZE);
        assert_eq!(data[FILE_HEADER_SIZE], MINIMAL_DATA);
        assert_eq!(stats.minimal_records, 1);
        assert_eq!(stats.bytes_written, data.len() as u64);
    }

    #[test]
    fn test_following_samples_are_compressed() {
        let samples: Vec<Sample> = (0..10).map(sample).collect();
        let (data, stats) = write(&samples, WriterConfig::default());

        assert_eq!(stats.minimal_records, 1);
        assert_eq!(stats.compressed_records, 9);
        assert_eq!(
            data.len(),
            FILE_HEADER_SIZE + MINIMAL_RECORD_SIZE + 9 * COMPRESSED_RECORD_SIZE
        );

        let track = read_bytes(&data).unwrap();
        assert_eq!(track.header, header());
        let expected: Vec<Sample> = samples
            .iter()
            .enumerate()
            .map(|(i, s)| if i == 0 { *s } else { Sample { course: s.course_truncated(), ..*s } })
            .collect();
        assert_eq!(track.samples, expected);
    }

    #[test]
    fn test_overflow_writes_new_reference() {
        let far = Sample {
            latitude: sample(0).latitude + 40_000,
            ..sample(2)
        };
        let mut writer = GpyWriter::create(Vec::new(), &header()).unwrap();

        assert_eq!(writer.write_sample(&sample(0)).unwrap(), MINIMAL_RECORD_SIZE);
        assert_eq!(writer.write_sample(&sample(1)).unwrap(), COMPRESSED_RECORD_SIZE);
        assert_eq!(writer.write_sample(&far).unwrap(), MINIMAL_RECORD_SIZE);
        assert_eq!(writer.reference(), Some(&far));
        assert_eq!(writer.write_sample(&sample(3)).unwrap(), MINIMAL_RECORD_SIZE);

        let (data, stats) = writer.finish().unwrap();
        assert_eq!(stats.minimal_records, 3);
        assert_eq!(stats.compressed_records, 1);

        let track = read_bytes(&data).unwrap();
        assert_eq!(track.samples.len(), 4);
        assert_eq!(track.samples[2], far);
    }

    #[test]
    fn test_time_overflow_writes_new_reference() {
        let start = sample(0);
        let at = |offset: i64| Sample {
            timestamp: start.timestamp + offset,
            ..start
        };
        let samples = [start, at(32_767), at(32_767 + 32_768)];
        let (_, stats) = write(&samples, WriterConfig::default());
        assert_eq!(stats.minimal_records, 2);
        assert_eq!(stats.compressed_records, 1);
    }

    #[test]
    fn test_extreme_timestamps_write_new_reference() {
        let low = Sample {
            timestamp: i64::MIN,
            ..sample(0)
        };
        let high = Sample {
            timestamp: i64::MAX,
            ..sample(0)
        };
        let mut writer = GpyWriter::create(Vec::new(), &header()).unwrap();

        assert_eq!(writer.write_sample(&low).unwrap(), MINIMAL_RECORD_SIZE);
        assert_eq!(writer.write_sample(&high).unwrap(), MINIMAL_RECORD_SIZE);

        let (data, _) = writer.finish().unwrap();
        assert_eq!(read_bytes(&data).unwrap().samples, vec![low, high]);
    }

    #[test]
    fn test_reference_interval() {
        let samples: Vec<Sample> = (0..100).map(sample).collect();
        let config = WriterConfig {
            reference_interval_secs: Some(32),
        };
        let (data, stats) = write(&samples, config);

        // references at t = 0, 32, 64 and 96
        assert_eq!(stats.minimal_records, 4);
        assert_eq!(stats.compressed_records, 96);
        assert_eq!(read_bytes(&data).unwrap().samples.len(), 100);
    }

    #[test]
    fn test_unknown_records_leave_reference_alone() {
        let mut writer = GpyWriter::create(Vec::new(), &header()).unwrap();
        writer.write_sample(&sample(0)).unwrap();
        writer
            .write_unknown(&UnknownRecord {
                record_type: 0x7A,
                flags: 0,
                payload: b"lap 1".to_vec(),
            })
            .unwrap();
        assert_eq!(writer.write_sample(&sample(1)).unwrap(), COMPRESSED_RECORD_SIZE);

        let (data, stats) = writer.finish().unwrap();
        assert_eq!(stats.unknown_records, 1);

        let track = read_bytes(&data).unwrap();
        assert_eq!(track.samples.len(), 2);
        assert_eq!(track.stats.unknown_records, 1);
    }

    #[test]
    fn test_write_unknown_rejects_reserved_type() {
        let mut writer = GpyWriter::create(Vec::new(), &header()).unwrap();
        let result = writer.write_unknown(&UnknownRecord {
            record_type: COMPRESSED_MINIMAL,
            flags: 0,
            payload: vec![0, 0],
        });
        assert!(result.is_err());
        assert_eq!(writer.stats().bytes_written, FILE_HEADER_SIZE as u64);
    }

    #[test]
    fn test_write_file_gzip() {
        let samples: Vec<Sample> = (0..20).map(sample).collect();
        let path = std::env::temp_dir().join(format!("gpy-writer-{}.gpy.gz", std::process::id()));

        let stats = write_file(&path, &header(), &samples, WriterConfig::default()).unwrap();
        assert_eq!(stats.minimal_records + stats.compressed_records, 20);

        let raw = std::fs::read(&path).unwrap();
        assert!(crate::core::compression::is_gzipped(&raw));

        let track = read_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(track.samples.len(), 20);
    }
}
