// CSV import/export of raw sample values

use anyhow::{bail, Context, Result};
use gpy::Sample;
use std::io::Write;

pub const CSV_COLUMNS: [&str; 10] = [
    "flags",
    "hdop",
    "dateTime",
    "speed",
    "speedErr",
    "latitude",
    "longitude",
    "course",
    "sats",
    "fix",
];

pub fn write_csv<W: Write>(out: &mut W, samples: &[Sample], delim: char) -> Result<()> {
    let delim = delim.to_string();
    writeln!(out, "{}", CSV_COLUMNS.join(&delim))?;
    for s in samples {
        let row = [
            s.flags.to_string(),
            s.hdop.to_string(),
            s.timestamp.to_string(),
            s.speed.to_string(),
            s.speed_error.to_string(),
            s.latitude.to_string(),
            s.longitude.to_string(),
            s.course.to_string(),
            s.satellites.to_string(),
            s.fix.to_string(),
        ];
        writeln!(out, "{}", row.join(&delim))?;
    }
    Ok(())
}

fn field<T>(items: &[&str], index: usize, line_no: usize) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = items[index].trim();
    raw.parse::<T>()
        .with_context(|| format!("line {}: bad {} value '{}'", line_no, CSV_COLUMNS[index], raw))
}

/// Parse CSV text; the first line is a column header and is skipped.
pub fn parse_csv(text: &str, delim: char) -> Result<Vec<Sample>> {
    let mut samples = Vec::new();

    for (i, line) in text.lines().enumerate().skip(1) {
        let line_no = i + 1;
        if line.trim().is_empty() {
            continue;
        }

        let items: Vec<&str> = line.split(delim).collect();
        if items.len() != CSV_COLUMNS.len() {
            bail!(
                "line {}: expected {} columns, found {}",
                line_no,
                CSV_COLUMNS.len(),
                items.len()
            );
        }

        samples.push(Sample {
            flags: field(&items, 0, line_no)?,
            hdop: field(&items, 1, line_no)?,
            timestamp: field(&items, 2, line_no)?,
            speed: field(&items, 3, line_no)?,
            speed_error: field(&items, 4, line_no)?,
            latitude: field(&items, 5, line_no)?,
            longitude: field(&items, 6, line_no)?,
            course: field(&items, 7, line_no)?,
            satellites: field(&items, 8, line_no)?,
            fix: field(&items, 9, line_no)?,
        });
    }

    Ok(samples)
}
