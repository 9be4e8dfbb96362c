use anyhow::{anyhow, bail, Context, Result};
use chrono::SecondsFormat;
use clap::{Parser, Subcommand};
use gpy::{read_file, write_file, DeviceType, FileHeader, Sample, TrackLog};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

mod models;
mod utils;

use crate::utils::conf_helper::{init_config, log_level};
use crate::utils::csv_helper::{parse_csv, write_csv};

#[derive(Parser)]
#[command(name = "gpy")]
#[command(about = "Inspect and convert compact GNSS (.gpy) track logs")]
#[command(version)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print header, counters and problems of a track log
    Info {
        input: PathBuf,
    },

    /// Convert a track log to CSV
    ToCsv {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a track log from CSV; a .gz output is gzipped
    FromCsv {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },

    /// Dump header, counters, problems and samples as JSON
    ToJson {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = init_config(cli.config.as_deref()).map_err(|e| anyhow!(e))?;

    tracing_subscriber::fmt()
        .with_max_level(log_level(config, cli.verbose))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Info { input } => info_cmd(&input),
        Commands::ToCsv { input, output } => {
            let output = output.unwrap_or_else(|| derive_output(&input, "csv"));
            to_csv(&input, &output, config.csv_delimiter)
        }
        Commands::FromCsv {
            input,
            output,
            force,
        } => {
            let output = output.unwrap_or_else(|| derive_output(&input, "gpy"));
            from_csv(&input, &output, force)
        }
        Commands::ToJson { input, output } => to_json(&input, output.as_deref()),
    }
}

/// `track.gpy.gz` -> `track.<extension>`
fn derive_output(input: &Path, extension: &str) -> PathBuf {
    let base = if input.extension().is_some_and(|ext| ext == "gz") {
        input.with_extension("")
    } else {
        input.to_path_buf()
    };
    base.with_extension(extension)
}

fn load(input: &Path) -> Result<TrackLog> {
    read_file(input).with_context(|| format!("failed to read {}", input.display()))
}

fn format_time(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| timestamp.to_string())
}

fn format_position(sample: &Sample) -> String {
    format!(
        "{:.6}, {:.6} ({} fix, {} sats)",
        sample.latitude_degrees(),
        sample.longitude_degrees(),
        sample.fix_quality(),
        sample.satellites
    )
}

fn info_cmd(input: &Path) -> Result<()> {
    let track = load(input)?;
    let header = &track.header;

    println!("File:                {}", input.display());
    println!("Device type:         {}", header.device_type);
    println!("Device description:  {}", header.device_description);
    println!("Device name:         {}", header.device_name);
    println!("Serial number:       {}", header.serial_number);
    println!("Firmware:            {}", header.firmware_version);
    println!("{}", track.stats);

    if let Some((first, last)) = track.time_range() {
        println!("First sample:        {}", format_time(first));
        println!("Last sample:         {}", format_time(last));
    }
    if let (Some(first), Some(last)) = (track.samples.first(), track.samples.last()) {
        println!("First position:      {}", format_position(first));
        println!("Last position:       {}", format_position(last));
    }

    if !track.problems.is_empty() {
        println!();
        println!("Problems:");
        for problem in &track.problems {
            println!("  {}", problem);
        }
        if track.stats.problems_omitted > 0 {
            println!("  ... and {} more", track.stats.problems_omitted);
        }
    }
    Ok(())
}

fn to_csv(input: &Path, output: &Path, delim: char) -> Result<()> {
    let track = load(input)?;

    let file = File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut out = BufWriter::new(file);
    write_csv(&mut out, &track.samples, delim)?;
    out.flush()?;

    info!("wrote {} samples to {}", track.len(), output.display());
    Ok(())
}

fn from_csv(input: &Path, output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists, use --force to overwrite", output.display());
    }

    let config = utils::conf_helper::get_cached_config();
    let text = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let samples = parse_csv(&text, config.csv_delimiter)
        .with_context(|| format!("failed to parse {}", input.display()))?;
    debug!("parsed {} samples from {}", samples.len(), input.display());

    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let header = FileHeader::new(
        DeviceType::Unknown,
        config.device.description.as_str(),
        name,
        config.device.serial_number.as_str(),
        config.device.firmware_version.as_str(),
    );

    write_file(output, &header, &samples, config.writer_config())
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}

fn to_json(input: &Path, output: Option<&Path>) -> Result<()> {
    let track = load(input)?;

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut out, &track)?;
            writeln!(out)?;
            out.flush()?;
            info!("wrote {} samples to {}", track.len(), path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            serde_json::to_writer_pretty(&mut out, &track)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
