//! MEF3 CLI
//!
//! Command-line tools for MEF3 time-series segments.
//!
//! # Commands
//!
//! - `init-metadata` - Create a segment and its metadata file
//! - `write-data` - Compress raw samples into a segment
//! - `inspect` - Display segment metadata and block statistics
//! - `verify` - Check segment integrity

mod commands;

use clap::{Parser, Subcommand};
use mef3_core::{SegmentNumber, SegmentPaths, WriterConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// MEF3 segment tools.
#[derive(Parser)]
#[command(name = "mef3")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the channel directory (`<name>.timd`)
    #[arg(global = true, short, long)]
    channel: Option<PathBuf>,

    /// Segment number within the channel
    #[arg(global = true, short, long, default_value = "0")]
    segment: u32,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a segment directory and its metadata file
    InitMetadata {
        /// Sampling frequency in Hz
        #[arg(short = 'f', long)]
        sampling_frequency: f64,

        /// Start time of the segment (µUTC)
        #[arg(short = 't', long)]
        start_time: i64,

        /// Factor converting raw samples to native units
        #[arg(long, default_value = "1.0", allow_negative_numbers = true)]
        conversion_factor: f64,

        /// Name of the native unit
        #[arg(long, default_value = "µV")]
        units: String,

        /// Session name, used when the channel is not inside a .mefd directory
        #[arg(long, default_value = "")]
        session: String,

        /// Channel description
        #[arg(long, default_value = "")]
        description: String,

        /// Recording time offset (µs)
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        recording_time_offset: i64,
    },

    /// Compress raw little-endian i32 samples into a segment
    WriteData {
        /// File of raw little-endian 32-bit samples
        #[arg(short, long)]
        input: PathBuf,

        /// Samples per block
        #[arg(short = 'b', long, default_value = "1000")]
        samples_per_block: u32,

        /// Quantise samples by this scale before compression
        #[arg(long)]
        lossy: Option<u32>,

        /// Skip the final fsync
        #[arg(long)]
        no_sync: bool,
    },

    /// Display segment metadata and block statistics
    Inspect {
        /// List every index record
        #[arg(short, long)]
        index: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify segment integrity
    Verify,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let segment = SegmentNumber::new(cli.segment);
    let paths = |command: &str| -> Result<SegmentPaths, Box<dyn std::error::Error>> {
        let channel = cli
            .channel
            .as_deref()
            .ok_or(format!("Channel path required for {command}"))?;
        Ok(SegmentPaths::new(channel, segment)?)
    };

    match cli.command {
        Commands::InitMetadata {
            sampling_frequency,
            start_time,
            conversion_factor,
            units,
            session,
            description,
            recording_time_offset,
        } => {
            let options = commands::init_metadata::MetadataOptions {
                sampling_frequency,
                start_time,
                conversion_factor,
                units,
                session,
                description,
                recording_time_offset,
            };
            commands::init_metadata::run(&paths("init-metadata")?, &options)?;
        }
        Commands::WriteData {
            input,
            samples_per_block,
            lossy,
            no_sync,
        } => {
            let mut config = WriterConfig::new()
                .samples_per_block(samples_per_block)
                .sync_on_finish(!no_sync);
            if let Some(scale) = lossy {
                config = config.lossy(scale);
            }
            commands::write_data::run(&paths("write-data")?, &input, &config)?;
        }
        Commands::Inspect { index, format } => {
            commands::inspect::run(&paths("inspect")?, index, &format)?;
        }
        Commands::Verify => {
            commands::verify::run(&paths("verify")?)?;
        }
        Commands::Version => {
            println!("MEF3 CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("MEF3 Core v{}", mef3_core::VERSION);
        }
    }

    Ok(())
}
