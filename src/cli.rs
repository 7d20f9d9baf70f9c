//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Calibration file looked up when `--calibration` is not given
pub const DEFAULT_CALIBRATION_FILE: &str = "calibration.toml";

#[derive(Parser)]
#[command(name = "aotf")]
#[command(author, version, about = "AOTF controller control", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Calibration table (TOML format)
    /// Defaults to ./calibration.toml, which may be absent
    #[arg(long, global = true)]
    pub calibration: Option<PathBuf>,

    /// Query timeout in milliseconds
    #[arg(long, global = true, default_value_t = 10_000)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

/// Device selection shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Device to use, as name[:key=value,...] (see list-devices)
    #[arg(short, long)]
    pub device: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show board serial number, date and controller index
    Info {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Reset the direct digital synthesizer
    Reset {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Send a raw command and print the reply
    Query {
        #[command(flatten)]
        device: DeviceArgs,

        /// Command text, without terminator (e.g. "BoardId Serial")
        command: String,
    },

    /// Set the acoustic frequency of a channel
    Frequency {
        #[command(flatten)]
        device: DeviceArgs,

        /// RF channel [0-7]
        #[arg(short, long, allow_negative_numbers = true)]
        channel: i32,

        /// Frequency in MHz
        #[arg(long, conflicts_with = "hz", required_unless_present = "hz")]
        mhz: Option<f64>,

        /// Frequency in Hz
        #[arg(long)]
        hz: Option<f64>,
    },

    /// Set the amplitude of a channel
    Amplitude {
        #[command(flatten)]
        device: DeviceArgs,

        /// RF channel [0-7]
        #[arg(short, long, allow_negative_numbers = true)]
        channel: i32,

        /// Amplitude in percent of full scale
        #[arg(long, conflicts_with = "raw", required_unless_present = "raw")]
        percent: Option<f64>,

        /// Device-native amplitude [0-16383]
        #[arg(long, allow_negative_numbers = true)]
        raw: Option<i32>,
    },

    /// Tune a channel to a wavelength through a calibration
    Wavelength {
        #[command(flatten)]
        device: DeviceArgs,

        /// RF channel [0-7]
        #[arg(short, long, allow_negative_numbers = true)]
        channel: i32,

        /// Calibration id from the calibration table
        #[arg(long)]
        id: String,

        /// Wavelength (same unit as the calibration domain)
        wavelength: f64,
    },

    /// List supported devices
    ListDevices,

    /// List calibrations from the calibration table
    ListCalibrations,
}
