//! aotf - Command-line control of acousto-optic tunable filter controllers
//!
//! # Architecture
//!
//! Every device command follows the same path:
//! - the device string selects a transport (vendor library or simulator)
//! - an [`aotf_core::Aotf`] engine opens the controller with it
//! - the command runs against the engine
//! - the controller is closed, whether the command succeeded or not
//!
//! Calibrations are loaded once from a TOML table and shared read-only.

mod cli;
mod commands;
mod devices;

use clap::Parser;
use cli::{Cli, Commands, DEFAULT_CALIBRATION_FILE};

use aotf_core::{AotfConfig, CalibrationTable};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG still wins over -v
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.verbose)),
    )
    .init();

    let calibrations = match load_calibrations(cli.calibration.as_deref()) {
        Ok(table) => Arc::new(table),
        Err(e) => {
            eprintln!("Failed to load calibrations: {}", e);
            std::process::exit(1);
        }
    };
    log::debug!("Loaded {} calibration(s)", calibrations.len());

    let config = AotfConfig::new().with_timeout(Duration::from_millis(cli.timeout));

    match cli.command {
        Commands::Info { device } => {
            devices::with_aotf(&device.device, calibrations, config, |aotf| {
                commands::device::cmd_info(aotf)
            })
        }
        Commands::Reset { device } => {
            devices::with_aotf(&device.device, calibrations, config, |aotf| {
                commands::device::cmd_reset(aotf)
            })
        }
        Commands::Query { device, command } => {
            devices::with_aotf(&device.device, calibrations, config, |aotf| {
                commands::device::cmd_query(aotf, &command)
            })
        }
        Commands::Frequency {
            device,
            channel,
            mhz,
            hz,
        } => devices::with_aotf(&device.device, calibrations, config, |aotf| {
            commands::device::cmd_frequency(aotf, channel, mhz, hz)
        }),
        Commands::Amplitude {
            device,
            channel,
            percent,
            raw,
        } => devices::with_aotf(&device.device, calibrations, config, |aotf| {
            commands::device::cmd_amplitude(aotf, channel, percent, raw)
        }),
        Commands::Wavelength {
            device,
            channel,
            id,
            wavelength,
        } => devices::with_aotf(&device.device, calibrations, config, |aotf| {
            commands::device::cmd_wavelength(aotf, channel, &id, wavelength)
        }),
        Commands::ListDevices => {
            commands::list_devices();
            Ok(())
        }
        Commands::ListCalibrations => {
            commands::list_calibrations(&calibrations);
            Ok(())
        }
    }
}

/// Default log filter for a `-v` count
fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Load the calibration table from the specified path or the default file
///
/// A missing default file is not an error: wavelength requests are then
/// skipped until a table is provided.
fn load_calibrations(path: Option<&Path>) -> Result<CalibrationTable, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        // User specified a path
        if !path.is_file() {
            return Err(format!("Calibration file not found: {}", path.display()).into());
        }
        return Ok(CalibrationTable::from_toml_file(path)?);
    }

    let default_path = PathBuf::from(DEFAULT_CALIBRATION_FILE);
    if default_path.is_file() {
        Ok(CalibrationTable::from_toml_file(&default_path)?)
    } else {
        log::warn!(
            "No calibration table found at {}, wavelength commands are unavailable",
            default_path.display()
        );
        Ok(CalibrationTable::new())
    }
}
