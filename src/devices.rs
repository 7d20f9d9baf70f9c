//! Device registration and dispatch
//!
//! This module provides a centralized registry for all transports, with
//! support for feature-gated inclusion and dynamic help text generation.

use std::sync::Arc;

use aotf_core::{Aotf, AotfConfig, CalibrationTable, Transport};

/// Information about a device backend
pub struct DeviceInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available devices (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_devices() -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    #[cfg(feature = "dummy")]
    devices.push(DeviceInfo {
        name: "dummy",
        aliases: &["sim"],
        description: "Simulated controller (serial=<s>,date=<d>,controllers=<n>,chunk=<bytes>)",
    });

    #[cfg(feature = "ctlib")]
    devices.push(DeviceInfo {
        name: "ctlib",
        aliases: &["aotflibrary"],
        description: "Vendor AotfLibrary driver (lib=<path>)",
    });

    devices
}

/// Generate help text listing all available devices
pub fn device_help() -> String {
    let devices = available_devices();

    if devices.is_empty() {
        return "No devices available (recompile with device features enabled)".to_string();
    }

    let mut help = String::from("Available devices:\n");
    for d in &devices {
        help.push_str(&format!("  {:8} - {}\n", d.name, d.description));
    }
    help.push_str("All devices accept index=<n> to pick the controller");
    help
}

/// Resolve a device name or alias to its primary name
pub fn find_device(name: &str) -> Option<&'static str> {
    available_devices()
        .into_iter()
        .find(|d| d.name == name || d.aliases.iter().any(|alias| *alias == name))
        .map(|d| d.name)
}

/// Parse a device string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_device_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

fn option<'a>(options: &[(&str, &'a str)], key: &str) -> Option<&'a str> {
    options.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn numeric_option<T: core::str::FromStr>(
    options: &[(&str, &str)],
    key: &str,
) -> Result<Option<T>, Box<dyn std::error::Error>> {
    option(options, key)
        .map(|v| {
            v.parse::<T>().map_err(|_| {
                Box::<dyn std::error::Error>::from(format!("Invalid value for {}: {}", key, v))
            })
        })
        .transpose()
}

/// Create the transport named by `device`
///
/// Returns the transport and the controller index to open.
#[allow(unused_variables)]
pub fn open_transport(
    device: &str,
) -> Result<(Box<dyn Transport>, u32), Box<dyn std::error::Error>> {
    let (name, options) = parse_device_string(device);
    let canonical_name = find_device(name).ok_or_else(|| unknown_device_error(name))?;
    let index = numeric_option::<u32>(&options, "index")?.unwrap_or(0);

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            use aotf_dummy::{DummyConfig, DummyController};

            let mut config = DummyConfig::default();
            if let Some(serial) = option(&options, "serial") {
                config.serial = serial.to_string();
            }
            if let Some(date) = option(&options, "date") {
                config.date = date.to_string();
            }
            if let Some(controllers) = numeric_option::<u32>(&options, "controllers")? {
                config.controllers = controllers;
            }
            if let Some(chunk) = numeric_option::<usize>(&options, "chunk")? {
                config.chunk_size = chunk.max(1);
            }

            log::info!("Using simulated AOTF controller");
            let transport: Box<dyn Transport> = Box::new(DummyController::new(config));
            Ok((transport, index))
        }

        #[cfg(feature = "ctlib")]
        "ctlib" => {
            let lib = option(&options, "lib").unwrap_or(aotf_ctlib::DEFAULT_LIBRARY);
            log::info!("Loading AOTF library {}...", lib);
            let library = aotf_ctlib::CtLibrary::load(lib).map_err(|e| {
                format!(
                    "{}\nMake sure the vendor driver is installed or pass ctlib:lib=<path>.",
                    e
                )
            })?;
            let transport: Box<dyn Transport> = Box::new(library);
            Ok((transport, index))
        }

        _ => Err(unknown_device_error(name)),
    }
}

/// Execute a function with an opened controller
///
/// The controller is always closed afterwards, also when `f` fails. The
/// device string can be just the name (e.g., "dummy") or include parameters
/// (e.g., "ctlib:lib=/opt/aotf/libAotfLibrary.so,index=1").
pub fn with_aotf<F>(
    device: &str,
    calibrations: Arc<CalibrationTable>,
    config: AotfConfig,
    f: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut Aotf<Box<dyn Transport>>) -> Result<(), Box<dyn std::error::Error>>,
{
    let (transport, index) = open_transport(device)?;
    let mut aotf = Aotf::with_config(transport, calibrations, config);
    aotf.open(index)
        .map_err(|e| format!("{}\nMake sure the controller is connected and powered.", e))?;

    let result = f(&mut aotf);
    let closed = aotf.close();
    result?;
    closed?;
    Ok(())
}

fn unknown_device_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown device: {}\n\n", name);
    msg.push_str(&device_help());
    msg.push_str("\nUse 'aotf list-devices' for more details");
    msg.into()
}
