//! aotf-core - Protocol engine for acousto-optic tunable filter controllers
//!
//! This crate drives an AOTF controller over a vendor-supplied byte
//! transport. It owns the device handle, frames textual commands, waits for
//! the echo-plus-asterisk completion convention, and converts physical units
//! (wavelength, frequency, amplitude) into device commands.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Aotf<T> (controller)                        │
//! │  - handle guard, channel/amplitude checks    │
//! │  - command formatting, calibration lookup    │
//! └──────────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌──────────────────────────────────────────────┐
//! │  protocol: framing, PendingExchange, Response│
//! └──────────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌──────────────────────────────────────────────┐
//! │  Transport (vendor library, dummy, ...)      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use aotf_core::{Aotf, AotfConfig, CalibrationTable};
//!
//! let table = Arc::new(CalibrationTable::from_toml_file("calibration.toml")?);
//! let mut aotf = Aotf::with_config(transport, table, AotfConfig::default());
//! aotf.open(0)?;
//! println!("serial: {}", aotf.serial()?);
//! let _ = aotf.select_calibration("RF1");
//! aotf.set_wavelength(532.0, 0)?;
//! aotf.close()?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod calibration;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod transport;

pub use calibration::{Calibration, CalibrationTable, Domain, Polynomial};
pub use controller::{Aotf, AotfConfig, Outcome, SkipReason};
pub use error::{Error, Result};
pub use protocol::Response;
pub use transport::{Handle, Transport};

/// Number of independent RF drive channels on the controller
pub const CHANNEL_COUNT: u8 = 8;

/// Largest device-native amplitude value
pub const AMPLITUDE_MAX: u16 = 16383;
