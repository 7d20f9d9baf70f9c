//! Error types for aotf-core
//!
//! A query that runs out of time is not an error: it is reported as
//! [`Response::TimedOut`](crate::protocol::Response::TimedOut). The variants
//! here are the hard failures that always reach the caller.

use thiserror::Error;

/// Core error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// An operation other than `open` was attempted without a held handle
    #[error("communication with the controller has not been opened, or failed")]
    NotOpen,

    /// The transport refused to open the controller
    #[error("AOTF controller with index {index} could not be opened")]
    DeviceOpen {
        /// Requested controller index
        index: u32,
    },

    /// The transport refused to close the controller; the handle is kept
    #[error("AOTF controller could not be closed")]
    DeviceClose,

    /// The transport write primitive reported failure
    #[error("could not send data to the controller")]
    TransportWrite,

    /// The transport read primitive reported failure
    #[error("could not read data from the controller")]
    TransportRead,

    /// Channel argument outside `[0, CHANNEL_COUNT - 1]`
    #[error("channel {channel} is not a valid channel [0-{}]", crate::CHANNEL_COUNT - 1)]
    InvalidChannel {
        /// Rejected channel
        channel: i32,
    },

    /// Amplitude outside the device-native range `[0, AMPLITUDE_MAX]`
    #[error("amplitude {value} is outside the device range [0-{}]", crate::AMPLITUDE_MAX)]
    InvalidAmplitude {
        /// Rejected device-native value
        value: f64,
    },

    /// Frequency that cannot be sent to the controller (NaN or infinite)
    #[error("frequency {value} is not a finite number")]
    InvalidFrequency {
        /// Rejected frequency
        value: f64,
    },

    /// Calibration data could not be read or is malformed
    #[error("calibration error: {0}")]
    Calibration(String),
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
