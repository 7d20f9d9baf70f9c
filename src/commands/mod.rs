//! CLI command implementations
//!
//! Device commands receive an opened [`aotf_core::Aotf`]; opening and
//! closing the controller is handled by [`crate::devices::with_aotf`].

pub mod device;
mod list;

pub use list::{list_calibrations, list_devices};
