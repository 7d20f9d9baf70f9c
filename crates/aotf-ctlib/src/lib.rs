//! aotf-ctlib - Vendor library transport for AOTF controllers
//!
//! The controller vendor ships a dynamic library (`AotfLibrary`) exposing a
//! handful of C functions. This crate loads it at runtime with `libloading`
//! and implements [`aotf_core::Transport`] on top of it.
//!
//! # Example
//!
//! ```ignore
//! use aotf_ctlib::CtLibrary;
//!
//! let library = CtLibrary::load(aotf_ctlib::DEFAULT_LIBRARY)?;
//! let mut aotf = aotf_core::Aotf::new(library, table);
//! aotf.open(0)?;
//! ```

pub mod error;
pub mod library;

pub use error::{CtLibError, Result};
pub use library::CtLibrary;

/// Platform file name of the vendor library
#[cfg(windows)]
pub const DEFAULT_LIBRARY: &str = "AotfLibrary.dll";

/// Platform file name of the vendor library
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY: &str = "libAotfLibrary.dylib";

/// Platform file name of the vendor library
#[cfg(not(any(windows, target_os = "macos")))]
pub const DEFAULT_LIBRARY: &str = "libAotfLibrary.so";
