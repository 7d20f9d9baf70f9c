//! Error types for vendor library loading

use std::path::PathBuf;

use thiserror::Error;

/// Vendor library errors
#[derive(Debug, Error)]
pub enum CtLibError {
    /// The dynamic library could not be loaded
    #[error("failed to load {}: {source}", .path.display())]
    Load {
        /// Library path as given
        path: PathBuf,
        /// Loader error
        source: libloading::Error,
    },

    /// A required entry point is missing from the library
    #[error("symbol {name} not found in AOTF library: {source}")]
    MissingSymbol {
        /// Entry point name
        name: &'static str,
        /// Loader error
        source: libloading::Error,
    },
}

/// Result type for vendor library operations
pub type Result<T> = core::result::Result<T, CtLibError>;
