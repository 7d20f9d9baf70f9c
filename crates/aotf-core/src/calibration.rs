//! Wavelength calibration tables
//!
//! A calibration maps an optical wavelength to the acoustic drive frequency
//! (MHz) through a polynomial that is only trusted inside a closed domain.
//! Tables are parsed from TOML, one table per calibration id:
//!
//! ```toml
//! [RF1]
//! coeffs = [ 180.5, -0.21, 1.1e-4 ]
//! domain = [ 450.0, 700.0 ]
//!
//! [RF2]
//! coeffs = [ 95.0, -0.05 ]
//! domain = [ 700.0, 1000.0 ]
//! ```
//!
//! Coefficients are ordered from low to high degree.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Closed interval of valid wavelengths
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    /// Lower bound (inclusive)
    pub min: f64,
    /// Upper bound (inclusive)
    pub max: f64,
}

impl Domain {
    /// Create a domain, rejecting reversed or non-finite bounds
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(Error::Calibration(format!(
                "domain bounds must be finite, got [{}, {}]",
                min, max
            )));
        }
        if min > max {
            return Err(Error::Calibration(format!(
                "domain minimum {} is greater than maximum {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// Whether `value` lies within the closed interval
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Power series with coefficients ordered from low to high degree
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    /// Create a polynomial from its coefficients
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    /// Coefficients, lowest degree first
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Evaluate at `x` using Horner's method
    pub fn eval(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * x + c)
    }
}

/// Wavelength-to-frequency calibration
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    /// Calibration id (the table key)
    pub id: String,
    /// Wavelength to frequency (MHz) polynomial
    pub polynomial: Polynomial,
    /// Wavelengths the polynomial is valid for
    pub domain: Domain,
}

impl Calibration {
    /// Frequency in MHz for `wavelength`, or `None` outside the domain
    pub fn frequency_mhz(&self, wavelength: f64) -> Option<f64> {
        self.domain
            .contains(wavelength)
            .then(|| self.polynomial.eval(wavelength))
    }
}

/// Calibration entry as written in the TOML file
#[derive(Debug, Deserialize)]
struct TomlCalibration {
    coeffs: Vec<f64>,
    domain: Vec<f64>,
}

impl TomlCalibration {
    fn into_calibration(self, id: String) -> Result<Calibration> {
        let invalid = |msg: String| Error::Calibration(format!("{}: {}", id, msg));

        if self.coeffs.is_empty() {
            return Err(invalid("at least one coefficient is required".into()));
        }
        if let Some(c) = self.coeffs.iter().find(|c| !c.is_finite()) {
            return Err(invalid(format!("coefficient {} is not finite", c)));
        }
        let domain = match self.domain.as_slice() {
            &[min, max] => Domain::new(min, max).map_err(|e| invalid(e.to_string()))?,
            other => {
                return Err(invalid(format!(
                    "domain needs exactly two values, got {}",
                    other.len()
                )))
            }
        };

        Ok(Calibration {
            id,
            polynomial: Polynomial::new(self.coeffs),
            domain,
        })
    }
}

/// Immutable set of calibrations keyed by id
///
/// Loaded once and shared read-only between controller instances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationTable {
    entries: BTreeMap<String, Calibration>,
}

impl CalibrationTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from calibrations, keyed by their ids
    pub fn from_calibrations(calibrations: impl IntoIterator<Item = Calibration>) -> Self {
        Self {
            entries: calibrations
                .into_iter()
                .map(|cal| (cal.id.clone(), cal))
                .collect(),
        }
    }

    /// Load a table from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Calibration(format!("{}: {}", path.display(), e)))?;
        let table = Self::from_toml_str(&content)?;
        log::debug!(
            "aotf: loaded {} calibration(s) from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Parse a table from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: BTreeMap<String, TomlCalibration> =
            toml::from_str(content).map_err(|e| Error::Calibration(e.to_string()))?;

        let mut entries = BTreeMap::new();
        for (id, raw) in file {
            let calibration = raw.into_calibration(id.clone())?;
            entries.insert(id, calibration);
        }
        Ok(Self { entries })
    }

    /// Look up a calibration by id
    pub fn get(&self, id: &str) -> Option<&Calibration> {
        self.entries.get(id)
    }

    /// Whether a calibration with this id exists
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Calibration ids in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// All calibrations in id order
    pub fn iter(&self) -> impl Iterator<Item = &Calibration> {
        self.entries.values()
    }

    /// Number of calibrations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
