//! Krumbein phi scale conversion.
//!
//! Sedimentology orders grain sizes on the logarithmic phi scale,
//! `phi = -log2(diameter / reference)`, with a 1 mm reference diameter. The
//! pipeline uses phi only as the channel ordering key for the compositional
//! transform; it is strictly decreasing in diameter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors for diameter-to-phi conversion.
#[derive(Debug, thiserror::Error)]
pub enum PhiError {
    /// The unit string is neither micrometers nor millimeters
    #[error("unknown diameter unit {0:?} (expected \"\u{b5}m\" or \"mm\")")]
    UnknownUnit(String),
}

/// Unit of a channel diameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhiUnit {
    /// Micrometers (the analyzer's native channel unit).
    Micrometers,
    /// Millimeters.
    Millimeters,
}

impl FromStr for PhiUnit {
    type Err = PhiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "\u{b5}m" | "um" => Ok(PhiUnit::Micrometers),
            "mm" => Ok(PhiUnit::Millimeters),
            other => Err(PhiError::UnknownUnit(other.to_string())),
        }
    }
}

impl fmt::Display for PhiUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhiUnit::Micrometers => f.write_str("\u{b5}m"),
            PhiUnit::Millimeters => f.write_str("mm"),
        }
    }
}

/// Convert a grain diameter to the Krumbein phi scale.
///
/// `diameter_to_phi(1000.0, PhiUnit::Micrometers)` is exactly 0.
pub fn diameter_to_phi(diameter: f64, unit: PhiUnit) -> f64 {
    match unit {
        PhiUnit::Micrometers => -(diameter / 1000.0).log2(),
        PhiUnit::Millimeters => -diameter.log2(),
    }
}
