//! Hardware envelope, tuning and volume conversion.
//!
//! All functions here are pure. They take raw register fields as found in
//! sample headers or inline sequence opcodes and return time-domain values
//! an exporter can use directly.

pub mod psx;
pub mod snes;
pub mod tuning;
pub mod volume;

use serde::Serialize;
use thiserror::Error;

pub use psx::PsxEnvelope;
pub use snes::{SnesEnvelope, SnesGain, SnesVolumeEnvelope};
pub use tuning::{PitchMultiplier, Tuning};
pub use volume::VolumeScale;

/// Errors from envelope and tuning conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// A register field lies outside its hardware range.
    #[error("{field} = {value} is outside 0..={max}")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: u32,
        /// Largest valid value.
        max: u32,
    },
    /// A pitch multiplier of zero (or a zero base) cannot be converted.
    #[error("pitch multiplier {word}/{base} is not positive")]
    InvalidMultiplier {
        /// Numerator as encoded.
        word: u32,
        /// Denominator as encoded.
        base: u32,
    },
}

/// Convenient result alias for conversions.
pub type Result<T> = std::result::Result<T, EnvelopeError>;

/// Time-domain ADSR envelope.
///
/// Times are in seconds. `decay_time` and `release_time` are the time the
/// respective slope needs to fall from full level to silence; the sustain
/// level cuts the decay short.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Adsr {
    /// Time from key-on to peak.
    pub attack_time: f64,
    /// Decay slope time.
    pub decay_time: f64,
    /// Sustain level as a fraction of peak (0..=1).
    pub sustain_level: f64,
    /// Sustain decay slope time; `None` holds the sustain level indefinitely.
    pub sustain_time: Option<f64>,
    /// Release slope time.
    pub release_time: f64,
}

impl Default for Adsr {
    fn default() -> Self {
        Self {
            attack_time: 0.0,
            decay_time: 0.0,
            sustain_level: 1.0,
            sustain_time: None,
            release_time: 0.0,
        }
    }
}

pub(crate) fn check_range(field: &'static str, value: u8, max: u8) -> Result<()> {
    if value > max {
        return Err(EnvelopeError::OutOfRange {
            field,
            value: value as u32,
            max: max as u32,
        });
    }
    Ok(())
}
