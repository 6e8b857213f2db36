//! Fixed-point pitch multipliers to semitone/cent offsets.

use serde::Serialize;

use super::{EnvelopeError, Result};

/// Pitch multiplier as encoded by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchMultiplier {
    /// `word / base` (PSX pitch words use base 4096 for the output rate).
    WordOverBase {
        /// Encoded word.
        word: u32,
        /// Platform base.
        base: u32,
    },
    /// `whole + frac / 256` byte pair (N-SPC instrument tuning).
    FixedPoint8_8 {
        /// Integer part.
        whole: u8,
        /// Fraction in 1/256 units.
        frac: u8,
    },
}

impl PitchMultiplier {
    /// The multiplier as a float; errors if it is not positive.
    pub fn value(&self) -> Result<f64> {
        match *self {
            PitchMultiplier::WordOverBase { word, base } => {
                if word == 0 || base == 0 {
                    return Err(EnvelopeError::InvalidMultiplier { word, base });
                }
                Ok(word as f64 / base as f64)
            }
            PitchMultiplier::FixedPoint8_8 { whole, frac } => {
                let raw = ((whole as u32) << 8) | frac as u32;
                if raw == 0 {
                    return Err(EnvelopeError::InvalidMultiplier {
                        word: raw,
                        base: 256,
                    });
                }
                Ok(raw as f64 / 256.0)
            }
        }
    }

    /// Convert to a semitone offset.
    pub fn to_tuning(&self) -> Result<Tuning> {
        Ok(Tuning::from_semitones(self.value()?.log2() * 12.0))
    }
}

/// Semitone offset split into a coarse part and cents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tuning {
    /// Whole semitones.
    pub coarse: i32,
    /// Remaining offset in cents, in `[-50, 50)`.
    pub cents: f64,
}

impl Tuning {
    /// Split a fractional semitone value, keeping the fraction in `[-0.5, 0.5)`.
    pub fn from_semitones(semitones: f64) -> Self {
        let mut coarse = semitones.trunc();
        let mut frac = semitones - coarse;
        if frac >= 0.5 {
            coarse += 1.0;
            frac -= 1.0;
        } else if frac < -0.5 {
            coarse -= 1.0;
            frac += 1.0;
        }
        Self {
            coarse: coarse as i32,
            cents: frac * 100.0,
        }
    }

    /// Total offset in semitones.
    pub fn semitones(&self) -> f64 {
        self.coarse as f64 + self.cents / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn exact_semitone_multipliers_round_trip() {
        for n in -24..=24 {
            let base = 1u32 << 24;
            let word = (2f64.powf(n as f64 / 12.0) * base as f64).round() as u32;
            let t = PitchMultiplier::WordOverBase { word, base }
                .to_tuning()
                .unwrap();
            assert_eq!(t.coarse, n, "n = {n}");
            assert_abs_diff_eq!(t.cents, 0.0, epsilon = 0.01);

            let exact = Tuning::from_semitones(2f64.powf(n as f64 / 12.0).log2() * 12.0);
            assert_eq!(exact.coarse, n);
            assert_abs_diff_eq!(exact.cents, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn fraction_carries_into_coarse() {
        let t = Tuning::from_semitones(2.7);
        assert_eq!(t.coarse, 3);
        assert_abs_diff_eq!(t.cents, -30.0, epsilon = 1e-9);

        let t = Tuning::from_semitones(-2.7);
        assert_eq!(t.coarse, -3);
        assert_abs_diff_eq!(t.cents, 30.0, epsilon = 1e-9);

        let t = Tuning::from_semitones(-0.5);
        assert_eq!(t.coarse, 0);
        assert_abs_diff_eq!(t.cents, -50.0, epsilon = 1e-9);
    }

    #[test]
    fn byte_pair_multiplier() {
        let t = PitchMultiplier::FixedPoint8_8 {
            whole: 2,
            frac: 0,
        }
        .to_tuning()
        .unwrap();
        assert_eq!(t.coarse, 12);

        let t = PitchMultiplier::FixedPoint8_8 {
            whole: 0,
            frac: 0x80,
        }
        .to_tuning()
        .unwrap();
        assert_eq!(t.coarse, -12);
    }

    #[test]
    fn zero_multiplier_is_rejected() {
        assert!(PitchMultiplier::WordOverBase { word: 0, base: 4096 }
            .to_tuning()
            .is_err());
        assert!(PitchMultiplier::FixedPoint8_8 { whole: 0, frac: 0 }
            .value()
            .is_err());
    }
}
