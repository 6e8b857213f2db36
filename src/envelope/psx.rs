//! PlayStation SPU ADSR conversion.
//!
//! The SPU keeps a 31-bit envelope level and adds or subtracts a step taken
//! from a rate table every sample. Exponential segments pick a larger rate
//! index as the level drops through its eight top-bit bands.
//!
//! Rate fields on [`PsxEnvelope`] are speeds: a larger value is a faster
//! slope. The hardware registers store the inverse; use
//! [`PsxEnvelope::from_registers`] for raw `ADSR1`/`ADSR2` words.

use super::{check_range, Adsr, Result};

/// PS1 SPU output rate.
pub const PS1_SAMPLE_RATE: u32 = 44_100;

/// PS2 SPU2 output rate.
pub const PS2_SAMPLE_RATE: u32 = 48_000;

const MAX_LEVEL: u32 = 0x7FFF_FFFF;

/// Per-band rate index increments for exponential decrease.
const BAND_INCREMENT: [i32; 8] = [0, 4, 6, 8, 9, 10, 11, 12];

const fn build_rate_table() -> [u32; 160] {
    let mut table = [0u32; 160];
    let mut r: u32 = 3;
    let mut rs: u32 = 1;
    let mut rd = 0;
    let mut i = 32;
    while i < 160 {
        if r < 0x3FFF_FFFF {
            r += rs;
            rd += 1;
            if rd == 5 {
                rd = 1;
                rs *= 2;
            }
        }
        if r > 0x3FFF_FFFF {
            r = 0x3FFF_FFFF;
        }
        table[i] = r;
        i += 1;
    }
    table
}

/// Envelope step per sample, indexed by rate index + 32.
pub static RATE_TABLE: [u32; 160] = build_rate_table();

/// Step for a rate index. Indices below the table floor use the slowest step.
fn rate(index: i32) -> u32 {
    RATE_TABLE[(index + 32).clamp(32, 159) as usize]
}

/// Samples an exponential decrease needs to go from `from` to at most `to`.
///
/// Returns the step count and the level after the last step.
fn exponential_walk(from: u32, to: u32, base: i32) -> (u64, i64) {
    let mut level = from as i64;
    let to = to as i64;
    let mut steps = 0u64;
    while level > to {
        let band = ((level >> 28) & 7) as usize;
        let step = rate(base + BAND_INCREMENT[band]) as i64;
        let threshold = (((band as i64) << 28) - 1).max(to);
        let n = (level - threshold + step - 1) / step;
        level -= n * step;
        steps += n as u64;
    }
    (steps, level)
}

/// Rescale a linear-amplitude decay time to the dB-linear convention
/// exporters expect (0x800 linear steps against a 100 dB floor).
pub fn lin_amp_decay_to_db_decay(seconds: f64, linear_range: u32) -> f64 {
    const EXP_MIN_DB: f64 = -100.0;
    let linear_min_db = 20.0 * (1.0 / linear_range as f64).log10();
    let scale = (linear_min_db - EXP_MIN_DB).log2();
    seconds * scale
}

/// PSX envelope fields, rates expressed as speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PsxEnvelope {
    /// 0 = linear, 1 = exponential.
    pub attack_mode: u8,
    /// 0..=127, larger is faster.
    pub attack_rate: u8,
    /// 0..=15, larger is faster.
    pub decay_rate: u8,
    /// 0..=15.
    pub sustain_level: u8,
    /// 0 = linear, 1 = exponential.
    pub sustain_mode: u8,
    /// 0 = increase, 1 = decrease.
    pub sustain_direction: u8,
    /// 0..=127, larger is faster; 0 holds the level.
    pub sustain_rate: u8,
    /// 0 = linear, 1 = exponential.
    pub release_mode: u8,
    /// 0..=31, larger is faster.
    pub release_rate: u8,
}

impl PsxEnvelope {
    /// Decode raw SPU `ADSR1`/`ADSR2` register words.
    pub fn from_registers(adsr1: u16, adsr2: u16) -> Self {
        Self {
            attack_mode: ((adsr1 >> 15) & 1) as u8,
            attack_rate: ((adsr1 >> 8) & 0x7F) as u8 ^ 0x7F,
            decay_rate: ((adsr1 >> 4) & 0x0F) as u8 ^ 0x0F,
            sustain_level: (adsr1 & 0x0F) as u8,
            sustain_mode: ((adsr2 >> 15) & 1) as u8,
            sustain_direction: ((adsr2 >> 14) & 1) as u8,
            sustain_rate: ((adsr2 >> 6) & 0x7F) as u8 ^ 0x7F,
            release_mode: ((adsr2 >> 5) & 1) as u8,
            release_rate: (adsr2 & 0x1F) as u8 ^ 0x1F,
        }
    }

    /// Reject fields outside their register width.
    pub fn validate(&self) -> Result<()> {
        check_range("attack mode", self.attack_mode, 1)?;
        check_range("attack rate", self.attack_rate, 127)?;
        check_range("decay rate", self.decay_rate, 15)?;
        check_range("sustain level", self.sustain_level, 15)?;
        check_range("sustain mode", self.sustain_mode, 1)?;
        check_range("sustain direction", self.sustain_direction, 1)?;
        check_range("sustain rate", self.sustain_rate, 127)?;
        check_range("release mode", self.release_mode, 1)?;
        check_range("release rate", self.release_rate, 31)
    }

    /// Attack duration in samples.
    pub fn attack_samples(&self) -> f64 {
        let r = self.attack_rate as i32;
        if self.attack_mode == 0 {
            MAX_LEVEL as f64 / rate(r - 0x10) as f64
        } else {
            // Fast slope up to 3/4, then the slow tail.
            0x6000_0000 as f64 / rate(r - 0x10) as f64
                + 0x1FFF_FFFF as f64 / rate(r - 0x18) as f64
        }
    }

    /// Convert to a time-domain envelope at `sample_rate`.
    pub fn to_adsr(&self, sample_rate: u32) -> Result<Adsr> {
        self.validate()?;
        let sr = sample_rate as f64;

        let attack_time = self.attack_samples() / sr;

        let decay_base = 4 * (self.decay_rate as i32 + 16) - 0x18;
        let (decay_steps, _) = exponential_walk(MAX_LEVEL, 0, decay_base);
        let decay_time = lin_amp_decay_to_db_decay(decay_steps as f64 / sr, 0x800);

        let sustain_floor = ((self.sustain_level as u32 + 1) << 27) - 1;
        let (_, level_at_sustain) = exponential_walk(MAX_LEVEL, sustain_floor, decay_base);
        let mut sustain_level = level_at_sustain.max(0) as f64 / MAX_LEVEL as f64;

        let sustain_time = if self.sustain_direction == 0 || self.sustain_rate == 0 {
            None
        } else {
            let s = self.sustain_rate as i32;
            let samples = if self.sustain_mode == 0 {
                MAX_LEVEL as f64 / rate(s - 0x0F) as f64
            } else {
                exponential_walk(MAX_LEVEL, 0, s - 0x1B).0 as f64
            };
            Some(lin_amp_decay_to_db_decay(samples / sr, 0x800))
        };

        let q = self.release_rate as i32;
        let release_samples = if self.release_mode == 0 {
            MAX_LEVEL as f64 / rate(4 * q - 0x0C) as f64
        } else {
            exponential_walk(MAX_LEVEL, 0, 4 * q - 0x18).0 as f64
        };
        let release_time = lin_amp_decay_to_db_decay(release_samples / sr, 0x800);

        let mut decay_time = decay_time;
        // Near-full sustain with a finite decreasing sustain: the sustain slope
        // does the audible decaying, so it stands in for the decay segment.
        if self.sustain_level >= 0x0C && self.sustain_direction == 1 && self.sustain_rate >= 2 {
            if let Some(t) = sustain_time {
                decay_time = t;
                sustain_level = 0.0;
            }
        }

        Ok(Adsr {
            attack_time,
            decay_time,
            sustain_level,
            sustain_time,
            release_time,
        })
    }
}
