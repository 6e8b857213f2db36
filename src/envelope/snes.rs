//! SNES S-DSP ADSR and GAIN conversion.
//!
//! The DSP envelope is an 11-bit level updated whenever a per-rate counter
//! expires. [`COUNTER_RATES`] gives the number of output samples between
//! updates for each 5-bit rate.

use super::{check_range, Adsr, Result};

/// S-DSP output rate.
pub const DSP_SAMPLE_RATE: u32 = 32_000;

/// Samples between envelope updates per rate; rate 0 never updates.
pub const COUNTER_RATES: [u32; 32] = [
    0, 2048, 1536, 1280, 1024, 768, 640, 512, 384, 320, 256, 192, 160, 128, 96, 80, 64, 48, 40,
    32, 24, 20, 16, 12, 10, 8, 6, 5, 4, 3, 2, 1,
];

const MAX_LEVEL: u32 = 0x7FF;

/// Release subtracts this every sample.
const RELEASE_STEP: u32 = 8;

/// ADSR-mode fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnesEnvelope {
    /// 0..=15.
    pub attack_rate: u8,
    /// 0..=7.
    pub decay_rate: u8,
    /// 0..=7; boundary is `(level + 1) / 8`.
    pub sustain_level: u8,
    /// 0..=31; 0 holds the level.
    pub sustain_rate: u8,
}

/// GAIN-mode settings (used when ADSR is disabled).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnesGain {
    /// Fixed level, 0..=127 (scaled by 16).
    Direct(u8),
    /// Linear decrease at a 5-bit rate.
    LinearDecrease(u8),
    /// Exponential decrease at a 5-bit rate.
    ExponentialDecrease(u8),
    /// Linear increase at a 5-bit rate.
    LinearIncrease(u8),
    /// Linear increase that slows down above 3/4 level.
    BentIncrease(u8),
}

/// The envelope generator configuration of one voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnesVolumeEnvelope {
    /// Hardware ADSR.
    Adsr(SnesEnvelope),
    /// Software-driven GAIN.
    Gain(SnesGain),
}

impl SnesVolumeEnvelope {
    /// Decode the `ADSR1`, `ADSR2` and `GAIN` register bytes.
    pub fn from_registers(adsr1: u8, adsr2: u8, gain: u8) -> Self {
        if adsr1 & 0x80 != 0 {
            return SnesVolumeEnvelope::Adsr(SnesEnvelope {
                attack_rate: adsr1 & 0x0F,
                decay_rate: (adsr1 >> 4) & 0x07,
                sustain_level: adsr2 >> 5,
                sustain_rate: adsr2 & 0x1F,
            });
        }
        let rate = gain & 0x1F;
        SnesVolumeEnvelope::Gain(if gain & 0x80 == 0 {
            SnesGain::Direct(gain & 0x7F)
        } else {
            match (gain >> 5) & 0x03 {
                0 => SnesGain::LinearDecrease(rate),
                1 => SnesGain::ExponentialDecrease(rate),
                2 => SnesGain::LinearIncrease(rate),
                _ => SnesGain::BentIncrease(rate),
            }
        })
    }

    /// Convert to a time-domain envelope.
    pub fn to_adsr(&self) -> Result<Adsr> {
        match self {
            SnesVolumeEnvelope::Adsr(env) => env.to_adsr(),
            SnesVolumeEnvelope::Gain(gain) => gain.to_adsr(),
        }
    }
}

fn seconds(steps: u32, rate: u8) -> f64 {
    (steps as u64 * COUNTER_RATES[rate as usize] as u64) as f64 / DSP_SAMPLE_RATE as f64
}

/// Updates an exponential decrease needs to fall from `from` to `to`.
fn exponential_steps(from: u32, to: u32) -> u32 {
    let mut level = from;
    let mut steps = 0;
    while level > to {
        level -= ((level - 1) >> 8) + 1;
        steps += 1;
    }
    steps
}

fn release_time() -> f64 {
    (MAX_LEVEL / RELEASE_STEP + 1) as f64 / DSP_SAMPLE_RATE as f64
}

impl SnesEnvelope {
    /// Reject fields outside their register width.
    pub fn validate(&self) -> Result<()> {
        check_range("attack rate", self.attack_rate, 15)?;
        check_range("decay rate", self.decay_rate, 7)?;
        check_range("sustain level", self.sustain_level, 7)?;
        check_range("sustain rate", self.sustain_rate, 31)
    }

    /// Convert to a time-domain envelope.
    pub fn to_adsr(&self) -> Result<Adsr> {
        self.validate()?;

        let attack_time = if self.attack_rate == 15 {
            seconds(MAX_LEVEL.div_ceil(1024), 31)
        } else {
            seconds(MAX_LEVEL.div_ceil(32), self.attack_rate * 2 + 1)
        };

        let decay_time = seconds(exponential_steps(MAX_LEVEL, 0), self.decay_rate * 2 + 16);
        let sustain_level = ((self.sustain_level as u32 + 1) << 8) as f64 / (MAX_LEVEL + 1) as f64;
        let sustain_time = (self.sustain_rate != 0)
            .then(|| seconds(exponential_steps(MAX_LEVEL, 0), self.sustain_rate));

        Ok(Adsr {
            attack_time,
            decay_time,
            sustain_level,
            sustain_time,
            release_time: release_time(),
        })
    }
}

impl SnesGain {
    /// Convert to a time-domain envelope.
    ///
    /// A zero rate freezes the level reached at key-on, which is silence.
    pub fn to_adsr(&self) -> Result<Adsr> {
        let silent = Adsr {
            sustain_level: 0.0,
            release_time: release_time(),
            ..Adsr::default()
        };
        let adsr = match *self {
            SnesGain::Direct(level) => {
                check_range("gain level", level, 0x7F)?;
                Adsr {
                    sustain_level: ((level as u32) << 4) as f64 / MAX_LEVEL as f64,
                    release_time: release_time(),
                    ..Adsr::default()
                }
            }
            SnesGain::LinearDecrease(rate) | SnesGain::ExponentialDecrease(rate) => {
                check_range("gain rate", rate, 31)?;
                if rate == 0 {
                    return Ok(silent);
                }
                let steps = match self {
                    SnesGain::LinearDecrease(_) => MAX_LEVEL.div_ceil(32),
                    _ => exponential_steps(MAX_LEVEL, 0),
                };
                Adsr {
                    decay_time: seconds(steps, rate),
                    sustain_level: 0.0,
                    release_time: release_time(),
                    ..Adsr::default()
                }
            }
            SnesGain::LinearIncrease(rate) | SnesGain::BentIncrease(rate) => {
                check_range("gain rate", rate, 31)?;
                if rate == 0 {
                    return Ok(silent);
                }
                let steps = match self {
                    SnesGain::LinearIncrease(_) => MAX_LEVEL.div_ceil(32),
                    _ => 0x600 / 32 + (MAX_LEVEL - 0x600).div_ceil(8),
                };
                Adsr {
                    attack_time: seconds(steps, rate),
                    release_time: release_time(),
                    ..Adsr::default()
                }
            }
        };
        Ok(adsr)
    }
}
