//! Hardware volume and pan to MIDI scale.

use serde::{Deserialize, Serialize};

/// How a hardware volume maps to the MIDI 0..=127 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeScale {
    /// The driver already applies a perceptual curve; map proportionally.
    Linear,
    /// The hardware value is linear amplitude; map through the MIDI
    /// 40·log10 volume curve.
    #[default]
    Perceptual,
}

/// Scale `value` in `0..=max` to MIDI 0..=127.
pub fn scale_volume(value: u32, max: u32, scale: VolumeScale) -> u8 {
    if max == 0 {
        return 0;
    }
    let amplitude = value.min(max) as f64 / max as f64;
    let midi = match scale {
        VolumeScale::Linear => amplitude * 127.0,
        VolumeScale::Perceptual => amplitude.sqrt() * 127.0,
    };
    midi.round().clamp(0.0, 127.0) as u8
}

/// Pan position `value` in `0..=max` (centre at `max / 2`) to MIDI pan.
pub fn scale_pan(value: u32, max: u32) -> u8 {
    if max == 0 {
        return 64;
    }
    let position = value.min(max) as f64 / max as f64;
    (position * 127.0).round().clamp(0.0, 127.0) as u8
}

/// Equal-power pan from separate left/right volumes.
pub fn lr_to_pan(left: u32, right: u32) -> u8 {
    if left == 0 && right == 0 {
        return 64;
    }
    let angle = (right as f64).atan2(left as f64);
    (angle / std::f64::consts::FRAC_PI_2 * 127.0)
        .round()
        .clamp(0.0, 127.0) as u8
}
