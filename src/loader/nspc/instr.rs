//! N-SPC instrument and percussion tables, and BRR samples from the
//! sample directory.

use crate::codec::brr;
use crate::diagnostics::Diagnostics;
use crate::envelope::snes::DSP_SAMPLE_RATE;
use crate::envelope::{Adsr, PitchMultiplier, SnesVolumeEnvelope};
use crate::loader::{LoadError, Result};
use crate::model::{Articulation, Codec, Instrument, RawEnvelope, Region, Sample};
use crate::source::ByteSource;

/// Maximum melodic instruments.
pub const MAX_INSTRUMENTS: u32 = 64;
/// Key of a sample played at tuning 1.0.
pub const UNITY_KEY: u8 = 71;
/// Program number of the percussion kit.
pub const PERCUSSION_PROGRAM: u32 = 0x80;

const INSTRUMENT_SIZE: u32 = 6;
const PERCUSSION_SIZE: u32 = 7;

/// One instrument or percussion record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    /// Sample directory index.
    pub srcn: u8,
    /// DSP `ADSR1`.
    pub adsr1: u8,
    /// DSP `ADSR2`.
    pub adsr2: u8,
    /// DSP `GAIN`.
    pub gain: u8,
    /// Tuning multiplier, integer part.
    pub tuning_whole: u8,
    /// Tuning multiplier, 1/256 part.
    pub tuning_frac: u8,
    /// Fixed note for percussion records.
    pub note: Option<u8>,
}

/// A sample directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    /// BRR start address.
    pub start: u32,
    /// Loop start address.
    pub loop_start: u32,
}

/// Read directory entry `srcn`, or `None` when it cannot hold a sample.
pub fn dir_entry(ram: &dyn ByteSource, directory: u32, srcn: u8) -> Option<DirEntry> {
    let at = directory + 4 * srcn as u32;
    let start = ram.read_u16_le(at).ok()? as u32;
    let loop_start = ram.read_u16_le(at + 2).ok()? as u32;
    let plausible = srcn < 0x80
        && (0x0100..0xFFF7).contains(&start)
        && loop_start >= start
        && start != directory;
    plausible.then_some(DirEntry { start, loop_start })
}

fn read_patches(
    ram: &dyn ByteSource,
    table: u32,
    directory: u32,
    stride: u32,
    ceiling: u32,
) -> Vec<Patch> {
    let mut patches = Vec::new();
    for i in 0..ceiling {
        let Ok(rec) = ram.bytes(table + i * stride, stride) else {
            break;
        };
        if dir_entry(ram, directory, rec[0]).is_none() {
            break;
        }
        patches.push(Patch {
            srcn: rec[0],
            adsr1: rec[1],
            adsr2: rec[2],
            gain: rec[3],
            tuning_whole: rec[4],
            tuning_frac: rec[5],
            note: (stride == PERCUSSION_SIZE).then(|| rec[6]),
        });
    }
    patches
}

/// Melodic instruments until the first record with an unusable SRCN.
pub fn read_instruments(ram: &dyn ByteSource, table: u32, directory: u32) -> Result<Vec<Patch>> {
    let patches = read_patches(ram, table, directory, INSTRUMENT_SIZE, MAX_INSTRUMENTS);
    if patches.is_empty() {
        return Err(LoadError::TableOutOfRange {
            table: "instrument",
            offset: table,
            count: 0,
        });
    }
    Ok(patches)
}

/// Percussion records, at most one per percussion opcode.
pub fn read_percussion(ram: &dyn ByteSource, table: u32, directory: u32, slots: u32) -> Vec<Patch> {
    read_patches(ram, table, directory, PERCUSSION_SIZE, slots)
}

/// Instruments in program order; patch `i` is articulation `i`, percussion
/// articulations follow the melodic ones.
pub fn build_instruments(melodic: &[Patch], percussion: &[Patch], key_base: u8) -> Vec<Instrument> {
    let mut list: Vec<Instrument> = (0..melodic.len() as u32)
        .map(|program| Instrument {
            program,
            regions: vec![Region::full_range(program)],
            drum_kit: false,
        })
        .collect();

    let regions: Vec<Region> = percussion
        .iter()
        .enumerate()
        .map(|(k, patch)| {
            let key = key_base.saturating_add(k as u8).min(127);
            let mut region = Region::full_range((melodic.len() + k) as u32);
            region.key_low = key;
            region.key_high = key;
            if let Some(note) = patch.note {
                // The drum sounds its fixed note regardless of the key.
                let played = note.wrapping_sub(0x80) as i32 + 24;
                let unity = UNITY_KEY as i32 + key as i32 - played;
                region.unity_override = Some(unity.clamp(0, 127) as u8);
            }
            region
        })
        .collect();
    if !regions.is_empty() {
        list.push(Instrument {
            program: PERCUSSION_PROGRAM,
            regions,
            drum_kit: true,
        });
    }
    list
}

/// Articulations for every patch and the distinct samples they play.
pub fn build_samples(
    ram: &dyn ByteSource,
    directory: u32,
    patches: &[Patch],
    diag: &Diagnostics,
) -> (Vec<Articulation>, Vec<Sample>) {
    let mut samples: Vec<Sample> = Vec::new();
    let mut sample_srcn: Vec<u8> = Vec::new();
    let mut articulations = Vec::with_capacity(patches.len());

    for (id, patch) in patches.iter().enumerate() {
        let id = id as u32;
        let entry = dir_entry(ram, directory, patch.srcn);
        let sample_index = entry.and_then(|entry| {
            if let Some(i) = sample_srcn.iter().position(|&s| s == patch.srcn) {
                return Some(i);
            }
            let data = ram.bytes(entry.start, ram.len() - entry.start).ok()?;
            let layout = brr::layout(data, Some(entry.loop_start - entry.start));
            samples.push(Sample {
                offset: entry.start,
                length: layout.length,
                frames: layout.frames,
                loop_start: layout.loop_start,
                loop_length: layout.loop_length,
                sample_rate: DSP_SAMPLE_RATE,
                codec: Codec::Brr,
            });
            sample_srcn.push(patch.srcn);
            Some(samples.len() - 1)
        });

        let tuning = match (PitchMultiplier::FixedPoint8_8 {
            whole: patch.tuning_whole,
            frac: patch.tuning_frac,
        })
        .to_tuning()
        {
            Ok(t) => Some(t),
            Err(e) => {
                diag.warn("nspc", format!("instrument {id}: {e}"));
                None
            }
        };
        let adsr = SnesVolumeEnvelope::from_registers(patch.adsr1, patch.adsr2, patch.gain)
            .to_adsr()
            .unwrap_or_else(|e| {
                diag.warn("nspc", format!("instrument {id}: envelope: {e}"));
                Adsr::default()
            });
        let looped = sample_index.is_some_and(|i| samples[i].loop_start.is_some());

        articulations.push(Articulation {
            id,
            sample_offset: entry.map_or(0, |e| e.start),
            loop_offset: entry.filter(|_| looped).map(|e| e.loop_start),
            raw_pitch: (patch.tuning_whole as u32) << 8 | patch.tuning_frac as u32,
            tuning,
            unity_key: UNITY_KEY,
            raw_envelope: RawEnvelope::Snes {
                adsr1: patch.adsr1,
                adsr2: patch.adsr2,
                gain: patch.gain,
            },
            adsr,
            sample_index,
        });
    }
    (articulations, samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn ram() -> MemorySource {
        let mut data = vec![0u8; 0x10000];
        // Directory at 0x4000: srcn 0 at 0x5000 (looping at 0x5009), srcn 1 at 0x6000.
        data[0x4000..0x4008].copy_from_slice(&[0x00, 0x50, 0x09, 0x50, 0x00, 0x60, 0x00, 0x60]);
        data[0x5009] = brr::FLAG_END | brr::FLAG_LOOP;
        data[0x6000] = brr::FLAG_END;
        // Instruments at 0x3000, terminated by an unusable SRCN.
        data[0x3000..0x300C].copy_from_slice(&[0, 0xFF, 0xE0, 0x7F, 1, 0, 1, 0x8F, 0xE0, 0x7F, 2, 0]);
        data[0x300C] = 0x90;
        // One percussion record at 0x3100, then an unusable SRCN.
        data[0x3100..0x3107].copy_from_slice(&[1, 0xFF, 0xE0, 0x7F, 1, 0, 0xA4]);
        data[0x3107] = 0x90;
        MemorySource::new("ram", data)
    }

    #[test]
    fn reads_patches_until_invalid_srcn() {
        let src = ram();
        let melodic = read_instruments(&src, 0x3000, 0x4000).unwrap();
        assert_eq!(melodic.len(), 2);
        assert_eq!(melodic[1].tuning_whole, 2);
        let perc = read_percussion(&src, 0x3100, 0x4000, 22);
        assert_eq!(perc.len(), 1);
        assert_eq!(perc[0].note, Some(0xA4));
    }

    #[test]
    fn builds_kit_and_shared_samples() {
        let src = ram();
        let melodic = read_instruments(&src, 0x3000, 0x4000).unwrap();
        let perc = read_percussion(&src, 0x3100, 0x4000, 22);

        let instruments = build_instruments(&melodic, &perc, 36);
        assert_eq!(instruments.len(), 3);
        let kit = &instruments[2];
        assert!(kit.drum_kit);
        assert_eq!(kit.regions[0].articulation_id, 2);
        // Note 0xA4 is MIDI 60; key 36 must sound 24 semitones higher.
        assert_eq!(kit.regions[0].unity_override, Some(47));

        let all: Vec<Patch> = melodic.iter().chain(&perc).copied().collect();
        let (arts, samples) = build_samples(&src, 0x4000, &all, &Diagnostics::new());
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].frames, 32);
        assert_eq!(samples[0].loop_start, Some(16));
        assert_eq!(arts[0].loop_offset, Some(0x5009));
        assert_eq!(arts[2].sample_index, Some(1));
        assert_eq!(arts[1].tuning.unwrap().coarse, 12);
    }

    #[test]
    fn empty_instrument_table_is_rejected() {
        let src = MemorySource::new("ram", vec![0u8; 0x10000]);
        assert!(read_instruments(&src, 0x3000, 0x4000).is_err());
    }
}
