//! Articulations, samples and sample collections.

use serde::Serialize;

use super::ArtifactInfo;
use crate::envelope::{Adsr, Tuning};

/// Sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Codec {
    /// PSX SPU ADPCM (16-byte blocks, 28 samples each).
    PsxAdpcm,
    /// SNES BRR (9-byte blocks, 16 samples each).
    Brr,
}

/// Raw envelope registers as stored with an articulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RawEnvelope {
    /// SPU `ADSR1`/`ADSR2`.
    Psx {
        /// ADSR1.
        adsr1: u16,
        /// ADSR2.
        adsr2: u16,
    },
    /// S-DSP `ADSR1`/`ADSR2`/`GAIN`.
    Snes {
        /// ADSR1.
        adsr1: u8,
        /// ADSR2.
        adsr2: u8,
        /// GAIN.
        gain: u8,
    },
}

/// Per-sample playback definition addressed by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Articulation {
    /// Numeric id referenced by regions.
    pub id: u32,
    /// Sample data offset (collection-relative).
    pub sample_offset: u32,
    /// Loop start offset, when the sample loops.
    pub loop_offset: Option<u32>,
    /// Raw pitch word.
    pub raw_pitch: u32,
    /// Converted tuning of the pitch word.
    pub tuning: Option<Tuning>,
    /// Unity key.
    pub unity_key: u8,
    /// Raw envelope registers.
    pub raw_envelope: RawEnvelope,
    /// Converted envelope (defaults when conversion failed).
    pub adsr: Adsr,
    /// Index of the sample containing `sample_offset`.
    pub sample_index: Option<usize>,
}

/// A decoded-length description of one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Offset of the encoded data (collection-relative).
    pub offset: u32,
    /// Encoded byte length.
    pub length: u32,
    /// Decoded frame count.
    pub frames: u32,
    /// Loop start in frames.
    pub loop_start: Option<u32>,
    /// Loop length in frames.
    pub loop_length: u32,
    /// Playback rate at unity pitch.
    pub sample_rate: u32,
    /// Encoding.
    pub codec: Codec,
}

/// Articulations and samples loaded from one artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleCollection {
    /// Header info.
    pub info: ArtifactInfo,
    /// Id of `articulations[0]`.
    pub first_articulation_id: u32,
    /// Articulations, in id order.
    pub articulations: Vec<Articulation>,
    /// Samples, in data order.
    pub samples: Vec<Sample>,
}

impl SampleCollection {
    /// Returns `true` if `id` falls in this collection's articulation range.
    pub fn covers(&self, id: u32) -> bool {
        id >= self.first_articulation_id
            && ((id - self.first_articulation_id) as usize) < self.articulations.len()
    }

    /// Articulation with the given id.
    pub fn articulation(&self, id: u32) -> Option<&Articulation> {
        if !self.covers(id) {
            return None;
        }
        self.articulations
            .get((id - self.first_articulation_id) as usize)
    }
}
