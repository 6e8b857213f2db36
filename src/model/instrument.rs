//! Instruments and key/velocity regions.

use std::collections::BTreeSet;

use serde::Serialize;

use super::ArtifactInfo;
use crate::envelope::Adsr;

/// Index-based reference to a concrete sample inside a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleRef {
    /// Index into the collection's sample collections.
    pub collection: usize,
    /// Index into that sample collection's samples.
    pub sample: usize,
}

/// A key/velocity window bound to one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    /// Lowest key (inclusive).
    pub key_low: u8,
    /// Highest key (inclusive).
    pub key_high: u8,
    /// Lowest velocity (inclusive).
    pub velocity_low: u8,
    /// Highest velocity (inclusive).
    pub velocity_high: u8,
    /// Articulation id awaiting resolution.
    pub articulation_id: u32,
    /// Concrete sample, once resolved.
    pub sample: Option<SampleRef>,
    /// Key at which the sample plays at its recorded pitch.
    pub unity_key: u8,
    /// Explicit unity key from the region record, overriding the articulation's.
    #[serde(skip)]
    pub unity_override: Option<u8>,
    /// Fine tune in cents.
    pub fine_tune: f64,
    /// Region-level fine tune before the articulation's tuning is applied.
    #[serde(skip)]
    pub fine_tune_offset: f64,
    /// Amplitude envelope.
    pub adsr: Adsr,
    /// MIDI-scale volume.
    pub volume: u8,
    /// MIDI-scale pan.
    pub pan: u8,
}

impl Region {
    /// Full-range region for `articulation_id` with neutral parameters.
    pub fn full_range(articulation_id: u32) -> Self {
        Self {
            key_low: 0,
            key_high: 127,
            velocity_low: 0,
            velocity_high: 127,
            articulation_id,
            sample: None,
            unity_key: 60,
            unity_override: None,
            fine_tune: 0.0,
            fine_tune_offset: 0.0,
            adsr: Adsr::default(),
            volume: 127,
            pan: 64,
        }
    }

    /// Returns `true` if `key` falls inside the region.
    pub fn contains_key(&self, key: u8) -> bool {
        (self.key_low..=self.key_high).contains(&key)
    }
}

/// Program with its regions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instrument {
    /// Program number selected by sequences.
    pub program: u32,
    /// Regions in lookup order.
    pub regions: Vec<Region>,
    /// Regions are per MIDI key (one drum per key).
    pub drum_kit: bool,
}

/// All instruments of one sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentSet {
    /// Header info.
    pub info: ArtifactInfo,
    /// Instruments.
    pub instruments: Vec<Instrument>,
}

impl InstrumentSet {
    /// Articulation ids referenced by any region, excluding 0 and ids above
    /// `ceiling`.
    pub fn referenced_articulations(&self, ceiling: u32) -> BTreeSet<u32> {
        self.regions()
            .map(|r| r.articulation_id)
            .filter(|&id| id != 0 && id <= ceiling)
            .collect()
    }

    /// Every region across all instruments.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.instruments.iter().flat_map(|i| i.regions.iter())
    }

    /// Instrument for a program number.
    pub fn instrument(&self, program: u32) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.program == program)
    }
}
