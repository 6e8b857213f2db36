//! The resolved playable unit.

use serde::Serialize;

use super::{InstrumentSet, Sample, SampleCollection, SampleRef, Sequence};

/// One sequence with its instruments and the sample collections they use.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collection {
    /// Sequence.
    pub sequence: Sequence,
    /// Instruments, with every region bound to a sample.
    pub instruments: InstrumentSet,
    /// Sample collections, ordered by first articulation id.
    pub samples: Vec<SampleCollection>,
}

impl Collection {
    /// Resolve a sample reference.
    pub fn sample(&self, r: SampleRef) -> Option<&Sample> {
        self.samples.get(r.collection)?.samples.get(r.sample)
    }

    /// Flat index of a sample across all collections (exporter numbering).
    pub fn flat_sample_index(&self, r: SampleRef) -> Option<usize> {
        if self.sample(r).is_none() {
            return None;
        }
        let before: usize = self.samples[..r.collection]
            .iter()
            .map(|c| c.samples.len())
            .sum();
        Some(before + r.sample)
    }

    /// Total number of samples.
    pub fn sample_count(&self) -> usize {
        self.samples.iter().map(|c| c.samples.len()).sum()
    }

    /// Short label for listings.
    pub fn name(&self) -> String {
        format!(
            "{}-{:04}",
            self.sequence.info.dialect.family(),
            self.sequence.info.id
        )
    }
}
