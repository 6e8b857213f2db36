//! Matching by articulation coverage.
//!
//! Sequences and instrument sets pair by id. Sample collections are kept in
//! discovery order and chosen by which articulation ids they cover.

use std::collections::BTreeMap;

use super::{resolve::resolve, MatchOutcome, Matcher};
use crate::diagnostics::Diagnostics;
use crate::dialect::event_table;
use crate::model::{Artifact, ArtifactInfo, Collection, InstrumentSet, SampleCollection, Sequence};

/// Pairs id-keyed sequences and instrument sets with the sample collections
/// covering their articulations.
#[derive(Debug, Default)]
pub struct ArticulationMatcher {
    sequences: BTreeMap<u32, Sequence>,
    instruments: BTreeMap<u32, InstrumentSet>,
    samples: Vec<SampleCollection>,
}

impl ArticulationMatcher {
    /// Empty matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide which sample collections would serve sequence `id`.
    ///
    /// Returns `None` unless both the sequence and its instrument set are
    /// known.
    pub fn plan(&self, id: u32) -> Option<MatchOutcome> {
        let sequence = self.sequences.get(&id)?;
        let instruments = self.instruments.get(&id)?;
        let ceiling = event_table(sequence.info.dialect)
            .constants()
            .articulation_ceiling;
        let mut unresolved = instruments.referenced_articulations(ceiling);
        let mut accepted = Vec::new();

        // A same-id collection is taken even if it covers nothing visible:
        // some drivers only reach it through runtime key splits.
        let own = self.samples.iter().rposition(|c| c.info.id == id);
        if let Some(i) = own {
            accepted.push(i);
            unresolved.retain(|&a| !self.samples[i].covers(a));
        }
        for i in (0..self.samples.len()).rev() {
            if Some(i) == own || unresolved.is_empty() {
                continue;
            }
            let c = &self.samples[i];
            if unresolved.iter().any(|&a| c.covers(a)) {
                accepted.push(i);
                unresolved.retain(|&a| !c.covers(a));
            }
        }

        if !unresolved.is_empty() {
            return Some(MatchOutcome::Pending {
                missing: unresolved,
            });
        }
        accepted.sort_by_key(|&i| (self.samples[i].first_articulation_id, i));
        Some(MatchOutcome::Matched { accepted })
    }

    fn close_ready(&mut self, diag: &Diagnostics) -> Vec<Collection> {
        let ready: Vec<(u32, Vec<usize>)> = self
            .sequences
            .keys()
            .filter_map(|&id| match self.plan(id)? {
                MatchOutcome::Matched { accepted } => Some((id, accepted)),
                MatchOutcome::Pending { missing } => {
                    diag.debug(
                        "matcher",
                        format!("sequence {id} pending, articulations {missing:?} not covered"),
                    );
                    None
                }
            })
            .collect();

        let mut collections = Vec::new();
        for (id, accepted) in ready {
            let (Some(sequence), Some(instruments)) =
                (self.sequences.remove(&id), self.instruments.remove(&id))
            else {
                continue;
            };
            let samples = accepted.iter().map(|&i| self.samples[i].clone()).collect();
            let collection = resolve(sequence, instruments, samples, diag);
            diag.debug(
                "matcher",
                format!(
                    "{}: matched with {} sample collection(s)",
                    collection.name(),
                    collection.samples.len()
                ),
            );
            collections.push(collection);
        }
        collections
    }
}

impl Matcher for ArticulationMatcher {
    fn add(&mut self, artifact: Artifact, diag: &Diagnostics) -> Vec<Collection> {
        match artifact {
            Artifact::Sequence(s) => {
                self.sequences.insert(s.info.id, s);
            }
            Artifact::InstrumentSet(i) => {
                self.instruments.insert(i.info.id, i);
            }
            Artifact::SampleCollection(c) => self.samples.push(c),
        }
        self.close_ready(diag)
    }

    fn close_container(&mut self, container: &str, diag: &Diagnostics) -> usize {
        let inside = |info: &ArtifactInfo| info.origin.container.as_deref() == Some(container);
        let before = self.pending().len();
        for (_, s) in self.sequences.iter().filter(|(_, s)| inside(&s.info)) {
            diag.warn(
                "matcher",
                format!("{container}: discarding unmatched sequence {}", s.info.id),
            );
        }
        self.sequences.retain(|_, s| !inside(&s.info));
        self.instruments.retain(|_, i| !inside(&i.info));
        self.samples.retain(|c| !inside(&c.info));
        before - self.pending().len()
    }

    fn pending(&self) -> Vec<ArtifactInfo> {
        self.sequences
            .values()
            .map(|s| s.info.clone())
            .chain(self.instruments.values().map(|i| i.info.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::dialect::{AkaoVersion, Dialect};
    use crate::envelope::Adsr;
    use crate::model::{
        Articulation, ArtifactKind, Codec, Instrument, Origin, RawEnvelope, Region, Sample,
    };

    fn info(kind: ArtifactKind, id: u32, origin: Origin) -> ArtifactInfo {
        ArtifactInfo {
            kind,
            origin,
            id,
            offset: 0,
            length: 0,
            dialect: Dialect::akao(AkaoVersion::V2),
        }
    }

    fn samples(id: u32, first: u32, count: u32) -> Artifact {
        let articulations = (first..first + count)
            .map(|a| Articulation {
                id: a,
                sample_offset: 0,
                loop_offset: None,
                raw_pitch: 0,
                tuning: None,
                unity_key: 60,
                raw_envelope: RawEnvelope::Psx { adsr1: 0, adsr2: 0 },
                adsr: Adsr::default(),
                sample_index: Some(0),
            })
            .collect();
        Artifact::SampleCollection(SampleCollection {
            info: info(ArtifactKind::SampleCollection, id, Origin::file("samples")),
            first_articulation_id: first,
            articulations,
            samples: vec![Sample {
                offset: 0,
                length: 16,
                frames: 28,
                loop_start: None,
                loop_length: 0,
                sample_rate: 44_100,
                codec: Codec::PsxAdpcm,
            }],
        })
    }

    fn song(id: u32, ids: &[u32], origin: Origin) -> [Artifact; 2] {
        [
            Artifact::Sequence(Sequence {
                info: info(ArtifactKind::Sequence, id, origin.clone()),
                ppqn: 48,
                tracks: Vec::new(),
                programs: vec![0],
            }),
            Artifact::InstrumentSet(InstrumentSet {
                info: info(ArtifactKind::InstrumentSet, id, origin),
                instruments: vec![Instrument {
                    program: 0,
                    regions: ids.iter().map(|&a| Region::full_range(a)).collect(),
                    drum_kit: false,
                }],
            }),
        ]
    }

    #[test]
    fn accepts_every_collection_needed_for_coverage() {
        let diag = Diagnostics::new();
        let mut m = ArticulationMatcher::new();
        assert!(m.add(samples(100, 0, 8), &diag).is_empty());
        assert!(m.add(samples(101, 8, 8), &diag).is_empty());
        let [seq, set] = song(7, &[1, 5, 9], Origin::file("song"));
        assert!(m.add(seq, &diag).is_empty());
        let out = m.add(set, &diag);
        assert_eq!(out.len(), 1);
        let firsts: Vec<u32> = out[0].samples.iter().map(|c| c.first_articulation_id).collect();
        assert_eq!(firsts, vec![0, 8]);
        assert!(out[0].instruments.regions().all(|r| r.sample.is_some()));
        assert!(m.pending().is_empty());
    }

    #[test]
    fn partial_coverage_stays_pending() {
        let diag = Diagnostics::new();
        let mut m = ArticulationMatcher::new();
        m.add(samples(100, 0, 8), &diag);
        let [seq, set] = song(7, &[1, 5, 9], Origin::file("song"));
        m.add(seq, &diag);
        assert!(m.add(set, &diag).is_empty());
        assert_eq!(
            m.plan(7),
            Some(MatchOutcome::Pending {
                missing: BTreeSet::from([9])
            })
        );
        assert_eq!(m.pending().len(), 2);

        // The missing collection arriving later completes the match.
        assert_eq!(m.add(samples(101, 8, 8), &diag).len(), 1);
    }

    #[test]
    fn same_id_collection_is_always_taken() {
        let diag = Diagnostics::new();
        let mut m = ArticulationMatcher::new();
        m.add(samples(7, 32, 4), &diag);
        m.add(samples(100, 0, 8), &diag);
        let [seq, set] = song(7, &[1], Origin::file("song"));
        m.add(seq, &diag);
        let out = m.add(set, &diag);
        assert_eq!(out.len(), 1);
        let firsts: Vec<u32> = out[0].samples.iter().map(|c| c.first_articulation_id).collect();
        assert_eq!(firsts, vec![0, 32]);
    }

    #[test]
    fn closing_a_container_discards_its_leftovers() {
        let diag = Diagnostics::new();
        let mut m = ArticulationMatcher::new();
        let [seq, set] = song(3, &[200], Origin::member("disc.zip", "a.bin"));
        m.add(seq, &diag);
        m.add(set, &diag);
        let [seq, set] = song(4, &[200], Origin::file("loose"));
        m.add(seq, &diag);
        m.add(set, &diag);

        assert_eq!(m.close_container("disc.zip", &diag), 2);
        assert_eq!(m.pending().len(), 2);
        assert!(diag.contains("discarding unmatched sequence 3"));
    }
}
