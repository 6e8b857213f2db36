//! Matching by source file.
//!
//! Drivers such as N-SPC keep one instrument table and one sample directory
//! per image, shared by every song in it.

use super::{resolve::resolve, Matcher};
use crate::diagnostics::Diagnostics;
use crate::model::{
    Artifact, ArtifactInfo, Collection, InstrumentSet, Origin, SampleCollection, Sequence,
};

#[derive(Debug, Default)]
struct Group {
    sequences: Vec<Sequence>,
    instruments: Option<InstrumentSet>,
    samples: Option<SampleCollection>,
}

/// Joins the sequences of one file with that file's instrument set and
/// sample collection.
#[derive(Debug, Default)]
pub struct FileGroupMatcher {
    groups: Vec<(Origin, Group)>,
}

impl FileGroupMatcher {
    /// Empty matcher.
    pub fn new() -> Self {
        Self::default()
    }

    fn group(&mut self, origin: &Origin) -> &mut Group {
        let index = match self.groups.iter().position(|(o, _)| o == origin) {
            Some(i) => i,
            None => {
                self.groups.push((origin.clone(), Group::default()));
                self.groups.len() - 1
            }
        };
        &mut self.groups[index].1
    }
}

impl Matcher for FileGroupMatcher {
    fn add(&mut self, artifact: Artifact, diag: &Diagnostics) -> Vec<Collection> {
        let origin = artifact.info().origin.clone();
        let group = self.group(&origin);
        match artifact {
            Artifact::Sequence(s) => group.sequences.push(s),
            Artifact::InstrumentSet(i) => {
                if group.instruments.replace(i).is_some() {
                    diag.warn(
                        "matcher",
                        format!("{}: second instrument set replaces the first", origin.file),
                    );
                }
            }
            Artifact::SampleCollection(c) => {
                if group.samples.replace(c).is_some() {
                    diag.warn(
                        "matcher",
                        format!("{}: second sample collection replaces the first", origin.file),
                    );
                }
            }
        }

        let (Some(instruments), Some(samples)) = (&group.instruments, &group.samples) else {
            return Vec::new();
        };
        std::mem::take(&mut group.sequences)
            .into_iter()
            .map(|sequence| resolve(sequence, instruments.clone(), vec![samples.clone()], diag))
            .collect()
    }

    fn close_container(&mut self, container: &str, diag: &Diagnostics) -> usize {
        let mut discarded = 0;
        self.groups.retain(|(origin, group)| {
            if origin.container.as_deref() != Some(container) {
                return true;
            }
            if !group.sequences.is_empty() {
                diag.warn(
                    "matcher",
                    format!(
                        "{container}: discarding {} unmatched sequence(s) from {}",
                        group.sequences.len(),
                        origin.file
                    ),
                );
            }
            discarded += group.sequences.len();
            false
        });
        discarded
    }

    fn pending(&self) -> Vec<ArtifactInfo> {
        self.groups
            .iter()
            .flat_map(|(_, g)| {
                let waiting = g.instruments.is_none() || g.samples.is_none();
                g.sequences
                    .iter()
                    .map(|s| s.info.clone())
                    .chain(g.instruments.iter().filter(move |_| waiting).map(|i| i.info.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::envelope::Adsr;
    use crate::model::{Articulation, ArtifactKind, Codec, Instrument, RawEnvelope, Region, Sample};

    fn info(kind: ArtifactKind, id: u32, origin: &Origin) -> ArtifactInfo {
        ArtifactInfo {
            kind,
            origin: origin.clone(),
            id,
            offset: 0,
            length: 0,
            dialect: Dialect::nspc(),
        }
    }

    fn seq(id: u32, origin: &Origin) -> Artifact {
        Artifact::Sequence(Sequence {
            info: info(ArtifactKind::Sequence, id, origin),
            ppqn: 48,
            tracks: Vec::new(),
            programs: vec![0],
        })
    }

    fn set(origin: &Origin) -> Artifact {
        Artifact::InstrumentSet(InstrumentSet {
            info: info(ArtifactKind::InstrumentSet, 0, origin),
            instruments: vec![Instrument {
                program: 0,
                regions: vec![Region::full_range(0)],
                drum_kit: false,
            }],
        })
    }

    fn samples(origin: &Origin) -> Artifact {
        Artifact::SampleCollection(SampleCollection {
            info: info(ArtifactKind::SampleCollection, 0, origin),
            first_articulation_id: 0,
            articulations: vec![Articulation {
                id: 0,
                sample_offset: 0x5000,
                loop_offset: None,
                raw_pitch: 0x100,
                tuning: None,
                unity_key: 71,
                raw_envelope: RawEnvelope::Snes {
                    adsr1: 0xFF,
                    adsr2: 0xE0,
                    gain: 0x7F,
                },
                adsr: Adsr::default(),
                sample_index: Some(0),
            }],
            samples: vec![Sample {
                offset: 0x5000,
                length: 9,
                frames: 16,
                loop_start: None,
                loop_length: 0,
                sample_rate: 32_000,
                codec: Codec::Brr,
            }],
        })
    }

    #[test]
    fn songs_of_one_file_share_instruments() {
        let diag = Diagnostics::new();
        let a = Origin::file("a.spc");
        let mut m = FileGroupMatcher::new();
        assert!(m.add(samples(&a), &diag).is_empty());
        assert!(m.add(set(&a), &diag).is_empty());
        assert_eq!(m.add(seq(1, &a), &diag).len(), 1);
        assert_eq!(m.add(seq(2, &a), &diag).len(), 1);
        assert!(m.pending().is_empty());
    }

    #[test]
    fn sequences_wait_for_their_own_file() {
        let diag = Diagnostics::new();
        let a = Origin::file("a.spc");
        let b = Origin::file("b.spc");
        let mut m = FileGroupMatcher::new();
        m.add(seq(1, &a), &diag);
        m.add(samples(&b), &diag);
        assert!(m.add(set(&b), &diag).is_empty());
        assert_eq!(m.pending().len(), 1);

        m.add(set(&a), &diag);
        let out = m.add(samples(&a), &diag);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sequence.info.origin, a);
        assert_eq!(out[0].instruments.instruments[0].regions[0].unity_key, 71);
    }

    #[test]
    fn closing_container_discards_unmatched_songs() {
        let diag = Diagnostics::new();
        let inner = Origin::member("set.zip", "x.spc");
        let mut m = FileGroupMatcher::new();
        m.add(seq(1, &inner), &diag);
        m.add(seq(2, &inner), &diag);
        m.add(seq(1, &Origin::file("loose.spc")), &diag);
        assert_eq!(m.close_container("set.zip", &diag), 2);
        assert_eq!(m.pending().len(), 1);
        assert!(diag.contains("discarding 2 unmatched"));
    }

    #[test]
    fn incomplete_group_lists_its_instrument_set() {
        let diag = Diagnostics::new();
        let a = Origin::file("a.spc");
        let mut m = FileGroupMatcher::new();
        m.add(seq(1, &a), &diag);
        m.add(set(&a), &diag);
        let kinds: Vec<ArtifactKind> = m.pending().iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![ArtifactKind::Sequence, ArtifactKind::InstrumentSet]);

        m.add(samples(&a), &diag);
        assert!(m.pending().is_empty());
    }
}
