//! Binding regions to concrete samples.

use crate::diagnostics::Diagnostics;
use crate::model::{Collection, InstrumentSet, Region, SampleCollection, SampleRef, Sequence};

/// Build a [`Collection`] and bind every region of `instruments` to a
/// sample in `samples`.
///
/// `samples` is searched in order; the first collection holding the
/// region's articulation wins. Unity key, fine tune and envelope come from
/// the articulation. A region whose articulation has no sample is bound to
/// the first available sample and logged.
pub fn resolve(
    sequence: Sequence,
    mut instruments: InstrumentSet,
    samples: Vec<SampleCollection>,
    diag: &Diagnostics,
) -> Collection {
    let fallback = samples
        .iter()
        .position(|c| !c.samples.is_empty())
        .map(|collection| SampleRef {
            collection,
            sample: 0,
        });
    let name = format!("{}-{:04}", sequence.info.dialect.family(), sequence.info.id);

    for instrument in &mut instruments.instruments {
        for region in &mut instrument.regions {
            if !bind(region, &samples) {
                match fallback {
                    Some(r) => diag.warn(
                        "matcher",
                        format!(
                            "{name}: program {} articulation {} unresolved, using sample {}",
                            instrument.program, region.articulation_id, r.sample
                        ),
                    ),
                    None => diag.error(
                        "matcher",
                        format!(
                            "{name}: program {} articulation {} unresolved and no samples available",
                            instrument.program, region.articulation_id
                        ),
                    ),
                }
                region.sample = fallback;
                region.unity_key = region.unity_override.unwrap_or(region.unity_key);
                region.fine_tune = region.fine_tune_offset;
            }
        }
    }

    Collection {
        sequence,
        instruments,
        samples,
    }
}

fn bind(region: &mut Region, samples: &[SampleCollection]) -> bool {
    for (collection, c) in samples.iter().enumerate() {
        let Some(art) = c.articulation(region.articulation_id) else {
            continue;
        };
        let Some(sample) = art.sample_index else {
            continue;
        };
        let (coarse, cents) = art.tuning.map_or((0, 0.0), |t| (t.coarse, t.cents));
        let unity = region.unity_override.unwrap_or(art.unity_key) as i32 - coarse;
        region.sample = Some(SampleRef { collection, sample });
        region.unity_key = unity.clamp(0, 127) as u8;
        region.fine_tune = region.fine_tune_offset + cents;
        region.adsr = art.adsr;
        return true;
    }
    false
}
