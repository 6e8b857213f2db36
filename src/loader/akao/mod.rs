//! AKAO (PlayStation) sequences, instrument tables and sample collections.
//!
//! Every artifact starts with the `AKAO` signature. Sequences carry a
//! non-zero length word at `0x06`; sample collections carry zero there and
//! an articulation table at `0x40`.

pub mod instr;
pub mod samples;
pub mod seq;

use crate::diagnostics::Diagnostics;
use crate::loader::{BytePattern, ScanContext};
use crate::model::Artifact;
use crate::scan::Scanner;
use crate::source::ByteSource;

/// Signature shared by all AKAO artifacts.
pub const SIGNATURE: &[u8; 4] = b"AKAO";

/// Finds AKAO artifacts at any offset of a source.
#[derive(Debug, Default, Clone, Copy)]
pub struct AkaoScanner;

impl Scanner for AkaoScanner {
    fn name(&self) -> &'static str {
        "akao"
    }

    fn scan(&self, source: &dyn ByteSource, ctx: &ScanContext, diag: &Diagnostics) -> Vec<Artifact> {
        let Ok(data) = source.bytes(0, source.len()) else {
            return Vec::new();
        };
        let signature = BytePattern::exact(SIGNATURE);
        let mut artifacts = Vec::new();
        let mut from = 0;

        while let Some(at) = signature.find(data, from) {
            let offset = at as u32;
            let is_samples = source.read_u16_le(offset + 6).map_or(false, |w| w == 0);
            let loaded = if is_samples {
                samples::load(source, offset, ctx, diag).map(|c| {
                    let end = c.info.offset + c.info.length;
                    artifacts.push(Artifact::SampleCollection(c));
                    end
                })
            } else {
                seq::load(source, offset, ctx, diag).map(|(s, i)| {
                    let end = s.info.offset + s.info.length;
                    artifacts.push(Artifact::Sequence(s));
                    artifacts.push(Artifact::InstrumentSet(i));
                    end
                })
            };
            from = match loaded {
                Ok(end) => (end as usize).max(at + 1),
                Err(e) => {
                    diag.debug("akao", format!("{}: candidate rejected: {e}", source.name()));
                    at + 1
                }
            };
        }
        artifacts
    }
}
