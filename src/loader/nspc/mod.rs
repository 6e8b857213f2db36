//! N-SPC (SNES) songs, instruments and samples from SPC700 RAM images.
//!
//! The driver tables are located by machine-code patterns, then every song
//! in the song list becomes a sequence. All songs of one image share one
//! instrument set and one sample collection, which the file-group matcher
//! pairs with them.

pub mod driver;
pub mod instr;
pub mod song;
pub mod spc;

use crate::diagnostics::Diagnostics;
use crate::dialect::{event_table, nspc, Dialect, NspcVersion};
use crate::loader::{LoadError, Result, ScanContext};
use crate::model::{Artifact, ArtifactInfo, ArtifactKind, InstrumentSet, SampleCollection, Sequence};
use crate::scan::Scanner;
use crate::source::ByteSource;

pub use driver::DriverLayout;
pub use spc::SpcImage;

/// Highest song number probed in the song list.
pub const MAX_SONGS: u32 = 64;

/// Percussion opcodes of a driver generation.
pub fn percussion_slots(version: NspcVersion) -> u32 {
    match version {
        NspcVersion::Standard => 0xDF - 0xCA + 1,
        NspcVersion::Earlier => 0xD9 - 0xD0 + 1,
    }
}

/// The flattened song at `start`, if its first block holds track pointers.
fn plausible_song(ram: &dyn ByteSource, start: u32) -> Option<song::SongPlan> {
    if !(0x0100..0xFFF0).contains(&start) {
        return None;
    }
    let plan = song::flatten(ram, start).ok()?;
    let tracks = song::block_tracks(ram, *plan.blocks.first()?).ok()?;
    let used = tracks.iter().filter(|&&t| t != 0);
    let valid = used.clone().all(|&t| t >= 0x0100) && used.count() > 0;
    valid.then_some(plan)
}

/// Load every artifact of the image in `source`.
pub fn load(source: &dyn ByteSource, ctx: &ScanContext, diag: &Diagnostics) -> Result<Vec<Artifact>> {
    let image = SpcImage::open(source)?;
    let ram = &image.ram;
    let ram_bytes = ram.bytes(0, ram.len())?;
    let layout = driver::detect(ram_bytes, image.dsp_directory())?;
    let dialect = Dialect::Nspc {
        version: layout.version,
    };
    if let Some(tags) = &image.tags {
        diag.debug(
            "nspc",
            format!("{}: \"{}\" from \"{}\"", source.name(), tags.song, tags.game),
        );
    }

    let melodic = instr::read_instruments(ram, layout.instruments, layout.directory)?;
    let percussion = layout
        .percussion
        .map(|at| instr::read_percussion(ram, at, layout.directory, percussion_slots(layout.version)))
        .unwrap_or_default();
    let patches: Vec<_> = melodic.iter().chain(&percussion).copied().collect();
    let (articulations, samples) = instr::build_samples(ram, layout.directory, &patches, diag);
    if samples.is_empty() {
        return Err(LoadError::TableOutOfRange {
            table: "sample directory",
            offset: layout.directory,
            count: 0,
        });
    }

    let info = |kind, id, offset, length| ArtifactInfo {
        kind,
        origin: ctx.origin.clone(),
        id,
        offset,
        length,
        dialect,
    };

    let mut artifacts = vec![
        Artifact::SampleCollection(SampleCollection {
            info: info(
                ArtifactKind::SampleCollection,
                0,
                layout.directory,
                4 * (patches.iter().map(|p| p.srcn as u32).max().unwrap_or(0) + 1),
            ),
            first_articulation_id: 0,
            articulations,
            samples,
        }),
        Artifact::InstrumentSet(InstrumentSet {
            info: info(
                ArtifactKind::InstrumentSet,
                0,
                layout.instruments,
                6 * melodic.len() as u32,
            ),
            instruments: instr::build_instruments(&melodic, &percussion, nspc::PERCUSSION_KEY_BASE),
        }),
    ];

    let table = event_table(dialect);
    for number in 1..=MAX_SONGS {
        let Ok(pointer) = ram.read_u16_le(layout.song_list + 2 * number) else {
            break;
        };
        let Some(plan) = plausible_song(ram, pointer as u32) else {
            break;
        };
        match song::decode(ram, table.clone(), &plan, ctx, diag) {
            Ok(decoded) => {
                diag.debug(
                    "nspc",
                    format!(
                        "song {number}: {} block(s), {} voice(s)",
                        plan.blocks.len(),
                        decoded.tracks.len()
                    ),
                );
                artifacts.push(Artifact::Sequence(Sequence {
                    info: info(
                        ArtifactKind::Sequence,
                        number,
                        pointer as u32,
                        2 * plan.blocks.len() as u32 + 2,
                    ),
                    ppqn: table.constants().ppqn,
                    tracks: decoded.tracks,
                    programs: decoded.programs.into_iter().collect(),
                }));
            }
            Err(e) => diag.warn("nspc", format!("song {number} skipped: {e}")),
        }
    }
    Ok(artifacts)
}

/// Finds the N-SPC driver in `.spc` snapshots and raw RAM dumps.
#[derive(Debug, Default, Clone, Copy)]
pub struct NspcScanner;

impl Scanner for NspcScanner {
    fn name(&self) -> &'static str {
        "nspc"
    }

    fn scan(&self, source: &dyn ByteSource, ctx: &ScanContext, diag: &Diagnostics) -> Vec<Artifact> {
        match load(source, ctx, diag) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                diag.debug("nspc", format!("{}: {e}", source.name()));
                Vec::new()
            }
        }
    }
}
