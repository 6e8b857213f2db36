//! N-SPC song lists: blocks of eight parallel tracks played in sequence.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::decoder::TrackCursor;
use crate::diagnostics::Diagnostics;
use crate::dialect::EventTable;
use crate::loader::{LoadError, Result, ScanContext};
use crate::model::{EventKind, SeqEvent, Track, TrackEnd};
use crate::source::ByteSource;

/// Voices per block.
pub const VOICES: usize = 8;
/// Ceiling on flattened blocks per song.
pub const MAX_BLOCKS: usize = 256;
/// Ceiling on song list words read per song, repeats included.
pub const MAX_STEPS: usize = 4 * MAX_BLOCKS;

/// How a song list ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SongEnd {
    /// A zero word at `at`.
    Stop {
        /// Song list offset of the terminator.
        at: u32,
    },
    /// An unconditional jump at `at` back to `target`.
    LoopForever {
        /// Song list offset of the jump.
        at: u32,
        /// Song list offset jumped to.
        target: u32,
    },
}

/// A song list with counted repeats unrolled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongPlan {
    /// Block addresses in play order.
    pub blocks: Vec<u32>,
    /// Terminal entry.
    pub end: SongEnd,
}

/// Walk the song list at `start`.
///
/// Words below `0x80` other than zero repeat the section starting at the
/// following target word that many times in total; words `0x80..=0xFF`
/// jump to their target forever.
pub fn flatten(ram: &dyn ByteSource, start: u32) -> Result<SongPlan> {
    let mut blocks = Vec::new();
    let mut counters: HashMap<u32, u16> = HashMap::new();
    let mut pos = start;
    let mut steps = 0usize;
    loop {
        if blocks.len() > MAX_BLOCKS || steps >= MAX_STEPS {
            return Err(LoadError::TableOutOfRange {
                table: "song list",
                offset: start,
                count: steps as u32,
            });
        }
        steps += 1;
        let word = ram.read_u16_le(pos)?;
        match word {
            0 => return Ok(SongPlan { blocks, end: SongEnd::Stop { at: pos } }),
            0x01..=0x7F => {
                let target = ram.read_u16_le(pos + 2)? as u32;
                let remaining = counters.entry(pos).or_insert(word);
                if *remaining > 1 {
                    *remaining -= 1;
                    pos = target;
                } else {
                    counters.remove(&pos);
                    pos += 4;
                }
            }
            0x80..=0xFF => {
                let target = ram.read_u16_le(pos + 2)? as u32;
                return Ok(SongPlan {
                    blocks,
                    end: SongEnd::LoopForever { at: pos, target },
                });
            }
            block => {
                blocks.push(block as u32);
                pos += 2;
            }
        }
    }
}

/// Track pointers of one block; zero marks an unused voice.
pub fn block_tracks(ram: &dyn ByteSource, block: u32) -> Result<[u16; VOICES]> {
    let mut tracks = [0u16; VOICES];
    for (i, t) in tracks.iter_mut().enumerate() {
        *t = ram.read_u16_le(block + 2 * i as u32)?;
    }
    Ok(tracks)
}

/// Decoded voices of one song and the programs they select.
pub struct DecodedSong {
    /// One track per voice that plays in any block.
    pub tracks: Vec<Track>,
    /// Programs selected by any voice.
    pub programs: BTreeSet<u32>,
}

/// Decode every block of `plan`, carrying voice state across blocks.
///
/// The first present voice of a block runs to its end-of-block marker and
/// sets the block length; the other voices are cut at that tick.
pub fn decode(
    ram: &dyn ByteSource,
    table: Arc<EventTable>,
    plan: &SongPlan,
    ctx: &ScanContext,
    diag: &Diagnostics,
) -> Result<DecodedSong> {
    let options = ctx.cursor_options(0..ram.len());
    let mut cursors: Vec<Option<TrackCursor<'_>>> = (0..VOICES).map(|_| None).collect();
    let mut events: Vec<Vec<SeqEvent>> = vec![Vec::new(); VOICES];
    let mut first_offset = [0u32; VOICES];
    let mut block_start = 0u32;

    for &block in &plan.blocks {
        let pointers = block_tracks(ram, block)?;
        let Some(lead) = pointers.iter().position(|&p| p != 0) else {
            diag.debug("nspc", format!("block 0x{block:04x} has no tracks"));
            continue;
        };

        let mut block_end = None;
        let order = std::iter::once(lead).chain((0..VOICES).filter(|&v| v != lead));
        for voice in order {
            let ptr = pointers[voice] as u32;
            if ptr == 0 {
                continue;
            }
            let limit = block_end;
            let cursor = cursors[voice].get_or_insert_with(|| {
                first_offset[voice] = ptr;
                TrackCursor::new(ram, table.clone(), ptr, options.clone(), diag)
            });
            cursor.restart_at(ptr, limit);
            cursor.advance_to(block_start);
            events[voice].extend(cursor.decode_all());

            if voice == lead {
                if !matches!(cursor.end(), Some(TrackEnd::BlockEnd)) {
                    diag.warn(
                        "nspc",
                        format!(
                            "block 0x{block:04x}: lead voice {voice} ended with {:?}",
                            cursor.end()
                        ),
                    );
                }
                block_end = Some(cursor.time());
            }
        }

        block_start = block_end.unwrap_or(block_start);
        for cursor in cursors.iter_mut().flatten() {
            cursor.advance_to(block_start);
        }
    }

    let (end_at, end_len, kind, end) = match plan.end {
        SongEnd::Stop { at } => (at, 2, EventKind::EndOfTrack, TrackEnd::EndOfTrack),
        SongEnd::LoopForever { at, target } => (
            at,
            4,
            EventKind::LoopForever { target },
            TrackEnd::LoopForever,
        ),
    };

    let mut programs = BTreeSet::new();
    let mut tracks = Vec::new();
    for (voice, cursor) in cursors.iter().enumerate() {
        let Some(cursor) = cursor else { continue };
        programs.extend(cursor.programs().iter().copied());
        let mut list = std::mem::take(&mut events[voice]);
        list.push(SeqEvent {
            offset: end_at,
            length: end_len,
            time: block_start,
            kind: kind.clone(),
        });
        tracks.push(Track {
            index: voice,
            offset: first_offset[voice],
            events: list,
            end: end.clone(),
        });
    }

    Ok(DecodedSong { tracks, programs })
}
