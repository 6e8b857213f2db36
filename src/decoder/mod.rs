//! Generic track decoder.
//!
//! A [`TrackCursor`] walks one track's opcode stream using a dialect's
//! [`EventTable`] and yields dialect-independent [`SeqEvent`]s. Loops, jumps,
//! calls and ties are handled here once for every dialect; the table and its
//! constants supply the differences.
//!
//! CPU-conditional jumps are resolved in two passes: the first pass records
//! each branch site and falls through. If a recorded destination was never
//! reached, [`decode_track`] decodes the track again from the start with
//! those branches taken.

mod cursor;
pub mod stack;

use std::collections::BTreeSet;
use std::ops::Range;

use thiserror::Error;

use crate::diagnostics::Diagnostics;
use crate::dialect::EventTable;
use crate::envelope::VolumeScale;
use crate::model::Track;
use crate::source::{ByteSource, ReadError};

pub use cursor::{CursorState, TrackCursor, TrackFlags};

/// Errors that abort decoding of a single track.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Loop or call nesting exceeded the dialect limit.
    #[error("{stack} stack overflow at 0x{offset:06x} (depth {depth})")]
    StackOverflow {
        /// Which stack overflowed.
        stack: &'static str,
        /// Offset of the opcode that pushed.
        offset: u32,
        /// Configured depth.
        depth: usize,
    },
    /// Loop end without an open loop.
    #[error("loop end without loop start at 0x{offset:06x}")]
    LoopUnderflow {
        /// Offset of the loop end opcode.
        offset: u32,
    },
    /// Return without an active call.
    #[error("return without call at 0x{offset:06x}")]
    ReturnUnderflow {
        /// Offset of the return opcode.
        offset: u32,
    },
    /// Operand bytes ran past the addressable range.
    #[error("operand read failed: {0}")]
    Read(#[from] ReadError),
}

/// Per-track decode settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorOptions {
    /// Offsets the cursor may decode from.
    pub bounds: Range<u32>,
    /// Ceiling on events per track.
    pub max_events: usize,
    /// Volume mapping for volume/expression events.
    pub volume_scale: VolumeScale,
    /// Stop once the track clock reaches this tick.
    pub tick_limit: Option<u32>,
    /// Conditional branch sites to take on first arrival.
    pub take_conditional: BTreeSet<u32>,
}

impl CursorOptions {
    /// Default ceiling on events per track.
    pub const DEFAULT_MAX_EVENTS: usize = 20_000;

    /// Options for decoding inside `bounds`.
    pub fn new(bounds: Range<u32>) -> Self {
        Self {
            bounds,
            max_events: Self::DEFAULT_MAX_EVENTS,
            volume_scale: VolumeScale::default(),
            tick_limit: None,
            take_conditional: BTreeSet::new(),
        }
    }
}

/// A fully decoded track and the programs it selects.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTrack {
    /// Events and terminal condition.
    pub track: Track,
    /// Program numbers selected by the track.
    pub programs: BTreeSet<u32>,
}

/// Decode one track to completion, re-decoding once if conditional jumps
/// left destinations unexplored.
pub fn decode_track(
    index: usize,
    source: &dyn ByteSource,
    table: std::sync::Arc<EventTable>,
    start: u32,
    options: &CursorOptions,
    diag: &Diagnostics,
) -> DecodedTrack {
    let mut cursor = TrackCursor::new(source, table.clone(), start, options.clone(), diag);
    let mut events = cursor.decode_all();
    let unreached = cursor.unreached_branches();

    if !unreached.is_empty() {
        diag.debug(
            "decoder",
            format!(
                "track {index}: re-decoding with {} conditional branch(es) taken",
                unreached.len()
            ),
        );
        let mut second_pass = options.clone();
        second_pass.take_conditional.extend(unreached);
        cursor = TrackCursor::new(source, table, start, second_pass, diag);
        events = cursor.decode_all();
    }

    DecodedTrack {
        track: Track {
            index,
            offset: start,
            events,
            end: cursor.end().unwrap_or(crate::model::TrackEnd::EventLimit),
        },
        programs: cursor.programs().clone(),
    }
}
