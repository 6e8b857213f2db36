//! Sequences and their decoded tracks.

use serde::Serialize;

use super::{ArtifactInfo, SeqEvent};
use crate::dialect::{akao, nspc, Dialect};

/// Why a track stopped decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TrackEnd {
    /// Explicit end-of-track opcode.
    EndOfTrack,
    /// The track loops forever; one pass was recorded.
    LoopForever,
    /// The cursor left the addressable range.
    OutOfRange,
    /// An opcode without table entry was found.
    UnknownOpcode {
        /// Offset of the byte.
        offset: u32,
        /// Raw byte.
        opcode: u8,
    },
    /// End of a block in block-structured dialects.
    BlockEnd,
    /// Tick limit of the enclosing block reached.
    TickLimit,
    /// Per-track event ceiling reached.
    EventLimit,
    /// A decode error aborted this track.
    Aborted {
        /// Error description.
        reason: String,
    },
}

/// One decoded track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    /// Track number within the sequence.
    pub index: usize,
    /// Offset of the first opcode.
    pub offset: u32,
    /// Decoded events in time order.
    pub events: Vec<SeqEvent>,
    /// Terminal condition.
    pub end: TrackEnd,
}

impl Track {
    /// Time of the last event plus its advance.
    pub fn duration(&self) -> u32 {
        self.events
            .last()
            .map_or(0, |e| e.time + e.kind.advance())
    }
}

/// A decoded sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sequence {
    /// Header info.
    pub info: ArtifactInfo,
    /// Pulses per quarter note.
    pub ppqn: u16,
    /// Tracks.
    pub tracks: Vec<Track>,
    /// Program numbers selected by any track, ascending.
    pub programs: Vec<u32>,
}

impl Sequence {
    /// Tempo in BPM for a raw tempo value of this sequence's dialect.
    pub fn tempo_bpm(&self, raw: u32) -> f64 {
        match self.info.dialect {
            Dialect::Akao { .. } => akao::tempo_bpm(raw, self.ppqn),
            Dialect::Nspc { .. } => nspc::tempo_bpm(raw),
        }
    }
}
