//! Opcode tables and per-dialect constants.

use serde::Serialize;

use super::{akao, nspc, Dialect};

/// Which envelope register an inline envelope opcode rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EnvelopeParam {
    /// Attack rate field.
    AttackRate,
    /// Attack curve (linear/exponential).
    AttackMode,
    /// Decay rate field.
    DecayRate,
    /// Sustain level field.
    SustainLevel,
    /// Sustain rate field.
    SustainRate,
    /// Sustain curve (linear/exponential).
    SustainMode,
    /// Release rate field.
    ReleaseRate,
    /// Release curve (linear/exponential).
    ReleaseMode,
}

/// Symbolic meaning of an opcode byte.
///
/// `Unmapped` is the default for every slot, so a table lookup can never
/// mistake an unassigned byte for a real event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Op {
    /// No event assigned to this byte.
    Unmapped,
    /// Byte introduces a secondary-table opcode.
    ExtendedPrefix,
    /// Note, tie or rest packed with a duration index into one byte.
    PackedNote,
    /// Note, tie or rest whose index is `op - note_base`, followed by a length byte.
    NoteWithLength,
    /// Explicit key note (`op - note_base + key_base`).
    Note,
    /// Extend the previous note.
    Tie,
    /// Silence.
    Rest,
    /// Percussion note (`op - percussion_base`).
    Percussion,
    /// Set the running note length (N-SPC style).
    NoteLength,
    /// Duration used by exactly the next note.
    OneTimeDuration,
    /// Fixed length for all following notes (0 clears).
    FixedNoteLength,
    /// End of the track.
    EndOfTrack,
    /// End of the current block, or return from subroutine.
    EndOfBlock,
    /// Program/articulation change.
    Program,
    /// Drum kit mode switch.
    DrumKit(bool),
    /// First percussion program.
    PercussionBase,
    /// Channel volume.
    Volume,
    /// Channel volume fade.
    VolumeFade,
    /// Master volume.
    MasterVolume,
    /// Master volume fade.
    MasterVolumeFade,
    /// Expression.
    Expression,
    /// Expression fade.
    ExpressionFade,
    /// Pan.
    Pan,
    /// Pan fade.
    PanFade,
    /// Absolute octave.
    Octave,
    /// Octave up.
    OctaveUp,
    /// Octave down.
    OctaveDown,
    /// Absolute transpose.
    Transpose,
    /// Relative transpose.
    RelativeTranspose,
    /// Transpose shared by all tracks.
    GlobalTranspose,
    /// Absolute fine tune.
    FineTune,
    /// Relative fine tune.
    RelativeFineTune,
    /// Pitch bend slide (delay/length, semitones).
    PitchBendSlide,
    /// Explicit pitch slide to a target note.
    PitchSlide,
    /// Portamento on (with speed operand).
    Portamento,
    /// Portamento off.
    PortamentoOff,
    /// Pitch envelope towards a note.
    PitchEnvelopeTo,
    /// Pitch envelope from a note.
    PitchEnvelopeFrom,
    /// Pitch envelope off.
    PitchEnvelopeOff,
    /// Vibrato parameters.
    Vibrato,
    /// Vibrato depth only.
    VibratoDepth,
    /// Vibrato off.
    VibratoOff,
    /// Vibrato fade-in.
    VibratoFade,
    /// Tremolo parameters.
    Tremolo,
    /// Tremolo depth only.
    TremoloDepth,
    /// Tremolo off.
    TremoloOff,
    /// Pan LFO parameters.
    PanLfo,
    /// Pan LFO depth only.
    PanLfoDepth,
    /// Pan LFO off.
    PanLfoOff,
    /// LFO depth fade (vibrato, tremolo or pan LFO).
    LfoDepthFade,
    /// Tempo.
    Tempo,
    /// Tempo fade.
    TempoFade,
    /// Reverb send switch.
    Reverb(bool),
    /// Reverb depth.
    ReverbDepth,
    /// Reverb depth fade.
    ReverbDepthFade,
    /// Echo on with parameters.
    EchoOn,
    /// Echo off.
    EchoOff,
    /// Echo delay/feedback/filter.
    EchoParams,
    /// Echo volume fade.
    EchoVolumeFade,
    /// Noise generator switch.
    Noise(bool),
    /// Noise clock.
    NoiseClock,
    /// Frequency modulation switch.
    Fm(bool),
    /// Single envelope register update.
    Envelope(EnvelopeParam),
    /// Decay rate and sustain level in one opcode.
    DecaySustain,
    /// Restore the articulation's envelope.
    ResetEnvelope,
    /// Slur switch.
    Slur(bool),
    /// Legato switch.
    Legato(bool),
    /// Loop start marker.
    LoopStart,
    /// Loop end with repeat count.
    LoopUntil,
    /// Loop end repeating forever.
    LoopAgain,
    /// Leave the loop on a given iteration, or that many iterations
    /// earlier.
    LoopBreak(u8),
    /// Unconditional relative jump.
    Jump,
    /// Jump gated by runtime CPU state.
    ConditionalJump,
    /// Pattern call (relative).
    Call,
    /// Counted subroutine call (absolute address + count).
    CountedCall,
    /// Return from pattern call.
    Return,
    /// Voice allocation (no musical effect).
    AllocateVoices,
    /// Time signature.
    TimeSignature,
    /// Measure number.
    Measure,
    /// Known opcode without musical meaning; operands are skipped.
    Ignored,
}

/// One table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OpEntry {
    /// Symbolic meaning.
    pub op: Op,
    /// Number of operand bytes following the opcode.
    pub operands: u8,
}

impl OpEntry {
    /// The sentinel slot.
    pub const UNMAPPED: OpEntry = OpEntry {
        op: Op::Unmapped,
        operands: 0,
    };
}

/// How relative jump offsets are anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JumpAnchor {
    /// Offset is relative to the byte after the operand.
    AfterOperand,
    /// Offset is relative to the first operand byte.
    OperandStart,
    /// Operand is an absolute address.
    Absolute,
}

/// How the sounding part of a note is derived from its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GateRule {
    /// Subtract a fixed key-off gap unless slur/legato is active.
    Gap(u32),
    /// Scale by the running quantize rate (`duration * rate / 256`).
    Quantize,
}

/// Numeric constants that parameterize the generic cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialectConstants {
    /// Pulses per quarter note.
    pub ppqn: u16,
    /// Maximum number of tracks in a sequence.
    pub max_tracks: usize,
    /// Packed notes occupy `0..note_ceiling`.
    pub note_ceiling: u8,
    /// Duration lookup for packed notes.
    pub durations: &'static [u32],
    /// Note index meaning "tie".
    pub tie_index: u8,
    /// Note index meaning "rest".
    pub rest_index: u8,
    /// First explicit-note opcode.
    pub note_base: u8,
    /// MIDI key of the lowest explicit note (or of octave 0 for packed notes).
    pub key_base: i16,
    /// First percussion opcode.
    pub percussion_base: u8,
    /// Gate rule.
    pub gate: GateRule,
    /// Maximum loop nesting.
    pub loop_depth: usize,
    /// Maximum call nesting.
    pub call_depth: usize,
    /// Loop count that means "forever".
    pub infinite_loop_count: u8,
    /// Octave a track starts in.
    pub default_octave: u8,
    /// Relative jump anchor.
    pub jump_anchor: JumpAnchor,
    /// Articulation ids above this are treated as false positives.
    pub articulation_ceiling: u32,
}

/// A packed note split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedNote {
    /// Note index (0..12 pitches, or the tie/rest sentinels).
    pub index: u8,
    /// Index into the duration table.
    pub duration_index: u8,
}

impl DialectConstants {
    /// Split a packed note byte into note and duration index.
    pub fn decompose(&self, value: u8) -> PackedNote {
        let n = self.durations.len().max(1) as u8;
        PackedNote {
            index: value / n,
            duration_index: value % n,
        }
    }

    /// Resolve a jump operand to a target offset.
    ///
    /// `operand_at` is the offset of the first operand byte and `operand_len`
    /// the number of bytes the offset field occupies.
    pub fn jump_target(&self, operand_at: u32, operand_len: u32, raw: i32) -> Option<u32> {
        let anchor = match self.jump_anchor {
            JumpAnchor::Absolute => return u32::try_from(raw).ok(),
            JumpAnchor::OperandStart => operand_at as i64,
            JumpAnchor::AfterOperand => operand_at as i64 + operand_len as i64,
        };
        u32::try_from(anchor + raw as i64).ok()
    }
}

/// Fills a 256-slot opcode table.
pub(crate) struct TableBuilder {
    slots: [OpEntry; 256],
}

impl TableBuilder {
    pub(crate) fn new() -> Self {
        Self {
            slots: [OpEntry::UNMAPPED; 256],
        }
    }

    pub(crate) fn set(&mut self, byte: u8, op: Op, operands: u8) -> &mut Self {
        self.slots[byte as usize] = OpEntry { op, operands };
        self
    }

    pub(crate) fn range(
        &mut self,
        bytes: std::ops::RangeInclusive<u8>,
        op: Op,
        operands: u8,
    ) -> &mut Self {
        for b in bytes {
            self.set(b, op, operands);
        }
        self
    }

    /// Assign `ops` to consecutive bytes starting at `first`.
    pub(crate) fn sequence(&mut self, first: u8, ops: &[(Op, u8)]) -> &mut Self {
        for (i, &(op, operands)) in ops.iter().enumerate() {
            self.set(first.wrapping_add(i as u8), op, operands);
        }
        self
    }

    pub(crate) fn build(&self) -> [OpEntry; 256] {
        self.slots
    }
}

/// Immutable opcode table for one dialect/version/variant.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTable {
    dialect: Dialect,
    primary: [OpEntry; 256],
    extended: [OpEntry; 256],
    extended_prefix: Option<u8>,
    constants: DialectConstants,
}

impl EventTable {
    pub(crate) fn new(
        dialect: Dialect,
        primary: [OpEntry; 256],
        extended: Option<(u8, [OpEntry; 256])>,
        constants: DialectConstants,
    ) -> Self {
        let (extended_prefix, extended) = match extended {
            Some((prefix, table)) => (Some(prefix), table),
            None => (None, [OpEntry::UNMAPPED; 256]),
        };
        Self {
            dialect,
            primary,
            extended,
            extended_prefix,
            constants,
        }
    }

    /// Dialect this table was built for.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Look up a primary opcode.
    pub fn lookup(&self, byte: u8) -> OpEntry {
        self.primary[byte as usize]
    }

    /// Look up the byte following the extended prefix.
    pub fn lookup_extended(&self, byte: u8) -> OpEntry {
        self.extended[byte as usize]
    }

    /// The extended-opcode prefix byte, if the dialect has one.
    pub fn extended_prefix(&self) -> Option<u8> {
        self.extended_prefix
    }

    /// Dialect constants.
    pub fn constants(&self) -> &DialectConstants {
        &self.constants
    }
}

/// Build the opcode table for `dialect`.
///
/// Pure and deterministic; use [`super::event_table`] to share one table per
/// dialect.
pub fn build_event_table(dialect: Dialect) -> EventTable {
    match dialect {
        Dialect::Akao { version, quirks } => akao::build_table(dialect, version, quirks),
        Dialect::Nspc { version } => nspc::build_table(dialect, version),
    }
}
