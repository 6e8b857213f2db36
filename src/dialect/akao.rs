//! AKAO opcode tables (PlayStation, three header generations).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::table::{
    DialectConstants, EnvelopeParam, EventTable, GateRule, JumpAnchor, Op, TableBuilder,
};
use super::Dialect;

/// AKAO header/opcode generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AkaoVersion {
    /// Earliest layout: no instrument table, programs are articulation ids.
    V1,
    /// Adds instrument and drum kit tables to the header.
    V2,
    /// Wide header, track mask at `0x20`, jumps anchored on the operand.
    V3,
}

bitflags! {
    /// Game-specific behaviour that differs between titles sharing one version.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AkaoQuirks: u8 {
        /// Drum kit off leaves the drum kit program selected.
        const DRUM_KIT_OFF_KEEPS_PROGRAM = 0x01;
        /// Extended opcode `0x1C` carries two operand bytes instead of one.
        const FE1C_TWO_OPERANDS = 0x02;
    }
}

/// The extended opcode prefix.
pub const EXTENDED_PREFIX: u8 = 0xFE;

/// Durations (ticks at 48 PPQN) addressed by packed notes.
pub const DURATIONS: [u32; 11] = [192, 96, 48, 24, 12, 6, 3, 32, 16, 8, 4];

/// Program number assigned to the drum kit instrument.
pub const DRUM_KIT_PROGRAM: u32 = 0x80;

/// Sequencer interrupt period in microseconds (240 Hz root counter).
pub const TICK_INTERVAL_US: f64 = 1_000_000.0 / 240.0;

/// Convert a raw tempo word to beats per minute.
pub fn tempo_bpm(raw: u32, ppqn: u16) -> f64 {
    if raw == 0 {
        return 0.0;
    }
    raw as f64 * 60_000_000.0 / (ppqn as f64 * 65_536.0 * TICK_INTERVAL_US)
}

fn constants(version: AkaoVersion) -> DialectConstants {
    DialectConstants {
        ppqn: 48,
        max_tracks: 32,
        note_ceiling: 0x9A,
        durations: &DURATIONS,
        tie_index: 12,
        rest_index: 13,
        note_base: 0xF0,
        key_base: 0,
        percussion_base: 0,
        gate: GateRule::Gap(2),
        loop_depth: 4,
        call_depth: 4,
        infinite_loop_count: 0,
        default_octave: 5,
        jump_anchor: match version {
            AkaoVersion::V3 => JumpAnchor::OperandStart,
            _ => JumpAnchor::AfterOperand,
        },
        articulation_ceiling: 0x7FF,
    }
}

pub(crate) fn build_table(dialect: Dialect, version: AkaoVersion, quirks: AkaoQuirks) -> EventTable {
    use EnvelopeParam::*;

    let mut primary = TableBuilder::new();
    primary.range(0x00..=0x99, Op::PackedNote, 0).sequence(
        0xA0,
        &[
            (Op::EndOfTrack, 0),
            (Op::Program, 1),
            (Op::OneTimeDuration, 1),
            (Op::Volume, 1),
            (Op::PitchBendSlide, 2),
            (Op::Octave, 1),
            (Op::OctaveUp, 0),
            (Op::OctaveDown, 0),
            (Op::Expression, 1),
            (Op::ExpressionFade, 2),
            (Op::Pan, 1),
            (Op::PanFade, 2),
            (Op::NoiseClock, 1),
            (Op::Envelope(AttackRate), 1),
            (Op::Envelope(DecayRate), 1),
            (Op::Envelope(SustainLevel), 1),
            (Op::DecaySustain, 2),
            (Op::Envelope(SustainRate), 1),
            (Op::Envelope(ReleaseRate), 1),
            (Op::ResetEnvelope, 0),
            (Op::Vibrato, 3),
            (Op::VibratoDepth, 1),
            (Op::VibratoOff, 0),
            (Op::Envelope(AttackMode), 1),
            (Op::Tremolo, 3),
            (Op::TremoloDepth, 1),
            (Op::TremoloOff, 0),
            (Op::Envelope(SustainMode), 1),
            (Op::PanLfo, 2),
            (Op::PanLfoDepth, 1),
            (Op::PanLfoOff, 0),
            (Op::Envelope(ReleaseMode), 1),
            (Op::Transpose, 1),
            (Op::RelativeTranspose, 1),
            (Op::Reverb(true), 0),
            (Op::Reverb(false), 0),
            (Op::Noise(true), 0),
            (Op::Noise(false), 0),
            (Op::Fm(true), 0),
            (Op::Fm(false), 0),
            (Op::LoopStart, 0),
            (Op::LoopUntil, 1),
            (Op::LoopAgain, 0),
        ],
    );
    primary
        .set(0xCC, Op::Slur(true), 0)
        .set(0xCD, Op::Slur(false), 0)
        .set(0xD0, Op::Legato(true), 0)
        .set(0xD1, Op::Legato(false), 0)
        .set(0xD8, Op::FineTune, 1)
        .set(0xD9, Op::RelativeFineTune, 1)
        .set(0xDA, Op::Portamento, 1)
        .set(0xDB, Op::PortamentoOff, 0)
        .set(0xDC, Op::FixedNoteLength, 1)
        .range(0xDD..=0xDF, Op::LfoDepthFade, 2)
        .set(EXTENDED_PREFIX, Op::ExtendedPrefix, 0);

    if version == AkaoVersion::V3 {
        primary
            .range(0xE0..=0xE7, Op::Ignored, 0)
            .range(0xF0..=0xFB, Op::NoteWithLength, 1);
    }

    let mut extended = TableBuilder::new();
    extended.sequence(
        0x00,
        &[
            (Op::Tempo, 2),
            (Op::TempoFade, 3),
            (Op::ReverbDepth, 2),
            (Op::ReverbDepthFade, 3),
            (Op::DrumKit(true), 0),
            (Op::DrumKit(false), 0),
            (Op::Jump, 2),
            (Op::ConditionalJump, 3),
            (Op::LoopBreak(0), 3),
        ],
    );
    if version >= AkaoVersion::V2 {
        extended.set(0x09, Op::LoopBreak(1), 3);
    }
    extended
        .set(0x0E, Op::Call, 2)
        .set(0x0F, Op::Return, 0)
        .set(0x10, Op::AllocateVoices, 1)
        .set(0x15, Op::TimeSignature, 2)
        .set(0x16, Op::Measure, 2);
    let fe1c_operands = if quirks.contains(AkaoQuirks::FE1C_TWO_OPERANDS) {
        2
    } else {
        1
    };
    extended.set(0x1C, Op::Ignored, fe1c_operands);

    EventTable::new(
        dialect,
        primary.build(),
        Some((EXTENDED_PREFIX, extended.build())),
        constants(version),
    )
}
