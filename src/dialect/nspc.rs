//! N-SPC opcode tables (SNES, SPC700 sound driver).

use serde::{Deserialize, Serialize};

use super::table::{DialectConstants, EventTable, GateRule, JumpAnchor, Op, TableBuilder};
use super::Dialect;

/// N-SPC driver generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NspcVersion {
    /// First-generation driver with the compressed command range.
    Earlier,
    /// The common driver revision.
    Standard,
}

/// Quantize (gate) rates selected by the high nibble of a note parameter byte.
pub const QUANTIZE_TABLE: [u8; 8] = [0x32, 0x65, 0x7F, 0x98, 0xB2, 0xCB, 0xE5, 0xFC];

/// Velocities selected by the low nibble of a note parameter byte.
pub const VELOCITY_TABLE: [u8; 16] = [
    0x19, 0x32, 0x4C, 0x65, 0x72, 0x7F, 0x8C, 0x98, 0xA5, 0xB2, 0xBF, 0xCB, 0xD8, 0xE5, 0xF2, 0xFC,
];

/// Timer 0 period in microseconds as programmed by the driver.
pub const TIMER_INTERVAL_US: f64 = 2_000.0;

/// MIDI key of the first percussion slot.
pub const PERCUSSION_KEY_BASE: u8 = 36;

/// Sequencer pulses per quarter note.
pub const PPQN: u16 = 48;

/// Convert the driver tempo byte to beats per minute.
pub fn tempo_bpm(raw: u32) -> f64 {
    // The tempo byte is added to an 8-bit accumulator every timer tick.
    raw as f64 * 60_000_000.0 / (PPQN as f64 * 256.0 * TIMER_INTERVAL_US)
}

fn constants(version: NspcVersion) -> DialectConstants {
    let percussion_base = match version {
        NspcVersion::Earlier => 0xD0,
        NspcVersion::Standard => 0xCA,
    };
    DialectConstants {
        ppqn: PPQN,
        max_tracks: 8,
        note_ceiling: 0,
        durations: &[],
        tie_index: 0,
        rest_index: 0,
        note_base: 0x80,
        key_base: 24,
        percussion_base,
        gate: GateRule::Quantize,
        loop_depth: 4,
        call_depth: 4,
        infinite_loop_count: 0,
        default_octave: 0,
        jump_anchor: JumpAnchor::Absolute,
        articulation_ceiling: 127,
    }
}

/// Command opcodes in driver order, starting at `0xE0` (standard).
const STANDARD_COMMANDS: [(Op, u8); 27] = [
    (Op::Program, 1),
    (Op::Pan, 1),
    (Op::PanFade, 2),
    (Op::Vibrato, 3),
    (Op::VibratoOff, 0),
    (Op::MasterVolume, 1),
    (Op::MasterVolumeFade, 2),
    (Op::Tempo, 1),
    (Op::TempoFade, 2),
    (Op::GlobalTranspose, 1),
    (Op::Transpose, 1),
    (Op::Tremolo, 3),
    (Op::TremoloOff, 0),
    (Op::Volume, 1),
    (Op::VolumeFade, 2),
    (Op::CountedCall, 3),
    (Op::VibratoFade, 1),
    (Op::PitchEnvelopeTo, 3),
    (Op::PitchEnvelopeFrom, 3),
    (Op::PitchEnvelopeOff, 0),
    (Op::FineTune, 1),
    (Op::EchoOn, 3),
    (Op::EchoOff, 0),
    (Op::EchoParams, 3),
    (Op::EchoVolumeFade, 3),
    (Op::PitchSlide, 3),
    (Op::PercussionBase, 1),
];

pub(crate) fn build_table(dialect: Dialect, version: NspcVersion) -> EventTable {
    let mut t = TableBuilder::new();
    t.set(0x00, Op::EndOfBlock, 0)
        .range(0x01..=0x7F, Op::NoteLength, 0);

    match version {
        NspcVersion::Standard => {
            t.range(0x80..=0xC7, Op::Note, 0)
                .set(0xC8, Op::Tie, 0)
                .set(0xC9, Op::Rest, 0)
                .range(0xCA..=0xDF, Op::Percussion, 0)
                .sequence(0xE0, &STANDARD_COMMANDS);
        }
        NspcVersion::Earlier => {
            let commands: Vec<(Op, u8)> = STANDARD_COMMANDS
                .iter()
                .copied()
                .filter(|(op, _)| !matches!(op, Op::Transpose | Op::PercussionBase))
                .collect();
            t.range(0x80..=0xC5, Op::Note, 0)
                .set(0xC6, Op::Tie, 0)
                .set(0xC7, Op::Rest, 0)
                .range(0xD0..=0xD9, Op::Percussion, 0)
                .sequence(0xDA, &commands);
        }
    }

    EventTable::new(dialect, t.build(), None, constants(version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn standard_layout() {
        let d = Dialect::nspc();
        let t = build_table(d, NspcVersion::Standard);
        assert_eq!(t.lookup(0x00).op, Op::EndOfBlock);
        assert_eq!(t.lookup(0x30).op, Op::NoteLength);
        assert_eq!(t.lookup(0xC8).op, Op::Tie);
        assert_eq!(t.lookup(0xE7).op, Op::Tempo);
        assert_eq!(t.lookup(0xEF).op, Op::CountedCall);
        assert_eq!(t.lookup(0xEF).operands, 3);
        assert_eq!(t.lookup(0xFA).op, Op::PercussionBase);
        assert_eq!(t.lookup(0xFB).op, Op::Unmapped);
        assert_eq!(t.extended_prefix(), None);
    }

    #[test]
    fn earlier_layout_is_compressed() {
        let d = Dialect::Nspc {
            version: NspcVersion::Earlier,
        };
        let t = build_table(d, NspcVersion::Earlier);
        assert_eq!(t.lookup(0xC6).op, Op::Tie);
        assert_eq!(t.lookup(0xDA).op, Op::Program);
        assert_eq!(t.lookup(0xE1).op, Op::Tempo);
        assert_eq!(t.lookup(0xE8).op, Op::CountedCall);
        assert_eq!(t.lookup(0xF2).op, Op::PitchSlide);
        assert_eq!(t.lookup(0xF3).op, Op::Unmapped);
    }

    #[test]
    fn tempo_conversion() {
        assert_relative_eq!(tempo_bpm(0x20), 78.125, epsilon = 1e-9);
    }
}
