//! Dialect-independent sequence events.

use serde::Serialize;

use crate::dialect::EnvelopeParam;

/// One decoded event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeqEvent {
    /// Offset of the opcode in the source.
    pub offset: u32,
    /// Bytes consumed (opcode, prefix and operands).
    pub length: u32,
    /// Absolute time in ticks.
    pub time: u32,
    /// What happened.
    pub kind: EventKind,
}

/// Event kinds with their decoded payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum EventKind {
    /// A sounding note. `gate` is the audible part of `duration`.
    Note {
        /// MIDI key.
        key: u8,
        /// MIDI velocity.
        velocity: u8,
        /// Ticks until the next event on this track.
        duration: u32,
        /// Ticks the key is held.
        gate: u32,
        /// Key addresses a drum kit slot rather than a pitch.
        drum: bool,
    },
    /// Extension of the previous note.
    Tie {
        /// Ticks added.
        duration: u32,
    },
    /// Silence.
    Rest {
        /// Ticks of silence.
        duration: u32,
    },
    /// Instrument selector.
    ProgramChange {
        /// Raw program/articulation id.
        program: u32,
    },
    /// Drum kit mode switch.
    DrumKit {
        /// New state.
        enabled: bool,
    },
    /// Channel volume (MIDI scale).
    Volume {
        /// 0..=127.
        value: u8,
    },
    /// Channel volume fade.
    VolumeFade {
        /// Target, 0..=127.
        target: u8,
        /// Fade length in ticks.
        ticks: u32,
    },
    /// Master volume (MIDI scale).
    MasterVolume {
        /// 0..=127.
        value: u8,
    },
    /// Expression (MIDI scale).
    Expression {
        /// 0..=127.
        value: u8,
    },
    /// Expression fade.
    ExpressionFade {
        /// Target, 0..=127.
        target: u8,
        /// Fade length in ticks.
        ticks: u32,
    },
    /// Pan (MIDI scale, 64 = centre).
    Pan {
        /// 0..=127.
        value: u8,
    },
    /// Pan fade.
    PanFade {
        /// Target, 0..=127.
        target: u8,
        /// Fade length in ticks.
        ticks: u32,
    },
    /// Transpose in semitones.
    Transpose {
        /// Absolute track transpose.
        semitones: i8,
        /// Applies to all tracks.
        global: bool,
    },
    /// Fine tune.
    FineTune {
        /// Offset in cents.
        cents: f64,
    },
    /// Pitch bend towards an offset.
    PitchBend {
        /// Target offset in semitones.
        semitones: i16,
        /// Slide length in ticks (0 = immediate).
        ticks: u32,
    },
    /// Portamento switch.
    Portamento {
        /// Glide speed; `None` turns portamento off.
        speed: Option<u8>,
    },
    /// Pitch envelope applied to following notes.
    PitchEnvelope {
        /// Delay before the envelope starts.
        delay: u8,
        /// Envelope length.
        length: u8,
        /// Semitone offset; `None` turns the envelope off.
        semitones: Option<i8>,
    },
    /// Modulation LFO settings.
    Lfo {
        /// Modulated parameter.
        target: LfoTarget,
        /// Depth (raw driver units); 0 turns the LFO off.
        depth: u8,
        /// Rate (raw driver units).
        rate: u8,
        /// Delay before onset.
        delay: u8,
    },
    /// Tempo.
    Tempo {
        /// Beats per minute.
        bpm: f64,
        /// Fade length in ticks (0 = immediate).
        ticks: u32,
    },
    /// Reverb/echo send switch.
    Reverb {
        /// New state.
        enabled: bool,
    },
    /// Reverb depth (raw driver units).
    ReverbDepth {
        /// Depth.
        depth: i16,
        /// Fade length in ticks.
        ticks: u32,
    },
    /// Noise generator switch.
    Noise {
        /// New state.
        enabled: bool,
    },
    /// Frequency modulation switch.
    Fm {
        /// New state.
        enabled: bool,
    },
    /// Inline envelope register change.
    Envelope {
        /// Which field.
        param: EnvelopeParam,
        /// Raw register value.
        value: u8,
    },
    /// Envelope restored to the articulation default.
    ResetEnvelope,
    /// Slur switch.
    Slur {
        /// New state.
        enabled: bool,
    },
    /// Legato switch.
    Legato {
        /// New state.
        enabled: bool,
    },
    /// Loop start.
    LoopStart {
        /// Nesting level after the push.
        depth: u8,
    },
    /// Loop end (either repeats or falls through).
    LoopEnd {
        /// Repeat count as encoded.
        count: u8,
    },
    /// The track loops forever from here; decoding stopped.
    LoopForever {
        /// Offset decoding would resume at.
        target: u32,
    },
    /// Jump to another offset.
    Jump {
        /// Target offset.
        target: u32,
        /// `false` for a CPU-conditional jump that fell through.
        taken: bool,
    },
    /// Subroutine call.
    Call {
        /// Target offset.
        target: u32,
    },
    /// Subroutine return.
    Return,
    /// Time signature.
    TimeSignature {
        /// Beats per measure.
        numerator: u8,
        /// Beat unit.
        denominator: u8,
    },
    /// Measure marker.
    Measure {
        /// Measure number.
        number: u16,
    },
    /// Known opcode with no modelled effect.
    Other {
        /// Symbolic name of the opcode.
        name: &'static str,
    },
    /// End of the track.
    EndOfTrack,
    /// Unknown opcode; decoding stopped.
    Unknown {
        /// Raw byte.
        opcode: u8,
    },
}

/// Parameter modulated by an LFO event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LfoTarget {
    /// Pitch.
    Vibrato,
    /// Volume.
    Tremolo,
    /// Pan.
    Pan,
}

impl EventKind {
    /// Ticks this event advances the track clock by.
    pub fn advance(&self) -> u32 {
        match self {
            EventKind::Note { duration, .. }
            | EventKind::Tie { duration }
            | EventKind::Rest { duration } => *duration,
            _ => 0,
        }
    }

    /// Short name used in listings.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Note { .. } => "note",
            EventKind::Tie { .. } => "tie",
            EventKind::Rest { .. } => "rest",
            EventKind::ProgramChange { .. } => "program",
            EventKind::DrumKit { .. } => "drum_kit",
            EventKind::Volume { .. } => "volume",
            EventKind::VolumeFade { .. } => "volume_fade",
            EventKind::MasterVolume { .. } => "master_volume",
            EventKind::Expression { .. } => "expression",
            EventKind::ExpressionFade { .. } => "expression_fade",
            EventKind::Pan { .. } => "pan",
            EventKind::PanFade { .. } => "pan_fade",
            EventKind::Transpose { .. } => "transpose",
            EventKind::FineTune { .. } => "fine_tune",
            EventKind::PitchBend { .. } => "pitch_bend",
            EventKind::Portamento { .. } => "portamento",
            EventKind::PitchEnvelope { .. } => "pitch_envelope",
            EventKind::Lfo { .. } => "lfo",
            EventKind::Tempo { .. } => "tempo",
            EventKind::Reverb { .. } => "reverb",
            EventKind::ReverbDepth { .. } => "reverb_depth",
            EventKind::Noise { .. } => "noise",
            EventKind::Fm { .. } => "fm",
            EventKind::Envelope { .. } => "envelope",
            EventKind::ResetEnvelope => "reset_envelope",
            EventKind::Slur { .. } => "slur",
            EventKind::Legato { .. } => "legato",
            EventKind::LoopStart { .. } => "loop_start",
            EventKind::LoopEnd { .. } => "loop_end",
            EventKind::LoopForever { .. } => "loop_forever",
            EventKind::Jump { .. } => "jump",
            EventKind::Call { .. } => "call",
            EventKind::Return => "return",
            EventKind::TimeSignature { .. } => "time_signature",
            EventKind::Measure { .. } => "measure",
            EventKind::Other { name } => name,
            EventKind::EndOfTrack => "end_of_track",
            EventKind::Unknown { .. } => "unknown",
        }
    }
}
