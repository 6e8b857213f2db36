//! The per-track decode state machine.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use bitflags::bitflags;

use super::stack::{CallStack, LoopStack};
use super::{CursorOptions, DecodeError};
use crate::diagnostics::Diagnostics;
use crate::dialect::{akao, nspc, Dialect, EnvelopeParam, EventTable, GateRule, Op};
use crate::envelope::volume::{scale_pan, scale_volume};
use crate::model::{EventKind, LfoTarget, SeqEvent, TrackEnd};
use crate::source::{ByteSource, ReadError};

const COMPONENT: &str = "decoder";

bitflags! {
    /// Articulation switches carried by a track.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TrackFlags: u8 {
        /// Notes are slurred into the next one.
        const SLUR = 0x01;
        /// Notes are played legato.
        const LEGATO = 0x02;
        /// Notes address drum kit slots.
        const DRUM_KIT = 0x04;
        /// Portamento between notes.
        const PORTAMENTO = 0x08;
    }
}

/// Cursor lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// More events may follow.
    Active,
    /// Decoding stopped.
    Finished(TrackEnd),
}

#[derive(Debug, Clone)]
struct Voice {
    octave: u8,
    transpose: i8,
    global_transpose: i8,
    fine_tune: i16,
    program: u32,
    saved_program: u32,
    flags: TrackFlags,
    note_length: u32,
    quantize: u8,
    velocity: u8,
    one_time: Option<u32>,
    fixed_length: Option<u32>,
    lfo: [(u8, u8, u8); 3],
    last_key: u8,
}

impl Voice {
    fn new(default_octave: u8) -> Self {
        Self {
            octave: default_octave,
            transpose: 0,
            global_transpose: 0,
            fine_tune: 0,
            program: 0,
            saved_program: 0,
            flags: TrackFlags::empty(),
            note_length: 0,
            quantize: nspc::QUANTIZE_TABLE[7],
            velocity: nspc::VELOCITY_TABLE[15],
            one_time: None,
            fixed_length: None,
            lfo: [(0, 0, 0); 3],
            last_key: 60,
        }
    }
}

/// Decodes one track lazily.
pub struct TrackCursor<'a> {
    source: &'a dyn ByteSource,
    table: Arc<EventTable>,
    diag: &'a Diagnostics,
    options: CursorOptions,
    offset: u32,
    time: u32,
    state: CursorState,
    voice: Voice,
    loops: LoopStack,
    calls: CallStack,
    context: u64,
    visited: HashSet<(u32, u64)>,
    seen: HashSet<u32>,
    pending: BTreeMap<u32, u32>,
    queue: VecDeque<SeqEvent>,
    open_note: Option<usize>,
    emitted: usize,
    steps: usize,
    error: Option<DecodeError>,
    programs: BTreeSet<u32>,
}

impl<'a> TrackCursor<'a> {
    /// Create a cursor positioned at `start`.
    pub fn new(
        source: &'a dyn ByteSource,
        table: Arc<EventTable>,
        start: u32,
        options: CursorOptions,
        diag: &'a Diagnostics,
    ) -> Self {
        let c = table.constants();
        let voice = Voice::new(c.default_octave);
        let loops = LoopStack::new(c.loop_depth);
        let calls = CallStack::new(c.call_depth);
        let mut cursor = Self {
            source,
            table,
            diag,
            options,
            offset: start,
            time: 0,
            state: CursorState::Active,
            voice,
            loops,
            calls,
            context: 0,
            visited: HashSet::new(),
            seen: HashSet::new(),
            pending: BTreeMap::new(),
            queue: VecDeque::new(),
            open_note: None,
            emitted: 0,
            steps: 0,
            error: None,
            programs: BTreeSet::new(),
        };
        cursor.refresh_context();
        cursor
    }

    /// Current state.
    pub fn state(&self) -> &CursorState {
        &self.state
    }

    /// Returns `true` once decoding stopped.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, CursorState::Finished(_))
    }

    /// Terminal condition, if finished.
    pub fn end(&self) -> Option<TrackEnd> {
        match &self.state {
            CursorState::Finished(end) => Some(end.clone()),
            CursorState::Active => None,
        }
    }

    /// Read offset of the next opcode.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Track clock in ticks.
    pub fn time(&self) -> u32 {
        self.time
    }

    /// Programs selected so far.
    pub fn programs(&self) -> &BTreeSet<u32> {
        &self.programs
    }

    /// Conditional branch sites seen once and their destinations.
    pub fn pending_branches(&self) -> &BTreeMap<u32, u32> {
        &self.pending
    }

    /// Pending branch sites whose destination was never decoded.
    pub fn unreached_branches(&self) -> BTreeSet<u32> {
        self.pending
            .iter()
            .filter(|(_, target)| !self.seen.contains(target))
            .map(|(&site, _)| site)
            .collect()
    }

    /// Continue decoding at `offset` with fresh loop/call state, keeping the
    /// voice settings and clock. Used for block-structured songs.
    pub fn restart_at(&mut self, offset: u32, tick_limit: Option<u32>) {
        self.offset = offset;
        self.options.tick_limit = tick_limit;
        self.state = CursorState::Active;
        self.loops.clear();
        self.calls.clear();
        self.visited.clear();
        self.error = None;
        self.emitted = 0;
        self.steps = 0;
        self.refresh_context();
    }

    /// Move the track clock forward without emitting anything.
    pub fn advance_to(&mut self, time: u32) {
        self.time = self.time.max(time);
    }

    /// Drain the cursor. Decode errors end the track as
    /// [`TrackEnd::Aborted`] and are logged.
    pub fn decode_all(&mut self) -> Vec<SeqEvent> {
        let mut events = Vec::new();
        while let Some(item) = self.next() {
            match item {
                Ok(ev) => events.push(ev),
                Err(e) => self.diag.warn(
                    COMPONENT,
                    format!("{}: track aborted: {e}", self.source.name()),
                ),
            }
        }
        events
    }

    fn finish(&mut self, end: TrackEnd) {
        self.state = CursorState::Finished(end);
        self.open_note = None;
    }

    fn refresh_context(&mut self) {
        let mut h = DefaultHasher::new();
        self.loops.frames().hash(&mut h);
        self.calls.frames().hash(&mut h);
        self.context = h.finish();
    }

    fn push(&mut self, offset: u32, length: u32, kind: EventKind) {
        let advance = kind.advance();
        self.queue.push_back(SeqEvent {
            offset,
            length,
            time: self.time,
            kind,
        });
        self.time = self.time.saturating_add(advance);
        self.emitted += 1;
    }

    fn gate_for(&self, duration: u32) -> u32 {
        if duration == 0 {
            return 0;
        }
        match self.table.constants().gate {
            GateRule::Gap(_) if self
                .voice
                .flags
                .intersects(TrackFlags::SLUR | TrackFlags::LEGATO) =>
            {
                duration
            }
            GateRule::Gap(gap) => duration.saturating_sub(gap).max(1),
            GateRule::Quantize => ((duration * self.voice.quantize as u32) >> 8).max(1),
        }
    }

    fn emit_note(&mut self, at: u32, length: u32, key: i32, velocity: u8, duration: u32, drum: bool) {
        let key = key.clamp(0, 127) as u8;
        let gate = self.gate_for(duration);
        self.voice.last_key = key;
        self.push(
            at,
            length,
            EventKind::Note {
                key,
                velocity,
                duration,
                gate,
                drum,
            },
        );
        self.open_note = Some(self.queue.len() - 1);
    }

    fn emit_tie(&mut self, at: u32, length: u32, duration: u32) {
        if let Some(i) = self.open_note {
            let tail = self.gate_for(duration);
            let elapsed = self.time - self.queue[i].time;
            if let EventKind::Note { gate, .. } = &mut self.queue[i].kind {
                *gate = elapsed + tail;
            }
        }
        self.push(at, length, EventKind::Tie { duration });
    }

    fn emit_rest(&mut self, at: u32, length: u32, duration: u32) {
        self.open_note = None;
        self.push(at, length, EventKind::Rest { duration });
    }

    fn can_release(&self) -> bool {
        !self.queue.is_empty() && self.open_note != Some(0)
    }

    fn pop_front(&mut self) -> Option<SeqEvent> {
        let ev = self.queue.pop_front()?;
        self.open_note = self.open_note.map(|i| i - 1);
        Some(ev)
    }

    fn read_operands(&self, at: u32, count: u8) -> Result<[u8; 4], DecodeError> {
        let mut ops = [0u8; 4];
        let end = at + count as u32;
        if end > self.options.bounds.end {
            return Err(ReadError::OutOfBounds {
                offset: at,
                len: count as u32,
                size: self.options.bounds.end,
            }
            .into());
        }
        ops[..count as usize].copy_from_slice(self.source.bytes(at, count as u32)?);
        Ok(ops)
    }

    fn unknown(&mut self, at: u32, opcode: u8) {
        self.diag.error(
            COMPONENT,
            format!(
                "{}: unknown opcode 0x{opcode:02X} at 0x{at:06X}",
                self.source.name()
            ),
        );
        self.push(at, 1, EventKind::Unknown { opcode });
        self.finish(TrackEnd::UnknownOpcode { offset: at, opcode });
    }

    fn follow_jump(&mut self, at: u32, length: u32, target: Option<u32>) {
        let Some(target) = target.filter(|t| self.options.bounds.contains(t)) else {
            self.push(at, length, EventKind::Other { name: "jump" });
            self.finish(TrackEnd::OutOfRange);
            return;
        };
        if self.visited.contains(&(target, self.context)) {
            self.push(at, length, EventKind::LoopForever { target });
            self.finish(TrackEnd::LoopForever);
            return;
        }
        self.push(
            at,
            length,
            EventKind::Jump {
                target,
                taken: true,
            },
        );
        self.offset = target;
    }

    fn step(&mut self) -> Result<(), DecodeError> {
        if let Some(limit) = self.options.tick_limit {
            if self.time >= limit {
                self.finish(TrackEnd::TickLimit);
                return Ok(());
            }
        }
        if self.emitted >= self.options.max_events
            || self.steps >= self.options.max_events.saturating_mul(4)
        {
            self.diag.warn(
                COMPONENT,
                format!(
                    "{}: event limit reached at 0x{:06X}",
                    self.source.name(),
                    self.offset
                ),
            );
            self.finish(TrackEnd::EventLimit);
            return Ok(());
        }
        if !self.options.bounds.contains(&self.offset) {
            self.finish(TrackEnd::OutOfRange);
            return Ok(());
        }

        self.steps += 1;
        let at = self.offset;
        self.visited.insert((at, self.context));
        self.seen.insert(at);

        let opcode = self.source.read_u8(at)?;
        let mut code = opcode;
        let mut entry = self.table.lookup(opcode);
        let mut operand_at = at + 1;
        if entry.op == Op::ExtendedPrefix {
            code = self.read_operands(at + 1, 1)?[0];
            entry = self.table.lookup_extended(code);
            operand_at = at + 2;
        }
        if entry.op == Op::Unmapped {
            self.unknown(at, code);
            return Ok(());
        }

        let ops = self.read_operands(operand_at, entry.operands)?;
        self.offset = operand_at + entry.operands as u32;
        let length = self.offset - at;
        self.dispatch(entry.op, code, at, length, operand_at, ops)
    }

    fn dispatch(
        &mut self,
        op: Op,
        code: u8,
        at: u32,
        len: u32,
        operand_at: u32,
        ops: [u8; 4],
    ) -> Result<(), DecodeError> {
        let table = Arc::clone(&self.table);
        let c = table.constants();
        let dialect = table.dialect();
        let is_akao = matches!(dialect, Dialect::Akao { .. });
        let scale = self.options.volume_scale;
        let word = |i: usize| u16::from_le_bytes([ops[i], ops[i + 1]]);
        let signed_word = |i: usize| i16::from_le_bytes([ops[i], ops[i + 1]]) as i32;

        match op {
            Op::Unmapped | Op::ExtendedPrefix => self.unknown(at, code),

            Op::PackedNote => {
                let note = c.decompose(code);
                let table_duration = c.durations[note.duration_index as usize];
                let duration = self
                    .voice
                    .one_time
                    .take()
                    .or(self.voice.fixed_length)
                    .unwrap_or(table_duration);
                self.indexed_note(at, len, note.index, duration);
            }
            Op::NoteWithLength => {
                let duration = self.voice.one_time.take().unwrap_or(ops[0] as u32);
                self.indexed_note(at, len, code - c.note_base, duration);
            }
            Op::Note => {
                let key = (code - c.note_base) as i32
                    + c.key_base as i32
                    + self.voice.transpose as i32
                    + self.voice.global_transpose as i32;
                let velocity = scale_volume(self.voice.velocity as u32, 0xFC, scale);
                let duration = self.voice.note_length;
                self.emit_note(at, len, key, velocity, duration, false);
            }
            Op::Percussion => {
                let key = nspc::PERCUSSION_KEY_BASE as i32 + (code - c.percussion_base) as i32;
                let velocity = scale_volume(self.voice.velocity as u32, 0xFC, scale);
                let duration = self.voice.note_length;
                self.emit_note(at, len, key, velocity, duration, true);
            }
            Op::Tie => {
                let d = self.voice.note_length;
                self.emit_tie(at, len, d);
            }
            Op::Rest => {
                let d = self.voice.note_length;
                self.emit_rest(at, len, d);
            }
            Op::NoteLength => {
                self.voice.note_length = code as u32;
                if self.options.bounds.contains(&self.offset) {
                    let param = self.source.read_u8(self.offset)?;
                    if param < 0x80 {
                        self.offset += 1;
                        self.voice.quantize = nspc::QUANTIZE_TABLE[((param >> 4) & 7) as usize];
                        self.voice.velocity = nspc::VELOCITY_TABLE[(param & 0x0F) as usize];
                    }
                }
            }
            Op::OneTimeDuration => self.voice.one_time = Some(ops[0] as u32),
            Op::FixedNoteLength => {
                self.voice.fixed_length = (ops[0] != 0).then_some(ops[0] as u32);
            }

            Op::EndOfTrack => {
                self.push(at, len, EventKind::EndOfTrack);
                self.finish(TrackEnd::EndOfTrack);
            }
            Op::EndOfBlock => match self.calls.finish_pass() {
                Some(next) => {
                    self.push(at, len, EventKind::Return);
                    self.offset = next;
                    self.refresh_context();
                }
                None => self.finish(TrackEnd::BlockEnd),
            },

            Op::Program => {
                let program = ops[0] as u32;
                self.voice.program = program;
                self.programs.insert(program);
                self.push(at, len, EventKind::ProgramChange { program });
            }
            Op::DrumKit(true) => {
                self.voice.saved_program = self.voice.program;
                self.voice.program = akao::DRUM_KIT_PROGRAM;
                self.voice.flags.insert(TrackFlags::DRUM_KIT);
                self.programs.insert(akao::DRUM_KIT_PROGRAM);
                self.push(at, len, EventKind::DrumKit { enabled: true });
            }
            Op::DrumKit(false) => {
                self.voice.flags.remove(TrackFlags::DRUM_KIT);
                self.push(at, len, EventKind::DrumKit { enabled: false });
                let keeps = matches!(
                    dialect,
                    Dialect::Akao { quirks, .. }
                        if quirks.contains(akao::AkaoQuirks::DRUM_KIT_OFF_KEEPS_PROGRAM)
                );
                if !keeps {
                    let program = self.voice.saved_program;
                    self.voice.program = program;
                    self.push(at, 0, EventKind::ProgramChange { program });
                }
            }
            Op::PercussionBase => self.push(at, len, EventKind::Other { name: "percussion_base" }),

            Op::Volume => {
                let max = if is_akao { 127 } else { 255 };
                let value = scale_volume(ops[0] as u32, max, scale);
                self.push(at, len, EventKind::Volume { value });
            }
            Op::VolumeFade => {
                let target = scale_volume(ops[1] as u32, 255, scale);
                let ticks = ops[0] as u32;
                self.push(at, len, EventKind::VolumeFade { target, ticks });
            }
            Op::MasterVolume => {
                let value = scale_volume(ops[0] as u32, 255, scale);
                self.push(at, len, EventKind::MasterVolume { value });
            }
            Op::MasterVolumeFade => {
                self.push(at, len, EventKind::Other { name: "master_volume_fade" })
            }
            Op::Expression => {
                let value = scale_volume(ops[0] as u32, 127, scale);
                self.push(at, len, EventKind::Expression { value });
            }
            Op::ExpressionFade => {
                let target = scale_volume(ops[1] as u32, 127, scale);
                let ticks = ops[0] as u32;
                self.push(at, len, EventKind::ExpressionFade { target, ticks });
            }
            Op::Pan => {
                let value = self.pan_value(is_akao, ops[0]);
                self.push(at, len, EventKind::Pan { value });
            }
            Op::PanFade => {
                let target = self.pan_value(is_akao, ops[1]);
                let ticks = ops[0] as u32;
                self.push(at, len, EventKind::PanFade { target, ticks });
            }

            Op::Octave => self.voice.octave = ops[0] & 0x0F,
            Op::OctaveUp => self.voice.octave = self.voice.octave.saturating_add(1).min(10),
            Op::OctaveDown => self.voice.octave = self.voice.octave.saturating_sub(1),
            Op::Transpose | Op::RelativeTranspose | Op::GlobalTranspose => {
                let value = ops[0] as i8;
                let global = op == Op::GlobalTranspose;
                let semitones = match op {
                    Op::RelativeTranspose => {
                        self.voice.transpose = self.voice.transpose.saturating_add(value);
                        self.voice.transpose
                    }
                    Op::GlobalTranspose => {
                        self.voice.global_transpose = value;
                        value
                    }
                    _ => {
                        self.voice.transpose = value;
                        value
                    }
                };
                self.push(at, len, EventKind::Transpose { semitones, global });
            }
            Op::FineTune | Op::RelativeFineTune => {
                let cents = if is_akao {
                    let value = ops[0] as i8 as i16;
                    self.voice.fine_tune = if op == Op::RelativeFineTune {
                        self.voice.fine_tune.saturating_add(value)
                    } else {
                        value
                    };
                    self.voice.fine_tune as f64 * 100.0 / 64.0
                } else {
                    ops[0] as f64 * 100.0 / 256.0
                };
                self.push(at, len, EventKind::FineTune { cents });
            }
            Op::PitchBendSlide => {
                let semitones = ops[1] as i8 as i16;
                let ticks = ops[0] as u32;
                self.push(at, len, EventKind::PitchBend { semitones, ticks });
            }
            Op::PitchSlide => {
                let target = (ops[2] & 0x7F) as i16 + c.key_base;
                let semitones = target - self.voice.last_key as i16;
                let ticks = ops[1] as u32;
                self.push(at, len, EventKind::PitchBend { semitones, ticks });
            }
            Op::Portamento => {
                self.voice.flags.insert(TrackFlags::PORTAMENTO);
                let speed = Some(ops[0]);
                self.push(at, len, EventKind::Portamento { speed });
            }
            Op::PortamentoOff => {
                self.voice.flags.remove(TrackFlags::PORTAMENTO);
                self.push(at, len, EventKind::Portamento { speed: None });
            }
            Op::PitchEnvelopeTo | Op::PitchEnvelopeFrom => {
                let magnitude = ops[2] as i8;
                let semitones = if op == Op::PitchEnvelopeFrom {
                    Some(magnitude.saturating_neg())
                } else {
                    Some(magnitude)
                };
                self.push(
                    at,
                    len,
                    EventKind::PitchEnvelope {
                        delay: ops[0],
                        length: ops[1],
                        semitones,
                    },
                );
            }
            Op::PitchEnvelopeOff => self.push(
                at,
                len,
                EventKind::PitchEnvelope {
                    delay: 0,
                    length: 0,
                    semitones: None,
                },
            ),

            Op::Vibrato => self.lfo(at, len, LfoTarget::Vibrato, Some((ops[0], ops[1], ops[2]))),
            Op::Tremolo => self.lfo(at, len, LfoTarget::Tremolo, Some((ops[0], ops[1], ops[2]))),
            Op::PanLfo => self.lfo(at, len, LfoTarget::Pan, Some((0, ops[0], ops[1]))),
            Op::VibratoDepth => self.lfo_depth(at, len, LfoTarget::Vibrato, ops[0]),
            Op::TremoloDepth => self.lfo_depth(at, len, LfoTarget::Tremolo, ops[0]),
            Op::PanLfoDepth => self.lfo_depth(at, len, LfoTarget::Pan, ops[0]),
            Op::VibratoOff => self.lfo(at, len, LfoTarget::Vibrato, None),
            Op::TremoloOff => self.lfo(at, len, LfoTarget::Tremolo, None),
            Op::PanLfoOff => self.lfo(at, len, LfoTarget::Pan, None),
            Op::VibratoFade => self.push(at, len, EventKind::Other { name: "vibrato_fade" }),
            Op::LfoDepthFade => self.push(at, len, EventKind::Other { name: "lfo_depth_fade" }),

            Op::Tempo | Op::TempoFade => {
                let (raw, ticks) = match (is_akao, op) {
                    (true, Op::Tempo) => (word(0) as u32, 0),
                    (true, _) => (word(1) as u32, ops[0] as u32),
                    (false, Op::Tempo) => (ops[0] as u32, 0),
                    (false, _) => (ops[1] as u32, ops[0] as u32),
                };
                let bpm = match dialect {
                    Dialect::Akao { .. } => akao::tempo_bpm(raw, c.ppqn),
                    Dialect::Nspc { .. } => nspc::tempo_bpm(raw),
                };
                self.push(at, len, EventKind::Tempo { bpm, ticks });
            }

            Op::Reverb(enabled) => self.push(at, len, EventKind::Reverb { enabled }),
            Op::EchoOn => self.push(at, len, EventKind::Reverb { enabled: true }),
            Op::EchoOff => self.push(at, len, EventKind::Reverb { enabled: false }),
            Op::ReverbDepth => {
                let depth = signed_word(0) as i16;
                self.push(at, len, EventKind::ReverbDepth { depth, ticks: 0 });
            }
            Op::ReverbDepthFade => {
                let depth = signed_word(1) as i16;
                let ticks = ops[0] as u32;
                self.push(at, len, EventKind::ReverbDepth { depth, ticks });
            }
            Op::EchoParams => self.push(at, len, EventKind::Other { name: "echo_params" }),
            Op::EchoVolumeFade => self.push(at, len, EventKind::Other { name: "echo_volume_fade" }),
            Op::Noise(enabled) => self.push(at, len, EventKind::Noise { enabled }),
            Op::NoiseClock => self.push(at, len, EventKind::Other { name: "noise_clock" }),
            Op::Fm(enabled) => self.push(at, len, EventKind::Fm { enabled }),

            Op::Envelope(param) => {
                self.push(at, len, EventKind::Envelope { param, value: ops[0] })
            }
            Op::DecaySustain => {
                self.push(
                    at,
                    len,
                    EventKind::Envelope {
                        param: EnvelopeParam::DecayRate,
                        value: ops[0],
                    },
                );
                self.push(
                    at,
                    0,
                    EventKind::Envelope {
                        param: EnvelopeParam::SustainLevel,
                        value: ops[1],
                    },
                );
            }
            Op::ResetEnvelope => self.push(at, len, EventKind::ResetEnvelope),
            Op::Slur(enabled) => {
                self.voice.flags.set(TrackFlags::SLUR, enabled);
                self.push(at, len, EventKind::Slur { enabled });
            }
            Op::Legato(enabled) => {
                self.voice.flags.set(TrackFlags::LEGATO, enabled);
                self.push(at, len, EventKind::Legato { enabled });
            }

            Op::LoopStart => {
                let depth = self.loops.push(self.offset, at)? as u8;
                self.refresh_context();
                self.push(at, len, EventKind::LoopStart { depth });
            }
            Op::LoopUntil | Op::LoopAgain => {
                let count = if op == Op::LoopAgain {
                    c.infinite_loop_count
                } else {
                    ops[0]
                };
                let frame = self.loops.top_mut(at)?;
                frame.iteration = frame.iteration.saturating_add(1);
                let (start, iteration) = (frame.start, frame.iteration);
                self.push(at, len, EventKind::LoopEnd { count });
                if count == c.infinite_loop_count {
                    self.push(at, 0, EventKind::LoopForever { target: start });
                    self.finish(TrackEnd::LoopForever);
                    return Ok(());
                }
                if iteration >= count as u16 {
                    self.loops.pop();
                } else {
                    self.offset = start;
                }
                self.refresh_context();
            }
            Op::LoopBreak(early) => {
                let count = ops[0] as u16;
                let target = c.jump_target(operand_at + 1, 2, signed_word(1));
                let iteration = self.loops.top_mut(at)?.iteration;
                if iteration + 1 + early as u16 == count {
                    self.loops.pop();
                    self.refresh_context();
                    self.follow_jump(at, len, target);
                } else {
                    self.push(at, len, EventKind::Other { name: "loop_break" });
                }
            }

            Op::Jump => {
                let target = c.jump_target(operand_at, 2, signed_word(0));
                self.follow_jump(at, len, target);
            }
            Op::ConditionalJump => {
                let target = c.jump_target(operand_at + 1, 2, signed_word(1));
                let take =
                    self.options.take_conditional.contains(&at) || self.pending.contains_key(&at);
                match target {
                    Some(t) if !take => {
                        self.pending.insert(at, t);
                        self.push(
                            at,
                            len,
                            EventKind::Jump {
                                target: t,
                                taken: false,
                            },
                        );
                    }
                    _ => self.follow_jump(at, len, target),
                }
            }
            Op::Call | Op::CountedCall => {
                let (target, count) = if op == Op::Call {
                    (c.jump_target(operand_at, 2, signed_word(0)), 1)
                } else {
                    (Some(word(0) as u32), ops[2])
                };
                let Some(target) = target.filter(|t| self.options.bounds.contains(t)) else {
                    self.push(at, len, EventKind::Other { name: "call" });
                    self.finish(TrackEnd::OutOfRange);
                    return Ok(());
                };
                self.calls.push(self.offset, target, count, at)?;
                self.refresh_context();
                self.push(at, len, EventKind::Call { target });
                self.offset = target;
            }
            Op::Return => {
                let next = self
                    .calls
                    .finish_pass()
                    .ok_or(DecodeError::ReturnUnderflow { offset: at })?;
                self.push(at, len, EventKind::Return);
                self.offset = next;
                self.refresh_context();
            }

            Op::TimeSignature => {
                let ticks_per_beat = ops[0].max(1) as u32;
                let whole = 4 * c.ppqn as u32;
                let denominator = if whole % ticks_per_beat == 0 {
                    (whole / ticks_per_beat).min(64) as u8
                } else {
                    4
                };
                self.push(
                    at,
                    len,
                    EventKind::TimeSignature {
                        numerator: ops[1],
                        denominator,
                    },
                );
            }
            Op::Measure => self.push(at, len, EventKind::Measure { number: word(0) }),
            Op::AllocateVoices => self.push(at, len, EventKind::Other { name: "allocate_voices" }),
            Op::Ignored => self.push(at, len, EventKind::Other { name: "ignored" }),
        }
        Ok(())
    }

    fn indexed_note(&mut self, at: u32, len: u32, index: u8, duration: u32) {
        let c = self.table.constants();
        let (tie, rest, key_base) = (c.tie_index, c.rest_index, c.key_base);
        if index == tie {
            self.emit_tie(at, len, duration);
        } else if index == rest {
            self.emit_rest(at, len, duration);
        } else if index < 12 {
            let key = self.voice.octave as i32 * 12
                + index as i32
                + key_base as i32
                + self.voice.transpose as i32;
            let drum = self.voice.flags.contains(TrackFlags::DRUM_KIT);
            self.emit_note(at, len, key, 127, duration, drum);
        } else {
            self.unknown(at, index);
        }
    }

    fn pan_value(&self, is_akao: bool, raw: u8) -> u8 {
        if is_akao {
            raw & 0x7F
        } else {
            // 0 is hard right, 20 hard left.
            let p = (raw & 0x1F).min(20) as u32;
            scale_pan(20 - p, 20)
        }
    }

    fn lfo(&mut self, at: u32, len: u32, target: LfoTarget, params: Option<(u8, u8, u8)>) {
        let slot = target as usize;
        let (delay, rate, depth) = match params {
            Some(p) => {
                self.voice.lfo[slot] = p;
                p
            }
            None => {
                let (delay, rate, _) = self.voice.lfo[slot];
                (delay, rate, 0)
            }
        };
        self.push(
            at,
            len,
            EventKind::Lfo {
                target,
                depth,
                rate,
                delay,
            },
        );
    }

    fn lfo_depth(&mut self, at: u32, len: u32, target: LfoTarget, depth: u8) {
        let (delay, rate, _) = self.voice.lfo[target as usize];
        self.lfo(at, len, target, Some((delay, rate, depth)));
    }
}

impl Iterator for TrackCursor<'_> {
    type Item = Result<SeqEvent, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.can_release() {
                return self.pop_front().map(Ok);
            }
            if self.is_finished() {
                if let Some(ev) = self.pop_front() {
                    return Some(Ok(ev));
                }
                return self.error.take().map(Err);
            }
            if let Err(e) = self.step() {
                self.finish(TrackEnd::Aborted {
                    reason: e.to_string(),
                });
                self.error = Some(e);
            }
        }
    }
}
