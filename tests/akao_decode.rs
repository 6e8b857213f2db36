mod common;

use std::sync::Arc;

use seqrip::decoder::{decode_track, CursorOptions, CursorState, TrackCursor};
use seqrip::dialect::{event_table, AkaoQuirks, AkaoVersion, Dialect, EventTable};
use seqrip::model::{EventKind, SeqEvent, TrackEnd};
use seqrip::{Diagnostics, MemorySource, ScanConfig, ScanSession};

fn v1_table() -> Arc<EventTable> {
    event_table(Dialect::akao(AkaoVersion::V1))
}

fn decode(body: &[u8]) -> (Vec<SeqEvent>, TrackEnd) {
    decode_with(v1_table(), body)
}

fn decode_with(table: Arc<EventTable>, body: &[u8]) -> (Vec<SeqEvent>, TrackEnd) {
    let src = MemorySource::new("track", body.to_vec());
    let diag = Diagnostics::new();
    let options = CursorOptions::new(0..body.len() as u32);
    let decoded = decode_track(0, &src, table, 0, &options, &diag);
    (decoded.track.events, decoded.track.end)
}

fn kinds(events: &[SeqEvent]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind.clone()).collect()
}

fn note(duration: u32, gate: u32, drum: bool) -> EventKind {
    EventKind::Note {
        key: 60,
        velocity: 127,
        duration,
        gate,
        drum,
    }
}

fn note_times(events: &[SeqEvent]) -> Vec<u32> {
    events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::Note { .. }))
        .map(|e| e.time)
        .collect()
}

#[test]
fn single_track_end_to_end() {
    // Key 60 for 12 ticks, a 12 tick rest, end of track.
    let data = common::akao_v1_sequence(1, &[&[0x04, 0x93, 0xA0]]);
    let mut session = ScanSession::new(ScanConfig::default());
    assert_eq!(session.scan_bytes("seq.bin", data).unwrap(), 2);
    let report = session.finish();

    assert_eq!(report.collections.len(), 1);
    let sequence = &report.collections[0].sequence;
    assert_eq!(sequence.ppqn, 48);
    assert_eq!(sequence.tracks.len(), 1);

    let track = &sequence.tracks[0];
    assert_eq!(track.end, TrackEnd::EndOfTrack);
    let times: Vec<u32> = track.events.iter().map(|e| e.time).collect();
    assert_eq!(times, vec![0, 12, 24]);
    assert_eq!(
        track.events[0].kind,
        EventKind::Note {
            key: 60,
            velocity: 127,
            duration: 12,
            gate: 10,
            drum: false,
        }
    );
    assert_eq!(track.events[1].kind, EventKind::Rest { duration: 12 });
    assert_eq!(track.events[2].kind, EventKind::EndOfTrack);
    assert_eq!(track.events[0].offset, 0x16);
}

#[test]
fn cursor_reports_finished() {
    let body = [0x04, 0x93, 0xA0];
    let src = MemorySource::new("track", body.to_vec());
    let diag = Diagnostics::new();
    let mut cursor = TrackCursor::new(&src, v1_table(), 0, CursorOptions::new(0..3), &diag);
    assert_eq!(cursor.state(), &CursorState::Active);
    assert_eq!(cursor.decode_all().len(), 3);
    assert_eq!(cursor.state(), &CursorState::Finished(TrackEnd::EndOfTrack));
    assert!(cursor.next().is_none());
}

#[test]
fn counted_loop_plays_k_times() {
    for k in 1..=4u8 {
        let (events, end) = decode(&[0xC8, 0x04, 0xC9, k, 0xA0]);
        assert_eq!(end, TrackEnd::EndOfTrack);
        let expected: Vec<u32> = (0..k as u32).map(|i| i * 12).collect();
        assert_eq!(note_times(&events), expected, "count {k}");
        assert_eq!(events.last().map(|e| e.time), Some(12 * k as u32));
    }
}

#[test]
fn infinite_loop_plays_once_then_marks() {
    for body in [&[0xC8, 0x04, 0xC9, 0x00, 0xA0][..], &[0xC8, 0x04, 0xCA, 0xA0][..]] {
        let (events, end) = decode(body);
        assert_eq!(end, TrackEnd::LoopForever);
        assert_eq!(note_times(&events), vec![0]);
        let markers = events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::LoopForever { .. }))
            .count();
        assert_eq!(markers, 1);
        assert_eq!(
            events.last().map(|e| &e.kind),
            Some(&EventKind::LoopForever { target: 1 })
        );
    }
}

#[test]
fn nested_loops_multiply() {
    // Outer x2 around inner x3.
    let (events, end) = decode(&[0xC8, 0xC8, 0x04, 0xC9, 0x03, 0xC9, 0x02, 0xA0]);
    assert_eq!(end, TrackEnd::EndOfTrack);
    assert_eq!(note_times(&events).len(), 6);
}

#[test]
fn backward_jump_terminates() {
    // Note, then jump back to the note: FE 06 with offset -5.
    let (events, end) = decode(&[0x04, 0xFE, 0x06, 0xFB, 0xFF]);
    assert_eq!(end, TrackEnd::LoopForever);
    assert_eq!(note_times(&events), vec![0]);
    assert!(matches!(
        events.last().map(|e| &e.kind),
        Some(EventKind::LoopForever { target: 0 })
    ));
}

#[test]
fn jump_out_of_range_ends_track() {
    let (events, end) = decode(&[0x04, 0xFE, 0x06, 0x40, 0x00]);
    assert_eq!(end, TrackEnd::OutOfRange);
    assert_eq!(note_times(&events), vec![0]);
}

#[test]
fn unknown_opcode_is_reported() {
    let src = MemorySource::new("track", vec![0x04, 0xF0, 0x04]);
    let diag = Diagnostics::new();
    let decoded = decode_track(0, &src, v1_table(), 0, &CursorOptions::new(0..3), &diag);
    assert_eq!(
        decoded.track.end,
        TrackEnd::UnknownOpcode {
            offset: 1,
            opcode: 0xF0
        }
    );
    assert!(diag.contains("unknown opcode 0xF0"));
}

#[test]
fn truncated_operand_aborts_only_that_track() {
    let data = common::akao_v1_sequence(2, &[&[0x04, 0xA0], &[0x04, 0xA1]]);
    let mut session = ScanSession::new(ScanConfig::default());
    session.scan_bytes("seq.bin", data).unwrap();
    let report = session.finish();
    let tracks = &report.collections[0].sequence.tracks;
    assert_eq!(tracks[0].end, TrackEnd::EndOfTrack);
    assert!(matches!(tracks[1].end, TrackEnd::Aborted { .. }));
}

#[test]
fn decoding_is_deterministic() {
    let data = common::akao_v1_sequence(3, &[&[0xC8, 0x04, 0x0F, 0xC9, 0x02, 0x93, 0xA0]]);
    let run = || {
        let mut session = ScanSession::new(ScanConfig::default());
        session.scan_bytes("seq.bin", data.clone()).unwrap();
        serde_json::to_string(&session.finish().collections).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn tie_extends_the_open_note() {
    let (events, end) = decode(&[0x04, 0x88, 0xA0]);
    assert_eq!(end, TrackEnd::EndOfTrack);
    assert_eq!(
        kinds(&events),
        vec![note(12, 22, false), EventKind::Tie { duration: 12 }, EventKind::EndOfTrack]
    );
    let times: Vec<u32> = events.iter().map(|e| e.time).collect();
    assert_eq!(times, vec![0, 12, 24]);
}

#[test]
fn slur_and_legato_hold_the_full_duration() {
    for switch in [0xCC, 0xD0] {
        let (events, _) = decode(&[switch, 0x04, 0xA0]);
        assert_eq!(events[1].kind, note(12, 12, false), "switch 0x{switch:02X}");
    }
    // Slur off restores the gap.
    let (events, _) = decode(&[0xCC, 0xCD, 0x04, 0xA0]);
    assert_eq!(events[2].kind, note(12, 10, false));
}

#[test]
fn one_time_duration_applies_to_the_next_note_only() {
    let (events, _) = decode(&[0xA2, 0x05, 0x04, 0x04, 0xA0]);
    let notes: Vec<(u32, u32)> = events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::Note { duration, .. } => Some((e.time, duration)),
            _ => None,
        })
        .collect();
    assert_eq!(notes, vec![(0, 5), (5, 12)]);
}

#[test]
fn conditional_jump_is_taken_on_the_second_pass() {
    // Note, FE 07 to the rest at 7, end at 6; rest and end at 7..9.
    let (events, end) = decode(&[0x04, 0xFE, 0x07, 0x00, 0x01, 0x00, 0xA0, 0x93, 0xA0]);
    assert_eq!(end, TrackEnd::EndOfTrack);
    assert_eq!(
        kinds(&events),
        vec![
            note(12, 10, false),
            EventKind::Jump {
                target: 7,
                taken: true
            },
            EventKind::Rest { duration: 12 },
            EventKind::EndOfTrack,
        ]
    );
    assert_eq!(events.last().map(|e| e.time), Some(24));
}

#[test]
fn loop_break_leaves_on_the_final_iteration() {
    // Loop x3 around a note and FE 08 (break on pass 3, to the rest at 9).
    let body = [0xC8, 0x04, 0xFE, 0x08, 0x03, 0x02, 0x00, 0xC9, 0x03, 0x93, 0xA0];
    let (events, end) = decode(&body);
    assert_eq!(end, TrackEnd::EndOfTrack);
    assert_eq!(note_times(&events), vec![0, 12, 24]);
    let loop_ends = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::LoopEnd { .. }))
        .count();
    assert_eq!(loop_ends, 2);
    assert!(events.iter().any(|e| e.kind
        == EventKind::Jump {
            target: 9,
            taken: true
        }));
    assert_eq!(events.last().map(|e| e.time), Some(48));
}

#[test]
fn second_to_last_break_leaves_one_pass_early() {
    let body = [0xC8, 0x04, 0xFE, 0x09, 0x03, 0x02, 0x00, 0xC9, 0x03, 0x93, 0xA0];
    let (events, end) = decode_with(event_table(Dialect::akao(AkaoVersion::V2)), &body);
    assert_eq!(end, TrackEnd::EndOfTrack);
    assert_eq!(note_times(&events), vec![0, 12]);
}

#[test]
fn pattern_call_returns_to_the_caller() {
    // Call the note at 6, which returns; then rest and end.
    let (events, end) = decode(&[0xFE, 0x0E, 0x02, 0x00, 0x93, 0xA0, 0x04, 0xFE, 0x0F]);
    assert_eq!(end, TrackEnd::EndOfTrack);
    assert_eq!(
        kinds(&events),
        vec![
            EventKind::Call { target: 6 },
            note(12, 10, false),
            EventKind::Return,
            EventKind::Rest { duration: 12 },
            EventKind::EndOfTrack,
        ]
    );
}

#[test]
fn loop_overflow_aborts_only_that_track() {
    let data = common::akao_v1_sequence(
        4,
        &[&[0x04, 0xA0], &[0xC8, 0xC8, 0xC8, 0xC8, 0xC8, 0x04, 0xA0]],
    );
    let mut session = ScanSession::new(ScanConfig::default());
    session.scan_bytes("seq.bin", data).unwrap();
    let report = session.finish();
    let tracks = &report.collections[0].sequence.tracks;
    assert_eq!(tracks[0].end, TrackEnd::EndOfTrack);
    assert_eq!(note_times(&tracks[0].events), vec![0]);
    match &tracks[1].end {
        TrackEnd::Aborted { reason } => assert!(reason.contains("loop stack overflow"), "{reason}"),
        other => panic!("expected an aborted track, got {other:?}"),
    }
    let depths: Vec<u8> = tracks[1]
        .events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::LoopStart { depth } => Some(depth),
            _ => None,
        })
        .collect();
    assert_eq!(depths, vec![1, 2, 3, 4]);
}

#[test]
fn drum_kit_off_restores_the_program_unless_quirked() {
    let body = [0xA1, 0x05, 0xFE, 0x04, 0x04, 0xFE, 0x05, 0x04, 0xA0];
    let (plain, _) = decode(&body);
    assert_eq!(
        kinds(&plain),
        vec![
            EventKind::ProgramChange { program: 5 },
            EventKind::DrumKit { enabled: true },
            note(12, 10, true),
            EventKind::DrumKit { enabled: false },
            EventKind::ProgramChange { program: 5 },
            note(12, 10, false),
            EventKind::EndOfTrack,
        ]
    );

    let keeps = event_table(Dialect::Akao {
        version: AkaoVersion::V1,
        quirks: AkaoQuirks::DRUM_KIT_OFF_KEEPS_PROGRAM,
    });
    let (kept, _) = decode_with(keeps, &body);
    let changes = kept
        .iter()
        .filter(|e| matches!(e.kind, EventKind::ProgramChange { .. }))
        .count();
    assert_eq!(changes, 1);
    assert_eq!(kept.len(), plain.len() - 1);
}

#[test]
fn fe1c_operand_count_follows_the_quirk() {
    let body = [0xFE, 0x1C, 0x01, 0x04, 0xA0];
    let (events, end) = decode(&body);
    assert_eq!(end, TrackEnd::EndOfTrack);
    assert_eq!(note_times(&events), vec![0]);

    let two = event_table(Dialect::Akao {
        version: AkaoVersion::V1,
        quirks: AkaoQuirks::FE1C_TWO_OPERANDS,
    });
    let (events, end) = decode_with(two, &body);
    assert_eq!(end, TrackEnd::EndOfTrack);
    assert!(note_times(&events).is_empty());
    assert_eq!(events[0].length, 4);
}
