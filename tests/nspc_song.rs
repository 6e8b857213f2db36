mod common;

use seqrip::decoder::{decode_track, CursorOptions};
use seqrip::dialect::{event_table, Dialect};
use seqrip::loader::nspc::{song, spc};
use seqrip::loader::LoadError;
use seqrip::model::{Codec, EventKind, TrackEnd};
use seqrip::{Diagnostics, MemorySource, ScanConfig, ScanSession};

fn notes(events: &[seqrip::SeqEvent]) -> Vec<(u32, u8, u32)> {
    events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::Note { key, duration, .. } => Some((e.time, key, duration)),
            _ => None,
        })
        .collect()
}

#[test]
fn ram_image_yields_one_song() {
    let mut session = ScanSession::new(ScanConfig::default());
    assert_eq!(session.scan_bytes("ram.bin", common::nspc_ram()).unwrap(), 3);
    let report = session.finish();
    assert_eq!(report.collections.len(), 1);

    let c = &report.collections[0];
    assert_eq!(c.sequence.info.id, 1);
    assert_eq!(c.sequence.ppqn, 48);
    assert_eq!(c.sequence.programs, vec![0, 1]);
    assert_eq!(c.sequence.tracks.len(), 2);

    // The lead voice sets the block length; voice 1 is cut at tick 48.
    let lead = &c.sequence.tracks[0];
    assert_eq!(notes(&lead.events), vec![(0, 60, 24)]);
    let other = &c.sequence.tracks[1];
    assert_eq!(other.index, 1);
    assert_eq!(notes(&other.events), vec![(0, 60, 48)]);
    for track in &c.sequence.tracks {
        assert_eq!(track.end, TrackEnd::EndOfTrack);
        let last = track.events.last().unwrap();
        assert_eq!(last.kind, EventKind::EndOfTrack);
        assert_eq!(last.time, 48);
        assert_eq!(last.offset, 0x2102);
    }
}

#[test]
fn instruments_bind_to_brr_samples() {
    let mut session = ScanSession::new(ScanConfig::default());
    session.scan_bytes("ram.bin", common::nspc_ram()).unwrap();
    let report = session.finish();
    let c = &report.collections[0];

    assert_eq!(c.samples.len(), 1);
    let samples = &c.samples[0].samples;
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|s| s.codec == Codec::Brr && s.sample_rate == 32_000));
    assert_eq!(samples[0].loop_start, Some(16));
    assert_eq!(samples[1].loop_start, None);

    let set = &c.instruments;
    let program = move |p: u32| &set.instrument(p).unwrap().regions[0];
    assert_eq!(program(0).unity_key, 71);
    // Tuning 2.0 sounds an octave up, so the sample's unity key drops by 12.
    assert_eq!(program(1).unity_key, 59);
    let kit = set.instrument(0x80).unwrap();
    assert!(kit.drum_kit);
    assert_eq!(kit.regions[0].key_low, 36);
    assert_eq!(kit.regions[0].sample.map(|r| r.sample), Some(1));
    assert_eq!(kit.regions[0].unity_key, 47);
}

#[test]
fn spc_snapshot_matches_bare_ram() {
    let mut file = vec![0u8; (spc::DSP_OFFSET + 128) as usize];
    file[..spc::SIGNATURE.len()].copy_from_slice(spc::SIGNATURE);
    file[0x2E..0x33].copy_from_slice(b"Title");
    let ram = common::nspc_ram();
    let start = spc::RAM_OFFSET as usize;
    file[start..start + ram.len()].copy_from_slice(&ram);

    let run = |name: &str, data: Vec<u8>| {
        let mut session = ScanSession::new(ScanConfig::default());
        session.scan_bytes(name, data).unwrap();
        session.finish().collections
    };
    let from_spc = run("song.spc", file);
    let from_ram = run("ram.bin", ram);
    assert_eq!(from_spc.len(), 1);
    assert_eq!(from_spc[0].sequence.tracks, from_ram[0].sequence.tracks);
    assert_eq!(from_spc[0].instruments.instruments, from_ram[0].instruments.instruments);
}

#[test]
fn ram_without_driver_yields_nothing() {
    let mut session = ScanSession::new(ScanConfig::default());
    assert_eq!(session.scan_bytes("ram.bin", vec![0u8; 0x10000]).unwrap(), 0);
    let report = session.finish();
    assert!(report.collections.is_empty());
}

/// Six counted repeats, each jumping back to the first.
fn nested_repeats(ram: &mut [u8], at: usize) {
    for i in 0..6 {
        let entry = at + 4 * i;
        ram[entry..entry + 2].copy_from_slice(&0x7Fu16.to_le_bytes());
        ram[entry + 2..entry + 4].copy_from_slice(&(at as u16).to_le_bytes());
    }
}

#[test]
fn nested_repeats_are_rejected() {
    let mut ram = vec![0u8; 0x10000];
    nested_repeats(&mut ram, 0x2000);
    let src = MemorySource::new("ram", ram);
    assert!(matches!(
        song::flatten(&src, 0x2000),
        Err(LoadError::TableOutOfRange { .. })
    ));
}

#[test]
fn runaway_song_ends_the_song_list() {
    let mut ram = common::nspc_ram();
    ram[0x2004..0x2006].copy_from_slice(&0x2500u16.to_le_bytes());
    nested_repeats(&mut ram, 0x2500);
    let mut session = ScanSession::new(ScanConfig::default());
    assert_eq!(session.scan_bytes("ram.bin", ram).unwrap(), 3);
    assert_eq!(session.finish().collections.len(), 1);
}

#[test]
fn counted_subroutine_repeats_then_returns() {
    // Length 24, call 0x0006 three times, end of block; the subroutine is
    // one note and a return.
    let body = vec![0x18, 0xEF, 0x06, 0x00, 0x03, 0x00, 0xA4, 0x00];
    let len = body.len() as u32;
    let src = MemorySource::new("voice", body);
    let diag = Diagnostics::new();
    let decoded = decode_track(
        0,
        &src,
        event_table(Dialect::nspc()),
        0,
        &CursorOptions::new(0..len),
        &diag,
    );
    assert_eq!(decoded.track.end, TrackEnd::BlockEnd);
    let events = &decoded.track.events;
    assert_eq!(notes(events), vec![(0, 60, 24), (24, 60, 24), (48, 60, 24)]);
    assert_eq!(events[0].kind, EventKind::Call { target: 6 });
    let returns = events
        .iter()
        .filter(|e| e.kind == EventKind::Return)
        .count();
    assert_eq!(returns, 3);
}
