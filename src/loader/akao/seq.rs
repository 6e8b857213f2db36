//! AKAO sequence headers and track decoding.

use std::collections::BTreeSet;

use nom::bytes::complete::{tag, take};
use nom::number::complete::{le_u16, le_u32};
use nom::IResult;

use super::instr;
use crate::decoder::decode_track;
use crate::diagnostics::Diagnostics;
use crate::dialect::{akao, event_table, AkaoVersion, Dialect};
use crate::loader::{header_parse_error, LoadError, Result, ScanContext};
use crate::model::{ArtifactInfo, ArtifactKind, InstrumentSet, Sequence};
use crate::source::ByteSource;

/// Size of the V1/V2 fixed header prefix.
const SHORT_HEADER: u32 = 0x14;
/// Size of the V3 fixed header.
const WIDE_HEADER: u32 = 0x30;

/// Parsed sequence header. Offsets are absolute within the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceHeader {
    /// Sequence id.
    pub id: u16,
    /// Header generation.
    pub version: AkaoVersion,
    /// Offset of the `AKAO` signature.
    pub offset: u32,
    /// Total length including the header.
    pub length: u32,
    /// Bit per present track.
    pub track_mask: u32,
    /// Instrument table, if the header carries one.
    pub instrument_table: Option<u32>,
    /// Drum kit table, if the header carries one.
    pub drum_kit_table: Option<u32>,
    /// Start of each present track, in mask order.
    pub tracks: Vec<u32>,
}

impl SequenceHeader {
    /// End of the sequence (exclusive).
    pub fn end(&self) -> u32 {
        self.offset + self.length
    }
}

struct Prefix {
    id: u16,
    length: u16,
    word_10: u32,
    table_14: u16,
    table_16: u16,
}

fn prefix(input: &[u8]) -> IResult<&[u8], Prefix> {
    let (input, _) = tag(b"AKAO")(input)?;
    let (input, id) = le_u16(input)?;
    let (input, length) = le_u16(input)?;
    let (input, _) = take(8usize)(input)?;
    let (input, word_10) = le_u32(input)?;
    let (input, table_14) = le_u16(input)?;
    let (input, table_16) = le_u16(input)?;
    Ok((
        input,
        Prefix {
            id,
            length,
            word_10,
            table_14,
            table_16,
        },
    ))
}

fn wide_mask(input: &[u8]) -> IResult<&[u8], u32> {
    let (input, _) = take(0x20usize)(input)?;
    le_u32(input)
}

/// Parse and validate the header at `offset`.
///
/// A zero word at `0x10` selects the wide V3 layout. Otherwise the header is
/// V1 or V2, which share their shape; `hint` picks between them (V1 when
/// absent).
pub fn parse_header(
    source: &dyn ByteSource,
    offset: u32,
    hint: Option<AkaoVersion>,
) -> Result<SequenceHeader> {
    let avail = (source.len().saturating_sub(offset)).min(WIDE_HEADER);
    let raw = source.bytes(offset, avail)?;
    let (_, p) = prefix(raw).map_err(|e| header_parse_error(offset, "AKAO sequence", e))?;

    if p.length == 0 {
        return Err(LoadError::header(offset, "zero sequence length"));
    }

    let (version, length, track_mask, fields_at) = if p.word_10 == 0 {
        let (_, mask) =
            wide_mask(raw).map_err(|e| header_parse_error(offset, "AKAO V3 sequence", e))?;
        (AkaoVersion::V3, p.length as u32, mask, WIDE_HEADER)
    } else {
        let version = match hint {
            Some(AkaoVersion::V1) | None => AkaoVersion::V1,
            Some(_) => AkaoVersion::V2,
        };
        let fields_at = match version {
            AkaoVersion::V1 => SHORT_HEADER,
            _ => 0x18,
        };
        (version, 0x10 + p.length as u32, p.word_10, fields_at)
    };

    if track_mask == 0 {
        return Err(LoadError::header(offset, "empty track mask"));
    }
    if !source.contains(offset, length) {
        return Err(LoadError::header(
            offset,
            format!("length 0x{length:x} exceeds source"),
        ));
    }

    let count = track_mask.count_ones();
    if fields_at + count * 2 > length {
        return Err(LoadError::TableOutOfRange {
            table: "track offset",
            offset: offset + fields_at,
            count,
        });
    }

    let mut tracks = Vec::with_capacity(count as usize);
    for i in 0..count {
        let field = offset + fields_at + i * 2;
        let rel = source.read_u16_le(field)? as u32;
        let start = match version {
            AkaoVersion::V3 => field + rel,
            _ => field + 2 + rel,
        };
        if start >= offset + length {
            return Err(LoadError::header(
                offset,
                format!("track {i} starts outside the sequence (0x{start:x})"),
            ));
        }
        tracks.push(start);
    }

    let table = |raw: u16| (version != AkaoVersion::V1 && raw != 0).then(|| offset + raw as u32);
    Ok(SequenceHeader {
        id: p.id,
        version,
        offset,
        length,
        track_mask,
        instrument_table: table(p.table_14),
        drum_kit_table: table(p.table_16),
        tracks,
    })
}

/// Load the sequence at `offset` together with its instrument set.
pub fn load(
    source: &dyn ByteSource,
    offset: u32,
    ctx: &ScanContext,
    diag: &Diagnostics,
) -> Result<(Sequence, InstrumentSet)> {
    let header = parse_header(source, offset, ctx.version_hint)?;
    let dialect = Dialect::Akao {
        version: header.version,
        quirks: ctx.config.akao_quirks,
    };
    let table = event_table(dialect);
    let options = ctx.cursor_options(header.offset..header.end());

    let mut programs = BTreeSet::new();
    let tracks = header
        .tracks
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let decoded = decode_track(i, source, table.clone(), start, &options, diag);
            programs.extend(decoded.programs);
            decoded.track
        })
        .collect();

    let info = |kind, offset, length| ArtifactInfo {
        kind,
        origin: ctx.origin.clone(),
        id: header.id as u32,
        offset,
        length,
        dialect,
    };

    let instruments = match header.instrument_table {
        Some(at) => {
            let mut list = instr::load_instruments(source, at, header.end(), ctx.config.volume_scale)?;
            if let Some(kit) = header.drum_kit_table {
                match instr::load_drum_kit(source, kit, ctx.config.volume_scale) {
                    Ok(Some(drums)) => list.push(drums),
                    Ok(None) => {}
                    Err(e) => diag.warn("akao", format!("sequence {}: drum kit skipped: {e}", header.id)),
                }
            }
            InstrumentSet {
                info: info(ArtifactKind::InstrumentSet, at, header.end() - at),
                instruments: list,
            }
        }
        None => InstrumentSet {
            info: info(ArtifactKind::InstrumentSet, header.offset, header.length),
            instruments: instr::derive_from_programs(
                programs.iter().copied().filter(|&p| p != akao::DRUM_KIT_PROGRAM),
            ),
        },
    };

    diag.debug(
        "akao",
        format!(
            "sequence {} ({:?}) at 0x{:06x}: {} track(s), {} instrument(s)",
            header.id,
            header.version,
            header.offset,
            header.tracks.len(),
            instruments.instruments.len()
        ),
    );

    let sequence = Sequence {
        info: info(ArtifactKind::Sequence, header.offset, header.length),
        ppqn: table.constants().ppqn,
        tracks,
        programs: programs.into_iter().collect(),
    };
    Ok((sequence, instruments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn v1(body: &[u8], mask: u32) -> Vec<u8> {
        let tracks = mask.count_ones() as usize;
        let mut data = b"AKAO".to_vec();
        data.extend_from_slice(&7u16.to_le_bytes());
        let len = 4 + tracks * 2 + body.len();
        data.extend_from_slice(&(len as u16).to_le_bytes());
        data.extend_from_slice(&[0; 8]);
        data.extend_from_slice(&mask.to_le_bytes());
        for i in 0..tracks {
            // Every track points at the shared body.
            let rel = (tracks - i - 1) * 2;
            data.extend_from_slice(&(rel as u16).to_le_bytes());
        }
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn v1_header_fields() {
        let data = v1(&[0xA0], 0b101);
        let src = MemorySource::new("seq", data);
        let h = parse_header(&src, 0, None).unwrap();
        assert_eq!(h.id, 7);
        assert_eq!(h.version, AkaoVersion::V1);
        assert_eq!(h.length, 0x19);
        assert_eq!(h.tracks, vec![0x18, 0x18]);
        assert_eq!(h.instrument_table, None);
    }

    #[test]
    fn v3_is_detected_by_layout() {
        let mut data = b"AKAO".to_vec();
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&0x33u16.to_le_bytes());
        data.resize(0x30, 0);
        data[0x20..0x24].copy_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.push(0xA0);
        let src = MemorySource::new("seq", data);
        let h = parse_header(&src, 0, Some(AkaoVersion::V1)).unwrap();
        assert_eq!(h.version, AkaoVersion::V3);
        assert_eq!(h.tracks, vec![0x32]);
    }

    #[test]
    fn rejects_inconsistent_headers() {
        let mut data = v1(&[0xA0], 1);
        data[6] = 0xFF;
        let src = MemorySource::new("seq", data);
        assert!(matches!(
            parse_header(&src, 0, None),
            Err(LoadError::HeaderInvalid { .. })
        ));

        let src = MemorySource::new("seq", v1(&[0xA0], 0));
        assert!(parse_header(&src, 0, None).is_err());

        let src = MemorySource::new("seq", b"AKAO".to_vec());
        assert!(parse_header(&src, 0, None).is_err());
    }
}
