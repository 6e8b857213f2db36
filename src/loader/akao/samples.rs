//! AKAO sample collections: an articulation table followed by ADPCM data.

use nom::bytes::complete::{tag, take};
use nom::number::complete::{le_u16, le_u32, le_u8};
use nom::IResult;

use crate::codec::{psx_adpcm, split_on_zero_blocks};
use crate::diagnostics::Diagnostics;
use crate::dialect::{AkaoVersion, Dialect};
use crate::envelope::{Adsr, PitchMultiplier, PsxEnvelope};
use crate::loader::{header_parse_error, LoadError, Result, ScanContext};
use crate::model::{
    Articulation, ArtifactInfo, ArtifactKind, Codec, RawEnvelope, Sample, SampleCollection,
};
use crate::source::ByteSource;

/// Maximum articulations in one collection.
pub const MAX_ARTICULATIONS: u32 = 0x400;

/// PSX pitch words are relative to this value (1.0 = 44100 Hz playback).
pub const PITCH_BASE: u32 = 4096;

const TABLE_OFFSET: u32 = 0x40;
const ARTICULATION_SIZE: u32 = 16;

/// Parsed sample collection header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleHeader {
    /// Collection id.
    pub id: u16,
    /// Bytes of ADPCM data after the articulation table.
    pub data_size: u32,
    /// Id of the first articulation.
    pub first_articulation_id: u32,
    /// Articulation count.
    pub count: u32,
}

fn header(input: &[u8]) -> IResult<&[u8], (SampleHeader, u16, u32)> {
    let (input, _) = tag(b"AKAO")(input)?;
    let (input, id) = le_u16(input)?;
    let (input, marker) = le_u16(input)?;
    let (input, _) = take(8usize)(input)?;
    let (input, data_size) = le_u32(input)?;
    let (input, first_articulation_id) = le_u32(input)?;
    let (input, count) = le_u32(input)?;
    let (input, reserved) = le_u32(input)?;
    Ok((
        input,
        (
            SampleHeader {
                id,
                data_size,
                first_articulation_id,
                count,
            },
            marker,
            reserved,
        ),
    ))
}

struct RawArticulation {
    sample_offset: u32,
    loop_offset: u32,
    pitch: u16,
    unity: u8,
    adsr1: u16,
    adsr2: u16,
}

fn articulation(input: &[u8]) -> IResult<&[u8], RawArticulation> {
    let (input, sample_offset) = le_u32(input)?;
    let (input, loop_offset) = le_u32(input)?;
    let (input, pitch) = le_u16(input)?;
    let (input, unity) = le_u8(input)?;
    let (input, _) = le_u8(input)?;
    let (input, adsr1) = le_u16(input)?;
    let (input, adsr2) = le_u16(input)?;
    Ok((
        input,
        RawArticulation {
            sample_offset,
            loop_offset,
            pitch,
            unity,
            adsr1,
            adsr2,
        },
    ))
}

/// Parse and validate the header at `offset`.
pub fn parse_header(source: &dyn ByteSource, offset: u32) -> Result<SampleHeader> {
    let avail = source.len().saturating_sub(offset).min(0x20);
    let raw = source.bytes(offset, avail)?;
    let (_, (h, marker, reserved)) =
        header(raw).map_err(|e| header_parse_error(offset, "AKAO sample collection", e))?;
    if marker != 0 || reserved != 0 {
        return Err(LoadError::header(offset, "not a sample collection"));
    }
    if h.data_size == 0 {
        return Err(LoadError::header(offset, "empty sample data"));
    }
    if h.count == 0 || h.count > MAX_ARTICULATIONS {
        return Err(LoadError::TableOutOfRange {
            table: "articulation",
            offset: offset + TABLE_OFFSET,
            count: h.count,
        });
    }
    Ok(h)
}

/// Load the sample collection at `offset`.
pub fn load(
    source: &dyn ByteSource,
    offset: u32,
    ctx: &ScanContext,
    diag: &Diagnostics,
) -> Result<SampleCollection> {
    let h = parse_header(source, offset)?;
    let table_at = offset + TABLE_OFFSET;
    let table_len = h.count * ARTICULATION_SIZE;
    if !source.contains(table_at, table_len) {
        return Err(LoadError::TableOutOfRange {
            table: "articulation",
            offset: table_at,
            count: h.count,
        });
    }
    let data_at = table_at + table_len;
    if !source.contains(data_at, h.data_size) {
        return Err(LoadError::TableOutOfRange {
            table: "sample data",
            offset: data_at,
            count: h.data_size,
        });
    }

    let sample_rate = ctx.config.psx_sample_rate();
    let data = source.bytes(data_at, h.data_size)?;
    let samples: Vec<Sample> = split_on_zero_blocks(data)
        .into_iter()
        .map(|range| {
            let layout = psx_adpcm::layout(&data[range.clone()]);
            Sample {
                offset: range.start as u32,
                length: range.len() as u32,
                frames: layout.frames,
                loop_start: layout.loop_start,
                loop_length: layout.loop_length,
                sample_rate,
                codec: Codec::PsxAdpcm,
            }
        })
        .collect();

    let table = source.bytes(table_at, table_len)?;
    let mut articulations = Vec::with_capacity(h.count as usize);
    for (i, rec) in table.chunks_exact(ARTICULATION_SIZE as usize).enumerate() {
        let (_, raw) =
            articulation(rec).map_err(|e| header_parse_error(table_at, "articulation", e))?;
        let id = h.first_articulation_id + i as u32;

        let tuning = match (PitchMultiplier::WordOverBase {
            word: raw.pitch as u32,
            base: PITCH_BASE,
        })
        .to_tuning()
        {
            Ok(t) => Some(t),
            Err(e) => {
                diag.warn("akao", format!("articulation {id}: {e}"));
                None
            }
        };
        let adsr = PsxEnvelope::from_registers(raw.adsr1, raw.adsr2)
            .to_adsr(sample_rate)
            .unwrap_or_else(|e| {
                diag.warn("akao", format!("articulation {id}: envelope: {e}"));
                Adsr::default()
            });

        let sample_index = samples
            .iter()
            .position(|s| (s.offset..s.offset + s.length).contains(&raw.sample_offset));
        if sample_index.is_none() {
            diag.warn(
                "akao",
                format!(
                    "articulation {id}: sample offset 0x{:x} outside sample data",
                    raw.sample_offset
                ),
            );
        }
        let loop_offset = sample_index
            .map(|s| &samples[s])
            .filter(|s| s.loop_start.is_some())
            .map(|_| raw.loop_offset);

        articulations.push(Articulation {
            id,
            sample_offset: raw.sample_offset,
            loop_offset,
            raw_pitch: raw.pitch as u32,
            tuning,
            unity_key: raw.unity.min(127),
            raw_envelope: RawEnvelope::Psx {
                adsr1: raw.adsr1,
                adsr2: raw.adsr2,
            },
            adsr,
            sample_index,
        });
    }

    diag.debug(
        "akao",
        format!(
            "sample collection {} at 0x{offset:06x}: articulations {}..{}, {} sample(s)",
            h.id,
            h.first_articulation_id,
            h.first_articulation_id + h.count,
            samples.len()
        ),
    );

    Ok(SampleCollection {
        info: ArtifactInfo {
            kind: ArtifactKind::SampleCollection,
            origin: ctx.origin.clone(),
            id: h.id as u32,
            offset,
            length: data_at + h.data_size - offset,
            // Sample collections are shared by every AKAO generation.
            dialect: Dialect::akao(ctx.version_hint.unwrap_or(AkaoVersion::V1)),
        },
        first_articulation_id: h.first_articulation_id,
        articulations,
        samples,
    })
}
