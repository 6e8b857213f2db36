//! AKAO instrument and drum kit tables.

use crate::dialect::akao::DRUM_KIT_PROGRAM;
use crate::envelope::volume::{scale_pan, scale_volume};
use crate::envelope::VolumeScale;
use crate::loader::{LoadError, Result};
use crate::model::{Instrument, Region};
use crate::source::ByteSource;

/// Maximum programs in one instrument table.
pub const MAX_INSTRUMENTS: u32 = 128;
/// Maximum regions per instrument.
pub const MAX_REGIONS: u32 = 16;
/// Keys in a drum kit table.
pub const DRUM_KEYS: u32 = 96;

const REGION_SIZE: u32 = 8;
const DRUM_ENTRY_SIZE: u32 = 6;
const END_OF_TABLE: u16 = 0xFFFF;
const END_OF_REGIONS: u8 = 0xFF;
const UNITY_FROM_ARTICULATION: u8 = 0xFF;

/// Read the instrument table at `table`; `end` bounds the table itself.
pub fn load_instruments(
    source: &dyn ByteSource,
    table: u32,
    end: u32,
    scale: VolumeScale,
) -> Result<Vec<Instrument>> {
    let mut instruments = Vec::new();
    for program in 0.. {
        if program == MAX_INSTRUMENTS {
            return Err(LoadError::TableOutOfRange {
                table: "instrument",
                offset: table,
                count: program,
            });
        }
        let entry = table + program * 2;
        if entry + 2 > end {
            return Err(LoadError::TableOutOfRange {
                table: "instrument",
                offset: table,
                count: program,
            });
        }
        let rel = source.read_u16_le(entry)?;
        if rel == END_OF_TABLE {
            break;
        }
        instruments.push(Instrument {
            program,
            regions: load_regions(source, table + rel as u32, scale)?,
            drum_kit: false,
        });
    }
    Ok(instruments)
}

fn load_regions(source: &dyn ByteSource, at: u32, scale: VolumeScale) -> Result<Vec<Region>> {
    let mut regions = Vec::new();
    for i in 0..=MAX_REGIONS {
        let rec_at = at + i * REGION_SIZE;
        if source.read_u8(rec_at)? == END_OF_REGIONS {
            return Ok(regions);
        }
        if i == MAX_REGIONS {
            break;
        }
        let rec = source.bytes(rec_at, REGION_SIZE)?;
        let mut region = Region::full_range(u16::from_le_bytes([rec[2], rec[3]]) as u32);
        region.key_low = rec[0].min(127);
        region.key_high = rec[1].clamp(region.key_low, 127);
        region.unity_override = (rec[4] != UNITY_FROM_ARTICULATION).then_some(rec[4]);
        region.volume = scale_volume(rec[5] as u32 & 0x7F, 127, scale);
        region.pan = scale_pan(rec[6] as u32 & 0x7F, 127);
        // 1/128 semitone steps.
        region.fine_tune_offset = rec[7] as i8 as f64 * 100.0 / 128.0;
        regions.push(region);
    }
    Err(LoadError::TableOutOfRange {
        table: "region",
        offset: at,
        count: MAX_REGIONS + 1,
    })
}

/// Read the drum kit at `table`. Returns `None` when every key is empty.
pub fn load_drum_kit(
    source: &dyn ByteSource,
    table: u32,
    scale: VolumeScale,
) -> Result<Option<Instrument>> {
    if !source.contains(table, DRUM_KEYS * DRUM_ENTRY_SIZE) {
        return Err(LoadError::TableOutOfRange {
            table: "drum kit",
            offset: table,
            count: DRUM_KEYS,
        });
    }
    let mut regions = Vec::new();
    for key in 0..DRUM_KEYS {
        let rec = source.bytes(table + key * DRUM_ENTRY_SIZE, DRUM_ENTRY_SIZE)?;
        let articulation = u16::from_le_bytes([rec[0], rec[1]]);
        if articulation == 0 || articulation == 0xFFFF {
            continue;
        }
        let mut region = Region::full_range(articulation as u32);
        region.key_low = key as u8;
        region.key_high = key as u8;
        region.unity_override = Some(rec[2].min(127));
        region.volume = scale_volume(rec[3] as u32 & 0x7F, 127, scale);
        region.pan = scale_pan(rec[4] as u32 & 0x7F, 127);
        regions.push(region);
    }
    Ok((!regions.is_empty()).then_some(Instrument {
        program: DRUM_KIT_PROGRAM,
        regions,
        drum_kit: true,
    }))
}

/// One full-range instrument per program, where the program number is
/// itself the articulation id.
pub fn derive_from_programs(programs: impl IntoIterator<Item = u32>) -> Vec<Instrument> {
    programs
        .into_iter()
        .map(|program| Instrument {
            program,
            regions: vec![Region::full_range(program)],
            drum_kit: false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn instrument_table_with_two_programs() {
        let mut data = Vec::new();
        // Offsets relative to the table: program 0 at 6, program 1 at 0x17.
        data.extend_from_slice(&6u16.to_le_bytes());
        data.extend_from_slice(&0x17u16.to_le_bytes());
        data.extend_from_slice(&0xFFFFu16.to_le_bytes());
        data.extend_from_slice(&[0, 59, 5, 0, 0xFF, 127, 64, 0]);
        data.extend_from_slice(&[60, 127, 9, 0, 60, 64, 0, 64]);
        data.push(0xFF);
        data.extend_from_slice(&[0, 127, 1, 0, 0xFF, 127, 64, 0, 0xFF]);

        let src = MemorySource::new("instr", data.clone());
        let list = load_instruments(&src, 0, data.len() as u32, VolumeScale::Linear).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].regions.len(), 2);
        assert_eq!(list[0].regions[0].articulation_id, 5);
        assert_eq!(list[0].regions[0].unity_override, None);
        assert_eq!(list[0].regions[1].key_low, 60);
        assert_eq!(list[0].regions[1].unity_override, Some(60));
        assert_eq!(list[0].regions[1].fine_tune_offset, 50.0);
        assert_eq!(list[1].program, 1);
        assert_eq!(list[1].regions[0].articulation_id, 1);
    }

    #[test]
    fn unterminated_region_list_is_rejected() {
        let mut data = vec![4, 0, 0xFF, 0xFF];
        data.extend(std::iter::repeat([0u8, 127, 1, 0, 0xFF, 127, 64, 0]).take(17).flatten());
        let src = MemorySource::new("instr", data);
        let err = load_instruments(&src, 0, 4, VolumeScale::Linear).unwrap_err();
        assert!(matches!(err, LoadError::TableOutOfRange { table: "region", .. }));
    }

    #[test]
    fn drum_kit_skips_empty_keys() {
        let mut data = vec![0u8; (DRUM_KEYS * DRUM_ENTRY_SIZE) as usize];
        data[36 * 6..36 * 6 + 6].copy_from_slice(&[12, 0, 60, 100, 64, 0]);
        data[37 * 6..37 * 6 + 2].copy_from_slice(&[0xFF, 0xFF]);
        let src = MemorySource::new("kit", data);
        let kit = load_drum_kit(&src, 0, VolumeScale::Linear).unwrap().unwrap();
        assert_eq!(kit.program, DRUM_KIT_PROGRAM);
        assert!(kit.drum_kit);
        assert_eq!(kit.regions.len(), 1);
        assert_eq!(kit.regions[0].key_low, 36);
        assert_eq!(kit.regions[0].articulation_id, 12);

        let empty = MemorySource::new("kit", vec![0u8; 600]);
        assert_eq!(load_drum_kit(&empty, 0, VolumeScale::Linear).unwrap(), None);
    }
}
