//! Locating the N-SPC driver tables in audio RAM by machine-code patterns.

use crate::dialect::NspcVersion;
use crate::loader::{BytePattern, LoadError, Result};

const W: Option<u8> = None;

/// `asl a; mov x,a; mov a,!list+1+x; mov y,a; mov a,!list+x; movw $40,ya`
const SONG_LIST: [Option<u8>; 11] = [
    Some(0x1C), Some(0x5D), Some(0xF5), W, W, Some(0xFD), Some(0xF5), W, W, Some(0xDA), Some(0x40),
];

/// `mul ya; movw $14,ya; clrc; adc $14,#lo; adc $15,#hi`
const INSTRUMENT_TABLE: [Option<u8>; 10] = [
    Some(0xCF), Some(0xDA), Some(0x14), Some(0x60), Some(0x98), W, Some(0x14), Some(0x98), W,
    Some(0x15),
];

/// `mov $f2,#$5d; mov $f3,#dir`
const DIRECTORY: [Option<u8>; 6] = [Some(0x8F), Some(0x5D), Some(0xF2), Some(0x8F), W, Some(0xF3)];

/// `cmp a,#$e0; bcc` in the standard note dispatcher.
const STANDARD_DISPATCH: [u8; 3] = [0x68, 0xE0, 0x90];
/// `cmp a,#$da; bcc` in the first-generation dispatcher.
const EARLIER_DISPATCH: [u8; 3] = [0x68, 0xDA, 0x90];

/// `mov y,#7` ahead of the shared table-address code marks percussion.
const PERCUSSION_STRIDE: [u8; 2] = [0x8D, 0x07];

/// Addresses of the driver tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverLayout {
    /// Driver generation.
    pub version: NspcVersion,
    /// Base of the song pointer list; song `n` is at `song_list + 2n`.
    pub song_list: u32,
    /// Instrument table.
    pub instruments: u32,
    /// Percussion table, when the driver has one.
    pub percussion: Option<u32>,
    /// Sample directory.
    pub directory: u32,
}

fn word_at(ram: &[u8], at: usize) -> u32 {
    u16::from_le_bytes([ram[at], ram[at + 1]]) as u32
}

/// Find the driver tables in `ram`. `dsp_directory` is the DIR register
/// value from a snapshot, used when no DIR setup code is found.
pub fn detect(ram: &[u8], dsp_directory: Option<u32>) -> Result<DriverLayout> {
    let song = BytePattern::new(SONG_LIST.to_vec())
        .find(ram, 0)
        .ok_or_else(|| LoadError::header(0, "N-SPC song list code not found"))?;
    let song_list = word_at(ram, song + 7);

    let table = BytePattern::new(INSTRUMENT_TABLE.to_vec());
    let mut instruments = None;
    let mut percussion = None;
    for at in table.find_all(ram) {
        let address = ram[at + 5] as u32 | (ram[at + 8] as u32) << 8;
        let is_percussion = at >= 2 && ram[at - 2..at] == PERCUSSION_STRIDE;
        if is_percussion {
            percussion.get_or_insert(address);
        } else {
            instruments.get_or_insert(address);
        }
    }
    let instruments =
        instruments.ok_or_else(|| LoadError::header(0, "N-SPC instrument table code not found"))?;

    let directory = BytePattern::new(DIRECTORY.to_vec())
        .find(ram, 0)
        .map(|at| (ram[at + 4] as u32) << 8)
        .or(dsp_directory)
        .ok_or_else(|| LoadError::header(0, "N-SPC sample directory not found"))?;

    let standard = BytePattern::exact(&STANDARD_DISPATCH).find(ram, 0).is_some();
    let earlier = BytePattern::exact(&EARLIER_DISPATCH).find(ram, 0).is_some();
    let version = if earlier && !standard {
        NspcVersion::Earlier
    } else {
        NspcVersion::Standard
    };

    Ok(DriverLayout {
        version,
        song_list,
        instruments,
        percussion,
        directory,
    })
}
