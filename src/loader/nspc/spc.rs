//! SPC700 memory images (`.spc` snapshots or bare 64 KiB RAM dumps).

use nom::bytes::complete::{tag, take};
use nom::number::complete::le_u8;
use nom::IResult;

use crate::loader::{header_parse_error, LoadError, Result};
use crate::source::{ByteSource, SubSource};

/// `.spc` file signature.
pub const SIGNATURE: &[u8] = b"SNES-SPC700 Sound File Data";
/// Size of the audio RAM.
pub const RAM_SIZE: u32 = 0x10000;
/// Offset of the RAM in an `.spc` file.
pub const RAM_OFFSET: u32 = 0x100;
/// Offset of the DSP register block in an `.spc` file.
pub const DSP_OFFSET: u32 = 0x10100;
/// DSP register holding the sample directory page.
pub const DSP_DIR: usize = 0x5D;

/// Text tags from an `.spc` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpcTags {
    /// Song title.
    pub song: String,
    /// Game title.
    pub game: String,
}

/// A located audio RAM with optional DSP registers.
pub struct SpcImage<'a> {
    /// The 64 KiB RAM, addressed from 0.
    pub ram: SubSource<'a>,
    /// DSP registers, when the image carries them.
    pub dsp: Option<[u8; 128]>,
    /// Header tags, when the image is an `.spc` file.
    pub tags: Option<SpcTags>,
}

fn text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

fn header(input: &[u8]) -> IResult<&[u8], SpcTags> {
    let (input, _) = tag(SIGNATURE)(input)?;
    // Version text, two 0x1A bytes, tag flag and minor version.
    let (input, _) = take(10usize)(input)?;
    // PC, A, X, Y, PSW, SP and two reserved bytes.
    let (input, _) = take(9usize)(input)?;
    let (input, song) = take(32usize)(input)?;
    let (input, game) = take(32usize)(input)?;
    let (input, _) = le_u8(input)?;
    Ok((
        input,
        SpcTags {
            song: text(song),
            game: text(game),
        },
    ))
}

impl<'a> SpcImage<'a> {
    /// Locate the RAM inside `source`.
    pub fn open(source: &'a dyn ByteSource) -> Result<Self> {
        let len = source.len();
        if len == RAM_SIZE {
            return Ok(Self {
                ram: SubSource::new(source, 0, RAM_SIZE)?,
                dsp: None,
                tags: None,
            });
        }
        let head = source.bytes(0, len.min(RAM_OFFSET))?;
        if !head.starts_with(SIGNATURE) {
            return Err(LoadError::header(0, "not an SPC image"));
        }
        let (_, tags) = header(head).map_err(|e| header_parse_error(0, "SPC header", e))?;
        if !source.contains(RAM_OFFSET, RAM_SIZE) {
            return Err(LoadError::header(0, "SPC image truncated"));
        }
        let dsp = source
            .bytes(DSP_OFFSET, 128)
            .ok()
            .and_then(|b| <[u8; 128]>::try_from(b).ok());
        Ok(Self {
            ram: SubSource::new(source, RAM_OFFSET, RAM_SIZE)?,
            dsp,
            tags: Some(tags),
        })
    }

    /// Sample directory address from the DSP registers.
    pub fn dsp_directory(&self) -> Option<u32> {
        self.dsp.map(|r| (r[DSP_DIR] as u32) << 8)
    }
}
