//! Sample codecs and sample-boundary detection.

pub mod brr;
pub mod psx_adpcm;

use std::ops::Range;

/// Size and loop information of one encoded sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    /// Encoded bytes up to and including the end block.
    pub length: u32,
    /// Decoded frames.
    pub frames: u32,
    /// Loop start in frames.
    pub loop_start: Option<u32>,
    /// Loop length in frames.
    pub loop_length: u32,
}

/// Split ADPCM sample data on 16-byte all-zero blocks.
///
/// Every PSX sample begins with a silent zero block, and no encoded block can
/// be all zero elsewhere, so each run of zero blocks starts a new sample.
/// Returns byte ranges relative to `data`.
pub fn split_on_zero_blocks(data: &[u8]) -> Vec<Range<usize>> {
    const BLOCK: usize = psx_adpcm::BLOCK_SIZE;
    let mut starts = Vec::new();
    let mut in_run = false;
    for (i, block) in data.chunks_exact(BLOCK).enumerate() {
        let zero = block.iter().all(|&b| b == 0);
        if (zero && !in_run) || (i == 0 && !zero) {
            starts.push(i * BLOCK);
        }
        in_run = zero;
    }
    let end = data.len() - data.len() % BLOCK;
    starts
        .iter()
        .enumerate()
        .map(|(i, &s)| s..starts.get(i + 1).copied().unwrap_or(end))
        .collect()
}
