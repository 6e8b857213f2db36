//! SNES BRR blocks: a header byte and eight bytes holding 16 4-bit samples.

use super::SampleLayout;

/// Bytes per block.
pub const BLOCK_SIZE: usize = 9;

/// Samples per block.
pub const SAMPLES_PER_BLOCK: u32 = 16;

/// Header bit: last block of the sample.
pub const FLAG_END: u8 = 0x01;
/// Header bit: sample loops (checked on the end block).
pub const FLAG_LOOP: u8 = 0x02;

/// Walk blocks until the end flag. `loop_offset` is the byte offset of the
/// loop start relative to `data`, as given by the sample directory.
pub fn layout(data: &[u8], loop_offset: Option<u32>) -> SampleLayout {
    let mut blocks = 0u32;
    let mut looped = false;
    for block in data.chunks_exact(BLOCK_SIZE) {
        blocks += 1;
        if block[0] & FLAG_END != 0 {
            looped = block[0] & FLAG_LOOP != 0;
            break;
        }
    }
    let frames = blocks * SAMPLES_PER_BLOCK;
    let loop_start = loop_offset
        .filter(|_| looped)
        .map(|off| (off / BLOCK_SIZE as u32) * SAMPLES_PER_BLOCK)
        .filter(|&start| start < frames);
    SampleLayout {
        length: blocks * BLOCK_SIZE as u32,
        frames,
        loop_length: loop_start.map_or(0, |s| frames - s),
        loop_start,
    }
}

/// Decode blocks to 16-bit PCM until the end flag.
pub fn decode(data: &[u8]) -> Vec<i16> {
    let mut out = Vec::with_capacity(data.len() / BLOCK_SIZE * SAMPLES_PER_BLOCK as usize);
    let (mut p1, mut p2) = (0i32, 0i32);
    for block in data.chunks_exact(BLOCK_SIZE) {
        let header = block[0];
        let shift = (header >> 4) as i32;
        let filter = (header >> 2) & 0x03;
        for &byte in &block[1..] {
            for nibble in [byte >> 4, byte & 0x0F] {
                let raw = ((nibble as i32) << 28) >> 28;
                let mut s = if shift <= 12 {
                    (raw << shift) >> 1
                } else {
                    (raw >> 3) << 11
                };
                s += match filter {
                    0 => 0,
                    1 => p1 + ((-p1) >> 4),
                    2 => (p1 << 1) + ((-p1 * 3) >> 5) - p2 + (p2 >> 4),
                    _ => (p1 << 1) + ((-p1 * 13) >> 6) - p2 + ((p2 * 3) >> 4),
                };
                let s = s.clamp(-32768, 32767);
                // The DSP keeps 15 significant bits.
                let s = ((s as i16) << 1) >> 1;
                p2 = p1;
                p1 = s as i32;
                out.push(s);
            }
        }
        if header & FLAG_END != 0 {
            break;
        }
    }
    out
}
