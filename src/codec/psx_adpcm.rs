//! PSX SPU ADPCM ("VAG") blocks.
//!
//! Each 16-byte block holds a shift/filter byte, a flag byte and 28 4-bit
//! samples.

use super::SampleLayout;

/// Bytes per block.
pub const BLOCK_SIZE: usize = 16;

/// Samples per block.
pub const SAMPLES_PER_BLOCK: u32 = 28;

/// Block ends the sample.
pub const FLAG_END: u8 = 0x01;
/// With `FLAG_END`: jump to the loop start instead of stopping.
pub const FLAG_REPEAT: u8 = 0x02;
/// Block is the loop start.
pub const FLAG_LOOP_START: u8 = 0x04;

const FILTERS: [(i32, i32); 5] = [(0, 0), (60, 0), (115, -52), (98, -55), (122, -60)];

/// Walk blocks until an end flag (or the end of `data`).
pub fn layout(data: &[u8]) -> SampleLayout {
    let mut loop_block = None;
    let mut blocks = 0u32;
    let mut looped = false;
    for block in data.chunks_exact(BLOCK_SIZE) {
        let flags = block[1];
        if flags & FLAG_LOOP_START != 0 {
            loop_block = Some(blocks);
        }
        blocks += 1;
        if flags & FLAG_END != 0 {
            looped = flags & FLAG_REPEAT != 0;
            break;
        }
    }
    let frames = blocks * SAMPLES_PER_BLOCK;
    let loop_start = if looped {
        Some(loop_block.unwrap_or(0) * SAMPLES_PER_BLOCK)
    } else {
        None
    };
    SampleLayout {
        length: blocks * BLOCK_SIZE as u32,
        frames,
        loop_length: loop_start.map_or(0, |s| frames - s),
        loop_start,
    }
}

/// Decode blocks to 16-bit PCM until an end flag.
pub fn decode(data: &[u8]) -> Vec<i16> {
    let mut out = Vec::with_capacity(data.len() / BLOCK_SIZE * SAMPLES_PER_BLOCK as usize);
    let (mut s1, mut s2) = (0i32, 0i32);
    for block in data.chunks_exact(BLOCK_SIZE) {
        let shift = (block[0] & 0x0F) as i32;
        let (f0, f1) = FILTERS[((block[0] >> 4) as usize).min(4)];
        for &byte in &block[2..] {
            for nibble in [byte & 0x0F, byte >> 4] {
                let raw = ((nibble as i32) << 28) >> 28;
                let sample = (raw << 12) >> shift.min(12);
                let value = (sample + ((s1 * f0 + s2 * f1 + 32) >> 6)).clamp(-32768, 32767);
                s2 = s1;
                s1 = value;
                out.push(value as i16);
            }
        }
        if block[1] & FLAG_END != 0 {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(shift_filter: u8, flags: u8, fill: u8) -> [u8; 16] {
        let mut b = [fill; 16];
        b[0] = shift_filter;
        b[1] = flags;
        b
    }

    #[test]
    fn looping_sample_layout() {
        let mut data = Vec::new();
        data.extend_from_slice(&block(0x0C, 0x00, 0x11));
        data.extend_from_slice(&block(0x0C, FLAG_LOOP_START, 0x11));
        data.extend_from_slice(&block(0x0C, FLAG_END | FLAG_REPEAT, 0x11));
        data.extend_from_slice(&block(0x0C, 0x00, 0x11));

        let l = layout(&data);
        assert_eq!(l.length, 48);
        assert_eq!(l.frames, 84);
        assert_eq!(l.loop_start, Some(28));
        assert_eq!(l.loop_length, 56);
    }

    #[test]
    fn one_shot_sample_has_no_loop() {
        let data = [block(0x0C, FLAG_END, 0x00), block(0, 0, 0)].concat();
        let l = layout(&data);
        assert_eq!(l.frames, 28);
        assert_eq!(l.loop_start, None);
    }

    #[test]
    fn decode_without_filter() {
        // Shift 12, filter 0: each nibble maps to itself.
        let data = block(0x0C, FLAG_END, 0x21);
        let pcm = decode(&data);
        assert_eq!(pcm.len(), 28);
        assert_eq!(&pcm[..2], &[1, 2]);
    }
}
