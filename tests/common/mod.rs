//! Builders for synthetic driver data.
#![allow(dead_code)]

use seqrip::codec::psx_adpcm;

/// AKAO V1 sequence with one track per body.
pub fn akao_v1_sequence(id: u16, bodies: &[&[u8]]) -> Vec<u8> {
    let mut out = b"AKAO".to_vec();
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&[0, 0]); // length, patched below
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&(((1u64 << bodies.len()) - 1) as u32).to_le_bytes());

    let fields_at = out.len();
    let mut body_at = fields_at + 2 * bodies.len();
    for (i, body) in bodies.iter().enumerate() {
        let field_end = fields_at + 2 * i + 2;
        out.extend_from_slice(&((body_at - field_end) as u16).to_le_bytes());
        body_at += body.len();
    }
    for body in bodies {
        out.extend_from_slice(body);
    }
    let length = (out.len() - 0x10) as u16;
    out[6..8].copy_from_slice(&length.to_le_bytes());
    out
}

/// AKAO V2 sequence. `instruments[p]` lists the `(key_low, key_high,
/// articulation)` regions of program `p`.
pub fn akao_v2_sequence(id: u16, body: &[u8], instruments: &[&[(u8, u8, u16)]]) -> Vec<u8> {
    let mut out = b"AKAO".to_vec();
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&[0, 0]); // instrument table, patched below
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // track 0 follows its field
    out.extend_from_slice(body);

    let table = out.len();
    out[0x14..0x16].copy_from_slice(&(table as u16).to_le_bytes());
    let mut region_at = 2 * instruments.len() + 2;
    for regions in instruments {
        out.extend_from_slice(&(region_at as u16).to_le_bytes());
        region_at += regions.len() * 8 + 1;
    }
    out.extend_from_slice(&0xFFFFu16.to_le_bytes());
    for regions in instruments {
        for &(lo, hi, art) in regions.iter() {
            out.extend_from_slice(&[lo, hi]);
            out.extend_from_slice(&art.to_le_bytes());
            out.extend_from_slice(&[0xFF, 100, 64, 0]);
        }
        out.push(0xFF);
    }
    let length = (out.len() - 0x10) as u16;
    out[6..8].copy_from_slice(&length.to_le_bytes());
    out
}

/// AKAO sample collection of `count` articulations starting at `first`,
/// all playing one looping ADPCM sample.
pub fn akao_samples(id: u16, first: u32, count: u32) -> Vec<u8> {
    let mut data = vec![0u8; 0x20];
    data[0x10] = 0x0C;
    data[0x11] = psx_adpcm::FLAG_END | psx_adpcm::FLAG_REPEAT;

    let mut out = b"AKAO".to_vec();
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&first.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.resize(0x40, 0);
    for _ in 0..count {
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0x1000u16.to_le_bytes());
        out.push(60);
        out.push(0);
        out.extend_from_slice(&0x80FFu16.to_le_bytes());
        out.extend_from_slice(&0x5FC0u16.to_le_bytes());
    }
    out.extend_from_slice(&data);
    out
}

/// A 64 KiB SPC700 RAM image with an N-SPC driver and one song.
///
/// Song 1 has a single block. Voice 0 sets length 24, selects program 0,
/// plays key 60 and rests; voice 1 sets length 48, selects program 1 and
/// plays key 60 twice. Programs 0 and 1 use samples 0 and 1 at tunings 1.0
/// and 2.0, and one percussion slot plays sample 1.
pub fn nspc_ram() -> Vec<u8> {
    let mut ram = vec![0u8; 0x10000];
    let mut put = |at: usize, bytes: &[u8]| ram[at..at + bytes.len()].copy_from_slice(bytes);

    // Driver code: song list at 0x2000, instruments at 0x3000, percussion at
    // 0x3080, directory page 0x40.
    put(0x0800, &[0x1C, 0x5D, 0xF5, 0x01, 0x20, 0xFD, 0xF5, 0x00, 0x20, 0xDA, 0x40]);
    put(0x0900, &[0x8D, 0x06, 0xCF, 0xDA, 0x14, 0x60, 0x98, 0x00, 0x14, 0x98, 0x30, 0x15]);
    put(0x0A00, &[0x8D, 0x07, 0xCF, 0xDA, 0x14, 0x60, 0x98, 0x80, 0x14, 0x98, 0x30, 0x15]);
    put(0x0B00, &[0x8F, 0x5D, 0xF2, 0x8F, 0x40, 0xF3]);
    put(0x0C00, &[0x68, 0xE0, 0x90]);

    // Song 1 -> 0x2100: one block, then stop.
    put(0x2002, &[0x00, 0x21]);
    put(0x2100, &[0x00, 0x22, 0x00, 0x00]);
    put(0x2200, &[0x00, 0x23, 0x00, 0x24]);

    put(0x2300, &[0x18, 0xE0, 0x00, 0xA4, 0xC9, 0x00]);
    put(0x2400, &[0x30, 0xE0, 0x01, 0xA4, 0xA4, 0x00]);

    // Instruments and percussion, each ended by an unusable SRCN.
    put(0x3000, &[0, 0xFF, 0xE0, 0x7F, 1, 0, 1, 0x8F, 0xE0, 0x7F, 2, 0, 0x90]);
    put(0x3080, &[1, 0xFF, 0xE0, 0x7F, 1, 0, 0xA4, 0x90]);

    // Directory: srcn 0 loops at its second block, srcn 1 is one-shot.
    put(0x4000, &[0x00, 0x50, 0x09, 0x50, 0x00, 0x60, 0x00, 0x60]);
    put(0x5009, &[0x03]);
    put(0x6000, &[0x01]);
    ram
}
