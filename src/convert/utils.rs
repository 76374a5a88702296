//! Channel extraction and packing helpers shared by the converters.
//!
//! Forked from zune-bmp 0.5.2 by Caleb Etemesi (MIT/Apache-2.0/Zlib).

/// Expand a scanline of 1 or 4-bit palette indices to one index per byte.
///
/// `out` receives at most `out.len()` indices; trailing bits of the last input byte
/// beyond that are ignored.
pub(crate) fn expand_indices(depth: u16, input: &[u8], out: &mut [u8]) {
    match depth {
        1 => {
            let mut out_iter = out.chunks_exact_mut(8);
            let mut in_iter = input.iter();
            for (cur, in_val) in (&mut out_iter).zip(&mut in_iter) {
                for (pos, o) in cur.iter_mut().enumerate() {
                    *o = (in_val >> (7 - pos)) & 0x01;
                }
            }
            if let Some(in_val) = in_iter.next() {
                for (pos, o) in out_iter.into_remainder().iter_mut().enumerate() {
                    *o = (in_val >> (7 - pos)) & 0x01;
                }
            }
        }
        4 => {
            let mut out_iter = out.chunks_exact_mut(2);
            let mut in_iter = input.iter();
            for (cur, in_val) in (&mut out_iter).zip(&mut in_iter) {
                cur[0] = in_val >> 4;
                cur[1] = in_val & 0x0f;
            }
            if let Some(in_val) = in_iter.next() {
                if let Some(o) = out_iter.into_remainder().first_mut() {
                    *o = in_val >> 4;
                }
            }
        }
        8 => {
            let n = out.len().min(input.len());
            out[..n].copy_from_slice(&input[..n]);
        }
        _ => {}
    }
}

/// Bitfield shift/scale table for converting N-bit values to 8-bit.
pub(crate) const MUL_TABLE: [u32; 9] = [
    0,    // 0 bits
    0xff, // 1 bit:  0b11111111
    0x55, // 2 bits: 0b01010101
    0x49, // 3 bits: 0b01001001
    0x11, // 4 bits: 0b00010001
    0x21, // 5 bits: 0b00100001
    0x41, // 6 bits: 0b01000001
    0x81, // 7 bits: 0b10000001
    0x01, // 8 bits: 0b00000001
];

pub(crate) const SHIFT_TABLE: [i32; 9] = [0, 0, 0, 1, 0, 2, 4, 6, 0];

/// Extract and scale a bitfield value to 8-bit range.
pub(crate) fn shift_signed(mut v: u32, shift: i32, mut bits: u32) -> u32 {
    if shift < 0 {
        v <<= -shift;
    } else {
        v >>= shift;
    }
    bits = bits.clamp(0, 8);
    v >>= 8 - bits;
    (v.wrapping_mul(MUL_TABLE[bits as usize])) >> SHIFT_TABLE[bits as usize]
}

/// Place an 8-bit channel value into the field described by `shift`/`len`.
///
/// The top `len` bits of the value are kept (all of them when the field is wider
/// than 8 bits) and moved to the field's lowest bit `shift`.
pub(crate) fn put_field(value: u8, shift: u32, len: u32) -> u32 {
    let mut field = u32::from(value);
    if len <= 8 {
        field &= ((1u32 << len) - 1) << (8 - len);
    }
    let shift = shift as i32 - (8 - len as i32);
    if shift < 0 {
        field >> (-shift).min(31)
    } else {
        field.checked_shl(shift as u32).unwrap_or(0)
    }
}

/// Shift, width and reach of one channel mask, precomputed for a whole row.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Channel {
    mask: u32,
    /// Signed shift that brings the top of the field to bit 7.
    unpack_shift: i32,
    /// Lowest bit of the field.
    pack_shift: u32,
    len: u32,
}

impl Channel {
    pub(crate) fn new(mask: u32) -> Self {
        Self {
            mask,
            unpack_shift: (32u32.wrapping_sub(mask.leading_zeros())).wrapping_sub(8) as i32,
            pack_shift: mask.trailing_zeros().min(31),
            len: mask.count_ones(),
        }
    }

    #[inline]
    pub(crate) fn extract(&self, pixel: u32) -> u8 {
        shift_signed(pixel & self.mask, self.unpack_shift, self.len) as u8
    }

    #[inline]
    pub(crate) fn pack(&self, value: u8) -> u32 {
        put_field(value, self.pack_shift, self.len) & self.mask
    }
}
