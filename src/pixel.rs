//! Raw pixel value access inside packed, word-aligned scanlines.
//!
//! Pixel values are depth-native: palette indices for 1/4/8-bit, the little-endian
//! word for 16/32-bit, and `B | G << 8 | R << 16` for 24-bit.

use crate::header::BitmapHeader;

/// Byte offset of a row given in top-down image coordinates.
pub(crate) fn row_offset(header: &BitmapHeader, y: usize) -> usize {
    let height = header.abs_height() as usize;
    let row = if header.is_top_down() {
        y
    } else {
        height - 1 - y
    };
    row * header.stride()
}

/// Borrow one scanline (top-down coordinates).
pub(crate) fn row<'a>(header: &BitmapHeader, bits: &'a [u8], y: usize) -> &'a [u8] {
    let start = row_offset(header, y);
    &bits[start..start + header.stride()]
}

pub(crate) fn row_mut<'a>(header: &BitmapHeader, bits: &'a mut [u8], y: usize) -> &'a mut [u8] {
    let start = row_offset(header, y);
    let stride = header.stride();
    &mut bits[start..start + stride]
}

/// Read the pixel value at column `x` of a scanline.
#[inline]
pub(crate) fn get(row: &[u8], x: usize, bit_count: u16) -> u32 {
    match bit_count {
        1 => u32::from((row[x >> 3] >> (7 - (x & 7))) & 1),
        4 => {
            let b = row[x >> 1];
            u32::from(if x & 1 == 0 { b >> 4 } else { b & 0x0f })
        }
        8 => u32::from(row[x]),
        16 => u32::from(u16::from_le_bytes([row[2 * x], row[2 * x + 1]])),
        24 => {
            let p = &row[3 * x..3 * x + 3];
            u32::from(p[0]) | u32::from(p[1]) << 8 | u32::from(p[2]) << 16
        }
        32 => u32::from_le_bytes([row[4 * x], row[4 * x + 1], row[4 * x + 2], row[4 * x + 3]]),
        _ => 0,
    }
}

/// Write the pixel value at column `x` of a scanline. Extra value bits are dropped.
#[inline]
pub(crate) fn put(row: &mut [u8], x: usize, bit_count: u16, value: u32) {
    match bit_count {
        1 => {
            let bit = 0x80u8 >> (x & 7);
            if value & 1 != 0 {
                row[x >> 3] |= bit;
            } else {
                row[x >> 3] &= !bit;
            }
        }
        4 => {
            let b = &mut row[x >> 1];
            let v = (value & 0x0f) as u8;
            *b = if x & 1 == 0 {
                (*b & 0x0f) | (v << 4)
            } else {
                (*b & 0xf0) | v
            };
        }
        8 => row[x] = value as u8,
        16 => row[2 * x..2 * x + 2].copy_from_slice(&(value as u16).to_le_bytes()),
        24 => row[3 * x..3 * x + 3].copy_from_slice(&value.to_le_bytes()[..3]),
        32 => row[4 * x..4 * x + 4].copy_from_slice(&value.to_le_bytes()),
        _ => {}
    }
}

/// Mask covering every bit a pixel of this depth can hold.
pub(crate) fn value_mask(bit_count: u16) -> u32 {
    if bit_count >= 32 {
        u32::MAX
    } else {
        (1u32 << bit_count) - 1
    }
}
