//! Pixel depth and channel layout conversion between two canonical bitmaps.
//!
//! Every source pixel is unpacked to RGB through the source's color table or channel
//! masks, then packed into the destination representation: a nearest-color index for
//! indexed targets, or the target's channel masks. When both sides share a compatible
//! format, pixel values are copied unchanged.

mod utils;

use alloc::vec;
use alloc::vec::Vec;

use enough::Stop;
use rgb::RGB8;

use crate::color::{ColorInfo, ColorTable};
use crate::dib::BitmapInfo;
use crate::error::{DibError, alloc_zeroed};
use crate::pixel;
use crate::region::Rect;

use utils::{Channel, expand_indices};

/// Unpacks pixel values of one format to RGB.
enum Reader<'a> {
    Indexed(&'a ColorTable),
    Masks([Channel; 3]),
    Bgr24,
}

impl<'a> Reader<'a> {
    fn new(info: &'a BitmapInfo) -> Result<Self, DibError> {
        let format = info.format();
        match info.header.bit_count {
            1 | 4 | 8 => match &info.colors {
                ColorInfo::Table(t) => Ok(Reader::Indexed(t)),
                _ => Err(DibError::InvalidParameter(
                    "indexed bitmap without a color table".into(),
                )),
            },
            24 => Ok(Reader::Bgr24),
            16 | 32 => {
                let masks = format.effective_masks().ok_or(DibError::InvalidBitfieldMask)?;
                masks.check()?;
                Ok(Reader::Masks([
                    Channel::new(masks.red),
                    Channel::new(masks.green),
                    Channel::new(masks.blue),
                ]))
            }
            bpp => Err(DibError::InvalidParameter(alloc::format!(
                "cannot read {bpp}-bit pixels"
            ))),
        }
    }

    #[inline]
    fn rgb(&self, value: u32) -> RGB8 {
        match self {
            Reader::Indexed(table) => table.get(value as usize),
            Reader::Masks([r, g, b]) => RGB8::new(r.extract(value), g.extract(value), b.extract(value)),
            Reader::Bgr24 => RGB8::new((value >> 16) as u8, (value >> 8) as u8, value as u8),
        }
    }
}

/// Packs RGB into pixel values of one format.
enum Writer<'a> {
    Indexed {
        table: &'a ColorTable,
        last: Option<(RGB8, u32)>,
    },
    /// 1-bit target with a single-entry table: set bits match the background.
    Background(RGB8),
    Masks([Channel; 3]),
    Bgr24,
}

impl<'a> Writer<'a> {
    fn new(info: &'a BitmapInfo) -> Result<Self, DibError> {
        let format = info.format();
        match info.header.bit_count {
            1 | 4 | 8 => {
                let table = info.colors.table().ok_or_else(|| {
                    DibError::InvalidParameter("indexed bitmap without a color table".into())
                })?;
                if info.header.bit_count == 1 && table.len() == 1 {
                    return Ok(Writer::Background(table.get(0)));
                }
                Ok(Writer::Indexed { table, last: None })
            }
            24 => Ok(Writer::Bgr24),
            16 | 32 => {
                let masks = format.effective_masks().ok_or(DibError::InvalidBitfieldMask)?;
                masks.check()?;
                Ok(Writer::Masks([
                    Channel::new(masks.red),
                    Channel::new(masks.green),
                    Channel::new(masks.blue),
                ]))
            }
            bpp => Err(DibError::InvalidParameter(alloc::format!(
                "cannot write {bpp}-bit pixels"
            ))),
        }
    }

    #[inline]
    fn value(&mut self, c: RGB8) -> u32 {
        match self {
            Writer::Indexed { table, last } => {
                if let Some((prev, idx)) = *last {
                    if prev == c {
                        return idx;
                    }
                }
                let idx = table.nearest(c);
                *last = Some((c, idx));
                idx
            }
            Writer::Background(bg) => u32::from(c == *bg),
            Writer::Masks([r, g, b]) => r.pack(c.r) | g.pack(c.g) | b.pack(c.b),
            Writer::Bgr24 => u32::from(c.b) | u32::from(c.g) << 8 | u32::from(c.r) << 16,
        }
    }
}

/// Color of a single raw pixel value.
pub(crate) fn value_to_rgb(info: &BitmapInfo, value: u32) -> Result<RGB8, DibError> {
    Ok(Reader::new(info)?.rgb(value))
}

/// Raw pixel value closest to `color` in the given format.
pub(crate) fn rgb_to_value(info: &BitmapInfo, color: RGB8) -> Result<u32, DibError> {
    Ok(Writer::new(info)?.value(color))
}

/// Convert the `src_rect` area (top-down source coordinates) of `src_bits` into a new
/// buffer laid out as `dst`.
///
/// The area lands at the destination origin. The copied extent is the smaller of the
/// area and the destination size; anything else in the destination stays zero.
/// Rows are addressed in top-down coordinates on both sides, so differing
/// orientations flip the image in memory and keep it upright.
pub fn convert(
    src: &BitmapInfo,
    src_bits: &[u8],
    src_rect: Rect,
    dst: &BitmapInfo,
    stop: &dyn Stop,
) -> Result<Vec<u8>, DibError> {
    if src.header.compression.is_rle() || dst.header.compression.is_rle() {
        return Err(DibError::InvalidParameter(
            "RLE bitmaps must be decoded before conversion".into(),
        ));
    }
    let needed = src.header.image_size();
    if src_bits.len() < needed {
        return Err(DibError::BufferTooSmall {
            needed,
            actual: src_bits.len(),
        });
    }

    let mut out = alloc_zeroed(dst.header.image_size())?;
    let Some(rect) = src_rect.intersect(&src.bounds()) else {
        return Ok(out);
    };
    let width = (rect.width() as usize).min(dst.header.width as usize);
    let height = (rect.height() as usize).min(dst.header.abs_height() as usize);
    let left = rect.left as usize;
    let top = rect.top as usize;
    let src_bpp = src.header.bit_count;
    let dst_bpp = dst.header.bit_count;

    if src.format().is_compatible(&dst.format()) {
        for y in 0..height {
            if y % 16 == 0 {
                stop.check()?;
            }
            let src_row = pixel::row(&src.header, src_bits, top + y);
            let dst_row = pixel::row_mut(&dst.header, &mut out, y);
            if src_bpp % 8 == 0 {
                let bytes = usize::from(src_bpp / 8);
                dst_row[..width * bytes]
                    .copy_from_slice(&src_row[left * bytes..(left + width) * bytes]);
            } else {
                for x in 0..width {
                    pixel::put(dst_row, x, dst_bpp, pixel::get(src_row, left + x, src_bpp));
                }
            }
        }
        return Ok(out);
    }

    tracing::trace!(src_bpp, dst_bpp, width, height, "converting pixels");
    let reader = Reader::new(src)?;
    let mut writer = Writer::new(dst)?;
    let mut indices = if src_bpp < 8 {
        vec![0u8; src.header.width as usize]
    } else {
        Vec::new()
    };

    for y in 0..height {
        if y % 16 == 0 {
            stop.check()?;
        }
        let src_row = pixel::row(&src.header, src_bits, top + y);
        let dst_row = pixel::row_mut(&dst.header, &mut out, y);
        if src_bpp < 8 {
            expand_indices(src_bpp, src_row, &mut indices);
            for x in 0..width {
                let c = reader.rgb(u32::from(indices[left + x]));
                pixel::put(dst_row, x, dst_bpp, writer.value(c));
            }
        } else {
            for x in 0..width {
                let c = reader.rgb(pixel::get(src_row, left + x, src_bpp));
                pixel::put(dst_row, x, dst_bpp, writer.value(c));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::BitfieldMasks;
    use crate::dib::DibFormat;
    use crate::header::BitmapHeader;
    use enough::Unstoppable;

    fn rgb(r: u8, g: u8, b: u8) -> RGB8 {
        RGB8::new(r, g, b)
    }

    #[test]
    fn indexed_to_truecolor_keeps_orientation_upright() {
        // 2x2 4-bit bottom-up: memory row 0 is the bottom row.
        let src = BitmapInfo::with_defaults(2, 2, 4);
        let bits = [0x9c, 0, 0, 0, 0x0f, 0, 0, 0];
        let dst = BitmapInfo::with_defaults(2, -2, 32);
        let out = convert(&src, &bits, src.bounds(), &dst, &Unstoppable).unwrap();
        let px = |i: usize| u32::from_le_bytes([out[4 * i], out[4 * i + 1], out[4 * i + 2], out[4 * i + 3]]);
        // Top row (from memory row 1): black, white.
        assert_eq!(px(0), 0x000000);
        assert_eq!(px(1), 0xffffff);
        // Bottom row: red (index 9), blue (index 12).
        assert_eq!(px(2), 0xff0000);
        assert_eq!(px(3), 0x0000ff);
    }

    #[test]
    fn truecolor_to_indexed_uses_nearest_entry() {
        let src = BitmapInfo::new(BitmapHeader::new(3, -1, 24), ColorInfo::Direct);
        let bits = [0x00, 0x00, 0xf0, 0xff, 0xff, 0xff, 0x10, 0x10, 0x10, 0, 0, 0];
        let dst = BitmapInfo::with_defaults(3, -1, 4);
        let out = convert(&src, &bits, src.bounds(), &dst, &Unstoppable).unwrap();
        assert_eq!(out[0], 0x9f);
        assert_eq!(out[1] >> 4, 0);
    }

    #[test]
    fn sixteen_bit_bitfields_round_through_rgb() {
        let src = BitmapInfo::new(
            BitmapHeader::new(2, -1, 16).with_compression(crate::header::Compression::Bitfields),
            ColorInfo::Masks(BitfieldMasks {
                red: 0xf800,
                green: 0x07e0,
                blue: 0x001f,
            }),
        );
        let bits = [0x00, 0xf8, 0x1f, 0x00];
        let dst = BitmapInfo::new(BitmapHeader::new(2, -1, 16), ColorInfo::Direct);
        let out = convert(&src, &bits, src.bounds(), &dst, &Unstoppable).unwrap();
        assert_eq!(u16::from_le_bytes([out[0], out[1]]), 0x7c00);
        assert_eq!(u16::from_le_bytes([out[2], out[3]]), 0x001f);
    }

    #[test]
    fn zero_mask_fails_at_conversion() {
        let src = BitmapInfo::new(
            BitmapHeader::new(1, 1, 32).with_compression(crate::header::Compression::Bitfields),
            ColorInfo::Masks(BitfieldMasks {
                red: 0,
                green: 0xff00,
                blue: 0xff,
            }),
        );
        let dst = BitmapInfo::with_defaults(1, 1, 24);
        assert!(matches!(
            convert(&src, &[0; 4], src.bounds(), &dst, &Unstoppable),
            Err(DibError::InvalidBitfieldMask)
        ));
    }

    #[test]
    fn single_entry_mono_table_marks_background() {
        let src = BitmapInfo::new(BitmapHeader::new(3, 1, 24), ColorInfo::Direct);
        let bits = [0xff, 0xff, 0xff, 0, 0, 0, 0xfe, 0xff, 0xff, 0, 0, 0];
        let dst = BitmapInfo::new(
            BitmapHeader::new(3, 1, 1),
            ColorInfo::Table(ColorTable::new(vec![rgb(0xff, 0xff, 0xff)])),
        );
        let out = convert(&src, &bits, src.bounds(), &dst, &Unstoppable).unwrap();
        assert_eq!(out[0], 0b1000_0000);
    }

    #[test]
    fn sub_rect_lands_at_origin() {
        let src = BitmapInfo::with_defaults(4, -2, 8);
        let bits = [0, 1, 2, 3, 4, 5, 6, 7];
        let dst = BitmapInfo::with_defaults(2, -1, 8).with_format(&DibFormat::indexed(
            8,
            ColorTable::default_for(8).unwrap(),
        ));
        let out = convert(&src, &bits, Rect::new(1, 1, 3, 2), &dst, &Unstoppable).unwrap();
        assert_eq!(&out[..2], &[5, 6]);
    }
}
