//! Resampling fallback used when a surface cannot stretch or mirror by itself.

use alloc::vec::Vec;

use enough::Stop;

use crate::dib::BitmapInfo;
use crate::error::{DibError, alloc_zeroed};
use crate::pixel;
use crate::surface::BlitCoords;

/// How pixels are combined when a stretch shrinks the image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StretchMode {
    BlackOnWhite,
    WhiteOnBlack,
    #[default]
    ColorOnColor,
    Halftone,
}

/// Generic stretch helper.
///
/// Produces the bits for `dst.visrect` laid out as `dst_info`, whose width and height
/// are those of the visible destination rectangle. Source coordinates are top-down.
pub trait Stretcher {
    fn stretch(
        &self,
        info: &BitmapInfo,
        bits: &[u8],
        src: &BlitCoords,
        dst_info: &BitmapInfo,
        dst: &BlitCoords,
        mode: StretchMode,
        stop: &dyn Stop,
    ) -> Result<Vec<u8>, DibError>;
}

/// Nearest-neighbour resampling for every mode. Negative extents mirror the image.
#[derive(Clone, Copy, Debug, Default)]
pub struct NearestStretcher;

/// Source coordinate sampled for device coordinate `p`, taken at pixel centers.
fn nearest(p: i32, d0: i32, dl: i32, s0: i32, sl: i32, lo: i32, hi: i32) -> i32 {
    let offset = if dl > 0 {
        i64::from(p) - i64::from(d0)
    } else {
        i64::from(d0) - i64::from(p)
    };
    let scaled = (2 * offset + 1).saturating_mul(i64::from(sl.unsigned_abs()))
        / (2 * i64::from(dl.unsigned_abs()));
    let s = if sl > 0 {
        i64::from(s0) + scaled
    } else {
        i64::from(s0) - scaled
    };
    s.clamp(i64::from(lo), i64::from(hi) - 1) as i32
}

impl Stretcher for NearestStretcher {
    fn stretch(
        &self,
        info: &BitmapInfo,
        bits: &[u8],
        src: &BlitCoords,
        dst_info: &BitmapInfo,
        dst: &BlitCoords,
        mode: StretchMode,
        stop: &dyn Stop,
    ) -> Result<Vec<u8>, DibError> {
        if src.width == 0 || src.height == 0 || dst.width == 0 || dst.height == 0 {
            return Err(DibError::InvalidParameter("zero stretch extent".into()));
        }
        let needed = info.header.image_size();
        if bits.len() < needed {
            return Err(DibError::BufferTooSmall {
                needed,
                actual: bits.len(),
            });
        }
        tracing::trace!(?mode, ?src, ?dst, "nearest stretch");

        // Sample in the source format, then convert if the target differs.
        let same_format = info.format().is_compatible(&dst_info.format());
        let staging = if same_format {
            None
        } else {
            Some(info.resized(
                dst_info.header.width,
                dst_info.header.abs_height() as i32,
                dst_info.header.is_top_down(),
            ))
        };
        let out_info = staging.as_ref().unwrap_or(dst_info);
        let mut out = alloc_zeroed(out_info.header.image_size())?;

        let width = (out_info.header.width).min(dst.visrect.width());
        let height = (out_info.header.abs_height() as i32).min(dst.visrect.height());
        let vis = src.visrect;
        if !vis.is_empty() {
            let bpp = info.header.bit_count;
            let columns: Vec<usize> = (0..width.max(0))
                .map(|i| {
                    let px = dst.visrect.left + i;
                    nearest(px, dst.x, dst.width, src.x, src.width, vis.left, vis.right) as usize
                })
                .collect();
            for j in 0..height.max(0) {
                if j % 16 == 0 {
                    stop.check()?;
                }
                let py = dst.visrect.top + j;
                let sy = nearest(py, dst.y, dst.height, src.y, src.height, vis.top, vis.bottom);
                let src_row = pixel::row(&info.header, bits, sy as usize);
                let dst_row = pixel::row_mut(&out_info.header, &mut out, j as usize);
                for (i, &sx) in columns.iter().enumerate() {
                    pixel::put(dst_row, i, bpp, pixel::get(src_row, sx, bpp));
                }
            }
        }

        match staging {
            None => Ok(out),
            Some(staged) => {
                crate::convert::convert(&staged, &out, staged.bounds(), dst_info, stop)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Rect;
    use enough::Unstoppable;

    fn coords(x: i32, y: i32, w: i32, h: i32, visrect: Rect) -> BlitCoords {
        BlitCoords {
            visrect,
            ..BlitCoords::new(x, y, w, h)
        }
    }

    #[test]
    fn nearest_maps_pixel_centers() {
        // Doubling: 0,0,1,1,2,2,...
        let xs: Vec<i32> = (0..6).map(|p| nearest(p, 0, 6, 0, 3, 0, 3)).collect();
        assert_eq!(xs, [0, 0, 1, 1, 2, 2]);
        // Halving picks the second pixel of each pair.
        let xs: Vec<i32> = (0..3).map(|p| nearest(p, 0, 3, 0, 6, 0, 6)).collect();
        assert_eq!(xs, [1, 3, 5]);
        // Mirrored destination ending at x = 3.
        let xs: Vec<i32> = (0..4).map(|p| nearest(p, 3, -4, 0, 4, 0, 4)).collect();
        assert_eq!(xs, [3, 2, 1, 0]);
    }

    #[test]
    fn stretches_and_mirrors_rows() {
        let info = BitmapInfo::with_defaults(2, -1, 8);
        let bits = [7, 9, 0, 0];
        let src = coords(0, 0, 2, 1, Rect::from_size(2, 1));
        let dst = coords(3, 0, -4, 1, Rect::new(0, 0, 4, 1));
        let dst_info = info.resized(4, 1, true);
        let out = NearestStretcher
            .stretch(&info, &bits, &src, &dst_info, &dst, StretchMode::default(), &Unstoppable)
            .unwrap();
        assert_eq!(&out[..4], &[9, 9, 7, 7]);
    }

    #[test]
    fn converts_when_target_format_differs() {
        let info = BitmapInfo::with_defaults(1, -1, 1);
        let bits = [0x80, 0, 0, 0];
        let src = coords(0, 0, 1, 1, Rect::from_size(1, 1));
        let dst = coords(0, 0, 2, 2, Rect::from_size(2, 2));
        let dst_info = BitmapInfo::with_defaults(2, -2, 24);
        let out = NearestStretcher
            .stretch(&info, &bits, &src, &dst_info, &dst, StretchMode::Halftone, &Unstoppable)
            .unwrap();
        assert_eq!(out.len(), 16);
        assert_eq!(&out[..6], &[0xff; 6]);
        assert_eq!(&out[8..14], &[0xff; 6]);
    }
}
