//! Moving bitmap bits onto a surface: stretched blits and banded scanline transfers.
//!
//! Both paths compute source and destination rectangles, clip them against the bitmap
//! and the surface, and hand the bits to [`DibSurface::put_image`]. When the surface
//! rejects the pixel format the bits are converted to the format it asks for; when it
//! cannot stretch or mirror, a [`Stretcher`] resamples them first.

use alloc::borrow::Cow;
use alloc::vec::Vec;

use enough::Stop;
use rgb::RGB8;

use crate::color::{ColorInfo, ColorTable};
use crate::dib::{BitmapInfo, Dib, DibFormat};
use crate::error::DibError;
use crate::header::Compression;
use crate::region::{Rect, Region};
use crate::stretch::{NearestStretcher, StretchMode, Stretcher};
use crate::surface::{BlitCoords, DibSurface, RasterOp, SurfaceError, with_background};

/// A stretched transfer of a bitmap (or part of it) to a destination rectangle.
///
/// ```
/// use zendib::{BitmapInfo, Dib, MemorySurface, StretchRequest, Unstoppable};
///
/// let dib = Dib::new(BitmapInfo::with_defaults(2, -1, 8), vec![3, 4, 0, 0])?;
/// let mut surface = MemorySurface::new(BitmapInfo::with_defaults(4, -1, 8))?;
/// let rows = StretchRequest::new(0, 0, 4, 1).blit(&mut surface, &dib, &Unstoppable)?;
/// assert_eq!(rows, 1);
/// assert_eq!(surface.pixel(3, 0), Some(4));
/// # Ok::<(), zendib::DibError>(())
/// ```
#[derive(Clone, Copy)]
pub struct StretchRequest<'a> {
    dst: (i32, i32, i32, i32),
    src: Option<(i32, i32, i32, i32)>,
    rop: RasterOp,
    mirror: bool,
    mode: StretchMode,
    background: RGB8,
    stretcher: &'a dyn Stretcher,
}

impl<'a> StretchRequest<'a> {
    /// Destination rectangle in device coordinates. A negative extent mirrors.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            dst: (x, y, width, height),
            src: None,
            rop: RasterOp::SRCCOPY,
            mirror: false,
            mode: StretchMode::default(),
            background: RGB8::new(0xff, 0xff, 0xff),
            stretcher: &NearestStretcher,
        }
    }

    /// Source rectangle in bitmap coordinates (origin at the bottom-left for bottom-up
    /// bitmaps). Defaults to the whole bitmap.
    pub fn source(mut self, x: i32, y: i32, width: i32, height: i32) -> Self {
        self.src = Some((x, y, width, height));
        self
    }

    pub fn rop(mut self, rop: RasterOp) -> Self {
        self.rop = rop;
        self
    }

    /// Mirror horizontally within the destination rectangle.
    pub fn mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn stretch_mode(mut self, mode: StretchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Color that set bits stand for when converting to a monochrome surface.
    pub fn background(mut self, color: RGB8) -> Self {
        self.background = color;
        self
    }

    pub fn stretcher(mut self, stretcher: &'a dyn Stretcher) -> Self {
        self.stretcher = stretcher;
        self
    }

    /// Transfer the bitmap. Returns the number of source scanlines, or 0 when
    /// nothing is visible.
    pub fn blit(
        &self,
        surface: &mut dyn DibSurface,
        dib: &Dib<'_>,
        stop: &dyn Stop,
    ) -> Result<u32, DibError> {
        stop.check()?;
        let header = *dib.header();
        header.validate(true)?;
        let height = header.abs_height() as i32;
        let top_down = header.is_top_down();

        let mut dst = BlitCoords::new(self.dst.0, self.dst.1, self.dst.2, self.dst.3);
        // Coordinates are caller-supplied; arithmetic on them saturates.
        if self.mirror {
            dst.x = dst.x.saturating_add(dst.width - dst.width.signum());
            dst.width = dst.width.saturating_neg();
        }
        let rop = self.rop.without_flags();

        let (sx, sy, sw, sh) = self.src.unwrap_or((0, 0, header.width, height));
        let mut src = BlitCoords::new(sx, sy, sw, sh);
        let from_origin =
            src.x == 0 && src.y == 0 && src.width == dst.width && src.height == dst.height;

        let (mut info, mut bits, mut clip) = if header.compression.is_rle() {
            let want_clip = from_origin && rop == RasterOp::SRCCOPY;
            let (bits, clip) = crate::rle::decode(&header, dib.bits(), want_clip, stop)?;
            (
                BitmapInfo::new(header.with_compression(Compression::Rgb), dib.colors().clone()),
                Cow::Owned(bits),
                clip,
            )
        } else {
            (dib.info().clone(), Cow::Borrowed(dib.bits()), None)
        };

        // Legacy rounding for destinations that collapse to a single pixel.
        if rop != RasterOp::SRCCOPY || from_origin {
            if dst.width == 1 && src.width > 1 {
                src.width -= 1;
            }
            if dst.height == 1 && src.height > 1 {
                src.height -= 1;
            }
        }

        if rop != RasterOp::SRCCOPY {
            // Both sides mirrored the same way: unflip, off by one.
            if dst.width < 0 && dst.width == src.width {
                dst.x = dst.x.saturating_add(dst.width);
                src.x = src.x.saturating_add(src.width);
                dst.width = dst.width.saturating_neg();
                src.width = src.width.saturating_neg();
            }
            if dst.height < 0 && dst.height == src.height {
                dst.y = dst.y.saturating_add(dst.height);
                src.y = src.y.saturating_add(src.height);
                dst.height = dst.height.saturating_neg();
                src.height = src.height.saturating_neg();
            }
        }

        if !top_down || (rop == RasterOp::SRCCOPY && !from_origin) {
            src.y = height.saturating_sub(src.y).saturating_sub(src.height);
        }
        let end = src.y.saturating_add(src.height).saturating_add(1);
        if src.y >= height && end < height {
            src.y = height - 1;
        } else if src.y > 0 && end < 0 {
            src.y = src.height.saturating_neg().saturating_sub(1);
        }

        let Some(visrect) = Rect::from_size(header.width, height)
            .intersect(&Rect::bounding(src.x, src.y, src.width, src.height))
        else {
            return Ok(0);
        };
        src.visrect = visrect;
        let lines = height as u32;

        let Some(visrect) =
            Rect::bounding(dst.x, dst.y, dst.width, dst.height).intersect(&surface.bounds())
        else {
            return Ok(0);
        };
        dst.visrect = visrect;

        if !intersect_vis_rectangles(&mut dst, &mut src) {
            return Ok(0);
        }
        if let Some(clip) = clip.as_mut() {
            clip.offset(dst.x.saturating_sub(src.x), dst.y.saturating_sub(src.y));
        }
        tracing::trace!(?src, ?dst, rop = rop.0, "blit");

        let mut result = surface.put_image(clip.as_ref(), &info, &bits, &src, &dst, rop);
        if let Err(SurfaceError::BadFormat(format)) = &result {
            tracing::debug!(
                from = info.header.bit_count,
                to = format.bit_count,
                "surface rejected format, converting"
            );
            let format = format.clone();
            let target = with_background(&format, self.background);
            let (mut converted, out) =
                convert_bits(&info, &bits, &mut src, target.as_ref().unwrap_or(&format), stop)?;
            if target.is_some() {
                converted.colors = ColorInfo::Table(ColorTable::default());
                converted.header.clr_used = 0;
            }
            info = converted;
            bits = Cow::Owned(out);
            result = surface.put_image(clip.as_ref(), &info, &bits, &src, &dst, rop);
        }
        if let Err(SurfaceError::TransformUnsupported) = result {
            tracing::debug!(?src, ?dst, "surface cannot stretch, resampling");
            let (stretched, out) = stretch_bits(
                &info,
                &bits,
                &mut src,
                &dst,
                self.mode,
                self.stretcher,
                stop,
            )?;
            info = stretched;
            bits = Cow::Owned(out);
            result = surface.put_image(None, &info, &bits, &src, &dst, rop);
        }
        result?;
        Ok(lines)
    }
}

/// Convert the visible source rectangle to `format`. The result covers exactly that
/// rectangle, and `src` is moved to its origin.
fn convert_bits(
    info: &BitmapInfo,
    bits: &[u8],
    src: &mut BlitCoords,
    format: &DibFormat,
    stop: &dyn Stop,
) -> Result<(BitmapInfo, Vec<u8>), DibError> {
    let vis = src.visrect;
    let target = info
        .with_format(format)
        .resized(vis.width(), vis.height(), info.header.is_top_down());
    let out = crate::convert::convert(info, bits, vis, &target, stop)?;
    src.x = src.x.saturating_sub(vis.left);
    src.y = src.y.saturating_sub(vis.top);
    src.visrect = vis.offset_by(vis.left.saturating_neg(), vis.top.saturating_neg());
    Ok((target, out))
}

/// Resample into a bitmap covering the visible destination rectangle. Afterwards the
/// source is that bitmap, unstretched.
fn stretch_bits(
    info: &BitmapInfo,
    bits: &[u8],
    src: &mut BlitCoords,
    dst: &BlitCoords,
    mode: StretchMode,
    stretcher: &dyn Stretcher,
    stop: &dyn Stop,
) -> Result<(BitmapInfo, Vec<u8>), DibError> {
    let vis = dst.visrect;
    let target = info.resized(vis.width(), vis.height(), info.header.is_top_down());
    let out = stretcher.stretch(info, bits, src, &target, dst, mode, stop)?;
    *src = *dst;
    src.x = src.x.saturating_sub(vis.left);
    src.y = src.y.saturating_sub(vis.top);
    src.visrect = vis.offset_by(vis.left.saturating_neg(), vis.top.saturating_neg());
    Ok((target, out))
}

/// Clip the source and destination visible rectangles against each other.
///
/// Without stretching the two rectangles are simply overlaid. With stretching each is
/// mapped into the other's space, grown by a pixel to absorb rounding, and intersected.
/// Returns `false` when nothing is left.
pub(crate) fn intersect_vis_rectangles(dst: &mut BlitCoords, src: &mut BlitCoords) -> bool {
    if src.width == dst.width && src.height == dst.height {
        let (dx, dy) = (dst.x.saturating_sub(src.x), dst.y.saturating_sub(src.y));
        let Some(rect) = src.visrect.offset_by(dx, dy).intersect(&dst.visrect) else {
            return false;
        };
        dst.visrect = rect;
        src.visrect = rect.offset_by(src.x.saturating_sub(dst.x), src.y.saturating_sub(dst.y));
        return true;
    }

    let (sx, sy, sw, sh) = (
        i64::from(src.x),
        i64::from(src.y),
        i64::from(src.width),
        i64::from(src.height),
    );
    let (dw, dh) = (i64::from(dst.width), i64::from(dst.height));

    // Source visible area in destination space.
    let ox = -sx - i64::from(src.width < 0);
    let oy = -sy - i64::from(src.height < 0);
    let v = src.visrect;
    let mut left = (i64::from(v.left) + ox) * dw / sw;
    let mut top = (i64::from(v.top) + oy) * dh / sh;
    let mut right = (i64::from(v.right) + ox) * dw / sw;
    let mut bottom = (i64::from(v.bottom) + oy) * dh / sh;
    if left > right {
        core::mem::swap(&mut left, &mut right);
    }
    if top > bottom {
        core::mem::swap(&mut top, &mut bottom);
    }

    // A flipped source that does not fit its bitmap leaves the destination unflipped.
    let (vl, vt, vr, vb) = (
        i64::from(v.left),
        i64::from(v.top),
        i64::from(v.right),
        i64::from(v.bottom),
    );
    let mut dx = i64::from(dst.x);
    let mut dy = i64::from(dst.y);
    if sw < 0 && dw > 0 && (sx + sw + 1 < vl || sx > vr) {
        dx += (dw - right) - left;
    } else if sw > 0 && dw < 0 && (sx < vl || sx + sw > vr) {
        dx -= right - (dw - left);
    }
    if sh < 0 && dh > 0 && (sy + sh + 1 < vt || sy > vb) {
        dy += (dh - bottom) - top;
    } else if sh > 0 && dh < 0 && (sy < vt || sy + sh > vb) {
        dy -= bottom - (dh - top);
    }
    dst.x = clamp_i32(dx);
    dst.y = clamp_i32(dy);

    let mapped = grown(left + dx, top + dy, right + dx, bottom + dy);
    let Some(rect) = mapped.intersect(&dst.visrect) else {
        return false;
    };
    dst.visrect = rect;

    // And the clipped destination back in source space.
    let ox = -i64::from(dst.x) - i64::from(dst.width < 0);
    let oy = -i64::from(dst.y) - i64::from(dst.height < 0);
    let d = dst.visrect;
    let mut left = sx + (i64::from(d.left) + ox) * sw / dw;
    let mut top = sy + (i64::from(d.top) + oy) * sh / dh;
    let mut right = sx + (i64::from(d.right) + ox) * sw / dw;
    let mut bottom = sy + (i64::from(d.bottom) + oy) * sh / dh;
    if left > right {
        core::mem::swap(&mut left, &mut right);
    }
    if top > bottom {
        core::mem::swap(&mut top, &mut bottom);
    }
    let Some(rect) = grown(left, top, right, bottom).intersect(&src.visrect) else {
        return false;
    };
    src.visrect = rect;
    true
}

fn grown(left: i64, top: i64, right: i64, bottom: i64) -> Rect {
    Rect::new(
        clamp_i32(left - 1),
        clamp_i32(top - 1),
        clamp_i32(right + 1),
        clamp_i32(bottom + 1),
    )
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// A non-stretching transfer of a band of scanlines.
///
/// The caller's bits hold `lines` scanlines starting at scanline `start_scan` of the
/// full bitmap. For RLE bitmaps the band fields are ignored and the whole stream is
/// decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetBitsRequest {
    pub dst_x: i32,
    pub dst_y: i32,
    pub width: u32,
    pub height: u32,
    pub src_x: i32,
    pub src_y: i32,
    pub start_scan: u32,
    pub lines: u32,
}

/// Copy a band of scanlines to the surface without stretching.
///
/// Returns the number of scanlines in the band that were considered, 0 when the
/// band lies outside the bitmap.
pub fn set_dib_bits_to_device(
    surface: &mut dyn DibSurface,
    request: &SetBitsRequest,
    info: &BitmapInfo,
    bits: &[u8],
    stop: &dyn Stop,
) -> Result<u32, DibError> {
    stop.check()?;
    if request.lines == 0 {
        return Ok(0);
    }
    info.header.validate(true)?;
    let height = info.header.abs_height();
    let top_down = info.header.is_top_down();
    let cx = i32::try_from(request.width)
        .map_err(|_| DibError::InvalidParameter("transfer width out of range".into()))?;
    let cy = i32::try_from(request.height)
        .map_err(|_| DibError::InvalidParameter("transfer height out of range".into()))?;
    let mut lines = request.lines;
    let mut src = BlitCoords::new(request.src_x, 0, cx, cy);

    let (band, band_bits, mut clip): (BitmapInfo, Cow<'_, [u8]>, Option<Region>) =
        if info.header.compression.is_rle() {
            lines = height;
            let width = request.src_x.saturating_add(cx);
            let rows = request.src_y.saturating_add(cy);
            if width <= 0 || rows <= 0 {
                return Ok(0);
            }
            let header = info.header.resized(width, rows, false);
            let (decoded, clip) = crate::rle::decode(&header, bits, true, stop)?;
            (
                BitmapInfo::new(header.with_compression(Compression::Rgb), info.colors.clone()),
                Cow::Owned(decoded),
                clip,
            )
        } else {
            if request.start_scan >= height {
                return Ok(0);
            }
            if !top_down && lines > height - request.start_scan {
                lines = height - request.start_scan;
            }
            // Top-down coordinates with the band's first scanline as origin.
            let y = i64::from(request.start_scan) + i64::from(lines)
                - (i64::from(request.src_y) + i64::from(cy));
            if y > 0 {
                if y >= i64::from(lines) {
                    return Ok(if top_down { lines } else { 0 });
                }
                if !top_down {
                    lines -= y as u32;
                    src.y = 0;
                } else {
                    src.y = y as i32;
                }
            } else {
                src.y = clamp_i32(y);
            }
            let rows = if top_down { lines.min(height) } else { lines } as i32;
            let header = info.header.resized(info.header.width, rows, top_down);
            let needed = header.image_size();
            let band_bits = bits.get(..needed).ok_or(DibError::BufferTooSmall {
                needed,
                actual: bits.len(),
            })?;
            (
                BitmapInfo::new(header, info.colors.clone()),
                Cow::Borrowed(band_bits),
                None,
            )
        };

    let Some(visrect) = Rect::new(src.x, src.y, src.x.saturating_add(cx), src.y.saturating_add(cy))
        .intersect(&band.bounds())
    else {
        return Ok(0);
    };
    src.visrect = visrect;

    let mut dst = BlitCoords::new(request.dst_x, request.dst_y, cx, cy);
    let target = Rect::new(dst.x, dst.y, dst.x.saturating_add(cx), dst.y.saturating_add(cy));
    let Some(visrect) = target.intersect(&surface.bounds()) else {
        return Ok(lines);
    };
    dst.visrect = visrect;

    let (dx, dy) = (dst.x.saturating_sub(src.x), dst.y.saturating_sub(src.y));
    let Some(rect) = src.visrect.offset_by(dx, dy).intersect(&dst.visrect) else {
        return Ok(lines);
    };
    dst.visrect = rect;
    src.visrect = rect.offset_by(src.x.saturating_sub(dst.x), src.y.saturating_sub(dst.y));
    if let Some(clip) = clip.as_mut() {
        clip.offset(dx, dy);
    }
    tracing::trace!(?src, ?dst, lines, "set bits");

    let mut band = band;
    let mut band_bits = band_bits;
    let mut result = surface.put_image(clip.as_ref(), &band, &band_bits, &src, &dst, RasterOp::SRCCOPY);
    if let Err(SurfaceError::BadFormat(format)) = &result {
        tracing::debug!(to = format.bit_count, "surface rejected format, converting");
        let format = format.clone();
        let (converted, out) = convert_bits(&band, &band_bits, &mut src, &format, stop)?;
        band = converted;
        band_bits = Cow::Owned(out);
        result = surface.put_image(clip.as_ref(), &band, &band_bits, &src, &dst, RasterOp::SRCCOPY);
    }
    result?;
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;
    use alloc::vec;
    use enough::Unstoppable;

    fn coords(x: i32, y: i32, w: i32, h: i32, visrect: Rect) -> BlitCoords {
        BlitCoords {
            visrect,
            ..BlitCoords::new(x, y, w, h)
        }
    }

    #[test]
    fn unstretched_rectangles_overlay() {
        let mut src = coords(2, 0, 4, 4, Rect::new(2, 0, 6, 4));
        let mut dst = coords(0, 0, 4, 4, Rect::new(1, 1, 3, 3));
        assert!(intersect_vis_rectangles(&mut dst, &mut src));
        assert_eq!(dst.visrect, Rect::new(1, 1, 3, 3));
        assert_eq!(src.visrect, Rect::new(3, 1, 5, 3));
    }

    #[test]
    fn stretched_rectangles_map_and_grow() {
        let mut src = coords(0, 0, 2, 2, Rect::from_size(2, 2));
        let mut dst = coords(0, 0, 4, 4, Rect::from_size(10, 10));
        assert!(intersect_vis_rectangles(&mut dst, &mut src));
        assert_eq!(dst.visrect, Rect::new(0, 0, 5, 5));
        assert_eq!(src.visrect, Rect::from_size(2, 2));
    }

    #[test]
    fn disjoint_rectangles_clip_out() {
        let mut src = coords(0, 0, 2, 2, Rect::from_size(2, 2));
        let mut dst = coords(5, 5, 2, 2, Rect::from_size(4, 4));
        assert!(!intersect_vis_rectangles(&mut dst, &mut src));
    }

    #[test]
    fn one_pixel_destination_drops_a_source_column() {
        // Four source columns squeezed into one pixel sample as if there were three.
        let dib = Dib::new(BitmapInfo::with_defaults(4, -1, 8), vec![1, 2, 3, 4]).unwrap();
        let mut surface = MemorySurface::new(BitmapInfo::with_defaults(1, -1, 8)).unwrap();
        let rows = StretchRequest::new(0, 0, 1, 1)
            .source(0, 0, 4, 1)
            .rop(RasterOp::SRCPAINT)
            .blit(&mut surface, &dib, &Unstoppable)
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(surface.pixel(0, 0), Some(2));
    }

    #[test]
    fn one_pixel_destination_drops_a_source_row() {
        let bits = vec![1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0];
        let dib = Dib::new(BitmapInfo::with_defaults(1, -4, 8), bits).unwrap();
        let mut surface = MemorySurface::new(BitmapInfo::with_defaults(1, -1, 8)).unwrap();
        let rows = StretchRequest::new(0, 0, 1, 1)
            .source(0, 0, 1, 4)
            .rop(RasterOp::SRCPAINT)
            .blit(&mut surface, &dib, &Unstoppable)
            .unwrap();
        assert_eq!(rows, 4);
        assert_eq!(surface.pixel(0, 0), Some(2));
    }

    #[test]
    fn plain_copy_keeps_every_source_column() {
        let dib = Dib::new(BitmapInfo::with_defaults(4, -1, 8), vec![1, 2, 3, 4]).unwrap();
        let mut surface = MemorySurface::new(BitmapInfo::with_defaults(1, -1, 8)).unwrap();
        StretchRequest::new(0, 0, 1, 1)
            .source(0, 0, 4, 1)
            .blit(&mut surface, &dib, &Unstoppable)
            .unwrap();
        assert_eq!(surface.pixel(0, 0), Some(3));

        // From the origin at matching size there is nothing to collapse.
        let rows = StretchRequest::new(0, 0, 1, 1)
            .source(0, 0, 1, 1)
            .blit(&mut surface, &dib, &Unstoppable)
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(surface.pixel(0, 0), Some(1));
    }

    #[test]
    fn extreme_coordinates_do_not_overflow() {
        let dib = Dib::new(BitmapInfo::with_defaults(4, 1, 8), vec![1, 2, 3, 4]).unwrap();
        let mut surface = MemorySurface::new(BitmapInfo::with_defaults(4, 1, 8)).unwrap();
        let requests = [
            StretchRequest::new(i32::MAX, 0, 4, 1).mirror(true),
            StretchRequest::new(i32::MAX, 0, -1, 1),
            StretchRequest::new(0, 0, 1, 1).source(0, i32::MIN, 1, 1),
            StretchRequest::new(i32::MIN, i32::MIN, i32::MIN, i32::MIN).mirror(true),
            StretchRequest::new(0, 0, 4, 1)
                .source(i32::MIN, 0, i32::MIN, 1)
                .rop(RasterOp::SRCAND),
        ];
        for request in requests {
            assert_eq!(request.blit(&mut surface, &dib, &Unstoppable).unwrap(), 0);
        }
        assert_eq!(surface.pixel(0, 0), Some(0));
    }

    #[test]
    fn nothing_visible_returns_zero() {
        let dib = Dib::new(BitmapInfo::with_defaults(2, 2, 8), vec![0; 8]).unwrap();
        let mut surface = MemorySurface::new(BitmapInfo::with_defaults(4, 4, 8)).unwrap();
        let rows = StretchRequest::new(10, 10, 2, 2)
            .blit(&mut surface, &dib, &Unstoppable)
            .unwrap();
        assert_eq!(rows, 0);
        let rows = StretchRequest::new(0, 0, 2, 2)
            .source(5, 5, 2, 2)
            .blit(&mut surface, &dib, &Unstoppable)
            .unwrap();
        assert_eq!(rows, 0);
    }
}
