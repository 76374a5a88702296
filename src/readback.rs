//! Reading scanlines back from a surface in a caller-chosen format.

use alloc::vec::Vec;

use enough::Stop;

use crate::color::{self, BitfieldMasks, ColorInfo, ColorTable, ColorUsage, PaletteSource};
use crate::dib::{BitmapInfo, DibFormat};
use crate::error::{DibError, alloc_zeroed};
use crate::header::{BitmapHeader, Compression};
use crate::region::Rect;
use crate::surface::DibSurface;

/// Result of [`get_dib_bits`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DibBits {
    /// The requested header with its color information filled in.
    pub info: BitmapInfo,
    /// `lines` scanlines in the requested layout; rows with no source data are zero.
    /// Empty for format queries.
    pub bits: Vec<u8>,
    /// Scanlines actually copied from the surface, or the surface height for a query.
    pub lines: u32,
}

/// Read `lines` scanlines starting at scanline `start_scan` of the requested bitmap.
///
/// `request` describes the bitmap the caller wants: its width and height bound the
/// readable area, its depth and compression pick the pixel format. A depth of 0 asks
/// only for the surface's own format. With `lines == 0` (or a start past the end)
/// nothing is copied and only the color information is filled in.
pub fn get_dib_bits(
    surface: &dyn DibSurface,
    start_scan: u32,
    lines: u32,
    request: &BitmapHeader,
    usage: ColorUsage,
    palette: Option<&dyn PaletteSource>,
    stop: &dyn Stop,
) -> Result<DibBits, DibError> {
    stop.check()?;
    if usage == ColorUsage::PaletteIndices {
        return Err(DibError::InvalidParameter(
            "palette indices cannot describe read-back bits".into(),
        ));
    }
    let image = surface.get_image()?;
    let mut src_info = image.info().clone();
    if src_info.header.bit_count <= 8 && src_info.colors.table_len() == 0 {
        src_info.colors = ColorInfo::Table(
            ColorTable::default_for(src_info.header.bit_count).unwrap_or_default(),
        );
    }

    if request.bit_count == 0 {
        return Ok(query(src_info));
    }
    request.validate(false)?;

    let dst_height = request.abs_height();
    let want_bits = lines != 0 && start_scan < dst_height;
    let colors = dst_colors(&src_info, request, usage, palette)?;
    let mut header = *request;
    header.clr_used = 0;
    header.clr_important = 0;
    if matches!(colors, ColorInfo::Masks(_)) {
        header.compression = Compression::Bitfields;
    }
    header.size_image = header.stored_image_size();
    let info = BitmapInfo::new(header, colors);

    if !want_bits {
        return Ok(DibBits {
            info,
            bits: Vec::new(),
            lines: 1,
        });
    }

    let h = i64::from(dst_height);
    let start = i64::from(start_scan);
    let mut lines = i64::from(lines);
    let mut dst_vis = Rect::from_size(header.width, dst_height as i32);
    let offset = if header.is_top_down() {
        let mut offset = h - lines - start;
        if offset < 0 {
            offset = 0;
            lines = h - start;
        }
        if lines < h {
            dst_vis.bottom = lines as i32;
        }
        offset
    } else {
        lines = lines.min(h - start);
        if lines < h {
            dst_vis.top = (h - lines) as i32;
        }
        -start
    };
    let offset = offset as i32;

    let stride = header.stride();
    let mut out = alloc_zeroed(stride * lines as usize)?;
    let Some(src_vis) = dst_vis.offset_by(0, offset).intersect(&src_info.bounds()) else {
        return Ok(DibBits {
            info,
            bits: out,
            lines: 0,
        });
    };
    let dst_vis = src_vis.offset_by(0, -offset);
    let band_lines = src_vis.height();
    tracing::trace!(?src_vis, lines, band_lines, "reading back scanlines");

    let pad = if header.is_top_down() {
        0
    } else {
        (i64::from(header.height) - i64::from(dst_vis.bottom)).clamp(0, lines) as usize
    };
    let band = info.resized(header.width, band_lines, header.is_top_down());
    let converted = crate::convert::convert(&src_info, image.bits(), src_vis, &band, stop)?;
    let at = pad * stride;
    let len = converted.len().min(out.len().saturating_sub(at));
    out[at..at + len].copy_from_slice(&converted[..len]);

    Ok(DibBits {
        info,
        bits: out,
        lines: band_lines as u32,
    })
}

/// The surface's own format: 16 and 32-bit surfaces report explicit masks.
fn query(src_info: BitmapInfo) -> DibBits {
    let format = src_info.format();
    let mut info = match (src_info.header.bit_count, format.effective_masks()) {
        (16 | 32, Some(masks)) => {
            src_info.with_format(&DibFormat::bitfields(src_info.header.bit_count, masks))
        }
        _ => src_info,
    };
    info.header.clr_used = 0;
    info.header.clr_important = 0;
    info.header.x_pels_per_meter = 0;
    info.header.y_pels_per_meter = 0;
    let lines = info.header.abs_height();
    DibBits {
        info,
        bits: Vec::new(),
        lines,
    }
}

/// Color information for the returned bits.
fn dst_colors(
    src: &BitmapInfo,
    request: &BitmapHeader,
    usage: ColorUsage,
    palette: Option<&dyn PaletteSource>,
) -> Result<ColorInfo, DibError> {
    let bpp = request.bit_count;
    if bpp == src.header.bit_count && usage == ColorUsage::Rgb {
        return Ok(match bpp {
            16 | 32 => {
                let masks = src
                    .format()
                    .effective_masks()
                    .ok_or(DibError::InvalidBitfieldMask)?;
                if request.compression == Compression::Bitfields {
                    ColorInfo::Masks(masks)
                } else {
                    ColorInfo::Direct
                }
            }
            _ => src.colors.clone(),
        });
    }
    if bpp <= 8 {
        return match usage {
            ColorUsage::PaletteColors => color::from_palette(request, palette),
            _ => Ok(ColorInfo::Table(ColorTable::default_for(bpp).unwrap_or_default())),
        };
    }
    Ok(match (bpp, request.compression) {
        (16, Compression::Bitfields) => ColorInfo::Masks(BitfieldMasks::RGB555),
        (32, Compression::Bitfields) => ColorInfo::Masks(BitfieldMasks::RGB888),
        _ => ColorInfo::Direct,
    })
}
