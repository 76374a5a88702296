//! Destination surfaces that receive (and hand back) raw bitmap bits.
//!
//! [`DibSurface`] is the device-image collaborator the blit paths write to. A surface
//! may refuse bits that are not in its own format ([`SurfaceError::BadFormat`]) or
//! that need stretching or mirroring ([`SurfaceError::TransformUnsupported`]); the
//! callers recover from both by converting or stretching first.

use alloc::string::String;
use alloc::vec;

use rgb::RGB8;

use crate::color::{ColorInfo, ColorTable};
use crate::dib::{BitmapInfo, Dib, DibFormat};
use crate::error::DibError;
use crate::header::Compression;
use crate::pixel;
use crate::region::{Rect, Region};

/// A ternary raster operation code, optionally carrying flag bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RasterOp(pub u32);

impl RasterOp {
    pub const SRCCOPY: Self = Self(0x00CC_0020);
    pub const SRCPAINT: Self = Self(0x00EE_0086);
    pub const SRCAND: Self = Self(0x0088_00C6);
    pub const SRCINVERT: Self = Self(0x0066_0046);
    pub const NOTSRCCOPY: Self = Self(0x0033_0008);
    pub const DSTINVERT: Self = Self(0x0055_0009);
    pub const BLACKNESS: Self = Self(0x0000_0042);
    pub const WHITENESS: Self = Self(0x00FF_0062);
    /// Flag: keep bitmaps unmirrored on a mirrored layout.
    pub const NOMIRRORBITMAP: Self = Self(0x8000_0000);

    /// The operation with flag bits removed.
    pub fn without_flags(self) -> Self {
        Self(self.0 & !Self::NOMIRRORBITMAP.0)
    }

    /// The 8-bit truth table over pattern, source and destination.
    pub fn rop3(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Combine source and destination pixel values bitwise. No brush is involved,
    /// so pattern bits read as zero.
    pub fn apply(self, src: u32, dst: u32) -> u32 {
        let table = self.rop3();
        let mut out = 0u32;
        for term in 0..4u8 {
            if table & (1 << term) == 0 {
                continue;
            }
            let s = if term & 2 != 0 { src } else { !src };
            let d = if term & 1 != 0 { dst } else { !dst };
            out |= s & d;
        }
        out
    }
}

/// Source or destination coordinates of one transfer.
///
/// `x`/`y`/`width`/`height` are the requested extent; a negative width or height asks
/// for mirroring. `visrect` is the ordered, visible part of that extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlitCoords {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub visrect: Rect,
}

impl BlitCoords {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            visrect: Rect::default(),
        }
    }
}

/// Why a surface refused a transfer.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum SurfaceError {
    /// The bits are not in a format the surface accepts; carries the format it wants.
    #[error("surface requires a different pixel format")]
    BadFormat(DibFormat),

    #[error("surface cannot stretch or mirror")]
    TransformUnsupported,

    #[error("{0}")]
    Other(String),
}

impl From<SurfaceError> for DibError {
    fn from(e: SurfaceError) -> Self {
        match e {
            SurfaceError::BadFormat(_) => DibError::BadFormat,
            SurfaceError::TransformUnsupported => DibError::TransformUnsupported,
            SurfaceError::Other(msg) => DibError::Surface(msg),
        }
    }
}

/// A device image that accepts and produces raw bits.
pub trait DibSurface {
    /// Device rectangle the surface covers.
    fn bounds(&self) -> Rect;

    /// Write `src.visrect` of `bits` (described by `info`) to `dst.visrect`.
    ///
    /// `clip`, when present, limits the written device pixels.
    fn put_image(
        &mut self,
        clip: Option<&Region>,
        info: &BitmapInfo,
        bits: &[u8],
        src: &BlitCoords,
        dst: &BlitCoords,
        rop: RasterOp,
    ) -> Result<(), SurfaceError>;

    /// Read back the whole surface in its own format.
    fn get_image(&self) -> Result<Dib<'_>, SurfaceError>;
}

/// A surface backed by an in-memory bitmap in one fixed format.
///
/// Only unstretched transfers in exactly that format are accepted.
#[derive(Clone, Debug)]
pub struct MemorySurface {
    dib: Dib<'static>,
    /// 1-bit surface that reports no color table, like a monochrome device bitmap.
    monochrome: bool,
}

impl MemorySurface {
    /// A zero-filled surface. The header must be uncompressed.
    pub fn new(info: BitmapInfo) -> Result<Self, DibError> {
        info.header.validate(false)?;
        Ok(Self {
            dib: Dib::blank(info)?,
            monochrome: false,
        })
    }

    /// A bottom-up 1-bit surface without a color table: clear bits are black, set bits
    /// are white.
    pub fn monochrome(width: i32, height: i32) -> Result<Self, DibError> {
        let info = BitmapInfo::with_defaults(width, height, 1);
        Ok(Self {
            monochrome: true,
            ..Self::new(info)?
        })
    }

    /// Take over an existing uncompressed bitmap.
    pub fn from_dib(dib: Dib<'_>) -> Result<Self, DibError> {
        if dib.header().compression.is_rle() {
            return Err(DibError::InvalidParameter(
                "surface bitmaps must be uncompressed".into(),
            ));
        }
        Ok(Self {
            dib: dib.into_owned(),
            monochrome: false,
        })
    }

    pub fn dib(&self) -> &Dib<'static> {
        &self.dib
    }

    /// The format accepted by [`DibSurface::put_image`].
    pub fn format(&self) -> DibFormat {
        if self.monochrome {
            return DibFormat::indexed(1, ColorTable::default());
        }
        self.dib.info().format()
    }

    /// Raw pixel value at a device position.
    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        if x < 0 || y < 0 {
            return None;
        }
        self.dib.pixel(x as u32, y as u32)
    }

    /// Color at a device position.
    pub fn pixel_rgb(&self, x: i32, y: i32) -> Option<RGB8> {
        if x < 0 || y < 0 {
            return None;
        }
        self.dib.pixel_rgb(x as u32, y as u32)
    }

    /// Fill every pixel with the value closest to `color`.
    pub fn fill(&mut self, color: RGB8) -> Result<(), DibError> {
        let value = crate::convert::rgb_to_value(self.dib.info(), color)?;
        let header = *self.dib.header();
        let width = header.width as usize;
        let bits = self.dib.bits_mut();
        for y in 0..header.abs_height() as usize {
            let row = pixel::row_mut(&header, bits, y);
            for x in 0..width {
                pixel::put(row, x, header.bit_count, value);
            }
        }
        Ok(())
    }
}

impl DibSurface for MemorySurface {
    fn bounds(&self) -> Rect {
        self.dib.info().bounds()
    }

    fn put_image(
        &mut self,
        clip: Option<&Region>,
        info: &BitmapInfo,
        bits: &[u8],
        src: &BlitCoords,
        dst: &BlitCoords,
        rop: RasterOp,
    ) -> Result<(), SurfaceError> {
        let format = self.format();
        if !info.format().is_compatible(&format) {
            return Err(SurfaceError::BadFormat(format));
        }
        if src.width != dst.width || src.height != dst.height {
            return Err(SurfaceError::TransformUnsupported);
        }
        if bits.len() < info.header.image_size() {
            return Err(SurfaceError::Other(alloc::format!(
                "{} bytes of bits for a {}-byte image",
                bits.len(),
                info.header.image_size()
            )));
        }

        let Some(area) = dst.visrect.intersect(&self.bounds()) else {
            return Ok(());
        };
        let src_bounds = info.bounds();
        let dx = src.visrect.left.saturating_sub(dst.visrect.left);
        let dy = src.visrect.top.saturating_sub(dst.visrect.top);
        let rop = rop.without_flags();
        let mask = pixel::value_mask(format.bit_count);
        let header = *self.dib.header();
        let bpp = header.bit_count;
        let out = self.dib.bits_mut();

        for y in area.top..area.bottom {
            let sy = y.saturating_add(dy);
            if sy < src_bounds.top || sy >= src_bounds.bottom {
                continue;
            }
            let src_row = pixel::row(&info.header, bits, sy as usize);
            let dst_row = pixel::row_mut(&header, out, y as usize);
            for x in area.left..area.right {
                let sx = x.saturating_add(dx);
                if sx < src_bounds.left || sx >= src_bounds.right {
                    continue;
                }
                if clip.is_some_and(|c| !c.contains(x, y)) {
                    continue;
                }
                let s = pixel::get(src_row, sx as usize, bpp);
                let value = if rop == RasterOp::SRCCOPY {
                    s
                } else {
                    rop.apply(s, pixel::get(dst_row, x as usize, bpp))
                };
                pixel::put(dst_row, x as usize, bpp, value & mask);
            }
        }
        Ok(())
    }

    fn get_image(&self) -> Result<Dib<'_>, SurfaceError> {
        let mut info = self.dib.info().clone();
        if self.monochrome {
            info.colors = ColorInfo::Table(ColorTable::default());
            info.header.clr_used = 0;
        }
        Dib::from_slice(info, self.dib.bits()).map_err(|e| SurfaceError::Other(alloc::format!("{e}")))
    }
}

/// A surface's format with a single background entry for monochrome targets.
pub(crate) fn with_background(format: &DibFormat, background: RGB8) -> Option<DibFormat> {
    if format.bit_count == 1 && format.colors.table_len() == 0 && format.compression == Compression::Rgb {
        return Some(DibFormat::indexed(1, ColorTable::new(vec![background])));
    }
    None
}
