//! Bitmap header variants and normalization to one canonical header.
//!
//! Two wire layouts exist. The 12-byte core header (`BITMAPCOREHEADER`) carries
//! 16-bit width/height/planes/depth and implies uncompressed data. Every header whose
//! size field is 40 or more starts with the 40-byte info header (`BITMAPINFOHEADER`);
//! trailing fields of larger versions (V4, V5) are ignored.
//!
//! [`RawHeader::parse`] reads fields by offset and width, and [`normalize`] turns either
//! variant into a validated [`BitmapHeader`]. Nothing downstream looks at raw bytes again.

use alloc::format;
use alloc::string::ToString;

use crate::color::ColorUsage;
use crate::cursor::Cursor;
use crate::error::DibError;

/// Size field of the legacy core header.
pub const CORE_HEADER_SIZE: u32 = 12;
/// Size field of the canonical info header.
pub const INFO_HEADER_SIZE: u32 = 40;

/// Pixel data compression.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    /// Uncompressed; default channel layout for the depth.
    #[default]
    Rgb,
    /// 8-bit run-length encoding.
    Rle8,
    /// 4-bit run-length encoding.
    Rle4,
    /// Uncompressed 16/32-bit pixels described by three channel masks.
    Bitfields,
}

impl Compression {
    pub fn from_u32(num: u32) -> Option<Self> {
        match num {
            0 => Some(Self::Rgb),
            1 => Some(Self::Rle8),
            2 => Some(Self::Rle4),
            3 => Some(Self::Bitfields),
            _ => None,
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            Self::Rgb => 0,
            Self::Rle8 => 1,
            Self::Rle4 => 2,
            Self::Bitfields => 3,
        }
    }

    pub fn is_rle(self) -> bool {
        matches!(self, Self::Rle4 | Self::Rle8)
    }
}

/// Which of the two wire layouts a header was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderVariant {
    /// 12-byte core header; color tables are 3-byte triples.
    Core,
    /// 40-byte (or larger) info header; color tables are 4-byte quads.
    Info,
}

/// Fields of the 12-byte core header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoreHeader {
    pub width: u16,
    pub height: u16,
    pub planes: u16,
    pub bit_count: u16,
}

/// The first 40 bytes of an info header (or any larger extension).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InfoHeader {
    /// Declared header size; 40 or more.
    pub size: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    /// Raw compression code, not yet validated.
    pub compression: u32,
    pub size_image: u32,
    pub x_pels_per_meter: i32,
    pub y_pels_per_meter: i32,
    pub clr_used: u32,
    pub clr_important: u32,
}

/// A header as supplied by the caller, tagged by layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawHeader {
    Core(CoreHeader),
    Info(InfoHeader),
}

impl RawHeader {
    /// Parse a header from the start of `data`, dispatching on the size field.
    pub fn parse(data: &[u8]) -> Result<Self, DibError> {
        let mut cur = Cursor::new(data);
        let size = cur.read_u32_le()?;
        if size == CORE_HEADER_SIZE {
            return Ok(RawHeader::Core(CoreHeader {
                width: cur.read_u16_le()?,
                height: cur.read_u16_le()?,
                planes: cur.read_u16_le()?,
                bit_count: cur.read_u16_le()?,
            }));
        }
        if size < INFO_HEADER_SIZE {
            tracing::warn!(size, "unknown or wrong size for bitmap header");
            return Err(DibError::UnsupportedHeader(size));
        }
        Ok(RawHeader::Info(InfoHeader {
            size,
            width: cur.read_i32_le()?,
            height: cur.read_i32_le()?,
            planes: cur.read_u16_le()?,
            bit_count: cur.read_u16_le()?,
            compression: cur.read_u32_le()?,
            size_image: cur.read_u32_le()?,
            x_pels_per_meter: cur.read_i32_le()?,
            y_pels_per_meter: cur.read_i32_le()?,
            clr_used: cur.read_u32_le()?,
            clr_important: cur.read_u32_le()?,
        }))
    }

    pub fn variant(&self) -> HeaderVariant {
        match self {
            RawHeader::Core(_) => HeaderVariant::Core,
            RawHeader::Info(_) => HeaderVariant::Info,
        }
    }

    /// Declared size of the header in bytes; the color table starts here.
    pub fn declared_size(&self) -> u32 {
        match self {
            RawHeader::Core(_) => CORE_HEADER_SIZE,
            RawHeader::Info(info) => info.size,
        }
    }
}

/// Byte width of one scanline, padded to a 4-byte boundary.
pub fn dib_stride(width: u32, bit_count: u16) -> usize {
    let bits = u64::from(width) * u64::from(bit_count);
    (((bits + 31) >> 3) & !3) as usize
}

/// The canonical, validated bitmap header every other component works with.
///
/// Stride is never stored; it is always derived from `width` and `bit_count`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitmapHeader {
    pub width: i32,
    /// Positive: bottom-up rows. Negative: top-down rows.
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: Compression,
    /// Uncompressed: always recomputed. RLE: the compressed stream length.
    pub size_image: u32,
    pub x_pels_per_meter: i32,
    pub y_pels_per_meter: i32,
    /// Color table entries; 0 means the full default table for the depth.
    pub clr_used: u32,
    pub clr_important: u32,
}

impl BitmapHeader {
    /// An uncompressed header with the given geometry.
    pub fn new(width: i32, height: i32, bit_count: u16) -> Self {
        let mut header = Self {
            width,
            height,
            planes: 1,
            bit_count,
            compression: Compression::Rgb,
            size_image: 0,
            x_pels_per_meter: 0,
            y_pels_per_meter: 0,
            clr_used: 0,
            clr_important: 0,
        };
        header.size_image = header.stored_image_size();
        header
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        if !compression.is_rle() {
            self.size_image = self.stored_image_size();
        }
        self
    }

    pub fn abs_height(&self) -> u32 {
        self.height.unsigned_abs()
    }

    pub fn is_top_down(&self) -> bool {
        self.height < 0
    }

    pub fn stride(&self) -> usize {
        dib_stride(self.width.max(0) as u32, self.bit_count)
    }

    /// Uncompressed size of the pixel data.
    pub fn image_size(&self) -> usize {
        self.stride() * self.abs_height() as usize
    }

    /// [`image_size`](Self::image_size) as stored in `size_image`. Saturates at
    /// `u32::MAX` for geometry that [`validate`](Self::validate) rejects.
    pub fn stored_image_size(&self) -> u32 {
        u32::try_from(self.image_size()).unwrap_or(u32::MAX)
    }

    /// Largest color table this depth can index; 0 above 8 bits.
    pub fn max_colors(&self) -> u32 {
        if self.bit_count <= 8 {
            1 << self.bit_count
        } else {
            0
        }
    }

    /// Replace width and height (keeping orientation from `top_down`) and
    /// recompute the image size.
    pub(crate) fn resized(mut self, width: i32, height: i32, top_down: bool) -> Self {
        self.width = width;
        self.height = if top_down { -height } else { height };
        if !self.compression.is_rle() {
            self.size_image = self.stored_image_size();
        }
        self
    }

    /// Check the header describes a bitmap this crate can process.
    pub fn validate(&self, allow_compression: bool) -> Result<(), DibError> {
        if self.width <= 0 {
            return Err(invalid(format!("width {} must be positive", self.width)));
        }
        if self.height == 0 {
            return Err(invalid("height is zero".to_string()));
        }

        if allow_compression && self.compression.is_rle() {
            if self.height < 0 {
                return Err(invalid("RLE bitmaps must be bottom-up".to_string()));
            }
            if self.size_image == 0 {
                return Err(invalid("RLE bitmap without a stream length".to_string()));
            }
            let expected = if self.compression == Compression::Rle4 { 4 } else { 8 };
            if self.bit_count != expected {
                return Err(invalid(format!(
                    "{:?} requires {expected}-bit pixels, got {}",
                    self.compression, self.bit_count
                )));
            }
            return self.check_size();
        }

        if self.planes != 1 {
            return Err(invalid(format!("planes is {}, expected 1", self.planes)));
        }

        if self.bit_count == 0 {
            return Err(invalid("bit depth is zero".to_string()));
        }
        self.check_size()?;

        let ok = match self.bit_count {
            1 | 4 | 8 | 24 => self.compression == Compression::Rgb,
            16 | 32 => matches!(self.compression, Compression::Rgb | Compression::Bitfields),
            _ => false,
        };
        if !ok {
            return Err(invalid(format!(
                "{}-bit pixels cannot use {:?} compression",
                self.bit_count, self.compression
            )));
        }
        Ok(())
    }

    /// The uncompressed size must fit the 32-bit `size_image` field, whatever the
    /// compression. Expects a positive width and a nonzero depth.
    fn check_size(&self) -> Result<(), DibError> {
        if u32::MAX / u32::from(self.bit_count) < self.width as u32 {
            return Err(invalid(format!(
                "width {} overflows at {} bits per pixel",
                self.width, self.bit_count
            )));
        }
        let stride = self.stride() as u64;
        if u64::from(u32::MAX) / stride < u64::from(self.abs_height()) {
            return Err(invalid(format!(
                "image of {}x{} at {} bits per pixel overflows",
                self.width, self.height, self.bit_count
            )));
        }
        Ok(())
    }
}

fn invalid(msg: alloc::string::String) -> DibError {
    tracing::warn!(%msg, "rejected bitmap header");
    DibError::InvalidParameter(msg)
}

/// Normalize a caller-supplied header, allowing RLE compression.
pub fn normalize(raw: &RawHeader, usage: ColorUsage) -> Result<BitmapHeader, DibError> {
    normalize_with(raw, usage, true)
}

/// Normalize a caller-supplied header into the canonical form and validate it.
///
/// The image size is recomputed for uncompressed data and kept as-is for RLE data.
/// Palette-index usage is only valid for uncompressed 1-bit bitmaps.
pub fn normalize_with(
    raw: &RawHeader,
    usage: ColorUsage,
    allow_compression: bool,
) -> Result<BitmapHeader, DibError> {
    let mut header = match *raw {
        RawHeader::Core(core) => BitmapHeader {
            width: i32::from(core.width),
            height: i32::from(core.height),
            planes: core.planes,
            bit_count: core.bit_count,
            compression: Compression::Rgb,
            size_image: 0,
            x_pels_per_meter: 0,
            y_pels_per_meter: 0,
            clr_used: 0,
            clr_important: 0,
        },
        RawHeader::Info(info) => BitmapHeader {
            width: info.width,
            height: info.height,
            planes: info.planes,
            bit_count: info.bit_count,
            compression: Compression::from_u32(info.compression).ok_or_else(|| {
                invalid(format!("unsupported compression {}", info.compression))
            })?,
            size_image: info.size_image,
            x_pels_per_meter: info.x_pels_per_meter,
            y_pels_per_meter: info.y_pels_per_meter,
            clr_used: info.clr_used,
            clr_important: info.clr_important,
        },
    };

    header.validate(allow_compression)?;

    if usage == ColorUsage::PaletteIndices
        && (header.bit_count != 1 || header.compression != Compression::Rgb)
    {
        return Err(invalid(
            "palette indices are only valid for uncompressed 1-bit bitmaps".to_string(),
        ));
    }

    if !header.compression.is_rle() {
        header.size_image = header.stored_image_size();
    }
    Ok(header)
}
