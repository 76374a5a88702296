//! Canonical bitmaps and the packed-DIB loader.
//!
//! A [`Dib`] is a validated [`BitmapHeader`], its resolved [`ColorInfo`] and the pixel
//! bits. Bits may be borrowed from the caller's buffer (uncompressed data is never
//! copied on load) or owned (after RLE decoding or conversion).

use alloc::borrow::Cow;
use alloc::vec::Vec;

use enough::Stop;

use crate::color::{self, BitfieldMasks, ColorInfo, ColorTable, ColorUsage, PaletteSource};
use crate::cursor::Cursor;
use crate::error::DibError;
use crate::header::{self, BitmapHeader, Compression, HeaderVariant, RawHeader, INFO_HEADER_SIZE};
use crate::limits::Limits;
use crate::pixel;
use crate::region::{Rect, Region};

/// Size of the `BM` file header preceding a packed DIB in a `.bmp` file.
pub const FILE_HEADER_SIZE: usize = 14;

/// Pixel format of a bitmap, independent of its dimensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DibFormat {
    pub bit_count: u16,
    pub compression: Compression,
    pub colors: ColorInfo,
}

impl DibFormat {
    /// Indexed format with the given table.
    pub fn indexed(bit_count: u16, table: ColorTable) -> Self {
        Self {
            bit_count,
            compression: Compression::Rgb,
            colors: ColorInfo::Table(table),
        }
    }

    /// Direct format in the depth's default channel layout.
    pub fn direct(bit_count: u16) -> Self {
        Self {
            bit_count,
            compression: Compression::Rgb,
            colors: ColorInfo::Direct,
        }
    }

    /// 16 or 32-bit format with explicit masks.
    pub fn bitfields(bit_count: u16, masks: BitfieldMasks) -> Self {
        Self {
            bit_count,
            compression: Compression::Bitfields,
            colors: ColorInfo::Masks(masks),
        }
    }

    /// Channel masks actually used to read a 16/32-bit pixel.
    pub fn effective_masks(&self) -> Option<BitfieldMasks> {
        match (&self.colors, self.bit_count) {
            (ColorInfo::Masks(m), 16 | 32) => Some(*m),
            (_, 16) => Some(BitfieldMasks::RGB555),
            (_, 32) => Some(BitfieldMasks::RGB888),
            _ => None,
        }
    }

    /// Whether pixel values of the two formats mean the same colors.
    pub fn is_compatible(&self, other: &DibFormat) -> bool {
        if self.bit_count != other.bit_count
            || self.compression.is_rle()
            || other.compression.is_rle()
        {
            return false;
        }
        match self.bit_count {
            1 | 4 | 8 => self.colors.table() == other.colors.table(),
            16 | 32 => self.effective_masks() == other.effective_masks(),
            _ => true,
        }
    }
}

/// A canonical header together with its resolved color information.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitmapInfo {
    pub header: BitmapHeader,
    pub colors: ColorInfo,
}

impl BitmapInfo {
    pub fn new(header: BitmapHeader, colors: ColorInfo) -> Self {
        Self { header, colors }
    }

    /// Uncompressed bitmap with the default color info for its depth.
    pub fn with_defaults(width: i32, height: i32, bit_count: u16) -> Self {
        let colors = match ColorTable::default_for(bit_count) {
            Some(table) => ColorInfo::Table(table),
            None => ColorInfo::Direct,
        };
        Self::new(BitmapHeader::new(width, height, bit_count), colors)
    }

    pub fn format(&self) -> DibFormat {
        DibFormat {
            bit_count: self.header.bit_count,
            compression: self.header.compression,
            colors: self.colors.clone(),
        }
    }

    /// Same dimensions and orientation, different pixel format.
    pub fn with_format(&self, format: &DibFormat) -> Self {
        let mut header = self.header;
        header.bit_count = format.bit_count;
        header.compression = format.compression;
        header.clr_used = format.colors.table_len();
        header.clr_important = 0;
        header.size_image = header.stored_image_size();
        Self::new(header, format.colors.clone())
    }

    /// Same format, new size. `top_down` selects the orientation.
    pub fn resized(&self, width: i32, height: i32, top_down: bool) -> Self {
        Self::new(self.header.resized(width, height, top_down), self.colors.clone())
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.header.width, self.header.abs_height() as i32)
    }
}

/// A canonical bitmap: header, color information and pixel bits.
#[derive(Clone, Debug)]
pub struct Dib<'a> {
    info: BitmapInfo,
    bits: Cow<'a, [u8]>,
}

impl<'a> Dib<'a> {
    /// Wrap owned bits. Uncompressed data must hold at least one full image.
    pub fn new(info: BitmapInfo, bits: Vec<u8>) -> Result<Dib<'static>, DibError> {
        check_bits_len(&info.header, bits.len())?;
        Ok(Dib {
            info,
            bits: Cow::Owned(bits),
        })
    }

    /// Borrow bits without copying.
    pub fn from_slice(info: BitmapInfo, bits: &'a [u8]) -> Result<Self, DibError> {
        check_bits_len(&info.header, bits.len())?;
        Ok(Self {
            info,
            bits: Cow::Borrowed(bits),
        })
    }

    /// A zero-filled bitmap.
    pub fn blank(info: BitmapInfo) -> Result<Dib<'static>, DibError> {
        let bits = crate::error::alloc_zeroed(info.header.image_size())?;
        Ok(Dib {
            info,
            bits: Cow::Owned(bits),
        })
    }

    pub fn info(&self) -> &BitmapInfo {
        &self.info
    }

    pub fn header(&self) -> &BitmapHeader {
        &self.info.header
    }

    pub fn colors(&self) -> &ColorInfo {
        &self.info.colors
    }

    pub fn width(&self) -> u32 {
        self.info.header.width as u32
    }

    pub fn height(&self) -> u32 {
        self.info.header.abs_height()
    }

    /// The pixel bits, or the compressed stream for RLE bitmaps.
    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn bits_mut(&mut self) -> &mut [u8] {
        self.bits.to_mut()
    }

    /// Whether the bits are borrowed from the loader's input.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.bits, Cow::Borrowed(_))
    }

    /// Take ownership of the bits (copies if borrowed).
    pub fn into_owned(self) -> Dib<'static> {
        Dib {
            info: self.info,
            bits: Cow::Owned(self.bits.into_owned()),
        }
    }

    /// Decode an RLE bitmap into planar bits. Uncompressed bitmaps pass through.
    pub fn decompress(self, stop: &dyn Stop) -> Result<Self, DibError> {
        Ok(self.decompress_with_clip(false, stop)?.0)
    }

    /// Decode an RLE bitmap, optionally tracking which spans the stream wrote.
    pub fn decompress_with_clip(
        self,
        want_clip: bool,
        stop: &dyn Stop,
    ) -> Result<(Self, Option<Region>), DibError> {
        if !self.info.header.compression.is_rle() {
            return Ok((self, None));
        }
        let (bits, clip) = crate::rle::decode(&self.info.header, &self.bits, want_clip, stop)?;
        let header = self.info.header.with_compression(Compression::Rgb);
        Ok((
            Self {
                info: BitmapInfo::new(header, self.info.colors),
                bits: Cow::Owned(bits),
            },
            clip,
        ))
    }

    /// Raw pixel value at `(x, y)` in top-down coordinates.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        let header = &self.info.header;
        if header.compression.is_rle() || x >= self.width() || y >= self.height() {
            return None;
        }
        let row = pixel::row(header, &self.bits, y as usize);
        Some(pixel::get(row, x as usize, header.bit_count))
    }

    /// Color at `(x, y)` in top-down coordinates.
    pub fn pixel_rgb(&self, x: u32, y: u32) -> Option<rgb::RGB8> {
        let value = self.pixel(x, y)?;
        crate::convert::value_to_rgb(&self.info, value).ok()
    }

    /// Convert the whole bitmap to another format and orientation.
    pub fn convert_to(
        &self,
        format: &DibFormat,
        top_down: bool,
        stop: &dyn Stop,
    ) -> Result<Dib<'static>, DibError> {
        let height = self.height() as i32;
        let dst = self
            .info
            .with_format(format)
            .resized(self.info.header.width, height, top_down);
        let bits = crate::convert::convert(&self.info, &self.bits, self.info.bounds(), &dst, stop)?;
        Ok(Dib {
            info: dst,
            bits: Cow::Owned(bits),
        })
    }

    /// Convert to top-down opaque RGBA.
    #[cfg(feature = "imgref")]
    pub fn to_rgba8(&self) -> Result<imgref::ImgVec<rgb::RGBA8>, DibError> {
        let bgrx = self.convert_to(&DibFormat::direct(32), true, &enough::Unstoppable)?;
        let pixels = bgrx
            .bits()
            .chunks_exact(4)
            .map(|p| rgb::RGBA8::new(p[2], p[1], p[0], 255))
            .collect();
        Ok(imgref::ImgVec::new(
            pixels,
            self.width() as usize,
            self.height() as usize,
        ))
    }
}

fn check_bits_len(header: &BitmapHeader, len: usize) -> Result<(), DibError> {
    if header.compression.is_rle() {
        return Ok(());
    }
    let needed = header.image_size();
    if len < needed {
        return Err(DibError::BufferTooSmall {
            needed,
            actual: len,
        });
    }
    Ok(())
}

/// Offset from the start of a packed DIB to its pixel data.
pub fn bitmap_info_size(raw: &RawHeader, usage: ColorUsage) -> usize {
    match raw {
        RawHeader::Core(core) => {
            let colors = if core.bit_count <= 8 {
                1usize << core.bit_count
            } else {
                0
            };
            let entry = if usage == ColorUsage::Rgb { 3 } else { 2 };
            header::CORE_HEADER_SIZE as usize + colors * entry
        }
        RawHeader::Info(info) => {
            let masks = if info.compression == Compression::Bitfields.to_u32() {
                3
            } else {
                0
            };
            let colors = if info.clr_used != 0 {
                info.clr_used.min(256) as usize
            } else if info.bit_count <= 8 {
                1usize << info.bit_count
            } else {
                0
            };
            let entry = if usage == ColorUsage::Rgb { 4 } else { 2 };
            (info.size as usize).max(INFO_HEADER_SIZE as usize + masks * 4) + colors * entry
        }
    }
}

/// Loads a packed DIB (header, color table, bits) or a `.bmp` file.
///
/// ```
/// use zendib::{DibRequest, Unstoppable};
///
/// let mut packed = Vec::new();
/// packed.extend_from_slice(&40u32.to_le_bytes());
/// packed.extend_from_slice(&2i32.to_le_bytes()); // width
/// packed.extend_from_slice(&(-1i32).to_le_bytes()); // top-down, one row
/// packed.extend_from_slice(&1u16.to_le_bytes());
/// packed.extend_from_slice(&24u16.to_le_bytes());
/// packed.extend_from_slice(&[0u8; 24]);
/// packed.extend_from_slice(&[0, 0, 0xff, 0xff, 0, 0, 0, 0]);
///
/// let dib = DibRequest::new(&packed).load(&Unstoppable)?;
/// assert_eq!(dib.pixel_rgb(0, 0), Some(rgb::RGB8::new(0xff, 0, 0)));
/// assert!(dib.is_borrowed());
/// # Ok::<(), zendib::DibError>(())
/// ```
pub struct DibRequest<'a> {
    data: &'a [u8],
    bits_offset: Option<usize>,
    usage: ColorUsage,
    palette: Option<&'a dyn PaletteSource>,
    limits: Option<&'a Limits>,
}

impl<'a> DibRequest<'a> {
    /// A packed DIB: the header starts at offset 0.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bits_offset: None,
            usage: ColorUsage::Rgb,
            palette: None,
            limits: None,
        }
    }

    /// A `.bmp` file: a 14-byte `BM` header followed by a packed DIB.
    pub fn from_bmp_file(data: &'a [u8]) -> Result<Self, DibError> {
        let mut cur = Cursor::new(data);
        if cur.read_fixed_bytes::<2>()? != *b"BM" {
            return Err(DibError::InvalidParameter("missing BM signature".into()));
        }
        let _file_size = cur.read_u32_le()?;
        cur.skip(4)?;
        let off_bits = cur.read_u32_le()? as usize;
        debug_assert_eq!(cur.position(), FILE_HEADER_SIZE);
        let bits_offset = match off_bits {
            0 => None,
            off => Some(off.checked_sub(FILE_HEADER_SIZE).ok_or_else(|| {
                DibError::InvalidParameter(alloc::format!("pixel data offset {off} inside file header"))
            })?),
        };
        Ok(Self {
            data: &data[FILE_HEADER_SIZE..],
            bits_offset,
            ..Self::new(data)
        })
    }

    pub fn with_usage(mut self, usage: ColorUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Current palette consulted for [`ColorUsage::PaletteColors`].
    pub fn with_palette(mut self, palette: &'a dyn PaletteSource) -> Self {
        self.palette = Some(palette);
        self
    }

    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Parse and normalize the header and color table without touching the bits.
    pub fn info(&self) -> Result<BitmapInfo, DibError> {
        Ok(self.parse()?.0)
    }

    fn parse(&self) -> Result<(BitmapInfo, usize), DibError> {
        let raw = RawHeader::parse(self.data)?;
        let header = header::normalize(&raw, self.usage)?;
        if let Some(limits) = self.limits {
            limits.check_header(&header)?;
        }

        let variant = raw.variant();
        let table_offset = match (variant, header.compression) {
            (HeaderVariant::Info, Compression::Bitfields) => INFO_HEADER_SIZE as usize,
            _ => raw.declared_size() as usize,
        };
        let has_table = header.bit_count <= 8 || header.compression == Compression::Bitfields;
        let source_colors = if has_table {
            Some(self.data.get(table_offset..).unwrap_or(&[]))
        } else {
            None
        };
        let colors = color::resolve(&header, variant, self.usage, source_colors, self.palette)?;

        let bits_offset = self
            .bits_offset
            .unwrap_or_else(|| bitmap_info_size(&raw, self.usage));
        Ok((BitmapInfo::new(header, colors), bits_offset))
    }

    /// Load the bitmap. Uncompressed bits are borrowed; RLE streams are kept
    /// compressed (see [`Dib::decompress`]).
    pub fn load(self, stop: &dyn Stop) -> Result<Dib<'a>, DibError> {
        stop.check()?;
        let (info, offset) = self.parse()?;
        let available = self.data.get(offset..).unwrap_or(&[]);
        if info.header.compression.is_rle() {
            let len = (info.header.size_image as usize).min(available.len());
            if len < info.header.size_image as usize {
                tracing::debug!(
                    declared = info.header.size_image,
                    available = len,
                    "RLE stream shorter than declared"
                );
            }
            return Ok(Dib {
                info,
                bits: Cow::Borrowed(&available[..len]),
            });
        }
        let needed = info.header.image_size();
        let bits = available.get(..needed).ok_or(DibError::BufferTooSmall {
            needed,
            actual: available.len(),
        })?;
        Ok(Dib {
            info,
            bits: Cow::Borrowed(bits),
        })
    }

    /// Load and decode to planar bits.
    pub fn decode(self, stop: &dyn Stop) -> Result<Dib<'a>, DibError> {
        self.load(stop)?.decompress(stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use enough::Unstoppable;
    use rgb::RGB8;

    fn info_header(width: i32, height: i32, bpp: u16, compression: u32, size_image: u32, clr_used: u32) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&40u32.to_le_bytes());
        v.extend_from_slice(&width.to_le_bytes());
        v.extend_from_slice(&height.to_le_bytes());
        v.extend_from_slice(&1u16.to_le_bytes());
        v.extend_from_slice(&bpp.to_le_bytes());
        v.extend_from_slice(&compression.to_le_bytes());
        v.extend_from_slice(&size_image.to_le_bytes());
        v.extend_from_slice(&[0u8; 8]);
        v.extend_from_slice(&clr_used.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes());
        v
    }

    #[test]
    fn info_size_counts_masks_and_colors() {
        let raw = RawHeader::parse(&info_header(1, 1, 8, 0, 0, 3)).unwrap();
        assert_eq!(bitmap_info_size(&raw, ColorUsage::Rgb), 40 + 12);
        assert_eq!(bitmap_info_size(&raw, ColorUsage::PaletteColors), 40 + 6);
        let raw = RawHeader::parse(&info_header(1, 1, 32, 3, 0, 0)).unwrap();
        assert_eq!(bitmap_info_size(&raw, ColorUsage::Rgb), 52);
    }

    #[test]
    fn loads_indexed_bitmap_with_short_table() {
        let mut data = info_header(2, 2, 8, 0, 0, 2);
        data.extend_from_slice(&[0, 0, 0xff, 0, 0xff, 0, 0, 0]); // red, blue
        data.extend_from_slice(&[1, 0, 0, 0, 0, 1, 0, 0]); // bottom row, top row
        let dib = DibRequest::new(&data).load(&Unstoppable).unwrap();
        assert!(dib.is_borrowed());
        assert_eq!(dib.colors().table_len(), 256);
        assert_eq!(dib.pixel(0, 0), Some(0));
        assert_eq!(dib.pixel(1, 0), Some(1));
        assert_eq!(dib.pixel_rgb(1, 0), Some(RGB8::new(0, 0, 0xff)));
        assert_eq!(dib.pixel_rgb(0, 1), Some(RGB8::new(0, 0, 0xff)));
    }

    #[test]
    fn short_pixel_data_is_rejected() {
        let mut data = info_header(4, 4, 24, 0, 0, 0);
        data.extend_from_slice(&[0u8; 47]);
        assert!(matches!(
            DibRequest::new(&data).load(&Unstoppable),
            Err(DibError::BufferTooSmall { needed: 48, actual: 47 })
        ));
    }

    #[test]
    fn rle_stream_is_clamped_to_available_bytes() {
        let mut data = info_header(4, 1, 8, 1, 100, 0);
        data.extend_from_slice(&[0u8; 1024]);
        data.extend_from_slice(&[2, 1, 0, 1]);
        let dib = DibRequest::new(&data).load(&Unstoppable).unwrap();
        assert_eq!(dib.bits().len(), 4);
        let dib = dib.decompress(&Unstoppable).unwrap();
        assert_eq!(dib.header().compression, Compression::Rgb);
        assert_eq!(dib.header().size_image, 4);
        assert_eq!(&dib.bits()[..4], &[1, 1, 0, 0]);
    }

    #[test]
    fn bmp_file_uses_pixel_offset() {
        let mut dib = info_header(1, 1, 24, 0, 0, 0);
        dib.extend_from_slice(&[0xaa; 6]); // gap before pixels
        dib.extend_from_slice(&[0x10, 0x20, 0x30, 0]);
        let mut file = vec![b'B', b'M'];
        file.extend_from_slice(&((14 + dib.len()) as u32).to_le_bytes());
        file.extend_from_slice(&[0u8; 4]);
        file.extend_from_slice(&(14u32 + 46).to_le_bytes());
        file.extend_from_slice(&dib);
        let loaded = DibRequest::from_bmp_file(&file)
            .unwrap()
            .load(&Unstoppable)
            .unwrap();
        assert_eq!(loaded.pixel_rgb(0, 0), Some(RGB8::new(0x30, 0x20, 0x10)));
    }

    #[test]
    fn limits_reject_large_headers() {
        let data = info_header(5000, 5000, 32, 0, 0, 0);
        let limits = Limits {
            max_pixels: Some(1_000_000),
            ..Default::default()
        };
        assert!(matches!(
            DibRequest::new(&data).with_limits(&limits).info(),
            Err(DibError::LimitExceeded(_))
        ));
    }

    #[test]
    fn compatible_formats() {
        let a = DibFormat::direct(32);
        let b = DibFormat::bitfields(32, BitfieldMasks::RGB888);
        assert!(a.is_compatible(&b));
        assert!(!a.is_compatible(&DibFormat::bitfields(32, BitfieldMasks::RGB555)));
        let t1 = DibFormat::indexed(8, ColorTable::default_for(8).unwrap());
        let t2 = DibFormat::indexed(8, ColorTable::new(vec![RGB8::default(); 256]));
        assert!(!t1.is_compatible(&t2));
    }

    #[cfg(feature = "imgref")]
    #[test]
    fn rgba_export_is_top_down() {
        // Bottom-up: the stored first row is the bottom one.
        let dib = Dib::new(BitmapInfo::with_defaults(1, 2, 1), vec![0x80, 0, 0, 0, 0, 0, 0, 0])
            .unwrap();
        let img = dib.to_rgba8().unwrap();
        assert_eq!((img.width(), img.height()), (1, 2));
        assert_eq!(img.buf()[0], rgb::RGBA8::new(0, 0, 0, 255));
        assert_eq!(img.buf()[1], rgb::RGBA8::new(0xff, 0xff, 0xff, 255));
    }
}
