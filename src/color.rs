//! Color tables, bitfield masks and color-table resolution.
//!
//! A color table exists exactly when the depth is 8 bits or less. When a caller does
//! not supply one, a fixed default table for the depth is used: black/white for 1-bit,
//! the 16 VGA colors for 4-bit, and for 8-bit a 256-entry table made of the 20 static
//! system colors (first and last ten entries) around a regular 3-3-2 ramp.

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use rgb::RGB8;

use crate::error::DibError;
use crate::header::{BitmapHeader, Compression, HeaderVariant};

/// How the color table accompanying a bitmap is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ColorUsage {
    /// The table holds RGB values (4-byte quads, or 3-byte triples for core headers).
    #[default]
    Rgb,
    /// The table holds 16-bit indices into the current palette.
    PaletteColors,
    /// Pixels index the destination's own palette; only valid for 1-bit bitmaps.
    PaletteIndices,
}

/// The "current palette" collaborator consulted for [`ColorUsage::PaletteColors`].
///
/// Implementations return up to `count` entries starting at `start`, fewer when the
/// palette is smaller, possibly none.
pub trait PaletteSource {
    fn entries(&self, start: u32, count: u32) -> Vec<RGB8>;
}

impl PaletteSource for [RGB8] {
    fn entries(&self, start: u32, count: u32) -> Vec<RGB8> {
        let start = (start as usize).min(self.len());
        let end = start.saturating_add(count as usize).min(self.len());
        self[start..end].to_vec()
    }
}

impl PaletteSource for Vec<RGB8> {
    fn entries(&self, start: u32, count: u32) -> Vec<RGB8> {
        self.as_slice().entries(start, count)
    }
}

/// Ordered RGB entries indexed by pixel value. At most 256 entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorTable {
    entries: Vec<RGB8>,
}

impl ColorTable {
    pub fn new(entries: Vec<RGB8>) -> Self {
        let mut entries = entries;
        entries.truncate(256);
        Self { entries }
    }

    /// Default table for 1, 4 or 8-bit depths.
    pub fn default_for(bit_count: u16) -> Option<Self> {
        default_color_table(bit_count).map(|t| Self {
            entries: t.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RGB8] {
        &self.entries
    }

    /// Entry for a pixel value; out-of-range values read as black.
    pub fn get(&self, index: usize) -> RGB8 {
        self.entries.get(index).copied().unwrap_or_default()
    }

    /// Index of the closest entry by squared RGB distance; first match wins ties.
    pub fn nearest(&self, color: RGB8) -> u32 {
        let mut best = 0u32;
        let mut best_dist = u32::MAX;
        for (i, entry) in self.entries.iter().enumerate() {
            let dr = i32::from(entry.r) - i32::from(color.r);
            let dg = i32::from(entry.g) - i32::from(color.g);
            let db = i32::from(entry.b) - i32::from(color.b);
            let dist = (dr * dr + dg * dg + db * db) as u32;
            if dist < best_dist {
                best = i as u32;
                best_dist = dist;
                if dist == 0 {
                    break;
                }
            }
        }
        best
    }

    /// Serialize as 4-byte quads (blue, green, red, reserved).
    pub fn to_quads(&self) -> Vec<u8> {
        self.entries
            .iter()
            .flat_map(|c| [c.b, c.g, c.r, 0])
            .collect()
    }
}

/// Red, green and blue channel masks for 16/32-bit bitfield pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitfieldMasks {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
}

impl BitfieldMasks {
    /// 5-5-5 layout used by uncompressed 16-bit pixels.
    pub const RGB555: Self = Self {
        red: 0x7c00,
        green: 0x03e0,
        blue: 0x001f,
    };
    /// 8-8-8 layout used by uncompressed 24/32-bit pixels.
    pub const RGB888: Self = Self {
        red: 0x00ff_0000,
        green: 0x0000_ff00,
        blue: 0x0000_00ff,
    };

    /// Read three little-endian masks.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DibError> {
        if bytes.len() < 12 {
            return Err(DibError::BufferTooSmall {
                needed: 12,
                actual: bytes.len(),
            });
        }
        let read = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Ok(Self {
            red: read(0),
            green: read(4),
            blue: read(8),
        })
    }

    pub fn to_bytes(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&self.red.to_le_bytes());
        out[4..8].copy_from_slice(&self.green.to_le_bytes());
        out[8..12].copy_from_slice(&self.blue.to_le_bytes());
        out
    }

    /// Every mask must select at least one bit before pixels can be decoded.
    pub fn check(&self) -> Result<(), DibError> {
        if self.red == 0 || self.green == 0 || self.blue == 0 {
            return Err(DibError::InvalidBitfieldMask);
        }
        Ok(())
    }
}

/// Color information attached to a canonical bitmap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColorInfo {
    /// Indexed pixels (8 bits or less).
    Table(ColorTable),
    /// 16/32-bit pixels with explicit channel masks.
    Masks(BitfieldMasks),
    /// Direct pixels in the depth's default layout.
    Direct,
}

impl ColorInfo {
    pub fn table(&self) -> Option<&ColorTable> {
        match self {
            ColorInfo::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Number of color-table entries (0 for direct formats).
    pub fn table_len(&self) -> u32 {
        self.table().map_or(0, |t| t.len() as u32)
    }
}

/// Build the canonical color information for a normalized header.
///
/// `source_colors` starts where the color table (or the bitfield masks) of the caller's
/// bitmap starts. `None` means no table was supplied, in which case indexed depths get
/// the default table. Tables for depths of 8 bits or less always come back with
/// `2^depth` entries; entries past the declared count are black.
pub fn resolve(
    header: &BitmapHeader,
    variant: HeaderVariant,
    usage: ColorUsage,
    source_colors: Option<&[u8]>,
    palette: Option<&dyn PaletteSource>,
) -> Result<ColorInfo, DibError> {
    if header.compression == Compression::Bitfields {
        let masks = match source_colors {
            Some(bytes) => BitfieldMasks::from_bytes(bytes)?,
            None => BitfieldMasks {
                red: 0,
                green: 0,
                blue: 0,
            },
        };
        return Ok(ColorInfo::Masks(masks));
    }
    if header.bit_count > 8 {
        return Ok(ColorInfo::Direct);
    }

    let max_colors = header.max_colors() as usize;
    let colors = if header.clr_used == 0 || variant == HeaderVariant::Core {
        max_colors
    } else {
        (header.clr_used as usize).min(max_colors)
    };

    if usage == ColorUsage::PaletteIndices {
        return Ok(ColorInfo::Table(ColorTable::new(vec![
            RGB8::new(0, 0, 0),
            RGB8::new(0xff, 0xff, 0xff),
        ])));
    }

    let Some(bytes) = source_colors else {
        return match usage {
            ColorUsage::PaletteColors => from_palette(header, palette),
            _ => Ok(ColorInfo::Table(
                ColorTable::default_for(header.bit_count).unwrap_or_default(),
            )),
        };
    };

    let mut entries = vec![RGB8::default(); max_colors];
    match usage {
        ColorUsage::PaletteColors => {
            let indices = read_table(bytes, colors, 2)?;
            let palette = palette.ok_or_else(|| {
                DibError::InvalidParameter("palette colors requested without a palette".into())
            })?;
            let available = palette.entries(0, colors as u32);
            if available.is_empty() {
                return Err(DibError::InvalidParameter(
                    "palette lookup returned no entries".into(),
                ));
            }
            for (out, idx) in entries.iter_mut().zip(indices.chunks_exact(2)) {
                let idx = usize::from(u16::from_le_bytes([idx[0], idx[1]]));
                *out = available[idx % available.len()];
            }
        }
        _ if variant == HeaderVariant::Core => {
            let triples = read_table(bytes, colors, 3)?;
            for (out, t) in entries.iter_mut().zip(triples.chunks_exact(3)) {
                *out = RGB8::new(t[2], t[1], t[0]);
            }
        }
        _ => {
            let quads = read_table(bytes, colors, 4)?;
            for (out, q) in entries.iter_mut().zip(quads.chunks_exact(4)) {
                *out = RGB8::new(q[2], q[1], q[0]);
            }
        }
    }
    Ok(ColorInfo::Table(ColorTable::new(entries)))
}

fn read_table(bytes: &[u8], colors: usize, entry_size: usize) -> Result<&[u8], DibError> {
    let needed = colors * entry_size;
    bytes.get(..needed).ok_or(DibError::BufferTooSmall {
        needed,
        actual: bytes.len(),
    })
}

/// Table taken directly from the first `2^depth` palette entries.
pub(crate) fn from_palette(
    header: &BitmapHeader,
    palette: Option<&dyn PaletteSource>,
) -> Result<ColorInfo, DibError> {
    let max_colors = header.max_colors();
    let palette = palette.ok_or_else(|| {
        DibError::InvalidParameter(format!(
            "no palette to build a {}-bit color table from",
            header.bit_count
        ))
    })?;
    let mut entries = palette.entries(0, max_colors);
    entries.resize(max_colors as usize, RGB8::default());
    Ok(ColorInfo::Table(ColorTable::new(entries)))
}

const fn rgb(r: u8, g: u8, b: u8) -> RGB8 {
    RGB8 { r, g, b }
}

static DEFAULT_TABLE_1: [RGB8; 2] = [rgb(0, 0, 0), rgb(0xff, 0xff, 0xff)];

static DEFAULT_TABLE_4: [RGB8; 16] = [
    rgb(0x00, 0x00, 0x00),
    rgb(0x80, 0x00, 0x00),
    rgb(0x00, 0x80, 0x00),
    rgb(0x80, 0x80, 0x00),
    rgb(0x00, 0x00, 0x80),
    rgb(0x80, 0x00, 0x80),
    rgb(0x00, 0x80, 0x80),
    rgb(0x80, 0x80, 0x80),
    rgb(0xc0, 0xc0, 0xc0),
    rgb(0xff, 0x00, 0x00),
    rgb(0x00, 0xff, 0x00),
    rgb(0xff, 0xff, 0x00),
    rgb(0x00, 0x00, 0xff),
    rgb(0xff, 0x00, 0xff),
    rgb(0x00, 0xff, 0xff),
    rgb(0xff, 0xff, 0xff),
];

/// The first ten static system colors.
pub const SYSTEM_COLORS_LOW: [RGB8; 10] = [
    rgb(0x00, 0x00, 0x00),
    rgb(0x80, 0x00, 0x00),
    rgb(0x00, 0x80, 0x00),
    rgb(0x80, 0x80, 0x00),
    rgb(0x00, 0x00, 0x80),
    rgb(0x80, 0x00, 0x80),
    rgb(0x00, 0x80, 0x80),
    rgb(0xc0, 0xc0, 0xc0),
    rgb(0xc0, 0xdc, 0xc0),
    rgb(0xa6, 0xca, 0xf0),
];

/// The last ten static system colors.
pub const SYSTEM_COLORS_HIGH: [RGB8; 10] = [
    rgb(0xff, 0xfb, 0xf0),
    rgb(0xa0, 0xa0, 0xa4),
    rgb(0x80, 0x80, 0x80),
    rgb(0xff, 0x00, 0x00),
    rgb(0x00, 0xff, 0x00),
    rgb(0xff, 0xff, 0x00),
    rgb(0x00, 0x00, 0xff),
    rgb(0xff, 0x00, 0xff),
    rgb(0x00, 0xff, 0xff),
    rgb(0xff, 0xff, 0xff),
];

const fn build_table_8() -> [RGB8; 256] {
    let mut table = [rgb(0, 0, 0); 256];
    let mut i = 0;
    while i < 256 {
        table[i] = rgb(
            ((i & 7) * 0x20) as u8,
            (((i >> 3) & 7) * 0x20) as u8,
            ((i >> 6) * 0x40) as u8,
        );
        i += 1;
    }
    let mut j = 0;
    while j < 10 {
        table[j] = SYSTEM_COLORS_LOW[j];
        table[246 + j] = SYSTEM_COLORS_HIGH[j];
        j += 1;
    }
    table
}

static DEFAULT_TABLE_8: [RGB8; 256] = build_table_8();

/// The fixed default color table for a depth, if the depth is indexed.
pub fn default_color_table(bit_count: u16) -> Option<&'static [RGB8]> {
    match bit_count {
        1 => Some(&DEFAULT_TABLE_1),
        4 => Some(&DEFAULT_TABLE_4),
        8 => Some(&DEFAULT_TABLE_8),
        _ => None,
    }
}
