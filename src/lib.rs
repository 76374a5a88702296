//! # zendib
//!
//! Device-independent bitmap (DIB) handling: header normalization, color table
//! resolution, RLE4/RLE8 decoding, pixel format conversion and blitting onto
//! device surfaces.
//!
//! ## Pipeline
//!
//! - **Normalize**: a 12-byte core header or a 40-byte (or larger) info header is
//!   parsed once into a canonical [`BitmapHeader`] and validated.
//! - **Resolve colors**: depths of 8 bits or less get a full `2^depth` color table,
//!   taken from the caller's table, the current palette ([`ColorUsage::PaletteColors`])
//!   or the default table. BITFIELDS bitmaps get their channel masks.
//! - **Decode**: RLE streams are expanded into planar bits. Malformed streams are
//!   decoded best-effort, never rejected.
//! - **Convert**: any canonical bitmap can be converted to another depth, color table,
//!   channel layout or orientation.
//! - **Blit**: [`StretchRequest`] and [`set_dib_bits_to_device`] clip source and
//!   destination against each other and write to a [`DibSurface`], converting or
//!   stretching when the surface asks for it. [`get_dib_bits`] reads back.
//!
//! ## Zero-Copy Loading
//!
//! Uncompressed bits are borrowed from the input buffer; only RLE decoding and
//! conversion allocate.
//!
//! ## Non-Goals
//!
//! - JPEG or PNG payloads inside a DIB
//! - Writing RLE streams
//! - Alpha blending and color management
//!
//! ## Usage
//!
//! ```
//! use zendib::{DibFormat, DibRequest, Unstoppable};
//!
//! // 2x1 RLE8 bitmap: a run of two pixels of color 1, then end of bitmap.
//! let mut packed = Vec::new();
//! packed.extend_from_slice(&40u32.to_le_bytes());
//! packed.extend_from_slice(&2i32.to_le_bytes());
//! packed.extend_from_slice(&1i32.to_le_bytes());
//! packed.extend_from_slice(&1u16.to_le_bytes());
//! packed.extend_from_slice(&8u16.to_le_bytes());
//! packed.extend_from_slice(&1u32.to_le_bytes()); // RLE8
//! packed.extend_from_slice(&4u32.to_le_bytes()); // stream length
//! packed.extend_from_slice(&[0u8; 16]);
//! packed.extend_from_slice(&[0u8; 256 * 4]); // color table
//! packed[40 + 4..40 + 8].copy_from_slice(&[0xff, 0, 0, 0]); // entry 1: blue
//! packed.extend_from_slice(&[2, 1, 0, 1]);
//!
//! let dib = DibRequest::new(&packed).decode(&Unstoppable)?;
//! assert_eq!(dib.pixel(1, 0), Some(1));
//!
//! let rgb = dib.convert_to(&DibFormat::direct(24), true, &Unstoppable)?;
//! assert_eq!(&rgb.bits()[..3], &[0xff, 0, 0]);
//! # Ok::<(), zendib::DibError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

mod cursor;
mod error;
mod limits;
mod pixel;

pub mod blit;
pub mod color;
pub mod convert;
pub mod dib;
pub mod header;
pub mod readback;
pub mod region;
pub mod rle;
pub mod stretch;
pub mod surface;

mod encode;

// Re-exports
pub use blit::{SetBitsRequest, StretchRequest, set_dib_bits_to_device};
pub use color::{
    BitfieldMasks, ColorInfo, ColorTable, ColorUsage, PaletteSource, default_color_table, resolve,
};
pub use convert::convert;
pub use dib::{BitmapInfo, Dib, DibFormat, DibRequest, bitmap_info_size};
pub use encode::encode_bmp;
pub use enough::{Stop, StopReason, Unstoppable};
pub use error::DibError;
pub use header::{BitmapHeader, Compression, HeaderVariant, RawHeader, dib_stride, normalize, normalize_with};
pub use limits::Limits;
pub use readback::{DibBits, get_dib_bits};
pub use region::{Rect, Region};
pub use stretch::{NearestStretcher, StretchMode, Stretcher};
pub use surface::{BlitCoords, DibSurface, MemorySurface, RasterOp, SurfaceError};
