//! RLE4/RLE8 stream decoding into planar bits.
//!
//! Decoding is best-effort: a stream that ends early, or whose escape operands or
//! literal runs do not fit in the remaining bytes, stops at the last complete
//! command and the pixels written so far are returned as success. Runs and literals
//! never write past the row width.

use alloc::vec::Vec;

use enough::Stop;

use crate::error::{DibError, alloc_zeroed};
use crate::header::{BitmapHeader, Compression};
use crate::region::{Rect, Region};

const ESCAPE_END_OF_LINE: u8 = 0;
const ESCAPE_END_OF_BITMAP: u8 = 1;
const ESCAPE_DELTA: u8 = 2;

/// Cursor and output state while walking the stream.
struct RleState<'a> {
    out: &'a mut [u8],
    stride: usize,
    height: i32,
    width: i32,
    bpp: u16,
    x: i32,
    /// Top-down row; starts at the bottom of the image.
    y: i32,
    left: i32,
    right: i32,
    clip: Option<Region>,
}

impl RleState<'_> {
    /// Byte offset of the current cursor; rows are stored bottom-up.
    fn offset(&self) -> usize {
        (self.height - self.y - 1) as usize * self.stride + (self.x as usize * usize::from(self.bpp)) / 8
    }

    /// Record the span written on the current row.
    fn flush_span(&mut self) {
        if let Some(clip) = self.clip.as_mut() {
            clip.union_rect(Rect::new(self.left, self.y, self.right, self.y + 1));
        }
    }

    fn run(&mut self, count: u8, value: u8) {
        let mut num = i32::from(count).min(self.width - self.x);
        if num > 0 {
            let mut at = self.offset();
            if self.bpp == 8 {
                self.out[at..at + num as usize].fill(value);
            } else {
                let mut v = value;
                if self.x & 1 != 0 {
                    // Alternate starting from the low nibble of the current byte.
                    v = v.rotate_left(4);
                    self.out[at] = (self.out[at] & 0xf0) | (v & 0x0f);
                    at += 1;
                    self.x += 1;
                    num -= 1;
                }
                // An odd count writes one spare nibble past the run.
                let bytes = (num as usize).div_ceil(2);
                self.out[at..at + bytes].fill(v);
            }
        }
        self.x += num.max(0);
        self.right = self.x;
    }

    fn literal(&mut self, count: u8, src: &[u8]) {
        let mut num = i32::from(count).min(self.width - self.x);
        if num > 0 {
            let mut at = self.offset();
            if self.bpp == 8 {
                self.out[at..at + num as usize].copy_from_slice(&src[..num as usize]);
            } else if self.x & 1 != 0 {
                let mut idx = 0;
                while num > 0 {
                    let byte = src.get(idx).copied().unwrap_or(0);
                    if self.x & 1 != 0 {
                        self.out[at] = (self.out[at] & 0xf0) | (byte >> 4);
                        at += 1;
                    } else {
                        self.out[at] = byte << 4;
                        idx += 1;
                    }
                    self.x += 1;
                    num -= 1;
                }
            } else {
                let bytes = (num as usize).div_ceil(2);
                self.out[at..at + bytes].copy_from_slice(&src[..bytes]);
            }
        }
        self.x += num.max(0);
        self.right = self.x;
    }
}

/// Decode an RLE4 or RLE8 stream into a zeroed, full-size uncompressed buffer.
///
/// At most `header.size_image` bytes of `data` are consumed. When `want_clip` is set,
/// the returned region holds every span the stream wrote, in top-down coordinates.
pub fn decode(
    header: &BitmapHeader,
    data: &[u8],
    want_clip: bool,
    stop: &dyn Stop,
) -> Result<(Vec<u8>, Option<Region>), DibError> {
    let bpp = match header.compression {
        Compression::Rle8 => 8,
        Compression::Rle4 => 4,
        other => {
            return Err(DibError::InvalidParameter(alloc::format!(
                "{other:?} is not a run-length compression"
            )));
        }
    };
    if header.bit_count != bpp || header.width <= 0 || header.height <= 0 {
        return Err(DibError::InvalidParameter(alloc::format!(
            "RLE bitmap must be bottom-up with {bpp}-bit pixels"
        )));
    }

    let planar = header.with_compression(Compression::Rgb);
    let mut out = alloc_zeroed(planar.image_size())?;
    let len = (header.size_image as usize).min(data.len());
    let mut st = RleState {
        stride: planar.stride(),
        height: header.height,
        width: header.width,
        bpp,
        x: 0,
        y: header.height - 1,
        left: 0,
        right: 0,
        clip: want_clip.then(Region::new),
        out: &mut out,
    };

    let result = st.walk(data, len, stop);
    st.flush_span();
    let clip = st.clip.take();
    result?;
    Ok((out, clip))
}

impl RleState<'_> {
    /// Process commands until the stream ends, terminates itself or runs short.
    fn walk(&mut self, data: &[u8], len: usize, stop: &dyn Stop) -> Result<(), DibError> {
        let mut i = 0usize;
        let mut ops = 0u32;
        while i + 1 < len {
            ops = ops.wrapping_add(1);
            if ops % 1024 == 0 {
                stop.check()?;
            }
            let num = data[i];
            let code = data[i + 1];
            i += 2;

            if num != 0 {
                self.run(num, code);
                continue;
            }

            match code {
                ESCAPE_END_OF_LINE => {
                    self.flush_span();
                    self.x = 0;
                    self.left = 0;
                    self.right = 0;
                    self.y -= 1;
                    if self.y < 0 {
                        return Ok(());
                    }
                }
                ESCAPE_END_OF_BITMAP => {
                    self.flush_span();
                    return Ok(());
                }
                ESCAPE_DELTA => {
                    self.flush_span();
                    if i + 1 >= len {
                        tracing::trace!(offset = i, "RLE delta operands missing");
                        return Ok(());
                    }
                    self.x = (self.x + i32::from(data[i])).min(self.width);
                    self.left = self.x;
                    self.right = self.x;
                    self.y -= i32::from(data[i + 1]);
                    if self.y < 0 {
                        return Ok(());
                    }
                    i += 2;
                }
                count => {
                    let skip = (usize::from(count) * usize::from(self.bpp)).div_ceil(8);
                    if skip > len - i {
                        tracing::trace!(offset = i, count, "RLE literal run truncated");
                        return Ok(());
                    }
                    self.literal(count, &data[i..i + skip]);
                    i += (skip + 1) & !1;
                }
            }
        }
        Ok(())
    }
}
