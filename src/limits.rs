use alloc::format;

use crate::error::DibError;
use crate::header::BitmapHeader;

/// Caps applied to a header before any pixel buffer is allocated for it.
///
/// Every field defaults to `None`, meaning unbounded. The memory cap is measured
/// against the uncompressed image size, so it also bounds RLE decoding.
#[derive(Clone, Debug, Default)]
pub struct Limits {
    pub max_width: Option<u64>,
    pub max_height: Option<u64>,
    /// Width times absolute height.
    pub max_pixels: Option<u64>,
    /// Size of the planar pixel buffer, including row padding.
    pub max_memory_bytes: Option<u64>,
}

impl Limits {
    pub(crate) fn check_header(&self, header: &BitmapHeader) -> Result<(), DibError> {
        let width = u64::from(header.width.unsigned_abs());
        let height = u64::from(header.abs_height());
        within("width", width, self.max_width)?;
        within("height", height, self.max_height)?;
        within("pixel count", width * height, self.max_pixels)?;
        within("image size", header.image_size() as u64, self.max_memory_bytes)
    }
}

fn within(what: &str, value: u64, limit: Option<u64>) -> Result<(), DibError> {
    match limit {
        Some(max) if value > max => Err(DibError::LimitExceeded(format!(
            "{what} {value} exceeds limit {max}"
        ))),
        _ => Ok(()),
    }
}
