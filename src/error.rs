use alloc::string::String;
use enough::StopReason;

/// Errors from DIB normalization, decoding, conversion and blitting.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DibError {
    #[error("unsupported bitmap header size: {0}")]
    UnsupportedHeader(u32),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("bitfield mask is zero")]
    InvalidBitfieldMask,

    #[error("failed to allocate {bytes} bytes")]
    AllocationFailure { bytes: usize },

    #[error("destination surface does not accept this format")]
    BadFormat,

    #[error("destination surface cannot stretch or mirror")]
    TransformUnsupported,

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("surface error: {0}")]
    Surface(String),

    #[error("operation cancelled")]
    Cancelled(StopReason),
}

impl From<StopReason> for DibError {
    fn from(r: StopReason) -> Self {
        DibError::Cancelled(r)
    }
}

/// Allocate a zero-filled buffer, reporting allocation failure instead of aborting.
pub(crate) fn alloc_zeroed(bytes: usize) -> Result<alloc::vec::Vec<u8>, DibError> {
    let mut buf = alloc::vec::Vec::new();
    buf.try_reserve_exact(bytes)
        .map_err(|_| DibError::AllocationFailure { bytes })?;
    buf.resize(bytes, 0);
    Ok(buf)
}
