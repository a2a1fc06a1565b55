use thiserror::Error;

use crate::PixelFormat;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("out of bounds")]
    OutOfBounds,
    #[error("empty row range")]
    EmptyRange,
    #[error("buffer has no pixel data")]
    NoData,
    #[error("invalid stride")]
    InvalidStride,
    #[error("unsupported pixel format {0:?}")]
    UnsupportedFormat(PixelFormat),
    #[error("image too small: {width}x{height}")]
    TooSmall { width: usize, height: usize },
    #[error("buffer size overflow")]
    SizeOverflow,
    #[error("failed to allocate {bytes} bytes")]
    AllocationFailed { bytes: usize },
}
