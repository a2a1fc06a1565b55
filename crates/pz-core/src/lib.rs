//! Foundational primitives for puzzle-pixels.
//!
//! ## Pixel Views and Stride
//! Pixel buffers are packed 8-bit-per-channel memory. `stride` is the byte
//! distance between adjacent row starts and may exceed `width * channels`,
//! so views can borrow padded buffers and sub-rectangles without copying.
//!
//! ## Aligned Output
//! Buffers produced by this workspace are allocated through [`AlignedBuf`],
//! whose base address and row stride are multiples of [`SIMD_ALIGN`].
//!
//! ## Kernels
//! [`Kernel`] names the instruction-set level a routine may use. All levels
//! are required to produce identical output.

mod aligned;
mod error;
mod image;
mod kernel;

pub use aligned::{AlignedBuf, SIMD_ALIGN, aligned_stride};
pub use error::Error;
pub use image::{PixelFormat, PixelView};
pub use kernel::Kernel;
