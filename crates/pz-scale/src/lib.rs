//! Exact 2x box-filter downsampling for packed 32-bit pixel buffers.
//!
//! Drop-odd policy:
//! - Output size is `(src.width() / 2, src.height() / 2)`.
//! - If source width or height is odd, the last column/row is dropped.
//!
//! Rounding:
//! - Each output byte is the floor average of the four source bytes, taken
//!   as `avg2(avg2(tl, tr), avg2(bl, br))` with
//!   `avg2(a, b) = (((a ^ b) & 0xFEFEFEFE) >> 1) + (a & b)`.
//! - The SSE2/SSE4.1 paths reproduce this bit-for-bit, so output never
//!   depends on the CPU.
//!
//! Alpha (or the unused byte of `Xrgb32`) is averaged like any other channel.

mod downsample;
mod preview;

pub use downsample::{ScaledBuffer, scale_half, try_scale_half, try_scale_half_with};
pub use preview::PreviewChain;
