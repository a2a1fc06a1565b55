//! Row and column dissimilarity for uniform-border detection.
//!
//! The metric is the sum of squared byte differences, accumulated in 64 bits
//! so a single 255-vs-0 byte contributes 65025 and long rows never wrap.
//!
//! Out-of-range requests are routine when probing image edges, so the plain
//! entry points return the [`INCOMPARABLE`] sentinel instead of failing.
//! The `try_*` variants report why.
//!
//! On x86_64 rows are compared with SSSE3, switching to streaming aligned
//! loads when both rows start on a 16-byte boundary and SSE4.1 is present.
//! Every path returns the same value as the scalar loop.

mod compare;
mod crop;

pub use compare::{
    INCOMPARABLE, compare_columns, compare_rows, sum_squared_diff, sum_squared_diff_with,
    try_compare_columns, try_compare_rows, try_compare_rows_with,
};
pub use crop::{CropConfig, CropRect, find_crop};
