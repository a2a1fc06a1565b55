//! Umbrella crate for the `puzzle-pixels` workspace.
//!
//! Re-exports the pixel view primitives, the row/column dissimilarity metric
//! used for auto-cropping, and the half-size preview scaler.

pub use pz_core::*;
pub use pz_metric::*;
pub use pz_scale::*;
