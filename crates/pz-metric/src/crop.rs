use pz_core::{Kernel, PixelView};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::compare::{try_compare_columns, try_compare_rows_with};

/// Tuning for [`find_crop`].
#[derive(Debug, Clone, PartialEq)]
pub struct CropConfig {
    /// Largest mean squared byte difference for a row or column to still
    /// count as part of the border it is compared against.
    pub max_mse: f64,
    /// A run of matching rows/columns shorter than this is kept as content.
    pub min_border: usize,
    /// Minimum width and height of the returned rectangle.
    pub min_keep: usize,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            max_mse: 4.0,
            min_border: 2,
            min_keep: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CropRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl CropRect {
    pub fn full(view: &PixelView<'_>) -> Self {
        Self {
            x: 0,
            y: 0,
            width: view.width(),
            height: view.height(),
        }
    }

    pub fn is_full(&self, view: &PixelView<'_>) -> bool {
        *self == Self::full(view)
    }
}

/// Finds the content rectangle inside uniform borders.
///
/// Each edge row (column) is compared with the rows (columns) behind it; the
/// run that stays within `max_mse` is trimmed when it is at least
/// `min_border` long. Columns are compared only over the rows kept after the
/// top/bottom pass. Returns `None` for an empty view.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(view, cfg), fields(w = view.width(), h = view.height()))
)]
pub fn find_crop(view: &PixelView<'_>, cfg: &CropConfig) -> Option<CropRect> {
    if view.is_empty() {
        return None;
    }

    let kernel = Kernel::detect();
    let (w, h) = (view.width(), view.height());
    let keep_h = cfg.min_keep.clamp(1, h);
    let keep_w = cfg.min_keep.clamp(1, w);

    let row_limit = limit(cfg.max_mse, view.row_bytes());
    let row_matches = |edge: usize, y: usize| {
        try_compare_rows_with(kernel, view, edge, y).is_ok_and(|d| d <= row_limit)
    };

    let top_run = edge_run(h, |i| row_matches(0, i));
    let top = trimmed(top_run, cfg.min_border, h - keep_h);

    let bottom_run = edge_run(h, |i| row_matches(h - 1, h - 1 - i));
    let bottom = h - trimmed(bottom_run, cfg.min_border, h - top - keep_h);

    let rows = bottom - top;
    let col_limit = limit(cfg.max_mse, rows * view.channels());
    let col_matches = |edge: usize, x: usize| {
        try_compare_columns(view, edge, x, top, bottom).is_ok_and(|d| d <= col_limit)
    };

    let left_run = edge_run(w, |i| col_matches(0, i));
    let left = trimmed(left_run, cfg.min_border, w - keep_w);

    let right_run = edge_run(w, |i| col_matches(w - 1, w - 1 - i));
    let right = w - trimmed(right_run, cfg.min_border, w - left - keep_w);

    Some(CropRect {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    })
}

fn limit(max_mse: f64, bytes: usize) -> u64 {
    // Saturating float-to-int cast.
    (max_mse.max(0.0) * bytes as f64) as u64
}

/// Length of the run starting at the edge (offset 0) whose members match it.
fn edge_run(len: usize, matches: impl Fn(usize) -> bool) -> usize {
    let mut run = 1;
    while run < len && matches(run) {
        run += 1;
    }
    run
}

fn trimmed(run: usize, min_border: usize, available: usize) -> usize {
    if run < min_border.max(1) {
        return 0;
    }
    run.min(available)
}
