use pz_core::{Error, Kernel, PixelView};

/// Returned by [`compare_rows`] and [`compare_columns`] when the request is
/// out of range. No real distance can reach this value.
pub const INCOMPARABLE: u64 = u64::MAX;

/// Sum of squared byte differences between rows `row0` and `row1`.
///
/// All channels of the full row width take part; padding bytes do not.
/// Returns [`INCOMPARABLE`] if either row is out of range, the view has no
/// data, or the width is zero.
pub fn compare_rows(view: &PixelView<'_>, row0: usize, row1: usize) -> u64 {
    try_compare_rows(view, row0, row1).unwrap_or(INCOMPARABLE)
}

pub fn try_compare_rows(view: &PixelView<'_>, row0: usize, row1: usize) -> Result<u64, Error> {
    try_compare_rows_with(Kernel::detect(), view, row0, row1)
}

/// Like [`try_compare_rows`] with an explicit kernel, clamped to what the CPU
/// supports.
pub fn try_compare_rows_with(
    kernel: Kernel,
    view: &PixelView<'_>,
    row0: usize,
    row1: usize,
) -> Result<u64, Error> {
    if view.data().is_empty() {
        return Err(Error::NoData);
    }
    if view.width() < 1 || row0 >= view.height() || row1 >= view.height() {
        return Err(Error::OutOfBounds);
    }
    if row0 == row1 {
        return Ok(0);
    }

    Ok(sum_squared_diff_with(kernel, view.row(row0), view.row(row1)))
}

/// Sum of squared per-channel differences between columns `col0` and `col1`
/// over rows `y_start..y_end`.
///
/// Returns [`INCOMPARABLE`] for an empty or out-of-range row span, a column
/// out of range, or a view without data.
pub fn compare_columns(
    view: &PixelView<'_>,
    col0: usize,
    col1: usize,
    y_start: usize,
    y_end: usize,
) -> u64 {
    try_compare_columns(view, col0, col1, y_start, y_end).unwrap_or(INCOMPARABLE)
}

pub fn try_compare_columns(
    view: &PixelView<'_>,
    col0: usize,
    col1: usize,
    y_start: usize,
    y_end: usize,
) -> Result<u64, Error> {
    if view.data().is_empty() {
        return Err(Error::NoData);
    }
    if y_start >= y_end {
        return Err(Error::EmptyRange);
    }
    if y_end > view.height() || col0 >= view.width() || col1 >= view.width() {
        return Err(Error::OutOfBounds);
    }
    if col0 == col1 {
        return Ok(0);
    }

    // Strided access over 3-4 bytes per row; scalar is the intended path.
    let channels = view.channels();
    let off0 = col0 * channels;
    let off1 = col1 * channels;
    let mut sum = 0u64;
    for y in y_start..y_end {
        let row = view.row(y);
        let p0 = &row[off0..off0 + channels];
        let p1 = &row[off1..off1 + channels];
        let row_sum: u32 = p0
            .iter()
            .zip(p1)
            .map(|(&a, &b)| {
                let d = a as i32 - b as i32;
                (d * d) as u32
            })
            .sum();
        sum += u64::from(row_sum);
    }

    Ok(sum)
}

/// Sum of squared differences between two equal-length byte spans.
///
/// # Panics
/// If `a.len() != b.len()`.
pub fn sum_squared_diff(a: &[u8], b: &[u8]) -> u64 {
    sum_squared_diff_with(Kernel::detect(), a, b)
}

pub fn sum_squared_diff_with(kernel: Kernel, a: &[u8], b: &[u8]) -> u64 {
    assert_eq!(a.len(), b.len(), "span length mismatch");
    let kernel = kernel.supported();

    #[cfg(target_arch = "x86_64")]
    if kernel.has_ssse3() && a.len() >= 16 {
        let aligned = ((a.as_ptr() as usize) | (b.as_ptr() as usize)).is_multiple_of(16);
        if aligned && kernel.has_sse41() {
            // SAFETY: SSE4.1 + SSSE3 verified by `supported()`, both spans
            // start on a 16-byte boundary.
            return unsafe { x86::sum_squared_diff_stream(a, b) };
        }
        // SAFETY: SSSE3 verified by `supported()`.
        return unsafe { x86::sum_squared_diff_ssse3(a, b) };
    }

    #[cfg(not(target_arch = "x86_64"))]
    let _ = kernel;

    sum_squared_diff_scalar(a, b)
}

fn sum_squared_diff_scalar(a: &[u8], b: &[u8]) -> u64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as i32 - y as i32;
            (d * d) as u64
        })
        .sum()
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use std::arch::x86_64::*;

    /// Squared differences of 16 byte pairs, folded into two u64 lanes.
    #[inline]
    #[target_feature(enable = "ssse3")]
    unsafe fn squared_difference(a: __m128i, b: __m128i) -> __m128i {
        // Byte pairs (a, b) against (-1, +1) give b - a as i16.
        let k = _mm_set1_epi16(0x1FF);
        let lo = _mm_maddubs_epi16(_mm_unpacklo_epi8(a, b), k);
        let hi = _mm_maddubs_epi16(_mm_unpackhi_epi8(a, b), k);
        let sq = _mm_add_epi32(_mm_madd_epi16(lo, lo), _mm_madd_epi16(hi, hi));
        let zero = _mm_setzero_si128();
        _mm_add_epi64(_mm_unpacklo_epi32(sq, zero), _mm_unpackhi_epi32(sq, zero))
    }

    #[inline]
    #[target_feature(enable = "sse2")]
    unsafe fn horizontal_sum64(v: __m128i) -> u64 {
        let lo = _mm_cvtsi128_si64(v) as u64;
        let hi = _mm_cvtsi128_si64(_mm_unpackhi_epi64(v, v)) as u64;
        lo + hi
    }

    #[target_feature(enable = "ssse3")]
    pub(super) unsafe fn sum_squared_diff_ssse3(a: &[u8], b: &[u8]) -> u64 {
        let chunks = a.len() / 16;
        let mut acc = _mm_setzero_si128();

        // SAFETY: every load reads 16 bytes at `i * 16 < chunks * 16 <= len`.
        unsafe {
            for i in 0..chunks {
                let va = _mm_loadu_si128(a.as_ptr().add(i * 16) as *const __m128i);
                let vb = _mm_loadu_si128(b.as_ptr().add(i * 16) as *const __m128i);
                acc = _mm_add_epi64(acc, squared_difference(va, vb));
            }
        }

        let tail = chunks * 16;
        // SAFETY: SSE2 is implied by SSSE3.
        let head = unsafe { horizontal_sum64(acc) };
        head + super::sum_squared_diff_scalar(&a[tail..], &b[tail..])
    }

    /// Non-temporal aligned loads; both spans must start 16-byte aligned.
    #[target_feature(enable = "ssse3,sse4.1")]
    pub(super) unsafe fn sum_squared_diff_stream(a: &[u8], b: &[u8]) -> u64 {
        debug_assert_eq!(a.as_ptr() as usize % 16, 0);
        debug_assert_eq!(b.as_ptr() as usize % 16, 0);

        let chunks = a.len() / 16;
        let mut acc = _mm_setzero_si128();

        // SAFETY: caller guarantees alignment; loads stay within `len`.
        unsafe {
            for i in 0..chunks {
                let va = _mm_stream_load_si128(a.as_ptr().add(i * 16) as *const __m128i);
                let vb = _mm_stream_load_si128(b.as_ptr().add(i * 16) as *const __m128i);
                acc = _mm_add_epi64(acc, squared_difference(va, vb));
            }
        }

        let tail = chunks * 16;
        // SAFETY: SSE2 is implied by SSE4.1.
        let head = unsafe { horizontal_sum64(acc) };
        head + super::sum_squared_diff_scalar(&a[tail..], &b[tail..])
    }
}
