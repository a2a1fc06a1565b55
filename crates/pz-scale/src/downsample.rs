use pz_core::{AlignedBuf, Error, Kernel, PixelFormat, PixelView, aligned_stride};

#[cfg(feature = "tracing")]
use tracing::instrument;

const BYTES_PER_PIXEL: usize = 4;

/// Half-size image produced by [`scale_half`].
///
/// Owns 16-byte aligned storage with a 16-byte multiple stride. The memory is
/// released when the buffer is dropped.
#[derive(Debug)]
pub struct ScaledBuffer {
    width: usize,
    height: usize,
    stride: usize,
    format: PixelFormat,
    buf: AlignedBuf,
    dirty: bool,
}

impl ScaledBuffer {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Mutable pixel access. Marks the buffer dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.buf
    }

    pub fn as_view(&self) -> PixelView<'_> {
        PixelView::from_slice(self.width, self.height, self.stride, self.format, &self.buf)
            .expect("scaled buffer satisfies view invariants")
    }

    /// Packed 32-bit pixel at `(x, y)` in native byte order.
    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = y * self.stride + x * BYTES_PER_PIXEL;
        let px = self.buf.get(start..start + BYTES_PER_PIXEL)?;
        Some(load_u32(px))
    }

    /// Whether the pixels changed since the last [`mark_clean`](Self::mark_clean).
    ///
    /// Freshly scaled buffers start dirty so cached renderings get refreshed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// Box-filter downsample by exactly 2 in both dimensions.
///
/// Returns `None` if the source is smaller than 2x2, has no data, is not a
/// packed 32-bit format, or the output cannot be allocated.
pub fn scale_half(src: &PixelView<'_>) -> Option<ScaledBuffer> {
    try_scale_half(src).ok()
}

#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src), fields(w = src.width(), h = src.height()))
)]
pub fn try_scale_half(src: &PixelView<'_>) -> Result<ScaledBuffer, Error> {
    try_scale_half_with(Kernel::detect(), src)
}

/// Like [`try_scale_half`] with an explicit kernel, clamped to what the CPU
/// supports. Output is identical for every kernel.
pub fn try_scale_half_with(kernel: Kernel, src: &PixelView<'_>) -> Result<ScaledBuffer, Error> {
    if src.width() < 2 || src.height() < 2 {
        return Err(Error::TooSmall {
            width: src.width(),
            height: src.height(),
        });
    }
    if src.data().is_empty() {
        return Err(Error::NoData);
    }
    if !src.format().is_packed32() {
        return Err(Error::UnsupportedFormat(src.format()));
    }

    let width = src.width() >> 1;
    let height = src.height() >> 1;
    let stride = aligned_stride(width, BYTES_PER_PIXEL)?;
    let mut buf = AlignedBuf::for_rows(stride, height)?;

    halve_rows(kernel.supported(), src, &mut buf, stride, width, height);

    Ok(ScaledBuffer {
        width,
        height,
        stride,
        format: src.format(),
        buf,
        dirty: true,
    })
}

/// Per-byte floor average of two packed pixels.
#[inline]
pub(crate) fn avg2(a: u32, b: u32) -> u32 {
    (((a ^ b) & 0xFEFE_FEFE) >> 1) + (a & b)
}

/// Floor average of a 2x2 block: horizontal pairs first, then vertical.
#[inline]
pub(crate) fn avg4(top: [u32; 2], bottom: [u32; 2]) -> u32 {
    avg2(avg2(top[0], top[1]), avg2(bottom[0], bottom[1]))
}

#[inline]
fn load_u32(px: &[u8]) -> u32 {
    u32::from_ne_bytes([px[0], px[1], px[2], px[3]])
}

fn halve_rows(
    kernel: Kernel,
    src: &PixelView<'_>,
    dst: &mut [u8],
    dst_stride: usize,
    width: usize,
    height: usize,
) {
    #[cfg(target_arch = "x86_64")]
    let stream = kernel.has_sse41()
        && ((src.data().as_ptr() as usize) | src.stride()).is_multiple_of(16);

    for y in 0..height {
        let row0 = src.row(2 * y);
        let row1 = src.row(2 * y + 1);
        let out = &mut dst[y * dst_stride..y * dst_stride + width * BYTES_PER_PIXEL];

        #[cfg(target_arch = "x86_64")]
        if kernel >= Kernel::Sse2 {
            if stream {
                // SAFETY: SSE4.1 verified by `supported()`; the source base
                // and stride are 16-byte aligned, and so is `out`.
                unsafe { x86::halve_row_stream(row0, row1, out) };
            } else {
                // SAFETY: SSE2 verified by `supported()`; `out` starts on a
                // 16-byte boundary of an `AlignedBuf` row.
                unsafe { x86::halve_row_sse2(row0, row1, out) };
            }
            continue;
        }

        halve_row_scalar(row0, row1, out);
    }

    #[cfg(not(target_arch = "x86_64"))]
    let _ = kernel;
}

fn halve_row_scalar(row0: &[u8], row1: &[u8], out: &mut [u8]) {
    for ((dst, top), bottom) in out
        .chunks_exact_mut(BYTES_PER_PIXEL)
        .zip(row0.chunks_exact(2 * BYTES_PER_PIXEL))
        .zip(row1.chunks_exact(2 * BYTES_PER_PIXEL))
    {
        let v = avg4(
            [load_u32(&top[..4]), load_u32(&top[4..])],
            [load_u32(&bottom[..4]), load_u32(&bottom[4..])],
        );
        dst.copy_from_slice(&v.to_ne_bytes());
    }
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use std::arch::x86_64::*;

    /// Per-byte `(a + b) >> 1`; `pavgb` rounds up, so drop the odd bit.
    #[inline]
    #[target_feature(enable = "sse2")]
    unsafe fn avg_floor(a: __m128i, b: __m128i) -> __m128i {
        let odd = _mm_and_si128(_mm_xor_si128(a, b), _mm_set1_epi8(1));
        _mm_sub_epi8(_mm_avg_epu8(a, b), odd)
    }

    /// `lo = p0..p3`, `hi = p4..p7` -> `avg2(p0,p1) .. avg2(p6,p7)`.
    #[inline]
    #[target_feature(enable = "sse2")]
    unsafe fn pair_average(lo: __m128i, hi: __m128i) -> __m128i {
        let t0 = _mm_unpacklo_epi32(lo, hi); // p0 p4 p1 p5
        let t1 = _mm_unpackhi_epi32(lo, hi); // p2 p6 p3 p7
        let even = _mm_unpacklo_epi32(t0, t1);
        let odd = _mm_unpackhi_epi32(t0, t1);
        // SAFETY: SSE2 enabled on this function.
        unsafe { avg_floor(even, odd) }
    }

    #[inline]
    #[target_feature(enable = "sse2")]
    unsafe fn quad(a0: __m128i, a1: __m128i, b0: __m128i, b1: __m128i) -> __m128i {
        // SAFETY: SSE2 enabled on this function.
        unsafe { avg_floor(pair_average(a0, a1), pair_average(b0, b1)) }
    }

    /// `out` must start on a 16-byte boundary.
    #[target_feature(enable = "sse2")]
    pub(super) unsafe fn halve_row_sse2(row0: &[u8], row1: &[u8], out: &mut [u8]) {
        debug_assert_eq!(out.as_ptr() as usize % 16, 0);
        let quads = out.len() / 16;

        // SAFETY: source reads end at `quads * 32 <= 2 * out.len() <= row
        // length`; stores end at `quads * 16 <= out.len()` and are aligned.
        unsafe {
            for i in 0..quads {
                let s0 = row0.as_ptr().add(i * 32);
                let s1 = row1.as_ptr().add(i * 32);
                let v = quad(
                    _mm_loadu_si128(s0 as *const __m128i),
                    _mm_loadu_si128(s0.add(16) as *const __m128i),
                    _mm_loadu_si128(s1 as *const __m128i),
                    _mm_loadu_si128(s1.add(16) as *const __m128i),
                );
                _mm_store_si128(out.as_mut_ptr().add(i * 16) as *mut __m128i, v);
            }
        }

        super::halve_row_scalar(&row0[quads * 32..], &row1[quads * 32..], &mut out[quads * 16..]);
    }

    /// Streaming variant; both source rows and `out` must be 16-byte aligned.
    #[target_feature(enable = "sse4.1")]
    pub(super) unsafe fn halve_row_stream(row0: &[u8], row1: &[u8], out: &mut [u8]) {
        debug_assert_eq!(row0.as_ptr() as usize % 16, 0);
        debug_assert_eq!(row1.as_ptr() as usize % 16, 0);
        debug_assert_eq!(out.as_ptr() as usize % 16, 0);
        let quads = out.len() / 16;

        // SAFETY: as in `halve_row_sse2`, plus aligned source addresses.
        unsafe {
            for i in 0..quads {
                let s0 = row0.as_ptr().add(i * 32);
                let s1 = row1.as_ptr().add(i * 32);
                let v = quad(
                    _mm_stream_load_si128(s0 as *const __m128i),
                    _mm_stream_load_si128(s0.add(16) as *const __m128i),
                    _mm_stream_load_si128(s1 as *const __m128i),
                    _mm_stream_load_si128(s1.add(16) as *const __m128i),
                );
                _mm_store_si128(out.as_mut_ptr().add(i * 16) as *mut __m128i, v);
            }
        }

        super::halve_row_scalar(&row0[quads * 32..], &row1[quads * 32..], &mut out[quads * 16..]);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use pz_core::{AlignedBuf, Error, Kernel, PixelFormat, PixelView};

    use super::{avg2, avg4, scale_half, try_scale_half, try_scale_half_with};

    const KERNELS: [Kernel; 4] = [Kernel::Scalar, Kernel::Sse2, Kernel::Ssse3, Kernel::Sse41];

    fn pixels_to_bytes(px: &[u32]) -> Vec<u8> {
        px.iter().flat_map(|p| p.to_ne_bytes()).collect()
    }

    /// Independent per-byte reference: floor(floor(a+b)/2 + floor(c+d)/2) / 2.
    fn reference_pixel(a: u32, b: u32, c: u32, d: u32) -> u32 {
        let (a, b, c, d) = (a.to_ne_bytes(), b.to_ne_bytes(), c.to_ne_bytes(), d.to_ne_bytes());
        let mut out = [0u8; 4];
        for i in 0..4 {
            let top = (a[i] as u32 + b[i] as u32) / 2;
            let bottom = (c[i] as u32 + d[i] as u32) / 2;
            out[i] = ((top + bottom) / 2) as u8;
        }
        u32::from_ne_bytes(out)
    }

    #[test]
    fn avg2_is_per_byte_floor() {
        assert_eq!(avg2(0x0000_0000, 0xFFFF_FFFF), 0x7F7F_7F7F);
        assert_eq!(avg2(0x0102_0304, 0x0102_0304), 0x0102_0304);
        assert_eq!(avg2(0x0300_00FF, 0x0101_FF01), 0x0200_7F80);
        assert_eq!(avg4([0x03, 0x01], [0x00, 0x00]), 0x01);
    }

    #[test]
    fn uniform_4x4_halves_to_same_pixel() {
        let px = 0x80_12_34_56u32;
        let data = pixels_to_bytes(&[px; 16]);
        let view = PixelView::packed(4, 4, PixelFormat::Argb32, &data).expect("valid view");

        for k in KERNELS {
            let out = try_scale_half_with(k, &view).expect("scaled");
            assert_eq!((out.width(), out.height()), (2, 2));
            for y in 0..2 {
                for x in 0..2 {
                    assert_eq!(out.pixel(x, y), Some(px), "kernel {k:?}");
                }
            }
        }
    }

    #[test]
    fn checkerboard_2x2_floors_to_7f() {
        let data = pixels_to_bytes(&[0x0000_0000, 0xFFFF_FFFF, 0xFFFF_FFFF, 0x0000_0000]);
        let view = PixelView::packed(2, 2, PixelFormat::Xrgb32, &data).expect("valid view");

        let out = scale_half(&view).expect("scaled");
        assert_eq!((out.width(), out.height()), (1, 1));
        assert_eq!(out.pixel(0, 0), Some(0x7F7F_7F7F));
        assert_eq!(out.format(), PixelFormat::Xrgb32);
    }

    #[test]
    fn horizontal_pairs_are_averaged_first() {
        // Top pair (3, 1), bottom pair (0, 0): 1 when averaging horizontally
        // first, 0 when averaging vertically first.
        let w = 18;
        let mut px = Vec::with_capacity(w * 2);
        for x in 0..w {
            px.push(if x % 2 == 0 { 0x0303_0303 } else { 0x0101_0101 });
        }
        px.extend(std::iter::repeat_n(0u32, w));
        let data = pixels_to_bytes(&px);
        let view = PixelView::packed(w, 2, PixelFormat::Argb32, &data).expect("valid view");

        for k in KERNELS {
            let out = try_scale_half_with(k, &view).expect("scaled");
            for x in 0..w / 2 {
                assert_eq!(out.pixel(x, 0), Some(0x0101_0101), "kernel {k:?} x {x}");
            }
        }
    }

    #[test]
    fn rejects_small_and_unsupported() {
        let data = vec![0u8; 64];

        let thin = PixelView::packed(1, 4, PixelFormat::Argb32, &data).expect("valid view");
        assert!(scale_half(&thin).is_none());
        assert_eq!(
            try_scale_half(&thin).unwrap_err(),
            Error::TooSmall {
                width: 1,
                height: 4
            }
        );

        let short = PixelView::packed(4, 1, PixelFormat::Argb32, &data).expect("valid view");
        assert!(scale_half(&short).is_none());

        let rgba = PixelView::packed(4, 4, PixelFormat::Rgba8, &data).expect("valid view");
        assert_eq!(
            try_scale_half(&rgba).unwrap_err(),
            Error::UnsupportedFormat(PixelFormat::Rgba8)
        );

        let rgb = PixelView::packed(4, 4, PixelFormat::Rgb8, &data).expect("valid view");
        assert!(scale_half(&rgb).is_none());
    }

    #[test]
    fn output_stride_and_base_are_aligned() {
        for (w, h) in [(2usize, 2usize), (3, 3), (10, 4), (17, 5), (64, 2)] {
            let data = vec![7u8; w * h * 4];
            let view = PixelView::packed(w, h, PixelFormat::Argb32, &data).expect("valid view");
            let out = scale_half(&view).expect("scaled");

            assert_eq!((out.width(), out.height()), (w / 2, h / 2));
            assert_eq!(out.stride() % 16, 0);
            assert!(out.stride() >= out.width() * 4);
            assert_eq!(out.data().as_ptr() as usize % 16, 0);
            assert_eq!(out.data().len(), out.stride() * out.height());
        }
    }

    #[test]
    fn odd_dimensions_drop_last_row_col() {
        // 5x3: the last column and row must not influence the output.
        let mut px = vec![0x1010_1010u32; 15];
        for y in 0..3 {
            px[y * 5 + 4] = 0xFFFF_FFFF;
        }
        for x in 0..5 {
            px[2 * 5 + x] = 0xFFFF_FFFF;
        }
        let data = pixels_to_bytes(&px);
        let view = PixelView::packed(5, 3, PixelFormat::Argb32, &data).expect("valid view");

        let out = scale_half(&view).expect("scaled");
        assert_eq!((out.width(), out.height()), (2, 1));
        assert_eq!(out.pixel(0, 0), Some(0x1010_1010));
        assert_eq!(out.pixel(1, 0), Some(0x1010_1010));
        assert_eq!(out.pixel(2, 0), None);
    }

    #[test]
    fn source_is_not_modified_and_output_starts_dirty() {
        let data: Vec<u8> = (0..8 * 4 * 4).map(|i| (i * 7) as u8).collect();
        let before = data.clone();
        let view = PixelView::packed(8, 4, PixelFormat::Argb32, &data).expect("valid view");

        let mut out = scale_half(&view).expect("scaled");
        assert_eq!(data, before);

        assert!(out.is_dirty());
        out.mark_clean();
        assert!(!out.is_dirty());
        out.data_mut()[0] = 1;
        assert!(out.is_dirty());
    }

    #[test]
    fn aligned_padded_source_uses_same_result() {
        // 16-byte aligned base and stride, so the streaming path is eligible.
        let (w, h, stride) = (27usize, 6usize, 112usize);
        let mut buf = AlignedBuf::for_rows(stride, h).expect("allocation");
        for (i, b) in buf.iter_mut().enumerate() {
            *b = (i as u32).wrapping_mul(2_246_822_519).rotate_left(7) as u8;
        }
        let view = PixelView::from_slice(w, h, stride, PixelFormat::Argb32, &buf).expect("view");

        let reference = try_scale_half_with(Kernel::Scalar, &view).expect("scaled");
        for y in 0..h / 2 {
            for x in 0..w / 2 {
                let p = |sx: usize, sy: usize| {
                    let s = sy * stride + sx * 4;
                    u32::from_ne_bytes([buf[s], buf[s + 1], buf[s + 2], buf[s + 3]])
                };
                let expected = reference_pixel(
                    p(2 * x, 2 * y),
                    p(2 * x + 1, 2 * y),
                    p(2 * x, 2 * y + 1),
                    p(2 * x + 1, 2 * y + 1),
                );
                assert_eq!(reference.pixel(x, y), Some(expected));
            }
        }

        for k in KERNELS {
            let out = try_scale_half_with(k, &view).expect("scaled");
            assert_eq!(out.data(), reference.data(), "kernel {k:?}");
        }

        // Shift by one pixel to force unaligned loads.
        let shifted = view.subview(1, 0, w - 1, h).expect("subview");
        let reference = try_scale_half_with(Kernel::Scalar, &shifted).expect("scaled");
        for k in KERNELS {
            let out = try_scale_half_with(k, &shifted).expect("scaled");
            assert_eq!(out.data(), reference.data(), "kernel {k:?}");
        }
    }

    proptest! {
        #[test]
        fn kernels_match_reference(
            (w, h, px) in (2usize..24, 2usize..6).prop_flat_map(|(w, h)| (
                Just(w),
                Just(h),
                prop::collection::vec(any::<u32>(), w * h),
            ))
        ) {
            let data = pixels_to_bytes(&px);
            let view = PixelView::packed(w, h, PixelFormat::Argb32, &data).expect("valid view");

            for k in KERNELS {
                let out = try_scale_half_with(k, &view).expect("scaled");
                prop_assert_eq!((out.width(), out.height()), (w / 2, h / 2));
                for y in 0..h / 2 {
                    for x in 0..w / 2 {
                        let at = |sx: usize, sy: usize| px[sy * w + sx];
                        let expected = reference_pixel(
                            at(2 * x, 2 * y),
                            at(2 * x + 1, 2 * y),
                            at(2 * x, 2 * y + 1),
                            at(2 * x + 1, 2 * y + 1),
                        );
                        prop_assert_eq!(out.pixel(x, y), Some(expected));
                    }
                }
            }
        }
    }
}
