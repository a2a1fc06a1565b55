use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::Error;

/// Alignment of every [`AlignedBuf`] base address and of strides produced by
/// [`aligned_stride`].
pub const SIMD_ALIGN: usize = 16;

/// Zero-initialized heap buffer with a fixed power-of-two alignment.
///
/// The memory is released when the buffer is dropped.
pub struct AlignedBuf {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

impl AlignedBuf {
    /// Allocates `len` zeroed bytes aligned to `align`.
    ///
    /// Fails instead of aborting when the layout is invalid or the allocator
    /// returns null.
    pub fn zeroed(len: usize, align: usize) -> Result<Self, Error> {
        if !align.is_power_of_two() {
            return Err(Error::SizeOverflow);
        }

        // A zero-sized layout cannot be passed to the allocator.
        let size = len.max(1);
        let layout = Layout::from_size_align(size, align).map_err(|_| Error::SizeOverflow)?;

        // SAFETY: `layout` has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(Error::AllocationFailed { bytes: size })?;

        Ok(Self { ptr, len, layout })
    }

    /// Allocates `stride * rows` zeroed bytes aligned to [`SIMD_ALIGN`].
    pub fn for_rows(stride: usize, rows: usize) -> Result<Self, Error> {
        let len = stride.checked_mul(rows).ok_or(Error::SizeOverflow)?;
        if len > isize::MAX as usize {
            return Err(Error::SizeOverflow);
        }
        Self::zeroed(len, SIMD_ALIGN)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.layout.align()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` points to at least `len` initialized bytes owned by
        // `self` for its whole lifetime.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as in `as_slice`, and `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        // SAFETY: `ptr` was returned by `alloc_zeroed` with exactly `layout`.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl Deref for AlignedBuf {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl DerefMut for AlignedBuf {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl std::fmt::Debug for AlignedBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("len", &self.len)
            .field("align", &self.layout.align())
            .finish()
    }
}

// SAFETY: `AlignedBuf` uniquely owns its allocation, like `Vec<u8>`.
unsafe impl Send for AlignedBuf {}
// SAFETY: shared access only hands out `&[u8]`.
unsafe impl Sync for AlignedBuf {}

/// Row stride in bytes for `width` pixels of `bytes_per_pixel`, rounded up to
/// a multiple of [`SIMD_ALIGN`].
pub fn aligned_stride(width: usize, bytes_per_pixel: usize) -> Result<usize, Error> {
    let raw = width
        .checked_mul(bytes_per_pixel)
        .ok_or(Error::SizeOverflow)?;
    let padded = raw.checked_add(SIMD_ALIGN - 1).ok_or(Error::SizeOverflow)?;
    Ok(padded & !(SIMD_ALIGN - 1))
}
