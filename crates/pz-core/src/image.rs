use crate::Error;

/// Packed 8-bit-per-channel pixel layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 3 bytes per pixel, R G B.
    Rgb8,
    /// 4 bytes per pixel, R G B A.
    Rgba8,
    /// Native-endian 32-bit word `0xAARRGGBB`.
    Argb32,
    /// Native-endian 32-bit word `0xXXRRGGBB`, upper byte unused.
    Xrgb32,
}

impl PixelFormat {
    pub const fn channels(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 | Self::Argb32 | Self::Xrgb32 => 4,
        }
    }

    /// Whether pixels are stored as one packed 32-bit word.
    pub const fn is_packed32(self) -> bool {
        matches!(self, Self::Argb32 | Self::Xrgb32)
    }
}

/// Borrowed view over raw pixel memory.
///
/// `stride` is in bytes and may exceed `width * channels`. The view never
/// owns or mutates its data.
#[derive(Debug, Clone, Copy)]
pub struct PixelView<'a> {
    width: usize,
    height: usize,
    stride: usize,
    format: PixelFormat,
    data: &'a [u8],
}

impl<'a> PixelView<'a> {
    pub fn from_slice(
        width: usize,
        height: usize,
        stride: usize,
        format: PixelFormat,
        data: &'a [u8],
    ) -> Result<Self, Error> {
        let row_bytes = width
            .checked_mul(format.channels())
            .ok_or(Error::SizeOverflow)?;
        if stride < row_bytes {
            return Err(Error::InvalidStride);
        }

        let min_len = stride.checked_mul(height).ok_or(Error::SizeMismatch {
            expected: usize::MAX,
            actual: data.len(),
        })?;

        if data.len() < min_len {
            return Err(Error::SizeMismatch {
                expected: min_len,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            stride,
            format,
            data,
        })
    }

    /// Tightly packed view, `stride == width * channels`.
    pub fn packed(
        width: usize,
        height: usize,
        format: PixelFormat,
        data: &'a [u8],
    ) -> Result<Self, Error> {
        let stride = width
            .checked_mul(format.channels())
            .ok_or(Error::SizeOverflow)?;
        Self::from_slice(width, height, stride, format, data)
    }

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

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    /// Number of meaningful bytes in one row, excluding padding.
    pub fn row_bytes(&self) -> usize {
        self.width * self.format.channels()
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }

    pub fn row(&self, y: usize) -> &'a [u8] {
        assert!(y < self.height, "row index out of bounds");
        let start = y * self.stride;
        &self.data[start..start + self.row_bytes()]
    }

    pub fn get_row(&self, y: usize) -> Option<&'a [u8]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.stride;
        self.data.get(start..start + self.row_bytes())
    }

    /// Channel bytes of the pixel at `(x, y)`.
    pub fn pixel(&self, x: usize, y: usize) -> Option<&'a [u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.format.channels();
        let start = y * self.stride + x * channels;
        self.data.get(start..start + channels)
    }

    pub fn subview(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<PixelView<'a>, Error> {
        if x > self.width
            || y > self.height
            || width > (self.width - x)
            || height > (self.height - y)
        {
            return Err(Error::OutOfBounds);
        }

        let channels = self.format.channels();
        let start = y
            .checked_mul(self.stride)
            .and_then(|v| v.checked_add(x * channels))
            .ok_or(Error::OutOfBounds)?;
        let min_len = min_required_len(width * channels, height, self.stride)
            .ok_or(Error::OutOfBounds)?;
        let tail = self.data.get(start..).ok_or(Error::OutOfBounds)?;

        if tail.len() < min_len {
            return Err(Error::OutOfBounds);
        }

        Ok(PixelView {
            width,
            height,
            stride: self.stride,
            format: self.format,
            data: tail,
        })
    }

    pub fn is_contiguous(&self) -> bool {
        self.stride == self.row_bytes()
    }
}

fn min_required_len(row_bytes: usize, height: usize, stride: usize) -> Option<usize> {
    if row_bytes == 0 || height == 0 {
        return Some(0);
    }

    let rows_before_last = height.checked_sub(1)?;
    let base = rows_before_last.checked_mul(stride)?;
    base.checked_add(row_bytes)
}
