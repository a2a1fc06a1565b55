use pz_core::{Error, PixelView};

#[cfg(feature = "tracing")]
use tracing::{debug, instrument};

use crate::downsample::{ScaledBuffer, try_scale_half};

/// Successive half-size previews of one source image.
///
/// Level 0 is the first halving; the source itself is never copied. Building
/// stops once a level fits the requested bounds or cannot be halved again.
#[derive(Debug, Default)]
pub struct PreviewChain {
    levels: Vec<ScaledBuffer>,
}

impl PreviewChain {
    pub fn new() -> Self {
        Self { levels: Vec::new() }
    }

    pub fn build(src: &PixelView<'_>, max_width: usize, max_height: usize) -> Result<Self, Error> {
        let mut chain = Self::new();
        chain.rebuild(src, max_width, max_height)?;
        Ok(chain)
    }

    /// Replaces all levels with previews of `src`.
    ///
    /// A source that already fits yields an empty chain. On error the chain
    /// is left empty.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, src), fields(w = src.width(), h = src.height()))
    )]
    pub fn rebuild(
        &mut self,
        src: &PixelView<'_>,
        max_width: usize,
        max_height: usize,
    ) -> Result<(), Error> {
        self.levels.clear();
        if !src.format().is_packed32() {
            return Err(Error::UnsupportedFormat(src.format()));
        }

        let (mut w, mut h) = (src.width(), src.height());
        while (w > max_width || h > max_height) && w >= 2 && h >= 2 {
            let next = match self.levels.last() {
                Some(prev) => try_scale_half(&prev.as_view()),
                None => try_scale_half(src),
            };
            let next = match next {
                Ok(next) => next,
                Err(err) => {
                    self.levels.clear();
                    return Err(err);
                }
            };

            w = next.width();
            h = next.height();
            self.levels.push(next);
        }

        #[cfg(feature = "tracing")]
        debug!(levels = self.levels.len(), w, h, "preview chain built");

        Ok(())
    }

    pub fn level(&self, i: usize) -> Option<&ScaledBuffer> {
        self.levels.get(i)
    }

    pub fn levels(&self) -> &[ScaledBuffer] {
        &self.levels
    }

    /// The last level, i.e. the preview that fits the bounds.
    pub fn smallest(&self) -> Option<&ScaledBuffer> {
        self.levels.last()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
