//! Decoded page images

use image::RgbaImage;
use tiny_skia::{ColorU8, Pixmap};

use crate::geometry::Size;

use super::RenderError;

/// A decoded page, kept both as straight RGBA (for cropping) and as a
/// premultiplied pixmap (for painting).
pub struct PageRaster {
    image: RgbaImage,
    pixmap: Pixmap,
}

impl std::fmt::Debug for PageRaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRaster")
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

impl PageRaster {
    /// Decode an encoded raster (PNG, JPEG, ...).
    pub fn decode(bytes: &[u8]) -> Result<Self, RenderError> {
        let decoded =
            image::load_from_memory(bytes).map_err(|e| RenderError::Decode(e.to_string()))?;
        Self::from_rgba(decoded.to_rgba8())
    }

    pub fn from_rgba(image: RgbaImage) -> Result<Self, RenderError> {
        let (width, height) = image.dimensions();
        let mut pixmap = Pixmap::new(width, height).ok_or(RenderError::Allocation { width, height })?;

        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
        }

        Ok(Self { image, pixmap })
    }

    pub fn natural_size(&self) -> Size {
        Size::new(self.image.width() as f64, self.image.height() as f64)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}
