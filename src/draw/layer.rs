use crate::draw::model::Color;
use image::RgbaImage;

/// The drawable annotation buffer of one review session.
///
/// Pixels are RGBA8 with straight (non-premultiplied) alpha. Fully transparent
/// pixels are always stored as `(0, 0, 0, 0)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationLayer {
    buffer: RgbaImage,
}

impl AnnotationLayer {
    /// A fully transparent layer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffer: RgbaImage::new(width, height),
        }
    }

    pub(crate) fn from_image(mut buffer: RgbaImage) -> Self {
        for px in buffer.chunks_exact_mut(4) {
            if px[3] == 0 {
                px.copy_from_slice(&[0, 0, 0, 0]);
            }
        }
        Self { buffer }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        Color::from_rgba_array(self.buffer.get_pixel(x, y).0)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.buffer
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Resets every pixel to transparent.
    pub fn clear(&mut self) {
        self.buffer.fill(0);
    }

    pub fn painted_pixel_count(&self) -> usize {
        self.buffer.chunks_exact(4).filter(|px| px[3] != 0).count()
    }
}
