//! Reusable RGBA pixel buffer with high-quality downscaling.
//!
//! A [`Canvas`] lives for one pipeline run. Each time the convergence search
//! changes the target dimensions the same backing `Vec` is resized in place
//! and redrawn, so a run allocates its pixel buffer once (plus growth) rather
//! than once per iteration. Resampling uses `fast_image_resize` with a
//! Lanczos3 convolution, its highest-quality filter.

use super::backend::BackendError;
use fast_image_resize as fr;
use image::{RgbImage, RgbaImage};

pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    resizer: fr::Resizer,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
            resizer: fr::Resizer::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 pixels, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Bytes currently reserved by the backing buffer.
    pub fn capacity(&self) -> usize {
        self.pixels.capacity()
    }

    /// Resize the backing buffer to `width`×`height`, reusing its allocation.
    fn reshape(&mut self, width: u32, height: u32) {
        let len = width as usize * height as usize * 4;
        self.pixels.clear();
        self.pixels.resize(len, 0);
        self.width = width;
        self.height = height;
    }

    /// Fill the whole canvas with one colour.
    pub fn fill(&mut self, width: u32, height: u32, rgba: [u8; 4]) {
        self.reshape(width, height);
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Draw `src` scaled to exactly `width`×`height`.
    ///
    /// Only downscaling is expected; targets are derived from the source's
    /// native size and never exceed it.
    pub fn draw_rgba(
        &mut self,
        src: &RgbaImage,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        self.reshape(width, height);

        if src.dimensions() == (width, height) {
            self.pixels.copy_from_slice(src.as_raw());
            return Ok(());
        }

        let src_view =
            fr::images::ImageRef::new(src.width(), src.height(), src.as_raw(), fr::PixelType::U8x4)
                .map_err(|e| BackendError::ProcessingFailed(format!("source view: {e}")))?;
        let mut dst_view =
            fr::images::Image::from_slice_u8(width, height, &mut self.pixels, fr::PixelType::U8x4)
                .map_err(|e| BackendError::ProcessingFailed(format!("canvas view: {e}")))?;

        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3));
        self.resizer
            .resize(&src_view, &mut dst_view, Some(&options))
            .map_err(|e| BackendError::ProcessingFailed(format!("resample failed: {e}")))
    }

    /// Flatten to RGB by compositing over white.
    ///
    /// Lossy output formats carry no alpha; transparent regions of PNG/WebP
    /// inputs come out white instead of whatever colour the transparent
    /// pixels happened to store.
    pub fn to_rgb_over_white(&self) -> RgbImage {
        let mut rgb = RgbImage::new(self.width, self.height);
        for (out, px) in rgb.pixels_mut().zip(self.pixels.chunks_exact(4)) {
            let alpha = px[3] as u32;
            for (dst, &channel) in out.0.iter_mut().zip(&px[..3]) {
                *dst = ((channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
            }
        }
        rgb
    }
}
