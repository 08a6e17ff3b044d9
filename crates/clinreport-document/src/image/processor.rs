// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: bounded decode, resize and alpha scaling on in-memory
// images using the `image` crate.

use std::io::Cursor;

use clinreport_core::error::{ReportError, Result};
use image::{DynamicImage, ImageFormat, ImageReader, Limits, RgbImage, RgbaImage};
use tracing::{debug, instrument};

use crate::page::blend_over_white;

/// Image pipeline operating on a single in-memory image.
///
/// Transformations consume `self` and return a new `ImageProcessor`, so calls
/// chain:
///
/// ```ignore
/// let layer = ImageProcessor::from_bytes(&logo, 8192)?
///     .resize_to_width(960)
///     .into_rgba_with_opacity(0.06);
/// ```
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    /// Decode encoded bytes (PNG, JPEG, ...) refusing images wider or taller
    /// than `max_dimension` pixels before any pixel buffer is allocated.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8], max_dimension: u32) -> Result<Self> {
        let mut reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|err| ReportError::ImageDecode(format!("unreadable image data: {err}")))?;

        let mut limits = Limits::default();
        limits.max_image_width = Some(max_dimension);
        limits.max_image_height = Some(max_dimension);
        reader.limits(limits);

        let img = reader
            .decode()
            .map_err(|err| ReportError::ImageDecode(format!("failed to decode image: {err}")))?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Resize to exactly `width` pixels wide, preserving the aspect ratio.
    /// Uses Lanczos3 filtering.
    #[instrument(skip(self), fields(width))]
    pub fn resize_to_width(self, width: u32) -> Self {
        let width = width.max(1);
        let ratio = self.image.height() as f64 / self.image.width().max(1) as f64;
        let height = ((width as f64 * ratio).round() as u32).max(1);
        let resized =
            self.image
                .resize_exact(width, height, image::imageops::FilterType::Lanczos3);
        debug!(
            new_w = resized.width(),
            new_h = resized.height(),
            "Resize complete"
        );
        Self { image: resized }
    }

    /// Convert to RGBA8 and multiply every alpha value by `opacity`; see
    /// [`scale_alpha`] for rounding.
    pub fn into_rgba_with_opacity(self, opacity: f32) -> RgbaImage {
        let mut rgba = self.image.into_rgba8();
        scale_alpha(&mut rgba, opacity);
        rgba
    }

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|err| ReportError::ImageDecode(format!("PNG encoding failed: {err}")))?;
        Ok(buffer)
    }
}

/// Multiply the alpha channel by `opacity` (clamped to 0..=1).
///
/// Results round to the nearest 8-bit step, but a visible pixel under a
/// positive opacity never drops below 1. Opacities that differ by less than
/// one step (about 0.004 at full alpha) can still give equal output.
pub fn scale_alpha(img: &mut RgbaImage, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    let floor = u8::from(opacity > 0.0);
    for px in img.pixels_mut() {
        let scaled = (px.0[3] as f32 * opacity).round() as u8;
        px.0[3] = if px.0[3] > 0 { scaled.max(floor) } else { 0 };
    }
}

/// Composite an RGBA raster over white paper, producing opaque RGB.
///
/// Used where the image is the lowest layer of a page, so blending against
/// the paper colour gives the same appearance as a transparent image.
pub fn flatten_on_white(img: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        image::Rgb(blend_over_white(img.get_pixel(x, y).0))
    })
}
