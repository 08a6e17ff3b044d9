// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watermark compositor: decodes the watermark once, prepares one translucent
// layer per page width and attaches it as the background of every page.
//
// The layer is never drawn over content: `PageContent::background` is emitted
// by the renderer before any block.

use std::sync::Arc;

use clinreport_core::config::WatermarkConfig;
use clinreport_core::error::{ReportError, Result};
use image::RgbaImage;
use tracing::{debug, info, instrument};

use crate::image::ImageProcessor;
use crate::page::{BackgroundLayer, PageContent, PageSize, Placement};

const MM_PER_INCH: f32 = 25.4;

/// Inset from the page edges for corner-anchored watermarks.
pub const CORNER_INSET_MM: f32 = 10.0;

/// Accepted range for the scale factor (fraction of the page width).
pub const MIN_SCALE: f32 = 0.01;
pub const MAX_SCALE: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Where the watermark sits on each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatermarkAnchor {
    #[default]
    Center,
    /// Repeated edge to edge, starting at the top-left corner.
    Tile,
    Corner(Corner),
}

/// A watermark request: encoded image plus how to blend and place it.
#[derive(Debug, Clone)]
pub struct WatermarkSpec {
    pub image: Arc<[u8]>,
    /// 0.0 skips compositing entirely.
    pub opacity: f32,
    /// Rendered width as a fraction of the page width.
    pub scale: f32,
    pub anchor: WatermarkAnchor,
}

impl WatermarkSpec {
    /// Spec using the configured default opacity and scale, centred.
    pub fn new(image: impl Into<Arc<[u8]>>, config: &WatermarkConfig) -> Self {
        Self {
            image: image.into(),
            opacity: config.default_opacity,
            scale: config.default_scale,
            anchor: WatermarkAnchor::Center,
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_anchor(mut self, anchor: WatermarkAnchor) -> Self {
        self.anchor = anchor;
        self
    }
}

/// Composites a watermark beneath the content of every page.
#[derive(Debug, Clone, Default)]
pub struct WatermarkCompositor {
    config: WatermarkConfig,
}

impl WatermarkCompositor {
    pub fn new(config: WatermarkConfig) -> Self {
        Self { config }
    }

    /// Attach the watermark layer to every page.
    ///
    /// With `opacity == 0.0` the pages are returned untouched and the image
    /// bytes are never looked at.
    #[instrument(skip_all, fields(pages = pages.len(), opacity = spec.opacity, anchor = ?spec.anchor))]
    pub fn apply(&self, pages: Vec<PageContent>, spec: &WatermarkSpec) -> Result<Vec<PageContent>> {
        if !(0.0..=1.0).contains(&spec.opacity) {
            return Err(ReportError::UnsupportedOpacity(spec.opacity));
        }
        if spec.opacity == 0.0 {
            debug!("Opacity is zero; watermark skipped");
            return Ok(pages);
        }
        if !(MIN_SCALE..=MAX_SCALE).contains(&spec.scale) {
            return Err(ReportError::InvalidWatermarkSpec(format!(
                "scale {} is outside {MIN_SCALE}..={MAX_SCALE}",
                spec.scale
            )));
        }
        if !(self.config.dpi.is_finite() && self.config.dpi > 0.0) {
            return Err(ReportError::InvalidWatermarkSpec(format!(
                "raster density {} dpi must be positive",
                self.config.dpi
            )));
        }

        let source = ImageProcessor::from_bytes(&spec.image, self.config.max_dimension_px)?;
        let (src_w, src_h) = (source.width(), source.height());
        if src_w == 0 || src_h == 0 {
            return Err(ReportError::ImageDecode("watermark image is empty".into()));
        }
        let aspect = src_h as f32 / src_w as f32;

        // One prepared layer per distinct page width, shared by every page
        // of that width.
        let mut prepared: Vec<(f32, Arc<RgbaImage>)> = Vec::new();

        let mut out = Vec::with_capacity(pages.len());
        for mut page in pages {
            let layer = match prepared.iter().find(|(w, _)| *w == page.size.width_mm) {
                Some((_, layer)) => Arc::clone(layer),
                None => {
                    let target_px = self.pixel_width(page.size.width_mm * spec.scale);
                    let layer = Arc::new(
                        source
                            .clone()
                            .resize_to_width(target_px)
                            .into_rgba_with_opacity(spec.opacity),
                    );
                    debug!(
                        page_width_mm = page.size.width_mm,
                        width_px = layer.width(),
                        height_px = layer.height(),
                        "Watermark layer prepared"
                    );
                    prepared.push((page.size.width_mm, Arc::clone(&layer)));
                    layer
                }
            };

            let width_mm = page.size.width_mm * spec.scale;
            let height_mm = width_mm * aspect;
            page.background = Some(BackgroundLayer {
                image: layer,
                placements: placements(page.size, width_mm, height_mm, spec.anchor),
            });
            out.push(page);
        }

        info!(
            pages = out.len(),
            layers = prepared.len(),
            "Watermark composited"
        );
        Ok(out)
    }

    fn pixel_width(&self, width_mm: f32) -> u32 {
        let px = (width_mm / MM_PER_INCH * self.config.dpi).round();
        (px as u32).clamp(1, self.config.max_dimension_px.max(1))
    }
}

fn placements(
    page: PageSize,
    width_mm: f32,
    height_mm: f32,
    anchor: WatermarkAnchor,
) -> Vec<Placement> {
    let at = |x_mm, y_mm| Placement {
        x_mm,
        y_mm,
        width_mm,
        height_mm,
    };
    match anchor {
        WatermarkAnchor::Center => vec![at(
            (page.width_mm - width_mm) / 2.0,
            (page.height_mm - height_mm) / 2.0,
        )],
        WatermarkAnchor::Corner(corner) => {
            let right = page.width_mm - width_mm - CORNER_INSET_MM;
            let bottom = page.height_mm - height_mm - CORNER_INSET_MM;
            let (x, y) = match corner {
                Corner::TopLeft => (CORNER_INSET_MM, CORNER_INSET_MM),
                Corner::TopRight => (right, CORNER_INSET_MM),
                Corner::BottomLeft => (CORNER_INSET_MM, bottom),
                Corner::BottomRight => (right, bottom),
            };
            vec![at(x, y)]
        }
        WatermarkAnchor::Tile => {
            let cols = (page.width_mm / width_mm).ceil().max(1.0) as usize;
            let rows = (page.height_mm / height_mm).ceil().max(1.0) as usize;
            (0..rows)
                .flat_map(|r| (0..cols).map(move |c| (c, r)))
                .map(|(c, r)| at(c as f32 * width_mm, r as f32 * height_mm))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ContentBlock, FontStyle, RgbColor, TextAlign, TextBlock};
    use image::{DynamicImage, Rgba};

    const LETTER_LANDSCAPE: PageSize = PageSize {
        width_mm: 279.4,
        height_mm: 215.9,
    };

    fn solid_png(width: u32, height: u32, px: Rgba<u8>) -> Vec<u8> {
        ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width, height, px,
        )))
        .to_png_bytes()
        .unwrap()
    }

    fn pages(count: usize) -> Vec<PageContent> {
        (0..count)
            .map(|i| {
                let mut page = PageContent::new(i, LETTER_LANDSCAPE);
                page.push(ContentBlock::Text(TextBlock {
                    text: format!("page {i}"),
                    x_mm: 25.0,
                    baseline_mm: 30.0,
                    size_pt: 12.0,
                    style: FontStyle::Regular,
                    align: TextAlign::Left,
                    color: RgbColor::BLACK,
                }));
                page
            })
            .collect()
    }

    fn compositor() -> WatermarkCompositor {
        WatermarkCompositor::new(WatermarkConfig {
            dpi: 30.0,
            ..WatermarkConfig::default()
        })
    }

    fn spec(image: Vec<u8>, opacity: f32) -> WatermarkSpec {
        WatermarkSpec::new(image, &WatermarkConfig::default()).with_opacity(opacity)
    }

    #[test]
    fn higher_opacity_darkens_the_centre_monotonically() {
        let black = solid_png(40, 20, Rgba([0, 0, 0, 255]));
        let (cx, cy) = (LETTER_LANDSCAPE.width_mm / 2.0, LETTER_LANDSCAPE.height_mm / 2.0);

        let mut previous_alpha = 0u8;
        let mut previous_sample = 255u8;
        for opacity in [0.06, 0.25, 0.5, 0.75, 1.0] {
            let out = compositor().apply(pages(1), &spec(black.clone(), opacity)).unwrap();
            let alpha = out[0].background_alpha(cx, cy);
            let sample = out[0].background_sample(cx, cy)[0];
            assert!(alpha > previous_alpha, "opacity {opacity}: alpha {alpha}");
            assert!(sample < previous_sample, "opacity {opacity}: sample {sample}");
            previous_alpha = alpha;
            previous_sample = sample;
        }
    }

    #[test]
    fn default_opacity_keeps_the_page_light() {
        let black = solid_png(40, 20, Rgba([0, 0, 0, 255]));
        let out = compositor().apply(pages(1), &spec(black, 0.06)).unwrap();
        let sample = out[0].background_sample(139.7, 107.95);
        assert!(sample[0] >= 235, "sample {sample:?}");
    }

    #[test]
    fn zero_opacity_is_a_passthrough_even_for_garbage() {
        let input = pages(3);
        let out = compositor()
            .apply(input.clone(), &spec(b"not an image".to_vec(), 0.0))
            .unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn undecodable_image_fails() {
        let err = compositor()
            .apply(pages(1), &spec(b"not an image".to_vec(), 0.5))
            .unwrap_err();
        assert!(matches!(err, ReportError::ImageDecode(_)));
    }

    #[test]
    fn out_of_range_opacity_is_rejected() {
        for opacity in [-0.1, 1.01, f32::NAN] {
            let err = compositor()
                .apply(pages(1), &spec(b"unused".to_vec(), opacity))
                .unwrap_err();
            assert!(matches!(err, ReportError::UnsupportedOpacity(_)));
        }
    }

    #[test]
    fn invalid_scale_is_rejected() {
        let png = solid_png(4, 4, Rgba([0, 0, 0, 255]));
        let err = compositor()
            .apply(pages(1), &spec(png, 0.5).with_scale(0.0))
            .unwrap_err();
        assert!(matches!(err, ReportError::InvalidWatermarkSpec(_)));
    }

    #[test]
    fn every_page_shares_one_layer_and_keeps_its_content() {
        let png = solid_png(40, 20, Rgba([10, 20, 30, 255]));
        let input = pages(4);
        let out = compositor().apply(input.clone(), &spec(png, 0.3)).unwrap();
        let first = out[0].background.as_ref().unwrap();
        for (before, after) in input.iter().zip(&out) {
            assert_eq!(before.blocks, after.blocks);
            let layer = after.background.as_ref().unwrap();
            assert!(Arc::ptr_eq(&layer.image, &first.image));
        }
    }

    #[test]
    fn centred_layer_uses_the_configured_width() {
        let png = solid_png(40, 20, Rgba([0, 0, 0, 255]));
        let out = compositor().apply(pages(1), &spec(png, 0.5)).unwrap();
        let placement = out[0].background.as_ref().unwrap().placements[0];
        assert!((placement.width_mm - LETTER_LANDSCAPE.width_mm * 0.6).abs() < 0.01);
        assert!((placement.height_mm - placement.width_mm / 2.0).abs() < 0.01);
        assert!((placement.x_mm * 2.0 + placement.width_mm - LETTER_LANDSCAPE.width_mm).abs() < 0.01);
        // Outside the watermark the paper stays white.
        assert_eq!(out[0].background_sample(1.0, 1.0), [255, 255, 255]);
    }

    #[test]
    fn corner_anchor_respects_the_inset() {
        let png = solid_png(10, 10, Rgba([0, 0, 0, 255]));
        let out = compositor()
            .apply(
                pages(1),
                &spec(png, 0.5)
                    .with_scale(0.2)
                    .with_anchor(WatermarkAnchor::Corner(Corner::BottomRight)),
            )
            .unwrap();
        let p = out[0].background.as_ref().unwrap().placements[0];
        assert!((p.x_mm + p.width_mm - (LETTER_LANDSCAPE.width_mm - CORNER_INSET_MM)).abs() < 0.01);
        assert!((p.y_mm + p.height_mm - (LETTER_LANDSCAPE.height_mm - CORNER_INSET_MM)).abs() < 0.01);
    }

    #[test]
    fn tiles_cover_the_whole_page() {
        let png = solid_png(10, 10, Rgba([0, 0, 0, 255]));
        let out = compositor()
            .apply(
                pages(1),
                &spec(png, 0.5).with_scale(0.3).with_anchor(WatermarkAnchor::Tile),
            )
            .unwrap();
        let page = &out[0];
        for (x, y) in [(0.5, 0.5), (279.0, 0.5), (0.5, 215.5), (279.0, 215.5)] {
            assert!(page.background_alpha(x, y) > 0, "uncovered at {x},{y}");
        }
    }

    #[test]
    fn mixed_page_widths_get_their_own_layer() {
        let png = solid_png(40, 20, Rgba([0, 0, 0, 255]));
        let mut input = pages(2);
        input[1].size = PageSize {
            width_mm: 215.9,
            height_mm: 279.4,
        };
        let out = compositor().apply(input, &spec(png, 0.5)).unwrap();
        let a = &out[0].background.as_ref().unwrap().image;
        let b = &out[1].background.as_ref().unwrap().image;
        assert!(a.width() > b.width());
    }
}
