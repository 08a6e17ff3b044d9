// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page content model: what the builder lays out, the compositor decorates and
// the renderer serialises.
//
// All coordinates are millimetres measured from the top-left corner of the
// page. Text positions are baselines.

use std::sync::Arc;

use image::RgbaImage;

/// Millimetres per typographic point.
pub const MM_PER_PT: f32 = 0.3528;

/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH_EM: f32 = 0.50;

/// Estimated rendered width of `text` in millimetres.
pub fn estimate_text_width_mm(text: &str, size_pt: f32) -> f32 {
    text.chars().count() as f32 * AVG_GLYPH_WIDTH_EM * size_pt * MM_PER_PT
}

/// Characters of average width that fit into `width_mm`.
pub fn chars_per_width(width_mm: f32, size_pt: f32) -> usize {
    let per_char = AVG_GLYPH_WIDTH_EM * size_pt * MM_PER_PT;
    ((width_mm / per_char).floor() as usize).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_mm: f32,
    pub height_mm: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const BLACK: Self = Self::hex(0x000000);
    pub const WHITE: Self = Self::hex(0xFFFFFF);

    /// Build a colour from `0xRRGGBB`.
    pub const fn hex(value: u32) -> Self {
        Self {
            r: ((value >> 16) & 0xFF) as u8,
            g: ((value >> 8) & 0xFF) as u8,
            b: (value & 0xFF) as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
    Oblique,
}

/// Horizontal alignment of text relative to its anchor `x_mm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// A single line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub x_mm: f32,
    pub baseline_mm: f32,
    pub size_pt: f32,
    pub style: FontStyle,
    pub align: TextAlign,
    pub color: RgbColor,
}

impl TextBlock {
    /// Left edge of the text once alignment is applied.
    pub fn left_mm(&self) -> f32 {
        let width = estimate_text_width_mm(&self.text, self.size_pt);
        match self.align {
            TextAlign::Left => self.x_mm,
            TextAlign::Center => self.x_mm - width / 2.0,
            TextAlign::Right => self.x_mm - width,
        }
    }
}

/// A straight line.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleBlock {
    pub from: (f32, f32),
    pub to: (f32, f32),
    pub thickness_pt: f32,
    pub color: RgbColor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub title: String,
    pub width_mm: f32,
    pub align: TextAlign,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    /// Pre-wrapped lines.
    pub lines: Vec<String>,
    pub fill: Option<RgbColor>,
    pub bold: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// Index of the evaluated person this row shows, if any.
    pub person_index: Option<usize>,
    pub cells: Vec<TableCell>,
    pub height_mm: f32,
    pub fill: Option<RgbColor>,
}

/// A table fragment: header plus the rows placed on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    pub left_mm: f32,
    pub top_mm: f32,
    pub header_height_mm: f32,
    pub header_fill: RgbColor,
    pub border: RgbColor,
    pub columns: Vec<TableColumn>,
    pub rows: Vec<TableRow>,
    pub font_size_pt: f32,
    pub line_height_mm: f32,
}

impl TableBlock {
    pub fn width_mm(&self) -> f32 {
        self.columns.iter().map(|c| c.width_mm).sum()
    }

    pub fn height_mm(&self) -> f32 {
        self.header_height_mm + self.rows.iter().map(|r| r.height_mm).sum::<f32>()
    }
}

/// A raster drawn in the foreground (charts).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    pub image: Arc<RgbaImage>,
    pub x_mm: f32,
    pub top_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(TextBlock),
    Rule(RuleBlock),
    Table(TableBlock),
    Image(ImageBlock),
}

/// Where one copy of the background raster sits on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x_mm: f32,
    pub y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

impl Placement {
    fn contains(&self, x_mm: f32, y_mm: f32) -> bool {
        x_mm >= self.x_mm
            && x_mm < self.x_mm + self.width_mm
            && y_mm >= self.y_mm
            && y_mm < self.y_mm + self.height_mm
    }
}

/// A translucent raster drawn beneath every block of the page.
///
/// The image is shared between pages; its alpha channel already carries the
/// watermark opacity.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundLayer {
    pub image: Arc<RgbaImage>,
    pub placements: Vec<Placement>,
}

/// One renderable page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    /// 0-based position in the report.
    pub index: usize,
    pub size: PageSize,
    /// Foreground content, in drawing order.
    pub blocks: Vec<ContentBlock>,
    pub background: Option<BackgroundLayer>,
}

impl PageContent {
    pub fn new(index: usize, size: PageSize) -> Self {
        Self {
            index,
            size,
            blocks: Vec::new(),
            background: None,
        }
    }

    pub fn push(&mut self, block: ContentBlock) {
        self.blocks.push(block);
    }

    /// Person indices of every table row on this page, in order.
    pub fn person_rows(&self) -> Vec<usize> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Table(t) => Some(t.rows.iter().filter_map(|r| r.person_index)),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Concatenated text of all text blocks (for assertions and search).
    pub fn text(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            match block {
                ContentBlock::Text(t) => {
                    out.push_str(&t.text);
                    out.push('\n');
                }
                ContentBlock::Table(t) => {
                    for row in &t.rows {
                        for cell in &row.cells {
                            out.push_str(&cell.lines.join(" "));
                            out.push('\t');
                        }
                        out.push('\n');
                    }
                }
                _ => {}
            }
        }
        out
    }

    /// Alpha of the background layer at a point, 0 where no copy covers it.
    pub fn background_alpha(&self, x_mm: f32, y_mm: f32) -> u8 {
        self.background_pixel(x_mm, y_mm)
            .map(|px| px[3])
            .unwrap_or(0)
    }

    /// Colour of the paper at a point after the background layer has been
    /// drawn over white, using 8-bit sRGB source-over blending.
    pub fn background_sample(&self, x_mm: f32, y_mm: f32) -> [u8; 3] {
        match self.background_pixel(x_mm, y_mm) {
            Some(px) => blend_over_white(px),
            None => [255, 255, 255],
        }
    }

    fn background_pixel(&self, x_mm: f32, y_mm: f32) -> Option<[u8; 4]> {
        let layer = self.background.as_ref()?;
        let placement = layer.placements.iter().find(|p| p.contains(x_mm, y_mm))?;
        let (w, h) = layer.image.dimensions();
        if w == 0 || h == 0 {
            return None;
        }
        let px = (((x_mm - placement.x_mm) / placement.width_mm) * w as f32) as u32;
        let py = (((y_mm - placement.y_mm) / placement.height_mm) * h as f32) as u32;
        Some(layer.image.get_pixel(px.min(w - 1), py.min(h - 1)).0)
    }
}

/// Source-over blend of one RGBA pixel onto white paper.
pub fn blend_over_white(px: [u8; 4]) -> [u8; 3] {
    let a = px[3] as u32;
    let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
    [blend(px[0]), blend(px[1]), blend(px[2])]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn page_with_layer(alpha: u8) -> PageContent {
        let mut page = PageContent::new(
            0,
            PageSize {
                width_mm: 100.0,
                height_mm: 100.0,
            },
        );
        page.background = Some(BackgroundLayer {
            image: Arc::new(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, alpha]))),
            placements: vec![Placement {
                x_mm: 25.0,
                y_mm: 25.0,
                width_mm: 50.0,
                height_mm: 50.0,
            }],
        });
        page
    }

    #[test]
    fn blend_extremes() {
        assert_eq!(blend_over_white([10, 20, 30, 0]), [255, 255, 255]);
        assert_eq!(blend_over_white([10, 20, 30, 255]), [10, 20, 30]);
    }

    #[test]
    fn sample_outside_placement_is_paper() {
        let page = page_with_layer(200);
        assert_eq!(page.background_sample(5.0, 5.0), [255, 255, 255]);
        assert_eq!(page.background_alpha(5.0, 5.0), 0);
    }

    #[test]
    fn sample_inside_placement_is_darkened() {
        let page = page_with_layer(128);
        let [r, _, _] = page.background_sample(50.0, 50.0);
        assert_eq!(r, 127);
        assert_eq!(page.background_alpha(50.0, 50.0), 128);
    }

    #[test]
    fn centered_text_left_edge() {
        let block = TextBlock {
            text: "abcd".into(),
            x_mm: 100.0,
            baseline_mm: 10.0,
            size_pt: 10.0,
            style: FontStyle::Regular,
            align: TextAlign::Center,
            color: RgbColor::BLACK,
        };
        let width = estimate_text_width_mm("abcd", 10.0);
        assert!((block.left_mm() - (100.0 - width / 2.0)).abs() < 1e-4);
    }

    #[test]
    fn hex_colour_components() {
        let c = RgbColor::hex(0x2E7D32);
        assert_eq!((c.r, c.g, c.b), (0x2E, 0x7D, 0x32));
    }
}
