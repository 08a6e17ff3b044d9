// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Report renderer: turns laid-out `PageContent` into PDF bytes using
// `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: each page is a `Vec<Op>`. Layout
// coordinates are millimetres from the top-left corner; PDF user space is
// points from the bottom-left, so every y value is flipped here.

use std::collections::HashMap;
use std::sync::Arc;

use clinreport_core::error::{ReportError, Result};
use image::RgbaImage;
use printpdf::{
    BuiltinFont, Color, Line, LinePoint, Mm, Op, PaintMode, PdfDocument, PdfPage, PdfSaveOptions,
    PdfWarnMsg, Point, Polygon, PolygonRing, Pt, RawImage, RawImageData, RawImageFormat, Rgb,
    TextItem, WindingOrder, XObject, XObjectId, XObjectTransform,
};
use tracing::{debug, info, instrument};

use crate::image::processor::flatten_on_white;
use crate::page::{
    ContentBlock, FontStyle, ImageBlock, PageContent, PageSize, RgbColor, RuleBlock, TableBlock,
    TextAlign, TextBlock,
};

/// Points per inch; images are placed at 72 dpi so one pixel is one point
/// before scaling.
const IMAGE_DPI: f32 = 72.0;
const CELL_INSET_MM: f32 = 1.5;
const TABLE_BORDER_PT: f32 = 0.6;

/// PDF bytes for the report pages.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub page_count: u32,
}

/// Serialises pages to PDF. Backgrounds are painted first, then blocks in
/// order, so a watermark never covers text.
#[derive(Debug, Clone, Default)]
pub struct ReportRenderer;

impl ReportRenderer {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip_all, fields(pages = pages.len(), title))]
    pub fn render(&self, pages: &[PageContent], title: &str) -> Result<RenderedReport> {
        if pages.is_empty() {
            return Err(ReportError::Render("no pages to render".into()));
        }

        let mut doc = PdfDocument::new(title);
        let mut images = ImageRegistry::default();
        let mut pdf_pages = Vec::with_capacity(pages.len());

        for page in pages {
            let mut canvas = Canvas::new(page.size);
            if let Some(layer) = &page.background {
                let id = images.register(&mut doc, &layer.image);
                for placement in &layer.placements {
                    canvas.image(
                        &id,
                        &layer.image,
                        placement.x_mm,
                        placement.y_mm,
                        placement.width_mm,
                        placement.height_mm,
                    );
                }
            }
            for block in &page.blocks {
                match block {
                    ContentBlock::Text(text) => canvas.text(text),
                    ContentBlock::Rule(rule) => canvas.rule(rule),
                    ContentBlock::Table(table) => canvas.table(table),
                    ContentBlock::Image(img) => {
                        let id = images.register(&mut doc, &img.image);
                        canvas.image_block(&id, img);
                    }
                }
            }
            pdf_pages.push(PdfPage::new(
                Mm(page.size.width_mm),
                Mm(page.size.height_mm),
                canvas.ops,
            ));
        }

        let page_count = pdf_pages.len() as u32;
        doc.with_pages(pdf_pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if bytes.is_empty() {
            return Err(ReportError::Render("serialiser produced no output".into()));
        }

        debug!(warnings = warnings.len(), images = images.len(), "PDF serialised");
        info!(page_count, bytes = bytes.len(), "Report rendered");
        Ok(RenderedReport { bytes, page_count })
    }
}

/// Adds each distinct raster to the document once, named `Im1`, `Im2`, ...
/// in order of first use. `PdfDocument::add_image` picks random names.
#[derive(Default)]
struct ImageRegistry {
    ids: HashMap<*const RgbaImage, XObjectId>,
}

impl ImageRegistry {
    fn register(&mut self, doc: &mut PdfDocument, image: &Arc<RgbaImage>) -> XObjectId {
        let next = self.ids.len() + 1;
        self.ids
            .entry(Arc::as_ptr(image))
            .or_insert_with(|| {
                let rgb = flatten_on_white(image);
                let raw = RawImage {
                    width: rgb.width() as usize,
                    height: rgb.height() as usize,
                    pixels: RawImageData::U8(rgb.into_raw()),
                    data_format: RawImageFormat::RGB8,
                    tag: Vec::new(),
                };
                let id = XObjectId(format!("Im{next}"));
                doc.resources
                    .xobjects
                    .map
                    .insert(id.clone(), XObject::Image(raw));
                id
            })
            .clone()
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Op list for one page, with mm-to-point conversion.
struct Canvas {
    ops: Vec<Op>,
    height_pt: f32,
}

fn pt(mm: f32) -> f32 {
    Mm(mm).into_pt().0
}

fn color(c: RgbColor) -> Color {
    Color::Rgb(Rgb::new(
        c.r as f32 / 255.0,
        c.g as f32 / 255.0,
        c.b as f32 / 255.0,
        None,
    ))
}

fn builtin(style: FontStyle) -> BuiltinFont {
    match style {
        FontStyle::Regular => BuiltinFont::Helvetica,
        FontStyle::Bold => BuiltinFont::HelveticaBold,
        FontStyle::Oblique => BuiltinFont::HelveticaOblique,
    }
}

impl Canvas {
    fn new(size: PageSize) -> Self {
        Self {
            ops: Vec::new(),
            height_pt: pt(size.height_mm),
        }
    }

    fn point(&self, x_mm: f32, y_mm: f32) -> Point {
        Point {
            x: Pt(pt(x_mm)),
            y: Pt(self.height_pt - pt(y_mm)),
        }
    }

    fn line_point(&self, x_mm: f32, y_mm: f32) -> LinePoint {
        LinePoint {
            p: self.point(x_mm, y_mm),
            bezier: false,
        }
    }

    fn text(&mut self, block: &TextBlock) {
        if block.text.trim().is_empty() {
            return;
        }
        let font = builtin(block.style);
        let pos = self.point(block.left_mm(), block.baseline_mm);
        self.ops.extend([
            Op::SaveGraphicsState,
            Op::SetFillColor {
                col: color(block.color),
            },
            Op::StartTextSection,
            Op::SetTextCursor { pos },
            Op::SetFontSizeBuiltinFont {
                size: Pt(block.size_pt),
                font,
            },
            Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(block.text.clone())],
                font,
            },
            Op::EndTextSection,
            Op::RestoreGraphicsState,
        ]);
    }

    fn stroke(&mut self, points: Vec<LinePoint>, thickness_pt: f32, c: RgbColor) {
        self.ops.extend([
            Op::SaveGraphicsState,
            Op::SetOutlineColor { col: color(c) },
            Op::SetOutlineThickness {
                pt: Pt(thickness_pt),
            },
            Op::DrawLine {
                line: Line {
                    points,
                    is_closed: false,
                },
            },
            Op::RestoreGraphicsState,
        ]);
    }

    fn rule(&mut self, rule: &RuleBlock) {
        let points = vec![
            self.line_point(rule.from.0, rule.from.1),
            self.line_point(rule.to.0, rule.to.1),
        ];
        self.stroke(points, rule.thickness_pt, rule.color);
    }

    fn fill_rect(&mut self, x_mm: f32, y_mm: f32, w_mm: f32, h_mm: f32, c: RgbColor) {
        let points = vec![
            self.line_point(x_mm, y_mm),
            self.line_point(x_mm + w_mm, y_mm),
            self.line_point(x_mm + w_mm, y_mm + h_mm),
            self.line_point(x_mm, y_mm + h_mm),
        ];
        self.ops.extend([
            Op::SaveGraphicsState,
            Op::SetFillColor { col: color(c) },
            Op::DrawPolygon {
                polygon: Polygon {
                    rings: vec![PolygonRing { points }],
                    mode: PaintMode::Fill,
                    winding_order: WindingOrder::NonZero,
                },
            },
            Op::RestoreGraphicsState,
        ]);
    }

    /// Lines of one cell, vertically centred in the row.
    #[allow(clippy::too_many_arguments)]
    fn cell_text(
        &mut self,
        lines: &[String],
        x_mm: f32,
        width_mm: f32,
        top_mm: f32,
        height_mm: f32,
        align: TextAlign,
        style: FontStyle,
        table: &TableBlock,
    ) {
        let block_h = lines.len() as f32 * table.line_height_mm;
        let first_baseline =
            top_mm + (height_mm - block_h) / 2.0 + table.line_height_mm * 0.75;
        let anchor = match align {
            TextAlign::Left => x_mm + CELL_INSET_MM,
            TextAlign::Center => x_mm + width_mm / 2.0,
            TextAlign::Right => x_mm + width_mm - CELL_INSET_MM,
        };
        for (i, line) in lines.iter().enumerate() {
            self.text(&TextBlock {
                text: line.clone(),
                x_mm: anchor,
                baseline_mm: first_baseline + i as f32 * table.line_height_mm,
                size_pt: table.font_size_pt,
                style,
                align,
                color: RgbColor::BLACK,
            });
        }
    }

    fn table(&mut self, table: &TableBlock) {
        let left = table.left_mm;
        let width = table.width_mm();
        let height = table.height_mm();

        // Fills first so borders and text sit on top.
        self.fill_rect(left, table.top_mm, width, table.header_height_mm, table.header_fill);
        let mut y = table.top_mm + table.header_height_mm;
        for row in &table.rows {
            if let Some(fill) = row.fill {
                self.fill_rect(left, y, width, row.height_mm, fill);
            }
            let mut x = left;
            for (cell, column) in row.cells.iter().zip(&table.columns) {
                if let Some(fill) = cell.fill {
                    self.fill_rect(x, y, column.width_mm, row.height_mm, fill);
                }
                x += column.width_mm;
            }
            y += row.height_mm;
        }

        // Grid.
        let bottom = table.top_mm + height;
        let mut y = table.top_mm;
        for h in std::iter::once(table.header_height_mm).chain(table.rows.iter().map(|r| r.height_mm)) {
            let points = vec![self.line_point(left, y), self.line_point(left + width, y)];
            self.stroke(points, TABLE_BORDER_PT, table.border);
            y += h;
        }
        let points = vec![self.line_point(left, bottom), self.line_point(left + width, bottom)];
        self.stroke(points, TABLE_BORDER_PT, table.border);
        let mut x = left;
        for column in table.columns.iter().map(|c| c.width_mm).chain(std::iter::once(0.0)) {
            let points = vec![self.line_point(x, table.top_mm), self.line_point(x, bottom)];
            self.stroke(points, TABLE_BORDER_PT, table.border);
            x += column;
        }

        // Text.
        let mut x = left;
        for column in &table.columns {
            self.cell_text(
                std::slice::from_ref(&column.title),
                x,
                column.width_mm,
                table.top_mm,
                table.header_height_mm,
                TextAlign::Center,
                FontStyle::Bold,
                table,
            );
            x += column.width_mm;
        }
        let mut y = table.top_mm + table.header_height_mm;
        for row in &table.rows {
            let mut x = left;
            for (cell, column) in row.cells.iter().zip(&table.columns) {
                let style = if cell.bold {
                    FontStyle::Bold
                } else {
                    FontStyle::Regular
                };
                self.cell_text(
                    &cell.lines,
                    x,
                    column.width_mm,
                    y,
                    row.height_mm,
                    column.align,
                    style,
                    table,
                );
                x += column.width_mm;
            }
            y += row.height_mm;
        }
    }

    /// Place a raster so its top-left corner is at (`x_mm`, `top_mm`).
    fn image(
        &mut self,
        id: &XObjectId,
        image: &RgbaImage,
        x_mm: f32,
        top_mm: f32,
        width_mm: f32,
        height_mm: f32,
    ) {
        let (w_px, h_px) = image.dimensions();
        if w_px == 0 || h_px == 0 {
            return;
        }
        let origin = self.point(x_mm, top_mm + height_mm);
        self.ops.push(Op::UseXobject {
            id: id.clone(),
            transform: XObjectTransform {
                translate_x: Some(origin.x),
                translate_y: Some(origin.y),
                scale_x: Some(pt(width_mm) / w_px as f32),
                scale_y: Some(pt(height_mm) / h_px as f32),
                dpi: Some(IMAGE_DPI),
                rotate: None,
            },
        });
    }

    fn image_block(&mut self, id: &XObjectId, block: &ImageBlock) {
        self.image(
            id,
            &block.image,
            block.x_mm,
            block.top_mm,
            block.width_mm,
            block.height_mm,
        );
    }
}
