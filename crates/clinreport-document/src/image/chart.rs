// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bar chart raster for the results summary, drawn with `imageproc`.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::page::RgbColor;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const AXIS: Rgba<u8> = Rgba([90, 90, 90, 255]);
const GRID: Rgba<u8> = Rgba([225, 225, 225, 255]);
const OUTLINE: Rgba<u8> = Rgba([46, 125, 50, 255]);

/// One bar: its value and fill colour.
#[derive(Debug, Clone, Copy)]
pub struct Bar {
    pub value: usize,
    pub color: RgbColor,
}

/// Draw a vertical bar chart of `bars` into a `width` x `height` raster.
///
/// Bars are scaled so the largest value reaches 90% of the plot height; a
/// chart whose values are all zero shows only axes and grid.
pub fn render_bar_chart(bars: &[Bar], width: u32, height: u32) -> RgbaImage {
    let width = width.max(40);
    let height = height.max(40);
    let mut img = RgbaImage::from_pixel(width, height, BACKGROUND);

    let margin = (width.min(height) / 10).max(4);
    let left = margin as f32;
    let bottom = (height - margin) as f32;
    let top = margin as f32;
    let right = (width - margin) as f32;
    let plot_h = bottom - top;

    for step in 1..=4 {
        let y = bottom - plot_h * step as f32 / 4.0;
        draw_line_segment_mut(&mut img, (left, y), (right, y), GRID);
    }

    let max_value = bars.iter().map(|b| b.value).max().unwrap_or(0);
    if !bars.is_empty() && max_value > 0 {
        let slot = (right - left) / bars.len() as f32;
        let bar_w = (slot * 0.6).max(1.0);
        for (i, bar) in bars.iter().enumerate() {
            if bar.value == 0 {
                continue;
            }
            let bar_h = (plot_h * 0.9 * bar.value as f32 / max_value as f32).max(1.0);
            let x = left + slot * i as f32 + (slot - bar_w) / 2.0;
            let y = bottom - bar_h;
            let rect = Rect::at(x as i32, y as i32).of_size(bar_w as u32, bar_h as u32);
            let RgbColor { r, g, b } = bar.color;
            draw_filled_rect_mut(&mut img, rect, Rgba([r, g, b, 255]));
            draw_hollow_rect_mut(&mut img, rect, OUTLINE);
        }
    }

    draw_line_segment_mut(&mut img, (left, top), (left, bottom), AXIS);
    draw_line_segment_mut(&mut img, (left, bottom), (right, bottom), AXIS);
    img
}
