// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout primitives shared by the report sections: margins, palette, text
// wrapping and a page sheet that tracks the vertical cursor.

use crate::page::{
    ContentBlock, FontStyle, PageContent, PageSize, RgbColor, RuleBlock, TextAlign, TextBlock,
    chars_per_width,
};

pub(crate) const MARGIN_LEFT_MM: f32 = 25.0;
pub(crate) const MARGIN_RIGHT_MM: f32 = 25.0;
pub(crate) const MARGIN_TOP_MM: f32 = 20.0;
/// The footer sits in the middle of the bottom margin.
pub(crate) const MARGIN_BOTTOM_MM: f32 = 30.0;

pub(crate) const ACCENT: RgbColor = RgbColor::hex(0x2E7D32);
pub(crate) const ACCENT_DARK: RgbColor = RgbColor::hex(0x1B5E20);
pub(crate) const TABLE_HEADER_FILL: RgbColor = RgbColor::hex(0xB7D58A);
pub(crate) const ROW_ALT_FILL: RgbColor = RgbColor::hex(0xF8FBF7);
pub(crate) const MUTED: RgbColor = RgbColor::hex(0x666666);
pub(crate) const STATS_HEADER_FILL: RgbColor = RgbColor::hex(0xDAEBC8);
pub(crate) const STATS_ROW_FILL: RgbColor = RgbColor::hex(0xF7FDF1);
pub(crate) const STATS_TOTAL_FILL: RgbColor = RgbColor::hex(0xFFF9E7);

/// Result tint by severity rank (normal, mild, moderate, severe).
pub(crate) const FINDING_FILLS: [RgbColor; 4] = [
    RgbColor::hex(0xC8E6C9),
    RgbColor::hex(0xFFF59D),
    RgbColor::hex(0xFFCC80),
    RgbColor::hex(0xEF9A9A),
];

pub(crate) fn finding_fill(severity_rank: u8) -> RgbColor {
    FINDING_FILLS[(severity_rank as usize).min(FINDING_FILLS.len() - 1)]
}

/// Size, weight and colour of a run of text.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Font {
    pub size_pt: f32,
    pub style: FontStyle,
    pub color: RgbColor,
}

impl Font {
    pub(crate) const fn new(size_pt: f32, style: FontStyle, color: RgbColor) -> Self {
        Self {
            size_pt,
            style,
            color,
        }
    }
}

pub(crate) const TITLE: Font = Font::new(20.0, FontStyle::Bold, ACCENT);
pub(crate) const HEADING: Font = Font::new(15.0, FontStyle::Bold, ACCENT);
pub(crate) const SUBHEADING: Font = Font::new(12.0, FontStyle::Bold, ACCENT);
pub(crate) const SECTION: Font = Font::new(14.0, FontStyle::Bold, ACCENT_DARK);
pub(crate) const LABEL: Font = Font::new(11.0, FontStyle::Bold, RgbColor::BLACK);
pub(crate) const BODY: Font = Font::new(11.0, FontStyle::Regular, RgbColor::BLACK);
pub(crate) const FOOTER: Font = Font::new(8.0, FontStyle::Regular, RgbColor::BLACK);
pub(crate) const FOOTER_NOTE: Font = Font::new(9.0, FontStyle::Oblique, MUTED);

pub(crate) const ELLIPSIS: char = '…';

/// Wrap a multi-line string so that no line exceeds `max_width` characters.
///
/// Splits on existing newlines first, then performs simple word-wrap within each
/// paragraph. Words longer than `max_width` are force-broken.
pub(crate) fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let max_width = max_width.max(1);
    let mut result = Vec::new();

    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            result.push(String::new());
            continue;
        }

        let mut current_line = String::with_capacity(max_width);
        let mut current_len = 0usize;

        for word in words {
            let word_len = word.chars().count();
            if word_len > max_width {
                if !current_line.is_empty() {
                    result.push(std::mem::take(&mut current_line));
                }
                let chars: Vec<char> = word.chars().collect();
                let mut chunks = chars.chunks(max_width).peekable();
                while let Some(chunk) = chunks.next() {
                    if chunks.peek().is_some() {
                        result.push(chunk.iter().collect());
                    } else {
                        current_line = chunk.iter().collect();
                        current_len = chunk.len();
                    }
                }
            } else if current_line.is_empty() {
                current_line.push_str(word);
                current_len = word_len;
            } else if current_len + 1 + word_len <= max_width {
                current_line.push(' ');
                current_line.push_str(word);
                current_len += 1 + word_len;
            } else {
                result.push(std::mem::replace(&mut current_line, word.to_string()));
                current_len = word_len;
            }
        }

        if !current_line.is_empty() {
            result.push(current_line);
        }
    }

    result
}

/// Wrap text into a table cell of `width_mm`, keeping at most `max_lines`.
/// Overflow is cut and marked with an ellipsis on the last kept line.
pub(crate) fn wrap_cell(text: &str, width_mm: f32, size_pt: f32, max_lines: usize) -> Vec<String> {
    let max_chars = chars_per_width(width_mm, size_pt);
    let mut lines = wrap_text(text.trim(), max_chars);
    lines.retain(|l| !l.is_empty());
    if lines.is_empty() {
        return vec![String::new()];
    }
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let keep = max_chars.saturating_sub(1);
            let mut cut: String = last.chars().take(keep).collect();
            cut.push(ELLIPSIS);
            *last = cut;
        }
    }
    lines
}

/// Placeholder for missing optional values.
pub(crate) fn or_na(value: &str) -> &str {
    if value.trim().is_empty() { "N/A" } else { value }
}

/// The growing page sequence with a vertical cursor on the last page.
pub(crate) struct Sheet {
    pages: Vec<PageContent>,
    size: PageSize,
    cursor_mm: f32,
}

impl Sheet {
    pub(crate) fn new(size: PageSize) -> Self {
        Self {
            pages: Vec::new(),
            size,
            cursor_mm: MARGIN_TOP_MM,
        }
    }

    pub(crate) fn content_width_mm(&self) -> f32 {
        self.size.width_mm - MARGIN_LEFT_MM - MARGIN_RIGHT_MM
    }

    pub(crate) fn content_bottom_mm(&self) -> f32 {
        self.size.height_mm - MARGIN_BOTTOM_MM
    }

    pub(crate) fn start_page(&mut self) {
        let index = self.pages.len();
        self.pages.push(PageContent::new(index, self.size));
        self.cursor_mm = MARGIN_TOP_MM;
    }

    pub(crate) fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub(crate) fn cursor_mm(&self) -> f32 {
        self.cursor_mm
    }

    pub(crate) fn advance(&mut self, mm: f32) {
        self.cursor_mm += mm;
    }

    pub(crate) fn remaining_mm(&self) -> f32 {
        self.content_bottom_mm() - self.cursor_mm
    }

    pub(crate) fn fits(&self, height_mm: f32) -> bool {
        !self.pages.is_empty() && height_mm <= self.remaining_mm()
    }

    pub(crate) fn push(&mut self, block: ContentBlock) {
        if self.pages.is_empty() {
            self.start_page();
        }
        if let Some(page) = self.pages.last_mut() {
            page.push(block);
        }
    }

    /// Place a single text run at an explicit baseline.
    pub(crate) fn text_at(
        &mut self,
        text: impl Into<String>,
        x_mm: f32,
        baseline_mm: f32,
        align: TextAlign,
        font: Font,
    ) {
        self.push(ContentBlock::Text(TextBlock {
            text: text.into(),
            x_mm,
            baseline_mm,
            size_pt: font.size_pt,
            style: font.style,
            align,
            color: font.color,
        }));
    }

    /// Place a line of text in a band of `advance_mm` starting at the cursor,
    /// then move the cursor past the band.
    pub(crate) fn line(
        &mut self,
        text: impl Into<String>,
        x_mm: f32,
        align: TextAlign,
        font: Font,
        advance_mm: f32,
    ) {
        let baseline_mm = self.cursor_mm + advance_mm * 0.75;
        self.text_at(text, x_mm, baseline_mm, align, font);
        self.cursor_mm += advance_mm;
    }

    /// Horizontal centre of the page.
    pub(crate) fn center_x_mm(&self) -> f32 {
        self.size.width_mm / 2.0
    }

    /// Full-width horizontal rule at the cursor.
    pub(crate) fn rule(&mut self, thickness_pt: f32, color: RgbColor) {
        let y = self.cursor_mm;
        self.push(ContentBlock::Rule(RuleBlock {
            from: (MARGIN_LEFT_MM, y),
            to: (self.size.width_mm - MARGIN_RIGHT_MM, y),
            thickness_pt,
            color,
        }));
    }

    pub(crate) fn into_pages(self) -> Vec<PageContent> {
        self.pages
    }
}
