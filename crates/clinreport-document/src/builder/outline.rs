// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Section start pages and the contents page that lists them.

use tracing::debug;

use super::layout::{BODY, LABEL, MARGIN_LEFT_MM, Sheet};
use super::sections::section_heading;
use crate::page::TextAlign;

pub(crate) const CONTENTS: &str = "CONTENTS";
const ENTRY_MM: f32 = 8.0;

/// Where each section starts, recorded while laying out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Outline {
    entries: Vec<(String, usize)>,
    /// Pages of the report proper, before any attachment.
    pub report_pages: usize,
}

impl Outline {
    pub(crate) fn mark(&mut self, title: impl Into<String>, page: usize) {
        self.entries.push((title.into(), page));
    }

    pub(crate) fn entries(&self) -> &[(String, usize)] {
        &self.entries
    }
}

/// Page 2: one line per section with its start page.
///
/// Always a single page of its own, so the page numbers it prints never move
/// anything else.
pub(crate) fn layout_contents(sheet: &mut Sheet, outline: &Outline) {
    sheet.start_page();
    section_heading(sheet, CONTENTS);
    sheet.advance(4.0);

    let right = sheet.content_width_mm() + MARGIN_LEFT_MM;
    for (title, page) in outline.entries() {
        let baseline = sheet.cursor_mm() + ENTRY_MM * 0.75;
        sheet.text_at(title.clone(), MARGIN_LEFT_MM, baseline, TextAlign::Left, LABEL);
        sheet.text_at(page.to_string(), right, baseline, TextAlign::Right, BODY);
        sheet.advance(ENTRY_MM);
    }
    debug!(entries = outline.entries().len(), "Contents laid out");
}
