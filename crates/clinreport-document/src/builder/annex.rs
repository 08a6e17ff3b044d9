// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Annex index: the attachments appended after the report, in merge order,
// with the page each one starts on in the final document.

use clinreport_core::attachment::AttachmentCategory;
use tracing::debug;

use super::layout::{
    ACCENT, BODY, MARGIN_LEFT_MM, ROW_ALT_FILL, Sheet, TABLE_HEADER_FILL, wrap_cell,
};
use super::sections::{BODY_LINE_MM, section_heading};
use super::table::{TABLE_FONT_PT, TABLE_LINE_MM, row_height};
use crate::page::{ContentBlock, TableBlock, TableCell, TableColumn, TableRow, TextAlign};

pub(crate) const ANNEX_INDEX: &str = "ANNEX INDEX";
pub(crate) const ANNEXES: &str = "ANNEXES";

const HEADER_MM: f32 = 10.0;
const LABEL_LINES: usize = 2;
const CELL_INSET_MM: f32 = 1.5;
const INTRO: &str = "The following documents are appended to this report in the order listed.";

/// One attachment as it will appear after the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnexEntry {
    pub label: String,
    pub category: AttachmentCategory,
    pub order_rank: u32,
    /// Pages actually appended (blank pages already skipped).
    pub pages: u32,
}

fn columns(table_width_mm: f32) -> Vec<TableColumn> {
    use TextAlign::{Center, Left};
    [
        ("No.", 0.07, Center),
        ("DOCUMENT", 0.41, Left),
        ("CATEGORY", 0.18, Center),
        ("RANK", 0.10, Center),
        ("PAGES", 0.10, Center),
        ("FROM PAGE", 0.14, Center),
    ]
    .into_iter()
    .map(|(title, ratio, align)| TableColumn {
        title: title.to_string(),
        width_mm: table_width_mm * ratio,
        align,
    })
    .collect()
}

/// First page of each annex in the merged document, `None` for an annex
/// that contributes no pages.
pub(crate) fn start_pages(annexes: &[AnnexEntry], report_pages: usize) -> Vec<Option<usize>> {
    let mut next = report_pages + 1;
    annexes
        .iter()
        .map(|annex| {
            let start = (annex.pages > 0).then_some(next);
            next += annex.pages as usize;
            start
        })
        .collect()
}

fn annex_row(
    columns: &[TableColumn],
    index: usize,
    annex: &AnnexEntry,
    start: Option<usize>,
) -> TableRow {
    let values = [
        (index + 1).to_string(),
        annex.label.clone(),
        annex.category.to_string(),
        annex.order_rank.to_string(),
        annex.pages.to_string(),
        start.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
    ];
    let cells: Vec<TableCell> = values
        .iter()
        .zip(columns)
        .map(|(value, column)| TableCell {
            lines: wrap_cell(
                value,
                column.width_mm - 2.0 * CELL_INSET_MM,
                TABLE_FONT_PT,
                LABEL_LINES,
            ),
            fill: None,
            bold: false,
        })
        .collect();
    TableRow {
        person_index: None,
        height_mm: row_height(&cells),
        cells,
        fill: (index % 2 == 1).then_some(ROW_ALT_FILL),
    }
}

/// Lay out the annex index on a fresh page, continuing onto further pages
/// when the list is long. Returns the 1-based page holding the heading.
pub(crate) fn layout_annex_index(
    sheet: &mut Sheet,
    annexes: &[AnnexEntry],
    report_pages: usize,
) -> usize {
    let columns = columns(sheet.content_width_mm());
    let mut pending = annexes
        .iter()
        .zip(start_pages(annexes, report_pages))
        .enumerate()
        .map(|(i, (annex, start))| annex_row(&columns, i, annex, start))
        .peekable();

    sheet.start_page();
    let start = sheet.page_count();
    section_heading(sheet, ANNEX_INDEX);
    sheet.line(INTRO, MARGIN_LEFT_MM, TextAlign::Left, BODY, BODY_LINE_MM + 2.0);

    let mut first = true;
    while pending.peek().is_some() {
        if !first {
            sheet.start_page();
            section_heading(sheet, &format!("{ANNEX_INDEX} (continued)"));
        }
        first = false;

        let remaining = sheet.remaining_mm();
        let mut used = HEADER_MM;
        let mut rows = Vec::new();
        while let Some(row) =
            pending.next_if(|row| rows.is_empty() || used + row.height_mm <= remaining)
        {
            used += row.height_mm;
            rows.push(row);
        }
        sheet.push(ContentBlock::Table(TableBlock {
            left_mm: MARGIN_LEFT_MM,
            top_mm: sheet.cursor_mm(),
            header_height_mm: HEADER_MM,
            header_fill: TABLE_HEADER_FILL,
            border: ACCENT,
            columns: columns.clone(),
            rows,
            font_size_pt: TABLE_FONT_PT,
            line_height_mm: TABLE_LINE_MM,
        }));
        sheet.advance(used);
    }
    debug!(annexes = annexes.len(), report_pages, "Annex index laid out");
    start
}
