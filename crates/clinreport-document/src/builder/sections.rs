// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cover page, trailing sections (conclusions, recommendations, results
// summary) and the footer pass.

use std::sync::Arc;

use chrono::NaiveDate;
use clinreport_core::types::ReportMetadata;
use tracing::debug;

use super::layout::{
    ACCENT, BODY, FOOTER, FOOTER_NOTE, LABEL, MARGIN_BOTTOM_MM, MARGIN_LEFT_MM, MARGIN_RIGHT_MM,
    SECTION, STATS_HEADER_FILL, STATS_ROW_FILL, STATS_TOTAL_FILL, SUBHEADING, Sheet, TITLE,
    finding_fill, or_na, wrap_text,
};
use super::summary::ResultsSummary;
use crate::image::chart::{Bar, render_bar_chart};
use crate::page::{
    ContentBlock, ImageBlock, PageContent, RgbColor, TableBlock, TableCell, TableColumn,
    TableRow, TextAlign, TextBlock, chars_per_width,
};

pub(crate) const SECTION_GAP_MM: f32 = 8.0;
pub(crate) const SECTION_HEADING_MM: f32 = 12.0;
pub(crate) const BODY_LINE_MM: f32 = 5.5;
const BULLET_INDENT_MM: f32 = 6.0;

const STATS_HEADER_MM: f32 = 9.0;
const STATS_ROW_MM: f32 = 7.0;
const STATS_FONT_PT: f32 = 9.0;
const CHART_GAP_MM: f32 = 12.0;
const CHART_MAX_WIDTH_MM: f32 = 120.0;
const CHART_PX_PER_MM: f32 = 4.0;

/// Page 1: institutional header and metadata block.
pub(crate) fn layout_cover(sheet: &mut Sheet, metadata: &ReportMetadata, persons: usize) {
    sheet.start_page();
    let cx = sheet.center_x_mm();

    sheet.line(
        or_na(&metadata.institution).to_uppercase(),
        cx,
        TextAlign::Center,
        SUBHEADING,
        10.0,
    );
    sheet.advance(6.0);
    sheet.line(
        format!("{} REPORT", metadata.kind.heading()),
        cx,
        TextAlign::Center,
        TITLE,
        12.0,
    );
    sheet.line(
        "Occupational health evaluation",
        cx,
        TextAlign::Center,
        BODY,
        8.0,
    );
    sheet.advance(3.0);
    sheet.rule(2.0, ACCENT);
    sheet.advance(12.0);

    let evaluator = &metadata.evaluator;
    let fields = [
        ("Company:", or_na(&metadata.company).to_string()),
        ("Site:", or_na(&metadata.site).to_string()),
        ("Study:", metadata.kind.heading().to_string()),
        ("Persons evaluated:", persons.to_string()),
        ("Evaluator:", or_na(&evaluator.name).to_string()),
        ("Profession:", or_na(&evaluator.profession).to_string()),
        ("Registry:", or_na(&evaluator.registry).to_string()),
        ("Issue date:", format_date(metadata.issue_date)),
        ("Report ID:", or_na(&metadata.report_id).to_string()),
    ];
    let label_x = MARGIN_LEFT_MM + 30.0;
    let value_x = label_x + 50.0;
    for (label, value) in fields {
        let baseline = sheet.cursor_mm() + 6.0;
        sheet.text_at(label, label_x, baseline, TextAlign::Left, LABEL);
        sheet.text_at(value, value_x, baseline, TextAlign::Left, BODY);
        sheet.advance(9.0);
    }
}

/// A wrapped line of a text section with its indent.
struct FlowLine {
    indent_mm: f32,
    text: String,
}

fn paragraph_lines(text: &str, width_mm: f32) -> Vec<FlowLine> {
    let max_chars = chars_per_width(width_mm, BODY.size_pt);
    let mut lines = Vec::new();
    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !lines.is_empty() {
            lines.push(FlowLine {
                indent_mm: 0.0,
                text: String::new(),
            });
        }
        let joined = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
        lines.extend(wrap_text(&joined, max_chars).into_iter().map(|text| FlowLine {
            indent_mm: 0.0,
            text,
        }));
    }
    lines
}

fn bullet_lines(text: &str, width_mm: f32) -> Vec<FlowLine> {
    let max_chars = chars_per_width(width_mm - BULLET_INDENT_MM, BODY.size_pt);
    let mut lines = Vec::new();
    for item in text
        .lines()
        .map(|l| l.trim().trim_start_matches(['-', '*', '•']).trim())
        .filter(|l| !l.is_empty())
    {
        for (i, text) in wrap_text(item, max_chars).into_iter().enumerate() {
            if i == 0 {
                lines.push(FlowLine {
                    indent_mm: 0.0,
                    text: format!("•  {text}"),
                });
            } else {
                lines.push(FlowLine {
                    indent_mm: BULLET_INDENT_MM,
                    text,
                });
            }
        }
    }
    lines
}

pub(crate) fn section_heading(sheet: &mut Sheet, title: &str) {
    sheet.line(title, MARGIN_LEFT_MM, TextAlign::Left, SECTION, 8.0);
    sheet.rule(1.5, ACCENT);
    sheet.advance(SECTION_HEADING_MM - 8.0);
}

/// Place a heading and its lines on the last page when everything fits,
/// otherwise start a new page; lines that overflow continue on further pages.
/// Returns the 1-based page holding the heading.
fn flow_section(sheet: &mut Sheet, title: &str, lines: Vec<FlowLine>) -> usize {
    let needed = SECTION_GAP_MM + SECTION_HEADING_MM + lines.len() as f32 * BODY_LINE_MM;
    if sheet.fits(needed) {
        sheet.advance(SECTION_GAP_MM);
    } else {
        sheet.start_page();
    }
    section_heading(sheet, title);
    let start = sheet.page_count();

    for line in lines {
        if !sheet.fits(BODY_LINE_MM) {
            sheet.start_page();
            section_heading(sheet, &format!("{title} (continued)"));
        }
        sheet.line(
            line.text,
            MARGIN_LEFT_MM + line.indent_mm,
            TextAlign::Left,
            BODY,
            BODY_LINE_MM,
        );
    }
    start
}

pub(crate) const CONCLUSIONS: &str = "CONCLUSIONS";
pub(crate) const RECOMMENDATIONS: &str = "RECOMMENDATIONS";
pub(crate) const RESULTS_SUMMARY: &str = "RESULTS SUMMARY";

/// Returns the start page, or `None` when there is nothing to print.
pub(crate) fn layout_conclusions(sheet: &mut Sheet, text: &str) -> Option<usize> {
    let lines = paragraph_lines(text, sheet.content_width_mm());
    (!lines.is_empty()).then(|| flow_section(sheet, CONCLUSIONS, lines))
}

pub(crate) fn layout_recommendations(sheet: &mut Sheet, text: &str) -> Option<usize> {
    let lines = bullet_lines(text, sheet.content_width_mm());
    (!lines.is_empty()).then(|| flow_section(sheet, RECOMMENDATIONS, lines))
}

fn stats_cell(text: String, fill: Option<RgbColor>, bold: bool) -> TableCell {
    TableCell {
        lines: vec![text],
        fill,
        bold,
    }
}

fn stats_table(summary: &ResultsSummary, left_mm: f32, top_mm: f32, width_mm: f32) -> TableBlock {
    let columns = vec![
        TableColumn {
            title: format!("{} RESULT", summary.kind.heading()),
            width_mm: width_mm * 0.64,
            align: TextAlign::Left,
        },
        TableColumn {
            title: "COUNT".into(),
            width_mm: width_mm * 0.18,
            align: TextAlign::Center,
        },
        TableColumn {
            title: "%".into(),
            width_mm: width_mm * 0.18,
            align: TextAlign::Center,
        },
    ];
    let mut rows: Vec<TableRow> = summary
        .rows
        .iter()
        .map(|row| TableRow {
            person_index: None,
            cells: vec![
                stats_cell(
                    row.label.clone(),
                    Some(finding_fill(row.finding.severity_rank())),
                    false,
                ),
                stats_cell(row.count.to_string(), None, false),
                stats_cell(format!("{:.0}%", row.percent), None, false),
            ],
            height_mm: STATS_ROW_MM,
            fill: Some(STATS_ROW_FILL),
        })
        .collect();
    rows.push(TableRow {
        person_index: None,
        cells: vec![
            stats_cell("TOTAL".into(), None, true),
            stats_cell(summary.total.to_string(), None, true),
            stats_cell(if summary.total > 0 { "100%" } else { "0%" }.into(), None, true),
        ],
        height_mm: STATS_ROW_MM,
        fill: Some(STATS_TOTAL_FILL),
    });
    TableBlock {
        left_mm,
        top_mm,
        header_height_mm: STATS_HEADER_MM,
        header_fill: STATS_HEADER_FILL,
        border: ACCENT,
        columns,
        rows,
        font_size_pt: STATS_FONT_PT,
        line_height_mm: 4.0,
    }
}

/// Results summary: statistics table, bar chart and analysis paragraph.
/// Returns the 1-based page holding the heading.
pub(crate) fn layout_summary(sheet: &mut Sheet, summary: &ResultsSummary) -> usize {
    let content_w = sheet.content_width_mm();
    let table_w = content_w * 0.45;
    let table_h = STATS_HEADER_MM + (summary.rows.len() + 1) as f32 * STATS_ROW_MM;
    let chart_w = (content_w - table_w - CHART_GAP_MM).min(CHART_MAX_WIDTH_MM);
    let chart_h = (chart_w * 0.6).min(table_h.max(40.0));
    let analysis = wrap_text(
        &summary.analysis_text(),
        chars_per_width(content_w, BODY.size_pt),
    );
    let needed = SECTION_GAP_MM
        + SECTION_HEADING_MM
        + table_h.max(chart_h)
        + 14.0
        + analysis.len() as f32 * BODY_LINE_MM;

    if sheet.fits(needed) {
        sheet.advance(SECTION_GAP_MM);
    } else {
        sheet.start_page();
    }
    section_heading(sheet, RESULTS_SUMMARY);
    let start = sheet.page_count();

    let top = sheet.cursor_mm();
    sheet.push(ContentBlock::Table(stats_table(summary, MARGIN_LEFT_MM, top, table_w)));

    let bars: Vec<Bar> = summary
        .rows
        .iter()
        .map(|row| Bar {
            value: row.count,
            color: finding_fill(row.finding.severity_rank()),
        })
        .collect();
    let chart = render_bar_chart(
        &bars,
        (chart_w * CHART_PX_PER_MM) as u32,
        (chart_h * CHART_PX_PER_MM) as u32,
    );
    sheet.push(ContentBlock::Image(ImageBlock {
        image: Arc::new(chart),
        x_mm: MARGIN_LEFT_MM + table_w + CHART_GAP_MM,
        top_mm: top,
        width_mm: chart_w,
        height_mm: chart_h,
    }));
    sheet.advance(table_h.max(chart_h) + 8.0);

    sheet.line(
        "Analysis of results:",
        MARGIN_LEFT_MM,
        TextAlign::Left,
        LABEL,
        6.0,
    );
    for line in analysis {
        sheet.line(line, MARGIN_LEFT_MM, TextAlign::Left, BODY, BODY_LINE_MM);
    }
    debug!(total = summary.total, "Results summary laid out");
    start
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Stamp issue date, institution and "Page N of M" on every page. Runs once
/// the page count is final.
pub(crate) fn apply_footers(pages: &mut [PageContent], metadata: &ReportMetadata) {
    let total = pages.len();
    let issued = format!("Issued: {}", format_date(metadata.issue_date));
    for (i, page) in pages.iter_mut().enumerate() {
        let baseline = page.size.height_mm - MARGIN_BOTTOM_MM / 2.0;
        let blocks = [
            (
                issued.clone(),
                MARGIN_LEFT_MM,
                baseline,
                TextAlign::Left,
                FOOTER,
            ),
            (
                format!("Page {} of {total}", i + 1),
                page.size.width_mm - MARGIN_RIGHT_MM,
                baseline,
                TextAlign::Right,
                FOOTER,
            ),
            (
                metadata.institution.trim().to_string(),
                page.size.width_mm / 2.0,
                baseline - 5.0,
                TextAlign::Center,
                FOOTER_NOTE,
            ),
        ];
        for (text, x_mm, baseline_mm, align, font) in blocks {
            if text.is_empty() {
                continue;
            }
            page.push(ContentBlock::Text(TextBlock {
                text,
                x_mm,
                baseline_mm,
                size_pt: font.size_pt,
                style: font.style,
                align,
                color: font.color,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullets_strip_markers_and_indent_continuations() {
        let lines = bullet_lines("- wear hearing protection at all times in the plant\n\n* retest", 60.0);
        assert!(lines[0].text.starts_with("•  wear"));
        assert!(lines.iter().any(|l| l.indent_mm == BULLET_INDENT_MM));
        assert_eq!(lines.last().unwrap().text, "•  retest");
    }

    #[test]
    fn paragraphs_are_separated_by_blank_lines() {
        let lines = paragraph_lines("First.\n\nSecond.", 200.0);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["First.", "", "Second."]);
    }

    #[test]
    fn blank_text_produces_no_lines() {
        assert!(paragraph_lines("  \n\n ", 200.0).is_empty());
        assert!(bullet_lines("\n-\n", 200.0).is_empty());
    }

    #[test]
    fn date_format_is_day_first() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(format_date(date), "07/03/2026");
    }
}
