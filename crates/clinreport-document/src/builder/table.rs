// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Evaluated-person results table: per-kind column schema, row construction and
// continuation-aware pagination.

use clinreport_core::types::{Ear, EvaluatedPerson, Measurement, ReportKind, ReportMetadata};
use tracing::debug;

use super::layout::{
    ACCENT, HEADING, MARGIN_LEFT_MM, ROW_ALT_FILL, SUBHEADING, Sheet, TABLE_HEADER_FILL,
    finding_fill, or_na, wrap_cell,
};
use crate::page::{ContentBlock, TableBlock, TableCell, TableColumn, TableRow, TextAlign};

pub(crate) const TABLE_FONT_PT: f32 = 10.0;
pub(crate) const TABLE_LINE_MM: f32 = 4.6;
pub(crate) const MAX_CELL_LINES: usize = 3;
const CELL_INSET_MM: f32 = 1.5;
const ROW_PADDING_MM: f32 = 4.6;
const MIN_ROW_MM: f32 = 10.0;
const HEADER_MM: f32 = 11.0;

/// Tallest row the table can produce: every cell capped at `MAX_CELL_LINES`.
pub(crate) const MAX_ROW_MM: f32 = MAX_CELL_LINES as f32 * TABLE_LINE_MM + ROW_PADDING_MM;

struct ColumnSpec {
    title: &'static str,
    ratio: f32,
    align: TextAlign,
}

const fn col(title: &'static str, ratio: f32, align: TextAlign) -> ColumnSpec {
    ColumnSpec {
        title,
        ratio,
        align,
    }
}

/// Column schema for a report kind. The last column is always the result.
fn column_specs(kind: ReportKind) -> [ColumnSpec; 7] {
    use TextAlign::{Center, Left};
    match kind {
        ReportKind::Audiometry => [
            col("No.", 0.05, Center),
            col("NAME", 0.24, Left),
            col("ID", 0.12, Center),
            col("AGE", 0.06, Center),
            col("POSITION", 0.17, Left),
            col("PTA R / L (dB)", 0.14, Center),
            col("RESULT", 0.22, Center),
        ],
        ReportKind::Spirometry => [
            col("No.", 0.05, Center),
            col("NAME", 0.24, Left),
            col("ID", 0.12, Center),
            col("AGE", 0.06, Center),
            col("POSITION", 0.15, Left),
            col("FEV1/FVC (FVC %)", 0.16, Center),
            col("RESULT", 0.22, Center),
        ],
    }
}

pub(crate) fn table_columns(kind: ReportKind, table_width_mm: f32) -> Vec<TableColumn> {
    column_specs(kind)
        .into_iter()
        .map(|spec| TableColumn {
            title: spec.title.to_string(),
            width_mm: table_width_mm * spec.ratio,
            align: spec.align,
        })
        .collect()
}

/// Cell texts for one person, matching `column_specs` order.
fn person_values(index: usize, person: &EvaluatedPerson) -> Vec<String> {
    let measured = match &person.measurement {
        Measurement::Audiometry(result) => {
            let pta = |ear| {
                result
                    .pure_tone_average(ear)
                    .map(|v| format!("{v:.0}"))
                    .unwrap_or_else(|| "-".into())
            };
            format!("{} / {}", pta(Ear::Right), pta(Ear::Left))
        }
        Measurement::Spirometry(result) => {
            format!("{:.2} ({:.0}%)", result.ratio(), result.fvc_percent_predicted)
        }
    };
    vec![
        (index + 1).to_string(),
        or_na(&person.full_name).to_string(),
        or_na(&person.identification).to_string(),
        person.age.map(|a| a.to_string()).unwrap_or_else(|| "N/A".into()),
        or_na(&person.position).to_string(),
        measured,
        person.measurement.finding().label(),
    ]
}

pub(crate) fn row_height(cells: &[TableCell]) -> f32 {
    let lines = cells.iter().map(|c| c.lines.len()).max().unwrap_or(1);
    (lines as f32 * TABLE_LINE_MM + ROW_PADDING_MM).max(MIN_ROW_MM)
}

fn person_row(columns: &[TableColumn], index: usize, person: &EvaluatedPerson) -> TableRow {
    let values = person_values(index, person);
    let result_col = columns.len() - 1;
    let cells: Vec<TableCell> = values
        .iter()
        .zip(columns)
        .enumerate()
        .map(|(i, (value, column))| {
            let is_result = i == result_col;
            TableCell {
                lines: wrap_cell(
                    value,
                    column.width_mm - 2.0 * CELL_INSET_MM,
                    TABLE_FONT_PT,
                    MAX_CELL_LINES,
                ),
                fill: is_result.then(|| finding_fill(person.measurement.finding().severity_rank())),
                bold: is_result,
            }
        })
        .collect();
    TableRow {
        person_index: Some(index),
        height_mm: row_height(&cells),
        cells,
        fill: (index % 2 == 1).then_some(ROW_ALT_FILL),
    }
}

/// Title block repeated at the top of every table page.
fn running_header(sheet: &mut Sheet, metadata: &ReportMetadata, continued: bool) {
    let cx = sheet.center_x_mm();
    let suffix = if continued { " (continued)" } else { "" };
    sheet.line(
        format!("{} RESULTS{suffix}", metadata.kind.heading()),
        cx,
        TextAlign::Center,
        HEADING,
        9.0,
    );
    sheet.line(
        format!("SITE: {}", or_na(&metadata.site).to_uppercase()),
        cx,
        TextAlign::Center,
        SUBHEADING,
        7.0,
    );
    sheet.advance(2.0);
    sheet.rule(2.0, ACCENT);
    sheet.advance(6.0);
}

/// Lay out the results table starting on a fresh page.
///
/// Each page takes rows while fewer than `max_rows` are placed and the next
/// row still fits above the bottom margin. A row is never split.
pub(crate) fn layout_results_table(
    sheet: &mut Sheet,
    metadata: &ReportMetadata,
    persons: &[EvaluatedPerson],
    max_rows: usize,
) {
    let max_rows = max_rows.max(1);
    let columns = table_columns(metadata.kind, sheet.content_width_mm());
    let mut pending = persons
        .iter()
        .enumerate()
        .map(|(i, p)| person_row(&columns, i, p))
        .peekable();

    let mut continued = false;
    while pending.peek().is_some() {
        sheet.start_page();
        running_header(sheet, metadata, continued);

        let remaining = sheet.remaining_mm();
        let mut used = HEADER_MM;
        let mut rows = Vec::new();
        while let Some(row) = pending.next_if(|row| {
            rows.len() < max_rows && (rows.is_empty() || used + row.height_mm <= remaining)
        }) {
            used += row.height_mm;
            rows.push(row);
        }

        debug!(
            page = sheet.page_count(),
            rows = rows.len(),
            continued,
            "Results table page laid out"
        );

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
        continued = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinreport_core::types::{SpirometryResult, ThresholdReading};

    fn spiro_person(name: &str) -> EvaluatedPerson {
        EvaluatedPerson {
            full_name: name.into(),
            identification: "8-123-456".into(),
            age: Some(41),
            position: "Operator".into(),
            department: String::new(),
            measurement: Measurement::Spirometry(SpirometryResult {
                fvc_liters: 4.0,
                fev1_liters: 2.4,
                fvc_percent_predicted: 90.0,
                fev1_percent_predicted: 72.0,
            }),
            observations: String::new(),
        }
    }

    #[test]
    fn column_ratios_fill_the_table() {
        for kind in [ReportKind::Audiometry, ReportKind::Spirometry] {
            let total: f32 = table_columns(kind, 200.0).iter().map(|c| c.width_mm).sum();
            assert!((total - 200.0).abs() < 0.01, "{kind}: {total}");
        }
    }

    #[test]
    fn result_cell_is_tinted_and_labelled() {
        let columns = table_columns(ReportKind::Spirometry, 229.4);
        let row = person_row(&columns, 0, &spiro_person("Ana"));
        let result = row.cells.last().unwrap();
        assert_eq!(result.lines, vec!["MILD OBSTRUCTION".to_string()]);
        assert_eq!(result.fill, Some(finding_fill(1)));
        assert_eq!(row.person_index, Some(0));
    }

    #[test]
    fn audiometry_row_shows_pure_tone_averages() {
        let person = EvaluatedPerson {
            measurement: Measurement::Audiometry(clinreport_core::types::AudiometryResult {
                thresholds: vec![
                    ThresholdReading {
                        ear: Ear::Right,
                        frequency_hz: 1000,
                        level_db: 20,
                    },
                    ThresholdReading {
                        ear: Ear::Left,
                        frequency_hz: 1000,
                        level_db: 35,
                    },
                ],
            }),
            ..spiro_person("Luis")
        };
        let values = person_values(4, &person);
        assert_eq!(values[0], "5");
        assert_eq!(values[5], "20 / 35");
    }

    #[test]
    fn longest_row_never_exceeds_cap() {
        let mut person = spiro_person(&"Very Long Name ".repeat(20));
        person.position = "Supervisor ".repeat(30);
        let columns = table_columns(ReportKind::Spirometry, 229.4);
        let row = person_row(&columns, 0, &person);
        assert!(row.height_mm <= MAX_ROW_MM + f32::EPSILON);
    }
}
