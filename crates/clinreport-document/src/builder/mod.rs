// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Report document builder: lays out metadata and evaluated persons into an
// ordered sequence of page content descriptors.
//
// Page 1 is the cover, page 2 the contents and page 3 the company profile.
// The results table starts on a fresh page and paginates without ever
// splitting a row. Conclusions, recommendations, the results summary and the
// technical team follow, then the annex index when attachments are appended.
// The footer pass runs last because it needs the page count.

mod annex;
mod layout;
mod outline;
mod profile;
mod sections;
mod summary;
mod table;

use clinreport_core::config::LayoutConfig;
use clinreport_core::error::{ReportError, Result};
use clinreport_core::types::{EvaluatedPerson, Measurement, ReportMetadata};
use tracing::{debug, info, instrument};

use crate::page::{PageContent, PageSize};
use layout::Sheet;
use outline::Outline;

pub use annex::AnnexEntry;
pub use summary::{FindingCount, ResultsSummary};

/// Turns report data into pages. Pure: no I/O, deterministic output.
#[derive(Debug, Clone, Default)]
pub struct ReportDocumentBuilder {
    layout: LayoutConfig,
}

impl ReportDocumentBuilder {
    pub fn new(layout: LayoutConfig) -> Self {
        Self { layout }
    }

    pub fn page_size(&self) -> PageSize {
        let geometry = self.layout.geometry();
        PageSize {
            width_mm: geometry.width_mm,
            height_mm: geometry.height_mm,
        }
    }

    /// Lay out the report without an annex index.
    ///
    /// Fails with `InvalidReportData` when `persons` is empty, when a
    /// measurement does not match the report kind, or when a measurement is
    /// structurally unusable.
    pub fn build(
        &self,
        metadata: &ReportMetadata,
        persons: &[EvaluatedPerson],
    ) -> Result<Vec<PageContent>> {
        self.build_with_annexes(metadata, persons, &[])
    }

    /// Lay out the report followed by an index of `annexes`, which must be
    /// in merge order.
    #[instrument(skip_all, fields(kind = %metadata.kind, persons = persons.len(), annexes = annexes.len()))]
    pub fn build_with_annexes(
        &self,
        metadata: &ReportMetadata,
        persons: &[EvaluatedPerson],
        annexes: &[AnnexEntry],
    ) -> Result<Vec<PageContent>> {
        validate(metadata, persons)?;

        // The contents page and the annex index print page numbers that are
        // only known after layout. Neither changes the geometry, so a second
        // pass with the first pass's outline is final.
        let (_, draft) = self.lay_out(metadata, persons, annexes, &Outline::default());
        let (mut pages, outline) = self.lay_out(metadata, persons, annexes, &draft);
        debug_assert_eq!(outline, draft);
        sections::apply_footers(&mut pages, metadata);

        info!(pages = pages.len(), "Report laid out");
        Ok(pages)
    }

    fn lay_out(
        &self,
        metadata: &ReportMetadata,
        persons: &[EvaluatedPerson],
        annexes: &[AnnexEntry],
        previous: &Outline,
    ) -> (Vec<PageContent>, Outline) {
        let mut outline = Outline::default();
        let mut sheet = Sheet::new(self.page_size());
        sections::layout_cover(&mut sheet, metadata, persons.len());
        outline::layout_contents(&mut sheet, previous);

        profile::layout_company_profile(&mut sheet, metadata);
        outline.mark(profile::COMPANY_PROFILE, sheet.page_count());

        outline.mark(
            format!("{} RESULTS", metadata.kind.heading()),
            sheet.page_count() + 1,
        );
        table::layout_results_table(
            &mut sheet,
            metadata,
            persons,
            self.layout.max_rows_per_page,
        );
        if let Some(page) = sections::layout_conclusions(&mut sheet, &metadata.conclusions) {
            outline.mark(sections::CONCLUSIONS, page);
        }
        if let Some(page) = sections::layout_recommendations(&mut sheet, &metadata.recommendations)
        {
            outline.mark(sections::RECOMMENDATIONS, page);
        }
        let summary = ResultsSummary::from_persons(metadata.kind, persons);
        let page = sections::layout_summary(&mut sheet, &summary);
        outline.mark(sections::RESULTS_SUMMARY, page);

        let page = profile::layout_technical_team(&mut sheet, &metadata.team());
        outline.mark(profile::TECHNICAL_TEAM, page);

        if !annexes.is_empty() {
            let page = annex::layout_annex_index(&mut sheet, annexes, previous.report_pages);
            outline.mark(annex::ANNEX_INDEX, page);
        }
        outline.report_pages = sheet.page_count();
        if annexes.iter().any(|a| a.pages > 0) {
            outline.mark(annex::ANNEXES, outline.report_pages + 1);
        }

        debug!(
            sections = outline.entries().len(),
            pages = outline.report_pages,
            "Layout pass complete"
        );
        (sheet.into_pages(), outline)
    }
}

fn validate(metadata: &ReportMetadata, persons: &[EvaluatedPerson]) -> Result<()> {
    if persons.is_empty() {
        return Err(ReportError::InvalidReportData(
            "at least one evaluated person is required".into(),
        ));
    }
    for (i, person) in persons.iter().enumerate() {
        let kind = person.measurement.kind();
        if kind != metadata.kind {
            return Err(ReportError::InvalidReportData(format!(
                "person #{} ({}) carries a {kind} measurement in a {} report",
                i + 1,
                person.full_name,
                metadata.kind
            )));
        }
        let problem = match &person.measurement {
            Measurement::Audiometry(result) if result.thresholds.is_empty() => {
                Some("audiometry without threshold readings")
            }
            Measurement::Spirometry(result) if !result.is_well_formed() => {
                Some("spirometry values must be positive numbers")
            }
            _ => None,
        };
        if let Some(problem) = problem {
            return Err(ReportError::InvalidReportData(format!(
                "person #{} ({}): {problem}",
                i + 1,
                person.full_name
            )));
        }
    }
    Ok(())
}
