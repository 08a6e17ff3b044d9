// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end pipeline: validate attachments -> build -> watermark -> render
// -> merge -> export. Attachments are validated first so the report can
// index exactly the annexes that will follow it.
// Each stage takes the previous stage's output by value; the first fatal
// error aborts the run and carries its stage via `ReportError::stage`.

use clinreport_core::attachment::AttachmentRef;
use clinreport_core::config::PipelineConfig;
use clinreport_core::error::{ReportError, Result};
use clinreport_core::types::{EvaluatedPerson, ReportMetadata};
use clinreport_document::{
    AnnexEntry, AttachmentMerger, RenderedReport, ReportDocumentBuilder, ReportRenderer,
    WatermarkCompositor, WatermarkSpec,
};
use tracing::{info, instrument};

use crate::bundle::ExportBundle;
use crate::cancel::CancelToken;
use crate::exporter::PackageExporter;
use crate::target::ExportTarget;

/// Everything one report export needs.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub metadata: ReportMetadata,
    pub persons: Vec<EvaluatedPerson>,
    /// No watermark pass when `None`.
    pub watermark: Option<WatermarkSpec>,
    pub attachments: Vec<AttachmentRef>,
    pub target: ExportTarget,
}

#[derive(Debug, Clone, Default)]
pub struct ReportPipeline {
    config: PipelineConfig,
}

impl ReportPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[instrument(skip_all, fields(report = %request.metadata.report_id, kind = %request.metadata.kind))]
    pub async fn run(&self, request: ReportRequest, cancel: &CancelToken) -> Result<ExportBundle> {
        let ReportRequest {
            metadata,
            persons,
            watermark,
            attachments,
            target,
        } = request;

        let merger = AttachmentMerger::new(self.config.merge.clone());
        let prepared = merger.prepare_all(&attachments).await;
        let annexes = prepared.annexes();
        cancel.check()?;

        let builder = ReportDocumentBuilder::new(self.config.layout.clone());
        let compositor = WatermarkCompositor::new(self.config.watermark.clone());
        let (metadata, rendered) = tokio::task::spawn_blocking(move || {
            let report = Report {
                metadata: &metadata,
                persons: &persons,
                annexes: &annexes,
                watermark: watermark.as_ref(),
            };
            render_report(&builder, &compositor, report).map(|rendered| (metadata, rendered))
        })
        .await
        .map_err(|e| ReportError::Render(format!("render worker failed: {e}")))??;
        cancel.check()?;

        let merged = merger.merge_prepared(&rendered.bytes, prepared)?;
        drop(rendered);
        cancel.check()?;

        let bundle = PackageExporter::new(self.config.export.clone())
            .export(merged, &attachments, &metadata, &target, cancel)
            .await?;
        info!(status = %bundle.status(), pages = bundle.page_count(), "Pipeline finished");
        Ok(bundle)
    }
}

struct Report<'a> {
    metadata: &'a ReportMetadata,
    persons: &'a [EvaluatedPerson],
    annexes: &'a [AnnexEntry],
    watermark: Option<&'a WatermarkSpec>,
}

fn render_report(
    builder: &ReportDocumentBuilder,
    compositor: &WatermarkCompositor,
    report: Report<'_>,
) -> Result<RenderedReport> {
    let Report {
        metadata,
        persons,
        annexes,
        watermark,
    } = report;
    let pages = builder.build_with_annexes(metadata, persons, annexes)?;
    let pages = match watermark {
        Some(spec) => compositor.apply(pages, spec)?,
        None => pages,
    };
    let title = format!("{} - {}", metadata.kind.heading(), metadata.company);
    ReportRenderer::new().render(&pages, &title)
}
