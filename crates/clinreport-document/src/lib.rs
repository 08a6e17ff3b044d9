// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// clinreport-document: Report composition for clinreport.
//
// Lays out report data into pages, composites the watermark beneath every
// page, renders the pages to PDF and merges attachment PDFs after them.

pub mod builder;
pub mod image;
pub mod page;
pub mod pdf;
pub mod watermark;

// Re-export the primary structs so callers can use `clinreport_document::ReportRenderer` etc.
pub use builder::{AnnexEntry, FindingCount, ReportDocumentBuilder, ResultsSummary};
pub use image::processor::ImageProcessor;
pub use page::{ContentBlock, PageContent, PageSize};
pub use pdf::merger::{AttachmentMerger, PreparedAttachments};
pub use pdf::reader::{AttachmentInspector, Inspection};
pub use pdf::writer::{RenderedReport, ReportRenderer};
pub use watermark::{Corner, WatermarkAnchor, WatermarkCompositor, WatermarkSpec};
