// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// clinreport-export: export bundles and the end-to-end report pipeline.
//
// The exporter writes `<base>.pdf` and `<base>.zip` together or not at all;
// the pipeline chains every stage from report data to a finished bundle.

pub mod archive;
pub mod bundle;
pub mod cancel;
pub mod exporter;
pub mod lease;
pub mod manifest;
pub mod pipeline;
pub mod staging;
pub mod target;

pub use bundle::{ExportBundle, ExportStatus};
pub use cancel::CancelToken;
pub use exporter::PackageExporter;
pub use manifest::BundleManifest;
pub use pipeline::{ReportPipeline, ReportRequest};
pub use target::ExportTarget;
