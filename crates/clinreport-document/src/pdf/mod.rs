// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: rendering report pages, inspecting attachments and merging
// them into one document.

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod merger;
pub mod reader;
pub mod writer;

pub use merger::AttachmentMerger;
pub use reader::{AttachmentInspector, Inspection};
pub use writer::{RenderedReport, ReportRenderer};
