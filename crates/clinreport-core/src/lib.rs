// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// clinreport: Core types and error definitions shared across all crates.

pub mod attachment;
pub mod config;
pub mod error;
pub mod human_errors;
pub mod integrity;
pub mod merged;
pub mod types;

pub use attachment::{AttachmentCategory, AttachmentRef, ByteSource, CorruptAttachment, CorruptReason};
pub use config::PipelineConfig;
pub use error::{PipelineStage, ReportError, Result};
pub use merged::{MergedAttachment, MergedDocument, PageProvenance};
pub use types::*;
