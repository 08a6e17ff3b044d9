// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the report pipeline.
//
// Every fatal error belongs to exactly one pipeline stage. Per-attachment
// failures are not errors at all: they are `CorruptAttachment` values carried
// inside the merged document (see `attachment.rs`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The pipeline stage a fatal error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Report layout (metadata + persons -> pages).
    Build,
    /// Watermark compositing.
    Watermark,
    /// Page model -> PDF bytes.
    Render,
    /// Attachment validation and merge.
    Merge,
    /// Standalone PDF + archive export.
    Export,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Build => "build",
            Self::Watermark => "watermark",
            Self::Render => "render",
            Self::Merge => "merge",
            Self::Export => "export",
        };
        f.write_str(name)
    }
}

/// Top-level error type for all report pipeline operations.
#[derive(Debug, Error)]
pub enum ReportError {
    // -- Build --
    #[error("invalid report data: {0}")]
    InvalidReportData(String),

    // -- Watermark --
    #[error("watermark image could not be decoded: {0}")]
    ImageDecode(String),

    #[error("unsupported watermark opacity {0} (must be within 0.0..=1.0)")]
    UnsupportedOpacity(f32),

    #[error("invalid watermark specification: {0}")]
    InvalidWatermarkSpec(String),

    // -- Render --
    #[error("PDF rendering failed: {0}")]
    Render(String),

    // -- Merge --
    #[error("base report document is not a usable PDF: {0}")]
    InvalidBaseDocument(String),

    #[error("merged document could not be assembled: {0}")]
    Merge(String),

    // -- Export --
    #[error("export write failed for {}: {source}", .path.display())]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("another export to {} is already in progress", .0.display())]
    DestinationBusy(PathBuf),

    #[error("refusing to overwrite existing export artifact {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("export was cancelled")]
    ExportCancelled,

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("archive error: {0}")]
    Archive(String),

    // -- Shared --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReportError {
    /// Wrap an I/O error with the destination it was writing to.
    pub fn export_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ExportIo {
            path: path.into(),
            source,
        }
    }

    /// The stage this error aborts.
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::InvalidReportData(_) => PipelineStage::Build,
            Self::ImageDecode(_) | Self::UnsupportedOpacity(_) | Self::InvalidWatermarkSpec(_) => {
                PipelineStage::Watermark
            }
            Self::Render(_) => PipelineStage::Render,
            Self::InvalidBaseDocument(_) | Self::Merge(_) => PipelineStage::Merge,
            Self::ExportIo { .. }
            | Self::DestinationBusy(_)
            | Self::DestinationExists(_)
            | Self::ExportCancelled
            | Self::IntegrityMismatch { .. }
            | Self::Archive(_)
            | Self::Io(_)
            | Self::Serialization(_) => PipelineStage::Export,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_assigned_per_variant() {
        assert_eq!(
            ReportError::InvalidReportData("empty".into()).stage(),
            PipelineStage::Build
        );
        assert_eq!(
            ReportError::UnsupportedOpacity(1.5).stage(),
            PipelineStage::Watermark
        );
        assert_eq!(
            ReportError::InvalidBaseDocument("truncated".into()).stage(),
            PipelineStage::Merge
        );
        let io = std::io::Error::other("disk full");
        assert_eq!(
            ReportError::export_io("/tmp/out.zip", io).stage(),
            PipelineStage::Export
        );
    }

    #[test]
    fn export_io_message_names_the_path() {
        let io = std::io::Error::other("disk full");
        let msg = ReportError::export_io("/tmp/out.zip", io).to_string();
        assert!(msg.contains("/tmp/out.zip"));
        assert!(msg.contains("disk full"));
    }
}
