// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The result of one successful export. Fields are private; a bundle is never
// edited after creation and a new export always produces a new bundle.

use std::path::{Path, PathBuf};

use clinreport_core::attachment::CorruptAttachment;
use clinreport_core::merged::MergedAttachment;
use serde::Serialize;
use uuid::Uuid;

/// Whether every attachment made it into the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportStatus {
    Complete,
    Partial { excluded: usize },
}

impl std::fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => f.write_str("complete"),
            Self::Partial { excluded } => {
                write!(f, "partial ({excluded} attachment(s) excluded)")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportBundle {
    bundle_id: Uuid,
    pdf_path: PathBuf,
    archive_path: PathBuf,
    page_count: u32,
    pdf_sha256: String,
    entries: Vec<String>,
    included: Vec<MergedAttachment>,
    exclusions: Vec<CorruptAttachment>,
}

impl ExportBundle {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        bundle_id: Uuid,
        pdf_path: PathBuf,
        archive_path: PathBuf,
        page_count: u32,
        pdf_sha256: String,
        entries: Vec<String>,
        included: Vec<MergedAttachment>,
        exclusions: Vec<CorruptAttachment>,
    ) -> Self {
        Self {
            bundle_id,
            pdf_path,
            archive_path,
            page_count,
            pdf_sha256,
            entries,
            included,
            exclusions,
        }
    }

    pub fn bundle_id(&self) -> Uuid {
        self.bundle_id
    }

    /// The standalone merged PDF.
    pub fn pdf_path(&self) -> &Path {
        &self.pdf_path
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn pdf_sha256(&self) -> &str {
        &self.pdf_sha256
    }

    /// Archive entry names, in write order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn included(&self) -> &[MergedAttachment] {
        &self.included
    }

    pub fn exclusions(&self) -> &[CorruptAttachment] {
        &self.exclusions
    }

    pub fn status(&self) -> ExportStatus {
        if self.exclusions.is_empty() {
            ExportStatus::Complete
        } else {
            ExportStatus::Partial {
                excluded: self.exclusions.len(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinreport_core::attachment::{AttachmentCategory, CorruptReason};

    fn bundle(exclusions: Vec<CorruptAttachment>) -> ExportBundle {
        ExportBundle::new(
            Uuid::nil(),
            "/tmp/a.pdf".into(),
            "/tmp/a.zip".into(),
            3,
            String::new(),
            vec!["report.pdf".into()],
            Vec::new(),
            exclusions,
        )
    }

    #[test]
    fn status_counts_exclusions() {
        assert_eq!(bundle(Vec::new()).status(), ExportStatus::Complete);
        let excluded = CorruptAttachment {
            input_index: 0,
            order_rank: 0,
            category: AttachmentCategory::RawData,
            label: "scan".into(),
            reason: CorruptReason::NoPages,
        };
        let status = bundle(vec![excluded]).status();
        assert_eq!(status, ExportStatus::Partial { excluded: 1 });
        assert_eq!(status.to_string(), "partial (1 attachment(s) excluded)");
    }
}
