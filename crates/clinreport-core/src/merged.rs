// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The merged document and its page provenance manifest.

use serde::{Deserialize, Serialize};

use crate::attachment::{AttachmentCategory, CorruptAttachment};

/// Where one output page came from. Page numbers are 1-based within their
/// source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PageProvenance {
    Report {
        page: u32,
    },
    Attachment {
        input_index: usize,
        order_rank: u32,
        page: u32,
    },
}

impl PageProvenance {
    /// Same source document (ignoring the page number).
    fn same_source(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Report { .. }, Self::Report { .. }) => true,
            (
                Self::Attachment { input_index: a, .. },
                Self::Attachment { input_index: b, .. },
            ) => a == b,
            _ => false,
        }
    }

    fn page(&self) -> u32 {
        match self {
            Self::Report { page } | Self::Attachment { page, .. } => *page,
        }
    }
}

/// A run of consecutive output pages taken from one source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRange {
    /// Provenance of the first page in the run.
    pub first: PageProvenance,
    /// 1-based output page numbers, inclusive.
    pub output_start: u32,
    pub output_end: u32,
    /// Source page number of the last page in the run.
    pub source_end: u32,
}

/// An attachment that made it into the merged document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedAttachment {
    pub input_index: usize,
    pub order_rank: u32,
    pub category: AttachmentCategory,
    pub label: String,
    /// Pages in the original document.
    pub source_pages: u32,
    /// Pages copied into the merged document.
    pub included_pages: u32,
    pub skipped_blank_pages: u32,
    /// Size of the original bytes.
    pub byte_len: u64,
    /// SHA-256 of the original bytes.
    pub sha256: String,
}

/// Output of the merge stage.
#[derive(Debug, Clone)]
pub struct MergedDocument {
    pub bytes: Vec<u8>,
    pub page_count: u32,
    /// PDF header version of the output, e.g. "1.7".
    pub pdf_version: String,
    /// One entry per output page, in output order.
    pub manifest: Vec<PageProvenance>,
    /// Included attachments in output order.
    pub included: Vec<MergedAttachment>,
    /// Attachments excluded by validation, in input order.
    pub exclusions: Vec<CorruptAttachment>,
}

impl MergedDocument {
    /// True when at least one attachment was excluded.
    pub fn is_partial(&self) -> bool {
        !self.exclusions.is_empty()
    }

    /// Number of output pages that came from the report itself.
    pub fn report_pages(&self) -> u32 {
        self.manifest
            .iter()
            .filter(|p| matches!(p, PageProvenance::Report { .. }))
            .count() as u32
    }

    /// Collapse the per-page manifest into runs per source document.
    pub fn page_ranges(&self) -> Vec<ProvenanceRange> {
        let mut ranges: Vec<ProvenanceRange> = Vec::new();
        for (i, prov) in self.manifest.iter().enumerate() {
            let output_page = i as u32 + 1;
            match ranges.last_mut() {
                Some(range) if range.first.same_source(prov) => {
                    range.output_end = output_page;
                    range.source_end = prov.page();
                }
                _ => ranges.push(ProvenanceRange {
                    first: *prov,
                    output_start: output_page,
                    output_end: output_page,
                    source_end: prov.page(),
                }),
            }
        }
        ranges
    }
}
