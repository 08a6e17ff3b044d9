// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bundle manifest: what went into the export, where every page came from,
// and which attachments were left out and why. Serialised as JSON and as a
// plain-text summary.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, Utc};
use clinreport_core::attachment::{AttachmentCategory, CorruptReason};
use clinreport_core::merged::{MergedDocument, PageProvenance, ProvenanceRange};
use clinreport_core::types::{ReportKind, ReportMetadata};
use serde::Serialize;
use uuid::Uuid;

pub const REPORT_ENTRY: &str = "report.pdf";
pub const MANIFEST_JSON_ENTRY: &str = "manifest.json";
pub const MANIFEST_TEXT_ENTRY: &str = "manifest.txt";

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub report_id: String,
    pub kind: ReportKind,
    pub institution: String,
    pub company: String,
    pub site: String,
    pub evaluator: String,
    pub issue_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub file: String,
    pub pages: u32,
    pub report_pages: u32,
    pub pdf_version: String,
    pub byte_len: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestAttachment {
    /// Path of the original inside the archive.
    pub entry: String,
    pub input_index: usize,
    pub label: String,
    pub category: AttachmentCategory,
    pub order_rank: u32,
    pub source_pages: u32,
    pub included_pages: u32,
    pub skipped_blank_pages: u32,
    pub byte_len: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestExclusion {
    pub input_index: usize,
    pub label: String,
    pub category: AttachmentCategory,
    pub order_rank: u32,
    pub reason: CorruptReason,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleManifest {
    pub bundle_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub report: ReportSummary,
    pub document: DocumentSummary,
    pub page_ranges: Vec<ProvenanceRange>,
    pub attachments: Vec<ManifestAttachment>,
    pub exclusions: Vec<ManifestExclusion>,
}

/// Bundle id derived from the report id and the merged PDF digest, so
/// re-exporting the same document yields the same id.
pub fn derive_bundle_id(report_id: &str, pdf_sha256: &str) -> Uuid {
    let name = format!("clinreport:{report_id}:{pdf_sha256}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

impl BundleManifest {
    /// `entries[i]` is the archive path of `merged.included[i]`.
    pub fn new(
        bundle_id: Uuid,
        generated_at: DateTime<Utc>,
        metadata: &ReportMetadata,
        merged: &MergedDocument,
        pdf_sha256: String,
        entries: &[String],
    ) -> Self {
        let report = ReportSummary {
            report_id: metadata.report_id.clone(),
            kind: metadata.kind,
            institution: metadata.institution.clone(),
            company: metadata.company.clone(),
            site: metadata.site.clone(),
            evaluator: metadata.evaluator.name.clone(),
            issue_date: metadata.issue_date,
        };
        let document = DocumentSummary {
            file: REPORT_ENTRY.to_string(),
            pages: merged.page_count,
            report_pages: merged.report_pages(),
            pdf_version: merged.pdf_version.clone(),
            byte_len: merged.bytes.len() as u64,
            sha256: pdf_sha256,
        };
        let attachments = merged
            .included
            .iter()
            .zip(entries)
            .map(|(a, entry)| ManifestAttachment {
                entry: entry.clone(),
                input_index: a.input_index,
                label: a.label.clone(),
                category: a.category,
                order_rank: a.order_rank,
                source_pages: a.source_pages,
                included_pages: a.included_pages,
                skipped_blank_pages: a.skipped_blank_pages,
                byte_len: a.byte_len,
                sha256: a.sha256.clone(),
            })
            .collect();
        let exclusions = merged
            .exclusions
            .iter()
            .map(|e| ManifestExclusion {
                input_index: e.input_index,
                label: e.label.clone(),
                category: e.category,
                order_rank: e.order_rank,
                reason: e.reason.clone(),
                message: e.reason.to_string(),
            })
            .collect();

        Self {
            bundle_id,
            generated_at,
            report,
            document,
            page_ranges: merged.page_ranges(),
            attachments,
            exclusions,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary for `manifest.txt`.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let r = &self.report;
        let d = &self.document;
        // Writing to a String cannot fail.
        let _ = writeln!(out, "CLINICAL REPORT BUNDLE");
        let _ = writeln!(out, "Bundle:       {}", self.bundle_id);
        let _ = writeln!(out, "Generated:    {}", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out);
        let _ = writeln!(out, "Report:       {} ({})", r.report_id, r.kind);
        let _ = writeln!(out, "Institution:  {}", r.institution);
        let _ = writeln!(out, "Company:      {}", r.company);
        let _ = writeln!(out, "Site:         {}", r.site);
        let _ = writeln!(out, "Evaluator:    {}", r.evaluator);
        let _ = writeln!(out, "Issued:       {}", r.issue_date.format("%d/%m/%Y"));
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Document:     {} - {} pages ({} report), PDF {}, {} bytes",
            d.file, d.pages, d.report_pages, d.pdf_version, d.byte_len
        );
        let _ = writeln!(out, "SHA-256:      {}", d.sha256);
        let _ = writeln!(out);

        let _ = writeln!(out, "PAGES");
        for range in &self.page_ranges {
            let source = match range.first {
                PageProvenance::Report { .. } => "report".to_string(),
                PageProvenance::Attachment { input_index, .. } => self
                    .attachments
                    .iter()
                    .find(|a| a.input_index == input_index)
                    .map(|a| format!("attachment '{}'", a.label))
                    .unwrap_or_else(|| format!("attachment #{input_index}")),
            };
            let first_source_page = match range.first {
                PageProvenance::Report { page } | PageProvenance::Attachment { page, .. } => page,
            };
            let _ = writeln!(
                out,
                "  {:>4}-{:<4} {source} pages {first_source_page}-{}",
                range.output_start, range.output_end, range.source_end
            );
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "ATTACHMENTS ({})", self.attachments.len());
        for a in &self.attachments {
            let _ = writeln!(
                out,
                "  [{}] {} ({}, rank {}) - {}/{} pages",
                a.entry, a.label, a.category, a.order_rank, a.included_pages, a.source_pages
            );
            if a.skipped_blank_pages > 0 {
                let _ = writeln!(out, "      {} blank page(s) skipped", a.skipped_blank_pages);
            }
            let _ = writeln!(out, "      sha256 {}", a.sha256);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "EXCLUDED ({})", self.exclusions.len());
        for e in &self.exclusions {
            let _ = writeln!(
                out,
                "  #{} {} ({}, rank {}): {}",
                e.input_index, e.label, e.category, e.order_rank, e.message
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinreport_core::attachment::CorruptAttachment;
    use clinreport_core::merged::MergedAttachment;
    use clinreport_core::types::EvaluatorIdentity;

    fn metadata() -> ReportMetadata {
        ReportMetadata {
            report_id: "RPT-9".into(),
            kind: ReportKind::Spirometry,
            institution: "Clinic".into(),
            company: "Acme".into(),
            site: "Dock 4".into(),
            evaluator: EvaluatorIdentity {
                name: "Dr. Lung".into(),
                profession: "Pulmonologist".into(),
                registry: "77".into(),
            },
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            conclusions: String::new(),
            recommendations: String::new(),
            profile: Default::default(),
            technical_team: Vec::new(),
        }
    }

    fn merged() -> MergedDocument {
        MergedDocument {
            bytes: vec![0; 1234],
            page_count: 4,
            pdf_version: "1.7".into(),
            manifest: vec![
                PageProvenance::Report { page: 1 },
                PageProvenance::Report { page: 2 },
                PageProvenance::Attachment {
                    input_index: 1,
                    order_rank: 0,
                    page: 1,
                },
                PageProvenance::Attachment {
                    input_index: 1,
                    order_rank: 0,
                    page: 3,
                },
            ],
            included: vec![MergedAttachment {
                input_index: 1,
                order_rank: 0,
                category: AttachmentCategory::Certificate,
                label: "Calibration".into(),
                source_pages: 3,
                included_pages: 2,
                skipped_blank_pages: 1,
                byte_len: 999,
                sha256: "ab".repeat(32),
            }],
            exclusions: vec![CorruptAttachment {
                input_index: 0,
                order_rank: 3,
                category: AttachmentCategory::RawData,
                label: "scan".into(),
                reason: CorruptReason::Encrypted,
            }],
        }
    }

    fn manifest() -> BundleManifest {
        BundleManifest::new(
            Uuid::nil(),
            DateTime::<Utc>::UNIX_EPOCH,
            &metadata(),
            &merged(),
            "cd".repeat(32),
            &["attachments/certificates/Calibration.pdf".to_string()],
        )
    }

    #[test]
    fn json_lists_provenance_and_exclusions() {
        let json: serde_json::Value = serde_json::from_str(&manifest().to_json().unwrap()).unwrap();
        assert_eq!(json["document"]["pages"], 4);
        assert_eq!(json["document"]["report_pages"], 2);
        assert_eq!(json["page_ranges"].as_array().unwrap().len(), 2);
        assert_eq!(
            json["attachments"][0]["entry"],
            "attachments/certificates/Calibration.pdf"
        );
        assert_eq!(json["exclusions"][0]["reason"]["reason"], "encrypted");
        assert_eq!(json["report"]["kind"], "spirometry");
    }

    #[test]
    fn text_summary_is_readable() {
        let text = manifest().to_text();
        assert!(text.contains("Report:       RPT-9 (spirometry)"));
        assert!(text.contains("attachment 'Calibration' pages 1-3"));
        assert!(text.contains("1 blank page(s) skipped"));
        assert!(text.contains("#0 scan (raw data, rank 3): document is encrypted"));
    }

    #[test]
    fn bundle_id_depends_only_on_report_and_digest() {
        let digest = "cd".repeat(32);
        assert_eq!(derive_bundle_id("RPT-9", &digest), derive_bundle_id("RPT-9", &digest));
        assert_ne!(derive_bundle_id("RPT-9", &digest), derive_bundle_id("RPT-10", &digest));
        assert_ne!(
            derive_bundle_id("RPT-9", &digest),
            derive_bundle_id("RPT-9", &"ce".repeat(32))
        );
        assert_eq!(derive_bundle_id("RPT-9", &digest).get_version_num(), 5);
    }
}
