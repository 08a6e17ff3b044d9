// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Package exporter: writes the merged PDF and the ZIP bundle as one
// all-or-nothing unit.
//
// Sequence: lease the destination, refuse existing artifacts, re-read and
// verify every included original, then stage both files beside their
// destination and commit them with no-clobber renames. Any failure or
// cancellation before the commit leaves nothing behind.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clinreport_core::attachment::AttachmentRef;
use clinreport_core::config::ExportConfig;
use clinreport_core::error::{ReportError, Result};
use clinreport_core::integrity::{hash_bytes, verify_hash};
use clinreport_core::merged::MergedDocument;
use clinreport_core::types::ReportMetadata;
use tracing::{debug, info, instrument};

use crate::archive::{ArchiveEntry, attachment_entry_names, write_archive};
use crate::bundle::ExportBundle;
use crate::cancel::CancelToken;
use crate::lease::DestinationLease;
use crate::manifest::{
    BundleManifest, MANIFEST_JSON_ENTRY, MANIFEST_TEXT_ENTRY, REPORT_ENTRY, derive_bundle_id,
};
use crate::staging::{StagedFile, commit_all};
use crate::target::ExportTarget;

#[derive(Debug, Clone, Default)]
pub struct PackageExporter {
    config: ExportConfig,
}

impl PackageExporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Export `merged` to `target`.
    ///
    /// `originals` is the attachment list the document was merged from;
    /// included attachments are looked up by their input index.
    #[instrument(skip_all, fields(directory = %target.directory().display(), base = target.base_name()))]
    pub async fn export(
        &self,
        merged: MergedDocument,
        originals: &[AttachmentRef],
        metadata: &ReportMetadata,
        target: &ExportTarget,
        cancel: &CancelToken,
    ) -> Result<ExportBundle> {
        cancel.check()?;

        let directory = target.directory();
        if self.config.create_missing_dirs {
            tokio::fs::create_dir_all(directory)
                .await
                .map_err(|e| ReportError::export_io(directory, e))?;
        }
        let canonical = tokio::fs::canonicalize(directory)
            .await
            .map_err(|e| ReportError::export_io(directory, e))?;
        let _lease = DestinationLease::acquire(canonical.join(target.base_name()))?;

        let pdf_path = canonical.join(format!("{}.pdf", target.base_name()));
        let archive_path = canonical.join(format!("{}.zip", target.base_name()));
        for path in [&pdf_path, &archive_path] {
            if tokio::fs::try_exists(path)
                .await
                .map_err(|e| ReportError::export_io(path, e))?
            {
                return Err(ReportError::DestinationExists(path.clone()));
            }
        }

        let attachment_names = attachment_entry_names(&merged.included);
        let mut attachment_entries = Vec::with_capacity(merged.included.len());
        for (included, name) in merged.included.iter().zip(&attachment_names) {
            cancel.check()?;
            let original = originals.get(included.input_index).ok_or_else(|| {
                ReportError::Archive(format!(
                    "original of attachment #{} '{}' was not supplied",
                    included.input_index, included.label
                ))
            })?;
            let bytes = original
                .source
                .read(self.config.source_timeout())
                .await
                .map_err(|reason| {
                    ReportError::Io(std::io::Error::other(format!(
                        "original of attachment '{}' could not be re-read: {reason}",
                        included.label
                    )))
                })?;
            verify_hash(&bytes, &included.sha256)?;
            debug!(entry = %name, bytes = bytes.len(), "Original verified");
            attachment_entries.push(ArchiveEntry::deflated(name.clone(), bytes));
        }

        let pdf_sha256 = hash_bytes(&merged.bytes);
        let bundle_id = derive_bundle_id(&metadata.report_id, &pdf_sha256);
        let manifest = BundleManifest::new(
            bundle_id,
            Utc::now(),
            metadata,
            &merged,
            pdf_sha256.clone(),
            &attachment_names,
        );
        let manifest_json = manifest.to_json()?;
        let manifest_text = manifest.to_text();

        let MergedDocument {
            bytes,
            page_count,
            included,
            exclusions,
            ..
        } = merged;
        let pdf: Arc<[u8]> = Arc::from(bytes);

        let mut entries = Vec::with_capacity(attachment_entries.len() + 3);
        entries.push(ArchiveEntry::deflated(REPORT_ENTRY, Arc::clone(&pdf)));
        entries.extend(attachment_entries);
        entries.push(ArchiveEntry::stored(MANIFEST_JSON_ENTRY, manifest_json.into_bytes()));
        entries.push(ArchiveEntry::stored(MANIFEST_TEXT_ENTRY, manifest_text.into_bytes()));
        let entry_names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();

        let level = self.config.compression_level;
        let job = WriteJob {
            pdf_path,
            archive_path,
            pdf,
            entries,
            level,
            cancel: cancel.clone(),
        };
        let (pdf_path, archive_path) = tokio::task::spawn_blocking(move || job.run())
            .await
            .map_err(|e| ReportError::Io(std::io::Error::other(format!("export worker failed: {e}"))))??;

        info!(
            bundle = %bundle_id,
            pdf = %pdf_path.display(),
            archive = %archive_path.display(),
            pages = page_count,
            excluded = exclusions.len(),
            "Export bundle written"
        );
        Ok(ExportBundle::new(
            bundle_id,
            pdf_path,
            archive_path,
            page_count,
            pdf_sha256,
            entry_names,
            included,
            exclusions,
        ))
    }
}

/// The blocking half of an export.
struct WriteJob {
    pdf_path: PathBuf,
    archive_path: PathBuf,
    pdf: Arc<[u8]>,
    entries: Vec<ArchiveEntry>,
    level: i64,
    cancel: CancelToken,
}

impl WriteJob {
    fn run(self) -> Result<(PathBuf, PathBuf)> {
        let mut pdf_file = StagedFile::create(&self.pdf_path)?;
        pdf_file.write_all(&self.pdf)?;
        pdf_file.sync()?;
        self.cancel.check()?;

        let mut zip_file = StagedFile::create(&self.archive_path)?;
        write_archive(zip_file.file_mut(), &self.entries, self.level, &self.cancel)?;
        zip_file.sync()?;
        self.cancel.check()?;

        let committed = commit_all(vec![pdf_file, zip_file])?;
        debug!(files = committed.len(), "Artifacts committed");
        Ok((self.pdf_path, self.archive_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use clinreport_core::attachment::{AttachmentCategory, ByteSource};
    use clinreport_core::merged::{MergedAttachment, PageProvenance};
    use clinreport_core::types::{EvaluatorIdentity, ReportKind};
    use std::io::Read;

    fn metadata() -> ReportMetadata {
        ReportMetadata {
            report_id: "RPT-1".into(),
            kind: ReportKind::Audiometry,
            institution: "Clinic".into(),
            company: "Acme".into(),
            site: "Plant".into(),
            evaluator: EvaluatorIdentity {
                name: "Dr. Ear".into(),
                profession: "Audiologist".into(),
                registry: "1".into(),
            },
            issue_date: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
            conclusions: String::new(),
            recommendations: String::new(),
            profile: Default::default(),
            technical_team: Vec::new(),
        }
    }

    fn merged_with(original: &[u8]) -> MergedDocument {
        MergedDocument {
            bytes: b"%PDF-1.7 merged".to_vec(),
            page_count: 2,
            pdf_version: "1.7".into(),
            manifest: vec![
                PageProvenance::Report { page: 1 },
                PageProvenance::Attachment {
                    input_index: 0,
                    order_rank: 0,
                    page: 1,
                },
            ],
            included: vec![MergedAttachment {
                input_index: 0,
                order_rank: 0,
                category: AttachmentCategory::Certificate,
                label: "cert".into(),
                source_pages: 1,
                included_pages: 1,
                skipped_blank_pages: 0,
                byte_len: original.len() as u64,
                sha256: hash_bytes(original),
            }],
            exclusions: Vec::new(),
        }
    }

    fn originals(bytes: &[u8]) -> Vec<AttachmentRef> {
        vec![AttachmentRef::new(
            ByteSource::memory(bytes.to_vec()),
            AttachmentCategory::Certificate,
            0,
            "cert",
        )]
    }

    #[tokio::test]
    async fn writes_pdf_and_archive() {
        let dir = tempfile::tempdir().unwrap();
        let target = ExportTarget::new(dir.path().join("nested"), "bundle");
        let bundle = PackageExporter::default()
            .export(
                merged_with(b"original"),
                &originals(b"original"),
                &metadata(),
                &target,
                &CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read(bundle.pdf_path()).unwrap(), b"%PDF-1.7 merged");
        let file = std::fs::File::open(bundle.archive_path()).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut original = Vec::new();
        archive
            .by_name("attachments/certificates/cert.pdf")
            .unwrap()
            .read_to_end(&mut original)
            .unwrap();
        assert_eq!(original, b"original");
        assert_eq!(
            bundle.entries(),
            [
                "report.pdf",
                "attachments/certificates/cert.pdf",
                "manifest.json",
                "manifest.txt"
            ]
        );
    }

    #[tokio::test]
    async fn changed_original_fails_integrity_check() {
        let dir = tempfile::tempdir().unwrap();
        let target = ExportTarget::new(dir.path(), "bundle");
        let err = PackageExporter::default()
            .export(
                merged_with(b"original"),
                &originals(b"tampered"),
                &metadata(),
                &target,
                &CancelToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::IntegrityMismatch { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error_when_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = PackageExporter::new(ExportConfig {
            create_missing_dirs: false,
            ..ExportConfig::default()
        });
        let err = exporter
            .export(
                merged_with(b"x"),
                &originals(b"x"),
                &metadata(),
                &ExportTarget::new(dir.path().join("absent"), "bundle"),
                &CancelToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::ExportIo { .. }));
    }
}
