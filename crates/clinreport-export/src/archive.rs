// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ZIP bundle writer using the `zip` crate.

use std::collections::HashSet;
use std::io::{Seek, Write};
use std::sync::Arc;

use clinreport_core::error::{ReportError, Result};
use clinreport_core::merged::MergedAttachment;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::cancel::CancelToken;
use crate::target::sanitize_file_stem;

pub const ATTACHMENTS_DIR: &str = "attachments";

/// One file inside the archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Arc<[u8]>,
    /// Deflate when true, store otherwise.
    pub compress: bool,
}

impl ArchiveEntry {
    pub fn deflated(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            compress: true,
        }
    }

    pub fn stored(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            compress: false,
        }
    }
}

/// Archive paths for the included attachments, one per entry of `included`:
/// `attachments/<category folder>/<label>.pdf`, with `_2`, `_3`, ... added
/// when two labels sanitise to the same name.
pub fn attachment_entry_names(included: &[MergedAttachment]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    included
        .iter()
        .map(|a| {
            let stem = sanitize_file_stem(a.label.trim_end_matches(".pdf"), "attachment");
            let folder = a.category.folder();
            let mut name = format!("{ATTACHMENTS_DIR}/{folder}/{stem}.pdf");
            let mut n = 2;
            while !taken.insert(name.to_lowercase()) {
                name = format!("{ATTACHMENTS_DIR}/{folder}/{stem}_{n}.pdf");
                n += 1;
            }
            name
        })
        .collect()
}

/// Write `entries` as a ZIP archive, checking `cancel` before each entry.
/// Entry timestamps are fixed so the archive depends only on its contents.
pub fn write_archive<W: Write + Seek>(
    writer: W,
    entries: &[ArchiveEntry],
    compression_level: i64,
    cancel: &CancelToken,
) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let deflated = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(compression_level.clamp(0, 9)))
        .last_modified_time(DateTime::default());
    let stored = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default());

    for entry in entries {
        cancel.check()?;
        let options = if entry.compress { deflated } else { stored };
        zip.start_file(entry.name.as_str(), options)
            .map_err(|e| ReportError::Archive(format!("{}: {e}", entry.name)))?;
        zip.write_all(&entry.bytes)
            .map_err(|e| ReportError::Archive(format!("{}: {e}", entry.name)))?;
        debug!(entry = %entry.name, bytes = entry.bytes.len(), "Archive entry written");
    }
    cancel.check()?;

    zip.finish()
        .map_err(|e| ReportError::Archive(format!("finalising archive: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinreport_core::attachment::AttachmentCategory;
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    fn included(label: &str, category: AttachmentCategory) -> MergedAttachment {
        MergedAttachment {
            input_index: 0,
            order_rank: 0,
            category,
            label: label.into(),
            source_pages: 1,
            included_pages: 1,
            skipped_blank_pages: 0,
            byte_len: 1,
            sha256: String::new(),
        }
    }

    #[test]
    fn entry_names_are_grouped_and_unique() {
        let names = attachment_entry_names(&[
            included("Calibration cert.pdf", AttachmentCategory::Certificate),
            included("Calibration cert", AttachmentCategory::Certificate),
            included("calibration CERT", AttachmentCategory::Certificate),
            included("Calibration cert", AttachmentCategory::RawData),
            included("", AttachmentCategory::Supplementary),
        ]);
        assert_eq!(
            names,
            vec![
                "attachments/certificates/Calibration_cert.pdf",
                "attachments/certificates/Calibration_cert_2.pdf",
                "attachments/certificates/calibration_CERT_3.pdf",
                "attachments/raw_data/Calibration_cert.pdf",
                "attachments/supplementary/attachment.pdf",
            ]
        );
    }

    #[test]
    fn archive_round_trips_entries_with_chosen_methods() {
        let entries = vec![
            ArchiveEntry::deflated("report.pdf", b"%PDF-1.7 body".to_vec()),
            ArchiveEntry::stored("manifest.json", b"{}".to_vec()),
        ];
        let cursor = write_archive(Cursor::new(Vec::new()), &entries, 6, &CancelToken::new()).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(archive.len(), 2);
        let mut body = Vec::new();
        archive
            .by_name("report.pdf")
            .unwrap()
            .read_to_end(&mut body)
            .unwrap();
        assert_eq!(body, b"%PDF-1.7 body");
        assert_eq!(
            archive.by_name("manifest.json").unwrap().compression(),
            CompressionMethod::Stored
        );
    }

    #[test]
    fn cancelled_archive_stops_early() {
        let token = CancelToken::new();
        token.cancel();
        let err = write_archive(
            Cursor::new(Vec::new()),
            &[ArchiveEntry::stored("a", b"a".to_vec())],
            6,
            &token,
        )
        .unwrap_err();
        assert!(matches!(err, ReportError::ExportCancelled));
    }
}
