// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Attachment references, byte sources and per-attachment failure values.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Protocol category of an attachment. Also names its folder in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentCategory {
    Certificate,
    RawData,
    Supplementary,
}

impl AttachmentCategory {
    /// Folder name used inside the export archive.
    pub fn folder(&self) -> &'static str {
        match self {
            Self::Certificate => "certificates",
            Self::RawData => "raw_data",
            Self::Supplementary => "supplementary",
        }
    }
}

impl std::fmt::Display for AttachmentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Certificate => "certificate",
            Self::RawData => "raw data",
            Self::Supplementary => "supplementary",
        };
        f.write_str(name)
    }
}

/// Where an attachment's bytes come from.
///
/// The core never assumes a filesystem: in-memory buffers are first-class.
/// `RemoteFile` covers network mounts and other non-local storage, whose
/// reads are bounded by a timeout.
#[derive(Debug, Clone)]
pub enum ByteSource {
    Memory(Arc<[u8]>),
    LocalFile(PathBuf),
    RemoteFile {
        path: PathBuf,
        /// Overrides the configured default when set.
        timeout: Option<Duration>,
    },
}

impl ByteSource {
    pub fn memory(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Memory(Arc::from(bytes.into()))
    }

    /// The backing path, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Memory(_) => None,
            Self::LocalFile(path) | Self::RemoteFile { path, .. } => Some(path),
        }
    }

    /// Read the whole source.
    ///
    /// Only `RemoteFile` reads are wrapped in a timeout (its own, or
    /// `default_timeout`).
    pub async fn read(&self, default_timeout: Duration) -> Result<Arc<[u8]>, CorruptReason> {
        match self {
            Self::Memory(bytes) => Ok(Arc::clone(bytes)),
            Self::LocalFile(path) => read_file(path).await,
            Self::RemoteFile { path, timeout } => {
                let limit = timeout.unwrap_or(default_timeout);
                match tokio::time::timeout(limit, read_file(path)).await {
                    Ok(result) => result,
                    Err(_) => {
                        debug!(path = %path.display(), ?limit, "remote read timed out");
                        Err(CorruptReason::TimedOut {
                            after_ms: limit.as_millis() as u64,
                        })
                    }
                }
            }
        }
    }
}

impl std::fmt::Display for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory(bytes) => write!(f, "<memory, {} bytes>", bytes.len()),
            Self::LocalFile(path) | Self::RemoteFile { path, .. } => {
                write!(f, "{}", path.display())
            }
        }
    }
}

async fn read_file(path: &Path) -> Result<Arc<[u8]>, CorruptReason> {
    tokio::fs::read(path)
        .await
        .map(Arc::from)
        .map_err(|e| CorruptReason::Unreadable {
            detail: format!("{}: {e}", path.display()),
        })
}

/// One attachment handed to the merger.
#[derive(Debug, Clone)]
pub struct AttachmentRef {
    pub source: ByteSource,
    pub category: AttachmentCategory,
    /// Final documents are ordered by ascending rank; ties keep input order.
    pub order_rank: u32,
    /// Human-readable name used in the manifest and archive.
    pub label: String,
}

impl AttachmentRef {
    pub fn new(
        source: ByteSource,
        category: AttachmentCategory,
        order_rank: u32,
        label: impl Into<String>,
    ) -> Self {
        Self {
            source,
            category,
            order_rank,
            label: label.into(),
        }
    }
}

/// Why an attachment was excluded from the merge.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CorruptReason {
    #[error("source could not be read ({detail})")]
    Unreadable { detail: String },

    #[error("source did not respond within {after_ms} ms")]
    TimedOut { after_ms: u64 },

    #[error("not a well-formed PDF ({detail})")]
    NotPdf { detail: String },

    #[error("document is encrypted")]
    Encrypted,

    #[error("document has no pages")]
    NoPages,

    #[error("page {page} is broken ({detail})")]
    BrokenPage { page: u32, detail: String },

    #[error("validation worker failed ({detail})")]
    WorkerFailed { detail: String },
}

/// A non-fatal, per-attachment merge failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("attachment #{input_index} '{label}' ({category}, rank {order_rank}) excluded: {reason}")]
pub struct CorruptAttachment {
    /// Position in the caller's attachment list.
    pub input_index: usize,
    pub order_rank: u32,
    pub category: AttachmentCategory,
    pub label: String,
    pub reason: CorruptReason,
}

impl CorruptAttachment {
    pub fn new(input_index: usize, attachment: &AttachmentRef, reason: CorruptReason) -> Self {
        Self {
            input_index,
            order_rank: attachment.order_rank,
            category: attachment.category,
            label: attachment.label.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_source_returns_shared_bytes() {
        let source = ByteSource::memory(b"%PDF-1.4".to_vec());
        let bytes = source.read(Duration::from_secs(1)).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.4");
        assert!(source.path().is_none());
    }

    #[tokio::test]
    async fn local_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cert.pdf");
        std::fs::write(&path, b"bytes").unwrap();
        let bytes = ByteSource::LocalFile(path)
            .read(Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"bytes");
    }

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let err = ByteSource::RemoteFile {
            path: dir.path().join("gone.pdf"),
            timeout: None,
        }
        .read(Duration::from_secs(5))
        .await
        .unwrap_err();
        assert!(matches!(err, CorruptReason::Unreadable { .. }));
    }

    #[test]
    fn exclusion_message_names_attachment_and_reason() {
        let attachment = AttachmentRef::new(
            ByteSource::memory(Vec::new()),
            AttachmentCategory::Certificate,
            2,
            "calibration",
        );
        let warning = CorruptAttachment::new(1, &attachment, CorruptReason::Encrypted);
        let msg = warning.to_string();
        assert!(msg.contains("calibration"));
        assert!(msg.contains("encrypted"));
    }

    #[test]
    fn category_folders_are_distinct() {
        let folders = [
            AttachmentCategory::Certificate.folder(),
            AttachmentCategory::RawData.folder(),
            AttachmentCategory::Supplementary.folder(),
        ];
        assert_eq!(folders, ["certificates", "raw_data", "supplementary"]);
    }
}
