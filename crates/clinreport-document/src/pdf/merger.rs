// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Attachment merger: validates attachment PDFs on a bounded worker pool and
// appends their pages after the report pages, in ascending rank order.
//
// A failing attachment never aborts the merge: it is excluded and reported in
// `MergedDocument::exclusions`. Only an unusable base document is fatal.

use std::sync::Arc;

use clinreport_core::attachment::{AttachmentRef, CorruptAttachment, CorruptReason};
use clinreport_core::config::MergeConfig;
use clinreport_core::error::{ReportError, Result};
use clinreport_core::integrity::hash_bytes;
use clinreport_core::merged::{MergedAttachment, MergedDocument, PageProvenance};
use futures::stream::{self, StreamExt};
use lopdf::{Document, Object, ObjectId, dictionary};
use tracing::{debug, info, instrument, warn};

use super::reader::{AttachmentInspector, INHERITABLE, inherited};
use crate::builder::AnnexEntry;

const PRODUCER: &str = "clinreport";

/// An attachment that passed validation, ready to be spliced in.
struct Prepared {
    document: Document,
    /// 1-based source page numbers to copy, in order.
    pages: Vec<u32>,
    source_pages: u32,
    skipped_blank_pages: u32,
    byte_len: u64,
    sha256: String,
}

struct PreparedEntry {
    input_index: usize,
    attachment: AttachmentRef,
    outcome: std::result::Result<Prepared, CorruptReason>,
}

/// Attachments read and validated, in merge order, not yet appended.
pub struct PreparedAttachments {
    entries: Vec<PreparedEntry>,
}

impl PreparedAttachments {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The attachments that will be appended, with the pages each brings.
    pub fn annexes(&self) -> Vec<AnnexEntry> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let prepared = entry.outcome.as_ref().ok()?;
                Some(AnnexEntry {
                    label: entry.attachment.label.clone(),
                    category: entry.attachment.category,
                    order_rank: entry.attachment.order_rank,
                    pages: prepared.pages.len() as u32,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for PreparedAttachments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let valid = self.entries.iter().filter(|e| e.outcome.is_ok()).count();
        f.debug_struct("PreparedAttachments")
            .field("entries", &self.entries.len())
            .field("valid", &valid)
            .finish()
    }
}

/// Concatenates attachments onto a rendered report.
#[derive(Debug, Clone, Default)]
pub struct AttachmentMerger {
    config: MergeConfig,
}

impl AttachmentMerger {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// Merge `attachments` after the pages of `base`.
    ///
    /// Attachments are ordered by ascending `order_rank`; equal ranks keep
    /// their input order. Each one is read and validated independently, at
    /// most `worker_pool_size` at a time.
    #[instrument(skip_all, fields(base_bytes = base.len(), attachments = attachments.len()))]
    pub async fn merge(
        &self,
        base: &[u8],
        attachments: &[AttachmentRef],
    ) -> Result<MergedDocument> {
        let merged = load_base(base)?;
        let prepared = self.prepare_all(attachments).await;
        assemble(merged, prepared)
    }

    /// Read and validate `attachments` without touching a base document.
    ///
    /// Lets the caller see which attachments will be appended (and how many
    /// pages each brings) before the report itself is rendered.
    #[instrument(skip_all, fields(attachments = attachments.len()))]
    pub async fn prepare_all(&self, attachments: &[AttachmentRef]) -> PreparedAttachments {
        let mut order: Vec<usize> = (0..attachments.len()).collect();
        order.sort_by_key(|&i| attachments[i].order_rank);

        let workers = self.config.worker_pool_size.max(1);
        let mut outcomes: Vec<(usize, PreparedEntry)> =
            stream::iter(order.iter().enumerate().map(|(slot, &input_index)| {
                let attachment = &attachments[input_index];
                async move {
                    let outcome = self.prepare(attachment).await;
                    (
                        slot,
                        PreparedEntry {
                            input_index,
                            attachment: attachment.clone(),
                            outcome,
                        },
                    )
                }
            }))
            .buffer_unordered(workers)
            .collect()
            .await;
        outcomes.sort_by_key(|(slot, _)| *slot);

        PreparedAttachments {
            entries: outcomes.into_iter().map(|(_, entry)| entry).collect(),
        }
    }

    /// Append attachments validated by [`prepare_all`](Self::prepare_all)
    /// after the pages of `base`.
    #[instrument(skip_all, fields(base_bytes = base.len(), attachments = prepared.len()))]
    pub fn merge_prepared(
        &self,
        base: &[u8],
        prepared: PreparedAttachments,
    ) -> Result<MergedDocument> {
        assemble(load_base(base)?, prepared)
    }

    /// Read and validate one attachment. Parsing runs on the blocking pool.
    async fn prepare(&self, attachment: &AttachmentRef) -> std::result::Result<Prepared, CorruptReason> {
        let bytes = attachment.source.read(self.config.source_timeout()).await?;
        let skip_blank = self.config.skip_blank_pages;
        tokio::task::spawn_blocking(move || prepare_document(bytes, skip_blank))
            .await
            .map_err(|err| CorruptReason::WorkerFailed {
                detail: err.to_string(),
            })?
    }
}

fn assemble(mut merged: Document, prepared: PreparedAttachments) -> Result<MergedDocument> {
    let report_pages = merged.get_pages().len() as u32;
    let mut manifest: Vec<PageProvenance> = (1..=report_pages)
        .map(|page| PageProvenance::Report { page })
        .collect();
    let mut included = Vec::new();
    let mut exclusions = Vec::new();
    let mut version = merged.version.clone();

    let pages_root = pages_root(&merged).map_err(ReportError::InvalidBaseDocument)?;
    let mut max_id = merged.max_id;
    let mut appended: Vec<ObjectId> = Vec::new();

    for PreparedEntry {
        input_index,
        attachment,
        outcome,
    } in prepared.entries
    {
        let prepared = match outcome {
            Ok(prepared) => prepared,
            Err(reason) => {
                let excluded = CorruptAttachment::new(input_index, &attachment, reason);
                warn!(%excluded, "Attachment excluded");
                exclusions.push(excluded);
                continue;
            }
        };

        let Prepared {
            mut document,
            pages,
            source_pages,
            skipped_blank_pages,
            byte_len,
            sha256,
        } = prepared;

        document.renumber_objects_with(max_id + 1);
        max_id = document.max_id;
        if newer(&document.version, &version) {
            version = document.version.clone();
        }

        let page_ids = document.get_pages();
        for page in &pages {
            let Some(&page_id) = page_ids.get(page) else {
                continue;
            };
            if let Ok(dict) = document
                .get_object_mut(page_id)
                .and_then(|o| o.as_dict_mut())
            {
                dict.set("Parent", Object::Reference(pages_root));
            }
            appended.push(page_id);
            manifest.push(PageProvenance::Attachment {
                input_index,
                order_rank: attachment.order_rank,
                page: *page,
            });
        }
        merged.objects.extend(document.objects);

        debug!(
            input_index,
            rank = attachment.order_rank,
            pages = pages.len(),
            skipped_blank_pages,
            "Attachment appended"
        );
        included.push(MergedAttachment {
            input_index,
            order_rank: attachment.order_rank,
            category: attachment.category,
            label: attachment.label,
            source_pages,
            included_pages: pages.len() as u32,
            skipped_blank_pages,
            byte_len,
            sha256,
        });
    }
    merged.max_id = max_id;
    exclusions.sort_by_key(|e: &CorruptAttachment| e.input_index);

    append_kids(&mut merged, pages_root, &appended).map_err(ReportError::Merge)?;
    merged.version = version.clone();
    normalise(&mut merged);

    let mut bytes = Vec::new();
    merged
        .save_to(&mut bytes)
        .map_err(|err| ReportError::Merge(format!("serialisation failed: {err}")))?;

    let page_count = manifest.len() as u32;
    info!(
        page_count,
        report_pages,
        included = included.len(),
        excluded = exclusions.len(),
        "Merge complete"
    );
    Ok(MergedDocument {
        bytes,
        page_count,
        pdf_version: version,
        manifest,
        included,
        exclusions,
    })
}

fn prepare_document(
    bytes: Arc<[u8]>,
    skip_blank: bool,
) -> std::result::Result<Prepared, CorruptReason> {
    let inspected = AttachmentInspector::load(&bytes)?;
    let mut document = inspected.document;
    let inspection = inspected.inspection;

    let pages: Vec<u32> = (1..=inspection.page_count)
        .filter(|page| !(skip_blank && inspection.is_blank(*page)))
        .collect();

    // Pages leave their original tree, so inherited attributes move onto
    // the page itself.
    for (&page_id, page) in inspected.page_ids.iter().zip(1u32..) {
        if !pages.contains(&page) {
            continue;
        }
        let copied: Vec<(&[u8], Object)> = match document.get_dictionary(page_id) {
            Ok(dict) => INHERITABLE
                .iter()
                .filter(|key| dict.get(key).is_err())
                .filter_map(|key| inherited(&document, dict, key).map(|v| (*key, v.clone())))
                .collect(),
            Err(err) => {
                return Err(CorruptReason::BrokenPage {
                    page,
                    detail: err.to_string(),
                });
            }
        };
        if let Ok(dict) = document.get_object_mut(page_id).and_then(|o| o.as_dict_mut()) {
            for (key, value) in copied {
                dict.set(key, value);
            }
        }
    }

    Ok(Prepared {
        document,
        skipped_blank_pages: inspection.page_count - pages.len() as u32,
        pages,
        source_pages: inspection.page_count,
        byte_len: bytes.len() as u64,
        sha256: hash_bytes(&bytes),
    })
}

fn load_base(base: &[u8]) -> Result<Document> {
    let document = Document::load_mem(base)
        .map_err(|err| ReportError::InvalidBaseDocument(err.to_string()))?;
    if document.trailer.get(b"Encrypt").is_ok() {
        return Err(ReportError::InvalidBaseDocument("document is encrypted".into()));
    }
    if document.get_pages().is_empty() {
        return Err(ReportError::InvalidBaseDocument("document has no pages".into()));
    }
    Ok(document)
}

fn pages_root(document: &Document) -> std::result::Result<ObjectId, String> {
    document
        .catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|err| format!("no page tree root: {err}"))
}

fn append_kids(
    document: &mut Document,
    pages_root: ObjectId,
    page_ids: &[ObjectId],
) -> std::result::Result<(), String> {
    let root = document
        .get_object_mut(pages_root)
        .and_then(|o| o.as_dict_mut())
        .map_err(|err| format!("page tree root unreadable: {err}"))?;
    let count = root.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    let kids = root
        .get_mut(b"Kids")
        .and_then(|k| k.as_array_mut())
        .map_err(|err| format!("page tree root has no Kids: {err}"))?;
    kids.extend(page_ids.iter().map(|id| Object::Reference(*id)));
    root.set("Count", Object::Integer(count + page_ids.len() as i64));
    Ok(())
}

/// Strip volatile metadata so identical inputs give identical bytes, and
/// drop objects no longer reachable (the attachments' own catalogs).
fn normalise(document: &mut Document) {
    let title = document
        .trailer
        .get(b"Info")
        .and_then(|info| document.dereference(info))
        .and_then(|(_, info)| info.as_dict())
        .and_then(|info| info.get(b"Title"))
        .and_then(|title| title.as_str())
        .map(<[u8]>::to_vec)
        .unwrap_or_default();
    let info_id = document.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Producer" => Object::string_literal(PRODUCER),
    });
    document.trailer.set("Info", Object::Reference(info_id));
    document.trailer.remove(b"ID");
    if let Ok(catalog) = document.catalog_mut() {
        catalog.remove(b"Metadata");
    }
    document.prune_objects();
    document.renumber_objects();
    document.compress();
}

fn parse_version(version: &str) -> (u8, u8) {
    let (major, minor) = version.split_once('.').unwrap_or((version, "0"));
    (
        major.trim().parse().unwrap_or(1),
        minor.trim().parse().unwrap_or(0),
    )
}

fn newer(candidate: &str, current: &str) -> bool {
    parse_version(candidate) > parse_version(current)
}
