// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Attachment inspector: opens an externally authored PDF with `lopdf` and
// decides whether every page can be carried into the merged report.

use clinreport_core::attachment::CorruptReason;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use tracing::{debug, instrument};

/// Page attributes a page may inherit from its ancestors in the page tree.
pub(crate) const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Operators that put marks on the page.
const PAINTING_OPERATORS: [&str; 16] = [
    "Tj", "TJ", "'", "\"", "Do", "BI", "sh", "S", "s", "f", "F", "f*", "B", "B*", "b", "b*",
];

/// Guard against cyclic /Parent chains.
const MAX_TREE_DEPTH: usize = 64;

/// Summary of a validated attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub pdf_version: String,
    pub page_count: u32,
    /// 1-based numbers of pages with no painting operators.
    pub blank_pages: Vec<u32>,
}

impl Inspection {
    pub fn is_blank(&self, page: u32) -> bool {
        self.blank_pages.binary_search(&page).is_ok()
    }
}

/// A parsed attachment that passed validation.
#[derive(Debug, Clone)]
pub struct InspectedPdf {
    pub document: Document,
    /// Page object ids in page order.
    pub page_ids: Vec<ObjectId>,
    pub inspection: Inspection,
}

/// Validates attachment PDFs. Stateless; every call is independent, so it is
/// safe to run on many worker threads at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachmentInspector;

impl AttachmentInspector {
    /// Parse and validate `bytes`.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn load(bytes: &[u8]) -> Result<InspectedPdf, CorruptReason> {
        if !bytes.starts_with(b"%PDF-") {
            // Leading bytes are accepted within the first kilobyte.
            let head = &bytes[..bytes.len().min(1024)];
            if !head.windows(5).any(|w| w == b"%PDF-") {
                return Err(CorruptReason::NotPdf {
                    detail: "missing %PDF header".into(),
                });
            }
        }

        let document = Document::load_mem(bytes).map_err(|err| {
            let detail = err.to_string();
            if looks_encrypted(bytes, &detail) {
                CorruptReason::Encrypted
            } else {
                CorruptReason::NotPdf { detail }
            }
        })?;
        // lopdf decrypts with the empty user password when it can.
        if document.encryption_state.is_some() || trailer_declares_encryption(bytes) {
            return Err(CorruptReason::Encrypted);
        }

        Self::check(document)
    }

    /// Summary only, for callers that do not need the parsed document.
    pub fn inspect(bytes: &[u8]) -> Result<Inspection, CorruptReason> {
        Self::load(bytes).map(|pdf| pdf.inspection)
    }

    fn check(document: Document) -> Result<InspectedPdf, CorruptReason> {
        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(CorruptReason::Encrypted);
        }

        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(CorruptReason::NoPages);
        }

        let mut blank_pages = Vec::new();
        for (i, page_id) in page_ids.iter().enumerate() {
            let page = i as u32 + 1;
            let dict = document
                .get_dictionary(*page_id)
                .map_err(|err| broken(page, format!("page object unreadable: {err}")))?;

            let media_box = inherited(&document, dict, b"MediaBox")
                .ok_or_else(|| broken(page, "no MediaBox".into()))?;
            check_media_box(&document, media_box).map_err(|detail| broken(page, detail))?;

            let content = document
                .get_page_content(*page_id)
                .map_err(|err| broken(page, format!("content stream unreadable: {err}")))?;
            let decoded = Content::decode(&content)
                .map_err(|err| broken(page, format!("content stream undecodable: {err}")))?;

            let paints = decoded
                .operations
                .iter()
                .any(|op| PAINTING_OPERATORS.contains(&op.operator.as_str()));
            let annotated = dict
                .get(b"Annots")
                .and_then(|a| document.dereference(a))
                .ok()
                .and_then(|(_, a)| a.as_array().ok())
                .is_some_and(|a| !a.is_empty());
            if !paints && !annotated {
                blank_pages.push(page);
            }
        }

        let inspection = Inspection {
            pdf_version: document.version.clone(),
            page_count: page_ids.len() as u32,
            blank_pages,
        };
        debug!(
            pages = inspection.page_count,
            blank = inspection.blank_pages.len(),
            version = %inspection.pdf_version,
            "Attachment inspected"
        );
        Ok(InspectedPdf {
            document,
            page_ids,
            inspection,
        })
    }
}

fn broken(page: u32, detail: String) -> CorruptReason {
    CorruptReason::BrokenPage { page, detail }
}

fn looks_encrypted(bytes: &[u8], detail: &str) -> bool {
    let detail = detail.to_ascii_lowercase();
    detail.contains("encrypt")
        || detail.contains("decrypt")
        || detail.contains("password")
        || trailer_declares_encryption(bytes)
}

/// True when the last `trailer` dictionary has an `/Encrypt` entry whose
/// value is a reference or a dictionary. Page content is never scanned.
fn trailer_declares_encryption(bytes: &[u8]) -> bool {
    const TRAILER: &[u8] = b"trailer";
    const KEY: &[u8] = b"/Encrypt";
    let Some(start) = bytes.windows(TRAILER.len()).rposition(|w| w == TRAILER) else {
        return false;
    };
    let section = &bytes[start..];
    section.windows(KEY.len()).enumerate().any(|(i, w)| {
        w == KEY
            && section[i + KEY.len()..]
                .iter()
                .find(|b| !b.is_ascii_whitespace())
                .is_some_and(|b| b.is_ascii_digit() || *b == b'<')
    })
}

/// Look up `key` on the page or the nearest ancestor that defines it.
pub(crate) fn inherited<'a>(
    document: &'a Document,
    page: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = page;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = document.get_dictionary(parent).ok()?;
    }
    None
}

fn check_media_box(document: &Document, media_box: &Object) -> Result<(), String> {
    let (_, resolved) = document
        .dereference(media_box)
        .map_err(|err| format!("MediaBox unresolvable: {err}"))?;
    let values = resolved
        .as_array()
        .map_err(|_| "MediaBox is not an array".to_string())?;
    if values.len() != 4 {
        return Err(format!("MediaBox has {} entries", values.len()));
    }
    let numbers: Vec<f32> = values
        .iter()
        .map(|v| v.as_float().map_err(|_| "MediaBox entry is not a number".to_string()))
        .collect::<Result<_, _>>()?;
    let (width, height) = ((numbers[2] - numbers[0]).abs(), (numbers[3] - numbers[1]).abs());
    if !(width > 0.0 && height > 0.0) {
        return Err(format!("MediaBox has zero area ({width} x {height})"));
    }
    Ok(())
}
