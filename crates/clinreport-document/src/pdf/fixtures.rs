// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory PDF fixtures for tests. Every page carries one marker string so
// merged output can be checked page by page.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

/// A PDF whose pages show the given markers; an empty marker makes a blank
/// page. MediaBox and Resources live on the Pages node and are inherited.
pub fn pdf_with_pages(markers: &[&str]) -> Vec<u8> {
    pdf_with_version("1.5", markers)
}

pub fn pdf_with_version(version: &str, markers: &[&str]) -> Vec<u8> {
    save(build(version, markers, true))
}

/// Pages with no MediaBox anywhere in the tree.
pub fn pdf_without_media_box() -> Vec<u8> {
    save(build("1.5", &["orphan"], false))
}

/// A document whose trailer declares standard-handler encryption.
pub fn encrypted_pdf() -> Vec<u8> {
    let mut doc = build("1.5", &["secret"], true);
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "O" => Object::string_literal(vec![0x41u8; 32]),
        "U" => Object::string_literal(vec![0x42u8; 32]),
        "P" => -4,
    });
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::string_literal(vec![1u8; 16]),
            Object::string_literal(vec![1u8; 16]),
        ]),
    );
    save(doc)
}

/// The first part of a valid PDF, cut before the trailer.
pub fn truncated_pdf() -> Vec<u8> {
    let mut bytes = pdf_with_pages(&["first", "second"]);
    bytes.truncate(bytes.len() * 3 / 5);
    bytes
}

/// Marker strings of every page, in page order. Blank pages give "".
pub fn page_markers(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).expect("fixture output must parse");
    doc.get_pages()
        .into_values()
        .map(|page_id| {
            let content = doc.get_page_content(page_id).expect("page content");
            Content::decode(&content)
                .expect("decodable content")
                .operations
                .iter()
                .filter(|op| op.operator == "Tj")
                .filter_map(|op| op.operands.first())
                .filter_map(|o| o.as_str().ok())
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn build(version: &str, markers: &[&str], with_media_box: bool) -> Document {
    let mut doc = Document::with_version(version);
    let pages_id: ObjectId = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::with_capacity(markers.len());
    for marker in markers {
        let operations = if marker.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 18.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*marker)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("fixture content encodes"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Count" => markers.len() as i64,
        "Kids" => kids,
        "Resources" => resources_id,
    };
    if with_media_box {
        pages.set(
            "MediaBox",
            vec![0.into(), 0.into(), 612.into(), 792.into()],
        );
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture serialises");
    bytes
}
