// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end tests: report data in, PDF + ZIP bundle out.

use std::io::{Cursor, Read};
use std::path::Path;

use chrono::NaiveDate;
use clinreport_core::attachment::{AttachmentCategory, AttachmentRef, ByteSource};
use clinreport_core::config::PipelineConfig;
use clinreport_core::error::{PipelineStage, ReportError};
use clinreport_core::types::{
    AudiometryResult, Ear, EvaluatedPerson, EvaluatorIdentity, Measurement, ReportKind,
    ReportMetadata, ThresholdReading,
};
use clinreport_document::pdf::fixtures;
use clinreport_document::{AttachmentMerger, WatermarkSpec};
use clinreport_export::lease::DestinationLease;
use clinreport_export::{
    CancelToken, ExportStatus, ExportTarget, PackageExporter, ReportPipeline, ReportRequest,
};
use image::{ImageFormat, Rgba, RgbaImage};
use zip::ZipArchive;

fn metadata() -> ReportMetadata {
    ReportMetadata {
        report_id: "AUD-2026-014".into(),
        kind: ReportKind::Audiometry,
        institution: "Occupational Health Clinic".into(),
        company: "Acme Foods".into(),
        site: "North Plant".into(),
        evaluator: EvaluatorIdentity {
            name: "Dr. Ana Ruiz".into(),
            profession: "Audiologist".into(),
            registry: "4411".into(),
        },
        issue_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
        conclusions: "Most workers show normal hearing.".into(),
        recommendations: "- Annual follow-up".into(),
        profile: Default::default(),
        technical_team: Vec::new(),
    }
}

fn persons(count: usize) -> Vec<EvaluatedPerson> {
    (0..count)
        .map(|i| EvaluatedPerson {
            full_name: format!("Worker {i}"),
            identification: format!("ID-{i:04}"),
            age: Some(30 + i as u32),
            position: "Operator".into(),
            department: "Packing".into(),
            measurement: Measurement::Audiometry(AudiometryResult {
                thresholds: [500, 1000, 2000, 4000]
                    .into_iter()
                    .flat_map(|hz| {
                        [Ear::Right, Ear::Left].map(|ear| ThresholdReading {
                            ear,
                            frequency_hz: hz,
                            level_db: 15 + (i as i32 % 4) * 5,
                        })
                    })
                    .collect(),
            }),
            observations: String::new(),
        })
        .collect()
}

fn watermark_png() -> Vec<u8> {
    let img = RgbaImage::from_pixel(64, 32, Rgba([20, 90, 160, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn attachments() -> Vec<AttachmentRef> {
    vec![
        AttachmentRef::new(
            ByteSource::memory(fixtures::pdf_with_pages(&["raw 1", "raw 2"])),
            AttachmentCategory::RawData,
            2,
            "Raw audiograms",
        ),
        AttachmentRef::new(
            ByteSource::memory(fixtures::encrypted_pdf()),
            AttachmentCategory::Supplementary,
            3,
            "Locked scan",
        ),
        AttachmentRef::new(
            ByteSource::memory(fixtures::pdf_with_pages(&["calibration"])),
            AttachmentCategory::Certificate,
            1,
            "Audiometer calibration",
        ),
    ]
}

fn request(dir: &Path, base: &str) -> ReportRequest {
    let config = PipelineConfig::default();
    ReportRequest {
        metadata: metadata(),
        persons: persons(15),
        watermark: Some(WatermarkSpec::new(watermark_png(), &config.watermark)),
        attachments: attachments(),
        target: ExportTarget::new(dir, base),
    }
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn pipeline_writes_a_partial_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = ReportPipeline::default()
        .run(request(dir.path(), "Acme Foods 2026"), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(bundle.status(), ExportStatus::Partial { excluded: 1 });
    assert_eq!(bundle.exclusions()[0].label, "Locked scan");
    assert_eq!(file_names(dir.path()), vec!["Acme_Foods_2026.pdf", "Acme_Foods_2026.zip"]);

    // Attachments follow the report in rank order.
    let labels: Vec<&str> = bundle.included().iter().map(|a| a.label.as_str()).collect();
    assert_eq!(labels, vec!["Audiometer calibration", "Raw audiograms"]);

    let pdf = std::fs::read(bundle.pdf_path()).unwrap();
    let doc = lopdf::Document::load_mem(&pdf).unwrap();
    assert_eq!(doc.get_pages().len() as u32, bundle.page_count());
    let markers = fixtures::page_markers(&pdf);
    let tail = &markers[markers.len() - 3..];
    assert_eq!(tail, ["calibration", "raw 1", "raw 2"]);

    let mut archive = ZipArchive::new(std::fs::File::open(bundle.archive_path()).unwrap()).unwrap();
    let mut report = Vec::new();
    archive
        .by_name("report.pdf")
        .unwrap()
        .read_to_end(&mut report)
        .unwrap();
    assert_eq!(report, pdf);

    let mut original = Vec::new();
    archive
        .by_name("attachments/certificates/Audiometer_calibration.pdf")
        .unwrap()
        .read_to_end(&mut original)
        .unwrap();
    assert_eq!(original, fixtures::pdf_with_pages(&["calibration"]));

    let mut json = String::new();
    archive
        .by_name("manifest.json")
        .unwrap()
        .read_to_string(&mut json)
        .unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(manifest["bundle_id"], bundle.bundle_id().to_string());
    assert_eq!(manifest["document"]["sha256"], bundle.pdf_sha256());
    assert_eq!(manifest["exclusions"][0]["reason"]["reason"], "encrypted");
    assert_eq!(manifest["attachments"].as_array().unwrap().len(), 2);
    assert!(archive.by_name("manifest.txt").is_ok());
}

#[tokio::test]
async fn cancelled_run_leaves_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = ReportPipeline::default()
        .run(request(dir.path(), "cancelled"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::ExportCancelled));
    assert!(file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn concurrent_export_to_same_destination_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = std::fs::canonicalize(dir.path()).unwrap();
    let _held = DestinationLease::acquire(canonical.join("busy")).unwrap();

    let err = ReportPipeline::default()
        .run(request(dir.path(), "busy"), &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::DestinationBusy(_)));
    assert_eq!(err.stage(), PipelineStage::Export);
    assert!(file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn existing_artifacts_are_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("kept.zip"), b"earlier bundle").unwrap();

    let err = ReportPipeline::default()
        .run(request(dir.path(), "kept"), &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::DestinationExists(_)));
    assert_eq!(file_names(dir.path()), vec!["kept.zip"]);
    assert_eq!(
        std::fs::read(dir.path().join("kept.zip")).unwrap(),
        b"earlier bundle"
    );
}

#[tokio::test]
async fn invalid_report_data_fails_in_build_stage() {
    let dir = tempfile::tempdir().unwrap();
    let mut req = request(dir.path(), "empty");
    req.persons.clear();
    let err = ReportPipeline::default()
        .run(req, &CancelToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.stage(), PipelineStage::Build);
    assert!(file_names(dir.path()).is_empty());
}

/// Every archive entry by name. Only `generated_at` may differ between runs,
/// so it is blanked in both manifests.
fn archive_contents(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let name = entry.name().to_string();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).unwrap();
            let bytes = match name.as_str() {
                "manifest.json" => {
                    let mut json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
                    json["generated_at"] = serde_json::Value::Null;
                    serde_json::to_vec(&json).unwrap()
                }
                "manifest.txt" => String::from_utf8(bytes)
                    .unwrap()
                    .lines()
                    .filter(|line| !line.starts_with("Generated:"))
                    .collect::<Vec<_>>()
                    .join("\n")
                    .into_bytes(),
                _ => bytes,
            };
            (name, bytes)
        })
        .collect()
}

#[tokio::test]
async fn identical_runs_produce_identical_bundles() {
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();
    let pipeline = ReportPipeline::default();
    let first = pipeline
        .run(request(first_dir.path(), "bundle"), &CancelToken::new())
        .await
        .unwrap();
    let second = pipeline
        .run(request(second_dir.path(), "bundle"), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(
        std::fs::read(first.pdf_path()).unwrap(),
        std::fs::read(second.pdf_path()).unwrap()
    );
    assert_eq!(first.pdf_sha256(), second.pdf_sha256());
    assert_eq!(first.bundle_id(), second.bundle_id());
    assert_eq!(first.entries(), second.entries());
    assert_eq!(
        archive_contents(first.archive_path()),
        archive_contents(second.archive_path())
    );
}

#[tokio::test]
async fn exporting_one_merge_twice_is_identical() {
    let base = fixtures::pdf_with_pages(&["report 1", "report 2"]);
    let originals = attachments();
    let merged = AttachmentMerger::default()
        .merge(&base, &originals)
        .await
        .unwrap();

    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();
    let exporter = PackageExporter::default();
    let first = exporter
        .export(
            merged.clone(),
            &originals,
            &metadata(),
            &ExportTarget::new(first_dir.path(), "bundle"),
            &CancelToken::new(),
        )
        .await
        .unwrap();
    let second = exporter
        .export(
            merged,
            &originals,
            &metadata(),
            &ExportTarget::new(second_dir.path(), "bundle"),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(first.bundle_id(), second.bundle_id());
    assert_eq!(
        archive_contents(first.archive_path()),
        archive_contents(second.archive_path())
    );
}
