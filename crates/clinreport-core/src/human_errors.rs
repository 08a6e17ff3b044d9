// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the people issuing reports.
//
// Every technical error is mapped to plain English with a clear suggestion.
// The severity drives how the calling UI presents it.

use crate::attachment::{CorruptAttachment, CorruptReason};
use crate::error::ReportError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Timeout, busy destination; trying again may work.
    Transient,
    /// User must fix something (data, file, destination) first.
    ActionRequired,
    /// Retrying the same input will fail the same way.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether retrying without changes can succeed.
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    fn new(message: impl Into<String>, suggestion: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable: severity == Severity::Transient,
            severity,
        }
    }
}

/// Convert a fatal `ReportError` into a `HumanError`.
pub fn humanize_error(err: &ReportError) -> HumanError {
    match err {
        // -- Build --
        ReportError::InvalidReportData(detail) => HumanError::new(
            "The report data isn't complete.",
            format!("Check the evaluated people and their results, then try again. ({detail})"),
            Severity::ActionRequired,
        ),

        // -- Watermark --
        ReportError::ImageDecode(_) => HumanError::new(
            "The watermark image couldn't be used.",
            "The image may be damaged, too large or in an unusual format. Try saving it as a PNG first.",
            Severity::ActionRequired,
        ),

        ReportError::UnsupportedOpacity(value) => HumanError::new(
            "The watermark transparency is out of range.",
            format!("Choose an opacity between 0 and 1 (you chose {value})."),
            Severity::ActionRequired,
        ),

        ReportError::InvalidWatermarkSpec(detail) => HumanError::new(
            "The watermark settings aren't valid.",
            format!("Check the watermark size and position. ({detail})"),
            Severity::ActionRequired,
        ),

        // -- Render / merge --
        ReportError::Render(_) => HumanError::new(
            "The report PDF couldn't be produced.",
            "Try again. If this keeps happening, please report it.",
            Severity::Permanent,
        ),

        ReportError::InvalidBaseDocument(_) | ReportError::Merge(_) => HumanError::new(
            "The generated report couldn't be combined with its attachments.",
            "Generate the report again. If this keeps happening, please report it.",
            Severity::Permanent,
        ),

        // -- Export --
        ReportError::ExportIo { source, .. } | ReportError::Io(source) => humanize_io(source),

        ReportError::DestinationBusy(_) => HumanError::new(
            "This report is already being saved.",
            "Wait for the other export to finish, then try again.",
            Severity::Transient,
        ),

        ReportError::DestinationExists(path) => HumanError::new(
            "A report with this name already exists.",
            format!(
                "Choose a different name or folder, or move the existing file away. ({})",
                path.display()
            ),
            Severity::ActionRequired,
        ),

        ReportError::ExportCancelled => HumanError::new(
            "The export was cancelled.",
            "Nothing was saved. Start the export again when you're ready.",
            Severity::Transient,
        ),

        ReportError::IntegrityMismatch { .. } => HumanError::new(
            "An attachment changed while the report was being exported.",
            "Make sure nobody is editing the attachment files, then run the export again.",
            Severity::ActionRequired,
        ),

        ReportError::Archive(_) | ReportError::Serialization(_) => HumanError::new(
            "The report bundle couldn't be written.",
            "Try again. If this keeps happening, please report it.",
            Severity::Transient,
        ),
    }
}

fn humanize_io(io_err: &std::io::Error) -> HumanError {
    match io_err.kind() {
        std::io::ErrorKind::NotFound => HumanError::new(
            "The destination folder couldn't be found.",
            "It may have been moved or deleted. Choose the folder again.",
            Severity::ActionRequired,
        ),
        std::io::ErrorKind::PermissionDenied => HumanError::new(
            "We don't have permission to save there.",
            "Choose a different folder, or check the folder permissions.",
            Severity::ActionRequired,
        ),
        _ => HumanError::new(
            "There was a problem writing the report files.",
            "Try again. If this keeps happening, the disk may be full.",
            Severity::Transient,
        ),
    }
}

/// Convert a per-attachment exclusion into a `HumanError` naming the file.
pub fn humanize_exclusion(warning: &CorruptAttachment) -> HumanError {
    let name = &warning.label;
    match &warning.reason {
        CorruptReason::Unreadable { .. } => HumanError::new(
            format!("The attachment '{name}' couldn't be opened."),
            "It may have been moved or deleted. Choose the file again.",
            Severity::ActionRequired,
        ),
        CorruptReason::TimedOut { .. } => HumanError::new(
            format!("The attachment '{name}' took too long to load."),
            "Check the network connection to where the file is stored, then try again.",
            Severity::Transient,
        ),
        CorruptReason::NotPdf { .. } | CorruptReason::BrokenPage { .. } => HumanError::new(
            format!("The attachment '{name}' is damaged."),
            "Try opening it in a PDF viewer first. If it opens, save a fresh copy and attach that.",
            Severity::Permanent,
        ),
        CorruptReason::Encrypted => HumanError::new(
            format!("The attachment '{name}' is password protected."),
            "Save an unprotected copy of the PDF and attach that instead.",
            Severity::ActionRequired,
        ),
        CorruptReason::NoPages => HumanError::new(
            format!("The attachment '{name}' has no pages."),
            "Check you chose the right file.",
            Severity::ActionRequired,
        ),
        CorruptReason::WorkerFailed { .. } => HumanError::new(
            format!("The attachment '{name}' couldn't be checked."),
            "Try the export again.",
            Severity::Transient,
        ),
    }
}
