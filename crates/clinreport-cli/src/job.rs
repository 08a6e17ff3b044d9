// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job files: the JSON description of one report export.
//
// Relative paths inside a job file are resolved against the directory that
// contains it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clinreport_core::attachment::{AttachmentCategory, AttachmentRef, ByteSource};
use clinreport_core::config::PipelineConfig;
use clinreport_core::error::{ReportError, Result};
use clinreport_core::types::{EvaluatedPerson, ReportMetadata};
use clinreport_document::{Corner, WatermarkAnchor, WatermarkSpec};
use clinreport_export::{ExportTarget, ReportRequest};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    #[serde(default)]
    pub config: PipelineConfig,
    pub metadata: ReportMetadata,
    pub persons: Vec<EvaluatedPerson>,
    #[serde(default)]
    pub attachments: Vec<JobAttachment>,
    #[serde(default)]
    pub watermark: Option<JobWatermark>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobAttachment {
    pub path: PathBuf,
    pub category: AttachmentCategory,
    #[serde(default)]
    pub rank: u32,
    /// Defaults to the file stem.
    #[serde(default)]
    pub label: Option<String>,
    /// Network or removable storage; reads are bounded by a timeout.
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobWatermark {
    pub image_path: PathBuf,
    #[serde(default)]
    pub opacity: Option<f32>,
    #[serde(default)]
    pub scale: Option<f32>,
    #[serde(default)]
    pub anchor: AnchorName,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorName {
    #[default]
    Center,
    Tile,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl From<AnchorName> for WatermarkAnchor {
    fn from(name: AnchorName) -> Self {
        match name {
            AnchorName::Center => Self::Center,
            AnchorName::Tile => Self::Tile,
            AnchorName::TopLeft => Self::Corner(Corner::TopLeft),
            AnchorName::TopRight => Self::Corner(Corner::TopRight),
            AnchorName::BottomLeft => Self::Corner(Corner::BottomLeft),
            AnchorName::BottomRight => Self::Corner(Corner::BottomRight),
        }
    }
}

impl JobFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let job = serde_json::from_str(&text)?;
        debug!(job = %path.display(), "Job file loaded");
        Ok(job)
    }

    /// Turn the job into a pipeline request writing to `out_dir`. The base
    /// name defaults to the report id.
    pub fn into_request(
        self,
        job_dir: &Path,
        out_dir: &Path,
        name: Option<&str>,
    ) -> Result<(PipelineConfig, ReportRequest)> {
        let watermark = match &self.watermark {
            // A zero-opacity watermark leaves pages untouched; its image is
            // never opened.
            Some(w) if w.opacity.unwrap_or(self.config.watermark.default_opacity) == 0.0 => {
                debug!(image = %w.image_path.display(), "Watermark disabled by zero opacity");
                None
            }
            Some(w) => {
                let image = std::fs::read(job_dir.join(&w.image_path))?;
                let mut spec = WatermarkSpec::new(image, &self.config.watermark)
                    .with_anchor(w.anchor.into());
                if let Some(opacity) = w.opacity {
                    spec = spec.with_opacity(opacity);
                }
                if let Some(scale) = w.scale {
                    spec = spec.with_scale(scale);
                }
                Some(spec)
            }
            None => None,
        };

        let attachments = self
            .attachments
            .iter()
            .map(|a| attachment_ref(job_dir, a))
            .collect();
        let base_name = name.unwrap_or(&self.metadata.report_id);
        let target = ExportTarget::new(out_dir, base_name);

        let request = ReportRequest {
            metadata: self.metadata,
            persons: self.persons,
            watermark,
            attachments,
            target,
        };
        Ok((self.config, request))
    }
}

fn attachment_ref(job_dir: &Path, attachment: &JobAttachment) -> AttachmentRef {
    let path = job_dir.join(&attachment.path);
    let label = attachment.label.clone().unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let source = if attachment.remote {
        ByteSource::RemoteFile {
            path,
            timeout: attachment.timeout_secs.map(Duration::from_secs),
        }
    } else {
        ByteSource::LocalFile(path)
    };
    AttachmentRef::new(source, attachment.category, attachment.rank, label)
}
