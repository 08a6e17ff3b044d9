// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.
//
// Every component receives its section explicitly at construction time.
// Missing fields in a serialized config fall back to the documented defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Orientation, PageGeometry, PaperSize};

/// Default maximum number of person rows on one table page.
pub const DEFAULT_MAX_ROWS_PER_PAGE: usize = 12;

/// Default watermark opacity (the faint background mark of printed reports).
pub const DEFAULT_WATERMARK_OPACITY: f32 = 0.06;

/// Default fraction of the page width covered by one watermark copy.
pub const DEFAULT_WATERMARK_SCALE: f32 = 0.60;

/// Settings for the whole pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub layout: LayoutConfig,
    pub watermark: WatermarkConfig,
    pub merge: MergeConfig,
    pub export: ExportConfig,
}

/// Report layout settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Hard cap on person rows per table page. Rows are also limited by the
    /// vertical space left on the page.
    pub max_rows_per_page: usize,
    pub paper: PaperSize,
    pub orientation: Orientation,
}

impl LayoutConfig {
    pub fn geometry(&self) -> PageGeometry {
        PageGeometry::new(self.paper, self.orientation)
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_rows_per_page: DEFAULT_MAX_ROWS_PER_PAGE,
            paper: PaperSize::Letter,
            orientation: Orientation::Landscape,
        }
    }
}

/// Watermark compositing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    pub default_opacity: f32,
    pub default_scale: f32,
    /// Resolution the watermark raster is prepared at.
    pub dpi: f32,
    /// Images wider or taller than this are rejected before allocation.
    pub max_dimension_px: u32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            default_opacity: DEFAULT_WATERMARK_OPACITY,
            default_scale: DEFAULT_WATERMARK_SCALE,
            dpi: 150.0,
            max_dimension_px: 8192,
        }
    }
}

/// Attachment merge settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Number of attachments validated concurrently.
    pub worker_pool_size: usize,
    /// Read timeout for sources that are not local storage.
    pub source_timeout_secs: u64,
    /// Drop attachment pages without any content operators.
    pub skip_blank_pages: bool,
}

impl MergeConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 4,
            source_timeout_secs: 30,
            skip_blank_pages: true,
        }
    }
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Deflate level for archive entries (0-9).
    pub compression_level: i64,
    pub create_missing_dirs: bool,
    /// Read timeout when re-reading attachment originals from non-local
    /// storage.
    pub source_timeout_secs: u64,
}

impl ExportConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
            create_missing_dirs: true,
            source_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.layout.max_rows_per_page, 12);
        assert_eq!(config.watermark.default_opacity, 0.06);
        assert_eq!(config.merge.worker_pool_size, 4);
        assert_eq!(config.merge.source_timeout(), Duration::from_secs(30));
        assert!(config.merge.skip_blank_pages);
        assert_eq!(config.export.compression_level, 6);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "layout": { "max_rows_per_page": 8 } }"#).unwrap();
        assert_eq!(config.layout.max_rows_per_page, 8);
        assert_eq!(config.layout.paper, PaperSize::Letter);
        assert_eq!(config.merge, MergeConfig::default());
    }

    #[test]
    fn default_geometry_is_letter_landscape() {
        let g = LayoutConfig::default().geometry();
        assert_eq!((g.width_mm, g.height_mm), (279.4, 215.9));
    }
}
