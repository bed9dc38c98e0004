// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Export job description.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tilewerk_core::config::TilerConfig;
use tilewerk_core::error::{Result, TilewerkError};
use tilewerk_core::types::{ImageFormat, MetadataPosition, OrientationPolicy, PaperSize};
use uuid::Uuid;

/// Unique identifier for an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportId(pub Uuid);

impl ExportId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExportId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an export produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportTarget {
    /// One PDF page per tile, plus the optional summary page.
    MultiPagePdf,
    /// Every tile assembled and shrunk onto a single PDF page.
    CompositePdf,
    /// One image file per tile.
    TileImages(ImageFormat),
    /// Every tile assembled into one image at full resolution.
    CompositeImage(ImageFormat),
}

impl ExportTarget {
    /// Parse a CLI-style format name.  `composite` selects the single-sheet
    /// variant of the format.
    pub fn from_format_name(name: &str, composite: bool) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pdf" if composite => Ok(Self::CompositePdf),
            "pdf" => Ok(Self::MultiPagePdf),
            "composite-pdf" => Ok(Self::CompositePdf),
            other => {
                let format = ImageFormat::from_name(other)
                    .ok_or_else(|| TilewerkError::UnsupportedFormat(name.to_string()))?;
                Ok(if composite {
                    Self::CompositeImage(format)
                } else {
                    Self::TileImages(format)
                })
            }
        }
    }

    /// Format name shown on the summary page.
    pub fn label(&self) -> String {
        match self {
            Self::MultiPagePdf => "PDF".into(),
            Self::CompositePdf => "PDF (composite)".into(),
            Self::TileImages(f) => f.extension().to_uppercase(),
            Self::CompositeImage(f) => format!("{} (composite)", f.extension().to_uppercase()),
        }
    }
}

/// One physical page of a paged output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sheet {
    Summary,
    /// Grid index of the tile.
    Tile(usize),
}

/// Pages in output order: tiles in grid order, with the summary page before
/// or after them when included.
pub fn sheet_order(tiles: usize, include_summary: bool, position: MetadataPosition) -> Vec<Sheet> {
    let mut sheets: Vec<Sheet> = (0..tiles).map(Sheet::Tile).collect();
    if include_summary {
        match position {
            MetadataPosition::First => sheets.insert(0, Sheet::Summary),
            MetadataPosition::Last => sheets.push(Sheet::Summary),
        }
    }
    sheets
}

/// A fully specified export request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: ExportId,
    pub created_at: DateTime<Utc>,
    pub target: ExportTarget,
    pub paper: PaperSize,
    pub orientation: OrientationPolicy,
    pub dpi: u32,
    pub include_metadata: bool,
    pub metadata_position: MetadataPosition,
    /// File for PDFs and composites; file stem or directory for tile images.
    pub output: PathBuf,
}

impl ExportJob {
    /// Job using the configuration's page, DPI and summary-page defaults.
    pub fn new(target: ExportTarget, output: impl Into<PathBuf>, config: &TilerConfig) -> Self {
        Self {
            id: ExportId::new(),
            created_at: Utc::now(),
            target,
            paper: config.default_page_size,
            orientation: config.page_orientation,
            dpi: config.default_dpi,
            include_metadata: config.metadata_page.include,
            metadata_position: config.metadata_page.position,
            output: output.into(),
        }
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    /// Directory shown as the output location on the summary page.
    pub fn output_dir(&self) -> String {
        let dir = if self.output.is_dir() {
            self.output.as_path()
        } else {
            self.output.parent().unwrap_or(self.output.as_path())
        };
        let shown = dir.display().to_string();
        if shown.is_empty() { ".".into() } else { shown }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_map_to_targets() {
        assert_eq!(ExportTarget::from_format_name("pdf", false).expect("pdf"), ExportTarget::MultiPagePdf);
        assert_eq!(ExportTarget::from_format_name("PDF", true).expect("pdf"), ExportTarget::CompositePdf);
        assert_eq!(
            ExportTarget::from_format_name("jpeg", false).expect("jpeg"),
            ExportTarget::TileImages(ImageFormat::Jpeg)
        );
        assert_eq!(
            ExportTarget::from_format_name("png", true).expect("png"),
            ExportTarget::CompositeImage(ImageFormat::Png)
        );
        assert!(matches!(
            ExportTarget::from_format_name("svg", false),
            Err(TilewerkError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn job_takes_config_defaults() {
        let mut config = TilerConfig::default();
        config.default_dpi = 150;
        config.metadata_page.include = false;
        let job = ExportJob::new(ExportTarget::MultiPagePdf, "/tmp/out.pdf", &config);
        assert_eq!(job.dpi, 150);
        assert!(!job.include_metadata);
        assert_eq!(job.paper, PaperSize::A4);
    }

    #[test]
    fn summary_sheet_follows_position() {
        use Sheet::{Summary, Tile};
        assert_eq!(sheet_order(2, true, MetadataPosition::First), [Summary, Tile(0), Tile(1)]);
        assert_eq!(sheet_order(2, true, MetadataPosition::Last), [Tile(0), Tile(1), Summary]);
        assert_eq!(sheet_order(2, false, MetadataPosition::First), [Tile(0), Tile(1)]);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(ExportId::new(), ExportId::new());
    }

    #[test]
    fn output_dir_of_relative_file_is_current_dir() {
        let job = ExportJob::new(ExportTarget::MultiPagePdf, "out.pdf", &TilerConfig::default());
        assert_eq!(job.output_dir(), ".");
    }
}
