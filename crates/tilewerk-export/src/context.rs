// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The document state every export and print call works from.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use tilewerk_core::config::{LayoutLimits, TilerConfig};
use tilewerk_core::error::{Result, TilewerkError};
use tilewerk_core::types::{Orientation, OrientationPolicy, PaperSize};
use tilewerk_layout::{PageGrid, PageGridCalculator, ScaleCalibration, ScaleFactor, ScaleResolver, choose_orientation};
use tilewerk_render::{MetadataDocInfo, PlanView, RegistrationMarks};
use tracing::{info, instrument, warn};

/// A loaded document with its calibration and current page grid.
///
/// The raster is shared and never modified; cloning a context is cheap apart
/// from the page list.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    pub raster: Arc<RgbaImage>,
    pub scale: Option<ScaleFactor>,
    pub grid: PageGrid,
    pub calibration: Option<ScaleCalibration>,
    pub document_name: String,
    pub project_name: Option<String>,
    pub original_file: Option<PathBuf>,
}

impl DocumentContext {
    pub fn new(raster: RgbaImage, document_name: impl Into<String>) -> Self {
        Self {
            raster: Arc::new(raster),
            scale: None,
            grid: PageGrid::default(),
            calibration: None,
            document_name: document_name.into(),
            project_name: None,
            original_file: None,
        }
    }

    /// Decode a raster image from disk.
    #[instrument]
    pub fn open(path: &Path) -> Result<Self> {
        let decoded = image::open(path)
            .map_err(|e| TilewerkError::ImageError(format!("{}: {e}", path.display())))?
            .to_rgba8();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled Document".into());
        info!(width = decoded.width(), height = decoded.height(), "document loaded");
        let mut ctx = Self::new(decoded, name);
        ctx.original_file = Some(path.to_path_buf());
        Ok(ctx)
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    /// Resolve a calibration, store it, and rebuild the grid.
    pub fn apply_calibration(&mut self, calibration: ScaleCalibration, config: &TilerConfig) -> Result<ScaleFactor> {
        let scale = ScaleResolver::resolve(&calibration)?;
        self.calibration = Some(calibration);
        self.set_scale(scale, config);
        Ok(scale)
    }

    /// Set a known scale directly (no calibration line) and rebuild the grid.
    pub fn set_scale(&mut self, scale: ScaleFactor, config: &TilerConfig) {
        self.scale = Some(scale);
        self.rebuild_grid(config);
    }

    /// Recompute the page grid from the current scale and configuration.
    pub fn rebuild_grid(&mut self, config: &TilerConfig) {
        let Some(scale) = self.scale else {
            self.grid = PageGrid::default();
            return;
        };
        let request = PageGridCalculator::request_for(
            self.width(),
            self.height(),
            scale,
            config.default_page_size,
            config.page_orientation,
            config.gutter_size_mm,
        );
        self.grid = PageGridCalculator::new(config.limits).compute(request);
        if let Some(notice) = &self.grid.notice {
            warn!(notice = %notice, "grid rebuilt empty");
        } else {
            info!(pages = self.grid.len(), "grid rebuilt");
        }
    }

    pub fn require_scale(&self) -> Result<ScaleFactor> {
        self.scale.ok_or_else(|| {
            TilewerkError::InvalidCalibration("document has not been calibrated".into())
        })
    }

    /// The context laid out for printing on `paper`, and the page orientation.
    ///
    /// Tiles must have the physical page's aspect, so the orientation is
    /// resolved first and the grid is rebuilt when it was computed for other
    /// paper, orientation or gutter.  The stored grid is reused otherwise.
    pub fn layout_for(
        &self,
        paper: PaperSize,
        policy: OrientationPolicy,
        gutter_mm: f64,
        limits: LayoutLimits,
    ) -> Result<(Cow<'_, DocumentContext>, Orientation)> {
        if self.width() == 0 || self.height() == 0 {
            return Err(TilewerkError::NoDocument);
        }
        let scale = self.require_scale()?;
        let calculator = PageGridCalculator::new(limits);
        let request_with = |policy: OrientationPolicy| {
            PageGridCalculator::request_for(self.width(), self.height(), scale, paper, policy, gutter_mm)
        };

        let policy_request = request_with(policy);
        let policy_grid = if self.grid.built_from(&policy_request) {
            Cow::Borrowed(&self.grid)
        } else {
            Cow::Owned(calculator.compute(policy_request))
        };
        let orientation = choose_orientation(policy, &policy_grid, paper, limits.auto_orientation_tolerance);

        let request = request_with(OrientationPolicy::from(orientation));
        if self.grid.built_from(&request) {
            return Ok((Cow::Borrowed(self), orientation));
        }
        let grid = match policy_grid {
            Cow::Owned(grid) if grid.built_from(&request) => grid,
            _ => calculator.compute(request),
        };
        let mut laid_out = self.clone();
        laid_out.grid = grid;
        info!(
            paper = %paper.name(),
            ?orientation,
            pages = laid_out.grid.len(),
            "grid rebuilt for output paper"
        );
        Ok((Cow::Owned(laid_out), orientation))
    }

    /// The grid, or the reason it is empty.
    pub fn require_grid(&self) -> Result<&PageGrid> {
        if self.grid.is_empty() {
            let reason = self
                .grid
                .notice
                .as_ref()
                .map(|n| n.message())
                .unwrap_or_else(|| "no pages have been laid out".into());
            return Err(TilewerkError::EmptyGrid(reason));
        }
        Ok(&self.grid)
    }

    /// Summary-page fields that come from the document itself.
    pub fn metadata_info(&self, scale: ScaleFactor, config: &TilerConfig) -> MetadataDocInfo {
        let mut info = MetadataDocInfo::from_grid(
            self.document_name.clone(),
            self.width(),
            self.height(),
            scale,
            config.default_units,
            self.grid.summary(),
        )
        .with_project_name(
            self.project_name
                .clone()
                .or_else(|| Some(self.document_name.clone())),
        );
        if let Some(path) = &self.original_file {
            info = info.with_original_file(path);
        }
        info
    }

    /// Assembly-map inputs; registration marks follow their display toggle.
    pub fn plan_view<'a>(&'a self, scale: ScaleFactor, config: &TilerConfig) -> PlanView<'a> {
        let marks = &config.overlays.registration_marks;
        PlanView {
            source: &self.raster,
            grid: &self.grid,
            registration: marks
                .toggle
                .display
                .then(|| RegistrationMarks::new(marks, scale)),
        }
    }
}
