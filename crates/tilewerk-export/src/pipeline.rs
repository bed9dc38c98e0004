// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Export pipeline: turns a document context and an export job into files.
//
// Every target renders tiles with `PageRenderer` in print mode.  The
// cancellation token is checked before each page; a cancelled tile-image
// export removes the files it already wrote, while an IO failure leaves
// partial output in place.

use std::path::PathBuf;

use tilewerk_core::config::TilerConfig;
use tilewerk_core::error::{Result, TilewerkError};
use tilewerk_core::human_errors::{HumanError, humanize_error};
use tilewerk_core::types::{ImageFormat, Orientation};
use tilewerk_layout::ScaleFactor;
use tilewerk_render::{LabelFont, MetadataPageGenerator, OverlayMode, PageRaster, PageRenderer};
use tracing::{error, info, instrument, warn};

use crate::context::DocumentContext;
use crate::images::{TileImageWriter, encode};
use crate::job::{ExportId, ExportJob, ExportTarget, Sheet, sheet_order};
use crate::pdf::TilePdfWriter;
use crate::task::CancellationToken;

/// What a finished export produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub job_id: ExportId,
    pub target: ExportTarget,
    /// Files written, in page order.
    pub files: Vec<PathBuf>,
    /// Pages produced, summary page included.
    pub pages: usize,
    pub orientation: Orientation,
}

/// Final state of an export as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Completed(ExportReport),
    Cancelled,
    Failed(HumanError),
}

/// Called after each finished page with `(done, total)`.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Sync);

/// Runs export jobs against one configuration snapshot.
#[derive(Clone, Copy)]
pub struct ExportPipeline<'a> {
    config: &'a TilerConfig,
    progress: Option<ProgressFn<'a>>,
}

impl std::fmt::Debug for ExportPipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("config", self.config)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl<'a> ExportPipeline<'a> {
    pub fn new(config: &'a TilerConfig) -> Self {
        Self { config, progress: None }
    }

    pub fn with_progress(mut self, progress: ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn page_done(&self, done: usize, total: usize) {
        if let Some(progress) = self.progress {
            progress(done, total);
        }
    }

    /// Run `job`, stopping with `Cancelled` if `token` fires between pages.
    #[instrument(skip_all, fields(job_id = %job.id, target = ?job.target))]
    pub fn run(&self, job: &ExportJob, ctx: &DocumentContext, token: &CancellationToken) -> Result<ExportReport> {
        token.check()?;
        let scale = ctx.require_scale()?;
        let (ctx, orientation) = ctx.layout_for(job.paper, job.orientation, self.config.gutter_size_mm, self.config.limits)?;
        let ctx: &DocumentContext = &ctx;
        let grid = ctx.require_grid()?;
        info!(pages = grid.len(), ?orientation, dpi = job.dpi, "export started");

        let (files, pages) = match job.target {
            ExportTarget::MultiPagePdf => self.multi_page_pdf(job, ctx, scale, orientation, token)?,
            ExportTarget::CompositePdf => self.composite_pdf(job, ctx, scale, token)?,
            ExportTarget::TileImages(format) => self.tile_images(job, ctx, scale, format, token)?,
            ExportTarget::CompositeImage(format) => self.composite_image(job, ctx, scale, format, token)?,
        };

        info!(files = files.len(), pages, "export finished");
        Ok(ExportReport {
            job_id: job.id,
            target: job.target,
            files,
            pages,
            orientation,
        })
    }

    /// `run`, with errors logged and turned into a user-facing outcome.
    pub fn run_reported(&self, job: &ExportJob, ctx: &DocumentContext, token: &CancellationToken) -> ExportOutcome {
        match self.run(job, ctx, token) {
            Ok(report) => ExportOutcome::Completed(report),
            Err(TilewerkError::Cancelled) => {
                warn!(job_id = %job.id, "export cancelled");
                ExportOutcome::Cancelled
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "export failed");
                ExportOutcome::Failed(humanize_error(&e))
            }
        }
    }

    fn renderer(&self) -> PageRenderer<'a> {
        PageRenderer::new(self.config, OverlayMode::Print)
    }

    fn render_tile(&self, ctx: &DocumentContext, index: usize, scale: ScaleFactor) -> PageRaster {
        let page = &ctx.grid.pages[index];
        self.renderer()
            .render(&ctx.raster, page, index, scale, ctx.calibration.as_ref())
    }

    // -- Multi-page PDF -------------------------------------------------------

    fn multi_page_pdf(
        &self,
        job: &ExportJob,
        ctx: &DocumentContext,
        scale: ScaleFactor,
        orientation: Orientation,
        token: &CancellationToken,
    ) -> Result<(Vec<PathBuf>, usize)> {
        let mut writer = TilePdfWriter::new(&ctx.document_name, job.dpi);
        let (page_w, page_h) = job.paper.oriented_mm(orientation);

        let sheets = sheet_order(ctx.grid.len(), job.include_metadata, job.metadata_position);
        let total = sheets.len();
        for (position, sheet) in sheets.into_iter().enumerate() {
            token.check()?;
            match sheet {
                Sheet::Summary => self.add_metadata_page(&mut writer, job, ctx, scale, orientation),
                Sheet::Tile(index) => {
                    let raster = self.render_tile(ctx, index, scale);
                    writer.add_full_page(&raster, page_w, page_h);
                }
            }
            self.page_done(position + 1, total);
        }

        let pages = writer.page_count();
        writer.save(&job.output)?;
        Ok((vec![job.output.clone()], pages))
    }

    /// Summary page, always portrait, rendered at the job DPI.
    fn add_metadata_page(
        &self,
        writer: &mut TilePdfWriter,
        job: &ExportJob,
        ctx: &DocumentContext,
        scale: ScaleFactor,
        orientation: Orientation,
    ) {
        let (w_mm, h_mm) = job.paper.oriented_mm(Orientation::Portrait);
        let (w_px, h_px) = writer.page_pixels(w_mm, h_mm);
        let info = ctx
            .metadata_info(scale, self.config)
            .with_tiling(job.paper, orientation, self.config.gutter_size_mm)
            .with_export(job.target.label(), job.dpi, job.output_dir());
        let page = MetadataPageGenerator.generate(&info, Some(ctx.plan_view(scale, self.config)), w_px, h_px);
        writer.add_full_page(&page, w_mm, h_mm);
    }

    // -- Composites -----------------------------------------------------------

    /// Every tile drawn at its offset on one canvas covering the union of
    /// the page rects.
    fn composite_raster(&self, ctx: &DocumentContext, scale: ScaleFactor, token: &CancellationToken) -> Result<PageRaster> {
        let bounds = ctx
            .grid
            .bounds()
            .ok_or_else(|| TilewerkError::EmptyGrid("no pages have been laid out".into()))?;
        let mut canvas = PageRaster::blank(bounds.width, bounds.height);
        for (index, page) in ctx.grid.pages.iter().enumerate() {
            token.check()?;
            let tile = self.render_tile(ctx, index, scale);
            canvas.blit(&tile, page.x - bounds.x, page.y - bounds.y);
            self.page_done(index + 1, ctx.grid.len());
        }
        Ok(canvas)
    }

    fn composite_pdf(
        &self,
        job: &ExportJob,
        ctx: &DocumentContext,
        scale: ScaleFactor,
        token: &CancellationToken,
    ) -> Result<(Vec<PathBuf>, usize)> {
        let composite = self.composite_raster(ctx, scale, token)?;
        let orientation = composite_orientation(&composite, self.config.limits.composite_landscape_aspect);
        let (page_w, page_h) = job.paper.oriented_mm(orientation);

        let mut writer = TilePdfWriter::new(&ctx.document_name, job.dpi);
        writer.add_fitted_page(&composite, page_w, page_h, self.config.export.composite_margin_mm);
        writer.save(&job.output)?;
        Ok((vec![job.output.clone()], 1))
    }

    fn composite_image(
        &self,
        job: &ExportJob,
        ctx: &DocumentContext,
        scale: ScaleFactor,
        format: ImageFormat,
        token: &CancellationToken,
    ) -> Result<(Vec<PathBuf>, usize)> {
        let composite = self.composite_raster(ctx, scale, token)?;
        let font = LabelFont::from_config(self.config);
        if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        encode(
            &composite.flatten(font.as_ref()),
            &job.output,
            format,
            self.config.export.jpeg_quality,
        )?;
        Ok((vec![job.output.clone()], 1))
    }

    // -- Tile images ----------------------------------------------------------

    fn tile_images(
        &self,
        job: &ExportJob,
        ctx: &DocumentContext,
        scale: ScaleFactor,
        format: ImageFormat,
        token: &CancellationToken,
    ) -> Result<(Vec<PathBuf>, usize)> {
        let writer = TileImageWriter::new(
            &job.output,
            format,
            self.config.export.jpeg_quality,
            LabelFont::from_config(self.config),
        );
        writer.prepare()?;

        let total = ctx.grid.len();
        let mut written = Vec::with_capacity(total);
        for index in 0..total {
            if let Err(e) = token.check() {
                roll_back(&written);
                return Err(e);
            }
            let raster = self.render_tile(ctx, index, scale);
            written.push(writer.write_tile(index, &raster)?);
            self.page_done(index + 1, total);
        }
        let pages = written.len();
        Ok((written, pages))
    }
}

/// Landscape when the composite is wider than `landscape_aspect`.
fn composite_orientation(composite: &PageRaster, landscape_aspect: f64) -> Orientation {
    let aspect = composite.width() as f64 / composite.height().max(1) as f64;
    if aspect > landscape_aspect {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    }
}

/// Remove files written by a cancelled run.  Failures are logged only.
fn roll_back(files: &[PathBuf]) {
    for path in files {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "could not remove partial export file");
        }
    }
    if !files.is_empty() {
        info!(removed = files.len(), "cancelled export rolled back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn calibrated(config: &TilerConfig) -> DocumentContext {
        let mut ctx = DocumentContext::new(RgbaImage::from_pixel(300, 250, Rgba([180, 180, 180, 255])), "plan");
        ctx.set_scale(ScaleFactor::new(1.0).expect("scale"), config);
        ctx
    }

    #[test]
    fn uncalibrated_document_fails_with_human_message() {
        let config = TilerConfig::default();
        let ctx = DocumentContext::new(RgbaImage::new(10, 10), "plan");
        let job = ExportJob::new(ExportTarget::MultiPagePdf, "/tmp/unused.pdf", &config);
        match ExportPipeline::new(&config).run_reported(&job, &ctx, &CancellationToken::new()) {
            ExportOutcome::Failed(human) => assert!(!human.message.is_empty()),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn wide_composites_go_landscape() {
        assert_eq!(composite_orientation(&PageRaster::blank(300, 100), 1.414), Orientation::Landscape);
        assert_eq!(composite_orientation(&PageRaster::blank(140, 100), 1.414), Orientation::Portrait);
    }

    #[test]
    fn composite_canvas_covers_union_of_pages() {
        let config = TilerConfig::default();
        let ctx = calibrated(&config);
        let bounds = ctx.grid.bounds().expect("bounds");
        let canvas = ExportPipeline::new(&config)
            .composite_raster(&ctx, ScaleFactor::new(1.0).expect("scale"), &CancellationToken::new())
            .expect("composite");
        assert_eq!((canvas.width(), canvas.height()), (bounds.width, bounds.height));
        // Second tile's page label is shifted by its offset.
        assert!(canvas.texts.iter().any(|t| t.text == "P2" && t.x > bounds.width as f32 / 2.0));
    }

    #[test]
    fn tile_images_written_in_order() {
        let config = TilerConfig::default();
        let ctx = calibrated(&config);
        let dir = tempfile::tempdir().expect("tempdir");
        let job = ExportJob::new(ExportTarget::TileImages(ImageFormat::Png), dir.path(), &config);
        let report = ExportPipeline::new(&config)
            .run(&job, &ctx, &CancellationToken::new())
            .expect("export");
        assert_eq!(report.pages, 2);
        assert_eq!(report.files[0], dir.path().join("tile_page_001.png"));
        assert_eq!(report.files[1], dir.path().join("tile_page_002.png"));
        assert!(report.files.iter().all(|f| f.exists()));
    }

    #[test]
    fn rollback_removes_written_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"x").expect("write");
        roll_back(&[path.clone(), dir.path().join("missing.png")]);
        assert!(!path.exists());
    }
}
