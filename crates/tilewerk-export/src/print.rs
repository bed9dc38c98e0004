// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Direct printing through a page-painting device.
//
// Printing runs synchronously on the caller's thread.  A `PrintGuard`
// rejects a second print while one is running, and the device is always
// finished or aborted before `DirectPrinter::print` returns.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::{Rgba, RgbaImage, imageops};
use tilewerk_core::config::TilerConfig;
use tilewerk_core::error::{Result, TilewerkError};
use tilewerk_core::types::{MM_PER_INCH, Orientation, PaperSize, PixelRect};
use tilewerk_layout::ScaleFactor;
use tilewerk_render::canvas::BLACK;
use tilewerk_render::text::{approx_text_width, pt_to_px};
use tilewerk_render::{LabelFont, MetadataPageGenerator, OverlayMode, PageRaster, PageRenderer, TextRun};
use tracing::{debug, error, info, instrument, warn};

use crate::context::DocumentContext;
use crate::job::{Sheet, sheet_order};

const PAGE_LABEL_PT: f64 = 10.0;
const PAGE_LABEL_MARGIN: f32 = 20.0;

/// A device that paints whole pages, such as a printer or a spool directory.
pub trait PageDevice {
    /// Device resolution in dots per inch.
    fn resolution(&self) -> u32;

    /// Start a document.  The first page is opened implicitly.
    fn begin(&mut self, title: &str, paper: PaperSize, orientation: Orientation) -> Result<()>;

    /// Printable area of the current page, in device pixels.
    fn paint_rect(&self) -> PixelRect;

    /// Close the current page and open the next one.
    fn new_page(&mut self) -> Result<()>;

    /// Draw an image with its top-left corner at `(x, y)` device pixels.
    fn draw_image(&mut self, image: &RgbaImage, x: i64, y: i64) -> Result<()>;

    /// Close the last page and release the device.
    fn finish(&mut self) -> Result<()>;

    /// Drop the current page and release the device after a failure.
    fn abort(&mut self);
}

// -- Raster spool device ------------------------------------------------------

/// Writes each device page as a PNG file, `page_NNN.png`, into a directory.
#[derive(Debug)]
pub struct RasterSpoolDevice {
    dir: PathBuf,
    dpi: u32,
    margin_mm: f64,
    page_size: (u32, u32),
    current: Option<RgbaImage>,
    written: Vec<PathBuf>,
}

impl RasterSpoolDevice {
    pub fn new(dir: impl Into<PathBuf>, dpi: u32) -> Self {
        Self {
            dir: dir.into(),
            dpi: dpi.max(1),
            margin_mm: 0.0,
            page_size: (0, 0),
            current: None,
            written: Vec::new(),
        }
    }

    /// Unprintable border on every edge, like a printer's hardware margin.
    pub fn with_margin_mm(mut self, margin_mm: f64) -> Self {
        self.margin_mm = margin_mm.max(0.0);
        self
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn mm_to_px(&self, mm: f64) -> u32 {
        (mm / MM_PER_INCH * self.dpi as f64).round() as u32
    }

    fn flush(&mut self) -> Result<()> {
        let Some(page) = self.current.take() else {
            return Ok(());
        };
        let path = self.dir.join(format!("page_{:03}.png", self.written.len() + 1));
        page.save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| TilewerkError::Device(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "spooled page");
        self.written.push(path);
        Ok(())
    }

    fn blank_page(&self) -> RgbaImage {
        RgbaImage::from_pixel(self.page_size.0, self.page_size.1, Rgba([255, 255, 255, 255]))
    }
}

impl PageDevice for RasterSpoolDevice {
    fn resolution(&self) -> u32 {
        self.dpi
    }

    fn begin(&mut self, title: &str, paper: PaperSize, orientation: Orientation) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let (w_mm, h_mm) = paper.oriented_mm(orientation);
        self.page_size = (self.mm_to_px(w_mm).max(1), self.mm_to_px(h_mm).max(1));
        self.written.clear();
        self.current = Some(self.blank_page());
        info!(title, dir = %self.dir.display(), w = self.page_size.0, h = self.page_size.1, "spool opened");
        Ok(())
    }

    fn paint_rect(&self) -> PixelRect {
        let m = self.mm_to_px(self.margin_mm);
        PixelRect::new(0, 0, self.page_size.0, self.page_size.1).shrink(m)
    }

    fn new_page(&mut self) -> Result<()> {
        self.flush()?;
        self.current = Some(self.blank_page());
        Ok(())
    }

    fn draw_image(&mut self, image: &RgbaImage, x: i64, y: i64) -> Result<()> {
        let page = self
            .current
            .as_mut()
            .ok_or_else(|| TilewerkError::Device("no open page".into()))?;
        imageops::overlay(page, image, x, y);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush()?;
        info!(pages = self.written.len(), "spool closed");
        Ok(())
    }

    fn abort(&mut self) {
        self.current = None;
        warn!(pages = self.written.len(), "spool aborted");
    }
}

// -- Print guard --------------------------------------------------------------

/// Holds the in-progress flag for the duration of one print.
#[derive(Debug)]
pub struct PrintGuard {
    flag: Arc<AtomicBool>,
}

impl PrintGuard {
    /// Set the flag, or fail if a print is already running.
    pub fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TilewerkError::PrintInProgress)?;
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for PrintGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// -- Direct printer -----------------------------------------------------------

/// Prints a document's tiles, and optionally its summary page, on a device.
#[derive(Debug, Clone)]
pub struct DirectPrinter {
    config: TilerConfig,
    in_progress: Arc<AtomicBool>,
}

impl DirectPrinter {
    pub fn new(config: TilerConfig) -> Self {
        Self {
            config,
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_printing(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Print every page; returns the number of device pages produced.
    #[instrument(skip_all, fields(document = %ctx.document_name))]
    pub fn print(&self, ctx: &DocumentContext, device: &mut dyn PageDevice) -> Result<usize> {
        let _guard = PrintGuard::acquire(&self.in_progress)?;
        let scale = ctx.require_scale()?;
        let paper = self.config.default_page_size;
        let (ctx, orientation) = ctx.layout_for(
            paper,
            self.config.page_orientation,
            self.config.gutter_size_mm,
            self.config.limits,
        )?;
        ctx.require_grid()?;

        device.begin(&ctx.document_name, paper, orientation)?;
        match self.paint_all(&ctx, scale, orientation, device) {
            Ok(pages) => {
                device.finish()?;
                info!(pages, "print finished");
                Ok(pages)
            }
            Err(e) => {
                error!(error = %e, "print failed");
                device.abort();
                Err(e)
            }
        }
    }

    fn paint_all(
        &self,
        ctx: &DocumentContext,
        scale: ScaleFactor,
        orientation: Orientation,
        device: &mut dyn PageDevice,
    ) -> Result<usize> {
        let config = &self.config;
        let font = LabelFont::from_config(config);
        let renderer = PageRenderer::new(config, OverlayMode::Print);
        let sheets = sheet_order(ctx.grid.len(), config.metadata_page.include, config.metadata_page.position);
        let total = sheets.len();

        for (position, sheet) in sheets.into_iter().enumerate() {
            if position > 0 {
                device.new_page()?;
            }
            match sheet {
                Sheet::Summary => self.paint_metadata(ctx, scale, orientation, device, font.as_ref())?,
                Sheet::Tile(index) => {
                    let page = &ctx.grid.pages[index];
                    let raster = renderer.render(&ctx.raster, page, index, scale, ctx.calibration.as_ref());
                    self.paint_tile(&raster, position + 1, total, device, font.as_ref())?;
                }
            }
        }
        Ok(total)
    }

    /// Tile stretched exactly into the paint rect, with a "Page N of M" label.
    fn paint_tile(
        &self,
        raster: &PageRaster,
        number: usize,
        total: usize,
        device: &mut dyn PageDevice,
        font: Option<&LabelFont>,
    ) -> Result<()> {
        let rect = device.paint_rect();
        let mut scaled = raster.resized(rect.width, rect.height);
        if self.config.overlays.page_indicator.toggle.print {
            let device_mm_per_px = MM_PER_INCH / device.resolution() as f64;
            let size = pt_to_px(PAGE_LABEL_PT, device_mm_per_px);
            let text = format!("Page {number} of {total}");
            let width = approx_text_width(&text, size, false);
            let x = rect.width as f32 - width - PAGE_LABEL_MARGIN;
            scaled.push_text(TextRun::new(text, x, PAGE_LABEL_MARGIN, size, BLACK));
        }
        device.draw_image(&scaled.flatten(font), rect.x, rect.y)
    }

    /// Summary page rendered at the fixed raster size, then stretched to fill
    /// the paint rect regardless of aspect.
    fn paint_metadata(
        &self,
        ctx: &DocumentContext,
        scale: ScaleFactor,
        orientation: Orientation,
        device: &mut dyn PageDevice,
        font: Option<&LabelFont>,
    ) -> Result<()> {
        let export = &self.config.export;
        let info = ctx
            .metadata_info(scale, &self.config)
            .with_tiling(self.config.default_page_size, orientation, self.config.gutter_size_mm)
            .with_export("Print", device.resolution(), "Printer");
        let page = MetadataPageGenerator.generate(
            &info,
            Some(ctx.plan_view(scale, &self.config)),
            export.metadata_raster_width,
            export.metadata_raster_height,
        );
        let rect = device.paint_rect();
        let flat = page.flatten(font);
        let stretched = imageops::resize(&flat, rect.width.max(1), rect.height.max(1), imageops::FilterType::Triangle);
        device.draw_image(&stretched, rect.x, rect.y)
    }
}

/// Spool pages into `dir` at `dpi`.
pub fn print_to_spool(
    printer: &DirectPrinter,
    ctx: &DocumentContext,
    dir: &Path,
    dpi: u32,
) -> Result<Vec<PathBuf>> {
    let mut device = RasterSpoolDevice::new(dir, dpi);
    printer.print(ctx, &mut device)?;
    Ok(device.written().to_vec())
}
