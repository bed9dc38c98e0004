// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer for tile pages, using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: each page is a `PdfPage` holding a
// `Vec<Op>`, and the document is serialised once via `PdfDocument::save()`.
// Page rasters are embedded as image XObjects; their text runs are written
// as Helvetica text on top so labels stay sharp at any zoom.

use std::path::Path;

use image::DynamicImage;
use printpdf::{
    BuiltinFont, Color, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt,
    RawImage, RawImageData, RawImageFormat, Rgb, TextItem, XObjectTransform,
};
use tilewerk_core::error::{Result, TilewerkError};
use tilewerk_core::types::MM_PER_INCH;
use tilewerk_render::{PageRaster, TextRun};
use tracing::{debug, info, instrument};

/// Baseline offset below a text run's top edge, as a fraction of its size.
const ASCENT: f32 = 0.8;
const PT_PER_INCH: f32 = 72.0;

/// Builds a PDF one raster page at a time.
pub struct TilePdfWriter {
    doc: PdfDocument,
    pages: Vec<PdfPage>,
    /// Resolution used to size embedded images.
    dpi: u32,
}

impl TilePdfWriter {
    pub fn new(title: &str, dpi: u32) -> Self {
        Self {
            doc: PdfDocument::new(title),
            pages: Vec::new(),
            dpi: dpi.max(1),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Pixel size of a page of `width_mm` x `height_mm` at the writer's DPI.
    pub fn page_pixels(&self, width_mm: f64, height_mm: f64) -> (u32, u32) {
        let px = |mm: f64| ((mm / MM_PER_INCH * self.dpi as f64).round() as u32).max(1);
        (px(width_mm), px(height_mm))
    }

    /// Add a page filled edge to edge by `raster` (zero margins).
    ///
    /// Rasters with more pixels than the page holds at the writer's DPI are
    /// downsampled first; smaller ones are stretched by the PDF transform.
    #[instrument(skip(self, raster), fields(w = raster.width(), h = raster.height()))]
    pub fn add_full_page(&mut self, raster: &PageRaster, width_mm: f64, height_mm: f64) {
        let (max_w, max_h) = self.page_pixels(width_mm, height_mm);
        let raster = if raster.width() > max_w || raster.height() > max_h {
            raster.resized(max_w.min(raster.width()), max_h.min(raster.height()))
        } else {
            raster.clone()
        };
        let page_w = Mm(width_mm as f32).into_pt().0;
        let page_h = Mm(height_mm as f32).into_pt().0;
        let ops = self.placed_raster_ops(&raster, 0.0, 0.0, page_w, page_h);
        self.pages
            .push(PdfPage::new(Mm(width_mm as f32), Mm(height_mm as f32), ops));
        debug!(pages = self.pages.len(), "full page added");
    }

    /// Add a page with `raster` shrunk (never enlarged) into the area inside
    /// `margin_mm`, centred and keeping its aspect ratio.
    #[instrument(skip(self, raster), fields(w = raster.width(), h = raster.height()))]
    pub fn add_fitted_page(&mut self, raster: &PageRaster, width_mm: f64, height_mm: f64, margin_mm: f64) {
        let margin_mm = margin_mm.clamp(0.0, (width_mm.min(height_mm) / 2.0 - 1.0).max(0.0));
        let (avail_w, avail_h) = self.page_pixels(width_mm - 2.0 * margin_mm, height_mm - 2.0 * margin_mm);
        let (fitted_w, fitted_h) = fitted_size(raster.width(), raster.height(), avail_w, avail_h);
        let fitted = if (fitted_w, fitted_h) == (raster.width(), raster.height()) {
            raster.clone()
        } else {
            raster.resized(fitted_w, fitted_h)
        };

        let px_to_pt = PT_PER_INCH / self.dpi as f32;
        let draw_w = fitted_w as f32 * px_to_pt;
        let draw_h = fitted_h as f32 * px_to_pt;
        let page_w = Mm(width_mm as f32).into_pt().0;
        let page_h = Mm(height_mm as f32).into_pt().0;
        let x = (page_w - draw_w) / 2.0;
        let y = (page_h - draw_h) / 2.0;
        let ops = self.placed_raster_ops(&fitted, x, y, draw_w, draw_h);
        self.pages
            .push(PdfPage::new(Mm(width_mm as f32), Mm(height_mm as f32), ops));
        debug!(fitted_w, fitted_h, draw_w, draw_h, "fitted page added");
    }

    /// Image placement plus text, for a raster occupying the box whose
    /// bottom-left corner is `(x, y)` in points.
    fn placed_raster_ops(&mut self, raster: &PageRaster, x: f32, y: f32, w: f32, h: f32) -> Vec<Op> {
        let rgb = DynamicImage::ImageRgba8(raster.image.clone()).to_rgb8();
        let (px_w, px_h) = (rgb.width() as usize, rgb.height() as usize);
        let raw = RawImage {
            pixels: RawImageData::U8(rgb.into_raw()),
            width: px_w,
            height: px_h,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let xobject_id = self.doc.add_image(&raw);

        // Native image size at `dpi`, then stretched to the target box.
        let dpi = self.dpi as f32;
        let native_w = px_w as f32 / dpi * PT_PER_INCH;
        let native_h = px_h as f32 / dpi * PT_PER_INCH;

        let mut ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(x)),
                translate_y: Some(Pt(y)),
                scale_x: Some(w / native_w),
                scale_y: Some(h / native_h),
                dpi: Some(dpi),
                rotate: None,
            },
        }];

        let sx = w / px_w as f32;
        let sy = h / px_h as f32;
        // Raster y runs down from the top of the box; PDF y runs up.
        let top = y + h;
        for run in &raster.texts {
            text_ops(&mut ops, run, x, top, sx, sy);
        }
        ops
    }

    /// Serialise the document.  A document without pages is an error.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let page_count = self.pages.len();
        if page_count == 0 {
            return Err(TilewerkError::PdfError("document has no pages".into()));
        }
        self.doc.with_pages(self.pages);
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = self.doc.save(&PdfSaveOptions::default(), &mut warnings);
        debug!(page_count, warnings = warnings.len(), "PDF serialised");
        Ok(bytes)
    }

    /// Serialise and write to `path`.
    pub fn save(self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = self.finish()?;
        std::fs::write(path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "wrote PDF");
        Ok(())
    }
}

/// Pixel size of a `width` x `height` raster scaled uniformly into
/// `avail_w` x `avail_h`.  Never larger than the raster itself.
fn fitted_size(width: u32, height: u32, avail_w: u32, avail_h: u32) -> (u32, u32) {
    let (width, height) = (width.max(1), height.max(1));
    let fit = (avail_w as f64 / width as f64)
        .min(avail_h as f64 / height as f64)
        .min(1.0);
    (
        ((width as f64 * fit).round() as u32).clamp(1, width),
        ((height as f64 * fit).round() as u32).clamp(1, height),
    )
}

/// Text operations for one run.  `top` is the PDF y of the raster's top
/// edge; `sx`/`sy` convert raster pixels to points.
fn text_ops(ops: &mut Vec<Op>, run: &TextRun, left: f32, top: f32, sx: f32, sy: f32) {
    if run.text.is_empty() || run.size_px <= 0.0 {
        return;
    }
    let font = builtin_font(run);
    let size = Pt(run.size_px * sy);
    let x = left + run.x * sx;
    let y = top - (run.y + run.size_px * ASCENT) * sy;

    if let Some(outline) = run.outline {
        let d = (sx.min(sy)).max(0.5);
        for (ox, oy) in [(-d, 0.0), (d, 0.0), (0.0, -d), (0.0, d)] {
            write_text(ops, &run.text, font, size, x + ox, y + oy, flatten_alpha(outline));
        }
    }
    write_text(ops, &run.text, font, size, x, y, flatten_alpha(run.color));
}

fn write_text(ops: &mut Vec<Op>, text: &str, font: BuiltinFont, size: Pt, x: f32, y: f32, rgb: [f32; 3]) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetFillColor {
        col: Color::Rgb(Rgb::new(rgb[0], rgb[1], rgb[2], None)),
    });
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFontSizeBuiltinFont { size, font });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(text.to_string())],
        font,
    });
    ops.push(Op::EndTextSection);
}

fn builtin_font(run: &TextRun) -> BuiltinFont {
    match (run.bold, run.italic) {
        (true, true) => BuiltinFont::HelveticaBoldOblique,
        (true, false) => BuiltinFont::HelveticaBold,
        (false, true) => BuiltinFont::HelveticaOblique,
        (false, false) => BuiltinFont::Helvetica,
    }
}

/// PDF text has no alpha here; blend the colour toward white paper instead.
fn flatten_alpha(color: image::Rgba<u8>) -> [f32; 3] {
    let a = color[3] as f32 / 255.0;
    let mix = |c: u8| (c as f32 / 255.0) * a + (1.0 - a);
    [mix(color[0]), mix(color[1]), mix(color[2])]
}
