// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Summary page placed before or after the tiles of an export.
//
// The page is a flowing layout: header, four detail blocks, a miniature
// assembly map of the whole grid, and a fixed footer.  Geometry scales with
// the target height relative to A4 at 300 DPI (3508 px).

use std::path::Path;

use chrono::{DateTime, Local};
use image::{Rgba, RgbaImage, imageops};
use tilewerk_core::types::{Orientation, PaperSize, PixelRect, Units};
use tilewerk_layout::{GridSummary, PageGrid, ScaleFactor};
use tracing::{debug, instrument};

use crate::canvas::{BLACK, ClippedCanvas, PageRaster, TextRun, WHITE, fill_rect, stroke_rect, thick_line};
use crate::overlay::{GUTTER_BLUE, RegistrationMarks};
use crate::text::approx_text_width;

pub const BRAND: &str = "Tilewerk";

const A4_HEIGHT_300DPI: f64 = 3508.0;
const PLAN_BACKGROUND: Rgba<u8> = Rgba([240, 240, 240, 255]);
const PLAN_LABEL_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 150]);

const COMMON_RATIOS: &[(f64, &str)] = &[
    (1.0, "1:1 (Full Size)"),
    (2.0, "1:2"),
    (5.0, "1:5"),
    (10.0, "1:10"),
    (20.0, "1:20"),
    (25.0, "1:25"),
    (50.0, "1:50"),
    (100.0, "1:100"),
    (200.0, "1:200"),
    (500.0, "1:500"),
    (1000.0, "1:1000"),
];

const ASSEMBLY_INSTRUCTIONS: &[&str] = &[
    "Assembly Instructions:",
    "1. Print all tiles at 100% scale (no scaling in printer settings)",
    "2. Verify scale accuracy by measuring the scale line on each tile",
    "3. Use the Page Assembly Map above to understand tile arrangement",
    "4. Align tiles using the gutter lines and crop marks",
    "5. Overlap tiles in the gutter area for seamless assembly",
    "6. Use the page numbers (P1, P2, etc.) to ensure correct positioning",
];

fn gray(level: u8) -> Rgba<u8> {
    Rgba([level, level, level, 255])
}

/// Everything the summary page reports.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataDocInfo {
    pub project_name: Option<String>,
    pub document_name: String,
    /// File name only, without directories.
    pub original_file: Option<String>,
    pub file_size: Option<String>,
    pub doc_width: u32,
    pub doc_height: u32,
    pub scale: ScaleFactor,
    pub units: Units,
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub total_tiles: u32,
    pub page_size: String,
    pub page_orientation: String,
    pub gutter_mm: f64,
    pub export_format: String,
    pub dpi: u32,
    pub output_dir: String,
    pub version: String,
    pub generated_at: DateTime<Local>,
}

impl MetadataDocInfo {
    /// Build from a grid summary; the remaining fields take neutral defaults
    /// until set by the `with_*` builders.
    pub fn from_grid(
        document_name: impl Into<String>,
        doc_width: u32,
        doc_height: u32,
        scale: ScaleFactor,
        units: Units,
        summary: GridSummary,
    ) -> Self {
        Self {
            project_name: None,
            document_name: document_name.into(),
            original_file: None,
            file_size: None,
            doc_width,
            doc_height,
            scale,
            units,
            tiles_x: summary.tiles_x,
            tiles_y: summary.tiles_y,
            total_tiles: summary.tiles_x * summary.tiles_y,
            page_size: PaperSize::A4.name(),
            page_orientation: "auto".into(),
            gutter_mm: 10.0,
            export_format: "PDF".into(),
            dpi: 300,
            output_dir: "Unknown".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            generated_at: Local::now(),
        }
    }

    pub fn with_project_name(mut self, name: Option<String>) -> Self {
        self.project_name = name.filter(|n| !n.trim().is_empty());
        self
    }

    /// Record the source file's name and, when readable, its size.
    pub fn with_original_file(mut self, path: &Path) -> Self {
        self.original_file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        self.file_size = std::fs::metadata(path)
            .ok()
            .map(|m| file_size_string(m.len()));
        self
    }

    pub fn with_tiling(mut self, paper: PaperSize, orientation: Orientation, gutter_mm: f64) -> Self {
        self.page_size = paper.name();
        self.page_orientation = orientation.label().into();
        self.gutter_mm = gutter_mm;
        self
    }

    pub fn with_export(mut self, format: impl Into<String>, dpi: u32, output_dir: impl Into<String>) -> Self {
        self.export_format = format.into();
        self.dpi = dpi;
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_generated_at(mut self, at: DateTime<Local>) -> Self {
        self.generated_at = at;
        self
    }

    /// Scale in the report units per pixel.
    pub fn units_per_pixel(&self) -> f64 {
        self.units.from_mm(self.scale.mm_per_px())
    }

    /// Physical document size in the report units.
    pub fn real_size(&self) -> (f64, f64) {
        let per_px = self.units_per_pixel();
        (self.doc_width as f64 * per_px, self.doc_height as f64 * per_px)
    }

    fn title(&self) -> &str {
        self.project_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| {
                if self.document_name.is_empty() {
                    "Untitled Project"
                } else {
                    &self.document_name
                }
            })
    }
}

/// Human-readable file size.
pub fn file_size_string(bytes: u64) -> String {
    const KB: u64 = 1024;
    if bytes < KB {
        format!("{bytes} bytes")
    } else if bytes < KB * KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / (KB * KB) as f64)
    }
}

/// Drawing-scale ratio, snapped to the nearest common architectural ratio
/// when within 0.1 of it.  Imperial scales are always reported raw.
pub fn snap_scale_ratio(scale: ScaleFactor, units: Units) -> String {
    let ratio = 1.0 / units.from_mm(scale.mm_per_px());
    if units == Units::Mm {
        let nearest = COMMON_RATIOS
            .iter()
            .min_by(|a, b| (a.0 - ratio).abs().total_cmp(&(b.0 - ratio).abs()));
        if let Some((value, label)) = nearest {
            if (value - ratio).abs() < 0.1 {
                return (*label).to_string();
            }
        }
    }
    format!("1:{ratio:.1}")
}

/// Inputs for the miniature assembly map.
#[derive(Debug, Clone, Copy)]
pub struct PlanView<'a> {
    pub source: &'a RgbaImage,
    pub grid: &'a PageGrid,
    /// Full-size registration marks, shrunk with the thumbnail.
    pub registration: Option<RegistrationMarks>,
}

/// Renders summary pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataPageGenerator;

impl MetadataPageGenerator {
    /// Render the summary page at `width` x `height` pixels.
    #[instrument(skip(self, info, plan), fields(document = %info.document_name))]
    pub fn generate(
        &self,
        info: &MetadataDocInfo,
        plan: Option<PlanView<'_>>,
        width: u32,
        height: u32,
    ) -> PageRaster {
        let mut layout = Layout::new(width, height);
        let mut y = layout.header(info);
        y = layout.document_block(info, y + layout.gap());
        y = layout.scale_block(info, y + layout.gap());
        y = layout.tiling_block(info, y + layout.gap());
        y = layout.export_block(info, y + layout.gap());
        let plan_start = y + layout.px(24.0, 20.0);
        y = match plan {
            Some(plan) if !plan.grid.is_empty() => layout.plan_view(plan, plan_start),
            _ => layout.plan_placeholder(plan_start),
        };
        layout.footer(y + layout.px(24.0, 20.0));
        debug!(texts = layout.raster.texts.len(), "metadata page laid out");
        layout.raster
    }
}

/// Cursor state while laying out one summary page.
struct Layout {
    raster: PageRaster,
    scale: f64,
    margin: f32,
}

impl Layout {
    fn new(width: u32, height: u32) -> Self {
        let scale = (height as f64 / A4_HEIGHT_300DPI).clamp(0.5, 3.0);
        Self {
            raster: PageRaster::blank(width, height),
            scale,
            margin: (100.0 * scale) as f32,
        }
    }

    /// `base` scaled to this page, never below `min`.
    fn px(&self, base: f64, min: f64) -> f32 {
        (base * self.scale).max(min) as f32
    }

    fn gap(&self) -> f32 {
        self.px(16.0, 12.0)
    }

    fn width(&self) -> f32 {
        self.raster.width() as f32
    }

    /// Text positioned by its baseline, matching the flowing layout.
    fn text(&mut self, text: &str, x: f32, baseline: f32, size: f32, color: Rgba<u8>, bold: bool) -> f32 {
        let mut run = TextRun::new(text, x, baseline - size, size, color);
        if bold {
            run = run.bold();
        }
        self.raster.push_text(run);
        approx_text_width(text, size, bold)
    }

    fn hline(&mut self, x0: f32, x1: f32, y: f32, width: u32, color: Rgba<u8>) {
        let mut canvas = ClippedCanvas::new(&mut self.raster.image);
        thick_line(&mut canvas, (x0, y), (x1, y), width, color);
    }

    fn header(&mut self, info: &MetadataDocInfo) -> f32 {
        let w = self.width();
        let m = self.margin;

        let brand_size = self.px(28.0, 14.0);
        let brand_w = approx_text_width(BRAND, brand_size, true);
        let brand_baseline = m + brand_size;
        self.text(BRAND, w - m - brand_w, brand_baseline, brand_size, BLACK, true);

        let title_size = self.px(64.0, 24.0);
        let title_baseline = m + title_size;
        let title = info.title().to_string();
        self.text(&title, m, title_baseline, title_size, BLACK, true);

        let sub_size = self.px(26.0, 12.0);
        let subtitle = info
            .generated_at
            .format("Generated on %Y-%m-%d at %H:%M:%S")
            .to_string();
        let sub_w = approx_text_width(&subtitle, sub_size, false);
        let sub_baseline = brand_baseline.max(title_baseline) + self.gap() + sub_size;
        self.text(&subtitle, (w - sub_w) / 2.0, sub_baseline, sub_size, gray(100), false);

        let sep_y = sub_baseline + self.gap();
        self.hline(m, w - m, sep_y, 2, gray(200));
        sep_y
    }

    fn section_header(&mut self, title: &str, y: f32) {
        let size = self.px(28.0, 16.0);
        let m = self.margin;
        let width = self.text(title, m, y, size, BLACK, true);
        self.hline(m, m + width, y + 5.0, 1, gray(150));
    }

    /// Labelled section; returns the cursor below it.
    fn section(&mut self, title: &str, details: &[(&str, String)], y: f32) -> f32 {
        self.section_header(title, y);
        let mut y = y + self.px(36.0, 28.0);
        let size = self.px(20.0, 12.0);
        let step = self.px(28.0, 16.0);
        let m = self.margin;
        for (label, value) in details {
            let label_w = self.text(label, m, y, size, gray(80), false);
            self.text(value, m + label_w + 20.0, y, size, BLACK, false);
            y += step;
        }
        y + 20.0
    }

    fn document_block(&mut self, info: &MetadataDocInfo, y: f32) -> f32 {
        let (real_w, real_h) = info.real_size();
        let units = info.units.label();
        let details = [
            (
                "Project Name:",
                info.project_name
                    .clone()
                    .unwrap_or_else(|| "Untitled Project".into()),
            ),
            ("Document Name:", info.document_name.clone()),
            (
                "Original File:",
                info.original_file.clone().unwrap_or_else(|| "Unknown".into()),
            ),
            (
                "File Size:",
                info.file_size.clone().unwrap_or_else(|| "Unknown".into()),
            ),
            (
                "Document Dimensions:",
                format!("{} x {} pixels", info.doc_width, info.doc_height),
            ),
            ("Real-world Size:", format!("{real_w:.2} x {real_h:.2} {units}")),
        ];
        self.section("Document Information", &details, y)
    }

    fn scale_block(&mut self, info: &MetadataDocInfo, y: f32) -> f32 {
        let units = info.units.label();
        let details = [
            (
                "Scale Factor:",
                format!("{:.6} {units}/pixel", info.units_per_pixel()),
            ),
            ("Units:", units.to_string()),
            ("Scale Ratio:", snap_scale_ratio(info.scale, info.units)),
            (
                "Measurement Accuracy:",
                "±0.1mm (depending on print quality)".to_string(),
            ),
        ];
        self.section("Scale Information", &details, y)
    }

    fn tiling_block(&mut self, info: &MetadataDocInfo, y: f32) -> f32 {
        let details = [
            ("Total Tiles:", info.total_tiles.to_string()),
            (
                "Tile Arrangement:",
                format!("{} x {}", info.tiles_x, info.tiles_y),
            ),
            ("Page Size:", info.page_size.clone()),
            ("Page Orientation:", info.page_orientation.clone()),
            ("Gutter Size:", format!("{} mm", info.gutter_mm)),
            (
                "Overlap Area:",
                format!("{} mm between adjacent tiles", info.gutter_mm * 2.0),
            ),
        ];
        self.section("Tiling Information", &details, y)
    }

    fn export_block(&mut self, info: &MetadataDocInfo, y: f32) -> f32 {
        let details = [
            ("Export Format:", info.export_format.clone()),
            ("DPI:", format!("{} dpi", info.dpi)),
            (
                "Export Date:",
                info.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            ("Tilewerk Version:", info.version.clone()),
            ("Output Directory:", info.output_dir.clone()),
        ];
        self.section("Export Information", &details, y)
    }

    /// Header position for the map, kept clear of the page top.
    fn plan_header(&mut self, y_start: f32) -> f32 {
        let y = y_start.max(self.margin + self.px(250.0, 200.0));
        self.section_header("Page Assembly Map", y);
        y + 50.0
    }

    fn plan_placeholder(&mut self, y_start: f32) -> f32 {
        let y = self.plan_header(y_start);
        let size = self.px(20.0, 12.0);
        let m = self.margin;
        self.text("Plan view not available for preview", m, y + 20.0, size, gray(100), false);
        y + 20.0 + self.px(28.0, 24.0)
    }

    fn plan_view(&mut self, plan: PlanView<'_>, y_start: f32) -> f32 {
        let Some(bounds) = plan.grid.bounds() else {
            return self.plan_placeholder(y_start);
        };
        let y = self.plan_header(y_start);

        let footer_reserved = self.px(160.0, 140.0);
        let available_w = (self.width() - 2.0 * self.margin).max(1.0) as f64;
        let available_h = (self.raster.height() as f32 - y - self.margin - footer_reserved).max(120.0) as f64;
        let t = (available_w / bounds.width as f64)
            .min(available_h / bounds.height as f64)
            .min(1.0);

        let thumbnail = self.plan_thumbnail(plan, bounds, t);
        let plan_x = self.margin + (available_w as f32 - thumbnail.width() as f32) / 2.0;
        let (px, py) = (plan_x as i64, y as i64);
        self.raster.blit(&thumbnail, px, py);
        {
            let mut canvas = ClippedCanvas::new(&mut self.raster.image);
            let border = PixelRect::new(px, py, thumbnail.width(), thumbnail.height());
            stroke_rect(&mut canvas, border, 1, gray(100));
        }

        let legend_y = y + thumbnail.height() as f32 + self.gap();
        self.legend(legend_y);
        legend_y + self.px(28.0, 24.0)
    }

    /// Source and page layout shrunk by `t` into one raster.
    fn plan_thumbnail(&self, plan: PlanView<'_>, bounds: PixelRect, t: f64) -> PageRaster {
        let tw = ((bounds.width as f64 * t) as u32).max(1);
        let th = ((bounds.height as f64 * t) as u32).max(1);
        let mut thumb = PageRaster::filled(tw, th, PLAN_BACKGROUND);

        let sw = ((plan.source.width() as f64 * t).round() as u32).max(1);
        let sh = ((plan.source.height() as f64 * t).round() as u32).max(1);
        let shrunk = imageops::resize(plan.source, sw, sh, imageops::FilterType::Triangle);
        let ox = (-(bounds.x as f64) * t).round() as i64;
        let oy = (-(bounds.y as f64) * t).round() as i64;
        imageops::replace(&mut thumb.image, &shrunk, ox, oy);

        let to_thumb = |rect: PixelRect| {
            let x = ((rect.x - bounds.x) as f64 * t).round() as i64;
            let y = ((rect.y - bounds.y) as f64 * t).round() as i64;
            let w = (rect.width as f64 * t).round() as u32;
            let h = (rect.height as f64 * t).round() as u32;
            PixelRect::new(x, y, w, h)
        };
        let marks = plan.registration.map(|m| m.scaled(t));
        let label_size = self.px(16.0, 10.0);
        let pad_x = (6.0 * self.scale) as f32;
        let pad_y = (4.0 * self.scale) as f32;

        for (i, page) in plan.grid.pages.iter().enumerate() {
            let full = to_thumb(page.rect());
            {
                let mut canvas = ClippedCanvas::new(&mut thumb.image);
                stroke_rect(&mut canvas, full, 1, gray(128));
            }
            if page.gutter > 1 {
                let drawable = to_thumb(page.drawable_rect());
                if !drawable.is_empty() {
                    {
                        let mut canvas = ClippedCanvas::new(&mut thumb.image);
                        stroke_rect(&mut canvas, drawable, 1, GUTTER_BLUE);
                    }
                    if let Some(marks) = marks {
                        marks.draw(&mut thumb.image, drawable);
                    }
                }
            }

            let label = format!("P{}", i + 1);
            let label_w = approx_text_width(&label, label_size, true);
            let x = full.x as f32 + (full.width as f32 - label_w) / 2.0;
            let top = full.y as f32 + (full.height as f32 - label_size) / 2.0;
            let background = PixelRect::new(
                (x - pad_x) as i64,
                (top - pad_y) as i64,
                (label_w + 2.0 * pad_x) as u32,
                (label_size + 2.0 * pad_y) as u32,
            );
            fill_rect(&mut ClippedCanvas::new(&mut thumb.image), background, PLAN_LABEL_BACKGROUND);
            thumb.push_text(TextRun::new(label, x, top, label_size, WHITE).bold());
        }
        thumb
    }

    fn legend(&mut self, y: f32) {
        let size = self.px(18.0, 10.0);
        let m = self.margin;
        self.hline(m, m + 20.0, y, 1, GUTTER_BLUE);
        let first = self.text("Drawable area (inside gutters)", m + 25.0, y + 5.0, size, BLACK, false);
        let x = (m + 220.0).max(m + 25.0 + first + 40.0);
        self.text("P1, P2, etc. = Page numbers for assembly", x, y + 5.0, size, BLACK, false);
    }

    fn footer(&mut self, y_start: f32) {
        let size = self.px(20.0, 12.0);
        let step = self.px(26.0, 14.0);
        let m = self.margin;
        let mut y = y_start;
        for line in ASSEMBLY_INSTRUCTIONS {
            self.text(line, m, y, size, gray(100), false);
            y += step;
        }
        y += 20.0;
        self.text(&format!("Generated by {BRAND}"), m, y, size, gray(100), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tilewerk_core::config::LayoutLimits;
    use tilewerk_layout::{GridRequest, PageGridCalculator};

    fn scale(mm_per_px: f64) -> ScaleFactor {
        ScaleFactor::new(mm_per_px).expect("scale")
    }

    fn two_by_one_grid() -> PageGrid {
        PageGridCalculator::new(LayoutLimits::default()).compute(GridRequest {
            doc_width: 3000,
            doc_height: 2000,
            page_width_px: 2100,
            page_height_px: 2970,
            gutter_px: 100,
        })
    }

    fn info(grid: &PageGrid) -> MetadataDocInfo {
        MetadataDocInfo::from_grid("floorplan", 3000, 2000, scale(0.1), Units::Mm, grid.summary())
            .with_generated_at(Local.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).single().expect("time"))
    }

    fn has_text(page: &PageRaster, needle: &str) -> bool {
        page.texts.iter().any(|t| t.text == needle)
    }

    #[test]
    fn reports_total_tiles_for_two_by_one() {
        let grid = two_by_one_grid();
        let info = info(&grid);
        assert_eq!((info.tiles_x, info.tiles_y, info.total_tiles), (2, 1, 2));

        let page = MetadataPageGenerator.generate(&info, None, 2480, 3508);
        assert!(has_text(&page, "Total Tiles:"));
        assert!(has_text(&page, "2"));
        assert!(has_text(&page, "2 x 1"));
    }

    #[test]
    fn snaps_to_common_ratios() {
        assert_eq!(snap_scale_ratio(scale(0.01), Units::Mm), "1:100");
        assert_eq!(snap_scale_ratio(scale(1.0), Units::Mm), "1:1 (Full Size)");
        assert_eq!(snap_scale_ratio(scale(1.0 / 37.0), Units::Mm), "1:37.0");
        // 1/25.4 in/px is exactly 1:1, but inches never snap
        assert_eq!(snap_scale_ratio(scale(1.0), Units::Inches), "1:25.4");
    }

    #[test]
    fn file_sizes_are_humanized() {
        assert_eq!(file_size_string(512), "512 bytes");
        assert_eq!(file_size_string(2048), "2.0 KB");
        assert_eq!(file_size_string(3 * 1024 * 1024 + 512 * 1024), "3.5 MB");
    }

    #[test]
    fn title_falls_back_to_document_name() {
        let grid = two_by_one_grid();
        let named = info(&grid).with_project_name(Some("Kitchen".into()));
        assert_eq!(named.title(), "Kitchen");
        let blank = info(&grid).with_project_name(Some("  ".into()));
        assert_eq!(blank.title(), "floorplan");
        let mut untitled = info(&grid);
        untitled.document_name.clear();
        assert_eq!(untitled.title(), "Untitled Project");
    }

    #[test]
    fn real_size_follows_units() {
        let grid = two_by_one_grid();
        let mm = info(&grid);
        assert_eq!(mm.real_size(), (300.0, 200.0));
        let mut inches = info(&grid);
        inches.units = Units::Inches;
        let (w, _) = inches.real_size();
        assert!((w - 300.0 / 25.4).abs() < 1e-9);
    }

    #[test]
    fn original_file_records_name_and_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plan.png");
        std::fs::write(&path, vec![0u8; 2048]).expect("write");
        let grid = two_by_one_grid();
        let info = info(&grid).with_original_file(&path);
        assert_eq!(info.original_file.as_deref(), Some("plan.png"));
        assert_eq!(info.file_size.as_deref(), Some("2.0 KB"));
    }

    #[test]
    fn placeholder_without_plan() {
        let grid = two_by_one_grid();
        let page = MetadataPageGenerator.generate(&info(&grid), None, 1240, 1754);
        assert_eq!(page.image.dimensions(), (1240, 1754));
        assert!(has_text(&page, "Plan view not available for preview"));
        assert!(has_text(&page, "Generated by Tilewerk"));
        assert!(has_text(&page, "Generated on 2026-03-01 at 09:30:00"));
    }

    #[test]
    fn plan_view_labels_every_page() {
        let grid = two_by_one_grid();
        let source = RgbaImage::from_pixel(3000, 2000, gray(30));
        let plan = PlanView {
            source: &source,
            grid: &grid,
            registration: None,
        };
        let page = MetadataPageGenerator.generate(&info(&grid), Some(plan), 2480, 3508);
        assert!(has_text(&page, "P1"));
        assert!(has_text(&page, "P2"));
        assert!(has_text(&page, "Drawable area (inside gutters)"));
        assert!(!has_text(&page, "Plan view not available for preview"));
        // thumbnail content landed on the page
        assert!(page.image.pixels().any(|p| (20..40).contains(&p[0])));
    }

    #[test]
    fn small_pages_keep_minimum_sizes() {
        let layout = Layout::new(600, 800);
        assert_eq!(layout.scale, 0.5);
        assert_eq!(layout.px(28.0, 14.0), 14.0);
        assert_eq!(layout.margin, 50.0);
    }
}
