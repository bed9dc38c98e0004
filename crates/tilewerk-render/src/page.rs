// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-page rendering.
//
// A page raster is the full page including its gutter band.  Source content
// is copied only into the drawable area; overlays are drawn on top.  The
// source raster is borrowed immutably and never modified.

use image::{Rgba, RgbaImage, imageops};
use tilewerk_core::config::{FontStyle, IndicatorPosition, LineStyle, Toggle, TilerConfig, parse_hex_color};
use tilewerk_core::types::PixelRect;
use tilewerk_layout::{PageDescriptor, ScaleCalibration, ScaleFactor};
use tracing::{debug, instrument};

use crate::canvas::{BLACK, ClippedCanvas, PageRaster, TextRun, dashed_line, fill_rect, thick_circle};
use crate::overlay::{CropMarks, RegistrationMarks, ScaleBarSpec, draw_gutter_outline, draw_scale_bar};
use crate::text::{approx_text_width, pt_to_px};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const LABEL_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 200]);
const LABEL_MARGIN: f32 = 5.0;
const ENDPOINT_RADIUS: i32 = 5;
const CALIBRATION_LABEL_PT: f64 = 10.0;

/// Which half of each overlay toggle applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMode {
    /// On-screen preview (`display` toggles).
    Preview,
    /// File export and printing (`print` toggles).
    Print,
}

impl OverlayMode {
    fn enabled(&self, toggle: Toggle) -> bool {
        match self {
            Self::Preview => toggle.display,
            Self::Print => toggle.print,
        }
    }
}

/// Renders individual pages of a grid.
pub struct PageRenderer<'a> {
    config: &'a TilerConfig,
    mode: OverlayMode,
}

impl<'a> PageRenderer<'a> {
    pub fn new(config: &'a TilerConfig, mode: OverlayMode) -> Self {
        Self { config, mode }
    }

    /// Render page `index` (zero-based) of a grid.
    #[instrument(skip(self, source, page, calibration), fields(row = page.row, col = page.col))]
    pub fn render(
        &self,
        source: &RgbaImage,
        page: &PageDescriptor,
        index: usize,
        scale: ScaleFactor,
        calibration: Option<&ScaleCalibration>,
    ) -> PageRaster {
        let mut raster = PageRaster::blank(page.width, page.height);
        copy_source(&mut raster.image, source, page);

        let overlays = &self.config.overlays;
        let drawable = page.local_drawable_rect();
        let has_gutter = page.gutter > 0;

        if has_gutter && self.mode.enabled(overlays.gutter_lines) {
            draw_gutter_outline(&mut raster.image, drawable);
        }
        if has_gutter && self.mode.enabled(overlays.crop_marks.toggle) {
            CropMarks::new(&overlays.crop_marks, scale).draw(&mut raster.image, drawable);
        }
        if has_gutter && self.mode.enabled(overlays.registration_marks.toggle) {
            RegistrationMarks::new(&overlays.registration_marks, scale).draw(&mut raster.image, drawable);
        }
        if self.mode.enabled(overlays.scale_bar.toggle) {
            let spec = ScaleBarSpec::new(
                &overlays.scale_bar,
                page.width,
                page.height,
                page.gutter,
                scale,
                self.config.default_units,
            );
            draw_scale_bar(&mut raster.image, &spec);
        }
        if let Some(cal) = calibration {
            self.draw_calibration(&mut raster, page, cal, scale);
        }
        if self.mode.enabled(overlays.page_indicator.toggle) {
            self.draw_page_label(&mut raster, drawable, index, scale);
        }

        raster
    }

    fn draw_calibration(
        &self,
        raster: &mut PageRaster,
        page: &PageDescriptor,
        cal: &ScaleCalibration,
        scale: ScaleFactor,
    ) {
        let overlays = &self.config.overlays;
        let line_on = self.mode.enabled(overlays.scale_line.toggle);
        let datum_on = self.mode.enabled(overlays.datum_line.toggle);
        let text_on = self.mode.enabled(overlays.scale_text);
        if !(line_on || datum_on || text_on) || !segment_touches(page, cal) {
            return;
        }

        let sx = raster.width() as f64 / page.width.max(1) as f64;
        let sy = raster.height() as f64 / page.height.max(1) as f64;
        let to_local = |x: f64, y: f64| {
            (
                ((x - page.x as f64) * sx) as f32,
                ((y - page.y as f64) * sy) as f32,
            )
        };
        let p1 = to_local(cal.p1.x, cal.p1.y);
        let p2 = to_local(cal.p2.x, cal.p2.y);
        let (w, h) = (raster.width() as f32, raster.height() as f32);
        let inside = |p: (f32, f32)| p.0 >= 0.0 && p.1 >= 0.0 && p.0 < w && p.1 < h;

        {
            let mut canvas = ClippedCanvas::new(&mut raster.image);
            if line_on {
                let style = &overlays.scale_line;
                let color = parse_hex_color(&style.color).map(Rgba).unwrap_or(RED);
                dashed_line(&mut canvas, p1, p2, style.width_px, LineStyle::DotDashDot.dash_pattern(), color);
            }
            if datum_on {
                let style = &overlays.datum_line;
                let color = parse_hex_color(&style.color).map(Rgba).unwrap_or(RED);
                dashed_line(&mut canvas, p1, p2, style.width_px.max(1), style.style.dash_pattern(), color);
            }
            if line_on || datum_on {
                for p in [p1, p2] {
                    if inside(p) {
                        thick_circle(&mut canvas, (p.0 as i32, p.1 as i32), ENDPOINT_RADIUS, 2, RED);
                    }
                }
            }
        }

        let mid = ((p1.0 + p2.0) / 2.0, (p1.1 + p2.1) / 2.0);
        if text_on && inside(mid) {
            let label = cal.measurement_label();
            let size = pt_to_px(CALIBRATION_LABEL_PT, scale.mm_per_px());
            let width = approx_text_width(&label, size, true);
            let x = mid.0 - width / 2.0;
            let baseline = mid.1 - 12.0;
            let top = baseline - size;
            let background = PixelRect::new(
                (x - 3.0) as i64,
                (top - 2.0) as i64,
                (width + 6.0) as u32,
                (size + 4.0) as u32,
            );
            fill_rect(&mut ClippedCanvas::new(&mut raster.image), background, LABEL_BACKGROUND);
            raster.push_text(TextRun::new(label, x, top, size, RED).bold());
        }
        debug!(row = page.row, col = page.col, "calibration overlay drawn");
    }

    fn draw_page_label(&self, raster: &mut PageRaster, drawable: PixelRect, index: usize, scale: ScaleFactor) {
        let style = &self.config.overlays.page_indicator;
        let text = format!("P{}", index + 1);
        let size = pt_to_px(style.font_size_pt, scale.mm_per_px());
        let bold = style.font_style == FontStyle::Bold;
        let width = approx_text_width(&text, size, bold);

        let (px, py) = (drawable.x as f32, drawable.y as f32);
        let (pw, ph) = (drawable.width as f32, drawable.height as f32);
        let (x, y) = match style.position {
            IndicatorPosition::UpperLeft => (px + LABEL_MARGIN, py + LABEL_MARGIN),
            IndicatorPosition::UpperRight => (px + pw - width - LABEL_MARGIN, py + LABEL_MARGIN),
            IndicatorPosition::BottomLeft => (px + LABEL_MARGIN, py + ph - LABEL_MARGIN - size),
            IndicatorPosition::BottomRight => {
                (px + pw - width - LABEL_MARGIN, py + ph - LABEL_MARGIN - size)
            }
            IndicatorPosition::CenterPage => (px + (pw - width) / 2.0, py + (ph - size) / 2.0),
        };

        let [r, g, b, _] = parse_hex_color(&style.font_color).unwrap_or([255, 255, 255, 255]);
        let mut run = TextRun::new(text, x, y, size, Rgba([r, g, b, style.alpha]));
        match style.font_style {
            FontStyle::Bold => run = run.bold(),
            FontStyle::Italic => run = run.italic(),
            FontStyle::Normal => {}
        }
        if style.alpha > 128 {
            let outline_alpha = style.alpha.saturating_add(50);
            run = run.with_outline(Rgba([BLACK[0], BLACK[1], BLACK[2], outline_alpha]));
        }
        raster.push_text(run);
    }
}

/// Copy the part of the source that falls inside the page's drawable area.
///
/// Pages with no overlap are left blank so every page keeps its full size.
pub fn copy_source(target: &mut RgbaImage, source: &RgbaImage, page: &PageDescriptor) {
    let doc = PixelRect::new(0, 0, source.width(), source.height());
    let Some(visible) = page.drawable_rect().intersect(&doc) else {
        return;
    };
    let slice = imageops::crop_imm(
        source,
        visible.x as u32,
        visible.y as u32,
        visible.width,
        visible.height,
    )
    .to_image();
    imageops::replace(target, &slice, visible.x - page.x, visible.y - page.y);
}

/// True when the calibration segment crosses or lies inside the page rect.
fn segment_touches(page: &PageDescriptor, cal: &ScaleCalibration) -> bool {
    let rect = page.rect();
    let (x0, y0) = (cal.p1.x, cal.p1.y);
    let (dx, dy) = (cal.p2.x - x0, cal.p2.y - y0);
    // Liang-Barsky: narrow [t0, t1] by each rect edge.
    let edges = [
        (-dx, x0 - rect.x as f64),
        (dx, rect.right() as f64 - x0),
        (-dy, y0 - rect.y as f64),
        (dy, rect.bottom() as f64 - y0),
    ];
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return false;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::WHITE;
    use tilewerk_core::types::{PointPx, Units};

    const GRAY: Rgba<u8> = Rgba([90, 90, 90, 255]);

    fn quiet_config() -> TilerConfig {
        let mut config = TilerConfig::default();
        let off = Toggle::new(false, false);
        let o = &mut config.overlays;
        o.gutter_lines = off;
        o.crop_marks.toggle = off;
        o.registration_marks.toggle = off;
        o.scale_bar.toggle = off;
        o.scale_line.toggle = off;
        o.scale_text = off;
        o.datum_line.toggle = off;
        o.page_indicator.toggle = off;
        config
    }

    fn page(x: i64, y: i64, size: u32, gutter: u32) -> PageDescriptor {
        PageDescriptor {
            x,
            y,
            width: size,
            height: size,
            gutter,
            row: 0,
            col: 0,
        }
    }

    fn scale() -> ScaleFactor {
        ScaleFactor::new(0.5).expect("scale")
    }

    fn has_red(image: &RgbaImage) -> bool {
        image.pixels().any(|p| p[0] > 200 && p[1] < 80 && p[2] < 80)
    }

    #[test]
    fn source_fills_only_the_drawable_area() {
        let config = quiet_config();
        let source = RgbaImage::from_pixel(300, 200, GRAY);
        let raster = PageRenderer::new(&config, OverlayMode::Print).render(
            &source,
            &page(-10, -10, 100, 10),
            0,
            scale(),
            None,
        );
        assert_eq!(raster.image.dimensions(), (100, 100));
        assert_eq!(*raster.image.get_pixel(10, 10), GRAY);
        assert_eq!(*raster.image.get_pixel(89, 89), GRAY);
        assert_eq!(*raster.image.get_pixel(5, 5), WHITE);
        assert_eq!(*raster.image.get_pixel(95, 50), WHITE);
    }

    #[test]
    fn page_past_the_document_is_blank_but_full_size() {
        let config = quiet_config();
        let source = RgbaImage::from_pixel(50, 50, GRAY);
        let raster = PageRenderer::new(&config, OverlayMode::Print).render(
            &source,
            &page(500, 500, 80, 10),
            3,
            scale(),
            None,
        );
        assert_eq!(raster.image.dimensions(), (80, 80));
        assert!(raster.image.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn partial_overlap_lands_at_document_offset() {
        let config = quiet_config();
        let mut source = RgbaImage::from_pixel(120, 120, WHITE);
        source.put_pixel(100, 100, BLACK);
        // drawable starts at document (90, 90), page-local (10, 10)
        let raster = PageRenderer::new(&config, OverlayMode::Print).render(
            &source,
            &page(80, 80, 100, 10),
            0,
            scale(),
            None,
        );
        assert_eq!(*raster.image.get_pixel(20, 20), BLACK);
        assert_eq!(*raster.image.get_pixel(60, 60), WHITE);
    }

    #[test]
    fn calibration_line_only_on_intersecting_pages() {
        let mut config = quiet_config();
        config.overlays.scale_line.toggle = Toggle::new(true, true);
        let source = RgbaImage::from_pixel(1000, 200, WHITE);
        let cal = ScaleCalibration::new(
            PointPx::new(20.0, 50.0),
            PointPx::new(150.0, 50.0),
            1000.0,
            Units::Mm,
        );
        let renderer = PageRenderer::new(&config, OverlayMode::Print);

        let hit = renderer.render(&source, &page(-10, -10, 200, 10), 0, scale(), Some(&cal));
        assert!(has_red(&hit.image));

        let miss = renderer.render(&source, &page(600, -10, 200, 10), 1, scale(), Some(&cal));
        assert!(!has_red(&miss.image));
    }

    #[test]
    fn diagonal_past_page_corner_does_not_touch() {
        let corner = page(100, 100, 100, 0);
        let line = |x1, y1, x2, y2| {
            ScaleCalibration::new(PointPx::new(x1, y1), PointPx::new(x2, y2), 10.0, Units::Mm)
        };
        // Bounding box overlaps the page, the line itself passes below-left.
        assert!(!segment_touches(&corner, &line(0.0, 150.0, 150.0, 0.0)));
        assert!(segment_touches(&corner, &line(0.0, 250.0, 250.0, 0.0)));
        assert!(segment_touches(&corner, &line(120.0, 120.0, 130.0, 180.0)));
        assert!(segment_touches(&corner, &line(150.0, 0.0, 150.0, 400.0)));
        assert!(!segment_touches(&corner, &line(50.0, 0.0, 50.0, 400.0)));
    }

    #[test]
    fn preview_mode_uses_display_toggles() {
        // scale line defaults to display on, print off
        let mut config = quiet_config();
        config.overlays.scale_line.toggle = Toggle::new(true, false);
        let source = RgbaImage::from_pixel(200, 200, WHITE);
        let cal = ScaleCalibration::new(PointPx::new(20.0, 50.0), PointPx::new(150.0, 50.0), 1.0, Units::Mm);
        let p = page(-10, -10, 200, 10);

        let preview = PageRenderer::new(&config, OverlayMode::Preview).render(&source, &p, 0, scale(), Some(&cal));
        let print = PageRenderer::new(&config, OverlayMode::Print).render(&source, &p, 0, scale(), Some(&cal));
        assert!(has_red(&preview.image));
        assert!(!has_red(&print.image));
    }

    #[test]
    fn measurement_label_when_midpoint_is_on_page() {
        let mut config = quiet_config();
        config.overlays.scale_text = Toggle::new(true, true);
        let source = RgbaImage::from_pixel(400, 400, WHITE);
        let cal = ScaleCalibration::new(PointPx::new(20.0, 200.0), PointPx::new(180.0, 200.0), 1000.0, Units::Mm);
        let renderer = PageRenderer::new(&config, OverlayMode::Print);

        let raster = renderer.render(&source, &page(-10, -10, 300, 10), 0, scale(), Some(&cal));
        assert_eq!(raster.texts.len(), 1);
        assert_eq!(raster.texts[0].text, "1000 mm");

        // page overlaps the segment's end but not its midpoint
        let edge = renderer.render(&source, &page(150, 100, 300, 10), 1, scale(), Some(&cal));
        assert!(edge.texts.is_empty());
    }

    #[test]
    fn page_label_uses_one_based_index() {
        let mut config = quiet_config();
        config.overlays.page_indicator.toggle = Toggle::new(true, true);
        config.overlays.page_indicator.position = IndicatorPosition::UpperLeft;
        let source = RgbaImage::from_pixel(100, 100, WHITE);
        let raster = PageRenderer::new(&config, OverlayMode::Print).render(
            &source,
            &page(-10, -10, 200, 10),
            2,
            scale(),
            None,
        );
        let label = &raster.texts[0];
        assert_eq!(label.text, "P3");
        assert_eq!((label.x, label.y), (15.0, 15.0));
        assert!(label.bold);
        assert!(label.outline.is_some(), "opaque labels get an outline");
    }

    #[test]
    fn default_overlays_draw_marks_in_gutter() {
        let config = TilerConfig::default();
        let source = RgbaImage::from_pixel(400, 400, WHITE);
        let raster = PageRenderer::new(&config, OverlayMode::Print).render(
            &source,
            &page(-20, -20, 200, 20),
            0,
            scale(),
            None,
        );
        // crop-mark arm left of the top-left drawable corner
        assert_eq!(*raster.image.get_pixel(15, 20), BLACK);
        assert!(!raster.texts.is_empty());
    }
}
