// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Alignment overlays: scale bar, registration marks, crop marks, gutter outline.
//
// Every physical length is converted to page pixels through the document
// scale factor (px = mm / mm_per_px), so overlays print at their true size.

use image::{Rgba, RgbaImage};
use tilewerk_core::config::{
    BarZone, Compass, CropMarkStyle, RegistrationMarkStyle, ScaleBarLocation, ScaleBarStyle,
};
use tilewerk_core::types::{MM_PER_INCH, PixelRect, Units};
use tilewerk_layout::ScaleFactor;
use tracing::trace;

use crate::canvas::{BLACK, ClippedCanvas, WHITE, fill_rect, stroke_rect, thick_circle, thick_line};

/// Blue used for gutter outlines and drawable-area boxes.
pub const GUTTER_BLUE: Rgba<u8> = Rgba([0, 100, 255, 255]);

// -- Scale bar ----------------------------------------------------------------

/// Everything needed to place and segment a scale bar on one page.
#[derive(Debug, Clone, Copy)]
pub struct ScaleBarSpec {
    pub tile_width: u32,
    pub tile_height: u32,
    pub gutter: u32,
    pub scale: ScaleFactor,
    pub units: Units,
    pub location: ScaleBarLocation,
    pub length_in: f64,
    pub length_cm: f64,
    pub opacity_percent: u8,
    pub thickness_mm: f64,
    pub padding_mm: f64,
}

impl ScaleBarSpec {
    pub fn new(
        style: &ScaleBarStyle,
        tile_width: u32,
        tile_height: u32,
        gutter: u32,
        scale: ScaleFactor,
        units: Units,
    ) -> Self {
        Self {
            tile_width,
            tile_height,
            gutter,
            scale,
            units,
            location: style.location,
            length_in: style.length_in,
            length_cm: style.length_cm,
            opacity_percent: style.opacity_percent,
            thickness_mm: style.thickness_mm,
            padding_mm: style.padding_mm,
        }
    }

    fn px(&self, mm: f64) -> f64 {
        self.scale.mm_to_px(mm)
    }

    fn total_px(&self) -> i64 {
        let total_mm = match self.units {
            Units::Inches => self.length_in * MM_PER_INCH,
            Units::Mm => self.length_cm * 10.0,
        };
        self.px(total_mm).round() as i64
    }
}

/// Where the bar lands on the page, or `None` when there is no room.
///
/// The requested length shrinks to whatever the page or gutter band allows.
pub fn scale_bar_rect(spec: &ScaleBarSpec) -> Option<PixelRect> {
    let total = spec.total_px();
    let thick = spec.px(spec.thickness_mm).round() as i64;
    let pad = spec.px(spec.padding_mm).round() as i64;
    let tile_w = spec.tile_width as i64;
    let tile_h = spec.tile_height as i64;
    let g = spec.gutter as i64;

    let printable_w = (tile_w - 2 * g).max(0);
    let printable_h = (tile_h - 2 * g).max(0);
    let dir = spec.location.direction;
    let horizontal = dir.is_horizontal();

    let (x, y, w, h) = match (spec.location.zone, horizontal) {
        (BarZone::Page, true) => {
            let w = total.min(printable_w - 2 * pad).max(0);
            let h = thick.min((printable_h - 2 * pad).max(0));
            let y = if dir.is_north() {
                g + pad
            } else {
                g + printable_h - pad - h
            };
            (g + pad, y, w, h)
        }
        (BarZone::Page, false) => {
            let h = total.min(printable_h - 2 * pad).max(0);
            let w = thick.min((printable_w - 2 * pad).max(0));
            let x = if matches!(dir, Compass::E) {
                g + printable_w - pad - w
            } else {
                g + pad
            };
            (x, g + pad, w, h)
        }
        (BarZone::Gutter, true) => {
            let w = total.min(tile_w - 2 * pad).max(0);
            let h = thick.min((g - pad).max(0));
            let y = if dir.is_north() {
                (g - h - pad).max(0)
            } else {
                tile_h - (g - pad).max(0)
            };
            (pad, y, w, h)
        }
        (BarZone::Gutter, false) => {
            let h = total.min(tile_h - 2 * pad).max(0);
            let w = thick.min((g - pad).max(0));
            let x = if matches!(dir, Compass::E) {
                tile_w - (g - pad).max(0)
            } else {
                (g - w - pad).max(0)
            };
            (x, pad, w, h)
        }
    };

    if w <= 0 || h <= 0 {
        return None;
    }
    Some(PixelRect::new(x, y, w as u32, h as u32))
}

/// Block lengths in pixels, alternating dark/light from the first.
///
/// Imperial bars use quarter-inch blocks for the first inch and half-inch
/// blocks after; metric bars use 5 mm blocks for the first 3 cm and 1 cm
/// blocks after.
pub fn scale_bar_segments(spec: &ScaleBarSpec) -> Vec<u32> {
    let (fine_mm, first_span_mm, coarse_mm) = match spec.units {
        Units::Inches => (MM_PER_INCH / 4.0, MM_PER_INCH, MM_PER_INCH / 2.0),
        Units::Mm => (5.0, 30.0, 10.0),
    };
    let fine_px = spec.px(fine_mm);
    let coarse_px = spec.px(coarse_mm);

    let mut remaining = spec.total_px();
    let first_span = remaining.min(spec.px(first_span_mm).round() as i64);
    let n_fine = ((first_span as f64 / fine_px).round() as i64).max(1);

    let mut segments = vec![fine_px.round() as u32; n_fine as usize];
    remaining -= first_span;
    if remaining > 0 {
        let n_coarse = ((remaining as f64 / coarse_px).round() as i64).max(1);
        segments.extend(std::iter::repeat_n(coarse_px.round() as u32, n_coarse as usize));
    }
    segments
}

/// Draw the alternating-block bar onto a page raster.
pub fn draw_scale_bar(image: &mut RgbaImage, spec: &ScaleBarSpec) {
    let Some(bar) = scale_bar_rect(spec) else {
        trace!("scale bar does not fit; skipped");
        return;
    };
    let horizontal = spec.location.direction.is_horizontal();
    let extent = if horizontal { bar.width } else { bar.height };
    let opacity = spec.opacity_percent.min(100) as f32 / 100.0;
    let mut canvas = ClippedCanvas::new(image).with_opacity(opacity);

    let mut offset = 0u32;
    let mut dark = true;
    for seg in scale_bar_segments(spec) {
        let len = seg.min(extent.saturating_sub(offset));
        if len == 0 {
            break;
        }
        let block = if horizontal {
            PixelRect::new(bar.x + offset as i64, bar.y, len, bar.height)
        } else {
            PixelRect::new(bar.x, bar.y + offset as i64, bar.width, len)
        };
        fill_rect(&mut canvas, block, if dark { BLACK } else { WHITE });
        offset += seg;
        dark = !dark;
        if offset >= extent {
            break;
        }
    }
}

// -- Registration marks -------------------------------------------------------

/// Circle-and-crosshair mark sizes in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationMarks {
    pub radius_px: i32,
    /// Arm length on each side of the centre.
    pub cross_px: i32,
    pub line_px: u32,
}

impl RegistrationMarks {
    pub fn new(style: &RegistrationMarkStyle, scale: ScaleFactor) -> Self {
        let px_per_mm = scale.px_per_mm();
        Self {
            radius_px: (style.diameter_mm * px_per_mm / 2.0) as i32,
            cross_px: (style.crosshair_mm * px_per_mm) as i32,
            line_px: ((style.line_width_mm * px_per_mm).round() as u32).max(1),
        }
    }

    /// The same marks at a different raster scale (e.g. a thumbnail).
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            radius_px: (self.radius_px as f64 * factor) as i32,
            cross_px: (self.cross_px as f64 * factor) as i32,
            line_px: 1,
        }
    }

    /// Draw at the four corners of `drawable`, clipped to it so each page
    /// shows only its own quarter of every mark.
    pub fn draw(&self, image: &mut RgbaImage, drawable: PixelRect) {
        if drawable.is_empty() {
            return;
        }
        let mut canvas = ClippedCanvas::clipped(image, drawable);
        let (l, t) = (drawable.x as i32, drawable.y as i32);
        let (r, b) = (drawable.right() as i32, drawable.bottom() as i32);
        for (cx, cy) in [(l, t), (r, t), (l, b), (r, b)] {
            thick_circle(&mut canvas, (cx, cy), self.radius_px, self.line_px, BLACK);
            let (fx, fy, c) = (cx as f32, cy as f32, self.cross_px as f32);
            thick_line(&mut canvas, (fx - c, fy), (fx + c, fy), self.line_px, BLACK);
            thick_line(&mut canvas, (fx, fy - c), (fx, fy + c), self.line_px, BLACK);
        }
    }
}

// -- Crop marks and gutter outline -------------------------------------------

/// Crop-mark sizes in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropMarks {
    pub length_px: u32,
    pub line_px: u32,
}

impl CropMarks {
    pub fn new(style: &CropMarkStyle, scale: ScaleFactor) -> Self {
        Self {
            length_px: scale.mm_to_px(style.length_mm).round().max(1.0) as u32,
            line_px: (scale.mm_to_px(style.line_width_mm).round() as u32).max(1),
        }
    }

    /// Short arms extending each drawable edge outward into the gutter band.
    pub fn draw(&self, image: &mut RgbaImage, drawable: PixelRect) {
        if drawable.is_empty() {
            return;
        }
        let mut canvas = ClippedCanvas::new(image);
        let len = self.length_px as f32;
        let l = drawable.x as f32;
        let t = drawable.y as f32;
        let r = (drawable.right() - 1) as f32;
        let b = (drawable.bottom() - 1) as f32;

        let arms = [
            // top-left
            ((l - len, t), (l - 1.0, t)),
            ((l, t - len), (l, t - 1.0)),
            // top-right
            ((r + 1.0, t), (r + len, t)),
            ((r, t - len), (r, t - 1.0)),
            // bottom-left
            ((l - len, b), (l - 1.0, b)),
            ((l, b + 1.0), (l, b + len)),
            // bottom-right
            ((r + 1.0, b), (r + len, b)),
            ((r, b + 1.0), (r, b + len)),
        ];
        for (start, end) in arms {
            thick_line(&mut canvas, start, end, self.line_px, BLACK);
        }
    }
}

/// Thin half-transparent blue box around the drawable area.
pub fn draw_gutter_outline(image: &mut RgbaImage, drawable: PixelRect) {
    let mut canvas = ClippedCanvas::new(image).with_opacity(0.5);
    stroke_rect(&mut canvas, drawable, 1, GUTTER_BLUE);
}
