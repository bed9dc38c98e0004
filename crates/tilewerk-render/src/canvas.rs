// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Drawing surface for page rasters.
//
// `ClippedCanvas` wraps an `RgbaImage` with a clip rectangle and an opacity so
// every imageproc primitive drawn through it is clipped and alpha-blended.
// `PageRaster` pairs the raster with the text runs drawn on it; text stays
// separate so PDF output can emit it as vector text.

use image::{Rgba, RgbaImage, imageops};
use imageproc::drawing::{
    Canvas, draw_filled_rect_mut, draw_hollow_circle_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect;
use tilewerk_core::types::PixelRect;

use crate::text::LabelFont;

pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// A clipped, opacity-aware view over an image.
pub struct ClippedCanvas<'a> {
    image: &'a mut RgbaImage,
    clip: Option<PixelRect>,
    opacity: f32,
}

impl<'a> ClippedCanvas<'a> {
    /// Canvas covering the whole image at full opacity.
    pub fn new(image: &'a mut RgbaImage) -> Self {
        let bounds = PixelRect::new(0, 0, image.width(), image.height());
        Self {
            image,
            clip: Some(bounds),
            opacity: 1.0,
        }
    }

    /// Restrict drawing to `rect` (intersected with the image bounds).
    pub fn clipped(image: &'a mut RgbaImage, rect: PixelRect) -> Self {
        let bounds = PixelRect::new(0, 0, image.width(), image.height());
        Self {
            clip: bounds.intersect(&rect),
            image,
            opacity: 1.0,
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    fn visible(&self, x: u32, y: u32) -> bool {
        self.clip
            .is_some_and(|clip| clip.contains(x as i64, y as i64))
    }
}

impl Canvas for ClippedCanvas<'_> {
    type Pixel = Rgba<u8>;

    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn get_pixel(&self, x: u32, y: u32) -> Self::Pixel {
        *self.image.get_pixel(x, y)
    }

    fn draw_pixel(&mut self, x: u32, y: u32, color: Self::Pixel) {
        if !self.visible(x, y) {
            return;
        }
        let alpha = color[3] as f32 / 255.0 * self.opacity;
        if alpha <= 0.0 {
            return;
        }
        let dst = self.image.get_pixel_mut(x, y);
        for c in 0..3 {
            let blended = color[c] as f32 * alpha + dst[c] as f32 * (1.0 - alpha);
            dst[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
        dst[3] = dst[3].max((alpha * 255.0).round() as u8);
    }
}

/// Fill a rectangle. Empty rectangles are ignored.
pub fn fill_rect(canvas: &mut ClippedCanvas<'_>, rect: PixelRect, color: Rgba<u8>) {
    if rect.is_empty() {
        return;
    }
    draw_filled_rect_mut(canvas, to_imageproc(rect), color);
}

/// Outline a rectangle with a 1px stroke on its inner edge.
pub fn stroke_rect(canvas: &mut ClippedCanvas<'_>, rect: PixelRect, width: u32, color: Rgba<u8>) {
    if rect.is_empty() {
        return;
    }
    let w = width.max(1).min(rect.width).min(rect.height);
    let top = PixelRect::new(rect.x, rect.y, rect.width, w);
    let bottom = PixelRect::new(rect.x, rect.bottom() - w as i64, rect.width, w);
    let inner_h = rect.height.saturating_sub(2 * w);
    let left = PixelRect::new(rect.x, rect.y + w as i64, w, inner_h);
    let right = PixelRect::new(rect.right() - w as i64, rect.y + w as i64, w, inner_h);
    for side in [top, bottom, left, right] {
        fill_rect(canvas, side, color);
    }
}

/// Straight line `width` pixels thick, built from parallel 1px segments.
pub fn thick_line(
    canvas: &mut ClippedCanvas<'_>,
    start: (f32, f32),
    end: (f32, f32),
    width: u32,
    color: Rgba<u8>,
) {
    let width = width.max(1);
    if width == 1 {
        draw_line_segment_mut(canvas, start, end, color);
        return;
    }
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return;
    }
    let (nx, ny) = (-dy / len, dx / len);
    let half = (width as f32 - 1.0) / 2.0;
    for i in 0..width {
        let offset = i as f32 - half;
        draw_line_segment_mut(
            canvas,
            (start.0 + nx * offset, start.1 + ny * offset),
            (end.0 + nx * offset, end.1 + ny * offset),
            color,
        );
    }
}

/// Dashed line. `pattern` alternates on/off lengths in multiples of `width`;
/// an empty pattern draws a solid line.
pub fn dashed_line(
    canvas: &mut ClippedCanvas<'_>,
    start: (f32, f32),
    end: (f32, f32),
    width: u32,
    pattern: &[u32],
    color: Rgba<u8>,
) {
    if pattern.is_empty() {
        thick_line(canvas, start, end, width, color);
        return;
    }
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return;
    }
    let (ux, uy) = (dx / len, dy / len);
    let unit = width.max(1) as f32;

    let mut pos = 0.0f32;
    let mut idx = 0usize;
    while pos < len {
        let seg = pattern[idx % pattern.len()].max(1) as f32 * unit;
        let seg_end = (pos + seg).min(len);
        if idx % 2 == 0 {
            thick_line(
                canvas,
                (start.0 + ux * pos, start.1 + uy * pos),
                (start.0 + ux * seg_end, start.1 + uy * seg_end),
                width,
                color,
            );
        }
        pos = seg_end;
        idx += 1;
    }
}

/// Circle outline `width` pixels thick, drawn as concentric 1px circles.
pub fn thick_circle(
    canvas: &mut ClippedCanvas<'_>,
    center: (i32, i32),
    radius: i32,
    width: u32,
    color: Rgba<u8>,
) {
    if radius <= 0 {
        return;
    }
    let width = width.max(1) as i32;
    let inner = radius - (width - 1) / 2;
    for r in inner.max(1)..inner.max(1) + width {
        draw_hollow_circle_mut(canvas, center, r, color);
    }
}

fn to_imageproc(rect: PixelRect) -> Rect {
    Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height)
}

/// A piece of label text positioned on a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    /// Top-left corner in raster pixels.
    pub x: f32,
    pub y: f32,
    /// Glyph height in raster pixels.
    pub size_px: f32,
    pub color: Rgba<u8>,
    pub bold: bool,
    /// Honoured by PDF output only; raster labels use the single loaded face.
    pub italic: bool,
    /// One-pixel halo drawn behind the text.
    pub outline: Option<Rgba<u8>>,
}

impl TextRun {
    pub fn new(text: impl Into<String>, x: f32, y: f32, size_px: f32, color: Rgba<u8>) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            size_px,
            color,
            bold: false,
            italic: false,
            outline: None,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn with_outline(mut self, color: Rgba<u8>) -> Self {
        self.outline = Some(color);
        self
    }
}

/// A rendered page: pixels plus the text drawn on them.
#[derive(Debug, Clone)]
pub struct PageRaster {
    pub image: RgbaImage,
    pub texts: Vec<TextRun>,
}

impl PageRaster {
    /// White page of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, WHITE),
            texts: Vec::new(),
        }
    }

    pub fn filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, color),
            texts: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn push_text(&mut self, run: TextRun) {
        self.texts.push(run);
    }

    /// Copy another raster onto this one at `(dx, dy)`, text included.
    pub fn blit(&mut self, other: &PageRaster, dx: i64, dy: i64) {
        imageops::replace(&mut self.image, &other.image, dx, dy);
        for run in &other.texts {
            let mut moved = run.clone();
            moved.x += dx as f32;
            moved.y += dy as f32;
            self.texts.push(moved);
        }
    }

    /// Resample to `width` x `height`; text positions and sizes follow.
    pub fn resized(&self, width: u32, height: u32) -> PageRaster {
        let width = width.max(1);
        let height = height.max(1);
        if width == self.width() && height == self.height() {
            return self.clone();
        }
        let sx = width as f32 / self.width().max(1) as f32;
        let sy = height as f32 / self.height().max(1) as f32;
        let image = imageops::resize(&self.image, width, height, imageops::FilterType::Triangle);
        let texts = self
            .texts
            .iter()
            .map(|run| TextRun {
                x: run.x * sx,
                y: run.y * sy,
                size_px: run.size_px * sy,
                ..run.clone()
            })
            .collect();
        PageRaster { image, texts }
    }

    /// Burn the text runs into a copy of the image.
    ///
    /// Without a font the pixels are returned as-is.
    pub fn flatten(&self, font: Option<&LabelFont>) -> RgbaImage {
        let mut image = self.image.clone();
        let Some(font) = font else {
            return image;
        };
        let mut canvas = ClippedCanvas::new(&mut image);
        for run in &self.texts {
            if run.size_px < 1.0 || run.text.is_empty() {
                continue;
            }
            let x = run.x.round() as i32;
            let y = run.y.round() as i32;
            if let Some(outline) = run.outline {
                for (ox, oy) in [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)] {
                    draw_text_mut(&mut canvas, outline, x + ox, y + oy, run.size_px, font.font(), &run.text);
                }
            }
            draw_text_mut(&mut canvas, run.color, x, y, run.size_px, font.font(), &run.text);
            if run.bold {
                draw_text_mut(&mut canvas, run.color, x + 1, y, run.size_px, font.font(), &run.text);
            }
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_rect_blocks_outside_pixels() {
        let mut image = RgbaImage::from_pixel(20, 20, WHITE);
        {
            let mut canvas = ClippedCanvas::clipped(&mut image, PixelRect::new(5, 5, 10, 10));
            fill_rect(&mut canvas, PixelRect::new(0, 0, 20, 20), BLACK);
        }
        assert_eq!(*image.get_pixel(0, 0), WHITE);
        assert_eq!(*image.get_pixel(5, 5), BLACK);
        assert_eq!(*image.get_pixel(14, 14), BLACK);
        assert_eq!(*image.get_pixel(15, 15), WHITE);
    }

    #[test]
    fn opacity_blends_with_background() {
        let mut image = RgbaImage::from_pixel(4, 4, WHITE);
        {
            let mut canvas = ClippedCanvas::new(&mut image).with_opacity(0.5);
            fill_rect(&mut canvas, PixelRect::new(0, 0, 4, 4), BLACK);
        }
        let p = image.get_pixel(1, 1);
        assert!((126..=129).contains(&p[0]), "got {}", p[0]);
    }

    #[test]
    fn empty_rects_are_ignored() {
        let mut image = RgbaImage::from_pixel(4, 4, WHITE);
        let mut canvas = ClippedCanvas::new(&mut image);
        fill_rect(&mut canvas, PixelRect::new(1, 1, 0, 3), BLACK);
        stroke_rect(&mut canvas, PixelRect::new(1, 1, 3, 0), 1, BLACK);
        drop(canvas);
        assert!(image.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn dashed_line_leaves_gaps() {
        let mut image = RgbaImage::from_pixel(100, 3, WHITE);
        {
            let mut canvas = ClippedCanvas::new(&mut image);
            dashed_line(&mut canvas, (0.0, 1.0), (99.0, 1.0), 1, &[4, 2], BLACK);
        }
        let dark = (0..100).filter(|&x| image.get_pixel(x, 1)[0] < 128).count();
        assert!(dark > 50 && dark < 100, "dark pixels: {dark}");
    }

    #[test]
    fn blit_moves_text_with_pixels() {
        let mut target = PageRaster::blank(50, 50);
        let mut tile = PageRaster::filled(10, 10, BLACK);
        tile.push_text(TextRun::new("P1", 2.0, 3.0, 8.0, WHITE));
        target.blit(&tile, 20, 30);
        assert_eq!(*target.image.get_pixel(25, 35), BLACK);
        assert_eq!((target.texts[0].x, target.texts[0].y), (22.0, 33.0));
    }

    #[test]
    fn resize_scales_text() {
        let mut page = PageRaster::blank(100, 200);
        page.push_text(TextRun::new("x", 10.0, 20.0, 10.0, BLACK));
        let half = page.resized(50, 100);
        assert_eq!(half.image.dimensions(), (50, 100));
        assert_eq!(half.texts[0].x, 5.0);
        assert_eq!(half.texts[0].size_px, 5.0);
    }

    #[test]
    fn flatten_without_font_keeps_pixels() {
        let mut page = PageRaster::blank(10, 10);
        page.push_text(TextRun::new("P1", 0.0, 0.0, 8.0, BLACK));
        assert_eq!(page.flatten(None), page.image);
    }
}
