// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Tilewerk tiling engine.

use serde::{Deserialize, Serialize};

/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Physical unit system chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Mm,
    Inches,
}

impl Units {
    /// Convert a length expressed in these units to millimetres.
    pub fn to_mm(&self, value: f64) -> f64 {
        match self {
            Self::Mm => value,
            Self::Inches => value * MM_PER_INCH,
        }
    }

    /// Convert a length in millimetres to these units.
    pub fn from_mm(&self, mm: f64) -> f64 {
        match self {
            Self::Mm => mm,
            Self::Inches => mm / MM_PER_INCH,
        }
    }

    /// Short label used in reports ("mm", "inches").
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mm => "mm",
            Self::Inches => "inches",
        }
    }

    /// Parse a unit name as typed by a user.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mm" | "millimetre" | "millimetres" | "millimeter" | "millimeters" => Some(Self::Mm),
            "in" | "inch" | "inches" => Some(Self::Inches),
            _ => None,
        }
    }
}

/// Standard paper sizes. Dimensions are portrait (width < height).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Tabloid,
    Custom { width_mm: f64, height_mm: f64 },
}

impl PaperSize {
    /// Portrait dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (f64, f64) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::A3 => (297.0, 420.0),
            Self::A5 => (148.0, 210.0),
            Self::Letter => (215.9, 279.4),
            Self::Legal => (215.9, 355.6),
            Self::Tabloid => (279.4, 431.8),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }

    /// Dimensions rotated for the given orientation.
    pub fn oriented_mm(&self, orientation: Orientation) -> (f64, f64) {
        let (w, h) = self.dimensions_mm();
        let (short, long) = if w <= h { (w, h) } else { (h, w) };
        match orientation {
            Orientation::Portrait => (short, long),
            Orientation::Landscape => (long, short),
        }
    }

    /// Display name ("A4", "Letter", "Custom 300x500mm").
    pub fn name(&self) -> String {
        match self {
            Self::A4 => "A4".into(),
            Self::A3 => "A3".into(),
            Self::A5 => "A5".into(),
            Self::Letter => "Letter".into(),
            Self::Legal => "Legal".into(),
            Self::Tabloid => "Tabloid".into(),
            Self::Custom {
                width_mm,
                height_mm,
            } => format!("Custom {width_mm}x{height_mm}mm"),
        }
    }

    /// Look up a named paper size (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "a4" => Some(Self::A4),
            "a3" => Some(Self::A3),
            "a5" => Some(Self::A5),
            "letter" => Some(Self::Letter),
            "legal" => Some(Self::Legal),
            "tabloid" | "ledger" => Some(Self::Tabloid),
            _ => None,
        }
    }
}

/// Physical page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
        }
    }
}

/// User preference for page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrientationPolicy {
    /// Pick whichever orientation best matches the tile aspect ratio.
    Auto,
    Landscape,
    Portrait,
}

impl From<Orientation> for OrientationPolicy {
    fn from(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Portrait => Self::Portrait,
            Orientation::Landscape => Self::Landscape,
        }
    }
}

impl OrientationPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "landscape" => Some(Self::Landscape),
            "portrait" => Some(Self::Portrait),
            _ => None,
        }
    }
}

/// A point in document pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointPx {
    pub x: f64,
    pub y: f64,
}

impl PointPx {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &PointPx) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Integer pixel rectangle. The origin may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        self.x + self.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.y + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Overlap of two rectangles, or `None` when they do not overlap.
    pub fn intersect(&self, other: &PixelRect) -> Option<PixelRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
    }

    /// Shrink on all four sides; collapses to an empty rect when too small.
    pub fn shrink(&self, by: u32) -> PixelRect {
        let width = self.width.saturating_sub(by.saturating_mul(2));
        let height = self.height.saturating_sub(by.saturating_mul(2));
        PixelRect::new(self.x + by as i64, self.y + by as i64, width, height)
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &PixelRect) -> PixelRect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        PixelRect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32)
    }
}

/// Raster image output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Tiff,
    Bmp,
}

impl ImageFormat {
    /// File extension without the dot. JPEG always uses "jpg".
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "tif" | "tiff" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }
}

/// Where the metadata summary page goes in a multi-page output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataPosition {
    First,
    Last,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inches_convert_to_mm() {
        assert!((Units::Inches.to_mm(2.0) - 50.8).abs() < 1e-9);
        assert!((Units::Inches.from_mm(25.4) - 1.0).abs() < 1e-9);
        assert_eq!(Units::Mm.to_mm(12.5), 12.5);
    }

    #[test]
    fn paper_orientation_swaps_dimensions() {
        assert_eq!(PaperSize::A4.oriented_mm(Orientation::Portrait), (210.0, 297.0));
        assert_eq!(PaperSize::A4.oriented_mm(Orientation::Landscape), (297.0, 210.0));
    }

    #[test]
    fn paper_names_round_trip() {
        for paper in [PaperSize::A4, PaperSize::A3, PaperSize::Letter, PaperSize::Tabloid] {
            assert_eq!(PaperSize::from_name(&paper.name()), Some(paper));
        }
        assert_eq!(PaperSize::from_name("b5"), None);
    }

    #[test]
    fn rect_intersection_and_shrink() {
        let a = PixelRect::new(-100, -100, 2100, 2970);
        let drawable = a.shrink(100);
        assert_eq!(drawable, PixelRect::new(0, 0, 1900, 2770));

        let doc = PixelRect::new(0, 0, 3000, 2000);
        assert_eq!(drawable.intersect(&doc), Some(PixelRect::new(0, 0, 1900, 2000)));
        assert_eq!(PixelRect::new(5000, 0, 10, 10).intersect(&doc), None);
    }

    #[test]
    fn shrink_past_zero_is_empty() {
        assert!(PixelRect::new(0, 0, 100, 50).shrink(30).is_empty());
    }

    #[test]
    fn jpeg_uses_jpg_extension() {
        assert_eq!(ImageFormat::from_name("JPEG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
    }
}
