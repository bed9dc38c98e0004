// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Configuration snapshot.
//
// `TilerConfig` is an immutable value handed to every grid, render, and
// export call. Nothing reads configuration from global state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TilewerkError};
use crate::types::{MetadataPosition, OrientationPolicy, PaperSize, Units};

/// Complete configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilerConfig {
    /// Units for scale bars and reports.
    pub default_units: Units,
    /// Resolution used for PDF output and the metadata raster.
    pub default_dpi: u32,
    /// Paper size used to build the page grid.
    pub default_page_size: PaperSize,
    pub page_orientation: OrientationPolicy,
    /// Overlap band on every page edge, in millimetres.
    pub gutter_size_mm: f64,
    pub overlays: OverlaySettings,
    pub metadata_page: MetadataPageSettings,
    pub limits: LayoutLimits,
    pub export: ExportDefaults,
    /// TrueType/OpenType font for raster labels. When unset, common system
    /// locations are searched.
    pub label_font_path: Option<PathBuf>,
}

impl Default for TilerConfig {
    fn default() -> Self {
        Self {
            default_units: Units::Mm,
            default_dpi: 300,
            default_page_size: PaperSize::A4,
            page_orientation: OrientationPolicy::Auto,
            gutter_size_mm: 10.0,
            overlays: OverlaySettings::default(),
            metadata_page: MetadataPageSettings::default(),
            limits: LayoutLimits::default(),
            export: ExportDefaults::default(),
            label_font_path: None,
        }
    }
}

impl TilerConfig {
    /// Read a configuration snapshot from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        info!(path = %path.as_ref().display(), "configuration loaded");
        Ok(config)
    }

    /// Read a configuration snapshot, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.as_ref().display(), error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    /// Write the snapshot as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Reject values that would make every layout meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.default_dpi == 0 {
            return Err(TilewerkError::Config("default_dpi must be positive".into()));
        }
        if !(self.gutter_size_mm >= 0.0) {
            return Err(TilewerkError::Config(format!(
                "gutter_size_mm must be non-negative (got {})",
                self.gutter_size_mm
            )));
        }
        if self.limits.max_tiles == 0 {
            return Err(TilewerkError::Config("limits.max_tiles must be positive".into()));
        }
        let (w, h) = self.default_page_size.dimensions_mm();
        if !(w > 0.0 && h > 0.0) {
            return Err(TilewerkError::Config("page size must be positive".into()));
        }
        Ok(())
    }
}

/// Independent on-screen and on-paper switches for one overlay kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toggle {
    pub display: bool,
    pub print: bool,
}

impl Toggle {
    pub const fn new(display: bool, print: bool) -> Self {
        Self { display, print }
    }
}

/// Style and visibility of every page overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    pub gutter_lines: Toggle,
    pub crop_marks: CropMarkStyle,
    pub registration_marks: RegistrationMarkStyle,
    pub scale_bar: ScaleBarStyle,
    pub scale_line: ScaleLineStyle,
    pub scale_text: Toggle,
    pub datum_line: DatumLineStyle,
    pub page_indicator: PageIndicatorStyle,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            gutter_lines: Toggle::new(true, true),
            crop_marks: CropMarkStyle::default(),
            registration_marks: RegistrationMarkStyle::default(),
            scale_bar: ScaleBarStyle::default(),
            scale_line: ScaleLineStyle::default(),
            scale_text: Toggle::new(true, true),
            datum_line: DatumLineStyle::default(),
            page_indicator: PageIndicatorStyle::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropMarkStyle {
    pub toggle: Toggle,
    /// Length of each crop-mark arm into the gutter band.
    pub length_mm: f64,
    pub line_width_mm: f64,
}

impl Default for CropMarkStyle {
    fn default() -> Self {
        Self {
            toggle: Toggle::new(true, true),
            length_mm: 5.0,
            line_width_mm: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationMarkStyle {
    pub toggle: Toggle,
    pub diameter_mm: f64,
    pub crosshair_mm: f64,
    pub line_width_mm: f64,
}

impl Default for RegistrationMarkStyle {
    fn default() -> Self {
        Self {
            toggle: Toggle::new(true, true),
            diameter_mm: 8.0,
            crosshair_mm: 8.0,
            line_width_mm: 0.25,
        }
    }
}

/// Whether the scale bar sits inside the drawable area or in the gutter band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarZone {
    Page,
    Gutter,
}

/// Eight-way compass placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compass {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Compass {
    /// North/south and corner placements lay the bar out horizontally.
    pub fn is_horizontal(&self) -> bool {
        !matches!(self, Self::E | Self::W)
    }

    pub fn is_north(&self) -> bool {
        matches!(self, Self::N | Self::NE | Self::NW)
    }
}

/// Scale-bar placement such as `Page-S` or `Gutter-NE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScaleBarLocation {
    pub zone: BarZone,
    pub direction: Compass,
}

impl ScaleBarLocation {
    /// Parse `"<Page|Gutter>-<dir>"`. Missing parts default to `Page` and `S`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().splitn(2, '-');
        let zone = match parts.next().unwrap_or("page").to_ascii_lowercase().as_str() {
            "" | "page" => BarZone::Page,
            "gutter" => BarZone::Gutter,
            _ => return None,
        };
        let direction = match parts.next().unwrap_or("S").to_ascii_uppercase().as_str() {
            "N" => Compass::N,
            "NE" => Compass::NE,
            "E" => Compass::E,
            "SE" => Compass::SE,
            "S" => Compass::S,
            "SW" => Compass::SW,
            "W" => Compass::W,
            "NW" => Compass::NW,
            _ => return None,
        };
        Some(Self { zone, direction })
    }
}

impl std::fmt::Display for ScaleBarLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let zone = match self.zone {
            BarZone::Page => "Page",
            BarZone::Gutter => "Gutter",
        };
        write!(f, "{zone}-{:?}", self.direction)
    }
}

impl TryFrom<String> for ScaleBarLocation {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid scale bar location: {value}"))
    }
}

impl From<ScaleBarLocation> for String {
    fn from(value: ScaleBarLocation) -> Self {
        value.to_string()
    }
}

impl Default for ScaleBarLocation {
    fn default() -> Self {
        Self {
            zone: BarZone::Page,
            direction: Compass::S,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleBarStyle {
    pub toggle: Toggle,
    pub location: ScaleBarLocation,
    /// 0–100.
    pub opacity_percent: u8,
    /// Requested length when units are inches.
    pub length_in: f64,
    /// Requested length when units are millimetres.
    pub length_cm: f64,
    pub thickness_mm: f64,
    pub padding_mm: f64,
}

impl Default for ScaleBarStyle {
    fn default() -> Self {
        Self {
            toggle: Toggle::new(true, true),
            location: ScaleBarLocation::default(),
            opacity_percent: 60,
            length_in: 6.0,
            length_cm: 10.0,
            thickness_mm: 5.0,
            padding_mm: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleLineStyle {
    pub toggle: Toggle,
    pub color: String,
    pub width_px: u32,
}

impl Default for ScaleLineStyle {
    fn default() -> Self {
        Self {
            toggle: Toggle::new(true, false),
            color: "#FF0000".into(),
            width_px: 2,
        }
    }
}

/// Dash pattern for the datum line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dash,
    Dot,
    DashDot,
    DashDotDot,
    #[serde(rename = "dot-dash-dot")]
    DotDashDot,
}

impl LineStyle {
    /// Alternating on/off lengths in units of the line width.
    pub fn dash_pattern(&self) -> &'static [u32] {
        match self {
            Self::Solid => &[],
            Self::Dash => &[4, 2],
            Self::Dot => &[1, 2],
            Self::DashDot => &[4, 2, 1, 2],
            Self::DashDotDot => &[4, 2, 1, 2, 1, 2],
            Self::DotDashDot => &[8, 3, 2, 3, 2, 3],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatumLineStyle {
    pub toggle: Toggle,
    pub color: String,
    pub style: LineStyle,
    pub width_px: u32,
}

impl Default for DatumLineStyle {
    fn default() -> Self {
        Self {
            toggle: Toggle::new(true, false),
            color: "#FF0000".into(),
            style: LineStyle::Dash,
            width_px: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndicatorPosition {
    UpperLeft,
    UpperRight,
    BottomLeft,
    BottomRight,
    CenterPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    Normal,
    Bold,
    Italic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageIndicatorStyle {
    pub toggle: Toggle,
    pub position: IndicatorPosition,
    pub font_size_pt: f64,
    pub font_color: String,
    pub font_style: FontStyle,
    /// 0–255.
    pub alpha: u8,
}

impl Default for PageIndicatorStyle {
    fn default() -> Self {
        Self {
            toggle: Toggle::new(true, true),
            position: IndicatorPosition::BottomRight,
            font_size_pt: 12.0,
            font_color: "#FFFFFF".into(),
            font_style: FontStyle::Bold,
            alpha: 255,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataPageSettings {
    pub include: bool,
    pub position: MetadataPosition,
}

impl Default for MetadataPageSettings {
    fn default() -> Self {
        Self {
            include: true,
            position: MetadataPosition::First,
        }
    }
}

/// Tunable thresholds for grid generation and orientation choice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutLimits {
    /// Abort grid generation when the estimated tile count exceeds this.
    pub max_tiles: u32,
    /// Pages smaller than this (in document pixels) mean the scale is too coarse.
    pub min_page_px: f64,
    /// Composite outputs switch to landscape above this width/height ratio.
    pub composite_landscape_aspect: f64,
    /// Landscape must beat portrait by more than this aspect-ratio difference
    /// before auto orientation picks it.
    pub auto_orientation_tolerance: f64,
}

impl Default for LayoutLimits {
    fn default() -> Self {
        Self {
            max_tiles: 100,
            min_page_px: 50.0,
            composite_landscape_aspect: 1.414,
            auto_orientation_tolerance: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// 1–100.
    pub jpeg_quality: u8,
    /// Margin around composite outputs.
    pub composite_margin_mm: f64,
    /// Fixed raster size of the metadata page on direct print.
    pub metadata_raster_width: u32,
    pub metadata_raster_height: u32,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            jpeg_quality: 95,
            composite_margin_mm: 10.0,
            metadata_raster_width: 2480,
            metadata_raster_height: 3508,
        }
    }
}

/// Parse `#RRGGBB` or `#RRGGBBAA` into RGBA bytes.
pub fn parse_hex_color(text: &str) -> Option<[u8; 4]> {
    let hex = text.trim().trim_start_matches('#');
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        TilerConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn save_then_load_preserves_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tilewerk.json");

        let mut config = TilerConfig::default();
        config.gutter_size_mm = 12.5;
        config.overlays.scale_bar.location = ScaleBarLocation::parse("Gutter-NE").expect("parse");
        config.save(&path).expect("save");

        let loaded = TilerConfig::load(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config: TilerConfig =
            serde_json::from_str(r#"{ "gutter_size_mm": 5.0 }"#).expect("parse");
        assert_eq!(config.gutter_size_mm, 5.0);
        assert_eq!(config.default_dpi, 300);
        assert_eq!(config.limits.max_tiles, 100);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = TilerConfig::load_or_default("/nonexistent/tilewerk.json");
        assert_eq!(config, TilerConfig::default());
    }

    #[test]
    fn negative_gutter_is_rejected() {
        let mut config = TilerConfig::default();
        config.gutter_size_mm = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn scale_bar_location_parses_zone_and_direction() {
        let loc = ScaleBarLocation::parse("gutter-sw").expect("parse");
        assert_eq!(loc.zone, BarZone::Gutter);
        assert_eq!(loc.direction, Compass::SW);
        assert_eq!(loc.to_string(), "Gutter-SW");
        assert!(ScaleBarLocation::parse("Margin-S").is_none());
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#FF0000"), Some([255, 0, 0, 255]));
        assert_eq!(parse_hex_color("0064ff80"), Some([0, 100, 255, 128]));
        assert_eq!(parse_hex_color("#12"), None);
    }
}
