// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label font loading and text metrics.

use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use tilewerk_core::config::TilerConfig;
use tilewerk_core::error::{Result, TilewerkError};
use tracing::{debug, info, warn};

/// Points to millimetres.
pub const MM_PER_PT: f64 = 0.3528;

/// Common system locations searched when no font is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Font used to burn labels into raster outputs.
#[derive(Clone)]
pub struct LabelFont {
    font: FontArc,
    source: PathBuf,
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelFont")
            .field("source", &self.source)
            .finish()
    }
}

impl LabelFont {
    /// Load a TrueType/OpenType font file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let font = FontArc::try_from_vec(data)
            .map_err(|e| TilewerkError::Font(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "label font loaded");
        Ok(Self {
            font,
            source: path.to_path_buf(),
        })
    }

    /// First loadable font from the common system locations.
    pub fn discover() -> Option<Self> {
        SYSTEM_FONT_CANDIDATES
            .iter()
            .map(Path::new)
            .filter(|p| p.is_file())
            .find_map(|p| Self::load(p).ok())
    }

    /// Configured font, else a discovered one.  Logs when neither is usable;
    /// raster labels are then skipped.
    pub fn from_config(config: &TilerConfig) -> Option<Self> {
        if let Some(path) = &config.label_font_path {
            match Self::load(path) {
                Ok(font) => return Some(font),
                Err(e) => warn!(path = %path.display(), error = %e, "configured label font unusable"),
            }
        }
        match Self::discover() {
            Some(font) => {
                info!(path = %font.source.display(), "using system label font");
                Some(font)
            }
            None => {
                warn!("no label font found; raster outputs will omit text labels");
                None
            }
        }
    }

    pub fn font(&self) -> &FontArc {
        &self.font
    }
}

/// Layout width estimate for a label.
///
/// Deterministic and font-independent, so placement is identical whether the
/// text is burned into pixels or written as PDF text.
pub fn approx_text_width(text: &str, size_px: f32, bold: bool) -> f32 {
    let per_char = if bold { 0.55 } else { 0.5 };
    text.chars().count() as f32 * size_px * per_char
}

/// Convert a point size to pixels at the given mm-per-pixel resolution.
pub fn pt_to_px(pt: f64, mm_per_px: f64) -> f32 {
    (pt * MM_PER_PT / mm_per_px) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_text_is_wider() {
        let regular = approx_text_width("P12", 20.0, false);
        let bold = approx_text_width("P12", 20.0, true);
        assert_eq!(regular, 30.0);
        assert!(bold > regular);
    }

    #[test]
    fn twelve_point_at_tenth_mm() {
        let px = pt_to_px(12.0, 0.1);
        assert!((px - 42.336).abs() < 1e-3);
    }

    #[test]
    fn missing_font_file_is_an_error() {
        assert!(LabelFont::load("/nonexistent/font.ttf").is_err());
    }

    #[test]
    fn garbage_font_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.ttf");
        std::fs::write(&path, b"not a font").expect("write");
        assert!(matches!(LabelFont::load(&path), Err(TilewerkError::Font(_))));
    }
}
