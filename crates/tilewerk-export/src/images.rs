// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster file output: one file per tile, or a single composite.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use tilewerk_core::error::{Result, TilewerkError};
use tilewerk_core::types::ImageFormat;
use tilewerk_render::{LabelFont, PageRaster};
use tracing::{debug, info};

/// Base name used when the output path is a directory.
const DEFAULT_BASE: &str = "tile";

/// Writes page rasters as image files.
#[derive(Debug, Clone)]
pub struct TileImageWriter {
    format: ImageFormat,
    jpeg_quality: u8,
    dir: PathBuf,
    base: String,
    font: Option<LabelFont>,
}

impl TileImageWriter {
    /// `output` is either an existing directory (files are named
    /// `tile_page_NNN`) or a path whose stem becomes the base name.
    pub fn new(output: &Path, format: ImageFormat, jpeg_quality: u8, font: Option<LabelFont>) -> Self {
        let (dir, base) = if output.is_dir() {
            (output.to_path_buf(), DEFAULT_BASE.to_string())
        } else {
            let dir = output
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let base = output
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| DEFAULT_BASE.to_string());
            (dir, base)
        };
        Self {
            format,
            jpeg_quality: jpeg_quality.clamp(1, 100),
            dir,
            base,
            font,
        }
    }

    /// `<dir>/<base>_page_<NNN>.<ext>` for the zero-based `index`.
    pub fn tile_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!(
            "{}_page_{:03}.{}",
            self.base,
            index + 1,
            self.format.extension()
        ))
    }

    /// Create the output directory.
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Write tile `index`, returning the file written.
    pub fn write_tile(&self, index: usize, raster: &PageRaster) -> Result<PathBuf> {
        let path = self.tile_path(index);
        self.write_raster(raster, &path)?;
        debug!(index, path = %path.display(), "tile image written");
        Ok(path)
    }

    /// Write a raster to an explicit path, labels burned in when a font is
    /// available.
    pub fn write_raster(&self, raster: &PageRaster, path: &Path) -> Result<()> {
        let flattened = raster.flatten(self.font.as_ref());
        encode(&flattened, path, self.format, self.jpeg_quality)
    }
}

/// Encode an image in `format`.  JPEG drops alpha and uses `quality`.
pub fn encode(image: &RgbaImage, path: &Path, format: ImageFormat, quality: u8) -> Result<()> {
    let dynamic = DynamicImage::ImageRgba8(image.clone());
    let map_err = |e: image::ImageError| TilewerkError::ImageError(format!("{}: {e}", path.display()));
    match format {
        ImageFormat::Jpeg => {
            let file = BufWriter::new(File::create(path)?);
            let encoder = JpegEncoder::new_with_quality(file, quality);
            DynamicImage::ImageRgb8(dynamic.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(map_err)?;
        }
        ImageFormat::Png => dynamic
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(map_err)?,
        ImageFormat::Tiff => dynamic
            .save_with_format(path, image::ImageFormat::Tiff)
            .map_err(map_err)?,
        ImageFormat::Bmp => dynamic
            .save_with_format(path, image::ImageFormat::Bmp)
            .map_err(map_err)?,
    }
    info!(path = %path.display(), ?format, "wrote image");
    Ok(())
}
