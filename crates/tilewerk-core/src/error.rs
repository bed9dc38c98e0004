// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Tilewerk.

use thiserror::Error;

/// Top-level error type for all Tilewerk operations.
///
/// Soft layout problems (gutter too large, too many tiles) are not errors;
/// they surface as an empty page grid carrying a notice.
#[derive(Debug, Error)]
pub enum TilewerkError {
    // -- Calibration / layout --
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("page grid is empty: {0}")]
    EmptyGrid(String),

    #[error("no document loaded")]
    NoDocument,

    // -- Rendering / encoding --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("font loading failed: {0}")]
    Font(String),

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    // -- Output devices --
    #[error("output device error: {0}")]
    Device(String),

    #[error("an export is already running")]
    ExportInProgress,

    #[error("a print job is already in progress")]
    PrintInProgress,

    #[error("export cancelled")]
    Cancelled,

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TilewerkError>;
