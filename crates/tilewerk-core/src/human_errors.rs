// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages.
//
// Every technical error is mapped to plain English with a clear suggestion.
// Severity drives how the CLI (or any other front end) presents the failure.

use crate::error::TilewerkError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Try again; nothing about the input needs to change.
    Transient,
    /// The user must change something (calibrate, pick another path).
    ActionRequired,
    /// Retrying with the same input will fail again.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    pub severity: Severity,
}

impl HumanError {
    fn new(message: impl Into<String>, suggestion: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            severity,
        }
    }
}

impl std::fmt::Display for HumanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.message, self.suggestion)
    }
}

/// Convert a `TilewerkError` into a `HumanError`.
pub fn humanize_error(err: &TilewerkError) -> HumanError {
    match err {
        // -- Layout --
        TilewerkError::InvalidCalibration(detail) => HumanError::new(
            "The calibration measurement isn't usable.",
            format!("Pick two distinct points on the drawing and enter a real distance greater than zero. ({detail})"),
            Severity::ActionRequired,
        ),

        TilewerkError::EmptyGrid(detail) => HumanError::new(
            "No pages could be laid out for this drawing.",
            format!("Check the scale, paper size and gutter width. ({detail})"),
            Severity::ActionRequired,
        ),

        TilewerkError::NoDocument => HumanError::new(
            "No drawing is loaded.",
            "Open a drawing before exporting or printing.",
            Severity::ActionRequired,
        ),

        // -- Rendering --
        TilewerkError::ImageError(_) => HumanError::new(
            "There's a problem with this image.",
            "The image may be damaged or in an unusual format. Try saving it as PNG first.",
            Severity::Permanent,
        ),

        TilewerkError::PdfError(detail) => HumanError::new(
            "The PDF couldn't be written.",
            format!("Try a different output location. ({detail})"),
            Severity::Permanent,
        ),

        TilewerkError::Font(_) => HumanError::new(
            "No font was available for page labels.",
            "Set label_font_path in the configuration to a TrueType font file.",
            Severity::ActionRequired,
        ),

        TilewerkError::UnsupportedFormat(detail) => HumanError::new(
            "That output format isn't supported.",
            format!("Use pdf, png, jpg, tiff or bmp. (Requested: {detail})"),
            Severity::Permanent,
        ),

        // -- Export --
        TilewerkError::Device(detail) => HumanError::new(
            "The print device reported a problem.",
            format!("Check the device and try again. ({detail})"),
            Severity::Transient,
        ),

        TilewerkError::ExportInProgress => HumanError::new(
            "An export is already running.",
            "Wait for it to finish or cancel it first.",
            Severity::Transient,
        ),

        TilewerkError::PrintInProgress => HumanError::new(
            "A print job is already running.",
            "Wait for the current job to finish.",
            Severity::Transient,
        ),

        TilewerkError::Cancelled => HumanError::new(
            "The export was cancelled.",
            "Files written by the cancelled run were removed.",
            Severity::Transient,
        ),

        // -- Ambient --
        TilewerkError::Config(detail) => HumanError::new(
            "The configuration file has an invalid value.",
            format!("Fix the value or delete the file to use defaults. ({detail})"),
            Severity::ActionRequired,
        ),

        TilewerkError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError::new(
                "The file or folder couldn't be found.",
                "It may have been moved or deleted. Check the path and try again.",
                Severity::ActionRequired,
            ),
            std::io::ErrorKind::PermissionDenied => HumanError::new(
                "Tilewerk doesn't have permission to write there.",
                "Choose a different output folder.",
                Severity::ActionRequired,
            ),
            _ => HumanError::new(
                "There was a problem reading or writing a file.",
                "Try again. If this keeps happening, the disk may be full.",
                Severity::Transient,
            ),
        },

        TilewerkError::Serialization(_) => HumanError::new(
            "A settings file couldn't be read.",
            "The file may be damaged. Delete it to start from defaults.",
            Severity::Permanent,
        ),
    }
}
