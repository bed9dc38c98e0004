// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// tilewerk-render: Rasterisation of tile pages and the summary page.
//
// Pages are rendered into `PageRaster`s: an RGBA image plus the label text
// drawn on it.  Writers decide whether text is burned into pixels or emitted
// as PDF text.

pub mod canvas;
pub mod metadata;
pub mod overlay;
pub mod page;
pub mod text;

pub use canvas::{PageRaster, TextRun};
pub use metadata::{MetadataDocInfo, MetadataPageGenerator, PlanView, snap_scale_ratio};
pub use overlay::RegistrationMarks;
pub use page::{OverlayMode, PageRenderer};
pub use text::LabelFont;
