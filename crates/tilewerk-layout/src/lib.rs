// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tilewerk Layout: turns a calibrated document into an ordered grid of
// overlapping pages.  Everything here is pure geometry over immutable
// inputs; no I/O and no shared state.

pub mod grid;
pub mod orientation;
pub mod scale;

pub use grid::{GridNotice, GridRequest, GridSummary, PageDescriptor, PageGrid, PageGridCalculator};
pub use orientation::choose_orientation;
pub use scale::{ScaleCalibration, ScaleFactor, ScaleResolver};
