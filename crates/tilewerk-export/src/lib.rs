// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// tilewerk-export: Turns a calibrated document into files or printed pages.
//
// `ExportPipeline` drives one export job against a `DocumentContext`;
// `ExportTask` runs it on a blocking worker with cooperative cancellation;
// `DirectPrinter` sends the same pages to a `PageDevice`.

pub mod context;
pub mod images;
pub mod job;
pub mod pdf;
pub mod pipeline;
pub mod print;
pub mod task;

pub use context::DocumentContext;
pub use images::TileImageWriter;
pub use job::{ExportId, ExportJob, ExportTarget};
pub use pdf::TilePdfWriter;
pub use pipeline::{ExportOutcome, ExportPipeline, ExportReport, ProgressFn};
pub use print::{DirectPrinter, PageDevice, PrintGuard, RasterSpoolDevice};
pub use task::{CancellationToken, ExportSlot, ExportTask};
