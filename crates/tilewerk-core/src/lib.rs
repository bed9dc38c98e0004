// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tilewerk: Core types, error definitions, and the configuration snapshot
// shared across all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod types;

pub use config::TilerConfig;
pub use error::TilewerkError;
pub use types::*;
