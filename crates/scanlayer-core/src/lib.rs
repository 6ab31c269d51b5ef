// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanlayer: core types, configuration, and error definitions shared across all crates.

pub mod confidence;
pub mod config;
pub mod error;
pub mod human_errors;
pub mod paths;
pub mod types;

pub use config::{BinarizationMode, PageErrorPolicy, ScanlayerConfig};
pub use error::{ErrorClass, ErrorKind, Result, ScanlayerError};
pub use types::*;
