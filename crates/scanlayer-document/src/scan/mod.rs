// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Adaptive scan handling: enhancement of low-confidence pages and selection
// of the better recognition pass.

pub mod enhance;
pub mod select;
