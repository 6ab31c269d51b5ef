// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF input: loading (with decryption) and password removal.

mod crypt;
pub mod source;
pub mod unlock;

pub use source::SourceDocument;
pub use unlock::{unlock_bytes, unlock_file};
