// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: decoding and encoding at the pipeline boundary, plus shared
// resampling helpers.

pub mod io;
pub mod sampling;

pub use io::{decode_image, encode_image, load_image, save_image};
