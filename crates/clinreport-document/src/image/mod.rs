// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: bounded decoding, resizing and alpha preparation for the
// watermark, and the results chart raster.

pub mod chart;
pub mod processor;

pub use processor::ImageProcessor;
