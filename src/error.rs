// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::TryReserveError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
    #[error("Image size too large: {0}x{1}")]
    ImageSizeTooLarge(usize, usize),
    #[error("Invalid image size: {0}x{1}")]
    InvalidImageSize(usize, usize),
    #[error("Rect out of bounds: {0}x{1}+{2}+{3} rect in {4}x{5} view")]
    RectOutOfBounds(usize, usize, usize, usize, usize, usize),
    // Generic arithmetic overflow. Prefer using other errors if possible.
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
    #[error("Invalid upsampling factor: {0}")]
    InvalidUpsampling(u32),
    #[error("Invalid chroma subsampling shift: {0}")]
    InvalidChromaShift(u32),
    #[error("Invalid number of EPF iterations: {0}")]
    InvalidEpfIterations(u32),
    #[error("Invalid target encoding")]
    InvalidTargetEncoding,
    #[error("Spline sigma is not finite or zero: {0}")]
    InvalidSplineSigma(f32),
    #[error("Spline control point out of range: ({0}, {1})")]
    SplinePointOutOfRange(f32, f32),
    #[error("Too many spline segments: {0}, limit is {1}")]
    TooManySplineSegments(usize, usize),
    #[error("Patch is out of the reference frame: {0}x{1}+{2}+{3}")]
    PatchOutOfBounds(usize, usize, usize, usize),
    #[error("Tile finalization failed")]
    FinalizeRectFailed,
}

pub type Result<T> = std::result::Result<T, Error>;
