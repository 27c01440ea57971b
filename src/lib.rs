// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![deny(unsafe_code)]

pub mod color;
pub mod error;
pub mod features;
pub mod filters;
pub mod headers;
pub mod image;
pub mod parallel;
pub mod render;
pub mod util;

const GROUP_DIM: usize = 256;
const BLOCK_DIM: usize = 8;
const SIGMA_PADDING: usize = 2;
const APPLY_IMAGE_FEATURES_TILE_DIM: usize = 64;
#[allow(clippy::excessive_precision)]
const MIN_SIGMA: f32 = -3.90524291751269967465540850526868;
