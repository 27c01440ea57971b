// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

pub mod tf;
pub mod xyb;
pub mod ycbcr;

pub use xyb::{select_xyb_transform, OutputEncoding, XybTransform};
pub use ycbcr::ycbcr_to_rgb;
