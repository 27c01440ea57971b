// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

pub mod frame_header;
pub mod transform_data;

pub use frame_header::*;
pub use transform_data::*;
