// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::Result;
use crate::image::{ImageBundle, Rect};
use crate::render::DecoderState;

/// How the reconstructed frame combines with the saved reference frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlendingMode {
    /// The new frame replaces the reference; nothing to do at blend time.
    #[default]
    Replace,
    /// The new frame is added onto the reference.
    Add,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BlendingInfo {
    pub mode: BlendingMode,
}

/// Applies frame blending after all tiles completed. Runs on the displayed
/// extent only; callers skip it when compositing is done elsewhere.
pub fn do_blending(dec_state: &DecoderState, decoded: &mut ImageBundle) -> Result<()> {
    match dec_state.blending_info.mode {
        BlendingMode::Replace => Ok(()),
        BlendingMode::Add => {
            let Some(reference) = &dec_state.reference_frame else {
                return Ok(());
            };
            let color = decoded.color_mut();
            let rect = Rect::new(0, 0, color.xsize(), color.ysize()).crop(reference.size());
            for c in 0..3 {
                for y in 0..rect.ysize {
                    let row_ref = rect.row(reference.plane(c), y);
                    for (out, add) in rect
                        .row_mut(color.plane_mut(c), y)
                        .iter_mut()
                        .zip(row_ref.iter())
                    {
                        *out += add;
                    }
                }
            }
            Ok(())
        }
    }
}
