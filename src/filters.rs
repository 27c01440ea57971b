// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::Result;
use crate::headers::{FrameDimensions, RestorationFilter};
use crate::image::{Image3, Plane, Rect};
use crate::{BLOCK_DIM, SIGMA_PADDING};

pub mod epf;
pub mod gaborish;

#[allow(clippy::excessive_precision)]
pub const INV_SIGMA_NUM: f32 = -1.1715728752538099024;

/// Per-block EPF state: the inverse sigma map, one value per 8x8 block, with
/// [`SIGMA_PADDING`] blocks of border so filters may look slightly outside
/// the frame.
pub struct FilterWeights {
    pub sigma: Plane,
}

impl FilterWeights {
    pub fn new(frame_dim: &FrameDimensions) -> Result<FilterWeights> {
        let sigma = Plane::new((
            frame_dim.xsize_blocks + 2 * SIGMA_PADDING,
            frame_dim.ysize_blocks + 2 * SIGMA_PADDING,
        ))?;
        Ok(FilterWeights { sigma })
    }

    /// Single global sigma, used by the modular path.
    pub fn fill_sigma(&mut self, value: f32) {
        self.sigma.fill(value);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FilterStage {
    Epf0,
    Epf1,
    Epf2,
    Gaborish,
}

impl FilterStage {
    fn border(self) -> usize {
        match self {
            FilterStage::Epf0 => 3,
            FilterStage::Epf1 => 2,
            FilterStage::Epf2 => 1,
            FilterStage::Gaborish => 1,
        }
    }
}

fn stage_list(rf: &RestorationFilter) -> Vec<FilterStage> {
    let mut stages = Vec::new();
    if rf.epf_iters >= 3 {
        stages.push(FilterStage::Epf0);
    }
    if rf.epf_iters >= 1 {
        stages.push(FilterStage::Epf1);
    }
    if rf.epf_iters >= 2 {
        stages.push(FilterStage::Epf2);
    }
    if rf.gab {
        stages.push(FilterStage::Gaborish);
    }
    stages
}

/// Looks up the per-block inverse sigma for an absolute frame position.
/// Border pixels of edge tiles have slightly negative coordinates; the sigma
/// map's block padding absorbs them.
#[inline]
pub(crate) fn sigma_at(sigma: &Plane, image_x: isize, image_y: isize) -> f32 {
    let pad = (SIGMA_PADDING * BLOCK_DIM) as isize;
    let bx = (image_x + pad) as usize / BLOCK_DIM;
    let by = (image_y + pad) as usize / BLOCK_DIM;
    sigma.row(by)[bx]
}

/// Runs the enabled restoration filters over one padded tile.
///
/// `input_rect` is the region of `input` holding the pixels of `image_rect`
/// (absolute frame coordinates); `input` must provide `rf.padding()` valid
/// pixels around it. The chain ping-pongs between the two `scratch` images
/// and writes its final stage to `output_rect` of `output`.
pub fn apply_filters(
    rf: &RestorationFilter,
    weights: &FilterWeights,
    input: &Image3,
    input_rect: Rect,
    image_rect: Rect,
    scratch: &mut [Image3; 2],
    output: &mut Image3,
    output_rect: Rect,
) {
    debug_assert_eq!(input_rect.size(), image_rect.size());
    debug_assert_eq!(input_rect.size(), output_rect.size());
    let stages = stage_list(rf);
    assert!(!stages.is_empty());
    let total: usize = stages.iter().map(|s| s.border()).sum();
    debug_assert_eq!(total, rf.padding());

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Buffer {
        Input,
        ScratchA,
        ScratchB,
    }

    let [scratch_a, scratch_b] = scratch;
    // Position in the current source buffer of the pixel at `src_img_origin`
    // (absolute frame coordinates, possibly negative for grown regions).
    let mut src_buffer = Buffer::Input;
    let mut src_pos = (input_rect.x0, input_rect.y0);
    let mut src_img_origin = (image_rect.x0 as isize, image_rect.y0 as isize);
    let mut remaining = total;

    for (stage_index, stage) in stages.iter().enumerate() {
        let border = stage.border();
        remaining -= border;
        let out_img_origin = (
            image_rect.x0 as isize - remaining as isize,
            image_rect.y0 as isize - remaining as isize,
        );
        let out_size = (
            image_rect.xsize + 2 * remaining,
            image_rect.ysize + 2 * remaining,
        );
        let src_start = (
            (src_pos.0 as isize + (out_img_origin.0 - src_img_origin.0)) as usize,
            (src_pos.1 as isize + (out_img_origin.1 - src_img_origin.1)) as usize,
        );
        debug_assert!(src_start.0 >= border && src_start.1 >= border);

        let last = stage_index + 1 == stages.len();
        let dst_buffer = if last {
            debug_assert_eq!(remaining, 0);
            None
        } else if src_buffer == Buffer::ScratchA {
            Some(Buffer::ScratchB)
        } else {
            Some(Buffer::ScratchA)
        };
        let dst_start = match dst_buffer {
            None => (output_rect.x0, output_rect.y0),
            Some(_) => (BLOCK_DIM, BLOCK_DIM),
        };

        {
            let (src_ref, dst_ref): (&Image3, &mut Image3) = match (src_buffer, dst_buffer) {
                (Buffer::Input, None) => (input, &mut *output),
                (Buffer::Input, Some(Buffer::ScratchA)) => (input, &mut *scratch_a),
                (Buffer::ScratchA, None) => (&*scratch_a, &mut *output),
                (Buffer::ScratchA, Some(Buffer::ScratchB)) => (&*scratch_a, &mut *scratch_b),
                (Buffer::ScratchB, None) => (&*scratch_b, &mut *output),
                (Buffer::ScratchB, Some(Buffer::ScratchA)) => (&*scratch_b, &mut *scratch_a),
                _ => unreachable!("filter chain never writes its own input"),
            };
            match stage {
                FilterStage::Epf0 => epf::epf0(
                    rf,
                    &weights.sigma,
                    src_ref,
                    src_start,
                    dst_ref,
                    dst_start,
                    out_size,
                    out_img_origin,
                ),
                FilterStage::Epf1 => epf::epf1(
                    rf,
                    &weights.sigma,
                    src_ref,
                    src_start,
                    dst_ref,
                    dst_start,
                    out_size,
                    out_img_origin,
                ),
                FilterStage::Epf2 => epf::epf2(
                    rf,
                    &weights.sigma,
                    src_ref,
                    src_start,
                    dst_ref,
                    dst_start,
                    out_size,
                    out_img_origin,
                ),
                FilterStage::Gaborish => {
                    gaborish::gaborish(rf, src_ref, src_start, dst_ref, dst_start, out_size)
                }
            }
        }

        if let Some(buffer) = dst_buffer {
            src_buffer = buffer;
            src_pos = (BLOCK_DIM, BLOCK_DIM);
            src_img_origin = out_img_origin;
        }
    }
}
