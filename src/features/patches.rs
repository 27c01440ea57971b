// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::{Error, Result};
use crate::image::{Image3, Rect};

pub const MAX_NUM_REFERENCE_FRAMES: usize = 4;

/// Source window of a patch inside one of the reference bitmaps.
#[derive(Debug, Clone, Copy)]
pub struct PatchReferencePosition {
    pub reference: usize,
    pub x0: usize,
    pub y0: usize,
    pub xsize: usize,
    pub ysize: usize,
}

/// One placement of a reference window in the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchPosition {
    pub x: usize,
    pub y: usize,
    pub ref_pos_idx: usize,
}

/// Decoded patch dictionary. Overlaying adds the reference pixels onto the
/// frame; placements outside the processed tile are clipped.
#[derive(Debug, Default)]
pub struct PatchesDictionary {
    reference_frames: [Option<Image3>; MAX_NUM_REFERENCE_FRAMES],
    positions: Vec<PatchPosition>,
    ref_positions: Vec<PatchReferencePosition>,
}

impl PatchesDictionary {
    pub fn new(
        reference_frames: [Option<Image3>; MAX_NUM_REFERENCE_FRAMES],
        ref_positions: Vec<PatchReferencePosition>,
        positions: Vec<PatchPosition>,
    ) -> Result<PatchesDictionary> {
        for ref_pos in &ref_positions {
            let frame = reference_frames[ref_pos.reference]
                .as_ref()
                .ok_or(Error::PatchOutOfBounds(
                    ref_pos.xsize,
                    ref_pos.ysize,
                    ref_pos.x0,
                    ref_pos.y0,
                ))?;
            let window = Rect::new(ref_pos.x0, ref_pos.y0, ref_pos.xsize, ref_pos.ysize);
            if !window.is_within(frame.size()) {
                return Err(Error::PatchOutOfBounds(
                    ref_pos.xsize,
                    ref_pos.ysize,
                    ref_pos.x0,
                    ref_pos.y0,
                ));
            }
        }
        Ok(PatchesDictionary {
            reference_frames,
            positions,
            ref_positions,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Adds every patch intersecting `image_rect` onto `opsin`, whose
    /// `opsin_rect` holds the pixels of `image_rect` (frame coordinates).
    pub fn add_to(&self, opsin: &mut Image3, opsin_rect: Rect, image_rect: Rect) {
        debug_assert_eq!(opsin_rect.size(), image_rect.size());
        for pos in &self.positions {
            let ref_pos = &self.ref_positions[pos.ref_pos_idx];
            let patch = Rect::new(pos.x, pos.y, ref_pos.xsize, ref_pos.ysize);
            // Intersection of the patch with the tile, in frame coordinates.
            let x0 = patch.x0.max(image_rect.x0);
            let y0 = patch.y0.max(image_rect.y0);
            let x1 = patch.x1().min(image_rect.x1());
            let y1 = patch.y1().min(image_rect.y1());
            if x0 >= x1 || y0 >= y1 {
                continue;
            }
            let reference = self.reference_frames[ref_pos.reference]
                .as_ref()
                .expect("validated at construction");
            for c in 0..3 {
                for y in y0..y1 {
                    let row_ref =
                        reference.plane(c).row(ref_pos.y0 + y - patch.y0);
                    let row_out = opsin
                        .plane_mut(c)
                        .row_mut(opsin_rect.y0 + y - image_rect.y0);
                    for x in x0..x1 {
                        row_out[opsin_rect.x0 + x - image_rect.x0] +=
                            row_ref[ref_pos.x0 + x - patch.x0];
                    }
                }
            }
        }
    }
}
