// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Per-tile reconstruction driver and the frame-level tile scheduler.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::features::blending::do_blending;
use crate::features::noise::add_noise;
use crate::filters::{apply_filters, INV_SIGMA_NUM};
use crate::headers::{ColorTransform, Encoding, FrameDimensions};
use crate::image::{copy_image_rect, Image3, ImageBundle, Rect};
use crate::parallel::{DisjointMut, ParallelRunner};
use crate::render::padding::ensure_padding;
use crate::render::{DecoderState, GroupScratch};
use crate::util::round_up_to;
use crate::{APPLY_IMAGE_FEATURES_TILE_DIM, BLOCK_DIM, GROUP_DIM};

/// Runs the loop filter (or a plain copy) for one tile and overlays patches
/// and splines, leaving the feature-applied pixels in `storage_for_if` at
/// `rect_for_if_storage`.
#[allow(clippy::too_many_arguments)]
fn apply_image_features(
    dec_state: &DecoderState,
    input_image: &Image3,
    rect_for_if_input: Rect,
    rect_for_if: Rect,
    rect_for_if_storage: Rect,
    filter_input_storage: &mut Image3,
    filter_storage: &mut [Image3; 2],
    storage_for_if: &mut Image3,
) -> Result<()> {
    let rf = &dec_state.frame_header.restoration_filter;
    if rf.epf_iters == 0 && !rf.gab {
        copy_image_rect(
            input_image,
            rect_for_if_input,
            storage_for_if,
            rect_for_if_storage,
        );
    } else {
        let lf_padding = rf.padding();
        // If `rect_for_if_input` does not start at a multiple of BLOCK_DIM,
        // we extend the rect we run the filters on by one full block, to
        // ensure sigma is handled correctly. The output and image rects are
        // extended accordingly; two full blocks of border make room.
        let xborder = BLOCK_DIM + (rect_for_if.x0 % BLOCK_DIM);
        let (filter_input, filter_input_rect) = ensure_padding(
            input_image,
            rect_for_if_input,
            filter_input_storage,
            lf_padding,
            lf_padding,
            xborder,
        );
        let xextra = filter_input_rect.x0 % BLOCK_DIM;
        let filter_input_padded_rect = Rect::new(
            filter_input_rect.x0 - xextra,
            filter_input_rect.y0,
            filter_input_rect.xsize + xextra,
            filter_input_rect.ysize,
        );
        let image_padded_rect = Rect::new(
            rect_for_if.x0 - xextra,
            rect_for_if.y0,
            rect_for_if.xsize + xextra,
            rect_for_if.ysize,
        );
        let filter_output_padded_rect = Rect::new(
            rect_for_if_storage.x0 - xextra,
            rect_for_if_storage.y0,
            rect_for_if_storage.xsize + xextra,
            rect_for_if_storage.ysize,
        );
        apply_filters(
            rf,
            &dec_state.filter_weights,
            filter_input,
            filter_input_padded_rect,
            image_padded_rect,
            filter_storage,
            storage_for_if,
            filter_output_padded_rect,
        );
    }

    dec_state
        .features
        .patches
        .add_to(storage_for_if, rect_for_if_storage, rect_for_if);
    dec_state.features.splines.add_to(
        storage_for_if,
        rect_for_if_storage,
        rect_for_if,
        &dec_state.cmap,
    )?;
    Ok(())
}

/// Finalizes one tile: loop filter, image features, upsampling, noise, the
/// pre-color-transform snapshot and the color transform.
///
/// Contract: `input_rect.size() == output_rect.size()`, `output_rect.x0` is
/// a multiple of [`BLOCK_DIM`], and `output_rect.xsize` is too except where
/// the tile abuts the frame edge. When the tile does not sit on an image
/// border, `input_image:input_rect` must have enough border available for
/// every enabled stage.
#[allow(clippy::too_many_arguments)]
pub fn finalize_image_rect(
    input_image: &Image3,
    input_rect: Rect,
    dec_state: &DecoderState,
    scratch: &mut GroupScratch,
    output_color: &mut Image3,
    output_rect: Rect,
    mut pre_color_transform: Option<&mut Image3>,
) -> Result<()> {
    let frame_header = &dec_state.frame_header;
    let frame_dim = &dec_state.frame_dim;
    let upsampling = frame_header.upsampling as usize;
    debug_assert!(output_rect.xsize <= GROUP_DIM);
    debug_assert!(output_rect.ysize <= GROUP_DIM);
    debug_assert_eq!(input_rect.size(), output_rect.size());
    debug_assert_eq!(output_rect.x0 % BLOCK_DIM, 0);
    debug_assert!(
        output_rect.xsize % BLOCK_DIM == 0 || output_rect.x1() == frame_dim.xsize
    );

    let GroupScratch {
        filter_input_storage,
        upsampling_input_storage,
        filter_storage,
    } = scratch;

    // This function operates in multiple steps:
    // - Apply EPF and/or gaborish. This requires padding, and thus consumes
    //   a larger rect than it produces.
    // - Apply patches and splines. This operates in-place.
    // - Apply upsampling. This does *not* operate in-place and requires 2
    //   pixels of padding.
    // - Apply noise and color transforms. These operate in-place.

    let mut rect_for_if = output_rect;
    let mut rect_for_if_storage = output_rect;
    let mut rect_for_upsampling = output_rect;
    let mut rect_for_if_input = input_rect;

    if upsampling != 1 {
        // The upsampler needs 2 more pixels of border around the rect, so
        // patches and splines are applied to those pixels too; compute the
        // portion of image each of the intermediate rects covers.
        let mut ifbx0 = 0;
        let mut ifbx1 = 0;
        let mut ifby0 = 0;
        let mut ifby1 = 0;
        if output_rect.x0 >= 2 {
            debug_assert!(input_rect.x0 >= 2);
            ifbx0 = 2;
        }
        if output_rect.y0 >= 2 {
            debug_assert!(input_rect.y0 >= 2);
            ifby0 = 2;
        }
        if output_rect.x1() + 2 <= frame_dim.xsize_padded {
            debug_assert!(input_rect.x1() + 2 <= input_image.xsize());
            ifbx1 = 2;
        }
        if output_rect.y1() + 2 <= frame_dim.ysize_padded {
            debug_assert!(input_rect.y1() + 2 <= input_image.ysize());
            ifby1 = 2;
        }
        rect_for_if = Rect::new(
            output_rect.x0 - ifbx0,
            output_rect.y0 - ifby0,
            output_rect.xsize + ifbx0 + ifbx1,
            output_rect.ysize + ifby0 + ifby1,
        );
        // Storage for pixel data does not necessarily start at (0, 0): the
        // left border of the upsampling rect is kept aligned to a multiple
        // of BLOCK_DIM.
        rect_for_if_storage = Rect::new(
            round_up_to(ifbx0, BLOCK_DIM) - ifbx0,
            0,
            rect_for_if.xsize,
            rect_for_if.ysize,
        );
        rect_for_upsampling = Rect::new(
            round_up_to(ifbx0, BLOCK_DIM),
            ifby0,
            output_rect.xsize,
            output_rect.ysize,
        );
        rect_for_if_input = Rect::new(
            input_rect.x0 - ifbx0,
            input_rect.y0 - ifby0,
            rect_for_if_storage.xsize,
            rect_for_if_storage.ysize,
        );
        // Ensures that the image will be mirror-padded at its data edge if
        // needed.
        upsampling_input_storage.shrink_to(rect_for_if_storage.x1(), rect_for_if_storage.y1());
    }

    let mut upsampled_output_rect = output_rect;
    if upsampling != 1 {
        apply_image_features(
            dec_state,
            input_image,
            rect_for_if_input,
            rect_for_if,
            rect_for_if_storage,
            filter_input_storage,
            filter_storage,
            upsampling_input_storage,
        )?;
        // `filter_input_storage` is reused as mirror-pad scratch here; the
        // feature-applied pixels live in `upsampling_input_storage`, so the
        // buffer is no longer live. The disjoint borrows above enforce that
        // the two storages differ.
        let (upsampling_input, upsampling_input_rect) = ensure_padding(
            &*upsampling_input_storage,
            rect_for_upsampling,
            filter_input_storage,
            2,
            2,
            BLOCK_DIM,
        );
        upsampled_output_rect = output_rect.upsample(upsampling);
        dec_state.upsampler.upsample_rect(
            upsampling_input,
            upsampling_input_rect,
            output_color,
            upsampled_output_rect,
        );
    } else {
        apply_image_features(
            dec_state,
            input_image,
            rect_for_if_input,
            rect_for_if,
            rect_for_if_storage,
            filter_input_storage,
            filter_storage,
            output_color,
        )?;
    }
    // The image data is now unconditionally in
    // `output_color:upsampled_output_rect`.

    if frame_header.has_noise() {
        if let Some(noise) = &dec_state.noise {
            add_noise(
                &dec_state.features.noise_params,
                upsampled_output_rect,
                noise,
                &dec_state.cmap,
                output_color,
            );
        }
    }

    if let Some(pre_frame) = pre_color_transform.as_deref_mut() {
        let pre_rect = upsampled_output_rect.crop(pre_frame.size());
        for c in 0..3 {
            for y in 0..pre_rect.ysize {
                let row_in = pre_rect.row(output_color.plane(c), y);
                pre_rect
                    .row_mut(pre_frame.plane_mut(c), y)
                    .copy_from_slice(row_in);
            }
        }
    }

    // The color transform is skipped entirely when the frame is saved
    // before it.
    if frame_header.needs_color_transform() {
        match frame_header.color_transform {
            ColorTransform::Xyb => dec_state.xyb_transform.undo_xyb(
                output_color,
                upsampled_output_rect,
                &dec_state.opsin_params,
                dec_state.output_encoding,
            )?,
            ColorTransform::YCbCr => {
                crate::color::ycbcr_to_rgb(output_color, upsampled_output_rect)
            }
            ColorTransform::None => {}
        }
    }

    Ok(())
}

/// Tiles covering the seams between groups: the only pixels that need
/// reprocessing when the per-group decode already finalized group interiors.
pub(crate) fn seam_rects(frame_dim: &FrameDimensions, padx: usize, pady: usize) -> Vec<Rect> {
    let xsize = frame_dim.xsize_padded;
    let ysize = frame_dim.ysize_padded;
    let mut rects = Vec::new();
    // For every gap between groups, vertically, enqueue the bottom gap
    // together with the next group...
    for ygroup in 0..frame_dim.ysize_groups.saturating_sub(1) {
        let gystart = ygroup * GROUP_DIM;
        let gyend = ysize.min(GROUP_DIM * (ygroup + 1));
        // Group is processed together with another group.
        if gyend <= gystart + BLOCK_DIM {
            continue;
        }
        let mut xstart = 0;
        while xstart < xsize {
            rects.push(Rect::clamped(
                xstart,
                gyend - pady,
                APPLY_IMAGE_FEATURES_TILE_DIM,
                2 * pady,
                xsize,
                ysize,
            ));
            xstart += APPLY_IMAGE_FEATURES_TILE_DIM;
        }
    }
    // ... and for every gap between groups, horizontally, enqueue the right
    // gap with the next group, carefully avoiding overlaps with the
    // horizontal gaps enqueued before.
    for xgroup in 0..frame_dim.xsize_groups.saturating_sub(1) {
        let gxstart = if xgroup == 0 {
            BLOCK_DIM
        } else {
            xgroup * GROUP_DIM
        };
        let gxend = xsize.min(GROUP_DIM * (xgroup + 1));
        // Group is processed together with another group.
        if gxend <= gxstart + BLOCK_DIM {
            continue;
        }
        for ygroup in 0..frame_dim.ysize_groups {
            let gystart = if ygroup == 0 {
                0
            } else {
                ygroup * GROUP_DIM + pady
            };
            let gyend = if ygroup == frame_dim.ysize_groups - 1 {
                ysize
            } else {
                GROUP_DIM * (ygroup + 1) - pady
            };
            if gyend <= gystart {
                continue;
            }
            let mut ystart = gystart;
            while ystart < gyend {
                rects.push(Rect::clamped(
                    gxend - padx,
                    ystart,
                    2 * padx,
                    APPLY_IMAGE_FEATURES_TILE_DIM,
                    xsize,
                    gyend,
                ));
                ystart += APPLY_IMAGE_FEATURES_TILE_DIM;
            }
        }
    }
    rects
}

/// Group-sized tiles covering the frame, clamped to the unpadded size.
pub(crate) fn group_rects(size: (usize, usize), frame_dim: &FrameDimensions) -> Vec<Rect> {
    let mut rects = Vec::new();
    let mut y = 0;
    while y < size.1 {
        let mut x = 0;
        while x < size.0 {
            let rect = Rect::clamped(x, y, GROUP_DIM, GROUP_DIM, frame_dim.xsize, frame_dim.ysize);
            if !rect.is_empty() {
                rects.push(rect);
            }
            x += GROUP_DIM;
        }
        y += GROUP_DIM;
    }
    rects
}

/// Plans the set of tiles for this frame, upsamples subsampled chroma, runs
/// the per-tile driver in parallel and finalizes the output extents.
///
/// `rerender` forces reprocessing of every tile, bypassing the seams-only
/// optimization; `skip_blending` leaves the blending step to the caller.
#[allow(unsafe_code)]
pub fn finalize_frame_decoding<P: ParallelRunner>(
    decoded: &mut ImageBundle,
    dec_state: &mut DecoderState,
    pool: &P,
    rerender: bool,
    skip_blending: bool,
) -> Result<()> {
    let mut rects_to_process: Vec<Rect> = Vec::new();
    let frame_dim = dec_state.frame_dim;
    let is_444 = dec_state.frame_header.chroma_subsampling.is_444();

    if dec_state.finalize_rect_padding() != 0
        && is_444
        && dec_state.frame_header.encoding != Encoding::Modular
        && !rerender
    {
        let pady = dec_state.finalize_rect_padding();
        let padx = round_up_to(pady, BLOCK_DIM);
        rects_to_process.extend(seam_rects(&frame_dim, padx, pady));
    }

    // If chroma subsampling was used, upsample chroma now and reprocess the
    // whole frame after.
    if !is_444 {
        for c in 0..3 {
            let hshift = dec_state.frame_header.chroma_subsampling.hshift(c);
            let vshift = dec_state.frame_header.chroma_subsampling.vshift(c);
            // The plane upsampler assumes the padded dimensions stay whole
            // after subsampling.
            debug_assert_eq!(frame_dim.xsize_padded % (1 << hshift), 0);
            debug_assert_eq!(frame_dim.ysize_padded % (1 << vshift), 0);
            dec_state.decoded.plane_mut(c).shrink_to(
                frame_dim.xsize_padded >> hshift,
                frame_dim.ysize_padded >> vshift,
            );
            for _ in 0..hshift {
                dec_state.decoded.plane_mut(c).init_padding();
                let upsampled = super::upsample::upsample_h2(dec_state.decoded.plane(c))?;
                dec_state.decoded.replace_plane(c, upsampled);
            }
            for _ in 0..vshift {
                dec_state.decoded.plane_mut(c).init_padding();
                let upsampled = super::upsample::upsample_v2(dec_state.decoded.plane(c))?;
                dec_state.decoded.replace_plane(c, upsampled);
            }
            debug_assert_eq!(
                dec_state.decoded.plane(c).size(),
                (frame_dim.xsize_padded, frame_dim.ysize_padded)
            );
        }
    }

    // Image features were not applied to any pixel yet.
    if dec_state.frame_header.encoding == Encoding::Modular || !is_444 || rerender {
        let rf = &dec_state.frame_header.restoration_filter;
        if rf.epf_iters > 0 && dec_state.frame_header.encoding == Encoding::Modular {
            let sigma = INV_SIGMA_NUM / rf.epf_sigma_for_modular;
            dec_state.filter_weights.fill_sigma(sigma);
        }
        rects_to_process.extend(group_rects(decoded.color().size(), &frame_dim));
    }

    tracing::debug!(tiles = rects_to_process.len(), "finalizing frame");

    let failed = AtomicBool::new(false);
    let mut pre_color_transform = dec_state.pre_color_transform_frame.take();
    {
        let pre_cell = pre_color_transform.as_mut().map(DisjointMut::new);
        let color_cell = DisjointMut::new(decoded.color_mut());
        let dec_state_ref: &DecoderState = dec_state;
        let rects = &rects_to_process;
        pool.run(
            0,
            rects.len(),
            |num_threads| (0..num_threads).map(|_| GroupScratch::new()).collect(),
            |index, scratch: &mut GroupScratch| {
                let rect = rects[index];
                // SAFETY: output rectangles produced by the planning above
                // are pairwise disjoint, and each task writes the output and
                // snapshot images only inside its own (upsampled) rectangle.
                let color = unsafe { color_cell.get() };
                let pre = pre_cell.as_ref().map(|cell| unsafe { cell.get() });
                if finalize_image_rect(
                    &dec_state_ref.decoded,
                    rect,
                    dec_state_ref,
                    scratch,
                    color,
                    rect,
                    pre,
                )
                .is_err()
                {
                    failed.store(true, Ordering::Relaxed);
                }
            },
        )?;
    }
    dec_state.pre_color_transform_frame = pre_color_transform;

    if failed.load(Ordering::Relaxed) {
        return Err(Error::FinalizeRectFailed);
    }

    let xsize = frame_dim.xsize_upsampled;
    let ysize = frame_dim.ysize_upsampled;
    decoded.color_mut().shrink_to(xsize, ysize);
    if let Some(pre_frame) = &mut dec_state.pre_color_transform_frame {
        pre_frame.shrink_to(xsize, ysize);
    }

    if !skip_blending {
        do_blending(dec_state, decoded)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;

    fn assert_disjoint(rects: &[Rect]) {
        for (i, a) in rects.iter().enumerate() {
            for b in rects.iter().skip(i + 1) {
                let overlap = a.x0 < b.x1() && b.x0 < a.x1() && a.y0 < b.y1() && b.y0 < a.y1();
                assert!(!overlap, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn seam_rects_for_two_by_two_groups() {
        // 512x512 with padding 3: one horizontal and one vertical seam.
        let frame_dim = FrameDimensions::new(512, 512, 1);
        let rects = seam_rects(&frame_dim, round_up_to(3, BLOCK_DIM), 3);
        let horizontal: Vec<_> = rects.iter().filter(|r| r.ysize == 6).collect();
        let vertical: Vec<_> = rects.iter().filter(|r| r.ysize != 6).collect();
        assert_eq!(horizontal.len(), 8);
        for (i, rect) in horizontal.iter().enumerate() {
            assert_eq!(**rect, Rect::new(i * 64, 253, 64, 6));
        }
        // Two runs of four tiles each, skipping the rows the horizontal
        // seam already covers; the last tile of each run is clipped.
        assert_eq!(vertical.len(), 8);
        for rect in &vertical {
            assert_eq!(rect.x0, 248);
            assert_eq!(rect.xsize, 16);
        }
        assert_eq!(vertical[0].y0, 0);
        assert_eq!(vertical[3].y0, 192);
        assert_eq!(vertical[3].ysize, 61);
        assert_eq!(vertical[4].y0, 259);
        assert_eq!(vertical[7].y0, 451);
        assert_eq!(vertical[7].ysize, 61);
        assert_disjoint(&rects);
    }

    #[test]
    fn seam_rects_for_three_group_columns() {
        // 513 pixels pad to 520: three group columns, two vertical seams,
        // no horizontal seam. The rightmost seam strip still fits the frame.
        let frame_dim = FrameDimensions::new(513, 128, 1);
        let rects = seam_rects(&frame_dim, 8, 3);
        assert_eq!(rects.len(), 4);
        assert_eq!(rects[0], Rect::new(248, 0, 16, 64));
        assert_eq!(rects[1], Rect::new(248, 64, 16, 64));
        assert_eq!(rects[2], Rect::new(504, 0, 16, 64));
        assert_eq!(rects[3], Rect::new(504, 64, 16, 64));
        assert_disjoint(&rects);
    }

    #[test]
    fn group_rects_tile_the_frame() {
        let frame_dim = FrameDimensions::new(384, 320, 1);
        let rects = group_rects((384, 320), &frame_dim);
        assert_eq!(rects.len(), 4);
        assert_disjoint(&rects);
        let area: usize = rects.iter().map(|r| r.xsize * r.ysize).sum();
        assert_eq!(area, 384 * 320);
    }

    #[test]
    fn group_rects_cover_ragged_sizes() {
        // Tiling completeness: every pixel is covered exactly once.
        let frame_dim = FrameDimensions::new(513, 260, 1);
        let rects = group_rects((520, 264), &frame_dim);
        assert_disjoint(&rects);
        let mut covered = vec![vec![false; 513]; 260];
        for rect in &rects {
            for row in covered.iter_mut().take(rect.y1()).skip(rect.y0) {
                for cell in row.iter_mut().take(rect.x1()).skip(rect.x0) {
                    assert!(!*cell);
                    *cell = true;
                }
            }
        }
        assert!(covered.iter().all(|row| row.iter().all(|&c| c)));
    }
}
