// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The three passes of the edge-preserving filter. Weights are derived from
//! the per-block sigma map; sums of absolute differences between plus-shaped
//! patches decide how much each neighbor contributes.

use super::sigma_at;
use crate::headers::RestorationFilter;
use crate::image::{Image3, Plane};
use crate::{BLOCK_DIM, MIN_SIGMA};

/// SAD-weighted neighbor taps of pass 0: the 12 positions of a 5x5
/// plus-shaped neighborhood, minus the center.
const EPF0_TAPS: [(isize, isize); 12] = [
    (0, -2),
    (-1, -1),
    (0, -1),
    (1, -1),
    (-2, 0),
    (-1, 0),
    (1, 0),
    (2, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (0, 2),
];

/// Taps of pass 1: the 3x3 cross.
const EPF1_TAPS: [(isize, isize); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];

/// Patch shape compared around the center and around each tap.
const PLUS: [(isize, isize); 5] = [(0, -1), (-1, 0), (0, 0), (1, 0), (0, 1)];

#[inline]
fn sad_mul(sm: f32, bsm: f32, image_x: isize, image_y: isize) -> f32 {
    let bx = image_x.rem_euclid(BLOCK_DIM as isize) as usize;
    let by = image_y.rem_euclid(BLOCK_DIM as isize) as usize;
    if bx == 0 || bx == BLOCK_DIM - 1 || by == 0 || by == BLOCK_DIM - 1 {
        bsm
    } else {
        sm
    }
}

#[inline]
fn sample(src: &Image3, c: usize, pos: (usize, usize), dx: isize, dy: isize) -> f32 {
    let x = (pos.0 as isize + dx) as usize;
    let y = (pos.1 as isize + dy) as usize;
    src.plane(c).row(y)[x]
}

/// Shared body of passes 0 and 1, differing only in their tap set and sigma
/// scale.
#[allow(clippy::too_many_arguments)]
fn epf_sad_pass(
    taps: &[(isize, isize)],
    sigma_scale: f32,
    rf: &RestorationFilter,
    sigma: &Plane,
    src: &Image3,
    src_start: (usize, usize),
    dst: &mut Image3,
    dst_start: (usize, usize),
    size: (usize, usize),
    image_origin: (isize, isize),
) {
    let sm = sigma_scale * 1.65;
    let bsm = sm * rf.epf_border_sad_mul;
    let mut weights = vec![0.0f32; taps.len()];
    for y in 0..size.1 {
        let image_y = image_origin.1 + y as isize;
        for x in 0..size.0 {
            let image_x = image_origin.0 + x as isize;
            let pos = (src_start.0 + x, src_start.1 + y);
            let sigma_val = sigma_at(sigma, image_x, image_y);
            if sigma_val < MIN_SIGMA {
                for c in 0..3 {
                    dst.plane_mut(c).row_mut(dst_start.1 + y)[dst_start.0 + x] =
                        sample(src, c, pos, 0, 0);
                }
                continue;
            }
            let inv_sigma = sigma_val * sad_mul(sm, bsm, image_x, image_y);
            let mut total_weight = 1.0f32;
            for (tap, weight) in taps.iter().zip(weights.iter_mut()) {
                let mut sad = 0.0f32;
                for c in 0..3 {
                    let mut channel_sad = 0.0f32;
                    for off in PLUS {
                        let center = sample(src, c, pos, off.0, off.1);
                        let shifted = sample(src, c, pos, tap.0 + off.0, tap.1 + off.1);
                        channel_sad += (center - shifted).abs();
                    }
                    sad += channel_sad * rf.epf_channel_scale[c];
                }
                *weight = (sad * inv_sigma + 1.0).max(0.0);
                total_weight += *weight;
            }
            let inv_total = 1.0 / total_weight;
            for c in 0..3 {
                let mut out = sample(src, c, pos, 0, 0);
                for (tap, weight) in taps.iter().zip(weights.iter()) {
                    out += sample(src, c, pos, tap.0, tap.1) * weight;
                }
                dst.plane_mut(c).row_mut(dst_start.1 + y)[dst_start.0 + x] = out * inv_total;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn epf0(
    rf: &RestorationFilter,
    sigma: &Plane,
    src: &Image3,
    src_start: (usize, usize),
    dst: &mut Image3,
    dst_start: (usize, usize),
    size: (usize, usize),
    image_origin: (isize, isize),
) {
    epf_sad_pass(
        &EPF0_TAPS,
        rf.epf_pass0_sigma_scale,
        rf,
        sigma,
        src,
        src_start,
        dst,
        dst_start,
        size,
        image_origin,
    );
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn epf1(
    rf: &RestorationFilter,
    sigma: &Plane,
    src: &Image3,
    src_start: (usize, usize),
    dst: &mut Image3,
    dst_start: (usize, usize),
    size: (usize, usize),
    image_origin: (isize, isize),
) {
    epf_sad_pass(
        &EPF1_TAPS,
        1.0,
        rf,
        sigma,
        src,
        src_start,
        dst,
        dst_start,
        size,
        image_origin,
    );
}

/// Pass 2: 3x3 cross with a single cross-channel SAD per tap.
#[allow(clippy::too_many_arguments)]
pub(crate) fn epf2(
    rf: &RestorationFilter,
    sigma: &Plane,
    src: &Image3,
    src_start: (usize, usize),
    dst: &mut Image3,
    dst_start: (usize, usize),
    size: (usize, usize),
    image_origin: (isize, isize),
) {
    let sm = rf.epf_pass2_sigma_scale * 1.65;
    let bsm = sm * rf.epf_border_sad_mul;
    for y in 0..size.1 {
        let image_y = image_origin.1 + y as isize;
        for x in 0..size.0 {
            let image_x = image_origin.0 + x as isize;
            let pos = (src_start.0 + x, src_start.1 + y);
            let sigma_val = sigma_at(sigma, image_x, image_y);
            let center = [
                sample(src, 0, pos, 0, 0),
                sample(src, 1, pos, 0, 0),
                sample(src, 2, pos, 0, 0),
            ];
            if sigma_val < MIN_SIGMA {
                for c in 0..3 {
                    dst.plane_mut(c).row_mut(dst_start.1 + y)[dst_start.0 + x] = center[c];
                }
                continue;
            }
            let inv_sigma = sigma_val * sad_mul(sm, bsm, image_x, image_y);
            let mut total_weight = 1.0f32;
            let mut acc = center;
            for tap in EPF1_TAPS {
                let value = [
                    sample(src, 0, pos, tap.0, tap.1),
                    sample(src, 1, pos, tap.0, tap.1),
                    sample(src, 2, pos, tap.0, tap.1),
                ];
                let sad = (value[0] - center[0]).abs() * rf.epf_channel_scale[0]
                    + (value[1] - center[1]).abs() * rf.epf_channel_scale[1]
                    + (value[2] - center[2]).abs() * rf.epf_channel_scale[2];
                let weight = (sad * inv_sigma + 1.0).max(0.0);
                total_weight += weight;
                for c in 0..3 {
                    acc[c] += value[c] * weight;
                }
            }
            let inv_total = 1.0 / total_weight;
            for c in 0..3 {
                dst.plane_mut(c).row_mut(dst_start.1 + y)[dst_start.0 + x] = acc[c] * inv_total;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::error::Result;
    use crate::util::test::assert_almost_eq;

    fn constant_src(value: f32) -> Result<Image3> {
        let mut src = Image3::new((32, 32))?;
        src.fill(value);
        Ok(src)
    }

    type EpfPass = fn(
        &RestorationFilter,
        &Plane,
        &Image3,
        (usize, usize),
        &mut Image3,
        (usize, usize),
        (usize, usize),
        (isize, isize),
    );

    #[test]
    fn constant_stays_constant() -> Result<()> {
        let rf = RestorationFilter::default();
        let mut sigma = Plane::new((8, 8))?;
        sigma.fill(-0.8);
        let src = constant_src(0.75)?;
        let mut dst = Image3::new((32, 32))?;
        let passes: [EpfPass; 3] = [epf0, epf1, epf2];
        for run in passes {
            run(&rf, &sigma, &src, (8, 8), &mut dst, (8, 8), (8, 8), (0, 0));
            for c in 0..3 {
                for y in 0..8 {
                    for x in 0..8 {
                        assert_almost_eq(dst.plane(c).row(8 + y)[8 + x], 0.75, 1e-6);
                    }
                }
            }
        }
        Ok(())
    }

    #[test]
    fn low_sigma_short_circuits() -> Result<()> {
        let rf = RestorationFilter::default();
        let mut sigma = Plane::new((8, 8))?;
        sigma.fill(MIN_SIGMA * 2.0);
        let mut src = constant_src(0.0)?;
        // A pattern any active pass would smooth.
        for y in 0..32 {
            for (x, v) in src.plane_mut(0).row_mut(y).iter_mut().enumerate() {
                *v = ((x + y) % 2) as f32;
            }
        }
        let mut dst = Image3::new((32, 32))?;
        epf1(&rf, &sigma, &src, (8, 8), &mut dst, (8, 8), (8, 8), (0, 0));
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(
                    dst.plane(0).row(8 + y)[8 + x],
                    src.plane(0).row(8 + y)[8 + x]
                );
            }
        }
        Ok(())
    }

    #[test]
    fn smooths_an_edge() -> Result<()> {
        let rf = RestorationFilter::default();
        let mut sigma = Plane::new((8, 8))?;
        sigma.fill(-0.1);
        let mut src = constant_src(0.0)?;
        // A shallow step; a hard edge would be excluded outright by the
        // SAD weighting.
        for y in 0..32 {
            for x in 16..32 {
                for c in 0..3 {
                    src.plane_mut(c).row_mut(y)[x] = 0.01;
                }
            }
        }
        let mut dst = Image3::new((32, 32))?;
        epf2(&rf, &sigma, &src, (8, 8), &mut dst, (8, 8), (16, 8), (0, 0));
        // The pixel just left of the step is pulled up, and stays between its
        // neighbors' values.
        let smoothed = dst.plane(1).row(12)[8 + 7];
        assert!(smoothed > 0.0 && smoothed < 0.01);
        Ok(())
    }
}
