// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::color::tf::linear_to_srgb;
use crate::error::{Error, Result};
use crate::headers::OpsinInverseMatrix;
use crate::image::{Image3, Rect};
use crate::BLOCK_DIM;

/// Display encoding of the reconstructed color image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputEncoding {
    LinearSrgb,
    Srgb,
    Pq,
    Hlg,
}

/// Inverse XYB transform, compiled once per lane width. The implementation is
/// chosen at frame start and carried through the decoder state.
pub trait XybTransform: Send + Sync {
    /// Converts `rect` of `image` from XYB to RGB in place. The rectangle
    /// width is a multiple of [`BLOCK_DIM`] except at the image margin, where
    /// the unused tail of the final lane may be left with indeterminate
    /// values: row strides include initialized padding there.
    fn undo_xyb(
        &self,
        image: &mut Image3,
        rect: Rect,
        params: &OpsinInverseMatrix,
        encoding: OutputEncoding,
    ) -> Result<()>;
}

fn check_encoding(encoding: OutputEncoding) -> Result<()> {
    match encoding {
        OutputEncoding::LinearSrgb | OutputEncoding::Srgb => Ok(()),
        _ => Err(Error::InvalidTargetEncoding),
    }
}

#[inline]
fn xyb_to_linear(
    x: f32,
    y: f32,
    b: f32,
    mat: &[f32; 9],
    bias: &[f32; 3],
    bias_cbrt: &[f32; 3],
    intensity_scale: f32,
) -> [f32; 3] {
    // Mix and apply bias
    let l = y + x - bias_cbrt[0];
    let m = y - x - bias_cbrt[1];
    let s = b - bias_cbrt[2];

    // Apply biased inverse gamma and scale (1.0 corresponds to
    // `intensity_target` nits)
    let l = (l * l * l + bias[0]) * intensity_scale;
    let m = (m * m * m + bias[1]) * intensity_scale;
    let s = (s * s * s + bias[2]) * intensity_scale;

    // Apply the opsin inverse matrix, row by row (linear LMS to linear sRGB)
    [
        mat[0] * l + mat[1] * m + mat[2] * s,
        mat[3] * l + mat[4] * m + mat[5] * s,
        mat[6] * l + mat[7] * m + mat[8] * s,
    ]
}

/// Plain per-pixel kernel, used when no wider lane width is available.
pub struct ScalarXybTransform;

impl XybTransform for ScalarXybTransform {
    fn undo_xyb(
        &self,
        image: &mut Image3,
        rect: Rect,
        params: &OpsinInverseMatrix,
        encoding: OutputEncoding,
    ) -> Result<()> {
        check_encoding(encoding)?;
        let bias = params.opsin_biases;
        let bias_cbrt = bias.map(|x| x.cbrt());
        let intensity_scale = 255.0 / params.intensity_target;
        let [plane_x, plane_y, plane_b] = image.planes_mut();
        for y in 0..rect.ysize {
            let row_x = rect.row_mut(plane_x, y);
            let row_y = rect.row_mut(plane_y, y);
            let row_b = rect.row_mut(plane_b, y);
            for idx in 0..rect.xsize {
                let [r, g, b] = xyb_to_linear(
                    row_x[idx],
                    row_y[idx],
                    row_b[idx],
                    &params.inverse_matrix,
                    &bias,
                    &bias_cbrt,
                    intensity_scale,
                );
                row_x[idx] = r;
                row_y[idx] = g;
                row_b[idx] = b;
            }
            if encoding == OutputEncoding::Srgb {
                linear_to_srgb(row_x);
                linear_to_srgb(row_y);
                linear_to_srgb(row_b);
            }
        }
        Ok(())
    }
}

/// Kernel processing rows in lanes of [`BLOCK_DIM`] floats. The final lane of
/// a margin rectangle spills into the row's initialized padding columns.
pub struct LanesXybTransform;

impl XybTransform for LanesXybTransform {
    fn undo_xyb(
        &self,
        image: &mut Image3,
        rect: Rect,
        params: &OpsinInverseMatrix,
        encoding: OutputEncoding,
    ) -> Result<()> {
        check_encoding(encoding)?;
        let bias = params.opsin_biases;
        let bias_cbrt = bias.map(|x| x.cbrt());
        let intensity_scale = 255.0 / params.intensity_target;
        let [plane_x, plane_y, plane_b] = image.planes_mut();
        for y in 0..rect.ysize {
            let row_x = rect.row_padded_mut(plane_x, y);
            let row_y = rect.row_padded_mut(plane_y, y);
            let row_b = rect.row_padded_mut(plane_b, y);
            let mut x = 0;
            while x < rect.xsize {
                let lane_x: &mut [f32] = &mut row_x[x..x + BLOCK_DIM];
                let lane_y: &mut [f32] = &mut row_y[x..x + BLOCK_DIM];
                let lane_b: &mut [f32] = &mut row_b[x..x + BLOCK_DIM];
                for idx in 0..BLOCK_DIM {
                    let [r, g, b] = xyb_to_linear(
                        lane_x[idx],
                        lane_y[idx],
                        lane_b[idx],
                        &params.inverse_matrix,
                        &bias,
                        &bias_cbrt,
                        intensity_scale,
                    );
                    lane_x[idx] = r;
                    lane_y[idx] = g;
                    lane_b[idx] = b;
                }
                if encoding == OutputEncoding::Srgb {
                    linear_to_srgb(lane_x);
                    linear_to_srgb(lane_y);
                    linear_to_srgb(lane_b);
                }
                x += BLOCK_DIM;
            }
        }
        Ok(())
    }
}

static SCALAR: ScalarXybTransform = ScalarXybTransform;
static LANES: LanesXybTransform = LanesXybTransform;

/// Picks the widest kernel the CPU supports. Called once per frame.
pub fn select_xyb_transform() -> &'static dyn XybTransform {
    #[cfg(target_arch = "x86_64")]
    if std::arch::is_x86_feature_detected!("avx2") {
        return &LANES;
    }
    if cfg!(target_arch = "aarch64") {
        return &LANES;
    }
    &SCALAR
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::util::test::{assert_all_almost_eq, assert_almost_eq};

    fn fill_xyb(image: &mut Image3, x: f32, y: f32, b: f32) {
        image.plane_mut(0).fill(x);
        image.plane_mut(1).fill(y);
        image.plane_mut(2).fill(b);
    }

    #[test]
    fn neutral_gray() -> crate::error::Result<()> {
        // X = 0 with B = Y decodes to a neutral value on every channel.
        let mut image = Image3::new((8, 8))?;
        fill_xyb(&mut image, 0.0, 0.25, 0.25);
        let params = OpsinInverseMatrix::default();
        let rect = Rect::new(0, 0, 8, 8);
        ScalarXybTransform.undo_xyb(&mut image, rect, &params, OutputEncoding::LinearSrgb)?;
        let bias = params.opsin_biases[0];
        let want = {
            let g = 0.25 - bias.cbrt();
            g * g * g + bias
        };
        for c in 0..3 {
            for y in 0..8 {
                for &v in image.plane(c).row(y) {
                    assert_almost_eq(v, want, 1e-6);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn scalar_and_lanes_agree() -> crate::error::Result<()> {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(42);
        let mut a = Image3::new((24, 9))?;
        for c in 0..3 {
            for y in 0..9 {
                for v in a.plane_mut(c).row_mut(y) {
                    *v = rng.random_range(-0.5..0.5);
                }
            }
        }
        let mut b = a.try_clone()?;
        let params = OpsinInverseMatrix::default();
        let rect = Rect::new(0, 0, 24, 9);
        ScalarXybTransform.undo_xyb(&mut a, rect, &params, OutputEncoding::Srgb)?;
        LanesXybTransform.undo_xyb(&mut b, rect, &params, OutputEncoding::Srgb)?;
        for c in 0..3 {
            for y in 0..9 {
                assert_all_almost_eq(a.plane(c).row(y), b.plane(c).row(y), 0.0);
            }
        }
        Ok(())
    }

    #[test]
    fn unsupported_encoding() -> crate::error::Result<()> {
        let mut image = Image3::new((8, 8))?;
        let params = OpsinInverseMatrix::default();
        let rect = Rect::new(0, 0, 8, 8);
        assert!(ScalarXybTransform
            .undo_xyb(&mut image, rect, &params, OutputEncoding::Pq)
            .is_err());
        Ok(())
    }
}
