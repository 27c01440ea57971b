// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::{Error, Result};
use crate::headers::CustomTransformData;
use crate::image::{Image3, Plane, Rect};
use crate::util::mirror;

/// Spatial upsampler: expands every source pixel into an NxN block using
/// 5x5 kernels built from the packed weight tables.
pub struct Upsampler {
    factor: usize,
    // kernel[dy][dx] is the 5x5 kernel of output offset (dx, dy).
    kernel: Vec<Vec<[[f32; 5]; 5]>>,
}

impl Upsampler {
    pub fn new(ups_factors: &CustomTransformData, factor: usize) -> Result<Upsampler> {
        if factor == 1 {
            return Ok(Upsampler {
                factor,
                kernel: Vec::new(),
            });
        }
        let weights: &[f32] = match factor {
            2 => &ups_factors.weights2,
            4 => &ups_factors.weights4,
            8 => &ups_factors.weights8,
            _ => return Err(Error::InvalidUpsampling(factor as u32)),
        };
        let n = factor / 2;
        let mut kernel = vec![vec![[[0.0f32; 5]; 5]; factor]; factor];
        for i in 0..5 * n {
            for j in 0..5 * n {
                let y = i.min(j) as isize;
                let x = i.max(j) as isize;
                let ni = n as isize;
                // Index into the packed upper triangle of the symmetric
                // kernel matrix.
                let index = (5 * ni * y - y * (y - 1) / 2 + x - y) as usize;
                // Filling in the top left corner from the weights, then
                // mirroring to get the rest of the kernel.
                kernel[j / 5][i / 5][j % 5][i % 5] = weights[index];
                kernel[factor - 1 - j / 5][i / 5][4 - (j % 5)][i % 5] = weights[index];
                kernel[j / 5][factor - 1 - i / 5][j % 5][4 - (i % 5)] = weights[index];
                kernel[factor - 1 - j / 5][factor - 1 - i / 5][4 - (j % 5)][4 - (i % 5)] =
                    weights[index];
            }
        }
        Ok(Upsampler { factor, kernel })
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Upsamples `src_rect` of `src` into `dst_rect` of `dst`. The source
    /// must have two valid border pixels around `src_rect`; each output is
    /// clamped to the range of its 5x5 source window.
    pub fn upsample_rect(&self, src: &Image3, src_rect: Rect, dst: &mut Image3, dst_rect: Rect) {
        let n = self.factor;
        assert!(n != 1, "upsampler not used for 1x frames");
        assert_eq!(dst_rect.xsize, src_rect.xsize * n);
        assert_eq!(dst_rect.ysize, src_rect.ysize * n);
        for c in 0..3 {
            for y in 0..src_rect.ysize {
                for x in 0..src_rect.xsize {
                    let mut vals = [[0.0f32; 5]; 5];
                    let mut minval = f32::MAX;
                    let mut maxval = f32::MIN;
                    for (i, row_vals) in vals.iter_mut().enumerate() {
                        let row = src.plane(c).row(src_rect.y0 + y + i - 2);
                        for (j, value) in row_vals.iter_mut().enumerate() {
                            *value = row[src_rect.x0 + x + j - 2];
                            minval = minval.min(*value);
                            maxval = maxval.max(*value);
                        }
                    }
                    for dy in 0..n {
                        let row_out = dst.plane_mut(c).row_mut(dst_rect.y0 + y * n + dy);
                        for dx in 0..n {
                            let kernel = &self.kernel[dy][dx];
                            let mut sum = 0.0f32;
                            for i in 0..5 {
                                for j in 0..5 {
                                    sum += vals[i][j] * kernel[i][j];
                                }
                            }
                            row_out[dst_rect.x0 + x * n + dx] = sum.clamp(minval, maxval);
                        }
                    }
                }
            }
        }
    }
}

/// Doubles the width of a plane with the two-tap 0.25/0.75 kernel, mirroring
/// at the edges. Used for chroma upsampling, one pass per halving shift.
pub fn upsample_h2(plane: &Plane) -> Result<Plane> {
    let (xsize, ysize) = plane.size();
    let mut out = Plane::new((2 * xsize, ysize))?;
    for y in 0..ysize {
        let row_in = plane.row(y);
        let row_out = out.row_mut(y);
        for x in 0..xsize {
            let cur = row_in[x];
            let prev = row_in[mirror(x as isize - 1, xsize)];
            let next = row_in[mirror(x as isize + 1, xsize)];
            let scaled_cur = cur * 0.75;
            row_out[2 * x] = 0.25 * prev + scaled_cur;
            row_out[2 * x + 1] = 0.25 * next + scaled_cur;
        }
    }
    Ok(out)
}

/// Doubles the height of a plane; the vertical counterpart of
/// [`upsample_h2`].
pub fn upsample_v2(plane: &Plane) -> Result<Plane> {
    let (xsize, ysize) = plane.size();
    let mut out = Plane::new((xsize, 2 * ysize))?;
    for y in 0..ysize {
        let row_cur = plane.row(y);
        let row_prev = plane.row(mirror(y as isize - 1, ysize));
        let row_next = plane.row(mirror(y as isize + 1, ysize));
        for x in 0..xsize {
            let scaled_cur = row_cur[x] * 0.75;
            out.row_mut(2 * y)[x] = 0.25 * row_prev[x] + scaled_cur;
            out.row_mut(2 * y + 1)[x] = 0.25 * row_next[x] + scaled_cur;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::error::Result;
    use crate::util::test::{assert_all_almost_eq, assert_almost_eq};

    fn ups_factors() -> CustomTransformData {
        CustomTransformData::default()
    }

    #[test]
    fn invalid_factor() {
        assert!(Upsampler::new(&ups_factors(), 3).is_err());
    }

    #[test]
    fn upsample2x_constant() -> Result<()> {
        let upsampler = Upsampler::new(&ups_factors(), 2)?;
        let mut src = Image3::new((20, 20))?;
        src.fill(0.777);
        let mut dst = Image3::new((32, 32))?;
        upsampler.upsample_rect(
            &src,
            Rect::new(2, 2, 16, 16),
            &mut dst,
            Rect::new(0, 0, 32, 32),
        );
        for c in 0..3 {
            for y in 0..32 {
                for &v in dst.plane(c).row(y) {
                    assert_almost_eq(v, 0.777, 1e-6);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn upsample4x_and_8x_constant() -> Result<()> {
        for factor in [4usize, 8] {
            let upsampler = Upsampler::new(&ups_factors(), factor)?;
            let mut src = Image3::new((12, 12))?;
            src.fill(0.25);
            let mut dst = Image3::new((8 * factor, 8 * factor))?;
            upsampler.upsample_rect(
                &src,
                Rect::new(2, 2, 8, 8),
                &mut dst,
                Rect::new(0, 0, 8 * factor, 8 * factor),
            );
            for c in 0..3 {
                for y in 0..8 * factor {
                    for &v in dst.plane(c).row(y) {
                        assert_almost_eq(v, 0.25, 1e-5);
                    }
                }
            }
        }
        Ok(())
    }

    #[test]
    fn upsample2x_impulse_is_symmetric() -> Result<()> {
        let upsampler = Upsampler::new(&ups_factors(), 2)?;
        let mut src = Image3::new((16, 16))?;
        src.plane_mut(0).row_mut(8)[8] = 1.0;
        let mut dst = Image3::new((24, 24))?;
        upsampler.upsample_rect(
            &src,
            Rect::new(2, 2, 12, 12),
            &mut dst,
            Rect::new(0, 0, 24, 24),
        );
        // The impulse maps to the 2x2 block at (12, 12); its response is
        // symmetric around the block center.
        let plane = dst.plane(0);
        for dy in 0..10 {
            for dx in 0..10 {
                let a = plane.row(13 + dy)[13 + dx];
                let b = plane.row(12 - dy)[12 - dx];
                assert_almost_eq(a, b, 1e-7);
                let c = plane.row(13 + dy)[12 - dx];
                assert_almost_eq(a, c, 1e-7);
            }
        }
        Ok(())
    }

    #[test]
    fn chroma_h2() -> Result<()> {
        let mut plane = Plane::new((3, 1))?;
        plane.row_mut(0).copy_from_slice(&[1.0, 2.0, 4.0]);
        let out = upsample_h2(&plane)?;
        assert_all_almost_eq(out.row(0), &[1.0, 1.25, 1.75, 2.5, 3.5, 4.0], 1e-6);
        Ok(())
    }

    #[test]
    fn chroma_v2() -> Result<()> {
        let mut plane = Plane::new((1, 3))?;
        plane.row_mut(0)[0] = 1.0;
        plane.row_mut(1)[0] = 2.0;
        plane.row_mut(2)[0] = 4.0;
        let out = upsample_v2(&plane)?;
        let got: Vec<f32> = (0..6).map(|y| out.row(y)[0]).collect();
        assert_all_almost_eq(&got, &[1.0, 1.25, 1.75, 2.5, 3.5, 4.0], 1e-6);
        Ok(())
    }
}
