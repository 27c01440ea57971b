// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::image::{Image3, Rect};

/// Converts `rect` of `image` from YCbCr to RGB in place.
///
/// The planes are stored in `Cb Y Cr` order to mimic the XYB channel layout.
pub fn ycbcr_to_rgb(image: &mut Image3, rect: Rect) {
    let [plane_cb, plane_y, plane_cr] = image.planes_mut();
    for row in 0..rect.ysize {
        let row_cb = rect.row_mut(plane_cb, row);
        let row_y = rect.row_mut(plane_y, row);
        let row_cr = rect.row_mut(plane_cr, row);
        for idx in 0..row_y.len() {
            // shift Y from [-0.5, 0.5] to [0, 1], matching the JPEG spec
            let y = row_y[idx] + 128.0 / 255.0;
            let cb = row_cb[idx];
            let cr = row_cr[idx];

            // Full-range BT.601 as defined by JFIF Clause 7:
            // https://www.itu.int/rec/T-REC-T.871-201105-I/en
            row_cb[idx] = cr.mul_add(1.402, y);
            row_y[idx] = cr.mul_add(
                -0.299 * 1.402 / 0.587,
                cb.mul_add(-0.114 * 1.772 / 0.587, y),
            );
            row_cr[idx] = cb.mul_add(1.772, y);
        }
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::error::Result;
    use crate::util::test::assert_all_almost_eq;

    fn rgb_to_ycbcr(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
        let y = 0.299 * r + 0.587 * g + 0.114 * b;
        let cb = (b - y) / 1.772;
        let cr = (r - y) / 1.402;
        (cb, y - 128.0 / 255.0, cr)
    }

    #[test]
    fn srgb_primaries() -> Result<()> {
        let mut image = Image3::new((3, 1))?;
        image
            .plane_mut(0)
            .row_mut(0)
            .copy_from_slice(&[-0.16873589, -0.3312641, 0.5]);
        image
            .plane_mut(1)
            .row_mut(0)
            .copy_from_slice(&[-0.20296079, 0.08503921, -0.3879608]);
        image
            .plane_mut(2)
            .row_mut(0)
            .copy_from_slice(&[0.5, -0.41868758, -0.08131241]);

        ycbcr_to_rgb(&mut image, Rect::new(0, 0, 3, 1));

        assert_all_almost_eq(image.plane(0).row(0), &[1.0, 0.0, 0.0], 1e-6);
        assert_all_almost_eq(image.plane(1).row(0), &[0.0, 1.0, 0.0], 1e-6);
        assert_all_almost_eq(image.plane(2).row(0), &[0.0, 0.0, 1.0], 1e-6);

        Ok(())
    }

    #[test]
    fn roundtrip() -> Result<()> {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(7);
        let mut image = Image3::new((64, 4))?;
        let mut want = [vec![], vec![], vec![]];
        for y in 0..4 {
            for x in 0..64 {
                let r: f32 = rng.random_range(0.0..1.0);
                let g: f32 = rng.random_range(0.0..1.0);
                let b: f32 = rng.random_range(0.0..1.0);
                let (cb, yy, cr) = rgb_to_ycbcr(r, g, b);
                image.plane_mut(0).row_mut(y)[x] = cb;
                image.plane_mut(1).row_mut(y)[x] = yy;
                image.plane_mut(2).row_mut(y)[x] = cr;
                want[0].push(r);
                want[1].push(g);
                want[2].push(b);
            }
        }
        ycbcr_to_rgb(&mut image, Rect::new(0, 0, 64, 4));
        for c in 0..3 {
            for y in 0..4 {
                assert_all_almost_eq(
                    image.plane(c).row(y),
                    &want[c][y * 64..(y + 1) * 64],
                    1e-6,
                );
            }
        }
        Ok(())
    }
}
