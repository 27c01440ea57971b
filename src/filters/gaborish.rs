// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::headers::RestorationFilter;
use crate::image::Image3;

/// Applies the Gabor-like 3x3 smoothing kernel to all three channels,
/// reading `size` pixels at `src_start` (plus one border pixel) and writing
/// them at `dst_start`.
pub(crate) fn gaborish(
    rf: &RestorationFilter,
    src: &Image3,
    src_start: (usize, usize),
    dst: &mut Image3,
    dst_start: (usize, usize),
    size: (usize, usize),
) {
    let channel_weights = [
        (rf.gab_x_weight1, rf.gab_x_weight2),
        (rf.gab_y_weight1, rf.gab_y_weight2),
        (rf.gab_b_weight1, rf.gab_b_weight2),
    ];
    for (c, (weight1, weight2)) in channel_weights.into_iter().enumerate() {
        let weight_total = 1.0 + weight1 * 4.0 + weight2 * 4.0;
        let kernel_top_bottom = [weight2, weight1, weight2].map(|x| x / weight_total);
        let kernel_center = [weight1, 1.0, weight1].map(|x| x / weight_total);
        for y in 0..size.1 {
            let rows = [
                src.plane(c).row(src_start.1 + y - 1),
                src.plane(c).row(src_start.1 + y),
                src.plane(c).row(src_start.1 + y + 1),
            ];
            let row_out = dst.plane_mut(c).row_mut(dst_start.1 + y);
            for x in 0..size.0 {
                let mut sum = 0.0f32;
                let row_and_kernel =
                    std::iter::zip(rows, [kernel_top_bottom, kernel_center, kernel_top_bottom]);
                for (row_in, kernel) in row_and_kernel {
                    for (dx, weight) in kernel.iter().enumerate() {
                        sum += row_in[src_start.0 + x + dx - 1] * weight;
                    }
                }
                row_out[dst_start.0 + x] = sum;
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

    #[test]
    fn constant_stays_constant() -> Result<()> {
        let rf = RestorationFilter::default();
        let mut src = Image3::new((16, 16))?;
        src.fill(0.5);
        let mut dst = Image3::new((16, 16))?;
        gaborish(&rf, &src, (4, 4), &mut dst, (4, 4), (8, 8));
        for c in 0..3 {
            for y in 0..8 {
                for x in 0..8 {
                    assert_almost_eq(dst.plane(c).row(4 + y)[4 + x], 0.5, 1e-6);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn impulse_response() -> Result<()> {
        let rf = RestorationFilter::default();
        let mut src = Image3::new((16, 16))?;
        src.plane_mut(0).row_mut(8)[8] = 1.0;
        let mut dst = Image3::new((16, 16))?;
        gaborish(&rf, &src, (4, 4), &mut dst, (4, 4), (8, 8));
        let w1 = rf.gab_x_weight1;
        let w2 = rf.gab_x_weight2;
        let total = 1.0 + 4.0 * w1 + 4.0 * w2;
        // Impulse lands at output position (8, 8).
        assert_almost_eq(dst.plane(0).row(8)[8], 1.0 / total, 1e-6);
        assert_almost_eq(dst.plane(0).row(8)[7], w1 / total, 1e-6);
        assert_almost_eq(dst.plane(0).row(7)[8], w1 / total, 1e-6);
        assert_almost_eq(dst.plane(0).row(7)[7], w2 / total, 1e-6);
        assert_almost_eq(dst.plane(0).row(6)[8], 0.0, 1e-6);
        Ok(())
    }
}
