// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::image::{Image3, Rect};
use crate::util::mirror;

/// Produces a view of `src_rect` guaranteed to have `xborder` free pixels on
/// the left and right and `ypadding` on top and bottom.
///
/// When the source already has that margin the source is returned unchanged
/// and nothing is copied. Otherwise the window (with `xpadding`/`ypadding`
/// pixels of mirror-synthesized border) is materialized into `storage` and
/// the returned rectangle points into it, at `(xborder, ypadding)`.
///
/// Caller contract (violations are fatal): `xborder >= xpadding`, and
/// `storage` must be large enough for the padded window.
pub fn ensure_padding<'a>(
    src: &'a Image3,
    src_rect: Rect,
    storage: &'a mut Image3,
    xpadding: usize,
    ypadding: usize,
    xborder: usize,
) -> (&'a Image3, Rect) {
    assert!(xborder >= xpadding);
    let (xsize, ysize) = src.size();
    if src_rect.x0 >= xborder
        && src_rect.x1() + xborder <= xsize
        && src_rect.y0 >= ypadding
        && src_rect.y1() + ypadding <= ysize
    {
        // There is already enough border around `src:src_rect`, nothing to do.
        return (src, src_rect);
    }
    let out_rect = Rect::new(xborder, ypadding, src_rect.xsize, src_rect.ysize);
    assert!(
        storage.xsize() >= out_rect.x1() + xpadding
            && storage.ysize() >= out_rect.y1() + ypadding,
        "mirror-pad scratch too small"
    );
    let src_x_start = src_rect.x0 as isize - xpadding as isize;
    let src_x_end = (src_rect.x1() + xpadding) as isize;
    let storage_x_start = (out_rect.x0 - xpadding) as isize;
    let y0 = src_rect.y0 as isize - ypadding as isize;
    let y1 = (src_rect.y1() + ypadding) as isize;
    if src_x_start + xsize as isize >= 0 && src_x_end as usize <= 2 * xsize {
        // Image is wide enough that a single mirror step is sufficient.
        for c in 0..3 {
            for y in y0..y1 {
                let row_in = src.plane(c).row(mirror(y, ysize));
                let row_out = storage.plane_mut(c).row_mut((y - y0) as usize);
                // For x in [src_x_start, 0), we access the beginning of the
                // row, flipped.
                let mut x = src_x_start;
                while x < 0 {
                    row_out[(x - src_x_start + storage_x_start) as usize] =
                        row_in[(-x - 1) as usize];
                    x += 1;
                }
                // From 0 to src_x_end or xsize, we just copy directly.
                let num_direct = (src_x_end.min(xsize as isize) - x) as usize;
                let out_start = (x - src_x_start + storage_x_start) as usize;
                row_out[out_start..out_start + num_direct]
                    .copy_from_slice(&row_in[x as usize..x as usize + num_direct]);
                x += num_direct as isize;
                // From xsize to src_x_end, we access the end of the row,
                // flipped.
                while x < src_x_end {
                    row_out[(x - src_x_start + storage_x_start) as usize] =
                        row_in[(2 * xsize as isize - x - 1) as usize];
                    x += 1;
                }
            }
        }
    } else {
        // Slow case for small images.
        for c in 0..3 {
            for y in y0..y1 {
                let row_in = src.plane(c).row(mirror(y, ysize));
                let row_out = storage.plane_mut(c).row_mut((y - y0) as usize);
                for x in src_x_start..src_x_end {
                    row_out[(x - src_x_start + storage_x_start) as usize] =
                        row_in[mirror(x, xsize)];
                }
            }
        }
    }
    (storage, out_rect)
}
