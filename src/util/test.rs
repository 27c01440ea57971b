// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

pub fn assert_almost_eq(left: f32, right: f32, max_error: f32) {
    let diff = (left - right).abs();
    if !(diff <= max_error) {
        panic!(
            "assertion failed: `(left ≈ right)`\n  left: `{left:?}`,\n right: `{right:?}`,\n max_error: `{max_error:?}`"
        );
    }
}

pub fn assert_all_almost_eq(left: &[f32], right: &[f32], max_error: f32) {
    assert_eq!(left.len(), right.len());
    for (index, (l, r)) in left.iter().zip(right.iter()).enumerate() {
        if !((l - r).abs() <= max_error) {
            panic!(
                "assertion failed at index {index}: `(left ≈ right)`\n  left: `{left:?}`,\n right: `{right:?}`,\n max_error: `{max_error:?}`"
            );
        }
    }
}
