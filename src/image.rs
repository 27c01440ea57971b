// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt::Debug;

use crate::error::{Error, Result};
use crate::BLOCK_DIM;

mod rect;

pub use rect::Rect;

/// A single-channel image of `f32` samples.
///
/// Rows are stored with a stride rounded up to [`BLOCK_DIM`] samples plus one
/// extra block of initialized padding, so that kernels processing a row in
/// lanes of `BLOCK_DIM` floats may read (and write) past a ragged right edge
/// without touching uninitialized or foreign memory.
pub struct Plane {
    size: (usize, usize),
    capacity: (usize, usize),
    stride: usize,
    data: Vec<f32>,
}

impl Plane {
    pub fn new(size: (usize, usize)) -> Result<Plane> {
        let (xsize, ysize) = size;
        if xsize == 0 || ysize == 0 {
            return Err(Error::InvalidImageSize(xsize, ysize));
        }
        // These limits let us not worry about overflows below.
        if xsize as u64 >= i64::MAX as u64 / 4 || ysize as u64 >= i64::MAX as u64 / 4 {
            return Err(Error::ImageSizeTooLarge(xsize, ysize));
        }
        let stride = crate::util::round_up_to(xsize, BLOCK_DIM) + BLOCK_DIM;
        let total = stride
            .checked_mul(ysize)
            .ok_or(Error::ImageSizeTooLarge(xsize, ysize))?;
        let mut data = Vec::new();
        data.try_reserve_exact(total)?;
        data.resize(total, 0.0);
        Ok(Plane {
            size,
            capacity: size,
            stride,
            data,
        })
    }

    pub fn size(&self) -> (usize, usize) {
        self.size
    }

    pub fn xsize(&self) -> usize {
        self.size.0
    }

    pub fn ysize(&self) -> usize {
        self.size.1
    }

    /// Sets the logical extent. The new extent must fit the allocation, but
    /// may be larger than the current one; reusable scratch images rely on
    /// this when they are re-extended for the next tile.
    pub fn shrink_to(&mut self, xsize: usize, ysize: usize) {
        assert!(xsize > 0 && ysize > 0);
        assert!(
            xsize <= self.capacity.0 && ysize <= self.capacity.1,
            "extent {}x{} does not fit allocation {}x{}",
            xsize,
            ysize,
            self.capacity.0,
            self.capacity.1
        );
        self.size = (xsize, ysize);
    }

    /// Zeroes the columns between the logical width and the row stride, so
    /// that lane-wide reads past the right edge see initialized data again
    /// after the logical extent changed.
    pub fn init_padding(&mut self) {
        for y in 0..self.size.1 {
            let xsize = self.size.0;
            self.data[y * self.stride + xsize..(y + 1) * self.stride].fill(0.0);
        }
    }

    pub fn row(&self, y: usize) -> &[f32] {
        debug_assert!(y < self.size.1);
        &self.data[y * self.stride..y * self.stride + self.size.0]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        debug_assert!(y < self.size.1);
        let xsize = self.size.0;
        &mut self.data[y * self.stride..y * self.stride + xsize]
    }

    /// Full-stride row, for kernels that process whole lanes and may touch
    /// the padding columns.
    pub fn row_padded(&self, y: usize) -> &[f32] {
        debug_assert!(y < self.size.1);
        &self.data[y * self.stride..(y + 1) * self.stride]
    }

    pub fn row_padded_mut(&mut self, y: usize) -> &mut [f32] {
        debug_assert!(y < self.size.1);
        &mut self.data[y * self.stride..(y + 1) * self.stride]
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    pub fn try_clone(&self) -> Result<Plane> {
        let mut data = Vec::new();
        data.try_reserve_exact(self.data.len())?;
        data.extend_from_slice(&self.data);
        Ok(Plane {
            size: self.size,
            capacity: self.capacity,
            stride: self.stride,
            data,
        })
    }
}

impl Debug for Plane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "plane {}x{}", self.size.0, self.size.1)
    }
}

/// Three-channel planar image. The planes normally share one size; they only
/// diverge transiently while subsampled chroma is being upsampled.
#[derive(Debug)]
pub struct Image3 {
    planes: [Plane; 3],
}

impl Image3 {
    pub fn new(size: (usize, usize)) -> Result<Image3> {
        Ok(Image3 {
            planes: array_init::try_array_init(|_| Plane::new(size))?,
        })
    }

    /// Size of the first plane; only meaningful when all planes agree.
    pub fn size(&self) -> (usize, usize) {
        self.planes[0].size()
    }

    pub fn xsize(&self) -> usize {
        self.planes[0].xsize()
    }

    pub fn ysize(&self) -> usize {
        self.planes[0].ysize()
    }

    pub fn plane(&self, c: usize) -> &Plane {
        &self.planes[c]
    }

    pub fn plane_mut(&mut self, c: usize) -> &mut Plane {
        &mut self.planes[c]
    }

    pub fn planes_mut(&mut self) -> [&mut Plane; 3] {
        let [a, b, c] = &mut self.planes;
        [a, b, c]
    }

    pub fn replace_plane(&mut self, c: usize, plane: Plane) {
        self.planes[c] = plane;
    }

    pub fn shrink_to(&mut self, xsize: usize, ysize: usize) {
        for plane in &mut self.planes {
            plane.shrink_to(xsize, ysize);
        }
    }

    pub fn fill(&mut self, value: f32) {
        for plane in &mut self.planes {
            plane.fill(value);
        }
    }

    pub fn try_clone(&self) -> Result<Image3> {
        Ok(Image3 {
            planes: array_init::try_array_init(|c| self.planes[c].try_clone())?,
        })
    }
}

/// The reconstructed frame handed back to the caller: the color image plus
/// the extent bookkeeping performed by the tile scheduler.
#[derive(Debug)]
pub struct ImageBundle {
    color: Image3,
}

impl ImageBundle {
    pub fn new(size: (usize, usize)) -> Result<ImageBundle> {
        Ok(ImageBundle {
            color: Image3::new(size)?,
        })
    }

    pub fn color(&self) -> &Image3 {
        &self.color
    }

    pub fn color_mut(&mut self) -> &mut Image3 {
        &mut self.color
    }

    pub fn xsize(&self) -> usize {
        self.color.xsize()
    }

    pub fn ysize(&self) -> usize {
        self.color.ysize()
    }
}

/// Copies `src_rect` of `src` onto `dst_rect` of `dst`, plane by plane.
pub fn copy_image_rect(src: &Image3, src_rect: Rect, dst: &mut Image3, dst_rect: Rect) {
    assert_eq!(src_rect.size(), dst_rect.size());
    for c in 0..3 {
        for y in 0..src_rect.ysize {
            let row_in = src_rect.row(src.plane(c), y);
            dst_rect.row_mut(dst.plane_mut(c), y).copy_from_slice(row_in);
        }
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::{copy_image_rect, Image3, Plane, Rect};
    use crate::error::Result;

    #[test]
    fn huge_image() {
        assert!(Plane::new((1 << 61, 1 << 61)).is_err());
    }

    #[test]
    fn empty_image() {
        assert!(Plane::new((0, 8)).is_err());
        assert!(Plane::new((8, 0)).is_err());
    }

    #[test]
    fn row_basic() -> Result<()> {
        let mut plane = Plane::new((13, 7))?;
        plane.row_mut(3)[12] = 1.0;
        assert_eq!(plane.row(3)[12], 1.0);
        assert_eq!(plane.row(3).len(), 13);
        // One extra block of initialized padding past the rounded-up width.
        assert_eq!(plane.row_padded(3).len(), 24);
        assert_eq!(plane.row_padded(3)[13], 0.0);
        Ok(())
    }

    #[test]
    fn shrink_and_regrow() -> Result<()> {
        let mut plane = Plane::new((32, 32))?;
        plane.shrink_to(5, 9);
        assert_eq!(plane.size(), (5, 9));
        plane.shrink_to(20, 30);
        assert_eq!(plane.size(), (20, 30));
        Ok(())
    }

    #[test]
    #[should_panic]
    fn shrink_past_capacity() {
        let mut plane = Plane::new((32, 32)).unwrap();
        plane.shrink_to(33, 32);
    }

    #[test]
    fn copy_rect() -> Result<()> {
        let mut src = Image3::new((16, 16))?;
        for c in 0..3 {
            for y in 0..16 {
                for (x, v) in src.plane_mut(c).row_mut(y).iter_mut().enumerate() {
                    *v = (c * 256 + y * 16 + x) as f32;
                }
            }
        }
        let mut dst = Image3::new((16, 16))?;
        let src_rect = Rect::new(4, 4, 8, 8);
        let dst_rect = Rect::new(0, 8, 8, 8);
        copy_image_rect(&src, src_rect, &mut dst, dst_rect);
        for c in 0..3 {
            for y in 0..8 {
                for x in 0..8 {
                    assert_eq!(
                        dst.plane(c).row(8 + y)[x],
                        (c * 256 + (y + 4) * 16 + x + 4) as f32
                    );
                }
            }
        }
        Ok(())
    }
}
