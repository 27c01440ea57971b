// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::{Error, Result};
use crate::image::{Image3, Rect};
use crate::render::ColorCorrelationParams;
use crate::util::erf;

const DCT_SIZE: usize = 32;
/// Gaussian splats are emitted every this many pixels of arc length.
const DESIRED_RENDERING_DISTANCE: f32 = 1.0;
/// Subdivisions per control-point pair when flattening the spline.
const CATMULL_ROM_POINTS: usize = 16;
/// Dequantized control points further out than this are rejected.
const MAX_POINT_COORDINATE: f32 = (1 << 23) as f32;
/// Budget for the whole frame; rejecting pathological splines here keeps the
/// per-tile draw loops bounded.
const MAX_SEGMENTS: usize = 1 << 20;
const CHANNEL_WEIGHT: [f32; 4] = [0.0042, 0.075, 0.07, 0.3333];
const INV_SQRT2: f32 = std::f32::consts::FRAC_1_SQRT_2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Point {
        Point { x, y }
    }
}

/// A spline as decoded from the bitstream: double-delta-encoded control
/// points and quantized DCT coefficients for the color and sigma profiles.
#[derive(Debug, Clone, Default)]
pub struct QuantizedSpline {
    pub control_points: Vec<(i64, i64)>,
    // X, Y, B.
    pub color_dct: [[i32; DCT_SIZE]; 3],
    pub sigma_dct: [i32; DCT_SIZE],
}

/// One Gaussian splat along a rendered spline.
#[derive(Debug, Clone, Copy, Default)]
struct SplineSegment {
    center_x: f32,
    center_y: f32,
    maximum_distance: f32,
    inv_sigma: f32,
    sigma_over_4: f32,
    color: [f32; 3],
}

#[derive(Debug, Default)]
pub struct Splines {
    quantization_adjustment: i32,
    splines: Vec<QuantizedSpline>,
    starting_points: Vec<Point>,
}

/// Evaluates the DCT-32 coefficient vector as a continuous function of
/// `t` in `[0, DCT_SIZE - 1]`.
fn continuous_idct(dct: &[f32; DCT_SIZE], t: f32) -> f32 {
    let mut result = dct[0];
    for (k, coeff) in dct.iter().enumerate().skip(1) {
        let theta = std::f32::consts::PI * k as f32 * (t + 0.5) / DCT_SIZE as f32;
        result += std::f32::consts::SQRT_2 * coeff * theta.cos();
    }
    result
}

/// Integrated Gaussian profile across one pixel at 1-D distance `d`.
#[inline]
fn pixel_profile(d: f32, inv_sigma: f32) -> f32 {
    erf((d + 0.5) * inv_sigma * INV_SQRT2) - erf((d - 0.5) * inv_sigma * INV_SQRT2)
}

/// Flattens the control polygon into a dense polyline using a centripetal
/// Catmull-Rom spline, 16 points per control-point pair.
fn draw_centripetal_catmull_rom_spline(points: &[Point]) -> Vec<Point> {
    if points.is_empty() {
        return Vec::new();
    }
    if points.len() == 1 {
        return vec![points[0]];
    }
    // Reflect the first and last control points to provide end tangents.
    let first = points[0];
    let second = points[1];
    let last = points[points.len() - 1];
    let second_to_last = points[points.len() - 2];
    let mut extended = Vec::with_capacity(points.len() + 2);
    extended.push(Point::new(
        2.0 * first.x - second.x,
        2.0 * first.y - second.y,
    ));
    extended.extend_from_slice(points);
    extended.push(Point::new(
        2.0 * last.x - second_to_last.x,
        2.0 * last.y - second_to_last.y,
    ));

    let mut result = Vec::with_capacity((points.len() - 1) * CATMULL_ROM_POINTS + 1);
    for window in extended.windows(4) {
        let p: [Point; 4] = [window[0], window[1], window[2], window[3]];
        // Centripetal parameterization: knot increments are the square roots
        // of the distances between consecutive control points.
        let mut t = [0.0f32; 4];
        for k in 0..3 {
            let dx = p[k + 1].x - p[k].x;
            let dy = p[k + 1].y - p[k].y;
            t[k + 1] = t[k] + (dx * dx + dy * dy).sqrt().sqrt().max(1e-5);
        }
        for j in 0..CATMULL_ROM_POINTS {
            let tt = t[1] + (t[2] - t[1]) * j as f32 / CATMULL_ROM_POINTS as f32;
            let lerp = |a: Point, b: Point, ta: f32, tb: f32| -> Point {
                let w = (tt - ta) / (tb - ta);
                Point::new(a.x + (b.x - a.x) * w, a.y + (b.y - a.y) * w)
            };
            let a1 = lerp(p[0], p[1], t[0], t[1]);
            let a2 = lerp(p[1], p[2], t[1], t[2]);
            let a3 = lerp(p[2], p[3], t[2], t[3]);
            let b1 = lerp(a1, a2, t[0], t[2]);
            let b2 = lerp(a2, a3, t[1], t[3]);
            result.push(lerp(b1, b2, t[1], t[2]));
        }
    }
    result.push(last);
    result
}

/// Walks a polyline and emits points spaced `DESIRED_RENDERING_DISTANCE`
/// apart, together with the arc length at each emitted point.
fn for_each_equally_spaced_point(
    points: &[Point],
    mut emit: impl FnMut(Point, f32),
) -> f32 {
    if points.is_empty() {
        return 0.0;
    }
    emit(points[0], 0.0);
    let mut arc_length = 0.0f32;
    let mut distance_to_next = DESIRED_RENDERING_DISTANCE;
    let mut current = points[0];
    for &next in &points[1..] {
        let dx = next.x - current.x;
        let dy = next.y - current.y;
        let mut remaining = (dx * dx + dy * dy).sqrt();
        if remaining == 0.0 {
            continue;
        }
        let (step_x, step_y) = (dx / remaining, dy / remaining);
        while remaining >= distance_to_next {
            current = Point::new(
                current.x + step_x * distance_to_next,
                current.y + step_y * distance_to_next,
            );
            remaining -= distance_to_next;
            arc_length += DESIRED_RENDERING_DISTANCE;
            distance_to_next = DESIRED_RENDERING_DISTANCE;
            emit(current, arc_length);
        }
        distance_to_next -= remaining;
        arc_length += remaining;
        current = next;
    }
    arc_length
}

impl Splines {
    pub fn create(
        quantization_adjustment: i32,
        splines: Vec<QuantizedSpline>,
        starting_points: Vec<Point>,
    ) -> Splines {
        assert_eq!(splines.len(), starting_points.len());
        Splines {
            quantization_adjustment,
            splines,
            starting_points,
        }
    }

    pub fn has_any(&self) -> bool {
        !self.splines.is_empty()
    }

    fn inv_quant(&self) -> f32 {
        let adjustment = self.quantization_adjustment as f32;
        if self.quantization_adjustment >= 0 {
            1.0 / (1.0 + 0.125 * adjustment)
        } else {
            1.0 - 0.125 * adjustment
        }
    }

    /// Dequantizes one spline: double-delta control points and DCT profiles,
    /// with the chroma-from-luma contribution folded into X and B.
    fn dequantize(
        &self,
        index: usize,
        ytox: f32,
        ytob: f32,
    ) -> Result<(Vec<Point>, [[f32; DCT_SIZE]; 3], [f32; DCT_SIZE])> {
        let quantized = &self.splines[index];
        let start = self.starting_points[index];
        let inv_quant = self.inv_quant();

        let mut points = Vec::with_capacity(quantized.control_points.len() + 1);
        let mut current = (start.x as i64, start.y as i64);
        points.push(Point::new(current.0 as f32, current.1 as f32));
        let mut delta = (0i64, 0i64);
        for &(dx, dy) in &quantized.control_points {
            delta.0 += dx;
            delta.1 += dy;
            current.0 += delta.0;
            current.1 += delta.1;
            let point = Point::new(current.0 as f32, current.1 as f32);
            if point.x.abs() > MAX_POINT_COORDINATE || point.y.abs() > MAX_POINT_COORDINATE {
                return Err(Error::SplinePointOutOfRange(point.x, point.y));
            }
            points.push(point);
        }

        let mut color_dct = [[0.0f32; DCT_SIZE]; 3];
        for (c, dct) in color_dct.iter_mut().enumerate() {
            for (k, value) in dct.iter_mut().enumerate() {
                *value = quantized.color_dct[c][k] as f32 * CHANNEL_WEIGHT[c] * inv_quant;
            }
        }
        for k in 0..DCT_SIZE {
            color_dct[0][k] += ytox * color_dct[1][k];
            color_dct[2][k] += ytob * color_dct[1][k];
        }
        let mut sigma_dct = [0.0f32; DCT_SIZE];
        for (k, value) in sigma_dct.iter_mut().enumerate() {
            *value = quantized.sigma_dct[k] as f32 * CHANNEL_WEIGHT[3] * inv_quant;
        }
        Ok((points, color_dct, sigma_dct))
    }

    fn compute_segments(&self, ytox: f32, ytob: f32) -> Result<Vec<SplineSegment>> {
        let mut segments = Vec::new();
        for index in 0..self.splines.len() {
            let (control_points, color_dct, sigma_dct) = self.dequantize(index, ytox, ytob)?;
            let polyline = draw_centripetal_catmull_rom_spline(&control_points);
            let mut samples = Vec::new();
            let total_length = for_each_equally_spaced_point(&polyline, |point, arc_length| {
                samples.push((point, arc_length))
            });
            let length_scale = if total_length > 0.0 {
                (DCT_SIZE - 1) as f32 / total_length
            } else {
                0.0
            };
            for (point, arc_length) in samples {
                let t = arc_length * length_scale;
                let sigma = continuous_idct(&sigma_dct, t);
                if !sigma.is_finite() || sigma == 0.0 {
                    return Err(Error::InvalidSplineSigma(sigma));
                }
                let inv_sigma = 1.0 / sigma;
                // Distance at which the splat has decayed below ~1e-4.
                let maximum_distance = (2.0 * (1e4f32).ln()).sqrt() * sigma.abs();
                let mut color = [0.0f32; 3];
                for (c, value) in color.iter_mut().enumerate() {
                    *value = continuous_idct(&color_dct[c], t);
                }
                segments.push(SplineSegment {
                    center_x: point.x,
                    center_y: point.y,
                    maximum_distance,
                    inv_sigma,
                    sigma_over_4: 0.25 * sigma,
                    color,
                });
                if segments.len() > MAX_SEGMENTS {
                    return Err(Error::TooManySplineSegments(segments.len(), MAX_SEGMENTS));
                }
            }
        }
        Ok(segments)
    }

    /// Rasterizes all splines intersecting `image_rect` onto `opsin`, whose
    /// `opsin_rect` holds the pixels of `image_rect` (frame coordinates).
    /// Fails if a spline does not pass its consistency checks.
    pub fn add_to(
        &self,
        opsin: &mut Image3,
        opsin_rect: Rect,
        image_rect: Rect,
        cmap: &ColorCorrelationParams,
    ) -> Result<()> {
        debug_assert_eq!(opsin_rect.size(), image_rect.size());
        if !self.has_any() {
            return Ok(());
        }
        let segments = self.compute_segments(cmap.y_to_x_lf(), cmap.y_to_b_lf())?;
        for segment in &segments {
            let md = segment.maximum_distance;
            let y_min = (segment.center_y - md).ceil().max(image_rect.y0 as f32) as usize;
            let y_max = ((segment.center_y + md).floor() as i64 + 1)
                .clamp(0, image_rect.y1() as i64) as usize;
            let x_min = (segment.center_x - md).ceil().max(image_rect.x0 as f32) as usize;
            let x_max = ((segment.center_x + md).floor() as i64 + 1)
                .clamp(0, image_rect.x1() as i64) as usize;
            for y in y_min..y_max {
                let dy = y as f32 - segment.center_y;
                let profile_y = pixel_profile(dy, segment.inv_sigma);
                for c in 0..3 {
                    let row = opsin
                        .plane_mut(c)
                        .row_mut(opsin_rect.y0 + y - image_rect.y0);
                    for x in x_min..x_max {
                        let dx = x as f32 - segment.center_x;
                        if dx * dx + dy * dy > md * md {
                            continue;
                        }
                        let local = segment.sigma_over_4
                            * pixel_profile(dx, segment.inv_sigma)
                            * profile_y;
                        row[opsin_rect.x0 + x - image_rect.x0] += segment.color[c] * local;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::error::Result;
    use crate::util::test::assert_all_almost_eq;

    fn test_spline() -> QuantizedSpline {
        let mut spline = QuantizedSpline {
            control_points: vec![(9, 1), (-1, 2), (3, -1)],
            ..QuantizedSpline::default()
        };
        spline.color_dct[0][0] = 168;
        spline.color_dct[0][1] = 119;
        spline.color_dct[1][0] = 9;
        spline.color_dct[1][2] = 7;
        spline.color_dct[2][0] = -10;
        spline.color_dct[2][1] = 7;
        spline.sigma_dct[0] = 4;
        spline.sigma_dct[7] = 2;
        spline
    }

    #[test]
    fn empty_splines_are_a_no_op() -> Result<()> {
        let splines = Splines::default();
        let mut image = Image3::new((16, 16))?;
        splines.add_to(
            &mut image,
            Rect::new(0, 0, 16, 16),
            Rect::new(0, 0, 16, 16),
            &ColorCorrelationParams::default(),
        )?;
        for y in 0..16 {
            assert_all_almost_eq(image.plane(0).row(y), &[0.0; 16], 0.0);
        }
        Ok(())
    }

    #[test]
    fn tiling_is_exact() -> Result<()> {
        // Drawing the whole frame at once and tile by tile must agree
        // bit-exactly.
        let splines = Splines::create(
            0,
            vec![test_spline()],
            vec![Point::new(10.0, 20.0)],
        );
        let cmap = ColorCorrelationParams::default();
        let mut whole = Image3::new((64, 64))?;
        splines.add_to(
            &mut whole,
            Rect::new(0, 0, 64, 64),
            Rect::new(0, 0, 64, 64),
            &cmap,
        )?;
        let mut tiled = Image3::new((64, 64))?;
        for ty in 0..4 {
            for tx in 0..4 {
                let rect = Rect::new(tx * 16, ty * 16, 16, 16);
                splines.add_to(&mut tiled, rect, rect, &cmap)?;
            }
        }
        for c in 0..3 {
            for y in 0..64 {
                assert_all_almost_eq(whole.plane(c).row(y), tiled.plane(c).row(y), 0.0);
            }
        }
        Ok(())
    }

    #[test]
    fn draws_something() -> Result<()> {
        let splines = Splines::create(
            0,
            vec![test_spline()],
            vec![Point::new(10.0, 20.0)],
        );
        let mut image = Image3::new((64, 64))?;
        splines.add_to(
            &mut image,
            Rect::new(0, 0, 64, 64),
            Rect::new(0, 0, 64, 64),
            &ColorCorrelationParams::default(),
        )?;
        let total: f32 = (0..64).map(|y| image.plane(0).row(y).iter().sum::<f32>()).sum();
        assert!(total > 0.0);
        Ok(())
    }

    #[test]
    fn zero_sigma_is_rejected() -> Result<()> {
        let mut spline = test_spline();
        spline.sigma_dct = [0; DCT_SIZE];
        let splines = Splines::create(0, vec![spline], vec![Point::new(10.0, 20.0)]);
        let mut image = Image3::new((16, 16))?;
        assert!(splines
            .add_to(
                &mut image,
                Rect::new(0, 0, 16, 16),
                Rect::new(0, 0, 16, 16),
                &ColorCorrelationParams::default(),
            )
            .is_err());
        Ok(())
    }

    #[test]
    fn control_points_out_of_range_are_rejected() -> Result<()> {
        let mut spline = test_spline();
        spline.control_points = vec![(1 << 26, 0)];
        let splines = Splines::create(0, vec![spline], vec![Point::new(10.0, 20.0)]);
        let mut image = Image3::new((16, 16))?;
        assert!(splines
            .add_to(
                &mut image,
                Rect::new(0, 0, 16, 16),
                Rect::new(0, 0, 16, 16),
                &ColorCorrelationParams::default(),
            )
            .is_err());
        Ok(())
    }

    #[test]
    fn quantization_adjustment_scale() {
        let splines = Splines::create(2, vec![], vec![]);
        assert!((splines.inv_quant() - 0.8).abs() < 1e-6);
        let splines = Splines::create(-2, vec![], vec![]);
        assert!((splines.inv_quant() - 1.25).abs() < 1e-6);
    }
}
