// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::Result;
use crate::image::{Image3, Plane, Rect};
use crate::render::ColorCorrelationParams;
use crate::util::mirror;

/// Noise parameters decoded from the frame header: an 8-entry intensity
/// lookup table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noise {
    pub lut: [f32; 8],
}

impl Noise {
    /// Piecewise-linear interpolation of the strength LUT, clamped to [0, 1].
    pub fn strength(&self, intensity: f32) -> f32 {
        let scale = (self.lut.len() - 2) as f32;
        let scaled = (intensity * scale).max(0.0);
        let floor = scaled.floor().min(scale);
        let frac = (scaled - floor).min(1.0);
        let index = floor as usize;
        let low = self.lut[index];
        let high = self.lut[index + 1];
        ((high - low) * frac + low).clamp(0.0, 1.0)
    }
}

/// XorShift128+ generator used to synthesize the random field. Keyed by the
/// plane index and the absolute row, so the field is a pure function of the
/// frame, never of tile layout or thread schedule.
struct XorShift128Plus {
    s0: u64,
    s1: u64,
}

impl XorShift128Plus {
    fn new(seed0: u64, seed1: u64) -> XorShift128Plus {
        // SplitMix64 on both seeds avoids low-entropy initial states.
        fn split_mix(mut z: u64) -> u64 {
            z = z.wrapping_add(0x9E3779B97F4A7C15);
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
            z ^ (z >> 31)
        }
        XorShift128Plus {
            s0: split_mix(seed0),
            s1: split_mix(seed1 ^ 0x5851F42D4C957F2D),
        }
    }

    fn next(&mut self) -> u64 {
        let mut s1 = self.s0;
        let s0 = self.s1;
        self.s0 = s0;
        s1 ^= s1 << 23;
        self.s1 = s1 ^ s0 ^ (s1 >> 18) ^ (s0 >> 5);
        self.s1.wrapping_add(s0)
    }
}

fn random_row(plane: usize, y: usize, row: &mut [f32]) {
    let mut rng = XorShift128Plus::new(plane as u64, y as u64);
    let mut x = 0;
    while x < row.len() {
        let bits = rng.next();
        for half in [bits as u32, (bits >> 32) as u32] {
            if x >= row.len() {
                break;
            }
            // Map the top mantissa bits into [1, 2), then down to [0, 1).
            row[x] = f32::from_bits((half >> 9) | 0x3F800000) - 1.0;
            x += 1;
        }
    }
}

/// Laplacian-like 5x5 kernel flattening the raw random field into
/// approximately zero-mean correlated noise: 0.16 for each of the 24
/// neighbors and -3.84 for the center.
fn convolve_noise(raw: &Plane) -> Result<Plane> {
    let (xsize, ysize) = raw.size();
    let mut out = Plane::new((xsize, ysize))?;
    for y in 0..ysize {
        let rows: [&[f32]; 5] = array_init::array_init(|i| {
            raw.row(mirror(y as isize + i as isize - 2, ysize))
        });
        let row_out = out.row_mut(y);
        for (x, value) in row_out.iter_mut().enumerate() {
            let mut others = 0.0;
            for row in rows {
                for i in 0..5 {
                    others += row[mirror(x as isize + i as isize - 2, xsize)];
                }
            }
            let center = rows[2][x];
            others -= center;
            *value = others * 0.16 + center * -3.84;
        }
    }
    Ok(out)
}

/// Builds the per-frame noise field: three planes of convolved keyed random
/// values covering the upsampled padded frame.
pub fn generate_noise_field(size: (usize, usize)) -> Result<Image3> {
    let mut field = Image3::new(size)?;
    for c in 0..3 {
        let mut raw = Plane::new(size)?;
        for y in 0..size.1 {
            random_row(c, y, raw.row_mut(y));
        }
        field.replace_plane(c, convolve_noise(&raw)?);
    }
    Ok(field)
}

/// Adds noise to `rect` of `image` in place, reading the same rectangle of
/// the pre-generated `noise` field.
pub fn add_noise(
    params: &Noise,
    rect: Rect,
    noise: &Image3,
    cmap: &ColorCorrelationParams,
    image: &mut Image3,
) {
    let ytox = cmap.y_to_x_lf();
    let ytob = cmap.y_to_b_lf();
    let [plane_x, plane_y, plane_b] = image.planes_mut();
    for y in 0..rect.ysize {
        let rnd_r = rect.row(noise.plane(0), y);
        let rnd_g = rect.row(noise.plane(1), y);
        let rnd_c = rect.row(noise.plane(2), y);
        let row_x = rect.row_mut(plane_x, y);
        let row_y = rect.row_mut(plane_y, y);
        let row_b = rect.row_mut(plane_b, y);
        for x in 0..rect.xsize {
            let vx = row_x[x];
            let vy = row_y[x];
            let in_g = vy - vx;
            let in_r = vy + vx;
            let noise_strength_g = params.strength(in_g * 0.5);
            let noise_strength_r = params.strength(in_r * 0.5);
            let addit_rnd_noise_red = rnd_r[x] * 0.22;
            let addit_rnd_noise_green = rnd_g[x] * 0.22;
            let addit_rnd_noise_correlated = rnd_c[x] * 0.22;
            let red_noise = noise_strength_r
                * (0.0078125 * addit_rnd_noise_red + 0.9921875 * addit_rnd_noise_correlated);
            let green_noise = noise_strength_g
                * (0.0078125 * addit_rnd_noise_green + 0.9921875 * addit_rnd_noise_correlated);
            let rg_noise = red_noise + green_noise;
            row_x[x] += ytox * rg_noise + red_noise - green_noise;
            row_y[x] += rg_noise;
            row_b[x] += ytob * rg_noise;
        }
    }
}
