// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The sRGB opto-electronic transfer function and its inverse.
//!
//! Both directions share the same shape: a linear segment near zero and a
//! degree-4 rational approximation of the power-law part above it, extended
//! to negative inputs as an odd function.

/// One direction of the sRGB transfer function. `sqrt_input` feeds the
/// rational approximation `sqrt(x)` instead of `x`, which halves the
/// effective exponent the polynomials have to model.
struct SrgbCurve {
    linear_threshold: f32,
    linear_scale: f32,
    sqrt_input: bool,
    num: [f32; 5],
    den: [f32; 5],
}

impl SrgbCurve {
    #[inline]
    fn eval(&self, x: f32) -> f32 {
        let a = x.abs();
        let out = if a <= self.linear_threshold {
            a * self.linear_scale
        } else {
            let t = if self.sqrt_input { a.sqrt() } else { a };
            let mut num = self.num[4];
            let mut den = self.den[4];
            for k in (0..4).rev() {
                num = num * t + self.num[k];
                den = den * t + self.den[k];
            }
            num / den
        };
        out.copysign(x)
    }

    fn apply(&self, samples: &mut [f32]) {
        for s in samples {
            *s = self.eval(*s);
        }
    }
}

// Max error ~5e-7
#[allow(clippy::excessive_precision)]
const LINEAR_TO_SRGB: SrgbCurve = SrgbCurve {
    linear_threshold: 0.0031308,
    linear_scale: 12.92,
    sqrt_input: true,
    num: [
        -5.135152395e-4,
        5.287254571e-3,
        3.903842876e-1,
        1.474205315,
        7.352629620e-1,
    ],
    den: [
        1.004519624e-2,
        3.036675394e-1,
        1.340816930,
        9.258482155e-1,
        2.424867759e-2,
    ],
};

#[allow(clippy::excessive_precision)]
const SRGB_TO_LINEAR: SrgbCurve = SrgbCurve {
    linear_threshold: 0.04045,
    linear_scale: 1.0 / 12.92,
    sqrt_input: false,
    num: [
        2.200248328e-4,
        1.043637593e-2,
        1.624820318e-1,
        7.961564959e-1,
        8.210152774e-1,
    ],
    den: [
        2.631846970e-1,
        1.076976492,
        4.987528350e-1,
        -5.512498495e-2,
        6.521209011e-3,
    ],
};

/// Converts linear samples to the sRGB transfer curve, in place.
pub fn linear_to_srgb(samples: &mut [f32]) {
    LINEAR_TO_SRGB.apply(samples);
}

/// Converts samples in the sRGB transfer curve to linear, in place. Inverse
/// of [`linear_to_srgb`].
pub fn srgb_to_linear(samples: &mut [f32]) {
    SRGB_TO_LINEAR.apply(samples);
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::util::test::{assert_all_almost_eq, assert_almost_eq};

    fn arb_samples(
        u: &mut arbtest::arbitrary::Unstructured,
    ) -> arbtest::arbitrary::Result<Vec<f32>> {
        const DENOM: u32 = 1 << 24;

        let len = u.arbitrary_len::<u32>()?;
        let mut samples = Vec::with_capacity(len);

        // uniform distribution in [-1.0, 1.0]
        for _ in 0..len {
            let a: u32 = u.int_in_range(0..=DENOM)?;
            let signed: bool = u.arbitrary()?;
            let x = a as f32 / DENOM as f32;
            samples.push(if signed { -x } else { x });
        }

        Ok(samples)
    }

    #[test]
    fn reference_values() {
        // 20% and 50% gray, full white, and the end of the linear segment.
        let mut samples = [0.2, 0.5, 1.0, 0.0031308];
        linear_to_srgb(&mut samples);
        assert_almost_eq(samples[0], 0.484529, 1e-5);
        assert_almost_eq(samples[1], 0.735357, 1e-5);
        assert_almost_eq(samples[2], 1.0, 1e-5);
        assert_almost_eq(samples[3], 0.040450, 1e-5);
    }

    #[test]
    fn odd_symmetry() {
        let mut positive = [0.25, 0.5, 0.75];
        let mut negative = [-0.25, -0.5, -0.75];
        linear_to_srgb(&mut positive);
        linear_to_srgb(&mut negative);
        for (p, n) in positive.iter().zip(negative.iter()) {
            assert_almost_eq(p + n, 0.0, 0.0);
        }
    }

    #[test]
    fn srgb_roundtrip_arb() {
        arbtest::arbtest(|u| {
            let samples: Vec<f32> = arb_samples(u)?;
            let mut output = samples.clone();

            linear_to_srgb(&mut output);
            srgb_to_linear(&mut output);
            assert_all_almost_eq(&output, &samples, 2e-6);
            Ok(())
        });
    }
}
