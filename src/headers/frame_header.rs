// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::{Error, Result};
use crate::{BLOCK_DIM, GROUP_DIM};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    VarDCT,
    Modular,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorTransform {
    Xyb,
    YCbCr,
    None,
}

pub struct Flags;

impl Flags {
    pub const NOISE: u64 = 1;
    pub const PATCHES: u64 = 2;
    pub const SPLINES: u64 = 16;
}

/// Per-channel chroma subsampling, expressed as horizontal and vertical
/// halving shifts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChromaSubsampling {
    hshift: [u32; 3],
    vshift: [u32; 3],
}

impl ChromaSubsampling {
    pub const MAX_SHIFT: u32 = 2;

    pub fn new(hshift: [u32; 3], vshift: [u32; 3]) -> Result<ChromaSubsampling> {
        for &s in hshift.iter().chain(vshift.iter()) {
            if s > Self::MAX_SHIFT {
                return Err(Error::InvalidChromaShift(s));
            }
        }
        Ok(ChromaSubsampling { hshift, vshift })
    }

    /// 4:2:0 with full-resolution Y in channel 1.
    pub fn c420() -> ChromaSubsampling {
        ChromaSubsampling {
            hshift: [1, 0, 1],
            vshift: [1, 0, 1],
        }
    }

    pub fn is_444(&self) -> bool {
        self.hshift == [0; 3] && self.vshift == [0; 3]
    }

    pub fn hshift(&self, c: usize) -> u32 {
        self.hshift[c]
    }

    pub fn vshift(&self, c: usize) -> u32 {
        self.vshift[c]
    }
}

impl Default for ChromaSubsampling {
    fn default() -> ChromaSubsampling {
        ChromaSubsampling {
            hshift: [0; 3],
            vshift: [0; 3],
        }
    }
}

/// Restoration filter parameters: gaborish smoothing and the iterated
/// edge-preserving filter.
#[derive(Clone, Debug, PartialEq)]
pub struct RestorationFilter {
    pub gab: bool,
    pub gab_x_weight1: f32,
    pub gab_x_weight2: f32,
    pub gab_y_weight1: f32,
    pub gab_y_weight2: f32,
    pub gab_b_weight1: f32,
    pub gab_b_weight2: f32,
    pub epf_iters: u32,
    pub epf_sharp_lut: [f32; 8],
    pub epf_channel_scale: [f32; 3],
    pub epf_quant_mul: f32,
    pub epf_pass0_sigma_scale: f32,
    pub epf_pass2_sigma_scale: f32,
    pub epf_border_sad_mul: f32,
    pub epf_sigma_for_modular: f32,
}

impl Default for RestorationFilter {
    fn default() -> RestorationFilter {
        RestorationFilter {
            gab: true,
            gab_x_weight1: 0.115169525,
            gab_x_weight2: 0.061248592,
            gab_y_weight1: 0.115169525,
            gab_y_weight2: 0.061248592,
            gab_b_weight1: 0.115169525,
            gab_b_weight2: 0.061248592,
            epf_iters: 2,
            epf_sharp_lut: [
                0.0,
                1.0 / 7.0,
                2.0 / 7.0,
                3.0 / 7.0,
                4.0 / 7.0,
                5.0 / 7.0,
                6.0 / 7.0,
                1.0,
            ],
            epf_channel_scale: [40.0, 5.0, 3.5],
            epf_quant_mul: 0.46,
            epf_pass0_sigma_scale: 0.9,
            epf_pass2_sigma_scale: 6.5,
            epf_border_sad_mul: 2.0 / 3.0,
            epf_sigma_for_modular: 1.0,
        }
    }
}

impl RestorationFilter {
    /// Neither filter enabled.
    pub fn disabled() -> RestorationFilter {
        RestorationFilter {
            gab: false,
            epf_iters: 0,
            ..RestorationFilter::default()
        }
    }

    /// Number of border pixels the enabled filter chain reads outside the
    /// rectangle it produces. One EPF iteration is a 5x5 filter, the second
    /// adds a 3x3 pass and the third a 7x7 pass; gaborish is 3x3.
    pub fn padding(&self) -> usize {
        const EPF_BORDER: [usize; 4] = [0, 2, 3, 6];
        EPF_BORDER[self.epf_iters as usize] + if self.gab { 1 } else { 0 }
    }

    pub fn validate(&self) -> Result<()> {
        if self.epf_iters > 3 {
            return Err(Error::InvalidEpfIterations(self.epf_iters));
        }
        Ok(())
    }
}

/// Frame header fields consumed by the reconstruction pipeline. This crate
/// receives an already-validated header; there is no bitstream I/O here.
#[derive(Clone, Debug)]
pub struct FrameHeader {
    pub encoding: Encoding,
    pub color_transform: ColorTransform,
    pub flags: u64,
    pub upsampling: u32,
    pub chroma_subsampling: ChromaSubsampling,
    pub restoration_filter: RestorationFilter,
    pub save_before_ct: bool,
}

impl Default for FrameHeader {
    fn default() -> FrameHeader {
        FrameHeader {
            encoding: Encoding::VarDCT,
            color_transform: ColorTransform::Xyb,
            flags: 0,
            upsampling: 1,
            chroma_subsampling: ChromaSubsampling::default(),
            restoration_filter: RestorationFilter::default(),
            save_before_ct: false,
        }
    }
}

impl FrameHeader {
    pub fn has_noise(&self) -> bool {
        self.flags & Flags::NOISE != 0
    }

    pub fn needs_color_transform(&self) -> bool {
        !self.save_before_ct
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.upsampling, 1 | 2 | 4 | 8) {
            return Err(Error::InvalidUpsampling(self.upsampling));
        }
        self.restoration_filter.validate()
    }
}

/// Sizes derived from the frame dimensions, all in the pre-upsampling
/// coordinate system except for the `_upsampled` pair.
#[derive(Clone, Copy, Debug)]
pub struct FrameDimensions {
    pub xsize: usize,
    pub ysize: usize,
    pub xsize_padded: usize,
    pub ysize_padded: usize,
    pub xsize_upsampled: usize,
    pub ysize_upsampled: usize,
    pub xsize_groups: usize,
    pub ysize_groups: usize,
    pub xsize_blocks: usize,
    pub ysize_blocks: usize,
}

impl FrameDimensions {
    /// `xsize_upsampled` x `ysize_upsampled` is the displayed size; the
    /// reconstruction itself runs on the padded, pre-upsampling grid.
    pub fn new(xsize_upsampled: usize, ysize_upsampled: usize, upsampling: u32) -> FrameDimensions {
        let up = upsampling as usize;
        let xsize = xsize_upsampled.div_ceil(up);
        let ysize = ysize_upsampled.div_ceil(up);
        let xsize_padded = crate::util::round_up_to(xsize, BLOCK_DIM);
        let ysize_padded = crate::util::round_up_to(ysize, BLOCK_DIM);
        FrameDimensions {
            xsize,
            ysize,
            xsize_padded,
            ysize_padded,
            xsize_upsampled,
            ysize_upsampled,
            xsize_groups: xsize_padded.div_ceil(GROUP_DIM),
            ysize_groups: ysize_padded.div_ceil(GROUP_DIM),
            xsize_blocks: xsize_padded / BLOCK_DIM,
            ysize_blocks: ysize_padded / BLOCK_DIM,
        }
    }
}
