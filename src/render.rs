// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::color::{select_xyb_transform, OutputEncoding, XybTransform};
use crate::error::Result;
use crate::features::blending::BlendingInfo;
use crate::features::noise::{generate_noise_field, Noise};
use crate::features::patches::PatchesDictionary;
use crate::features::spline::Splines;
use crate::filters::FilterWeights;
use crate::headers::{CustomTransformData, FrameDimensions, FrameHeader};
use crate::image::Image3;
use crate::{BLOCK_DIM, GROUP_DIM};

pub mod padding;
pub mod reconstruct;
pub mod upsample;

pub use reconstruct::{finalize_frame_decoding, finalize_image_rect};
pub use upsample::Upsampler;

pub const DEFAULT_COLOR_FACTOR: u32 = 84;

/// Chroma-from-luma correlation parameters; the base ratios feed splines,
/// noise and the color transform.
#[derive(Debug, Clone, Copy)]
pub struct ColorCorrelationParams {
    pub color_factor: u32,
    pub base_correlation_x: f32,
    pub base_correlation_b: f32,
    pub ytox_lf: i32,
    pub ytob_lf: i32,
}

impl Default for ColorCorrelationParams {
    fn default() -> ColorCorrelationParams {
        ColorCorrelationParams {
            color_factor: DEFAULT_COLOR_FACTOR,
            base_correlation_x: 0.0,
            base_correlation_b: 1.0,
            ytox_lf: 0,
            ytob_lf: 0,
        }
    }
}

impl ColorCorrelationParams {
    pub fn y_to_x_lf(&self) -> f32 {
        self.base_correlation_x + self.ytox_lf as f32 / self.color_factor as f32
    }

    pub fn y_to_b_lf(&self) -> f32 {
        self.base_correlation_b + self.ytob_lf as f32 / self.color_factor as f32
    }
}

/// Frame-scope decoded features, read-only during reconstruction.
#[derive(Debug, Default)]
pub struct ImageFeatures {
    pub patches: PatchesDictionary,
    pub splines: Splines,
    pub noise_params: Noise,
}

/// Everything the per-tile pipeline reads, plus the frame-global images it
/// writes. Outlives the whole frame reconstruction.
pub struct DecoderState {
    pub frame_header: FrameHeader,
    pub frame_dim: FrameDimensions,
    pub features: ImageFeatures,
    pub cmap: ColorCorrelationParams,
    pub opsin_params: crate::headers::OpsinInverseMatrix,
    pub output_encoding: OutputEncoding,
    pub blending_info: BlendingInfo,
    pub reference_frame: Option<Image3>,
    /// The inverse-quantized, inverse-transformed frame produced by the
    /// upstream decode, sized to the padded frame dimensions (or subsampled,
    /// for chroma channels).
    pub decoded: Image3,
    /// Snapshot of the pixels immediately before the color transform;
    /// present iff the frame is saved before that stage.
    pub pre_color_transform_frame: Option<Image3>,
    pub filter_weights: FilterWeights,
    pub(crate) upsampler: Upsampler,
    pub(crate) noise: Option<Image3>,
    pub(crate) xyb_transform: &'static dyn XybTransform,
}

impl DecoderState {
    pub fn new(
        frame_header: FrameHeader,
        frame_dim: FrameDimensions,
        decoded: Image3,
        features: ImageFeatures,
        cmap: ColorCorrelationParams,
    ) -> Result<DecoderState> {
        frame_header.validate()?;
        let upsampled_padded = (
            frame_dim.xsize_padded * frame_header.upsampling as usize,
            frame_dim.ysize_padded * frame_header.upsampling as usize,
        );
        let noise = if frame_header.has_noise() {
            tracing::debug!(size = ?upsampled_padded, "generating noise field");
            Some(generate_noise_field(upsampled_padded)?)
        } else {
            None
        };
        let pre_color_transform_frame = if frame_header.save_before_ct {
            Some(Image3::new(upsampled_padded)?)
        } else {
            None
        };
        let filter_weights = FilterWeights::new(&frame_dim)?;
        let upsampler = Upsampler::new(
            &CustomTransformData::default(),
            frame_header.upsampling as usize,
        )?;
        Ok(DecoderState {
            frame_header,
            frame_dim,
            features,
            cmap,
            opsin_params: crate::headers::OpsinInverseMatrix::default(),
            output_encoding: OutputEncoding::LinearSrgb,
            blending_info: BlendingInfo::default(),
            reference_frame: None,
            decoded,
            pre_color_transform_frame,
            filter_weights,
            upsampler,
            noise,
            xyb_transform: select_xyb_transform(),
        })
    }

    /// Allocates the output bundle the tile scheduler writes into; it covers
    /// the padded, upsampled grid and is shrunk to the display size once all
    /// tiles complete.
    pub fn new_output_bundle(&self) -> Result<crate::image::ImageBundle> {
        let up = self.frame_header.upsampling as usize;
        crate::image::ImageBundle::new((
            self.frame_dim.xsize_padded * up,
            self.frame_dim.ysize_padded * up,
        ))
    }

    /// Number of pixels around a tile that must be reprocessed together with
    /// it: the loop-filter border, plus the upsampler's border when the
    /// frame is upsampled.
    pub fn finalize_rect_padding(&self) -> usize {
        let padding = self.frame_header.restoration_filter.padding();
        padding + if self.frame_header.upsampling == 1 { 0 } else { 2 }
    }
}

/// Reusable per-thread scratch images. Allocated once per worker thread by
/// the tile scheduler and reused by every tile that thread processes.
pub struct GroupScratch {
    pub(crate) filter_input_storage: Image3,
    pub(crate) upsampling_input_storage: Image3,
    pub(crate) filter_storage: [Image3; 2],
}

impl GroupScratch {
    pub fn new() -> Result<GroupScratch> {
        Ok(GroupScratch {
            filter_input_storage: Image3::new((GROUP_DIM + 6 * BLOCK_DIM, GROUP_DIM + 3 * BLOCK_DIM))?,
            upsampling_input_storage: Image3::new((GROUP_DIM + 2 * BLOCK_DIM, GROUP_DIM + BLOCK_DIM))?,
            filter_storage: [
                Image3::new((GROUP_DIM + 6 * BLOCK_DIM, GROUP_DIM + 3 * BLOCK_DIM))?,
                Image3::new((GROUP_DIM + 6 * BLOCK_DIM, GROUP_DIM + 3 * BLOCK_DIM))?,
            ],
        })
    }
}
