// SRM two-stream saliency network.
//
// A full-depth ResNet-50 detail stream and a truncated ResNet-50 context stream
// with pyramid pooling, fused into a second, finer prediction.

mod backbone;
mod blocks;
pub mod config;
mod ppm;
mod resample;

pub use backbone::{ContextStage, DetailStage};
pub use config::Config;
pub use ppm::PyramidPooling;

use {
    crate::error::InferError,
    blocks::head_conv,
    resample::upsample_bilinear_aligned,
    candle_core::Tensor,
    candle_nn::{Conv2d, VarBuilder},
};

/// Prefix of the detail stream's parameters (`stage1.layer1.0.conv1.weight`, ...).
pub const DETAIL_PREFIX: &str = "stage1";

/// Prefix of the context stream's parameters.
pub const CONTEXT_PREFIX: &str = "stage2";

/// SRM fusion network.
///
/// `forward` returns `(output1, output2)`, both `(B, num_classes, input, input)`:
/// the detail stream's prediction upsampled directly, and the fused
/// detail + context prediction.
#[derive(Debug)]
pub struct Srm {
    config: Config,
    stage1: DetailStage,
    stage2: ContextStage,
    conv1: Conv2d,
    conv2: Conv2d,
    conv6: Conv2d,
    conv7: Conv2d,
}

impl Srm {
    pub fn load(vb: VarBuilder, config: &Config) -> Result<Self, InferError> {
        config.validate()?;
        let stage1 = DetailStage::load(vb.pp(DETAIL_PREFIX), config)?;
        let stage2 = ContextStage::load(vb.pp(CONTEXT_PREFIX), config)?;

        // Context reduction: 3072 -> 256 -> 64
        let conv1 = head_conv(vb.pp("conv1"), config.ppm_out_channels(), config.head_channels)?;
        let conv2 = head_conv(vb.pp("conv2"), config.head_channels, config.context_channels)?;

        // Fusion head: 66 -> 256 -> 2
        let conv6 = head_conv(vb.pp("conv6"), config.fusion_channels(), config.head_channels)?;
        let conv7 = head_conv(vb.pp("conv7"), config.head_channels, config.num_classes)?;

        Ok(Self {
            config: config.clone(),
            stage1,
            stage2,
            conv1,
            conv2,
            conv6,
            conv7,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn detail_stage(&self) -> &DetailStage {
        &self.stage1
    }

    pub fn context_stage(&self) -> &ContextStage {
        &self.stage2
    }

    /// Inference-mode forward pass (batch norm uses running statistics).
    pub fn forward(&self, xs: &Tensor) -> Result<(Tensor, Tensor), InferError> {
        self.forward_t(xs, false)
    }

    /// Forward pass; `train` selects batch statistics in every batch norm and
    /// updates their running averages.
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<(Tensor, Tensor), InferError> {
        self.check_input(xs)?;
        let size = self.config.input_size;
        let grid = self.config.context_size();

        let feature1 = self.stage1.forward_t(xs, train)?;
        let output1 = upsample_bilinear_aligned(&feature1, size, size)?;

        let feature2 = self
            .stage2
            .forward_t(xs, train)?
            .apply(&self.conv1)?
            .apply(&self.conv2)?;
        let feature1 = upsample_bilinear_aligned(&feature1, grid, grid)?;

        let feature = Tensor::cat(&[&feature1, &feature2], 1)?
            .apply(&self.conv6)?
            .apply(&self.conv7)?;
        let output2 = upsample_bilinear_aligned(&feature, size, size)?;

        Ok((output1, output2))
    }

    fn check_input(&self, xs: &Tensor) -> Result<(), InferError> {
        let size = self.config.input_size;
        match xs.dims() {
            &[b, 3, h, w] if b > 0 && h == size && w == size => Ok(()),
            dims => Err(InferError::Shape(format!(
                "expected input of shape (B, 3, {size}, {size}), got {dims:?}"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "tests/srm_test.rs"]
mod srm_test;
