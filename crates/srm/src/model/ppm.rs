// Pyramid pooling over the context stream.

use {
    super::{config::CONTEXT_BACKBONE_CHANNELS, resample::upsample_bilinear_aligned},
    candle_core::{Result, Tensor},
    candle_nn::{conv2d, Conv2d, Conv2dConfig, Module, VarBuilder},
};

/// One pooling branch: `block{i}.0` is the (parameterless) average pool,
/// `block{i}.1` the 1x1 projection.
#[derive(Debug)]
struct PoolBranch {
    kernel: usize,
    proj: Conv2d,
}

impl PoolBranch {
    fn forward(&self, xs: &Tensor, grid: usize) -> Result<Tensor> {
        let pooled = xs.avg_pool2d_with_stride(self.kernel, self.kernel)?;
        let projected = pooled.apply(&self.proj)?;
        upsample_bilinear_aligned(&projected, grid, grid)
    }
}

/// Pyramid Pooling Module.
///
/// Pools a `grid x grid` map of 1024 channels into `bins` (1, 2, 3 and 6 for
/// the reference network), projects each to `channels`, upsamples back to
/// `grid x grid` and concatenates `[x, branch_1, .., branch_n]` along channels.
#[derive(Debug)]
pub struct PyramidPooling {
    grid: usize,
    branches: Vec<PoolBranch>,
}

impl PyramidPooling {
    pub fn load(vb: VarBuilder, grid: usize, bins: &[usize], channels: usize) -> Result<Self> {
        let mut branches = Vec::with_capacity(bins.len());
        for (i, &bin) in bins.iter().enumerate() {
            if bin == 0 || grid % bin != 0 {
                candle_core::bail!("pyramid bin {bin} does not divide a {grid}x{grid} grid");
            }
            let proj = conv2d(
                CONTEXT_BACKBONE_CHANNELS,
                channels,
                1,
                Conv2dConfig::default(),
                vb.pp(format!("block{}", i + 1)).pp("1"),
            )?;
            branches.push(PoolBranch {
                kernel: grid / bin,
                proj,
            });
        }
        Ok(Self { grid, branches })
    }

    /// Average-pool kernel (and stride) of every branch, in branch order.
    pub fn kernels(&self) -> Vec<usize> {
        self.branches.iter().map(|branch| branch.kernel).collect()
    }
}

impl Module for PyramidPooling {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut features = Vec::with_capacity(self.branches.len() + 1);
        features.push(xs.clone());
        for branch in &self.branches {
            features.push(branch.forward(xs, self.grid)?);
        }
        Tensor::cat(&features, 1)
    }
}
