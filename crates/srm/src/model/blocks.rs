// ResNet building blocks shared by both SRM streams.
// Parameter names follow torchvision's ResNet so ImageNet weights transfer by name.

use candle_core::{Result, Tensor};
use candle_nn::{
    batch_norm, conv2d, conv2d_no_bias, BatchNorm, Conv2d, Conv2dConfig, Module, VarBuilder,
};

/// Channel expansion of a bottleneck block.
const EXPANSION: usize = 4;

fn conv_config(stride: usize, padding: usize) -> Conv2dConfig {
    Conv2dConfig {
        stride,
        padding,
        groups: 1,
        dilation: 1,
        ..Default::default()
    }
}

/// Convolution without bias (weights at `vb.weight`).
pub fn conv_no_bias(
    vb: VarBuilder,
    c1: usize,
    c2: usize,
    k: usize,
    stride: usize,
    padding: usize,
) -> Result<Conv2d> {
    conv2d_no_bias(c1, c2, k, conv_config(stride, padding), vb)
}

/// 3x3, stride 1, padding 1 convolution with bias; the plain head convolution.
pub fn head_conv(vb: VarBuilder, c1: usize, c2: usize) -> Result<Conv2d> {
    conv2d(c1, c2, 3, conv_config(1, 1), vb)
}

/// ResNet stem: 7x7/2 conv, batch norm, ReLU, 3x3/2 max-pool (padding 1).
///
/// Loads `conv1` and `bn1` directly under `vb`, matching the flat
/// torchvision layout.
#[derive(Debug)]
pub struct Stem {
    conv1: Conv2d,
    bn1: BatchNorm,
}

impl Stem {
    pub fn load(vb: VarBuilder, bn_eps: f64) -> Result<Self> {
        let conv1 = conv_no_bias(vb.pp("conv1"), 3, 64, 7, 2, 3)?;
        let bn1 = batch_norm(64, bn_eps, vb.pp("bn1"))?;
        Ok(Self { conv1, bn1 })
    }

    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let xs = xs.apply(&self.conv1)?.apply_t(&self.bn1, train)?.relu()?;
        // Zero padding is equivalent to -inf padding here: inputs are post-ReLU.
        xs.pad_with_zeros(2, 1, 1)?
            .pad_with_zeros(3, 1, 1)?
            .max_pool2d_with_stride(3, 2)
    }
}

/// Projection shortcut: 1x1 strided conv + batch norm (`downsample.0`, `downsample.1`).
#[derive(Debug)]
pub struct Downsample {
    conv: Conv2d,
    bn: BatchNorm,
}

impl Downsample {
    pub fn load(vb: VarBuilder, c1: usize, c2: usize, stride: usize, bn_eps: f64) -> Result<Self> {
        let conv = conv_no_bias(vb.pp("0"), c1, c2, 1, stride, 0)?;
        let bn = batch_norm(c2, bn_eps, vb.pp("1"))?;
        Ok(Self { conv, bn })
    }

    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        xs.apply(&self.conv)?.apply_t(&self.bn, train)
    }
}

/// Residual bottleneck: 1x1 reduce, 3x3 (strided), 1x1 expand by `EXPANSION`.
#[derive(Debug)]
pub struct Bottleneck {
    conv1: Conv2d,
    bn1: BatchNorm,
    conv2: Conv2d,
    bn2: BatchNorm,
    conv3: Conv2d,
    bn3: BatchNorm,
    downsample: Option<Downsample>,
}

impl Bottleneck {
    pub fn load(
        vb: VarBuilder,
        inplanes: usize,
        planes: usize,
        stride: usize,
        bn_eps: f64,
    ) -> Result<Self> {
        let out = planes * EXPANSION;
        let conv1 = conv_no_bias(vb.pp("conv1"), inplanes, planes, 1, 1, 0)?;
        let bn1 = batch_norm(planes, bn_eps, vb.pp("bn1"))?;
        let conv2 = conv_no_bias(vb.pp("conv2"), planes, planes, 3, stride, 1)?;
        let bn2 = batch_norm(planes, bn_eps, vb.pp("bn2"))?;
        let conv3 = conv_no_bias(vb.pp("conv3"), planes, out, 1, 1, 0)?;
        let bn3 = batch_norm(out, bn_eps, vb.pp("bn3"))?;
        let downsample = if stride != 1 || inplanes != out {
            Some(Downsample::load(vb.pp("downsample"), inplanes, out, stride, bn_eps)?)
        } else {
            None
        };
        Ok(Self {
            conv1,
            bn1,
            conv2,
            bn2,
            conv3,
            bn3,
            downsample,
        })
    }

    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let out = xs.apply(&self.conv1)?.apply_t(&self.bn1, train)?.relu()?;
        let out = out.apply(&self.conv2)?.apply_t(&self.bn2, train)?.relu()?;
        let out = out.apply(&self.conv3)?.apply_t(&self.bn3, train)?;
        let residual = match &self.downsample {
            Some(downsample) => downsample.forward_t(xs, train)?,
            None => xs.clone(),
        };
        (out + residual)?.relu()
    }
}

impl Module for Bottleneck {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        self.forward_t(xs, false)
    }
}

/// A group of bottlenecks (`layerN`); only the first block strides and projects.
#[derive(Debug)]
pub struct ResLayer {
    blocks: Vec<Bottleneck>,
}

impl ResLayer {
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let mut xs = xs.clone();
        for block in &self.blocks {
            xs = block.forward_t(&xs, train)?;
        }
        Ok(xs)
    }
}

/// Builds `blocks` bottlenecks under `vb.0 .. vb.{blocks-1}`.
/// Returns the layer and the channel count it produces.
pub fn make_layer(
    vb: VarBuilder,
    inplanes: usize,
    planes: usize,
    blocks: usize,
    stride: usize,
    bn_eps: f64,
) -> Result<(ResLayer, usize)> {
    let mut layer = Vec::with_capacity(blocks);
    layer.push(Bottleneck::load(vb.pp("0"), inplanes, planes, stride, bn_eps)?);
    let inplanes = planes * EXPANSION;
    for i in 1..blocks {
        layer.push(Bottleneck::load(vb.pp(i.to_string()), inplanes, planes, 1, bn_eps)?);
    }
    Ok((ResLayer { blocks: layer }, inplanes))
}
