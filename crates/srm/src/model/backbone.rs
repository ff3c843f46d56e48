// The two ResNet-50 streams of SRM.

use {
    super::{
        blocks::{head_conv, make_layer, ResLayer, Stem},
        config::{Config, DETAIL_BACKBONE_CHANNELS},
        ppm::PyramidPooling,
    },
    candle_core::{Result, Tensor},
    candle_nn::{Conv2d, Module, VarBuilder},
};

/// Bottleneck counts of ResNet-50's four groups.
const RESNET50_DEPTHS: [usize; 4] = [3, 4, 6, 3];

/// Bottleneck widths of ResNet-50's four groups (before expansion).
const RESNET50_PLANES: [usize; 4] = [64, 128, 256, 512];

/// Full-depth ResNet-50 followed by a two-convolution class head.
///
/// Produces the coarse per-class map (`input / 32` on each side) that SRM
/// both upsamples as its auxiliary output and fuses with the context stream.
#[derive(Debug)]
pub struct DetailStage {
    stem: Stem,
    layers: Vec<ResLayer>,
    conv6: Conv2d,
    conv7: Conv2d,
}

impl DetailStage {
    pub fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let stem = Stem::load(vb.clone(), config.bn_eps)?;
        let mut inplanes = 64;
        let mut layers = Vec::with_capacity(4);
        for (i, (&planes, &depth)) in RESNET50_PLANES.iter().zip(&RESNET50_DEPTHS).enumerate() {
            let stride = if i == 0 { 1 } else { 2 };
            let (layer, channels) = make_layer(
                vb.pp(format!("layer{}", i + 1)),
                inplanes,
                planes,
                depth,
                stride,
                config.bn_eps,
            )?;
            layers.push(layer);
            inplanes = channels;
        }
        debug_assert_eq!(inplanes, DETAIL_BACKBONE_CHANNELS);
        let conv6 = head_conv(vb.pp("conv6"), inplanes, config.head_channels)?;
        let conv7 = head_conv(vb.pp("conv7"), config.head_channels, config.num_classes)?;
        Ok(Self {
            stem,
            layers,
            conv6,
            conv7,
        })
    }

    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let mut xs = self.stem.forward_t(xs, train)?;
        for layer in &self.layers {
            xs = layer.forward_t(&xs, train)?;
        }
        xs.apply(&self.conv6)?.apply(&self.conv7)
    }
}

impl Module for DetailStage {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        self.forward_t(xs, false)
    }
}

/// ResNet-50 truncated after its third group, followed by pyramid pooling.
#[derive(Debug)]
pub struct ContextStage {
    stem: Stem,
    layers: Vec<ResLayer>,
    ppm: PyramidPooling,
}

impl ContextStage {
    pub fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let stem = Stem::load(vb.clone(), config.bn_eps)?;
        let mut inplanes = 64;
        let mut layers = Vec::with_capacity(3);
        for (i, (&planes, &depth)) in RESNET50_PLANES
            .iter()
            .zip(&RESNET50_DEPTHS)
            .take(3)
            .enumerate()
        {
            let stride = if i == 0 { 1 } else { 2 };
            let (layer, channels) = make_layer(
                vb.pp(format!("layer{}", i + 1)),
                inplanes,
                planes,
                depth,
                stride,
                config.bn_eps,
            )?;
            layers.push(layer);
            inplanes = channels;
        }
        let ppm = PyramidPooling::load(
            vb.pp("ppm"),
            config.context_size(),
            &config.ppm_bins,
            config.ppm_channels,
        )?;
        Ok(Self { stem, layers, ppm })
    }

    pub fn ppm(&self) -> &PyramidPooling {
        &self.ppm
    }

    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let mut xs = self.stem.forward_t(xs, train)?;
        for layer in &self.layers {
            xs = layer.forward_t(&xs, train)?;
        }
        xs.apply(&self.ppm)
    }
}

impl Module for ContextStage {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        self.forward_t(xs, false)
    }
}
