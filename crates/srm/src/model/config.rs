use {
    crate::{error::InferError, pretrained::PretrainedSource},
    serde::{Deserialize, Serialize},
    std::path::Path,
};

/// Channel width of the ResNet-50 stage-3 output fed to the pyramid pooling module.
pub const CONTEXT_BACKBONE_CHANNELS: usize = 1024;

/// Channel width of the ResNet-50 stage-4 output.
pub const DETAIL_BACKBONE_CHANNELS: usize = 2048;

/// Downsampling factor of the context stream (stem /4, then two stride-2 groups).
pub const CONTEXT_STRIDE: usize = 16;

/// Downsampling factor of the detail stream.
pub const DETAIL_STRIDE: usize = 32;

/// SRM network configuration.
///
/// Every pooling kernel and resize target is derived from `input_size`; the
/// `srm384` preset reproduces the 24/12/8/4 pooling kernels and the 24 and 384
/// resize targets of the reference network.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Square input resolution in pixels.
    pub input_size: usize,
    /// Output channels of both heads (per-pixel class scores).
    pub num_classes: usize,
    /// Pooled grid sizes of the pyramid pooling branches.
    pub ppm_bins: Vec<usize>,
    /// Projection width of each pyramid pooling branch.
    pub ppm_channels: usize,
    /// Hidden width of the 3x3 head convolutions.
    pub head_channels: usize,
    /// Width the context stream is reduced to before fusion.
    pub context_channels: usize,
    pub bn_eps: f64,
    /// Where the ResNet-50 weights copied into both backbones come from.
    /// `None` leaves every parameter at its random initialization.
    pub pretrained: Option<PretrainedSource>,
}

impl Config {
    /// The reference 384x384 two-class network with torchvision ImageNet weights.
    pub fn srm384() -> Self {
        Self {
            input_size: 384,
            num_classes: 2,
            ppm_bins: vec![1, 2, 3, 6],
            ppm_channels: 512,
            head_channels: 256,
            context_channels: 64,
            bn_eps: 1e-5,
            pretrained: Some(PretrainedSource::imagenet_resnet50()),
        }
    }

    pub fn with_pretrained(mut self, pretrained: Option<PretrainedSource>) -> Self {
        self.pretrained = pretrained;
        self
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, InferError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, InferError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InferError> {
        if self.input_size == 0 || self.input_size % DETAIL_STRIDE != 0 {
            return Err(InferError::Config(format!(
                "input_size {} must be a positive multiple of {DETAIL_STRIDE}",
                self.input_size
            )));
        }
        if self.num_classes == 0 {
            return Err(InferError::Config("num_classes must be positive".to_string()));
        }
        if self.ppm_bins.is_empty() {
            return Err(InferError::Config("ppm_bins must not be empty".to_string()));
        }
        let grid = self.context_size();
        if let Some(bin) = self
            .ppm_bins
            .iter()
            .find(|&&bin| bin == 0 || grid % bin != 0)
        {
            return Err(InferError::Config(format!(
                "ppm bin {bin} does not evenly divide the {grid}x{grid} context grid"
            )));
        }
        if self.ppm_channels == 0 || self.head_channels == 0 || self.context_channels == 0 {
            return Err(InferError::Config("channel widths must be positive".to_string()));
        }
        Ok(())
    }

    /// Spatial size of the context stream and of the fusion stage (24 for 384).
    pub fn context_size(&self) -> usize {
        self.input_size / CONTEXT_STRIDE
    }

    /// Spatial size of the detail stream output (12 for 384).
    pub fn detail_size(&self) -> usize {
        self.input_size / DETAIL_STRIDE
    }

    /// Channel count of the pyramid pooling output (3072 for the reference network).
    pub fn ppm_out_channels(&self) -> usize {
        CONTEXT_BACKBONE_CHANNELS + self.ppm_bins.len() * self.ppm_channels
    }

    /// Channel count entering the fusion head (66 for the reference network).
    pub fn fusion_channels(&self) -> usize {
        self.num_classes + self.context_channels
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::srm384()
    }
}
