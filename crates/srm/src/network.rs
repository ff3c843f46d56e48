use {
    crate::{
        error::InferError,
        model::{Config, Srm, CONTEXT_PREFIX, DETAIL_PREFIX},
        pretrained::{copy_matching, CopyReport},
    },
    candle_core::{DType, Device, Tensor},
    candle_nn::{VarBuilder, VarMap},
    std::{fmt, path::Path},
};

/// An `Srm` together with the variables backing it.
///
/// Parameters are owned by a `VarMap` under PyTorch-style names, so the whole
/// network can be saved, reloaded, or handed to an optimizer.
pub struct SrmNetwork {
    config: Config,
    device: Device,
    varmap: VarMap,
    model: Srm,
    pretrained: Option<(CopyReport, CopyReport)>,
}

impl fmt::Debug for SrmNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrmNetwork")
            .field("device", &self.device)
            .field("input_size", &self.config.input_size)
            .field("parameters", &self.num_parameters())
            .field("pretrained", &self.pretrained.is_some())
            .finish()
    }
}

impl SrmNetwork {
    /// Builds a randomly initialized network, then copies the configured
    /// pretrained ResNet-50 weights into both streams.
    pub fn new(config: &Config, device: Device) -> Result<Self, InferError> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = Srm::load(vb, config)?;

        let pretrained = match &config.pretrained {
            Some(source) => {
                let path = source.resolve()?;
                let detail = copy_matching(&varmap, DETAIL_PREFIX, &path)?;
                let context = copy_matching(&varmap, CONTEXT_PREFIX, &path)?;
                if detail.copied.is_empty() && context.copied.is_empty() {
                    log::warn!(
                        "No parameter names matched {}; both streams keep their random initialization",
                        path.display()
                    );
                }
                Some((detail, context))
            }
            None => None,
        };

        let network = Self {
            config: config.clone(),
            device,
            varmap,
            model,
            pretrained,
        };
        log::info!(
            "SRM ready: {}x{} input, {} parameters",
            config.input_size,
            config.input_size,
            network.num_parameters()
        );
        Ok(network)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn model(&self) -> &Srm {
        &self.model
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Copy reports for the detail and context streams, if weights were transferred.
    pub fn pretrained_reports(&self) -> Option<(&CopyReport, &CopyReport)> {
        self.pretrained.as_ref().map(|(detail, context)| (detail, context))
    }

    pub fn num_parameters(&self) -> usize {
        self.varmap
            .all_vars()
            .iter()
            .map(|var| var.elem_count())
            .sum()
    }

    pub fn forward(&self, xs: &Tensor) -> Result<(Tensor, Tensor), InferError> {
        self.model.forward(xs)
    }

    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<(Tensor, Tensor), InferError> {
        self.model.forward_t(xs, train)
    }

    /// Writes every parameter (including batch norm statistics) as safetensors.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), InferError> {
        self.varmap.save(path.as_ref())?;
        log::info!("Saved SRM weights to {}", path.as_ref().display());
        Ok(())
    }

    /// Loads a full SRM checkpoint written by `save`. Every parameter must be present.
    pub fn load_weights(&mut self, path: impl AsRef<Path>) -> Result<(), InferError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(InferError::Io(format!("weights {} not found", path.display())));
        }
        self.varmap.load(path)?;
        log::info!("Loaded SRM weights from {}", path.display());
        Ok(())
    }
}
