// Pretrained ResNet-50 weights and the name-intersection copy into a VarMap.

use {
    crate::error::InferError,
    candle_core::{DType, Device, Tensor},
    candle_nn::VarMap,
    safetensors::SafeTensors,
    serde::{Deserialize, Serialize},
    std::{
        fs::File,
        path::{Path, PathBuf},
    },
};

/// Hub repository holding torchvision's ImageNet ResNet-50 weights in safetensors form.
pub const IMAGENET_RESNET50_REPO: &str = "timm/resnet50.tv_in1k";
pub const IMAGENET_RESNET50_FILE: &str = "model.safetensors";

/// Location of a pretrained checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PretrainedSource {
    /// Local safetensors file.
    File(PathBuf),
    /// File in a model hub repository, downloaded once into the local hub cache.
    Hub { repo: String, filename: String },
}

impl PretrainedSource {
    pub fn imagenet_resnet50() -> Self {
        PretrainedSource::Hub {
            repo: IMAGENET_RESNET50_REPO.to_string(),
            filename: IMAGENET_RESNET50_FILE.to_string(),
        }
    }

    /// Local path of the checkpoint, downloading it first for hub sources.
    pub fn resolve(&self) -> Result<PathBuf, InferError> {
        match self {
            PretrainedSource::File(path) => {
                if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(InferError::Io(format!(
                        "pretrained checkpoint {} not found",
                        path.display()
                    )))
                }
            }
            PretrainedSource::Hub { repo, filename } => {
                log::info!("Fetching pretrained weights {repo}/{filename}");
                let api = hf_hub::api::sync::Api::new()?;
                let path = api.model(repo.clone()).get(filename)?;
                log::info!("Pretrained weights cached at {}", path.display());
                Ok(path)
            }
        }
    }
}

/// Outcome of a `copy_matching` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// Variables overwritten from the checkpoint (names without the prefix).
    pub copied: Vec<String>,
    /// Variables under the prefix with no counterpart in the checkpoint.
    pub skipped: Vec<String>,
}

impl CopyReport {
    pub fn copied_count(&self) -> usize {
        self.copied.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Overwrites every variable of `varmap` named `{prefix}.{name}` with the
/// checkpoint tensor called `{name}`, when the checkpoint has one.
///
/// Names present on only one side are skipped without error, so layers the
/// checkpoint does not know keep their initialization. A shared name whose
/// shapes differ is an error. An empty `prefix` matches every variable.
pub fn copy_matching(
    varmap: &VarMap,
    prefix: &str,
    checkpoint: impl AsRef<Path>,
) -> Result<CopyReport, InferError> {
    let checkpoint = checkpoint.as_ref();
    let file = File::open(checkpoint)?;
    let buffer = unsafe { memmap2::MmapOptions::new().map(&file)? };
    let tensors = SafeTensors::deserialize(&buffer)?;

    let mut report = CopyReport::default();
    let vars = varmap
        .data()
        .lock()
        .map_err(|e| InferError::Runtime(format!("variable map poisoned: {e}")))?;
    let mut names: Vec<&String> = vars.keys().collect();
    names.sort();

    for full_name in names {
        let Some(name) = strip_prefix(full_name, prefix) else {
            continue;
        };
        let view = match tensors.tensor(name) {
            Ok(view) => view,
            Err(_) => {
                report.skipped.push(name.to_string());
                continue;
            }
        };
        let var = &vars[full_name];
        if view.shape() != var.dims() {
            return Err(InferError::Shape(format!(
                "{full_name}: checkpoint shape {:?} does not match {:?}",
                view.shape(),
                var.dims()
            )));
        }
        let value = view_to_tensor(&view, var.device())?.to_dtype(var.dtype())?;
        var.set(&value)?;
        report.copied.push(name.to_string());
    }

    log::info!(
        "Copied {} pretrained tensors into '{}' from {} ({} kept their initialization)",
        report.copied_count(),
        prefix,
        checkpoint.display(),
        report.skipped_count()
    );
    if !report.skipped.is_empty() {
        log::debug!("Not in checkpoint: {}", report.skipped.join(", "));
    }
    Ok(report)
}

fn strip_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(name);
    }
    name.strip_prefix(prefix)?.strip_prefix('.')
}

fn view_to_tensor(view: &safetensors::tensor::TensorView, device: &Device) -> Result<Tensor, InferError> {
    let dtype = match view.dtype() {
        safetensors::Dtype::F32 => DType::F32,
        safetensors::Dtype::F16 => DType::F16,
        safetensors::Dtype::BF16 => DType::BF16,
        safetensors::Dtype::F64 => DType::F64,
        safetensors::Dtype::U8 => DType::U8,
        safetensors::Dtype::U32 => DType::U32,
        safetensors::Dtype::I64 => DType::I64,
        other => {
            return Err(InferError::Checkpoint(format!(
                "unsupported tensor dtype {other:?}"
            )));
        }
    };
    Ok(Tensor::from_raw_buffer(view.data(), dtype, view.shape(), device)?)
}
