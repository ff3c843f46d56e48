use {
    candle_core::{DType, Device, Tensor},
    candle_nn::{VarBuilder, VarMap},
    srm::{copy_matching, Config, DetailStage, InferError, PretrainedSource, Srm, SrmNetwork},
    std::{collections::HashMap, path::PathBuf},
};

fn small_config() -> Config {
    Config {
        input_size: 64,
        ppm_bins: vec![1, 2, 4],
        ..Config::srm384().with_pretrained(None)
    }
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("srm-{}-{}.safetensors", name, std::process::id()))
}

/// Writes a torchvision-style ResNet-50 checkpoint: the full trunk, an `fc`
/// classifier and `num_batches_tracked` counters, none of the SRM heads.
fn write_resnet50_checkpoint(path: &PathBuf) -> HashMap<String, Tensor> {
    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let _trunk = DetailStage::load(vb, &small_config()).unwrap();

    let mut tensors: HashMap<String, Tensor> = varmap
        .data()
        .lock()
        .unwrap()
        .iter()
        .filter(|(name, _)| !name.starts_with("conv6.") && !name.starts_with("conv7."))
        .map(|(name, var)| (name.clone(), var.as_tensor().copy().unwrap()))
        .collect();
    tensors.insert(
        "fc.weight".to_string(),
        Tensor::randn(0f32, 0.01, (1000, 2048), &device).unwrap(),
    );
    tensors.insert(
        "bn1.num_batches_tracked".to_string(),
        Tensor::new(0i64, &device).unwrap(),
    );
    candle_core::safetensors::save(&tensors, path).unwrap();
    tensors
}

fn snapshot(varmap: &VarMap, name: &str) -> Tensor {
    varmap.data().lock().unwrap()[name].as_tensor().copy().unwrap()
}

fn max_abs_diff(a: &Tensor, b: &Tensor) -> f32 {
    (a - b)
        .unwrap()
        .abs()
        .unwrap()
        .flatten_all()
        .unwrap()
        .max(0)
        .unwrap()
        .to_scalar::<f32>()
        .unwrap()
}

#[test]
fn test_copy_matching_overwrites_only_shared_names() {
    let path = temp_path("copy-shared");
    let checkpoint = write_resnet50_checkpoint(&path);

    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let config = small_config();
    let _model = Srm::load(vb, &config).unwrap();

    let head_before = snapshot(&varmap, "stage1.conv6.weight");
    let fusion_before = snapshot(&varmap, "conv1.weight");
    let ppm_before = snapshot(&varmap, "stage2.ppm.block2.1.weight");

    let detail = copy_matching(&varmap, "stage1", &path).unwrap();
    let context = copy_matching(&varmap, "stage2", &path).unwrap();

    assert_eq!(
        detail.skipped,
        vec!["conv6.bias", "conv6.weight", "conv7.bias", "conv7.weight"]
    );
    assert_eq!(detail.copied_count(), checkpoint.len() - 2);
    // one projection weight and bias per pyramid bin
    assert_eq!(context.skipped_count(), config.ppm_bins.len() * 2);
    assert!(context.skipped.iter().all(|name| name.starts_with("ppm.")));

    for name in ["conv1.weight", "bn1.running_var", "layer2.0.downsample.0.weight"] {
        for prefix in ["stage1", "stage2"] {
            let copied = snapshot(&varmap, &format!("{prefix}.{name}"));
            assert_eq!(max_abs_diff(&copied, &checkpoint[name]), 0.0, "{prefix}.{name}");
        }
    }
    let layer4 = snapshot(&varmap, "stage1.layer4.2.conv3.weight");
    assert_eq!(max_abs_diff(&layer4, &checkpoint["layer4.2.conv3.weight"]), 0.0);

    assert_eq!(max_abs_diff(&head_before, &snapshot(&varmap, "stage1.conv6.weight")), 0.0);
    assert_eq!(max_abs_diff(&fusion_before, &snapshot(&varmap, "conv1.weight")), 0.0);
    assert_eq!(
        max_abs_diff(&ppm_before, &snapshot(&varmap, "stage2.ppm.block2.1.weight")),
        0.0
    );

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_copy_matching_with_unrelated_checkpoint_copies_nothing() {
    let path = temp_path("copy-unrelated");
    let device = Device::Cpu;
    let mut tensors = HashMap::new();
    tensors.insert(
        "encoder.weight".to_string(),
        Tensor::zeros((4, 4), DType::F32, &device).unwrap(),
    );
    candle_core::safetensors::save(&tensors, &path).unwrap();

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let _model = Srm::load(vb, &small_config()).unwrap();

    let report = copy_matching(&varmap, "stage1", &path).unwrap();
    assert_eq!(report.copied_count(), 0);
    assert!(report.skipped_count() > 0);

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_copy_matching_rejects_shape_mismatch() {
    let path = temp_path("copy-mismatch");
    let device = Device::Cpu;
    let mut tensors = HashMap::new();
    tensors.insert(
        "conv1.weight".to_string(),
        Tensor::zeros((64, 3, 3, 3), DType::F32, &device).unwrap(),
    );
    candle_core::safetensors::save(&tensors, &path).unwrap();

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let _model = Srm::load(vb, &small_config()).unwrap();

    let result = copy_matching(&varmap, "stage1", &path);
    assert!(matches!(result, Err(InferError::Shape(_))));

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_copy_matching_casts_half_precision() {
    let path = temp_path("copy-f16");
    let device = Device::Cpu;
    let value = Tensor::full(0.5f32, (64,), &device).unwrap();
    let mut tensors = HashMap::new();
    tensors.insert("bn1.weight".to_string(), value.to_dtype(DType::F16).unwrap());
    candle_core::safetensors::save(&tensors, &path).unwrap();

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let _model = Srm::load(vb, &small_config()).unwrap();

    let report = copy_matching(&varmap, "stage2", &path).unwrap();
    assert_eq!(report.copied, vec!["bn1.weight"]);
    let copied = snapshot(&varmap, "stage2.bn1.weight");
    assert_eq!(copied.dtype(), DType::F32);
    assert_eq!(max_abs_diff(&copied, &value), 0.0);

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_network_construction_applies_pretrained_file() {
    let path = temp_path("network-pretrained");
    let checkpoint = write_resnet50_checkpoint(&path);

    let config = small_config().with_pretrained(Some(PretrainedSource::File(path.clone())));
    let network = SrmNetwork::new(&config, Device::Cpu).unwrap();

    let (detail, context) = network.pretrained_reports().unwrap();
    assert_eq!(detail.skipped_count(), 4);
    assert_eq!(context.skipped_count(), 6);

    let copied = snapshot(network.varmap(), "stage2.layer3.5.bn3.running_mean");
    assert_eq!(
        max_abs_diff(&copied, &checkpoint["layer3.5.bn3.running_mean"]),
        0.0
    );

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_network_construction_fails_for_missing_checkpoint() {
    let config = small_config().with_pretrained(Some(PretrainedSource::File(
        "fake_resnet50.safetensors".into(),
    )));
    let result = SrmNetwork::new(&config, Device::Cpu);
    assert!(matches!(result, Err(InferError::Io(_))));
}
