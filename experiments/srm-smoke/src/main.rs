use {
    candle_core::{DType, Tensor},
    log::info,
    srm::{Config, InferError, Inference},
};

fn summarize(name: &str, tensor: &Tensor) -> Result<(), InferError> {
    let values = tensor.flatten_all()?.to_vec1::<f32>()?;
    let finite = values.iter().all(|v| v.is_finite());
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    info!("{name}: shape {:?}, range [{min:.4}, {max:.4}], finite: {finite}", tensor.dims());
    if !finite {
        return Err(InferError::Runtime(format!("{name} contains non-finite values")));
    }
    Ok(())
}

fn main() -> Result<(), InferError> {
    base::init_stdout_logger();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_json_file(path)?,
        None => Config::srm384(),
    };

    #[cfg(feature = "cuda")]
    let inference = Inference::cuda(0)?;
    #[cfg(not(feature = "cuda"))]
    let inference = Inference::cpu()?;

    let network = inference.use_srm(&config)?;
    let size = config.input_size;
    let input = Tensor::ones(&[1, 3, size, size], DType::F32, inference.device())?;

    let start = std::time::Instant::now();
    let (output1, output2) = network.forward(&input)?;
    info!("forward pass took {:?}", start.elapsed());

    summarize("output1", &output1.to_dtype(DType::F32)?)?;
    summarize("output2", &output2.to_dtype(DType::F32)?)?;
    Ok(())
}
