use candle_core::{Result, Tensor};

/// Resizes `(B, C, H, W)` to `(B, C, height, width)` with aligned corners:
/// output `o` reads source position `o * (H - 1) / (height - 1)`.
pub fn upsample_bilinear_aligned(xs: &Tensor, height: usize, width: usize) -> Result<Tensor> {
    let (_b, _c, h, w) = xs.dims4()?;
    if (h, w) == (height, width) {
        return Ok(xs.clone());
    }
    xs.upsample_bilinear2d(height, width, true)
}
