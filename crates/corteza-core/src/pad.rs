//! Signal padding along the time axis.
//!
//! Temporal filters pad before convolving so that the pad/convolve/crop
//! cycle preserves signal length. Two modes are supported: constant zeros
//! and edge-excluding reflection (the mirrored samples do not repeat the
//! boundary sample itself).

use candle_core::{D, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How to extend a signal beyond its ends before filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadMode {
    /// Extend with zeros.
    #[default]
    Zero,
    /// Mirror the signal around its endpoints, excluding the endpoint
    /// itself: `[a, b, c, d]` padded by 2 becomes `[c, b, a, b, c, d, c, b]`.
    Reflect,
}

/// Pad the last axis of `x` by `left` and `right` samples.
///
/// Reflection padding requires the signal to be longer than either pad,
/// mirroring the constraint of the underlying index construction.
pub fn pad1d(x: &Tensor, left: usize, right: usize, mode: PadMode) -> Result<Tensor> {
    if left == 0 && right == 0 {
        return Ok(x.clone());
    }
    let n = x.dim(D::Minus1)?;
    match mode {
        PadMode::Zero => Ok(x.pad_with_zeros(D::Minus1, left, right)?),
        PadMode::Reflect => {
            if left >= n || right >= n {
                return Err(Error::Config(format!(
                    "reflection padding ({left}, {right}) needs more than \
                     {} input samples, got {n}",
                    left.max(right)
                )));
            }
            let mut indices = Vec::with_capacity(left + n + right);
            for i in 0..left {
                indices.push((left - i) as u32);
            }
            for i in 0..n {
                indices.push(i as u32);
            }
            for i in 0..right {
                indices.push((n - 2 - i) as u32);
            }
            let indices = Tensor::from_vec(indices, left + n + right, x.device())?;
            Ok(x.contiguous()?.index_select(&indices, D::Minus1)?)
        }
    }
}

/// Left/right zero padding that keeps a convolution's output length equal
/// to its input length, for a kernel of `kernel_size` taps applied with
/// `dilation`. When the total is odd the extra sample goes to the right.
pub fn same_conv_padding(kernel_size: usize, dilation: usize) -> (usize, usize) {
    let total = dilation * kernel_size.saturating_sub(1);
    let left = total / 2;
    (left, total - left)
}
