//! Channel-wise standardization with tracked running statistics.
//!
//! The envelope-detector pipeline standardizes its features after the
//! spatial and temporal stages: zero mean and unit variance per channel,
//! with no learned scale or shift. During training the batch statistics
//! are used (and folded into running estimates); during evaluation the
//! running estimates are used, making the stage a fixed affine map.
//!
//! These are exactly the semantics of batch normalization with the affine
//! parameters disabled: biased variance for the normalization itself,
//! unbiased variance for the running estimate, momentum 0.1, eps 1e-5.

use candle_core::{DType, Device, Tensor, Var};

use crate::error::{Error, Result};

/// Default running-statistics momentum.
const MOMENTUM: f64 = 0.1;
/// Default variance floor added before the square root.
const EPS: f64 = 1e-5;

/// Per-channel standardization over `[batch, channel, time]` tensors.
///
/// Running statistics are buffers, not trainable parameters; gradients
/// never flow into them.
#[derive(Debug)]
pub struct Standardize {
    running_mean: Var,
    running_var: Var,
    num_features: usize,
    momentum: f64,
    eps: f64,
}

impl Standardize {
    /// Create a stage for `num_features` channels with fresh statistics
    /// (mean 0, variance 1).
    pub fn new(num_features: usize, device: &Device) -> Result<Self> {
        if num_features == 0 {
            return Err(Error::Config(
                "standardization needs at least one channel".to_string(),
            ));
        }
        Ok(Self {
            running_mean: Var::from_tensor(&Tensor::zeros(
                num_features,
                DType::F32,
                device,
            )?)?,
            running_var: Var::from_tensor(&Tensor::ones(
                num_features,
                DType::F32,
                device,
            )?)?,
            num_features,
            momentum: MOMENTUM,
            eps: EPS,
        })
    }

    /// Channel count this stage was built for.
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Current running statistics as detached `(mean, variance)` tensors.
    pub fn running_stats(&self) -> (Tensor, Tensor) {
        (
            self.running_mean.as_tensor().detach(),
            self.running_var.as_tensor().detach(),
        )
    }

    /// Standardize `x` of shape `[batch, channel, time]`.
    ///
    /// With `train` set, normalization uses the batch statistics and the
    /// running estimates are updated; otherwise the running estimates are
    /// applied as-is.
    pub fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let (batch, channels, time) = x.dims3()?;
        if channels != self.num_features {
            return Err(Error::ChannelMismatch {
                expected: self.num_features,
                actual: channels,
            });
        }

        if train {
            let mean = x.mean_keepdim(2)?.mean_keepdim(0)?;
            let centered = x.broadcast_sub(&mean)?;
            let var = centered.sqr()?.mean_keepdim(2)?.mean_keepdim(0)?;
            let out = centered.broadcast_div(&var.affine(1.0, self.eps)?.sqrt()?)?;

            let count = (batch * time) as f64;
            if count > 1.0 {
                let mean_c = mean.flatten_all()?.detach();
                let var_c = var
                    .flatten_all()?
                    .detach()
                    .affine(count / (count - 1.0), 0.0)?;
                self.running_mean.set(
                    &((self.running_mean.as_tensor() * (1.0 - self.momentum))?
                        + (mean_c * self.momentum)?)?,
                )?;
                self.running_var.set(
                    &((self.running_var.as_tensor() * (1.0 - self.momentum))?
                        + (var_c * self.momentum)?)?,
                )?;
            }
            Ok(out)
        } else {
            let mean = self
                .running_mean
                .as_tensor()
                .detach()
                .reshape((1, self.num_features, 1))?;
            let var = self
                .running_var
                .as_tensor()
                .detach()
                .reshape((1, self.num_features, 1))?;
            Ok(x.broadcast_sub(&mean)?
                .broadcast_div(&var.affine(1.0, self.eps)?.sqrt()?)?)
        }
    }
}
