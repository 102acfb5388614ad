//! Depthwise temporal convolutions: the learnable FIR stage and the
//! post-activation smoother.

use candle_core::{Device, Tensor, Var};
use rand::Rng;
use rand::rngs::StdRng;

use corteza_core::{Error, Result, pad1d, same_conv_padding};

/// A learnable per-feature FIR filter with optional dilation and no bias.
///
/// Each feature channel is convolved with its own kernel; padding keeps
/// the output length equal to the input length. With dilation `d > 1` the
/// taps are applied `d` samples apart, widening the receptive field
/// without adding parameters.
#[derive(Debug)]
pub struct TemporalFilter {
    weight: Var,
    nfeatures: usize,
    kernel_size: usize,
    dilation: usize,
}

impl TemporalFilter {
    pub(crate) fn new(
        nfeatures: usize,
        kernel_size: usize,
        dilation: usize,
        rng: &mut StdRng,
        device: &Device,
    ) -> Result<Self> {
        let bound = 1.0 / (kernel_size as f32).sqrt();
        let weight: Vec<f32> = (0..nfeatures * kernel_size)
            .map(|_| (rng.r#gen::<f32>() * 2.0 - 1.0) * bound)
            .collect();
        Ok(Self {
            weight: Var::from_tensor(&Tensor::from_vec(
                weight,
                (nfeatures, 1, kernel_size),
                device,
            )?)?,
            nfeatures,
            kernel_size,
            dilation,
        })
    }

    /// Apply to `[batch, feature, time]`, preserving length.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (left, right) = same_conv_padding(self.kernel_size, self.dilation);
        let padded = pad1d(x, left, right, corteza_core::PadMode::Zero)?;
        Ok(padded.contiguous()?.conv1d(
            self.weight.as_tensor(),
            0,
            1,
            self.dilation,
            self.nfeatures,
        )?)
    }

    /// The effective kernel actually applied to undilated time steps:
    /// length `1 + (kernel_size - 1) * dilation`, with the learned taps at
    /// stride `dilation` and zeros elsewhere. Detached.
    pub fn dilated_kernel(&self) -> Result<Tensor> {
        let taps = self
            .weight
            .as_tensor()
            .reshape((self.nfeatures, self.kernel_size))?
            .to_vec2::<f32>()?;
        let length = 1 + (self.kernel_size - 1) * self.dilation;
        let mut data = vec![0f32; self.nfeatures * length];
        for (feature, row) in taps.iter().enumerate() {
            for (i, tap) in row.iter().enumerate() {
                data[feature * length + i * self.dilation] = *tap;
            }
        }
        Ok(Tensor::from_vec(
            data,
            (self.nfeatures, length),
            self.weight.device(),
        )?)
    }

    /// Overwrite the taps with externally designed values `[F, K]`.
    pub(crate) fn set_weights(&self, weight: &Tensor) -> Result<()> {
        if weight.dims() != [self.nfeatures, self.kernel_size] {
            return Err(Error::ParamShape(format!(
                "temporal weights must be [{}, {}], got {:?}",
                self.nfeatures,
                self.kernel_size,
                weight.dims()
            )));
        }
        self.weight
            .set(&weight.reshape((self.nfeatures, 1, self.kernel_size))?)?;
        Ok(())
    }

    pub(crate) fn trainable_vars(&self) -> Vec<Var> {
        vec![self.weight.clone()]
    }
}

/// A short depthwise convolution with bias, applied after the nonlinearity
/// to smooth the rectified envelope.
#[derive(Debug)]
pub struct TemporalSmoother {
    weight: Var,
    bias: Var,
    nfeatures: usize,
    kernel_size: usize,
}

impl TemporalSmoother {
    pub(crate) fn new(
        nfeatures: usize,
        kernel_size: usize,
        rng: &mut StdRng,
        device: &Device,
    ) -> Result<Self> {
        let bound = 1.0 / (kernel_size as f32).sqrt();
        let weight: Vec<f32> = (0..nfeatures * kernel_size)
            .map(|_| (rng.r#gen::<f32>() * 2.0 - 1.0) * bound)
            .collect();
        let bias: Vec<f32> = (0..nfeatures)
            .map(|_| (rng.r#gen::<f32>() * 2.0 - 1.0) * bound)
            .collect();
        Ok(Self {
            weight: Var::from_tensor(&Tensor::from_vec(
                weight,
                (nfeatures, 1, kernel_size),
                device,
            )?)?,
            bias: Var::from_tensor(&Tensor::from_vec(bias, nfeatures, device)?)?,
            nfeatures,
            kernel_size,
        })
    }

    /// Apply to `[batch, feature, time]`, preserving length.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (left, right) = same_conv_padding(self.kernel_size, 1);
        let padded = pad1d(x, left, right, corteza_core::PadMode::Zero)?;
        let y = padded.contiguous()?.conv1d(
            self.weight.as_tensor(),
            0,
            1,
            1,
            self.nfeatures,
        )?;
        Ok(y.broadcast_add(&self.bias.as_tensor().reshape((1, self.nfeatures, 1))?)?)
    }

    pub(crate) fn trainable_vars(&self) -> Vec<Var> {
        vec![self.weight.clone(), self.bias.clone()]
    }
}
