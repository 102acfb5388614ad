//! Output-rate reduction for the detector's feature sequence.

use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};

use corteza_core::{Error, Result, Window, sinc_f32};

/// How the detector reduces its output rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownsampleMethod {
    /// Non-overlapping mean pooling with kernel and stride equal to the
    /// downsampling factor. A trailing remainder shorter than the factor
    /// is dropped.
    #[default]
    #[serde(rename = "avepool")]
    AvgPool,
    /// Band-limited decimation: an anti-aliasing windowed-sinc low-pass
    /// at the target Nyquist frequency, evaluated every `factor` samples.
    #[serde(rename = "resample")]
    Resample,
    /// Keep the full rate.
    #[serde(rename = "none")]
    None,
}

/// Number of zero crossings kept on each side of the anti-aliasing
/// low-pass kernel.
const LOWPASS_ZEROS: usize = 6;

/// A constructed downsampling stage.
#[derive(Debug)]
pub(crate) enum Downsampler {
    AvgPool {
        factor: usize,
    },
    Resample {
        /// Anti-aliasing kernel, shaped `[1, 1, taps]`.
        kernel: Tensor,
        factor: usize,
        pad: usize,
    },
}

impl Downsampler {
    /// Build the stage, or `None` when `factor <= 1` or the method is
    /// [`DownsampleMethod::None`]; a unity factor always disables
    /// downsampling no matter which method was requested.
    pub(crate) fn build(
        method: DownsampleMethod,
        factor: usize,
        device: &Device,
    ) -> Result<Option<Self>> {
        if factor <= 1 {
            return Ok(None);
        }
        match method {
            DownsampleMethod::None => Ok(None),
            DownsampleMethod::AvgPool => Ok(Some(Downsampler::AvgPool { factor })),
            DownsampleMethod::Resample => {
                let taps = 2 * LOWPASS_ZEROS * factor + 1;
                let kernel = design_lowpass(taps, 1.0 / factor as f32, device)?;
                Ok(Some(Downsampler::Resample {
                    kernel,
                    factor,
                    pad: taps / 2,
                }))
            }
        }
    }

    /// Reduce the rate of `[batch, feature, time]`.
    pub(crate) fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let features = x.dim(1)?;
        match self {
            Downsampler::AvgPool { factor } => {
                let time = x.dim(2)?;
                if time < *factor {
                    return Err(Error::Config(format!(
                        "cannot pool {time} samples by a factor of {factor}"
                    )));
                }
                let kernel = Tensor::full(
                    1.0 / *factor as f32,
                    (features, 1, *factor),
                    x.device(),
                )?;
                Ok(x.contiguous()?.conv1d(&kernel, 0, *factor, 1, features)?)
            }
            Downsampler::Resample { kernel, factor, pad } => {
                let kernel = kernel.repeat((features, 1, 1))?;
                Ok(x.contiguous()?
                    .conv1d(&kernel, *pad, *factor, 1, features)?)
            }
        }
    }
}

/// Blackman-windowed sinc low-pass, `cutoff` in (0, 1] relative to the
/// Nyquist frequency, normalized to unity DC gain so envelope levels
/// survive decimation.
fn design_lowpass(taps: usize, cutoff: f32, device: &Device) -> Result<Tensor> {
    let window = Window::Blackman.coefficients(taps);
    let mid = (taps - 1) as f32 / 2.0;
    let mut coeffs: Vec<f32> = (0..taps)
        .map(|n| {
            let x = n as f32 - mid;
            cutoff * sinc_f32(cutoff * x) * window[n]
        })
        .collect();

    let sum: f32 = coeffs.iter().sum();
    if sum.abs() > f32::EPSILON {
        for c in &mut coeffs {
            *c /= sum;
        }
    }
    Ok(Tensor::from_vec(coeffs, (1, 1, taps), device)?)
}
