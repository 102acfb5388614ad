//! Shared parameter storage and the pad/convolve/crop engine.
//!
//! Every filter layer in this crate derives its impulse response from two
//! per-channel quantities, a center frequency and a bandwidth. Each can be
//! learned (stored raw and pushed through a reparameterization map on
//! every use) or fixed at construction. The discretization grid, padding
//! behavior, and depthwise convolution plumbing are identical across
//! kernel shapes and live here, composed into the concrete layers rather
//! than inherited.

use candle_core::{D, Device, Tensor, Var};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use corteza_core::{Error, PadMode, Result, logit, pad1d, sigmoid, softplus};

/// A fixed (non-learnable) per-channel value: either one scalar broadcast
/// to every channel or an explicit value per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixedParam {
    /// One value shared by all channels.
    Scalar(f32),
    /// One value per channel; a single-element vector broadcasts.
    PerChannel(Vec<f32>),
}

impl FixedParam {
    /// Expand to one value per channel, validating the length.
    pub fn to_channel_values(&self, channels: usize) -> Result<Vec<f32>> {
        match self {
            FixedParam::Scalar(v) => Ok(vec![*v; channels]),
            FixedParam::PerChannel(values) => match values.len() {
                1 => Ok(vec![values[0]; channels]),
                n if n == channels => Ok(values.clone()),
                n => Err(Error::ParamShape(format!(
                    "fixed parameter has {n} values, expected 1 or {channels}"
                ))),
            },
        }
    }
}

impl From<f32> for FixedParam {
    fn from(v: f32) -> Self {
        FixedParam::Scalar(v)
    }
}

impl From<Vec<f32>> for FixedParam {
    fn from(v: Vec<f32>) -> Self {
        FixedParam::PerChannel(v)
    }
}

/// Construction-time description of a parametric filter layer.
///
/// # Units
///
/// `init_fmin` / `init_fmax` bound the *raw* frequency parameter, which is
/// realized through softplus on every forward pass. The effective initial
/// frequency is therefore `softplus(raw)`, not the raw draw itself; pick
/// the range in the pre-softplus domain. This mirrors the historical
/// behavior of the layers and is deliberately not corrected here.
///
/// A fixed `bandwidth` is an *absolute* width in Hz, used as-is. A learned
/// bandwidth is a sigmoid-bounded *fraction* of the realized frequency.
/// The two spellings intentionally have different units; see the project
/// design notes before "fixing" this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Number of independent channels (one kernel per channel).
    pub channels: usize,
    /// Kernel length in taps. Odd lengths center the grid at zero; even
    /// lengths shift it half a tap toward positive time.
    pub kernel_size: usize,
    /// Input sample rate in Hz.
    pub sample_rate: f32,
    /// Lower bound of the raw frequency initialization range.
    #[serde(default = "default_init_fmin")]
    pub init_fmin: f32,
    /// Upper bound of the raw frequency initialization range.
    #[serde(default = "default_init_fmax")]
    pub init_fmax: f32,
    /// Fixed center frequency in Hz; `None` learns it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq: Option<FixedParam>,
    /// Fixed absolute bandwidth in Hz; `None` learns a fraction instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<FixedParam>,
    /// Padding mode for the length-preserving convolution.
    #[serde(default)]
    pub pad_mode: PadMode,
    /// Seed for reproducible parameter initialization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_init_fmin() -> f32 {
    1.0
}

fn default_init_fmax() -> f32 {
    40.0
}

impl FilterConfig {
    /// A learnable filter bank over `channels` channels.
    pub fn new(channels: usize, kernel_size: usize, sample_rate: f32) -> Self {
        Self {
            channels,
            kernel_size,
            sample_rate,
            init_fmin: default_init_fmin(),
            init_fmax: default_init_fmax(),
            freq: None,
            bandwidth: None,
            pad_mode: PadMode::default(),
            seed: None,
        }
    }

    /// Set the raw-frequency initialization range.
    pub fn with_init_range(mut self, fmin: f32, fmax: f32) -> Self {
        self.init_fmin = fmin;
        self.init_fmax = fmax;
        self
    }

    /// Fix the center frequency instead of learning it.
    pub fn with_fixed_freq(mut self, freq: impl Into<FixedParam>) -> Self {
        self.freq = Some(freq.into());
        self
    }

    /// Fix the absolute bandwidth in Hz instead of learning a fraction.
    pub fn with_fixed_bandwidth(mut self, bandwidth: impl Into<FixedParam>) -> Self {
        self.bandwidth = Some(bandwidth.into());
        self
    }

    /// Select the padding mode.
    pub fn with_pad_mode(mut self, mode: PadMode) -> Self {
        self.pad_mode = mode;
        self
    }

    /// Seed the parameter initialization.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check the configuration for values that would produce garbage
    /// kernels rather than errors downstream.
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 {
            return Err(Error::Config("channel count must be positive".to_string()));
        }
        if self.kernel_size == 0 {
            return Err(Error::Config("kernel size must be positive".to_string()));
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::Config(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.init_fmin > self.init_fmax {
            return Err(Error::Config(format!(
                "initialization range is inverted: [{}, {}]",
                self.init_fmin, self.init_fmax
            )));
        }
        if let Some(freq) = &self.freq {
            freq.to_channel_values(self.channels)?;
        }
        if let Some(bandwidth) = &self.bandwidth {
            bandwidth.to_channel_values(self.channels)?;
        }
        Ok(())
    }
}

/// Realized per-channel frequencies, all shaped `[channels]`.
#[derive(Debug, Clone)]
pub struct Frequencies {
    /// Center frequency in Hz, strictly positive when learned.
    pub freq: Tensor,
    /// Absolute bandwidth in Hz.
    pub bandwidth: Tensor,
    /// Lower band edge, `freq - bandwidth/2`.
    pub low: Tensor,
    /// Upper band edge, `freq + bandwidth/2`.
    pub high: Tensor,
}

/// A parameter that is either learned raw or fixed at construction.
#[derive(Debug)]
enum Param {
    Learned(Var),
    Fixed(Tensor),
}

impl Param {
    fn var(&self) -> Option<&Var> {
        match self {
            Param::Learned(v) => Some(v),
            Param::Fixed(_) => None,
        }
    }
}

/// Parameter storage plus the shared pad/convolve/crop engine.
#[derive(Debug)]
pub struct FilterParams {
    channels: usize,
    kernel_size: usize,
    sample_rate: f32,
    pad: usize,
    grid: Tensor,
    pad_mode: PadMode,
    freq: Param,
    bandwidth: Param,
}

impl FilterParams {
    /// Build parameter storage from a validated configuration.
    pub fn new(config: &FilterConfig, device: &Device) -> Result<Self> {
        config.validate()?;
        let channels = config.channels;
        let kernel_size = config.kernel_size;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let freq = match &config.freq {
            Some(fixed) => Param::Fixed(Tensor::from_vec(
                fixed.to_channel_values(channels)?,
                channels,
                device,
            )?),
            None => {
                let span = config.init_fmax - config.init_fmin;
                let raw: Vec<f32> = (0..channels)
                    .map(|_| config.init_fmin + rng.r#gen::<f32>() * span)
                    .collect();
                Param::Learned(Var::from_tensor(&Tensor::from_vec(
                    raw, channels, device,
                )?)?)
            }
        };

        let bandwidth = match &config.bandwidth {
            Some(fixed) => Param::Fixed(Tensor::from_vec(
                fixed.to_channel_values(channels)?,
                channels,
                device,
            )?),
            None => {
                // Raw value chosen so the sigmoid-mapped fraction starts
                // uniformly in (0.1, 0.9).
                let raw: Vec<f32> = (0..channels)
                    .map(|_| logit(0.1 + rng.r#gen::<f32>() * 0.8))
                    .collect();
                Param::Learned(Var::from_tensor(&Tensor::from_vec(
                    raw, channels, device,
                )?)?)
            }
        };

        Ok(Self {
            channels,
            kernel_size,
            sample_rate: config.sample_rate,
            pad: kernel_size / 2,
            grid: discretization_grid(kernel_size, config.sample_rate, device)?,
            pad_mode: config.pad_mode,
            freq,
            bandwidth,
        })
    }

    /// Channel count.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Kernel length in taps.
    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Time offsets of the kernel taps in seconds, shaped `[1, 1, K]`.
    pub fn grid(&self) -> &Tensor {
        &self.grid
    }

    /// Learnable variables of this parameter set (possibly empty).
    pub fn trainable_vars(&self) -> Vec<Var> {
        [self.freq.var(), self.bandwidth.var()]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    /// Realize frequencies and band edges from the current parameters.
    ///
    /// A learned frequency goes through softplus; a learned bandwidth goes
    /// through sigmoid and scales the realized frequency. Fixed values are
    /// used verbatim, so a fixed bandwidth is absolute Hz.
    pub fn compute_frequencies(&self) -> Result<Frequencies> {
        let freq = match &self.freq {
            Param::Learned(v) => softplus(v.as_tensor())?,
            Param::Fixed(t) => t.clone(),
        };
        let bandwidth = match &self.bandwidth {
            Param::Learned(v) => sigmoid(v.as_tensor())?.mul(&freq)?,
            Param::Fixed(t) => t.clone(),
        };
        let half = (&bandwidth * 0.5)?;
        let low = (&freq - &half)?;
        let high = (&freq + &half)?;
        Ok(Frequencies {
            freq,
            bandwidth,
            low,
            high,
        })
    }

    /// Normalize input rank to `[batch, channel, time]`, checking the
    /// channel axis. Returns the original rank for the inverse step.
    pub(crate) fn check_input(&self, x: &Tensor) -> Result<(Tensor, usize)> {
        let rank = x.rank();
        let x3 = match rank {
            1 => x.unsqueeze(0)?.unsqueeze(0)?,
            2 => x.unsqueeze(0)?,
            3 => x.clone(),
            r => {
                return Err(Error::Config(format!(
                    "filter input must have 1 to 3 axes, got {r}"
                )));
            }
        };
        let channels = x3.dim(1)?;
        if channels != self.channels {
            return Err(Error::ChannelMismatch {
                expected: self.channels,
                actual: channels,
            });
        }
        Ok((x3, rank))
    }

    /// Undo [`Self::check_input`]'s rank normalization.
    pub(crate) fn restore_rank(&self, y: Tensor, rank: usize) -> Result<Tensor> {
        Ok(match rank {
            1 => y.squeeze(0)?.squeeze(0)?,
            2 => y.squeeze(0)?,
            _ => y,
        })
    }

    /// Pad by twice the nominal half-kernel and convolve depthwise with
    /// valid alignment. The result is *uncropped*; callers that transform
    /// the filtered signal (e.g. the analytic step) do so before cropping.
    pub(crate) fn filter(&self, x3: &Tensor, kernel: &Tensor) -> Result<Tensor> {
        let padded = pad1d(x3, 2 * self.pad, 2 * self.pad, self.pad_mode)?;
        Ok(padded
            .contiguous()?
            .conv1d(&kernel.contiguous()?, 0, 1, 1, self.channels)?)
    }

    /// Crop the convolution margin so output length equals input length.
    ///
    /// The nominal half-kernel is removed from both ends; even kernel
    /// lengths shed one extra trailing sample, matching the rightward
    /// half-tap shift of the even-length grid.
    pub(crate) fn crop(&self, y: &Tensor) -> Result<Tensor> {
        let total = y.dim(D::Minus1)?;
        let extra = 1 - self.kernel_size % 2;
        let keep = total
            .checked_sub(2 * self.pad + extra)
            .ok_or_else(|| {
                Error::Config(format!(
                    "signal of {total} samples is too short for kernel size {}",
                    self.kernel_size
                ))
            })?;
        Ok(y.narrow(D::Minus1, self.pad, keep)?)
    }
}

/// Tap time offsets in seconds: `arange(floor(-k/2)+1 ..= k/2) / rate`,
/// shaped `[1, 1, k]`. Even k is asymmetric around zero by construction.
fn discretization_grid(kernel_size: usize, sample_rate: f32, device: &Device) -> Result<Tensor> {
    let k = kernel_size as i64;
    let start = (-k).div_euclid(2) + 1;
    let offsets: Vec<f32> = (start..=k / 2)
        .map(|i| i as f32 / sample_rate)
        .collect();
    debug_assert_eq!(offsets.len(), kernel_size);
    Ok(Tensor::from_vec(offsets, (1, 1, kernel_size), device)?)
}
