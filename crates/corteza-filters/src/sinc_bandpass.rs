//! Learnable sinc band-pass filter layer.

use candle_core::{Device, Tensor, Var};
use tracing::debug;

use crate::kernel::{Kernel, KernelBuilder, sinc_bandpass_kernel};
use crate::params::{FilterConfig, FilterParams, Frequencies};
use corteza_core::{Result, Window};

/// A bank of per-channel band-pass filters with learnable band edges.
///
/// The impulse response is the Hamming-windowed difference of two ideal
/// low-pass (sinc) kernels at the upper and lower cutoff, so the band
/// edges follow the center frequency and bandwidth parameters wherever
/// gradient descent moves them. The forward pass preserves signal length.
///
/// # Example
///
/// ```rust
/// use candle_core::{Device, Tensor};
/// use corteza_filters::{FilterConfig, SincBandpass};
///
/// let device = Device::Cpu;
/// let config = FilterConfig::new(2, 65, 250.0).with_seed(1);
/// let filter = SincBandpass::new(config, &device).unwrap();
///
/// let x = Tensor::zeros((2, 500), candle_core::DType::F32, &device).unwrap();
/// let y = filter.forward(&x).unwrap();
/// assert_eq!(y.dims(), &[2, 500]);
/// ```
#[derive(Debug)]
pub struct SincBandpass {
    params: FilterParams,
    window: Tensor,
}

impl SincBandpass {
    /// Build the layer on `device`.
    pub fn new(config: FilterConfig, device: &Device) -> Result<Self> {
        let params = FilterParams::new(&config, device)?;
        let window = Window::Hamming
            .tensor(config.kernel_size, device)?
            .reshape((1, 1, config.kernel_size))?;
        debug!(
            channels = config.channels,
            kernel_size = config.kernel_size,
            sample_rate = config.sample_rate,
            "sinc band-pass filter ready"
        );
        Ok(Self { params, window })
    }

    /// Filter the input, returning a tensor of the same shape.
    ///
    /// Accepts `[T]` (single channel), `[C, T]`, or `[B, C, T]`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (x3, rank) = self.params.check_input(x)?;
        let kernel = sinc_bandpass_kernel(&self.params, &self.window)?;
        let filtered = self.params.filter(&x3, &kernel)?;
        let cropped = self.params.crop(&filtered)?;
        self.params.restore_rank(cropped, rank)
    }

    /// Realized per-channel frequencies and band edges.
    pub fn frequencies(&self) -> Result<Frequencies> {
        self.params.compute_frequencies()
    }

    /// Learnable variables for the optimizer (empty when both parameters
    /// are fixed).
    pub fn trainable_vars(&self) -> Vec<Var> {
        self.params.trainable_vars()
    }

    /// The realized impulse responses, detached, for inspection.
    pub fn kernel(&self) -> Result<Kernel> {
        Ok(self.build_kernel()?.detached())
    }
}

impl KernelBuilder for SincBandpass {
    fn build_kernel(&self) -> Result<Kernel> {
        Ok(Kernel::Real(sinc_bandpass_kernel(
            &self.params,
            &self.window,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, rate: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / rate).sin())
            .collect()
    }

    fn mid_amplitude(values: &[f32]) -> f32 {
        let mid = &values[values.len() / 4..3 * values.len() / 4];
        mid.iter().fold(0.0f32, |acc, v| acc.max(v.abs()))
    }

    #[test]
    fn passband_sine_passes_at_unity() {
        let device = Device::Cpu;
        let rate = 250.0;
        let config = FilterConfig::new(1, 251, rate)
            .with_fixed_freq(10.0)
            .with_fixed_bandwidth(8.0);
        let filter = SincBandpass::new(config, &device).unwrap();

        let x = Tensor::from_vec(sine(10.0, rate, 1000), (1, 1000), &device).unwrap();
        let y = filter
            .forward(&x)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();

        let amp = mid_amplitude(&y);
        assert!((amp - 1.0).abs() < 0.1, "in-band amplitude {amp}");
    }

    #[test]
    fn stopband_sine_is_attenuated() {
        let device = Device::Cpu;
        let rate = 250.0;
        let config = FilterConfig::new(1, 251, rate)
            .with_fixed_freq(10.0)
            .with_fixed_bandwidth(8.0);
        let filter = SincBandpass::new(config, &device).unwrap();

        let x = Tensor::from_vec(sine(50.0, rate, 1000), (1, 1000), &device).unwrap();
        let y = filter
            .forward(&x)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();

        let amp = mid_amplitude(&y);
        assert!(amp < 0.05, "out-of-band amplitude {amp}");
    }

    #[test]
    fn wide_open_band_approximates_all_pass() {
        let device = Device::Cpu;
        let rate = 250.0;
        // Band edges pushed to ~0 and ~Nyquist.
        let config = FilterConfig::new(1, 501, rate)
            .with_fixed_freq(rate / 4.0)
            .with_fixed_bandwidth(rate / 2.0 - 0.5);
        let filter = SincBandpass::new(config, &device).unwrap();

        let signal = sine(30.0, rate, 1200);
        let x = Tensor::from_vec(signal.clone(), (1, 1200), &device).unwrap();
        let y = filter
            .forward(&x)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();

        for i in 300..900 {
            assert!(
                (y[i] - signal[i]).abs() < 0.1,
                "all-pass mismatch at {i}: {} vs {}",
                y[i],
                signal[i]
            );
        }
    }

    #[test]
    fn length_is_preserved_for_even_kernels() {
        let device = Device::Cpu;
        let config = FilterConfig::new(1, 64, 250.0).with_seed(3);
        let filter = SincBandpass::new(config, &device).unwrap();
        let x = Tensor::zeros((1, 333), candle_core::DType::F32, &device).unwrap();
        assert_eq!(filter.forward(&x).unwrap().dims(), &[1, 333]);
    }

    #[test]
    fn channel_mismatch_is_an_error() {
        let device = Device::Cpu;
        let config = FilterConfig::new(2, 9, 250.0).with_seed(3);
        let filter = SincBandpass::new(config, &device).unwrap();
        let x = Tensor::zeros((3, 100), candle_core::DType::F32, &device).unwrap();
        assert!(filter.forward(&x).is_err());
    }

    #[test]
    fn gradients_reach_the_raw_parameters() {
        let device = Device::Cpu;
        let config = FilterConfig::new(1, 33, 250.0).with_seed(11);
        let filter = SincBandpass::new(config, &device).unwrap();
        let vars = filter.trainable_vars();
        assert_eq!(vars.len(), 2);

        let x = Tensor::from_vec(sine(12.0, 250.0, 200), (1, 200), &device).unwrap();
        let loss = filter.forward(&x).unwrap().sqr().unwrap().sum_all().unwrap();
        let grads = loss.backward().unwrap();
        for var in &vars {
            let grad = grads
                .get(var)
                .expect("every learnable parameter should receive a gradient");
            assert!(grad.to_vec1::<f32>().unwrap()[0].is_finite());
        }
    }
}
