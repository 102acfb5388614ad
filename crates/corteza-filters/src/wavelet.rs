//! Real Morlet-like wavelet filter layer.

use candle_core::{Device, Tensor, Var};
use tracing::debug;

use crate::kernel::{Kernel, KernelBuilder, wavelet_envelope};
use crate::params::{FilterConfig, FilterParams, Frequencies};
use corteza_core::Result;

/// A bank of Gaussian-enveloped cosine filters with learnable center
/// frequency and bandwidth.
///
/// The Gaussian variance follows from the bandwidth,
/// `sigma2 = 2*ln(2) / (bandwidth*pi)^2`, and the amplitude is normalized
/// so the frequency response is unity at the center frequency. Narrower
/// bandwidths mean longer kernels in time; the kernel length bounds how
/// much of that support is actually realized.
#[derive(Debug)]
pub struct Wavelet {
    params: FilterParams,
}

impl Wavelet {
    /// Build the layer on `device`.
    pub fn new(config: FilterConfig, device: &Device) -> Result<Self> {
        let params = FilterParams::new(&config, device)?;
        debug!(
            channels = config.channels,
            kernel_size = config.kernel_size,
            sample_rate = config.sample_rate,
            "wavelet filter ready"
        );
        Ok(Self { params })
    }

    fn cosine_kernel(&self) -> Result<Tensor> {
        use std::f64::consts::TAU;

        let f = self.params.compute_frequencies()?;
        let channels = self.params.channels();
        let freq = f.freq.reshape((channels, 1, 1))?;
        let (amplitude, gaussian) = wavelet_envelope(&self.params)?;

        let carrier = (freq.broadcast_mul(self.params.grid())? * TAU)?.cos()?;
        Ok(amplitude.broadcast_mul(&carrier)?.mul(&gaussian)?)
    }

    /// Filter the input, returning a tensor of the same shape.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (x3, rank) = self.params.check_input(x)?;
        let kernel = self.cosine_kernel()?;
        let filtered = self.params.filter(&x3, &kernel)?;
        let cropped = self.params.crop(&filtered)?;
        self.params.restore_rank(cropped, rank)
    }

    /// Realized per-channel frequencies and band edges.
    pub fn frequencies(&self) -> Result<Frequencies> {
        self.params.compute_frequencies()
    }

    /// Learnable variables for the optimizer.
    pub fn trainable_vars(&self) -> Vec<Var> {
        self.params.trainable_vars()
    }

    /// The realized impulse responses, detached, for inspection.
    pub fn kernel(&self) -> Result<Kernel> {
        Ok(self.build_kernel()?.detached())
    }
}

impl KernelBuilder for Wavelet {
    fn build_kernel(&self) -> Result<Kernel> {
        Ok(Kernel::Real(self.cosine_kernel()?))
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

    fn bank(rate: f32, device: &Device) -> Wavelet {
        let config = FilterConfig::new(1, 301, rate)
            .with_fixed_freq(10.0)
            .with_fixed_bandwidth(4.0);
        Wavelet::new(config, device).unwrap()
    }

    #[test]
    fn center_frequency_passes_at_unity() {
        let device = Device::Cpu;
        let rate = 250.0;
        let filter = bank(rate, &device);

        let x = Tensor::from_vec(sine(10.0, rate, 1500), (1, 1500), &device).unwrap();
        let y = filter
            .forward(&x)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();

        let amp = mid_amplitude(&y);
        assert!((amp - 1.0).abs() < 0.15, "center-frequency gain {amp}");
    }

    #[test]
    fn off_band_frequency_is_attenuated() {
        let device = Device::Cpu;
        let rate = 250.0;
        let filter = bank(rate, &device);

        let x = Tensor::from_vec(sine(25.0, rate, 1500), (1, 1500), &device).unwrap();
        let y = filter
            .forward(&x)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();

        let amp = mid_amplitude(&y);
        assert!(amp < 0.1, "off-band gain {amp}");
    }

    #[test]
    fn length_preserved_across_parities_and_ranks() {
        let device = Device::Cpu;
        for kernel_size in [30usize, 31] {
            let config = FilterConfig::new(3, kernel_size, 100.0).with_seed(2);
            let filter = Wavelet::new(config, &device).unwrap();

            let x2 = Tensor::zeros((3, 240), candle_core::DType::F32, &device).unwrap();
            assert_eq!(filter.forward(&x2).unwrap().dims(), &[3, 240]);

            let x3 = Tensor::zeros((4, 3, 240), candle_core::DType::F32, &device).unwrap();
            assert_eq!(filter.forward(&x3).unwrap().dims(), &[4, 3, 240]);
        }
    }

    #[test]
    fn gradients_reach_the_raw_parameters() {
        let device = Device::Cpu;
        let config = FilterConfig::new(2, 41, 250.0).with_seed(9);
        let filter = Wavelet::new(config, &device).unwrap();
        let vars = filter.trainable_vars();
        assert_eq!(vars.len(), 2);

        let x = Tensor::from_vec(sine(15.0, 250.0, 300), (1, 300), &device)
            .unwrap()
            .broadcast_as((2, 300))
            .unwrap()
            .contiguous()
            .unwrap();
        let loss = filter.forward(&x).unwrap().sqr().unwrap().sum_all().unwrap();
        let grads = loss.backward().unwrap();
        for var in &vars {
            let grad = grads.get(var).expect("missing gradient");
            for g in grad.to_vec1::<f32>().unwrap() {
                assert!(g.is_finite());
            }
        }
    }
}
