//! Sinc band-pass filter with an analytic (Hilbert) envelope stage.

use candle_core::{Device, Tensor, Var};
use tracing::debug;

use crate::kernel::{Kernel, KernelBuilder, sinc_bandpass_kernel};
use crate::params::{FilterConfig, FilterParams, Frequencies};
use corteza_core::{HilbertTransform, Result, Window};

/// Band-pass filtering followed by analytic-signal envelope extraction.
///
/// The kernel construction is identical to [`crate::SincBandpass`]; the
/// difference is the output. [`Self::forward`] applies the Hilbert
/// transform to the filtered (still uncropped) signal, crops, and returns
/// the magnitude: the instantaneous envelope of the selected band.
/// [`Self::forward_filtered`] skips the analytic step and returns the
/// band-passed signal itself, useful when a downstream stage wants the
/// oscillation rather than its envelope.
#[derive(Debug)]
pub struct SincHilbert {
    params: FilterParams,
    window: Tensor,
    hilbert: HilbertTransform,
}

impl SincHilbert {
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
            "sinc band-pass + Hilbert filter ready"
        );
        Ok(Self {
            params,
            window,
            hilbert: HilbertTransform::new(),
        })
    }

    /// Band-pass then extract the instantaneous envelope.
    ///
    /// The Hilbert transform runs on the uncropped filtered signal so its
    /// own edge transients fall inside the margin that cropping removes.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (x3, rank) = self.params.check_input(x)?;
        let kernel = sinc_bandpass_kernel(&self.params, &self.window)?;
        let filtered = self.params.filter(&x3, &kernel)?;

        let analytic = self.hilbert.analytic(&filtered)?;
        let re = self.params.crop(analytic.real())?;
        let im = self.params.crop(analytic.imag())?;
        let envelope = (re.sqr()? + im.sqr()?)?.sqrt()?;

        self.params.restore_rank(envelope, rank)
    }

    /// Band-pass only, bypassing the analytic step.
    pub fn forward_filtered(&self, x: &Tensor) -> Result<Tensor> {
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

    /// Learnable variables for the optimizer.
    pub fn trainable_vars(&self) -> Vec<Var> {
        self.params.trainable_vars()
    }

    /// The realized impulse responses, detached, for inspection.
    pub fn kernel(&self) -> Result<Kernel> {
        Ok(self.build_kernel()?.detached())
    }
}

impl KernelBuilder for SincHilbert {
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

    fn am_signal(carrier: f32, modulator: f32, rate: f32, n: usize) -> (Vec<f32>, Vec<f32>) {
        let mut signal = Vec::with_capacity(n);
        let mut envelope = Vec::with_capacity(n);
        for i in 0..n {
            let t = i as f32 / rate;
            let env = 0.6 + 0.4 * (2.0 * PI * modulator * t).cos();
            envelope.push(env);
            signal.push(env * (2.0 * PI * carrier * t).sin());
        }
        (signal, envelope)
    }

    #[test]
    fn envelope_of_an_am_band_is_recovered() {
        let device = Device::Cpu;
        let rate = 250.0;
        let n = 1500;
        let (signal, envelope) = am_signal(40.0, 2.0, rate, n);

        let config = FilterConfig::new(1, 251, rate)
            .with_fixed_freq(40.0)
            .with_fixed_bandwidth(16.0);
        let filter = SincHilbert::new(config, &device).unwrap();

        let x = Tensor::from_vec(signal, (1, n), &device).unwrap();
        let y = filter
            .forward(&x)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();

        for i in n / 4..3 * n / 4 {
            assert!(
                (y[i] - envelope[i]).abs() < 0.15,
                "envelope mismatch at {i}: {} vs {}",
                y[i],
                envelope[i]
            );
        }
    }

    #[test]
    fn filtered_output_keeps_the_oscillation() {
        let device = Device::Cpu;
        let rate = 250.0;
        let n = 1000;
        let (signal, _) = am_signal(40.0, 2.0, rate, n);

        let config = FilterConfig::new(1, 251, rate)
            .with_fixed_freq(40.0)
            .with_fixed_bandwidth(16.0);
        let filter = SincHilbert::new(config, &device).unwrap();

        let x = Tensor::from_vec(signal, (1, n), &device).unwrap();
        let filtered = filter
            .forward_filtered(&x)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();

        assert_eq!(filtered.len(), n);
        // The band-passed signal still oscillates through zero; the
        // envelope never does.
        let mid = &filtered[n / 4..3 * n / 4];
        assert!(mid.iter().any(|v| *v > 0.2));
        assert!(mid.iter().any(|v| *v < -0.2));
    }

    #[test]
    fn envelope_dominates_the_filtered_signal() {
        let device = Device::Cpu;
        let rate = 250.0;
        let n = 800;
        let (signal, _) = am_signal(30.0, 3.0, rate, n);

        let config = FilterConfig::new(1, 129, rate)
            .with_fixed_freq(30.0)
            .with_fixed_bandwidth(20.0);
        let filter = SincHilbert::new(config, &device).unwrap();

        let x = Tensor::from_vec(signal, (1, n), &device).unwrap();
        let envelope = filter.forward(&x).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let filtered = filter
            .forward_filtered(&x)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();

        for i in 0..n {
            assert!(
                envelope[i] >= filtered[i].abs() - 1e-3,
                "magnitude below |re| at {i}"
            );
        }
    }

    #[test]
    fn length_preserved_for_both_outputs() {
        let device = Device::Cpu;
        for kernel_size in [32usize, 33] {
            let config = FilterConfig::new(2, kernel_size, 200.0).with_seed(5);
            let filter = SincHilbert::new(config, &device).unwrap();
            let x = Tensor::zeros((2, 777), candle_core::DType::F32, &device).unwrap();
            assert_eq!(filter.forward(&x).unwrap().dims(), &[2, 777]);
            assert_eq!(filter.forward_filtered(&x).unwrap().dims(), &[2, 777]);
        }
    }
}
