//! Complex Morlet wavelet filter layer.

use candle_core::{Device, Tensor, Var};
use tracing::debug;

use crate::kernel::{Kernel, KernelBuilder, wavelet_envelope};
use crate::params::{FilterConfig, FilterParams, Frequencies};
use corteza_core::{AnalyticSignal, Result};

/// A bank of complex Morlet filters: a Gaussian-enveloped complex
/// exponential with a DC-correction term keeping the kernel near zero
/// mean.
///
/// Convolving a real signal with a complex kernel yields a complex
/// time series whose magnitude is the band's instantaneous envelope and
/// whose real part is the phase-preserving filtered oscillation.
/// [`Self::forward`] returns the magnitude, [`Self::forward_filtered`]
/// the real part, and [`Self::forward_components`] both planes so the
/// two projections can be reconciled by callers.
#[derive(Debug)]
pub struct ComplexWavelet {
    params: FilterParams,
}

impl ComplexWavelet {
    /// Build the layer on `device`.
    pub fn new(config: FilterConfig, device: &Device) -> Result<Self> {
        let params = FilterParams::new(&config, device)?;
        debug!(
            channels = config.channels,
            kernel_size = config.kernel_size,
            sample_rate = config.sample_rate,
            "complex wavelet filter ready"
        );
        Ok(Self { params })
    }

    /// Build the `(re, im)` kernel planes from the current parameters.
    fn complex_kernel(&self) -> Result<(Tensor, Tensor)> {
        use std::f64::consts::TAU;

        let f = self.params.compute_frequencies()?;
        let channels = self.params.channels();
        let freq = f.freq.reshape((channels, 1, 1))?;
        let (amplitude, gaussian) = wavelet_envelope(&self.params)?;

        let phase = (freq.broadcast_mul(self.params.grid())? * TAU)?;
        // exp(-0.5*(2*pi*f)^2) makes the windowed carrier zero-mean; it
        // only matters for very low center frequencies but is kept exact.
        let dc = ((&freq * TAU)?.sqr()? * -0.5)?.exp()?;

        let re = phase.cos()?.broadcast_sub(&dc)?;
        let im = phase.sin()?;

        let re = amplitude.broadcast_mul(&re)?.mul(&gaussian)?;
        let im = amplitude.broadcast_mul(&im)?.mul(&gaussian)?;
        Ok((re, im))
    }

    /// Convolve with both kernel planes and crop, preserving rank.
    pub fn forward_components(&self, x: &Tensor) -> Result<AnalyticSignal> {
        let (x3, rank) = self.params.check_input(x)?;
        let (kernel_re, kernel_im) = self.complex_kernel()?;

        let re = self.params.crop(&self.params.filter(&x3, &kernel_re)?)?;
        let im = self.params.crop(&self.params.filter(&x3, &kernel_im)?)?;

        AnalyticSignal::from_parts(
            self.params.restore_rank(re, rank)?,
            self.params.restore_rank(im, rank)?,
        )
    }

    /// The band's instantaneous envelope, `|conv(x, kernel)|`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.forward_components(x)?.magnitude()
    }

    /// The phase-preserving filtered signal, `Re(conv(x, kernel))`.
    pub fn forward_filtered(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.forward_components(x)?.into_parts().0)
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

impl KernelBuilder for ComplexWavelet {
    fn build_kernel(&self) -> Result<Kernel> {
        let (re, im) = self.complex_kernel()?;
        Ok(Kernel::Complex { re, im })
    }
}
