//! Kernel values and the builder capability shared by all filter layers.

use candle_core::Tensor;

use crate::params::FilterParams;
use corteza_core::{Result, sinc};

/// A per-channel impulse response, shaped `[channels, 1, kernel_size]`.
///
/// Complex kernels are carried as separate real and imaginary planes; the
/// backend has no complex dtype and a split representation convolves as
/// two real convolutions anyway.
#[derive(Debug, Clone)]
pub enum Kernel {
    /// A real-valued impulse response.
    Real(Tensor),
    /// A complex impulse response as `(re, im)` planes.
    Complex {
        /// Real plane.
        re: Tensor,
        /// Imaginary plane.
        im: Tensor,
    },
}

impl Kernel {
    /// The same kernel with every plane detached from the autodiff tape.
    pub fn detached(&self) -> Kernel {
        match self {
            Kernel::Real(t) => Kernel::Real(t.detach()),
            Kernel::Complex { re, im } => Kernel::Complex {
                re: re.detach(),
                im: im.detach(),
            },
        }
    }
}

/// Capability of producing an impulse response from the current parameter
/// values. Implemented by every filter layer; the construction runs on
/// each forward pass so parameter updates are always reflected.
pub trait KernelBuilder {
    /// Build the kernel from the current parameters.
    fn build_kernel(&self) -> Result<Kernel>;
}

/// Hamming-windowed band-pass kernel: the difference of two sinc low-pass
/// kernels at the upper and lower band edge, scaled by `2 / sample_rate`.
///
/// Shared by the plain band-pass layer and the analytic (Hilbert) layer.
pub(crate) fn sinc_bandpass_kernel(
    params: &FilterParams,
    window: &Tensor,
) -> Result<Tensor> {
    let f = params.compute_frequencies()?;
    let channels = params.channels();
    let low = f.low.reshape((channels, 1, 1))?;
    let high = f.high.reshape((channels, 1, 1))?;
    let grid2 = (params.grid() * 2.0)?;

    let lowpass_lo = low.broadcast_mul(&sinc(&low.broadcast_mul(&grid2)?)?)?;
    let lowpass_hi = high.broadcast_mul(&sinc(&high.broadcast_mul(&grid2)?)?)?;

    let band = ((lowpass_hi - lowpass_lo)? * (2.0 / f64::from(params.sample_rate())))?;
    Ok(band.broadcast_mul(window)?)
}

/// Gaussian envelope terms shared by the wavelet kernels.
///
/// Returns `(amplitude, gaussian)`: the `[C, 1, 1]` normalization factor
/// and the `[C, 1, K]` envelope `exp(-t^2 / (2*sigma2))`, with
/// `sigma2 = 2*ln(2) / (bandwidth*pi)^2` so the kernel's power spectrum
/// is `bandwidth` wide at half maximum.
pub(crate) fn wavelet_envelope(params: &FilterParams) -> Result<(Tensor, Tensor)> {
    use std::f64::consts::PI;

    let f = params.compute_frequencies()?;
    let channels = params.channels();
    let bandwidth = f.bandwidth.reshape((channels, 1, 1))?;

    let sigma2 = ((bandwidth * PI)?.sqr()?.recip()? * (2.0 * std::f64::consts::LN_2))?;

    // Peak-normalized so the frequency response is unity at the center
    // frequency: (2*pi*sigma2)^(-1/2) / (sample_rate / 2).
    let amplitude =
        ((&sigma2 * (2.0 * PI))?.powf(-0.5)? * (2.0 / f64::from(params.sample_rate())))?;

    let gaussian = params
        .grid()
        .sqr()?
        .broadcast_div(&(&sigma2 * 2.0)?)?
        .neg()?
        .exp()?;

    Ok((amplitude, gaussian))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::FilterConfig;
    use candle_core::Device;
    use corteza_core::Window;

    #[test]
    fn bandpass_kernel_has_near_zero_mean() {
        let device = Device::Cpu;
        let config = FilterConfig::new(1, 129, 250.0)
            .with_fixed_freq(20.0)
            .with_fixed_bandwidth(8.0);
        let params = FilterParams::new(&config, &device).unwrap();
        let window = Window::Hamming
            .tensor(129, &device)
            .unwrap()
            .reshape((1, 1, 129))
            .unwrap();

        let kernel = sinc_bandpass_kernel(&params, &window).unwrap();
        let sum = kernel
            .sum_all()
            .unwrap()
            .to_vec0::<f32>()
            .unwrap();
        // A band-pass kernel passes no DC.
        assert!(sum.abs() < 1e-3, "kernel DC gain {sum}");
    }

    #[test]
    fn gaussian_envelope_peaks_at_the_center_tap() {
        let device = Device::Cpu;
        let config = FilterConfig::new(1, 101, 250.0)
            .with_fixed_freq(10.0)
            .with_fixed_bandwidth(4.0);
        let params = FilterParams::new(&config, &device).unwrap();
        let (_, gaussian) = wavelet_envelope(&params).unwrap();
        let g = gaussian.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!((g[50] - 1.0).abs() < 1e-6, "center tap should be 1");
        assert!(g[0] < g[50] && g[100] < g[50]);
    }
}
