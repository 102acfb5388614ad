//! Hilbert transform for computing analytic signals of tensor-valued data.
//!
//! The analytic signal `a(t) = x(t) + i·H{x(t)}` carries the instantaneous
//! amplitude of a narrowband oscillation as its magnitude, which is the
//! quantity envelope decoders train on.
//!
//! # Algorithm
//!
//! The classic construction works in the frequency domain:
//! 1. Transform the real signal.
//! 2. Keep the DC bin (and, for even lengths, the Nyquist bin) unchanged.
//! 3. Double the positive-frequency bins.
//! 4. Zero the negative-frequency bins.
//! 5. Transform back; the result is the analytic signal.
//!
//! Here the whole chain is folded into a single circular operator matrix
//! applied with a matmul over the time axis. The operator is the exact
//! time-domain form of the half-spectrum rule above, so the result matches
//! the FFT construction for even and odd lengths alike, while gradients
//! flow through it like through any other linear layer. The real part of
//! the output is the input itself, so only the imaginary operator is ever
//! materialized.
//!
//! The operator is rebuilt for each input length; nothing is cached. This
//! keeps the transform stateless and correct no matter how the surrounding
//! model reshapes its data between calls.

use candle_core::{D, Device, Tensor};

use crate::error::{Error, Result};

/// Computes discrete analytic signals over the last tensor axis.
///
/// The transform has no learnable state and accepts any shape `[.., T]`
/// with `T >= 1`. A length-1 axis is returned unchanged (its Hilbert
/// transform is zero).
///
/// # Example
///
/// ```rust
/// use candle_core::{Device, Tensor};
/// use corteza_core::HilbertTransform;
///
/// let t: Vec<f32> = (0..256)
///     .map(|i| (2.0 * std::f32::consts::PI * 8.0 * i as f32 / 256.0).sin())
///     .collect();
/// let x = Tensor::from_vec(t, (1, 1, 256), &Device::Cpu).unwrap();
///
/// let analytic = HilbertTransform::new().analytic(&x).unwrap();
/// let envelope = analytic.magnitude().unwrap();
/// // Away from the edges the envelope of a pure sinusoid is ~1.
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct HilbertTransform;

impl HilbertTransform {
    /// Create the transform.
    pub fn new() -> Self {
        Self
    }

    /// Compute the analytic signal of `signal` along its last axis.
    pub fn analytic(&self, signal: &Tensor) -> Result<AnalyticSignal> {
        let n = signal.dim(D::Minus1)?;
        if n == 0 {
            return Err(Error::Config(
                "analytic signal requires a non-empty time axis".to_string(),
            ));
        }
        if n == 1 {
            let im = signal.zeros_like()?;
            return Ok(AnalyticSignal {
                re: signal.clone(),
                im,
            });
        }

        let operator = imag_operator(n, signal.device())?;
        let dims = signal.dims().to_vec();
        let flat = signal.contiguous()?.reshape(((), n))?;
        let im = flat.matmul(&operator)?.reshape(dims)?;

        Ok(AnalyticSignal {
            re: signal.clone(),
            im,
        })
    }
}

/// A complex-valued signal stored as separate real and imaginary planes.
#[derive(Debug, Clone)]
pub struct AnalyticSignal {
    re: Tensor,
    im: Tensor,
}

impl AnalyticSignal {
    /// Build from explicit real and imaginary parts of matching shape.
    pub fn from_parts(re: Tensor, im: Tensor) -> Result<Self> {
        if re.dims() != im.dims() {
            return Err(Error::Config(format!(
                "real and imaginary parts must share a shape, got {:?} and {:?}",
                re.dims(),
                im.dims()
            )));
        }
        Ok(Self { re, im })
    }

    /// Real part; for an analytic signal this is the original input.
    pub fn real(&self) -> &Tensor {
        &self.re
    }

    /// Imaginary part, i.e. the Hilbert transform of the input.
    pub fn imag(&self) -> &Tensor {
        &self.im
    }

    /// Instantaneous amplitude `sqrt(re^2 + im^2)`.
    pub fn magnitude(&self) -> Result<Tensor> {
        Ok((self.re.sqr()? + self.im.sqr()?)?.sqrt()?)
    }

    /// Consume into `(re, im)`.
    pub fn into_parts(self) -> (Tensor, Tensor) {
        (self.re, self.im)
    }
}

/// Spectral gain of the analytic-signal construction for bin `k` of `n`.
fn bin_gain(k: usize, n: usize) -> f64 {
    if k == 0 {
        1.0
    } else if 2 * k < n {
        2.0
    } else if 2 * k == n {
        // Nyquist bin, present only for even n.
        1.0
    } else {
        0.0
    }
}

/// Build the `[n, n]` matrix `M` such that `x @ M` is the imaginary part of
/// the analytic signal of `x` (rows of `x` are time series of length `n`).
///
/// The circular kernel is accumulated in f64; its imaginary part is
/// `w_im[d] = (1/n) * sum_k g_k * sin(2*pi*k*d/n)` with `g_k` the
/// half-spectrum gains. The real part of the kernel is the identity and is
/// not materialized.
fn imag_operator(n: usize, device: &Device) -> Result<Tensor> {
    let nf = n as f64;
    let mut kernel = vec![0f64; n];
    for (d, slot) in kernel.iter_mut().enumerate() {
        let mut acc = 0f64;
        for k in 1..n.div_ceil(2) {
            acc += bin_gain(k, n) * (std::f64::consts::TAU * k as f64 * d as f64 / nf).sin();
        }
        // Even n: the Nyquist bin contributes sin(pi*d) = 0, skip it.
        *slot = acc / nf;
    }

    let mut data = vec![0f32; n * n];
    for m in 0..n {
        for t in 0..n {
            data[m * n + t] = kernel[(t + n - m) % n] as f32;
        }
    }
    Ok(Tensor::from_vec(data, (n, n), device)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::FftPlanner;
    use rustfft::num_complex::Complex;
    use std::f32::consts::PI;

    fn sine_wave(frequency: f32, sample_rate: f32, num_samples: usize) -> Vec<f32> {
        (0..num_samples)
            .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate).sin())
            .collect()
    }

    fn tensor(values: Vec<f32>, device: &Device) -> Tensor {
        let n = values.len();
        Tensor::from_vec(values, (1, 1, n), device).unwrap()
    }

    /// FFT-based reference analytic signal, the textbook construction.
    fn reference_analytic(signal: &[f32]) -> Vec<Complex<f32>> {
        let n = signal.len();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        let ifft = planner.plan_fft_inverse(n);

        let mut buffer: Vec<Complex<f32>> =
            signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
        fft.process(&mut buffer);

        for (k, bin) in buffer.iter_mut().enumerate() {
            *bin *= bin_gain(k, n) as f32;
        }

        ifft.process(&mut buffer);
        // rustfft leaves the inverse unscaled.
        for bin in buffer.iter_mut() {
            *bin /= n as f32;
        }
        buffer
    }

    #[test]
    fn real_part_round_trips_the_input() {
        let device = Device::Cpu;
        let signal = sine_wave(10.0, 250.0, 200);
        let x = tensor(signal.clone(), &device);

        let analytic = HilbertTransform::new().analytic(&x).unwrap();
        let re = analytic.real().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        for (a, b) in re.iter().zip(signal.iter()) {
            assert!((a - b).abs() < 1e-6, "real part drifted: {a} vs {b}");
        }
    }

    #[test]
    fn sinusoid_envelope_is_constant() {
        let device = Device::Cpu;
        let n = 512;
        let x = tensor(sine_wave(10.0, 1000.0, n), &device);

        let envelope = HilbertTransform::new()
            .analytic(&x)
            .unwrap()
            .magnitude()
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();

        // Check the middle portion, away from edge transients.
        for (i, &amp) in envelope.iter().enumerate().take(3 * n / 4).skip(n / 4) {
            assert!(
                (amp - 1.0).abs() < 0.1,
                "envelope should be ~1.0, got {amp} at sample {i}"
            );
        }
    }

    #[test]
    fn matches_fft_reference_even_and_odd_lengths() {
        let device = Device::Cpu;
        for n in [64usize, 127, 128, 255] {
            let signal: Vec<f32> = (0..n)
                .map(|i| {
                    let t = i as f32 / n as f32;
                    (2.0 * PI * 7.0 * t).sin() + 0.5 * (2.0 * PI * 19.0 * t).cos()
                })
                .collect();

            let reference = reference_analytic(&signal);
            let x = tensor(signal, &device);
            let analytic = HilbertTransform::new().analytic(&x).unwrap();
            let im = analytic.imag().flatten_all().unwrap().to_vec1::<f32>().unwrap();

            for (i, (ours, theirs)) in im.iter().zip(reference.iter()).enumerate() {
                assert!(
                    (ours - theirs.im).abs() < 1e-3,
                    "length {n}: imaginary part mismatch at {i}: {ours} vs {}",
                    theirs.im
                );
            }
        }
    }

    #[test]
    fn amplitude_modulation_is_recovered() {
        // Carrier 50 Hz, modulator 5 Hz; the envelope should track the
        // modulator rather than stay constant.
        let device = Device::Cpu;
        let sample_rate = 1000.0;
        let n = 1024;
        let signal: Vec<f32> = (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate;
                let modulator = 0.5 + 0.5 * (2.0 * PI * 5.0 * t).cos();
                modulator * (2.0 * PI * 50.0 * t).sin()
            })
            .collect();

        let x = tensor(signal, &device);
        let envelope = HilbertTransform::new()
            .analytic(&x)
            .unwrap()
            .magnitude()
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();

        let mid = &envelope[n / 4..3 * n / 4];
        let min = mid.iter().copied().fold(f32::INFINITY, f32::min);
        let max = mid.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert!(min < 0.3, "envelope trough should reach ~0, got {min}");
        assert!(max > 0.8, "envelope crest should reach ~1, got {max}");
    }

    #[test]
    fn length_one_axis_is_identity() {
        let device = Device::Cpu;
        let x = Tensor::from_vec(vec![3.5f32], (1, 1, 1), &device).unwrap();
        let analytic = HilbertTransform::new().analytic(&x).unwrap();
        assert_eq!(
            analytic.real().flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            vec![3.5]
        );
        assert_eq!(
            analytic.imag().flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            vec![0.0]
        );
    }

    #[test]
    fn batched_input_keeps_shape() {
        let device = Device::Cpu;
        let x = Tensor::zeros((2, 3, 40), candle_core::DType::F32, &device).unwrap();
        let analytic = HilbertTransform::new().analytic(&x).unwrap();
        assert_eq!(analytic.imag().dims(), &[2, 3, 40]);
        assert_eq!(analytic.magnitude().unwrap().dims(), &[2, 3, 40]);
    }
}
