//! Window functions for finite-length filter kernels.

use candle_core::{Device, Tensor};

use crate::error::Result;
use std::f64::consts::TAU;

/// Window function types used by the filter kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Periodic Hamming window, `0.54 - 0.46*cos(2*pi*n/N)`. The periodic
    /// form tapers band-pass kernels without the symmetric variant's
    /// repeated endpoint.
    Hamming,
    /// Symmetric Blackman window,
    /// `0.42 - 0.5*cos(2*pi*n/M) + 0.08*cos(4*pi*n/M)` with `M = N - 1`.
    /// Used for anti-aliasing low-pass designs.
    Blackman,
}

impl Window {
    /// Window coefficients for a kernel of `size` taps.
    ///
    /// A single-tap window is `[1.0]` for every variant.
    pub fn coefficients(&self, size: usize) -> Vec<f32> {
        if size <= 1 {
            return vec![1.0; size];
        }
        match self {
            Window::Hamming => (0..size)
                .map(|n| (0.54 - 0.46 * (TAU * n as f64 / size as f64).cos()) as f32)
                .collect(),
            Window::Blackman => {
                let m = (size - 1) as f64;
                (0..size)
                    .map(|n| {
                        let phase = TAU * n as f64 / m;
                        (0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()) as f32
                    })
                    .collect()
            }
        }
    }

    /// Window coefficients as a rank-1 tensor.
    pub fn tensor(&self, size: usize, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_vec(self.coefficients(size), size, device)?)
    }
}
