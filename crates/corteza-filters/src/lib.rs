//! Corteza Filters - learnable parametric temporal filter layers
//!
//! Each layer in this crate owns a small set of per-channel parameters
//! (center frequency, bandwidth) and derives a finite impulse response
//! from them with a closed-form kernel formula on every forward pass.
//! Because the kernel is an ordinary differentiable function of the
//! parameters, the band placement itself is trained by backpropagation
//! instead of being designed by hand.
//!
//! # Layers
//!
//! - [`SincBandpass`] - windowed ideal band-pass; output is the filtered
//!   signal
//! - [`SincHilbert`] - the same band-pass followed by an analytic-signal
//!   envelope stage
//! - [`Wavelet`] - Gaussian-enveloped cosine (real Morlet); output is the
//!   filtered signal
//! - [`ComplexWavelet`] - Gaussian-enveloped complex exponential; output
//!   is the band envelope (or the real part on request)
//!
//! # Shared Machinery
//!
//! [`FilterConfig`] describes a layer; [`FilterParams`] stores parameters
//! and implements the pad/convolve/crop cycle that keeps output length
//! equal to input length for every kernel parity. [`KernelBuilder`] is
//! the capability each layer implements to expose its realized impulse
//! response as a [`Kernel`].
//!
//! Convolutions are depthwise: every channel is filtered by its own
//! kernel, and the input channel count must match the layer exactly.

pub mod complex_wavelet;
pub mod kernel;
pub mod params;
pub mod sinc_bandpass;
pub mod sinc_hilbert;
pub mod wavelet;

pub use complex_wavelet::ComplexWavelet;
pub use kernel::{Kernel, KernelBuilder};
pub use params::{FilterConfig, FilterParams, FixedParam, Frequencies};
pub use sinc_bandpass::SincBandpass;
pub use sinc_hilbert::SincHilbert;
pub use wavelet::Wavelet;
