//! Corteza Core - differentiable DSP primitives for envelope decoding
//!
//! This crate provides the building blocks shared by the corteza filter
//! layers and the envelope-detector pipeline. Everything operates on
//! [`candle_core::Tensor`] values so that a surrounding model can
//! backpropagate through every stage.
//!
//! # Building Blocks
//!
//! - [`HilbertTransform`] / [`AnalyticSignal`] - discrete analytic signal
//!   of a real sequence, the foundation of amplitude-based nonlinearities
//! - [`PadMode`] / [`pad1d`] / [`same_conv_padding`] - length-preserving
//!   padding for temporal convolutions
//! - [`Window`] - window functions for finite kernel realizability
//! - [`sinc`] / [`softplus`] / [`sigmoid`] / [`logit`] - numerically safe
//!   kernel math and reparameterization maps
//! - [`Standardize`] - per-channel zero-mean/unit-variance stage with
//!   running statistics and no learned affine
//! - [`Error`] / [`Result`] - the workspace error surface
//!
//! # Design Principles
//!
//! - **Differentiable throughout**: no primitive breaks the autodiff tape;
//!   fixed buffers are detached, learnable state lives in
//!   [`candle_core::Var`]s owned by the layers that use it.
//! - **Recompute, don't cache**: anything derived from learnable
//!   parameters is rebuilt on every call, so a forward pass always sees
//!   the current parameter values.
//! - **Explicit failure**: shape and configuration problems surface as
//!   typed errors at construction or at the offending stage, never as NaN
//!   propagation.

pub mod error;
pub mod hilbert;
pub mod math;
pub mod norm;
pub mod pad;
pub mod reparam;
pub mod window;

pub use error::{Error, Result};
pub use hilbert::{AnalyticSignal, HilbertTransform};
pub use math::{sinc, sinc_f32};
pub use norm::Standardize;
pub use pad::{PadMode, pad1d, same_conv_padding};
pub use reparam::{logit, sigmoid, softplus, softplus_f32};
pub use window::Window;
