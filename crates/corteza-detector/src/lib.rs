//! Corteza Detector - a trainable envelope-decoding pipeline
//!
//! [`EnvelopeDetector`] composes spatial mixing, optional temporal FIR
//! filtering, standardization, a selectable nonlinearity, optional
//! smoothing, and optional downsampling into one differentiable module:
//! raw multichannel samples in, envelope-like feature sequences out. All
//! parameters train by backpropagation through the whole pipeline.
//!
//! # Quick Start
//!
//! ```rust
//! use candle_core::{Device, Tensor};
//! use corteza_detector::{Activation, EnvelopeDetector, EnvelopeDetectorConfig};
//!
//! let device = Device::Cpu;
//! let config = EnvelopeDetectorConfig::new(8, 3)
//!     .with_activation(Activation::Demodulation)
//!     .with_sample_rate(250.0);
//! let detector = EnvelopeDetector::new_seeded(config, 7, &device).unwrap();
//!
//! let x = Tensor::zeros((8, 500), candle_core::DType::F32, &device).unwrap();
//! let features = detector.forward(&x).unwrap();
//! assert_eq!(features.dims(), &[1, 3, 500]);
//! ```
//!
//! # Interpretability
//!
//! [`EnvelopeDetector::spatial_filter`] and
//! [`EnvelopeDetector::temporal_filter`] recover the learned projections
//! as plain detached tensors, including the dilation-expanded form of the
//! temporal kernel, so a trained detector can be read as a signal-
//! processing chain rather than a black box.

pub mod activation;
pub mod config;
pub mod detector;
pub mod downsample;
pub mod spatial;
pub mod temporal;

pub use activation::Activation;
pub use config::EnvelopeDetectorConfig;
pub use detector::EnvelopeDetector;
pub use downsample::DownsampleMethod;
pub use spatial::SpatialFilter;
pub use temporal::{TemporalFilter, TemporalSmoother};
