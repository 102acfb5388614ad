//! Error types shared across the corteza crates.

use thiserror::Error;

/// Errors produced by corteza layers and primitives.
#[derive(Debug, Error)]
pub enum Error {
    /// A tensor operation failed in the backend.
    #[error("tensor backend error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// A layer was constructed or called with an invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The channel axis of an input does not match the layer.
    #[error("channel mismatch: layer expects {expected} channels, input has {actual}")]
    ChannelMismatch {
        /// Channel count the layer was built for.
        expected: usize,
        /// Channel count found on the input tensor.
        actual: usize,
    },

    /// A fixed parameter tensor has an unusable shape.
    #[error("invalid parameter shape: {0}")]
    ParamShape(String),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = core::result::Result<T, Error>;
