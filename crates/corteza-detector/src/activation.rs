//! Nonlinearities applied after the filtering stages.

use candle_core::Tensor;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use corteza_core::{HilbertTransform, Result};

/// The detector's nonlinearity, fixed at construction.
///
/// The set is closed: configuration either names one of these variants or
/// fails to parse. For callers migrating string-typed configuration, the
/// [`FromStr`] impl accepts the historical spellings and maps anything
/// unrecognized to [`Activation::None`] (pass-through) with a logged
/// warning, preserving the lenient behavior such configs relied on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Full-wave rectification, `|x|`: amplitude demodulation of an
    /// oscillation that the preceding stages have already band-limited.
    #[default]
    Demodulation,
    /// Magnitude of the analytic signal: the instantaneous envelope.
    HilbertAmplitude,
    /// Both planes of the analytic signal, concatenated along the feature
    /// axis: channels `[0, F)` carry the real part, `[F, 2F)` the
    /// imaginary part. Doubles the feature count.
    HilbertSplit,
    /// Pass-through.
    None,
}

impl Activation {
    /// Output feature count for `nfeatures` input features.
    pub fn output_features(&self, nfeatures: usize) -> usize {
        match self {
            Activation::HilbertSplit => 2 * nfeatures,
            _ => nfeatures,
        }
    }

    /// Historical configuration spelling of this variant.
    pub fn name(&self) -> &'static str {
        match self {
            Activation::Demodulation => "demodulation",
            Activation::HilbertAmplitude => "hilbert_amplitude",
            Activation::HilbertSplit => "hilbert_split",
            Activation::None => "none",
        }
    }

    /// Apply to a `[batch, feature, time]` tensor.
    pub(crate) fn apply(&self, x: &Tensor, hilbert: &HilbertTransform) -> Result<Tensor> {
        match self {
            Activation::Demodulation => Ok(x.abs()?),
            Activation::HilbertAmplitude => hilbert.analytic(x)?.magnitude(),
            Activation::HilbertSplit => {
                let analytic = hilbert.analytic(x)?;
                Ok(Tensor::cat(&[analytic.real(), analytic.imag()], 1)?)
            }
            Activation::None => Ok(x.clone()),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = Infallible;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        Ok(match s {
            "demodulation" => Activation::Demodulation,
            "hilbert_amplitude" => Activation::HilbertAmplitude,
            "hilbert_split" => Activation::HilbertSplit,
            "none" => Activation::None,
            other => {
                warn!(
                    activation = other,
                    "unrecognized activation name, falling back to pass-through"
                );
                Activation::None
            }
        })
    }
}
