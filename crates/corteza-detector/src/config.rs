//! Construction-time configuration of the envelope detector.

use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::downsample::DownsampleMethod;
use corteza_core::{Error, Result};

/// Which stages the detector builds and how they are sized.
///
/// The struct round-trips through serde (TOML/JSON) with the historical
/// option spellings, so existing experiment configs keep working:
///
/// ```toml
/// nchannels = 32
/// nfeatures = 8
/// activation = "hilbert_amplitude"
/// downsample_coef = 10
/// downsample_method = "avepool"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeDetectorConfig {
    /// Input channel count.
    pub nchannels: usize,
    /// Virtual channels after spatial mixing.
    pub nfeatures: usize,
    /// Learn a bias in the spatial stage.
    #[serde(default = "default_true")]
    pub spatial_bias: bool,
    /// Build the learnable temporal FIR stage.
    #[serde(default = "default_true")]
    pub temporal_filter: bool,
    /// Taps in the temporal FIR stage.
    #[serde(default = "default_temporal_filter_size")]
    pub temporal_filter_size: usize,
    /// Dilation of the temporal FIR stage.
    #[serde(default = "default_one")]
    pub temporal_filter_dilation: usize,
    /// Dropout probability after the temporal stage; 0 disables.
    #[serde(default)]
    pub dropout: f32,
    /// Nonlinearity between filtering and smoothing.
    #[serde(default)]
    pub activation: Activation,
    /// Build the post-activation smoother.
    #[serde(default)]
    pub temporal_smoother: bool,
    /// Taps in the smoother.
    #[serde(default = "default_temporal_smoother_size")]
    pub temporal_smoother_size: usize,
    /// Ratio between input and output sampling rates; values of 0 or 1
    /// disable downsampling regardless of the method.
    #[serde(default = "default_one")]
    pub downsample_coef: usize,
    /// Downsampling method.
    #[serde(default)]
    pub downsample_method: DownsampleMethod,
    /// Input sampling rate in Hz.
    #[serde(default = "default_fs_in")]
    pub fs_in: f32,
}

fn default_true() -> bool {
    true
}

fn default_one() -> usize {
    1
}

fn default_temporal_filter_size() -> usize {
    7
}

fn default_temporal_smoother_size() -> usize {
    3
}

fn default_fs_in() -> f32 {
    1000.0
}

impl EnvelopeDetectorConfig {
    /// A detector over `nchannels` inputs and `nfeatures` virtual
    /// channels, with every other option at its default.
    pub fn new(nchannels: usize, nfeatures: usize) -> Self {
        Self {
            nchannels,
            nfeatures,
            spatial_bias: true,
            temporal_filter: true,
            temporal_filter_size: default_temporal_filter_size(),
            temporal_filter_dilation: 1,
            dropout: 0.0,
            activation: Activation::default(),
            temporal_smoother: false,
            temporal_smoother_size: default_temporal_smoother_size(),
            downsample_coef: 1,
            downsample_method: DownsampleMethod::default(),
            fs_in: default_fs_in(),
        }
    }

    /// Select the nonlinearity.
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Enable the temporal FIR stage with an explicit size and dilation.
    pub fn with_temporal_filter(mut self, size: usize, dilation: usize) -> Self {
        self.temporal_filter = true;
        self.temporal_filter_size = size;
        self.temporal_filter_dilation = dilation;
        self
    }

    /// Skip the temporal FIR stage (and its standardization).
    pub fn without_temporal_filter(mut self) -> Self {
        self.temporal_filter = false;
        self
    }

    /// Toggle the spatial bias.
    pub fn with_spatial_bias(mut self, bias: bool) -> Self {
        self.spatial_bias = bias;
        self
    }

    /// Set the dropout probability.
    pub fn with_dropout(mut self, dropout: f32) -> Self {
        self.dropout = dropout;
        self
    }

    /// Enable the post-activation smoother.
    pub fn with_smoother(mut self, size: usize) -> Self {
        self.temporal_smoother = true;
        self.temporal_smoother_size = size;
        self
    }

    /// Configure downsampling.
    pub fn with_downsampling(mut self, coef: usize, method: DownsampleMethod) -> Self {
        self.downsample_coef = coef;
        self.downsample_method = method;
        self
    }

    /// Set the input sampling rate.
    pub fn with_sample_rate(mut self, fs_in: f32) -> Self {
        self.fs_in = fs_in;
        self
    }

    /// Feature count of the detector's output, accounting for the
    /// activation's effect on the feature axis.
    pub fn output_features(&self) -> usize {
        self.activation.output_features(self.nfeatures)
    }

    /// Reject configurations that would build degenerate stages.
    pub fn validate(&self) -> Result<()> {
        if self.nchannels == 0 {
            return Err(Error::Config("nchannels must be positive".to_string()));
        }
        if self.nfeatures == 0 {
            return Err(Error::Config("nfeatures must be positive".to_string()));
        }
        if self.temporal_filter {
            if self.temporal_filter_size == 0 {
                return Err(Error::Config(
                    "temporal_filter_size must be positive".to_string(),
                ));
            }
            if self.temporal_filter_dilation == 0 {
                return Err(Error::Config(
                    "temporal_filter_dilation must be positive".to_string(),
                ));
            }
        }
        if self.temporal_smoother && self.temporal_smoother_size == 0 {
            return Err(Error::Config(
                "temporal_smoother_size must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::Config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if !(self.fs_in.is_finite() && self.fs_in > 0.0) {
            return Err(Error::Config(format!(
                "fs_in must be positive, got {}",
                self.fs_in
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EnvelopeDetectorConfig::new(32, 8).validate().is_ok());
    }

    #[test]
    fn degenerate_configs_are_rejected() {
        assert!(EnvelopeDetectorConfig::new(0, 8).validate().is_err());
        assert!(EnvelopeDetectorConfig::new(32, 0).validate().is_err());
        assert!(
            EnvelopeDetectorConfig::new(4, 2)
                .with_temporal_filter(0, 1)
                .validate()
                .is_err()
        );
        assert!(
            EnvelopeDetectorConfig::new(4, 2)
                .with_dropout(1.0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn legacy_spellings_deserialize() {
        let toml = r#"
            nchannels = 16
            nfeatures = 4
            activation = "hilbert_split"
            downsample_coef = 5
            downsample_method = "avepool"
        "#;
        let config: EnvelopeDetectorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.nchannels, 16);
        assert_eq!(config.activation, Activation::HilbertSplit);
        assert_eq!(config.downsample_method, DownsampleMethod::AvgPool);
        assert_eq!(config.output_features(), 8);
        // Unlisted options take their defaults.
        assert!(config.spatial_bias);
        assert_eq!(config.temporal_filter_size, 7);
    }

    #[test]
    fn toml_round_trip_preserves_the_config() {
        let config = EnvelopeDetectorConfig::new(8, 3)
            .with_activation(Activation::HilbertAmplitude)
            .with_downsampling(4, DownsampleMethod::Resample)
            .with_smoother(5);
        let text = toml::to_string(&config).unwrap();
        let back: EnvelopeDetectorConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn unknown_activation_string_fails_strict_parsing() {
        let toml = r#"
            nchannels = 4
            nfeatures = 2
            activation = "hilbrt"
        "#;
        assert!(toml::from_str::<EnvelopeDetectorConfig>(toml).is_err());
    }
}
