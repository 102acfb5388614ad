//! The envelope-detector pipeline.

use candle_core::{Device, Tensor, Var};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::config::EnvelopeDetectorConfig;
use crate::downsample::Downsampler;
use crate::spatial::SpatialFilter;
use crate::temporal::{TemporalFilter, TemporalSmoother};
use corteza_core::{Error, HilbertTransform, Result, Standardize};

/// An interpretable, trainable envelope detector.
///
/// The forward pass is a fixed ordered sequence of stages, each present or
/// absent according to the configuration:
///
/// 1. spatial mixing (`nchannels -> nfeatures`) and standardization
/// 2. optional depthwise temporal FIR (with dilation), optional dropout,
///    and a second standardization
/// 3. the configured nonlinearity
/// 4. optional depthwise smoothing
/// 5. optional downsampling
///
/// Input is `[batch, channel, time]`; a 2-D `[channel, time]` input gains
/// a singleton batch axis and the output stays 3-D. Every stage preserves
/// the time axis except the final downsampler.
///
/// The detector is stateless across calls apart from its learnable
/// parameters and the standardization stages' running statistics; forward
/// passes take `&self`, and concurrent inference reads are safe as long
/// as training steps are serialized externally.
#[derive(Debug)]
pub struct EnvelopeDetector {
    config: EnvelopeDetectorConfig,
    spatial: SpatialFilter,
    spatial_norm: Standardize,
    temporal: Option<TemporalFilter>,
    temporal_norm: Option<Standardize>,
    smoother: Option<TemporalSmoother>,
    downsampler: Option<Downsampler>,
    hilbert: HilbertTransform,
}

impl EnvelopeDetector {
    /// Build the detector with entropy-seeded initialization.
    pub fn new(config: EnvelopeDetectorConfig, device: &Device) -> Result<Self> {
        Self::build(config, StdRng::from_entropy(), device)
    }

    /// Build the detector with a fixed initialization seed.
    pub fn new_seeded(
        config: EnvelopeDetectorConfig,
        seed: u64,
        device: &Device,
    ) -> Result<Self> {
        Self::build(config, StdRng::seed_from_u64(seed), device)
    }

    fn build(
        config: EnvelopeDetectorConfig,
        mut rng: StdRng,
        device: &Device,
    ) -> Result<Self> {
        config.validate()?;

        let spatial = SpatialFilter::new(
            config.nchannels,
            config.nfeatures,
            config.spatial_bias,
            &mut rng,
            device,
        )?;
        let spatial_norm = Standardize::new(config.nfeatures, device)?;

        let (temporal, temporal_norm) = if config.temporal_filter {
            (
                Some(TemporalFilter::new(
                    config.nfeatures,
                    config.temporal_filter_size,
                    config.temporal_filter_dilation,
                    &mut rng,
                    device,
                )?),
                Some(Standardize::new(config.nfeatures, device)?),
            )
        } else {
            (None, None)
        };

        let smoother = if config.temporal_smoother {
            Some(TemporalSmoother::new(
                config.output_features(),
                config.temporal_smoother_size,
                &mut rng,
                device,
            )?)
        } else {
            None
        };

        let downsampler =
            Downsampler::build(config.downsample_method, config.downsample_coef, device)?;

        debug!(
            nchannels = config.nchannels,
            nfeatures = config.nfeatures,
            activation = %config.activation,
            temporal_filter = config.temporal_filter,
            downsample_coef = config.downsample_coef,
            "envelope detector ready"
        );

        Ok(Self {
            config,
            spatial,
            spatial_norm,
            temporal,
            temporal_norm,
            smoother,
            downsampler,
            hilbert: HilbertTransform::new(),
        })
    }

    /// Run the pipeline. With `train` set, standardization uses (and
    /// updates) batch statistics and dropout is active; otherwise the
    /// pass is deterministic.
    pub fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let x = match x.rank() {
            2 => x.unsqueeze(0)?,
            3 => x.clone(),
            r => {
                return Err(Error::Config(format!(
                    "detector input must be [channel, time] or [batch, channel, time], got rank {r}"
                )));
            }
        };

        let x = self.spatial.forward(&x)?;
        let mut x = self.spatial_norm.forward_t(&x, train)?;

        if let Some(temporal) = &self.temporal {
            x = temporal.forward(&x)?;
        }
        if train && self.config.dropout > 0.0 {
            x = candle_nn::ops::dropout(&x, self.config.dropout)?;
        }
        if let Some(norm) = &self.temporal_norm {
            x = norm.forward_t(&x, train)?;
        }

        x = self.config.activation.apply(&x, &self.hilbert)?;

        if let Some(smoother) = &self.smoother {
            x = smoother.forward(&x)?;
        }
        if let Some(downsampler) = &self.downsampler {
            x = downsampler.forward(&x)?;
        }
        Ok(x)
    }

    /// Deterministic (evaluation-mode) forward pass.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.forward_t(x, false)
    }

    /// The learned spatial mixing matrix `[nfeatures, nchannels]`,
    /// detached from the autodiff tape.
    pub fn spatial_filter(&self) -> Result<Tensor> {
        self.spatial.weight_matrix()
    }

    /// The effective temporal kernel applied to undilated time steps.
    ///
    /// With a temporal stage this is the dilation-reconstructed kernel of
    /// length `1 + (size - 1) * dilation`, taps at stride `dilation` and
    /// zeros between; without one it is an all-ones `[nfeatures, 1]`
    /// identity. Detached either way.
    pub fn temporal_filter(&self) -> Result<Tensor> {
        match &self.temporal {
            Some(temporal) => temporal.dilated_kernel(),
            None => Ok(Tensor::ones(
                (self.config.nfeatures, 1),
                candle_core::DType::F32,
                self.spatial_filter()?.device(),
            )?),
        }
    }

    /// Overwrite the spatial stage with externally designed weights
    /// `[nfeatures, nchannels]` (and bias `[nfeatures]` when the stage has
    /// one). Useful for warm-starting from beamformer or CSP projections.
    pub fn set_spatial_weights(&self, weight: &Tensor, bias: Option<&Tensor>) -> Result<()> {
        self.spatial.set_weights(weight, bias)
    }

    /// Overwrite the temporal FIR taps `[nfeatures, size]`, e.g. with an
    /// analytically designed band-pass. Fails when the stage is absent.
    pub fn set_temporal_weights(&self, weight: &Tensor) -> Result<()> {
        match &self.temporal {
            Some(temporal) => temporal.set_weights(weight),
            None => Err(Error::Config(
                "this detector was built without a temporal filter".to_string(),
            )),
        }
    }

    /// All learnable variables, for handing to an optimizer.
    pub fn trainable_vars(&self) -> Vec<Var> {
        let mut vars = self.spatial.trainable_vars();
        if let Some(temporal) = &self.temporal {
            vars.extend(temporal.trainable_vars());
        }
        if let Some(smoother) = &self.smoother {
            vars.extend(smoother.trainable_vars());
        }
        vars
    }

    /// The configuration this detector was built from.
    pub fn config(&self) -> &EnvelopeDetectorConfig {
        &self.config
    }

    /// Feature count of the output tensor.
    pub fn output_features(&self) -> usize {
        self.config.output_features()
    }
}
