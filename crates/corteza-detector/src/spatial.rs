//! Spatial mixing: a learnable 1x1 convolution across channels.

use candle_core::{Device, Tensor, Var};
use rand::Rng;
use rand::rngs::StdRng;

use corteza_core::{Error, Result};

/// Mixes `nchannels` input channels into `nfeatures` virtual channels with
/// a per-sample linear map (a kernel-size-1 convolution), optionally with
/// a bias.
///
/// For cortical recordings this is the stage that learns source-space
/// projections; its weight matrix is the primary interpretability surface
/// of the whole detector.
#[derive(Debug)]
pub struct SpatialFilter {
    weight: Var,
    bias: Option<Var>,
    nchannels: usize,
    nfeatures: usize,
}

impl SpatialFilter {
    /// Build with uniform `+-1/sqrt(nchannels)` initialization, the
    /// standard fan-in rule for a kernel-size-1 convolution.
    pub(crate) fn new(
        nchannels: usize,
        nfeatures: usize,
        bias: bool,
        rng: &mut StdRng,
        device: &Device,
    ) -> Result<Self> {
        let bound = 1.0 / (nchannels as f32).sqrt();
        let weight: Vec<f32> = (0..nfeatures * nchannels)
            .map(|_| (rng.r#gen::<f32>() * 2.0 - 1.0) * bound)
            .collect();
        let weight = Var::from_tensor(&Tensor::from_vec(
            weight,
            (nfeatures, nchannels, 1),
            device,
        )?)?;

        let bias = if bias {
            let values: Vec<f32> = (0..nfeatures)
                .map(|_| (rng.r#gen::<f32>() * 2.0 - 1.0) * bound)
                .collect();
            Some(Var::from_tensor(&Tensor::from_vec(
                values, nfeatures, device,
            )?)?)
        } else {
            None
        };

        Ok(Self {
            weight,
            bias,
            nchannels,
            nfeatures,
        })
    }

    /// Apply to `[batch, channel, time]`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let channels = x.dim(1)?;
        if channels != self.nchannels {
            return Err(Error::ChannelMismatch {
                expected: self.nchannels,
                actual: channels,
            });
        }
        let y = x
            .contiguous()?
            .conv1d(self.weight.as_tensor(), 0, 1, 1, 1)?;
        match &self.bias {
            Some(b) => Ok(y.broadcast_add(&b.as_tensor().reshape((1, self.nfeatures, 1))?)?),
            None => Ok(y),
        }
    }

    /// The mixing matrix `[nfeatures, nchannels]`, detached.
    pub fn weight_matrix(&self) -> Result<Tensor> {
        Ok(self
            .weight
            .as_tensor()
            .reshape((self.nfeatures, self.nchannels))?
            .detach())
    }

    /// Overwrite the mixing matrix (and bias, when present) with
    /// externally designed values, e.g. a beamformer or CSP projection.
    pub(crate) fn set_weights(&self, weight: &Tensor, bias: Option<&Tensor>) -> Result<()> {
        if weight.dims() != [self.nfeatures, self.nchannels] {
            return Err(Error::ParamShape(format!(
                "spatial weights must be [{}, {}], got {:?}",
                self.nfeatures,
                self.nchannels,
                weight.dims()
            )));
        }
        self.weight
            .set(&weight.reshape((self.nfeatures, self.nchannels, 1))?)?;
        match (&self.bias, bias) {
            (Some(var), Some(values)) => {
                if values.dims() != [self.nfeatures] {
                    return Err(Error::ParamShape(format!(
                        "spatial bias must be [{}], got {:?}",
                        self.nfeatures,
                        values.dims()
                    )));
                }
                var.set(values)?;
            }
            (None, Some(_)) => {
                return Err(Error::Config(
                    "this spatial stage was built without a bias".to_string(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// Learnable variables of this stage.
    pub(crate) fn trainable_vars(&self) -> Vec<Var> {
        let mut vars = vec![self.weight.clone()];
        if let Some(b) = &self.bias {
            vars.push(b.clone());
        }
        vars
    }
}
