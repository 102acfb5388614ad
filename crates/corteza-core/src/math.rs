//! Small numeric helpers shared by the filter kernels.

use candle_core::Tensor;

use crate::error::Result;
use std::f32::consts::PI;

/// Threshold under which the sinc argument is treated as zero.
const SINC_EPS: f64 = 1e-7;

/// Normalized sinc, `sin(pi*x) / (pi*x)` with `sinc(0) = 1`, elementwise.
///
/// The argument is masked before the division so that neither the value nor
/// its gradient picks up a NaN at the removable singularity. Filter kernels
/// always evaluate this at a grid point equal to zero, so the guard is on
/// the hot path, not an edge case.
pub fn sinc(x: &Tensor) -> Result<Tensor> {
    let tiny = Tensor::full(SINC_EPS as f32, x.shape(), x.device())?;
    let near_zero = x.abs()?.lt(&tiny)?;
    let safe = near_zero.where_cond(&x.ones_like()?, x)?;
    let scaled = (safe * f64::from(PI))?;
    let values = scaled.sin()?.div(&scaled)?;
    Ok(near_zero.where_cond(&values.ones_like()?, &values)?)
}

/// Scalar counterpart of [`sinc`] for host-side kernel design.
pub fn sinc_f32(x: f32) -> f32 {
    if f64::from(x.abs()) < SINC_EPS {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}
