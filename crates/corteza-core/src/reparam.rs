//! Reparameterization maps for constrained learnable values.
//!
//! Filter parameters live in an unconstrained space and are pushed through
//! a fixed monotonic map on every use: softplus for strictly positive
//! frequencies, sigmoid for bandwidth fractions bounded in (0, 1). The maps
//! are differentiable, so gradient descent on the raw values respects the
//! constraints for free.

use candle_core::Tensor;

use crate::error::Result;

/// Softplus `ln(1 + exp(x))`, elementwise, in the overflow-stable form
/// `relu(x) + ln(1 + exp(-|x|))`.
pub fn softplus(x: &Tensor) -> Result<Tensor> {
    let linear = x.relu()?;
    let decay = x.abs()?.neg()?.exp()?;
    Ok((linear + decay.affine(1.0, 1.0)?.log()?)?)
}

/// Logistic sigmoid, re-exported from the backend for a single import site.
pub fn sigmoid(x: &Tensor) -> Result<Tensor> {
    Ok(candle_nn::ops::sigmoid(x)?)
}

/// Scalar softplus for host-side initialization math.
pub fn softplus_f32(x: f32) -> f32 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// Inverse sigmoid. Used to seed raw bandwidth parameters so the mapped
/// fraction starts at a chosen value in (0, 1).
pub fn logit(p: f32) -> f32 {
    (p / (1.0 - p)).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn softplus_is_positive_and_monotonic() {
        let device = Device::Cpu;
        let raw: Vec<f32> = vec![-20.0, -2.0, -0.5, 0.0, 0.5, 2.0, 20.0];
        let x = Tensor::from_vec(raw, 7, &device).unwrap();
        let y = softplus(&x).unwrap().to_vec1::<f32>().unwrap();

        for value in &y {
            assert!(*value > 0.0, "softplus must be strictly positive");
            assert!(value.is_finite());
        }
        for pair in y.windows(2) {
            assert!(pair[1] > pair[0], "softplus must be strictly increasing");
        }
        // Far from the knee softplus is close to identity.
        assert!((y[6] - 20.0).abs() < 1e-5);
    }

    #[test]
    fn sigmoid_is_bounded_and_monotonic() {
        let device = Device::Cpu;
        let raw: Vec<f32> = vec![-8.0, -1.0, 0.0, 1.0, 8.0];
        let x = Tensor::from_vec(raw, 5, &device).unwrap();
        let y = sigmoid(&x).unwrap().to_vec1::<f32>().unwrap();

        for value in &y {
            assert!(*value > 0.0 && *value < 1.0);
        }
        for pair in y.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert!((y[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn logit_inverts_sigmoid() {
        let device = Device::Cpu;
        for p in [0.1f32, 0.3, 0.5, 0.7, 0.9] {
            let x = Tensor::new(logit(p), &device).unwrap();
            let back = sigmoid(&x).unwrap().to_vec0::<f32>().unwrap();
            assert!((back - p).abs() < 1e-6, "sigmoid(logit({p})) = {back}");
        }
    }

    #[test]
    fn scalar_and_tensor_softplus_agree() {
        let device = Device::Cpu;
        let raw: Vec<f32> = vec![-3.0, -0.1, 0.0, 0.1, 3.0];
        let x = Tensor::from_vec(raw.clone(), 5, &device).unwrap();
        let y = softplus(&x).unwrap().to_vec1::<f32>().unwrap();
        for (input, output) in raw.iter().zip(y.iter()) {
            assert!((output - softplus_f32(*input)).abs() < 1e-6);
        }
    }
}
