//! Train an envelope detector on a synthetic amplitude-modulated mixture.
//!
//! Two sources, an amplitude-modulated 40 Hz carrier and a 23 Hz
//! distractor, are mixed into four "sensor" channels. The detector learns
//! a spatial projection and temporal taps such that its output tracks the
//! modulator of the first source. Run with:
//!
//! ```text
//! cargo run --example train_am --release
//! ```

use candle_core::{Device, Tensor};
use candle_nn::{Optimizer, SGD};
use corteza_detector::{Activation, EnvelopeDetector, EnvelopeDetectorConfig};
use std::f32::consts::PI;
use tracing::info;

const SAMPLE_RATE: f32 = 250.0;
const TRIAL_LEN: usize = 500;
const CHANNELS: usize = 4;

/// One trial: mixed sensors plus the target envelope, phase-shifted by
/// `offset` seconds so every trial looks different.
fn make_trial(offset: f32, device: &Device) -> (Tensor, Tensor) {
    let mut sensors = vec![0f32; CHANNELS * TRIAL_LEN];
    let mut envelope = vec![0f32; TRIAL_LEN];

    // Fixed mixing: each sensor sees both sources at different gains.
    let mixing = [[0.9f32, 0.2], [0.4, -0.7], [-0.6, 0.5], [0.1, 0.8]];

    for t in 0..TRIAL_LEN {
        let time = offset + t as f32 / SAMPLE_RATE;
        let modulator = 0.6 + 0.4 * (2.0 * PI * 2.0 * time).cos();
        let target_source = modulator * (2.0 * PI * 40.0 * time).sin();
        let distractor = (2.0 * PI * 23.0 * time).sin();

        envelope[t] = modulator;
        for (c, gains) in mixing.iter().enumerate() {
            sensors[c * TRIAL_LEN + t] = gains[0] * target_source + gains[1] * distractor;
        }
    }

    let x = Tensor::from_vec(sensors, (1, CHANNELS, TRIAL_LEN), device).unwrap();
    let y = Tensor::from_vec(envelope, (1, 1, TRIAL_LEN), device).unwrap();
    (x, y)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let device = Device::Cpu;
    let config = EnvelopeDetectorConfig::new(CHANNELS, 1)
        .with_temporal_filter(9, 1)
        .with_activation(Activation::HilbertAmplitude)
        .with_smoother(7)
        .with_sample_rate(SAMPLE_RATE);
    let detector = EnvelopeDetector::new_seeded(config, 7, &device)?;

    let vars = detector.trainable_vars();
    info!(parameters = vars.len(), "training envelope detector");
    let mut optimizer = SGD::new(vars, 0.02)?;

    for step in 0..300 {
        let (x, target) = make_trial(step as f32 * 0.137, &device);
        let prediction = detector.forward_t(&x, true)?;
        let loss = (prediction - target)?.sqr()?.mean_all()?;
        optimizer.backward_step(&loss)?;

        if step % 30 == 0 {
            info!(step, loss = loss.to_vec0::<f32>()?, "sgd");
        }
    }

    // The learned spatial projection should favor the sensors that carry
    // the modulated source.
    let spatial = detector.spatial_filter()?;
    info!(?spatial, "learned spatial filter");
    let temporal = detector.temporal_filter()?;
    info!(?temporal, "learned temporal kernel");

    Ok(())
}
