//! Signal feature extractor: EDF recording -> fixed-length statistical
//! feature vector.
//!
//! Pipeline (deterministic, order matters for reproducibility):
//! load -> band-pass filter -> split into epochs -> per-epoch channel
//! statistics (mean, std, var, max) -> flatten -> exactly `feature_len`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::edf;
use crate::error::{Result, ScreenError};
use crate::filters;
use crate::types::Recording;

/// Configuration for the extraction pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Low band edge in Hz
    #[serde(default = "default_band_low")]
    pub band_low: f64,

    /// High band edge in Hz
    #[serde(default = "default_band_high")]
    pub band_high: f64,

    /// Butterworth filter order
    #[serde(default = "default_filter_order")]
    pub filter_order: usize,

    /// Number of equal-length epochs the recording is split into
    #[serde(default = "default_num_epochs")]
    pub num_epochs: usize,

    /// Required feature vector length (the model's trained input width)
    #[serde(default = "default_feature_len")]
    pub feature_len: usize,
}

fn default_band_low() -> f64 {
    0.5
}
fn default_band_high() -> f64 {
    45.0
}
fn default_filter_order() -> usize {
    4
}
fn default_num_epochs() -> usize {
    10
}
fn default_feature_len() -> usize {
    80
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            band_low: default_band_low(),
            band_high: default_band_high(),
            filter_order: default_filter_order(),
            num_epochs: default_num_epochs(),
            feature_len: default_feature_len(),
        }
    }
}

/// Extract the feature vector from an EDF recording file
pub fn extract_from_edf<P: AsRef<Path>>(path: P, config: &ExtractionConfig) -> Result<Vec<f64>> {
    let recording = edf::read_recording(path)?;
    extract_from_recording(&recording, config)
}

/// Extract the feature vector from an in-memory recording
pub fn extract_from_recording(recording: &Recording, config: &ExtractionConfig) -> Result<Vec<f64>> {
    if config.num_epochs == 0 {
        return Err(ScreenError::InvalidConfig(
            "number of epochs must be at least 1".to_string(),
        ));
    }

    // One prototype filter; each channel gets a pristine clone so state
    // never leaks across channels and results stay deterministic.
    let prototype = filters::bandpass(
        config.band_low,
        config.band_high,
        recording.sample_rate,
        config.filter_order,
    )?;

    let filtered: Vec<Vec<f64>> = recording
        .channels
        .par_iter()
        .map(|channel| {
            let mut filter = prototype.clone();
            let mut data = channel.clone();
            filter.process_signal(&mut data);
            data
        })
        .collect();

    let num_samples = recording.num_samples();
    let epoch_len = num_samples / config.num_epochs;
    if epoch_len == 0 {
        return Err(ScreenError::InsufficientFeatures {
            produced: 0,
            required: config.feature_len,
        });
    }

    // Per epoch: the four statistic vectors concatenated in fixed order,
    // then epochs concatenated in order. Remainder samples past the last
    // full epoch are dropped.
    let mut features =
        Vec::with_capacity(config.num_epochs * 4 * filtered.len());
    for epoch_index in 0..config.num_epochs {
        let start = epoch_index * epoch_len;
        let end = start + epoch_len;

        let stats: Vec<EpochStats> = filtered
            .iter()
            .map(|channel| EpochStats::compute(&channel[start..end]))
            .collect();

        features.extend(stats.iter().map(|s| s.mean));
        features.extend(stats.iter().map(|s| s.std));
        features.extend(stats.iter().map(|s| s.var));
        features.extend(stats.iter().map(|s| s.max));
    }

    if features.len() < config.feature_len {
        return Err(ScreenError::InsufficientFeatures {
            produced: features.len(),
            required: config.feature_len,
        });
    }
    features.truncate(config.feature_len);

    log::debug!(
        "extracted {} features from {} channels ({} samples per epoch)",
        features.len(),
        recording.num_channels(),
        epoch_len
    );

    Ok(features)
}

/// Summary statistics over one epoch of one channel
#[derive(Debug, Clone, Copy)]
struct EpochStats {
    mean: f64,
    std: f64,
    var: f64,
    max: f64,
}

impl EpochStats {
    /// Population variance/deviation, matching the trained feature pipeline
    fn compute(samples: &[f64]) -> Self {
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let var = samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
        let max = samples.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        Self {
            mean,
            std: var.sqrt(),
            var,
            max,
        }
    }
}
