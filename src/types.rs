use serde::{Deserialize, Serialize};

/// A multichannel time-series recording in physical units
#[derive(Debug, Clone)]
pub struct Recording {
    pub channel_labels: Vec<String>,
    /// Sampling rate in Hz (shared by all channels)
    pub sample_rate: f64,
    /// Channel-major sample data: channels[c][s]
    pub channels: Vec<Vec<f64>>,
}

impl Recording {
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_samples(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        self.num_samples() as f64 / self.sample_rate
    }
}

/// Screening outcome classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassLabel {
    #[serde(rename = "Healthy")]
    Healthy,
    #[serde(rename = "MDD")]
    Mdd,
}

impl ClassLabel {
    /// Class code 1 is the positive (disease) class; anything else is healthy
    pub fn from_code(code: usize) -> Self {
        if code == 1 {
            ClassLabel::Mdd
        } else {
            ClassLabel::Healthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassLabel::Healthy => "Healthy",
            ClassLabel::Mdd => "MDD",
        }
    }
}

impl std::fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one classification request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: ClassLabel,
    /// Probability of the positive class, in [0, 1]
    pub probability: f64,
    /// Raw class index as produced by the classifier
    pub raw_code: usize,
}
