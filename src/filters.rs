//! IIR filters as cascaded second-order sections (biquads).
//!
//! Butterworth lowpass/highpass via bilinear transform; bandpass is the
//! highpass/lowpass cascade. Used for the fixed EEG denoising band.

use std::f64::consts::PI;

use crate::error::{Result, ScreenError};

/// Second-order section coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// Single biquad section with Direct Form II Transposed state
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    z1: f64,
    z2: f64,
}

impl BiquadFilter {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.coeffs.b0 * input + self.z1;
        self.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.z2;
        self.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

/// Cascaded second-order sections filter
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<BiquadFilter>,
    gain: f64,
}

impl SosFilter {
    pub fn new(sections: Vec<BiquadCoeffs>, gain: f64) -> Self {
        Self {
            sections: sections.into_iter().map(BiquadFilter::new).collect(),
            gain,
        }
    }

    /// Process a single sample through all sections
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let mut output = input * self.gain;
        for section in &mut self.sections {
            output = section.process(output);
        }
        output
    }

    /// Process an entire signal in-place
    pub fn process_signal(&mut self, signal: &mut [f64]) {
        for sample in signal.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Process a signal into a new array (original unchanged)
    pub fn filter(&mut self, signal: &[f64]) -> Vec<f64> {
        signal.iter().map(|&s| self.process(s)).collect()
    }

    /// Reset all section states
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }
}

/// Butterworth filter designer
pub struct ButterworthFilter;

impl ButterworthFilter {
    pub fn lowpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
        let wn = Self::prewarp(cutoff, sample_rate);
        let (sos, gain) = Self::design_lowpass(wn, order);
        SosFilter::new(sos, gain)
    }

    pub fn highpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
        let wn = Self::prewarp(cutoff, sample_rate);
        let (sos, gain) = Self::design_highpass(wn, order);
        SosFilter::new(sos, gain)
    }

    pub fn bandpass(low: f64, high: f64, sample_rate: f64, order: usize) -> SosFilter {
        let wn_low = Self::prewarp(low, sample_rate);
        let wn_high = Self::prewarp(high, sample_rate);

        // Bandpass = cascade of highpass at the low edge and lowpass at the high edge
        let (hp_sos, hp_gain) = Self::design_highpass(wn_low, order);
        let (lp_sos, lp_gain) = Self::design_lowpass(wn_high, order);

        let mut sections = hp_sos;
        sections.extend(lp_sos);
        SosFilter::new(sections, hp_gain * lp_gain)
    }

    /// Prewarp frequency for the bilinear transform
    fn prewarp(freq: f64, sample_rate: f64) -> f64 {
        (PI * freq / sample_rate).tan()
    }

    fn design_lowpass(wn: f64, order: usize) -> (Vec<BiquadCoeffs>, f64) {
        let num_sections = (order + 1) / 2;
        let mut sections = Vec::with_capacity(num_sections);

        for k in 0..num_sections {
            let theta = PI * (2.0 * k as f64 + 1.0) / (2.0 * order as f64);
            let alpha = -2.0 * theta.cos();

            if order % 2 == 1 && k == num_sections - 1 {
                // Odd order: final first-order section H(s) = wn / (s + wn)
                let k_coeff = wn / (1.0 + wn);
                sections.push(BiquadCoeffs {
                    b0: k_coeff,
                    b1: k_coeff,
                    b2: 0.0,
                    a1: (wn - 1.0) / (wn + 1.0),
                    a2: 0.0,
                });
            } else {
                let wn2 = wn * wn;
                let denom = 1.0 + alpha * wn + wn2;
                sections.push(BiquadCoeffs {
                    b0: wn2 / denom,
                    b1: 2.0 * wn2 / denom,
                    b2: wn2 / denom,
                    a1: 2.0 * (wn2 - 1.0) / denom,
                    a2: (1.0 - alpha * wn + wn2) / denom,
                });
            }
        }

        (sections, 1.0)
    }

    fn design_highpass(wn: f64, order: usize) -> (Vec<BiquadCoeffs>, f64) {
        let num_sections = (order + 1) / 2;
        let mut sections = Vec::with_capacity(num_sections);

        for k in 0..num_sections {
            let theta = PI * (2.0 * k as f64 + 1.0) / (2.0 * order as f64);
            let alpha = -2.0 * theta.cos();

            if order % 2 == 1 && k == num_sections - 1 {
                let k_coeff = 1.0 / (1.0 + wn);
                sections.push(BiquadCoeffs {
                    b0: k_coeff,
                    b1: -k_coeff,
                    b2: 0.0,
                    a1: (wn - 1.0) / (wn + 1.0),
                    a2: 0.0,
                });
            } else {
                let wn2 = wn * wn;
                let denom = 1.0 + alpha * wn + wn2;
                sections.push(BiquadCoeffs {
                    b0: 1.0 / denom,
                    b1: -2.0 / denom,
                    b2: 1.0 / denom,
                    a1: 2.0 * (wn2 - 1.0) / denom,
                    a2: (1.0 - alpha * wn + wn2) / denom,
                });
            }
        }

        (sections, 1.0)
    }
}

/// Design a validated Butterworth bandpass filter
pub fn bandpass(low: f64, high: f64, sample_rate: f64, order: usize) -> Result<SosFilter> {
    let nyquist = sample_rate / 2.0;

    if order == 0 {
        return Err(ScreenError::InvalidConfig(
            "filter order must be at least 1".to_string(),
        ));
    }
    if low <= 0.0 || low >= high {
        return Err(ScreenError::InvalidConfig(format!(
            "band edges must satisfy 0 < low < high, got {}-{} Hz",
            low, high
        )));
    }
    if high >= nyquist {
        return Err(ScreenError::InvalidConfig(format!(
            "high cutoff ({} Hz) must be below Nyquist ({} Hz)",
            high, nyquist
        )));
    }

    Ok(ButterworthFilter::bandpass(low, high, sample_rate, order))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(signal: &[f64]) -> f64 {
        (signal.iter().map(|x| x * x).sum::<f64>() / signal.len() as f64).sqrt()
    }

    fn tone(freq: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut filter = ButterworthFilter::lowpass(10.0, 100.0, 2);
        let mut out = 0.0;
        for _ in 0..200 {
            out = filter.process(1.0);
        }
        assert!((out - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut filter = ButterworthFilter::highpass(1.0, 100.0, 2);
        let mut out = 1.0;
        for _ in 0..500 {
            out = filter.process(1.0);
        }
        assert!(out.abs() < 0.01);
    }

    #[test]
    fn test_process_signal_matches_per_sample_processing() {
        let signal = tone(10.0, 256.0, 512);
        let mut filter = bandpass(0.5, 45.0, 256.0, 4).unwrap();
        let expected = filter.filter(&signal);

        filter.reset();
        let mut in_place = signal.clone();
        filter.process_signal(&mut in_place);
        assert_eq!(in_place, expected);
    }

    #[test]
    fn test_bandpass_attenuates_out_of_band() {
        let sample_rate = 256.0;
        let mut filter = bandpass(0.5, 45.0, sample_rate, 4).unwrap();

        // 10 Hz is in band, 100 Hz is not
        let in_band = tone(10.0, sample_rate, 2048);
        let out_band = tone(100.0, sample_rate, 2048);

        let in_filtered = filter.filter(&in_band);
        filter.reset();
        let out_filtered = filter.filter(&out_band);

        // Skip transient at the start
        assert!(rms(&in_filtered[512..]) > 0.5);
        assert!(rms(&out_filtered[512..]) < 0.05);
    }

    #[test]
    fn test_bandpass_rejects_bad_edges() {
        assert!(bandpass(45.0, 0.5, 256.0, 4).is_err());
        assert!(bandpass(0.5, 200.0, 256.0, 4).is_err());
        assert!(bandpass(0.0, 45.0, 256.0, 4).is_err());
        assert!(bandpass(0.5, 45.0, 256.0, 0).is_err());
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut filter = bandpass(0.5, 45.0, 256.0, 4).unwrap();
        let signal = tone(10.0, 256.0, 512);
        let first = filter.filter(&signal);
        filter.reset();
        let second = filter.filter(&signal);
        assert_eq!(first, second);
    }
}
