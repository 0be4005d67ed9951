use crate::emotion::VoiceFeatures;
use realfft::RealFftPlanner;

/// Cumulative-energy fraction that defines the spectral rolloff point.
const ROLLOFF_ENERGY_FRACTION: f32 = 0.85;
/// Autocorrelation lags searched for pitch peaks.
const MAX_PITCH_LAG: usize = 400;
/// Fallback for descriptors whose extraction degenerates. Chosen to sit
/// between the rule bands so a failed descriptor biases nothing.
const NEUTRAL_DESCRIPTOR: f32 = 0.5;

/// Extracts the scalar descriptors the classifier scores on. Owns the FFT
/// planner so repeated windows reuse the cached plan.
pub struct FeatureExtractor {
    planner: RealFftPlanner<f32>,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            planner: RealFftPlanner::new(),
        }
    }

    pub fn extract(&mut self, samples: &[f32]) -> VoiceFeatures {
        VoiceFeatures {
            volume: peak_amplitude(samples),
            energy: mean_squared(samples),
            zero_crossing_rate: zero_crossing_rate(samples),
            spectral_rolloff: self.spectral_rolloff(samples),
            pitch_variation: pitch_variation(samples),
        }
    }

    /// Smallest fraction of the magnitude spectrum, by bin index, whose
    /// cumulative energy reaches 85% of the total. Degenerate spectra
    /// (silence, FFT failure) fall back to the neutral default.
    fn spectral_rolloff(&mut self, samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return NEUTRAL_DESCRIPTOR;
        }

        let fft = self.planner.plan_fft_forward(samples.len());
        let mut input = samples.to_vec();
        let mut spectrum = fft.make_output_vec();
        if fft.process(&mut input, &mut spectrum).is_err() {
            return NEUTRAL_DESCRIPTOR;
        }

        let magnitudes: Vec<f32> = spectrum.iter().map(|c| c.norm()).collect();
        let total: f32 = magnitudes.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return NEUTRAL_DESCRIPTOR;
        }

        let threshold = ROLLOFF_ENERGY_FRACTION * total;
        let mut cumulative = 0.0;
        for (i, m) in magnitudes.iter().enumerate() {
            cumulative += m;
            if cumulative >= threshold {
                return i as f32 / magnitudes.len() as f32;
            }
        }
        NEUTRAL_DESCRIPTOR
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn peak_amplitude(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |acc, &x| acc.max(x.abs()))
}

pub(crate) fn mean_squared(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&x| x * x).sum::<f32>() / samples.len() as f32
}

fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Fraction of adjacent-sample sign changes, scaled as the original
/// heuristic scales it (a full crossing contributes 2/n).
pub(crate) fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let flips: f32 = samples
        .windows(2)
        .map(|pair| (sign(pair[1]) - sign(pair[0])).abs())
        .sum();
    flips / samples.len() as f32
}

/// Coefficient of variation (std/mean) of the local maxima among the first
/// 400 lags of the window's autocorrelation, clamped to 1.0. Fewer than two
/// maxima, or a non-finite result, yields the neutral default.
pub(crate) fn pitch_variation(samples: &[f32]) -> f32 {
    let max_lag = MAX_PITCH_LAG.min(samples.len().saturating_sub(1));
    if max_lag < 2 {
        return NEUTRAL_DESCRIPTOR;
    }

    let mut autocorr = Vec::with_capacity(max_lag + 1);
    for lag in 0..=max_lag {
        let mut sum = 0.0_f32;
        for i in 0..samples.len() - lag {
            sum += samples[i] * samples[i + lag];
        }
        autocorr.push(sum);
    }

    let mut peaks = Vec::new();
    for i in 1..max_lag {
        if autocorr[i] > autocorr[i - 1] && autocorr[i] > autocorr[i + 1] {
            peaks.push(autocorr[i]);
        }
    }
    if peaks.len() < 2 {
        return NEUTRAL_DESCRIPTOR;
    }

    let mean = peaks.iter().sum::<f32>() / peaks.len() as f32;
    let variance = peaks.iter().map(|p| (p - mean) * (p - mean)).sum::<f32>() / peaks.len() as f32;
    let variation = variance.sqrt() / (mean + 1e-10);
    if !variation.is_finite() {
        return NEUTRAL_DESCRIPTOR;
    }
    variation.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn peak_and_energy_of_constant_signal() {
        let samples = vec![0.5; 256];
        assert_eq!(peak_amplitude(&samples), 0.5);
        assert!((mean_squared(&samples) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn zero_crossing_rate_of_alternating_signal_is_maximal() {
        let samples: Vec<f32> = (0..100).map(|i| if i % 2 == 0 { 0.3 } else { -0.3 }).collect();
        // Every adjacent pair flips sign, each contributing 2/n.
        let rate = zero_crossing_rate(&samples);
        assert!((rate - 2.0 * 99.0 / 100.0).abs() < 1e-4);

        let dc = vec![0.4_f32; 100];
        assert_eq!(zero_crossing_rate(&dc), 0.0);
    }

    #[test]
    fn rolloff_tracks_spectral_brightness() {
        let mut extractor = FeatureExtractor::new();
        let low = extractor.spectral_rolloff(&sine(100.0, 16_000.0, 4_096));
        let high = extractor.spectral_rolloff(&sine(6_000.0, 16_000.0, 4_096));
        assert!(low < high, "low={low} high={high}");
        assert!((0.0..=1.0).contains(&low));
        assert!((0.0..=1.0).contains(&high));
    }

    #[test]
    fn rolloff_defaults_on_silence() {
        let mut extractor = FeatureExtractor::new();
        assert_eq!(extractor.spectral_rolloff(&vec![0.0; 2_048]), 0.5);
        assert_eq!(extractor.spectral_rolloff(&[]), 0.5);
    }

    #[test]
    fn pitch_variation_defaults_on_degenerate_input() {
        assert_eq!(pitch_variation(&[]), 0.5);
        assert_eq!(pitch_variation(&[0.1, 0.2]), 0.5);
        // Pure silence has a flat autocorrelation with no local maxima.
        assert_eq!(pitch_variation(&vec![0.0; 2_000]), 0.5);
    }

    #[test]
    fn pitch_variation_is_bounded() {
        let samples = sine(220.0, 16_000.0, 4_096);
        let v = pitch_variation(&samples);
        assert!(v <= 1.0);
    }
}
