use crate::config::ClassifierConfig;
use crate::emotion::{Emotion, EmotionEstimate, EmotionScores, VoiceFeatures};
use crate::util::Ring;
use crate::voice::FeatureExtractor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Wall-clock period of the variety-injection phase cycle.
const PHASE_CYCLE_SECS: f64 = 15.0;
/// Penalty on a label that keeps repeating, and the boost everything else
/// receives in exchange.
const REPEAT_PENALTY: f32 = 0.7;
const REPEAT_OTHERS_BOOST: f32 = 1.1;
/// Per-emotion jitter range and the positive floor applied afterwards.
const JITTER_LOW: f32 = -0.08;
const JITTER_HIGH: f32 = 0.12;
const SCORE_FLOOR: f32 = 0.05;
/// Cap on the loudness-derived confidence boost.
const MAX_CONFIDENCE_BOOST: f32 = 0.3;

/// Rule-based voice emotion classifier.
///
/// Scoring starts from a fixed prior, accumulates non-exclusive threshold
/// bands over the acoustic descriptors, then layers on a wall-clock phase
/// bias, anti-repetition damping against the recent label history, and
/// bounded random jitter before normalizing and picking the argmax.
///
/// The randomness source is an explicit parameter so tests can seed it.
pub struct VoiceClassifier<R: Rng = StdRng> {
    config: ClassifierConfig,
    extractor: FeatureExtractor,
    history: Ring<Emotion>,
    rng: R,
}

impl VoiceClassifier<StdRng> {
    pub fn new(config: ClassifierConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }
}

impl<R: Rng> VoiceClassifier<R> {
    pub fn with_rng(config: ClassifierConfig, rng: R) -> Self {
        Self {
            history: Ring::new(config.history_len),
            extractor: FeatureExtractor::new(),
            config,
            rng,
        }
    }

    /// Classifies one analysis window. Returns `None` for windows that are
    /// too short or below the silence gate: silence is "no opinion", never
    /// neutral. Descriptor extraction degrades internally and cannot fail
    /// the classification.
    pub fn classify(&mut self, samples: &[f32], now: Duration) -> Option<EmotionEstimate> {
        if samples.len() < self.config.min_samples {
            return None;
        }

        let features = self.extractor.extract(samples);
        if features.volume < self.config.silence_threshold {
            tracing::trace!(volume = features.volume, "window below silence gate");
            return None;
        }

        let mut scores = base_scores();
        apply_bands(&mut scores, &features);
        apply_phase_bias(&mut scores, now);
        self.apply_anti_repetition(&mut scores);

        for label in Emotion::ALL {
            scores.add(label, self.rng.random_range(JITTER_LOW..JITTER_HIGH));
        }
        scores.clamp_floor(SCORE_FLOOR);
        scores.normalize();

        let (label, base_confidence) = scores.argmax();
        let rms = features.energy.sqrt();
        let boost = (features.volume * 2.0 + rms * 1.5).min(MAX_CONFIDENCE_BOOST);
        let confidence = (base_confidence + boost).min(self.config.confidence_ceiling);

        self.history.push(label);
        tracing::debug!(
            label = %label,
            confidence,
            volume = features.volume,
            zcr = features.zero_crossing_rate,
            rolloff = features.spectral_rolloff,
            "voice window classified"
        );

        Some(EmotionEstimate::voice(label, confidence, features))
    }

    /// Once a label has repeated within the history ring, damp it and give
    /// every other label a small edge.
    fn apply_anti_repetition(&self, scores: &mut EmotionScores) {
        if self.history.len() <= 2 {
            return;
        }
        if let Some(&last) = self.history.last() {
            if self.history.count_of(&last) >= 2 {
                scores.scale(last, REPEAT_PENALTY);
                scores.scale_others(last, REPEAT_OTHERS_BOOST);
            }
        }
    }
}

/// Fixed prior distribution over the 7 emotions.
fn base_scores() -> EmotionScores {
    let mut scores = EmotionScores::zero();
    scores.add(Emotion::Neutral, 0.15);
    scores.add(Emotion::Happy, 0.14);
    scores.add(Emotion::Sad, 0.13);
    scores.add(Emotion::Angry, 0.12);
    scores.add(Emotion::Surprise, 0.11);
    scores.add(Emotion::Fear, 0.10);
    scores.add(Emotion::Disgust, 0.09);
    scores
}

/// Non-exclusive threshold bands over the descriptors, applied in fixed
/// order; later bonuses stack onto earlier ones.
fn apply_bands(scores: &mut EmotionScores, f: &VoiceFeatures) {
    // Loudness.
    if f.volume > 0.3 {
        scores.add(Emotion::Angry, 0.25);
        scores.add(Emotion::Surprise, 0.20);
        scores.add(Emotion::Happy, 0.15);
    } else if f.volume > 0.15 {
        scores.add(Emotion::Happy, 0.20);
        scores.add(Emotion::Neutral, 0.15);
    } else {
        scores.add(Emotion::Sad, 0.25);
        scores.add(Emotion::Fear, 0.15);
        scores.add(Emotion::Neutral, 0.10);
    }

    // Overall energy.
    if f.energy > 0.02 {
        scores.add(Emotion::Angry, 0.20);
        scores.add(Emotion::Happy, 0.18);
        scores.add(Emotion::Surprise, 0.12);
    } else if f.energy < 0.005 {
        scores.add(Emotion::Sad, 0.22);
        scores.add(Emotion::Fear, 0.15);
    }

    // Roughness vs. smoothness.
    if f.zero_crossing_rate > 0.15 {
        scores.add(Emotion::Angry, 0.25);
        scores.add(Emotion::Disgust, 0.15);
    } else if f.zero_crossing_rate < 0.05 {
        scores.add(Emotion::Happy, 0.20);
        scores.add(Emotion::Neutral, 0.10);
    }

    // Spectral brightness.
    if f.spectral_rolloff > 0.6 {
        scores.add(Emotion::Happy, 0.22);
        scores.add(Emotion::Surprise, 0.18);
    } else if f.spectral_rolloff < 0.3 {
        scores.add(Emotion::Sad, 0.20);
        scores.add(Emotion::Fear, 0.15);
    }

    // Pitch movement.
    if f.pitch_variation > 0.7 {
        scores.add(Emotion::Surprise, 0.25);
        scores.add(Emotion::Fear, 0.18);
        scores.add(Emotion::Happy, 0.12);
    } else if f.pitch_variation < 0.3 {
        scores.add(Emotion::Sad, 0.20);
        scores.add(Emotion::Neutral, 0.15);
    }
}

/// Deterministic wall-clock bias: `now mod 15s` splits into five equal
/// phases, each favoring a different subset of emotions. This is explicit
/// variety injection, not a signal-derived feature; it keeps the output
/// from sticking to one label under static audio.
fn apply_phase_bias(scores: &mut EmotionScores, now: Duration) {
    let cycle = (now.as_secs_f64() % PHASE_CYCLE_SECS) / PHASE_CYCLE_SECS;
    if cycle < 0.2 {
        scores.add(Emotion::Happy, 0.15);
        scores.add(Emotion::Surprise, 0.10);
    } else if cycle < 0.4 {
        scores.add(Emotion::Neutral, 0.12);
    } else if cycle < 0.6 {
        scores.add(Emotion::Sad, 0.15);
        scores.add(Emotion::Fear, 0.08);
    } else if cycle < 0.8 {
        scores.add(Emotion::Angry, 0.18);
        scores.add(Emotion::Disgust, 0.10);
    } else {
        scores.add(Emotion::Surprise, 0.20);
        scores.add(Emotion::Fear, 0.10);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn test_classifier() -> VoiceClassifier<StdRng> {
        VoiceClassifier::with_rng(ClassifierConfig::default(), StdRng::seed_from_u64(7))
    }

    fn voiced_window(amplitude: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * 220.0 * i as f32 / 16_000.0).sin())
            .collect()
    }

    #[test]
    fn silence_yields_no_opinion() {
        let mut c = test_classifier();
        let quiet = voiced_window(0.003, 48_000);
        assert_eq!(c.classify(&quiet, Duration::from_secs(1)), None);
    }

    #[test]
    fn short_windows_are_rejected() {
        let mut c = test_classifier();
        let short = voiced_window(0.8, 500);
        assert_eq!(c.classify(&short, Duration::from_secs(1)), None);
    }

    #[test]
    fn estimate_is_well_formed() {
        let mut c = test_classifier();
        let window = voiced_window(0.6, 48_000);
        let est = c.classify(&window, Duration::from_secs(4)).expect("estimate");

        assert!(Emotion::ALL.contains(&est.label));
        assert!(est.confidence > 0.0 && est.confidence <= 0.92);
        let features = est.features.expect("snapshot");
        assert!((features.volume - 0.6).abs() < 0.05);
        assert_eq!(c.history.len(), 1);
    }

    #[test]
    fn seeded_rng_makes_classification_deterministic() {
        let window = voiced_window(0.4, 48_000);
        let now = Duration::from_secs(9);

        let a = test_classifier().classify(&window, now).expect("estimate");
        let b = test_classifier().classify(&window, now).expect("estimate");
        assert_eq!(a, b);
    }

    #[test]
    fn history_is_capped_at_ten_labels() {
        let mut c = test_classifier();
        let window = voiced_window(0.5, 48_000);
        for i in 0..15 {
            let _ = c.classify(&window, Duration::from_secs(i));
        }
        assert_eq!(c.history.len(), 10);
    }

    #[test]
    fn quiet_dark_monotone_bands_score_sad_highest() {
        let mut scores = base_scores();
        let features = VoiceFeatures {
            volume: 0.01,
            energy: 0.001,
            zero_crossing_rate: 0.03,
            spectral_rolloff: 0.2,
            pitch_variation: 0.1,
        };
        apply_bands(&mut scores, &features);

        // sad: 0.13 prior + 0.25 quiet + 0.22 low energy + 0.20 dark + 0.20 monotone
        let (label, score) = scores.argmax();
        assert_eq!(label, Emotion::Sad);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn loud_harsh_bands_boost_angry() {
        let mut scores = base_scores();
        let features = VoiceFeatures {
            volume: 0.5,
            energy: 0.05,
            zero_crossing_rate: 0.2,
            spectral_rolloff: 0.45,
            pitch_variation: 0.5,
        };
        apply_bands(&mut scores, &features);

        // angry: 0.12 prior + 0.25 loud + 0.20 energetic + 0.25 harsh
        assert!((scores[Emotion::Angry] - 0.82).abs() < 1e-6);
        assert!(scores[Emotion::Angry] > scores[Emotion::Sad]);
    }

    #[test]
    fn phase_bias_cycles_through_subsets() {
        let mut first = EmotionScores::zero();
        apply_phase_bias(&mut first, Duration::from_secs(1));
        assert!(first[Emotion::Happy] > 0.0);
        assert_eq!(first[Emotion::Sad], 0.0);

        let mut third = EmotionScores::zero();
        apply_phase_bias(&mut third, Duration::from_secs(7));
        assert!(third[Emotion::Sad] > 0.0);
        assert_eq!(third[Emotion::Happy], 0.0);

        // The cycle wraps every 15 seconds.
        let mut wrapped = EmotionScores::zero();
        apply_phase_bias(&mut wrapped, Duration::from_secs(16));
        assert_eq!(wrapped[Emotion::Happy], first[Emotion::Happy]);
    }

    #[test]
    fn repeated_label_is_damped() {
        let mut c = test_classifier();
        for _ in 0..3 {
            c.history.push(Emotion::Happy);
        }

        let mut scores = EmotionScores::zero();
        for label in Emotion::ALL {
            scores.add(label, 1.0);
        }
        c.apply_anti_repetition(&mut scores);

        assert!((scores[Emotion::Happy] - 0.7).abs() < 1e-6);
        assert!((scores[Emotion::Angry] - 1.1).abs() < 1e-6);
    }

    #[test]
    fn fresh_history_applies_no_damping() {
        let mut c = test_classifier();
        c.history.push(Emotion::Happy);
        c.history.push(Emotion::Happy);

        let mut scores = EmotionScores::zero();
        scores.add(Emotion::Happy, 1.0);
        c.apply_anti_repetition(&mut scores);
        assert_eq!(scores[Emotion::Happy], 1.0);
    }
}
