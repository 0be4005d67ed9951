mod scores;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use scores::EmotionScores;

/// The fixed 7-label emotion set shared by the face and voice paths.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Sad,
        Emotion::Surprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which classifier produced an estimate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Face,
    Voice,
}

/// Acoustic descriptors extracted from one analysis window. Kept on the
/// estimate as a snapshot for logging and diagnostics.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct VoiceFeatures {
    /// Peak absolute amplitude.
    pub volume: f32,
    /// Mean squared amplitude.
    pub energy: f32,
    pub zero_crossing_rate: f32,
    pub spectral_rolloff: f32,
    pub pitch_variation: f32,
}

/// A single classifier's opinion for one cycle. Immutable once created.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmotionEstimate {
    pub label: Emotion,
    pub confidence: f32,
    pub source: Source,
    pub features: Option<VoiceFeatures>,
}

impl EmotionEstimate {
    pub fn face(label: Emotion, confidence: f32) -> Self {
        Self {
            label,
            confidence,
            source: Source::Face,
            features: None,
        }
    }

    pub fn voice(label: Emotion, confidence: f32, features: VoiceFeatures) -> Self {
        Self {
            label,
            confidence,
            source: Source::Voice,
            features: Some(features),
        }
    }
}
