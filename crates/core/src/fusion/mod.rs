//! Pure fusion of the latest face and voice estimates.

use crate::config::FusionWeights;
use crate::emotion::{Emotion, EmotionEstimate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which source(s) and rule produced a fused estimate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Agreement,
    FaceDominant,
    VoiceDominant,
    FaceOnly,
    VoiceOnly,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Agreement => "agreement",
            Provenance::FaceDominant => "face_dominant",
            Provenance::VoiceDominant => "voice_dominant",
            Provenance::FaceOnly => "face_only",
            Provenance::VoiceOnly => "voice_only",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FusionResult {
    pub label: Emotion,
    pub confidence: f32,
    pub provenance: Provenance,
}

/// Combines the current face and voice estimates into one fused estimate.
///
/// The weights are independent multipliers rather than a normalized
/// weighted average; the agreement path can exceed 1 and is clamped.
/// Single-source estimates are discounted. On disagreement the larger
/// weighted confidence wins, with exact ties going to the voice side
/// (the comparison is strictly-greater for face, consistently).
pub fn fuse(
    face: Option<&EmotionEstimate>,
    voice: Option<&EmotionEstimate>,
    weights: &FusionWeights,
) -> Option<FusionResult> {
    match (face, voice) {
        (None, None) => None,
        (Some(f), None) => Some(FusionResult {
            label: f.label,
            confidence: f.confidence * weights.single_source_discount,
            provenance: Provenance::FaceOnly,
        }),
        (None, Some(v)) => Some(FusionResult {
            label: v.label,
            confidence: v.confidence * weights.single_source_discount,
            provenance: Provenance::VoiceOnly,
        }),
        (Some(f), Some(v)) if f.label == v.label => Some(FusionResult {
            label: f.label,
            confidence: (f.confidence * weights.face + v.confidence * weights.voice
                + weights.agreement_bonus)
                .min(1.0),
            provenance: Provenance::Agreement,
        }),
        (Some(f), Some(v)) => {
            let face_weighted = f.confidence * weights.face;
            let voice_weighted = v.confidence * weights.voice;
            if face_weighted > voice_weighted {
                Some(FusionResult {
                    label: f.label,
                    confidence: face_weighted,
                    provenance: Provenance::FaceDominant,
                })
            } else {
                Some(FusionResult {
                    label: v.label,
                    confidence: voice_weighted,
                    provenance: Provenance::VoiceDominant,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::{Emotion, EmotionEstimate};

    fn face(label: Emotion, confidence: f32) -> EmotionEstimate {
        EmotionEstimate::face(label, confidence)
    }

    fn voice(label: Emotion, confidence: f32) -> EmotionEstimate {
        EmotionEstimate {
            source: crate::emotion::Source::Voice,
            ..EmotionEstimate::face(label, confidence)
        }
    }

    #[test]
    fn both_absent_is_none() {
        assert_eq!(fuse(None, None, &FusionWeights::default()), None);
    }

    #[test]
    fn single_source_is_discounted() {
        let w = FusionWeights::default();

        let f = fuse(Some(&face(Emotion::Happy, 0.9)), None, &w).unwrap();
        assert_eq!(f.label, Emotion::Happy);
        assert!((f.confidence - 0.72).abs() < 1e-6);
        assert_eq!(f.provenance, Provenance::FaceOnly);

        let v = fuse(None, Some(&voice(Emotion::Fear, 0.5)), &w).unwrap();
        assert!((v.confidence - 0.4).abs() < 1e-6);
        assert_eq!(v.provenance, Provenance::VoiceOnly);
    }

    #[test]
    fn agreement_boosts_and_clamps() {
        let w = FusionWeights::default();
        let fused = fuse(
            Some(&face(Emotion::Happy, 0.9)),
            Some(&voice(Emotion::Happy, 0.6)),
            &w,
        )
        .unwrap();

        // 0.9 * 0.7 + 0.6 * 0.3 + 0.2 = 1.01, clamped to 1.0.
        assert_eq!(fused.label, Emotion::Happy);
        assert_eq!(fused.confidence, 1.0);
        assert_eq!(fused.provenance, Provenance::Agreement);
    }

    #[test]
    fn disagreement_picks_larger_weighted_confidence() {
        let w = FusionWeights::default();
        let fused = fuse(
            Some(&face(Emotion::Sad, 0.5)),
            Some(&voice(Emotion::Angry, 0.9)),
            &w,
        )
        .unwrap();

        // face 0.35 vs voice 0.27.
        assert_eq!(fused.label, Emotion::Sad);
        assert!((fused.confidence - 0.35).abs() < 1e-6);
        assert_eq!(fused.provenance, Provenance::FaceDominant);

        let flipped = fuse(
            Some(&face(Emotion::Sad, 0.3)),
            Some(&voice(Emotion::Angry, 0.9)),
            &w,
        )
        .unwrap();
        assert_eq!(flipped.label, Emotion::Angry);
        assert_eq!(flipped.provenance, Provenance::VoiceDominant);
    }

    #[test]
    fn exact_tie_favors_voice() {
        let w = FusionWeights::default();
        // 0.3 * 0.7 = 0.21 on both sides.
        let fused = fuse(
            Some(&face(Emotion::Sad, 0.3)),
            Some(&voice(Emotion::Angry, 0.7)),
            &w,
        )
        .unwrap();
        assert_eq!(fused.label, Emotion::Angry);
        assert_eq!(fused.provenance, Provenance::VoiceDominant);
    }
}
