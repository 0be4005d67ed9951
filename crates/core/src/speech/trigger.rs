use crate::config::TriggerThresholds;
use crate::emotion::{Emotion, EmotionEstimate};
use crate::fusion::FusionResult;
use crate::speech::{SpeakReason, SpeechEvent};
use std::time::Duration;

/// Rotation used for the generic reasons; indexed by `spoken_count % 8`.
const ROTATION: [&str; 8] = [
    "{e}",
    "{e} detected",
    "Emotion {e}",
    "{e} emotion",
    "Current emotion {e}",
    "Feeling {e}",
    "I see {e}",
    "{e} expression",
];

/// Per-cycle decision whether, and why, to vocalize the fused estimate.
///
/// Five independent triggers are evaluated in fixed order each cycle; a
/// later trigger's reason overwrites an earlier one. Rate limiting comes
/// from the heartbeat interval and the high-confidence minimum gap. No
/// fused result means no speech, whatever the triggers say.
pub struct SpeechTrigger {
    thresholds: TriggerThresholds,
    last_spoken_label: Option<Emotion>,
    last_spoken_at: Duration,
    last_face_label: Option<Emotion>,
    last_voice_label: Option<Emotion>,
    spoken_count: u64,
}

impl SpeechTrigger {
    pub fn new(thresholds: TriggerThresholds) -> Self {
        Self {
            thresholds,
            last_spoken_label: None,
            last_spoken_at: Duration::ZERO,
            last_face_label: None,
            last_voice_label: None,
            spoken_count: 0,
        }
    }

    pub fn spoken_count(&self) -> u64 {
        self.spoken_count
    }

    /// Evaluates one detection cycle. Returns the event to dispatch when a
    /// trigger fired and a fused result exists.
    pub fn evaluate(
        &mut self,
        fused: Option<&FusionResult>,
        face: Option<&EmotionEstimate>,
        voice: Option<&EmotionEstimate>,
        now: Duration,
    ) -> Option<SpeechEvent> {
        let t = self.thresholds;
        let mut reason: Option<SpeakReason> = None;

        // 1. Fused label changed since last spoken.
        if let Some(f) = fused {
            if self.last_spoken_label != Some(f.label) && f.confidence > t.change {
                reason = Some(SpeakReason::EmotionChanged);
            }
        }

        // 2. Face label changed. The remembered face label updates here
        // whether or not this cycle ends up speaking.
        if let Some(face) = face {
            if self.last_face_label != Some(face.label) && face.confidence > t.face_change {
                reason = Some(SpeakReason::FaceChanged);
                self.last_face_label = Some(face.label);
            }
        }

        // 3. Voice label changed, same bookkeeping.
        if let Some(voice) = voice {
            if self.last_voice_label != Some(voice.label) && voice.confidence > t.voice_change {
                reason = Some(SpeakReason::VoiceChanged);
                self.last_voice_label = Some(voice.label);
            }
        }

        // 4. Heartbeat: re-announce periodically even without change.
        if let Some(f) = fused {
            if now.saturating_sub(self.last_spoken_at) > t.heartbeat && f.confidence > t.change {
                reason = Some(SpeakReason::TimeBased);
            }
        }

        // 5. High confidence, lightly rate-limited.
        if let Some(f) = fused {
            if f.confidence > t.high_confidence
                && now.saturating_sub(self.last_spoken_at) > t.min_gap
            {
                reason = Some(SpeakReason::HighConfidence);
            }
        }

        let reason = reason?;
        let fused = fused?;

        self.spoken_count += 1;
        let text = self.build_message(fused.label, reason);
        self.last_spoken_label = Some(fused.label);
        self.last_spoken_at = now;

        tracing::debug!(
            label = %fused.label,
            confidence = fused.confidence,
            reason = %reason,
            count = self.spoken_count,
            "speech triggered"
        );

        Some(SpeechEvent {
            text,
            at: now,
            reason,
        })
    }

    /// Reason-specific phrasing for the source-change and high-confidence
    /// reasons; everything else rotates through the fixed 8-entry list.
    fn build_message(&self, label: Emotion, reason: SpeakReason) -> String {
        match reason {
            SpeakReason::FaceChanged => format!("Face shows {label}"),
            SpeakReason::VoiceChanged => format!("Voice shows {label}"),
            SpeakReason::HighConfidence => format!("Strong {label}"),
            SpeakReason::EmotionChanged | SpeakReason::TimeBased => {
                let template = ROTATION[(self.spoken_count % ROTATION.len() as u64) as usize];
                template.replace("{e}", label.as_str())
            }
        }
    }
}
