use crate::emotion::Emotion;
use std::ops::{Index, IndexMut};

/// Dense score table over the 7 emotions. The additive rule bands of the
/// voice classifier accumulate into one of these before normalization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmotionScores([f32; 7]);

fn slot(label: Emotion) -> usize {
    match label {
        Emotion::Angry => 0,
        Emotion::Disgust => 1,
        Emotion::Fear => 2,
        Emotion::Happy => 3,
        Emotion::Neutral => 4,
        Emotion::Sad => 5,
        Emotion::Surprise => 6,
    }
}

impl EmotionScores {
    pub fn zero() -> Self {
        Self([0.0; 7])
    }

    pub fn add(&mut self, label: Emotion, bonus: f32) {
        self.0[slot(label)] += bonus;
    }

    pub fn scale(&mut self, label: Emotion, factor: f32) {
        self.0[slot(label)] *= factor;
    }

    /// Scales every label except `kept`.
    pub fn scale_others(&mut self, kept: Emotion, factor: f32) {
        for label in Emotion::ALL {
            if label != kept {
                self.scale(label, factor);
            }
        }
    }

    /// Clamps every score to at least `floor`, keeping normalization
    /// well-defined even after negative jitter.
    pub fn clamp_floor(&mut self, floor: f32) {
        for v in &mut self.0 {
            if *v < floor {
                *v = floor;
            }
        }
    }

    /// Normalizes scores to sum to 1. A degenerate all-zero table becomes
    /// uniform rather than NaN.
    pub fn normalize(&mut self) {
        let total: f32 = self.0.iter().sum();
        if total > 0.0 {
            for v in &mut self.0 {
                *v /= total;
            }
        } else {
            self.0 = [1.0 / 7.0; 7];
        }
    }

    /// Label with the highest score, together with that score.
    pub fn argmax(&self) -> (Emotion, f32) {
        let mut best = Emotion::ALL[0];
        let mut best_score = self.0[slot(best)];
        for label in Emotion::ALL {
            let s = self.0[slot(label)];
            if s > best_score {
                best = label;
                best_score = s;
            }
        }
        (best, best_score)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
        Emotion::ALL.iter().map(move |&label| (label, self.0[slot(label)]))
    }
}

impl Index<Emotion> for EmotionScores {
    type Output = f32;

    fn index(&self, label: Emotion) -> &f32 {
        &self.0[slot(label)]
    }
}

impl IndexMut<Emotion> for EmotionScores {
    fn index_mut(&mut self, label: Emotion) -> &mut f32 {
        &mut self.0[slot(label)]
    }
}
