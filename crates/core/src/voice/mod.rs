//! Heuristic acoustic emotion classification.
//!
//! This is an engineered, rule-based heuristic over signal descriptors,
//! explicitly tunable rather than a trained model. `features` extracts scalar
//! descriptors from an analysis window, `classifier` maps them to an
//! emotion label and confidence through an additive rule table with
//! variety injection and anti-repetition control.

mod classifier;
mod features;

pub use classifier::VoiceClassifier;
pub use features::FeatureExtractor;
