use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_BLOCK_SAMPLES: usize = 1024;
pub const DEFAULT_WINDOW_SECS: u32 = 3;
pub const DEFAULT_INGEST_CAPACITY: usize = 10;
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 100;

pub const DEFAULT_FACE_WEIGHT: f32 = 0.7;
pub const DEFAULT_VOICE_WEIGHT: f32 = 0.3;
pub const DEFAULT_AGREEMENT_BONUS: f32 = 0.2;
pub const DEFAULT_SINGLE_SOURCE_DISCOUNT: f32 = 0.8;

pub const DEFAULT_CHANGE_THRESHOLD: f32 = 0.4;
pub const DEFAULT_FACE_CHANGE_THRESHOLD: f32 = 0.7;
pub const DEFAULT_VOICE_CHANGE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_HIGH_CONFIDENCE_THRESHOLD: f32 = 0.85;
pub const DEFAULT_HEARTBEAT_SECS: f64 = 2.0;
pub const DEFAULT_MIN_GAP_SECS: f64 = 0.5;

pub const DEFAULT_SPEECH_CAPACITY: usize = 50;
pub const DEFAULT_SPEECH_KEEP_RECENT: usize = 10;
pub const DEFAULT_SPEECH_WORKERS: usize = 2;

/// Fixed window geometry of the ingest pipeline: blocks of `block_samples`
/// arrive at `sample_rate`, windows span `window_secs` and advance by
/// `window_secs - 1` seconds (one second of overlap carries over).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub block_samples: usize,
    pub window_secs: u32,
}

impl AudioConfig {
    pub fn new(sample_rate: u32, block_samples: usize, window_secs: u32) -> Result<Self, ConfigError> {
        if sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if block_samples == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        // A 1-second carry-over needs windows strictly longer than 1 second.
        if window_secs < 2 {
            return Err(ConfigError::WindowTooShort);
        }
        Ok(Self {
            sample_rate,
            block_samples,
            window_secs,
        })
    }

    /// Samples in one completed analysis window.
    pub fn target_samples(&self) -> usize {
        self.sample_rate as usize * self.window_secs as usize
    }

    /// Samples carried over into the next window (1 second of overlap).
    pub fn carry_samples(&self) -> usize {
        self.sample_rate as usize
    }

    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_samples as f64 / f64::from(self.sample_rate))
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_samples: DEFAULT_BLOCK_SAMPLES,
            window_secs: DEFAULT_WINDOW_SECS,
        }
    }
}

/// Tunables of the heuristic voice classifier.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    /// Windows shorter than this are rejected outright.
    pub min_samples: usize,
    /// Peak-amplitude gate below which the window is treated as silence.
    pub silence_threshold: f32,
    /// Entries kept in the anti-repetition label history.
    pub history_len: usize,
    /// Hard cap on reported confidence.
    pub confidence_ceiling: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_samples: 1000,
            silence_threshold: 0.005,
            history_len: 10,
            confidence_ceiling: 0.92,
        }
    }
}

/// Fusion weights are independent multipliers, not a normalized weighted
/// average; they may sum to more than 1 and the agreement path clamps to 1.0.
/// Downstream thresholds are tuned against exactly this behavior.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct FusionWeights {
    pub face: f32,
    pub voice: f32,
    pub agreement_bonus: f32,
    pub single_source_discount: f32,
}

impl FusionWeights {
    pub fn new(face: f32, voice: f32) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&face) || !(0.0..=1.0).contains(&voice) {
            return Err(ConfigError::WeightOutOfRange);
        }
        Ok(Self {
            face,
            voice,
            ..Self::default()
        })
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            face: DEFAULT_FACE_WEIGHT,
            voice: DEFAULT_VOICE_WEIGHT,
            agreement_bonus: DEFAULT_AGREEMENT_BONUS,
            single_source_discount: DEFAULT_SINGLE_SOURCE_DISCOUNT,
        }
    }
}

/// Thresholds of the five speech triggers, in their evaluation order.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TriggerThresholds {
    pub change: f32,
    pub face_change: f32,
    pub voice_change: f32,
    pub high_confidence: f32,
    pub heartbeat: Duration,
    pub min_gap: Duration,
}

impl Default for TriggerThresholds {
    fn default() -> Self {
        Self {
            change: DEFAULT_CHANGE_THRESHOLD,
            face_change: DEFAULT_FACE_CHANGE_THRESHOLD,
            voice_change: DEFAULT_VOICE_CHANGE_THRESHOLD,
            high_confidence: DEFAULT_HIGH_CONFIDENCE_THRESHOLD,
            heartbeat: Duration::from_secs_f64(DEFAULT_HEARTBEAT_SECS),
            min_gap: Duration::from_secs_f64(DEFAULT_MIN_GAP_SECS),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchConfig {
    pub capacity: usize,
    /// On overflow the queue is drained down to this many most-recent events
    /// before the new one is admitted.
    pub keep_recent: usize,
    pub workers: usize,
}

impl DispatchConfig {
    pub fn new(capacity: usize, keep_recent: usize, workers: usize) -> Result<Self, ConfigError> {
        if capacity == 0 || workers == 0 {
            return Err(ConfigError::ZeroDispatch);
        }
        if keep_recent >= capacity {
            return Err(ConfigError::KeepRecentTooLarge);
        }
        Ok(Self {
            capacity,
            keep_recent,
            workers,
        })
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SPEECH_CAPACITY,
            keep_recent: DEFAULT_SPEECH_KEEP_RECENT,
            workers: DEFAULT_SPEECH_WORKERS,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub classifier: ClassifierConfig,
    pub fusion: FusionWeights,
    pub triggers: TriggerThresholds,
    pub dispatch: DispatchConfig,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("sample rate must be > 0")]
    ZeroSampleRate,
    #[error("block size must be > 0 samples")]
    ZeroBlockSize,
    #[error("window must span at least 2 seconds")]
    WindowTooShort,
    #[error("fusion weight must lie in [0, 1]")]
    WeightOutOfRange,
    #[error("dispatch capacity and worker count must be > 0")]
    ZeroDispatch,
    #[error("keep_recent must be smaller than capacity")]
    KeepRecentTooLarge,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_config_derived_lengths() {
        let cfg = AudioConfig::default();
        assert_eq!(cfg.target_samples(), 48_000);
        assert_eq!(cfg.carry_samples(), 16_000);
        assert_eq!(cfg.block_duration(), Duration::from_secs_f64(1024.0 / 16_000.0));
    }

    #[test]
    fn audio_config_rejects_degenerate_values() {
        assert_eq!(AudioConfig::new(0, 1024, 3), Err(ConfigError::ZeroSampleRate));
        assert_eq!(AudioConfig::new(16_000, 0, 3), Err(ConfigError::ZeroBlockSize));
        assert_eq!(AudioConfig::new(16_000, 1024, 1), Err(ConfigError::WindowTooShort));
    }

    #[test]
    fn fusion_weights_validate_range() {
        assert!(FusionWeights::new(0.7, 0.3).is_ok());
        assert_eq!(FusionWeights::new(1.2, 0.3), Err(ConfigError::WeightOutOfRange));
    }

    #[test]
    fn dispatch_config_rejects_keep_recent_at_capacity() {
        assert_eq!(
            DispatchConfig::new(10, 10, 2),
            Err(ConfigError::KeepRecentTooLarge)
        );
        assert!(DispatchConfig::new(50, 10, 2).is_ok());
    }
}
