//! Speech feedback: trigger decisions and queued dispatch to a renderer.

mod dispatch;
mod trigger;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use dispatch::SpeechDispatcher;
pub use trigger::SpeechTrigger;

/// Why a cycle decided to vocalize. Only one reason is recorded per cycle;
/// later triggers overwrite earlier ones.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpeakReason {
    EmotionChanged,
    FaceChanged,
    VoiceChanged,
    TimeBased,
    HighConfidence,
}

impl SpeakReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakReason::EmotionChanged => "emotion_changed",
            SpeakReason::FaceChanged => "face_changed",
            SpeakReason::VoiceChanged => "voice_changed",
            SpeakReason::TimeBased => "time_based",
            SpeakReason::HighConfidence => "high_confidence",
        }
    }
}

impl fmt::Display for SpeakReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One announcement, consumed exactly once by a dispatch worker.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpeechEvent {
    pub text: String,
    pub at: Duration,
    pub reason: SpeakReason,
}

#[derive(thiserror::Error, Debug)]
pub enum SpeechError {
    #[error("speech renderer unavailable: {0}")]
    RendererUnavailable(String),

    #[error("speech rendering failed: {0}")]
    RenderFailed(String),
}

/// Collaborator contract for the speech engine: render text to audible
/// speech, resolving only once output completed.
pub trait SpeechRenderer: Send + Sync {
    fn speak(&self, text: &str) -> BoxFuture<'_, Result<(), SpeechError>>;

    /// Best-effort stop during teardown; errors are suppressed by callers.
    fn stop(&self) -> BoxFuture<'_, Result<(), SpeechError>> {
        async { Ok(()) }.boxed()
    }
}

/// Hands out renderer instances. Each dispatch worker gets its own handle,
/// and the immediate-bypass path acquires a fresh one per call, so no
/// assumption of shareability is placed on the underlying engine.
pub trait RendererProvider: Send + Sync {
    fn acquire(&self) -> Result<Arc<dyn SpeechRenderer>, SpeechError>;
}

/// Renderer that logs instead of speaking. Stands in for a real engine in
/// the CLI demo and in tests.
#[derive(Clone, Default)]
pub struct TraceSpeechRenderer;

impl TraceSpeechRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl SpeechRenderer for TraceSpeechRenderer {
    fn speak(&self, text: &str) -> BoxFuture<'_, Result<(), SpeechError>> {
        let text = text.to_owned();
        async move {
            tracing::info!(text = %text, "speaking");
            Ok(())
        }
        .boxed()
    }
}

impl RendererProvider for TraceSpeechRenderer {
    fn acquire(&self) -> Result<Arc<dyn SpeechRenderer>, SpeechError> {
        Ok(Arc::new(self.clone()))
    }
}
