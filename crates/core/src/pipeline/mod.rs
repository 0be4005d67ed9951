//! Pipeline wiring: the ingest consumer, the decision loop, and shutdown.
//!
//! Three concurrent contexts meet here. The audio device producer calls
//! [`IngestHandle::ingest`] and never blocks. A dedicated blocking task
//! drains the block queue, assembles windows, classifies them, and
//! publishes the latest voice estimate through a `watch` holder (single
//! writer, snapshot reads). The decision loop polls the face source and
//! the holder once per cycle, fuses, evaluates the speech triggers, and
//! submits events to the dispatch workers.

use crate::config::{AppConfig, AudioConfig, DEFAULT_INGEST_CAPACITY, DEFAULT_POLL_TIMEOUT_MS};
use crate::emotion::EmotionEstimate;
use crate::fusion::fuse;
use crate::ingest::{AudioBlock, IngestQueue, WindowAssembler};
use crate::speech::{RendererProvider, SpeechDispatcher, SpeechError, SpeechTrigger};
use crate::voice::VoiceClassifier;
use futures::future::BoxFuture;
use futures::FutureExt;
use rand::Rng;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

/// Cadence of the decision loop.
const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_millis(100);
/// Cadence of the periodic status line.
const STATUS_INTERVAL: Duration = Duration::from_secs(3);

/// External face classifier boundary. Implementations translate their own
/// failures into `None` for the cycle; errors never propagate into the
/// decision loop.
pub trait FaceSource: Send + Sync {
    fn current(&self) -> BoxFuture<'_, Option<EmotionEstimate>>;
}

/// Face source for setups without a camera: fusion runs voice-only.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFaceSource;

impl FaceSource for NoFaceSource {
    fn current(&self) -> BoxFuture<'_, Option<EmotionEstimate>> {
        async { None }.boxed()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("speech dispatch failed: {0}")]
    Speech(#[from] SpeechError),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Cloneable handle the audio device callback feeds blocks into.
#[derive(Clone)]
pub struct IngestHandle {
    queue: Arc<IngestQueue>,
    running: Arc<AtomicBool>,
}

impl IngestHandle {
    /// Non-blocking; safe to call from a real-time audio callback.
    pub fn ingest(&self, block: AudioBlock) -> bool {
        if !self.running.load(Ordering::Relaxed) {
            return false;
        }
        self.queue.ingest(block)
    }
}

/// Cooperative stop signal shared by every loop.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn stop(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters reported once the pipeline has stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineReport {
    pub spoken_count: u64,
    pub dropped_blocks: u64,
}

pub struct EmotionPipeline<F: FaceSource> {
    config: AppConfig,
    face: F,
    provider: Arc<dyn RendererProvider>,
    queue: Arc<IngestQueue>,
    running: Arc<AtomicBool>,
    cycle_interval: Duration,
}

impl<F: FaceSource> EmotionPipeline<F> {
    pub fn new(config: AppConfig, face: F, provider: Arc<dyn RendererProvider>) -> Self {
        Self {
            config,
            face,
            provider,
            queue: Arc::new(IngestQueue::new(DEFAULT_INGEST_CAPACITY)),
            running: Arc::new(AtomicBool::new(true)),
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
        }
    }

    pub fn with_cycle_interval(mut self, interval: Duration) -> Self {
        self.cycle_interval = interval;
        self
    }

    pub fn ingest_handle(&self) -> IngestHandle {
        IngestHandle {
            queue: Arc::clone(&self.queue),
            running: Arc::clone(&self.running),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.running))
    }

    /// Runs until the shutdown handle stops it. Teardown clears pending
    /// speech and best-effort-stops the renderers.
    pub async fn run(self) -> Result<PipelineReport, PipelineError> {
        let dispatcher = SpeechDispatcher::start(self.config.dispatch, Arc::clone(&self.provider))?;

        if let Err(e) = dispatcher.speak_now("Emotion detection system ready").await {
            tracing::warn!(error = %e, "startup announcement failed");
        }

        let (voice_tx, voice_rx) = watch::channel(None);
        let consumer = {
            let queue = Arc::clone(&self.queue);
            let running = Arc::clone(&self.running);
            let audio = self.config.audio;
            let classifier = VoiceClassifier::new(self.config.classifier);
            tokio::task::spawn_blocking(move || {
                run_ingest_consumer(
                    &queue,
                    &audio,
                    classifier,
                    &voice_tx,
                    &running,
                    Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
                )
            })
        };

        let mut trigger = SpeechTrigger::new(self.config.triggers);
        let mut ticker = tokio::time::interval(self.cycle_interval);
        let mut last_status = tokio::time::Instant::now();

        while self.running.load(Ordering::Relaxed) {
            ticker.tick().await;

            let face = self.face.current().await;
            let voice = voice_rx.borrow().clone();
            let now = wall_clock();

            let fused = fuse(face.as_ref(), voice.as_ref(), &self.config.fusion);
            if let Some(event) = trigger.evaluate(fused.as_ref(), face.as_ref(), voice.as_ref(), now)
            {
                dispatcher.submit(event);
            }

            if last_status.elapsed() >= STATUS_INTERVAL {
                last_status = tokio::time::Instant::now();
                match &fused {
                    Some(f) => tracing::debug!(
                        label = %f.label,
                        confidence = f.confidence,
                        provenance = %f.provenance,
                        spoken = trigger.spoken_count(),
                        "current estimate"
                    ),
                    None => tracing::debug!(
                        spoken = trigger.spoken_count(),
                        "no estimate from either source"
                    ),
                }
            }
        }

        let report = PipelineReport {
            spoken_count: trigger.spoken_count(),
            dropped_blocks: self.queue.dropped_blocks(),
        };

        dispatcher.shutdown().await;
        consumer.await?;
        tracing::info!(
            spoken = report.spoken_count,
            dropped_blocks = report.dropped_blocks,
            "pipeline stopped"
        );

        Ok(report)
    }
}

/// Seconds-since-epoch timestamp fed to the classifier's phase bias and
/// the trigger rate limits.
fn wall_clock() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
}

/// Ingest consumer: drains the block queue with short timed polls, cuts
/// windows, classifies, and publishes. A fault in one iteration is logged
/// and the loop moves on; silence keeps the previous published estimate.
fn run_ingest_consumer<R: Rng>(
    queue: &IngestQueue,
    audio: &AudioConfig,
    mut classifier: VoiceClassifier<R>,
    estimates: &watch::Sender<Option<EmotionEstimate>>,
    running: &AtomicBool,
    poll_timeout: Duration,
) {
    let mut assembler = WindowAssembler::new(audio);

    while running.load(Ordering::Relaxed) {
        let Some(block) = queue.pop_timeout(poll_timeout) else {
            continue;
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            assembler
                .push_block(&block)
                .and_then(|window| classifier.classify(window.samples(), wall_clock()))
        }));

        match outcome {
            Ok(Some(estimate)) => {
                let _ = estimates.send(Some(estimate));
            }
            Ok(None) => {}
            Err(_) => {
                tracing::error!("ingest consumer iteration panicked; continuing");
            }
        }
    }

    tracing::debug!("ingest consumer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::emotion::Source;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::f32::consts::PI;

    fn loud_block(n: usize) -> AudioBlock {
        AudioBlock::new(
            (0..n)
                .map(|i| 0.6 * (2.0 * PI * 220.0 * i as f32 / 1_000.0).sin())
                .collect(),
        )
    }

    #[tokio::test]
    async fn consumer_publishes_estimate_after_one_window() {
        let audio = AudioConfig::new(1_000, 250, 3).unwrap();
        let queue = Arc::new(IngestQueue::new(64));
        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = watch::channel(None);

        // Exactly one window's worth of blocks.
        for _ in 0..12 {
            assert!(queue.ingest(loud_block(250)));
        }

        let consumer = {
            let queue = Arc::clone(&queue);
            let running = Arc::clone(&running);
            let classifier = VoiceClassifier::with_rng(
                ClassifierConfig::default(),
                StdRng::seed_from_u64(11),
            );
            tokio::task::spawn_blocking(move || {
                run_ingest_consumer(
                    &queue,
                    &audio,
                    classifier,
                    &tx,
                    &running,
                    Duration::from_millis(10),
                )
            })
        };

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while rx.borrow().is_none() {
            assert!(tokio::time::Instant::now() < deadline, "no estimate published");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let estimate = rx.borrow().clone().unwrap();
        assert_eq!(estimate.source, Source::Voice);
        assert!(estimate.confidence > 0.0 && estimate.confidence <= 1.0);

        running.store(false, Ordering::Relaxed);
        consumer.await.unwrap();
    }

    #[tokio::test]
    async fn ingest_handle_stops_accepting_after_shutdown() {
        let pipeline = EmotionPipeline::new(
            AppConfig::default(),
            NoFaceSource,
            Arc::new(crate::speech::TraceSpeechRenderer::new()),
        );
        let handle = pipeline.ingest_handle();
        let shutdown = pipeline.shutdown_handle();

        assert!(handle.ingest(loud_block(8)));
        shutdown.stop();
        assert!(!shutdown.is_running());
        assert!(!handle.ingest(loud_block(8)));
    }
}
