#![deny(warnings)]

use anyhow::Context;
use clap::Parser;
use emotivox_core::config::{
    AppConfig, AudioConfig, DispatchConfig, DEFAULT_BLOCK_SAMPLES, DEFAULT_SAMPLE_RATE,
    DEFAULT_SPEECH_CAPACITY, DEFAULT_SPEECH_KEEP_RECENT, DEFAULT_SPEECH_WORKERS,
    DEFAULT_WINDOW_SECS,
};
use emotivox_core::ingest::AudioBlock;
use emotivox_core::pipeline::{EmotionPipeline, IngestHandle, NoFaceSource, ShutdownHandle};
use emotivox_core::speech::TraceSpeechRenderer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "emotivox")]
#[command(about = "Real-time voice emotion detection with spoken feedback")]
struct Args {
    /// How long to run before shutting down.
    #[arg(long, default_value_t = 30)]
    duration_secs: u64,

    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    #[arg(long, default_value_t = DEFAULT_BLOCK_SAMPLES)]
    block_samples: usize,

    #[arg(long, default_value_t = DEFAULT_SPEECH_WORKERS)]
    workers: usize,

    /// Seed for the synthetic microphone; OS-random when omitted.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let cfg = build_config(&args)?;

    tracing::info!(
        sample_rate = cfg.audio.sample_rate,
        block_samples = cfg.audio.block_samples,
        workers = cfg.dispatch.workers,
        duration_secs = args.duration_secs,
        "config loaded"
    );

    run(cfg, args).await
}

async fn run(cfg: AppConfig, args: Args) -> anyhow::Result<()> {
    let pipeline = EmotionPipeline::new(
        cfg.clone(),
        NoFaceSource,
        Arc::new(TraceSpeechRenderer::new()),
    );
    let ingest = pipeline.ingest_handle();
    let shutdown = pipeline.shutdown_handle();

    let feeder = tokio::spawn(feed_synthetic_audio(
        ingest,
        shutdown.clone(),
        cfg.audio,
        args.seed,
    ));

    let stopper = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(args.duration_secs)).await;
            tracing::info!("run duration elapsed, stopping");
            shutdown.stop();
        })
    };

    let report = pipeline.run().await?;
    feeder.await?;
    stopper.await?;

    tracing::info!(
        spoken = report.spoken_count,
        dropped_blocks = report.dropped_blocks,
        "run finished"
    );

    Ok(())
}

/// Stands in for a microphone: emits blocks at real-time cadence carrying a
/// tone whose loudness and pitch drift slowly, plus a little noise, so the
/// classifier sees alternating silence and speech-like audio.
async fn feed_synthetic_audio(
    ingest: IngestHandle,
    shutdown: ShutdownHandle,
    audio: AudioConfig,
    seed: Option<u64>,
) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut ticker = tokio::time::interval(audio.block_duration());
    let mut sample_index: u64 = 0;

    while shutdown.is_running() {
        ticker.tick().await;

        let mut samples = Vec::with_capacity(audio.block_samples);
        for i in 0..audio.block_samples {
            let t = (sample_index + i as u64) as f32 / audio.sample_rate as f32;
            let loudness = 0.3 * (0.5 + 0.5 * (2.0 * PI * t / 8.0).sin());
            let pitch = 180.0 + 120.0 * (2.0 * PI * t / 13.0).sin();
            let noise: f32 = rng.random_range(-0.02..0.02);
            samples.push(loudness * (2.0 * PI * pitch * t).sin() + noise);
        }
        sample_index += audio.block_samples as u64;

        // Rejections (overflow, shutdown mid-loop) are already counted
        // pipeline-side.
        let _ = ingest.ingest(AudioBlock::new(samples));
    }

    tracing::debug!("synthetic audio source stopped");
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn build_config(args: &Args) -> anyhow::Result<AppConfig> {
    let audio = AudioConfig::new(args.sample_rate, args.block_samples, DEFAULT_WINDOW_SECS)
        .context("invalid audio geometry")?;
    let dispatch = DispatchConfig::new(
        DEFAULT_SPEECH_CAPACITY,
        DEFAULT_SPEECH_KEEP_RECENT,
        args.workers,
    )
    .context("invalid dispatch settings")?;

    Ok(AppConfig {
        audio,
        dispatch,
        ..AppConfig::default()
    })
}
