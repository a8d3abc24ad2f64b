mod config;

use crate::config::Config;
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use video_recognition::{detect, Classifier, ClassifierConfig, FrameSampler, ImageSequence};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();
    let config = Config::parse();
    tracing::info!(config = ?config, "detect-layout starting");

    anyhow::ensure!(
        (0.0..=1.0).contains(&config.threshold),
        "threshold must be within [0, 1], got {}",
        config.threshold
    );

    let mut source = ImageSequence::open(&config.frames, config.fps)
        .with_context(|| format!("Failed to open frames in '{}'", config.frames.display()))?;

    let classifier = Classifier::new(ClassifierConfig {
        acceptance_threshold: config.threshold,
        ..Default::default()
    });
    let result = detect(&mut source, &FrameSampler::default(), classifier, config.samples)
        .await
        .context("Detection failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
