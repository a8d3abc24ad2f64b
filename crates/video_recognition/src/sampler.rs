//! Picks a bounded set of representative frames from a video source.

use crate::error::{DetectError, MediaError};
use crate::source::VideoSource;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::time::Duration;

/// Edge length of the downscaled analysis frames.
pub const SAMPLE_SIZE: u32 = 100;
/// Frames skipped at either end; intros and outros are often black or logos.
pub const EDGE_MARGIN_FRAMES: u32 = 5;
pub const DEFAULT_SAMPLE_COUNT: usize = 10;

/// A downscaled frame taken at a known playback position.
#[derive(Debug, Clone)]
pub struct FrameSample {
    pub position: Duration,
    /// RGBA pixels at the sampler's analysis resolution.
    pub pixels: RgbaImage,
    /// Size of the frame before downscaling; carries the real aspect ratio.
    pub source_width: u32,
    pub source_height: u32,
}

impl FrameSample {
    pub fn new(position: Duration, pixels: RgbaImage, source_width: u32, source_height: u32) -> Self {
        Self {
            position,
            pixels,
            source_width,
            source_height,
        }
    }

    /// Width:height of the original frame.
    #[inline]
    pub fn source_aspect(&self) -> f32 {
        self.source_width as f32 / self.source_height.max(1) as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    pub sample_width: u32,
    pub sample_height: u32,
    pub edge_margin_frames: u32,
    /// Cap on the skipped margin as a fraction of the duration, for short clips.
    pub max_edge_fraction: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_width: SAMPLE_SIZE,
            sample_height: SAMPLE_SIZE,
            edge_margin_frames: EDGE_MARGIN_FRAMES,
            max_edge_fraction: 0.1,
        }
    }
}

impl SamplerConfig {
    /// `count` evenly spaced positions between the edge margins, in playback order.
    pub fn positions(&self, duration: Duration, fps: f64, count: usize) -> Vec<Duration> {
        let total = duration.as_secs_f64();
        let by_frames = if fps > 0.0 {
            self.edge_margin_frames as f64 / fps
        } else {
            f64::INFINITY
        };
        let margin = by_frames.min(total * self.max_edge_fraction);
        let span = (total - 2.0 * margin).max(0.0);

        match count {
            0 => Vec::new(),
            1 => vec![Duration::from_secs_f64(margin + span / 2.0)],
            n => (0..n)
                .map(|i| Duration::from_secs_f64(margin + span * i as f64 / (n - 1) as f64))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSampler {
    config: SamplerConfig,
}

impl FrameSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Seeks to each sample position in turn and captures a downscaled frame.
    ///
    /// Positions the source cannot reach or decode are skipped; the batch only
    /// fails when nothing usable is left.
    pub async fn sample<S: VideoSource>(
        &self,
        source: &mut S,
        count: usize,
    ) -> Result<Vec<FrameSample>, DetectError> {
        if count == 0 {
            return Err(DetectError::InvalidSampleCount);
        }
        if !source.is_ready() {
            return Err(DetectError::SourceNotReady);
        }

        let positions = self
            .config
            .positions(source.duration(), source.frame_rate(), count);

        let mut samples = Vec::with_capacity(positions.len());
        for position in positions {
            match self.sample_at(source, position).await {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    tracing::warn!(position_ms = position.as_millis() as u64, error = %e, "Skipping unusable sample");
                }
            }
        }

        if samples.is_empty() {
            return Err(DetectError::NoUsableFrames { requested: count });
        }

        tracing::debug!(requested = count, usable = samples.len(), "Sampled frames");
        Ok(samples)
    }

    async fn sample_at<S: VideoSource>(
        &self,
        source: &mut S,
        position: Duration,
    ) -> Result<FrameSample, MediaError> {
        source.seek(position).await?;
        let frame = source.capture().await?;
        let (width, height) = frame.dimensions();
        let pixels = imageops::resize(
            &frame,
            self.config.sample_width,
            self.config.sample_height,
            FilterType::Triangle,
        );
        Ok(FrameSample::new(position, pixels, width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeVideo, FramePattern};

    fn assert_secs(actual: &[Duration], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a.as_secs_f64() - e).abs() < 1e-6, "{a:?} != {e}s");
        }
    }

    #[test]
    fn positions_avoid_the_edges() {
        let config = SamplerConfig::default();
        let positions = config.positions(Duration::from_secs(100), 25.0, 5);
        assert_secs(&positions, &[0.2, 25.1, 50.0, 74.9, 99.8]);
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn short_clips_cap_the_margin() {
        let config = SamplerConfig::default();
        // 10 frames at 10 fps: 5 frames would be half the clip.
        let positions = config.positions(Duration::from_secs(1), 10.0, 3);
        assert_secs(&positions, &[0.1, 0.5, 0.9]);
    }

    #[test]
    fn single_sample_is_taken_mid_clip() {
        let positions = SamplerConfig::default().positions(Duration::from_secs(10), 30.0, 1);
        assert_secs(&positions, &[5.0]);
    }

    #[tokio::test]
    async fn samples_are_downscaled_in_playback_order() {
        let mut video = FakeVideo::new(400, 200, Duration::from_secs(10), FramePattern::Noise);
        let samples = FrameSampler::default().sample(&mut video, 4).await.unwrap();

        assert_eq!(samples.len(), 4);
        assert!(samples.windows(2).all(|w| w[0].position < w[1].position));
        for s in &samples {
            assert_eq!(s.pixels.dimensions(), (SAMPLE_SIZE, SAMPLE_SIZE));
            assert_eq!((s.source_width, s.source_height), (400, 200));
        }
        assert_eq!(video.seeks(), samples.iter().map(|s| s.position).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn truncated_stream_keeps_earlier_samples() {
        let cutoff = Duration::from_secs(6);
        let mut video = FakeVideo::new(200, 100, Duration::from_secs(10), FramePattern::Noise)
            .failing_from(cutoff);

        let samples = FrameSampler::default().sample(&mut video, 5).await.unwrap();
        let expected: Vec<_> = SamplerConfig::default()
            .positions(Duration::from_secs(10), FakeVideo::FPS, 5)
            .into_iter()
            .filter(|p| *p < cutoff)
            .collect();

        assert_eq!(samples.iter().map(|s| s.position).collect::<Vec<_>>(), expected);
        assert!(!samples.is_empty());
    }

    #[tokio::test]
    async fn no_reachable_position_is_an_error() {
        let mut video = FakeVideo::new(200, 100, Duration::from_secs(10), FramePattern::Noise)
            .failing_from(Duration::ZERO);

        let err = FrameSampler::default().sample(&mut video, 3).await.unwrap_err();
        assert!(matches!(err, DetectError::NoUsableFrames { requested: 3 }));
    }

    #[tokio::test]
    async fn zero_samples_is_rejected() {
        let mut video = FakeVideo::new(200, 100, Duration::from_secs(10), FramePattern::Noise);
        let err = FrameSampler::default().sample(&mut video, 0).await.unwrap_err();
        assert!(matches!(err, DetectError::InvalidSampleCount));
    }
}
