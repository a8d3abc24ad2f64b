//! Synthetic frames and a scripted video source for tests.

use crate::error::MediaError;
use crate::sampler::FrameSample;
use crate::source::VideoSource;
use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::time::Duration;

/// Uniform grey-level noise.
pub fn noise(width: u32, height: u32, seed: u64) -> RgbaImage {
    let mut rng = StdRng::seed_from_u64(seed);
    RgbaImage::from_fn(width, height, |_, _| {
        let v: u8 = rng.gen();
        Rgba([v, v, v, 255])
    })
}

/// The same noise image in the left and right halves, offset horizontally by
/// `disparity` pixels so that `left(x) == right(x - disparity)`.
pub fn side_by_side(width: u32, height: u32, disparity: i32, seed: u64) -> RgbaImage {
    let half = width / 2;
    let pad = disparity.unsigned_abs();
    let base = noise(half + pad, height, seed);
    let (left_ofs, right_ofs) = if disparity >= 0 { (0, pad) } else { (pad, 0) };

    RgbaImage::from_fn(width, height, |x, y| {
        if x < half {
            *base.get_pixel(x + left_ofs, y)
        } else {
            *base.get_pixel(x - half + right_ofs, y)
        }
    })
}

/// The same noise image in the top and bottom halves.
pub fn stacked(width: u32, height: u32, seed: u64) -> RgbaImage {
    let half = height / 2;
    let base = noise(width, half, seed);
    RgbaImage::from_fn(width, height, |x, y| *base.get_pixel(x, y % half))
}

/// Noise with black bars of `bar` rows at the top and bottom.
pub fn letterboxed(width: u32, height: u32, bar: u32, seed: u64) -> RgbaImage {
    let mut img = noise(width, height, seed);
    for y in (0..bar).chain(height - bar..height) {
        for x in 0..width {
            img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
        }
    }
    img
}

/// Wraps analysis-resolution pixels as if sampled from a `source_w`×`source_h` video.
pub fn sample(index: u64, pixels: RgbaImage, source_w: u32, source_h: u32) -> FrameSample {
    FrameSample::new(Duration::from_secs(index), pixels, source_w, source_h)
}

#[derive(Debug, Clone, Copy)]
pub enum FramePattern {
    Noise,
    SideBySide,
}

/// Deterministic in-memory video that can refuse seeks past a cutoff.
#[derive(Debug)]
pub struct FakeVideo {
    width: u32,
    height: u32,
    duration: Duration,
    pattern: FramePattern,
    fail_from: Option<Duration>,
    position: Duration,
    seeks: Vec<Duration>,
}

impl FakeVideo {
    pub const FPS: f64 = 30.0;

    pub fn new(width: u32, height: u32, duration: Duration, pattern: FramePattern) -> Self {
        Self {
            width,
            height,
            duration,
            pattern,
            fail_from: None,
            position: Duration::ZERO,
            seeks: Vec::new(),
        }
    }

    /// Seeks at or after `cutoff` fail as if the stream were truncated there.
    pub fn failing_from(mut self, cutoff: Duration) -> Self {
        self.fail_from = Some(cutoff);
        self
    }

    /// Successful seeks, in the order they were issued.
    pub fn seeks(&self) -> Vec<Duration> {
        self.seeks.clone()
    }
}

impl VideoSource for FakeVideo {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn frame_rate(&self) -> f64 {
        Self::FPS
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn seek(&mut self, position: Duration) -> impl Future<Output = Result<(), MediaError>> + Send {
        async move {
            tokio::task::yield_now().await;
            let limit = self.fail_from.unwrap_or(self.duration);
            if position >= limit {
                return Err(MediaError::SeekOutOfRange {
                    position,
                    duration: limit,
                });
            }
            self.position = position;
            self.seeks.push(position);
            Ok(())
        }
    }

    fn capture(&mut self) -> impl Future<Output = Result<RgbaImage, MediaError>> + Send {
        let seed = (self.position.as_secs_f64() * Self::FPS) as u64;
        let (w, h, pattern) = (self.width, self.height, self.pattern);
        async move {
            Ok(match pattern {
                FramePattern::Noise => noise(w, h, seed),
                FramePattern::SideBySide => side_by_side(w, h, 0, seed),
            })
        }
    }
}
