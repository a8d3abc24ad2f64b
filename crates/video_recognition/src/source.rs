//! Video sources the sampler can seek and capture from.

use crate::error::MediaError;
use image::RgbaImage;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// A seekable video with access to the pixels of the current frame.
///
/// Seeking takes `&mut self`, so a source can only ever have one seek or capture
/// in flight.
pub trait VideoSource: Send {
    /// Natural frame size in pixels.
    fn dimensions(&self) -> (u32, u32);

    fn duration(&self) -> Duration;

    /// Frames per second; `0.0` when unknown.
    fn frame_rate(&self) -> f64;

    /// Whether the first frame has been decoded and metadata is available.
    fn is_ready(&self) -> bool;

    /// Moves the playback position; resolves once the frame at `position` is
    /// available to `capture`.
    fn seek(&mut self, position: Duration) -> impl Future<Output = Result<(), MediaError>> + Send;

    /// Decodes the frame at the current position.
    fn capture(&mut self) -> impl Future<Output = Result<RgbaImage, MediaError>> + Send;
}

/// A directory of still frames played back at a fixed rate.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    frames: Vec<PathBuf>,
    fps: f64,
    dimensions: (u32, u32),
    cursor: usize,
}

impl ImageSequence {
    /// Lists `dir` (recursively, sorted by path) for PNG/JPEG/BMP frames.
    pub fn open(dir: impl AsRef<Path>, fps: f64) -> Result<Self, MediaError> {
        let dir = dir.as_ref();
        if !(fps.is_finite() && fps > 0.0) {
            return Err(MediaError::InvalidFrameRate(fps));
        }

        let mut frames = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let is_frame = entry
                .path()
                .extension()
                .and_then(|s| s.to_str())
                .map_or(false, |ext| {
                    FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
                });
            if entry.file_type().is_file() && is_frame {
                frames.push(entry.into_path());
            }
        }

        let first = frames.first().ok_or_else(|| MediaError::Empty(dir.to_path_buf()))?;
        let dimensions = image::image_dimensions(first).map_err(|source| MediaError::Decode {
            path: first.clone(),
            source,
        })?;

        tracing::info!(
            dir = %dir.display(),
            frames = frames.len(),
            width = dimensions.0,
            height = dimensions.1,
            fps,
            "Opened image sequence"
        );

        Ok(Self {
            frames,
            fps,
            dimensions,
            cursor: 0,
        })
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Index of the frame shown at `position`, if the stream reaches that far.
    pub fn index_at(&self, position: Duration) -> Option<usize> {
        let index = (position.as_secs_f64() * self.fps).floor() as usize;
        (index < self.frames.len()).then_some(index)
    }

    /// Decodes frame `index` on the calling thread.
    pub fn load_frame(&self, index: usize) -> Result<RgbaImage, MediaError> {
        let path = self
            .frames
            .get(index)
            .ok_or(MediaError::SeekOutOfRange {
                position: Duration::from_secs_f64(index as f64 / self.fps),
                duration: self.duration(),
            })?;
        decode(path)
    }
}

fn decode(path: &Path) -> Result<RgbaImage, MediaError> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| MediaError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

impl VideoSource for ImageSequence {
    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames.len() as f64 / self.fps)
    }

    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn is_ready(&self) -> bool {
        !self.frames.is_empty()
    }

    fn seek(&mut self, position: Duration) -> impl Future<Output = Result<(), MediaError>> + Send {
        let target = self.index_at(position);
        let duration = self.duration();
        async move {
            self.cursor = target.ok_or(MediaError::SeekOutOfRange { position, duration })?;
            Ok(())
        }
    }

    fn capture(&mut self) -> impl Future<Output = Result<RgbaImage, MediaError>> + Send {
        let path = self.frames[self.cursor].clone();
        async move {
            tokio::task::spawn_blocking(move || decode(&path))
                .await
                .map_err(|e| MediaError::Task(e.to_string()))?
        }
    }
}
