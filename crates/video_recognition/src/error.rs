use std::path::PathBuf;
use std::time::Duration;

/// Failure to reach or decode one frame of a video source.
///
/// The sampler treats these as local: the affected sample is skipped.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("cannot seek to {position:?}: stream ends at {duration:?}")]
    SeekOutOfRange { position: Duration, duration: Duration },

    #[error("failed to decode frame {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("video source is not ready")]
    NotReady,

    #[error("frame rate must be a positive number, got {0}")]
    InvalidFrameRate(f64),

        #[error("no image frames found in {0}")]
    Empty(PathBuf),

    #[error("decoder task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure of a whole detection run. Settings stay untouched when this happens.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("sample count must be at least 1")]
    InvalidSampleCount,

    #[error("video source is not ready")]
    SourceNotReady,

    #[error("no usable frames among {requested} requested samples")]
    NoUsableFrames { requested: usize },

    #[error("a detection is already queued")]
    WorkerBusy,

    #[error("detection worker has shut down")]
    WorkerClosed,

    #[error("classifier task failed: {0}")]
    Task(String),
}
