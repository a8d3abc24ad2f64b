//! Frame sampling and stereo layout / projection detection for immersive video.
//!
//! The pipeline is `VideoSource` → `FrameSampler` → `Classifier` →
//! `DetectionResult`, either driven directly with [`detect`] or from a
//! background [`DetectionWorker`].

pub mod classifier;
pub mod detection;
pub mod error;
pub mod luma;
pub mod sampler;
pub mod source;
pub mod worker;

#[cfg(test)]
mod testing;

pub use classifier::{Classifier, ClassifierConfig, DEFAULT_ACCEPTANCE_THRESHOLD};
pub use detection::{Detection, DetectionResult};
pub use error::{DetectError, MediaError};
pub use sampler::{FrameSample, FrameSampler, SamplerConfig, DEFAULT_SAMPLE_COUNT, SAMPLE_SIZE};
pub use source::{ImageSequence, VideoSource};
pub use worker::{detect, DetectionHandle, DetectionOutcome, DetectionRequest, DetectionWorker};
