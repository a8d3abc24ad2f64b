use clap::Parser;
use std::path::PathBuf;
use video_recognition::{DEFAULT_ACCEPTANCE_THRESHOLD, DEFAULT_SAMPLE_COUNT};

/// `detect-layout` - infers the stereo layout and projection of a video.
///
/// Reads a directory of still frames as a video, samples it and prints the
/// detection result as JSON on stdout. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Directory of PNG/JPEG/BMP frames, played in file name order.
    #[arg(long, env = "VR_FRAMES_DIR")]
    pub frames: PathBuf,

    /// Frame rate the sequence is played back at.
    #[arg(long, env = "VR_FPS", default_value_t = 30.0)]
    pub fps: f64,

    /// Number of frames sampled for detection.
    #[arg(long, env = "VR_DETECT_SAMPLES", default_value_t = DEFAULT_SAMPLE_COUNT)]
    pub samples: usize,

    /// Minimum confidence for a detected value to be reported.
    #[arg(long, env = "VR_DETECT_THRESHOLD", default_value_t = DEFAULT_ACCEPTANCE_THRESHOLD)]
    pub threshold: f32,
}
