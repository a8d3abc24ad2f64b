use clap::Parser;
use std::path::PathBuf;
use stereo_projection::{Format, Layout, MeshResolution, PlaybackSettings};
use video_recognition::{DEFAULT_ACCEPTANCE_THRESHOLD, DEFAULT_SAMPLE_COUNT};
use vr_player::app::AppConfig;

/// `vr-player` - desktop preview of the stereo video renderer.
///
/// Plays a directory of still frames as a video, projected the way the
/// layout and format settings say. Drag to look around, scroll to zoom,
/// Space pauses, D re-runs layout detection, F1 toggles the HUD.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Directory of PNG/JPEG/BMP frames, played in file name order.
    #[arg(long, env = "VR_FRAMES_DIR")]
    pub frames: PathBuf,

    #[arg(long, env = "VR_FPS", default_value_t = 30.0)]
    pub fps: f64,

    /// mono, sbs (left-right) or tb (top-bottom).
    #[arg(long, env = "VR_LAYOUT", default_value_t = Layout::Mono)]
    pub layout: Layout,

    /// screen, 180 or 360.
    #[arg(long, env = "VR_FORMAT", default_value_t = Format::Screen)]
    pub format: Format,

    /// Swap which half of a stereo frame goes to which eye.
    #[arg(long)]
    pub flip: bool,

    /// Skip layout detection when the frames are loaded.
    #[arg(long)]
    pub no_auto_detect: bool,

    /// Start paused.
    #[arg(long)]
    pub no_autoplay: bool,

    /// Start with the HUD hidden.
    #[arg(long)]
    pub no_hud: bool,

    /// Number of frames sampled for detection.
    #[arg(long, env = "VR_DETECT_SAMPLES", default_value_t = DEFAULT_SAMPLE_COUNT)]
    pub samples: usize,

    /// Minimum confidence for a detected value to be applied.
    #[arg(long, env = "VR_DETECT_THRESHOLD", default_value_t = DEFAULT_ACCEPTANCE_THRESHOLD)]
    pub threshold: f32,

    /// Latitude segments of the sphere and dome meshes.
    #[arg(long, default_value_t = 64)]
    pub mesh_rows: u32,

    /// Longitude segments of the sphere and dome meshes.
    #[arg(long, default_value_t = 128)]
    pub mesh_columns: u32,
}

impl Config {
    pub fn into_app_config(self) -> AppConfig {
        AppConfig {
            settings: PlaybackSettings {
                layout: self.layout,
                flip: self.flip,
                format: self.format,
                debug: !self.no_hud,
                autoplay: !self.no_autoplay,
                auto_detect: !self.no_auto_detect,
            },
            frames: self.frames,
            fps: self.fps,
            samples: self.samples,
            threshold: self.threshold,
            resolution: MeshResolution {
                latitude_segments: self.mesh_rows,
                longitude_segments: self.mesh_columns,
            },
        }
    }
}
