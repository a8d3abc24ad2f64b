//! Stereo video player core.
//!
//! A `SessionDriver` answers the frame callbacks of an `ImmersiveSession` by
//! pulling the current video frame and drawing it once per eye through an
//! `EyeRenderer`. `StereoRenderer` is the wgpu implementation; the desktop
//! preview drives it from a window through `DesktopSession`.

pub mod app;
pub mod camera;
pub mod desktop;
pub mod detect;
pub mod error;
pub mod geometry_cache;
pub mod player;
pub mod renderer;
pub mod session;
pub mod settings;
pub mod ui;

pub use error::RenderError;
pub use session::{
    EyeRenderer, FrameCallback, FrameHandle, FrameProvider, ImmersiveSession, RenderFrameState,
    SessionDriver, XrFrame, XrView,
};
pub use settings::SettingsStore;
