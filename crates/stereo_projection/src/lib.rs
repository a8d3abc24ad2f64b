//! Stereo projection model for immersive video.
//!
//! - `Layout`: how the two eye images share one video frame (mono, side by side,
//!   stacked), plus a `flip` bit that swaps the halves.
//! - `Format`: the projection the frame represents (flat screen, 180° dome,
//!   360° sphere).
//! - `GeometryBuilder`: per-eye meshes with equirectangular UVs restricted to the
//!   half of the frame that belongs to the eye.
//!
//! Texture space (little surprises live here):
//!   u = 0 is the left edge of the frame, u = 1 the right edge.
//!   v = 0 is the top row, v = 1 the bottom row.
//!
//! Mesh space: right-handed, +Y up, the viewer looks down -Z. Sphere and dome
//! meshes have unit radius and are wound counter-clockwise as seen from the
//! centre; the screen quad spans [-1, 1]² in the z = 0 plane, counter-clockwise
//! as seen from +Z.

pub mod geometry;
pub mod settings;
pub mod uv;

pub use geometry::{
    ConfigError, Geometry, GeometryBuilder, GeometryKey, MeshResolution, Vertex, Winding,
    MAX_SEGMENTS,
};
pub use settings::{Eye, Format, Layout, ParseSettingError, PlaybackSettings};
pub use uv::{eye_uv_rect, UvRect};
