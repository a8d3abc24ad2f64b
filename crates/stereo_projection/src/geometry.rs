//! Per-eye mesh construction for screen, dome and sphere projections.

use crate::settings::{Eye, Format, Layout, PlaybackSettings};
use crate::uv::{eye_uv_rect, UvRect};
use std::f32::consts::{FRAC_PI_2, PI};

/// Upper bound on segments per axis; keeps vertex indices well inside `u32`.
pub const MAX_SEGMENTS: u32 = 4096;

/// Vertex as uploaded to the GPU. Must match `VSIn` in `stereo_video.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position on the unit sphere / unit quad.
    pub position: [f32; 3],
    /// Texture coordinate inside the eye's half of the frame.
    pub uv: [f32; 2],
}

/// Latitude/longitude subdivision used for sphere and dome meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshResolution {
    pub latitude_segments: u32,
    pub longitude_segments: u32,
}

impl Default for MeshResolution {
    fn default() -> Self {
        Self {
            latitude_segments: 64,
            longitude_segments: 128,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "invalid mesh resolution {latitude}x{longitude}: segment counts must be in 1..={max}",
        max = MAX_SEGMENTS
    )]
    InvalidResolution { latitude: u32, longitude: u32 },
}

/// Everything a mesh depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryKey {
    pub format: Format,
    pub layout: Layout,
    pub flip: bool,
    pub eye: Eye,
}

impl GeometryKey {
    pub fn new(settings: &PlaybackSettings, eye: Eye) -> Self {
        Self {
            format: settings.format,
            layout: settings.layout,
            flip: settings.effective_flip(),
            eye,
        }
    }

    /// The eye-independent part of the key.
    #[inline]
    pub fn projection(&self) -> (Format, Layout, bool) {
        (self.format, self.layout, self.flip)
    }
}

/// Which side of the surface is front-facing (counter-clockwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winding {
    /// Faces a viewer standing on +Z (the screen quad).
    Front,
    /// Faces the centre of the sphere; the inverse of the usual outward winding.
    Inward,
}

/// Immutable triangle mesh for one eye.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub key: GeometryKey,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Region of the video frame sampled by this mesh.
    pub uv_rect: UvRect,
    pub winding: Winding,
}

impl Geometry {
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Bounding rectangle of the vertex UVs.
    pub fn uv_bounds(&self) -> UvRect {
        self.vertices.iter().fold(
            UvRect {
                u0: f32::INFINITY,
                v0: f32::INFINITY,
                u1: f32::NEG_INFINITY,
                v1: f32::NEG_INFINITY,
            },
            |r, v| UvRect {
                u0: r.u0.min(v.uv[0]),
                v0: r.v0.min(v.uv[1]),
                u1: r.u1.max(v.uv[0]),
                v1: r.v1.max(v.uv[1]),
            },
        )
    }
}

/// Builds meshes for a fixed resolution. Cheap to copy; `build` is pure.
#[derive(Debug, Clone, Copy)]
pub struct GeometryBuilder {
    resolution: MeshResolution,
}

impl GeometryBuilder {
    pub fn new(resolution: MeshResolution) -> Result<Self, ConfigError> {
        let valid = |n: u32| (1..=MAX_SEGMENTS).contains(&n);
        if !valid(resolution.latitude_segments) || !valid(resolution.longitude_segments) {
            return Err(ConfigError::InvalidResolution {
                latitude: resolution.latitude_segments,
                longitude: resolution.longitude_segments,
            });
        }
        Ok(Self { resolution })
    }

    pub fn resolution(&self) -> MeshResolution {
        self.resolution
    }

    pub fn build(&self, key: GeometryKey) -> Geometry {
        let uv_rect = eye_uv_rect(key.layout, key.flip, key.eye);

        let (vertices, indices, winding) = match key.format {
            Format::Screen => {
                let (v, i) = screen_quad(uv_rect);
                (v, i, Winding::Front)
            }
            Format::Dome180 => {
                // Half the circumference, so half the longitude segments.
                let lon_segments = (self.resolution.longitude_segments / 2).max(1);
                let (v, i) = lat_long_grid(
                    (-FRAC_PI_2, FRAC_PI_2),
                    self.resolution.latitude_segments,
                    lon_segments,
                    uv_rect,
                );
                (v, i, Winding::Inward)
            }
            Format::Sphere360 => {
                let (v, i) = lat_long_grid(
                    (-PI, PI),
                    self.resolution.latitude_segments,
                    self.resolution.longitude_segments,
                    uv_rect,
                );
                (v, i, Winding::Inward)
            }
        };

        Geometry {
            key,
            vertices,
            indices,
            uv_rect,
            winding,
        }
    }
}

/// Unit quad in the z = 0 plane, counter-clockwise from +Z.
fn screen_quad(rect: UvRect) -> (Vec<Vertex>, Vec<u32>) {
    let vertices = vec![
        Vertex { position: [-1.0, 1.0, 0.0], uv: rect.lerp(0.0, 0.0) },
        Vertex { position: [1.0, 1.0, 0.0], uv: rect.lerp(1.0, 0.0) },
        Vertex { position: [-1.0, -1.0, 0.0], uv: rect.lerp(0.0, 1.0) },
        Vertex { position: [1.0, -1.0, 0.0], uv: rect.lerp(1.0, 1.0) },
    ];
    // BL, BR, TR / BL, TR, TL
    let indices = vec![2, 3, 1, 2, 1, 0];
    (vertices, indices)
}

/// Equirectangular latitude/longitude grid on the unit sphere.
///
/// Rows run from the north pole (v = 0) to the south pole; columns from
/// `lon_range.0` to `lon_range.1`, where longitude 0 looks down -Z and positive
/// longitude turns towards +X.
fn lat_long_grid(
    lon_range: (f32, f32),
    lat_segments: u32,
    lon_segments: u32,
    rect: UvRect,
) -> (Vec<Vertex>, Vec<u32>) {
    let cols = lon_segments + 1;
    let rows = lat_segments + 1;

    let mut vertices = Vec::with_capacity((cols * rows) as usize);
    for i in 0..rows {
        let t = i as f32 / lat_segments as f32;
        let lat = FRAC_PI_2 - t * PI;
        let (sin_lat, cos_lat) = lat.sin_cos();

        for j in 0..cols {
            let s = j as f32 / lon_segments as f32;
            let lon = lon_range.0 + s * (lon_range.1 - lon_range.0);
            let (sin_lon, cos_lon) = lon.sin_cos();

            vertices.push(Vertex {
                position: [sin_lon * cos_lat, sin_lat, -cos_lon * cos_lat],
                uv: rect.lerp(s, t),
            });
        }
    }

    let mut indices = Vec::with_capacity((lat_segments * lon_segments * 6) as usize);
    for i in 0..lat_segments {
        for j in 0..lon_segments {
            let a = i * cols + j; // this row
            let b = a + 1; // to the right
            let c = a + cols; // below
            let d = c + 1;
            // Counter-clockwise as seen from the centre.
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }

    (vertices, indices)
}
