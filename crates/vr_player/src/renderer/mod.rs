//! The wgpu eye renderer. Owns the pipelines, the video texture, the per-eye
//! uniforms and the cached per-eye meshes.

pub mod context;
pub mod pipelines;
pub mod targets;
pub mod video_texture;

use self::{
    pipelines::stereo_video::{EyeBinding, EyeUniform, StereoVideoPipeline},
    targets::DepthTarget,
    video_texture::VideoTexture,
};
use crate::error::RenderError;
use crate::geometry_cache::{GeometryCache, Lifecycle};
use crate::session::{EyeRenderer, RenderFrameState};
use glam::{Mat3, Mat4, Vec3};
use image::RgbaImage;
use std::sync::Arc;
use stereo_projection::{
    Eye, Format, Geometry, GeometryBuilder, GeometryKey, Layout, MeshResolution, PlaybackSettings,
};
use wgpu::util::DeviceExt;

/// Radius the unit sphere/dome meshes are scaled to.
pub const IMMERSIVE_RADIUS: f32 = 10.0;
/// Distance of the flat screen in front of the viewer.
pub const SCREEN_DISTANCE: f32 = 3.0;
/// Height of the flat screen; its width follows the eye frame's aspect ratio.
pub const SCREEN_HEIGHT: f32 = 2.0;

/// A colour attachment for one eye.
pub struct EyeTarget {
    pub view: wgpu::TextureView,
    pub size: (u32, u32),
}

/// Uploaded mesh for one `GeometryKey`.
pub struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

/// Resources that only exist between setup and teardown.
struct GpuState {
    pipeline: StereoVideoPipeline,
    video: VideoTexture,
    eyes: [EyeBinding; 2],
    depth: Option<DepthTarget>,
}

pub struct StereoRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    color_format: wgpu::TextureFormat,
    builder: GeometryBuilder,
    meshes: GeometryCache<GpuMesh>,
    gpu: Option<GpuState>,
    encoder: Option<wgpu::CommandEncoder>,
    projection: Option<(Format, Layout, bool)>,
    lifecycle: Lifecycle,
}

impl StereoRenderer {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        color_format: wgpu::TextureFormat,
        resolution: MeshResolution,
    ) -> Result<Self, RenderError> {
        Ok(Self {
            device,
            queue,
            color_format,
            builder: GeometryBuilder::new(resolution)?,
            meshes: GeometryCache::new(),
            gpu: None,
            encoder: None,
            projection: None,
            lifecycle: Lifecycle::Uninitialized,
        })
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn ensure_gpu(&mut self) -> Result<(), RenderError> {
        if self.gpu.is_some() {
            return Ok(());
        }

        let (device, queue) = (&*self.device, &*self.queue);
        let color_format = self.color_format;
        let (pipeline, eyes) = scoped(device, "render pipelines", || {
            let pipeline = StereoVideoPipeline::new(device, color_format);
            let eyes = [
                pipeline.eye_binding(device, "Left Eye UBO"),
                pipeline.eye_binding(device, "Right Eye UBO"),
            ];
            (pipeline, eyes)
        })?;
        let video = VideoTexture::placeholder(device, queue, &pipeline)?;
        let state = GpuState {
            pipeline,
            video,
            eyes,
            depth: None,
        };

        log::info!("Stereo renderer initialised ({:?})", color_format);
        self.gpu = Some(state);
        self.lifecycle = self.lifecycle.geometry_ready();
        Ok(())
    }

    fn mesh(&mut self, key: GeometryKey) -> Result<Arc<GpuMesh>, RenderError> {
        let (device, builder) = (&*self.device, &self.builder);
        self.meshes.get_or_build(key, |key| {
            let geometry = builder.build(*key);
            log::debug!(
                "Built {:?} mesh for {:?}: {} triangles",
                key.format,
                key.eye,
                geometry.triangle_count()
            );
            upload_mesh(device, &geometry)
        })
    }
}

fn upload_mesh(device: &wgpu::Device, geometry: &Geometry) -> Result<GpuMesh, RenderError> {
    scoped(device, "mesh buffers", || GpuMesh {
        vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Eye Mesh VB"),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        }),
        indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Eye Mesh IB"),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        }),
        index_count: geometry.indices.len() as u32,
    })
}

/// Fails for textures larger than the device allows. wgpu would otherwise
/// report them as an uncaptured error, which panics.
fn check_texture_size(
    what: &'static str,
    (width, height): (u32, u32),
    max_dimension: u32,
) -> Result<(), RenderError> {
    if width > max_dimension || height > max_dimension {
        return Err(RenderError::Resource {
            what,
            message: format!("{width}x{height} exceeds the device limit of {max_dimension} px"),
        });
    }
    Ok(())
}

/// Runs `create` inside validation and out-of-memory error scopes.
fn scoped<T>(
    device: &wgpu::Device,
    what: &'static str,
    create: impl FnOnce() -> T,
) -> Result<T, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let value = create();
    let oom = pollster::block_on(device.pop_error_scope());
    let validation = pollster::block_on(device.pop_error_scope());

    match oom.or(validation) {
        Some(e) => Err(RenderError::Resource {
            what,
            message: e.to_string(),
        }),
        None => Ok(value),
    }
}

/// Uniform values for one eye.
///
/// Immersive formats drop the translation of `view` so the projection surface
/// stays centred on the head. The screen quad sits `SCREEN_DISTANCE` in front
/// of the origin, as wide as the eye frame's aspect ratio asks for.
pub fn eye_uniform(
    settings: &PlaybackSettings,
    view: Mat4,
    projection: Mat4,
    frame_aspect: f32,
) -> EyeUniform {
    let (view, model) = if settings.format.is_immersive() {
        let rotation = Mat4::from_mat3(Mat3::from_mat4(view));
        (rotation, Mat4::from_scale(Vec3::splat(IMMERSIVE_RADIUS)))
    } else {
        let aspect = settings.layout.eye_aspect(frame_aspect);
        let half_h = SCREEN_HEIGHT * 0.5;
        let model = Mat4::from_translation(Vec3::new(0.0, 0.0, -SCREEN_DISTANCE))
            * Mat4::from_scale(Vec3::new(half_h * aspect, half_h, 1.0));
        (view, model)
    };

    EyeUniform {
        view_proj: (projection * view).to_cols_array_2d(),
        model: model.to_cols_array_2d(),
    }
}

fn eye_index(eye: Eye) -> usize {
    match eye {
        Eye::Left => 0,
        Eye::Right => 1,
    }
}

impl EyeRenderer for StereoRenderer {
    type Target = EyeTarget;

    fn begin_frame(
        &mut self,
        settings: &PlaybackSettings,
        frame: Option<&RgbaImage>,
    ) -> Result<(), RenderError> {
        self.ensure_gpu()?;

        let projection = (settings.format, settings.layout, settings.effective_flip());
        if self.projection != Some(projection) {
            if self.projection.is_some() {
                log::info!(
                    "Projection changed: {} / {} / flip={}",
                    settings.format,
                    settings.layout,
                    projection.2
                );
                self.lifecycle = self.lifecycle.settings_changed();
            }
            self.meshes.retain_projection(projection);
            self.projection = Some(projection);
        }

        if let (Some(gpu), Some(frame)) = (self.gpu.as_mut(), frame) {
            gpu.video
                .upload(&self.device, &self.queue, &gpu.pipeline, frame)?;
        }

        self.encoder = Some(
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Eye Frame Encoder"),
                }),
        );
        Ok(())
    }

    fn render_eye(&mut self, state: &RenderFrameState<'_, EyeTarget>) -> Result<(), RenderError> {
        if self.encoder.is_none() || self.gpu.is_none() {
            return Err(RenderError::NoFrame);
        }

        let key = GeometryKey::new(&state.settings, state.eye);
        let mesh = self.mesh(key)?;

        let (Some(gpu), Some(encoder)) = (self.gpu.as_mut(), self.encoder.as_mut()) else {
            return Err(RenderError::NoFrame);
        };

        let uniform = eye_uniform(
            &state.settings,
            state.view,
            state.projection,
            gpu.video.aspect(),
        );
        let eye = &gpu.eyes[eye_index(state.eye)];
        self.queue
            .write_buffer(&eye.buffer, 0, bytemuck::bytes_of(&uniform));

        let immersive = state.settings.format.is_immersive();
        if !immersive {
            match gpu.depth.as_mut() {
                Some(depth) => depth.ensure_size(&self.device, state.target.size)?,
                None => gpu.depth = Some(DepthTarget::new(&self.device, state.target.size)?),
            }
        }

        {
            let depth_stencil_attachment = if immersive {
                None
            } else {
                gpu.depth
                    .as_ref()
                    .map(|depth| wgpu::RenderPassDepthStencilAttachment {
                        view: &depth.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Discard,
                        }),
                        stencil_ops: None,
                    })
            };

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Eye Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &state.target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(if immersive {
                &gpu.pipeline.immersive
            } else {
                &gpu.pipeline.screen
            });
            pass.set_bind_group(0, &eye.bind_group, &[]);
            pass.set_bind_group(1, &gpu.video.bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertices.slice(..));
            pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }

        self.lifecycle = self.lifecycle.rendered();
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
        Ok(())
    }

    fn teardown(&mut self) {
        if !self.lifecycle.is_initialized() && self.gpu.is_none() {
            return;
        }
        self.encoder = None;
        self.meshes.clear();
        self.gpu = None;
        self.projection = None;
        self.lifecycle = self.lifecycle.torn_down();
        log::info!("Stereo renderer torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn apply(u: &EyeUniform, p: Vec3) -> Vec4 {
        let view_proj = Mat4::from_cols_array_2d(&u.view_proj);
        let model = Mat4::from_cols_array_2d(&u.model);
        view_proj * model * p.extend(1.0)
    }

    #[test]
    fn oversized_textures_are_rejected_before_allocation() {
        let limit = wgpu::Limits::default().max_texture_dimension_2d;
        assert!(check_texture_size("video texture", (limit, limit), limit).is_ok());
        assert!(check_texture_size("video texture", (1, 1), limit).is_ok());

        // An 11520x5760 equirectangular frame is wider than the default limit.
        let err = check_texture_size("video texture", (11_520, 5_760), limit).unwrap_err();
        match err {
            RenderError::Resource { what, message } => {
                assert_eq!(what, "video texture");
                assert!(message.contains("11520x5760"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(check_texture_size("depth target", (100, limit + 1), limit).is_err());
    }

    #[test]
    fn immersive_formats_ignore_head_translation() {
        let settings = PlaybackSettings::default().with_format(Format::Sphere360);
        let moved = Mat4::from_translation(Vec3::new(0.3, -1.2, 4.0));

        let still = eye_uniform(&settings, Mat4::IDENTITY, Mat4::IDENTITY, 2.0);
        let shifted = eye_uniform(&settings, moved, Mat4::IDENTITY, 2.0);

        let p = Vec3::new(0.0, 0.0, -1.0);
        assert!(apply(&still, p).abs_diff_eq(apply(&shifted, p), 1e-6));
        assert!(apply(&still, p).abs_diff_eq(Vec4::new(0.0, 0.0, -IMMERSIVE_RADIUS, 1.0), 1e-6));
    }

    #[test]
    fn screen_quad_sits_in_front_at_frame_aspect() {
        let settings = PlaybackSettings::default().with_layout(Layout::StereoLeftRight);
        // 32:9 side by side is 16:9 per eye.
        let u = eye_uniform(&settings, Mat4::IDENTITY, Mat4::IDENTITY, 32.0 / 9.0);

        let corner = apply(&u, Vec3::new(1.0, 1.0, 0.0));
        assert!((corner.z + SCREEN_DISTANCE).abs() < 1e-6);
        assert!((corner.y - SCREEN_HEIGHT * 0.5).abs() < 1e-6);
        assert!((corner.x / corner.y - 16.0 / 9.0).abs() < 1e-5);
    }

    #[test]
    fn screen_keeps_head_translation() {
        let settings = PlaybackSettings::default();
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -1.0));
        let u = eye_uniform(&settings, view, Mat4::IDENTITY, 16.0 / 9.0);
        let centre = apply(&u, Vec3::ZERO);
        assert!((centre.z + SCREEN_DISTANCE + 1.0).abs() < 1e-6);
    }
}
