//! Depth attachment for the flat-screen pipeline.

use super::{check_texture_size, scoped};
use crate::error::RenderError;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub struct DepthTarget {
    // Keep the texture alive for the lifetime of the view.
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    size: (u32, u32),
}

impl DepthTarget {
    pub fn new(device: &wgpu::Device, size: (u32, u32)) -> Result<Self, RenderError> {
        let (width, height) = (size.0.max(1), size.1.max(1));
        check_texture_size(
            "depth target",
            (width, height),
            device.limits().max_texture_dimension_2d,
        )?;
        scoped(device, "depth target", || Self::create(device, (width, height)))
    }

    fn create(device: &wgpu::Device, (width, height): (u32, u32)) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Eye Depth Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            _texture: texture,
            size: (width, height),
        }
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Recreates the target if the eye target changed size.
    pub fn ensure_size(&mut self, device: &wgpu::Device, size: (u32, u32)) -> Result<(), RenderError> {
        if self.size != (size.0.max(1), size.1.max(1)) {
            *self = Self::new(device, size)?;
        }
        Ok(())
    }
}
