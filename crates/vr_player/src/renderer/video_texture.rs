use super::pipelines::stereo_video::StereoVideoPipeline;
use super::{check_texture_size, scoped};
use crate::error::RenderError;
use image::RgbaImage;

/// GPU copy of the current video frame.
///
/// Starts as a 1×1 black placeholder; the texture is recreated whenever the
/// incoming frame size changes and otherwise overwritten in place.
pub struct VideoTexture {
    texture: wgpu::Texture,
    pub bind_group: wgpu::BindGroup,
    size: (u32, u32),
    has_frame: bool,
}

impl VideoTexture {
    pub fn placeholder(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &StereoVideoPipeline,
    ) -> Result<Self, RenderError> {
        let mut this = Self::create(device, pipeline, (1, 1))?;
        this.write(queue, &[0, 0, 0, 255]);
        Ok(this)
    }

    fn create(
        device: &wgpu::Device,
        pipeline: &StereoVideoPipeline,
        size: (u32, u32),
    ) -> Result<Self, RenderError> {
        check_texture_size("video texture", size, device.limits().max_texture_dimension_2d)?;
        scoped(device, "video texture", || {
            Self::create_unchecked(device, pipeline, size)
        })
    }

    fn create_unchecked(
        device: &wgpu::Device,
        pipeline: &StereoVideoPipeline,
        size: (u32, u32),
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Video Texture"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = pipeline.video_bind_group(device, &view);

        Self {
            texture,
            bind_group,
            size,
            has_frame: false,
        }
    }

    /// Uploads `frame`, recreating the texture first if its size changed.
    /// On failure the previous texture stays in place.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &StereoVideoPipeline,
        frame: &RgbaImage,
    ) -> Result<(), RenderError> {
        let size = frame.dimensions();
        if size.0 == 0 || size.1 == 0 {
            return Ok(());
        }
        if size != self.size {
            log::debug!("Video texture resized to {}x{}", size.0, size.1);
            *self = Self::create(device, pipeline, size)?;
        }
        self.write(queue, frame.as_raw());
        self.has_frame = true;
        Ok(())
    }

    fn write(&mut self, queue: &wgpu::Queue, rgba: &[u8]) {
        let (width, height) = self.size;
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Whether a real frame (not the placeholder) has been uploaded.
    #[inline]
    pub fn has_frame(&self) -> bool {
        self.has_frame
    }

    /// Width:height of the texture; 16:9 while only the placeholder exists.
    pub fn aspect(&self) -> f32 {
        if self.has_frame {
            self.size.0 as f32 / self.size.1 as f32
        } else {
            16.0 / 9.0
        }
    }
}
