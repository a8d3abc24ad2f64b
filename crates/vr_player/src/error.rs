use stereo_projection::ConfigError;

/// Failure inside one render tick. Any of these stops the session loop.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// GPU resource creation was rejected by the device.
    #[error("failed to create {what}: {message}")]
    Resource { what: &'static str, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("render_eye called outside of begin_frame/end_frame")]
    NoFrame,
}
