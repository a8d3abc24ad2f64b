use crate::{
    camera::{CameraController, LookCamera},
    desktop::DesktopSession,
    detect::DetectionService,
    player::{ImageSequencePlayer, Transport},
    renderer::{context::GfxContext, EyeTarget, StereoRenderer},
    session::{FrameProvider, SessionDriver},
    settings::SettingsStore,
    ui::{self, HudInfo},
};
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc, time::Instant};
use stereo_projection::{MeshResolution, PlaybackSettings};
use video_recognition::ImageSequence;
use winit::{
    event::{ElementState, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

type Driver = SessionDriver<DesktopSession<EyeTarget>, StereoRenderer>;

/// Everything the preview needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub frames: PathBuf,
    pub fps: f64,
    pub settings: PlaybackSettings,
    pub samples: usize,
    pub threshold: f32,
    pub resolution: MeshResolution,
}

pub struct App {
    pub gfx: GfxContext,
    pub camera: LookCamera,
    pub camera_controller: CameraController,
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    settings: SettingsStore,
    sequence: ImageSequence,
    transport: Transport,
    detection: Option<DetectionService>,
    session: Arc<DesktopSession<EyeTarget>>,
    driver: Driver,
    resolution: MeshResolution,
    last_frame: Instant,
    fps: f32,
}

impl App {
    pub async fn new(window: Arc<Window>, config: AppConfig) -> Result<Self> {
        let gfx = GfxContext::new(window.clone()).await?;
        let size = gfx.size;

        let sequence = ImageSequence::open(&config.frames, config.fps)
            .with_context(|| format!("Failed to open frames in '{}'", config.frames.display()))?;
        log::info!(
            "Loaded {} frames from '{}' at {} fps",
            sequence.frame_count(),
            config.frames.display(),
            sequence.fps()
        );

        let settings = SettingsStore::new(config.settings);
        let player = ImageSequencePlayer::new(sequence.clone(), config.settings.autoplay);
        let transport = player.transport();

        // Detection reads its own copy of the sequence, never the playback one.
        let mut detection =
            match DetectionService::start(sequence.clone(), config.samples, config.threshold) {
                Ok(service) => Some(service),
                Err(e) => {
                    log::warn!("Layout detection unavailable: {e:#}");
                    None
                }
            };
        if config.settings.auto_detect {
            if let Some(detection) = detection.as_mut() {
                detection.request();
            }
        }

        let session = Arc::new(DesktopSession::new());
        let driver = start_driver(&gfx, &session, Box::new(player), &settings, config.resolution)?;

        let camera = LookCamera::new(size.width as f32 / size.height.max(1) as f32);
        let camera_controller = CameraController::new();

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1);

        Ok(Self {
            gfx,
            camera,
            camera_controller,
            egui_ctx,
            egui_state,
            egui_renderer,
            settings,
            sequence,
            transport,
            detection,
            session,
            driver,
            resolution: config.resolution,
            last_frame: Instant::now(),
            fps: 0.0,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
            self.camera.set_aspect(new_size.width, new_size.height);
        }
    }

    /// Returns `true` when the event was consumed.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        self.camera_controller.handle_event(event, &mut self.camera);

        match event {
            WindowEvent::Resized(physical_size) => self.resize(*physical_size),
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Space) => {
                        self.transport.toggle();
                    }
                    PhysicalKey::Code(KeyCode::KeyD) => self.request_detection(),
                    PhysicalKey::Code(KeyCode::F1) => {
                        self.settings.update(|s| PlaybackSettings { debug: !s.debug, ..s });
                    }
                    _ => return false,
                }
                return true;
            }
            _ => {}
        }

        false
    }

    fn request_detection(&mut self) {
        match self.detection.as_mut() {
            Some(detection) => detection.request(),
            None => log::warn!("Layout detection is not available"),
        }
    }

    fn poll_detection(&mut self) {
        let Some(result) = self.detection.as_mut().and_then(|d| d.poll()) else {
            return;
        };
        if !self.settings.apply_detection(&result) {
            log::info!("Detection matched the current settings");
        }
    }

    /// Replaces a renderer that stopped on an error.
    fn restart_renderer(&mut self) {
        self.driver.stop();
        let player = ImageSequencePlayer::with_transport(self.sequence.clone(), self.transport.clone());
        match start_driver(
            &self.gfx,
            &self.session,
            Box::new(player),
            &self.settings,
            self.resolution,
        ) {
            Ok(driver) => self.driver = driver,
            Err(e) => log::error!("Failed to restart renderer: {e:#}"),
        }
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        if dt > 0.0 {
            self.fps += (1.0 / dt - self.fps) * 0.1;
        }

        self.poll_detection();

        let frame = self.gfx.surface.get_current_texture()?;
        let eye_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // One tick of the session loop draws the eye into the swapchain.
        let drew_eye = self.session.fire(
            self.camera.view(),
            self.camera.projection(),
            EyeTarget {
                view: eye_view,
                size: (self.gfx.config.width, self.gfx.config.height),
            },
        );

        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);

        let current = self.settings.current();
        if current.debug {
            let mut edited = current;
            let actions = ui::draw_hud(
                &self.egui_ctx,
                &mut edited,
                &HudInfo {
                    position: self.transport.position(),
                    duration: self.transport.duration(),
                    playing: self.transport.is_playing(),
                    ticks: self.driver.ticks(),
                    fps: self.fps,
                    detection: self.detection.as_ref().map(|d| d.status()),
                    error: self.driver.last_error(),
                },
            );
            self.settings.publish(edited);

            if actions.toggle_play {
                self.transport.toggle();
            }
            if actions.detect {
                self.request_detection();
            }
            if actions.restart {
                self.restart_renderer();
            }
        }

        let egui_output = self.egui_ctx.end_frame();
        self.egui_state
            .handle_platform_output(window, egui_output.platform_output);
        let shapes = self
            .egui_ctx
            .tessellate(egui_output.shapes, self.egui_ctx.pixels_per_point());

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.gfx.config.width, self.gfx.config.height],
            pixels_per_point: self.egui_ctx.pixels_per_point(),
        };

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("UI Encoder"),
            });

        for (id, delta) in &egui_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.gfx.device, &self.gfx.queue, *id, delta);
        }

        self.egui_renderer.update_buffers(
            &self.gfx.device,
            &self.gfx.queue,
            &mut encoder,
            &shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        // Without an eye pass the swapchain holds garbage.
                        load: if drew_eye {
                            wgpu::LoadOp::Load
                        } else {
                            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.egui_renderer
                .render(&mut render_pass, &shapes, &screen_descriptor);
        }

        for id in &egui_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        Ok(())
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.driver.stop();
    }
}

fn start_driver(
    gfx: &GfxContext,
    session: &Arc<DesktopSession<EyeTarget>>,
    video: Box<dyn FrameProvider + Send>,
    settings: &SettingsStore,
    resolution: MeshResolution,
) -> Result<Driver> {
    let renderer = StereoRenderer::new(
        gfx.device.clone(),
        gfx.queue.clone(),
        gfx.config.format,
        resolution,
    )?;
    Ok(SessionDriver::start(
        session.clone(),
        video,
        settings.subscribe(),
        renderer,
    ))
}
