//! The per-frame render loop.
//!
//! An `ImmersiveSession` hands out one callback per display frame together with
//! the eye poses and render targets for that frame. `SessionDriver` answers each
//! callback with one tick (read settings, pull the current video frame, render
//! every eye) and asks for the next frame until it is stopped.

use crate::error::RenderError;
use glam::Mat4;
use image::RgbaImage;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stereo_projection::{Eye, PlaybackSettings};
use tokio::sync::watch;

/// Identifies an outstanding frame request so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// One eye of a session frame.
#[derive(Debug, Clone)]
pub struct XrView<T> {
    pub eye: Eye,
    /// World-to-eye transform.
    pub view: Mat4,
    pub projection: Mat4,
    pub target: T,
}

#[derive(Debug, Clone)]
pub struct XrFrame<T> {
    /// Display time of the frame, relative to session start.
    pub time: Duration,
    pub views: Vec<XrView<T>>,
}

pub type FrameCallback<T> = Box<dyn FnOnce(&XrFrame<T>) + Send>;

/// Frame-callback source of an immersive (or emulated) display.
pub trait ImmersiveSession: Send + Sync {
    /// Where a view's pixels go, e.g. a texture view of the eye swapchain.
    type Target: 'static;

    /// Schedules `callback` for the next display frame.
    fn request_frame(&self, callback: FrameCallback<Self::Target>) -> FrameHandle;

    /// Drops a scheduled callback. Unknown or already fired handles are ignored.
    fn cancel_frame(&self, handle: FrameHandle);
}

/// Per-eye state for one tick.
#[derive(Debug)]
pub struct RenderFrameState<'a, T> {
    pub eye: Eye,
    pub target: &'a T,
    pub view: Mat4,
    pub projection: Mat4,
    pub settings: PlaybackSettings,
}

/// Draws video frames for the eyes of a session.
///
/// A tick is `begin_frame`, one `render_eye` per view, then `end_frame`.
pub trait EyeRenderer: Send {
    type Target;

    fn begin_frame(
        &mut self,
        settings: &PlaybackSettings,
        frame: Option<&RgbaImage>,
    ) -> Result<(), RenderError>;

    fn render_eye(&mut self, state: &RenderFrameState<'_, Self::Target>) -> Result<(), RenderError>;

    fn end_frame(&mut self) -> Result<(), RenderError>;

    /// Releases every resource tied to rendering. Must be idempotent.
    fn teardown(&mut self);
}

/// Access to the decoded pixels of whatever the video is showing right now.
pub trait FrameProvider {
    /// `None` until the first frame is available.
    fn current_frame(&mut self) -> Option<&RgbaImage>;
}

struct Shared<S: ImmersiveSession, R> {
    session: Arc<S>,
    renderer: Mutex<R>,
    video: Mutex<Box<dyn FrameProvider + Send>>,
    settings: watch::Receiver<PlaybackSettings>,
    running: AtomicBool,
    pending: Mutex<Option<FrameHandle>>,
    ticks: AtomicU64,
    last_error: Mutex<Option<RenderError>>,
}

/// Drives an `EyeRenderer` from the frame callbacks of an `ImmersiveSession`.
///
/// Cloning yields another handle to the same loop.
pub struct SessionDriver<S: ImmersiveSession, R> {
    shared: Arc<Shared<S, R>>,
}

impl<S: ImmersiveSession, R> Clone for SessionDriver<S, R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S, R> SessionDriver<S, R>
where
    S: ImmersiveSession + 'static,
    R: EyeRenderer<Target = S::Target> + 'static,
{
    /// Starts the loop by requesting the first frame.
    pub fn start(
        session: Arc<S>,
        video: Box<dyn FrameProvider + Send>,
        settings: watch::Receiver<PlaybackSettings>,
        renderer: R,
    ) -> Self {
        let shared = Arc::new(Shared {
            session,
            renderer: Mutex::new(renderer),
            video: Mutex::new(video),
            settings,
            running: AtomicBool::new(true),
            pending: Mutex::new(None),
            ticks: AtomicU64::new(0),
            last_error: Mutex::new(None),
        });

        log::info!("Session driver started");
        schedule(&shared);
        Self { shared }
    }

    /// Stops the loop. Idempotent, and safe to call from inside a tick: the
    /// renderer is then torn down as soon as that tick finishes.
    pub fn stop(&self) {
        let shared = &self.shared;
        if shared.running.swap(false, Ordering::SeqCst) {
            log::info!("Session driver stopping after {} ticks", self.ticks());
        }

        if let Some(handle) = shared.pending.lock().take() {
            shared.session.cancel_frame(handle);
        }
        if let Some(mut renderer) = shared.renderer.try_lock() {
            renderer.teardown();
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Number of ticks rendered so far.
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    /// The error that stopped the loop, if any. Taking it clears it.
    pub fn take_error(&self) -> Option<RenderError> {
        self.shared.last_error.lock().take()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().as_ref().map(|e| e.to_string())
    }
}

fn schedule<S, R>(shared: &Arc<Shared<S, R>>)
where
    S: ImmersiveSession + 'static,
    R: EyeRenderer<Target = S::Target> + 'static,
{
    // Checked under the lock so a concurrent `stop` either sees the new
    // handle or prevents it from being requested.
    let mut pending = shared.pending.lock();
    if !shared.running.load(Ordering::SeqCst) {
        return;
    }
    let next = shared.clone();
    *pending = Some(
        shared
            .session
            .request_frame(Box::new(move |frame: &XrFrame<S::Target>| tick(&next, frame))),
    );
}

fn tick<S, R>(shared: &Arc<Shared<S, R>>, frame: &XrFrame<S::Target>)
where
    S: ImmersiveSession + 'static,
    R: EyeRenderer<Target = S::Target> + 'static,
{
    if !shared.running.load(Ordering::SeqCst) {
        return;
    }
    shared.pending.lock().take();
    shared.ticks.fetch_add(1, Ordering::Relaxed);

    {
        let mut renderer = shared.renderer.lock();
        // `stop` may have run between the check above and taking the lock.
        if !shared.running.load(Ordering::SeqCst) {
            renderer.teardown();
            return;
        }
        let settings = *shared.settings.borrow();
        let result = {
            let mut video = shared.video.lock();
            render_views(&mut *renderer, &settings, video.current_frame(), frame)
        };

        if let Err(e) = result {
            log::error!("Render tick failed, stopping session: {e}");
            shared.running.store(false, Ordering::SeqCst);
            *shared.last_error.lock() = Some(e);
        }
        schedule(shared);
    }

    if !shared.running.load(Ordering::SeqCst) {
        if let Some(mut renderer) = shared.renderer.try_lock() {
            renderer.teardown();
        }
    }
}

fn render_views<R: EyeRenderer>(
    renderer: &mut R,
    settings: &PlaybackSettings,
    image: Option<&RgbaImage>,
    frame: &XrFrame<R::Target>,
) -> Result<(), RenderError> {
    renderer.begin_frame(settings, image)?;
    for view in &frame.views {
        renderer.render_eye(&RenderFrameState {
            eye: view.eye,
            target: &view.target,
            view: view.view,
            projection: view.projection,
            settings: *settings,
        })?;
    }
    renderer.end_frame()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use stereo_projection::{Format, Layout};

    /// Session whose frames are fired by hand.
    #[derive(Default)]
    struct ManualSession {
        next_id: AtomicU64,
        pending: Mutex<Option<(FrameHandle, FrameCallback<u32>)>>,
        cancelled: Mutex<Vec<FrameHandle>>,
    }

    impl ManualSession {
        /// Runs the pending callback, if any, with one view per eye.
        fn fire(&self) -> bool {
            let Some((_, callback)) = self.pending.lock().take() else {
                return false;
            };
            let views = Eye::BOTH
                .iter()
                .enumerate()
                .map(|(i, &eye)| XrView {
                    eye,
                    view: Mat4::IDENTITY,
                    projection: Mat4::IDENTITY,
                    target: i as u32,
                })
                .collect();
            callback(&XrFrame {
                time: Duration::ZERO,
                views,
            });
            true
        }

        fn has_pending(&self) -> bool {
            self.pending.lock().is_some()
        }
    }

    impl ImmersiveSession for ManualSession {
        type Target = u32;

        fn request_frame(&self, callback: FrameCallback<u32>) -> FrameHandle {
            let handle = FrameHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
            *self.pending.lock() = Some((handle, callback));
            handle
        }

        fn cancel_frame(&self, handle: FrameHandle) {
            let mut pending = self.pending.lock();
            if pending.as_ref().map(|(h, _)| *h) == Some(handle) {
                *pending = None;
                self.cancelled.lock().push(handle);
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Begin(Layout, bool),
        Eye(Eye, u32, Format),
        End,
        Teardown,
    }

    type Hook = Arc<Mutex<Option<Box<dyn FnMut() + Send>>>>;

    #[derive(Default)]
    struct RecordingRenderer {
        calls: Arc<Mutex<Vec<Call>>>,
        fail_on_eye: Option<Eye>,
        on_render: Hook,
    }

    impl EyeRenderer for RecordingRenderer {
        type Target = u32;

        fn begin_frame(
            &mut self,
            settings: &PlaybackSettings,
            frame: Option<&RgbaImage>,
        ) -> Result<(), RenderError> {
            self.calls
                .lock()
                .push(Call::Begin(settings.layout, frame.is_some()));
            Ok(())
        }

        fn render_eye(&mut self, state: &RenderFrameState<'_, u32>) -> Result<(), RenderError> {
            if let Some(hook) = self.on_render.lock().as_mut() {
                hook();
            }
            if self.fail_on_eye == Some(state.eye) {
                return Err(RenderError::Resource {
                    what: "eye texture",
                    message: "out of memory".into(),
                });
            }
            self.calls
                .lock()
                .push(Call::Eye(state.eye, *state.target, state.settings.format));
            Ok(())
        }

        fn end_frame(&mut self) -> Result<(), RenderError> {
            self.calls.lock().push(Call::End);
            Ok(())
        }

        fn teardown(&mut self) {
            self.calls.lock().push(Call::Teardown);
        }
    }

    struct StillFrame(RgbaImage);

    impl FrameProvider for StillFrame {
        fn current_frame(&mut self) -> Option<&RgbaImage> {
            Some(&self.0)
        }
    }

    struct Fixture {
        session: Arc<ManualSession>,
        settings: watch::Sender<PlaybackSettings>,
        calls: Arc<Mutex<Vec<Call>>>,
        hook: Hook,
        driver: SessionDriver<ManualSession, RecordingRenderer>,
    }

    fn fixture(fail_on_eye: Option<Eye>) -> Fixture {
        let session = Arc::new(ManualSession::default());
        let (settings, settings_rx) = watch::channel(PlaybackSettings::default());
        let renderer = RecordingRenderer {
            fail_on_eye,
            ..Default::default()
        };
        let calls = renderer.calls.clone();
        let hook = renderer.on_render.clone();
        let video = Box::new(StillFrame(RgbaImage::from_pixel(4, 2, Rgba([0, 0, 0, 255]))));
        let driver = SessionDriver::start(session.clone(), video, settings_rx, renderer);
        Fixture {
            session,
            settings,
            calls,
            hook,
            driver,
        }
    }

    fn teardowns(calls: &Mutex<Vec<Call>>) -> usize {
        calls.lock().iter().filter(|c| **c == Call::Teardown).count()
    }

    #[test]
    fn each_tick_renders_every_view_and_requests_the_next() {
        let f = fixture(None);
        assert!(f.session.has_pending());

        assert!(f.session.fire());
        assert!(f.session.fire());

        assert_eq!(f.driver.ticks(), 2);
        assert!(f.session.has_pending());
        let calls = f.calls.lock().clone();
        assert_eq!(
            &calls[..4],
            &[
                Call::Begin(Layout::Mono, true),
                Call::Eye(Eye::Left, 0, Format::Screen),
                Call::Eye(Eye::Right, 1, Format::Screen),
                Call::End,
            ]
        );
    }

    #[test]
    fn settings_changes_apply_on_the_next_tick() {
        let f = fixture(None);
        f.session.fire();

        f.settings.send_modify(|s| {
            *s = s.with_layout(Layout::StereoTopBottom).with_format(Format::Sphere360)
        });
        f.session.fire();

        let calls = f.calls.lock().clone();
        assert_eq!(calls[4], Call::Begin(Layout::StereoTopBottom, true));
        assert_eq!(calls[5], Call::Eye(Eye::Left, 0, Format::Sphere360));
    }

    #[test]
    fn stop_cancels_the_pending_frame_and_tears_down() {
        let f = fixture(None);
        f.session.fire();
        f.driver.stop();

        assert!(!f.driver.is_running());
        assert!(!f.session.has_pending());
        assert_eq!(f.session.cancelled.lock().len(), 1);
        assert_eq!(teardowns(&f.calls), 1);

        // Idempotent, and nothing is left to fire.
        f.driver.stop();
        assert!(!f.session.fire());
        assert_eq!(f.driver.ticks(), 1);
    }

    #[test]
    fn stop_from_inside_a_tick_ends_the_loop() {
        let f = fixture(None);
        let driver = f.driver.clone();
        *f.hook.lock() = Some(Box::new(move || driver.stop()));

        assert!(f.session.fire());

        assert!(!f.driver.is_running());
        assert!(!f.session.has_pending());
        assert_eq!(f.driver.ticks(), 1);
        let calls = f.calls.lock().clone();
        assert_eq!(calls.last(), Some(&Call::Teardown));
        assert_eq!(teardowns(&f.calls), 1);
    }

    #[test]
    fn stop_on_another_thread_while_a_tick_waits_for_the_renderer() {
        let f = fixture(None);

        // Holding the renderer parks the tick between its running check and
        // the render, and keeps `stop` from tearing down itself.
        let guard = f.driver.shared.renderer.lock();
        let session = f.session.clone();
        let tick = std::thread::spawn(move || session.fire());
        while f.driver.ticks() == 0 {
            std::thread::yield_now();
        }

        f.driver.stop();
        drop(guard);
        assert!(tick.join().unwrap());

        let calls = f.calls.lock().clone();
        assert!(!calls.iter().any(|c| matches!(c, Call::Begin(..))));
        assert!(teardowns(&f.calls) >= 1);
        assert!(!f.session.has_pending());
        assert!(!f.driver.is_running());
    }

    #[test]
    fn render_error_stops_the_loop() {
        let f = fixture(Some(Eye::Right));
        assert!(f.session.fire());

        assert!(!f.driver.is_running());
        assert!(!f.session.has_pending());
        assert!(f.driver.last_error().unwrap().contains("eye texture"));
        assert!(matches!(
            f.driver.take_error(),
            Some(RenderError::Resource { .. })
        ));
        let calls = f.calls.lock().clone();
        assert!(!calls.contains(&Call::End));
        assert_eq!(calls.last(), Some(&Call::Teardown));
    }

    #[test]
    fn callback_fired_after_stop_does_nothing() {
        let f = fixture(None);
        // Grab the callback as a session would right before stop lands.
        let (_, callback) = f.session.pending.lock().take().unwrap();
        f.driver.stop();
        callback(&XrFrame {
            time: Duration::ZERO,
            views: Vec::new(),
        });

        assert_eq!(f.driver.ticks(), 0);
        assert!(!f.session.has_pending());
    }
}
