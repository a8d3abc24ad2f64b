//! Window-backed stand-in for an immersive session: one (left) eye, posed by
//! the look-around camera, rendered straight into the swapchain.

use crate::session::{FrameCallback, FrameHandle, ImmersiveSession, XrFrame, XrView};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use stereo_projection::Eye;

pub struct DesktopSession<T> {
    started: Instant,
    next_id: AtomicU64,
    pending: Mutex<Option<(FrameHandle, FrameCallback<T>)>>,
}

impl<T: 'static> Default for DesktopSession<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> DesktopSession<T> {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            next_id: AtomicU64::new(1),
            pending: Mutex::new(None),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Runs the pending frame callback, if any, for a single left-eye view.
    /// Returns whether a callback ran.
    pub fn fire(&self, view: glam::Mat4, projection: glam::Mat4, target: T) -> bool {
        // Taken out before running: the callback requests the next frame.
        let Some((_, callback)) = self.pending.lock().take() else {
            return false;
        };
        callback(&XrFrame {
            time: self.started.elapsed(),
            views: vec![XrView {
                eye: Eye::Left,
                view,
                projection,
                target,
            }],
        });
        true
    }
}

impl<T: Send + 'static> ImmersiveSession for DesktopSession<T> {
    type Target = T;

    fn request_frame(&self, callback: FrameCallback<T>) -> FrameHandle {
        let handle = FrameHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut pending = self.pending.lock();
        if pending.is_some() {
            log::warn!("Replacing an unfired frame request");
        }
        *pending = Some((handle, callback));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        let mut pending = self.pending.lock();
        if pending.as_ref().is_some_and(|(h, _)| *h == handle) {
            *pending = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;
    use std::sync::Arc;

    #[test]
    fn fires_once_per_request() {
        let session = DesktopSession::<u8>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        session.request_frame(Box::new(move |frame: &XrFrame<u8>| {
            sink.lock().extend(frame.views.iter().map(|v| (v.eye, v.target)));
        }));

        assert!(session.fire(Mat4::IDENTITY, Mat4::IDENTITY, 7));
        assert!(!session.fire(Mat4::IDENTITY, Mat4::IDENTITY, 8));
        assert_eq!(*seen.lock(), vec![(Eye::Left, 7)]);
    }

    #[test]
    fn cancel_only_drops_the_matching_request() {
        let session = DesktopSession::<u8>::new();
        let stale = session.request_frame(Box::new(|_: &XrFrame<u8>| {}));
        let current = session.request_frame(Box::new(|_: &XrFrame<u8>| {}));

        session.cancel_frame(stale);
        assert!(session.has_pending());
        session.cancel_frame(current);
        assert!(!session.has_pending());
    }
}
