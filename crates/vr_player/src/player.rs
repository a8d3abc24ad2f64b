//! Wall-clock playback of an image sequence for the render loop.

use crate::session::FrameProvider;
use image::RgbaImage;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use video_recognition::{ImageSequence, VideoSource};

#[derive(Debug)]
struct Clock {
    /// Position when playback last started or paused.
    anchor: Duration,
    /// Wall time playback started at; `None` while paused.
    started: Option<Instant>,
    duration: Duration,
}

impl Clock {
    fn position_at(&self, now: Instant) -> Duration {
        let raw = match self.started {
            Some(t) => self.anchor + now.saturating_duration_since(t),
            None => self.anchor,
        };
        if self.duration.is_zero() {
            return Duration::ZERO;
        }
        // Loops back to the start at the end.
        Duration::from_nanos((raw.as_nanos() % self.duration.as_nanos()) as u64)
    }
}

/// Shared play/pause control. Cloning yields another handle to the same clock.
#[derive(Debug, Clone)]
pub struct Transport {
    clock: Arc<Mutex<Clock>>,
}

impl Transport {
    pub fn new(duration: Duration) -> Self {
        Self {
            clock: Arc::new(Mutex::new(Clock {
                anchor: Duration::ZERO,
                started: None,
                duration,
            })),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.clock.lock().started.is_some()
    }

    pub fn position(&self) -> Duration {
        self.position_at(Instant::now())
    }

    pub fn position_at(&self, now: Instant) -> Duration {
        self.clock.lock().position_at(now)
    }

    pub fn duration(&self) -> Duration {
        self.clock.lock().duration
    }

    pub fn play(&self) {
        self.play_at(Instant::now());
    }

    pub fn play_at(&self, now: Instant) {
        let mut clock = self.clock.lock();
        if clock.started.is_none() {
            clock.started = Some(now);
        }
    }

    pub fn pause(&self) {
        self.pause_at(Instant::now());
    }

    pub fn pause_at(&self, now: Instant) {
        let mut clock = self.clock.lock();
        if clock.started.is_some() {
            clock.anchor = clock.position_at(now);
            clock.started = None;
        }
    }

    /// Returns whether playback is running afterwards.
    pub fn toggle(&self) -> bool {
        if self.is_playing() {
            self.pause();
            false
        } else {
            self.play();
            true
        }
    }
}

/// `FrameProvider` over an `ImageSequence`, decoding a frame only when the
/// playback position moves onto it.
pub struct ImageSequencePlayer {
    sequence: ImageSequence,
    transport: Transport,
    current: Option<(usize, RgbaImage)>,
}

impl ImageSequencePlayer {
    pub fn new(sequence: ImageSequence, autoplay: bool) -> Self {
        let transport = Transport::new(sequence.duration());
        if autoplay {
            transport.play();
        }
        Self::with_transport(sequence, transport)
    }

    /// A player following an existing transport, e.g. after a renderer restart.
    pub fn with_transport(sequence: ImageSequence, transport: Transport) -> Self {
        Self {
            sequence,
            transport,
            current: None,
        }
    }

    pub fn transport(&self) -> Transport {
        self.transport.clone()
    }

    fn frame_index(&self) -> usize {
        self.sequence
            .index_at(self.transport.position())
            .unwrap_or(0)
    }
}

impl FrameProvider for ImageSequencePlayer {
    fn current_frame(&mut self) -> Option<&RgbaImage> {
        let index = self.frame_index();
        if self.current.as_ref().map(|(i, _)| *i) != Some(index) {
            match self.sequence.load_frame(index) {
                Ok(frame) => self.current = Some((index, frame)),
                // Keep showing the previous frame.
                Err(e) => log::warn!("Failed to load frame {index}: {e}"),
            }
        }
        self.current.as_ref().map(|(_, frame)| frame)
    }
}
