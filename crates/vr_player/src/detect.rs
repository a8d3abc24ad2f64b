//! Runs layout detection off the render thread.
//!
//! The worker lives on its own small tokio runtime; the render loop only ever
//! calls the non-blocking `request` and `poll`.

use anyhow::Result;
use stereo_projection::PlaybackSettings;
use tokio::runtime::{Builder, Runtime};
use video_recognition::{
    ClassifierConfig, DetectError, DetectionHandle, DetectionOutcome, DetectionResult,
    DetectionWorker, ImageSequence, SamplerConfig,
};

/// What the HUD shows about detection.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DetectionStatus {
    #[default]
    Idle,
    Detecting { request_id: u64 },
    Done(DetectionResult),
    Failed(String),
}

impl DetectionStatus {
    pub fn is_detecting(&self) -> bool {
        matches!(self, DetectionStatus::Detecting { .. })
    }
}

pub struct DetectionService {
    // Dropped after `handle`, so the worker sees its channel close first.
    handle: DetectionHandle,
    _runtime: Runtime,
    samples: usize,
    status: DetectionStatus,
}

impl DetectionService {
    pub fn start(sequence: ImageSequence, samples: usize, threshold: f32) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("detection")
            .enable_time()
            .build()?;

        let classifier = ClassifierConfig {
            acceptance_threshold: threshold,
            ..Default::default()
        };
        let handle = DetectionWorker::spawn_on(
            runtime.handle(),
            sequence,
            SamplerConfig::default(),
            classifier,
        );

        Ok(Self {
            handle,
            _runtime: runtime,
            samples,
            status: DetectionStatus::Idle,
        })
    }

    pub fn status(&self) -> &DetectionStatus {
        &self.status
    }

    /// Queues a detection unless one is already running.
    pub fn request(&mut self) {
        if self.status.is_detecting() {
            return;
        }
        match self.handle.request(self.samples) {
            Ok(request_id) => {
                log::info!("Detecting layout over {} samples", self.samples);
                self.status = DetectionStatus::Detecting { request_id };
            }
            Err(DetectError::WorkerBusy) => log::debug!("Detection worker busy, request dropped"),
            Err(e) => self.status = DetectionStatus::Failed(e.to_string()),
        }
    }

    /// Picks up a finished detection. Returns the result only when it belongs
    /// to the request in flight and succeeded.
    pub fn poll(&mut self) -> Option<DetectionResult> {
        let DetectionOutcome { request_id, result } = self.handle.try_recv()?;
        let DetectionStatus::Detecting { request_id: expected } = self.status else {
            return None;
        };
        if request_id != expected {
            return None;
        }

        match result {
            Ok(result) => {
                log::info!(
                    "Detected layout={:?} flip={:?} format={:?}",
                    result.layout.map(|d| d.value),
                    result.flip.map(|d| d.value),
                    result.format.map(|d| d.value)
                );
                self.status = DetectionStatus::Done(result.clone());
                Some(result)
            }
            Err(e) => {
                log::warn!("Detection failed: {e}");
                self.status = DetectionStatus::Failed(e.to_string());
                None
            }
        }
    }
}

/// Human-readable summary of a result for the HUD.
pub fn describe(result: &DetectionResult, settings: &PlaybackSettings) -> String {
    if result.is_empty() {
        return format!("nothing conclusive in {} samples", result.samples);
    }
    let mut parts = Vec::new();
    if let Some(d) = result.layout {
        parts.push(format!("{} ({:.0}%)", d.value.label(), d.confidence * 100.0));
    }
    if let Some(d) = result.flip {
        parts.push(format!("flip {} ({:.0}%)", d.value, d.confidence * 100.0));
    }
    if let Some(d) = result.format {
        parts.push(format!("{} ({:.0}%)", d.value.label(), d.confidence * 100.0));
    }
    if result.format.is_none() {
        parts.push(format!("kept {}", settings.format.label()));
    }
    parts.join(", ")
}
