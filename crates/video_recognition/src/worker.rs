//! Background detection: a tokio task that owns the video source, samples it
//! on request and hands back immutable results over a channel.

use crate::classifier::{Classifier, ClassifierConfig};
use crate::detection::DetectionResult;
use crate::error::DetectError;
use crate::sampler::{FrameSample, FrameSampler, SamplerConfig};
use crate::source::VideoSource;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::task::JoinHandle;

const REQUEST_QUEUE: usize = 8;
const OUTCOME_QUEUE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionRequest {
    pub id: u64,
    pub samples: usize,
}

#[derive(Debug)]
pub struct DetectionOutcome {
    pub request_id: u64,
    pub result: Result<DetectionResult, DetectError>,
}

/// Samples `count` frames from `source` and classifies them.
///
/// Classification runs on the blocking pool so the runtime stays free for
/// seeking and decoding.
pub async fn detect<S: VideoSource>(
    source: &mut S,
    sampler: &FrameSampler,
    classifier: Classifier,
    count: usize,
) -> Result<DetectionResult, DetectError> {
    let samples = sampler.sample(source, count).await?;
    classify_blocking(classifier, samples).await
}

async fn classify_blocking(
    classifier: Classifier,
    samples: Vec<FrameSample>,
) -> Result<DetectionResult, DetectError> {
    tokio::task::spawn_blocking(move || classifier.classify(&samples))
        .await
        .map_err(|e| DetectError::Task(e.to_string()))
}

pub struct DetectionWorker;

impl DetectionWorker {
    /// Spawns the worker on the current runtime.
    ///
    /// # Panics
    /// Outside of a tokio runtime.
    pub fn spawn<S>(source: S, sampler: SamplerConfig, classifier: ClassifierConfig) -> DetectionHandle
    where
        S: VideoSource + 'static,
    {
        Self::spawn_on(&Handle::current(), source, sampler, classifier)
    }

    /// Spawns the worker on `runtime`, for callers living outside of it.
    pub fn spawn_on<S>(
        runtime: &Handle,
        source: S,
        sampler: SamplerConfig,
        classifier: ClassifierConfig,
    ) -> DetectionHandle
    where
        S: VideoSource + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE);
        let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_QUEUE);

        let task = runtime.spawn(run(
            source,
            FrameSampler::new(sampler),
            Classifier::new(classifier),
            request_rx,
            outcome_tx,
        ));

        DetectionHandle {
            requests: request_tx,
            outcomes: outcome_rx,
            next_id: AtomicU64::new(1),
            task,
        }
    }
}

async fn run<S: VideoSource>(
    mut source: S,
    sampler: FrameSampler,
    classifier: Classifier,
    mut requests: mpsc::Receiver<DetectionRequest>,
    outcomes: mpsc::Sender<DetectionOutcome>,
) {
    tracing::info!("Detection worker started");

    while let Some(request) = requests.recv().await {
        tracing::info!(id = request.id, samples = request.samples, "Detection requested");

        let result = detect(&mut source, &sampler, classifier, request.samples).await;
        match &result {
            Ok(r) => tracing::info!(
                id = request.id,
                layout = ?r.layout.map(|d| d.value),
                flip = ?r.flip.map(|d| d.value),
                format = ?r.format.map(|d| d.value),
                "Detection finished"
            ),
            Err(e) => tracing::warn!(id = request.id, error = %e, "Detection failed"),
        }

        let outcome = DetectionOutcome {
            request_id: request.id,
            result,
        };
        if outcomes.send(outcome).await.is_err() {
            break;
        }
    }

    tracing::info!("Detection worker stopped");
}

/// Owner-side end of a `DetectionWorker`. Dropping it stops the worker once
/// the queued requests are done.
pub struct DetectionHandle {
    requests: mpsc::Sender<DetectionRequest>,
    outcomes: mpsc::Receiver<DetectionOutcome>,
    next_id: AtomicU64,
    task: JoinHandle<()>,
}

impl DetectionHandle {
    /// Queues a detection over `samples` frames and returns its request id.
    ///
    /// Never blocks; a full queue is reported as `WorkerBusy`.
    pub fn request(&self, samples: usize) -> Result<u64, DetectError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.requests.try_send(DetectionRequest { id, samples }) {
            Ok(()) => Ok(id),
            Err(TrySendError::Full(_)) => Err(DetectError::WorkerBusy),
            Err(TrySendError::Closed(_)) => Err(DetectError::WorkerClosed),
        }
    }

    /// A finished outcome, if one is waiting.
    pub fn try_recv(&mut self) -> Option<DetectionOutcome> {
        match self.outcomes.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Waits for the next outcome; `None` once the worker is gone.
    pub async fn recv(&mut self) -> Option<DetectionOutcome> {
        self.outcomes.recv().await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the worker without waiting for queued requests.
    pub fn abort(&self) {
        self.task.abort();
    }
}
