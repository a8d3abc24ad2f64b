use serde::Serialize;
use stereo_projection::{Format, Layout, PlaybackSettings};

/// A detected value and how sure the classifier is about it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection<T> {
    pub value: T,
    /// Heuristic certainty in `[0, 1]`.
    pub confidence: f32,
}

impl<T> Detection<T> {
    pub fn new(value: T, confidence: f32) -> Self {
        Self {
            value,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Outcome of classifying a batch of frame samples.
///
/// Fields the classifier was not sure enough about are `None`; they are never
/// filled with a guess.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub layout: Option<Detection<Layout>>,
    pub flip: Option<Detection<bool>>,
    pub format: Option<Detection<Format>>,
    /// Number of samples that went into the result.
    pub samples: usize,
}

impl DetectionResult {
    /// Whether nothing at all was detected.
    pub fn is_empty(&self) -> bool {
        self.layout.is_none() && self.flip.is_none() && self.format.is_none()
    }

    /// Returns `settings` with every detected field replaced.
    ///
    /// Applying a stereo layout without a flip cue resets `flip` to `false`, so
    /// a flip chosen for a previous video does not leak into this one.
    pub fn apply_to(&self, settings: PlaybackSettings) -> PlaybackSettings {
        let mut next = settings;

        if let Some(layout) = self.layout {
            next = next.with_layout(layout.value);
            if layout.value.is_stereo() && self.flip.is_none() {
                next = next.with_flip(false);
            }
        }
        if let Some(flip) = self.flip {
            next = next.with_flip(flip.value);
        }
        if let Some(format) = self.format {
            next = next.with_format(format.value);
        }
        next
    }
}
