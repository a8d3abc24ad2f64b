//! Layout, flip and projection heuristics over a batch of frame samples.
//!
//! Everything works on luma. A frame is analysed on its own (in parallel), then
//! the per-frame measurements are folded into one score per candidate:
//!
//! - stereo layouts: how often, and how strongly, the two halves of a frame
//!   look like the same picture, weighted by how well the source aspect ratio
//!   fits the layout (2:1 for side by side, 1:1 for stacked);
//! - flip: the sign of the horizontal offset between the halves;
//! - projection: the aspect ratio of one eye (2:1 for 360, 1:1 for 180),
//!   low detail near the poles for spheres, and black bars for flat video.

use crate::detection::{Detection, DetectionResult};
use crate::luma::{Luma, Rect};
use crate::sampler::FrameSample;
use rayon::prelude::*;
use stereo_projection::{Format, Layout};

pub const DEFAULT_ACCEPTANCE_THRESHOLD: f32 = 0.6;
/// NCC above which two halves count as the same picture.
pub const PAIR_SIMILARITY: f32 = 0.6;
/// Largest horizontal offset between stereo halves searched, in analysis pixels.
pub const MAX_DISPARITY: usize = 3;

/// Aspect ratios within this factor of the target are still partly plausible.
const ASPECT_TOLERANCE: f32 = 1.15;
/// Fraction of the height checked for letterbox bars at top and bottom.
const LETTERBOX_BAND: f32 = 0.12;
const LETTERBOX_MAX_MEAN: f32 = 0.08;
const LETTERBOX_MAX_STD: f32 = 0.03;
/// Fraction of the height treated as a pole region at top and bottom.
const POLE_BAND: f32 = 0.1;
/// Below this a frame has no usable structure at all.
const MIN_FRAME_STD: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    /// Minimum confidence for a field to be reported.
    pub acceptance_threshold: f32,
    pub pair_similarity: f32,
    pub max_disparity: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            pair_similarity: PAIR_SIMILARITY,
            max_disparity: MAX_DISPARITY,
        }
    }
}

/// Best match between the two halves of one frame.
#[derive(Debug, Clone, Copy)]
struct PairMatch {
    shift: i32,
    ncc: f32,
}

#[derive(Debug, Clone, Copy)]
struct FramePairs {
    left_right: Option<PairMatch>,
    top_bottom: Option<PairMatch>,
}

#[derive(Debug, Clone, Copy)]
struct FrameShape {
    pole_smoothness: f32,
    letterbox: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct SplitScore {
    votes: f32,
    similarity: f32,
    plausibility: f32,
}

impl SplitScore {
    fn confidence(&self) -> f32 {
        self.votes * self.similarity * (0.5 + 0.5 * self.plausibility)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classifies a batch of samples. Deterministic for a given input.
    pub fn classify(&self, samples: &[FrameSample]) -> DetectionResult {
        let frames: Vec<(Luma, f32)> = samples
            .par_iter()
            .map(|s| (Luma::from_rgba(&s.pixels), s.source_aspect()))
            .collect::<Vec<_>>()
            .into_iter()
            .filter(|(luma, _)| luma.mean_std(luma.full()).1 >= MIN_FRAME_STD)
            .collect();

        let mut result = DetectionResult {
            samples: samples.len(),
            ..Default::default()
        };
        if frames.is_empty() {
            tracing::debug!(samples = samples.len(), "No informative frames");
            return result;
        }

        let aspect = frames.iter().map(|(_, a)| *a).sum::<f32>() / frames.len() as f32;
        let max_shift = self.config.max_disparity;
        let pairs: Vec<FramePairs> = frames
            .par_iter()
            .map(|(luma, _)| frame_pairs(luma, max_shift))
            .collect();

        result.layout = self.detect_layout(&pairs, aspect);
        result.flip = result
            .layout
            .and_then(|layout| self.detect_flip(&pairs, layout.value));

        let eye_layout = result.layout.map(|d| d.value).unwrap_or(Layout::Mono);
        result.format = self.detect_format(&frames, eye_layout, aspect);
        result
    }

    fn detect_layout(&self, pairs: &[FramePairs], aspect: f32) -> Option<Detection<Layout>> {
        let n = pairs.len() as f32;
        let mut lr = SplitScore {
            plausibility: plausibility(aspect, 2.0),
            ..Default::default()
        };
        let mut tb = SplitScore {
            plausibility: plausibility(aspect, 1.0),
            ..Default::default()
        };

        let ncc = |m: Option<PairMatch>| m.map_or(f32::NEG_INFINITY, |m| m.ncc);
        for p in pairs {
            let (a, b) = (ncc(p.left_right), ncc(p.top_bottom));
            lr.similarity += a.max(0.0);
            tb.similarity += b.max(0.0);
            if a >= self.config.pair_similarity && a > b {
                lr.votes += 1.0;
            }
            if b >= self.config.pair_similarity && b > a {
                tb.votes += 1.0;
            }
        }
        for s in [&mut lr, &mut tb] {
            s.votes /= n;
            s.similarity /= n;
        }

        let (lr_conf, tb_conf) = (lr.confidence(), tb.confidence());
        let mono_conf =
            (1.0 - lr_conf.max(tb_conf)) * (1.0 - lr.plausibility.max(tb.plausibility));

        tracing::debug!(
            aspect,
            left_right = lr_conf,
            top_bottom = tb_conf,
            mono = mono_conf,
            "Layout scores"
        );

        let candidates = [
            (Layout::StereoLeftRight, lr_conf),
            (Layout::StereoTopBottom, tb_conf),
            (Layout::Mono, mono_conf),
        ];
        self.pick(candidates)
            .map(|(layout, confidence)| Detection::new(layout, confidence))
    }

    /// Majority sign of the offset between the halves. Correctly ordered
    /// parallel stereo puts near objects further left in the right eye, which
    /// shows up as a non-negative shift.
    fn detect_flip(&self, pairs: &[FramePairs], layout: Layout) -> Option<Detection<bool>> {
        let matches: Vec<PairMatch> = pairs
            .iter()
            .filter_map(|p| match layout {
                Layout::StereoLeftRight => p.left_right,
                Layout::StereoTopBottom => p.top_bottom,
                Layout::Mono => None,
            })
            .filter(|m| m.ncc >= self.config.pair_similarity)
            .collect();
        if matches.is_empty() {
            return None;
        }

        let negative = matches.iter().filter(|m| m.shift < 0).count();
        let positive = matches.iter().filter(|m| m.shift > 0).count();
        let total = matches.len() as f32;

        tracing::debug!(negative, positive, total, "Disparity signs");

        let detection = if negative > positive {
            Detection::new(true, negative as f32 / total)
        } else if positive > negative {
            Detection::new(false, positive as f32 / total)
        } else {
            return None;
        };
        (detection.confidence >= self.config.acceptance_threshold).then_some(detection)
    }

    fn detect_format(
        &self,
        frames: &[(Luma, f32)],
        layout: Layout,
        aspect: f32,
    ) -> Option<Detection<Format>> {
        let shapes: Vec<FrameShape> = frames
            .par_iter()
            .map(|(luma, _)| frame_shape(luma, eye_region(luma, layout)))
            .collect();

        let n = shapes.len() as f32;
        let pole = shapes.iter().map(|s| s.pole_smoothness).sum::<f32>() / n;
        let letterbox = shapes.iter().filter(|s| s.letterbox).count() as f32 / n;

        let eye_aspect = layout.eye_aspect(aspect);
        let p360 = plausibility(eye_aspect, 2.0);
        let p180 = plausibility(eye_aspect, 1.0);
        let support = (0.8 + 0.2 * pole) * (1.0 - letterbox);

        let candidates = [
            (Format::Sphere360, p360 * support),
            (Format::Dome180, p180 * support),
            (Format::Screen, letterbox.max(1.0 - p360.max(p180))),
        ];

        tracing::debug!(
            eye_aspect,
            pole,
            letterbox,
            sphere = candidates[0].1,
            dome = candidates[1].1,
            screen = candidates[2].1,
            "Format scores"
        );

        self.pick(candidates)
            .map(|(format, confidence)| Detection::new(format, confidence))
    }

    /// Highest-scoring candidate, if it clears the threshold. Earlier entries
    /// win ties.
    fn pick<T: Copy>(&self, candidates: [(T, f32); 3]) -> Option<(T, f32)> {
        let mut best = candidates[0];
        for c in &candidates[1..] {
            if c.1 > best.1 {
                best = *c;
            }
        }
        (best.1 >= self.config.acceptance_threshold).then_some(best)
    }
}

/// 1 at the target aspect ratio, falling to 0 at a factor of `ASPECT_TOLERANCE`
/// away from it.
fn plausibility(aspect: f32, target: f32) -> f32 {
    if aspect <= 0.0 {
        return 0.0;
    }
    (1.0 - (aspect / target).ln().abs() / ASPECT_TOLERANCE.ln()).max(0.0)
}

fn frame_pairs(luma: &Luma, max_shift: usize) -> FramePairs {
    let (w, h) = (luma.width(), luma.height());
    let (hw, hh) = (w / 2, h / 2);

    let left_right = luma
        .best_shift(Rect::new(0, 0, hw, h), Rect::new(hw, 0, hw, h), max_shift)
        .map(|(shift, ncc)| PairMatch { shift, ncc });
    let top_bottom = luma
        .best_shift(Rect::new(0, 0, w, hh), Rect::new(0, hh, w, hh), max_shift)
        .map(|(shift, ncc)| PairMatch { shift, ncc });

    FramePairs {
        left_right,
        top_bottom,
    }
}

/// The part of the frame that one eye sees.
fn eye_region(luma: &Luma, layout: Layout) -> Rect {
    let full = luma.full();
    match layout {
        Layout::Mono => full,
        Layout::StereoLeftRight => Rect::new(0, 0, full.w / 2, full.h),
        Layout::StereoTopBottom => Rect::new(0, 0, full.w, full.h / 2),
    }
}

fn frame_shape(luma: &Luma, eye: Rect) -> FrameShape {
    let middle = luma.horizontal_gradient(eye.rows(0.4, 0.6));
    let poles = 0.5
        * (luma.horizontal_gradient(eye.rows(0.0, POLE_BAND))
            + luma.horizontal_gradient(eye.rows(1.0 - POLE_BAND, 1.0)));
    let pole_smoothness = if middle > f32::EPSILON {
        (1.0 - poles / middle).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let is_bar = |band: Rect| {
        let (mean, std) = luma.mean_std(band);
        band.h > 0 && mean < LETTERBOX_MAX_MEAN && std < LETTERBOX_MAX_STD
    };
    let letterbox =
        is_bar(eye.rows(0.0, LETTERBOX_BAND)) && is_bar(eye.rows(1.0 - LETTERBOX_BAND, 1.0));

    FrameShape {
        pole_smoothness,
        letterbox,
    }
}
