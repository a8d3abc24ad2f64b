//! Mapping from (layout, flip, eye) to the region of the video frame an eye sees.

use crate::settings::{Eye, Layout};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in texture space, `v = 0` at the top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl UvRect {
    pub const FULL: UvRect = UvRect {
        u0: 0.0,
        v0: 0.0,
        u1: 1.0,
        v1: 1.0,
    };

    #[inline]
    pub fn width(&self) -> f32 {
        self.u1 - self.u0
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.v1 - self.v0
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Maps normalized coordinates inside the rectangle to texture space.
    #[inline]
    pub fn lerp(&self, s: f32, t: f32) -> [f32; 2] {
        [self.u0 + s * self.width(), self.v0 + t * self.height()]
    }

    /// Area shared with `other` (zero when they only touch along an edge).
    pub fn overlap_area(&self, other: &UvRect) -> f32 {
        let w = (self.u1.min(other.u1) - self.u0.max(other.u0)).max(0.0);
        let h = (self.v1.min(other.v1) - self.v0.max(other.v0)).max(0.0);
        w * h
    }
}

/// Region of the frame shown to `eye`.
///
/// Mono gives every eye the full frame. Stereo layouts hand the left eye the
/// left (or top) half unless `flip` is set, in which case the halves swap.
pub fn eye_uv_rect(layout: Layout, flip: bool, eye: Eye) -> UvRect {
    // `first` is the left or top half.
    let first = match (eye, flip) {
        (Eye::Left, false) | (Eye::Right, true) => true,
        (Eye::Right, false) | (Eye::Left, true) => false,
    };

    match layout {
        Layout::Mono => UvRect::FULL,
        Layout::StereoLeftRight => {
            let u0 = if first { 0.0 } else { 0.5 };
            UvRect {
                u0,
                v0: 0.0,
                u1: u0 + 0.5,
                v1: 1.0,
            }
        }
        Layout::StereoTopBottom => {
            let v0 = if first { 0.0 } else { 0.5 };
            UvRect {
                u0: 0.0,
                v0,
                u1: 1.0,
                v1: v0 + 0.5,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_covers_full_frame_for_every_eye() {
        for eye in Eye::BOTH {
            for flip in [false, true] {
                assert_eq!(eye_uv_rect(Layout::Mono, flip, eye), UvRect::FULL);
            }
        }
    }

    #[test]
    fn stereo_eyes_partition_the_frame() {
        for layout in [Layout::StereoLeftRight, Layout::StereoTopBottom] {
            for flip in [false, true] {
                let l = eye_uv_rect(layout, flip, Eye::Left);
                let r = eye_uv_rect(layout, flip, Eye::Right);
                assert_eq!(l.overlap_area(&r), 0.0, "{layout:?} flip={flip}");
                assert_eq!(l.area() + r.area(), 1.0);
                // Union is the full frame: the bounding box of both halves is [0,1]².
                assert_eq!(l.u0.min(r.u0), 0.0);
                assert_eq!(l.v0.min(r.v0), 0.0);
                assert_eq!(l.u1.max(r.u1), 1.0);
                assert_eq!(l.v1.max(r.v1), 1.0);
            }
        }
    }

    #[test]
    fn flip_swaps_eyes_and_is_an_involution() {
        for layout in Layout::ALL {
            for eye in Eye::BOTH {
                let plain = eye_uv_rect(layout, false, eye);
                let flipped = eye_uv_rect(layout, true, eye);
                assert_eq!(flipped, eye_uv_rect(layout, false, eye.other()));
                // Flipping the already flipped assignment restores the original.
                assert_eq!(eye_uv_rect(layout, true, eye.other()), plain);
            }
        }
    }

    #[test]
    fn left_eye_takes_left_and_top_halves() {
        assert_eq!(eye_uv_rect(Layout::StereoLeftRight, false, Eye::Left).u1, 0.5);
        assert_eq!(eye_uv_rect(Layout::StereoTopBottom, false, Eye::Left).v1, 0.5);
        assert_eq!(eye_uv_rect(Layout::StereoTopBottom, true, Eye::Left).v0, 0.5);
    }
}
