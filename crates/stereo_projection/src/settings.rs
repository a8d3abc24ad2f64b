//! Enumerated playback settings shared by the renderer and the detector.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Arrangement of the eye images inside one video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Layout {
    /// One image, shown to both eyes.
    #[default]
    Mono,
    /// Left half for the left eye, right half for the right eye.
    StereoLeftRight,
    /// Top half for the left eye, bottom half for the right eye.
    StereoTopBottom,
}

impl Layout {
    pub const ALL: [Layout; 3] = [Layout::Mono, Layout::StereoLeftRight, Layout::StereoTopBottom];

    #[inline]
    pub fn is_stereo(self) -> bool {
        !matches!(self, Layout::Mono)
    }

    pub fn name(self) -> &'static str {
        match self {
            Layout::Mono => "mono",
            Layout::StereoLeftRight => "stereoLeftRight",
            Layout::StereoTopBottom => "stereoTopBottom",
        }
    }

    /// Human readable label for menus and logs.
    pub fn label(self) -> &'static str {
        match self {
            Layout::Mono => "Mono",
            Layout::StereoLeftRight => "Left | Right",
            Layout::StereoTopBottom => "Top | Bottom",
        }
    }

    /// Width:height of a single eye image given the full frame's width:height.
    #[inline]
    pub fn eye_aspect(self, frame_aspect: f32) -> f32 {
        match self {
            Layout::Mono => frame_aspect,
            Layout::StereoLeftRight => frame_aspect * 0.5,
            Layout::StereoTopBottom => frame_aspect * 2.0,
        }
    }
}

/// Spatial projection of the (per-eye) image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Format {
    /// Flat rectangle in front of the viewer.
    #[default]
    #[serde(rename = "screen")]
    Screen,
    /// Forward-facing hemisphere.
    #[serde(rename = "180")]
    Dome180,
    /// Full sphere around the viewer.
    #[serde(rename = "360")]
    Sphere360,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Screen, Format::Dome180, Format::Sphere360];

    /// Sphere and dome surround the viewer; the screen does not.
    #[inline]
    pub fn is_immersive(self) -> bool {
        !matches!(self, Format::Screen)
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Screen => "screen",
            Format::Dome180 => "180",
            Format::Sphere360 => "360",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Format::Screen => "Screen",
            Format::Dome180 => "180°",
            Format::Sphere360 => "360°",
        }
    }
}

/// One of the two per-viewer render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    #[inline]
    pub fn other(self) -> Eye {
        match self {
            Eye::Left => Eye::Right,
            Eye::Right => Eye::Left,
        }
    }
}

/// Immutable snapshot of the user-facing playback settings.
///
/// The UI owns mutation and publishes whole new snapshots; the render loop and
/// the detector only ever read them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    pub layout: Layout,
    /// Swap which half maps to which eye. Ignored for `Layout::Mono`.
    pub flip: bool,
    pub format: Format,
    /// Show the debug preview overlay.
    pub debug: bool,
    pub autoplay: bool,
    /// Run detection as soon as a source becomes ready.
    pub auto_detect: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            layout: Layout::Mono,
            flip: false,
            format: Format::Screen,
            debug: true,
            autoplay: true,
            auto_detect: true,
        }
    }
}

impl PlaybackSettings {
    /// `flip` as the renderer applies it (always `false` for mono).
    #[inline]
    pub fn effective_flip(&self) -> bool {
        self.flip && self.layout.is_stereo()
    }

    pub fn with_layout(self, layout: Layout) -> Self {
        Self { layout, ..self }
    }

    pub fn with_flip(self, flip: bool) -> Self {
        Self { flip, ..self }
    }

    pub fn with_format(self, format: Format) -> Self {
        Self { format, ..self }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseSettingError {
    kind: &'static str,
    value: String,
}

impl FromStr for Layout {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mono" => Ok(Layout::Mono),
            "stereoleftright" | "left-right" | "sbs" => Ok(Layout::StereoLeftRight),
            "stereotopbottom" | "top-bottom" | "tb" => Ok(Layout::StereoTopBottom),
            _ => Err(ParseSettingError {
                kind: "layout",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Format {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "screen" | "flat" => Ok(Format::Screen),
            "180" | "dome" => Ok(Format::Dome180),
            "360" | "sphere" => Ok(Format::Sphere360),
            _ => Err(ParseSettingError {
                kind: "format",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Eye::Left => "left",
            Eye::Right => "right",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for layout in Layout::ALL {
            assert_eq!(layout.name().parse::<Layout>().unwrap(), layout);
        }
        for format in Format::ALL {
            assert_eq!(format.name().parse::<Format>().unwrap(), format);
        }
        assert_eq!("SBS".parse::<Layout>().unwrap(), Layout::StereoLeftRight);
        assert!("cube".parse::<Format>().is_err());
    }

    #[test]
    fn serde_uses_player_names() {
        let json = serde_json::to_string(&(Layout::StereoTopBottom, Format::Dome180)).unwrap();
        assert_eq!(json, r#"["stereoTopBottom","180"]"#);
    }

    #[test]
    fn flip_is_ignored_for_mono() {
        let settings = PlaybackSettings::default().with_flip(true);
        assert!(!settings.effective_flip());
        assert!(settings.with_layout(Layout::StereoLeftRight).effective_flip());
    }

    #[test]
    fn eye_aspect_follows_layout() {
        assert_eq!(Layout::StereoLeftRight.eye_aspect(2.0), 1.0);
        assert_eq!(Layout::StereoTopBottom.eye_aspect(1.0), 2.0);
        assert_eq!(Layout::Mono.eye_aspect(1.5), 1.5);
    }
}
