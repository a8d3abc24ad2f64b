//! Debug HUD drawn over the desktop preview.

use crate::detect::{describe, DetectionStatus};
use egui::{Color32, ComboBox, RichText};
use std::time::Duration;
use stereo_projection::{Format, Layout, PlaybackSettings};

/// Read-only state shown by the HUD.
pub struct HudInfo<'a> {
    pub position: Duration,
    pub duration: Duration,
    pub playing: bool,
    pub ticks: u64,
    pub fps: f32,
    pub detection: Option<&'a DetectionStatus>,
    pub error: Option<String>,
}

/// What the user asked for this frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HudActions {
    pub toggle_play: bool,
    pub detect: bool,
    pub restart: bool,
}

fn clock(d: Duration) -> String {
    let s = d.as_secs();
    format!("{:02}:{:02}.{:01}", s / 60, s % 60, d.subsec_millis() / 100)
}

/// Draws the HUD. Edits land in `settings`; the caller publishes them.
pub fn draw_hud(
    ctx: &egui::Context,
    settings: &mut PlaybackSettings,
    info: &HudInfo<'_>,
) -> HudActions {
    let mut actions = HudActions::default();

    egui::Window::new("VR Player")
        .default_pos([12.0, 12.0])
        .resizable(false)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                let label = if info.playing { "Pause" } else { "Play" };
                actions.toggle_play = ui.button(label).clicked();
                ui.monospace(format!("{} / {}", clock(info.position), clock(info.duration)));
            });
            ui.separator();

            ComboBox::from_label("Layout")
                .selected_text(settings.layout.label())
                .show_ui(ui, |ui| {
                    for layout in Layout::ALL {
                        ui.selectable_value(&mut settings.layout, layout, layout.label());
                    }
                });
            ComboBox::from_label("Format")
                .selected_text(settings.format.label())
                .show_ui(ui, |ui| {
                    for format in Format::ALL {
                        ui.selectable_value(&mut settings.format, format, format.label());
                    }
                });
            ui.add_enabled(
                settings.layout.is_stereo(),
                egui::Checkbox::new(&mut settings.flip, "Swap eyes"),
            );
            ui.checkbox(&mut settings.auto_detect, "Detect on load");

            if let Some(status) = info.detection {
                ui.separator();
                ui.horizontal(|ui| {
                    let button = egui::Button::new("Detect layout");
                    actions.detect = ui.add_enabled(!status.is_detecting(), button).clicked();
                    if status.is_detecting() {
                        ui.spinner();
                    }
                });
                match status {
                    DetectionStatus::Idle | DetectionStatus::Detecting { .. } => {}
                    DetectionStatus::Done(result) => {
                        ui.label(describe(result, settings));
                    }
                    DetectionStatus::Failed(e) => {
                        ui.colored_label(Color32::LIGHT_RED, e);
                    }
                }
            }

            ui.separator();
            ui.label(
                RichText::new(format!("{:.0} fps | {} frames", info.fps, info.ticks))
                    .small()
                    .color(Color32::GRAY),
            );
            if let Some(error) = &info.error {
                ui.colored_label(Color32::LIGHT_RED, format!("Renderer stopped: {error}"));
                actions.restart = ui.button("Restart renderer").clicked();
            }
        });

    actions
}
