//! Single writer of `PlaybackSettings`; everyone else watches snapshots.

use stereo_projection::PlaybackSettings;
use tokio::sync::watch;
use video_recognition::DetectionResult;

pub struct SettingsStore {
    tx: watch::Sender<PlaybackSettings>,
}

impl SettingsStore {
    pub fn new(initial: PlaybackSettings) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> PlaybackSettings {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSettings> {
        self.tx.subscribe()
    }

    /// Publishes `settings` if it differs from the current snapshot.
    pub fn publish(&self, settings: PlaybackSettings) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == settings {
                return false;
            }
            log::info!(
                "Settings: layout={} flip={} format={}",
                settings.layout,
                settings.flip,
                settings.format
            );
            *current = settings;
            true
        })
    }

    pub fn update(&self, change: impl FnOnce(PlaybackSettings) -> PlaybackSettings) -> bool {
        self.publish(change(self.current()))
    }

    /// Applies the accepted fields of a detection result.
    pub fn apply_detection(&self, result: &DetectionResult) -> bool {
        self.update(|s| result.apply_to(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stereo_projection::{Format, Layout};
    use video_recognition::Detection;

    #[test]
    fn subscribers_see_published_snapshots() {
        let store = SettingsStore::new(PlaybackSettings::default());
        let mut rx = store.subscribe();

        assert!(store.update(|s| s.with_format(Format::Dome180)));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().format, Format::Dome180);

        // Same value again is not a change.
        assert!(!store.update(|s| s.with_format(Format::Dome180)));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn detection_updates_only_detected_fields() {
        let store = SettingsStore::new(PlaybackSettings::default().with_flip(true));
        let result = DetectionResult {
            layout: Some(Detection::new(Layout::StereoLeftRight, 0.9)),
            format: Some(Detection::new(Format::Sphere360, 0.8)),
            ..Default::default()
        };

        assert!(store.apply_detection(&result));
        let s = store.current();
        assert_eq!((s.layout, s.format, s.flip), (Layout::StereoLeftRight, Format::Sphere360, false));
        assert!(!store.apply_detection(&DetectionResult::default()));
    }
}
