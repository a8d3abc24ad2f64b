//! Per-eye mesh cache and renderer lifecycle bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;
use stereo_projection::{Format, GeometryKey, Layout};

/// Where a renderer stands between setup and teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// No GPU resources held.
    #[default]
    Uninitialized,
    /// Pipelines exist and meshes match the current projection, but nothing
    /// has been drawn with them yet.
    GeometryReady,
    Rendering,
}

impl Lifecycle {
    /// Resources were (re)created for the current settings.
    pub fn geometry_ready(self) -> Self {
        Lifecycle::GeometryReady
    }

    /// A frame was drawn. Only valid once geometry exists.
    pub fn rendered(self) -> Self {
        match self {
            Lifecycle::Uninitialized => Lifecycle::Uninitialized,
            _ => Lifecycle::Rendering,
        }
    }

    /// The projection changed; cached meshes are stale.
    pub fn settings_changed(self) -> Self {
        match self {
            Lifecycle::Uninitialized => Lifecycle::Uninitialized,
            _ => Lifecycle::GeometryReady,
        }
    }

    pub fn torn_down(self) -> Self {
        Lifecycle::Uninitialized
    }

    pub fn is_initialized(self) -> bool {
        self != Lifecycle::Uninitialized
    }
}

type Projection = (Format, Layout, bool);

/// Meshes keyed by `GeometryKey`, valid for a single projection at a time.
///
/// Looking up a key whose projection (format, layout, flip) differs from the
/// cached one drops every entry first, so meshes of two projections never mix.
#[derive(Debug)]
pub struct GeometryCache<T> {
    projection: Option<Projection>,
    entries: HashMap<GeometryKey, Arc<T>>,
}

impl<T> Default for GeometryCache<T> {
    fn default() -> Self {
        Self {
            projection: None,
            entries: HashMap::new(),
        }
    }
}

impl<T> GeometryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry for `key`, building it on a miss.
    pub fn get_or_build<E>(
        &mut self,
        key: GeometryKey,
        build: impl FnOnce(&GeometryKey) -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        self.retain_projection(key.projection());
        if let Some(hit) = self.entries.get(&key) {
            return Ok(hit.clone());
        }

        let built = Arc::new(build(&key)?);
        self.entries.insert(key, built.clone());
        Ok(built)
    }

    /// Drops everything if `projection` is not the cached one. Returns whether
    /// anything was dropped.
    pub fn retain_projection(&mut self, projection: Projection) -> bool {
        if self.projection == Some(projection) {
            return false;
        }
        let dropped = !self.entries.is_empty();
        if dropped {
            log::debug!(
                "Projection changed to {:?}, dropping {} cached meshes",
                projection,
                self.entries.len()
            );
        }
        self.entries.clear();
        self.projection = Some(projection);
        dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.projection = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &GeometryKey) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use stereo_projection::{Eye, GeometryBuilder, MeshResolution, PlaybackSettings};

    fn key(settings: &PlaybackSettings, eye: Eye) -> GeometryKey {
        GeometryKey::new(settings, eye)
    }

    #[test]
    fn hits_reuse_the_same_mesh() {
        let builder = GeometryBuilder::new(MeshResolution::default()).unwrap();
        let settings = PlaybackSettings::default().with_format(Format::Sphere360);
        let builds = Cell::new(0);
        let mut cache = GeometryCache::new();

        let mut get = |eye| {
            cache
                .get_or_build(key(&settings, eye), |k| {
                    builds.set(builds.get() + 1);
                    Ok::<_, ()>(builder.build(*k))
                })
                .unwrap()
        };
        let a = get(Eye::Left);
        let b = get(Eye::Left);
        let c = get(Eye::Right);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(builds.get(), 2);
    }

    #[test]
    fn projection_change_drops_every_mesh() {
        let mut cache = GeometryCache::new();
        let before = PlaybackSettings::default().with_layout(Layout::StereoLeftRight);
        for eye in Eye::BOTH {
            cache.get_or_build(key(&before, eye), |_| Ok::<_, ()>(1)).unwrap();
        }
        assert_eq!(cache.len(), 2);

        let after = before.with_flip(true);
        let mesh = cache.get_or_build(key(&after, Eye::Left), |_| Ok::<_, ()>(2)).unwrap();

        assert_eq!(*mesh, 2);
        assert_eq!(cache.len(), 1);
        assert!(!cache.contains(&key(&before, Eye::Right)));
    }

    /// Looks up both eyes of `settings`, building real geometry on a miss.
    fn lookup(
        cache: &mut GeometryCache<stereo_projection::Geometry>,
        builder: &GeometryBuilder,
        settings: &PlaybackSettings,
    ) -> Vec<Arc<stereo_projection::Geometry>> {
        Eye::BOTH
            .iter()
            .map(|&eye| {
                cache
                    .get_or_build(key(settings, eye), |k| Ok::<_, ()>(builder.build(*k)))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn format_change_rebuilds_for_the_new_projection() {
        let builder = GeometryBuilder::new(MeshResolution::default()).unwrap();
        let mut cache = GeometryCache::new();
        let screen = PlaybackSettings::default().with_layout(Layout::StereoLeftRight);
        let before = lookup(&mut cache, &builder, &screen);
        assert_eq!(before[0].vertices.len(), 4);

        let sphere = screen.with_format(Format::Sphere360);
        let after = lookup(&mut cache, &builder, &sphere);

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&key(&screen, Eye::Left)));
        assert_eq!(after[0].key.format, Format::Sphere360);
        assert!(after[0].vertices.len() > 4);
        assert_eq!(*after[0], builder.build(key(&sphere, Eye::Left)));
    }

    #[test]
    fn layout_change_rebuilds_with_the_new_eye_halves() {
        let builder = GeometryBuilder::new(MeshResolution::default()).unwrap();
        let mut cache = GeometryCache::new();
        let side_by_side = PlaybackSettings::default()
            .with_format(Format::Dome180)
            .with_layout(Layout::StereoLeftRight);
        let before = lookup(&mut cache, &builder, &side_by_side);

        let stacked = side_by_side.with_layout(Layout::StereoTopBottom);
        let after = lookup(&mut cache, &builder, &stacked);

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&key(&side_by_side, Eye::Right)));
        for (old, new) in before.iter().zip(&after) {
            assert!(!Arc::ptr_eq(old, new));
            assert_eq!(new.key.layout, Layout::StereoTopBottom);
            assert_ne!(old.uv_rect, new.uv_rect);
        }
    }

    #[test]
    fn failed_build_caches_nothing() {
        let mut cache = GeometryCache::<u8>::new();
        let k = key(&PlaybackSettings::default(), Eye::Left);
        assert_eq!(cache.get_or_build(k, |_| Err("boom")), Err("boom"));
        assert!(cache.is_empty());
        assert_eq!(*cache.get_or_build(k, |_| Ok::<_, &str>(7)).unwrap(), 7);
    }

    #[test]
    fn lifecycle_transitions() {
        let state = Lifecycle::default();
        assert_eq!(state, Lifecycle::Uninitialized);
        assert_eq!(state.rendered(), Lifecycle::Uninitialized);
        assert_eq!(state.settings_changed(), Lifecycle::Uninitialized);

        let state = state.geometry_ready().rendered();
        assert_eq!(state, Lifecycle::Rendering);
        assert_eq!(state.settings_changed(), Lifecycle::GeometryReady);
        assert_eq!(state.torn_down(), Lifecycle::Uninitialized);
        assert!(state.is_initialized());
    }
}
