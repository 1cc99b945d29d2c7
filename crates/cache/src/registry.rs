use hinacloth_common::{PositionBuffer, SceneId};
use std::collections::BTreeMap;

use crate::frame_cache::FrameCache;

/// Per-scene frame caches plus the state of the frame-observer hook.
///
/// The hook is installed lazily when a non-empty cache is registered and
/// pruned as soon as the last cache is cleared.
#[derive(Debug, Default)]
pub struct CacheRegistry {
    caches: BTreeMap<SceneId, FrameCache>,
    observer_active: bool,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `cache` for `scene`, returning the cache it replaced.
    ///
    /// Empty caches are not registered.
    pub fn install(&mut self, scene: SceneId, cache: FrameCache) -> Option<FrameCache> {
        if cache.is_empty() {
            tracing::debug!(%scene, "ignoring empty frame cache");
            return None;
        }
        tracing::info!(%scene, object = cache.owner(), frames = cache.len(), "installed frame cache");
        let previous = self.caches.insert(scene, cache);
        self.ensure_observer();
        previous
    }

    /// Drop the cache for `scene`. Returns whether one existed.
    pub fn clear(&mut self, scene: SceneId) -> bool {
        let removed = self.caches.remove(&scene).is_some();
        if removed {
            tracing::debug!(%scene, "cleared frame cache");
        }
        self.prune_observer();
        removed
    }

    /// Drop every cache and the observer. Safe to call any number of times.
    pub fn clear_all(&mut self) -> usize {
        let count = self.caches.len();
        self.caches.clear();
        self.prune_observer();
        count
    }

    pub fn get(&self, scene: SceneId) -> Option<&FrameCache> {
        self.caches.get(&scene)
    }

    /// Recorded positions for `scene` at exactly `frame`.
    pub fn sample(&self, scene: SceneId, frame: i32) -> Option<(&str, &PositionBuffer)> {
        let cache = self.caches.get(&scene)?;
        cache.sample(frame).map(|positions| (cache.owner(), positions))
    }

    pub fn contains(&self, scene: SceneId) -> bool {
        self.caches.contains_key(&scene)
    }

    pub fn scenes(&self) -> impl Iterator<Item = SceneId> + '_ {
        self.caches.keys().copied()
    }

    /// Whether frame-change notifications are currently being observed.
    pub fn observer_active(&self) -> bool {
        self.observer_active
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    fn ensure_observer(&mut self) {
        if !self.observer_active {
            self.observer_active = true;
            tracing::debug!("frame observer installed");
        }
    }

    fn prune_observer(&mut self) {
        if self.observer_active && self.caches.is_empty() {
            self.observer_active = false;
            tracing::debug!("frame observer removed");
        }
    }
}
