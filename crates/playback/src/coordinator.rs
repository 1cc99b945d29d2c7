use hinacloth_cache::{CacheRegistry, FrameCache};
use hinacloth_common::{BackendVariant, ClothError, ClothResult, ClothSettings, SceneId, SessionKey};
use hinacloth_scene::{MeshAdapter, Scene};
use hinacloth_solver::{BackendProvider, SessionRegistry, TargetLayout};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::bake::{ProgressFn, record_frames};
use crate::modal::ModalRun;

/// Drives batch bakes and interactive modal runs over the shared registries.
pub struct PlaybackCoordinator {
    pub(crate) sessions: SessionRegistry,
    pub(crate) caches: CacheRegistry,
    pub(crate) runs: BTreeMap<SceneId, ModalRun>,
}

impl PlaybackCoordinator {
    pub fn new(provider: Box<dyn BackendProvider>) -> Self {
        Self {
            sessions: SessionRegistry::new(provider),
            caches: CacheRegistry::new(),
            runs: BTreeMap::new(),
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn caches(&self) -> &CacheRegistry {
        &self.caches
    }

    /// Bake `object` across the settings' frame range and install the result
    /// as the scene's cache.
    ///
    /// Always rebuilds the session so every bake starts from the rest pose.
    pub fn bake(
        &mut self,
        scene: &mut Scene,
        settings: &ClothSettings,
        variant: BackendVariant,
        object: &str,
        progress: &mut ProgressFn<'_>,
    ) -> ClothResult<&FrameCache> {
        let scene_id = scene.id();
        let _span = tracing::info_span!("bake", scene = %scene_id, object).entered();
        let started = Instant::now();
        settings.validate()?;

        let target = scene.object(object).ok_or_else(|| {
            ClothError::InvalidTargetState(format!("object '{object}' not found in scene"))
        })?;
        target.ensure_solver_target()?;
        let vertex_count = MeshAdapter::vertex_count(target)?;

        let key = SessionKey::new(scene_id, object);
        let signature = settings.signature();
        let range = settings.frame_range(scene.frame_start);
        let layout = TargetLayout {
            object,
            vertex_count,
        };
        let session = self.sessions.acquire(&key, &signature, variant, layout, true)?;
        let cache = record_frames(session, scene, object, range, settings.substeps, progress)?;

        tracing::info!(
            frames = cache.len(),
            start = range.start,
            end = range.end,
            backend = %variant,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "bake complete"
        );
        self.caches.install(scene_id, cache);
        self.caches.get(scene_id).ok_or_else(|| {
            ClothError::InvalidTargetState(format!("bake of '{object}' produced no frames"))
        })
    }

    /// Drop the scene's baked cache. Returns whether one existed.
    pub fn clear_cache(&mut self, scene: SceneId) -> bool {
        self.caches.clear(scene)
    }

    /// Apply the cached frame matching the scene's current frame, if any.
    ///
    /// Frames outside the recorded set and owners that no longer exist are
    /// skipped without touching the scene. Returns whether a frame was applied.
    pub fn sample_frame(&self, scene: &mut Scene) -> bool {
        if !self.caches.observer_active() {
            return false;
        }
        let frame = scene.frame_current();
        let Some((owner, positions)) = self.caches.sample(scene.id(), frame) else {
            return false;
        };
        if scene.object(owner).is_none() {
            tracing::debug!(object = owner, frame, "cached object no longer exists");
            return false;
        }
        match scene.apply_positions(owner, positions) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(frame, error = %err, "failed to apply baked frame");
                false
            }
        }
    }

    /// Dispose every session and cache. Modal runs stay registered and stop
    /// on their next tick when they find their session gone.
    pub fn release_all(&mut self) -> (usize, usize) {
        let sessions = self.sessions.release_all();
        let caches = self.caches.clear_all();
        if sessions + caches > 0 {
            tracing::info!(sessions, caches, "released solver sessions and caches");
        }
        (sessions, caches)
    }
}
