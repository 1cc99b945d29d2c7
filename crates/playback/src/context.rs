use hinacloth_common::{BackendVariant, SceneId};
use hinacloth_scene::Scene;
use hinacloth_solver::BackendProvider;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::coordinator::PlaybackCoordinator;
use crate::host::HostServices;
use crate::modal::TickOutcome;

pub const READY_MESSAGE: &str = "Ready.";

/// Runtime state shown to the user for one scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneStatus {
    pub bake_cache_active: bool,
    pub active_backend: Option<BackendVariant>,
    pub active_object: Option<String>,
    pub status_message: String,
}

impl Default for SceneStatus {
    fn default() -> Self {
        Self {
            bake_cache_active: false,
            active_backend: None,
            active_object: None,
            status_message: READY_MESSAGE.into(),
        }
    }
}

/// Host-facing entry point: owns the coordinator and per-scene status, and
/// routes host lifecycle events into them.
///
/// Created by [`ClothContext::init`]; [`ClothContext::shutdown`] may run any
/// number of times.
pub struct ClothContext {
    pub(crate) coordinator: PlaybackCoordinator,
    pub(crate) status: BTreeMap<SceneId, SceneStatus>,
}

impl ClothContext {
    pub fn init(provider: Box<dyn BackendProvider>) -> Self {
        tracing::info!(provider = provider.name(), "cloth context initialized");
        Self {
            coordinator: PlaybackCoordinator::new(provider),
            status: BTreeMap::new(),
        }
    }

    /// Cancel modal runs, dispose every session and cache, forget all status.
    pub fn shutdown(&mut self, host: &mut dyn HostServices) {
        let runs = self.coordinator.cancel_all(host);
        let (sessions, caches) = self.coordinator.release_all();
        self.status.clear();
        tracing::info!(runs, sessions, caches, "cloth context shut down");
    }

    pub fn coordinator(&self) -> &PlaybackCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut PlaybackCoordinator {
        &mut self.coordinator
    }

    /// Status for `scene`, or the initial status if nothing ran there yet.
    pub fn status(&self, scene: SceneId) -> SceneStatus {
        self.status.get(&scene).cloned().unwrap_or_default()
    }

    pub(crate) fn status_mut(&mut self, scene: SceneId) -> &mut SceneStatus {
        self.status.entry(scene).or_default()
    }

    /// A new file was loaded: every session and cache refers to stale data.
    pub fn on_file_loaded(&mut self) {
        self.coordinator.release_all();
        for status in self.status.values_mut() {
            status.bake_cache_active = false;
            status.active_backend = None;
            status.active_object = None;
        }
    }

    /// The scene's timeline moved; show the cached frame if there is one.
    pub fn on_frame_changed(&mut self, scene: &mut Scene) -> bool {
        self.coordinator.sample_frame(scene)
    }

    /// A modal timer fired for `scene`.
    pub fn on_timer(&mut self, scene: &mut Scene, host: &mut dyn HostServices) -> TickOutcome {
        let outcome = self.coordinator.tick_modal(scene, host);
        if let TickOutcome::Finished(transition) = &outcome {
            self.status_mut(scene.id()).status_message = transition.message.clone();
        }
        outcome
    }

    /// The user interrupted the host (escape). Cancels the scene's modal run.
    pub fn on_interrupt(&mut self, scene: SceneId, host: &mut dyn HostServices) -> bool {
        match self.coordinator.cancel_modal(scene, host) {
            Some(transition) => {
                self.status_mut(scene).status_message = transition.message;
                true
            }
            None => false,
        }
    }
}
