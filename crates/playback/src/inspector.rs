use hinacloth_common::{FrameRange, SceneId};
use hinacloth_scene::Scene;
use serde::Serialize;

use crate::context::{ClothContext, SceneStatus};
use crate::modal::ModalState;

/// Read-only queries against a [`ClothContext`] for diagnostics and UI.
pub struct ContextInspector;

impl ContextInspector {
    /// Produce a summary of registry contents.
    pub fn summary(ctx: &ClothContext) -> ContextSummary {
        let coordinator = ctx.coordinator();
        let stats = coordinator.sessions().stats();
        ContextSummary {
            provider: coordinator.sessions().provider_name().to_string(),
            sessions: coordinator.sessions().len(),
            cached_scenes: coordinator.caches().len(),
            observer_active: coordinator.caches().observer_active(),
            modal_runs: coordinator.modal_run_count(),
            builds: stats.builds,
            reconfigures: stats.reconfigures,
        }
    }

    /// Describe one scene: its status, modal run and cache.
    pub fn scene_status(ctx: &ClothContext, scene: &Scene) -> SceneStatusInfo {
        let coordinator = ctx.coordinator();
        let id = scene.id();
        let cache = coordinator.caches().get(id);
        let run = coordinator.modal_run(id);
        SceneStatusInfo {
            scene: id,
            name: scene.name.clone(),
            status: ctx.status(id),
            modal: coordinator.modal_state(id),
            modal_ticks: run.map(|r| r.ticks()).unwrap_or_default(),
            stop_pending: run.is_some_and(|r| !r.is_running()),
            cache_frames: cache.map(|c| c.len()).unwrap_or_default(),
            cache_range: cache.and_then(|c| c.frame_range()),
            stale: cache
                .is_some_and(|c| c.is_stale_for(&scene.settings.signature(), scene.settings.backend)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextSummary {
    pub provider: String,
    pub sessions: usize,
    pub cached_scenes: usize,
    pub observer_active: bool,
    pub modal_runs: usize,
    pub builds: u64,
    pub reconfigures: u64,
}

impl std::fmt::Display for ContextSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Context: provider={} sessions={} cached_scenes={} observer={} modal_runs={} builds={} reconfigures={}",
            self.provider,
            self.sessions,
            self.cached_scenes,
            if self.observer_active { "on" } else { "off" },
            self.modal_runs,
            self.builds,
            self.reconfigures
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneStatusInfo {
    pub scene: SceneId,
    pub name: String,
    pub status: SceneStatus,
    pub modal: ModalState,
    pub modal_ticks: u64,
    pub stop_pending: bool,
    pub cache_frames: usize,
    pub cache_range: Option<FrameRange>,
    /// The cache was baked with settings that differ from the current ones.
    pub stale: bool,
}

impl std::fmt::Display for SceneStatusInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Scene [{}] {} modal={}", self.scene, self.name, self.modal)?;
        match self.cache_range {
            Some(range) => write!(
                f,
                " cache={}..={} ({} frames{})",
                range.start,
                range.end,
                self.cache_frames,
                if self.stale { ", stale" } else { "" }
            )?,
            None => write!(f, " cache=none")?,
        }
        write!(f, " status=\"{}\"", self.status.status_message)
    }
}
