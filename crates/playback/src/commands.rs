use hinacloth_cache::FrameCache;
use hinacloth_common::{ClothError, ErrorKind, SceneId};
use hinacloth_scene::Scene;
use serde::Serialize;
use std::fmt;

use crate::context::ClothContext;
use crate::host::HostServices;
use crate::modal::ModalState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Finished,
    Cancelled,
}

/// What a user command did. Commands never fail outright; problems are
/// reported here with the error class that caused them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandReport {
    pub status: CommandStatus,
    pub frame_count: usize,
    pub message: String,
    pub error: Option<ErrorKind>,
}

impl CommandReport {
    fn finished(message: impl Into<String>, frame_count: usize) -> Self {
        Self {
            status: CommandStatus::Finished,
            frame_count,
            message: message.into(),
            error: None,
        }
    }

    fn cancelled(message: impl Into<String>, error: Option<ErrorKind>) -> Self {
        Self {
            status: CommandStatus::Cancelled,
            frame_count: 0,
            message: message.into(),
            error,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == CommandStatus::Finished
    }
}

impl fmt::Display for CommandReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            CommandStatus::Finished => "finished",
            CommandStatus::Cancelled => "cancelled",
        };
        write!(f, "[{status}] {}", self.message)?;
        if let Some(kind) = self.error {
            write!(f, " ({kind:?})")?;
        }
        Ok(())
    }
}

impl ClothContext {
    /// Bake the scene's target object over its frame range.
    ///
    /// On success the timeline moves to the first baked frame and shows it.
    pub fn bake(
        &mut self,
        scene: &mut Scene,
        host: &mut dyn HostServices,
        clear_existing: bool,
    ) -> CommandReport {
        let scene_id = scene.id();
        let settings = scene.settings.clone();
        let Some(object) = settings.target_object.clone() else {
            return self.reject(
                scene_id,
                ClothError::InvalidTargetState("Assign a cloth object before baking.".into()),
            );
        };
        if self.coordinator.modal_state(scene_id) == ModalState::Running {
            return self.reject(
                scene_id,
                ClothError::InvalidTargetState(
                    "Stop the modal simulation before baking.".into(),
                ),
            );
        }

        if clear_existing {
            self.coordinator.clear_cache(scene_id);
            self.status_mut(scene_id).bake_cache_active = false;
        }

        let range = settings.frame_range(scene.frame_start);
        host.progress_begin(0, i32::try_from(range.len()).unwrap_or(i32::MAX));
        let result = self
            .coordinator
            .bake(scene, &settings, settings.backend, &object, &mut |frame, first, _| {
                host.progress_update(frame - first)
            })
            .map(FrameCache::len);
        host.progress_end();

        let frames = match result {
            Ok(frames) => frames,
            Err(err) => {
                tracing::warn!(scene = %scene_id, object = object.as_str(), error = %err, "bake failed");
                let message = match err {
                    ClothError::BackendUnavailable(_) => err.to_string(),
                    _ => format!("Bake failed: {err}"),
                };
                self.status_mut(scene_id).status_message = message.clone();
                return CommandReport::cancelled(message, Some(err.kind()));
            }
        };

        let message = format!(
            "Baked {frames} frames for {object} using backend {}.",
            settings.backend
        );
        let status = self.status_mut(scene_id);
        status.bake_cache_active = true;
        status.active_backend = Some(settings.backend);
        status.active_object = Some(object);
        status.status_message = message.clone();

        scene.set_frame(range.start);
        self.coordinator.sample_frame(scene);
        CommandReport::finished(message, frames)
    }

    /// Drop the scene's baked cache.
    pub fn clear_bake(&mut self, scene: SceneId) -> CommandReport {
        if !self.coordinator.clear_cache(scene) {
            return CommandReport::cancelled("No bake cache registered for this scene.", None);
        }
        let message = "Cleared baked cache.";
        let status = self.status_mut(scene);
        status.bake_cache_active = false;
        status.active_object = None;
        status.status_message = message.into();
        CommandReport::finished(message, 0)
    }

    /// Start interactive stepping of the scene's target object.
    pub fn start_modal(
        &mut self,
        scene: &mut Scene,
        host: &mut dyn HostServices,
        reset_state: bool,
    ) -> CommandReport {
        let scene_id = scene.id();
        if self.coordinator.modal_state(scene_id) == ModalState::Running {
            return CommandReport::cancelled("Modal simulation already running.", None);
        }

        let result = self.coordinator.start_modal(scene, host, reset_state);
        // the cache is cleared before any fallible solver work
        let cache_active = self.coordinator.caches().contains(scene_id);
        self.status_mut(scene_id).bake_cache_active = cache_active;

        match result {
            Ok(started) => {
                let message = format!(
                    "Running modal simulation on {} ({}).",
                    started.object, started.variant
                );
                let status = self.status_mut(scene_id);
                status.active_backend = Some(started.variant);
                status.active_object = Some(started.object);
                status.status_message = message.clone();
                CommandReport::finished(message, 0)
            }
            Err(err) => {
                tracing::warn!(scene = %scene_id, error = %err, "modal start rejected");
                let message = match err {
                    ClothError::InvalidTargetState(_) | ClothError::BackendUnavailable(_) => {
                        err.to_string()
                    }
                    _ => format!("Failed to initialize solver: {err}"),
                };
                self.status_mut(scene_id).status_message = message.clone();
                CommandReport::cancelled(message, Some(err.kind()))
            }
        }
    }

    /// Request the scene's modal run to stop on its next tick.
    pub fn stop_modal(&mut self, scene: SceneId) -> CommandReport {
        if !self.coordinator.stop_modal(scene) {
            return CommandReport::cancelled("Modal solver is not running.", None);
        }
        let message = "Stopping modal solver...";
        self.status_mut(scene).status_message = message.into();
        CommandReport::finished(message, 0)
    }

    fn reject(&mut self, scene: SceneId, err: ClothError) -> CommandReport {
        tracing::warn!(scene = %scene, error = %err, "command rejected");
        let message = err.to_string();
        self.status_mut(scene).status_message = message.clone();
        CommandReport::cancelled(message, Some(err.kind()))
    }
}
