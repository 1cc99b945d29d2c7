//! Interactive stepping driven by a recurring host timer.
//!
//! One run per scene: `Idle -> Running -> {Stopped, Cancelled, Errored} -> Idle`.
//! A run keeps only the key of its session; the session itself stays in the
//! registry, so cancelling and restarting with unchanged settings reuses it.

use hinacloth_common::{BackendVariant, ClothError, ClothResult, SceneId, SessionKey};
use hinacloth_scene::{MeshAdapter, Scene};
use hinacloth_solver::{SessionRegistry, TargetLayout};
use serde::Serialize;
use std::time::Duration;

use crate::coordinator::PlaybackCoordinator;
use crate::host::{HostServices, TimerId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModalState {
    #[default]
    Idle,
    Running,
    Stopped,
    Cancelled,
    Errored,
}

impl std::fmt::Display for ModalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Cancelled => "cancelled",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// A live modal run.
#[derive(Debug, Clone)]
pub struct ModalRun {
    key: SessionKey,
    variant: BackendVariant,
    timer: TimerId,
    interval: Duration,
    running: bool,
    ticks: u64,
}

impl ModalRun {
    pub fn object(&self) -> &str {
        &self.key.object
    }

    pub fn variant(&self) -> BackendVariant {
        self.variant
    }

    pub fn timer(&self) -> TimerId {
        self.timer
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// False once a stop has been requested; the next tick ends the run.
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// Result of a successful modal start.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalStarted {
    pub object: String,
    pub variant: BackendVariant,
    pub interval: Duration,
    pub timer: TimerId,
    pub build_id: u64,
    /// The existing session was reconfigured rather than rebuilt.
    pub reused_session: bool,
}

/// Terminal transition of a run, before it returns to idle.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalTransition {
    pub state: ModalState,
    pub message: String,
    pub error: Option<ClothError>,
}

impl ModalTransition {
    fn new(state: ModalState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
            error: None,
        }
    }

    fn errored(message: String, error: ClothError) -> Self {
        Self {
            state: ModalState::Errored,
            message,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No run for this scene.
    Idle,
    /// The run advanced one frame.
    Stepped { ticks: u64 },
    /// The run ended and its timer was released.
    Finished(ModalTransition),
}

impl PlaybackCoordinator {
    /// Begin a modal run for the scene's target object.
    ///
    /// Clears any baked cache for the scene first. With `reset_state` the
    /// session is rebuilt, returned to rest and written to the mesh before the
    /// timer starts; without it an unchanged session is reused as is.
    pub fn start_modal(
        &mut self,
        scene: &mut Scene,
        host: &mut dyn HostServices,
        reset_state: bool,
    ) -> ClothResult<ModalStarted> {
        let scene_id = scene.id();
        if self.runs.contains_key(&scene_id) {
            return Err(ClothError::InvalidTargetState(
                "Modal simulation already running.".into(),
            ));
        }
        let object = scene.settings.target_object.clone().ok_or_else(|| {
            ClothError::InvalidTargetState("Assign a cloth object before starting the solver.".into())
        })?;
        let target = scene.object(&object).ok_or_else(|| {
            ClothError::InvalidTargetState(format!("object '{object}' not found in scene"))
        })?;
        target.ensure_solver_target()?;
        let vertex_count = MeshAdapter::vertex_count(target)?;

        self.caches.clear(scene_id);

        let key = SessionKey::new(scene_id, object.as_str());
        let variant = scene.settings.backend;
        let builds_before = self.sessions.stats().builds;
        let layout = TargetLayout {
            object: &object,
            vertex_count,
        };
        let session = self
            .sessions
            .acquire(&key, &scene.settings.signature(), variant, layout, reset_state)?;
        let build_id = session.build_id();
        if reset_state {
            session.reset();
            let positions = session.positions();
            scene.apply_positions(&object, &positions)?;
        }
        let reused_session = self.sessions.stats().builds == builds_before;

        let interval = scene.settings.tick_interval();
        let timer = host.add_timer(interval);
        self.runs.insert(
            scene_id,
            ModalRun {
                key,
                variant,
                timer,
                interval,
                running: true,
                ticks: 0,
            },
        );
        tracing::info!(
            scene = %scene_id,
            object = object.as_str(),
            backend = %variant,
            interval_ms = interval.as_secs_f64() * 1000.0,
            reused_session,
            "modal run started"
        );

        Ok(ModalStarted {
            object,
            variant,
            interval,
            timer,
            build_id,
            reused_session,
        })
    }

    /// Handle one timer tick for the scene's run.
    pub fn tick_modal(&mut self, scene: &mut Scene, host: &mut dyn HostServices) -> TickOutcome {
        let scene_id = scene.id();
        let step = match self.runs.get(&scene_id) {
            None => return TickOutcome::Idle,
            Some(run) if !run.running => Err(ModalTransition::new(
                ModalState::Stopped,
                "Modal simulation stopped.",
            )),
            Some(run) => step_run(&mut self.sessions, &run.key, scene),
        };

        match step {
            Ok(()) => {
                host.request_redraw();
                let ticks = match self.runs.get_mut(&scene_id) {
                    Some(run) => {
                        run.ticks += 1;
                        run.ticks
                    }
                    None => 0,
                };
                tracing::trace!(scene = %scene_id, ticks, "modal tick");
                TickOutcome::Stepped { ticks }
            }
            Err(transition) => self.finish_run(scene_id, host, transition),
        }
    }

    /// Cancel the scene's run immediately. Returns the transition if a run
    /// existed.
    pub fn cancel_modal(
        &mut self,
        scene: SceneId,
        host: &mut dyn HostServices,
    ) -> Option<ModalTransition> {
        if !self.runs.contains_key(&scene) {
            return None;
        }
        match self.finish_run(
            scene,
            host,
            ModalTransition::new(ModalState::Cancelled, "Modal simulation cancelled."),
        ) {
            TickOutcome::Finished(transition) => Some(transition),
            _ => None,
        }
    }

    /// Ask the scene's run to stop on its next tick.
    ///
    /// Returns false if there is no run or a stop is already pending.
    pub fn stop_modal(&mut self, scene: SceneId) -> bool {
        match self.runs.get_mut(&scene) {
            Some(run) if run.running => {
                run.running = false;
                tracing::debug!(scene = %scene, "modal stop requested");
                true
            }
            _ => false,
        }
    }

    /// Cancel every run. Used on teardown.
    pub fn cancel_all(&mut self, host: &mut dyn HostServices) -> usize {
        let scenes: Vec<SceneId> = self.runs.keys().copied().collect();
        for scene in &scenes {
            self.cancel_modal(*scene, host);
        }
        scenes.len()
    }

    pub fn modal_state(&self, scene: SceneId) -> ModalState {
        if self.runs.contains_key(&scene) {
            ModalState::Running
        } else {
            ModalState::Idle
        }
    }

    pub fn modal_run(&self, scene: SceneId) -> Option<&ModalRun> {
        self.runs.get(&scene)
    }

    pub fn modal_run_count(&self) -> usize {
        self.runs.len()
    }

    fn finish_run(
        &mut self,
        scene: SceneId,
        host: &mut dyn HostServices,
        transition: ModalTransition,
    ) -> TickOutcome {
        let Some(run) = self.runs.remove(&scene) else {
            return TickOutcome::Idle;
        };
        host.remove_timer(run.timer);
        match &transition.error {
            Some(err) => tracing::warn!(
                scene = %scene,
                object = run.object(),
                ticks = run.ticks,
                error = %err,
                "modal run failed"
            ),
            None => tracing::info!(
                scene = %scene,
                object = run.object(),
                ticks = run.ticks,
                state = %transition.state,
                "modal run ended"
            ),
        }
        TickOutcome::Finished(transition)
    }
}

fn step_run(
    sessions: &mut SessionRegistry,
    key: &SessionKey,
    scene: &mut Scene,
) -> Result<(), ModalTransition> {
    if scene.object(&key.object).is_none() {
        return Err(ModalTransition::new(
            ModalState::Stopped,
            "Target object removed; stopping solver.",
        ));
    }
    let Some(session) = sessions.get_mut(key) else {
        return Err(ModalTransition::new(
            ModalState::Stopped,
            "Solver session was released; stopping solver.",
        ));
    };

    let positions = session.step(scene.settings.substeps).map_err(|err| {
        ModalTransition::errored(format!("Solver error: {err}"), err.into_step_failure())
    })?;
    scene.apply_positions(&key.object, &positions).map_err(|err| {
        ModalTransition::errored(format!("Mesh update failed: {err}"), err.into_step_failure())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::tests::cloth_scene;
    use crate::host::ManualHost;
    use hinacloth_cache::FrameCache;
    use hinacloth_common::{ErrorKind, PositionBuffer, TopologyParams, TunableParams};
    use hinacloth_scene::{ObjectMode, SceneEvent, SceneObject};
    use hinacloth_solver::{BackendProvider, GridBackend, ReferenceProvider, SolverBackend};

    /// Reference grid that fails once its step budget is spent.
    struct FailAfter {
        inner: GridBackend,
        remaining: u32,
    }

    impl SolverBackend for FailAfter {
        fn configure(&mut self, params: &TunableParams) -> ClothResult<()> {
            self.inner.configure(params)
        }

        fn reset(&mut self) {
            self.inner.reset();
        }

        fn advance(&mut self, variant: BackendVariant, steps: u32) -> ClothResult<()> {
            if self.remaining == 0 {
                return Err(ClothError::RuntimeStepFailure("solver diverged".into()));
            }
            self.remaining -= 1;
            self.inner.advance(variant, steps)
        }

        fn positions(&self) -> &[f32] {
            self.inner.positions()
        }

        fn particle_count(&self) -> usize {
            self.inner.particle_count()
        }
    }

    struct FailingProvider(u32);

    impl BackendProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn resolve(&self, _variant: BackendVariant) -> ClothResult<()> {
            Ok(())
        }

        fn construct(&self, topology: &TopologyParams) -> ClothResult<Box<dyn SolverBackend>> {
            Ok(Box::new(FailAfter {
                inner: GridBackend::new(*topology)?,
                remaining: self.0,
            }))
        }
    }

    fn coordinator() -> PlaybackCoordinator {
        PlaybackCoordinator::new(Box::new(ReferenceProvider::new()))
    }

    fn mesh_positions(scene: &Scene) -> PositionBuffer {
        PositionBuffer::from_points(scene.object("Cloth").unwrap().mesh().unwrap().vertices())
    }

    #[test]
    fn start_registers_timer_and_resets_mesh() {
        let mut coord = coordinator();
        let mut host = ManualHost::new();
        let mut scene = cloth_scene(4, 4);
        scene.drain_events();

        let started = coord.start_modal(&mut scene, &mut host, true).unwrap();
        assert_eq!(started.object, "Cloth");
        assert!(!started.reused_session);
        assert_eq!(host.interval(started.timer), Some(scene.settings.tick_interval()));
        assert_eq!(coord.modal_state(scene.id()), ModalState::Running);
        assert!(matches!(
            scene.events().last(),
            Some(SceneEvent::MeshUpdated { .. })
        ));
    }

    #[test]
    fn interval_has_a_floor() {
        let mut coord = coordinator();
        let mut host = ManualHost::new();
        let mut scene = cloth_scene(3, 3);
        scene.settings.time_step = 1.0 / 1000.0;
        scene.settings.substeps = 1;

        let started = coord.start_modal(&mut scene, &mut host, true).unwrap();
        assert_eq!(
            started.interval,
            Duration::from_secs_f64(hinacloth_common::MIN_FRAME_INTERVAL)
        );
    }

    #[test]
    fn second_start_is_rejected() {
        let mut coord = coordinator();
        let mut host = ManualHost::new();
        let mut scene = cloth_scene(3, 3);
        coord.start_modal(&mut scene, &mut host, true).unwrap();

        let err = coord.start_modal(&mut scene, &mut host, true).unwrap_err();
        assert_eq!(err.to_string(), "Modal simulation already running.");
        assert_eq!(host.timer_count(), 1);
    }

    #[test]
    fn start_rejects_non_editable_target() {
        let mut coord = coordinator();
        let mut host = ManualHost::new();
        let mut scene = cloth_scene(3, 3);
        scene.object_mut("Cloth").unwrap().mode = ObjectMode::Sculpt;

        let err = coord.start_modal(&mut scene, &mut host, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTargetState);
        assert_eq!(host.timer_count(), 0);
        assert_eq!(coord.modal_state(scene.id()), ModalState::Idle);
    }

    #[test]
    fn start_clears_bake_cache() {
        let mut coord = coordinator();
        let mut host = ManualHost::new();
        let mut scene = cloth_scene(3, 3);
        let settings = scene.settings.clone();
        coord
            .bake(&mut scene, &settings, BackendVariant::Native, "Cloth", &mut |_, _, _| {})
            .map(FrameCache::len)
            .unwrap();
        assert!(coord.caches().observer_active());

        coord.start_modal(&mut scene, &mut host, false).unwrap();
        assert!(coord.caches().is_empty());
        assert!(!coord.caches().observer_active());
    }

    #[test]
    fn ticks_step_mesh_and_redraw() {
        let mut coord = coordinator();
        let mut host = ManualHost::new();
        let mut scene = cloth_scene(4, 4);
        coord.start_modal(&mut scene, &mut host, true).unwrap();
        let rest = mesh_positions(&scene);

        assert_eq!(coord.tick_modal(&mut scene, &mut host), TickOutcome::Stepped { ticks: 1 });
        assert_eq!(coord.tick_modal(&mut scene, &mut host), TickOutcome::Stepped { ticks: 2 });
        assert_ne!(mesh_positions(&scene), rest);
        assert_eq!(host.redraws(), 2);
        assert_eq!(coord.modal_run(scene.id()).unwrap().ticks(), 2);
    }

    #[test]
    fn tick_without_run_is_idle() {
        let mut coord = coordinator();
        let mut host = ManualHost::new();
        let mut scene = cloth_scene(3, 3);
        assert_eq!(coord.tick_modal(&mut scene, &mut host), TickOutcome::Idle);
        assert_eq!(host.redraws(), 0);
    }

    #[test]
    fn cancel_keeps_session_for_reuse() {
        let mut coord = coordinator();
        let mut host = ManualHost::new();
        let mut scene = cloth_scene(4, 4);
        let first = coord.start_modal(&mut scene, &mut host, true).unwrap();
        coord.tick_modal(&mut scene, &mut host);

        let transition = coord.cancel_modal(scene.id(), &mut host).unwrap();
        assert_eq!(transition.state, ModalState::Cancelled);
        assert_eq!(host.timer_count(), 0);
        assert_eq!(coord.modal_state(scene.id()), ModalState::Idle);
        assert_eq!(coord.sessions().len(), 1);
        assert!(coord.cancel_modal(scene.id(), &mut host).is_none());

        let second = coord.start_modal(&mut scene, &mut host, false).unwrap();
        assert!(second.reused_session);
        assert_eq!(second.build_id, first.build_id);
    }

    #[test]
    fn stop_is_observed_on_next_tick() {
        let mut coord = coordinator();
        let mut host = ManualHost::new();
        let mut scene = cloth_scene(3, 3);
        assert!(!coord.stop_modal(scene.id()));

        coord.start_modal(&mut scene, &mut host, true).unwrap();
        assert!(coord.stop_modal(scene.id()));
        assert!(!coord.stop_modal(scene.id()));
        assert_eq!(coord.modal_state(scene.id()), ModalState::Running);
        assert_eq!(host.timer_count(), 1);

        let outcome = coord.tick_modal(&mut scene, &mut host);
        assert_eq!(
            outcome,
            TickOutcome::Finished(ModalTransition::new(
                ModalState::Stopped,
                "Modal simulation stopped."
            ))
        );
        assert_eq!(host.timer_count(), 0);
        assert_eq!(host.redraws(), 0);
    }

    #[test]
    fn removed_target_stops_run() {
        let mut coord = coordinator();
        let mut host = ManualHost::new();
        let mut scene = cloth_scene(3, 3);
        coord.start_modal(&mut scene, &mut host, true).unwrap();
        scene.remove_object("Cloth");

        let TickOutcome::Finished(transition) = coord.tick_modal(&mut scene, &mut host) else {
            panic!("run should have finished");
        };
        assert_eq!(transition.state, ModalState::Stopped);
        assert_eq!(transition.message, "Target object removed; stopping solver.");
        assert_eq!(host.timer_count(), 0);
    }

    #[test]
    fn released_session_stops_run() {
        let mut coord = coordinator();
        let mut host = ManualHost::new();
        let mut scene = cloth_scene(3, 3);
        coord.start_modal(&mut scene, &mut host, true).unwrap();
        coord.release_all();

        let TickOutcome::Finished(transition) = coord.tick_modal(&mut scene, &mut host) else {
            panic!("run should have finished");
        };
        assert_eq!(transition.state, ModalState::Stopped);
        assert_eq!(host.timer_count(), 0);
    }

    #[test]
    fn step_failure_errors_run() {
        let mut coord = PlaybackCoordinator::new(Box::new(FailingProvider(1)));
        let mut host = ManualHost::new();
        let mut scene = cloth_scene(3, 3);
        coord.start_modal(&mut scene, &mut host, true).unwrap();

        assert!(matches!(
            coord.tick_modal(&mut scene, &mut host),
            TickOutcome::Stepped { ticks: 1 }
        ));
        let TickOutcome::Finished(transition) = coord.tick_modal(&mut scene, &mut host) else {
            panic!("run should have failed");
        };
        assert_eq!(transition.state, ModalState::Errored);
        assert!(transition.message.starts_with("Solver error:"));
        assert_eq!(
            transition.error.map(|e| e.kind()),
            Some(ErrorKind::RuntimeStepFailure)
        );
        assert_eq!(host.timer_count(), 0);
        assert_eq!(coord.modal_state(scene.id()), ModalState::Idle);
    }

    #[test]
    fn mesh_apply_failure_errors_run() {
        let mut coord = coordinator();
        let mut host = ManualHost::new();
        let mut scene = cloth_scene(3, 3);
        coord.start_modal(&mut scene, &mut host, true).unwrap();

        let larger = TopologyParams {
            grid_width: 4,
            grid_height: 4,
            ..scene.settings.topology()
        };
        scene.remove_object("Cloth").unwrap();
        scene.add_object(SceneObject::grid("Cloth", larger)).unwrap();

        let TickOutcome::Finished(transition) = coord.tick_modal(&mut scene, &mut host) else {
            panic!("run should have failed");
        };
        assert_eq!(transition.state, ModalState::Errored);
        assert!(transition.message.starts_with("Mesh update failed:"));
        assert_eq!(
            transition.error.map(|e| e.kind()),
            Some(ErrorKind::RuntimeStepFailure)
        );
        assert_eq!(host.timer_count(), 0);
        assert_eq!(coord.modal_state(scene.id()), ModalState::Idle);
    }

    #[test]
    fn unavailable_backend_blocks_start() {
        let provider = ReferenceProvider::with_variants(&[BackendVariant::Native]);
        let mut coord = PlaybackCoordinator::new(Box::new(provider));
        let mut host = ManualHost::new();
        let mut scene = cloth_scene(3, 3);
        scene.settings.backend = BackendVariant::Avx2;

        let err = coord.start_modal(&mut scene, &mut host, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert_eq!(host.timer_count(), 0);
        assert!(coord.sessions().is_empty());
    }

    #[test]
    fn cancel_all_releases_every_timer() {
        let mut coord = coordinator();
        let mut host = ManualHost::new();
        let mut a = cloth_scene(3, 3);
        let mut b = cloth_scene(3, 3);
        coord.start_modal(&mut a, &mut host, true).unwrap();
        coord.start_modal(&mut b, &mut host, true).unwrap();

        assert_eq!(coord.cancel_all(&mut host), 2);
        assert_eq!(host.timer_count(), 0);
        assert_eq!(coord.cancel_all(&mut host), 0);
    }
}
