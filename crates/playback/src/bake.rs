use hinacloth_cache::FrameCache;
use hinacloth_common::{ClothResult, FrameRange};
use hinacloth_scene::Scene;
use hinacloth_solver::SolverSession;
use std::ops::{Deref, DerefMut};

/// Callback invoked as `(frame, start, end)` after each recorded frame.
pub type ProgressFn<'a> = dyn FnMut(i32, i32, i32) + 'a;

/// Scoped timeline borrow: the frame current at creation is restored on drop.
pub struct TimelineGuard<'a> {
    scene: &'a mut Scene,
    saved: i32,
}

impl<'a> TimelineGuard<'a> {
    pub fn new(scene: &'a mut Scene) -> Self {
        let saved = scene.frame_current();
        Self { scene, saved }
    }

    pub fn saved_frame(&self) -> i32 {
        self.saved
    }
}

impl Deref for TimelineGuard<'_> {
    type Target = Scene;

    fn deref(&self) -> &Scene {
        self.scene
    }
}

impl DerefMut for TimelineGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scene {
        self.scene
    }
}

impl Drop for TimelineGuard<'_> {
    fn drop(&mut self) {
        self.scene.set_frame(self.saved);
    }
}

/// Step `session` across `range`, recording every frame into a new cache.
///
/// The start frame holds the session's current positions without any
/// integration; each later frame is the result of `substeps` steps. The start
/// positions are also written to `object` so the mesh matches the first cached
/// frame. The scene's frame is restored whether or not recording succeeds.
pub fn record_frames(
    session: &mut SolverSession,
    scene: &mut Scene,
    object: &str,
    range: FrameRange,
    substeps: u32,
    progress: &mut ProgressFn<'_>,
) -> ClothResult<FrameCache> {
    let mut timeline = TimelineGuard::new(scene);
    let mut cache = FrameCache::new(object, session.variant(), *session.signature());

    timeline.set_frame(range.start);
    let start_positions = session.positions();
    cache.store(range.start, &start_positions);
    timeline.apply_positions(object, &start_positions)?;
    progress(range.start, range.start, range.end);

    for frame in range.stepped_frames() {
        let positions = session.step(substeps)?;
        cache.store(frame, &positions);
        progress(frame, range.start, range.end);
    }

    tracing::trace!(
        frames = cache.len(),
        restore = timeline.saved_frame(),
        "recorded frames"
    );
    Ok(cache)
}
