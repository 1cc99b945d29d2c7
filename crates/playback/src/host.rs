use std::collections::BTreeMap;
use std::time::Duration;

/// Handle for a recurring timer registered with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Services the host application provides to playback operations.
///
/// Everything runs on the host's main loop; none of these calls may block.
pub trait HostServices {
    /// Register a recurring timer firing every `interval`.
    fn add_timer(&mut self, interval: Duration) -> TimerId;

    fn remove_timer(&mut self, timer: TimerId);

    /// Ask the host to redraw viewports showing the scene.
    fn request_redraw(&mut self);

    fn progress_begin(&mut self, min: i32, max: i32);

    fn progress_update(&mut self, value: i32);

    fn progress_end(&mut self);
}

/// Host that records every request instead of acting on it.
///
/// Used by the CLI and tests to drive timers by hand.
#[derive(Debug, Default)]
pub struct ManualHost {
    next_timer: u64,
    timers: BTreeMap<TimerId, Duration>,
    redraws: usize,
    progress_window: Option<(i32, i32)>,
    progress: Vec<i32>,
    progress_sessions: usize,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently registered timers and their intervals.
    pub fn timers(&self) -> impl Iterator<Item = (TimerId, Duration)> + '_ {
        self.timers.iter().map(|(id, interval)| (*id, *interval))
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn interval(&self, timer: TimerId) -> Option<Duration> {
        self.timers.get(&timer).copied()
    }

    pub fn redraws(&self) -> usize {
        self.redraws
    }

    /// Values reported since the last `progress_begin`.
    pub fn progress(&self) -> &[i32] {
        &self.progress
    }

    /// Whether a progress indicator is currently open.
    pub fn progress_open(&self) -> bool {
        self.progress_window.is_some()
    }

    /// Number of completed begin/end progress pairs.
    pub fn progress_sessions(&self) -> usize {
        self.progress_sessions
    }
}

impl HostServices for ManualHost {
    fn add_timer(&mut self, interval: Duration) -> TimerId {
        self.next_timer += 1;
        let id = TimerId(self.next_timer);
        self.timers.insert(id, interval);
        id
    }

    fn remove_timer(&mut self, timer: TimerId) {
        self.timers.remove(&timer);
    }

    fn request_redraw(&mut self) {
        self.redraws += 1;
    }

    fn progress_begin(&mut self, min: i32, max: i32) {
        self.progress_window = Some((min, max));
        self.progress.clear();
    }

    fn progress_update(&mut self, value: i32) {
        self.progress.push(value);
    }

    fn progress_end(&mut self) {
        if self.progress_window.take().is_some() {
            self.progress_sessions += 1;
        }
    }
}
