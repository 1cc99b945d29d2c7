//! Playback layer: batch bakes and interactive modal stepping over the session
//! and cache registries, plus the host-facing context, its commands and an
//! inspector.
//!
//! # Invariants
//! - The scene's frame is restored on every bake exit path.
//! - Sampling a cache applies exact frames only.
//! - At most one modal run per scene; a run's timer is released whenever it
//!   leaves `Running`.
//! - Every handler runs to completion on the host loop before the next one.

pub mod bake;
pub mod commands;
pub mod context;
pub mod coordinator;
pub mod host;
pub mod inspector;
pub mod modal;

pub use bake::{ProgressFn, TimelineGuard, record_frames};
pub use commands::{CommandReport, CommandStatus};
pub use context::{ClothContext, READY_MESSAGE, SceneStatus};
pub use coordinator::PlaybackCoordinator;
pub use host::{HostServices, ManualHost, TimerId};
pub use inspector::{ContextInspector, ContextSummary, SceneStatusInfo};
pub use modal::{ModalRun, ModalStarted, ModalState, ModalTransition, TickOutcome};
