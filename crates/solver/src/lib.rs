//! Solver layer: the external backend contract, a reference backend, solver
//! sessions and the registry that owns them.
//!
//! # Invariants
//! - At most one live session per (scene, object) key.
//! - A session exclusively owns its backend handle; the old handle is disposed
//!   before a replacement is installed.
//! - After every build or reconfigure, the handle's particle count equals the
//!   target mesh vertex count.

pub mod backend;
pub mod reference;
pub mod registry;
pub mod session;

pub use backend::{BackendProvider, SolverBackend};
pub use reference::{GridBackend, ReferenceProvider};
pub use registry::{RegistryStats, SessionRegistry};
pub use session::{SolverSession, TargetLayout};
