use hinacloth_common::{BackendVariant, ClothResult, TopologyParams, TunableParams};

/// A stateful simulation handle provided by an external solver.
///
/// Built from topology parameters; everything else is pushed in through
/// [`SolverBackend::configure`]. The numerics behind `advance` are opaque.
pub trait SolverBackend {
    /// Push live-tunable parameters into the handle.
    fn configure(&mut self, params: &TunableParams) -> ClothResult<()>;

    /// Return every particle to its rest pose with zero velocity.
    fn reset(&mut self);

    /// Run `steps` integration steps with the requested step implementation.
    fn advance(&mut self, variant: BackendVariant, steps: u32) -> ClothResult<()>;

    /// Current positions as flat xyz, length `3 × particle_count()`.
    ///
    /// The buffer is reused by the next `advance`; callers must copy it.
    fn positions(&self) -> &[f32];

    fn particle_count(&self) -> usize;
}

/// Resolves the external solver capability and constructs handles.
pub trait BackendProvider {
    /// Human-readable provider name for logs.
    fn name(&self) -> &str;

    /// Check that the capability for `variant` is loadable.
    ///
    /// Returns `BackendUnavailable` otherwise. Called before any handle is
    /// constructed and never retried.
    fn resolve(&self, variant: BackendVariant) -> ClothResult<()>;

    /// Build a new handle for the given grid topology.
    fn construct(&self, topology: &TopologyParams) -> ClothResult<Box<dyn SolverBackend>>;
}
