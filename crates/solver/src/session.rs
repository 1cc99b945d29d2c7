use hinacloth_common::{
    BackendVariant, ClothError, ClothResult, ConfigSignature, PositionBuffer, SessionKey,
    TunableParams,
};

use crate::backend::SolverBackend;

/// The object a session must stay layout-compatible with.
#[derive(Debug, Clone, Copy)]
pub struct TargetLayout<'a> {
    pub object: &'a str,
    pub vertex_count: usize,
}

/// One backend handle bound to a (scene, object) key.
///
/// The session exclusively owns its handle; dropping the session disposes it.
pub struct SolverSession {
    key: SessionKey,
    variant: BackendVariant,
    signature: ConfigSignature,
    handle: Box<dyn SolverBackend>,
    /// Unique per constructed handle; stays fixed across reconfigures.
    build_id: u64,
}

impl SolverSession {
    pub(crate) fn new(
        key: SessionKey,
        variant: BackendVariant,
        signature: ConfigSignature,
        handle: Box<dyn SolverBackend>,
        build_id: u64,
    ) -> Self {
        Self {
            key,
            variant,
            signature,
            handle,
            build_id,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn variant(&self) -> BackendVariant {
        self.variant
    }

    pub fn signature(&self) -> &ConfigSignature {
        &self.signature
    }

    pub fn build_id(&self) -> u64 {
        self.build_id
    }

    pub fn particle_count(&self) -> usize {
        self.handle.particle_count()
    }

    /// Push live-tunable parameters into the handle.
    pub fn apply_config(&mut self, tunables: &TunableParams) -> ClothResult<()> {
        self.handle.configure(tunables)?;
        self.signature.tunables = *tunables;
        Ok(())
    }

    /// Return the handle to its rest pose.
    pub fn reset(&mut self) {
        self.handle.reset();
    }

    /// Advance by `steps` and return a copy of the resulting positions.
    pub fn step(&mut self, steps: u32) -> ClothResult<PositionBuffer> {
        self.handle
            .advance(self.variant, steps)
            .map_err(ClothError::into_step_failure)?;
        Ok(self.positions())
    }

    /// Copy of the current positions.
    pub fn positions(&self) -> PositionBuffer {
        PositionBuffer::from_slice(self.handle.positions())
    }

    /// Verify the particle-count invariant against the target object.
    pub fn ensure_mesh_layout(&self, target: &TargetLayout<'_>) -> ClothResult<()> {
        let particles = self.handle.particle_count();
        if particles != target.vertex_count {
            return Err(ClothError::VertexCountMismatch {
                object: target.object.to_string(),
                vertices: target.vertex_count,
                particles,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for SolverSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverSession")
            .field("key", &self.key)
            .field("variant", &self.variant)
            .field("build_id", &self.build_id)
            .field("particles", &self.handle.particle_count())
            .finish()
    }
}

impl Drop for SolverSession {
    fn drop(&mut self) {
        tracing::debug!(key = %self.key, build_id = self.build_id, "disposing solver session");
    }
}
