use hinacloth_common::{BackendVariant, ClothError, ClothResult, ConfigSignature, SessionKey};
use std::collections::BTreeMap;

use crate::backend::BackendProvider;
use crate::session::{SolverSession, TargetLayout};

/// Counters for registry activity, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub builds: u64,
    pub reconfigures: u64,
    pub releases: u64,
}

/// Map from (scene, object) to its live solver session.
///
/// Decides between rebuilding a handle and reconfiguring it in place based on
/// the requested backend variant and configuration signature.
pub struct SessionRegistry {
    provider: Box<dyn BackendProvider>,
    sessions: BTreeMap<SessionKey, SolverSession>,
    next_build_id: u64,
    stats: RegistryStats,
}

impl SessionRegistry {
    pub fn new(provider: Box<dyn BackendProvider>) -> Self {
        Self {
            provider,
            sessions: BTreeMap::new(),
            next_build_id: 1,
            stats: RegistryStats::default(),
        }
    }

    /// Get a session for `key`, building or reconfiguring as required.
    ///
    /// Rebuilds when forced, when no session exists, or when the variant or
    /// signature differs; otherwise pushes the live-tunable parameters into
    /// the existing handle. The particle-count invariant is checked on both
    /// paths.
    pub fn acquire(
        &mut self,
        key: &SessionKey,
        signature: &ConfigSignature,
        variant: BackendVariant,
        target: TargetLayout<'_>,
        force_rebuild: bool,
    ) -> ClothResult<&mut SolverSession> {
        let needs_rebuild = force_rebuild
            || self
                .sessions
                .get(key)
                .is_none_or(|s| s.variant() != variant || s.signature() != signature);

        if needs_rebuild {
            self.provider.resolve(variant)?;
            if let Some(old) = self.sessions.remove(key) {
                self.stats.releases += 1;
                drop(old);
            }
            let session = self.build(key, signature, variant, &target)?;
            return Ok(self.sessions.entry(key.clone()).or_insert(session));
        }

        let session = self.sessions.get_mut(key).ok_or_else(|| {
            ClothError::InvalidTargetState(format!("no solver session registered for {key}"))
        })?;
        session.apply_config(&signature.tunables)?;
        session.ensure_mesh_layout(&target)?;
        self.stats.reconfigures += 1;
        tracing::debug!(%key, build_id = session.build_id(), "reconfigured solver session");
        Ok(session)
    }

    fn build(
        &mut self,
        key: &SessionKey,
        signature: &ConfigSignature,
        variant: BackendVariant,
        target: &TargetLayout<'_>,
    ) -> ClothResult<SolverSession> {
        let handle = self.provider.construct(&signature.topology)?;
        let build_id = self.next_build_id;
        self.next_build_id += 1;

        let mut session = SolverSession::new(key.clone(), variant, *signature, handle, build_id);
        session.apply_config(&signature.tunables)?;
        session.reset();
        session.ensure_mesh_layout(target)?;

        self.stats.builds += 1;
        tracing::info!(
            object = target.object,
            backend = %variant,
            provider = self.provider.name(),
            grid_width = signature.topology.grid_width,
            grid_height = signature.topology.grid_height,
            build_id,
            "created solver session"
        );
        Ok(session)
    }

    /// Dispose and remove one session. Returns whether one existed.
    pub fn release(&mut self, key: &SessionKey) -> bool {
        let removed = self.sessions.remove(key).is_some();
        if removed {
            self.stats.releases += 1;
        }
        removed
    }

    /// Dispose every session. Safe to call any number of times.
    pub fn release_all(&mut self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        self.stats.releases += count as u64;
        if count > 0 {
            tracing::debug!(count, "released all solver sessions");
        }
        count
    }

    pub fn get(&self, key: &SessionKey) -> Option<&SolverSession> {
        self.sessions.get(key)
    }

    pub fn get_mut(&mut self, key: &SessionKey) -> Option<&mut SolverSession> {
        self.sessions.get_mut(key)
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SessionKey> {
        self.sessions.keys()
    }

    pub fn stats(&self) -> RegistryStats {
        self.stats
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }
}
