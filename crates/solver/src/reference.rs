//! In-process reference backend.
//!
//! Builds the same particle grid an external XPBD backend would (row-major,
//! top row pinned) and integrates gravity, velocity damping and distance
//! constraints with plain position-based dynamics. It keeps the session
//! manager runnable without the compiled solver; it makes no claim to match
//! that solver's numerics. Bending constraints are accepted but not solved.

use glam::Vec3;
use hinacloth_common::{
    BackendVariant, ClothError, ClothResult, ConstraintFlags, TopologyParams, TunableParams,
};

use crate::backend::{BackendProvider, SolverBackend};

/// Provider for [`GridBackend`] handles.
///
/// Can be restricted to a subset of step variants to model a solver build
/// that lacks an accelerated implementation.
#[derive(Debug, Clone)]
pub struct ReferenceProvider {
    variants: Vec<BackendVariant>,
}

impl ReferenceProvider {
    pub fn new() -> Self {
        Self {
            variants: BackendVariant::ALL.to_vec(),
        }
    }

    pub fn with_variants(variants: &[BackendVariant]) -> Self {
        Self {
            variants: variants.to_vec(),
        }
    }
}

impl Default for ReferenceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendProvider for ReferenceProvider {
    fn name(&self) -> &str {
        "reference"
    }

    fn resolve(&self, variant: BackendVariant) -> ClothResult<()> {
        if self.variants.contains(&variant) {
            Ok(())
        } else {
            Err(ClothError::BackendUnavailable(format!(
                "reference solver was built without the '{variant}' step implementation"
            )))
        }
    }

    fn construct(&self, topology: &TopologyParams) -> ClothResult<Box<dyn SolverBackend>> {
        Ok(Box::new(GridBackend::new(*topology)?))
    }
}

/// Particle grid integrated with position-based dynamics.
#[derive(Debug, Clone)]
pub struct GridBackend {
    topology: TopologyParams,
    params: TunableParams,
    rest: Vec<f32>,
    inv_mass: Vec<f32>,
    edges: Vec<(usize, usize)>,
    positions: Vec<f32>,
    previous: Vec<f32>,
    velocities: Vec<f32>,
}

impl GridBackend {
    pub fn new(topology: TopologyParams) -> ClothResult<Self> {
        if topology.grid_width < 2 || topology.grid_height < 2 {
            return Err(ClothError::InvalidConfig(
                "grid dimensions must be >= 2".into(),
            ));
        }
        if !(topology.spacing > 0.0) {
            return Err(ClothError::InvalidConfig("grid spacing must be positive".into()));
        }

        let (w, h) = (topology.grid_width as usize, topology.grid_height as usize);
        let rest: Vec<f32> = topology
            .rest_positions()
            .iter()
            .flat_map(|p| p.to_array())
            .collect();
        // top row is pinned
        let inv_mass = (0..w * h).map(|i| if i < w { 0.0 } else { 1.0 }).collect();

        let mut edges = Vec::with_capacity((w - 1) * h + w * (h - 1));
        for y in 0..h {
            for x in 0..w - 1 {
                edges.push((y * w + x, y * w + x + 1));
            }
        }
        for y in 0..h - 1 {
            for x in 0..w {
                edges.push((y * w + x, (y + 1) * w + x));
            }
        }

        let count = rest.len();
        Ok(Self {
            topology,
            params: TunableParams {
                time_step: 1.0 / 60.0,
                substeps: 4,
                solver_iterations: 8,
                velocity_damping: 0.0,
                gravity: Vec3::new(0.0, 0.0, -9.81),
                constraints: ConstraintFlags::default(),
            },
            positions: rest.clone(),
            previous: rest.clone(),
            velocities: vec![0.0; count],
            rest,
            inv_mass,
            edges,
        })
    }

    pub fn topology(&self) -> TopologyParams {
        self.topology
    }

    pub fn params(&self) -> &TunableParams {
        &self.params
    }

    fn step_once(&mut self, h: f32) {
        let params = self.params;
        let keep = 1.0 - params.velocity_damping;

        for (i, &w) in self.inv_mass.iter().enumerate() {
            let at = i * 3..i * 3 + 3;
            self.previous[at.clone()].copy_from_slice(&self.positions[at.clone()]);
            if w == 0.0 {
                continue;
            }
            let v = (Vec3::from_slice(&self.velocities[at.clone()]) + params.gravity * h) * keep;
            let p = Vec3::from_slice(&self.positions[at.clone()]) + v * h;
            v.write_to_slice(&mut self.velocities[at.clone()]);
            p.write_to_slice(&mut self.positions[at]);
        }

        if params.constraints.distance {
            for _ in 0..params.solver_iterations {
                self.project_distance();
            }
        }

        for (i, &w) in self.inv_mass.iter().enumerate() {
            if w == 0.0 {
                continue;
            }
            let at = i * 3..i * 3 + 3;
            let v = (Vec3::from_slice(&self.positions[at.clone()])
                - Vec3::from_slice(&self.previous[at.clone()]))
                / h;
            v.write_to_slice(&mut self.velocities[at]);
        }
    }

    fn project_distance(&mut self) {
        let rest_length = self.topology.spacing;
        for &(i, j) in &self.edges {
            let (wi, wj) = (self.inv_mass[i], self.inv_mass[j]);
            let w = wi + wj;
            if w == 0.0 {
                continue;
            }
            let pi = Vec3::from_slice(&self.positions[i * 3..]);
            let pj = Vec3::from_slice(&self.positions[j * 3..]);
            let delta = pj - pi;
            let length = delta.length();
            if length <= f32::EPSILON {
                continue;
            }
            let correction = delta * ((length - rest_length) / (length * w));
            (pi + correction * wi).write_to_slice(&mut self.positions[i * 3..]);
            (pj - correction * wj).write_to_slice(&mut self.positions[j * 3..]);
        }
    }
}

impl SolverBackend for GridBackend {
    fn configure(&mut self, params: &TunableParams) -> ClothResult<()> {
        if !(params.time_step > 0.0) {
            return Err(ClothError::InvalidConfig("time_step must be positive".into()));
        }
        if params.substeps == 0 {
            return Err(ClothError::InvalidConfig("substeps must be > 0".into()));
        }
        if params.solver_iterations == 0 {
            return Err(ClothError::InvalidConfig(
                "solver_iterations must be > 0".into(),
            ));
        }
        self.params = TunableParams {
            velocity_damping: params.velocity_damping.clamp(0.0, 1.0),
            ..*params
        };
        Ok(())
    }

    fn reset(&mut self) {
        self.positions.copy_from_slice(&self.rest);
        self.previous.copy_from_slice(&self.rest);
        self.velocities.fill(0.0);
    }

    fn advance(&mut self, variant: BackendVariant, steps: u32) -> ClothResult<()> {
        // every variant shares one code path here
        tracing::trace!(%variant, steps, "reference advance");
        let h = self.params.time_step / self.params.substeps as f32;
        for _ in 0..steps {
            self.step_once(h);
        }
        if self.positions.iter().any(|c| !c.is_finite()) {
            return Err(ClothError::RuntimeStepFailure(
                "particle positions diverged to non-finite values".into(),
            ));
        }
        Ok(())
    }

    fn positions(&self) -> &[f32] {
        &self.positions
    }

    fn particle_count(&self) -> usize {
        self.inv_mass.len()
    }
}
