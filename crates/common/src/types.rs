use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a host scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SceneId(pub Uuid);

impl SceneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SceneId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.8}", self.0.to_string())
    }
}

/// Registry key for a solver session: one scene, one target object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub scene: SceneId,
    pub object: String,
}

impl SessionKey {
    pub fn new(scene: SceneId, object: impl Into<String>) -> Self {
        Self {
            scene,
            object: object.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scene, self.object)
    }
}

/// Step-function implementation requested from the backend.
///
/// All variants are numerically equivalent; they differ only in performance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendVariant {
    /// Baseline scalar implementation.
    #[default]
    Native,
    /// Vectorized, task-parallel implementation.
    Tbb,
    /// SIMD-optimized implementation.
    Avx2,
}

impl BackendVariant {
    pub const ALL: [BackendVariant; 3] = [Self::Native, Self::Tbb, Self::Avx2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Tbb => "tbb",
            Self::Avx2 => "avx2",
        }
    }
}

impl fmt::Display for BackendVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "tbb" => Ok(Self::Tbb),
            "avx2" => Ok(Self::Avx2),
            other => Err(format!("unknown backend variant '{other}'")),
        }
    }
}

/// Parameters whose change requires discarding and rebuilding the backend handle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopologyParams {
    pub grid_width: u32,
    pub grid_height: u32,
    pub spacing: f32,
}

impl TopologyParams {
    /// Number of particles a backend built from these parameters holds.
    pub fn particle_count(&self) -> usize {
        self.grid_width as usize * self.grid_height as usize
    }

    /// Rest pose of the particle grid, row-major from the top row.
    ///
    /// The grid lies in the XY plane; odd rows are shifted up by half a
    /// spacing so the sheet does not start perfectly degenerate.
    pub fn rest_positions(&self) -> Vec<Vec3> {
        let (w, h) = (self.grid_width, self.grid_height);
        let mut points = Vec::with_capacity(self.particle_count());
        for y in 0..h {
            let offset = if y % 2 == 1 { self.spacing * 0.5 } else { 0.0 };
            for x in 0..w {
                points.push(Vec3::new(
                    x as f32 * self.spacing,
                    (h - 1 - y) as f32 * self.spacing + offset,
                    0.0,
                ));
            }
        }
        points
    }
}

/// Constraint families the backend may enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintFlags {
    pub distance: bool,
    pub bending: bool,
}

impl Default for ConstraintFlags {
    fn default() -> Self {
        Self {
            distance: true,
            bending: false,
        }
    }
}

/// Parameters that can be pushed into a live backend handle without rebuilding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TunableParams {
    pub time_step: f32,
    pub substeps: u32,
    pub solver_iterations: u32,
    pub velocity_damping: f32,
    pub gravity: Vec3,
    pub constraints: ConstraintFlags,
}

/// Value snapshot of every solver-affecting parameter.
///
/// Two signatures with identical fields are interchangeable. The signature
/// decides between rebuilding a backend handle and reconfiguring it in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfigSignature {
    pub topology: TopologyParams,
    pub tunables: TunableParams,
}

impl ConfigSignature {
    /// Whether switching from `self` to `other` invalidates an existing handle.
    pub fn topology_changed(&self, other: &ConfigSignature) -> bool {
        self.topology != other.topology
    }
}

/// Flat xyz position buffer, length `3 × particle_count`.
///
/// Always an owned copy. Backends recycle their internal buffers every step,
/// so positions are copied both into and out of this type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionBuffer(Vec<f32>);

impl PositionBuffer {
    /// Copy a flat coordinate slice into a new buffer.
    pub fn from_slice(coords: &[f32]) -> Self {
        Self(coords.to_vec())
    }

    /// Flatten a list of points into a new buffer.
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut coords = Vec::with_capacity(points.len() * 3);
        for p in points {
            coords.extend_from_slice(&p.to_array());
        }
        Self(coords)
    }

    /// Number of floats held.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of complete xyz triples held.
    pub fn point_count(&self) -> usize {
        self.0.len() / 3
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Iterate the buffer as points. A trailing partial triple is ignored.
    pub fn points(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.0.chunks_exact(3).map(Vec3::from_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tunables() -> TunableParams {
        TunableParams {
            time_step: 1.0 / 60.0,
            substeps: 4,
            solver_iterations: 10,
            velocity_damping: 0.01,
            gravity: Vec3::new(0.0, 0.0, -9.81),
            constraints: ConstraintFlags::default(),
        }
    }

    fn signature(width: u32) -> ConfigSignature {
        ConfigSignature {
            topology: TopologyParams {
                grid_width: width,
                grid_height: 8,
                spacing: 0.025,
            },
            tunables: tunables(),
        }
    }

    #[test]
    fn scene_id_uniqueness() {
        assert_ne!(SceneId::new(), SceneId::new());
    }

    #[test]
    fn signatures_compare_by_value() {
        assert_eq!(signature(8), signature(8));
        assert_ne!(signature(8), signature(9));
    }

    #[test]
    fn topology_change_detected_only_for_topology_fields() {
        let a = signature(8);
        let mut b = a;
        b.tunables.substeps = 12;
        assert!(!a.topology_changed(&b));
        assert_ne!(a, b);

        let c = signature(9);
        assert!(a.topology_changed(&c));
    }

    #[test]
    fn backend_variant_parses_case_insensitively() {
        assert_eq!("AVX2".parse::<BackendVariant>(), Ok(BackendVariant::Avx2));
        assert_eq!("tbb".parse::<BackendVariant>(), Ok(BackendVariant::Tbb));
        assert!("cuda".parse::<BackendVariant>().is_err());
    }

    #[test]
    fn position_buffer_copies_input() {
        let mut source = vec![1.0, 2.0, 3.0];
        let buffer = PositionBuffer::from_slice(&source);
        source[0] = 99.0;
        assert_eq!(buffer.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn position_buffer_points() {
        let buffer = PositionBuffer::from_points(&[Vec3::X, Vec3::Y]);
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.point_count(), 2);
        let points: Vec<Vec3> = buffer.points().collect();
        assert_eq!(points, vec![Vec3::X, Vec3::Y]);
    }
}
