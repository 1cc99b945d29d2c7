use glam::Vec3;
use hinacloth_common::{ClothError, ClothResult, PositionBuffer};
use serde::{Deserialize, Serialize};

use crate::scene::{ObjectKind, SceneObject};

/// Vertex data of a mesh object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    vertices: Vec<Vec3>,
    /// Bumped on every recompute; lets callers detect writes.
    revision: u64,
    bounds_min: Vec3,
    bounds_max: Vec3,
}

impl MeshData {
    pub fn new(vertices: Vec<Vec3>) -> Self {
        let mut mesh = Self {
            vertices,
            revision: 0,
            bounds_min: Vec3::ZERO,
            bounds_max: Vec3::ZERO,
        };
        mesh.recompute_bounds();
        mesh
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.bounds_min, self.bounds_max)
    }

    /// Recompute derived data after vertex writes.
    pub fn update(&mut self) {
        self.recompute_bounds();
        self.revision += 1;
    }

    fn recompute_bounds(&mut self) {
        let mut iter = self.vertices.iter();
        let Some(first) = iter.next() else {
            self.bounds_min = Vec3::ZERO;
            self.bounds_max = Vec3::ZERO;
            return;
        };
        let (min, max) = iter.fold((*first, *first), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        self.bounds_min = min;
        self.bounds_max = max;
    }
}

/// Writes solver output into mesh objects.
///
/// Stateless: every call validates the object kind and buffer shape before
/// touching a single vertex. There are no retries; the caller decides how to
/// react to a failure.
pub struct MeshAdapter;

impl MeshAdapter {
    /// Vertex count of a mesh-like object.
    pub fn vertex_count(object: &SceneObject) -> ClothResult<usize> {
        match (&object.kind, object.mesh()) {
            (ObjectKind::Mesh, Some(mesh)) => Ok(mesh.vertex_count()),
            _ => Err(ClothError::InvalidTargetState(format!(
                "solver target object '{}' must be a mesh",
                object.name
            ))),
        }
    }

    /// Overwrite every vertex of `object` with `positions` and recompute the mesh.
    pub fn apply(object: &mut SceneObject, positions: &PositionBuffer) -> ClothResult<()> {
        let name = object.name.clone();
        let is_mesh = object.kind == ObjectKind::Mesh;
        let Some(mesh) = object.mesh_mut().filter(|_| is_mesh) else {
            return Err(ClothError::ShapeMismatch {
                object: name,
                expected: 0,
                actual: positions.len(),
            });
        };
        let expected = mesh.vertex_count() * 3;
        if positions.len() != expected {
            return Err(ClothError::ShapeMismatch {
                object: name,
                expected,
                actual: positions.len(),
            });
        }
        for (vertex, point) in mesh.vertices.iter_mut().zip(positions.points()) {
            *vertex = point;
        }
        mesh.update();
        tracing::trace!(object = %name, revision = mesh.revision, "mesh positions applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> SceneObject {
        SceneObject::with_mesh(
            "Quad",
            vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)],
        )
    }

    #[test]
    fn vertex_count_of_mesh() {
        assert_eq!(MeshAdapter::vertex_count(&quad()).unwrap(), 4);
    }

    #[test]
    fn vertex_count_rejects_non_mesh() {
        let empty = SceneObject::empty("Empty");
        assert!(matches!(
            MeshAdapter::vertex_count(&empty),
            Err(ClothError::InvalidTargetState(_))
        ));
    }

    #[test]
    fn apply_writes_vertices_and_recomputes() {
        let mut obj = quad();
        let moved: Vec<Vec3> = obj
            .mesh()
            .unwrap()
            .vertices()
            .iter()
            .map(|v| *v + Vec3::Z)
            .collect();
        MeshAdapter::apply(&mut obj, &PositionBuffer::from_points(&moved)).unwrap();

        let mesh = obj.mesh().unwrap();
        assert_eq!(mesh.vertices(), moved.as_slice());
        assert_eq!(mesh.revision(), 1);
        assert_eq!(mesh.bounds(), (Vec3::Z, Vec3::new(1.0, 1.0, 1.0)));
    }

    #[test]
    fn apply_rejects_wrong_length_without_mutation() {
        let mut obj = quad();
        let before = obj.mesh().unwrap().clone();
        let short = PositionBuffer::from_slice(&[0.0; 9]);

        let err = MeshAdapter::apply(&mut obj, &short).unwrap_err();
        assert_eq!(
            err,
            ClothError::ShapeMismatch {
                object: "Quad".into(),
                expected: 12,
                actual: 9,
            }
        );
        assert_eq!(obj.mesh().unwrap(), &before);
    }

    #[test]
    fn apply_rejects_non_mesh_objects() {
        let mut curve = SceneObject::curve("Curve");
        let result = MeshAdapter::apply(&mut curve, &PositionBuffer::from_slice(&[0.0; 3]));
        assert!(matches!(result, Err(ClothError::ShapeMismatch { .. })));
    }
}
