//! Host model: scenes, objects, a timeline, and the adapter that writes
//! solver positions into renderable meshes.
//!
//! The embedding application owns its scenes; the session manager only reads
//! the timeline, looks objects up by name and writes vertex positions.
//!
//! # Invariants
//! - Objects are keyed by name; iteration order is deterministic (BTreeMap).
//! - Every mutation is recorded in the scene event log.
//! - Vertex writes are all-or-nothing: a shape mismatch leaves the mesh untouched.

pub mod mesh;
pub mod scene;

pub use mesh::{MeshAdapter, MeshData};
pub use scene::{ObjectKind, ObjectMode, Scene, SceneError, SceneEvent, SceneObject};
