use glam::Vec3;
use hinacloth_common::{ClothError, ClothResult, ClothSettings, PositionBuffer, SceneId, TopologyParams};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::mesh::{MeshAdapter, MeshData};

/// What an object is. Only meshes can be driven by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Mesh,
    Curve,
    Empty,
}

/// Interaction mode of an object. Only `Object` mode is editable by the solver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectMode {
    #[default]
    Object,
    Edit,
    Sculpt,
}

/// A named object in a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    pub mode: ObjectMode,
    mesh: Option<MeshData>,
}

impl SceneObject {
    /// A mesh object with the given vertices.
    pub fn with_mesh(name: impl Into<String>, vertices: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            kind: ObjectKind::Mesh,
            mode: ObjectMode::Object,
            mesh: Some(MeshData::new(vertices)),
        }
    }

    /// A planar grid mesh laid out like a solver rest pose for `topology`.
    pub fn grid(name: impl Into<String>, topology: TopologyParams) -> Self {
        Self::with_mesh(name, topology.rest_positions())
    }

    pub fn curve(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ObjectKind::Curve,
            mode: ObjectMode::Object,
            mesh: None,
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ObjectKind::Empty,
            mode: ObjectMode::Object,
            mesh: None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut MeshData> {
        self.mesh.as_mut()
    }

    pub fn mesh(&self) -> Option<&MeshData> {
        self.mesh.as_ref()
    }

    /// Check that the solver may drive this object.
    pub fn ensure_solver_target(&self) -> ClothResult<()> {
        if self.kind != ObjectKind::Mesh {
            return Err(ClothError::InvalidTargetState(
                "Target object must be a mesh.".into(),
            ));
        }
        if self.mode != ObjectMode::Object {
            return Err(ClothError::InvalidTargetState(
                "Switch the object back to Object Mode first.".into(),
            ));
        }
        Ok(())
    }
}

/// An event record produced by every mutation to a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneEvent {
    ObjectAdded { name: String },
    ObjectRemoved { name: String },
    FrameChanged { from: i32, to: i32 },
    MeshUpdated { name: String, revision: u64 },
}

/// Errors from scene editing.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("object '{0}' already exists")]
    DuplicateObject(String),
}

/// A host scene: named objects, a timeline and the cloth settings bound to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    id: SceneId,
    pub name: String,
    objects: BTreeMap<String, SceneObject>,
    frame_current: i32,
    /// Lower bound of the scene timeline.
    pub frame_start: i32,
    /// Upper bound of the scene timeline.
    pub frame_end: i32,
    pub settings: ClothSettings,
    #[serde(skip)]
    events: Vec<SceneEvent>,
}

impl Scene {
    /// Create an empty scene at frame 1 with a 1..=250 timeline.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SceneId::new(),
            name: name.into(),
            objects: BTreeMap::new(),
            frame_current: 1,
            frame_start: 1,
            frame_end: 250,
            settings: ClothSettings::default(),
            events: Vec::new(),
        }
    }

    pub fn with_settings(name: impl Into<String>, settings: ClothSettings) -> Self {
        Self {
            settings,
            ..Self::new(name)
        }
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn frame_current(&self) -> i32 {
        self.frame_current
    }

    /// Move the timeline. Records an event only when the frame actually changes.
    pub fn set_frame(&mut self, frame: i32) {
        if frame == self.frame_current {
            return;
        }
        let from = self.frame_current;
        self.frame_current = frame;
        self.events.push(SceneEvent::FrameChanged { from, to: frame });
    }

    pub fn add_object(&mut self, object: SceneObject) -> Result<(), SceneError> {
        if self.objects.contains_key(&object.name) {
            return Err(SceneError::DuplicateObject(object.name));
        }
        let name = object.name.clone();
        self.objects.insert(name.clone(), object);
        self.events.push(SceneEvent::ObjectAdded { name });
        Ok(())
    }

    pub fn remove_object(&mut self, name: &str) -> Option<SceneObject> {
        let removed = self.objects.remove(name);
        if removed.is_some() {
            self.events.push(SceneEvent::ObjectRemoved { name: name.into() });
        }
        removed
    }

    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.get(name)
    }

    pub fn object_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.objects.get_mut(name)
    }

    pub fn objects(&self) -> &BTreeMap<String, SceneObject> {
        &self.objects
    }

    /// The object named by the cloth settings, if assigned and present.
    pub fn target_object(&self) -> Option<&SceneObject> {
        self.settings
            .target_object
            .as_deref()
            .and_then(|name| self.objects.get(name))
    }

    /// Write positions into the named object through the mesh adapter.
    pub fn apply_positions(&mut self, name: &str, positions: &PositionBuffer) -> ClothResult<()> {
        let object = self.objects.get_mut(name).ok_or_else(|| {
            ClothError::InvalidTargetState(format!("object '{name}' no longer exists"))
        })?;
        MeshAdapter::apply(object, positions)?;
        let revision = object.mesh().map(MeshData::revision).unwrap_or_default();
        self.events.push(SceneEvent::MeshUpdated {
            name: name.into(),
            revision,
        });
        Ok(())
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[SceneEvent] {
        &self.events
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }
}
