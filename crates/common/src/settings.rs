//! User-facing cloth settings and the values derived from them.
//!
//! Settings are plain data: load them from YAML, validate them, then derive
//! the immutable [`ConfigSignature`] that governs rebuild-vs-reconfigure.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ClothError, ClothResult};
use crate::types::{BackendVariant, ConfigSignature, ConstraintFlags, TopologyParams, TunableParams};

/// Lower bound on the modal timer interval (120 Hz).
pub const MIN_FRAME_INTERVAL: f64 = 1.0 / 120.0;

/// Largest accepted frame number, in either direction.
pub const MAX_FRAME: i32 = 1_048_574;

/// Errors from loading settings files.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(#[from] ClothError),
}

/// Configurable cloth parameters attached to a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClothSettings {
    /// Name of the mesh object driven by the solver.
    pub target_object: Option<String>,
    pub backend: BackendVariant,
    /// First frame of the bake window.
    pub start_frame: i32,
    /// Last frame of the bake window (inclusive).
    pub end_frame: i32,
    /// Particles along the horizontal grid axis.
    pub grid_width: u32,
    /// Particles along the vertical grid axis.
    pub grid_height: u32,
    /// Rest spacing between particles in meters.
    pub spacing: f32,
    /// Integration time step in seconds.
    pub time_step: f32,
    /// Solver substeps executed per frame or tick.
    pub substeps: u32,
    /// Constraint iterations per substep.
    pub solver_iterations: u32,
    pub velocity_damping: f32,
    pub gravity: Vec3,
    pub enable_distance_constraints: bool,
    pub enable_bending_constraints: bool,
}

impl Default for ClothSettings {
    fn default() -> Self {
        Self {
            target_object: None,
            backend: BackendVariant::Native,
            start_frame: 1,
            end_frame: 240,
            grid_width: 40,
            grid_height: 40,
            spacing: 0.025,
            time_step: 1.0 / 60.0,
            substeps: 4,
            solver_iterations: 10,
            velocity_damping: 0.01,
            gravity: Vec3::new(0.0, 0.0, -9.81),
            enable_distance_constraints: true,
            enable_bending_constraints: false,
        }
    }
}

impl ClothSettings {
    /// Parse and validate settings from a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_yaml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a YAML settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, SettingsError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check every parameter against its accepted range.
    pub fn validate(&self) -> ClothResult<()> {
        if self.grid_width < 2 || self.grid_height < 2 {
            return Err(ClothError::InvalidConfig(format!(
                "grid dimensions must be >= 2, got {}x{}",
                self.grid_width, self.grid_height
            )));
        }
        if !(self.spacing >= 0.001) {
            return Err(ClothError::InvalidConfig(format!(
                "spacing must be >= 0.001, got {}",
                self.spacing
            )));
        }
        if !(self.time_step >= 1.0e-5) {
            return Err(ClothError::InvalidConfig(format!(
                "time_step must be >= 1e-5, got {}",
                self.time_step
            )));
        }
        if self.substeps == 0 {
            return Err(ClothError::InvalidConfig("substeps must be >= 1".into()));
        }
        if self.solver_iterations == 0 {
            return Err(ClothError::InvalidConfig(
                "solver_iterations must be >= 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.velocity_damping) {
            return Err(ClothError::InvalidConfig(format!(
                "velocity_damping must be within [0, 1], got {}",
                self.velocity_damping
            )));
        }
        if !self.gravity.is_finite() {
            return Err(ClothError::InvalidConfig("gravity must be finite".into()));
        }
        for (name, frame) in [("start_frame", self.start_frame), ("end_frame", self.end_frame)] {
            if !(-MAX_FRAME..=MAX_FRAME).contains(&frame) {
                return Err(ClothError::InvalidConfig(format!(
                    "{name} must be within [-{MAX_FRAME}, {MAX_FRAME}], got {frame}"
                )));
            }
        }
        Ok(())
    }

    pub fn topology(&self) -> TopologyParams {
        TopologyParams {
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            spacing: self.spacing,
        }
    }

    pub fn tunables(&self) -> TunableParams {
        TunableParams {
            time_step: self.time_step,
            substeps: self.substeps,
            solver_iterations: self.solver_iterations,
            velocity_damping: self.velocity_damping,
            gravity: self.gravity,
            constraints: ConstraintFlags {
                distance: self.enable_distance_constraints,
                bending: self.enable_bending_constraints,
            },
        }
    }

    /// Snapshot of every solver-affecting parameter.
    pub fn signature(&self) -> ConfigSignature {
        ConfigSignature {
            topology: self.topology(),
            tunables: self.tunables(),
        }
    }

    /// Effective bake window, clamped against the scene's first frame.
    ///
    /// Never empty: an end before the start collapses to the start frame.
    pub fn frame_range(&self, scene_frame_start: i32) -> FrameRange {
        let start = self.start_frame.max(scene_frame_start);
        let end = self.end_frame.max(start);
        FrameRange { start, end }
    }

    /// Modal timer interval: one frame of simulated time, at most 120 Hz.
    pub fn tick_interval(&self) -> Duration {
        let seconds = (self.time_step as f64 * self.substeps as f64).max(MIN_FRAME_INTERVAL);
        Duration::from_secs_f64(seconds)
    }
}

/// Inclusive frame window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: i32,
    pub end: i32,
}

impl FrameRange {
    /// Number of frames in the window (always at least one).
    pub fn len(&self) -> usize {
        (i64::from(self.end) - i64::from(self.start) + 1).max(1) as usize
    }

    pub fn contains(&self, frame: i32) -> bool {
        (self.start..=self.end).contains(&frame)
    }

    /// Frames after the start frame, in order.
    pub fn stepped_frames(&self) -> std::iter::Skip<std::ops::RangeInclusive<i32>> {
        (self.start..=self.end).skip(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let settings = ClothSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.topology().particle_count(), 1600);
        assert_eq!(settings.gravity, Vec3::new(0.0, 0.0, -9.81));
    }

    #[test]
    fn frame_range_clamps_to_scene_start() {
        let settings = ClothSettings {
            start_frame: -5,
            end_frame: 10,
            ..ClothSettings::default()
        };
        let range = settings.frame_range(1);
        assert_eq!(range, FrameRange { start: 1, end: 10 });
        assert_eq!(range.len(), 10);
    }

    #[test]
    fn frame_range_collapses_when_end_before_start() {
        let settings = ClothSettings {
            start_frame: 20,
            end_frame: 5,
            ..ClothSettings::default()
        };
        let range = settings.frame_range(1);
        assert_eq!(range, FrameRange { start: 20, end: 20 });
        assert_eq!(range.len(), 1);
        assert_eq!(range.stepped_frames().count(), 0);
    }

    #[test]
    fn frame_range_at_i32_limits() {
        let top = FrameRange {
            start: i32::MAX,
            end: i32::MAX,
        };
        assert_eq!(top.len(), 1);
        assert_eq!(top.stepped_frames().count(), 0);

        let settings = ClothSettings {
            start_frame: -10,
            end_frame: i32::MAX,
            ..ClothSettings::default()
        };
        let wide = settings.frame_range(i32::MIN);
        assert_eq!(wide.len(), i32::MAX as usize + 11);
        assert_eq!(wide.stepped_frames().next(), Some(-9));
    }

    #[test]
    fn validate_bounds_frame_numbers() {
        let huge = ClothSettings {
            start_frame: i32::MAX,
            end_frame: i32::MAX,
            ..ClothSettings::default()
        };
        assert!(matches!(huge.validate(), Err(ClothError::InvalidConfig(_))));

        let negative = ClothSettings {
            start_frame: -MAX_FRAME - 1,
            ..ClothSettings::default()
        };
        assert!(negative.validate().is_err());

        let edge = ClothSettings {
            start_frame: -MAX_FRAME,
            end_frame: MAX_FRAME,
            ..ClothSettings::default()
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn tick_interval_has_floor() {
        let fast = ClothSettings {
            time_step: 1.0e-4,
            substeps: 1,
            ..ClothSettings::default()
        };
        assert_eq!(fast.tick_interval(), Duration::from_secs_f64(MIN_FRAME_INTERVAL));

        let slow = ClothSettings {
            time_step: 0.02,
            substeps: 4,
            ..ClothSettings::default()
        };
        let interval = slow.tick_interval().as_secs_f64();
        assert!((interval - 0.08).abs() < 1e-6);
    }

    #[test]
    fn tunable_change_keeps_topology() {
        let a = ClothSettings::default();
        let b = ClothSettings {
            velocity_damping: 0.5,
            ..a.clone()
        };
        assert_ne!(a.signature(), b.signature());
        assert!(!a.signature().topology_changed(&b.signature()));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let narrow = ClothSettings {
            grid_width: 1,
            ..ClothSettings::default()
        };
        assert!(matches!(narrow.validate(), Err(ClothError::InvalidConfig(_))));

        let damped = ClothSettings {
            velocity_damping: 1.5,
            ..ClothSettings::default()
        };
        assert!(damped.validate().is_err());

        let no_substeps = ClothSettings {
            substeps: 0,
            ..ClothSettings::default()
        };
        assert!(no_substeps.validate().is_err());
    }

    #[test]
    fn yaml_partial_document_uses_defaults() {
        let settings = ClothSettings::from_yaml_str(
            "target_object: Cloth\nbackend: avx2\ngrid_width: 8\ngrid_height: 6\n",
        )
        .unwrap();
        assert_eq!(settings.target_object.as_deref(), Some("Cloth"));
        assert_eq!(settings.backend, BackendVariant::Avx2);
        assert_eq!(settings.grid_width, 8);
        assert_eq!(settings.substeps, 4);
    }

    #[test]
    fn yaml_invalid_values_rejected() {
        let result = ClothSettings::from_yaml_str("substeps: 0\n");
        assert!(matches!(result, Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn yaml_roundtrip_through_file() {
        let settings = ClothSettings {
            target_object: Some("Flag".into()),
            grid_width: 12,
            ..ClothSettings::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(settings.to_yaml().unwrap().as_bytes()).unwrap();

        let loaded = ClothSettings::load(file.path()).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let result = ClothSettings::load(tmp.path().join("missing.yaml"));
        assert!(matches!(result, Err(SettingsError::Io(_))));
    }
}
