//! Error taxonomy shared by every layer of the session manager.
//!
//! All variants are recovered at an operation boundary (acquire, bake, modal
//! start/tick) and turned into a status report. None of them is retried.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by session, cache, mesh and playback operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClothError {
    /// The external solver capability is missing or incompatible.
    #[error("solver backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Target object is missing, of the wrong kind, or not in an editable mode.
    #[error("{0}")]
    InvalidTargetState(String),

    /// Particle count of a freshly (re)built or reconfigured handle differs
    /// from the target mesh vertex count.
    #[error("cloth object '{object}' vertex count {vertices} does not match solver particles {particles}")]
    VertexCountMismatch {
        object: String,
        vertices: usize,
        particles: usize,
    },

    /// Position buffer length disagrees with the mesh at apply time.
    #[error("object '{object}' expected {expected} coordinates, received {actual}")]
    ShapeMismatch {
        object: String,
        expected: usize,
        actual: usize,
    },

    /// Advance or apply failed inside an active run.
    #[error("solver step failed: {0}")]
    RuntimeStepFailure(String),

    /// Settings value outside its accepted range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Discriminant of [`ClothError`], for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    BackendUnavailable,
    InvalidTargetState,
    VertexCountMismatch,
    ShapeMismatch,
    RuntimeStepFailure,
    InvalidConfig,
}

impl ClothError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::InvalidTargetState(_) => ErrorKind::InvalidTargetState,
            Self::VertexCountMismatch { .. } => ErrorKind::VertexCountMismatch,
            Self::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            Self::RuntimeStepFailure(_) => ErrorKind::RuntimeStepFailure,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// Re-classify a failure that happened inside an active run.
    ///
    /// Mesh shape and backend errors raised mid-run abort only that run.
    pub fn into_step_failure(self) -> Self {
        match self {
            Self::RuntimeStepFailure(_) => self,
            other => Self::RuntimeStepFailure(other.to_string()),
        }
    }
}

/// Convenience alias for `Result<T, ClothError>`.
pub type ClothResult<T> = Result<T, ClothError>;
