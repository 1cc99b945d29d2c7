//! Shared types for the HinaCloth session manager: identities, backend variants,
//! configuration signatures, position buffers, the error taxonomy and settings.
//!
//! # Invariants
//! - `ConfigSignature` is compared by value only.
//! - `PositionBuffer` always owns its data; it never aliases a backend buffer.

pub mod error;
pub mod settings;
pub mod types;

pub use error::{ClothError, ClothResult, ErrorKind};
pub use settings::{ClothSettings, FrameRange, SettingsError, MAX_FRAME, MIN_FRAME_INTERVAL};
pub use types::{
    BackendVariant, ConfigSignature, ConstraintFlags, PositionBuffer, SceneId, SessionKey,
    TopologyParams, TunableParams,
};
