//! Baked frame caches: recorded position buffers per scene, and the registry
//! that owns them together with the frame-observer hook state.
//!
//! # Invariants
//! - At most one cache per scene.
//! - A cache holds only frames that were actually stepped; sampling never
//!   interpolates.
//! - The frame observer is active exactly while at least one cache is
//!   registered.

pub mod frame_cache;
pub mod registry;

pub use frame_cache::FrameCache;
pub use registry::CacheRegistry;
