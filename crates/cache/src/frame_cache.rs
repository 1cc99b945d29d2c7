use hinacloth_common::{BackendVariant, ConfigSignature, FrameRange, PositionBuffer};
use serde::Serialize;
use std::collections::BTreeMap;

/// Recorded positions for one baked range of one object.
///
/// Keyed by integer frame. The signature and variant the bake ran with are
/// kept so callers can tell when the cache no longer matches the settings.
#[derive(Debug, Clone, Serialize)]
pub struct FrameCache {
    owner: String,
    variant: BackendVariant,
    signature: ConfigSignature,
    frames: BTreeMap<i32, PositionBuffer>,
}

impl FrameCache {
    pub fn new(owner: impl Into<String>, variant: BackendVariant, signature: ConfigSignature) -> Self {
        Self {
            owner: owner.into(),
            variant,
            signature,
            frames: BTreeMap::new(),
        }
    }

    /// Name of the object the frames were recorded for.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn variant(&self) -> BackendVariant {
        self.variant
    }

    pub fn signature(&self) -> &ConfigSignature {
        &self.signature
    }

    /// Record a copy of `positions` for `frame`, replacing any earlier entry.
    pub fn store(&mut self, frame: i32, positions: &PositionBuffer) {
        self.frames.insert(frame, positions.clone());
    }

    /// Positions recorded for exactly `frame`, if any.
    pub fn sample(&self, frame: i32) -> Option<&PositionBuffer> {
        self.frames.get(&frame)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// First and last recorded frame.
    pub fn frame_range(&self) -> Option<FrameRange> {
        let start = *self.frames.keys().next()?;
        let end = *self.frames.keys().next_back()?;
        Some(FrameRange { start, end })
    }

    /// Recorded frame numbers in ascending order.
    pub fn frames(&self) -> impl Iterator<Item = i32> + '_ {
        self.frames.keys().copied()
    }

    /// Whether the cache was baked with settings other than the given ones.
    pub fn is_stale_for(&self, signature: &ConfigSignature, variant: BackendVariant) -> bool {
        self.variant != variant || &self.signature != signature
    }
}
