use std::collections::HashMap;

use glam::{Quat, Vec3};
use modular_bitfield::prelude::*;

use crate::transform::DecomposedTransform;

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationFlags {
    pub looping: bool,
    #[skip]
    __: B31,
}

impl AnimationFlags {
    pub fn from_bits(bits: u32) -> Self {
        Self::from_bytes(bits.to_le_bytes())
    }

    pub fn bits(&self) -> u32 {
        u32::from_le_bytes(self.into_bytes())
    }
}

impl Default for AnimationFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-frame delta for one joint. Missing parts leave that part unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnimationKey {
    pub translation: Option<Vec3>,
    pub scale: Option<Vec3>,
    pub rotation: Option<Quat>,
}

impl AnimationKey {
    pub fn to_decomposed(&self) -> DecomposedTransform {
        DecomposedTransform {
            translation: self.translation.unwrap_or(Vec3::ZERO),
            rotation: self.rotation.unwrap_or(Quat::IDENTITY),
            scale: self.scale.unwrap_or(Vec3::ONE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub flags: AnimationFlags,
    pub frames: usize,
    pub fps: f32,
    /// Keyed by `(frame, joint)`.
    pub keys: HashMap<(usize, usize), AnimationKey>,
}

impl AnimationClip {
    /// Frame index after applying the looping flag. Out of range frames of a
    /// non-looping clip are kept as is and simply have no keys.
    pub fn wrap_frame(&self, frame: usize) -> usize {
        if self.flags.looping() && self.frames > 0 {
            frame % self.frames
        } else {
            frame
        }
    }

    pub fn key(&self, frame: usize, joint: usize) -> Option<&AnimationKey> {
        self.keys.get(&(self.wrap_frame(frame), joint))
    }

    /// Length of the clip in seconds, zero when the rate is not positive.
    pub fn duration(&self) -> f32 {
        if self.fps > 0.0 {
            self.frames as f32 / self.fps
        } else {
            0.0
        }
    }
}
