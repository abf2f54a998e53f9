use std::hash::{Hash, Hasher};

use glam::Mat4;

use crate::{
    animation::AnimationClip,
    joint::Joint,
    transform::{DecomposedTransform, Transform},
};

/// Requested animation state. Composition is an immutable tree.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PoseState {
    #[default]
    Identity,
    ExplicitFrame(usize),
    Interpolated {
        frame: usize,
        next_frame: usize,
        progress: f32,
    },
    Composed {
        parent: Box<PoseState>,
        child: Box<PoseState>,
    },
}

impl PoseState {
    pub fn interpolated(frame: usize, next_frame: usize, progress: f32) -> Self {
        Self::Interpolated {
            frame,
            next_frame,
            progress,
        }
    }

    pub fn composed(parent: PoseState, child: PoseState) -> Self {
        Self::Composed {
            parent: Box::new(parent),
            child: Box::new(child),
        }
    }

    /// Frame pair and progress for a playback time, wrapping when the clip
    /// loops and holding the last frame otherwise.
    pub fn at_time(clip: &AnimationClip, seconds: f32) -> Self {
        if clip.frames == 0 || clip.fps <= 0.0 {
            return Self::Identity;
        }
        let position = (seconds * clip.fps).max(0.0);
        let last = clip.frames - 1;
        let progress = if position.is_finite() {
            position.fract()
        } else {
            0.0
        };
        if clip.flags.looping() {
            // float to int casts saturate
            let frame = position.floor() as usize % clip.frames;
            let next_frame = if frame == last { 0 } else { frame + 1 };
            Self::interpolated(frame, next_frame, progress)
        } else if position >= last as f32 {
            Self::ExplicitFrame(last)
        } else {
            let frame = (position.floor() as usize).min(last - 1);
            Self::interpolated(frame, frame + 1, progress)
        }
    }

    pub fn parent(&self) -> Option<&PoseState> {
        match self {
            PoseState::Composed { parent, .. } => Some(&**parent),
            _ => None,
        }
    }
}

impl PartialEq for PoseState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PoseState::Identity, PoseState::Identity) => true,
            (PoseState::ExplicitFrame(a), PoseState::ExplicitFrame(b)) => a == b,
            (
                PoseState::Interpolated {
                    frame,
                    next_frame,
                    progress,
                },
                PoseState::Interpolated {
                    frame: other_frame,
                    next_frame: other_next_frame,
                    progress: other_progress,
                },
            ) => {
                frame == other_frame
                    && next_frame == other_next_frame
                    && progress.to_bits() == other_progress.to_bits()
            }
            (
                PoseState::Composed { parent, child },
                PoseState::Composed {
                    parent: other_parent,
                    child: other_child,
                },
            ) => parent == other_parent && child == other_child,
            _ => false,
        }
    }
}

// Float fields compare by bit pattern.
impl Eq for PoseState {}

impl Hash for PoseState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            PoseState::Identity => {}
            PoseState::ExplicitFrame(frame) => frame.hash(state),
            PoseState::Interpolated {
                frame,
                next_frame,
                progress,
            } => {
                frame.hash(state);
                next_frame.hash(state);
                progress.to_bits().hash(state);
            }
            PoseState::Composed { parent, child } => {
                parent.hash(state);
                child.hash(state);
            }
        }
    }
}

/// Turns a [`PoseState`] into per-joint transforms using one clip.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseResolver<'a> {
    clip: Option<&'a AnimationClip>,
}

impl<'a> PoseResolver<'a> {
    pub fn new(clip: Option<&'a AnimationClip>) -> Self {
        Self { clip }
    }

    fn key(&self, frame: usize, joint: usize) -> DecomposedTransform {
        self.clip
            .and_then(|clip| clip.key(frame, joint))
            .map(|key| key.to_decomposed())
            .unwrap_or_default()
    }

    /// Pose delta of one joint.
    pub fn resolve(&self, state: &PoseState, joint: usize) -> Transform {
        match state {
            PoseState::Identity => Transform::IDENTITY,
            PoseState::ExplicitFrame(frame) => self
                .clip
                .and_then(|clip| clip.key(*frame, joint))
                .map(|key| Transform::from(key.to_decomposed()))
                .unwrap_or(Transform::IDENTITY),
            PoseState::Interpolated {
                frame,
                next_frame,
                progress,
            } => {
                let progress = if progress.is_nan() {
                    0.0
                } else {
                    progress.clamp(0.0, 1.0)
                };
                let current = self.key(*frame, joint);
                let next = self.key(*next_frame, joint);
                current.interpolate(&next, progress).into()
            }
            PoseState::Composed { parent, child } => self
                .resolve(parent, joint)
                .compose(&self.resolve(child, joint)),
        }
    }

    /// Current transform of every joint: the pose delta applied over the
    /// bind pose.
    pub fn joint_transforms(&self, state: &PoseState, joints: &[Joint]) -> Vec<Transform> {
        joints
            .iter()
            .enumerate()
            .map(|(index, joint)| {
                let delta = self.resolve(state, index);
                if delta.is_identity() {
                    joint.bind_transform()
                } else {
                    delta.compose(&joint.bind_transform())
                }
            })
            .collect()
    }

    pub fn joint_matrices(&self, state: &PoseState, joints: &[Joint]) -> Vec<Mat4> {
        self.joint_transforms(state, joints)
            .into_iter()
            .map(Mat4::from)
            .collect()
    }
}
