//! Writing solved joint rotations to the skeleton.
//!
//! A [`PoseApplier`] either writes rotations straight through
//! ([`ApplyMode::Direct`], for the locally driven avatar) or eases each
//! joint from its current rotation to the solved one over a short clip
//! ([`ApplyMode::Animated`], for avatars driven by sparse network updates).

use crate::bone::BoneTree;
use crate::math::Quat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ApplyMode {
    Direct,
    /// Two-keyframe ease from the current rotation, `seconds` long
    Animated { seconds: f32 },
}

/// Playback state of one joint
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum JointAnimation {
    #[default]
    Idle,
    Playing { from: Quat, to: Quat, elapsed: f32 },
}

impl JointAnimation {
    pub fn is_playing(&self) -> bool {
        matches!(self, JointAnimation::Playing { .. })
    }

    /// Advance by `delta_seconds` (Functional Update).
    ///
    /// Returns the next state and the rotation to write, if any.
    pub fn advance(self, delta_seconds: f32, duration: f32) -> (JointAnimation, Option<Quat>) {
        match self {
            JointAnimation::Idle => (self, None),
            JointAnimation::Playing { from, to, elapsed } => {
                let elapsed = elapsed + delta_seconds;
                if duration <= 0.0 || elapsed >= duration {
                    (JointAnimation::Idle, Some(to))
                } else {
                    let rotation = from.slerp(to, elapsed / duration);
                    (JointAnimation::Playing { from, to, elapsed }, Some(rotation))
                }
            }
        }
    }
}

/// Applies solved rotations to one avatar's bones.
///
/// Animation state is indexed by bone, one slot per bone.
#[derive(Debug, Clone)]
pub struct PoseApplier {
    mode: ApplyMode,
    joints: Vec<JointAnimation>,
}

impl PoseApplier {
    pub fn new(mode: ApplyMode, bone_count: usize) -> Self {
        Self {
            mode,
            joints: vec![JointAnimation::Idle; bone_count],
        }
    }

    pub fn mode(&self) -> ApplyMode {
        self.mode
    }

    pub fn joint(&self, bone: usize) -> JointAnimation {
        self.joints.get(bone).copied().unwrap_or_default()
    }

    /// Whether any joint is still easing
    pub fn is_animating(&self) -> bool {
        self.joints.iter().any(JointAnimation::is_playing)
    }

    /// Write `rotation` to `bone` according to the mode
    pub fn apply<T: BoneTree>(&mut self, tree: &mut T, bone: usize, rotation: Quat) {
        match self.mode {
            ApplyMode::Direct => tree.set_local_rotation(bone, rotation),
            ApplyMode::Animated { .. } => {
                let from = tree.local_rotation(bone);
                self.retarget(bone, from, rotation);
            }
        }
    }

    /// Replace a joint's animation.
    ///
    /// A playing animation is stopped before its keyframes are rewritten, so
    /// the newest target always wins and playback restarts from `from`.
    pub fn retarget(&mut self, bone: usize, from: Quat, to: Quat) {
        if bone >= self.joints.len() {
            self.joints.resize(bone + 1, JointAnimation::Idle);
        }
        self.stop(bone);
        self.joints[bone] = JointAnimation::Playing {
            from,
            to,
            elapsed: 0.0,
        };
    }

    /// Stop a joint where it is
    pub fn stop(&mut self, bone: usize) {
        if let Some(joint) = self.joints.get_mut(bone) {
            if joint.is_playing() {
                log::trace!("Stopping animation of bone {}", bone);
            }
            *joint = JointAnimation::Idle;
        }
    }

    /// Stop every joint
    pub fn stop_all(&mut self) {
        self.joints.fill(JointAnimation::Idle);
    }

    /// Advance all playing joints and write their rotations.
    ///
    /// Returns whether anything is still playing.
    pub fn tick<T: BoneTree>(&mut self, tree: &mut T, delta_seconds: f32) -> bool {
        let duration = match self.mode {
            ApplyMode::Animated { seconds } => seconds,
            ApplyMode::Direct => 0.0,
        };
        for (bone, joint) in self.joints.iter_mut().enumerate() {
            let (next, rotation) = joint.advance(delta_seconds, duration);
            *joint = next;
            if let Some(rotation) = rotation {
                tree.set_local_rotation(bone, rotation);
            }
        }
        self.is_animating()
    }
}
