//! Classified body structure of one avatar skeleton.
//!
//! A [`BodyMap`] maps semantic roles (hips, spine, arms, legs, head) to bone
//! indices. It is filled once by the classifier, then extended with limb
//! lengths and bend axes, and read by the solvers for the avatar's lifetime.

use crate::bone::BoneTree;
use crate::math::{Axis, Quat, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];
}

/// Addresses one classified limb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Limb {
    Arm(Side),
    Leg(Side),
}

/// Local axis and direction about which a joint bends a given way
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimbAxis {
    pub axis: Axis,
    /// Always -1.0 or 1.0
    pub sign: f32,
}

impl LimbAxis {
    /// Rotation bending `angle` radians in the probed direction
    pub fn rotation(&self, angle: f32) -> Quat {
        self.axis.rotation(angle * self.sign)
    }
}

/// Rest-pose reference captured on the first IK solve of a limb.
///
/// Stays valid until the skeleton is classified again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimbIkCache {
    pub initialized: bool,
    /// Local rotation of the upper bone at rest
    pub upper_quat: Quat,
    /// Local rotation of the lower bone at rest
    pub lower_quat: Quat,
    /// Avatar-root rotation of the upper bone's parent frame at rest
    pub world_quat: Quat,
    /// Upper joint to end effector at rest, avatar-root space
    pub limb_vector: Vec3,
}

impl Default for LimbIkCache {
    fn default() -> Self {
        Self {
            initialized: false,
            upper_quat: Quat::IDENTITY,
            lower_quat: Quat::IDENTITY,
            world_quat: Quat::IDENTITY,
            limb_vector: Vec3::ZERO,
        }
    }
}

impl LimbIkCache {
    /// Capture the current pose of `upper → lower → end` as the rest reference
    pub fn capture<T: BoneTree>(tree: &T, upper: usize, lower: usize, end: usize) -> Self {
        Self {
            initialized: true,
            upper_quat: tree.local_rotation(upper),
            lower_quat: tree.local_rotation(lower),
            world_quat: tree.parent_model_rotation(upper),
            limb_vector: tree.model_position(end) - tree.model_position(upper),
        }
    }
}

/// Segment lengths of a two-bone limb, avatar-root units
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LimbLengths {
    pub upper_length: f32,
    pub lower_length: f32,
    pub length: f32,
}

impl LimbLengths {
    /// Measure from the current (bind) pose
    pub fn measure<T: BoneTree>(tree: &T, upper: usize, lower: usize, end: usize) -> Self {
        let upper_pos = tree.model_position(upper);
        let lower_pos = tree.model_position(lower);
        let end_pos = tree.model_position(end);
        let upper_length = upper_pos.distance(lower_pos);
        let lower_length = lower_pos.distance(end_pos);
        Self {
            upper_length,
            lower_length,
            length: upper_length + lower_length,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];
}

/// Finger chains of one hand, root joint first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fingers {
    pub thumb: Vec<usize>,
    pub index: Vec<usize>,
    pub middle: Vec<usize>,
    pub ring: Vec<usize>,
    pub pinky: Vec<usize>,
}

impl Fingers {
    pub fn get(&self, finger: Finger) -> &Vec<usize> {
        match finger {
            Finger::Thumb => &self.thumb,
            Finger::Index => &self.index,
            Finger::Middle => &self.middle,
            Finger::Ring => &self.ring,
            Finger::Pinky => &self.pinky,
        }
    }

    pub fn get_mut(&mut self, finger: Finger) -> &mut Vec<usize> {
        match finger {
            Finger::Thumb => &mut self.thumb,
            Finger::Index => &mut self.index,
            Finger::Middle => &mut self.middle,
            Finger::Ring => &mut self.ring,
            Finger::Pinky => &mut self.pinky,
        }
    }

    pub fn count(&self) -> usize {
        Finger::ALL
            .iter()
            .filter(|&&f| !self.get(f).is_empty())
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arm {
    pub shoulder: Option<usize>,
    pub upper: Option<usize>,
    pub lower: Option<usize>,
    pub hand: Option<usize>,
    pub fingers: Fingers,
    #[serde(flatten)]
    pub lengths: LimbLengths,
    /// Bends the arm forward (elbow flexion)
    pub front_axis: Option<LimbAxis>,
    /// Raises the arm sideways (shoulder abduction)
    pub side_axis: Option<LimbAxis>,
    #[serde(skip)]
    pub ik: LimbIkCache,
}

impl Arm {
    /// `(upper, lower, hand)` once all three are classified
    pub fn joints(&self) -> Option<(usize, usize, usize)> {
        Some((self.upper?, self.lower?, self.hand?))
    }

    pub fn calc_length<T: BoneTree>(&mut self, tree: &T) {
        if let Some((upper, lower, hand)) = self.joints() {
            self.lengths = LimbLengths::measure(tree, upper, lower, hand);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub upper: Option<usize>,
    pub lower: Option<usize>,
    /// Foot chain, ankle first
    pub foot: Vec<usize>,
    #[serde(flatten)]
    pub lengths: LimbLengths,
    /// Lifts the thigh forward
    pub front_axis: Option<LimbAxis>,
    #[serde(skip)]
    pub ik: LimbIkCache,
}

impl Leg {
    /// `(upper, lower, ankle)` once all three are classified
    pub fn joints(&self) -> Option<(usize, usize, usize)> {
        Some((self.upper?, self.lower?, *self.foot.first()?))
    }

    pub fn calc_length<T: BoneTree>(&mut self, tree: &T) {
        if let Some((upper, lower, foot)) = self.joints() {
            self.lengths = LimbLengths::measure(tree, upper, lower, foot);
        }
    }
}

/// Head orientation reference computed once when the neck is classified
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadRig {
    /// 1.0 when neck and head local Z agree in avatar-root space, -1.0 when
    /// they point opposite ways
    pub axis_fix: f32,
    /// Local rotation of the head at rest
    pub head_quat: Quat,
    /// Inverse of the head's avatar-root rotation at rest
    pub head_quat_inv: Quat,
    /// Avatar forward direction expressed in head-local space at rest
    pub head_target: Vec3,
}

/// Semantic bone map of one skeleton
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyMap {
    /// Set once a skeleton with bones has been classified
    pub processed: bool,
    pub root: Option<usize>,
    pub hips: Option<usize>,
    pub spine: Vec<usize>,
    pub neck: Option<usize>,
    pub head: Option<usize>,
    pub left_arm: Arm,
    pub right_arm: Arm,
    pub left_leg: Leg,
    pub right_leg: Leg,
    pub head_rig: Option<HeadRig>,
    /// Bones the classifier never reached
    pub unprocessed: Vec<usize>,
}

impl BodyMap {
    pub fn arm(&self, side: Side) -> &Arm {
        match side {
            Side::Left => &self.left_arm,
            Side::Right => &self.right_arm,
        }
    }

    pub fn arm_mut(&mut self, side: Side) -> &mut Arm {
        match side {
            Side::Left => &mut self.left_arm,
            Side::Right => &mut self.right_arm,
        }
    }

    pub fn leg(&self, side: Side) -> &Leg {
        match side {
            Side::Left => &self.left_leg,
            Side::Right => &self.right_leg,
        }
    }

    pub fn leg_mut(&mut self, side: Side) -> &mut Leg {
        match side {
            Side::Left => &mut self.left_leg,
            Side::Right => &mut self.right_leg,
        }
    }

    pub fn lengths(&self, limb: Limb) -> LimbLengths {
        match limb {
            Limb::Arm(side) => self.arm(side).lengths,
            Limb::Leg(side) => self.leg(side).lengths,
        }
    }

    /// Populate lengths for one limb from the current pose
    pub fn calc_length<T: BoneTree>(&mut self, tree: &T, limb: Limb) {
        match limb {
            Limb::Arm(side) => self.arm_mut(side).calc_length(tree),
            Limb::Leg(side) => self.leg_mut(side).calc_length(tree),
        }
    }
}
