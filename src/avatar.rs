//! Avatar: one rigged skeleton plus everything needed to drive it.
//!
//! ## Lifecycle
//!
//! 1. [`Avatar::new`] wraps an engine skeleton (any [`BoneTree`]).
//! 2. [`Avatar::process_bones`] classifies bones, measures limbs and probes
//!    bend axes, once, right after the skeleton is loaded.
//! 3. Input events call the solvers ([`Avatar::reach_for`],
//!    [`Avatar::look_at`], [`Avatar::crouch`], ...), which write local
//!    rotations back through the tree.
//!
//! Models without bones are accepted as static meshes: every solver is then
//! a no-op returning `Ok(None)`. Solving a rigged avatar before
//! classification is a programming error and returns
//! [`RigError::NotClassified`].
//!
//! Arms go through the [`PoseApplier`] (direct or animated per
//! [`RigConfig::animate_arms`]); legs and head are always written directly.

use crate::animation::{ApplyMode, PoseApplier};
use crate::axis::guess_rotation;
use crate::body::{BodyMap, Limb, LimbAxis, LimbIkCache, LimbLengths, Side};
use crate::bone::BoneTree;
use crate::classify::classify;
use crate::config::RigConfig;
use crate::error::RigError;
use crate::gaze;
use crate::ik::{self, LimbPose};
use crate::math::{sanitize, Axis, Quat, Vec3};

/// How far `lower_arms` drops each arm from its rest pose
const LOWERED_ARM_DEGREES: f32 = 70.0;

pub struct Avatar<S: BoneTree> {
    tree: S,
    config: RigConfig,
    body: BodyMap,
    applier: PoseApplier,
    /// Local rotations captured at classification
    rest_pose: Vec<Quat>,
    /// Root position with straight legs on the ground
    position: Vec3,
    /// Vertical root offset from crouching or jumping, avatar-root units
    ground_height: f32,
    /// Current leg extension; `None` while standing
    leg_extension: Option<f32>,
}

impl<S: BoneTree> Avatar<S> {
    pub fn new(tree: S, config: RigConfig) -> Self {
        let config = config.normalized();
        let mode = if config.animate_arms {
            ApplyMode::Animated {
                seconds: config.animation_seconds,
            }
        } else {
            ApplyMode::Direct
        };
        Self {
            applier: PoseApplier::new(mode, tree.bone_count()),
            position: tree.root().position,
            tree,
            config,
            body: BodyMap::default(),
            rest_pose: Vec::new(),
            ground_height: 0.0,
            leg_extension: None,
        }
    }

    pub fn tree(&self) -> &S {
        &self.tree
    }

    pub fn into_tree(self) -> S {
        self.tree
    }

    pub fn body(&self) -> &BodyMap {
        &self.body
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn ground_height(&self) -> f32 {
        self.ground_height
    }

    /// Current local rotations, in bone order
    pub fn rotations(&self) -> Vec<Quat> {
        (0..self.tree.bone_count())
            .map(|bone| self.tree.local_rotation(bone))
            .collect()
    }

    /// Drop any previous classification and start from an empty body map
    pub fn create_body(&mut self) -> &BodyMap {
        self.applier.stop_all();
        self.body = BodyMap::default();
        &self.body
    }

    /// Classify the skeleton, measure every limb and probe bend axes.
    ///
    /// Running it again first returns the skeleton to the pose captured by
    /// the previous run, so repeated runs produce the same map.
    pub fn process_bones(&mut self) -> &BodyMap {
        if self.body.processed {
            self.reset_pose();
        }
        self.create_body();

        self.body = classify(&self.tree, self.config.forward);
        if !self.body.processed {
            return &self.body;
        }

        self.rest_pose = self.rotations();
        for side in Side::BOTH {
            self.calc_length(Limb::Arm(side));
            self.calc_length(Limb::Leg(side));
        }
        self.guess_arms_rotations();
        self.guess_legs_rotations();
        self.ground_height = 0.0;
        self.leg_extension = None;

        log::info!(
            "Avatar processed: arm lengths {:.3}/{:.3}, leg length {:.3}",
            self.body.left_arm.lengths.length,
            self.body.right_arm.lengths.length,
            self.leg_length()
        );
        &self.body
    }

    /// Measure one limb from the current (bind) pose
    pub fn calc_length(&mut self, limb: Limb) -> LimbLengths {
        self.body.calc_length(&self.tree, limb);
        self.body.lengths(limb)
    }

    /// Probe forward-bend and side-raise axes of both upper arms.
    ///
    /// The right arm is restricted to the axes found on the left one.
    pub fn guess_arms_rotations(&mut self) {
        let root = self.tree.root();
        let forward = root.to_world_direction(self.config.forward);
        let up = root.to_world_direction(self.config.up);

        let mut front_restrict = None;
        let mut side_restrict = None;
        for side in Side::BOTH {
            let Some(upper) = self.body.arm(side).upper else {
                continue;
            };
            if self.tree.children(upper).is_empty() {
                log::debug!("{:?} arm has no joint below {}", side, self.tree.name(upper));
                continue;
            }

            let front = self.probe(upper, forward, front_restrict);
            let raise = self.probe(upper, up, side_restrict);
            front_restrict = front_restrict.or(front.map(|a| a.axis));
            side_restrict = side_restrict.or(raise.map(|a| a.axis));

            let arm = self.body.arm_mut(side);
            arm.front_axis = front;
            arm.side_axis = raise;
        }
    }

    /// Probe the forward-bend axis of both thighs
    pub fn guess_legs_rotations(&mut self) {
        let forward = self.tree.root().to_world_direction(self.config.forward);

        let mut restrict = None;
        for side in Side::BOTH {
            let Some(upper) = self.body.leg(side).upper else {
                continue;
            };
            if self.tree.children(upper).is_empty() {
                log::debug!("{:?} leg has no joint below {}", side, self.tree.name(upper));
                continue;
            }

            let front = self.probe(upper, forward, restrict);
            restrict = restrict.or(front.map(|a| a.axis));
            self.body.leg_mut(side).front_axis = front;
        }
    }

    fn probe(&mut self, bone: usize, reference: Vec3, restrict: Option<Axis>) -> Option<LimbAxis> {
        match guess_rotation(&mut self.tree, bone, reference, restrict) {
            Ok(axis) => Some(axis),
            Err(e) => {
                log::warn!("Axis probe failed: {}", e);
                None
            }
        }
    }

    /// `Ok(false)` for static meshes, an error before classification
    fn ready(&self) -> Result<bool, RigError> {
        if self.tree.bone_count() == 0 {
            return Ok(false);
        }
        if !self.body.processed {
            return Err(RigError::NotClassified);
        }
        Ok(true)
    }

    fn ensure_arm_cache(&mut self, side: Side) {
        if self.body.arm(side).ik.initialized {
            return;
        }
        if let Some((upper, lower, hand)) = self.body.arm(side).joints() {
            self.body.arm_mut(side).ik = LimbIkCache::capture(&self.tree, upper, lower, hand);
        }
    }

    fn ensure_leg_cache(&mut self, side: Side) {
        if self.body.leg(side).ik.initialized {
            return;
        }
        if let Some((upper, lower, foot)) = self.body.leg(side).joints() {
            self.body.leg_mut(side).ik = LimbIkCache::capture(&self.tree, upper, lower, foot);
        }
    }

    fn apply_arm(&mut self, upper: usize, lower: usize, pose: LimbPose) {
        self.applier.apply(&mut self.tree, upper, pose.upper);
        self.applier.apply(&mut self.tree, lower, pose.lower);
    }

    /// Reach for `target` (world space) with one hand.
    ///
    /// `pointer` is an optional controller orientation the arm twist should
    /// follow. Returns the upper arm rotation, or `None` when the arm is
    /// incomplete or was never probed.
    pub fn reach_for(
        &mut self,
        side: Side,
        target: Vec3,
        pointer: Option<Quat>,
    ) -> Result<Option<Quat>, RigError> {
        if !self.ready()? {
            return Ok(None);
        }
        self.ensure_arm_cache(side);

        let arm = self.body.arm(side);
        let Some((upper, lower, _)) = arm.joints() else {
            return Ok(None);
        };
        let Some(pose) = ik::reach_for(&self.tree, arm, target, pointer, &self.config) else {
            log::debug!("{:?} arm cannot be solved", side);
            return Ok(None);
        };

        self.apply_arm(upper, lower, pose);
        Ok(Some(pose.upper))
    }

    /// Bend one arm so the hand is `length` from the shoulder joint.
    ///
    /// Returns whether that length was reachable.
    pub fn bend_arm(&mut self, side: Side, length: f32) -> Result<Option<bool>, RigError> {
        if !self.ready()? {
            return Ok(None);
        }
        self.ensure_arm_cache(side);

        let arm = self.body.arm(side);
        let (Some((upper, lower, _)), Some(pose)) = (arm.joints(), ik::bend_arm(arm, length))
        else {
            return Ok(None);
        };
        self.apply_arm(upper, lower, pose);
        Ok(Some(pose.bend.reached))
    }

    /// Drop both arms from the rest pose about their side-raise axes
    pub fn lower_arms(&mut self) -> Result<(), RigError> {
        if !self.ready()? {
            return Ok(());
        }
        for side in Side::BOTH {
            self.ensure_arm_cache(side);
            let arm = self.body.arm(side);
            let (Some((upper, lower, _)), Some(axis)) = (arm.joints(), arm.side_axis) else {
                continue;
            };
            let drop = axis.rotation(-LOWERED_ARM_DEGREES.to_radians());
            let upper_rotation = sanitize(arm.ik.upper_quat * drop);
            let lower_rotation = arm.ik.lower_quat;
            self.applier.apply(&mut self.tree, upper, upper_rotation);
            self.applier.apply(&mut self.tree, lower, lower_rotation);
        }
        Ok(())
    }

    /// Bend one leg to `length`; returns the length actually applied
    pub fn bend_leg(&mut self, side: Side, length: f32) -> Result<Option<f32>, RigError> {
        if !self.ready()? {
            return Ok(None);
        }
        self.ensure_leg_cache(side);

        let leg = self.body.leg(side);
        let (Some((upper, lower, _)), Some(pose)) = (leg.joints(), ik::bend_leg(leg, length))
        else {
            return Ok(None);
        };
        self.tree.set_local_rotation(upper, pose.upper);
        self.tree.set_local_rotation(lower, pose.lower);
        Ok(Some(pose.bend.length))
    }

    /// Average length of the measured legs, 0.0 without legs
    pub fn leg_length(&self) -> f32 {
        let lengths: Vec<f32> = Side::BOTH
            .iter()
            .map(|&side| self.body.leg(side).lengths.length)
            .filter(|&length| length > 0.0)
            .collect();
        if lengths.is_empty() {
            return 0.0;
        }
        lengths.iter().sum::<f32>() / lengths.len() as f32
    }

    /// Bend both legs to `length` and lower the root to keep the feet down,
    /// then lift it by `lift`
    fn extend_legs(&mut self, length: f32, lift: f32) -> Result<Option<f32>, RigError> {
        if !self.ready()? {
            return Ok(None);
        }
        let full = self.leg_length();
        if full <= 0.0 {
            return Ok(None);
        }

        let length = length.clamp(0.0, full);
        let mut applied = None;
        for side in Side::BOTH {
            if let Some(bent) = self.bend_leg(side, length)? {
                applied = Some(bent);
            }
        }
        let Some(applied) = applied else {
            return Ok(None);
        };

        self.leg_extension = (applied < full).then_some(applied);
        self.ground_height = applied - full + lift;
        self.place_root();
        log::trace!("Legs at {:.3}, ground height {:.3}", applied, self.ground_height);
        Ok(Some(applied))
    }

    /// Straighten both legs and put the feet back on the ground
    pub fn stand_up(&mut self) -> Result<Option<f32>, RigError> {
        self.extend_legs(self.leg_length(), 0.0)
    }

    /// Lower the body by `height` from standing
    pub fn crouch(&mut self, height: f32) -> Result<Option<f32>, RigError> {
        self.extend_legs(self.leg_length() - height, 0.0)
    }

    /// Raise the body by `height` from wherever it is; never past standing
    pub fn rise(&mut self, height: f32) -> Result<Option<f32>, RigError> {
        let current = self.leg_extension.unwrap_or_else(|| self.leg_length());
        self.extend_legs(current + height, 0.0)
    }

    /// Straighten the legs and lift the whole avatar by `height`
    pub fn jump(&mut self, height: f32) -> Result<Option<f32>, RigError> {
        self.extend_legs(self.leg_length(), height)
    }

    /// Move the avatar; the current crouch or jump offset is kept
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.place_root();
    }

    fn place_root(&mut self) {
        let root = self.tree.root();
        let lift = root.to_world_direction(self.config.up) * (self.ground_height * root.scale.y);
        self.tree.set_root_position(self.position + lift);
    }

    /// Turn the head towards `target` (world space)
    pub fn look_at(&mut self, target: Vec3) -> Result<(), RigError> {
        if !self.ready()? {
            return Ok(());
        }
        let (Some(head), Some(rig)) = (self.body.head, self.body.head_rig) else {
            return Ok(());
        };
        let rotation = gaze::look_at(
            &self.tree,
            &rig,
            head,
            target,
            self.config.up,
            self.config.head_axis_fix,
        );
        self.applier.stop(head);
        self.tree.set_local_rotation(head, rotation);
        Ok(())
    }

    /// World position of the head joint
    pub fn head_pos(&self) -> Option<Vec3> {
        self.body.head.map(|head| self.tree.world_position(head))
    }

    /// Advance arm animations; returns whether any are still playing
    pub fn tick(&mut self, delta_seconds: f32) -> bool {
        self.applier.tick(&mut self.tree, delta_seconds)
    }

    /// Return every bone to the rest pose and the root to the ground
    pub fn reset_pose(&mut self) {
        self.applier.stop_all();
        for (bone, &rotation) in self.rest_pose.iter().enumerate() {
            self.tree.set_local_rotation(bone, rotation);
        }
        self.ground_height = 0.0;
        self.leg_extension = None;
        self.place_root();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bone::Skeleton;
    use wasm_bindgen_test::*;

    const LEFT_ARM: usize = 7;
    const LEFT_HAND: usize = 9;
    const RIGHT_HAND: usize = 16;
    const LEFT_FOOT: usize = 20;

    fn avatar(config: RigConfig) -> Avatar<Skeleton> {
        let json = include_str!("../tests/fixtures/mixamo_skeleton.json");
        let mut avatar = Avatar::new(Skeleton::from_json(json).unwrap(), config);
        avatar.process_bones();
        avatar
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_static_mesh_is_a_no_op() {
        let mut avatar = Avatar::new(Skeleton::default(), RigConfig::default());
        assert!(!avatar.process_bones().processed);
        assert_eq!(avatar.reach_for(Side::Left, Vec3::X, None).unwrap(), None);
        assert_eq!(avatar.crouch(0.2).unwrap(), None);
        assert!(avatar.look_at(Vec3::Z).is_ok());
        assert_eq!(avatar.head_pos(), None);
        assert_eq!(avatar.leg_length(), 0.0);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_solving_before_processing_is_an_error() {
        let json = include_str!("../tests/fixtures/mixamo_skeleton.json");
        let mut avatar = Avatar::new(Skeleton::from_json(json).unwrap(), RigConfig::default());
        assert!(matches!(
            avatar.reach_for(Side::Left, Vec3::X, None),
            Err(RigError::NotClassified)
        ));
        assert!(matches!(avatar.stand_up(), Err(RigError::NotClassified)));
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_probed_axes() {
        let avatar = avatar(RigConfig::default());
        let body = avatar.body();
        assert_eq!(
            body.left_arm.front_axis,
            Some(LimbAxis { axis: Axis::Y, sign: -1.0 })
        );
        assert_eq!(
            body.right_arm.front_axis,
            Some(LimbAxis { axis: Axis::Y, sign: 1.0 })
        );
        assert_eq!(
            body.right_arm.side_axis,
            Some(LimbAxis { axis: Axis::Z, sign: -1.0 })
        );
        assert_eq!(
            body.left_leg.front_axis,
            Some(LimbAxis { axis: Axis::X, sign: -1.0 })
        );
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_reach_for_moves_hand_to_target() {
        let mut avatar = avatar(RigConfig::default());
        let target = Vec3::new(0.35, 1.6, 0.2);
        assert!(avatar.reach_for(Side::Left, target, None).unwrap().is_some());

        let hand = avatar.tree().world_position(LEFT_HAND);
        assert!(hand.distance(target) < 1e-3, "{:?}", hand);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_animated_arms_need_ticks() {
        let mut avatar = avatar(RigConfig {
            animate_arms: true,
            animation_seconds: 0.1,
            ..RigConfig::default()
        });
        let target = Vec3::new(-0.3, 1.3, 0.25);
        let rest = avatar.tree().world_position(RIGHT_HAND);

        avatar.reach_for(Side::Right, target, None).unwrap();
        assert_eq!(avatar.tree().world_position(RIGHT_HAND), rest);

        assert!(avatar.tick(0.05));
        assert!(!avatar.tick(0.1));
        let hand = avatar.tree().world_position(RIGHT_HAND);
        assert!(hand.distance(target) < 1e-3, "{:?}", hand);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_crouch_rise_and_jump_move_root() {
        let mut avatar = avatar(RigConfig::default());
        let foot = avatar.tree().world_position(LEFT_FOOT);
        assert!((avatar.leg_length() - 0.9).abs() < 1e-5);

        let applied = avatar.crouch(0.2).unwrap().unwrap();
        assert!((applied - 0.7).abs() < 1e-5);
        assert!((avatar.tree().root().position.y + 0.2).abs() < 1e-5);
        // feet stay planted
        assert!(avatar.tree().world_position(LEFT_FOOT).distance(foot) < 1e-4);

        avatar.rise(0.1).unwrap();
        assert!((avatar.ground_height() + 0.1).abs() < 1e-5);

        avatar.rise(1.0).unwrap();
        assert!(avatar.ground_height().abs() < 1e-5);

        avatar.jump(0.3).unwrap();
        avatar.set_position(Vec3::new(1.0, 0.0, 2.0));
        let root = avatar.tree().root().position;
        assert!(root.distance(Vec3::new(1.0, 0.3, 2.0)) < 1e-5, "{:?}", root);

        avatar.stand_up().unwrap();
        assert!(avatar.tree().root().position.distance(Vec3::new(1.0, 0.0, 2.0)) < 1e-5);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_look_at_turns_head() {
        let mut avatar = avatar(RigConfig::default());
        let head = avatar.body().head.unwrap();
        let target = avatar.head_pos().unwrap() + Vec3::new(1.0, 0.0, 1.0);

        avatar.look_at(target).unwrap();
        let facing = avatar.tree().world_rotation(head) * Vec3::Z;
        assert!(facing.distance(Vec3::new(1.0, 0.0, 1.0).normalize()) < 1e-4);

        avatar.look_at(avatar.head_pos().unwrap()).unwrap();
        assert!(avatar.tree().local_rotation(head).is_finite());
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_lower_arms() {
        let mut avatar = avatar(RigConfig::default());
        avatar.lower_arms().unwrap();
        let shoulder = avatar.tree().world_position(LEFT_ARM);
        assert!(avatar.tree().world_position(LEFT_HAND).y < shoulder.y - 0.3);
        assert!(avatar.tree().world_position(RIGHT_HAND).y < shoulder.y - 0.3);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_reset_pose() {
        let mut avatar = avatar(RigConfig::default());
        let rest = avatar.rotations();

        avatar.reach_for(Side::Left, Vec3::new(0.3, 1.2, 0.3), None).unwrap();
        avatar.crouch(0.3).unwrap();
        avatar.look_at(Vec3::new(0.0, 2.0, 1.0)).unwrap();
        assert_ne!(avatar.rotations(), rest);

        avatar.reset_pose();
        assert_eq!(avatar.rotations(), rest);
        assert_eq!(avatar.tree().root().position, Vec3::ZERO);
    }
}
