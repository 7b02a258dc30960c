use crate::body::{Arm, Leg, LimbAxis, LimbIkCache};
use crate::bone::{BoneTree, RootTransform};
use crate::config::RigConfig;
use crate::math::{rotation_between, sanitize, Quat, Vec3, EPSILON};
use std::f32::consts::FRAC_PI_2;

/// Angles of a symmetric two-bone bend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bend {
    /// Solved root-to-end distance, after clamping
    pub length: f32,
    /// Angle between the limb chord and each segment's normal
    pub inner: f32,
    /// Bend of the upper joint away from the chord
    pub outer: f32,
    /// Bend of the middle joint (elbow, knee)
    pub hinge: f32,
    /// False when the requested length had to be clamped
    pub reached: bool,
}

/// Solve the bend that puts the end of a `upper` + `lower` limb at
/// `length` from its root joint.
///
/// Both segments are treated as their average length, so the elbow or knee
/// always sits on the perpendicular bisector of the chord.
pub fn solve_bend(upper: f32, lower: f32, length: f32) -> Bend {
    let max = upper + lower;
    if max <= EPSILON {
        return Bend {
            length: 0.0,
            inner: FRAC_PI_2,
            outer: 0.0,
            hinge: 0.0,
            reached: false,
        };
    }

    let reached = (0.0..=max).contains(&length);
    let length = length.clamp(0.0, max);
    let bone = max / 2.0;
    let inner = (length / (2.0 * bone)).clamp(-1.0, 1.0).asin();
    let outer = FRAC_PI_2 - inner;
    Bend {
        length,
        inner,
        outer,
        hinge: 2.0 * outer,
        reached,
    }
}

/// Solved local rotations for the two joints of a limb
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimbPose {
    pub upper: Quat,
    pub lower: Quat,
    pub bend: Bend,
}

/// Arms fold the elbow forward: shoulder back by `outer`, elbow by `hinge`.
fn arm_pose(ik: &LimbIkCache, front: LimbAxis, bend: Bend) -> LimbPose {
    LimbPose {
        upper: sanitize(ik.upper_quat * front.rotation(-bend.outer)),
        lower: sanitize(ik.lower_quat * front.rotation(bend.hinge)),
        bend,
    }
}

/// Bend an arm to `length` without changing where it points
pub fn bend_arm(arm: &Arm, length: f32) -> Option<LimbPose> {
    let front = arm.front_axis?;
    if !arm.ik.initialized {
        return None;
    }
    let lengths = arm.lengths;
    let bend = solve_bend(lengths.upper_length, lengths.lower_length, length);
    Some(arm_pose(&arm.ik, front, bend))
}

/// Pointing direction of a tracked controller, avatar-root space.
///
/// `mirror_pointer` and `clamp_pointer_backwards` are experimental and can be
/// switched off independently. Neither depends on which hand holds the
/// controller.
pub fn pointer_direction(root: &RootTransform, pointer: Quat, config: &RigConfig) -> Vec3 {
    let world = pointer * config.pointer_offset.to_quat() * config.forward;
    let mut direction = root.to_local_direction(world);
    if config.mirror_pointer {
        direction.x = -direction.x;
    }
    if config.clamp_pointer_backwards {
        let along = direction.dot(config.forward);
        if along < 0.0 {
            direction -= config.forward * along;
        }
    }
    direction
}

/// Reach for `target` (world space) with the hand.
///
/// The arm is bent to the target distance, then swung in its parent frame
/// from its rest direction onto the target. With a controller `pointer`
/// the swing goes through the pointing direction first, which twists the
/// arm to follow the controller while the hand still ends on the target.
pub fn reach_for<T: BoneTree>(
    tree: &T,
    arm: &Arm,
    target: Vec3,
    pointer: Option<Quat>,
    config: &RigConfig,
) -> Option<LimbPose> {
    let (upper, _, _) = arm.joints()?;
    let front = arm.front_axis?;
    let ik = &arm.ik;
    if !ik.initialized {
        return None;
    }

    let root = tree.root();
    let to_target = root.to_local_point(target) - tree.model_position(upper);
    let lengths = arm.lengths;
    let bend = solve_bend(lengths.upper_length, lengths.lower_length, to_target.length());
    if !bend.reached {
        log::trace!("Target {:?} out of reach, arm straightened", target);
    }
    let pose = arm_pose(ik, front, bend);

    let swing = match pointer {
        None => rotation_between(ik.limb_vector, to_target),
        Some(pointer) => {
            let pointing = pointer_direction(&root, pointer, config);
            let first = rotation_between(ik.limb_vector, pointing);
            let second = rotation_between(first * ik.limb_vector, to_target);
            second * first
        }
    };
    let swing = ik.world_quat.inverse() * swing * ik.world_quat;

    Some(LimbPose {
        upper: sanitize((swing * pose.upper).normalize()),
        ..pose
    })
}

/// Bend a leg to `length`; the leg keeps hanging straight down.
///
/// Knees fold backwards: hip forward by `outer`, knee back by `hinge`.
pub fn bend_leg(leg: &Leg, length: f32) -> Option<LimbPose> {
    let front = leg.front_axis?;
    let ik = &leg.ik;
    if !ik.initialized {
        return None;
    }
    let lengths = leg.lengths;
    let bend = solve_bend(lengths.upper_length, lengths.lower_length, length);
    Some(LimbPose {
        upper: sanitize(ik.upper_quat * front.rotation(bend.outer)),
        lower: sanitize(ik.lower_quat * front.rotation(-bend.hinge)),
        bend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::guess_rotation;
    use crate::body::LimbLengths;
    use crate::bone::Skeleton;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-3, "{} != {}", a, b);
    }

    #[test]
    fn test_bend_law() {
        let bend = solve_bend(0.3, 0.3, 0.5);
        assert!(bend.reached);
        assert_close(bend.inner, 56.44_f32.to_radians());
        assert_close(bend.outer, 33.56_f32.to_radians());
        assert_close(bend.hinge, 67.11_f32.to_radians());
    }

    #[test]
    fn test_overreach_clamps_to_full_length() {
        let bend = solve_bend(0.3, 0.3, 0.8);
        assert!(!bend.reached);
        assert_eq!(bend.length, 0.3 + 0.3);
        assert_close(bend.outer, 0.0);
        assert_close(bend.hinge, 0.0);
    }

    #[test]
    fn test_unmeasured_limb_stays_straight() {
        let bend = solve_bend(0.0, 0.0, 0.5);
        assert!(!bend.reached);
        assert_eq!(bend.hinge, 0.0);
    }

    /// Left arm along +X with a probed front axis and captured rest pose
    fn arm_rig() -> (Skeleton, Arm) {
        let mut skeleton = Skeleton::default();
        let upper = skeleton.add_bone("LeftArm", None, Vec3::ZERO).unwrap();
        let lower = skeleton
            .add_bone("LeftForeArm", Some(upper), Vec3::new(0.3, 0.0, 0.0))
            .unwrap();
        let hand = skeleton
            .add_bone("LeftHand", Some(lower), Vec3::new(0.3, 0.0, 0.0))
            .unwrap();
        let front = guess_rotation(&mut skeleton, upper, Vec3::Z, None).unwrap();
        let arm = Arm {
            upper: Some(upper),
            lower: Some(lower),
            hand: Some(hand),
            lengths: LimbLengths::measure(&skeleton, upper, lower, hand),
            front_axis: Some(front),
            ik: LimbIkCache::capture(&skeleton, upper, lower, hand),
            ..Arm::default()
        };
        (skeleton, arm)
    }

    fn apply(skeleton: Skeleton, upper: usize, lower: usize, pose: LimbPose) -> Skeleton {
        skeleton
            .with_rotation(upper, pose.upper)
            .with_rotation(lower, pose.lower)
    }

    #[test]
    fn test_bend_arm_keeps_direction() {
        let (skeleton, arm) = arm_rig();
        let pose = bend_arm(&arm, 0.5).unwrap();
        let skeleton = apply(skeleton, 0, 1, pose);

        let hand = skeleton.model_position(2);
        assert!(hand.distance(Vec3::new(0.5, 0.0, 0.0)) < 1e-4, "{:?}", hand);
        // elbow pulled back, away from the bend direction
        assert!(skeleton.model_position(1).z < 0.0);
    }

    #[test]
    fn test_reach_for_target() {
        let (skeleton, arm) = arm_rig();
        let target = Vec3::new(0.2, 0.3, 0.1);
        let pose = reach_for(&skeleton, &arm, target, None, &RigConfig::default()).unwrap();
        assert!(pose.bend.reached);

        let skeleton = apply(skeleton, 0, 1, pose);
        let hand = skeleton.world_position(2);
        assert!(hand.distance(target) < 1e-4, "{:?}", hand);
    }

    #[test]
    fn test_pointer_twists_but_still_reaches() {
        let (skeleton, arm) = arm_rig();
        let target = Vec3::new(0.3, -0.2, 0.2);
        let config = RigConfig::default();

        let plain = reach_for(&skeleton, &arm, target, None, &config).unwrap();
        let pointed =
            reach_for(&skeleton, &arm, target, Some(Quat::IDENTITY), &config).unwrap();
        assert!(plain.upper.dot(pointed.upper).abs() < 0.9999);

        let skeleton = apply(skeleton, 0, 1, pointed);
        assert!(skeleton.world_position(2).distance(target) < 1e-4);
    }

    #[test]
    fn test_out_of_reach_points_straight_at_target() {
        let (skeleton, arm) = arm_rig();
        let target = Vec3::new(0.0, 2.0, 0.0);
        let pose = reach_for(&skeleton, &arm, target, None, &RigConfig::default()).unwrap();
        assert!(!pose.bend.reached);

        let skeleton = apply(skeleton, 0, 1, pose);
        assert!(skeleton.world_position(2).distance(Vec3::new(0.0, 0.6, 0.0)) < 1e-4);
    }

    #[test]
    fn test_pointer_heuristics() {
        let root = RootTransform::default();
        let behind = Quat::from_rotation_y(-2.5);
        let config = RigConfig::default();

        let direction = pointer_direction(&root, behind, &config);
        assert!(direction.z >= 0.0);
        assert!(direction.x > 0.0);

        let raw = RigConfig {
            mirror_pointer: false,
            clamp_pointer_backwards: false,
            ..RigConfig::default()
        };
        let direction = pointer_direction(&root, behind, &raw);
        assert!(direction.z < 0.0);
        assert!(direction.x < 0.0);

        // mirroring alone is a plain x flip, whichever hand holds the pointer
        let mirrored = RigConfig {
            clamp_pointer_backwards: false,
            ..RigConfig::default()
        };
        let flipped = pointer_direction(&root, behind, &mirrored);
        assert!(flipped.distance(direction * Vec3::new(-1.0, 1.0, 1.0)) < 1e-5);
    }

    #[test]
    fn test_uninitialized_limb_is_skipped() {
        let (_, mut arm) = arm_rig();
        arm.ik = LimbIkCache::default();
        assert!(bend_arm(&arm, 0.4).is_none());
        assert!(bend_leg(&Leg::default(), 0.4).is_none());
    }

    #[test]
    fn test_bend_leg_folds_knee_forward() {
        let mut skeleton = Skeleton::default();
        let upper = skeleton
            .add_bone("LeftUpLeg", None, Vec3::new(0.1, 1.0, 0.0))
            .unwrap();
        let lower = skeleton
            .add_bone("LeftLeg", Some(upper), Vec3::new(0.0, -0.4, 0.0))
            .unwrap();
        let foot = skeleton
            .add_bone("LeftFoot", Some(lower), Vec3::new(0.0, -0.4, 0.0))
            .unwrap();
        let leg = Leg {
            upper: Some(upper),
            lower: Some(lower),
            foot: vec![foot],
            lengths: LimbLengths::measure(&skeleton, upper, lower, foot),
            front_axis: Some(guess_rotation(&mut skeleton, upper, Vec3::Z, None).unwrap()),
            ik: LimbIkCache::capture(&skeleton, upper, lower, foot),
        };

        let pose = bend_leg(&leg, 0.6).unwrap();
        let skeleton = apply(skeleton, upper, lower, pose);

        let hip = skeleton.model_position(upper);
        let ankle = skeleton.model_position(foot);
        assert_close(hip.distance(ankle), 0.6);
        assert!(ankle.y < hip.y);
        assert!(skeleton.model_position(lower).z > 0.0);
    }
}
