//! Head gaze solving.
//!
//! The head reference ([`HeadRig`]) is captured once, when the classifier
//! tags neck and head. [`look_at`] then turns a world point into a single
//! local rotation for the head bone.

use crate::body::HeadRig;
use crate::bone::BoneTree;
use crate::math::{align_rotation, sanitize, Mat3, Quat, Vec3, EPSILON};

impl HeadRig {
    /// Capture the rest-pose head reference.
    ///
    /// `forward` is the avatar-root direction the character faces.
    pub fn capture<T: BoneTree>(tree: &T, neck: usize, head: usize, forward: Vec3) -> Self {
        let neck_z = tree.model_rotation(neck) * Vec3::Z;
        let head_z = tree.model_rotation(head) * Vec3::Z;
        let axis_fix = if (neck_z.z >= 0.0) == (head_z.z >= 0.0) {
            1.0
        } else {
            -1.0
        };
        if axis_fix < 0.0 {
            log::debug!(
                "Neck {} and head {} disagree on local Z, applying axis fix",
                tree.name(neck),
                tree.name(head)
            );
        }

        let head_quat_inv = tree.model_rotation(head).inverse();
        Self {
            axis_fix,
            head_quat: tree.local_rotation(head),
            head_quat_inv,
            head_target: head_quat_inv * forward,
        }
    }

    /// Whether neck and head share an axis convention
    pub fn axes_agree(&self) -> bool {
        self.axis_fix == 1.0
    }
}

/// Local head rotation that faces `target` (world space).
///
/// The aim is solved in the head's own rest frame, so it holds whatever axis
/// convention the head bone uses. With `axis_fix` set, a head whose axes
/// disagree with the neck is also kept level: its rest up stays in the plane
/// of `up` (avatar root space) and the gaze direction, so the shortest arc
/// cannot roll it. A target at the head itself has no direction and resolves
/// to the fallback rotation instead of NaN.
pub fn look_at<T: BoneTree>(
    tree: &T,
    rig: &HeadRig,
    head: usize,
    target: Vec3,
    up: Vec3,
    axis_fix: bool,
) -> Quat {
    let direction = tree.root().to_local_point(target) - tree.model_position(head);

    if axis_fix && !rig.axes_agree() {
        if let Some(model) = level_aim(rig, direction, up) {
            // parent⁻¹ · model, with parent = rest model · head_quat⁻¹
            return sanitize((rig.head_quat * rig.head_quat_inv * model).normalize());
        }
    }

    let local = rig.head_quat_inv * direction;
    let delta = align_rotation(rig.head_target, local);
    sanitize((rig.head_quat * delta).normalize())
}

/// Avatar-root rotation taking the head's rest forward onto `direction`
/// with its rest up kept towards `up`. None when either pair is parallel.
fn level_aim(rig: &HeadRig, direction: Vec3, up: Vec3) -> Option<Quat> {
    let forward = rig.head_target.normalize_or_zero();
    let head_up = reject(rig.head_quat_inv * up, forward)?;
    let facing = direction.normalize_or_zero();
    let facing_up = reject(up, facing)?;

    let from = Mat3::from_cols(forward, head_up, forward.cross(head_up));
    let to = Mat3::from_cols(facing, facing_up, facing.cross(facing_up));
    Some(Quat::from_mat3(&(to * from.transpose())))
}

/// Unit part of `v` orthogonal to unit `axis`
fn reject(v: Vec3, axis: Vec3) -> Option<Vec3> {
    if axis == Vec3::ZERO {
        return None;
    }
    let rest = v - axis * axis.dot(v);
    (rest.length_squared() > EPSILON).then(|| rest.normalize())
}
