//! Empirical bend-axis discovery.
//!
//! Rigs do not agree on which local axis bends a joint which way. Instead of
//! guessing from conventions, [`guess_rotation`] tries a quarter turn about
//! each candidate axis and watches where the first child joint goes.

use crate::body::LimbAxis;
use crate::bone::BoneTree;
use crate::error::RigError;
use crate::math::{Axis, Vec3};
use std::f32::consts::FRAC_PI_2;

/// Find the local axis and sign that move the bone's first child towards
/// `reference` (world space) the most.
///
/// With `restrict` only that axis is tried, which keeps mirrored limbs on the
/// same axis as their counterpart. The bone's local rotation is restored
/// exactly after every trial.
pub fn guess_rotation<T: BoneTree>(
    tree: &mut T,
    bone: usize,
    reference: Vec3,
    restrict: Option<Axis>,
) -> Result<LimbAxis, RigError> {
    let count = tree.bone_count();
    if bone >= count {
        return Err(RigError::BoneOutOfRange { bone, count });
    }
    let Some(&child) = tree.children(bone).first() else {
        return Err(RigError::MissingChild {
            bone,
            name: tree.name(bone).to_string(),
        });
    };

    let axes = match restrict {
        Some(axis) => vec![axis],
        None => Axis::ALL.to_vec(),
    };

    let original = tree.local_rotation(bone);
    let before = tree.world_position(child);

    let mut best: Option<(f32, LimbAxis)> = None;
    for axis in axes {
        for sign in [1.0, -1.0] {
            tree.set_local_rotation(bone, original * axis.rotation(FRAC_PI_2 * sign));
            let score = (tree.world_position(child) - before).dot(reference);
            tree.set_local_rotation(bone, original);

            if best.is_none_or(|(top, _)| score > top) {
                best = Some((score, LimbAxis { axis, sign }));
            }
        }
    }

    // `axes` is never empty
    let (score, found) = best.ok_or_else(|| RigError::MissingChild {
        bone,
        name: tree.name(bone).to_string(),
    })?;
    if score <= 0.0 {
        log::warn!(
            "No axis of {} moves towards {:?}, using {:?}",
            tree.name(bone),
            reference,
            found
        );
    } else {
        log::trace!("{} bends {:?} about {:?}", tree.name(bone), reference, found);
    }
    Ok(found)
}
