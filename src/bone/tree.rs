use crate::math::{Affine3A, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Placement of the avatar root (the mesh the skeleton hangs off) in the world.
///
/// Bone positions handed around by [`BoneTree`] are in avatar-root ("model")
/// space; this converts between that space and the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for RootTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl RootTransform {
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// World point into avatar-root space
    pub fn to_local_point(&self, world: Vec3) -> Vec3 {
        self.to_affine().inverse().transform_point3(world)
    }

    /// Avatar-root point into world space
    pub fn to_world_point(&self, local: Vec3) -> Vec3 {
        self.to_affine().transform_point3(local)
    }

    /// World direction into avatar-root space (rotation only, no scale)
    pub fn to_local_direction(&self, world: Vec3) -> Vec3 {
        self.rotation.inverse() * world
    }

    /// Avatar-root direction into world space (rotation only, no scale)
    pub fn to_world_direction(&self, local: Vec3) -> Vec3 {
        self.rotation * local
    }
}

/// Adapter over an engine skeleton.
///
/// Bones are addressed by index. Implementations own the bone data; the rig
/// code only keeps indices and reads or writes local rotations through this
/// trait. `model_*` accessors are in avatar-root space and must reflect the
/// latest `set_local_rotation` calls.
pub trait BoneTree {
    fn bone_count(&self) -> usize;

    fn name(&self, bone: usize) -> &str;

    fn parent(&self, bone: usize) -> Option<usize>;

    fn children(&self, bone: usize) -> &[usize];

    fn local_rotation(&self, bone: usize) -> Quat;

    fn set_local_rotation(&mut self, bone: usize, rotation: Quat);

    /// Joint position in avatar-root space
    fn model_position(&self, bone: usize) -> Vec3;

    /// Accumulated rotation in avatar-root space
    fn model_rotation(&self, bone: usize) -> Quat;

    fn root(&self) -> RootTransform;

    fn set_root_position(&mut self, position: Vec3);

    /// Joint position in world space
    fn world_position(&self, bone: usize) -> Vec3 {
        self.root().to_world_point(self.model_position(bone))
    }

    /// Accumulated rotation in world space
    fn world_rotation(&self, bone: usize) -> Quat {
        self.root().rotation * self.model_rotation(bone)
    }

    /// Rotation of the bone's parent frame in avatar-root space
    fn parent_model_rotation(&self, bone: usize) -> Quat {
        self.parent(bone)
            .map_or(Quat::IDENTITY, |parent| self.model_rotation(parent))
    }

    fn bone_index_by_name(&self, name: &str) -> Option<usize> {
        (0..self.bone_count()).find(|&bone| self.name(bone) == name)
    }

    /// Bones without a parent, in index order
    fn roots(&self) -> Vec<usize> {
        (0..self.bone_count())
            .filter(|&bone| self.parent(bone).is_none())
            .collect()
    }
}
