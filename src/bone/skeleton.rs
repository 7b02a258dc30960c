use super::cache::PoseCache;
use super::tree::{BoneTree, RootTransform};
use crate::error::RigError;
use glam::{Quat, Vec3, Vec3A};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// A joint of an in-memory [`Skeleton`]
#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Offset from the parent joint, in the parent's frame
    pub translation: Vec3,
    /// Local rotation (relative to parent)
    pub rotation: Quat,
}

/// One bone of a skeleton description, as sent by the host engine
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoneDesc {
    pub name: String,
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub translation: Vec3,
    #[serde(default)]
    pub rotation: Quat,
}

/// Serialized skeleton: the bone list in engine order plus the root placement
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SkeletonDesc {
    pub bones: Vec<BoneDesc>,
    #[serde(default)]
    pub root: RootTransform,
}

/// In-memory bone tree with lazily evaluated forward kinematics.
///
/// Each bone stores a local rotation and a fixed offset from its parent.
/// Model-space transforms are computed on demand and cached; writing a local
/// rotation dirties the bone and its whole subtree.
///
/// Uses interior mutability (`RefCell`) so read-only [`BoneTree`] queries can
/// fill the cache.
#[derive(Debug, Clone)]
pub struct Skeleton {
    bones: Vec<Bone>,
    root: RootTransform,
    cache: RefCell<PoseCache>,
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::new(RootTransform::default())
    }
}

impl Skeleton {
    /// Empty skeleton placed at `root`
    pub fn new(root: RootTransform) -> Self {
        Self {
            bones: Vec::new(),
            root,
            cache: RefCell::new(PoseCache::new(0)),
        }
    }

    /// Append a bone with identity rotation and return its index
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        translation: Vec3,
    ) -> Result<usize, RigError> {
        let index = self.bones.len();
        if let Some(parent) = parent {
            if parent >= index {
                return Err(RigError::BoneOutOfRange {
                    bone: parent,
                    count: index,
                });
            }
            self.bones[parent].children.push(index);
        }
        self.bones.push(Bone {
            name: name.into(),
            parent,
            children: Vec::new(),
            translation,
            rotation: Quat::IDENTITY,
        });
        *self.cache.borrow_mut() = PoseCache::new(self.bones.len());
        Ok(index)
    }

    /// Build from a description. Parents may appear after their children but
    /// the parent links must form a forest.
    pub fn from_desc(desc: SkeletonDesc) -> Result<Self, RigError> {
        let count = desc.bones.len();
        let mut bones: Vec<Bone> = desc
            .bones
            .into_iter()
            .map(|b| Bone {
                name: b.name,
                parent: b.parent,
                children: Vec::new(),
                translation: b.translation,
                rotation: b.rotation.normalize(),
            })
            .collect();

        for index in 0..count {
            let Some(parent) = bones[index].parent else {
                continue;
            };
            if parent >= count || parent == index {
                return Err(RigError::InvalidSkeleton {
                    reason: format!("bone {index} has invalid parent {parent}"),
                });
            }
            bones[parent].children.push(index);
        }

        // A chain longer than the bone count can only be a cycle
        for start in 0..count {
            let mut current = bones[start].parent;
            let mut depth = 0;
            while let Some(parent) = current {
                depth += 1;
                if depth > count {
                    return Err(RigError::InvalidSkeleton {
                        reason: format!("parent cycle through bone {start}"),
                    });
                }
                current = bones[parent].parent;
            }
        }

        Ok(Self {
            cache: RefCell::new(PoseCache::new(count)),
            bones,
            root: desc.root,
        })
    }

    /// Parse a JSON [`SkeletonDesc`]
    pub fn from_json(json: &str) -> Result<Self, RigError> {
        let desc: SkeletonDesc = serde_json::from_str(json)?;
        Self::from_desc(desc)
    }

    /// Return the skeleton with the specified bone rotation (Functional Set)
    pub fn with_rotation(mut self, bone: usize, rotation: Quat) -> Self {
        self.set_local_rotation(bone, rotation);
        self
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Current local rotations, in bone order
    pub fn local_rotations(&self) -> Vec<Quat> {
        self.bones.iter().map(|b| b.rotation).collect()
    }

    /// Set the full root placement
    pub fn set_root(&mut self, root: RootTransform) {
        self.root = root;
    }

    /// Mark a bone and its whole subtree for recomputation
    fn mark_dirty(&self, bone: usize) {
        let mut cache = self.cache.borrow_mut();
        let mut stack = vec![bone];
        while let Some(current) = stack.pop() {
            cache.dirty.mark(current);
            stack.extend_from_slice(&self.bones[current].children);
        }
    }

    /// Ensure a bone's model transform is computed
    fn ensure_computed(&self, bone: usize) {
        if !self.cache.borrow().dirty.is_dirty(bone) {
            return;
        }

        // A clean bone implies clean ancestors, so stop at the first one
        let mut chain = vec![bone];
        let mut current = self.bones[bone].parent;
        while let Some(parent) = current {
            if !self.cache.borrow().dirty.is_dirty(parent) {
                break;
            }
            chain.push(parent);
            current = self.bones[parent].parent;
        }

        for &b in chain.iter().rev() {
            self.compute_bone(b);
        }
    }

    /// Compute the model transform for a single bone; its parent must be clean
    fn compute_bone(&self, bone: usize) {
        let def = &self.bones[bone];
        let mut cache = self.cache.borrow_mut();

        let (parent_pos, parent_rot) = match def.parent {
            Some(parent) => (
                Vec3::from(cache.model_positions[parent]),
                cache.model_rotations[parent],
            ),
            None => (Vec3::ZERO, Quat::IDENTITY),
        };

        cache.model_positions[bone] = Vec3A::from(parent_pos + parent_rot * def.translation);
        cache.model_rotations[bone] = parent_rot * def.rotation;
        cache.dirty.clear(bone);
    }

    /// Force recomputation of all bones
    pub fn compute_all(&self) {
        for bone in 0..self.bones.len() {
            self.ensure_computed(bone);
        }
    }
}

impl BoneTree for Skeleton {
    fn bone_count(&self) -> usize {
        self.bones.len()
    }

    fn name(&self, bone: usize) -> &str {
        &self.bones[bone].name
    }

    fn parent(&self, bone: usize) -> Option<usize> {
        self.bones[bone].parent
    }

    fn children(&self, bone: usize) -> &[usize] {
        &self.bones[bone].children
    }

    fn local_rotation(&self, bone: usize) -> Quat {
        self.bones[bone].rotation
    }

    fn set_local_rotation(&mut self, bone: usize, rotation: Quat) {
        if self.bones[bone].rotation != rotation {
            self.bones[bone].rotation = rotation;
            self.mark_dirty(bone);
        }
    }

    fn model_position(&self, bone: usize) -> Vec3 {
        self.ensure_computed(bone);
        Vec3::from(self.cache.borrow().model_positions[bone])
    }

    fn model_rotation(&self, bone: usize) -> Quat {
        self.ensure_computed(bone);
        self.cache.borrow().model_rotations[bone]
    }

    fn root(&self) -> RootTransform {
        self.root
    }

    fn set_root_position(&mut self, position: Vec3) {
        self.root.position = position;
    }
}
