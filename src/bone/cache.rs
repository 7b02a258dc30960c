use glam::{Quat, Vec3A};

/// Dirty flags for lazy forward kinematics evaluation.
/// Bitset where bit i corresponds to bone index i.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyFlags(Vec<u64>);

impl DirtyFlags {
    /// Create with `count` bones marked dirty
    pub fn all_dirty(count: usize) -> Self {
        let mut words = vec![u64::MAX; count.div_ceil(64)];
        if let Some(last) = words.last_mut() {
            let tail = count % 64;
            if tail != 0 {
                *last = (1u64 << tail) - 1;
            }
        }
        Self(words)
    }

    /// Check if a bone is dirty (needs recomputation)
    #[inline]
    pub fn is_dirty(&self, bone: usize) -> bool {
        self.0
            .get(bone / 64)
            .is_some_and(|word| word & (1 << (bone % 64)) != 0)
    }

    /// Check if any bone is dirty
    #[inline]
    pub fn is_any_dirty(&self) -> bool {
        self.0.iter().any(|&word| word != 0)
    }

    #[inline]
    pub fn mark(&mut self, bone: usize) {
        if let Some(word) = self.0.get_mut(bone / 64) {
            *word |= 1 << (bone % 64);
        }
    }

    #[inline]
    pub fn clear(&mut self, bone: usize) {
        if let Some(word) = self.0.get_mut(bone / 64) {
            *word &= !(1 << (bone % 64));
        }
    }

    pub fn clear_all(&mut self) {
        self.0.iter_mut().for_each(|word| *word = 0);
    }
}

/// Cache for forward kinematics results, in avatar-root space
#[derive(Debug, Clone)]
pub struct PoseCache {
    pub model_positions: Vec<Vec3A>,
    pub model_rotations: Vec<Quat>,

    /// Dirty flags for lazy evaluation
    pub dirty: DirtyFlags,
}

impl PoseCache {
    pub fn new(count: usize) -> Self {
        Self {
            model_positions: vec![Vec3A::ZERO; count],
            model_rotations: vec![Quat::IDENTITY; count],
            dirty: DirtyFlags::all_dirty(count),
        }
    }
}
