//! Skeleton classification.
//!
//! Walks the bone tree once, depth first, and tags bones into a [`BodyMap`]
//! using bone names (see [`naming`]) and topology. Rigs come from arbitrary
//! tools, so nothing here is fatal: bones that fit nowhere are logged and
//! left alone, and ambiguous bones fall back to the best guess ("assume
//! hips", "assume spine", "assume neck").
//!
//! Every bone is visited at most once. Subtrees that carry no role (toe ends,
//! head tops, breast helpers) are still marked so that
//! [`BodyMap::unprocessed`] only lists bones the walk never reached.

pub mod naming;

use crate::body::{Arm, BodyMap, Finger, Fingers, HeadRig, Leg, Side};
use crate::bone::BoneTree;
use crate::math::Vec3;
use naming::Category;

/// Longest unbranched chain still accepted as an unnamed neck → head
const NECK_CHAIN_DEPTH: usize = 3;

/// Classify `tree` into a fresh [`BodyMap`].
///
/// `forward` is the avatar-root direction the character faces; it is only
/// used for the head reference vector.
pub fn classify<T: BoneTree>(tree: &T, forward: Vec3) -> BodyMap {
    let mut classifier = BoneClassifier::new(tree, forward);
    classifier.run();
    classifier.body
}

/// Single-pass state for one classification run
pub struct BoneClassifier<'a, T: BoneTree> {
    tree: &'a T,
    forward: Vec3,
    body: BodyMap,
    /// Processed-bone registry, indexed by bone
    visited: Vec<bool>,
}

impl<'a, T: BoneTree> BoneClassifier<'a, T> {
    pub fn new(tree: &'a T, forward: Vec3) -> Self {
        Self {
            tree,
            forward,
            body: BodyMap::default(),
            visited: vec![false; tree.bone_count()],
        }
    }

    pub fn run(&mut self) {
        let tree = self.tree;
        if tree.bone_count() == 0 {
            log::info!("No skeleton, treating avatar as a static mesh");
            return;
        }

        for root in tree.roots() {
            self.process_bone(root);
        }

        self.body.processed = true;
        self.body.unprocessed = (0..tree.bone_count())
            .filter(|&bone| !self.visited[bone])
            .collect();

        log::info!(
            "Classified {} bones: hips {:?}, spine {:?}, neck {:?}, head {:?}",
            tree.bone_count(),
            self.body.hips,
            self.body.spine,
            self.body.neck,
            self.body.head
        );
        if !self.body.unprocessed.is_empty() {
            log::debug!("Unprocessed bones: {:?}", self.body.unprocessed);
        }
    }

    /// Register a bone; false (and a log line) if it was already processed
    fn visit(&mut self, bone: usize) -> bool {
        if self.visited[bone] {
            log::warn!("Bone {} already processed, skipping", self.tree.name(bone));
            return false;
        }
        self.visited[bone] = true;
        true
    }

    /// Mark a whole subtree processed without classifying it
    fn mark_subtree(&mut self, bone: usize) -> usize {
        let tree = self.tree;
        let mut count = 0;
        let mut stack = vec![bone];
        while let Some(current) = stack.pop() {
            if !self.visited[current] {
                self.visited[current] = true;
                count += 1;
            }
            stack.extend_from_slice(tree.children(current));
        }
        count
    }

    fn child_count(&self, bone: usize) -> usize {
        self.tree.children(bone).len()
    }

    fn is(&self, bone: usize, category: Category) -> bool {
        naming::is(self.tree.name(bone), self.child_count(bone), category)
    }

    fn matches_any(&self, bone: usize, categories: &[Category]) -> bool {
        naming::first_match(self.tree.name(bone), self.child_count(bone), categories).is_some()
    }

    /// Child that continues a limb chain: the first one with children of its
    /// own (skipping leaf helpers such as twist bones), else the first one.
    fn chain_child(&self, bone: usize) -> Option<usize> {
        let children = self.tree.children(bone);
        children
            .iter()
            .copied()
            .find(|&c| !self.tree.children(c).is_empty())
            .or_else(|| children.first().copied())
    }

    /// Side named by the bone, its first child or its first grandchild
    fn chain_side(&self, bone: usize) -> Option<Side> {
        let tree = self.tree;
        let child = tree.children(bone).first().copied();
        let grandchild = child.and_then(|c| tree.children(c).first().copied());
        [Some(bone), child, grandchild]
            .into_iter()
            .flatten()
            .find_map(|b| naming::side(tree.name(b)))
    }

    /// Unbranched chain no deeper than `depth` bones
    fn is_short_chain(&self, bone: usize, depth: usize) -> bool {
        let mut current = bone;
        for _ in 0..depth {
            match self.tree.children(current) {
                [] => return true,
                [only] => current = *only,
                _ => return false,
            }
        }
        false
    }

    /// Root search: descend until something looks like hips
    fn process_bone(&mut self, bone: usize) {
        let tree = self.tree;
        if !self.visit(bone) {
            return;
        }

        if self.body.root.is_none() && self.is(bone, Category::Root) {
            log::trace!("Root joint: {}", tree.name(bone));
            self.body.root = Some(bone);
        }

        if self.body.hips.is_none() && self.is(bone, Category::Hips) {
            log::debug!("Hips: {}", tree.name(bone));
            self.body.hips = Some(bone);
            self.process_hips(bone);
        } else {
            for &child in tree.children(bone) {
                self.process_bone(child);
            }
        }
    }

    /// Hips fan out into legs and the spine, possibly through helper bones
    fn process_hips(&mut self, hips: usize) {
        let tree = self.tree;
        for &child in tree.children(hips) {
            let name = tree.name(child);
            if self.is(child, Category::Spine) {
                self.process_spine(child);
            } else if let Some(side) = self.leg_side(child) {
                self.process_leg(side, child);
            } else if self.child_count(child) >= 3 {
                log::debug!("Assuming hips: {}", name);
                if self.visit(child) {
                    self.process_hips(child);
                }
            } else {
                log::debug!("Assuming spine: {}", name);
                self.process_spine(child);
            }
        }
    }

    /// Side of a hips child that should be treated as a leg
    fn leg_side(&self, bone: usize) -> Option<Side> {
        let tree = self.tree;
        if let Some(side) = naming::side(tree.name(bone)) {
            return Some(side);
        }

        // Unsided bone: only a leg if it is not a branching helper and it or
        // its first descendants say so
        if self.child_count(bone) >= 3 {
            return None;
        }
        let child = tree.children(bone).first().copied();
        let grandchild = child.and_then(|c| tree.children(c).first().copied());
        let leggy = [Some(bone), child, grandchild]
            .into_iter()
            .flatten()
            .any(|b| self.is(b, Category::Leg));
        if !leggy {
            return None;
        }

        self.chain_side(bone).or_else(|| {
            log::trace!("Unsided leg {}, taking first free slot", tree.name(bone));
            Side::BOTH
                .into_iter()
                .find(|&side| self.body.leg(side).upper.is_none())
        })
    }

    fn process_spine(&mut self, bone: usize) {
        let tree = self.tree;
        if !self.visit(bone) {
            return;
        }
        self.body.spine.push(bone);

        let children = tree.children(bone);
        match children {
            [] => {}
            [only] if self.matches_any(*only, &[Category::Neck, Category::Head]) => {
                self.process_neck(*only, bone);
            }
            [only] => self.process_spine(*only),
            _ => {
                let upper_body = children
                    .iter()
                    .filter(|&&c| {
                        self.matches_any(
                            c,
                            &[
                                Category::Neck,
                                Category::Head,
                                Category::Shoulder,
                                Category::Arm,
                            ],
                        ) || naming::side(tree.name(c)).is_some()
                    })
                    .count();

                if children.len() >= 3 && upper_body >= 3 {
                    self.process_shoulders(bone);
                } else {
                    for &child in children {
                        if self.matches_any(child, &[Category::Neck, Category::Head]) {
                            self.process_neck(child, bone);
                        } else if self.is(child, Category::Breast) {
                            let count = self.mark_subtree(child);
                            log::trace!("Skipping {} ({} bones)", tree.name(child), count);
                        } else {
                            self.process_spine(child);
                        }
                    }
                }
            }
        }
    }

    /// Top of the spine: neck, head and both arm roots hang off `bone`
    fn process_shoulders(&mut self, bone: usize) {
        let tree = self.tree;
        let mut unnamed = Vec::new();

        for &child in tree.children(bone) {
            if self.matches_any(child, &[Category::Neck, Category::Head]) {
                self.process_neck(child, bone);
            } else if self.is(child, Category::Breast) {
                let count = self.mark_subtree(child);
                log::trace!("Skipping {} ({} bones)", tree.name(child), count);
            } else if let Some(side) = self.chain_side(child) {
                self.process_arm(side, child);
            } else {
                unnamed.push(child);
            }
        }

        // Named bones first, then fill the remaining roles by topology
        for child in unnamed {
            let name = tree.name(child);
            if self.body.neck.is_none() && self.is_short_chain(child, NECK_CHAIN_DEPTH) {
                log::debug!("Assuming neck: {}", name);
                self.process_neck(child, bone);
            } else if let Some(side) = Side::BOTH
                .into_iter()
                .find(|&side| self.body.arm(side).upper.is_none())
            {
                log::debug!("Assuming {:?} arm: {}", side, name);
                self.process_arm(side, child);
            } else {
                log::debug!("Assuming spine: {}", name);
                self.process_spine(child);
            }
        }
    }

    /// Tag neck and head. `parent` stands in as the neck when the rig goes
    /// straight from the spine to the head.
    fn process_neck(&mut self, bone: usize, parent: usize) {
        let tree = self.tree;
        if self.body.neck.is_some() {
            let count = self.mark_subtree(bone);
            log::warn!(
                "Second neck/head {} ignored ({} bones)",
                tree.name(bone),
                count
            );
            return;
        }
        if !self.visit(bone) {
            return;
        }

        let children = tree.children(bone);
        let is_head = self.is(bone, Category::Head) && !self.is(bone, Category::Neck);
        let (neck, head) = if is_head && children.len() <= 1 {
            (parent, bone)
        } else {
            let head = children
                .iter()
                .copied()
                .find(|&c| self.is(c, Category::Head))
                .or_else(|| children.first().copied())
                .unwrap_or(bone);
            (bone, head)
        };

        if head != bone {
            if !self.visit(head) {
                log::warn!("Head {} already claimed, neck left untagged", tree.name(head));
                return;
            }
            // shoulders hanging off the neck
            for &child in children.iter().filter(|&&c| c != head) {
                match naming::side(tree.name(child)) {
                    Some(side) => self.process_arm(side, child),
                    None => {
                        self.mark_subtree(child);
                    }
                }
            }
        }
        for &child in tree.children(head) {
            self.mark_subtree(child);
        }

        log::debug!("Neck: {}, head: {}", tree.name(neck), tree.name(head));
        self.body.neck = Some(neck);
        self.body.head = Some(head);
        self.body.head_rig = Some(HeadRig::capture(tree, neck, head, self.forward));
    }

    /// Shoulder → upper arm → forearm → hand, then fingers
    fn process_arm(&mut self, side: Side, bone: usize) {
        let tree = self.tree;
        if self.body.arm(side).upper.is_some() {
            let count = self.mark_subtree(bone);
            log::warn!(
                "Second {:?} arm {} ignored ({} bones)",
                side,
                tree.name(bone),
                count
            );
            return;
        }

        let mut chain = Vec::with_capacity(4);
        let mut current = Some(bone);
        while let Some(b) = current {
            if !self.visit(b) {
                break;
            }
            chain.push(b);
            if chain.len() == 4 || self.is(b, Category::Hand) {
                break;
            }
            current = self.chain_child(b);
            for &other in tree.children(b) {
                if Some(other) != current {
                    self.mark_subtree(other);
                }
            }
        }

        let starts_at_shoulder = self.is(bone, Category::Shoulder);
        let mut arm = Arm::default();
        match chain.as_slice() {
            [shoulder, upper, lower, hand] => {
                arm.shoulder = Some(*shoulder);
                arm.upper = Some(*upper);
                arm.lower = Some(*lower);
                arm.hand = Some(*hand);
            }
            [shoulder, upper, lower] if starts_at_shoulder => {
                log::debug!("{:?} arm has no hand", side);
                arm.shoulder = Some(*shoulder);
                arm.upper = Some(*upper);
                arm.lower = Some(*lower);
            }
            [upper, lower, hand] => {
                arm.upper = Some(*upper);
                arm.lower = Some(*lower);
                arm.hand = Some(*hand);
            }
            partial => {
                log::debug!("Incomplete {:?} arm: {:?}", side, partial);
                arm.upper = partial.first().copied();
                arm.lower = partial.get(1).copied();
            }
        }

        if let Some(hand) = arm.hand {
            arm.fingers = self.process_fingers(hand);
            log::trace!("{:?} hand has {} fingers", side, arm.fingers.count());
        }

        *self.body.arm_mut(side) = arm;
    }

    fn process_fingers(&mut self, hand: usize) -> Fingers {
        let tree = self.tree;
        let mut fingers = Fingers::default();
        let mut unnamed = Vec::new();

        for &child in tree.children(hand) {
            let named = naming::finger(tree.name(child)).or_else(|| {
                tree.children(child)
                    .first()
                    .and_then(|&c| naming::finger(tree.name(c)))
            });
            let chain = self.finger_chain(child);
            match named {
                Some(finger) if fingers.get(finger).is_empty() => {
                    *fingers.get_mut(finger) = chain;
                }
                _ => unnamed.push(chain),
            }
        }

        for chain in unnamed {
            match Finger::ALL
                .into_iter()
                .find(|&f| fingers.get(f).is_empty())
            {
                Some(finger) => *fingers.get_mut(finger) = chain,
                None => log::trace!("Extra finger chain {:?} ignored", chain),
            }
        }
        fingers
    }

    /// Finger joints while the chain stays unbranched
    fn finger_chain(&mut self, bone: usize) -> Vec<usize> {
        let tree = self.tree;
        let mut chain = Vec::new();
        let mut current = bone;
        loop {
            if !self.visit(current) {
                break;
            }
            chain.push(current);
            match tree.children(current) {
                [only] => current = *only,
                rest => {
                    for &child in rest {
                        self.mark_subtree(child);
                    }
                    break;
                }
            }
        }
        chain
    }

    /// Thigh → shin → foot chain
    fn process_leg(&mut self, side: Side, bone: usize) {
        let tree = self.tree;
        if self.body.leg(side).upper.is_some() {
            let count = self.mark_subtree(bone);
            log::warn!(
                "Second {:?} leg {} ignored ({} bones)",
                side,
                tree.name(bone),
                count
            );
            return;
        }
        if !self.visit(bone) {
            return;
        }

        let mut leg = Leg {
            upper: Some(bone),
            ..Leg::default()
        };
        let lower = self.chain_child(bone);
        for &other in tree.children(bone) {
            if Some(other) != lower {
                self.mark_subtree(other);
            }
        }

        match lower {
            Some(lower) if self.visit(lower) => {
                leg.lower = Some(lower);
                let foot = self.chain_child(lower);
                for &other in tree.children(lower) {
                    if Some(other) != foot {
                        self.mark_subtree(other);
                    }
                }
                if let Some(foot) = foot {
                    self.process_foot(foot, &mut leg.foot);
                }
            }
            _ => log::debug!("{:?} leg {} has no lower segment", side, tree.name(bone)),
        }

        log::debug!("{:?} leg: {:?} {:?} {:?}", side, leg.upper, leg.lower, leg.foot);
        *self.body.leg_mut(side) = leg;
    }

    /// Foot joints while exactly one child continues the chain
    fn process_foot(&mut self, bone: usize, foot: &mut Vec<usize>) {
        let tree = self.tree;
        if !self.visit(bone) {
            return;
        }
        foot.push(bone);
        match tree.children(bone) {
            [only] => self.process_foot(*only, foot),
            rest => {
                for &child in rest {
                    self.mark_subtree(child);
                }
            }
        }
    }
}
