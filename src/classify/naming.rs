//! Bone name heuristics.
//!
//! Every substring the classifier looks for lives in [`NAME_RULES`], in
//! priority order. A rule matches when its pattern occurs in the lower-cased
//! bone name and its child-count predicate holds. When several categories are
//! acceptable at a given step, the first matching row wins.

use crate::body::{Finger, Side};

/// What a bone name can say about a bone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Skeleton root marker exported by some tools
    Root,
    Hips,
    Spine,
    Neck,
    Head,
    Shoulder,
    Arm,
    Hand,
    Leg,
    /// Soft-body helper bones; never classified
    Breast,
    Finger(Finger),
}

/// Constraint on the number of children a matching bone must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildCount {
    Any,
    AtLeast(usize),
}

impl ChildCount {
    pub const fn accepts(self, count: usize) -> bool {
        match self {
            ChildCount::Any => true,
            ChildCount::AtLeast(min) => count >= min,
        }
    }
}

/// One row of the name table
#[derive(Debug, Clone, Copy)]
pub struct NameRule {
    pub pattern: &'static str,
    pub category: Category,
    pub children: ChildCount,
}

const fn rule(pattern: &'static str, category: Category, children: ChildCount) -> NameRule {
    NameRule {
        pattern,
        category,
        children,
    }
}

/// Ordered name table. Earlier rows take priority.
pub const NAME_RULES: &[NameRule] = &[
    rule("rootjoint", Category::Root, ChildCount::Any),
    // hips must fan out into legs and spine
    rule("pelvis", Category::Hips, ChildCount::AtLeast(3)),
    rule("hip", Category::Hips, ChildCount::AtLeast(3)),
    rule("spine", Category::Hips, ChildCount::AtLeast(3)),
    rule("root", Category::Hips, ChildCount::AtLeast(3)),
    rule("breast", Category::Breast, ChildCount::Any),
    rule("spine", Category::Spine, ChildCount::Any),
    rule("body", Category::Spine, ChildCount::Any),
    rule("neck", Category::Neck, ChildCount::Any),
    rule("head", Category::Head, ChildCount::Any),
    rule("shoulder", Category::Shoulder, ChildCount::Any),
    rule("clavicle", Category::Shoulder, ChildCount::Any),
    rule("collar", Category::Shoulder, ChildCount::Any),
    rule("arm", Category::Arm, ChildCount::Any),
    rule("hand", Category::Hand, ChildCount::Any),
    rule("wrist", Category::Hand, ChildCount::Any),
    rule("upleg", Category::Leg, ChildCount::Any),
    rule("thigh", Category::Leg, ChildCount::Any),
    rule("leg", Category::Leg, ChildCount::Any),
    rule("thumb", Category::Finger(Finger::Thumb), ChildCount::Any),
    rule("index", Category::Finger(Finger::Index), ChildCount::Any),
    rule("middle", Category::Finger(Finger::Middle), ChildCount::Any),
    rule("ring", Category::Finger(Finger::Ring), ChildCount::Any),
    rule("pinky", Category::Finger(Finger::Pinky), ChildCount::Any),
    rule("little", Category::Finger(Finger::Pinky), ChildCount::Any),
];

/// First table row among `wanted` categories that matches the bone
pub fn first_match(name: &str, child_count: usize, wanted: &[Category]) -> Option<Category> {
    let name = name.to_lowercase();
    NAME_RULES
        .iter()
        .filter(|r| wanted.contains(&r.category))
        .find(|r| r.children.accepts(child_count) && name.contains(r.pattern))
        .map(|r| r.category)
}

/// Whether the bone matches `category`
pub fn is(name: &str, child_count: usize, category: Category) -> bool {
    first_match(name, child_count, &[category]).is_some()
}

/// Finger named by the bone, if any
pub fn finger(name: &str) -> Option<Finger> {
    const FINGERS: [Category; 5] = [
        Category::Finger(Finger::Thumb),
        Category::Finger(Finger::Index),
        Category::Finger(Finger::Middle),
        Category::Finger(Finger::Ring),
        Category::Finger(Finger::Pinky),
    ];
    match first_match(name, 0, &FINGERS) {
        Some(Category::Finger(f)) => Some(f),
        _ => None,
    }
}

/// Body side named by the bone.
///
/// Accepts `left`/`right` anywhere in the name, or a lone `l`/`r` token
/// separated by `_`, `.`, `:`, `-` or spaces (`thigh.L`, `Bip01 R Hand`).
pub fn side(name: &str) -> Option<Side> {
    let name = name.to_lowercase();
    if name.contains("left") {
        return Some(Side::Left);
    }
    if name.contains("right") {
        return Some(Side::Right);
    }
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .find_map(|token| match token {
            "l" => Some(Side::Left),
            "r" => Some(Side::Right),
            _ => None,
        })
}
