//! Avatar Rig - Wasm Core
//!
//! Skeleton retargeting and procedural IK for humanoid avatars with unknown
//! bone names and axis conventions: bone classification, bend-axis probing,
//! two-bone arm and leg IK, head gaze, and smoothed pose application.
//!
//! The core is engine neutral and works on any [`BoneTree`]. On `wasm32`
//! a handle-based wasm-bindgen API drives in-memory [`Skeleton`] mirrors.

pub mod animation;
pub mod avatar;
pub mod axis;
pub mod body;
pub mod bone;
pub mod classify;
pub mod config;
pub mod error;
pub mod gaze;
pub mod ik;
pub mod math;
pub mod state;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        pub mod wasm;
        pub use wasm::*;
    }
}

pub use animation::{ApplyMode, JointAnimation, PoseApplier};
pub use avatar::Avatar;
pub use body::{Arm, BodyMap, Finger, Fingers, HeadRig, Leg, Limb, LimbAxis, Side};
pub use bone::{BoneTree, RootTransform, Skeleton, SkeletonDesc};
pub use config::RigConfig;
pub use error::RigError;
pub use glam::{Quat, Vec3};
