//! Bone tree access: the engine adapter trait and an in-memory skeleton.
//!
//! ## Key Concepts
//!
//! - **BoneTree**: what the rig code needs from an engine skeleton
//! - **RootTransform**: avatar placement, for world ⇄ avatar-root conversion
//! - **Skeleton**: reference `BoneTree` with lazy forward kinematics, also
//!   used by the browser surface as a mirror of the host engine's bones

pub mod cache;
pub mod skeleton;
pub mod tree;

pub use cache::*;
pub use skeleton::*;
pub use tree::*;
