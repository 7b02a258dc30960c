//! Error types for rig loading and solving, using `thiserror`.
//!
//! Data-quality problems in a rig (odd names, odd topology, degenerate
//! geometry) are never errors; they are logged and degraded around. These
//! variants cover malformed input and misuse of the API.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RigError {
    /// A solver was called before `process_bones`
    #[error("Skeleton has not been classified yet; call process_bones first")]
    NotClassified,

    /// A bone index does not exist in the skeleton
    #[error("Bone index {bone} out of range (skeleton has {count} bones)")]
    BoneOutOfRange {
        /// Offending index
        bone: usize,
        /// Number of bones in the skeleton
        count: usize,
    },

    /// Axis probing needs a child joint to observe
    #[error("Bone {name:?} ({bone}) has no child to probe")]
    MissingChild {
        /// Bone index
        bone: usize,
        /// Bone name
        name: String,
    },

    /// Structural problem in a skeleton description
    #[error("Invalid skeleton: {reason}")]
    InvalidSkeleton {
        /// What is wrong with it
        reason: String,
    },

    /// Malformed JSON for a skeleton description or config
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}
