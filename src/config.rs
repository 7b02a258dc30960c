//! Per-avatar rig settings, loaded from JSON.

use crate::error::RigError;
use crate::math::{EulerAngles, Vec3};
use serde::{Deserialize, Serialize};

/// Avatar rig configuration.
///
/// Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Smooth solved rotations through a short animation instead of writing
    /// them directly. Meant for remote avatars driven by network updates.
    pub animate_arms: bool,
    /// Length of the smoothing animation
    pub animation_seconds: f32,
    /// Direction the character faces, avatar-root space
    pub forward: Vec3,
    /// Up direction, avatar-root space
    pub up: Vec3,
    /// Negate the x component of a controller pointer (avatar-root space).
    ///
    /// The flip is the same for both hands: it mirrors the pointer across the
    /// avatar's sagittal plane, not towards the hand holding the controller.
    pub mirror_pointer: bool,
    /// Never let a controller pointer aim behind the avatar
    pub clamp_pointer_backwards: bool,
    /// Fixed offset from controller orientation to pointing direction
    pub pointer_offset: EulerAngles,
    /// Keep the head level while aiming on rigs whose neck and head axes
    /// disagree
    pub head_axis_fix: bool,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            animate_arms: false,
            animation_seconds: 0.1,
            forward: Vec3::Z,
            up: Vec3::Y,
            mirror_pointer: true,
            clamp_pointer_backwards: true,
            pointer_offset: EulerAngles::default(),
            head_axis_fix: true,
        }
    }
}

impl RigConfig {
    /// Parse a JSON config; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, RigError> {
        let config: RigConfig = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    /// Unit-length reference directions and a non-negative animation time
    pub fn normalized(self) -> Self {
        Self {
            forward: self.forward.try_normalize().unwrap_or(Vec3::Z),
            up: self.up.try_normalize().unwrap_or(Vec3::Y),
            animation_seconds: self.animation_seconds.max(0.0),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[test]
    #[wasm_bindgen_test]
    fn test_empty_config_uses_defaults() {
        let config = RigConfig::from_json("{}").unwrap();
        assert_eq!(config, RigConfig::default());
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_partial_config() {
        let config = RigConfig::from_json(
            r#"{ "animate_arms": true, "forward": [0, 0, -2], "pointer_offset": { "x": -30 } }"#,
        )
        .unwrap();
        assert!(config.animate_arms);
        assert_eq!(config.forward, Vec3::NEG_Z);
        assert_eq!(config.pointer_offset.x, -30.0);
        assert!(config.mirror_pointer);
    }

    #[test]
    #[wasm_bindgen_test]
    fn test_bad_config_is_an_error() {
        assert!(matches!(
            RigConfig::from_json(r#"{ "animate_arms": "yes" }"#),
            Err(RigError::Json(_))
        ));
    }
}
