//! Handle-based wasm-bindgen API.
//!
//! The host engine mirrors its skeleton into a JSON [`SkeletonDesc`]
//! (bone names, parents, offsets, rotations and root placement), creates an
//! avatar from it and then feeds input events. After each event or frame it
//! reads back `avatar_rotations` and the root position and copies them onto
//! its own bones.
//!
//! [`SkeletonDesc`]: crate::bone::SkeletonDesc

use crate::avatar::Avatar;
use crate::body::Side;
use crate::bone::{BoneTree, Skeleton};
use crate::classify::naming;
use crate::config::RigConfig;
use crate::math::{Quat, Vec3};
use crate::state::{with_avatar, with_avatar_mut, with_registry, AvatarHandle};
use wasm_bindgen::prelude::*;

fn unknown_handle(handle: AvatarHandle) -> JsValue {
    JsValue::from_str(&format!("Unknown avatar handle {}", handle))
}

fn to_js(e: crate::error::RigError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn parse_side(side: &str) -> Result<Side, JsValue> {
    naming::side(side).ok_or_else(|| JsValue::from_str(&format!("Unknown side {:?}", side)))
}

/// Set up logging and panic reporting. Call once before anything else.
#[wasm_bindgen]
pub fn init_rig() {
    // Set up panic hook for better error messages in browser console
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("Avatar rig ready");
}

/// Create and classify an avatar from a skeleton description.
///
/// `config_json` may be empty for the default config.
#[wasm_bindgen]
pub fn create_avatar(skeleton_json: &str, config_json: &str) -> Result<AvatarHandle, JsValue> {
    let skeleton = Skeleton::from_json(skeleton_json).map_err(to_js)?;
    let config = if config_json.trim().is_empty() {
        RigConfig::default()
    } else {
        RigConfig::from_json(config_json).map_err(to_js)?
    };

    let mut avatar = Avatar::new(skeleton, config);
    avatar.process_bones();
    let handle = with_registry(|registry| registry.insert(avatar));
    log::info!("Created avatar {}", handle);
    Ok(handle)
}

/// Drop an avatar and all its solver state
#[wasm_bindgen]
pub fn dispose_avatar(handle: AvatarHandle) -> bool {
    let removed = with_registry(|registry| registry.remove(handle));
    if !removed {
        log::warn!("Dispose of unknown avatar {}", handle);
    }
    removed
}

/// Reach for a world point with the `"left"` or `"right"` hand.
///
/// `pointer` is an optional controller orientation as `[x, y, z, w]`.
/// Returns the upper arm rotation as `[x, y, z, w]`.
#[wasm_bindgen]
pub fn avatar_reach_for(
    handle: AvatarHandle,
    side: &str,
    x: f32,
    y: f32,
    z: f32,
    pointer: Option<Vec<f32>>,
) -> Result<Option<Vec<f32>>, JsValue> {
    let side = parse_side(side)?;
    let pointer = match pointer.as_deref() {
        None => None,
        Some(&[x, y, z, w]) => Some(Quat::from_xyzw(x, y, z, w).normalize()),
        Some(other) => {
            return Err(JsValue::from_str(&format!(
                "Pointer needs 4 components, got {}",
                other.len()
            )))
        }
    };

    let rotation = with_avatar_mut(handle, |avatar| {
        avatar.reach_for(side, Vec3::new(x, y, z), pointer)
    })
    .ok_or_else(|| unknown_handle(handle))?
    .map_err(to_js)?;
    Ok(rotation.map(|q| q.to_array().to_vec()))
}

#[wasm_bindgen]
pub fn avatar_look_at(handle: AvatarHandle, x: f32, y: f32, z: f32) -> Result<(), JsValue> {
    with_avatar_mut(handle, |avatar| avatar.look_at(Vec3::new(x, y, z)))
        .ok_or_else(|| unknown_handle(handle))?
        .map_err(to_js)
}

#[wasm_bindgen]
pub fn avatar_lower_arms(handle: AvatarHandle) -> Result<(), JsValue> {
    with_avatar_mut(handle, |avatar| avatar.lower_arms())
        .ok_or_else(|| unknown_handle(handle))?
        .map_err(to_js)
}

/// Crouch by `height`; returns the resulting leg length
#[wasm_bindgen]
pub fn avatar_crouch(handle: AvatarHandle, height: f32) -> Result<Option<f32>, JsValue> {
    with_avatar_mut(handle, |avatar| avatar.crouch(height))
        .ok_or_else(|| unknown_handle(handle))?
        .map_err(to_js)
}

#[wasm_bindgen]
pub fn avatar_rise(handle: AvatarHandle, height: f32) -> Result<Option<f32>, JsValue> {
    with_avatar_mut(handle, |avatar| avatar.rise(height))
        .ok_or_else(|| unknown_handle(handle))?
        .map_err(to_js)
}

#[wasm_bindgen]
pub fn avatar_stand_up(handle: AvatarHandle) -> Result<Option<f32>, JsValue> {
    with_avatar_mut(handle, |avatar| avatar.stand_up())
        .ok_or_else(|| unknown_handle(handle))?
        .map_err(to_js)
}

#[wasm_bindgen]
pub fn avatar_jump(handle: AvatarHandle, height: f32) -> Result<Option<f32>, JsValue> {
    with_avatar_mut(handle, |avatar| avatar.jump(height))
        .ok_or_else(|| unknown_handle(handle))?
        .map_err(to_js)
}

#[wasm_bindgen]
pub fn avatar_set_position(handle: AvatarHandle, x: f32, y: f32, z: f32) -> bool {
    with_avatar_mut(handle, |avatar| avatar.set_position(Vec3::new(x, y, z))).is_some()
}

/// Advance arm animations (call each frame with delta time).
///
/// Returns whether any are still playing.
#[wasm_bindgen]
pub fn avatar_tick(handle: AvatarHandle, delta_ms: f32) -> bool {
    let delta_secs = delta_ms / 1000.0;
    with_avatar_mut(handle, |avatar| avatar.tick(delta_secs)).unwrap_or(false)
}

#[wasm_bindgen]
pub fn avatar_reset_pose(handle: AvatarHandle) -> bool {
    with_avatar_mut(handle, |avatar| avatar.reset_pose()).is_some()
}

/// Local rotations of every bone, flattened `[x, y, z, w, ...]`
#[wasm_bindgen]
pub fn avatar_rotations(handle: AvatarHandle) -> Option<Vec<f32>> {
    with_avatar(handle, |avatar| {
        avatar
            .rotations()
            .iter()
            .flat_map(|q| q.to_array())
            .collect()
    })
}

/// Root position, world space
#[wasm_bindgen]
pub fn avatar_root_position(handle: AvatarHandle) -> Option<Vec<f32>> {
    with_avatar(handle, |avatar| avatar.tree().root().position.to_array().to_vec())
}

/// Classified body map as a plain JavaScript object
#[wasm_bindgen]
pub fn avatar_body_map(handle: AvatarHandle) -> Result<JsValue, JsValue> {
    with_avatar(handle, |avatar| serde_wasm_bindgen::to_value(avatar.body()))
        .ok_or_else(|| unknown_handle(handle))?
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize body map: {}", e)))
}

/// World position of the head, if the avatar has one
#[wasm_bindgen]
pub fn avatar_head_pos(handle: AvatarHandle) -> Option<Vec<f32>> {
    with_avatar(handle, |avatar| avatar.head_pos())
        .flatten()
        .map(|p| p.to_array().to_vec())
}
