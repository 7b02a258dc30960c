//! Linear algebra primitives for rig solving, using glam.
//!
//! Everything the classifier and solvers need from an engine (axis-angle
//! construction, shortest-arc rotation, matrix alignment, Euler conversion)
//! lives here so the rest of the crate only speaks glam.

pub use glam::{Affine3A, EulerRot, Mat3, Quat, Vec3, Vec3A};
use serde::{Deserialize, Serialize};

/// Small epsilon value for floating-point comparisons
pub const EPSILON: f32 = 1e-6;

/// Half turn about the up axis, substituted for any rotation that degenerates
/// to NaN (zero-length or anti-parallel alignment input).
pub const FALLBACK_ROTATION: Quat = Quat::from_xyzw(0.0, 1.0, 0.0, 0.0);

/// One of the three canonical local axes of a bone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Unit vector along this axis
    #[inline]
    pub const fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }

    /// Rotation of `angle` radians about this axis
    #[inline]
    pub fn rotation(self, angle: f32) -> Quat {
        Quat::from_axis_angle(self.unit(), angle)
    }
}

/// Replace a non-finite rotation with [`FALLBACK_ROTATION`].
pub fn sanitize(rotation: Quat) -> Quat {
    if rotation.is_finite() {
        rotation
    } else {
        log::trace!("degenerate rotation {:?}, using fallback", rotation);
        FALLBACK_ROTATION
    }
}

/// Shortest-arc rotation taking direction `from` onto direction `to`.
///
/// Inputs need not be normalized. Zero-length inputs and (near) anti-parallel
/// pairs have no well defined arc and yield [`FALLBACK_ROTATION`].
pub fn rotation_between(from: Vec3, to: Vec3) -> Quat {
    // Plain division: a zero vector turns into NaN here and is caught below.
    let from = from / from.length();
    let to = to / to.length();

    let w = 1.0 + from.dot(to);
    if w < EPSILON {
        return FALLBACK_ROTATION;
    }
    let axis = from.cross(to);
    sanitize(Quat::from_xyzw(axis.x, axis.y, axis.z, w).normalize())
}

/// Rotation matrix aligning direction `from` to direction `to`, as a quaternion.
///
/// Builds `c·I + [v]× + v·vᵀ/(1+c)` directly. The anti-parallel case divides
/// by zero and the zero-length case normalizes by zero; both surface as NaN
/// and are replaced by [`FALLBACK_ROTATION`].
pub fn align_rotation(from: Vec3, to: Vec3) -> Quat {
    let from = from / from.length();
    let to = to / to.length();

    let v = from.cross(to);
    let c = from.dot(to);
    let k = 1.0 / (1.0 + c);

    let m = Mat3::from_cols(
        Vec3::new(v.x * v.x * k + c, v.y * v.x * k + v.z, v.z * v.x * k - v.y),
        Vec3::new(v.x * v.y * k - v.z, v.y * v.y * k + c, v.z * v.y * k + v.x),
        Vec3::new(v.x * v.z * k + v.y, v.y * v.z * k - v.x, v.z * v.z * k + c),
    );
    if !m.is_finite() {
        return FALLBACK_ROTATION;
    }
    sanitize(Quat::from_mat3(&m).normalize())
}

/// Euler angles in degrees, used where humans author or read rotations
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct EulerAngles {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl EulerAngles {
    /// Convert to quaternion (XYZ order)
    pub fn to_quat(&self) -> Quat {
        Quat::from_euler(
            EulerRot::XYZ,
            self.x.to_radians(),
            self.y.to_radians(),
            self.z.to_radians(),
        )
    }

    /// Convert from quaternion (XYZ order)
    pub fn from_quat(q: Quat) -> Self {
        let (x, y, z) = q.to_euler(EulerRot::XYZ);
        Self {
            x: x.to_degrees(),
            y: y.to_degrees(),
            z: z.to_degrees(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn assert_vec_close(a: Vec3, b: Vec3) {
        assert!(a.distance(b) < 1e-4, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_rotation_between_maps_direction() {
        let from = Vec3::new(1.0, 0.0, 0.0);
        let to = Vec3::new(0.0, 2.0, 1.0);
        let q = rotation_between(from, to);
        assert_vec_close(q * from, to.normalize());
    }

    #[test]
    fn test_rotation_between_degenerate_inputs() {
        assert_eq!(rotation_between(Vec3::ZERO, Vec3::X), FALLBACK_ROTATION);
        assert_eq!(rotation_between(Vec3::X, Vec3::NEG_X), FALLBACK_ROTATION);
    }

    #[test]
    fn test_align_rotation_matches_shortest_arc() {
        let from = Vec3::new(0.3, -0.2, 0.9);
        let to = Vec3::new(-0.5, 0.4, 0.1);
        let a = align_rotation(from, to);
        let b = rotation_between(from, to);
        assert_vec_close(a * from.normalize(), to.normalize());
        assert!(a.dot(b).abs() > 0.9999);
    }

    #[test]
    fn test_align_rotation_degenerate_inputs() {
        assert_eq!(align_rotation(Vec3::ZERO, Vec3::Z), FALLBACK_ROTATION);
        assert_eq!(align_rotation(Vec3::Z, Vec3::NEG_Z), FALLBACK_ROTATION);
        assert!(align_rotation(Vec3::Z, Vec3::ZERO).is_finite());
    }

    #[test]
    fn test_axis_rotation() {
        let q = Axis::Z.rotation(FRAC_PI_2);
        assert_vec_close(q * Vec3::X, Vec3::Y);
    }

    #[test]
    fn test_euler_to_quat() {
        let euler = EulerAngles {
            x: 90.0,
            y: 0.0,
            z: 0.0,
        };
        let rotated = euler.to_quat() * Vec3::Y;
        assert!(rotated.y.abs() < 0.01, "Y should be ~0, got {}", rotated.y);
        assert!((rotated.z - 1.0).abs() < 0.01, "Z should be ~1, got {}", rotated.z);

        let back = EulerAngles::from_quat(euler.to_quat());
        assert!((back.x - 90.0).abs() < 0.01);
    }
}
