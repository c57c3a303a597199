//! Rigid-body 3-D transforms.
//!
//! [`Transform3D`] pairs a translation with a unit-quaternion rotation and is
//! used for the camera mount offset, the camera-to-landmark observation and
//! every landmark's world pose.  [`Pose3D`] is the same type read as "pose of
//! a frame in its parent".
//!
//! Frames follow the robot convention: +X forward, +Y left, +Z up.
//!
//! # Example
//!
//! ```rust
//! use fidnav_perception::transform::{Transform3D, Vec3, Quaternion};
//!
//! // robot is 1 m forward of the field origin, same orientation.
//! let field_to_robot = Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity());
//! // camera is 0.5 m forward of the robot centre.
//! let robot_to_camera = Transform3D::new(Vec3::new(0.5, 0.0, 0.0), Quaternion::identity());
//!
//! let field_to_camera = field_to_robot.compose(robot_to_camera);
//! assert!((field_to_camera.translation.x - 1.5).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};

use crate::pose2d::Pose2D;

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D translation vector in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }

    /// Euclidean length.
    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1); use [`Quaternion::normalized`] otherwise.
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Build a rotation from extrinsic roll (X), pitch (Y) and yaw (Z)
    /// angles in radians, applied in that order.
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sr, cr) = (roll * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sy, cy) = (yaw * 0.5).sin_cos();
        Self::new(
            cr * cp * cy + sr * sp * sy,
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
        )
    }

    /// Pure rotation about +Z.
    pub fn from_yaw(yaw: f64) -> Self {
        Self::from_euler(0.0, 0.0, yaw)
    }

    /// Quaternion magnitude.
    pub fn norm(self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Scale to unit length.  A zero quaternion maps to the identity.
    pub fn normalized(self) -> Self {
        let n = self.norm();
        if n <= f64::EPSILON {
            return Self::identity();
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }

    /// Rotation about X in radians.
    pub fn roll(self) -> f64 {
        (2.0 * (self.w * self.x + self.y * self.z))
            .atan2(1.0 - 2.0 * (self.x * self.x + self.y * self.y))
    }

    /// Rotation about Y in radians.
    pub fn pitch(self) -> f64 {
        (2.0 * (self.w * self.y - self.z * self.x))
            .clamp(-1.0, 1.0)
            .asin()
    }

    /// Rotation about Z in radians, extracted from the full 3-D rotation.
    pub fn yaw(self) -> f64 {
        (2.0 * (self.w * self.z + self.x * self.y))
            .atan2(1.0 - 2.0 * (self.y * self.y + self.z * self.z))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform: rotation followed by translation.
///
/// Represents the pose of frame B relative to frame A: to convert a point
/// expressed in frame B into frame A, rotate it by `rotation` then add
/// `translation`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

/// A pose is a transform from the parent frame to the posed frame.
pub type Pose3D = Transform3D;

impl Transform3D {
    /// Create a transform from a translation and rotation.
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Convenience constructor from a translation and roll/pitch/yaw angles
    /// in radians.
    pub fn from_xyz_rpy(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(Vec3::new(x, y, z), Quaternion::from_euler(roll, pitch, yaw))
    }

    /// Lift a planar pose into 3-D (z = 0, rotation about +Z only).
    pub fn from_pose2d(pose: Pose2D) -> Self {
        Self::new(
            Vec3::new(pose.x, pose.y, 0.0),
            Quaternion::from_yaw(pose.theta),
        )
    }

    /// Compose two transforms: `self` applied first, then `other`.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// Inverse transform: T_A_B → T_B_A.
    pub fn inverse(self) -> Self {
        let inv_rot = self.rotation.conjugate();
        Self::new(inv_rot.rotate(self.translation).neg(), inv_rot)
    }

    /// Project onto the floor plane: keep x/y and the yaw of the full
    /// rotation.
    pub fn to_pose2d(self) -> Pose2D {
        Pose2D::new(self.translation.x, self.translation.y, self.rotation.yaw())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2, FRAC_PI_4};

    fn assert_vec_close(a: Vec3, b: Vec3) {
        assert!((a.x - b.x).abs() < 1e-9, "x: {} vs {}", a.x, b.x);
        assert!((a.y - b.y).abs() < 1e-9, "y: {} vs {}", a.y, b.y);
        assert!((a.z - b.z).abs() < 1e-9, "z: {} vs {}", a.z, b.z);
    }

    // ── Quaternion ──────────────────────────────────────────────────────────

    #[test]
    fn quaternion_identity_rotate_is_noop() {
        let r = Quaternion::identity().rotate(Vec3::new(1.0, 2.0, 3.0));
        assert_vec_close(r, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn quaternion_90deg_yaw_rotates_x_to_y() {
        let q = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let r = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert_vec_close(r, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn quaternion_conjugate_is_inverse() {
        let q = Quaternion::from_euler(0.3, -0.2, 1.1);
        let prod = q.mul(q.conjugate());
        assert!((prod.w - 1.0).abs() < 1e-12);
        assert!(prod.x.abs() < 1e-12);
        assert!(prod.y.abs() < 1e-12);
        assert!(prod.z.abs() < 1e-12);
    }

    #[test]
    fn from_yaw_matches_hand_built_quaternion() {
        let q = Quaternion::from_yaw(FRAC_PI_2);
        assert!((q.w - FRAC_1_SQRT_2).abs() < 1e-12);
        assert!((q.z - FRAC_1_SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn euler_angles_roundtrip() {
        let q = Quaternion::from_euler(0.1, -0.35, 2.0);
        assert!((q.roll() - 0.1).abs() < 1e-9);
        assert!((q.pitch() + 0.35).abs() < 1e-9);
        assert!((q.yaw() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn pitched_camera_points_x_axis_downward() {
        // Positive pitch about +Y tips +X toward -Z.
        let q = Quaternion::from_euler(0.0, FRAC_PI_4, 0.0);
        let r = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!((r.x - FRAC_1_SQRT_2).abs() < 1e-12);
        assert!((r.z + FRAC_1_SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn normalized_zero_quaternion_is_identity() {
        assert_eq!(Quaternion::new(0.0, 0.0, 0.0, 0.0).normalized(), Quaternion::identity());
        let q = Quaternion::new(2.0, 0.0, 0.0, 0.0).normalized();
        assert!((q.norm() - 1.0).abs() < 1e-12);
    }

    // ── Transform3D ─────────────────────────────────────────────────────────

    #[test]
    fn transform_identity_compose_is_noop() {
        let t = Transform3D::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::identity());
        let composed = Transform3D::identity().compose(t);
        assert_vec_close(composed.translation, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn transform_compose_respects_rotation() {
        // robot at origin yawed 90°, camera 1 m forward in the robot frame.
        let field_to_robot = Transform3D::from_xyz_rpy(0.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2);
        let robot_to_camera = Transform3D::from_xyz_rpy(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let t = field_to_robot.compose(robot_to_camera);
        assert_vec_close(t.translation, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn transform_compose_is_associative() {
        let a = Transform3D::from_xyz_rpy(1.0, -2.0, 0.3, 0.1, 0.2, 0.3);
        let b = Transform3D::from_xyz_rpy(-0.5, 0.4, 1.0, -0.3, 0.5, 1.2);
        let c = Transform3D::from_xyz_rpy(2.0, 0.0, -0.1, 0.0, -0.4, -2.0);
        let left = a.compose(b).compose(c);
        let right = a.compose(b.compose(c));
        assert_vec_close(left.translation, right.translation);
        assert!((left.rotation.yaw() - right.rotation.yaw()).abs() < 1e-9);
    }

    #[test]
    fn transform_times_inverse_is_identity() {
        let t = Transform3D::from_xyz_rpy(1.5, -0.7, 0.4, 0.2, -0.6, 2.5);
        let id = t.compose(t.inverse());
        assert_vec_close(id.translation, Vec3::zero());
        assert!((id.rotation.w.abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn to_pose2d_uses_full_rotation_yaw() {
        let t = Transform3D::from_xyz_rpy(3.0, 1.0, 0.5, 0.0, 0.3, 0.7);
        let p = t.to_pose2d();
        assert!((p.x - 3.0).abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
        assert!((p.theta - 0.7).abs() < 1e-9);
    }

    #[test]
    fn from_pose2d_roundtrips_through_to_pose2d() {
        let p = Pose2D::new(-1.0, 4.0, -2.2);
        let back = Transform3D::from_pose2d(p).to_pose2d();
        assert!((back.x - p.x).abs() < 1e-12);
        assert!((back.y - p.y).abs() < 1e-12);
        assert!((back.theta - p.theta).abs() < 1e-12);
    }
}
