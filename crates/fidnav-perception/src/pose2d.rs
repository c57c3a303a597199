//! Planar poses and constant-curvature twists.
//!
//! [`Pose2D`] is the field-relative pose the estimator produces and the path
//! generator consumes.  [`Twist2D`] is the motion increment used by odometry
//! integration and by the estimator to scale corrections.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Wrap an angle into (-π, π].
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.sin().atan2(angle.cos());
    if a <= -PI { a + 2.0 * PI } else { a }
}

/// Robot pose in the field frame.
///
/// Position in metres, heading in radians normalized to (-π, π].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

/// A constant-curvature motion increment expressed in the frame of the pose
/// it starts from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist2D {
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
}

impl Twist2D {
    pub fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Self { dx, dy, dtheta }
    }

    /// Scale every component by `k`.
    pub fn scaled(self, k: f64) -> Self {
        Self::new(self.dx * k, self.dy * k, self.dtheta * k)
    }
}

impl Pose2D {
    /// Create a new pose with theta normalized.
    #[inline]
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    /// Pose at the origin with zero heading.
    #[inline]
    pub fn identity() -> Self {
        Self::default()
    }

    /// `true` when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }

    /// Compose two poses: self ⊕ other.
    ///
    /// ```text
    /// C.x = A.x + B.x * cos(A.θ) - B.y * sin(A.θ)
    /// C.y = A.y + B.x * sin(A.θ) + B.y * cos(A.θ)
    /// C.θ = normalize(A.θ + B.θ)
    /// ```
    #[inline]
    pub fn compose(&self, other: &Pose2D) -> Pose2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Pose2D::new(
            self.x + other.x * cos_t - other.y * sin_t,
            self.y + other.x * sin_t + other.y * cos_t,
            self.theta + other.theta,
        )
    }

    /// Inverse of this pose.
    #[inline]
    pub fn inverse(&self) -> Pose2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Pose2D::new(
            -self.x * cos_t - self.y * sin_t,
            self.x * sin_t - self.y * cos_t,
            -self.theta,
        )
    }

    /// This pose expressed in the frame of `origin`.
    #[inline]
    pub fn relative_to(&self, origin: &Pose2D) -> Pose2D {
        origin.inverse().compose(self)
    }

    /// Straight-line distance between the two positions.
    #[inline]
    pub fn distance(&self, other: &Pose2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Follow `twist` from this pose along a constant-curvature arc.
    pub fn exp(&self, twist: Twist2D) -> Pose2D {
        let dtheta = twist.dtheta;
        let (sin_t, cos_t) = dtheta.sin_cos();

        // Series expansion near zero keeps straight-line motion exact.
        let (s, c) = if dtheta.abs() < 1e-9 {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (sin_t / dtheta, (1.0 - cos_t) / dtheta)
        };

        let local = Pose2D::new(
            twist.dx * s - twist.dy * c,
            twist.dx * c + twist.dy * s,
            dtheta,
        );
        self.compose(&local)
    }

    /// The twist that [`exp`](Self::exp) would need to reach `end` from here.
    pub fn log(&self, end: &Pose2D) -> Twist2D {
        let t = end.relative_to(self);
        let dtheta = t.theta;
        let half = 0.5 * dtheta;
        let cos_minus_one = dtheta.cos() - 1.0;

        let h = if cos_minus_one.abs() < 1e-9 {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half * dtheta.sin()) / cos_minus_one
        };

        Twist2D::new(t.x * h + t.y * half, -t.x * half + t.y * h, dtheta)
    }

    /// Interpolate toward `end` along the connecting twist, `t` in `[0, 1]`.
    pub fn interpolate(&self, end: &Pose2D, t: f64) -> Pose2D {
        if t <= 0.0 {
            *self
        } else if t >= 1.0 {
            *end
        } else {
            self.exp(self.log(end).scaled(t))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn assert_pose_close(a: Pose2D, b: Pose2D, tol: f64) {
        assert!((a.x - b.x).abs() < tol, "x: {} vs {}", a.x, b.x);
        assert!((a.y - b.y).abs() < tol, "y: {} vs {}", a.y, b.y);
        assert!(
            normalize_angle(a.theta - b.theta).abs() < tol,
            "theta: {} vs {}",
            a.theta,
            b.theta
        );
    }

    #[test]
    fn normalize_wraps_into_half_open_interval() {
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(0.25) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn compose_then_inverse_is_identity() {
        let a = Pose2D::new(1.0, 2.0, 0.7);
        assert_pose_close(a.compose(&a.inverse()), Pose2D::identity(), 1e-12);
    }

    #[test]
    fn relative_to_expresses_pose_in_origin_frame() {
        let origin = Pose2D::new(1.0, 1.0, FRAC_PI_2);
        let p = Pose2D::new(1.0, 3.0, FRAC_PI_2);
        // Two metres "forward" of a robot facing +Y.
        assert_pose_close(p.relative_to(&origin), Pose2D::new(2.0, 0.0, 0.0), 1e-12);
    }

    #[test]
    fn exp_straight_line() {
        let p = Pose2D::identity().exp(Twist2D::new(0.1, 0.0, 0.0));
        assert_pose_close(p, Pose2D::new(0.1, 0.0, 0.0), 1e-12);
    }

    #[test]
    fn exp_quarter_circle() {
        // Arc of radius 1 sweeping 90° ends at (1, 1) facing +Y.
        let p = Pose2D::identity().exp(Twist2D::new(FRAC_PI_2, 0.0, FRAC_PI_2));
        assert_pose_close(p, Pose2D::new(1.0, 1.0, FRAC_PI_2), 1e-9);
    }

    #[test]
    fn log_inverts_exp() {
        let start = Pose2D::new(0.5, -1.0, 0.3);
        let end = Pose2D::new(2.0, 1.5, -1.2);
        let twist = start.log(&end);
        assert_pose_close(start.exp(twist), end, 1e-9);
    }

    #[test]
    fn interpolate_endpoints_and_midpoint() {
        let a = Pose2D::new(0.0, 0.0, 0.0);
        let b = Pose2D::new(2.0, 0.0, 0.0);
        assert_eq!(a.interpolate(&b, 0.0), a);
        assert_eq!(a.interpolate(&b, 1.0), b);
        assert_pose_close(a.interpolate(&b, 0.5), Pose2D::new(1.0, 0.0, 0.0), 1e-12);
    }

    #[test]
    fn distance_ignores_heading() {
        let a = Pose2D::new(0.0, 0.0, 1.0);
        let b = Pose2D::new(3.0, 4.0, -2.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn non_finite_pose_is_detected() {
        assert!(Pose2D::new(1.0, 2.0, 0.0).is_finite());
        assert!(!Pose2D { x: f64::NAN, y: 0.0, theta: 0.0 }.is_finite());
    }
}
