//! Odometry source consumed by the pose estimator.

use fidnav_perception::kinematics::SwerveModulePosition;

/// A swerve drivetrain able to report its gyro heading and module positions.
pub trait OdometrySource: Send {
    /// Raw gyro heading (radians, CCW positive).
    fn heading_rad(&self) -> f64;

    /// Cumulative travel and steering angle of every module, in the order
    /// the kinematics were configured with.
    fn module_positions(&self) -> Vec<SwerveModulePosition>;
}
