//! Swerve-drive kinematics and wheel odometry.
//!
//! [`SwerveKinematics`] maps per-module travel onto a chassis [`Twist2D`]
//! with a least-squares forward model built once at construction.
//! [`SwerveOdometry`] integrates those twists, taking heading from the gyro
//! rather than from the wheels.
//!
//! Module locations are given in the robot frame (+X forward, +Y left).

use fidnav_types::FidnavError;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::pose2d::{Pose2D, Twist2D, normalize_angle};

/// Cumulative travel and steering angle of one swerve module.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SwerveModulePosition {
    /// Total distance driven by the wheel (metres).
    pub distance_m: f64,
    /// Steering angle of the wheel relative to the robot's +X (radians).
    pub angle_rad: f64,
}

impl SwerveModulePosition {
    pub fn new(distance_m: f64, angle_rad: f64) -> Self {
        Self {
            distance_m,
            angle_rad,
        }
    }
}

/// Forward and inverse kinematics for a swerve chassis.
#[derive(Debug, Clone)]
pub struct SwerveKinematics {
    module_locations: Vec<(f64, f64)>,
    /// 3 × 2N least-squares solution of the inverse model.
    forward: DMatrix<f64>,
}

impl SwerveKinematics {
    /// Build kinematics for modules at the given robot-frame locations.
    ///
    /// # Errors
    ///
    /// Returns [`FidnavError::Config`] when fewer than two modules are given,
    /// a location is not finite, or the layout cannot observe rotation
    /// (e.g. every module at the same point).
    pub fn new(module_locations: Vec<(f64, f64)>) -> Result<Self, FidnavError> {
        if module_locations.len() < 2 {
            return Err(FidnavError::Config(format!(
                "swerve kinematics needs at least 2 modules, got {}",
                module_locations.len()
            )));
        }
        if module_locations
            .iter()
            .any(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(FidnavError::Config(
                "swerve module locations must be finite".to_string(),
            ));
        }

        let n = module_locations.len();
        let mut inverse = DMatrix::<f64>::zeros(2 * n, 3);
        for (i, &(x, y)) in module_locations.iter().enumerate() {
            inverse[(2 * i, 0)] = 1.0;
            inverse[(2 * i, 2)] = -y;
            inverse[(2 * i + 1, 1)] = 1.0;
            inverse[(2 * i + 1, 2)] = x;
        }

        let normal = inverse.transpose() * &inverse;
        let normal_inv = normal.try_inverse().ok_or_else(|| {
            FidnavError::Config("swerve module layout is degenerate".to_string())
        })?;
        let forward = normal_inv * inverse.transpose();

        Ok(Self {
            module_locations,
            forward,
        })
    }

    /// Number of modules this model expects.
    pub fn module_count(&self) -> usize {
        self.module_locations.len()
    }

    /// Robot-frame module locations.
    pub fn module_locations(&self) -> &[(f64, f64)] {
        &self.module_locations
    }

    /// Chassis twist between two module snapshots.
    ///
    /// Each module's travel is taken along its ending steering angle.
    ///
    /// # Errors
    ///
    /// Returns [`FidnavError::Kinematics`] if either snapshot has the wrong
    /// module count.
    pub fn to_twist(
        &self,
        start: &[SwerveModulePosition],
        end: &[SwerveModulePosition],
    ) -> Result<Twist2D, FidnavError> {
        self.check_count(start.len())?;
        self.check_count(end.len())?;

        let mut deltas = DVector::<f64>::zeros(2 * end.len());
        for (i, (s, e)) in start.iter().zip(end).enumerate() {
            let d = e.distance_m - s.distance_m;
            deltas[2 * i] = d * e.angle_rad.cos();
            deltas[2 * i + 1] = d * e.angle_rad.sin();
        }

        let chassis = &self.forward * deltas;
        Ok(Twist2D::new(chassis[0], chassis[1], chassis[2]))
    }

    /// Per-module `(travel, steering angle)` that produces `twist`.
    ///
    /// Travel is always non-negative; a module that does not move keeps
    /// angle 0.
    pub fn to_module_deltas(&self, twist: Twist2D) -> Vec<(f64, f64)> {
        self.module_locations
            .iter()
            .map(|&(x, y)| {
                let vx = twist.dx - twist.dtheta * y;
                let vy = twist.dy + twist.dtheta * x;
                let d = vx.hypot(vy);
                if d < 1e-12 { (0.0, 0.0) } else { (d, vy.atan2(vx)) }
            })
            .collect()
    }

    pub(crate) fn check_count(&self, actual: usize) -> Result<(), FidnavError> {
        if actual != self.module_count() {
            return Err(FidnavError::Kinematics {
                expected: self.module_count(),
                actual,
            });
        }
        Ok(())
    }
}

/// Dead-reckoning pose integrator for a swerve chassis.
#[derive(Debug, Clone)]
pub struct SwerveOdometry {
    kinematics: SwerveKinematics,
    pose: Pose2D,
    gyro_offset: f64,
    previous_angle: f64,
    previous_positions: Vec<SwerveModulePosition>,
}

impl SwerveOdometry {
    /// Start integrating from `initial_pose`.
    ///
    /// `gyro_rad` is the raw gyro reading at this instant; the difference to
    /// `initial_pose.theta` is kept as an offset.
    pub fn new(
        kinematics: SwerveKinematics,
        gyro_rad: f64,
        positions: &[SwerveModulePosition],
        initial_pose: Pose2D,
    ) -> Result<Self, FidnavError> {
        kinematics.check_count(positions.len())?;
        Ok(Self {
            kinematics,
            pose: initial_pose,
            gyro_offset: initial_pose.theta - gyro_rad,
            previous_angle: initial_pose.theta,
            previous_positions: positions.to_vec(),
        })
    }

    /// Integrate one sample and return the new odometry pose.
    pub fn update(
        &mut self,
        gyro_rad: f64,
        positions: &[SwerveModulePosition],
    ) -> Result<Pose2D, FidnavError> {
        let angle = normalize_angle(gyro_rad + self.gyro_offset);
        let mut twist = self.kinematics.to_twist(&self.previous_positions, positions)?;
        twist.dtheta = normalize_angle(angle - self.previous_angle);

        let moved = self.pose.exp(twist);
        self.pose = Pose2D::new(moved.x, moved.y, angle);
        self.previous_angle = angle;
        self.previous_positions.clear();
        self.previous_positions.extend_from_slice(positions);
        Ok(self.pose)
    }

    /// Re-seed the integrator at `pose`.
    pub fn reset(
        &mut self,
        gyro_rad: f64,
        positions: &[SwerveModulePosition],
        pose: Pose2D,
    ) -> Result<(), FidnavError> {
        self.kinematics.check_count(positions.len())?;
        self.pose = pose;
        self.gyro_offset = pose.theta - gyro_rad;
        self.previous_angle = pose.theta;
        self.previous_positions = positions.to_vec();
        Ok(())
    }

    pub fn pose(&self) -> Pose2D {
        self.pose
    }

    pub fn kinematics(&self) -> &SwerveKinematics {
        &self.kinematics
    }
}
