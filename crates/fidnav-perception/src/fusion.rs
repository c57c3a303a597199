//! Pose Fusion Estimator.
//!
//! Fuses high-rate swerve odometry with intermittent, latency-delayed vision
//! poses into a single field-relative [`Pose2D`].
//!
//! Every tick [`PoseFusionEstimator::predict`] integrates odometry and
//! records the odometry pose in a short history.  When a vision pose arrives,
//! [`PoseFusionEstimator::correct`] looks up where the estimator believed
//! the robot was *at the capture timestamp*, moves that belief toward the
//! measurement by a per-axis gain, and re-applies all odometry gathered since
//! then.  A late frame therefore corrects the past instead of being applied
//! to the present as if it had just been taken.
//!
//! The gain per axis is
//!
//! ```text
//! k = q / (q + sqrt(q * r))      q = σ_odometry²,  r = σ_vision²
//! ```
//!
//! so a smaller vision standard deviation pulls harder toward the
//! measurement.  `k = 0` when `q = 0` (odometry fully trusted).
//!
//! # Example
//!
//! ```rust
//! use fidnav_perception::fusion::{EstimatorConfig, PoseFusionEstimator};
//! use fidnav_perception::kinematics::{SwerveKinematics, SwerveModulePosition};
//! use fidnav_perception::pose2d::Pose2D;
//!
//! let kinematics = SwerveKinematics::new(vec![(0.3, 0.3), (0.3, -0.3), (-0.3, 0.3), (-0.3, -0.3)]).unwrap();
//! let modules = [SwerveModulePosition::default(); 4];
//! let mut estimator = PoseFusionEstimator::new(
//!     kinematics, 0.0, &modules, Pose2D::identity(), EstimatorConfig::default(),
//! ).unwrap();
//!
//! estimator.predict(0.02, 0.0, &[SwerveModulePosition::new(0.1, 0.0); 4]).unwrap();
//! assert!((estimator.estimate().x - 0.1).abs() < 1e-9);
//! ```

use std::collections::VecDeque;

use fidnav_types::FidnavError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::kinematics::{SwerveKinematics, SwerveModulePosition, SwerveOdometry};
use crate::pose2d::{Pose2D, Twist2D};

/// How far back corrections may reach (seconds).
pub const HISTORY_DURATION_S: f64 = 1.5;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Standard deviations for x (m), y (m) and heading (rad).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StdDevs {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl StdDevs {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.theta]
    }
}

/// Trust weighting for the two measurement sources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// How much the odometry-only estimate is expected to be off.
    pub odometry_std_devs: StdDevs,
    /// How much a single vision pose is expected to be off.
    pub vision_std_devs: StdDevs,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            odometry_std_devs: StdDevs::new(0.1, 0.1, 0.1),
            vision_std_devs: StdDevs::new(0.9, 0.9, 0.9),
        }
    }
}

impl EstimatorConfig {
    /// Check both vectors and derive the per-axis vision gain.
    ///
    /// # Errors
    ///
    /// [`FidnavError::Config`] when a vision std dev is not strictly
    /// positive or an odometry std dev is negative; non-finite values are
    /// rejected for both.
    pub fn vision_gain(&self) -> Result<[f64; 3], FidnavError> {
        let q = self.odometry_std_devs.to_array();
        let r = self.vision_std_devs.to_array();
        let axes = ["x", "y", "theta"];

        let mut gain = [0.0; 3];
        for i in 0..3 {
            if !r[i].is_finite() || r[i] <= 0.0 {
                return Err(FidnavError::Config(format!(
                    "vision std dev for {} must be positive and finite, got {}",
                    axes[i], r[i]
                )));
            }
            if !q[i].is_finite() || q[i] < 0.0 {
                return Err(FidnavError::Config(format!(
                    "odometry std dev for {} must be non-negative and finite, got {}",
                    axes[i], q[i]
                )));
            }
            let q2 = q[i] * q[i];
            let r2 = r[i] * r[i];
            gain[i] = if q2 == 0.0 {
                0.0
            } else {
                q2 / (q2 + (q2 * r2).sqrt())
            };
        }
        Ok(gain)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Estimator seam
// ────────────────────────────────────────────────────────────────────────────

/// Predict/correct contract the tick loop drives.
pub trait FusionEstimator {
    /// Advance with odometry only.  Called exactly once per tick.
    fn predict(
        &mut self,
        timestamp_s: f64,
        gyro_rad: f64,
        modules: &[SwerveModulePosition],
    ) -> Result<Pose2D, FidnavError>;

    /// Fold in a field-relative vision pose captured at `timestamp_s`.
    /// Returns `false` when the measurement was ignored.
    fn correct(&mut self, field_pose: Pose2D, timestamp_s: f64) -> bool;

    /// Latest fused pose.
    fn estimate(&self) -> Pose2D;
}

// ────────────────────────────────────────────────────────────────────────────
// History buffers
// ────────────────────────────────────────────────────────────────────────────

/// Time-ordered odometry poses covering the last [`HISTORY_DURATION_S`].
#[derive(Debug, Clone, Default)]
struct PoseHistory {
    samples: VecDeque<(f64, Pose2D)>,
}

impl PoseHistory {
    fn add(&mut self, timestamp_s: f64, pose: Pose2D) {
        let idx = self.samples.partition_point(|(t, _)| *t < timestamp_s);
        match self.samples.get_mut(idx) {
            Some(entry) if entry.0 == timestamp_s => entry.1 = pose,
            _ => self.samples.insert(idx, (timestamp_s, pose)),
        }

        if let Some(&(newest, _)) = self.samples.back() {
            while let Some(&(oldest, _)) = self.samples.front() {
                if oldest >= newest - HISTORY_DURATION_S {
                    break;
                }
                self.samples.pop_front();
            }
        }
    }

    /// Pose at `timestamp_s`, interpolated between neighbours and clamped
    /// to the ends of the history.
    fn sample(&self, timestamp_s: f64) -> Option<Pose2D> {
        if timestamp_s.is_nan() {
            return None;
        }
        let first = self.samples.front()?;
        let last = self.samples.back()?;
        if timestamp_s <= first.0 {
            return Some(first.1);
        }
        if timestamp_s >= last.0 {
            return Some(last.1);
        }

        let idx = self.samples.partition_point(|(t, _)| *t <= timestamp_s);
        let (t0, p0) = *self.samples.get(idx.checked_sub(1)?)?;
        let (t1, p1) = *self.samples.get(idx)?;
        if t1 <= t0 {
            return Some(p0);
        }
        Some(p0.interpolate(&p1, (timestamp_s - t0) / (t1 - t0)))
    }

    fn oldest(&self) -> Option<f64> {
        self.samples.front().map(|(t, _)| *t)
    }

    fn newest(&self) -> Option<f64> {
        self.samples.back().map(|(t, _)| *t)
    }

    fn clear(&mut self) {
        self.samples.clear();
    }
}

/// A past correction: where vision moved the estimate, and where pure
/// odometry stood at that moment.
#[derive(Debug, Clone, Copy)]
struct VisionUpdate {
    vision_pose: Pose2D,
    odometry_pose: Pose2D,
}

impl VisionUpdate {
    /// Re-apply this correction to a later odometry pose.
    fn compensate(&self, pose: &Pose2D) -> Pose2D {
        let delta = pose.relative_to(&self.odometry_pose);
        self.vision_pose.compose(&delta)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PoseFusionEstimator
// ────────────────────────────────────────────────────────────────────────────

/// Latency-compensating odometry + vision pose estimator.
///
/// Owned by the tick loop; state changes only through
/// [`predict`](Self::predict), [`correct`](Self::correct) and
/// [`reset_pose`](Self::reset_pose).
#[derive(Debug, Clone)]
pub struct PoseFusionEstimator {
    odometry: SwerveOdometry,
    odometry_history: PoseHistory,
    /// Sorted by capture time.
    vision_updates: Vec<(f64, VisionUpdate)>,
    estimate: Pose2D,
    vision_gain: [f64; 3],
}

impl PoseFusionEstimator {
    /// Create an estimator seeded at `initial_pose`.
    ///
    /// # Errors
    ///
    /// [`FidnavError::Kinematics`] if `modules` does not match the
    /// kinematics, [`FidnavError::Config`] for degenerate trust weighting.
    pub fn new(
        kinematics: SwerveKinematics,
        gyro_rad: f64,
        modules: &[SwerveModulePosition],
        initial_pose: Pose2D,
        config: EstimatorConfig,
    ) -> Result<Self, FidnavError> {
        let vision_gain = config.vision_gain()?;
        let odometry = SwerveOdometry::new(kinematics, gyro_rad, modules, initial_pose)?;
        info!(
            modules = modules.len(),
            gain_x = vision_gain[0],
            gain_y = vision_gain[1],
            gain_theta = vision_gain[2],
            "pose fusion estimator ready"
        );
        Ok(Self {
            odometry,
            odometry_history: PoseHistory::default(),
            vision_updates: Vec::new(),
            estimate: initial_pose,
            vision_gain,
        })
    }

    /// Integrate one odometry sample taken at `timestamp_s`.
    ///
    /// # Errors
    ///
    /// [`FidnavError::Kinematics`] on a module-count mismatch,
    /// [`FidnavError::Config`] for a non-finite timestamp.  Neither touches
    /// the estimator state.
    pub fn predict(
        &mut self,
        timestamp_s: f64,
        gyro_rad: f64,
        modules: &[SwerveModulePosition],
    ) -> Result<Pose2D, FidnavError> {
        if !timestamp_s.is_finite() {
            return Err(FidnavError::Config(format!(
                "odometry timestamp must be finite, got {timestamp_s}"
            )));
        }
        let odometry_pose = self.odometry.update(gyro_rad, modules)?;
        self.odometry_history.add(timestamp_s, odometry_pose);

        self.estimate = match self.vision_updates.last() {
            Some((_, update)) => update.compensate(&odometry_pose),
            None => odometry_pose,
        };
        Ok(self.estimate)
    }

    /// Apply a vision pose captured at `timestamp_s`.
    ///
    /// Ignored (returns `false`) when no odometry has been recorded yet, the
    /// timestamp is older than the history, or the input is not finite.
    pub fn correct(&mut self, field_pose: Pose2D, timestamp_s: f64) -> bool {
        if !field_pose.is_finite() || !timestamp_s.is_finite() {
            debug!(timestamp_s, "ignoring non-finite vision pose");
            return false;
        }
        let Some(newest) = self.odometry_history.newest() else {
            debug!(timestamp_s, "ignoring vision pose before any odometry");
            return false;
        };
        if newest - HISTORY_DURATION_S > timestamp_s {
            debug!(timestamp_s, newest, "ignoring vision pose older than history");
            return false;
        }

        self.clean_up_vision_updates();

        let (Some(odometry_sample), Some(estimate_sample)) = (
            self.odometry_history.sample(timestamp_s),
            self.sample_at(timestamp_s),
        ) else {
            return false;
        };

        let twist = estimate_sample.log(&field_pose);
        let scaled = Twist2D::new(
            self.vision_gain[0] * twist.dx,
            self.vision_gain[1] * twist.dy,
            self.vision_gain[2] * twist.dtheta,
        );
        let update = VisionUpdate {
            vision_pose: estimate_sample.exp(scaled),
            odometry_pose: odometry_sample,
        };

        // Later updates were computed against a past that just changed.
        self.vision_updates.retain(|(t, _)| *t < timestamp_s);
        self.vision_updates.push((timestamp_s, update));

        self.estimate = update.compensate(&self.odometry.pose());
        debug!(
            timestamp_s,
            x = self.estimate.x,
            y = self.estimate.y,
            theta = self.estimate.theta,
            "vision correction applied"
        );
        true
    }

    /// Latest fused pose.
    pub fn estimate(&self) -> Pose2D {
        self.estimate
    }

    /// Pure dead-reckoning pose, without any vision correction.
    pub fn odometry_pose(&self) -> Pose2D {
        self.odometry.pose()
    }

    /// Fused pose as it stood at `timestamp_s`, or `None` before the first
    /// prediction or for a NaN timestamp.  Timestamps outside the history
    /// are clamped to it.
    pub fn sample_at(&self, timestamp_s: f64) -> Option<Pose2D> {
        if timestamp_s.is_nan() {
            return None;
        }
        let oldest = self.odometry_history.oldest()?;
        let newest = self.odometry_history.newest()?;
        if self.vision_updates.is_empty() {
            return self.odometry_history.sample(timestamp_s);
        }

        let t = timestamp_s.clamp(oldest, newest);
        let odometry = self.odometry_history.sample(t)?;
        match self.floor_vision_update(t) {
            Some(update) => Some(update.compensate(&odometry)),
            None => Some(odometry),
        }
    }

    /// Discard all history and restart from `pose`.
    pub fn reset_pose(
        &mut self,
        gyro_rad: f64,
        modules: &[SwerveModulePosition],
        pose: Pose2D,
    ) -> Result<(), FidnavError> {
        self.odometry.reset(gyro_rad, modules, pose)?;
        self.odometry_history.clear();
        self.vision_updates.clear();
        self.estimate = pose;
        info!(x = pose.x, y = pose.y, theta = pose.theta, "pose estimator reset");
        Ok(())
    }

    /// Per-axis gain applied to corrections.
    pub fn vision_gain(&self) -> [f64; 3] {
        self.vision_gain
    }

    fn floor_vision_update(&self, timestamp_s: f64) -> Option<VisionUpdate> {
        let idx = self
            .vision_updates
            .partition_point(|(t, _)| *t <= timestamp_s);
        idx.checked_sub(1).map(|i| self.vision_updates[i].1)
    }

    /// Drop vision updates that can no longer be reached from the odometry
    /// history, keeping the newest one at or before its oldest sample.
    fn clean_up_vision_updates(&mut self) {
        let Some(oldest) = self.odometry_history.oldest() else {
            return;
        };
        let Some(&(first, _)) = self.vision_updates.first() else {
            return;
        };
        if oldest < first {
            return;
        }
        let idx = self.vision_updates.partition_point(|(t, _)| *t <= oldest);
        if idx > 1 {
            self.vision_updates.drain(..idx - 1);
        }
    }
}

impl FusionEstimator for PoseFusionEstimator {
    fn predict(
        &mut self,
        timestamp_s: f64,
        gyro_rad: f64,
        modules: &[SwerveModulePosition],
    ) -> Result<Pose2D, FidnavError> {
        PoseFusionEstimator::predict(self, timestamp_s, gyro_rad, modules)
    }

    fn correct(&mut self, field_pose: Pose2D, timestamp_s: f64) -> bool {
        PoseFusionEstimator::correct(self, field_pose, timestamp_s)
    }

    fn estimate(&self) -> Pose2D {
        PoseFusionEstimator::estimate(self)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
