//! In-process simulation of the camera and drivetrain for headless runs.
//!
//! [`SimCamera`] and [`SimDrivetrain`] are cheap handles over shared state:
//! clone one, hand the clone to the localizer as its collaborator, and keep
//! driving the original from the test or the demo loop.
//!
//! # Example
//!
//! ```rust
//! use fidnav_hal::camera::VisionCamera;
//! use fidnav_hal::sim::SimCamera;
//! use fidnav_perception::layout::FieldLayout;
//! use fidnav_perception::pose2d::Pose2D;
//! use fidnav_perception::transform::Transform3D;
//! use std::f64::consts::PI;
//!
//! let layout = FieldLayout::from_tags(
//!     vec![(7, Transform3D::from_xyz_rpy(5.0, 1.0, 0.5, 0.0, 0.0, PI))],
//!     16.5,
//!     8.0,
//! )
//! .unwrap();
//!
//! let camera = SimCamera::new("arducam", Transform3D::identity());
//! let mut handle = camera.clone();
//! assert_eq!(camera.capture(Pose2D::new(3.0, 1.0, 0.0), &layout, 0.02), 1);
//! assert_eq!(handle.drain_unread().len(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fidnav_perception::kinematics::{SwerveKinematics, SwerveModulePosition};
use fidnav_perception::layout::FieldLayout;
use fidnav_perception::pose2d::{Pose2D, Twist2D};
use fidnav_perception::transform::{Pose3D, Transform3D, Vec3};
use tracing::debug;

use crate::camera::{PipelineResult, TrackedTarget, VisionCamera};
use crate::drivetrain::OdometrySource;

/// Edge length of a standard 36h11 tag (metres).
pub const TAG_SIZE_M: f64 = 0.1651;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Camera model
// ────────────────────────────────────────────────────────────────────────────

/// Pinhole field of view and mounting of a simulated camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraModel {
    pub robot_to_camera: Transform3D,
    pub horizontal_fov_deg: f64,
    pub vertical_fov_deg: f64,
    pub max_range_m: f64,
}

impl CameraModel {
    pub fn new(robot_to_camera: Transform3D) -> Self {
        Self {
            robot_to_camera,
            horizontal_fov_deg: 70.0,
            vertical_fov_deg: 50.0,
            max_range_m: 6.0,
        }
    }

    /// What the pipeline would report for tag `id` at `field_to_tag` with
    /// the robot at `field_to_robot`, or `None` when the tag is out of view
    /// or facing away.
    pub fn synthesize(
        &self,
        field_to_robot: Pose2D,
        id: i32,
        field_to_tag: Pose3D,
    ) -> Option<TrackedTarget> {
        let field_to_camera = Transform3D::from_pose2d(field_to_robot).compose(self.robot_to_camera);
        let camera_to_target = field_to_camera.inverse().compose(field_to_tag);
        let t = camera_to_target.translation;

        if t.x <= 0.0 {
            return None;
        }
        let range = t.norm();
        if range > self.max_range_m {
            return None;
        }
        // The printed face points along the tag's +X.
        let normal = camera_to_target.rotation.rotate(Vec3::new(1.0, 0.0, 0.0));
        if normal.x >= 0.0 {
            return None;
        }

        let yaw_deg = -t.y.atan2(t.x).to_degrees();
        let pitch_deg = t.z.atan2(t.x.hypot(t.y)).to_degrees();
        if yaw_deg.abs() > self.horizontal_fov_deg / 2.0
            || pitch_deg.abs() > self.vertical_fov_deg / 2.0
        {
            return None;
        }

        let h = (self.horizontal_fov_deg / 2.0).to_radians().tan();
        let v = (self.vertical_fov_deg / 2.0).to_radians().tan();
        let area = 100.0 * TAG_SIZE_M * TAG_SIZE_M / (4.0 * h * v * range * range);

        Some(TrackedTarget {
            fiducial_id: id,
            yaw_deg,
            pitch_deg,
            area,
            pose_ambiguity: 0.0,
            best_camera_to_target: camera_to_target,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimCamera
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SimCameraState {
    connected: bool,
    pending: VecDeque<PipelineResult>,
}

/// A simulated fiducial camera with a frame queue.
#[derive(Debug, Clone)]
pub struct SimCamera {
    name: String,
    model: CameraModel,
    state: Arc<Mutex<SimCameraState>>,
}

impl SimCamera {
    /// A connected camera with the default [`CameraModel`] at `robot_to_camera`.
    pub fn new(name: impl Into<String>, robot_to_camera: Transform3D) -> Self {
        Self::with_model(name, CameraModel::new(robot_to_camera))
    }

    pub fn with_model(name: impl Into<String>, model: CameraModel) -> Self {
        Self {
            name: name.into(),
            model,
            state: Arc::new(Mutex::new(SimCameraState {
                connected: true,
                pending: VecDeque::new(),
            })),
        }
    }

    pub fn model(&self) -> &CameraModel {
        &self.model
    }

    /// Queue a ready-made result.
    pub fn push_frame(&self, result: PipelineResult) {
        lock(&self.state).pending.push_back(result);
    }

    pub fn set_connected(&self, connected: bool) {
        lock(&self.state).connected = connected;
    }

    /// Unread frames waiting in the queue.
    pub fn pending(&self) -> usize {
        lock(&self.state).pending.len()
    }

    /// Render every visible tag of `layout` for a robot at `field_to_robot`
    /// and queue the frame, nearest tag first.  Nothing is queued while
    /// disconnected.  Returns the number of targets in the frame.
    pub fn capture(&self, field_to_robot: Pose2D, layout: &FieldLayout, timestamp_s: f64) -> usize {
        let mut state = lock(&self.state);
        if !state.connected {
            return 0;
        }

        let mut targets: Vec<TrackedTarget> = layout
            .ids()
            .filter_map(|id| {
                let pose = layout.tag_pose(id)?;
                self.model.synthesize(field_to_robot, id, pose)
            })
            .collect();
        targets.sort_by(|a, b| {
            a.best_camera_to_target
                .translation
                .norm()
                .total_cmp(&b.best_camera_to_target.translation.norm())
        });

        let count = targets.len();
        debug!(camera = %self.name, timestamp_s, targets = count, "sim frame captured");
        state.pending.push_back(PipelineResult::new(timestamp_s, targets));
        count
    }
}

impl VisionCamera for SimCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    fn drain_unread(&mut self) -> Vec<PipelineResult> {
        lock(&self.state).pending.drain(..).collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimDrivetrain
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct DriveState {
    heading_rad: f64,
    positions: Vec<SwerveModulePosition>,
    pose: Pose2D,
}

/// A perfect swerve drivetrain: module encoders and gyro follow the
/// commanded motion exactly, and the ground-truth pose is tracked alongside.
#[derive(Debug, Clone)]
pub struct SimDrivetrain {
    kinematics: SwerveKinematics,
    state: Arc<Mutex<DriveState>>,
}

impl SimDrivetrain {
    pub fn new(kinematics: SwerveKinematics, start: Pose2D) -> Self {
        let positions = vec![SwerveModulePosition::default(); kinematics.module_count()];
        Self {
            kinematics,
            state: Arc::new(Mutex::new(DriveState {
                heading_rad: start.theta,
                positions,
                pose: start,
            })),
        }
    }

    /// Move the chassis by `twist` (robot frame) and update the sensors.
    pub fn drive(&self, twist: Twist2D) {
        let deltas = self.kinematics.to_module_deltas(twist);
        let mut state = lock(&self.state);
        for (module, (distance, angle)) in state.positions.iter_mut().zip(deltas) {
            if distance > 0.0 {
                module.distance_m += distance;
                module.angle_rad = angle;
            }
        }
        state.heading_rad += twist.dtheta;
        state.pose = state.pose.exp(twist);
    }

    /// Where the robot really is.
    pub fn truth_pose(&self) -> Pose2D {
        lock(&self.state).pose
    }

    pub fn kinematics(&self) -> &SwerveKinematics {
        &self.kinematics
    }
}

impl OdometrySource for SimDrivetrain {
    fn heading_rad(&self) -> f64 {
        lock(&self.state).heading_rad
    }

    fn module_positions(&self) -> Vec<SwerveModulePosition> {
        lock(&self.state).positions.clone()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
