//! The tick-loop owner.
//!
//! [`VisionLocalizer`] wires the collaborators together and runs one fixed
//! sequence per control tick:
//!
//! ```text
//! poll camera ──► predict (always) ──► compose ──► correct (gated) ──► readout
//! ```
//!
//! A correction happens only when the snapshot is valid, its id is in the
//! usable set, and the layout knows the landmark.  Path requests run out of
//! band and read the same snapshot and estimate the last tick produced.

use std::sync::Arc;

use fidnav_hal::drivetrain::OdometrySource;
use fidnav_hal::observer::LandmarkObserver;
use fidnav_middleware::TelemetrySink;
use fidnav_perception::composer::compose_field_pose;
use fidnav_perception::fusion::FusionEstimator;
use fidnav_perception::layout::FieldLayout;
use fidnav_perception::observation::{LandmarkObservation, UsableIds};
use fidnav_perception::pose2d::Pose2D;
use fidnav_perception::transform::Transform3D;
use fidnav_types::{EventPayload, FidnavError, PathSummary, PoseData};
use tracing::{debug, info};

use crate::planner::{GoalAnchor, GoalPathGenerator, Path, PathConstraints};
use crate::readout::{Readout, TelemetryKeys};

/// Static wiring of a [`VisionLocalizer`].
#[derive(Debug, Clone)]
pub struct LocalizerConfig {
    /// Landmarks trusted for correction and path generation.
    pub usable_ids: UsableIds,
    /// Camera pose in the robot frame.
    pub robot_to_camera: Transform3D,
    /// Distance kept between the goal and the landmark (metres).
    pub standoff_m: f64,
    pub goal_anchor: GoalAnchor,
    pub constraints: PathConstraints,
    /// Dashboard namespace of this localizer's readouts.
    pub telemetry: TelemetryKeys,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            usable_ids: UsableIds::default(),
            robot_to_camera: Transform3D::identity(),
            standoff_m: 1.0,
            goal_anchor: GoalAnchor::default(),
            constraints: PathConstraints::default(),
            telemetry: TelemetryKeys::default(),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub observation: LandmarkObservation,
    /// `true` when a vision correction was applied this tick.
    pub corrected: bool,
    /// Robot pose composed from the landmark alone, when one was in view and
    /// the layout knows it.
    pub vision_pose: Option<Pose2D>,
    pub estimate: Pose2D,
    pub readout: Readout,
}

pub struct VisionLocalizer<E: FusionEstimator> {
    observer: LandmarkObserver,
    odometry: Box<dyn OdometrySource>,
    estimator: E,
    layout: Arc<FieldLayout>,
    usable: UsableIds,
    robot_to_camera: Transform3D,
    standoff_m: f64,
    planner: GoalPathGenerator,
    sink: Option<Arc<dyn TelemetrySink>>,
    keys: TelemetryKeys,
    ticks: u64,
    corrections: u64,
}

impl<E: FusionEstimator> VisionLocalizer<E> {
    pub fn new(
        config: LocalizerConfig,
        layout: Arc<FieldLayout>,
        observer: LandmarkObserver,
        odometry: Box<dyn OdometrySource>,
        estimator: E,
    ) -> Self {
        let planner = GoalPathGenerator::new(
            config.usable_ids.clone(),
            Arc::clone(&layout),
            config.goal_anchor,
            config.constraints,
        );
        Self {
            observer,
            odometry,
            estimator,
            layout,
            usable: config.usable_ids,
            robot_to_camera: config.robot_to_camera,
            standoff_m: config.standoff_m,
            planner,
            sink: None,
            keys: config.telemetry,
            ticks: 0,
            corrections: 0,
        }
    }

    /// Publish readouts and path summaries through `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run one control tick at monotonic time `now_s`.
    ///
    /// # Errors
    ///
    /// Only a module-count mismatch between the odometry source and the
    /// estimator's kinematics, which is a configuration defect.
    pub fn tick(&mut self, now_s: f64) -> Result<TickReport, FidnavError> {
        let was_connected = self.observer.is_connected();
        let observation = *self.observer.poll_latest(now_s);
        let connected = self.observer.is_connected();
        if was_connected && !connected {
            self.emit(EventPayload::VisionFault {
                camera: self.observer.camera_name().to_string(),
                message: "camera disconnected".to_string(),
            });
        }

        let heading = self.odometry.heading_rad();
        let modules = self.odometry.module_positions();
        self.estimator.predict(now_s, heading, &modules)?;

        let vision_pose =
            compose_field_pose(&observation, self.robot_to_camera, self.layout.as_ref())
                .map(|pose| pose.to_pose2d());
        let corrected = match vision_pose {
            Some(pose) => self.try_correct(&observation, pose),
            None => false,
        };
        let estimate = self.estimator.estimate();
        let readout = Readout::from_tick(&observation, estimate, self.layout.as_ref(), connected)
            .with_vision_pose(vision_pose);
        if let Some(sink) = &self.sink {
            readout.publish(sink.as_ref(), &self.keys);
        }

        self.ticks += 1;
        debug!(
            tick = self.ticks,
            landmark = observation.id,
            corrected,
            x = estimate.x,
            y = estimate.y,
            theta = estimate.theta,
            "tick"
        );

        Ok(TickReport {
            observation,
            corrected,
            vision_pose,
            estimate,
            readout,
        })
    }

    fn try_correct(&mut self, observation: &LandmarkObservation, pose: Pose2D) -> bool {
        if !self.usable.contains(observation.id) {
            debug!(landmark = observation.id, "landmark not trusted for correction");
            return false;
        }
        if !self.estimator.correct(pose, observation.timestamp_s) {
            return false;
        }
        self.corrections += 1;
        info!(
            landmark = observation.id,
            timestamp_s = observation.timestamp_s,
            vision_x = pose.x,
            vision_y = pose.y,
            "vision correction"
        );
        true
    }

    /// Build a path toward the landmark seen in the latest tick.
    ///
    /// `None` when no usable landmark is in view; that is a normal outcome.
    pub fn request_path(&self, final_heading_deg: f64) -> Option<Path> {
        let observation = self.observer.current();
        let estimate = self.estimator.estimate();
        let Some(path) =
            self.planner
                .build_path(estimate, observation, self.standoff_m, final_heading_deg)
        else {
            info!(landmark = observation.id, "path requested without a usable landmark");
            return None;
        };

        let goal = path.goal();
        self.emit(EventPayload::PathGenerated(PathSummary {
            landmark_id: observation.id,
            waypoint_count: path.waypoints().len(),
            goal: PoseData {
                x_m: goal.x,
                y_m: goal.y,
                heading_rad: goal.theta,
            },
            final_heading_rad: path.end_state().heading_rad,
        }));
        Some(path)
    }

    fn emit(&self, payload: EventPayload) {
        if let Some(sink) = &self.sink {
            sink.record(payload);
        }
    }

    pub fn estimate(&self) -> Pose2D {
        self.estimator.estimate()
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn observer(&self) -> &LandmarkObserver {
        &self.observer
    }

    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Corrections applied so far.
    pub fn corrections(&self) -> u64 {
        self.corrections
    }
}
