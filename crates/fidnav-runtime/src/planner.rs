//! Goal Path Generator.
//!
//! Turns the active landmark observation and the fused pose into an
//! immutable [`Path`]: a two-waypoint Bézier description from the robot to a
//! goal pose set back from the landmark by a standoff distance.
//!
//! Two goal policies are available through [`GoalAnchor`]:
//!
//! * [`GoalAnchor::EstimatorRelative`] – the landmark's camera-relative
//!   translation, pulled back by the standoff along X, is added to the
//!   estimate's field position.  The goal stays close to where the estimator
//!   already believes the robot is, so landmark pose noise cannot throw it
//!   across the field.
//! * [`GoalAnchor::LandmarkAbsolute`] – the goal sits `standoff` metres in
//!   front of the landmark's surveyed field pose, facing it.

use std::f64::consts::PI;
use std::sync::Arc;

use fidnav_perception::composer::LandmarkLookup;
use fidnav_perception::layout::FieldLayout;
use fidnav_perception::observation::{LandmarkObservation, UsableIds};
use fidnav_perception::pose2d::Pose2D;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ────────────────────────────────────────────────────────────────────────────
// Path descriptor
// ────────────────────────────────────────────────────────────────────────────

/// Velocity and acceleration limits for following a path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathConstraints {
    pub max_velocity_mps: f64,
    pub max_acceleration_mps_sq: f64,
    pub max_angular_velocity_rps: f64,
    pub max_angular_acceleration_rps_sq: f64,
}

impl Default for PathConstraints {
    fn default() -> Self {
        Self {
            max_velocity_mps: 3.0,
            max_acceleration_mps_sq: 3.0,
            max_angular_velocity_rps: 2.0 * PI,
            max_angular_acceleration_rps_sq: 4.0 * PI,
        }
    }
}

/// State the robot should be in when the path ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalEndState {
    pub velocity_mps: f64,
    pub heading_rad: f64,
}

/// One anchor point of a Bézier path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub anchor: Pose2D,
    /// Heading the robot should hold when passing this anchor, if any.
    pub heading_constraint: Option<f64>,
    pub prev_control: Option<(f64, f64)>,
    pub next_control: Option<(f64, f64)>,
}

/// Immutable path handed to the path follower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    waypoints: Vec<Waypoint>,
    constraints: PathConstraints,
    end_state: GoalEndState,
    prevent_flipping: bool,
}

impl Path {
    /// Build a path through `poses`, using each pose's heading as the
    /// tangent direction.  Control points sit one third of the way to the
    /// neighbouring anchor.
    ///
    /// Returns `None` with fewer than two poses or any non-finite value.
    pub fn from_poses(
        poses: &[Pose2D],
        constraints: PathConstraints,
        end_state: GoalEndState,
    ) -> Option<Self> {
        if poses.len() < 2
            || poses.iter().any(|p| !p.is_finite())
            || !end_state.heading_rad.is_finite()
            || !end_state.velocity_mps.is_finite()
        {
            return None;
        }

        let last = poses.len() - 1;
        let control = |p: &Pose2D, toward: &Pose2D, direction: f64| {
            let d = p.distance(toward) / 3.0;
            (p.x + d * direction.cos(), p.y + d * direction.sin())
        };

        let waypoints = poses
            .iter()
            .enumerate()
            .map(|(i, p)| Waypoint {
                anchor: *p,
                heading_constraint: (i == last).then_some(p.theta),
                prev_control: (i > 0).then(|| control(p, &poses[i - 1], p.theta + PI)),
                next_control: (i < last).then(|| control(p, &poses[i + 1], p.theta)),
            })
            .collect();

        Some(Self {
            waypoints,
            constraints,
            end_state,
            prevent_flipping: true,
        })
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn constraints(&self) -> &PathConstraints {
        &self.constraints
    }

    pub fn end_state(&self) -> &GoalEndState {
        &self.end_state
    }

    /// Always `true`: goals are computed in absolute field coordinates and
    /// must not be mirrored for the other alliance.
    pub fn prevent_flipping(&self) -> bool {
        self.prevent_flipping
    }

    pub fn start(&self) -> Pose2D {
        self.waypoints[0].anchor
    }

    pub fn goal(&self) -> Pose2D {
        self.waypoints[self.waypoints.len() - 1].anchor
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generator
// ────────────────────────────────────────────────────────────────────────────

/// Where the goal pose is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalAnchor {
    #[default]
    EstimatorRelative,
    LandmarkAbsolute,
}

/// Builds goal paths toward trusted landmarks.
#[derive(Debug, Clone)]
pub struct GoalPathGenerator {
    usable: UsableIds,
    layout: Arc<FieldLayout>,
    anchor: GoalAnchor,
    constraints: PathConstraints,
}

impl GoalPathGenerator {
    pub fn new(
        usable: UsableIds,
        layout: Arc<FieldLayout>,
        anchor: GoalAnchor,
        constraints: PathConstraints,
    ) -> Self {
        Self {
            usable,
            layout,
            anchor,
            constraints,
        }
    }

    pub fn anchor(&self) -> GoalAnchor {
        self.anchor
    }

    /// Goal pose for `observation`, or `None` when the landmark is not
    /// trusted or (for [`GoalAnchor::LandmarkAbsolute`]) not in the layout.
    pub fn goal_pose(
        &self,
        current: Pose2D,
        observation: &LandmarkObservation,
        standoff_m: f64,
    ) -> Option<Pose2D> {
        if !observation.valid || !self.usable.contains(observation.id) {
            return None;
        }

        match self.anchor {
            GoalAnchor::EstimatorRelative => {
                let t = observation.camera_to_target;
                Some(Pose2D::new(
                    t.translation.x - standoff_m + current.x,
                    t.translation.y + current.y,
                    t.rotation.yaw(),
                ))
            }
            GoalAnchor::LandmarkAbsolute => {
                let tag = self.layout.landmark_pose(observation.id)?.to_pose2d();
                let (sin, cos) = tag.theta.sin_cos();
                Some(Pose2D::new(
                    tag.x + standoff_m * cos,
                    tag.y + standoff_m * sin,
                    tag.theta + PI,
                ))
            }
        }
    }

    /// Path from `current` to the goal for `observation`.
    ///
    /// `None` is a normal outcome: no trusted landmark in view.
    pub fn build_path(
        &self,
        current: Pose2D,
        observation: &LandmarkObservation,
        standoff_m: f64,
        final_heading_deg: f64,
    ) -> Option<Path> {
        let Some(goal) = self.goal_pose(current, observation, standoff_m) else {
            debug!(landmark = observation.id, "no usable landmark for path");
            return None;
        };

        let end_state = GoalEndState {
            velocity_mps: 0.0,
            heading_rad: final_heading_deg.to_radians(),
        };
        let path = Path::from_poses(&[current, goal], self.constraints, end_state)?;
        info!(
            landmark = observation.id,
            anchor = ?self.anchor,
            goal_x = goal.x,
            goal_y = goal.y,
            goal_heading = goal.theta,
            "goal path built"
        );
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fidnav_perception::transform::Transform3D;

    fn layout() -> Arc<FieldLayout> {
        Arc::new(
            FieldLayout::from_tags(
                vec![
                    (7, Transform3D::from_xyz_rpy(5.0, 1.0, 0.5, 0.0, 0.0, PI)),
                    (99, Transform3D::from_xyz_rpy(8.0, 4.0, 0.5, 0.0, 0.0, 0.0)),
                ],
                16.5,
                8.0,
            )
            .unwrap(),
        )
    }

    fn generator(anchor: GoalAnchor) -> GoalPathGenerator {
        GoalPathGenerator::new(
            UsableIds::new([6, 7, 8]),
            layout(),
            anchor,
            PathConstraints::default(),
        )
    }

    fn observation(id: i32, x: f64, y: f64, yaw: f64) -> LandmarkObservation {
        LandmarkObservation {
            id,
            camera_to_target: Transform3D::from_xyz_rpy(x, y, 0.0, 0.0, 0.0, yaw),
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            timestamp_s: 1.0,
            valid: true,
        }
    }

    #[test]
    fn goal_is_offset_from_landmark_relative_transform() {
        let path = generator(GoalAnchor::EstimatorRelative)
            .build_path(Pose2D::identity(), &observation(7, 2.0, 0.5, 0.0), 1.0, 180.0)
            .expect("usable landmark");

        assert_eq!(path.waypoints().len(), 2);
        assert!((path.goal().x - 1.0).abs() < 1e-12);
        assert!((path.goal().y - 0.5).abs() < 1e-12);
        assert!(path.goal().theta.abs() < 1e-12);
        assert_eq!(path.start(), Pose2D::identity());
    }

    #[test]
    fn goal_adds_current_estimate_position() {
        let path = generator(GoalAnchor::EstimatorRelative)
            .build_path(Pose2D::new(3.0, -1.0, 0.4), &observation(7, 2.0, 0.5, 0.3), 1.0, 0.0)
            .unwrap();
        assert!((path.goal().x - 4.0).abs() < 1e-12);
        assert!((path.goal().y + 0.5).abs() < 1e-12);
        assert!((path.goal().theta - 0.3).abs() < 1e-12);
    }

    #[test]
    fn constraints_end_state_and_flipping() {
        let path = generator(GoalAnchor::EstimatorRelative)
            .build_path(Pose2D::identity(), &observation(7, 2.0, 0.5, 0.0), 1.0, 90.0)
            .unwrap();
        assert_eq!(*path.constraints(), PathConstraints::default());
        assert!((path.constraints().max_angular_velocity_rps - 2.0 * PI).abs() < 1e-12);
        assert_eq!(path.end_state().velocity_mps, 0.0);
        assert!((path.end_state().heading_rad - PI / 2.0).abs() < 1e-12);
        assert!(path.prevent_flipping());
    }

    #[test]
    fn control_points_lie_a_third_along_heading() {
        let start = Pose2D::identity();
        let goal = Pose2D::new(3.0, 0.0, 0.0);
        let path = Path::from_poses(
            &[start, goal],
            PathConstraints::default(),
            GoalEndState {
                velocity_mps: 0.0,
                heading_rad: 0.0,
            },
        )
        .unwrap();

        let first = path.waypoints()[0];
        let last = path.waypoints()[1];
        assert!(first.prev_control.is_none());
        let (nx, ny) = first.next_control.unwrap();
        assert!((nx - 1.0).abs() < 1e-12 && ny.abs() < 1e-12);
        assert!(last.next_control.is_none());
        let (px, py) = last.prev_control.unwrap();
        assert!((px - 2.0).abs() < 1e-12 && py.abs() < 1e-12);
        assert_eq!(last.heading_constraint, Some(0.0));
        assert_eq!(first.heading_constraint, None);
    }

    #[test]
    fn unusable_id_yields_no_path() {
        let generator = generator(GoalAnchor::EstimatorRelative);
        assert!(generator
            .build_path(Pose2D::identity(), &observation(99, 2.0, 0.5, 0.0), 1.0, 0.0)
            .is_none());
    }

    #[test]
    fn sentinel_and_invalid_observations_yield_no_path() {
        let generator = generator(GoalAnchor::EstimatorRelative);
        assert!(generator
            .build_path(Pose2D::identity(), &LandmarkObservation::none(), 1.0, 0.0)
            .is_none());
        let mut obs = observation(7, 2.0, 0.5, 0.0);
        obs.valid = false;
        assert!(generator.build_path(Pose2D::identity(), &obs, 1.0, 0.0).is_none());
    }

    #[test]
    fn landmark_absolute_goal_faces_the_tag() {
        let path = generator(GoalAnchor::LandmarkAbsolute)
            .build_path(Pose2D::new(1.0, 1.0, 0.0), &observation(7, 2.0, 0.5, 0.0), 1.0, 0.0)
            .unwrap();
        // Tag 7 at (5, 1) faces -X; one metre in front of it is (4, 1).
        assert!((path.goal().x - 4.0).abs() < 1e-9);
        assert!((path.goal().y - 1.0).abs() < 1e-9);
        assert!(path.goal().theta.abs() < 1e-9);
    }

    #[test]
    fn landmark_absolute_needs_layout_entry() {
        let generator = GoalPathGenerator::new(
            UsableIds::new([42]),
            layout(),
            GoalAnchor::LandmarkAbsolute,
            PathConstraints::default(),
        );
        assert!(generator
            .build_path(Pose2D::identity(), &observation(42, 2.0, 0.0, 0.0), 1.0, 0.0)
            .is_none());
    }

    #[test]
    fn non_finite_inputs_yield_no_path() {
        let generator = generator(GoalAnchor::EstimatorRelative);
        let obs = observation(7, 2.0, 0.5, 0.0);
        assert!(generator
            .build_path(Pose2D::identity(), &obs, f64::NAN, 0.0)
            .is_none());
        assert!(generator
            .build_path(Pose2D::identity(), &obs, 1.0, f64::INFINITY)
            .is_none());
    }

    #[test]
    fn anchor_policy_deserializes_from_snake_case() {
        let anchor: GoalAnchor = serde_json::from_str("\"landmark_absolute\"").unwrap();
        assert_eq!(anchor, GoalAnchor::LandmarkAbsolute);
        assert_eq!(GoalAnchor::default(), GoalAnchor::EstimatorRelative);
    }
}
