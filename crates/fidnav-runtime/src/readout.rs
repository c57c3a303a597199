//! Readout adapter: the per-tick values shown on the driver dashboard.

use fidnav_middleware::TelemetrySink;
use fidnav_perception::composer::LandmarkLookup;
use fidnav_perception::observation::{LandmarkObservation, NO_LANDMARK};
use fidnav_perception::pose2d::Pose2D;
use fidnav_types::PoseData;
use serde::Serialize;

/// Dashboard key of the fused pose, relative to the tab.
pub const ROBOT_POSE_KEY: &str = "Field/Robot";

/// Tab used when none is configured.
pub const DEFAULT_TAB: &str = "vision";

/// Where one localizer's values land on the dashboard.
///
/// Every readout key is prefixed with the tab, so several cameras can share
/// one sink.  The raw vision pose goes to its own key, `<tab>/VisionPose`
/// unless overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryKeys {
    tab: String,
    vision_pose: String,
}

impl TelemetryKeys {
    pub fn new(tab: impl Into<String>, vision_pose: Option<String>) -> Self {
        let tab = tab.into();
        let vision_pose = vision_pose.unwrap_or_else(|| join(&tab, "VisionPose"));
        Self { tab, vision_pose }
    }

    pub fn tab(&self) -> &str {
        &self.tab
    }

    /// `name` inside this tab; an empty tab leaves it bare.
    pub fn key(&self, name: &str) -> String {
        join(&self.tab, name)
    }

    pub fn vision_pose(&self) -> &str {
        &self.vision_pose
    }
}

impl Default for TelemetryKeys {
    fn default() -> Self {
        Self::new(DEFAULT_TAB, None)
    }
}

fn join(tab: &str, name: &str) -> String {
    if tab.is_empty() {
        name.to_string()
    } else {
        format!("{tab}/{name}")
    }
}

fn pose_data(pose: Pose2D) -> PoseData {
    PoseData {
        x_m: pose.x,
        y_m: pose.y,
        heading_rad: pose.theta,
    }
}

/// Values derived from the current tick's observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Readout {
    pub yaw_deg: f64,
    pub pitch_deg: f64,
    /// Floor-plane distance from the robot to the landmark (metres).
    pub distance_m: f64,
    pub id: i32,
    pub target_in_view: bool,
    pub robot_pose: Pose2D,
    /// Robot pose composed from this tick's landmark alone, before fusion.
    pub vision_pose: Option<Pose2D>,
}

impl Readout {
    /// Build the readout for one tick.
    ///
    /// Distance is the planar distance between `estimate` and the landmark's
    /// field pose, scaled by `cos(pitch)`; it is zero without a target or
    /// without a layout entry.
    pub fn from_tick(
        observation: &LandmarkObservation,
        estimate: Pose2D,
        layout: &impl LandmarkLookup,
        connected: bool,
    ) -> Self {
        if !observation.has_landmark() {
            return Self {
                yaw_deg: 0.0,
                pitch_deg: 0.0,
                distance_m: 0.0,
                id: NO_LANDMARK,
                target_in_view: false,
                robot_pose: estimate,
                vision_pose: None,
            };
        }

        let distance_m = layout
            .landmark_pose(observation.id)
            .map(|tag| estimate.distance(&tag.to_pose2d()) * observation.pitch_deg.to_radians().cos())
            .unwrap_or(0.0);

        Self {
            yaw_deg: observation.yaw_deg,
            pitch_deg: observation.pitch_deg,
            distance_m,
            id: observation.id,
            target_in_view: connected,
            robot_pose: estimate,
            vision_pose: None,
        }
    }

    /// Attach the composed vision pose for this tick.
    pub fn with_vision_pose(mut self, vision_pose: Option<Pose2D>) -> Self {
        self.vision_pose = vision_pose;
        self
    }

    /// Push every value to `sink` under `keys`.  The vision pose is only
    /// sent on ticks that produced one.
    pub fn publish(&self, sink: &dyn TelemetrySink, keys: &TelemetryKeys) {
        sink.put_number(&keys.key("yaw"), self.yaw_deg);
        sink.put_number(&keys.key("pitch"), self.pitch_deg);
        sink.put_number(&keys.key("id"), f64::from(self.id));
        sink.put_number(&keys.key("distance"), self.distance_m);
        sink.put_bool(&keys.key("Tag In View"), self.target_in_view);
        sink.put_pose(&keys.key(ROBOT_POSE_KEY), pose_data(self.robot_pose));
        if let Some(pose) = self.vision_pose {
            sink.put_pose(keys.vision_pose(), pose_data(pose));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fidnav_perception::layout::FieldLayout;
    use fidnav_perception::transform::Transform3D;
    use fidnav_types::EventPayload;
    use std::f64::consts::PI;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventPayload>>);

    impl TelemetrySink for Recorder {
        fn record(&self, payload: EventPayload) {
            self.0.lock().unwrap().push(payload);
        }
    }

    fn layout() -> FieldLayout {
        FieldLayout::from_tags(
            vec![(7, Transform3D::from_xyz_rpy(5.0, 1.0, 0.5, 0.0, 0.0, PI))],
            16.5,
            8.0,
        )
        .unwrap()
    }

    fn observation(id: i32, pitch_deg: f64) -> LandmarkObservation {
        LandmarkObservation {
            id,
            camera_to_target: Transform3D::identity(),
            yaw_deg: -4.0,
            pitch_deg,
            timestamp_s: 1.0,
            valid: true,
        }
    }

    #[test]
    fn distance_is_projected_by_pitch() {
        let r = Readout::from_tick(&observation(7, 60.0), Pose2D::new(3.0, 1.0, 0.0), &layout(), true);
        assert!((r.distance_m - 1.0).abs() < 1e-9);
        assert_eq!(r.id, 7);
        assert!((r.yaw_deg + 4.0).abs() < 1e-12);
        assert!(r.target_in_view);
    }

    #[test]
    fn no_target_reads_zero_and_sentinel() {
        let r = Readout::from_tick(&LandmarkObservation::none(), Pose2D::new(3.0, 1.0, 0.0), &layout(), true);
        assert_eq!(r.id, NO_LANDMARK);
        assert_eq!(r.distance_m, 0.0);
        assert_eq!(r.yaw_deg, 0.0);
        assert!(!r.target_in_view);
    }

    #[test]
    fn unknown_landmark_keeps_angles_but_zero_distance() {
        let r = Readout::from_tick(&observation(42, 10.0), Pose2D::identity(), &layout(), true);
        assert_eq!(r.id, 42);
        assert_eq!(r.distance_m, 0.0);
        assert!((r.pitch_deg - 10.0).abs() < 1e-12);
    }

    #[test]
    fn disconnected_camera_is_not_in_view() {
        let r = Readout::from_tick(&observation(7, 0.0), Pose2D::new(3.0, 1.0, 0.0), &layout(), false);
        assert!(!r.target_in_view);
    }

    fn published_keys(sink: &Recorder) -> Vec<String> {
        sink.0
            .lock()
            .unwrap()
            .iter()
            .map(|p| match p {
                EventPayload::Scalar { key, .. }
                | EventPayload::Flag { key, .. }
                | EventPayload::Pose { key, .. } => key.clone(),
                _ => String::new(),
            })
            .collect()
    }

    #[test]
    fn publish_pushes_every_key_under_the_tab() {
        let sink = Recorder::default();
        Readout::from_tick(&observation(7, 0.0), Pose2D::new(3.0, 1.0, 0.0), &layout(), true)
            .publish(&sink, &TelemetryKeys::default());

        assert_eq!(
            published_keys(&sink),
            vec![
                "vision/yaw",
                "vision/pitch",
                "vision/id",
                "vision/distance",
                "vision/Tag In View",
                "vision/Field/Robot",
            ]
        );
    }

    #[test]
    fn vision_pose_goes_to_its_own_key() {
        let sink = Recorder::default();
        let keys = TelemetryKeys::new("front", Some("Poses/FrontCam".to_string()));
        let composed = Pose2D::new(2.9, 1.1, 0.05);
        Readout::from_tick(&observation(7, 0.0), Pose2D::new(3.0, 1.0, 0.0), &layout(), true)
            .with_vision_pose(Some(composed))
            .publish(&sink, &keys);

        let got = sink.0.lock().unwrap();
        let vision: Vec<_> = got
            .iter()
            .filter_map(|p| match p {
                EventPayload::Pose { key, pose } if key == "Poses/FrontCam" => Some(*pose),
                _ => None,
            })
            .collect();
        assert_eq!(vision.len(), 1);
        assert!((vision[0].x_m - 2.9).abs() < 1e-12);
        assert!((vision[0].heading_rad - 0.05).abs() < 1e-12);
    }

    #[test]
    fn telemetry_keys_compose_with_tab() {
        let keys = TelemetryKeys::new("rear", None);
        assert_eq!(keys.tab(), "rear");
        assert_eq!(keys.key("yaw"), "rear/yaw");
        assert_eq!(keys.vision_pose(), "rear/VisionPose");

        let bare = TelemetryKeys::new("", None);
        assert_eq!(bare.key("yaw"), "yaw");
        assert_eq!(bare.vision_pose(), "VisionPose");
    }
}
