//! Landmark Observer.
//!
//! Reads the camera once per tick and reduces everything it delivered to a
//! single [`LandmarkObservation`]: the best target of the newest frame.
//! Every other computation in the tick reads that snapshot, so yaw, pitch,
//! distance, pose and path can never disagree about which frame they came
//! from.

use fidnav_perception::observation::LandmarkObservation;
use tracing::{debug, info, warn};

use crate::camera::{PipelineResult, VisionCamera};

pub struct LandmarkObserver {
    camera: Box<dyn VisionCamera>,
    snapshot: LandmarkObservation,
    connected: bool,
    /// Tick stamp of the last poll that drained the camera.
    polled_at: Option<f64>,
}

impl LandmarkObserver {
    pub fn new(camera: Box<dyn VisionCamera>) -> Self {
        let connected = camera.is_connected();
        Self {
            camera,
            snapshot: LandmarkObservation::none(),
            connected,
            polled_at: None,
        }
    }

    /// Snapshot for the tick stamped `tick_s`.
    ///
    /// The first call with a new stamp drains the camera; repeated calls
    /// with the same stamp return the cached snapshot untouched.  A tick
    /// with no unread frames, or whose newest frame tracked nothing, yields
    /// [`LandmarkObservation::none`].
    pub fn poll_latest(&mut self, tick_s: f64) -> &LandmarkObservation {
        if self.polled_at == Some(tick_s) {
            return &self.snapshot;
        }
        self.polled_at = Some(tick_s);

        let connected = self.camera.is_connected();
        if self.connected && !connected {
            warn!(camera = self.camera.name(), "vision camera disconnected");
        } else if !self.connected && connected {
            info!(camera = self.camera.name(), "vision camera connected");
        }
        self.connected = connected;

        let frames = self.camera.drain_unread();
        debug!(
            camera = self.camera.name(),
            frames = frames.len(),
            "drained vision frames"
        );

        self.snapshot = frames
            .iter()
            .max_by(|a, b| a.timestamp_s.total_cmp(&b.timestamp_s))
            .map(observation_from)
            .unwrap_or_else(LandmarkObservation::none);
        &self.snapshot
    }

    /// The snapshot taken by the last [`poll_latest`](Self::poll_latest),
    /// without touching the camera.
    pub fn current(&self) -> &LandmarkObservation {
        &self.snapshot
    }

    /// Connection state as of the last poll.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// `true` only while connected and holding a valid snapshot.
    pub fn has_target(&self) -> bool {
        self.connected && self.snapshot.has_landmark()
    }

    pub fn camera_name(&self) -> &str {
        self.camera.name()
    }
}

fn observation_from(result: &PipelineResult) -> LandmarkObservation {
    match result.best_target() {
        Some(target) if target.fiducial_id >= 0 => LandmarkObservation {
            id: target.fiducial_id,
            camera_to_target: target.best_camera_to_target,
            yaw_deg: target.yaw_deg,
            pitch_deg: target.pitch_deg,
            timestamp_s: result.timestamp_s,
            valid: true,
        },
        _ => LandmarkObservation::none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::TrackedTarget;
    use crate::sim::SimCamera;
    use fidnav_perception::observation::NO_LANDMARK;
    use fidnav_perception::transform::Transform3D;

    fn frame(timestamp_s: f64, ids: &[i32]) -> PipelineResult {
        PipelineResult::new(
            timestamp_s,
            ids.iter()
                .map(|&id| TrackedTarget {
                    fiducial_id: id,
                    yaw_deg: id as f64,
                    pitch_deg: -(id as f64),
                    area: 2.0,
                    pose_ambiguity: 0.05,
                    best_camera_to_target: Transform3D::from_xyz_rpy(2.0, 0.5, 0.0, 0.0, 0.0, 0.0),
                })
                .collect(),
        )
    }

    fn observer() -> (SimCamera, LandmarkObserver) {
        let cam = SimCamera::new("arducam", Transform3D::identity());
        let observer = LandmarkObserver::new(Box::new(cam.clone()));
        (cam, observer)
    }

    #[test]
    fn newest_frame_best_target_wins() {
        let (cam, mut obs) = observer();
        cam.push_frame(frame(1.0, &[7]));
        cam.push_frame(frame(2.0, &[8, 7]));

        let snap = *obs.poll_latest(2.0);
        assert_eq!(snap.id, 8);
        assert!(snap.valid);
        assert!((snap.timestamp_s - 2.0).abs() < 1e-12);
        assert!((snap.yaw_deg - 8.0).abs() < 1e-12);
        assert!(obs.has_target());
    }

    #[test]
    fn same_tick_returns_cached_snapshot() {
        let (cam, mut obs) = observer();
        cam.push_frame(frame(1.0, &[7]));
        let first = *obs.poll_latest(0.02);
        let second = *obs.poll_latest(0.02);
        assert_eq!(first.id, 7);
        assert_eq!(first, second);
        assert!(obs.has_target());

        // A frame landing mid-tick waits for the next tick.
        cam.push_frame(frame(1.5, &[9]));
        assert_eq!(obs.poll_latest(0.02).id, 7);
        assert_eq!(cam.pending(), 1);
        assert_eq!(obs.poll_latest(0.04).id, 9);
    }

    #[test]
    fn next_tick_without_frames_yields_sentinel() {
        let (cam, mut obs) = observer();
        cam.push_frame(frame(1.0, &[7]));
        assert_eq!(obs.poll_latest(0.02).id, 7);
        assert_eq!(obs.poll_latest(0.04).id, NO_LANDMARK);
        assert!(!obs.has_target());
    }

    #[test]
    fn current_returns_cached_snapshot() {
        let (cam, mut obs) = observer();
        cam.push_frame(frame(1.0, &[6]));
        obs.poll_latest(1.0);
        // A frame arriving mid-tick does not change the snapshot.
        cam.push_frame(frame(1.5, &[9]));
        assert_eq!(obs.current().id, 6);
        assert_eq!(obs.current().id, 6);
    }

    #[test]
    fn newest_frame_without_targets_yields_sentinel() {
        let (cam, mut obs) = observer();
        cam.push_frame(frame(1.0, &[7]));
        cam.push_frame(frame(2.0, &[]));
        assert_eq!(*obs.poll_latest(2.0), LandmarkObservation::none());
    }

    #[test]
    fn disconnected_camera_never_has_target() {
        let (cam, mut obs) = observer();
        cam.push_frame(frame(1.0, &[7]));
        cam.set_connected(false);

        let snap = *obs.poll_latest(1.0);
        assert!(snap.valid);
        assert!(!obs.is_connected());
        assert!(!obs.has_target());
    }

    #[test]
    fn reconnect_restores_target() {
        let (cam, mut obs) = observer();
        cam.set_connected(false);
        obs.poll_latest(2.0);
        assert!(!obs.is_connected());

        cam.set_connected(true);
        cam.push_frame(frame(3.0, &[10]));
        obs.poll_latest(3.0);
        assert!(obs.is_connected());
        assert!(obs.has_target());
        assert_eq!(obs.camera_name(), "arducam");
    }
}
