//! `VisionCamera` trait and the pipeline results a fiducial camera reports.

use fidnav_perception::transform::Transform3D;

/// One fiducial the pipeline tracked in a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedTarget {
    pub fiducial_id: i32,
    /// Horizontal angle to the target centre, degrees, positive to the right.
    pub yaw_deg: f64,
    /// Vertical angle to the target centre, degrees, positive up.
    pub pitch_deg: f64,
    /// Share of the image covered by the target, percent.
    pub area: f64,
    /// Ratio of the two PnP solutions' reprojection errors; lower is better.
    pub pose_ambiguity: f64,
    /// Lowest-error pose of the target in the camera frame.
    pub best_camera_to_target: Transform3D,
}

/// Everything the pipeline produced for one captured frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineResult {
    /// Capture time on the shared monotonic clock (seconds).
    pub timestamp_s: f64,
    /// Tracked targets, best first.
    pub targets: Vec<TrackedTarget>,
}

impl PipelineResult {
    pub fn new(timestamp_s: f64, targets: Vec<TrackedTarget>) -> Self {
        Self {
            timestamp_s,
            targets,
        }
    }

    pub fn has_targets(&self) -> bool {
        !self.targets.is_empty()
    }

    /// The pipeline's top-ranked target.
    pub fn best_target(&self) -> Option<&TrackedTarget> {
        self.targets.first()
    }
}

/// A camera running an on-board fiducial pipeline.
///
/// Frames accumulate on the camera side until read; each frame is handed out
/// exactly once.
pub trait VisionCamera: Send {
    /// Stable identifier for this camera, e.g. `"arducam"`.
    fn name(&self) -> &str;

    /// `true` while the camera is reachable.
    fn is_connected(&self) -> bool;

    /// Every result received since the previous call, oldest first.
    fn drain_unread(&mut self) -> Vec<PipelineResult>;
}
