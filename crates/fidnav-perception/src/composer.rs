//! Frame Composer: camera observation → field-relative robot pose.
//!
//! ```text
//! field_to_robot = field_to_target ∘ camera_to_target⁻¹ ∘ robot_to_camera⁻¹
//! ```
//!
//! The whole chain is composed in 3-D and only projected to the floor plane
//! by the caller, so a tilted or rolled camera mount stays exact.

use crate::layout::FieldLayout;
use crate::observation::{LandmarkObservation, NO_LANDMARK};
use crate::transform::{Pose3D, Transform3D};

/// Read-only source of landmark world poses.
pub trait LandmarkLookup {
    fn landmark_pose(&self, id: i32) -> Option<Pose3D>;
}

impl LandmarkLookup for FieldLayout {
    fn landmark_pose(&self, id: i32) -> Option<Pose3D> {
        self.tag_pose(id)
    }
}

/// Robot pose in the field frame given one camera measurement.
pub fn estimate_field_to_robot(
    camera_to_target: Transform3D,
    field_to_target: Pose3D,
    robot_to_camera: Transform3D,
) -> Pose3D {
    field_to_target
        .compose(camera_to_target.inverse())
        .compose(robot_to_camera.inverse())
}

/// Compose the field-relative robot pose for `observation`.
///
/// Returns `None` for the sentinel id, invalid observations and ids the
/// layout does not know.  The layout is never consulted for the sentinel.
pub fn compose_field_pose(
    observation: &LandmarkObservation,
    robot_to_camera: Transform3D,
    layout: &impl LandmarkLookup,
) -> Option<Pose3D> {
    if observation.id == NO_LANDMARK || !observation.valid {
        return None;
    }
    let field_to_target = layout.landmark_pose(observation.id)?;
    Some(estimate_field_to_robot(
        observation.camera_to_target,
        field_to_target,
        robot_to_camera,
    ))
}
