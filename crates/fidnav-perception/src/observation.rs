//! Per-tick landmark observation snapshot and the trusted-identifier set.

use std::collections::BTreeSet;

use crate::transform::Transform3D;

/// Identifier reported when no landmark is in view.
pub const NO_LANDMARK: i32 = -1;

/// The single landmark observation considered during one tick.
///
/// Rebuilt from the freshest camera frame every tick and never carried over:
/// a tick without a fresh frame yields [`LandmarkObservation::none`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkObservation {
    /// Fiducial id, or [`NO_LANDMARK`].
    pub id: i32,
    /// Pose of the landmark in the camera frame.
    pub camera_to_target: Transform3D,
    /// Horizontal angle to the target, degrees, positive to the right.
    pub yaw_deg: f64,
    /// Vertical angle to the target, degrees, positive up.
    pub pitch_deg: f64,
    /// Capture time on the shared monotonic clock (seconds).
    pub timestamp_s: f64,
    pub valid: bool,
}

impl LandmarkObservation {
    /// The "nothing in view" snapshot.
    pub fn none() -> Self {
        Self {
            id: NO_LANDMARK,
            camera_to_target: Transform3D::identity(),
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            timestamp_s: 0.0,
            valid: false,
        }
    }

    /// `true` when this snapshot carries a real landmark.
    pub fn has_landmark(&self) -> bool {
        self.valid && self.id != NO_LANDMARK
    }
}

impl Default for LandmarkObservation {
    fn default() -> Self {
        Self::none()
    }
}

/// Allow-list of landmark ids trusted for pose correction and path
/// generation.  Negative ids are dropped at construction, so the sentinel is
/// never a member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsableIds(BTreeSet<i32>);

impl UsableIds {
    pub fn new(ids: impl IntoIterator<Item = i32>) -> Self {
        Self(ids.into_iter().filter(|id| *id >= 0).collect())
    }

    pub fn contains(&self, id: i32) -> bool {
        self.0.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<i32> for UsableIds {
    fn from_iter<T: IntoIterator<Item = i32>>(iter: T) -> Self {
        Self::new(iter)
    }
}
