//! Field layout: the known world pose of every landmark.
//!
//! Loaded once at startup and never mutated.  The on-disk format is the
//! common JSON layout used by FRC tooling:
//!
//! ```json
//! {
//!   "tags": [
//!     { "ID": 7,
//!       "pose": { "translation": { "x": 13.89, "y": 4.03, "z": 0.31 },
//!                 "rotation": { "quaternion": { "W": 1.0, "X": 0.0, "Y": 0.0, "Z": 0.0 } } } }
//!   ],
//!   "field": { "length": 17.55, "width": 8.05 }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use fidnav_types::FidnavError;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::transform::{Pose3D, Quaternion, Vec3};

#[derive(Debug, Serialize, Deserialize)]
struct LayoutFile {
    tags: Vec<TagEntry>,
    field: FieldDimensions,
}

#[derive(Debug, Serialize, Deserialize)]
struct TagEntry {
    #[serde(rename = "ID")]
    id: i32,
    pose: PoseEntry,
}

#[derive(Debug, Serialize, Deserialize)]
struct PoseEntry {
    translation: Vec3,
    rotation: RotationEntry,
}

#[derive(Debug, Serialize, Deserialize)]
struct RotationEntry {
    quaternion: QuaternionEntry,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct QuaternionEntry {
    w: f64,
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct FieldDimensions {
    length: f64,
    width: f64,
}

/// Immutable mapping from landmark identifier to world pose.
#[derive(Debug, Clone, Default)]
pub struct FieldLayout {
    tags: BTreeMap<i32, Pose3D>,
    field_length_m: f64,
    field_width_m: f64,
}

impl FieldLayout {
    /// Build a layout from `(id, pose)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`FidnavError::LayoutLoad`] for negative or duplicate ids.
    pub fn from_tags(
        tags: impl IntoIterator<Item = (i32, Pose3D)>,
        field_length_m: f64,
        field_width_m: f64,
    ) -> Result<Self, FidnavError> {
        let mut map = BTreeMap::new();
        for (id, pose) in tags {
            if id < 0 {
                return Err(FidnavError::LayoutLoad(format!(
                    "landmark id {id} is negative"
                )));
            }
            let pose = Pose3D::new(pose.translation, pose.rotation.normalized());
            if map.insert(id, pose).is_some() {
                return Err(FidnavError::LayoutLoad(format!(
                    "landmark id {id} appears twice"
                )));
            }
        }
        Ok(Self {
            tags: map,
            field_length_m,
            field_width_m,
        })
    }

    /// Parse a JSON layout.
    pub fn from_json_str(raw: &str) -> Result<Self, FidnavError> {
        let file: LayoutFile = serde_json::from_str(raw)
            .map_err(|e| FidnavError::LayoutLoad(format!("failed to parse layout: {e}")))?;
        Self::from_tags(
            file.tags.into_iter().map(|t| {
                let q = t.pose.rotation.quaternion;
                (
                    t.id,
                    Pose3D::new(t.pose.translation, Quaternion::new(q.w, q.x, q.y, q.z)),
                )
            }),
            file.field.length,
            file.field.width,
        )
    }

    /// Read and parse a JSON layout from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FidnavError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FidnavError::LayoutLoad(format!("failed to read {}: {e}", path.display()))
        })?;
        let layout = Self::from_json_str(&raw)?;
        info!(
            path = %path.display(),
            landmarks = layout.len(),
            "field layout loaded"
        );
        Ok(layout)
    }

    /// Serialize back to the JSON layout format.
    pub fn to_json_string(&self) -> Result<String, FidnavError> {
        let file = LayoutFile {
            tags: self
                .tags
                .iter()
                .map(|(&id, pose)| TagEntry {
                    id,
                    pose: PoseEntry {
                        translation: pose.translation,
                        rotation: RotationEntry {
                            quaternion: QuaternionEntry {
                                w: pose.rotation.w,
                                x: pose.rotation.x,
                                y: pose.rotation.y,
                                z: pose.rotation.z,
                            },
                        },
                    },
                })
                .collect(),
            field: FieldDimensions {
                length: self.field_length_m,
                width: self.field_width_m,
            },
        };
        serde_json::to_string_pretty(&file)
            .map_err(|e| FidnavError::Serialization(e.to_string()))
    }

    /// World pose of landmark `id`, if the layout knows it.
    pub fn tag_pose(&self, id: i32) -> Option<Pose3D> {
        self.tags.get(&id).copied()
    }

    /// Identifiers in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.tags.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn field_length_m(&self) -> f64 {
        self.field_length_m
    }

    pub fn field_width_m(&self) -> f64 {
        self.field_width_m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Transform3D;
    use std::f64::consts::PI;

    const SAMPLE: &str = r#"{
        "tags": [
            { "ID": 7, "pose": { "translation": { "x": 4.0, "y": 1.0, "z": 0.3 },
              "rotation": { "quaternion": { "W": 0.0, "X": 0.0, "Y": 0.0, "Z": 1.0 } } } },
            { "ID": 2, "pose": { "translation": { "x": 0.0, "y": 5.0, "z": 1.2 },
              "rotation": { "quaternion": { "W": 1.0, "X": 0.0, "Y": 0.0, "Z": 0.0 } } } }
        ],
        "field": { "length": 16.5, "width": 8.0 }
    }"#;

    #[test]
    fn parses_json_layout() {
        let layout = FieldLayout::from_json_str(SAMPLE).unwrap();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.ids().collect::<Vec<_>>(), vec![2, 7]);
        let tag7 = layout.tag_pose(7).unwrap();
        assert!((tag7.translation.x - 4.0).abs() < 1e-12);
        assert!((tag7.rotation.yaw().abs() - PI).abs() < 1e-9);
        assert!((layout.field_length_m() - 16.5).abs() < 1e-12);
    }

    #[test]
    fn unknown_id_is_absent_not_error() {
        let layout = FieldLayout::from_json_str(SAMPLE).unwrap();
        assert!(layout.tag_pose(99).is_none());
        assert!(layout.tag_pose(-1).is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = FieldLayout::from_tags(
            vec![(3, Transform3D::identity()), (3, Transform3D::identity())],
            1.0,
            1.0,
        )
        .unwrap_err();
        assert!(matches!(err, FidnavError::LayoutLoad(_)));
    }

    #[test]
    fn negative_ids_are_rejected() {
        let err = FieldLayout::from_tags(vec![(-1, Transform3D::identity())], 1.0, 1.0)
            .unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn malformed_json_is_a_layout_error() {
        let err = FieldLayout::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, FidnavError::LayoutLoad(_)));
    }

    #[test]
    fn load_from_disk_and_write_back() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("field.json");
        std::fs::write(&path, SAMPLE).expect("write");

        let layout = FieldLayout::load(&path).unwrap();
        let again = FieldLayout::from_json_str(&layout.to_json_string().unwrap()).unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(again.tag_pose(2), layout.tag_pose(2));
    }

    #[test]
    fn load_missing_file_is_a_layout_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let err = FieldLayout::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, FidnavError::LayoutLoad(_)));
    }
}
