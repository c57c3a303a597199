use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unified event wrapper for the telemetry event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "fidnav-runtime::localizer"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a fresh envelope stamped with the current UTC time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the telemetry bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A named scalar readout, e.g. `"yaw"` or `"distance"`.
    Scalar { key: String, value: f64 },
    /// A named boolean readout, e.g. `"Tag In View"`.
    Flag { key: String, value: bool },
    /// A field-relative pose, usually the fused estimate.
    Pose { key: String, pose: PoseData },
    /// A goal path was generated toward a landmark.
    PathGenerated(PathSummary),
    /// The vision collaborator changed link state or reported a problem.
    VisionFault { camera: String, message: String },
}

/// Field-relative planar pose carried on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseData {
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
}

/// Compact description of a generated path for telemetry consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSummary {
    pub landmark_id: i32,
    pub waypoint_count: usize,
    pub goal: PoseData,
    pub final_heading_rad: f64,
}

/// Error type shared by every fidnav crate.
///
/// Sensor absence is never an error; these variants cover configuration
/// defects and plumbing failures only.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum FidnavError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Kinematics Mismatch: expected {expected} modules, got {actual}")]
    Kinematics { expected: usize, actual: usize },

    #[error("Field Layout Error: {0}")]
    LayoutLoad(String),

    #[error("Event Bus Error: {0}")]
    Channel(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "fidnav-runtime::localizer",
            EventPayload::Pose {
                key: "Field/Robot".to_string(),
                pose: PoseData {
                    x_m: 1.0,
                    y_m: 2.0,
                    heading_rad: 0.5,
                },
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert_eq!(event.source, back.source);
        match back.payload {
            EventPayload::Pose { key, pose } => {
                assert_eq!(key, "Field/Robot");
                assert!((pose.x_m - 1.0).abs() < f64::EPSILON);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn path_summary_survives_json() {
        let payload = EventPayload::PathGenerated(PathSummary {
            landmark_id: 7,
            waypoint_count: 2,
            goal: PoseData {
                x_m: 1.0,
                y_m: 0.5,
                heading_rad: 0.0,
            },
            final_heading_rad: std::f64::consts::PI,
        });
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("PathGenerated"));
        let back: EventPayload = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, EventPayload::PathGenerated(s) if s.landmark_id == 7));
    }

    #[test]
    fn new_events_get_distinct_ids() {
        let a = Event::new("a", EventPayload::Flag { key: "k".into(), value: true });
        let b = Event::new("a", EventPayload::Flag { key: "k".into(), value: true });
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn fidnav_error_display() {
        let err = FidnavError::Kinematics {
            expected: 4,
            actual: 3,
        };
        assert!(err.to_string().contains("expected 4"));

        let err2 = FidnavError::Config("vision std dev must be positive".to_string());
        assert!(err2.to_string().contains("Configuration Error"));
    }
}
