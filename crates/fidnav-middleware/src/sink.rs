//! Telemetry sinks.
//!
//! The localizer pushes its per-tick readout through a [`TelemetrySink`] and
//! never learns whether anyone was listening.  Publishing is fire-and-forget:
//! a sink must not fail the tick.

use fidnav_types::{Event, EventPayload, PoseData};
use tracing::{info, trace, warn};

use crate::bus::{EventBus, Topic};

/// Keyed key/value publisher, in the spirit of a dashboard table.
pub trait TelemetrySink: Send + Sync {
    /// Publish one payload.
    fn record(&self, payload: EventPayload);

    fn put_number(&self, key: &str, value: f64) {
        self.record(EventPayload::Scalar {
            key: key.to_string(),
            value,
        });
    }

    fn put_bool(&self, key: &str, value: bool) {
        self.record(EventPayload::Flag {
            key: key.to_string(),
            value,
        });
    }

    fn put_pose(&self, key: &str, pose: PoseData) {
        self.record(EventPayload::Pose {
            key: key.to_string(),
            pose,
        });
    }
}

/// Publishes every payload as an [`Event`] on the matching bus topic.
#[derive(Debug, Clone)]
pub struct BusTelemetrySink {
    bus: EventBus,
    source: String,
}

impl BusTelemetrySink {
    pub fn new(bus: EventBus, source: impl Into<String>) -> Self {
        Self {
            bus,
            source: source.into(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

impl TelemetrySink for BusTelemetrySink {
    fn record(&self, payload: EventPayload) {
        let topic = Topic::for_payload(&payload);
        // Nobody listening is normal for telemetry.
        if let Err(e) = self.bus.publish_to(topic, Event::new(self.source.clone(), payload)) {
            trace!(?topic, error = %e, "telemetry dropped");
        }
    }
}

/// Writes payloads to the `tracing` pipeline instead of a bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, payload: EventPayload) {
        match payload {
            EventPayload::Scalar { key, value } => trace!(%key, value, "telemetry"),
            EventPayload::Flag { key, value } => trace!(%key, value, "telemetry"),
            EventPayload::Pose { key, pose } => trace!(
                %key,
                x = pose.x_m,
                y = pose.y_m,
                heading = pose.heading_rad,
                "telemetry"
            ),
            EventPayload::PathGenerated(summary) => info!(
                landmark = summary.landmark_id,
                waypoints = summary.waypoint_count,
                goal_x = summary.goal.x_m,
                goal_y = summary.goal.y_m,
                "path generated"
            ),
            EventPayload::VisionFault { camera, message } => {
                warn!(%camera, %message, "vision fault")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventPayload>>);

    impl TelemetrySink for Recorder {
        fn record(&self, payload: EventPayload) {
            self.0.lock().unwrap().push(payload);
        }
    }

    #[test]
    fn provided_methods_build_payloads() {
        let sink = Recorder::default();
        sink.put_number("yaw", 1.5);
        sink.put_bool("Tag In View", true);
        sink.put_pose(
            "Field/Robot",
            PoseData {
                x_m: 1.0,
                y_m: 2.0,
                heading_rad: 0.0,
            },
        );

        let got = sink.0.lock().unwrap();
        assert_eq!(got.len(), 3);
        assert!(matches!(&got[0], EventPayload::Scalar { key, value } if key == "yaw" && *value == 1.5));
        assert!(matches!(&got[1], EventPayload::Flag { key, value: true } if key == "Tag In View"));
        assert!(matches!(&got[2], EventPayload::Pose { key, .. } if key == "Field/Robot"));
    }

    #[test]
    fn bus_sink_without_subscribers_does_not_fail() {
        let sink = BusTelemetrySink::new(EventBus::default(), "test");
        sink.put_number("distance", 2.0);
    }

    #[tokio::test]
    async fn bus_sink_routes_to_topics() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut telemetry = bus.subscribe_to(Topic::Telemetry);
        let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
        let sink = BusTelemetrySink::new(bus.clone(), "fidnav-runtime::localizer");

        sink.put_bool("Tag In View", false);
        sink.record(EventPayload::VisionFault {
            camera: "arducam".into(),
            message: "disconnected".into(),
        });

        let event = telemetry.recv().await?;
        assert_eq!(event.source, "fidnav-runtime::localizer");
        assert!(matches!(event.payload, EventPayload::Flag { value: false, .. }));
        assert!(matches!(
            alerts.recv().await?.payload,
            EventPayload::VisionFault { .. }
        ));
        Ok(())
    }

    #[test]
    fn tracing_sink_accepts_every_payload() {
        let sink = TracingSink;
        sink.put_number("pitch", -3.0);
        sink.record(EventPayload::VisionFault {
            camera: "arducam".into(),
            message: "disconnected".into(),
        });
    }
}
