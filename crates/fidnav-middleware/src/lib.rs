//! `fidnav-middleware` – telemetry plumbing.
//!
//! Carries readouts, poses and path summaries from the localizer to whoever
//! is listening, without caring what they mean.
//!
//! # Modules
//!
//! - [`bus`] – topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.
//! - [`sink`] – the [`TelemetrySink`] trait the localizer publishes through,
//!   with bus-backed and log-backed implementations.

pub mod bus;
pub mod sink;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use sink::{BusTelemetrySink, TelemetrySink, TracingSink};
