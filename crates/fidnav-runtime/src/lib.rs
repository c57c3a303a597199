//! `fidnav-runtime` – the tick loop and everything it publishes.
//!
//! # Modules
//!
//! - [`localizer`] – [`VisionLocalizer`][localizer::VisionLocalizer]: owns
//!   the observer, odometry source and estimator and runs the per-tick
//!   poll → predict → correct → readout sequence.
//! - [`planner`] – [`GoalPathGenerator`][planner::GoalPathGenerator] and the
//!   immutable [`Path`][planner::Path] descriptor.
//! - [`readout`] – dashboard values derived from the current tick.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.

pub mod localizer;
pub mod planner;
pub mod readout;
pub mod telemetry;

pub use localizer::{LocalizerConfig, TickReport, VisionLocalizer};
pub use planner::{GoalAnchor, GoalEndState, GoalPathGenerator, Path, PathConstraints, Waypoint};
pub use readout::{Readout, TelemetryKeys};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
