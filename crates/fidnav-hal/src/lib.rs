//! `fidnav-hal` – collaborator boundary.
//!
//! Traits for the two sensors the localizer consumes, the per-tick
//! [`LandmarkObserver`][observer::LandmarkObserver], and simulated drivers
//! for headless runs.
//!
//! # Modules
//!
//! - [`camera`] – [`VisionCamera`][camera::VisionCamera] and the pipeline
//!   result types.
//! - [`drivetrain`] – [`OdometrySource`][drivetrain::OdometrySource].
//! - [`observer`] – one observation snapshot per tick.
//! - [`sim`] – [`SimCamera`][sim::SimCamera] and
//!   [`SimDrivetrain`][sim::SimDrivetrain].

pub mod camera;
pub mod drivetrain;
pub mod observer;
pub mod sim;
