//! `fidnav-perception` – geometry and state estimation.
//!
//! Turns wheel odometry and camera landmark sightings into a single
//! field-relative robot pose.
//!
//! # Modules
//!
//! - [`transform`] – rigid 3-D transforms ([`Transform3D`][transform::Transform3D])
//!   built from a translation and a unit quaternion.
//! - [`pose2d`] – planar [`Pose2D`][pose2d::Pose2D] and the twist exponential
//!   and logarithm maps.
//! - [`kinematics`] – swerve forward kinematics and gyro-anchored odometry.
//! - [`layout`] – the immutable [`FieldLayout`][layout::FieldLayout] of
//!   landmark world poses.
//! - [`observation`] – the per-tick
//!   [`LandmarkObservation`][observation::LandmarkObservation] snapshot and
//!   the usable-id allow-list.
//! - [`composer`] – camera measurement → field-relative robot pose.
//! - [`fusion`] – [`PoseFusionEstimator`][fusion::PoseFusionEstimator]: the
//!   latency-compensating odometry + vision estimator.

pub mod composer;
pub mod fusion;
pub mod kinematics;
pub mod layout;
pub mod observation;
pub mod pose2d;
pub mod transform;
