//! Run configuration – reads `fidnav.toml` (or the file named by
//! `FIDNAV_CONFIG`).
//!
//! Every field has a default, so an empty file or no file at all yields a
//! working simulation of the built-in field.

use std::fs;
use std::path::{Path, PathBuf};

use fidnav_hal::sim::CameraModel;
use fidnav_perception::fusion::EstimatorConfig;
use fidnav_perception::kinematics::SwerveKinematics;
use fidnav_perception::layout::FieldLayout;
use fidnav_perception::observation::UsableIds;
use fidnav_perception::pose2d::{Pose2D, Twist2D};
use fidnav_perception::transform::Transform3D;
use fidnav_runtime::{GoalAnchor, LocalizerConfig, PathConstraints, TelemetryKeys};
use fidnav_types::FidnavError;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Field used when no `field_layout_path` is configured.
const BUILTIN_FIELD: &str = include_str!("../assets/field.json");

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fidnav.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Control tick period.
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    /// Ticks to run before requesting a path (Ctrl-C stops earlier).
    #[serde(default = "default_demo_ticks")]
    pub demo_ticks: u64,

    /// Heading the robot should finish the generated path with.
    #[serde(default = "default_final_heading_deg")]
    pub final_heading_deg: f64,

    /// JSON field layout; the built-in field when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_layout_path: Option<PathBuf>,

    /// Landmarks trusted for correction and path generation.
    #[serde(default = "default_usable_ids")]
    pub usable_ids: Vec<i32>,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub estimator: EstimatorConfig,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub drivetrain: DrivetrainConfig,

    #[serde(default)]
    pub sim: SimConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub name: String,
    /// Dashboard namespace for this camera's readouts.
    pub tab: String,
    /// Key for the raw vision pose; `<tab>/VisionPose` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision_pose_key: Option<String>,
    /// Mount position in the robot frame.
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,
    /// Mount orientation; negative pitch tilts the lens up.
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
    pub horizontal_fov_deg: f64,
    pub vertical_fov_deg: f64,
    pub max_range_m: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            name: "arducam".to_string(),
            tab: "vision".to_string(),
            vision_pose_key: None,
            x_m: 0.3,
            y_m: 0.0,
            z_m: 0.25,
            roll_deg: 0.0,
            pitch_deg: -15.0,
            yaw_deg: 0.0,
            horizontal_fov_deg: 70.0,
            vertical_fov_deg: 50.0,
            max_range_m: 6.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub standoff_m: f64,
    pub anchor: GoalAnchor,
    pub constraints: PathConstraints,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            standoff_m: 1.0,
            anchor: GoalAnchor::default(),
            constraints: PathConstraints::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrivetrainConfig {
    /// Swerve module `[x, y]` locations in the robot frame (metres).
    pub module_locations: Vec<[f64; 2]>,
}

impl Default for DrivetrainConfig {
    fn default() -> Self {
        let half = 0.2794;
        Self {
            module_locations: vec![[half, half], [half, -half], [-half, half], [-half, -half]],
        }
    }
}

/// Scripted motion for the simulated robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub start_x_m: f64,
    pub start_y_m: f64,
    pub start_heading_deg: f64,
    /// Error added to the start pose when seeding the estimator.
    pub initial_error_x_m: f64,
    pub initial_error_y_m: f64,
    /// Robot-frame chassis velocity.
    pub vx_mps: f64,
    pub vy_mps: f64,
    pub omega_dps: f64,
    /// Produce a camera frame every this many ticks.
    pub camera_every_ticks: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start_x_m: 1.6,
            start_y_m: 4.1,
            start_heading_deg: 0.0,
            initial_error_x_m: -0.4,
            initial_error_y_m: 0.3,
            vx_mps: 0.2,
            vy_mps: 0.0,
            omega_dps: 0.0,
            camera_every_ticks: 3,
        }
    }
}

impl SimConfig {
    pub fn start_pose(&self) -> Pose2D {
        Pose2D::new(
            self.start_x_m,
            self.start_y_m,
            self.start_heading_deg.to_radians(),
        )
    }

    pub fn initial_estimate(&self) -> Pose2D {
        let start = self.start_pose();
        Pose2D::new(
            start.x + self.initial_error_x_m,
            start.y + self.initial_error_y_m,
            start.theta,
        )
    }

    /// Chassis motion over one tick of `period_s`.
    pub fn twist_per_tick(&self, period_s: f64) -> Twist2D {
        Twist2D::new(
            self.vx_mps * period_s,
            self.vy_mps * period_s,
            self.omega_dps.to_radians() * period_s,
        )
    }
}

fn default_tick_period_ms() -> u64 {
    20
}
fn default_demo_ticks() -> u64 {
    250
}
fn default_final_heading_deg() -> f64 {
    180.0
}
fn default_usable_ids() -> Vec<i32> {
    vec![6, 7, 8, 9, 10, 11, 17, 18, 19, 20, 21, 22]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_period_ms: default_tick_period_ms(),
            demo_ticks: default_demo_ticks(),
            final_heading_deg: default_final_heading_deg(),
            field_layout_path: None,
            usable_ids: default_usable_ids(),
            camera: CameraConfig::default(),
            estimator: EstimatorConfig::default(),
            planner: PlannerConfig::default(),
            drivetrain: DrivetrainConfig::default(),
            sim: SimConfig::default(),
        }
    }
}

impl Config {
    /// Reject values that would make the estimator or the tick loop
    /// meaningless.
    pub fn validate(&self) -> Result<(), FidnavError> {
        if self.tick_period_ms == 0 {
            return Err(FidnavError::Config("tick_period_ms must be positive".into()));
        }
        if !self.planner.standoff_m.is_finite() || self.planner.standoff_m < 0.0 {
            return Err(FidnavError::Config(format!(
                "planner.standoff_m must be a non-negative number, got {}",
                self.planner.standoff_m
            )));
        }
        if !self.final_heading_deg.is_finite() {
            return Err(FidnavError::Config("final_heading_deg must be finite".into()));
        }
        let c = &self.planner.constraints;
        if [
            c.max_velocity_mps,
            c.max_acceleration_mps_sq,
            c.max_angular_velocity_rps,
            c.max_angular_acceleration_rps_sq,
        ]
        .iter()
        .any(|v| !v.is_finite() || *v <= 0.0)
        {
            return Err(FidnavError::Config(
                "planner.constraints must all be positive".into(),
            ));
        }
        if self.camera.horizontal_fov_deg <= 0.0 || self.camera.vertical_fov_deg <= 0.0 {
            return Err(FidnavError::Config("camera field of view must be positive".into()));
        }
        if self.sim.camera_every_ticks == 0 {
            return Err(FidnavError::Config("sim.camera_every_ticks must be positive".into()));
        }
        self.estimator.vision_gain()?;
        self.kinematics()?;
        Ok(())
    }

    pub fn robot_to_camera(&self) -> Transform3D {
        let c = &self.camera;
        Transform3D::from_xyz_rpy(
            c.x_m,
            c.y_m,
            c.z_m,
            c.roll_deg.to_radians(),
            c.pitch_deg.to_radians(),
            c.yaw_deg.to_radians(),
        )
    }

    pub fn camera_model(&self) -> CameraModel {
        CameraModel {
            robot_to_camera: self.robot_to_camera(),
            horizontal_fov_deg: self.camera.horizontal_fov_deg,
            vertical_fov_deg: self.camera.vertical_fov_deg,
            max_range_m: self.camera.max_range_m,
        }
    }

    pub fn kinematics(&self) -> Result<SwerveKinematics, FidnavError> {
        SwerveKinematics::new(
            self.drivetrain
                .module_locations
                .iter()
                .map(|[x, y]| (*x, *y))
                .collect(),
        )
    }

    pub fn usable_ids(&self) -> UsableIds {
        UsableIds::new(self.usable_ids.iter().copied())
    }

    pub fn localizer_config(&self) -> LocalizerConfig {
        LocalizerConfig {
            usable_ids: self.usable_ids(),
            robot_to_camera: self.robot_to_camera(),
            standoff_m: self.planner.standoff_m,
            goal_anchor: self.planner.anchor,
            constraints: self.planner.constraints,
            telemetry: TelemetryKeys::new(
                self.camera.tab.clone(),
                self.camera.vision_pose_key.clone(),
            ),
        }
    }

    /// The configured layout file, or the built-in field.
    pub fn load_layout(&self) -> Result<FieldLayout, FidnavError> {
        match &self.field_layout_path {
            Some(path) => FieldLayout::load(path),
            None => {
                let layout = FieldLayout::from_json_str(BUILTIN_FIELD)?;
                info!(landmarks = layout.len(), "using built-in field layout");
                Ok(layout)
            }
        }
    }
}

/// `FIDNAV_CONFIG`, or `fidnav.toml` in the working directory.
pub fn config_path() -> PathBuf {
    std::env::var_os("FIDNAV_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load, apply env overrides and validate.  A missing file yields defaults.
pub fn load() -> Result<Config, FidnavError> {
    let path = config_path();
    let mut cfg = load_from(&path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Parse the config at `path`.  Returns `None` if the file does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, FidnavError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        FidnavError::Config(format!("Failed to read config at {}: {e}", path.display()))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| FidnavError::Config(format!("Failed to parse config: {e}")))?;
    Ok(Some(cfg))
}

/// Apply `FIDNAV_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `FIDNAV_TICK_PERIOD_MS` | `tick_period_ms` |
/// | `FIDNAV_CAMERA` | `camera.name` |
/// | `FIDNAV_STANDOFF_M` | `planner.standoff_m` |
/// | `FIDNAV_FIELD_LAYOUT` | `field_layout_path` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("FIDNAV_TICK_PERIOD_MS")
        && let Ok(ms) = v.trim().parse::<u64>()
    {
        cfg.tick_period_ms = ms;
    }
    if let Ok(v) = std::env::var("FIDNAV_CAMERA") {
        cfg.camera.name = v;
    }
    if let Ok(v) = std::env::var("FIDNAV_STANDOFF_M")
        && let Ok(m) = v.trim().parse::<f64>()
    {
        cfg.planner.standoff_m = m;
    }
    if let Ok(v) = std::env::var("FIDNAV_FIELD_LAYOUT") {
        cfg.field_layout_path = Some(PathBuf::from(v));
    }
}

/// Write `cfg` as TOML, creating parent directories.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), FidnavError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| FidnavError::Config(format!("Failed to create config directory: {e}")))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| FidnavError::Serialization(format!("Failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        FidnavError::Config(format!("Failed to write config at {}: {e}", path.display()))
    })
}
