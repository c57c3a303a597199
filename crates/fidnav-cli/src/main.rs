//! `fidnav` – landmark localization demo.
//!
//! Drives a simulated swerve robot across the field, feeds its wheel
//! odometry and synthetic fiducial frames through the vision localizer, and
//! finally asks for a path to the landmark in view.
//!
//! ```text
//! fidnav              run with fidnav.toml (or $FIDNAV_CONFIG, or defaults)
//! fidnav init [PATH]  write the default configuration
//! ```
//!
//! Ctrl-C stops the tick loop early; the summary is still printed.

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use fidnav_hal::drivetrain::OdometrySource;
use fidnav_hal::observer::LandmarkObserver;
use fidnav_hal::sim::{SimCamera, SimDrivetrain};
use fidnav_middleware::{BusTelemetrySink, EventBus, Topic, TopicReceiver};
use fidnav_perception::fusion::PoseFusionEstimator;
use fidnav_perception::pose2d::Pose2D;
use fidnav_runtime::{Path, VisionLocalizer, init_tracing};
use fidnav_types::{EventPayload, FidnavError};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::Config;

/// Print a status line every this many ticks.
const STATUS_EVERY_TICKS: u64 = 25;

fn main() -> ExitCode {
    let _tracing = init_tracing("fidnav");

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("init") {
        return init_config(args.get(1).map(std::path::PathBuf::from));
    }

    print_banner();

    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };
    println!(
        "  Config: {}",
        config::config_path().display().to_string().bold()
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping after this tick …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the run can only end on its own");
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cfg, shutdown)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "Error".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn print_banner() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║   fidnav – fiducial localization     ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
}

fn init_config(path: Option<std::path::PathBuf>) -> ExitCode {
    let path = path.unwrap_or_else(config::config_path);
    if path.exists() {
        eprintln!(
            "{} {} already exists; not overwriting.",
            "✗".red(),
            path.display()
        );
        return ExitCode::FAILURE;
    }
    match config::save_to(&Config::default(), &path) {
        Ok(()) => {
            println!("{} wrote {}", "✓".green(), path.display().to_string().bold());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red());
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config, shutdown: Arc<AtomicBool>) -> Result<(), FidnavError> {
    let layout = Arc::new(cfg.load_layout()?);
    let kinematics = cfg.kinematics()?;

    let drivetrain = SimDrivetrain::new(kinematics.clone(), cfg.sim.start_pose());
    let camera = SimCamera::with_model(cfg.camera.name.clone(), cfg.camera_model());

    let estimator = PoseFusionEstimator::new(
        kinematics,
        drivetrain.heading_rad(),
        &drivetrain.module_positions(),
        cfg.sim.initial_estimate(),
        cfg.estimator,
    )?;

    let bus = EventBus::default();
    let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
    let mut paths = bus.subscribe_to(Topic::Paths);
    let sink = Arc::new(BusTelemetrySink::new(bus, "fidnav-cli"));

    let mut localizer = VisionLocalizer::new(
        cfg.localizer_config(),
        Arc::clone(&layout),
        LandmarkObserver::new(Box::new(camera.clone())),
        Box::new(drivetrain.clone()),
        estimator,
    )
    .with_sink(sink);

    let period_s = cfg.tick_period_ms as f64 / 1000.0;
    let twist = cfg.sim.twist_per_tick(period_s);
    let mut interval = tokio::time::interval(Duration::from_millis(cfg.tick_period_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        ticks = cfg.demo_ticks,
        period_ms = cfg.tick_period_ms,
        landmarks = layout.len(),
        camera = %cfg.camera.name,
        "localization run starting"
    );
    println!(
        "  Running {} ticks at {} ms (Ctrl-C to stop early)\n",
        cfg.demo_ticks.to_string().bold(),
        cfg.tick_period_ms
    );

    for tick in 1..=cfg.demo_ticks {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        interval.tick().await;

        // Simulation time keeps odometry and camera stamps on one clock.
        let now_s = tick as f64 * period_s;
        drivetrain.drive(twist);
        if tick % cfg.sim.camera_every_ticks == 0 {
            camera.capture(drivetrain.truth_pose(), &layout, now_s);
        }

        let report = localizer.tick(now_s)?;
        if tick % STATUS_EVERY_TICKS == 0 {
            let r = &report.readout;
            let tag = if r.target_in_view {
                format!("tag {:>2}", r.id).green()
            } else {
                "no tag".dimmed()
            };
            println!(
                "  [{tick:>4}] {tag}  yaw {:>6.1}°  dist {:>5.2} m  est {}",
                r.yaw_deg,
                r.distance_m,
                fmt_pose(report.estimate)
            );
        }
        drain_alerts(&mut alerts);
    }

    println!();
    match localizer.request_path(cfg.final_heading_deg) {
        Some(path) => print_path(&path),
        None => println!("  {}", "No usable landmark in view; no path generated.".yellow()),
    }
    while let Some(event) = paths.try_next() {
        if let EventPayload::PathGenerated(summary) = event.payload {
            info!(
                landmark = summary.landmark_id,
                waypoints = summary.waypoint_count,
                "path published"
            );
        }
    }
    drain_alerts(&mut alerts);

    let truth = drivetrain.truth_pose();
    let estimate = localizer.estimate();
    let odometry = localizer.estimator().odometry_pose();
    println!();
    println!("  {:<10} {}", "truth".bold(), fmt_pose(truth));
    println!(
        "  {:<10} {}  error {:.3} m",
        "estimate".bold(),
        fmt_pose(estimate),
        truth.distance(&estimate)
    );
    println!(
        "  {:<10} {}  error {:.3} m",
        "odometry".bold(),
        fmt_pose(odometry),
        truth.distance(&odometry)
    );
    println!(
        "\n  {} ticks, {} vision corrections\n",
        localizer.ticks(),
        localizer.corrections()
    );
    Ok(())
}

fn drain_alerts(alerts: &mut TopicReceiver) {
    while let Some(event) = alerts.try_next() {
        if let EventPayload::VisionFault { camera, message } = event.payload {
            println!("  {} {camera}: {message}", "⚠".yellow().bold());
        }
    }
}

fn print_path(path: &Path) {
    println!(
        "  {} {} waypoints, goal {}",
        "Path:".bold().green(),
        path.waypoints().len(),
        fmt_pose(path.goal())
    );
    for (i, wp) in path.waypoints().iter().enumerate() {
        println!("    {i}: {}", fmt_pose(wp.anchor));
    }
}

fn fmt_pose(pose: Pose2D) -> String {
    format!(
        "({:>6.3}, {:>6.3}, {:>7.1}°)",
        pose.x,
        pose.y,
        pose.theta.to_degrees()
    )
}
