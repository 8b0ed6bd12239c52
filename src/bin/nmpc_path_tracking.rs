// Path tracking simulation with the NMPC controller on a winding road.
//
// usage: nmpc_path_tracking [config.toml]
//
// Set RUST_LOG=debug to see every solve.
use std::env;
use std::fs;

use log::info;

use rust_nmpc::path_tracking::{SimulationConfig, TrackingSimulation};
use rust_nmpc::utils::Visualizer;
use rust_nmpc::{MpcConfig, MpcController, MpcResult, Point2D, Pose2D};

fn road() -> Vec<Point2D> {
    (0..60)
        .map(|i| {
            let x = i as f64 * 4.0;
            Point2D::new(x, 8.0 * (x / 40.0).sin())
        })
        .collect()
}

fn main() -> MpcResult<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => {
            info!("loading config from {}", path);
            MpcConfig::load(path)?
        }
        None => MpcConfig::default().with_ref_v(15.0),
    };
    let controller = MpcController::new(config)?;

    let sim_config = SimulationConfig {
        max_time: 40.0,
        speed_noise_std: 0.2,
        seed: 42,
        ..Default::default()
    };
    let waypoints = road();
    let mut sim = TrackingSimulation::new(controller, waypoints.clone(), sim_config)?;
    let result = sim.run(Pose2D::new(0.0, -2.0, 0.0), 5.0)?;

    println!(
        "ticks: {}, goal reached: {}, fallbacks: {}",
        result.steps(),
        result.reached_goal,
        result.fallbacks()
    );

    fs::create_dir_all("./img/path_tracking")?;
    let mut vis = Visualizer::new();
    vis.set_title("NMPC path tracking").set_aspect_ratio(None);
    vis.plot_simulation(&waypoints, &result);
    vis.save_svg("./img/path_tracking/nmpc.svg", 800, 600)?;
    println!("saved ./img/path_tracking/nmpc.svg");
    Ok(())
}
