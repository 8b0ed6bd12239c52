//! Closed-loop path tracking with the NMPC controller
//!
//! Each tick the nearest stretch of global waypoints is moved into the
//! vehicle frame and fitted with a cubic, the controller is asked for an
//! actuation and the plant is advanced one `dt` with the same kinematic
//! bicycle the controller predicts with. A solve that fails is replaced by
//! [`Actuation::safe_deceleration`] for that tick.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::common::{
    Controller, MpcError, MpcResult, NlpSolver, Point2D, Pose2D, ReferencePolynomial, VehicleState,
};
use crate::nmpc::{Actuation, KinematicBicycle, MpcController};
use crate::path_tracking::waypoints::{local_state, to_global_frame, to_vehicle_frame};

/// Settings of the simulated loop; the controller keeps its own config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated time limit [s]
    pub max_time: f64,
    /// Waypoints ahead of the nearest one used for each fit
    pub lookahead: usize,
    /// Distance to the last waypoint that ends the run
    pub goal_distance: f64,
    /// Standard deviation of the speed measurement noise
    pub speed_noise_std: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_time: 30.0,
            lookahead: 6,
            goal_distance: 3.0,
            speed_noise_std: 0.0,
            seed: 0,
        }
    }
}

/// History of one run
#[derive(Debug, Clone, Default)]
pub struct SimulationResult {
    /// Plant pose at every tick, starting with the initial pose
    pub trajectory: Vec<Pose2D>,
    /// Plant speed at every tick, starting with the initial speed
    pub speeds: Vec<f64>,
    /// Noisy speed handed to the controller per tick
    pub measured_speeds: Vec<f64>,
    /// Applied (steering, acceleration) per tick
    pub actuations: Vec<(f64, f64)>,
    /// Last predicted path in the global frame
    pub last_prediction: Vec<Point2D>,
    /// Plant position at every tick where the safe deceleration replaced a failed solve
    pub fallback_positions: Vec<Point2D>,
    pub reached_goal: bool,
}

impl SimulationResult {
    pub fn steps(&self) -> usize {
        self.actuations.len()
    }

    pub fn fallbacks(&self) -> usize {
        self.fallback_positions.len()
    }

    pub fn final_pose(&self) -> Option<&Pose2D> {
        self.trajectory.last()
    }
}

pub struct TrackingSimulation<S> {
    controller: MpcController<S>,
    waypoints: Vec<Point2D>,
    config: SimulationConfig,
    nearest_index: usize,
}

impl<S: NlpSolver> TrackingSimulation<S> {
    pub fn new(
        controller: MpcController<S>,
        waypoints: Vec<Point2D>,
        config: SimulationConfig,
    ) -> MpcResult<Self> {
        if waypoints.len() < 4 {
            return Err(MpcError::InvalidInput(format!(
                "need at least 4 waypoints for a cubic fit, got {}",
                waypoints.len()
            )));
        }
        if config.lookahead < 3 {
            return Err(MpcError::InvalidConfig(format!(
                "lookahead must be at least 3, got {}",
                config.lookahead
            )));
        }
        if !(config.max_time.is_finite() && config.max_time > 0.0) {
            return Err(MpcError::InvalidConfig(format!(
                "max_time must be positive, got {}",
                config.max_time
            )));
        }
        Ok(Self {
            controller,
            waypoints,
            config,
            nearest_index: 0,
        })
    }

    pub fn controller(&self) -> &MpcController<S> {
        &self.controller
    }

    pub fn waypoints(&self) -> &[Point2D] {
        &self.waypoints
    }

    /// Run from `start` at speed `v0` until the goal or the time limit
    pub fn run(&mut self, start: Pose2D, v0: f64) -> MpcResult<SimulationResult> {
        let noise = Normal::new(0.0, self.config.speed_noise_std).map_err(|e| {
            MpcError::InvalidConfig(format!("speed noise: {}", e))
        })?;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mpc = self.controller.config().clone();
        let plant = KinematicBicycle::new(mpc.lf, mpc.dt);
        let straight = ReferencePolynomial::zero();
        let goal = self.waypoints[self.waypoints.len() - 1];

        self.nearest_index = 0;
        self.controller.reset();
        let mut pose = start;
        let mut v = v0;
        let mut time = 0.0;
        let mut result = SimulationResult {
            trajectory: vec![pose],
            speeds: vec![v],
            ..Default::default()
        };

        while time < self.config.max_time {
            if pose.position().distance(&goal) <= self.config.goal_distance {
                result.reached_goal = true;
                break;
            }
            let window = self.search_window(&pose.position());
            if window.len() < 4 {
                break;
            }

            let path = ReferencePolynomial::fit(&to_vehicle_frame(&pose, &window))?;
            let measured_v = v + noise.sample(&mut rng);
            let state = local_state(measured_v, &path);
            result.measured_speeds.push(measured_v);

            let actuation = match self.controller.compute(&state, &path) {
                Ok(actuation) => {
                    result.last_prediction = to_global_frame(&pose, &actuation.predicted);
                    actuation
                }
                Err(e) if e.is_solver_failure() => {
                    warn!("t={:.2}s: {}; applying safe deceleration", time, e);
                    result.fallback_positions.push(pose.position());
                    Actuation::safe_deceleration(&mpc)
                }
                Err(e) => return Err(e),
            };

            let current = VehicleState::new(pose.x, pose.y, pose.yaw, v, 0.0, 0.0);
            let next = plant.predict(&current, actuation.steering, actuation.acceleration, &straight);
            pose = Pose2D::new(next.x, next.y, next.psi);
            v = next.v.max(0.0);
            time += mpc.dt;

            result.trajectory.push(pose);
            result.speeds.push(v);
            result.actuations.push((actuation.steering, actuation.acceleration));
        }

        info!(
            "Simulation finished after {} ticks ({:.1}s), goal reached: {}, fallbacks: {}",
            result.steps(),
            time,
            result.reached_goal,
            result.fallbacks()
        );
        Ok(result)
    }

    /// Waypoints from just behind the nearest one up to the lookahead.
    /// The nearest index only moves forward.
    fn search_window(&mut self, position: &Point2D) -> Vec<Point2D> {
        let mut index = self.nearest_index;
        let mut best = position.distance(&self.waypoints[index]);
        while index + 1 < self.waypoints.len() {
            let d = position.distance(&self.waypoints[index + 1]);
            if d > best {
                break;
            }
            best = d;
            index += 1;
        }
        self.nearest_index = index;

        let first = index.saturating_sub(1);
        let last = (index + self.config.lookahead).min(self.waypoints.len());
        self.waypoints[first..last].to_vec()
    }
}
