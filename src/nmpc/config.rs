//! Configuration for the NMPC controller
//!
//! One immutable value holds every tuning constant of a solve: horizon,
//! timestep, vehicle geometry, cost weights, actuator bounds and the
//! solver budget. It is validated once before any controller is built.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::{MpcError, MpcResult};

/// 25 degrees in radians
pub const DEFAULT_MAX_STEER: f64 = 0.436332;

/// Relative weights of the objective terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    pub cte: f64,
    pub epsi: f64,
    /// Deviation from the target speed
    pub v: f64,
    pub delta: f64,
    pub a: f64,
    /// Change of steering between consecutive steps
    pub delta_rate: f64,
    /// Change of acceleration between consecutive steps
    pub a_rate: f64,
}

impl CostWeights {
    fn as_named(&self) -> [(&'static str, f64); 7] {
        [
            ("cte", self.cte),
            ("epsi", self.epsi),
            ("v", self.v),
            ("delta", self.delta),
            ("a", self.a),
            ("delta_rate", self.delta_rate),
            ("a_rate", self.a_rate),
        ]
    }
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            cte: 2000.0,
            epsi: 2000.0,
            v: 1.0,
            delta: 10.0,
            a: 10.0,
            delta_rate: 100.0,
            a_rate: 10.0,
        }
    }
}

/// Settings of the PANOC solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Wall-clock budget of one solve [s]
    pub max_duration_secs: f64,
    /// Fixed-point residual tolerance, in control units
    pub tolerance: f64,
    pub max_iterations: usize,
    pub lbfgs_memory: usize,
    /// Largest constraint violation a converged solution may show
    pub constraint_tolerance: f64,
}

impl SolverConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs_f64(self.max_duration_secs)
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 0.5,
            tolerance: 1e-4,
            max_iterations: 1000,
            lbfgs_memory: 10,
            constraint_tolerance: 1e-6,
        }
    }
}

/// Configuration of the NMPC controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpcConfig {
    /// Number of timesteps N in the horizon
    pub horizon: usize,
    /// Timestep duration [s]
    pub dt: f64,
    /// Distance from the center of gravity to the front axle
    pub lf: f64,
    /// Target cruising speed
    pub ref_v: f64,
    pub weights: CostWeights,
    /// Steering magnitude [rad]; the delta variable is bounded by `max_steer * lf`
    pub max_steer: f64,
    /// Acceleration magnitude (normalized throttle/brake)
    pub max_accel: f64,
    /// Stand-in for infinity on the unconstrained state variables
    pub state_bound: f64,
    /// Cadence of the surrounding control loop [s]; the solver budget must fit in it
    pub control_period_secs: Option<f64>,
    pub solver: SolverConfig,
}

impl Default for MpcConfig {
    fn default() -> Self {
        Self {
            horizon: 10,
            dt: 0.1,
            lf: 2.67,
            ref_v: 120.0,
            weights: CostWeights::default(),
            max_steer: DEFAULT_MAX_STEER,
            max_accel: 1.0,
            state_bound: 1.0e19,
            control_period_secs: None,
            solver: SolverConfig::default(),
        }
    }
}

impl MpcConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> MpcResult<Self> {
        let config: MpcConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> MpcResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_ref_v(mut self, ref_v: f64) -> Self {
        self.ref_v = ref_v;
        self
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.solver.max_duration_secs = duration.as_secs_f64();
        self
    }

    /// Magnitude of the bound on the delta variables
    pub fn steering_bound(&self) -> f64 {
        self.max_steer * self.lf
    }

    /// Reject anything that would make a solve meaningless
    pub fn validate(&self) -> MpcResult<()> {
        if self.horizon < 2 {
            return invalid(format!("horizon must be at least 2, got {}", self.horizon));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return invalid(format!("dt must be positive, got {}", self.dt));
        }
        if !(self.lf.is_finite() && self.lf > 0.0) {
            return invalid(format!("lf must be positive, got {}", self.lf));
        }
        if !self.ref_v.is_finite() {
            return invalid(format!("ref_v must be finite, got {}", self.ref_v));
        }
        for (name, w) in self.weights.as_named() {
            if !(w.is_finite() && w >= 0.0) {
                return invalid(format!("weight {} must be non-negative, got {}", name, w));
            }
        }
        for (name, bound) in [
            ("max_steer", self.max_steer),
            ("max_accel", self.max_accel),
            ("state_bound", self.state_bound),
        ] {
            // a negative magnitude means lower > upper
            if !(bound.is_finite() && bound >= 0.0) {
                return invalid(format!("{} must be a non-negative magnitude, got {}", name, bound));
            }
        }
        self.validate_solver()
    }

    fn validate_solver(&self) -> MpcResult<()> {
        let s = &self.solver;
        if !(s.max_duration_secs.is_finite() && s.max_duration_secs > 0.0) {
            return invalid(format!(
                "solver time budget must be positive, got {}",
                s.max_duration_secs
            ));
        }
        if let Some(period) = self.control_period_secs {
            if !(period.is_finite() && s.max_duration_secs < period) {
                return invalid(format!(
                    "solver time budget {}s does not fit in the control period {}s",
                    s.max_duration_secs, period
                ));
            }
        }
        for (name, tol) in [
            ("tolerance", s.tolerance),
            ("constraint_tolerance", s.constraint_tolerance),
        ] {
            if !(tol.is_finite() && tol > 0.0) {
                return invalid(format!("{} must be positive, got {}", name, tol));
            }
        }
        if s.max_iterations == 0 || s.lbfgs_memory == 0 {
            return invalid("max_iterations and lbfgs_memory must be positive".to_string());
        }
        Ok(())
    }
}

fn invalid(msg: String) -> MpcResult<()> {
    Err(MpcError::InvalidConfig(msg))
}
