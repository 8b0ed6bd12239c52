//! Variable and constraint bounds of one solve

use log::trace;

use crate::common::VehicleState;
use crate::nmpc::config::MpcConfig;
use crate::nmpc::index_map::{IndexMap, Var};

/// Lower/upper bounds on the optimization vector and the constraint vector
#[derive(Debug, Clone, PartialEq)]
pub struct NlpBounds {
    pub var_lower: Vec<f64>,
    pub var_upper: Vec<f64>,
    pub constraint_lower: Vec<f64>,
    pub constraint_upper: Vec<f64>,
}

impl NlpBounds {
    /// States are free, actuators are boxed, the dynamics residuals are
    /// pinned to zero and the timestep-0 residuals to the measured state.
    pub fn build(config: &MpcConfig, map: &IndexMap, init: &VehicleState) -> Self {
        let n_vars = map.n_vars();
        let n_constraints = map.n_constraints();

        let mut var_lower = vec![-config.state_bound; n_vars];
        let mut var_upper = vec![config.state_bound; n_vars];

        let steer = config.steering_bound();
        for (var, bound) in [(Var::Delta, steer), (Var::A, config.max_accel)] {
            for i in map.range(var) {
                var_lower[i] = -bound;
                var_upper[i] = bound;
            }
        }

        let mut constraint_lower = vec![0.0; n_constraints];
        let mut constraint_upper = vec![0.0; n_constraints];
        for (var, value) in Var::STATES.iter().zip(init.to_array()) {
            let i = map.offset(*var, 0);
            constraint_lower[i] = value;
            constraint_upper[i] = value;
        }

        trace!(
            "bounds for N = {}: steering ±{:.4}, acceleration ±{:.4}",
            map.horizon(),
            steer,
            config.max_accel
        );

        Self {
            var_lower,
            var_upper,
            constraint_lower,
            constraint_upper,
        }
    }

    /// Whether every entry of `vars` lies within the variable bounds (with slack `tol`)
    pub fn contains(&self, vars: &[f64], tol: f64) -> bool {
        vars.len() == self.var_lower.len()
            && vars
                .iter()
                .zip(self.var_lower.iter().zip(&self.var_upper))
                .all(|(v, (lo, hi))| *v >= lo - tol && *v <= hi + tol)
    }

    /// Largest violation of the constraint bounds by the residuals `g`
    pub fn constraint_violation(&self, g: &[f64]) -> f64 {
        g.iter()
            .zip(self.constraint_lower.iter().zip(&self.constraint_upper))
            .map(|(v, (lo, hi))| (lo - v).max(v - hi).max(0.0))
            .fold(0.0, f64::max)
    }
}
