//! NMPC path tracking controller
//!
//! Each call builds the whole problem from scratch: bounds from the
//! measured state, zero controls rolled out from that state as the initial
//! guess, the combined cost/dynamics evaluator for the current reference
//! polynomial. Nothing is carried over between ticks.

use log::{debug, warn};

use crate::common::{
    Controller, MpcError, MpcResult, NlpSolver, ReferencePolynomial, VehicleState,
};
use crate::nmpc::bounds::NlpBounds;
use crate::nmpc::config::MpcConfig;
use crate::nmpc::extract::Actuation;
use crate::nmpc::fg_eval::FgEval;
use crate::nmpc::index_map::IndexMap;
use crate::nmpc::solver::{NlpProblem, PanocSolver, SolveReport};

/// Result of one converged solve
#[derive(Debug, Clone)]
pub struct MpcSolution {
    pub actuation: Actuation,
    pub report: SolveReport,
    /// Largest violation of the constraint bounds at the solution
    pub constraint_violation: f64,
}

pub struct MpcController<S = PanocSolver> {
    config: MpcConfig,
    map: IndexMap,
    solver: S,
}

impl MpcController<PanocSolver> {
    pub fn new(config: MpcConfig) -> MpcResult<Self> {
        let solver = PanocSolver::new(config.solver.clone());
        Self::with_solver(config, solver)
    }

    pub fn with_defaults() -> MpcResult<Self> {
        Self::new(MpcConfig::default())
    }
}

impl<S: NlpSolver> MpcController<S> {
    pub fn with_solver(config: MpcConfig, solver: S) -> MpcResult<Self> {
        config.validate()?;
        Ok(Self {
            map: IndexMap::new(config.horizon)?,
            config,
            solver,
        })
    }

    pub fn config(&self) -> &MpcConfig {
        &self.config
    }

    pub fn index_map(&self) -> &IndexMap {
        &self.map
    }

    /// Solve one tick. Any solver status other than converged is an error.
    pub fn solve(
        &self,
        state: &VehicleState,
        path: &ReferencePolynomial,
    ) -> MpcResult<MpcSolution> {
        if !state.is_finite() {
            return Err(MpcError::InvalidInput(format!(
                "state contains non-finite values: {:?}",
                state
            )));
        }

        let bounds = NlpBounds::build(&self.config, &self.map, state);
        let fg_eval = FgEval::new(&self.config, self.map, path, *state);
        let initial_guess = fg_eval.rollout(&vec![0.0; self.map.controls().len()]);
        fg_eval.eval_checked(&initial_guess)?;

        let problem = NlpProblem {
            evaluator: &fg_eval,
            initial_guess,
            bounds: &bounds,
            max_duration: self.config.solver.max_duration(),
        };
        let report = self.solver.solve(&problem)?;

        if !report.is_converged() {
            warn!(
                "NMPC solve rejected: {:?} after {} iterations in {:?}",
                report.status, report.iterations, report.solve_time
            );
            return Err(MpcError::NotConverged {
                status: report.status,
                iterations: report.iterations,
                cost: report.cost,
            });
        }

        let fg = fg_eval.eval_checked(&report.solution)?;
        let constraint_violation = bounds.constraint_violation(&fg[1..]);
        let actuation = Actuation::extract(&report.solution, &self.map);
        debug!(
            "NMPC: steering {:.4}, acceleration {:.4}, cost {:.3}, violation {:.2e}",
            actuation.steering, actuation.acceleration, report.cost, constraint_violation
        );

        Ok(MpcSolution {
            actuation,
            report,
            constraint_violation,
        })
    }

    /// Flat interface: 6 state values and 4 coefficients in,
    /// `[steering, acceleration, x1, y1, ..., x(N-2), y(N-2)]` out
    pub fn solve_raw(&self, state: &[f64], coeffs: &[f64]) -> MpcResult<Vec<f64>> {
        let state = VehicleState::from_slice(state)?;
        let path = ReferencePolynomial::from_slice(coeffs)?;
        Ok(self.solve(&state, &path)?.actuation.to_vec())
    }
}

impl<S: NlpSolver> Controller for MpcController<S> {
    type State = VehicleState;
    type Reference = ReferencePolynomial;
    type Output = MpcResult<Actuation>;

    fn compute(&mut self, state: &VehicleState, reference: &ReferencePolynomial) -> Self::Output {
        self.solve(state, reference).map(|solution| solution.actuation)
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{FgEvaluator, ShootingEvaluator};
    use crate::nmpc::solver::SolveStatus;
    use std::time::Duration;

    /// Returns whatever status it is built with, never touching the evaluator
    struct FixedStatusSolver(SolveStatus);

    impl NlpSolver for FixedStatusSolver {
        fn solve<E: ShootingEvaluator>(&self, problem: &NlpProblem<'_, E>) -> MpcResult<SolveReport> {
            Ok(SolveReport {
                solution: vec![0.3; problem.evaluator.n_vars()],
                status: self.0,
                cost: 0.0,
                iterations: 1,
                solve_time: Duration::from_millis(1),
            })
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = MpcConfig::default().with_horizon(1);
        assert!(matches!(
            MpcController::new(config),
            Err(MpcError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_non_converged_result_is_not_used() {
        for status in [SolveStatus::NotConverged, SolveStatus::TimeExceeded] {
            let controller =
                MpcController::with_solver(MpcConfig::default(), FixedStatusSolver(status))
                    .unwrap();
            let err = controller
                .solve(&VehicleState::new(0.0, 0.0, 0.0, 10.0, 0.0, 0.0), &ReferencePolynomial::zero())
                .unwrap_err();
            assert!(matches!(err, MpcError::NotConverged { status: s, .. } if s == status));
        }
    }

    #[test]
    fn test_converged_stub_is_extracted() {
        let mut controller =
            MpcController::with_solver(MpcConfig::default(), FixedStatusSolver(SolveStatus::Converged))
                .unwrap();
        let act = controller
            .compute(&VehicleState::new(0.0, 0.0, 0.0, 10.0, 0.0, 0.0), &ReferencePolynomial::zero())
            .unwrap();
        assert_eq!(act.steering, 0.3);
        assert_eq!(act.predicted.len(), 8);
    }

    #[test]
    fn test_rejects_malformed_raw_input() {
        let controller = MpcController::with_defaults().unwrap();
        assert!(matches!(
            controller.solve_raw(&[0.0; 5], &[0.0; 4]),
            Err(MpcError::InvalidInput(_))
        ));
        assert!(matches!(
            controller.solve_raw(&[0.0; 6], &[0.0; 3]),
            Err(MpcError::InvalidInput(_))
        ));
        assert!(matches!(
            controller.solve_raw(&[0.0, 0.0, f64::NAN, 0.0, 0.0, 0.0], &[0.0; 4]),
            Err(MpcError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_on_path_at_target_speed_needs_no_correction() {
        let config = MpcConfig::default();
        let controller = MpcController::new(config.clone()).unwrap();
        let state = VehicleState::new(0.0, 0.0, 0.0, config.ref_v, 0.0, 0.0);
        let solution = controller.solve(&state, &ReferencePolynomial::zero()).unwrap();

        assert!(solution.actuation.steering.abs() < 0.05);
        assert!(solution.actuation.acceleration.abs() < 0.05);
    }

    #[test]
    fn test_offset_from_path_steers_back_and_speeds_up() {
        let config = MpcConfig::default();
        let controller = MpcController::new(config.clone()).unwrap();
        let state = VehicleState::new(0.0, 0.0, 0.0, 10.0, 0.5, 0.1);
        let path = ReferencePolynomial::new([0.2, 0.0, 0.0, 0.0]).unwrap();
        let solution = controller.solve(&state, &path).unwrap();
        let act = &solution.actuation;

        // opposite sign of the cross-track error
        assert!(act.steering < -0.05, "steering {}", act.steering);
        assert!(act.acceleration > 0.5, "acceleration {}", act.acceleration);
        assert!(act.steering.abs() <= config.steering_bound() + 1e-9);
        assert!(act.acceleration.abs() <= config.max_accel + 1e-9);
        assert!(solution.constraint_violation <= config.solver.constraint_tolerance);
        assert!(solution.report.solve_time <= config.solver.max_duration());
        assert_eq!(act.to_vec().len(), 2 + 2 * (config.horizon - 2));
    }

    #[test]
    fn test_solution_satisfies_every_constraint() {
        let config = MpcConfig::default();
        let controller = MpcController::new(config.clone()).unwrap();
        let map = *controller.index_map();
        let cases = [
            (VehicleState::new(0.0, 0.0, 0.0, 10.0, 0.5, 0.1), [0.2, 0.0, 0.0, 0.0]),
            (VehicleState::new(0.0, 0.0, 0.05, 20.0, -0.3, 0.02), [-0.3, 0.05, 0.001, 0.0]),
        ];
        for (state, coeffs) in cases {
            let path = ReferencePolynomial::new(coeffs).unwrap();
            let solution = controller.solve(&state, &path).unwrap();
            let vars = solution.report.solution.as_slice();

            // rebuild everything independently of the solver
            let bounds = NlpBounds::build(&config, &map, &state);
            let fg = FgEval::new(&config, map, &path, state).eval_checked(vars).unwrap();
            let tol = config.solver.constraint_tolerance;
            for (i, g) in fg[1..].iter().enumerate() {
                assert!(
                    *g >= bounds.constraint_lower[i] - tol && *g <= bounds.constraint_upper[i] + tol,
                    "constraint {} = {} outside [{}, {}]",
                    i,
                    g,
                    bounds.constraint_lower[i],
                    bounds.constraint_upper[i]
                );
            }
            assert!(bounds.contains(vars, 0.0));
            assert_eq!(map.state(vars, 0), state);
            assert!((fg[0] - solution.report.cost).abs() < 1e-9);
        }
    }

    #[test]
    fn test_repeated_solves_are_deterministic() {
        let controller = MpcController::with_defaults().unwrap();
        let state = [0.0, 0.0, 0.05, 20.0, -0.3, 0.02];
        let coeffs = [-0.3, 0.05, 0.001, 0.0];
        let first = controller.solve_raw(&state, &coeffs).unwrap();
        let second = controller.solve_raw(&state, &coeffs).unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_two_step_horizon_returns_actuation_only() {
        let controller = MpcController::new(MpcConfig::default().with_horizon(2)).unwrap();
        let out = controller
            .solve_raw(&[0.0, 0.0, 0.0, 10.0, 0.5, 0.1], &[0.2, 0.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_tiny_budget_is_reported_as_failure() {
        let config = MpcConfig::default().with_max_duration(Duration::from_nanos(1));
        let controller = MpcController::new(config).unwrap();
        let result = controller.solve_raw(&[0.0, 0.0, 0.0, 10.0, 0.5, 0.1], &[0.2, 0.0, 0.0, 0.0]);
        let err = result.unwrap_err();
        assert!(
            matches!(err, MpcError::NotConverged { status: SolveStatus::TimeExceeded, .. }),
            "unexpected error {:?}",
            err
        );
        assert!(err.is_solver_failure());
    }

    #[test]
    fn test_non_finite_initial_rollout_fails_fast() {
        let controller = MpcController::with_defaults().unwrap();
        let state = VehicleState::new(1e10, 0.0, 0.0, 10.0, 0.0, 0.0);
        let path = ReferencePolynomial::new([0.0, 0.0, 0.0, 1e300]).unwrap();
        let err = controller.solve(&state, &path).unwrap_err();
        assert!(matches!(err, MpcError::NonFinite(_)), "unexpected error {:?}", err);
        assert!(!err.is_solver_failure());
    }
}
