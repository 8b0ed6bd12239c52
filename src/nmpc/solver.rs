//! Nonlinear program solver adapter
//!
//! The problem handed over by the controller is
//!
//! ```text
//! minimize    fg[0](z)
//! subject to  g_lower <= fg[1..](z) <= g_upper
//!             z_lower <= z <= z_upper
//! ```
//!
//! Its equality constraints are the discretized dynamics, so [`PanocSolver`]
//! eliminates them by single shooting: PANOC searches over the control
//! block only, inside the control box, and every candidate is completed by
//! rolling the model out from the measured state. The gradient with respect
//! to the controls is exact, one forward-mode dual sweep per control.

use std::cell::RefCell;
use std::ops::Range;
use std::time::Duration;

use log::{debug, warn};
use num_dual::Dual64;
use optimization_engine::constraints::Rectangle;
use optimization_engine::core::ExitStatus;
use optimization_engine::panoc::{PANOCCache, PANOCOptimizer};
use optimization_engine::{FunctionCallResult, Optimizer, Problem, SolverError};

use crate::common::{FgEvaluator, MpcError, MpcResult, NlpSolver, Scalar, ShootingEvaluator};
use crate::nmpc::bounds::NlpBounds;
use crate::nmpc::config::SolverConfig;
use crate::nmpc::fg_eval::check_finite;

/// Outcome of a solve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Converged,
    /// Iteration limit reached
    NotConverged,
    /// Wall-clock budget exhausted
    TimeExceeded,
}

impl From<ExitStatus> for SolveStatus {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Converged => SolveStatus::Converged,
            ExitStatus::NotConvergedIterations => SolveStatus::NotConverged,
            ExitStatus::NotConvergedOutOfTime => SolveStatus::TimeExceeded,
        }
    }
}

/// Everything the solver needs for one solve
pub struct NlpProblem<'a, E> {
    pub evaluator: &'a E,
    /// Full-length vector; its control entries are the starting point
    pub initial_guess: Vec<f64>,
    pub bounds: &'a NlpBounds,
    pub max_duration: Duration,
}

#[derive(Debug, Clone)]
pub struct SolveReport {
    /// Candidate optimum, same length as the optimization vector
    pub solution: Vec<f64>,
    pub status: SolveStatus,
    /// Objective at `solution`
    pub cost: f64,
    pub iterations: usize,
    pub solve_time: Duration,
}

impl SolveReport {
    pub fn is_converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

/// Plain evaluation of `fg`, rejecting NaN/Inf
pub fn eval_plain<E: FgEvaluator>(evaluator: &E, vars: &[f64]) -> MpcResult<Vec<f64>> {
    let mut fg = vec![0.0; 1 + evaluator.n_constraints()];
    evaluator.eval(vars, &mut fg);
    check_finite(&fg)?;
    Ok(fg)
}

/// Objective as a function of the controls alone
struct ShootingObjective<'e, E> {
    evaluator: &'e E,
    controls: Range<usize>,
}

impl<'e, E: ShootingEvaluator> ShootingObjective<'e, E> {
    fn new(evaluator: &'e E) -> Self {
        Self {
            controls: evaluator.controls(),
            evaluator,
        }
    }

    /// Full optimization vector for the controls `u`
    fn expand<D: Scalar>(&self, u: &[D]) -> Vec<D> {
        let mut vars = vec![D::from(0.0); self.evaluator.n_vars()];
        vars[self.controls.clone()].copy_from_slice(u);
        self.evaluator.shoot(&mut vars);
        vars
    }

    fn cost(&self, u: &[f64]) -> MpcResult<f64> {
        let cost = self.evaluator.objective(self.expand(u).as_slice());
        if !cost.is_finite() {
            return Err(MpcError::Diverged(format!("objective evaluated to {}", cost)));
        }
        Ok(cost)
    }

    fn gradient(&self, u: &[f64], grad: &mut [f64]) -> MpcResult<()> {
        let mut seeds: Vec<Dual64> = u.iter().map(|&v| Dual64::from(v)).collect();
        for (i, g) in grad.iter_mut().enumerate() {
            seeds[i].eps = 1.0;
            *g = self.evaluator.objective(self.expand(seeds.as_slice()).as_slice()).eps;
            seeds[i].eps = 0.0;
            if !g.is_finite() {
                return Err(MpcError::Diverged(format!(
                    "derivative with respect to control {} is {}",
                    i, g
                )));
            }
        }
        Ok(())
    }
}

/// Single-shooting PANOC backend
#[derive(Debug, Clone)]
pub struct PanocSolver {
    config: SolverConfig,
}

impl PanocSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

impl Default for PanocSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl NlpSolver for PanocSolver {
    fn solve<E: ShootingEvaluator>(&self, problem: &NlpProblem<'_, E>) -> MpcResult<SolveReport> {
        let evaluator = problem.evaluator;
        let bounds = problem.bounds;
        let n = evaluator.n_vars();
        let controls = evaluator.controls();
        if problem.initial_guess.len() != n || bounds.var_lower.len() != n || controls.end > n {
            return Err(MpcError::InvalidInput(format!(
                "problem has {} variables but initial guess has {} and bounds {}",
                n,
                problem.initial_guess.len(),
                bounds.var_lower.len()
            )));
        }

        let objective = ShootingObjective::new(evaluator);
        // first evaluator failure, reported instead of the optimizer's opaque error
        let failure: RefCell<Option<MpcError>> = RefCell::new(None);
        let record = |err: MpcError| -> SolverError {
            failure.borrow_mut().get_or_insert(err);
            SolverError::NotFiniteComputation
        };

        let f = |u: &[f64], cost: &mut f64| -> FunctionCallResult {
            *cost = objective.cost(u).map_err(&record)?;
            Ok(())
        };
        let df = |u: &[f64], grad: &mut [f64]| -> FunctionCallResult {
            objective.gradient(u, grad).map_err(&record)
        };

        let set_u = Rectangle::new(
            Some(&bounds.var_lower[controls.clone()]),
            Some(&bounds.var_upper[controls.clone()]),
        );
        let cfg = &self.config;
        let mut cache = PANOCCache::new(controls.len(), cfg.tolerance, cfg.lbfgs_memory);
        let mut optimizer = PANOCOptimizer::new(Problem::new(&set_u, df, f), &mut cache)
            .with_max_iter(cfg.max_iterations)
            .with_max_duration(problem.max_duration);

        let mut u = problem.initial_guess[controls].to_vec();
        let outcome = optimizer.solve(&mut u);

        if let Some(err) = failure.borrow_mut().take() {
            return Err(err);
        }
        let status = outcome.map_err(|e| match e {
            SolverError::NotFiniteComputation => {
                MpcError::Diverged("optimizer iterate is no longer finite".to_string())
            }
            other => MpcError::Solver(format!("{:?}", other)),
        })?;

        let solution = objective.expand(u.as_slice());
        let fg = eval_plain(evaluator, &solution)
            .map_err(|e| MpcError::Diverged(format!("at the returned solution: {}", e)))?;

        let mut report = SolveReport {
            cost: fg[0],
            status: status.exit_status().into(),
            iterations: status.iterations(),
            solve_time: status.solve_time(),
            solution,
        };
        let violation = bounds.constraint_violation(&fg[1..]);
        if report.is_converged()
            && (violation > cfg.constraint_tolerance
                || !bounds.contains(&report.solution, cfg.constraint_tolerance))
        {
            warn!(
                "PANOC converged but the solution violates its bounds by {:.2e}",
                violation
            );
            report.status = SolveStatus::NotConverged;
        }
        debug!(
            "PANOC solve: {:?} after {} iterations in {:?}, cost {:.4}, fpr {:.2e}",
            report.status,
            report.iterations,
            report.solve_time,
            report.cost,
            status.norm_fpr()
        );
        Ok(report)
    }
}
