//! Common traits defining the seams between formulation, solver and controller

use std::ops::Range;

use num_dual::DualNum;

use crate::common::error::MpcResult;
use crate::nmpc::solver::{NlpProblem, SolveReport};

/// Numeric capability the model formulas are written against:
/// arithmetic (also mixed with `f64`), powers, sine, cosine and arctangent.
///
/// Implemented for `f64` and for the forward-mode dual numbers the solver
/// uses to obtain exact derivatives.
pub trait Scalar: DualNum<f64> + Copy {}

impl<T: DualNum<f64> + Copy> Scalar for T {}

/// Combined objective + constraint callable handed to the solver.
///
/// `fg[0]` receives the objective, `fg[1..]` the constraint residuals in
/// fixed order. `fg.len() == 1 + n_constraints()`.
pub trait FgEvaluator {
    /// Length of the optimization vector
    fn n_vars(&self) -> usize;

    /// Number of constraint residuals
    fn n_constraints(&self) -> usize;

    /// Evaluate objective and constraints at `vars`
    fn eval<D: Scalar>(&self, vars: &[D], fg: &mut [D]);
}

/// An [`FgEvaluator`] whose equality constraints can be met exactly by
/// forward simulation from a known initial condition.
///
/// Only the entries in [`controls`](Self::controls) are free; [`shoot`](Self::shoot)
/// fills every other entry from them, after which all residuals are zero.
pub trait ShootingEvaluator: FgEvaluator {
    /// Free entries of the optimization vector
    fn controls(&self) -> Range<usize>;

    /// Overwrite the dependent entries of `vars` from its controls
    fn shoot<D: Scalar>(&self, vars: &mut [D]);

    /// Objective alone, equal to `fg[0]` of [`FgEvaluator::eval`]
    fn objective<D: Scalar>(&self, vars: &[D]) -> D;
}

/// Trait for nonlinear program solvers
pub trait NlpSolver {
    /// Minimize the evaluator's objective subject to its constraints and the bounds
    fn solve<E: ShootingEvaluator>(&self, problem: &NlpProblem<'_, E>) -> MpcResult<SolveReport>;
}

/// Trait for controllers (PID, LQR, MPC, etc.)
pub trait Controller {
    /// State type
    type State;
    /// Reference/target type
    type Reference;
    /// Output control type
    type Output;

    /// Compute control output
    fn compute(&mut self, state: &Self::State, reference: &Self::Reference) -> Self::Output;

    /// Reset controller state
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_dual::Dual64;

    fn square_plus_sin<D: Scalar>(x: D) -> D {
        x.powi(2) + x.sin() * 3.0
    }

    #[test]
    fn test_scalar_plain_and_dual_agree() {
        let plain = square_plus_sin(0.7);
        let dual = square_plus_sin(Dual64::new(0.7, 1.0));
        assert!((plain - dual.re).abs() < 1e-12);
        assert!((dual.eps - (2.0 * 0.7 + 3.0 * 0.7_f64.cos())).abs() < 1e-12);
    }
}
