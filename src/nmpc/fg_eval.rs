//! Combined objective + constraint evaluator handed to the solver

use std::ops::Range;

use crate::common::{
    FgEvaluator, MpcError, MpcResult, ReferencePolynomial, Scalar, ShootingEvaluator,
    VehicleState,
};
use crate::nmpc::config::MpcConfig;
use crate::nmpc::cost::CostAssembler;
use crate::nmpc::dynamics::{DynamicsAssembler, KinematicBicycle};
use crate::nmpc::index_map::IndexMap;

/// Evaluates `fg[0] = J(vars)` and `fg[1..] = g(vars)` for one solve
/// starting from the measured state `init`
pub struct FgEval<'a> {
    map: IndexMap,
    init: VehicleState,
    cost: CostAssembler<'a>,
    dynamics: DynamicsAssembler<'a>,
}

impl<'a> FgEval<'a> {
    pub fn new(
        config: &'a MpcConfig,
        map: IndexMap,
        path: &'a ReferencePolynomial,
        init: VehicleState,
    ) -> Self {
        Self {
            map,
            init,
            cost: CostAssembler::new(&config.weights, config.ref_v),
            dynamics: DynamicsAssembler::new(KinematicBicycle::new(config.lf, config.dt), path),
        }
    }

    pub fn index_map(&self) -> &IndexMap {
        &self.map
    }

    /// Full vector for the given (delta..., a...) block, states rolled out from `init`
    pub fn rollout(&self, controls: &[f64]) -> Vec<f64> {
        let mut vars = vec![0.0; self.n_vars()];
        vars[self.map.controls()].copy_from_slice(controls);
        self.shoot(&mut vars);
        vars
    }

    /// Plain evaluation that fails on the first NaN/Inf output
    pub fn eval_checked(&self, vars: &[f64]) -> MpcResult<Vec<f64>> {
        let mut fg = vec![0.0; 1 + self.n_constraints()];
        self.eval(vars, &mut fg);
        check_finite(&fg)?;
        Ok(fg)
    }
}

impl FgEvaluator for FgEval<'_> {
    fn n_vars(&self) -> usize {
        self.map.n_vars()
    }

    fn n_constraints(&self) -> usize {
        self.map.n_constraints()
    }

    fn eval<D: Scalar>(&self, vars: &[D], fg: &mut [D]) {
        debug_assert_eq!(vars.len(), self.n_vars());
        fg[0] = self.cost.assemble(vars, &self.map);
        self.dynamics.assemble(vars, &self.map, &mut fg[1..]);
    }
}

impl ShootingEvaluator for FgEval<'_> {
    fn controls(&self) -> Range<usize> {
        self.map.controls()
    }

    fn shoot<D: Scalar>(&self, vars: &mut [D]) {
        self.dynamics.shoot(&self.init, vars, &self.map);
    }

    fn objective<D: Scalar>(&self, vars: &[D]) -> D {
        self.cost.assemble(vars, &self.map)
    }
}

/// Locate the first non-finite entry of an `fg` vector
pub fn check_finite(fg: &[f64]) -> MpcResult<()> {
    match fg.iter().position(|v| !v.is_finite()) {
        None => Ok(()),
        Some(0) => Err(MpcError::NonFinite(format!("objective evaluated to {}", fg[0]))),
        Some(i) => Err(MpcError::NonFinite(format!(
            "constraint {} evaluated to {}",
            i - 1,
            fg[i]
        ))),
    }
}
