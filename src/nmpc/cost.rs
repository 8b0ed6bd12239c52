//! Objective of the tracking problem
//!
//! J = Σ_t  w_cte·cte² + w_epsi·epsi² + w_v·(v - v_ref)²
//!   + Σ_t  w_delta·delta² + w_a·a²
//!   + Σ_t  w_dd·(delta[t+1] - delta[t])² + w_da·(a[t+1] - a[t])²

use itertools::Itertools;

use crate::common::Scalar;
use crate::nmpc::config::CostWeights;
use crate::nmpc::index_map::{IndexMap, Var};

pub struct CostAssembler<'a> {
    weights: &'a CostWeights,
    ref_v: f64,
}

impl<'a> CostAssembler<'a> {
    pub fn new(weights: &'a CostWeights, ref_v: f64) -> Self {
        Self { weights, ref_v }
    }

    pub fn assemble<D: Scalar>(&self, vars: &[D], map: &IndexMap) -> D {
        self.tracking_cost(vars, map) + self.actuation_cost(vars, map) + self.smoothness_cost(vars, map)
    }

    /// Cross-track, heading and speed errors over every timestep
    pub fn tracking_cost<D: Scalar>(&self, vars: &[D], map: &IndexMap) -> D {
        let w = self.weights;
        (0..map.horizon()).fold(D::from(0.0), |acc, t| {
            let cte = vars[map.offset(Var::Cte, t)];
            let epsi = vars[map.offset(Var::Epsi, t)];
            let v = vars[map.offset(Var::V, t)];
            acc + cte.powi(2) * w.cte + epsi.powi(2) * w.epsi + (v - self.ref_v).powi(2) * w.v
        })
    }

    pub fn actuation_cost<D: Scalar>(&self, vars: &[D], map: &IndexMap) -> D {
        let w = self.weights;
        (0..map.horizon() - 1).fold(D::from(0.0), |acc, t| {
            let (delta, a) = map.control(vars, t);
            acc + delta.powi(2) * w.delta + a.powi(2) * w.a
        })
    }

    /// Penalty on the change between consecutive actuations
    pub fn smoothness_cost<D: Scalar>(&self, vars: &[D], map: &IndexMap) -> D {
        let w = self.weights;
        (0..map.horizon() - 1)
            .map(|t| map.control(vars, t))
            .tuple_windows()
            .fold(D::from(0.0), |acc, ((d0, a0), (d1, a1))| {
                acc + (d1 - d0).powi(2) * w.delta_rate + (a1 - a0).powi(2) * w.a_rate
            })
    }
}
