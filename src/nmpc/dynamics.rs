//! Kinematic bicycle model and the discretized-dynamics equality constraints
//!
//! Forward-Euler over `dt`:
//!
//! ```text
//! x'    = x + v cos(psi) dt
//! y'    = y + v sin(psi) dt
//! psi'  = psi - v delta / Lf dt
//! v'    = v + a dt
//! cte'  = (f(x) - y) + v sin(epsi) dt
//! epsi' = (psi - atan(f'(x))) - v delta / Lf dt
//! ```

use crate::common::{ReferencePolynomial, Scalar, VehicleState};
use crate::nmpc::index_map::{IndexMap, Var};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicBicycle {
    /// Distance from the center of gravity to the front axle
    pub lf: f64,
    pub dt: f64,
}

impl KinematicBicycle {
    pub fn new(lf: f64, dt: f64) -> Self {
        Self { lf, dt }
    }

    /// State one timestep after `s` under (delta, a), tracking `path`
    pub fn predict<D: Scalar>(
        &self,
        s: &VehicleState<D>,
        delta: D,
        a: D,
        path: &ReferencePolynomial,
    ) -> VehicleState<D> {
        let dt = self.dt;
        let yaw_step = s.v * delta * (dt / self.lf);
        VehicleState {
            x: s.x + s.v * s.psi.cos() * dt,
            y: s.y + s.v * s.psi.sin() * dt,
            psi: s.psi - yaw_step,
            v: s.v + a * dt,
            cte: (path.eval(s.x) - s.y) + s.v * s.epsi.sin() * dt,
            epsi: (s.psi - path.desired_heading(s.x)) - yaw_step,
        }
    }
}

pub struct DynamicsAssembler<'a> {
    model: KinematicBicycle,
    path: &'a ReferencePolynomial,
}

impl<'a> DynamicsAssembler<'a> {
    pub fn new(model: KinematicBicycle, path: &'a ReferencePolynomial) -> Self {
        Self { model, path }
    }

    /// Fill `g` (length 6N) with the constraint residuals.
    ///
    /// Timestep 0 carries the state itself, which the bounds pin to the
    /// measured state. Every later timestep carries `state[t] - predict(state[t-1])`.
    pub fn assemble<D: Scalar>(&self, vars: &[D], map: &IndexMap, g: &mut [D]) {
        debug_assert_eq!(g.len(), map.n_constraints());

        for var in Var::STATES {
            let i = map.offset(var, 0);
            g[i] = vars[i];
        }

        for t in 1..map.horizon() {
            let prev = map.state(vars, t - 1);
            let (delta, a) = map.control(vars, t - 1);
            let predicted = self.model.predict(&prev, delta, a, self.path).to_array();
            let actual = map.state(vars, t).to_array();

            for (k, var) in Var::STATES.iter().enumerate() {
                g[map.offset(*var, t)] = actual[k] - predicted[k];
            }
        }
    }

    /// Roll the model out from `init` under the controls already in `vars`,
    /// writing every state block. The residuals of the result are exactly zero.
    pub fn shoot<D: Scalar>(&self, init: &VehicleState, vars: &mut [D], map: &IndexMap) {
        let mut s = VehicleState::from_array(init.to_array().map(D::from));
        map.set_state(vars, 0, &s);
        for t in 1..map.horizon() {
            let (delta, a) = map.control(vars, t - 1);
            s = self.model.predict(&s, delta, a, self.path);
            map.set_state(vars, t, &s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use num_dual::Dual64;

    fn rollout(
        map: &IndexMap,
        model: &KinematicBicycle,
        path: &ReferencePolynomial,
        init: VehicleState,
        controls: &[(f64, f64)],
    ) -> Vec<f64> {
        let mut vars = vec![0.0; map.n_vars()];
        let mut s = init;
        for t in 0..map.horizon() {
            for (k, var) in Var::STATES.iter().enumerate() {
                vars[map.offset(*var, t)] = s.to_array()[k];
            }
            if t + 1 < map.horizon() {
                let (delta, a) = controls[t];
                vars[map.offset(Var::Delta, t)] = delta;
                vars[map.offset(Var::A, t)] = a;
                s = model.predict(&s, delta, a, path);
            }
        }
        vars
    }

    #[test]
    fn test_straight_line_prediction() {
        let model = KinematicBicycle::new(2.67, 0.1);
        let path = ReferencePolynomial::zero();
        let s = VehicleState::new(0.0, 0.0, 0.0, 10.0, 0.0, 0.0);
        let next = model.predict(&s, 0.0, 1.0, &path);
        assert_abs_diff_eq!(next.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(next.y, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(next.v, 10.1, epsilon = 1e-12);
        assert_abs_diff_eq!(next.cte, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_positive_delta_decreases_heading() {
        let model = KinematicBicycle::new(2.67, 0.1);
        let path = ReferencePolynomial::zero();
        let s = VehicleState::new(0.0, 0.0, 0.0, 10.0, 0.0, 0.0);
        let next = model.predict(&s, 0.2, 0.0, &path);
        let expected = -10.0 * 0.2 / 2.67 * 0.1;
        assert_abs_diff_eq!(next.psi, expected, epsilon = 1e-12);
        assert_abs_diff_eq!(next.epsi, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_cte_uses_polynomial_offset() {
        let model = KinematicBicycle::new(2.67, 0.1);
        let path = ReferencePolynomial::new([0.2, 0.0, 0.0, 0.0]).unwrap();
        let s = VehicleState::new(0.0, 0.0, 0.0, 10.0, 0.5, 0.1);
        let next = model.predict(&s, 0.0, 0.0, &path);
        assert_abs_diff_eq!(next.cte, 0.2 + 10.0 * 0.1_f64.sin() * 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_residuals_vanish_on_rollout() {
        let map = IndexMap::new(6).unwrap();
        let model = KinematicBicycle::new(2.67, 0.1);
        let path = ReferencePolynomial::new([0.5, 0.1, -0.01, 0.001]).unwrap();
        let init = VehicleState::new(0.0, 0.0, 0.05, 15.0, 0.5, -0.1);
        let controls = [(0.1, 0.5), (-0.2, 0.3), (0.0, -1.0), (0.3, 0.0), (0.05, 0.2)];
        let vars = rollout(&map, &model, &path, init, &controls);

        let mut g = vec![0.0; map.n_constraints()];
        DynamicsAssembler::new(model, &path).assemble(&vars, &map, &mut g);

        for (k, var) in Var::STATES.iter().enumerate() {
            assert_abs_diff_eq!(g[map.offset(*var, 0)], init.to_array()[k], epsilon = 1e-12);
        }
        for t in 1..map.horizon() {
            for var in Var::STATES {
                assert_abs_diff_eq!(g[map.offset(var, t)], 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_shoot_matches_manual_rollout() {
        let map = IndexMap::new(5).unwrap();
        let model = KinematicBicycle::new(2.67, 0.1);
        let path = ReferencePolynomial::new([0.3, -0.05, 0.002, 0.0]).unwrap();
        let init = VehicleState::new(0.0, 0.0, 0.02, 12.0, 0.3, 0.05);
        let controls = [(0.05, 1.0), (-0.1, 0.5), (0.0, 0.0), (0.2, -0.5)];
        let expected = rollout(&map, &model, &path, init, &controls);

        let mut vars = vec![0.0; map.n_vars()];
        for (t, (delta, a)) in controls.iter().enumerate() {
            vars[map.offset(Var::Delta, t)] = *delta;
            vars[map.offset(Var::A, t)] = *a;
        }
        DynamicsAssembler::new(model, &path).shoot(&init, &mut vars, &map);
        for (got, want) in vars.iter().zip(&expected) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_residual_derivative_with_respect_to_delta() {
        let map = IndexMap::new(2).unwrap();
        let model = KinematicBicycle::new(2.0, 0.1);
        let path = ReferencePolynomial::zero();
        let mut vars: Vec<Dual64> = vec![Dual64::from(0.0); map.n_vars()];
        vars[map.offset(Var::V, 0)] = Dual64::from(4.0);
        vars[map.offset(Var::Delta, 0)] = Dual64::new(0.0, 1.0);

        let mut g = vec![Dual64::from(0.0); map.n_constraints()];
        DynamicsAssembler::new(model, &path).assemble(&vars, &map, &mut g);

        // psi[1] - (psi[0] - v delta / Lf dt): d/d(delta) = v dt / Lf
        assert_abs_diff_eq!(g[map.offset(Var::Psi, 1)].eps, 4.0 * 0.1 / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(g[map.offset(Var::X, 1)].eps, 0.0, epsilon = 1e-12);
    }
}
