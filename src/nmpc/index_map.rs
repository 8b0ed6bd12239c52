//! Layout of the flat optimization vector
//!
//! ```text
//! | x[0..N) | y[0..N) | psi[0..N) | v[0..N) | cte[0..N) | epsi[0..N) | delta[0..N-1) | a[0..N-1) |
//! ```
//!
//! The constraint vector reuses the six state blocks: the residual of a
//! state variable at timestep `t` lives at the same offset as the variable.

use std::ops::Range;

use crate::common::{MpcError, MpcResult, VehicleState};

/// Variable blocks of the optimization vector, in storage order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Var {
    X,
    Y,
    Psi,
    V,
    Cte,
    Epsi,
    Delta,
    A,
}

impl Var {
    pub const STATES: [Var; 6] = [Var::X, Var::Y, Var::Psi, Var::V, Var::Cte, Var::Epsi];
    pub const CONTROLS: [Var; 2] = [Var::Delta, Var::A];

    pub fn is_control(self) -> bool {
        matches!(self, Var::Delta | Var::A)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMap {
    horizon: usize,
    starts: [usize; 8],
}

impl IndexMap {
    pub fn new(horizon: usize) -> MpcResult<Self> {
        if horizon < 2 {
            return Err(MpcError::InvalidConfig(format!(
                "horizon must be at least 2, got {}",
                horizon
            )));
        }
        let mut starts = [0; 8];
        for i in 1..8 {
            // every block before delta holds N entries, delta holds N-1
            let prev_len = if i == 7 { horizon - 1 } else { horizon };
            starts[i] = starts[i - 1] + prev_len;
        }
        Ok(Self { horizon, starts })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn start(&self, var: Var) -> usize {
        self.starts[var as usize]
    }

    /// Number of timesteps the block holds
    pub fn block_len(&self, var: Var) -> usize {
        if var.is_control() {
            self.horizon - 1
        } else {
            self.horizon
        }
    }

    pub fn range(&self, var: Var) -> Range<usize> {
        let start = self.start(var);
        start..start + self.block_len(var)
    }

    /// Position of `var` at timestep `t`
    pub fn offset(&self, var: Var, t: usize) -> usize {
        debug_assert!(t < self.block_len(var), "{:?}[{}] outside the horizon", var, t);
        self.start(var) + t
    }

    /// Both control blocks; they sit last and back to back
    pub fn controls(&self) -> Range<usize> {
        self.start(Var::Delta)..self.n_vars()
    }

    /// Length of the optimization vector: `6N + 2(N-1)`
    pub fn n_vars(&self) -> usize {
        self.horizon * 6 + (self.horizon - 1) * 2
    }

    /// Length of the constraint vector: `6N`
    pub fn n_constraints(&self) -> usize {
        self.horizon * 6
    }

    /// State at timestep `t`
    pub fn state<D: Copy>(&self, vars: &[D], t: usize) -> VehicleState<D> {
        VehicleState::from_array(Var::STATES.map(|var| vars[self.offset(var, t)]))
    }

    /// Scatter `state` into timestep `t`
    pub fn set_state<D: Copy>(&self, vars: &mut [D], t: usize, state: &VehicleState<D>) {
        for (var, value) in Var::STATES.iter().zip(state.to_array()) {
            vars[self.offset(*var, t)] = value;
        }
    }

    /// (delta, a) applied between timesteps `t` and `t + 1`
    pub fn control<D: Copy>(&self, vars: &[D], t: usize) -> (D, D) {
        (vars[self.offset(Var::Delta, t)], vars[self.offset(Var::A, t)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_for_default_horizon() {
        let map = IndexMap::new(10).unwrap();
        assert_eq!(map.start(Var::X), 0);
        assert_eq!(map.start(Var::Y), 10);
        assert_eq!(map.start(Var::Epsi), 50);
        assert_eq!(map.start(Var::Delta), 60);
        assert_eq!(map.start(Var::A), 69);
        assert_eq!(map.n_vars(), 78);
        assert_eq!(map.n_constraints(), 60);
        assert_eq!(map.offset(Var::Psi, 3), 23);
        assert_eq!(map.range(Var::A), 69..78);
        assert_eq!(map.controls(), 60..78);
    }

    #[test]
    fn test_rejects_short_horizon() {
        for n in [0, 1] {
            assert!(matches!(IndexMap::new(n), Err(MpcError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_blocks_tile_the_vector() {
        for n in 2..15 {
            let map = IndexMap::new(n).unwrap();
            let mut covered = vec![0usize; map.n_vars()];
            for var in Var::STATES.iter().chain(Var::CONTROLS.iter()) {
                for i in map.range(*var) {
                    covered[i] += 1;
                }
            }
            assert!(covered.iter().all(|&c| c == 1), "overlap or gap for N = {}", n);
        }
    }

    #[test]
    fn test_state_and_control_gather() {
        let map = IndexMap::new(3).unwrap();
        let vars: Vec<f64> = (0..map.n_vars()).map(|i| i as f64).collect();
        let s = map.state(&vars, 1);
        assert_eq!(s.to_array(), [1.0, 4.0, 7.0, 10.0, 13.0, 16.0]);
        assert_eq!(map.control(&vars, 1), (19.0, 21.0));
    }

    #[test]
    fn test_set_state_round_trip() {
        let map = IndexMap::new(4).unwrap();
        let mut vars = vec![0.0; map.n_vars()];
        let s = VehicleState::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        map.set_state(&mut vars, 2, &s);
        assert_eq!(map.state(&vars, 2), s);
        assert_eq!(vars.iter().filter(|v| **v != 0.0).count(), 6);
    }
}
