//! Actuation extracted from a converged solution

use crate::common::Point2D;
use crate::nmpc::config::MpcConfig;
use crate::nmpc::index_map::{IndexMap, Var};

/// First actuation pair plus the predicted path for display/feed-forward
#[derive(Debug, Clone, PartialEq)]
pub struct Actuation {
    pub steering: f64,
    pub acceleration: f64,
    /// Predicted (x, y) for timesteps 1..=N-2
    pub predicted: Vec<Point2D>,
}

impl Actuation {
    pub fn extract(solution: &[f64], map: &IndexMap) -> Self {
        let (steering, acceleration) = map.control(solution, 0);
        let predicted = (1..map.horizon() - 1)
            .map(|t| {
                Point2D::new(
                    solution[map.offset(Var::X, t)],
                    solution[map.offset(Var::Y, t)],
                )
            })
            .collect();
        Self {
            steering,
            acceleration,
            predicted,
        }
    }

    /// Fallback command: wheels straight, full braking
    pub fn safe_deceleration(config: &MpcConfig) -> Self {
        Self {
            steering: 0.0,
            acceleration: -config.max_accel,
            predicted: Vec::new(),
        }
    }

    /// `[steering, acceleration, x1, y1, ..., x(N-2), y(N-2)]`
    pub fn to_vec(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(2 + 2 * self.predicted.len());
        out.push(self.steering);
        out.push(self.acceleration);
        for p in &self.predicted {
            out.push(p.x);
            out.push(p.y);
        }
        out
    }
}
