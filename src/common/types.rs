//! Common types used throughout rust_nmpc

use nalgebra::{Vector2, Vector3, Vector6};

use crate::common::error::{MpcError, MpcResult};
use crate::common::traits::Scalar;

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from(tuple: (f64, f64)) -> Self {
        Self { x: tuple.0, y: tuple.1 }
    }
}

/// 2D pose (position + heading) in the global frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.yaw)
    }
}

/// Vehicle state at one timestep of the horizon.
///
/// Generic over the numeric type so the same struct carries plain values
/// and dual numbers through the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState<T = f64> {
    pub x: T,
    pub y: T,
    /// Heading [rad]
    pub psi: T,
    /// Speed
    pub v: T,
    /// Cross-track error
    pub cte: T,
    /// Heading error [rad]
    pub epsi: T,
}

impl<T: Copy> VehicleState<T> {
    pub fn new(x: T, y: T, psi: T, v: T, cte: T, epsi: T) -> Self {
        Self { x, y, psi, v, cte, epsi }
    }

    pub fn from_array(values: [T; 6]) -> Self {
        let [x, y, psi, v, cte, epsi] = values;
        Self { x, y, psi, v, cte, epsi }
    }

    /// Values in flat-vector block order
    pub fn to_array(&self) -> [T; 6] {
        [self.x, self.y, self.psi, self.v, self.cte, self.epsi]
    }
}

impl VehicleState<f64> {
    /// Build from the 6 raw values handed over by the vehicle bridge
    pub fn from_slice(values: &[f64]) -> MpcResult<Self> {
        let values: [f64; 6] = values.try_into().map_err(|_| {
            MpcError::InvalidInput(format!("state needs 6 values, got {}", values.len()))
        })?;
        let state = Self::from_array(values);
        if !state.is_finite() {
            return Err(MpcError::InvalidInput(format!(
                "state contains non-finite values: {:?}",
                values
            )));
        }
        Ok(state)
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::from_row_slice(&self.to_array())
    }
}

/// Cubic reference path `f(x) = c0 + c1 x + c2 x^2 + c3 x^3` in the vehicle frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferencePolynomial {
    coeffs: [f64; 4],
}

impl ReferencePolynomial {
    pub fn new(coeffs: [f64; 4]) -> MpcResult<Self> {
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(MpcError::InvalidInput(format!(
                "reference polynomial has non-finite coefficients: {:?}",
                coeffs
            )));
        }
        Ok(Self { coeffs })
    }

    pub fn from_slice(coeffs: &[f64]) -> MpcResult<Self> {
        let coeffs: [f64; 4] = coeffs.try_into().map_err(|_| {
            MpcError::InvalidInput(format!(
                "reference polynomial needs 4 coefficients, got {}",
                coeffs.len()
            ))
        })?;
        Self::new(coeffs)
    }

    pub fn zero() -> Self {
        Self { coeffs: [0.0; 4] }
    }

    pub fn coeffs(&self) -> &[f64; 4] {
        &self.coeffs
    }

    /// f(x)
    pub fn eval<D: Scalar>(&self, x: D) -> D {
        let [c0, c1, c2, c3] = self.coeffs;
        D::from(c0) + x * c1 + x.powi(2) * c2 + x.powi(3) * c3
    }

    /// f'(x)
    pub fn slope<D: Scalar>(&self, x: D) -> D {
        let [_, c1, c2, c3] = self.coeffs;
        D::from(c1) + x * (2.0 * c2) + x.powi(2) * (3.0 * c3)
    }

    /// Desired heading atan(f'(x))
    pub fn desired_heading<D: Scalar>(&self, x: D) -> D {
        self.slope(x).atan()
    }
}

impl Default for ReferencePolynomial {
    fn default() -> Self {
        Self::zero()
    }
}
