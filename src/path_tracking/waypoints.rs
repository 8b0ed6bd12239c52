//! Waypoints to reference polynomial
//!
//! Global waypoints are moved into the vehicle frame (vehicle at the
//! origin, heading along +x) and fitted with a cubic. The state handed to
//! the controller follows from the fit: on the origin with zero heading,
//! `cte = f(0)` and `epsi = -atan(f'(0))`.

use nalgebra::{DMatrix, DVector};

use crate::common::{MpcError, MpcResult, Point2D, Pose2D, ReferencePolynomial, VehicleState};

/// Express global points in the frame of `pose`
pub fn to_vehicle_frame(pose: &Pose2D, points: &[Point2D]) -> Vec<Point2D> {
    let (sin, cos) = pose.yaw.sin_cos();
    points
        .iter()
        .map(|p| {
            let dx = p.x - pose.x;
            let dy = p.y - pose.y;
            Point2D::new(dx * cos + dy * sin, -dx * sin + dy * cos)
        })
        .collect()
}

/// Inverse of [`to_vehicle_frame`]
pub fn to_global_frame(pose: &Pose2D, points: &[Point2D]) -> Vec<Point2D> {
    let (sin, cos) = pose.yaw.sin_cos();
    points
        .iter()
        .map(|p| Point2D::new(pose.x + p.x * cos - p.y * sin, pose.y + p.x * sin + p.y * cos))
        .collect()
}

/// Least-squares polynomial fit, coefficients in ascending order
pub fn polyfit(xs: &[f64], ys: &[f64], order: usize) -> MpcResult<Vec<f64>> {
    if xs.len() != ys.len() {
        return Err(MpcError::InvalidInput(format!(
            "polyfit got {} x values and {} y values",
            xs.len(),
            ys.len()
        )));
    }
    if xs.len() <= order {
        return Err(MpcError::InvalidInput(format!(
            "order {} fit needs more than {} points",
            order,
            xs.len()
        )));
    }

    let a = DMatrix::from_fn(xs.len(), order + 1, |i, j| xs[i].powi(j as i32));
    let b = DVector::from_column_slice(ys);
    let coeffs = a
        .svd(true, true)
        .solve(&b, 1e-12)
        .map_err(|e| MpcError::NonFinite(format!("polyfit failed: {}", e)))?;

    if coeffs.iter().any(|c| !c.is_finite()) {
        return Err(MpcError::NonFinite("polyfit produced non-finite coefficients".to_string()));
    }
    Ok(coeffs.iter().copied().collect())
}

impl ReferencePolynomial {
    /// Cubic reference fitted through vehicle-frame points
    pub fn fit(points: &[Point2D]) -> MpcResult<Self> {
        let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
        Self::from_slice(&polyfit(&xs, &ys, 3)?)
    }
}

/// Measured state in the vehicle frame for speed `v`
pub fn local_state(v: f64, path: &ReferencePolynomial) -> VehicleState {
    VehicleState::new(0.0, 0.0, 0.0, v, path.eval(0.0), -path.slope(0.0).atan())
}
