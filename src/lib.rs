//! rust_nmpc - nonlinear model predictive control for path tracking
//!
//! A kinematic bicycle is driven along a cubic reference polynomial by
//! solving a short-horizon nonlinear program every control tick and
//! applying its first actuation pair.

// Core modules
pub mod common;
pub mod utils;

// Controller and its surroundings
pub mod nmpc;
pub mod path_tracking;

// Re-export common types for convenience
pub use common::{Point2D, Pose2D, VehicleState, ReferencePolynomial};
pub use common::{Controller, FgEvaluator, NlpSolver, Scalar, ShootingEvaluator};
pub use common::{MpcError, MpcResult};
pub use nmpc::{Actuation, MpcConfig, MpcController, MpcSolution, PanocSolver, SolveStatus};
