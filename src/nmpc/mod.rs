//! Nonlinear model predictive control
//!
//! Formulates the tracking problem over a short horizon as a nonlinear
//! program, solves it and returns the first actuation pair.
//!
//! - [`index_map`]: layout of the flat optimization vector
//! - [`cost`]: objective
//! - [`dynamics`]: kinematic bicycle model and equality constraints
//! - [`fg_eval`]: combined objective + constraint evaluator
//! - [`bounds`]: variable and constraint bounds
//! - [`solver`]: single-shooting PANOC solver adapter with dual-number gradients
//! - [`extract`]: actuation and predicted path from a solution
//! - [`controller`]: one solve per control tick

pub mod config;
pub mod index_map;
pub mod cost;
pub mod dynamics;
pub mod fg_eval;
pub mod bounds;
pub mod solver;
pub mod extract;
pub mod controller;

pub use config::{CostWeights, MpcConfig, SolverConfig};
pub use index_map::{IndexMap, Var};
pub use dynamics::KinematicBicycle;
pub use fg_eval::FgEval;
pub use bounds::NlpBounds;
pub use solver::{NlpProblem, PanocSolver, SolveReport, SolveStatus};
pub use extract::Actuation;
pub use controller::{MpcController, MpcSolution};
