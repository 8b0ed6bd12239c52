//! Error types for rust_nmpc

use thiserror::Error;

use crate::nmpc::solver::SolveStatus;

/// Main error type for the NMPC controller
#[derive(Debug, Error)]
pub enum MpcError {
    /// Configuration rejected before any solve
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Per-tick input (state, coefficients, waypoints) is malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// NaN or Inf produced by the cost/constraint evaluator on the solve inputs
    #[error("Non-finite evaluation: {0}")]
    NonFinite(String),
    /// Solver iterates left the finite range mid-solve
    #[error("Solver diverged: {0}")]
    Diverged(String),
    /// Solver finished without a converged result
    #[error("Solver did not converge: status {status:?} after {iterations} iterations (cost {cost})")]
    NotConverged {
        status: SolveStatus,
        iterations: usize,
        cost: f64,
    },
    /// Error raised by the optimizer itself
    #[error("Solver error: {0}")]
    Solver(String),
    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    /// gnuplot could not render or save a figure
    #[error("Plot error: {0}")]
    Plot(String),
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MpcError {
    /// True when the tick failed inside the solver rather than on its inputs
    pub fn is_solver_failure(&self) -> bool {
        matches!(
            self,
            MpcError::NotConverged { .. } | MpcError::Diverged(_) | MpcError::Solver(_)
        )
    }
}

/// Result type alias for controller operations
pub type MpcResult<T> = Result<T, MpcError>;
