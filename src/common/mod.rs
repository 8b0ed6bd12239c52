//! Common types, traits, and error definitions for rust_nmpc
//!
//! This module provides the foundational building blocks shared by the
//! NMPC formulation, the solver adapter and the path tracking bridge.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
