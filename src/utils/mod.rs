//! Utility modules for rust_nmpc

pub mod visualization;

pub use visualization::{Visualizer, PathStyle, PointStyle, colors};
