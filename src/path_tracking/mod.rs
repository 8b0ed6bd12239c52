// Path tracking: waypoint preprocessing and the closed-loop simulation

pub mod waypoints;
pub mod simulation;

pub use waypoints::*;
pub use simulation::{SimulationConfig, SimulationResult, TrackingSimulation};
