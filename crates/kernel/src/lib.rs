//! Vehicle kernel: the bike's speed and wheelie state, advanced on a fixed step.
//!
//! # Invariants
//! - `0 <= wheelie_angle <= max_wheelie_angle` and `0 <= speed <= max_speed`
//!   after every step.
//! - Stepping is pure with respect to (state, dt, intent, disturbance); equal
//!   inputs give bit-identical outputs.
//! - The crash predicate only reports. Consequences belong to the caller.

pub mod clock;
pub mod params;
pub mod vehicle;

pub use clock::FixedStep;
pub use params::{VehicleConfigError, VehicleParams};
pub use vehicle::{CrashCause, Disturbance, StepReport, Vehicle, VehicleDynamics, crash_check};
