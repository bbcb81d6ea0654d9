//! Rotor rig hardware: a simulated plant for development and tests, and
//! (with the `hardware` feature, Linux only) encoder inputs on real GPIO.
//!
//! Everything here talks to the core only through `rotor_traits`.
pub mod edges;
pub mod error;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub use error::HwError;
pub use sim::{PlantSnapshot, SimAdc, SimParams, SimPot, SimRig, SimTicks};
