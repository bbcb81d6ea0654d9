#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Rotor rig sensing and control (hardware-agnostic).
//!
//! All hardware interaction goes through the `rotor_traits` seams
//! (`HeightAdc`, `TickCounter`, `EdgeSink`), so every task here can run
//! against the simulated rig or a scripted mock.
//!
//! ## Architecture
//!
//! - **Filtering**: fixed-capacity moving average (`ring_filter`)
//! - **Yaw**: lock-free quadrature decoder fed from edge context (`quadrature`)
//! - **Sampling**: per-cycle ADC + yaw publish (`sampler`)
//! - **Control**: two PID loops with deadband integral reset (`control`, `pid`)
//! - **Handoff**: strict sampler/control alternation (`handoff`)
//! - **Running**: synchronous driver and threaded rig with fatal hook (`runner`)
//!
//! ## Integer arithmetic
//!
//! Heights are raw 12-bit ADC codes, yaw is whole degrees and duties are
//! whole percent. PID terms are evaluated in `f64` and truncated toward zero
//! before they are summed.

pub mod builder;
pub mod calibration;
pub mod config;
pub mod control;
pub mod conversions;
pub mod error;
pub mod handoff;
pub mod mailbox;
pub mod mocks;
pub mod pid;
pub mod potentiometer;
pub mod quadrature;
pub mod ring_filter;
pub mod runner;
pub mod sampler;
pub mod setpoint;
pub mod timer;
pub mod util;

pub use builder::{RigBuilder, RigParts, RigPorts};
pub use config::RigCfg;
pub use control::{ControlLoop, ControlReport, yaw_error};
pub use error::{BuildError, CoreError, FatalError};
pub use quadrature::QuadratureDecoder;
pub use ring_filter::{PrefillPolicy, RingFilter};
pub use runner::{CycleDriver, CycleReport, FatalHook, Rig, RunOptions, TraceEvent};
pub use sampler::Sampler;
