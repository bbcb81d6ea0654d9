use thiserror::Error;

use crate::setpoint::Axis;

/// Conditions that halt a task permanently.
///
/// A fatal error is never retried: the task that detects it stops cycling,
/// reports through the fatal hook, and asks its peer to shut down.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("mailbox overflow: {0} is full")]
    MailboxOverflow(&'static str),
    #[error("mailbox disconnected: {0}")]
    Disconnected(&'static str),
    #[error("actuator publish timed out: {0}")]
    PublishTimeout(&'static str),
    #[error("setpoint index {index} out of range for {axis} table (max {max})")]
    SetpointOutOfRange { axis: Axis, index: usize, max: usize },
}

#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("{task} task halted: {source}")]
    TaskHalted {
        task: &'static str,
        #[source]
        source: FatalError,
    },
    #[error("{0} task panicked")]
    TaskPanicked(&'static str),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing height ADC")]
    MissingAdc,
    #[error("missing tick counter")]
    MissingTicks,
    #[error("ring filter capacity must be >= 1")]
    ZeroCapacity,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
