//! Strict sampler/control alternation.
//!
//! Two binary gates built on single-slot channels: `SampleReady` starts
//! given, `ControlDone` starts held. The sampler takes `SampleReady` and
//! gives `ControlDone`; the control loop does the reverse. Neither side can
//! run twice in a row and no cycle can be skipped.
use crate::error::FatalError;
use crossbeam_channel as xch;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Gate {
    tx: xch::Sender<()>,
    rx: xch::Receiver<()>,
    name: &'static str,
}

impl Gate {
    fn new(name: &'static str, given: bool) -> Self {
        let (tx, rx) = xch::bounded(1);
        if given {
            // fresh channel with one free slot
            let _ = tx.try_send(());
        }
        Self { tx, rx, name }
    }

    /// Release the gate. Giving an already-given gate is a no-op and
    /// returns `false`.
    pub fn give(&self) -> bool {
        let given = self.tx.try_send(()).is_ok();
        if !given {
            tracing::warn!(gate = self.name, "gate given twice");
        }
        given
    }

    /// Wait up to `timeout` for the gate. `Ok(false)` means it timed out.
    pub fn take(&self, timeout: Duration) -> Result<bool, FatalError> {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => Ok(true),
            Err(xch::RecvTimeoutError::Timeout) => Ok(false),
            Err(xch::RecvTimeoutError::Disconnected) => Err(FatalError::Disconnected(self.name)),
        }
    }

    pub fn try_take(&self) -> bool {
        self.rx.try_recv().is_ok()
    }

    pub fn is_given(&self) -> bool {
        !self.rx.is_empty()
    }
}

/// Where the two tasks are in the alternation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandoffState {
    WaitingForSample,
    Sampling,
    WaitingForControl,
    Controlling,
}

impl HandoffState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WaitingForSample => "waiting_for_sample",
            Self::Sampling => "sampling",
            Self::WaitingForControl => "waiting_for_control",
            Self::Controlling => "controlling",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Handoff {
    pub sample_ready: Gate,
    pub control_done: Gate,
}

impl Handoff {
    pub fn new() -> Self {
        Self {
            sample_ready: Gate::new("sample ready", true),
            control_done: Gate::new("control done", false),
        }
    }
}

impl Default for Handoff {
    fn default() -> Self {
        Self::new()
    }
}
