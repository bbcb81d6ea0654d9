//! Running the sampler and control loop.
//!
//! - `CycleDriver` runs both halves in the caller's thread, one handoff per
//!   `step`. Deterministic; used by tests and the simulated CLI run.
//! - `Rig` runs each half on its own thread. Each thread polls its gate with
//!   a short timeout so it notices shutdown, and a fatal error in either task
//!   halts it, fires the fatal hook and stops the peer.
//!
//! Safety: every spawned thread is joined on `Rig::shutdown` or on drop.
use crate::control::{ControlLoop, ControlReport};
use crate::error::{CoreError, FatalError};
use crate::handoff::{Gate, Handoff, HandoffState};
use crate::sampler::{Sample, Sampler};
use crossbeam_channel as xch;
use rotor_traits::clock::Clock;
use rotor_traits::{HeightAdc, TickCounter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

pub const SAMPLER_TASK: &str = "sampler";
pub const CONTROL_TASK: &str = "control";

/// One handoff transition as seen by a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent {
    /// Per-task cycle number, starting at 0.
    pub cycle: u64,
    pub task: &'static str,
    pub state: HandoffState,
}

/// Called once, from the halting task's thread, when a task hits a fatal error.
pub type FatalHook = Arc<dyn Fn(&'static str, &FatalError) + Send + Sync>;

/// Optional observers shared by the driver and the threaded rig.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Stop after this many control cycles.
    pub cycle_limit: Option<u64>,
    pub trace: Option<xch::Sender<TraceEvent>>,
    pub reports: Option<xch::Sender<ControlReport>>,
    pub fatal_hook: Option<FatalHook>,
}

impl RunOptions {
    fn trace(&self, cycle: u64, task: &'static str, state: HandoffState) {
        if let Some(tx) = &self.trace
            && tx.try_send(TraceEvent { cycle, task, state }).is_err()
        {
            tracing::trace!(task, cycle, "trace channel full; event dropped");
        }
    }

    fn report(&self, report: ControlReport) {
        if let Some(tx) = &self.reports {
            let _ = tx.try_send(report);
        }
    }

    fn fatal(&self, task: &'static str, err: &FatalError) -> CoreError {
        tracing::error!(task, error = %err, "task halted");
        if let Some(hook) = &self.fatal_hook {
            hook(task, err);
        }
        CoreError::TaskHalted {
            task,
            source: err.clone(),
        }
    }
}

/// Result of one synchronous handoff round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub sample: Sample,
    pub control: ControlReport,
}

/// Synchronous sampler/control alternation in the caller's thread.
///
/// The duty mailboxes are single-slot: drain `RigPorts::main_duty` and
/// `tail_duty` between steps or the next step blocks (or times out).
pub struct CycleDriver<A, T> {
    handoff: Handoff,
    sampler: Sampler<A>,
    control: ControlLoop<T>,
    opts: RunOptions,
    cycles: u64,
    halted: bool,
}

impl<A: HeightAdc, T: TickCounter> CycleDriver<A, T> {
    pub fn new(sampler: Sampler<A>, control: ControlLoop<T>, opts: RunOptions) -> Self {
        Self {
            handoff: Handoff::new(),
            sampler,
            control,
            opts,
            cycles: 0,
            halted: false,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn sampler_mut(&mut self) -> &mut Sampler<A> {
        &mut self.sampler
    }

    pub fn control_mut(&mut self) -> &mut ControlLoop<T> {
        &mut self.control
    }

    pub fn control(&self) -> &ControlLoop<T> {
        &self.control
    }

    /// Run one sample then one control cycle.
    ///
    /// After a fatal error the driver stays halted and every later call
    /// returns the same kind of error without touching the tasks.
    pub fn step(&mut self) -> Result<CycleReport, CoreError> {
        if self.halted {
            return Err(CoreError::TaskHalted {
                task: CONTROL_TASK,
                source: FatalError::Disconnected("halted driver"),
            });
        }
        let cycle = self.cycles;

        self.opts
            .trace(cycle, SAMPLER_TASK, HandoffState::WaitingForSample);
        if !self.handoff.sample_ready.try_take() {
            return Err(self.halt(SAMPLER_TASK, FatalError::Disconnected("sample ready")));
        }
        self.opts.trace(cycle, SAMPLER_TASK, HandoffState::Sampling);
        let sample = match self.sampler.cycle() {
            Ok(s) => s,
            Err(e) => return Err(self.halt(SAMPLER_TASK, e)),
        };
        self.handoff.control_done.give();

        self.opts
            .trace(cycle, CONTROL_TASK, HandoffState::WaitingForControl);
        if !self.handoff.control_done.try_take() {
            return Err(self.halt(CONTROL_TASK, FatalError::Disconnected("control done")));
        }
        self.opts.trace(cycle, CONTROL_TASK, HandoffState::Controlling);
        let control = match self.control.cycle() {
            Ok(r) => r,
            Err(e) => return Err(self.halt(CONTROL_TASK, e)),
        };
        self.opts.report(control);
        self.handoff.sample_ready.give();

        self.cycles += 1;
        Ok(CycleReport { sample, control })
    }

    fn halt(&mut self, task: &'static str, err: FatalError) -> CoreError {
        self.halted = true;
        self.opts.fatal(task, &err)
    }
}

/// Sampler and control loop on dedicated threads.
pub struct Rig {
    shutdown: Arc<AtomicBool>,
    sampler: Option<JoinHandle<Result<u64, CoreError>>>,
    control: Option<JoinHandle<Result<u64, CoreError>>>,
}

struct TaskCtx<C> {
    name: &'static str,
    wait_state: HandoffState,
    run_state: HandoffState,
    own: Gate,
    peer: Gate,
    shutdown: Arc<AtomicBool>,
    gate_poll: Duration,
    tick: Duration,
    clock: C,
    opts: RunOptions,
}

impl<C: Clock> TaskCtx<C> {
    /// Gate-driven loop shared by both tasks. Returns the number of
    /// completed cycles.
    fn run<F>(self, mut body: F) -> Result<u64, CoreError>
    where
        F: FnMut(u64) -> Result<bool, FatalError>,
    {
        let mut cycle = 0u64;
        let mut announced = false;
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::debug!(task = self.name, cycle, "shutdown requested");
                return Ok(cycle);
            }
            if !announced {
                self.opts.trace(cycle, self.name, self.wait_state);
                announced = true;
            }
            match self.own.take(self.gate_poll) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => return Err(self.stop(e)),
            }
            announced = false;
            self.opts.trace(cycle, self.name, self.run_state);
            let keep_going = match body(cycle) {
                Ok(k) => k,
                Err(e) => return Err(self.stop(e)),
            };
            cycle += 1;
            self.peer.give();
            if !keep_going {
                tracing::debug!(task = self.name, cycle, "cycle limit reached");
                return Ok(cycle);
            }
            self.clock.sleep(self.tick);
        }
    }

    fn stop(&self, err: FatalError) -> CoreError {
        self.shutdown.store(true, Ordering::Release);
        self.opts.fatal(self.name, &err)
    }
}

impl Rig {
    /// Spawn the sampler and control threads.
    pub fn spawn<A, T, C>(
        sampler: Sampler<A>,
        control: ControlLoop<T>,
        scheduler: crate::config::SchedulerCfg,
        clock: C,
        opts: RunOptions,
    ) -> Self
    where
        A: HeightAdc + Send + 'static,
        T: TickCounter + Send + 'static,
        C: Clock + Clone + Send + 'static,
    {
        let handoff = Handoff::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let limit = opts.cycle_limit;

        let sampler_ctx = TaskCtx {
            name: SAMPLER_TASK,
            wait_state: HandoffState::WaitingForSample,
            run_state: HandoffState::Sampling,
            own: handoff.sample_ready.clone(),
            peer: handoff.control_done.clone(),
            shutdown: Arc::clone(&shutdown),
            gate_poll: scheduler.gate_poll,
            tick: scheduler.tick,
            clock: clock.clone(),
            opts: opts.clone(),
        };
        let control_ctx = TaskCtx {
            name: CONTROL_TASK,
            wait_state: HandoffState::WaitingForControl,
            run_state: HandoffState::Controlling,
            own: handoff.control_done,
            peer: handoff.sample_ready,
            shutdown: Arc::clone(&shutdown),
            gate_poll: scheduler.gate_poll,
            tick: scheduler.tick,
            clock,
            opts,
        };

        let sampler = std::thread::spawn(move || {
            let mut sampler = sampler;
            sampler_ctx.run(|cycle| {
                sampler.cycle()?;
                // Never sample beyond the last control cycle.
                Ok(limit.is_none_or(|n| cycle + 1 < n))
            })
        });
        let done = Arc::clone(&shutdown);
        let control = std::thread::spawn(move || {
            let mut control = control;
            let reports = control_ctx.opts.clone();
            let result = control_ctx.run(|cycle| {
                let r = control.cycle()?;
                reports.report(r);
                Ok(limit.is_none_or(|n| cycle + 1 < n))
            });
            // The rig is finished once control stops, whatever the reason.
            done.store(true, Ordering::Release);
            result
        });

        Self {
            shutdown,
            sampler: Some(sampler),
            control: Some(control),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Acquire)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Wait for both tasks to finish on their own (cycle limit or fatal
    /// error). Returns the completed control cycles or the first error.
    ///
    /// With an unbounded duty publish, keep draining the duty mailboxes (or
    /// drop their readers) while waiting.
    pub fn join(mut self) -> Result<u64, CoreError> {
        let sampled = join_task(self.sampler.take(), SAMPLER_TASK);
        let controlled = join_task(self.control.take(), CONTROL_TASK);
        sampled?;
        controlled
    }

    /// Stop both tasks and join them.
    pub fn shutdown(self) -> Result<u64, CoreError> {
        self.request_shutdown();
        self.join()
    }
}

fn join_task(
    handle: Option<JoinHandle<Result<u64, CoreError>>>,
    name: &'static str,
) -> Result<u64, CoreError> {
    match handle {
        None => Ok(0),
        Some(h) => match h.join() {
            Ok(r) => r,
            Err(_) => {
                tracing::warn!(task = name, "task thread panicked");
                Err(CoreError::TaskPanicked(name))
            }
        },
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        for (handle, name) in [
            (self.sampler.take(), SAMPLER_TASK),
            (self.control.take(), CONTROL_TASK),
        ] {
            if let Some(h) = handle
                && h.join().is_err()
            {
                tracing::warn!(task = name, "task thread panicked during shutdown");
            }
        }
    }
}
