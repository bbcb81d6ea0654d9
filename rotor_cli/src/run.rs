//! Simulated runs: config mapping, rig assembly and the actuator/display
//! side of the loop (the part the PWM and display tasks play on the rig).

use crossbeam_channel as xch;
use eyre::WrapErr;
use rotor_config::Config;
use rotor_core::config::SchedulerCfg;
use rotor_core::setpoint::{height_target, yaw_target};
use rotor_core::{
    ControlReport, CycleDriver, FatalError, QuadratureDecoder, Rig, RigBuilder, RigCfg, RigPorts,
    RunOptions, TraceEvent,
};
use rotor_hardware::{SimAdc, SimParams, SimPot, SimRig, SimTicks};
use rotor_traits::EdgeSink;
use rotor_traits::clock::MonotonicClock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How long the actuator side waits for a duty before re-checking the rig.
const DUTY_POLL: Duration = Duration::from_millis(5);
/// Upper bound between the main and tail publish of one control cycle.
const TAIL_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub cycles: u64,
    pub height: usize,
    pub yaw: usize,
    pub pot: Option<u32>,
    pub trace: Option<PathBuf>,
    pub record: Option<PathBuf>,
    pub threaded: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub cycles: u64,
    pub ground: Option<u32>,
    pub last: ControlReport,
    pub plant_height: f64,
    pub plant_yaw: f64,
    /// Last potentiometer value the monitor reported.
    pub pot: u32,
    pub reference_seen: bool,
    pub duration_ms: u128,
    pub interrupted: bool,
}

pub fn sim_params(cfg: &Config) -> SimParams {
    SimParams {
        ground_raw: cfg.sim.ground_raw,
        hover_duty: cfg.sim.hover_duty,
        climb_per_duty: cfg.sim.climb_per_duty,
        tail_neutral_duty: cfg.sim.tail_neutral_duty,
        spin_per_duty: cfg.sim.spin_per_duty,
        noise: cfg.sim.noise,
        cycle_ms: cfg.sim.cycle_ms,
        ms_per_tick: cfg.timer.ms_per_tick,
        pot_raw: cfg.sim.pot_raw,
    }
}

struct Assembly {
    sim: SimRig,
    pot: SimPot,
    decoder: Arc<QuadratureDecoder>,
    parts: rotor_core::RigParts<SimAdc, SimTicks>,
    scheduler: SchedulerCfg,
}

fn assemble(cfg: &Config) -> eyre::Result<Assembly> {
    let decoder = Arc::new(QuadratureDecoder::new(false, false));
    assemble_with(cfg, Arc::clone(&decoder), decoder)
}

/// `sim_edges` receives the simulated plant's encoder edges; `decoder` is
/// what the sampler reads yaw from.
fn assemble_with(
    cfg: &Config,
    decoder: Arc<QuadratureDecoder>,
    sim_edges: Arc<dyn EdgeSink>,
) -> eyre::Result<Assembly> {
    let sim = SimRig::new(sim_params(cfg), sim_edges).wrap_err("create simulated rig")?;
    let rig_cfg = RigCfg::from(cfg);
    let scheduler = rig_cfg.scheduler;
    let parts = RigBuilder::new(rig_cfg)
        .with_adc(sim.adc())
        .with_ticks(sim.ticks())
        .with_decoder(Arc::clone(&decoder))
        .try_build()?;
    Ok(Assembly {
        pot: sim.pot(),
        sim,
        decoder,
        parts,
        scheduler,
    })
}

/// Hand both duties to the plant and advance it one loop period.
fn actuate(sim: &mut SimRig, main: u32, tail: u32) {
    sim.set_main_duty(main);
    sim.set_tail_duty(tail);
    sim.step();
}

/// Simulated edges are dropped while a real encoder drives the decoder.
#[cfg(all(feature = "hardware", target_os = "linux"))]
struct DetachedEdges;

#[cfg(all(feature = "hardware", target_os = "linux"))]
impl EdgeSink for DetachedEdges {
    fn on_phase_edge(&self, _phase_a: bool, _phase_b: bool) {}
    fn on_reference_edge(&self) {}
}

/// With encoder pins configured, yaw comes from the real encoder and only
/// height and the loop timer are simulated.
#[cfg(all(feature = "hardware", target_os = "linux"))]
fn assemble_for_run(
    cfg: &Config,
) -> eyre::Result<(Assembly, Option<rotor_hardware::gpio::BoundEncoder>)> {
    let Some(pins) = cfg.pins else {
        return Ok((assemble(cfg)?, None));
    };
    let inputs =
        rotor_hardware::gpio::EncoderInputs::open(pins.phase_a, pins.phase_b, pins.reference)?;
    let (a, b) = inputs.initial_phase();
    let decoder = Arc::new(QuadratureDecoder::new(a, b));
    let bound = inputs.bind(decoder.clone())?;
    let assembly = assemble_with(cfg, decoder, Arc::new(DetachedEdges))?;
    Ok((assembly, Some(bound)))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn assemble_for_run(cfg: &Config) -> eyre::Result<(Assembly, Option<()>)> {
    Ok((assemble(cfg)?, None))
}

pub fn run_sim(cfg: &Config, args: &RunArgs, shutdown: &AtomicBool) -> eyre::Result<RunSummary> {
    // Reject bad targets before any task starts.
    height_target(args.height)?;
    yaw_target(args.yaw)?;
    let (
        Assembly {
            mut sim,
            mut pot,
            decoder,
            parts,
            scheduler,
        },
        encoder,
    ) = assemble_for_run(cfg)?;
    if encoder.is_some() {
        tracing::info!("yaw from the GPIO encoder");
    }
    let (trace_tx, trace_rx) = if args.trace.is_some() {
        let (tx, rx) = xch::unbounded();
        (Some(tx), Some(rx))
    } else {
        (None, None)
    };
    let started = Instant::now();
    tracing::info!(
        cycles = args.cycles,
        height = args.height,
        yaw = args.yaw,
        threaded = args.threaded,
        "run start"
    );

    let outcome = if args.threaded {
        run_threaded(&mut sim, &mut pot, parts, scheduler, args, trace_tx, shutdown)
    } else {
        run_sync(&mut sim, &mut pot, parts, args, trace_tx, shutdown)
    };

    // Whatever happened, the trace so far is still worth keeping.
    if let (Some(path), Some(rx)) = (&args.trace, trace_rx) {
        write_trace(path, rx.try_iter())?;
    }
    let Outcome {
        reports,
        ground,
        pot: pot_value,
        interrupted,
    } = outcome?;
    if let Some(path) = &args.record {
        write_record(path, &reports)?;
    }

    let snap = sim.snapshot();
    let summary = RunSummary {
        cycles: reports.len() as u64,
        ground,
        last: reports.last().copied().unwrap_or_default(),
        plant_height: snap.height,
        plant_yaw: snap.yaw_deg,
        pot: pot_value,
        reference_seen: decoder.reference_seen(),
        duration_ms: started.elapsed().as_millis(),
        interrupted,
    };
    tracing::info!(
        cycles = summary.cycles,
        height = summary.last.height_above_ground,
        yaw = summary.last.yaw,
        plant_steps = sim.steps(),
        "run complete"
    );
    Ok(summary)
}

struct Outcome {
    reports: Vec<ControlReport>,
    ground: Option<u32>,
    pot: u32,
    interrupted: bool,
}

fn run_sync(
    sim: &mut SimRig,
    pot: &mut SimPot,
    parts: rotor_core::RigParts<SimAdc, SimTicks>,
    args: &RunArgs,
    trace: Option<xch::Sender<TraceEvent>>,
    shutdown: &AtomicBool,
) -> eyre::Result<Outcome> {
    let mut ports = parts.ports;
    let opts = RunOptions {
        trace,
        ..RunOptions::default()
    };
    let mut driver = CycleDriver::new(parts.sampler, parts.control, opts);
    let mut reports = Vec::with_capacity(
        usize::try_from(args.cycles)
            .unwrap_or(0)
            .min(1 << 16),
    );
    let mut interrupted = false;

    for n in 0..args.cycles {
        if shutdown.load(Ordering::Acquire) {
            interrupted = true;
            break;
        }
        let r = driver.step()?;
        let main = ports.main_duty.try_take().unwrap_or(r.control.main_duty);
        let tail = ports.tail_duty.try_take().unwrap_or(r.control.tail_duty);
        ports.drain_display();
        actuate(sim, main, tail);
        ports.pot.sample(pot);
        reports.push(r.control);
        // The first cycle seeds ground; operator input goes in after it.
        if n == 0 {
            apply_operator(&mut ports, pot, args)?;
        }
    }
    Ok(Outcome {
        reports,
        ground: driver.control().ground().ground(),
        pot: ports.pot.reported(),
        interrupted,
    })
}

fn run_threaded(
    sim: &mut SimRig,
    pot: &mut SimPot,
    parts: rotor_core::RigParts<SimAdc, SimTicks>,
    scheduler: SchedulerCfg,
    args: &RunArgs,
    trace: Option<xch::Sender<TraceEvent>>,
    shutdown: &AtomicBool,
) -> eyre::Result<Outcome> {
    let mut ports = parts.ports;
    let (report_tx, report_rx) = xch::unbounded();
    let opts = RunOptions {
        cycle_limit: Some(args.cycles),
        trace,
        reports: Some(report_tx),
        fatal_hook: Some(Arc::new(|task: &'static str, err: &FatalError| {
            tracing::error!(task, error = %err, "rig halted");
        })),
    };
    let rig = Rig::spawn(
        parts.sampler,
        parts.control,
        scheduler,
        MonotonicClock::new(),
        opts,
    );

    let mut reports = Vec::new();
    let mut interrupted = false;
    while rig.is_running() {
        if shutdown.load(Ordering::Acquire) {
            interrupted = true;
            rig.request_shutdown();
            break;
        }
        if let Some(main) = ports.main_duty.take_timeout(DUTY_POLL) {
            // Control publishes tail right after main.
            let tail = ports.tail_duty.take_timeout(TAIL_WAIT).unwrap_or(0);
            actuate(sim, main, tail);
        }
        ports.drain_display();
        ports.pot.sample(pot);
        let first = reports.is_empty();
        reports.extend(report_rx.try_iter());
        if first && !reports.is_empty() {
            apply_operator(&mut ports, pot, args)?;
        }
    }

    // Keep the duty slots moving until both tasks are joined.
    let done = AtomicBool::new(false);
    let joined = std::thread::scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::Acquire) {
                if let Some(main) = ports.main_duty.take_timeout(DUTY_POLL) {
                    let tail = ports.tail_duty.take_timeout(DUTY_POLL).unwrap_or(0);
                    actuate(sim, main, tail);
                }
            }
        });
        let r = rig.join();
        done.store(true, Ordering::Release);
        r
    });
    reports.extend(report_rx.try_iter());
    joined?;
    Ok(Outcome {
        ground: reports.last().and_then(|r| r.ground),
        reports,
        pot: ports.pot.reported(),
        interrupted,
    })
}

fn apply_operator(ports: &mut RigPorts, pot: &SimPot, args: &RunArgs) -> eyre::Result<()> {
    if args.height != 0 || args.yaw != 0 {
        ports.stepper.set(args.height, args.yaw)?;
        tracing::info!(height = args.height, yaw = args.yaw, "targets set");
    }
    if let Some(code) = args.pot {
        pot.set(code);
    }
    Ok(())
}

fn write_trace(path: &Path, events: impl Iterator<Item = TraceEvent>) -> eyre::Result<()> {
    let mut w = csv::Writer::from_path(path).wrap_err_with(|| format!("create {path:?}"))?;
    w.write_record(["cycle", "task", "state"])?;
    for e in events {
        w.write_record([
            e.cycle.to_string(),
            e.task.to_string(),
            e.state.as_str().to_string(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn write_record(path: &Path, reports: &[ControlReport]) -> eyre::Result<()> {
    let mut w = csv::Writer::from_path(path).wrap_err_with(|| format!("create {path:?}"))?;
    w.write_record([
        "cycle",
        "target_height_index",
        "target_yaw_index",
        "height",
        "height_error",
        "yaw",
        "yaw_error",
        "dt_ms",
        "parked",
        "main_duty",
        "tail_duty",
    ])?;
    for (i, r) in reports.iter().enumerate() {
        w.write_record([
            i.to_string(),
            r.target_height_index.to_string(),
            r.target_yaw_index.to_string(),
            r.height_above_ground.to_string(),
            r.height_error.to_string(),
            r.yaw.to_string(),
            r.yaw_error.to_string(),
            r.dt_ms.to_string(),
            r.parked.to_string(),
            r.main_duty.to_string(),
            r.tail_duty.to_string(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Parked cycles against the simulated rig; fails if anything looks off.
pub fn self_check(cfg: &Config) -> eyre::Result<ControlReport> {
    let Assembly { mut sim, parts, .. } = assemble(cfg)?;
    let mut ports = parts.ports;
    let mut driver = CycleDriver::new(parts.sampler, parts.control, RunOptions::default());
    let mut last = ControlReport::default();
    for _ in 0..10 {
        let r = driver.step()?;
        let main = ports.main_duty.try_take().unwrap_or(r.control.main_duty);
        let tail = ports.tail_duty.try_take().unwrap_or(r.control.tail_duty);
        ports.drain_display();
        actuate(&mut sim, main, tail);
        last = r.control;
    }
    if driver.control().ground().ground().is_none() {
        eyre::bail!("self-check: ground was not captured");
    }
    if !last.parked || last.main_duty != 0 || last.tail_duty != 0 {
        eyre::bail!("self-check: rig did not park on the ground ({last:?})");
    }
    Ok(last)
}
