//! Strict sampler/control alternation, synchronous and threaded.
//!
//! Verifies that:
//! - every Sampling event is followed by the Controlling event of the same cycle
//! - no cycle is skipped or run twice over 1000 cycles
//! - the threaded rig stops on its cycle limit and joins cleanly

use crossbeam_channel as xch;
use rotor_core::config::{FilterCfg, SchedulerCfg};
use rotor_core::handoff::HandoffState;
use rotor_core::mocks::{ManualTicks, ScriptedAdc};
use rotor_core::runner::{CONTROL_TASK, SAMPLER_TASK};
use rotor_core::{
    CycleDriver, PrefillPolicy, Rig, RigBuilder, RigCfg, RigPorts, RunOptions, TraceEvent,
};
use rotor_traits::clock::MonotonicClock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const CYCLES: u64 = 1000;

fn cfg() -> RigCfg {
    RigCfg {
        filter: FilterCfg {
            height_prefill: PrefillPolicy::FirstSample,
            ..FilterCfg::default()
        },
        scheduler: SchedulerCfg {
            tick: Duration::ZERO,
            gate_poll: Duration::from_millis(1),
        },
        ..RigCfg::default()
    }
}

fn assert_strict_alternation(events: &[TraceEvent], cycles: u64) {
    let runs: Vec<_> = events
        .iter()
        .filter(|e| matches!(e.state, HandoffState::Sampling | HandoffState::Controlling))
        .collect();
    assert_eq!(runs.len() as u64, cycles * 2, "one sample and one control per cycle");
    for (i, pair) in runs.chunks(2).enumerate() {
        let (s, c) = (pair[0], pair[1]);
        assert_eq!((s.task, s.state), (SAMPLER_TASK, HandoffState::Sampling));
        assert_eq!((c.task, c.state), (CONTROL_TASK, HandoffState::Controlling));
        assert_eq!(s.cycle, i as u64);
        assert_eq!(c.cycle, i as u64);
    }
}

#[test]
fn synchronous_driver_alternates_for_1000_cycles() {
    let ticks = ManualTicks::new();
    let parts = RigBuilder::new(cfg())
        .with_adc(ScriptedAdc::constant(3000))
        .with_ticks(ticks.clone())
        .try_build()
        .expect("build");
    let mut ports = parts.ports;
    let (tx, rx) = xch::bounded(8 * CYCLES as usize);
    let mut driver = CycleDriver::new(
        parts.sampler,
        parts.control,
        RunOptions {
            trace: Some(tx),
            ..RunOptions::default()
        },
    );

    for _ in 0..CYCLES {
        ticks.advance_ms(10, 12.5e-6);
        driver.step().expect("cycle");
        assert!(ports.main_duty.try_take().is_some());
        assert!(ports.tail_duty.try_take().is_some());
        ports.drain_display();
    }
    assert_eq!(driver.cycles(), CYCLES);

    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(events.len() as u64, CYCLES * 4);
    assert_eq!(events[0].state, HandoffState::WaitingForSample);
    assert_strict_alternation(&events, CYCLES);
}

/// Stand-in for the actuator and display tasks: keep every outbound
/// mailbox drained until told to stop.
fn spawn_drain(mut ports: RigPorts, stop: Arc<AtomicBool>) -> std::thread::JoinHandle<u64> {
    std::thread::spawn(move || {
        let mut duties = 0u64;
        while !stop.load(Ordering::Acquire) {
            if ports.main_duty.take_timeout(Duration::from_micros(200)).is_some() {
                duties += 1;
            }
            if ports.tail_duty.try_take().is_some() {
                duties += 1;
            }
            ports.drain_display();
        }
        while ports.main_duty.try_take().is_some() || ports.tail_duty.try_take().is_some() {
            duties += 1;
        }
        duties
    })
}

#[test]
fn threaded_rig_alternates_for_1000_cycles() {
    let parts = RigBuilder::new(cfg())
        .with_adc(ScriptedAdc::constant(3000))
        .with_ticks(ManualTicks::new())
        .try_build()
        .expect("build");
    let stop = Arc::new(AtomicBool::new(false));
    let drain = spawn_drain(parts.ports, Arc::clone(&stop));

    let (tx, rx) = xch::bounded(16 * CYCLES as usize);
    let rig = Rig::spawn(
        parts.sampler,
        parts.control,
        cfg().scheduler,
        MonotonicClock::new(),
        RunOptions {
            cycle_limit: Some(CYCLES),
            trace: Some(tx),
            ..RunOptions::default()
        },
    );
    let done = rig.join().expect("rig finished cleanly");
    stop.store(true, Ordering::Release);
    let duties = drain.join().expect("drain thread");

    assert_eq!(done, CYCLES);
    assert_eq!(duties, CYCLES * 2);
    let events: Vec<_> = rx.try_iter().collect();
    assert_strict_alternation(&events, CYCLES);
}

#[test]
fn shutdown_stops_an_unbounded_rig() {
    let parts = RigBuilder::new(cfg())
        .with_adc(ScriptedAdc::constant(2500))
        .with_ticks(ManualTicks::new())
        .try_build()
        .expect("build");
    let stop = Arc::new(AtomicBool::new(false));
    let drain = spawn_drain(parts.ports, Arc::clone(&stop));

    let rig = Rig::spawn(
        parts.sampler,
        parts.control,
        cfg().scheduler,
        MonotonicClock::new(),
        RunOptions::default(),
    );
    std::thread::sleep(Duration::from_millis(30));
    assert!(rig.is_running());
    let cycles = rig.shutdown().expect("clean shutdown");
    stop.store(true, Ordering::Release);
    drain.join().expect("drain thread");
    assert!(cycles > 0);
}
